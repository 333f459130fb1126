//! 掩膜目录: 每个标签一个独立的二值掩膜.
//!
//! 标签 `label` 的掩膜按以下顺序查找:
//!
//! 1. `<dir>/<label>.tif`, `.tiff`, `.npy`, `.nii`, `.nii.gz` (单文件三维掩膜);
//! 2. `<dir>/<label>/` 目录下的 `<label><index>.tif` 切片序列.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use itertools::Itertools;
use ndarray::Array3;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use super::mrc::write_mrc;
use super::slices::{read_slice_stack, write_slice_stack};
use super::volume::{read_volume_mask, write_tiff_stack};
use crate::consts::names::{COMBINED_MRC, VOLUME_EXTENSIONS};
use crate::data::Segmentation;
use crate::error::{SegError, SegResult};
use crate::ops;

/// 写出掩膜目录时每个标签的文件布局.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum MaskLayout {
    /// 每个标签一个多页 TIFF: `<dir>/<label>.tif`.
    #[default]
    Volume,

    /// 每个标签一个子目录, 每层一张 TIFF: `<dir>/<label>/<label>{z:03}.tif`.
    Slices,
}

/// 找到 `label` 的掩膜并读取.
fn read_label_mask(dir: &Path, label: &str) -> SegResult<Array3<bool>> {
    for ext in VOLUME_EXTENSIONS {
        let file = dir.join(format!("{label}.{ext}"));
        if file.is_file() {
            return read_volume_mask(&file);
        }
    }
    let sub = dir.join(label);
    if sub.is_dir() {
        let mask = read_slice_stack(&sub, label)?;
        log::info!("read {} {:?}", sub.display(), mask.dim());
        return Ok(mask);
    }
    Err(SegError::Io {
        path: sub,
        source: io::Error::new(
            io::ErrorKind::NotFound,
            format!("no mask file or slice folder for label `{label}`"),
        ),
    })
}

/// 读取掩膜目录并合并为分割体. `labels` 的顺序决定 ID: `labels[i]` 的 ID 为 `i + 1`.
///
/// 目录遍历顺序不影响结果. 重叠体素的归属见 [`crate::combine_masks`].
pub fn read_mask_folder<P, S>(dir: P, labels: &[S], voxel_size: f64) -> SegResult<Segmentation>
where
    P: AsRef<Path>,
    S: AsRef<str>,
{
    let dir = dir.as_ref();
    ops::check_positive("voxel_size", voxel_size)?;

    let masks = labels
        .iter()
        .map(|label| read_label_mask(dir, label.as_ref()))
        .collect::<SegResult<Vec<_>>>()?;
    let views: Vec<_> = masks.iter().map(|m| m.view()).collect();
    let seg = Segmentation::from_masks(&views, labels, voxel_size)?;

    log::info!(
        "combined {} masks from {} into {:?}",
        labels.len(),
        dir.display(),
        seg.shape()
    );
    Ok(seg)
}

/// 把 `seg` 写成掩膜目录. 目录不存在时自动创建.
///
/// 每个标签 (含体素数为 0 的标签) 都会写出, TIFF 分辨率记录 `seg` 的体素尺寸.
/// `also_write_combined` 为真时, 额外写出 `<dir>/combined.mrc`.
pub fn write_mask_folder<P: AsRef<Path>>(
    seg: &Segmentation,
    dir: P,
    layout: MaskLayout,
    also_write_combined: bool,
) -> SegResult<()> {
    let dir = dir.as_ref();
    let voxel_size = seg.voxel_size();
    fs::create_dir_all(dir).map_err(SegError::io_at(dir))?;

    if also_write_combined {
        write_mrc(seg, dir.join(COMBINED_MRC))?;
    }
    for (label, id) in seg.labels().iter() {
        let mask = seg.mask_for_id(id);
        match layout {
            MaskLayout::Volume => {
                write_tiff_stack(mask.view(), voxel_size, dir.join(format!("{label}.tif")))?
            }
            MaskLayout::Slices => write_slice_stack(mask.view(), voxel_size, dir.join(label), label)?,
        }
    }

    log::info!(
        "wrote {} label masks ({layout:?}) to {}",
        seg.labels().len(),
        dir.display()
    );
    Ok(())
}

/// 目录项对应的标签名: 子目录名, 或去掉体数据扩展名后的文件名.
fn label_of(path: &Path) -> Option<String> {
    let name = path.file_name()?.to_str()?;
    if path.is_dir() {
        return Some(name.to_owned());
    }
    VOLUME_EXTENSIONS
        .iter()
        .filter_map(|ext| name.strip_suffix(ext)?.strip_suffix('.'))
        .find(|stem| !stem.is_empty())
        .map(str::to_owned)
}

/// 从目录内容推断标签名, 按字典序排列且去重.
///
/// 仅供命令行等外围工具在用户未给出标签列表时使用, [`read_mask_folder`]
/// 本身从不依赖目录遍历顺序.
pub fn discover_labels<P: AsRef<Path>>(dir: P) -> SegResult<Vec<String>> {
    let dir = dir.as_ref();
    let mut paths: Vec<PathBuf> = Vec::new();
    for entry in fs::read_dir(dir).map_err(SegError::io_at(dir))? {
        paths.push(entry.map_err(SegError::io_at(dir))?.path());
    }
    let labels: Vec<String> = paths
        .iter()
        .filter_map(|p| label_of(p))
        .sorted()
        .dedup()
        .collect();
    if labels.is_empty() {
        return Err(SegError::EmptyInput(format!(
            "no label masks in {}",
            dir.display()
        )));
    }
    Ok(labels)
}
