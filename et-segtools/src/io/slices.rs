//! 二维切片序列: 目录下形如 `<prefix><index>.tif` 的文件, 按 `index` 数值顺序沿深度堆叠.

use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use itertools::Itertools;
use ndarray::{Array3, ArrayView3, Axis};
use tiff::encoder::TiffEncoder;

use super::volume::write_gray8_page;
use crate::consts::names::SLICE_EXTENSIONS;
use crate::error::{SegError, SegResult};
use crate::ops;

/// 从文件名 `<prefix><index>.<ext>` 中解析切片序号. 不匹配时返回 `None`.
fn slice_index(file_name: &str, prefix: &str) -> Option<u64> {
    let (digits, ext) = file_name.strip_prefix(prefix)?.rsplit_once('.')?;
    if digits.is_empty()
        || !digits.bytes().all(|b| b.is_ascii_digit())
        || !SLICE_EXTENSIONS.iter().any(|e| ext.eq_ignore_ascii_case(e))
    {
        return None;
    }
    digits.parse().ok()
}

/// 列出 `dir` 下属于 `prefix` 的切片文件, 按序号升序排列.
///
/// 不匹配的文件被忽略. 序号重复时返回 `Err`, 没有任何切片时返回 [`SegError::EmptyInput`].
pub fn list_slices(dir: &Path, prefix: &str) -> SegResult<Vec<(u64, PathBuf)>> {
    let mut found = Vec::new();
    for entry in fs::read_dir(dir).map_err(SegError::io_at(dir))? {
        let entry = entry.map_err(SegError::io_at(dir))?;
        let name = entry.file_name();
        if let Some(index) = name.to_str().and_then(|n| slice_index(n, prefix)) {
            found.push((index, entry.path()));
        }
    }
    let found: Vec<_> = found.into_iter().sorted_by_key(|(i, _)| *i).collect();

    if let Some(((i, a), (_, b))) = found.iter().tuple_windows().find(|((i, _), (j, _))| i == j) {
        return Err(SegError::format(
            dir,
            format!(
                "slice index {i} appears twice ({} and {})",
                a.display(),
                b.display()
            ),
        ));
    }
    if found.is_empty() {
        return Err(SegError::EmptyInput(format!(
            "no `{prefix}<index>.tif` slices in {}",
            dir.display()
        )));
    }
    Ok(found)
}

/// 读取 `dir` 下属于 `prefix` 的切片序列, 非零像素为前景. 所有切片尺寸必须一致.
pub fn read_slice_stack<P: AsRef<Path>>(dir: P, prefix: &str) -> SegResult<Array3<bool>> {
    let dir = dir.as_ref();
    let files = list_slices(dir, prefix)?;

    let mut shape = None;
    let mut data = Vec::new();
    for (z, (_, path)) in files.iter().enumerate() {
        let img = image::open(path)?.to_luma16();
        let (h, w) = (img.height() as usize, img.width() as usize);
        match shape {
            None => shape = Some((h, w)),
            Some((h0, w0)) if (h0, w0) != (h, w) => {
                return Err(SegError::ShapeMismatch {
                    expected: (z, h0, w0),
                    found: (z, h, w),
                    name: path.display().to_string(),
                });
            }
            Some(_) => {}
        }
        data.extend(img.into_raw().into_iter().map(|p| p != 0));
    }

    let (h, w) = shape.unwrap_or_default();
    log::debug!("read {} slices of {h}x{w} from {}", files.len(), dir.display());
    Array3::from_shape_vec((files.len(), h, w), data)
        .map_err(|e| SegError::format(dir, e.to_string()))
}

/// 把二值体逐层写成 `dir/<prefix>{z:03}.tif`, 前景为 255, 背景为 0. 目录不存在时自动创建.
///
/// 每张切片的 X/Y 分辨率记为 `1 / voxel_size`.
pub fn write_slice_stack<P: AsRef<Path>>(
    mask: ArrayView3<'_, bool>,
    voxel_size: f64,
    dir: P,
    prefix: &str,
) -> SegResult<()> {
    let dir = dir.as_ref();
    ops::check_positive("voxel_size", voxel_size)?;
    fs::create_dir_all(dir).map_err(SegError::io_at(dir))?;

    for (z, page) in mask.axis_iter(Axis(0)).enumerate() {
        let path = dir.join(format!("{prefix}{z:03}.tif"));
        let file = File::create(&path).map_err(SegError::io_at(&path))?;
        let mut encoder = TiffEncoder::new(BufWriter::new(file))?;
        write_gray8_page(&mut encoder, page, voxel_size)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::read_tiff_voxel_size;
    use image::{GrayImage, Luma};
    use ndarray::s;
    use tempfile::tempdir;

    fn save_gray(path: &Path, (h, w): (u32, u32), on: &[(u32, u32)]) {
        let mut img = GrayImage::new(w, h);
        for &(y, x) in on {
            img.put_pixel(x, y, Luma([1]));
        }
        img.save(path).unwrap();
    }

    #[test]
    fn test_slice_index() {
        assert_eq!(slice_index("membrane007.tif", "membrane"), Some(7));
        assert_eq!(slice_index("membrane12.TIFF", "membrane"), Some(12));
        assert_eq!(slice_index("membrane.tif", "membrane"), None);
        assert_eq!(slice_index("membranes001.tif", "membrane"), None);
        assert_eq!(slice_index("membrane001.png", "membrane"), None);
        assert_eq!(slice_index("ribo001.tif", "membrane"), None);
    }

    #[test]
    fn test_round_trip() {
        let dir = tempdir().unwrap();
        let mut mask = Array3::from_elem((4, 3, 5), false);
        mask.slice_mut(s![1..3, .., 1..4]).fill(true);
        mask[(3, 2, 4)] = true;

        write_slice_stack(mask.view(), 2.5, dir.path().join("mito"), "mito").unwrap();
        assert!(dir.path().join("mito/mito000.tif").is_file());
        assert!(dir.path().join("mito/mito003.tif").is_file());
        assert_eq!(
            read_tiff_voxel_size(dir.path().join("mito/mito002.tif")).unwrap(),
            Some(2.5)
        );
        assert_eq!(read_slice_stack(dir.path().join("mito"), "mito").unwrap(), mask);
    }

    #[test]
    fn test_numeric_order_and_filtering() {
        let dir = tempdir().unwrap();
        let p = dir.path();
        save_gray(&p.join("a10.tif"), (2, 2), &[(1, 1)]);
        save_gray(&p.join("a2.tif"), (2, 2), &[(0, 1)]);
        save_gray(&p.join("a1.tif"), (2, 2), &[(0, 0)]);
        save_gray(&p.join("ab1.tif"), (3, 3), &[]);
        fs::write(p.join("a3.txt"), "ignored").unwrap();

        let indices: Vec<u64> = list_slices(p, "a").unwrap().into_iter().map(|(i, _)| i).collect();
        assert_eq!(indices, vec![1, 2, 10]);

        let stack = read_slice_stack(p, "a").unwrap();
        assert_eq!(stack.dim(), (3, 2, 2));
        assert!(stack[(0, 0, 0)] && stack[(1, 0, 1)] && stack[(2, 1, 1)]);
        assert_eq!(stack.iter().filter(|&&m| m).count(), 3);
    }

    #[test]
    fn test_bad_stacks() {
        let dir = tempdir().unwrap();
        let p = dir.path();
        assert!(matches!(
            read_slice_stack(p, "a").unwrap_err(),
            SegError::EmptyInput(_)
        ));

        save_gray(&p.join("a0.tif"), (2, 2), &[]);
        save_gray(&p.join("a1.tif"), (2, 3), &[]);
        assert!(matches!(
            read_slice_stack(p, "a").unwrap_err(),
            SegError::ShapeMismatch { .. }
        ));

        save_gray(&p.join("a01.tif"), (2, 2), &[]);
        assert!(matches!(
            read_slice_stack(p, "a").unwrap_err(),
            SegError::Format { .. }
        ));

        assert!(read_slice_stack(p.join("missing"), "a")
            .unwrap_err()
            .is_io_failure());
    }
}
