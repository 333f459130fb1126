//! MRC2014 单文件量化体读写, 基于 `mrc` crate.
//!
//! 布局: 1024 字节小端主头, 随后是 `nsymbt` 字节扩展头, 最后是按 `x` 最快,
//! `z` 最慢排列的体素数据. 标签名表放在扩展头中: 以 `SEGL` 开头,
//! 随后是换行分隔的 UTF-8 名字, 末尾用 NUL 补齐到 4 字节的倍数.

use std::fmt::Display;
use std::fs;
use std::path::Path;

use mrc::{Header, MrcFile, MrcView};
use ndarray::{Array3, ArrayView3};

use crate::consts::mrc::*;
use crate::consts::LabelId;
use crate::data::{LabelMap, Segmentation};
use crate::error::{SegError, SegResult};

/// 返回一个把 `mrc::Error` 绑定到 `path` 上的闭包, 便于 `map_err`.
fn mrc_err(path: &Path) -> impl FnOnce(mrc::Error) -> SegError + '_ {
    move |e| SegError::format(path, format!("{e:?}"))
}

/// 能无损存放 `max_id` 的最紧凑模式.
fn mode_for(max_id: LabelId) -> i32 {
    if max_id <= i8::MAX as LabelId {
        MODE_I8
    } else if max_id <= i16::MAX as LabelId {
        MODE_I16
    } else {
        MODE_U16
    }
}

/// 体素统计量 `(min, max, mean, rms)`. `rms` 为相对均值的标准差.
fn stats(volume: ArrayView3<'_, LabelId>) -> (f32, f32, f32, f32) {
    if volume.is_empty() {
        return (0.0, 0.0, 0.0, 0.0);
    }
    let n = volume.len() as f64;
    let (mut lo, mut hi, mut sum, mut sq) = (LabelId::MAX, 0, 0.0f64, 0.0f64);
    for &v in volume.iter() {
        lo = lo.min(v);
        hi = hi.max(v);
        sum += v as f64;
        sq += (v as f64).powi(2);
    }
    let mean = sum / n;
    let rms = (sq / n - mean * mean).max(0.0).sqrt();
    (lo as f32, hi as f32, mean as f32, rms as f32)
}

/// 编码扩展头中的标签名表.
fn encode_names(names: &[String]) -> Vec<u8> {
    let mut ext = EXTTYP_LABELS.to_vec();
    ext.extend_from_slice(names.join("\n").as_bytes());
    ext.resize(ext.len().next_multiple_of(4), 0);
    ext
}

/// 解析扩展头中的标签名表. 不以 `SEGL` 开头或为空时返回 `None`.
fn decode_names(path: &Path, ext: &[u8]) -> SegResult<Option<Vec<String>>> {
    let Some(table) = ext.strip_prefix(&EXTTYP_LABELS[..]) else {
        return Ok(None);
    };
    let text = std::str::from_utf8(table)
        .map_err(|e| SegError::format(path, format!("label table is not UTF-8: {e}")))?;
    let text = text.trim_end_matches('\0');
    if text.is_empty() {
        return Ok(None);
    }
    Ok(Some(text.split('\n').map(str::to_owned).collect()))
}

/// 把 `seg` 写成 MRC2014 文件. 体素值, 体素尺寸与标签名顺序均被保存.
///
/// 根据最大 ID 选择 int8 / int16 / uint16 模式.
pub fn write_mrc<P: AsRef<Path>>(seg: &Segmentation, path: P) -> SegResult<()> {
    let path = path.as_ref();
    let volume = seg.volume();
    let mode = mode_for(seg.labels().max_id());
    let ext = encode_names(seg.label_names());

    let (z, h, w) = seg.shape();
    let dim = |n: usize| {
        i32::try_from(n).map_err(|_| SegError::invalid("volume", format!("{n} voxels per axis")))
    };
    let (dmin, dmax, dmean, rms) = stats(volume);

    let mut header = Header::new();
    (header.nx, header.ny, header.nz) = (dim(w)?, dim(h)?, dim(z)?);
    (header.mx, header.my, header.mz) = (header.nx, header.ny, header.nz);
    header.xlen = (w as f64 * seg.voxel_size()) as f32;
    header.ylen = (h as f64 * seg.voxel_size()) as f32;
    header.zlen = (z as f64 * seg.voxel_size()) as f32;
    (header.alpha, header.beta, header.gamma) = (90.0, 90.0, 90.0);
    (header.mapc, header.mapr, header.maps) = (1, 2, 3);
    header.mode = mode;
    (header.dmin, header.dmax, header.dmean, header.rms) = (dmin, dmax, dmean, rms);
    header.nsymbt = ext.len() as i32;

    let mut data = Vec::with_capacity(volume.len() * 2);
    match mode {
        MODE_I8 => data.extend(volume.iter().map(|&v| v as u8)),
        MODE_I16 => volume
            .iter()
            .for_each(|&v| data.extend_from_slice(&(v as i16).to_le_bytes())),
        _ => volume
            .iter()
            .for_each(|&v| data.extend_from_slice(&v.to_le_bytes())),
    }

    let mut file = MrcFile::create(path, header).map_err(mrc_err(path))?;
    file.write_ext_header(&ext).map_err(mrc_err(path))?;
    file.write_data(&data).map_err(mrc_err(path))?;

    log::info!(
        "wrote {} ({:?}, mode {mode}, {} labels)",
        path.display(),
        seg.shape(),
        seg.labels().len()
    );
    Ok(())
}

/// 主头中某个小端 32 位整数字段.
#[inline]
fn word(bytes: &[u8], off: usize) -> i32 {
    i32::from_le_bytes([bytes[off], bytes[off + 1], bytes[off + 2], bytes[off + 3]])
}

/// 体素数据在文件中的字节范围 `(start, end)`.
///
/// 在交给 [`MrcView`] 之前检查, 维度非正, 模式未知, 乘积溢出或文件过短都返回 `Err`.
fn checked_extent(path: &Path, bytes: &[u8]) -> SegResult<(usize, usize)> {
    if bytes.len() < HEADER_LEN {
        return Err(SegError::format(path, "file is shorter than the MRC header"));
    }
    if bytes[OFF_MACHST] == MACHST_BE {
        return Err(SegError::format(path, "big-endian MRC files are not supported"));
    }
    let dims = [word(bytes, 0), word(bytes, 4), word(bytes, 8)];
    if dims.iter().any(|&n| n <= 0) {
        return Err(SegError::format(path, format!("invalid dimensions {dims:?}")));
    }
    let mode = word(bytes, OFF_MODE);
    let width = match mode {
        MODE_I8 => 1,
        MODE_I16 | MODE_U16 => 2,
        MODE_F32 => 4,
        _ => return Err(SegError::format(path, format!("unsupported mode {mode}"))),
    };
    let start = HEADER_LEN + word(bytes, OFF_NSYMBT).max(0) as usize;

    let end = dims
        .iter()
        .try_fold(width, |acc: usize, &n| acc.checked_mul(n as usize))
        .and_then(|len| len.checked_add(start))
        .ok_or_else(|| SegError::format(path, "dimensions overflow"))?;
    if bytes.len() < end {
        return Err(SegError::format(
            path,
            format!("expected {end} bytes, found {}", bytes.len()),
        ));
    }
    Ok((start, end))
}

/// 体素值必须是合法的标签 ID.
fn label_id<T: Display>(path: &Path, v: T, ok: Option<LabelId>) -> SegResult<LabelId> {
    ok.ok_or_else(|| SegError::format(path, format!("voxel value {v} is not a label ID")))
}

/// 解码体素数据. 负数, 非整数的浮点数以及超出 `LabelId` 范围的值都视为损坏.
///
/// `raw` 为体素数据的原始字节, 只在 int8 模式下直接使用.
fn decode_voxels(
    path: &Path,
    view: &MrcView<'_>,
    mode: i32,
    raw: &[u8],
) -> SegResult<Vec<LabelId>> {
    match mode {
        MODE_I8 => raw
            .iter()
            .map(|&b| label_id(path, b as i8, LabelId::try_from(b as i8).ok()))
            .collect(),
        MODE_I16 => view
            .data
            .as_i16_slice()
            .map_err(mrc_err(path))?
            .iter()
            .map(|&v| label_id(path, v, LabelId::try_from(v).ok()))
            .collect(),
        // 与 int16 位宽相同, 按位重新解释.
        MODE_U16 => Ok(view
            .data
            .as_i16_slice()
            .map_err(mrc_err(path))?
            .iter()
            .map(|&v| v as u16)
            .collect()),
        _ => view
            .data
            .as_f32_slice()
            .map_err(mrc_err(path))?
            .iter()
            .map(|&v| {
                let r = v.round();
                let ok = (r.is_finite() && (0.0..=LabelId::MAX as f32).contains(&r))
                    .then_some(r as LabelId);
                label_id(path, v, ok)
            })
            .collect(),
    }
}

/// 读取 MRC2014 文件.
///
/// 标签名优先取 `labels` (若给出), 否则取文件自带的名字表; 两者都没有时按
/// `label_1, label_2, ...` 补齐到最大 ID. 名字个数少于最大 ID 时返回 `Err`.
///
/// 体素尺寸取 `xlen / mx`; 非正时退化为 1.0.
pub fn read_mrc<P, S>(path: P, labels: Option<&[S]>) -> SegResult<Segmentation>
where
    P: AsRef<Path>,
    S: AsRef<str>,
{
    let path = path.as_ref();
    let bytes = fs::read(path).map_err(SegError::io_at(path))?;
    let (start, end) = checked_extent(path, &bytes)?;
    let view = MrcView::new(&bytes[..end]).map_err(mrc_err(path))?;
    let header = view.header();

    let axes = [header.mapc, header.mapr, header.maps];
    if axes != [1, 2, 3] && axes != [0, 0, 0] {
        return Err(SegError::format(path, format!("unsupported axis order {axes:?}")));
    }
    let (w, h, z) = view.dimensions();
    let mode = header.mode;

    let voxels = decode_voxels(path, &view, mode, &bytes[start..end])?;
    let volume = Array3::from_shape_vec((z, h, w), voxels)
        .map_err(|e| SegError::format(path, e.to_string()))?;
    let max_id = volume.iter().copied().max().unwrap_or(0);

    let stored = decode_names(path, view.ext_header())?;
    let names: Vec<String> = match (labels, stored) {
        (Some(list), _) => list.iter().map(|s| s.as_ref().to_owned()).collect(),
        (None, Some(stored)) => stored,
        (None, None) => {
            log::warn!(
                "{} carries no label names, using label_1..label_{max_id}",
                path.display()
            );
            (1..=max_id).map(|i| format!("label_{i}")).collect()
        }
    };
    if names.len() < max_id as usize {
        return Err(SegError::invalid(
            "labels",
            format!("{} names given, but the volume uses ID {max_id}", names.len()),
        ));
    }
    let labels = LabelMap::from_names(names)?;

    let voxel_size = if header.mx > 0 {
        header.xlen as f64 / header.mx as f64
    } else {
        0.0
    };
    let voxel_size = if voxel_size.is_finite() && voxel_size > 0.0 {
        voxel_size
    } else {
        log::warn!("{} has no usable voxel size, using 1.0", path.display());
        1.0
    };

    log::info!(
        "read {} ({:?}, mode {mode}, {} labels, voxel size {voxel_size})",
        path.display(),
        volume.dim(),
        labels.len()
    );
    Segmentation::new(volume, labels, voxel_size)
}
