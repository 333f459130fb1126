//! 单文件三维掩膜: 多页 TIFF, npy 与 nifti.
//!
//! 所有读取函数都返回 `(z, h, w)` 排列的二值体, 非零即前景.

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use ndarray::{Array3, ArrayView2, ArrayView3, Axis};
use ndarray_npy::{read_npy, ReadNpyError, ReadableElement};
use nifti::{IntoNdArray, NiftiObject, ReaderOptions};
use tiff::decoder::{Decoder, DecodingResult, Limits};
use tiff::encoder::{colortype::Gray8, Rational, TiffEncoder};
use tiff::tags::{ResolutionUnit, Tag};

use crate::consts::gray::{MASK_BACKGROUND, MASK_FOREGROUND};
use crate::consts::RESOLUTION_DENOM;
use crate::error::{SegError, SegResult};
use crate::ops;

/// 单页解码结果中的非零像素.
fn nonzero(path: &Path, page: DecodingResult) -> SegResult<Vec<bool>> {
    let mask: Vec<bool> = match page {
        DecodingResult::U8(v) => v.into_iter().map(|p| p != 0).collect(),
        DecodingResult::U16(v) => v.into_iter().map(|p| p != 0).collect(),
        DecodingResult::U32(v) => v.into_iter().map(|p| p != 0).collect(),
        DecodingResult::U64(v) => v.into_iter().map(|p| p != 0).collect(),
        DecodingResult::I8(v) => v.into_iter().map(|p| p != 0).collect(),
        DecodingResult::I16(v) => v.into_iter().map(|p| p != 0).collect(),
        DecodingResult::I32(v) => v.into_iter().map(|p| p != 0).collect(),
        DecodingResult::I64(v) => v.into_iter().map(|p| p != 0).collect(),
        DecodingResult::F32(v) => v.into_iter().map(|p| p != 0.0).collect(),
        DecodingResult::F64(v) => v.into_iter().map(|p| p != 0.0).collect(),
        #[allow(unreachable_patterns)]
        _ => return Err(SegError::format(path, "unsupported TIFF sample format")),
    };
    Ok(mask)
}

/// 读取多页 TIFF, 每页为一层深度切片. 各页尺寸必须一致且为单通道.
pub fn read_tiff_stack<P: AsRef<Path>>(path: P) -> SegResult<Array3<bool>> {
    let path = path.as_ref();
    let file = File::open(path).map_err(SegError::io_at(path))?;
    let mut decoder = Decoder::new(BufReader::new(file))?.with_limits(Limits::unlimited());

    let (w, h) = decoder.dimensions()?;
    let (w, h) = (w as usize, h as usize);
    let mut data = Vec::new();
    let mut depth = 0;
    loop {
        let (pw, ph) = decoder.dimensions()?;
        if (ph as usize, pw as usize) != (h, w) {
            return Err(SegError::ShapeMismatch {
                expected: (depth, h, w),
                found: (depth, ph as usize, pw as usize),
                name: path.display().to_string(),
            });
        }
        let page = nonzero(path, decoder.read_image()?)?;
        if page.len() != h * w {
            return Err(SegError::format(
                path,
                format!("page {depth} is not a single-channel {w}x{h} image"),
            ));
        }
        data.extend(page);
        depth += 1;

        if !decoder.more_images() {
            break;
        }
        decoder.next_image()?;
    }

    log::debug!("read {} ({depth} pages of {h}x{w})", path.display());
    Array3::from_shape_vec((depth, h, w), data).map_err(|e| SegError::format(path, e.to_string()))
}

/// 以 "每单位长度的像素数" 表示的 TIFF 分辨率, 即 `1 / voxel_size`.
pub(crate) fn resolution_of(voxel_size: f64) -> Rational {
    let d = (voxel_size * RESOLUTION_DENOM as f64)
        .round()
        .clamp(1.0, u32::MAX as f64) as u32;
    Rational {
        n: RESOLUTION_DENOM,
        d,
    }
}

/// 在 `encoder` 中追加一页 Gray8 图像, 前景为 255, 背景为 0, 并记录 X/Y 分辨率.
pub(crate) fn write_gray8_page<W>(
    encoder: &mut TiffEncoder<W>,
    page: ArrayView2<'_, bool>,
    voxel_size: f64,
) -> SegResult<()>
where
    W: std::io::Write + std::io::Seek,
{
    let (h, w) = page.dim();
    let pixels: Vec<u8> = page
        .iter()
        .map(|&m| if m { MASK_FOREGROUND } else { MASK_BACKGROUND })
        .collect();
    let mut image = encoder.new_image::<Gray8>(w as u32, h as u32)?;
    image.resolution(ResolutionUnit::None, resolution_of(voxel_size));
    image.write_data(&pixels)?;
    Ok(())
}

/// 把二值体写成多页 Gray8 TIFF, 前景为 255, 背景为 0.
///
/// 每页的 X/Y 分辨率记为 `1 / voxel_size`.
pub fn write_tiff_stack<P: AsRef<Path>>(
    mask: ArrayView3<'_, bool>,
    voxel_size: f64,
    path: P,
) -> SegResult<()> {
    let path = path.as_ref();
    ops::check_positive("voxel_size", voxel_size)?;
    let file = File::create(path).map_err(SegError::io_at(path))?;
    let mut encoder = TiffEncoder::new(BufWriter::new(file))?;

    for page in mask.axis_iter(Axis(0)) {
        write_gray8_page(&mut encoder, page, voxel_size)?;
    }
    Ok(())
}

/// 读取 TIFF 第一页记录的体素尺寸 (`1 / XResolution`). 没有分辨率标签时返回 `None`.
pub fn read_tiff_voxel_size<P: AsRef<Path>>(path: P) -> SegResult<Option<f64>> {
    let path = path.as_ref();
    let file = File::open(path).map_err(SegError::io_at(path))?;
    let mut decoder = Decoder::new(BufReader::new(file))?;
    let Some(value) = decoder.find_tag(Tag::XResolution)? else {
        return Ok(None);
    };
    match value.into_u32_vec()?.as_slice() {
        &[n, d] if n > 0 && d > 0 => Ok(Some(d as f64 / n as f64)),
        _ => Ok(None),
    }
}

/// 尝试以元素类型 `T` 读取 npy. 元素类型不符时返回 `Ok(None)`.
fn try_npy<T, F>(path: &Path, is_set: F) -> SegResult<Option<Array3<bool>>>
where
    T: ReadableElement,
    F: Fn(&T) -> bool,
{
    match read_npy::<_, Array3<T>>(path) {
        Ok(arr) => Ok(Some(arr.map(is_set))),
        Err(ReadNpyError::WrongDescriptor(_)) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// 读取三维 npy 掩膜. 支持 `u8`, `bool`, `u16` 与 `f32` 元素.
pub fn read_npy_mask<P: AsRef<Path>>(path: P) -> SegResult<Array3<bool>> {
    let path = path.as_ref();
    if let Some(m) = try_npy::<u8, _>(path, |&v| v != 0)? {
        return Ok(m);
    }
    if let Some(m) = try_npy::<bool, _>(path, |&v| v)? {
        return Ok(m);
    }
    if let Some(m) = try_npy::<u16, _>(path, |&v| v != 0)? {
        return Ok(m);
    }
    try_npy::<f32, _>(path, |&v| v != 0.0)?
        .ok_or_else(|| SegError::format(path, "unsupported npy element type"))
}

/// 读取 nifti (`.nii` 或 `.nii.gz`) 掩膜.
///
/// nifti 数据按 `[w, h, z]` 存储, 此处转为 `(z, h, w)`.
pub fn read_nifti_mask<P: AsRef<Path>>(path: P) -> SegResult<Array3<bool>> {
    let obj = ReaderOptions::new().read_file(path.as_ref())?;

    // [W, H, z] -> [z, H, W]
    let data = obj
        .into_volume()
        .into_ndarray::<f32>()?
        .permuted_axes([2, 1, 0].as_slice());
    let data = data
        .into_dimensionality::<ndarray::Ix3>()
        .map_err(|e| SegError::format(path.as_ref(), e.to_string()))?;

    Ok(data.map(|&v| v != 0.0))
}

/// 按扩展名选择读取方式. `.nii.gz` 需要整体匹配.
pub fn read_volume_mask<P: AsRef<Path>>(path: P) -> SegResult<Array3<bool>> {
    let path = path.as_ref();
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    let mask = if name.ends_with(".tif") || name.ends_with(".tiff") {
        read_tiff_stack(path)?
    } else if name.ends_with(".npy") {
        read_npy_mask(path)?
    } else if name.ends_with(".nii") || name.ends_with(".nii.gz") {
        read_nifti_mask(path)?
    } else {
        return Err(SegError::format(path, "unknown volume file extension"));
    };
    log::info!("read {} {:?}", path.display(), mask.dim());
    Ok(mask)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::s;
    use ndarray_npy::write_npy;
    use tempfile::tempdir;

    fn blob() -> Array3<bool> {
        let mut m = Array3::from_elem((3, 4, 5), false);
        m.slice_mut(s![1.., 1..3, 2..]).fill(true);
        m
    }

    #[test]
    fn test_tiff_stack_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("membrane.tif");
        write_tiff_stack(blob().view(), 1.0, &path).unwrap();
        assert_eq!(read_tiff_stack(&path).unwrap(), blob());
        assert_eq!(read_volume_mask(&path).unwrap(), blob());
    }

    #[test]
    fn test_tiff_stack_resolution() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ribosome.tif");
        write_tiff_stack(blob().view(), 7.84, &path).unwrap();
        assert_eq!(read_tiff_voxel_size(&path).unwrap(), Some(7.84));

        let r = resolution_of(0.5);
        assert_eq!((r.n, r.d), (RESOLUTION_DENOM, RESOLUTION_DENOM / 2));
        assert!(write_tiff_stack(blob().view(), 0.0, &path).is_err());
    }

    #[test]
    fn test_page_sample_formats() {
        let p = Path::new("x.tif");
        let page = nonzero(p, DecodingResult::I16(vec![0, -2, 3])).unwrap();
        assert_eq!(page, [false, true, true]);
        let page = nonzero(p, DecodingResult::F64(vec![0.0, 0.5])).unwrap();
        assert_eq!(page, [false, true]);

        // 三通道图像不是掩膜.
        let dir = tempdir().unwrap();
        let path = dir.path().join("rgb.tif");
        let file = File::create(&path).unwrap();
        let mut encoder = TiffEncoder::new(BufWriter::new(file)).unwrap();
        encoder
            .write_image::<tiff::encoder::colortype::RGB8>(2, 2, &[0u8; 12])
            .unwrap();
        drop(encoder);
        let e = read_tiff_stack(&path).unwrap_err();
        assert!(matches!(e, SegError::Format { .. }));
    }

    #[test]
    fn test_npy_masks() {
        let dir = tempdir().unwrap();
        let as_u8 = dir.path().join("a.npy");
        write_npy(&as_u8, &blob().mapv(|b| b as u8 * 7)).unwrap();
        assert_eq!(read_volume_mask(&as_u8).unwrap(), blob());

        let as_bool = dir.path().join("b.npy");
        write_npy(&as_bool, &blob()).unwrap();
        assert_eq!(read_npy_mask(&as_bool).unwrap(), blob());

        let as_f32 = dir.path().join("c.npy");
        write_npy(&as_f32, &blob().mapv(|b| b as u8 as f32)).unwrap();
        assert_eq!(read_npy_mask(&as_f32).unwrap(), blob());
    }

    #[test]
    fn test_unreadable_volumes() {
        let dir = tempdir().unwrap();
        assert!(read_volume_mask(dir.path().join("x.mrc")).is_err());
        let e = read_volume_mask(dir.path().join("missing.tif")).unwrap_err();
        assert!(e.is_io_failure());

        let junk = dir.path().join("junk.npy");
        std::fs::write(&junk, b"not an npy file").unwrap();
        assert!(read_volume_mask(&junk).unwrap_err().is_io_failure());
    }
}
