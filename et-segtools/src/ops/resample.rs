//! 按物理体素尺寸重采样.

use ndarray::{Array3, ArrayView3, Axis, Zip};

use super::{check_positive, check_thresh, indicator, present_ids, recombine};
use crate::consts::LabelId;
use crate::error::SegResult;
use crate::Idx3d;

/// 从体素尺寸 `old` 重采样到 `new` 后的形状. 每个轴为 `round(n * old / new)`,
/// 且至少为 1.
pub fn target_shape((z, h, w): Idx3d, old: f64, new: f64) -> Idx3d {
    let factor = old / new;
    let scale = |n: usize| ((n as f64 * factor).round() as usize).max(1);
    (scale(z), scale(h), scale(w))
}

/// 输出索引到输入坐标的线性映射, 返回 `(i0, i1, t)`, 意为 `(1 - t) * in[i0] + t * in[i1]`.
///
/// 两端对齐: 输出首尾体素分别落在输入首尾体素上. `n_in == n_out` 时每个 `t` 都为 0.
fn linear_taps(n_in: usize, n_out: usize) -> Vec<(usize, usize, f32)> {
    debug_assert!(n_in >= 1 && n_out >= 1);
    let last = n_in - 1;
    (0..n_out)
        .map(|i| {
            let x = if n_out == 1 {
                0.0
            } else {
                i as f64 * last as f64 / (n_out - 1) as f64
            };
            let i0 = (x.floor() as usize).min(last);
            let i1 = (i0 + 1).min(last);
            (i0, i1, (x - i0 as f64) as f32)
        })
        .collect()
}

/// 沿 `axis` 线性插值到长度 `n_out`.
fn zoom_axis(src: ArrayView3<'_, f32>, axis: Axis, n_out: usize) -> Array3<f32> {
    let taps = linear_taps(src.len_of(axis), n_out);
    let mut dim = src.raw_dim();
    dim[axis.index()] = n_out;

    let mut dst = Array3::<f32>::zeros(dim);
    Zip::from(dst.lanes_mut(axis))
        .and(src.lanes(axis))
        .for_each(|mut out, inp| {
            for (o, &(i0, i1, t)) in out.iter_mut().zip(taps.iter()) {
                *o = inp[i0] * (1.0 - t) + inp[i1] * t;
            }
        });
    dst
}

/// 三线性插值缩放标量场到 `shape`. 三线性插值可分离, 因此依次沿三个轴进行一维插值.
pub fn zoom_linear(field: ArrayView3<'_, f32>, shape: Idx3d) -> Array3<f32> {
    let (z, h, w) = shape;
    let a = zoom_axis(field, Axis(0), z);
    let b = zoom_axis(a.view(), Axis(1), h);
    zoom_axis(b.view(), Axis(2), w)
}

/// 将量化体从体素尺寸 `old` 重采样到 `new`.
///
/// 每个标签的占有率场独立插值, 占有率超过 `thresh` 的体素重新归属该标签,
/// 冲突按 [`crate::ops`] 模块文档的规则解决.
///
/// `old`, `new` 必须为正, `thresh` 必须位于 (0, 1), 否则返回 `Err`.
pub fn rescale(
    volume: ArrayView3<'_, LabelId>,
    old: f64,
    new: f64,
    thresh: f64,
) -> SegResult<Array3<LabelId>> {
    check_positive("voxel_size", old)?;
    check_positive("voxel_size", new)?;
    check_thresh("thresh", thresh)?;

    let shape = target_shape(volume.dim(), old, new);
    let ids = present_ids(volume);
    log::debug!(
        "rescaling {:?} -> {shape:?} ({old} -> {new}), {} labels, thresh {thresh}",
        volume.dim(),
        ids.len()
    );

    Ok(recombine(shape, &ids, thresh as f32, |id| {
        zoom_linear(indicator(volume, id).view(), shape)
    }))
}

#[cfg(test)]
mod tests {
    use super::{linear_taps, rescale, target_shape, zoom_linear};
    use crate::SegError;
    use ndarray::{s, Array3};

    /// 一个含三个标签的 6x8x8 体.
    fn three_blocks() -> Array3<u16> {
        let mut v = Array3::<u16>::zeros((6, 8, 8));
        v.slice_mut(s![1..5, 1..4, 1..7]).fill(1);
        v.slice_mut(s![1..5, 4..7, 1..4]).fill(2);
        v.slice_mut(s![1..5, 4..7, 4..7]).fill(3);
        v
    }

    #[test]
    fn test_target_shape() {
        assert_eq!(target_shape((10, 20, 30), 1.0, 2.0), (5, 10, 15));
        assert_eq!(target_shape((10, 20, 30), 2.0, 1.0), (20, 40, 60));
        assert_eq!(target_shape((1, 2, 3), 1.0, 100.0), (1, 1, 1));
        assert_eq!(target_shape((7, 7, 7), 1.5, 1.5), (7, 7, 7));
    }

    #[test]
    fn test_linear_taps_identity() {
        for n in 1..6 {
            for (i, &(i0, i1, t)) in linear_taps(n, n).iter().enumerate() {
                assert_eq!(i0, i);
                assert!(i1 == i || i1 == i + 1);
                assert_eq!(t, 0.0);
            }
        }
    }

    #[test]
    fn test_zoom_linear_midpoints() {
        let f = Array3::from_shape_vec((1, 1, 2), vec![0.0f32, 1.0]).unwrap();
        let z = zoom_linear(f.view(), (1, 1, 3));
        assert_eq!(z.as_slice().unwrap(), &[0.0, 0.5, 1.0]);
    }

    #[test]
    fn test_rescale_same_size_is_identity() {
        let v = three_blocks();
        let out = rescale(v.view(), 1.3, 1.3, 0.5).unwrap();
        assert_eq!(out, v);
    }

    #[test]
    fn test_rescale_up_then_down_keeps_labels() {
        let v = three_blocks();
        let up = rescale(v.view(), 2.0, 1.0, 0.5).unwrap();
        assert_eq!(up.dim(), (12, 16, 16));

        // 没有新 ID 凭空出现, 且每个标签都保留下来.
        let mut seen = [false; 4];
        up.iter().for_each(|&p| seen[p as usize] = true);
        assert_eq!(seen, [true; 4]);

        // 标签内部中心仍属于该标签.
        assert_eq!(up[(5, 4, 7)], 1);
        assert_eq!(up[(5, 10, 4)], 2);
        assert_eq!(up[(5, 10, 10)], 3);
    }

    #[test]
    fn test_rescale_never_blends_ids() {
        // ID 1 与 ID 3 相邻. 直接插值 ID 会在交界处产生 2, 逐标签插值则不会.
        let mut v = Array3::<u16>::zeros((1, 1, 4));
        v[(0, 0, 0)] = 1;
        v[(0, 0, 1)] = 1;
        v[(0, 0, 2)] = 3;
        v[(0, 0, 3)] = 3;
        let out = rescale(v.view(), 1.0, 0.5, 0.3).unwrap();
        assert!(out.iter().all(|&p| p != 2));
    }

    #[test]
    fn test_rescale_invalid_parameters() {
        let v = three_blocks();
        for (new, t) in [(0.0, 0.5), (-1.0, 0.5), (1.0, 0.0), (1.0, 1.0), (1.0, 1.5)] {
            let e = rescale(v.view(), 1.0, new, t).unwrap_err();
            assert!(matches!(e, SegError::InvalidParameter { .. }));
        }
    }
}
