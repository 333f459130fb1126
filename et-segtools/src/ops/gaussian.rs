//! Gaussian 平滑.

use ndarray::{Array3, ArrayView3, Axis, Zip};

use super::{check_positive, check_thresh, indicator, present_ids, recombine};
use crate::consts::{LabelId, GAUSSIAN_TRUNCATE};
use crate::error::SegResult;

/// 归一化的一维 Gaussian 核, 长度为 `2 * radius + 1`,
/// 其中 `radius = floor(GAUSSIAN_TRUNCATE * sigma + 0.5)`.
fn kernel_1d(sigma: f64) -> Vec<f32> {
    let radius = (GAUSSIAN_TRUNCATE * sigma + 0.5) as isize;
    let weights: Vec<f64> = (-radius..=radius)
        .map(|x| (-0.5 * (x as f64 / sigma).powi(2)).exp())
        .collect();
    let total: f64 = weights.iter().sum();
    weights.into_iter().map(|w| (w / total) as f32).collect()
}

/// 半样本对称 ("reflect") 边界: `d c b a | a b c d | d c b a`.
#[inline]
fn reflect(i: isize, n: usize) -> usize {
    let period = 2 * n as isize;
    let m = i.rem_euclid(period) as usize;
    if m < n {
        m
    } else {
        2 * n - 1 - m
    }
}

/// 沿 `axis` 用 `kernel` 做一维卷积.
fn convolve_axis(src: ArrayView3<'_, f32>, axis: Axis, kernel: &[f32]) -> Array3<f32> {
    let n = src.len_of(axis);
    let radius = (kernel.len() / 2) as isize;
    let mut dst = Array3::<f32>::zeros(src.raw_dim());

    Zip::from(dst.lanes_mut(axis))
        .and(src.lanes(axis))
        .for_each(|mut out, inp| {
            for (i, o) in out.iter_mut().enumerate() {
                *o = kernel
                    .iter()
                    .enumerate()
                    .map(|(k, &w)| w * inp[reflect(i as isize + k as isize - radius, n)])
                    .sum();
            }
        });
    dst
}

/// 对标量场做各向同性 Gaussian 模糊. `sigma` 以体素为单位.
///
/// 三维 Gaussian 可分离, 因此依次沿三个轴卷积. 边界按 "reflect" 规则延拓.
/// `sigma` 很小时核退化为 `[1.0]`, 输出与输入完全相同.
pub fn gaussian_filter(field: ArrayView3<'_, f32>, sigma: f64) -> Array3<f32> {
    let kernel = kernel_1d(sigma);
    if kernel.len() == 1 {
        return field.to_owned();
    }
    let a = convolve_axis(field, Axis(0), &kernel);
    let b = convolve_axis(a.view(), Axis(1), &kernel);
    convolve_axis(b.view(), Axis(2), &kernel)
}

/// 对量化体做 Gaussian 平滑.
///
/// 每个标签的占有率场独立模糊, 然后在 `thresh` 处重新二值化,
/// 冲突按 [`crate::ops`] 模块文档的规则解决.
///
/// `sigma` 必须为正, `thresh` 必须位于 (0, 1), 否则返回 `Err`.
pub fn gaussian_smooth(
    volume: ArrayView3<'_, LabelId>,
    sigma: f64,
    thresh: f64,
) -> SegResult<Array3<LabelId>> {
    check_positive("sigma", sigma)?;
    check_thresh("thresh", thresh)?;

    let ids = present_ids(volume);
    log::debug!(
        "gaussian smoothing {:?}, {} labels, sigma {sigma}, thresh {thresh}",
        volume.dim(),
        ids.len()
    );
    Ok(recombine(volume.dim(), &ids, thresh as f32, |id| {
        gaussian_filter(indicator(volume, id).view(), sigma)
    }))
}
