//! 量化体上的变换算子.
//!
//! 所有算子都是纯函数 `(volume, params) -> volume`, 不依赖 [`crate::Segmentation`]
//! 的内部状态, 可以单独测试. [`crate::Segmentation`] 上的同名方法只负责校验参数并替换数据.
//!
//! # 占有率重组
//!
//! 重采样与 Gaussian 平滑都不直接处理整数 ID (相邻 ID 之间没有数值关系).
//! 每个标签先被视为独立的 `0.0 / 1.0` 占有率场, 分别处理后再按如下规则重组:
//!
//! 1. 只有占有率 **严格大于** 阈值的标签才参与竞争;
//! 2. 占有率最高者获得该体素;
//! 3. 平局时 ID 最小者胜出.
//!
//! 对二值掩膜而言该规则退化为 [`crate::combine_masks`] 的 "ID 最小者胜出".

use ndarray::{Array3, ArrayView3, Zip};

use crate::consts::{LabelId, BACKGROUND};
use crate::error::{SegError, SegResult};

mod gaussian;
mod morph;
mod params;
mod resample;

pub use gaussian::{gaussian_filter, gaussian_smooth};
pub use morph::{grow, morphological_smooth, shrink};
pub use params::{GaussianParams, RescaleParams};
pub use resample::{rescale, target_shape, zoom_linear};

/// 校验重新二值化阈值, 必须位于开区间 (0, 1).
pub(crate) fn check_thresh(name: &'static str, thresh: f64) -> SegResult<()> {
    if thresh > 0.0 && thresh < 1.0 {
        Ok(())
    } else {
        Err(SegError::invalid(name, format!("{thresh} is not in (0, 1)")))
    }
}

/// 校验一个物理长度 (体素尺寸, sigma), 必须为正的有限值.
pub(crate) fn check_positive(name: &'static str, value: f64) -> SegResult<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(SegError::invalid(name, format!("{value} is not a positive number")))
    }
}

/// 收集量化体中出现过的所有非背景 ID, 升序排列.
pub fn present_ids(volume: ArrayView3<'_, LabelId>) -> Vec<LabelId> {
    let mut seen = vec![false; LabelId::MAX as usize + 1];
    for &v in volume.iter() {
        seen[v as usize] = true;
    }
    seen.iter()
        .enumerate()
        .skip(1)
        .filter_map(|(id, &s)| s.then_some(id as LabelId))
        .collect()
}

/// 取出 `id` 的占有率场: 等于 `id` 处为 1.0, 否则为 0.0.
#[inline]
pub(crate) fn indicator(volume: ArrayView3<'_, LabelId>, id: LabelId) -> Array3<f32> {
    volume.map(|&v| if v == id { 1.0 } else { 0.0 })
}

cfg_if::cfg_if! {
    if #[cfg(feature = "rayon")] {
        use rayon::iter::{IntoParallelRefIterator, ParallelIterator};

        /// 每批同时存活的占有率场个数.
        #[inline]
        fn batch_len() -> usize {
            rayon::current_num_threads().max(1)
        }

        /// 借助 `rayon`, 并行地为每个 ID 计算占有率场. 结果与 `ids` 同序.
        fn label_fields<F>(ids: &[LabelId], field_of: &F) -> Vec<(LabelId, Array3<f32>)>
        where
            F: Fn(LabelId) -> Array3<f32> + Sync + Send,
        {
            ids.par_iter().map(|&id| (id, field_of(id))).collect()
        }

        /// 把一个占有率场并入当前结果.
        fn fold_field(
            out: &mut Array3<LabelId>,
            best: &mut Array3<f32>,
            field: &Array3<f32>,
            id: LabelId,
        ) {
            Zip::from(out)
                .and(best)
                .and(field)
                .par_for_each(|o, b, &f| claim(o, b, f, id));
        }
    } else {
        #[inline]
        fn batch_len() -> usize {
            1
        }

        /// 依次为每个 ID 计算占有率场. 结果与 `ids` 同序.
        fn label_fields<F>(ids: &[LabelId], field_of: &F) -> Vec<(LabelId, Array3<f32>)>
        where
            F: Fn(LabelId) -> Array3<f32> + Sync + Send,
        {
            ids.iter().map(|&id| (id, field_of(id))).collect()
        }

        /// 把一个占有率场并入当前结果.
        fn fold_field(
            out: &mut Array3<LabelId>,
            best: &mut Array3<f32>,
            field: &Array3<f32>,
            id: LabelId,
        ) {
            Zip::from(out)
                .and(best)
                .and(field)
                .for_each(|o, b, &f| claim(o, b, f, id));
        }
    }
}

/// 严格大于: 平局保留较小 ID.
#[inline]
fn claim(o: &mut LabelId, b: &mut f32, f: f32, id: LabelId) {
    if f > *b {
        *b = f;
        *o = id;
    }
}

/// 按模块文档中的规则重组逐标签占有率场.
///
/// `ids` 必须升序排列; `field_of(id)` 返回的场形状必须都等于 `shape`.
/// 场按批计算, 每批最多 `rayon` 线程数个, 并入结果后即释放.
/// 无论是否启用 `rayon`, 结果都完全一致: 归约始终按 ID 升序进行, 每个体素只依赖自身.
pub(crate) fn recombine<F>(
    shape: (usize, usize, usize),
    ids: &[LabelId],
    thresh: f32,
    field_of: F,
) -> Array3<LabelId>
where
    F: Fn(LabelId) -> Array3<f32> + Sync + Send,
{
    debug_assert!(ids.windows(2).all(|w| w[0] < w[1]));

    let mut best = Array3::<f32>::from_elem(shape, thresh);
    let mut out = Array3::<LabelId>::from_elem(shape, BACKGROUND);
    for batch in ids.chunks(batch_len()) {
        for (id, field) in label_fields(batch, &field_of) {
            debug_assert_eq!(field.dim(), shape);
            fold_field(&mut out, &mut best, &field, id);
        }
    }
    out
}
