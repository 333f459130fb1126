//! 保持标签的三维形态学操作.
//!
//! 邻域为钻石型 (前后上下左右 6 个体素). 体外的邻居被忽略, 不视为背景,
//! 因此体的六个表面不会被收缩操作蚕食.

use ndarray::{Array3, ArrayView3, Zip};

use crate::consts::{LabelId, BACKGROUND};
use crate::Idx3d;

/// 获取 `pos` 前后上下左右六个点的坐标.
///
/// 在 `shape` 范围外的坐标会被过滤掉, 不会出现在返回值中.
#[inline]
fn diamond_neighbours((z0, h0, w0): Idx3d, (z, h, w): Idx3d) -> impl Iterator<Item = Idx3d> {
    [
        (z.wrapping_sub(1), h, w),
        (z.saturating_add(1), h, w),
        (z, h.wrapping_sub(1), w),
        (z, h.saturating_add(1), w),
        (z, h, w.wrapping_sub(1)),
        (z, h, w.saturating_add(1)),
    ]
    .into_iter()
    .filter(move |&(a, b, c)| a < z0 && b < h0 && c < w0)
}

cfg_if::cfg_if! {
    if #[cfg(feature = "rayon")] {
        /// 借助 `rayon`, 以 `src` 为快照并行计算每个体素的新值.
        fn map_voxels<F>(src: ArrayView3<'_, LabelId>, f: F) -> Array3<LabelId>
        where
            F: Fn(Idx3d, LabelId) -> LabelId + Sync + Send,
        {
            Zip::indexed(&src).par_map_collect(|pos, &v| f(pos, v))
        }
    } else {
        /// 以 `src` 为快照计算每个体素的新值.
        fn map_voxels<F>(src: ArrayView3<'_, LabelId>, f: F) -> Array3<LabelId>
        where
            F: Fn(Idx3d, LabelId) -> LabelId + Sync + Send,
        {
            Zip::indexed(&src).map_collect(|pos, &v| f(pos, v))
        }
    }
}

/// 单轮生长: 每个与前景相邻的背景体素取其邻居中最小的 ID.
pub fn grow(volume: ArrayView3<'_, LabelId>) -> Array3<LabelId> {
    let shape = volume.dim();
    map_voxels(volume, |pos, v| {
        if v != BACKGROUND {
            return v;
        }
        diamond_neighbours(shape, pos)
            .map(|p| volume[p])
            .filter(|&n| n != BACKGROUND)
            .min()
            .unwrap_or(BACKGROUND)
    })
}

/// 单轮收缩: 每个与背景相邻的前景体素变为背景. 不同标签之间的接触面保持不变.
pub fn shrink(volume: ArrayView3<'_, LabelId>) -> Array3<LabelId> {
    let shape = volume.dim();
    map_voxels(volume, |pos, v| {
        if v == BACKGROUND || diamond_neighbours(shape, pos).any(|p| volume[p] == BACKGROUND) {
            BACKGROUND
        } else {
            v
        }
    })
}

/// 形态学平滑: 先生长 `iterations` 轮, 再收缩 `iterations` 轮 (闭运算).
///
/// 可以填平小凹陷和小孔洞. `iterations` 越大, 间隙小于 `2 * iterations`
/// 的相邻区域越可能被连成一片.
pub fn morphological_smooth(volume: ArrayView3<'_, LabelId>, iterations: u32) -> Array3<LabelId> {
    log::debug!("morphological smoothing {:?}, {iterations} iterations", volume.dim());
    let mut cur = volume.to_owned();
    for _ in 0..iterations {
        cur = grow(cur.view());
    }
    for _ in 0..iterations {
        cur = shrink(cur.view());
    }
    cur
}
