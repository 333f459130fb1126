//! 二值掩膜合并.
//!
//! 将若干形状相同的二值掩膜合并为一个量化体, 并生成对应的 [`LabelMap`].
//!
//! # 重叠策略
//!
//! 若某体素被多个掩膜同时声明, 则 **ID 最小者胜出**, 即调用者给出的顺序中
//! 靠前的掩膜保留该体素. 该策略与 [`crate::ops`] 中占有率重组的平局规则一致.

use ndarray::{Array3, ArrayView3, Zip};

use crate::consts::{LabelId, BACKGROUND};
use crate::data::LabelMap;
use crate::error::{SegError, SegResult};

/// 合并 `masks` (与 `names` 一一对应) 为量化体. `masks[i]` 中非零的体素被标记为
/// ID `i + 1`.
///
/// 掩膜列表为空, 个数与名字个数不符, 形状不一致, 或名字重复时返回 `Err`.
pub fn combine_masks<S: AsRef<str>>(
    masks: &[ArrayView3<'_, bool>],
    names: &[S],
) -> SegResult<(Array3<LabelId>, LabelMap)> {
    let Some(first) = masks.first() else {
        return Err(SegError::EmptyInput("no masks to combine".into()));
    };
    if masks.len() != names.len() {
        return Err(SegError::invalid(
            "names",
            format!("{} masks but {} names", masks.len(), names.len()),
        ));
    }
    let labels = LabelMap::from_names(names.iter().map(|n| n.as_ref()))?;

    let expected = first.dim();
    for (mask, name) in masks.iter().zip(labels.names()) {
        let found = mask.dim();
        if found != expected {
            return Err(SegError::ShapeMismatch {
                expected,
                found,
                name: name.clone(),
            });
        }
    }

    let mut volume = Array3::<LabelId>::from_elem(first.raw_dim(), BACKGROUND);
    let mut contested = 0usize;

    // 逆序写入, 使 ID 较小者最后落笔.
    for (mask, id) in masks.iter().zip(labels.ids()).rev() {
        Zip::from(&mut volume).and(mask).for_each(|v, &m| {
            if m {
                if *v != BACKGROUND {
                    contested += 1;
                }
                *v = id;
            }
        });
    }

    if contested != 0 {
        log::warn!("{contested} voxel claims overlapped while combining masks, lowest ID kept");
    }
    log::debug!("combined {} masks of shape {expected:?}", masks.len());
    Ok((volume, labels))
}

/// 把任意数值掩膜二值化: 非零即前景.
pub fn binarize<T>(data: ArrayView3<'_, T>) -> Array3<bool>
where
    T: Copy + Default + PartialEq,
{
    let zero = T::default();
    data.map(|&v| v != zero)
}
