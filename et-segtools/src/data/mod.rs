use std::ops::Index;

use ndarray::{Array3, ArrayView2, ArrayView3, Axis};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::consts::{LabelId, BACKGROUND};
use crate::error::{SegError, SegResult};
use crate::{ops, Idx2d, Idx3d};

mod combine;
mod labels;

pub use combine::{binarize, combine_masks};
pub use labels::LabelMap;

/// 多标签三维分割体: 量化体 + 标签表 + 体素尺寸.
///
/// 量化体按 `(z, h, w)` (深度, 高, 宽) 组织, 每个体素为 0 (背景)
/// 或 `labels` 中某个已注册的 ID. 体素尺寸各向同性, 恒为正.
///
/// 构建后标签表不再改变; 变换操作只会替换量化体和体素尺寸.
/// 变换要么完整替换量化体, 要么返回 `Err` 且不修改任何数据.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(
    feature = "serde",
    serde(try_from = "RawSegmentation", into = "RawSegmentation")
)]
pub struct Segmentation {
    volume: Array3<LabelId>,
    labels: LabelMap,
    voxel_size: f64,
}

/// 未经校验的序列化形式. 反序列化时经由 [`Segmentation::new`] 检查.
#[cfg(feature = "serde")]
#[derive(Serialize, Deserialize)]
struct RawSegmentation {
    volume: Array3<LabelId>,
    labels: LabelMap,
    voxel_size: f64,
}

#[cfg(feature = "serde")]
impl TryFrom<RawSegmentation> for Segmentation {
    type Error = SegError;

    fn try_from(raw: RawSegmentation) -> Result<Self, Self::Error> {
        Self::new(raw.volume, raw.labels, raw.voxel_size)
    }
}

#[cfg(feature = "serde")]
impl From<Segmentation> for RawSegmentation {
    fn from(seg: Segmentation) -> Self {
        Self {
            volume: seg.volume,
            labels: seg.labels,
            voxel_size: seg.voxel_size,
        }
    }
}

impl Index<Idx3d> for Segmentation {
    type Output = LabelId;

    #[inline]
    fn index(&self, index: Idx3d) -> &Self::Output {
        &self.volume[index]
    }
}

impl Segmentation {
    /// 直接创建分割体.
    ///
    /// `voxel_size` 非正, 或 `volume` 中存在未在 `labels` 中注册的 ID 时返回 `Err`.
    pub fn new(volume: Array3<LabelId>, labels: LabelMap, voxel_size: f64) -> SegResult<Self> {
        ops::check_positive("voxel_size", voxel_size)?;
        if let Some(&stray) = volume.iter().find(|&&v| v > labels.max_id()) {
            return Err(SegError::invalid(
                "volume",
                format!(
                    "voxel value {stray} has no label, only {} labels are known",
                    labels.len()
                ),
            ));
        }
        Ok(Self {
            volume,
            labels,
            voxel_size,
        })
    }

    /// 由若干二值掩膜合并创建分割体. `masks[i]` 的标签名为 `names[i]`, ID 为 `i + 1`.
    ///
    /// 重叠体素的归属见 [`combine_masks`].
    pub fn from_masks<S: AsRef<str>>(
        masks: &[ArrayView3<'_, bool>],
        names: &[S],
        voxel_size: f64,
    ) -> SegResult<Self> {
        ops::check_positive("voxel_size", voxel_size)?;
        let (volume, labels) = combine_masks(masks, names)?;
        Ok(Self {
            volume,
            labels,
            voxel_size,
        })
    }

    /// 拆分为 `(量化体, 标签表, 体素尺寸)`.
    #[inline]
    pub fn into_parts(self) -> (Array3<LabelId>, LabelMap, f64) {
        (self.volume, self.labels, self.voxel_size)
    }

    /// 获得量化体的一份不可变 shallow copy.
    #[inline]
    pub fn volume(&self) -> ArrayView3<'_, LabelId> {
        self.volume.view()
    }

    /// 标签表.
    #[inline]
    pub fn labels(&self) -> &LabelMap {
        &self.labels
    }

    /// 按 ID 升序排列的标签名.
    #[inline]
    pub fn label_names(&self) -> &[String] {
        self.labels.names()
    }

    /// 体素边长.
    #[inline]
    pub fn voxel_size(&self) -> f64 {
        self.voxel_size
    }

    /// 量化体形状 `(z, h, w)`.
    #[inline]
    pub fn shape(&self) -> Idx3d {
        self.volume.dim()
    }

    /// 水平切片形状 `(h, w)`.
    #[inline]
    pub fn slice_shape(&self) -> Idx2d {
        let (_, h, w) = self.shape();
        (h, w)
    }

    /// 深度方向的切片个数.
    #[inline]
    pub fn len_z(&self) -> usize {
        self.shape().0
    }

    /// 体素总数.
    #[inline]
    pub fn size(&self) -> usize {
        self.volume.len()
    }

    /// 获取第 `z_index` 层切片视图. 越界时 panic.
    #[inline]
    pub fn slice_at(&self, z_index: usize) -> ArrayView2<'_, LabelId> {
        self.volume.index_axis(Axis(0), z_index)
    }

    /// 获取能按升序迭代深度切片的迭代器.
    #[inline]
    pub fn slice_iter(&self) -> impl ExactSizeIterator<Item = ArrayView2<'_, LabelId>> {
        self.volume.axis_iter(Axis(0))
    }

    /// 获取标签 `label_name` 的二值掩膜: 恰在 `volume == labels[label_name]` 处为 `true`.
    ///
    /// 标签不存在时返回 [`SegError::LabelNotFound`], 其中列出全部已知标签.
    pub fn mask_for(&self, label_name: &str) -> SegResult<Array3<bool>> {
        let id = self.labels.require(label_name)?;
        Ok(self.mask_for_id(id))
    }

    /// 获取 ID 为 `id` 的体素的二值掩膜.
    ///
    /// 不检查 `id` 是否已注册; 未使用的 ID 得到全 `false` 的掩膜.
    #[inline]
    pub fn mask_for_id(&self, id: LabelId) -> Array3<bool> {
        self.volume.map(|&v| v == id)
    }

    /// 获取值为 `id` 的体素个数.
    #[inline]
    pub fn count(&self, id: LabelId) -> usize {
        self.volume.iter().filter(|&&v| v == id).count()
    }

    /// 获取每个标签的体素个数, 按 ID 升序排列. 不统计背景.
    pub fn label_counts(&self) -> Vec<(String, usize)> {
        let mut counts = vec![0usize; self.labels.len() + 1];
        for &v in self.volume.iter() {
            counts[v as usize] += 1;
        }
        self.labels
            .iter()
            .map(|(name, id)| (name.to_owned(), counts[id as usize]))
            .collect()
    }

    /// 背景体素个数.
    #[inline]
    pub fn background_count(&self) -> usize {
        self.count(BACKGROUND)
    }
}

/// 就地变换.
impl Segmentation {
    /// 重采样到体素尺寸 `voxel_size`, 占有率超过 `thresh` 的体素重新归属对应标签.
    /// 成功后更新体素尺寸.
    ///
    /// `voxel_size` 非正或 `thresh` 不在 (0, 1) 内时返回 `Err`, 且不修改 `self`.
    pub fn rescale(&mut self, voxel_size: f64, thresh: f64) -> SegResult<()> {
        self.volume = ops::rescale(self.volume.view(), self.voxel_size, voxel_size, thresh)?;
        self.voxel_size = voxel_size;
        log::info!("rescaled to voxel size {voxel_size}, shape {:?}", self.shape());
        Ok(())
    }

    /// 先生长 `iterations` 轮, 再收缩 `iterations` 轮. 见 [`ops::morphological_smooth`].
    pub fn morphological_smooth(&mut self, iterations: u32) {
        self.volume = ops::morphological_smooth(self.volume.view(), iterations);
    }

    /// 逐标签 Gaussian 模糊后在 `thresh` 处重新二值化. 见 [`ops::gaussian_smooth`].
    ///
    /// `sigma` 非正或 `thresh` 不在 (0, 1) 内时返回 `Err`, 且不修改 `self`.
    pub fn gaussian_smooth(&mut self, sigma: f64, thresh: f64) -> SegResult<()> {
        self.volume = ops::gaussian_smooth(self.volume.view(), sigma, thresh)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{LabelMap, Segmentation};
    use crate::SegError;
    use ndarray::{s, Array3};

    /// 4x4x2 体, "a" 占上半部分, "b" 占下半部分.
    fn halves() -> Segmentation {
        let mut a = Array3::from_elem((2, 4, 4), false);
        let mut b = Array3::from_elem((2, 4, 4), false);
        a.slice_mut(s![.., ..2, ..]).fill(true);
        b.slice_mut(s![.., 2.., ..]).fill(true);
        Segmentation::from_masks(&[a.view(), b.view()], &["a", "b"], 1.0).unwrap()
    }

    #[test]
    fn test_from_masks_scenario() {
        let seg = halves();
        assert_eq!(seg.labels().id_of("a"), Some(1));
        assert_eq!(seg.labels().id_of("b"), Some(2));
        assert_eq!(seg.shape(), (2, 4, 4));
        for ((_, h, _), &v) in seg.volume().indexed_iter() {
            assert_eq!(v, if h < 2 { 1 } else { 2 });
        }
        assert_eq!(
            seg.label_counts(),
            vec![("a".to_string(), 16), ("b".to_string(), 16)]
        );
        assert_eq!(seg.background_count(), 0);
    }

    #[test]
    fn test_mask_for_every_label() {
        let mut seg = halves();
        seg.volume[(0, 0, 0)] = 0;
        for name in seg.label_names().to_vec() {
            let id = seg.labels().id_of(&name).unwrap();
            let mask = seg.mask_for(&name).unwrap();
            for (pos, &m) in mask.indexed_iter() {
                assert_eq!(m, seg[pos] == id);
            }
        }
    }

    #[test]
    fn test_mask_for_unknown_label() {
        let seg = halves();
        match seg.mask_for("c").unwrap_err() {
            SegError::LabelNotFound(name, known) => {
                assert_eq!(name, "c");
                assert_eq!(known, ["a", "b"]);
            }
            e => panic!("unexpected error {e:?}"),
        }
    }

    #[test]
    fn test_mask_for_unused_id() {
        let seg = halves();
        assert!(seg.mask_for_id(9).iter().all(|&m| !m));
        assert_eq!(seg.mask_for_id(0).iter().filter(|&&m| m).count(), 0);
    }

    #[test]
    fn test_new_checks_invariants() {
        let labels = LabelMap::from_names(["x"]).unwrap();
        let mut v = Array3::<u16>::zeros((1, 2, 2));
        assert!(Segmentation::new(v.clone(), labels.clone(), 1.0).is_ok());

        let e = Segmentation::new(v.clone(), labels.clone(), 0.0).unwrap_err();
        assert!(matches!(e, SegError::InvalidParameter { name: "voxel_size", .. }));

        v[(0, 1, 1)] = 2;
        let e = Segmentation::new(v, labels, 1.0).unwrap_err();
        assert!(matches!(e, SegError::InvalidParameter { name: "volume", .. }));
    }

    #[test]
    fn test_failed_transform_leaves_state() {
        let mut seg = halves();
        let before = seg.clone();
        assert!(seg.rescale(-1.0, 0.5).is_err());
        assert!(seg.rescale(2.0, 1.0).is_err());
        assert!(seg.gaussian_smooth(0.0, 0.5).is_err());
        assert_eq!(seg, before);
    }

    #[test]
    fn test_transforms_in_place() {
        let mut seg = halves();
        let before = seg.clone();

        seg.rescale(1.0, 0.5).unwrap();
        assert_eq!(seg, before);

        seg.morphological_smooth(0);
        assert_eq!(seg, before);

        seg.rescale(0.5, 0.5).unwrap();
        assert_eq!(seg.voxel_size(), 0.5);
        assert_eq!(seg.shape(), (4, 8, 8));
        assert_eq!(seg.labels(), before.labels());
        assert_eq!(seg[(0, 0, 0)], 1);
        assert_eq!(seg[(3, 7, 7)], 2);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_deserialize_checks_invariants() {
        let seg = halves();
        let json = serde_json::to_string(&seg).unwrap();
        let back: Segmentation = serde_json::from_str(&json).unwrap();
        assert_eq!(back, seg);

        let negative = r#"{"volume":{"v":1,"dim":[1,1,2],"data":[0,1]},"labels":["a"],"voxel_size":-3.0}"#;
        assert!(serde_json::from_str::<Segmentation>(negative).is_err());

        let stray = r#"{"volume":{"v":1,"dim":[1,1,2],"data":[0,9]},"labels":["a"],"voxel_size":1.0}"#;
        let e = serde_json::from_str::<Segmentation>(stray).unwrap_err();
        assert!(e.to_string().contains("voxel value 9 has no label"));
    }
}
