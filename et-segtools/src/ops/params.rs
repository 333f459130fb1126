//! 经过校验的算子参数.
//!
//! 在读取数据之前构建参数, 可以让非法参数尽早暴露.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use super::{check_positive, check_thresh};
use crate::data::Segmentation;
use crate::error::SegResult;

/// 重采样参数: 目标体素尺寸与重新二值化阈值.
///
/// 该结构是只读的. 若要修改参数, 你应该创建新的实例.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RescaleParams {
    voxel_size: f64,
    thresh: f64,
}

impl RescaleParams {
    /// `voxel_size` 必须为正, `thresh` 必须位于 (0, 1), 否则返回 `Err`.
    pub fn new(voxel_size: f64, thresh: f64) -> SegResult<Self> {
        check_positive("voxel_size", voxel_size)?;
        check_thresh("thresh", thresh)?;
        Ok(Self { voxel_size, thresh })
    }

    /// 目标体素尺寸.
    #[inline]
    pub fn voxel_size(&self) -> f64 {
        self.voxel_size
    }

    /// 重新二值化阈值.
    #[inline]
    pub fn thresh(&self) -> f64 {
        self.thresh
    }

    /// 就地重采样 `seg`.
    #[inline]
    pub fn apply(&self, seg: &mut Segmentation) -> SegResult<()> {
        seg.rescale(self.voxel_size, self.thresh)
    }
}

/// Gaussian 平滑参数.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct GaussianParams {
    sigma: f64,
    thresh: f64,
}

impl GaussianParams {
    /// `sigma` 必须为正, `thresh` 必须位于 (0, 1), 否则返回 `Err`.
    pub fn new(sigma: f64, thresh: f64) -> SegResult<Self> {
        check_positive("sigma", sigma)?;
        check_thresh("thresh", thresh)?;
        Ok(Self { sigma, thresh })
    }

    /// 以体素为单位的标准差.
    #[inline]
    pub fn sigma(&self) -> f64 {
        self.sigma
    }

    /// 重新二值化阈值.
    #[inline]
    pub fn thresh(&self) -> f64 {
        self.thresh
    }

    /// 就地平滑 `seg`.
    #[inline]
    pub fn apply(&self, seg: &mut Segmentation) -> SegResult<()> {
        seg.gaussian_smooth(self.sigma, self.thresh)
    }
}
