//! 分割体的文件读写.
//!
//! 1. 单文件量化体: MRC2014, 标签名表存放在扩展头中 ([`read_mrc`], [`write_mrc`]).
//! 2. 掩膜目录: 每个标签一个二值掩膜 ([`read_mask_folder`], [`write_mask_folder`]).
//!
//! 所有写操作都不是原子的: 中途失败会留下部分文件.

use std::path::Path;

use crate::data::Segmentation;
use crate::error::SegResult;

mod folder;
mod mrc;
mod slices;
mod volume;

pub use folder::{discover_labels, read_mask_folder, write_mask_folder, MaskLayout};
pub use mrc::{read_mrc, write_mrc};
pub use slices::{list_slices, read_slice_stack, write_slice_stack};
pub use volume::{
    read_nifti_mask, read_npy_mask, read_tiff_stack, read_tiff_voxel_size, read_volume_mask,
    write_tiff_stack,
};

impl Segmentation {
    /// 打开 MRC 文件, 标签名取自文件. 见 [`read_mrc`].
    #[inline]
    pub fn open_mrc<P: AsRef<Path>>(path: P) -> SegResult<Self> {
        read_mrc::<_, &str>(path, None)
    }

    /// 打开掩膜目录. 见 [`read_mask_folder`].
    #[inline]
    pub fn open_mask_folder<P, S>(dir: P, labels: &[S], voxel_size: f64) -> SegResult<Self>
    where
        P: AsRef<Path>,
        S: AsRef<str>,
    {
        read_mask_folder(dir, labels, voxel_size)
    }

    /// 存储为 MRC 文件. 见 [`write_mrc`].
    #[inline]
    pub fn save_mrc<P: AsRef<Path>>(&self, path: P) -> SegResult<()> {
        write_mrc(self, path)
    }

    /// 存储为掩膜目录. 见 [`write_mask_folder`].
    #[inline]
    pub fn save_mask_folder<P: AsRef<Path>>(
        &self,
        dir: P,
        layout: MaskLayout,
        also_write_combined: bool,
    ) -> SegResult<()> {
        write_mask_folder(self, dir, layout, also_write_combined)
    }
}
