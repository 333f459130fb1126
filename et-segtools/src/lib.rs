#![warn(missing_docs)] // <= 合适时移除它.
// #![warn(clippy::missing_docs_in_private_items)]  // <= too strict.

//! 核心库. 提供冷冻电镜断层成像 (cryo-ET) 多标签分割体的结构化表示, 读写与变换.
//!
//! 一个分割体 ([`Segmentation`]) 由三部分组成: 三维整数量化体, 标签名到正整数 ID 的双射,
//! 以及各向同性的体素尺寸. ID 0 恒为背景.
//!
//! 该 crate 目前仅提供 `safe` 接口.
//!
//! # 注意
//!
//! 1. 所有三维数据都按 `(z, h, w)` (深度, 高, 宽) 排列.
//! 2. 对用户输入, 程序总是返回 [`SegError`] 而不会 panic.
//!   仅在违反 API 前置条件时 (如切片索引越界) 才会 panic.
//!
//! # 开发计划
//!
//! ### 二值掩膜合并 ✅
//!
//! 多个同形状二值掩膜合并为一个量化体, 重叠体素归属 ID 最小的标签.
//!
//! 实现位于 `et-segtools/src/data/combine.rs`.
//!
//! ### MRC 单文件读写 ✅
//!
//! 标签名表存放在扩展头中, 体素尺寸存放在晶胞长度中.
//!
//! 实现位于 `et-segtools/src/io/mrc.rs`.
//!
//! ### 掩膜目录读写 ✅
//!
//! 1. 多页 TIFF / npy / nifti 单文件掩膜. ✅
//! 2. 二维切片序列 (Dragonfly 导出格式). ✅
//!
//! 实现位于 `et-segtools/src/io`.
//!
//! ### 按体素尺寸重采样 ✅
//!
//! 逐标签三线性插值占有率场, 再按阈值重新二值化. 从不直接插值 ID.
//!
//! 实现位于 `et-segtools/src/ops/resample.rs`.
//!
//! ### 形态学平滑 ✅
//!
//! 保持标签的生长 + 收缩 (闭运算), 6-邻域.
//!
//! 实现位于 `et-segtools/src/ops/morph.rs`.
//!
//! ### Gaussian 平滑 ✅
//!
//! 实现位于 `et-segtools/src/ops/gaussian.rs`.
//!
//! ### 各向异性体素尺寸 ⌛️
//!
//! 目前体素尺寸只有一个标量. MRC 头中三个方向的晶胞长度只取 `x` 方向.

/// 二维索引, 同时也可一定程度上用作非负整数向量.
pub type Idx2d = (usize, usize);

/// 三维索引, 同时也可一定程度上用作非负整数向量.
pub type Idx3d = (usize, usize, usize);

/// 分割体数据结构.
mod data;

pub use data::{binarize, combine_masks, LabelMap, Segmentation};

pub mod consts;

mod error;

pub use error::{SegError, SegResult};

pub mod io;

pub mod ops;

pub mod prelude;
