//! 🍇欢迎光临🍓
//!
//! 涵盖了本 crate 一系列常用的功能.

pub use crate::{Idx2d, Idx3d};

pub use crate::{LabelMap, SegError, SegResult, Segmentation};

pub use crate::consts::{LabelId, BACKGROUND};

pub use crate::io::{
    discover_labels, read_mask_folder, read_mrc, write_mask_folder, write_mrc, MaskLayout,
};

pub use crate::ops::{GaussianParams, RescaleParams};
