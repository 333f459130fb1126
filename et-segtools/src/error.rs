//! 运行时错误.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

use crate::Idx3d;

/// 本 crate 的通用返回类型.
pub type SegResult<T> = Result<T, SegError>;

/// 分割体构建, 变换与读写过程中可能出现的错误.
#[derive(Debug, Error)]
pub enum SegError {
    /// 待合并的掩膜 (或切片) 形状不一致.
    #[error("shape mismatch: expected {expected:?}, found {found:?} (`{name}`)")]
    ShapeMismatch {
        /// 第一个输入的形状.
        expected: Idx3d,
        /// 出问题的输入的形状.
        found: Idx3d,
        /// 出问题的输入对应的标签名.
        name: String,
    },

    /// 按名字查找标签失败. 第二个分量是目前已知的全部标签.
    #[error("label `{0}` not found, known labels: {1:?}")]
    LabelNotFound(String, Vec<String>),

    /// 参数越界, 例如阈值不在 (0, 1) 内或体素尺寸非正.
    #[error("invalid parameter `{name}`: {reason}")]
    InvalidParameter {
        /// 参数名.
        name: &'static str,
        /// 具体原因.
        reason: String,
    },

    /// 标签名重复.
    #[error("duplicate label name `{0}`")]
    DuplicateLabel(String),

    /// 输入为空 (如空掩膜列表, 空切片目录).
    #[error("empty input: {0}")]
    EmptyInput(String),

    /// 底层 I/O 错误.
    #[error("I/O error on `{path}`: {source}")]
    Io {
        /// 出错的文件或目录.
        path: PathBuf,
        /// 原始错误.
        #[source]
        source: io::Error,
    },

    /// 二维切片图像编解码错误.
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    /// 多页 TIFF 编解码错误.
    #[error("tiff error: {0}")]
    Tiff(#[from] tiff::TiffError),

    /// npy 文件读取错误.
    #[error("npy error: {0}")]
    Npy(#[from] ndarray_npy::ReadNpyError),

    /// nifti 文件读取错误.
    #[error("nifti error: {0}")]
    Nifti(#[from] nifti::NiftiError),

    /// 文件内容不符合格式约定 (损坏的 MRC 头, 不支持的数据类型等).
    #[error("malformed file `{path}`: {message}")]
    Format {
        /// 出错的文件.
        path: PathBuf,
        /// 具体原因.
        message: String,
    },
}

impl SegError {
    /// 构造 [`SegError::InvalidParameter`].
    #[inline]
    pub(crate) fn invalid(name: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            name,
            reason: reason.into(),
        }
    }

    /// 构造 [`SegError::Format`].
    #[inline]
    pub(crate) fn format(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Format {
            path: path.into(),
            message: message.into(),
        }
    }

    /// 返回一个把 `io::Error` 绑定到 `path` 上的闭包, 便于 `map_err`.
    #[inline]
    pub(crate) fn io_at(path: impl Into<PathBuf>) -> impl FnOnce(io::Error) -> Self {
        let path = path.into();
        move |source| Self::Io { path, source }
    }

    /// 该错误是否属于文件/目录层面的失败 (缺失, 损坏, 不可读).
    pub fn is_io_failure(&self) -> bool {
        matches!(
            self,
            Self::Io { .. }
                | Self::Image(_)
                | Self::Tiff(_)
                | Self::Npy(_)
                | Self::Nifti(_)
                | Self::Format { .. }
        )
    }
}
