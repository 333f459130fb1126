//! 通用常量.

/// 标签 ID 的存储类型. 0 保留为背景.
pub type LabelId = u16;

/// 背景 (未标注) 体素的 ID.
pub const BACKGROUND: LabelId = 0;

/// 单通道颜色.
pub mod gray {
    /// 掩膜图像中背景的像素值.
    pub const MASK_BACKGROUND: u8 = 0;

    /// 掩膜图像中前景的像素值. 读取时任何非零值都被视为前景.
    pub const MASK_FOREGROUND: u8 = 255;
}

/// 文件命名约定.
pub mod names {
    /// 掩膜目录下可选的合并量化文件名.
    pub const COMBINED_MRC: &str = "combined.mrc";

    /// 逐标签体数据文件的候选扩展名, 按探测顺序排列.
    pub const VOLUME_EXTENSIONS: [&str; 5] = ["tif", "tiff", "npy", "nii", "nii.gz"];

    /// 二维切片文件的候选扩展名.
    pub const SLICE_EXTENSIONS: [&str; 2] = ["tif", "tiff"];
}

/// TIFF 分辨率 (有理数) 的分子. 体素尺寸按 `1 / 10^4` 的精度保存.
pub const RESOLUTION_DENOM: u32 = 10_000;

/// MRC2014 格式常量.
pub mod mrc {
    /// 主头长度 (字节).
    pub const HEADER_LEN: usize = 1024;

    /// 标签名表的起始标记.
    pub const EXTTYP_LABELS: [u8; 4] = *b"SEGL";

    /// 主头中 `mode` 字段的字节偏移.
    pub const OFF_MODE: usize = 12;

    /// 主头中 `nsymbt` (扩展头长度) 字段的字节偏移.
    pub const OFF_NSYMBT: usize = 92;

    /// 主头中机器标识 (`machst`) 的字节偏移.
    pub const OFF_MACHST: usize = 212;

    /// 大端机器标识的首字节.
    pub const MACHST_BE: u8 = 0x11;

    /// 8 位有符号整数.
    pub const MODE_I8: i32 = 0;

    /// 16 位有符号整数.
    pub const MODE_I16: i32 = 1;

    /// 32 位浮点数.
    pub const MODE_F32: i32 = 2;

    /// 16 位无符号整数.
    pub const MODE_U16: i32 = 6;
}

/// Gaussian 卷积核截断倍数 (以 sigma 为单位).
pub const GAUSSIAN_TRUNCATE: f64 = 4.0;
