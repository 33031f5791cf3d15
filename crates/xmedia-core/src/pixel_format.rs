//! 像素格式定义.
//!
//! 对标 FFmpeg 的 `AVPixelFormat`, 名称与 `av_get_pix_fmt_name` 一致,
//! 以便在运行时边界按名称互相转换.

use std::fmt;
use std::str::FromStr;

use crate::error::XMediaError;

/// 像素格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum PixelFormat {
    // ========================
    // 平面 YUV
    // ========================
    /// YUV 4:2:0 平面, 8 位
    Yuv420p,
    /// YUV 4:2:2 平面, 8 位
    Yuv422p,
    /// YUV 4:4:4 平面, 8 位
    Yuv444p,
    /// YUV 4:1:0 平面
    Yuv410p,
    /// YUV 4:1:1 平面
    Yuv411p,
    /// 全范围 YUV 4:2:0 (JPEG)
    Yuvj420p,
    /// 全范围 YUV 4:2:2 (JPEG)
    Yuvj422p,
    /// 全范围 YUV 4:4:4 (JPEG)
    Yuvj444p,
    /// 带 Alpha 的 YUV 4:2:0
    Yuva420p,
    /// YUV 4:2:0 平面, 10 位小端
    Yuv420p10le,
    /// YUV 4:2:2 平面, 10 位小端
    Yuv422p10le,
    /// YUV 4:4:4 平面, 10 位小端
    Yuv444p10le,

    // ========================
    // 半平面 / 打包 YUV
    // ========================
    /// Y 平面 + 交错 UV
    Nv12,
    /// Y 平面 + 交错 VU
    Nv21,
    /// 10 位半平面 4:2:0
    P010le,
    /// 打包 YUYV 4:2:2
    Yuyv422,
    /// 打包 UYVY 4:2:2
    Uyvy422,

    // ========================
    // RGB / 灰度
    // ========================
    /// 打包 RGB 8:8:8
    Rgb24,
    /// 打包 BGR 8:8:8
    Bgr24,
    /// 打包 RGBA
    Rgba,
    /// 打包 BGRA
    Bgra,
    /// 打包 ARGB
    Argb,
    /// 打包 ABGR
    Abgr,
    /// 8 位灰度
    Gray,
    /// 16 位灰度小端
    Gray16le,
}

impl PixelFormat {
    const ALL: &'static [Self] = &[
        Self::Yuv420p,
        Self::Yuv422p,
        Self::Yuv444p,
        Self::Yuv410p,
        Self::Yuv411p,
        Self::Yuvj420p,
        Self::Yuvj422p,
        Self::Yuvj444p,
        Self::Yuva420p,
        Self::Yuv420p10le,
        Self::Yuv422p10le,
        Self::Yuv444p10le,
        Self::Nv12,
        Self::Nv21,
        Self::P010le,
        Self::Yuyv422,
        Self::Uyvy422,
        Self::Rgb24,
        Self::Bgr24,
        Self::Rgba,
        Self::Bgra,
        Self::Argb,
        Self::Abgr,
        Self::Gray,
        Self::Gray16le,
    ];

    /// FFmpeg 名称
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Yuv420p => "yuv420p",
            Self::Yuv422p => "yuv422p",
            Self::Yuv444p => "yuv444p",
            Self::Yuv410p => "yuv410p",
            Self::Yuv411p => "yuv411p",
            Self::Yuvj420p => "yuvj420p",
            Self::Yuvj422p => "yuvj422p",
            Self::Yuvj444p => "yuvj444p",
            Self::Yuva420p => "yuva420p",
            Self::Yuv420p10le => "yuv420p10le",
            Self::Yuv422p10le => "yuv422p10le",
            Self::Yuv444p10le => "yuv444p10le",
            Self::Nv12 => "nv12",
            Self::Nv21 => "nv21",
            Self::P010le => "p010le",
            Self::Yuyv422 => "yuyv422",
            Self::Uyvy422 => "uyvy422",
            Self::Rgb24 => "rgb24",
            Self::Bgr24 => "bgr24",
            Self::Rgba => "rgba",
            Self::Bgra => "bgra",
            Self::Argb => "argb",
            Self::Abgr => "abgr",
            Self::Gray => "gray",
            Self::Gray16le => "gray16le",
        }
    }

    /// 由 FFmpeg 名称查找
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|f| f.name() == name)
    }

    /// 是否为 8 位平面 YUV 4:2:0 (可直接做黑底叠加)
    pub const fn is_yuv420_planar(&self) -> bool {
        matches!(self, Self::Yuv420p | Self::Yuvj420p)
    }
}

impl fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for PixelFormat {
    type Err = XMediaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s).ok_or_else(|| XMediaError::InvalidArgument(format!("未知像素格式: {s}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pixel_format_names() {
        assert_eq!(PixelFormat::Gray.name(), "gray");
        assert_eq!(PixelFormat::from_name("yuvj420p"), Some(PixelFormat::Yuvj420p));
        assert_eq!(PixelFormat::from_name("gray8"), None);
    }

    #[test]
    fn test_pixel_format_parse() {
        let fmt: PixelFormat = "nv12".parse().unwrap();
        assert_eq!(fmt, PixelFormat::Nv12);
        assert!("bogus".parse::<PixelFormat>().is_err());
        assert!(PixelFormat::Yuv420p.is_yuv420_planar());
        assert!(!PixelFormat::Nv12.is_yuv420_planar());
    }
}
