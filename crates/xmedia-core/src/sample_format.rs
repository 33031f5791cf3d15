//! 音频采样格式定义.
//!
//! 对标 FFmpeg 的 `AVSampleFormat`, 名称与 `av_get_sample_fmt_name` 一致.

use std::fmt;
use std::str::FromStr;

use crate::error::XMediaError;

/// 音频采样格式
///
/// - 交错 (Interleaved): 所有声道的采样点交替排列, 如 LRLRLR...
/// - 平面 (Planar): 每个声道独立存储, 如 LLL...RRR...
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SampleFormat {
    /// 无符号 8 位整数, 交错
    U8,
    /// 有符号 16 位整数, 交错
    S16,
    /// 有符号 32 位整数, 交错
    S32,
    /// 有符号 64 位整数, 交错
    S64,
    /// 32 位浮点, 交错
    F32,
    /// 64 位浮点, 交错
    F64,
    /// 无符号 8 位整数, 平面
    U8p,
    /// 有符号 16 位整数, 平面
    S16p,
    /// 有符号 32 位整数, 平面
    S32p,
    /// 有符号 64 位整数, 平面
    S64p,
    /// 32 位浮点, 平面
    F32p,
    /// 64 位浮点, 平面
    F64p,
}

impl SampleFormat {
    const ALL: &'static [Self] = &[
        Self::U8,
        Self::S16,
        Self::S32,
        Self::S64,
        Self::F32,
        Self::F64,
        Self::U8p,
        Self::S16p,
        Self::S32p,
        Self::S64p,
        Self::F32p,
        Self::F64p,
    ];

    /// 每个采样点占用的字节数
    pub const fn bytes_per_sample(&self) -> usize {
        match self {
            Self::U8 | Self::U8p => 1,
            Self::S16 | Self::S16p => 2,
            Self::S32 | Self::S32p | Self::F32 | Self::F32p => 4,
            Self::S64 | Self::S64p | Self::F64 | Self::F64p => 8,
        }
    }

    /// 是否为平面格式
    pub const fn is_planar(&self) -> bool {
        matches!(
            self,
            Self::U8p | Self::S16p | Self::S32p | Self::S64p | Self::F32p | Self::F64p
        )
    }

    /// FFmpeg 名称
    pub const fn name(&self) -> &'static str {
        match self {
            Self::U8 => "u8",
            Self::S16 => "s16",
            Self::S32 => "s32",
            Self::S64 => "s64",
            Self::F32 => "flt",
            Self::F64 => "dbl",
            Self::U8p => "u8p",
            Self::S16p => "s16p",
            Self::S32p => "s32p",
            Self::S64p => "s64p",
            Self::F32p => "fltp",
            Self::F64p => "dblp",
        }
    }

    /// 由 FFmpeg 名称查找
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|f| f.name() == name)
    }
}

impl fmt::Display for SampleFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SampleFormat {
    type Err = XMediaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s).ok_or_else(|| XMediaError::InvalidArgument(format!("未知采样格式: {s}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_format_names() {
        assert_eq!(SampleFormat::F32p.name(), "fltp");
        assert_eq!(SampleFormat::from_name("s16"), Some(SampleFormat::S16));
        assert_eq!(SampleFormat::from_name("f32"), None);
    }

    #[test]
    fn test_sample_format_layout() {
        assert_eq!(SampleFormat::S16.bytes_per_sample(), 2);
        assert_eq!(SampleFormat::F64p.bytes_per_sample(), 8);
        assert!(SampleFormat::S16p.is_planar());
        assert!(!SampleFormat::S16.is_planar());
    }
}
