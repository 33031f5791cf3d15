//! 媒体类型定义.
//!
//! 对标 FFmpeg 的 `AVMediaType`, 名称与 `av_get_media_type_string` 一致.

use std::fmt;

/// 媒体流类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum MediaType {
    /// 未知类型
    #[default]
    Unknown,
    /// 视频流
    Video,
    /// 音频流
    Audio,
    /// 字幕流
    Subtitle,
    /// 数据流 (如时间码)
    Data,
    /// 附件流 (如封面图片、字体)
    Attachment,
}

impl MediaType {
    /// FFmpeg 风格名称
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Video => "video",
            Self::Audio => "audio",
            Self::Subtitle => "subtitle",
            Self::Data => "data",
            Self::Attachment => "attachment",
        }
    }

    /// 由名称解析, 未识别的名称视为 `Unknown`
    pub fn from_name(name: &str) -> Self {
        match name {
            "video" => Self::Video,
            "audio" => Self::Audio,
            "subtitle" => Self::Subtitle,
            "data" => Self::Data,
            "attachment" => Self::Attachment,
            _ => Self::Unknown,
        }
    }

    /// 是否为流水线处理的媒体类型 (音频或视频)
    pub const fn is_av(&self) -> bool {
        matches!(self, Self::Video | Self::Audio)
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_media_type_name_roundtrip() {
        for t in [MediaType::Video, MediaType::Audio, MediaType::Subtitle] {
            assert_eq!(MediaType::from_name(t.name()), t);
        }
        assert_eq!(MediaType::from_name("bogus"), MediaType::Unknown);
        assert!(MediaType::Audio.is_av());
        assert!(!MediaType::Data.is_av());
    }
}
