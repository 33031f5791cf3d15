//! 编解码器标识符.
//!
//! 对标 FFmpeg 的 `AVCodecID`, 名称与 `avcodec_get_name` 一致.
//! 常用编解码器有具名变体, 其余以 [`CodecId::Other`] 按运行时名称保存.

use std::fmt;
use std::str::FromStr;

use crate::error::XMediaError;
use crate::media_type::MediaType;

/// 编解码器标识符
///
/// 唯一标识一种编解码算法, 与容器格式无关.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[non_exhaustive]
pub enum CodecId {
    /// 未指定
    #[default]
    None,

    // ========================
    // 视频编解码器
    // ========================
    /// H.264 / AVC
    H264,
    /// H.265 / HEVC
    Hevc,
    /// VP8
    Vp8,
    /// VP9
    Vp9,
    /// AV1
    Av1,
    /// MPEG-1 Video
    Mpeg1Video,
    /// MPEG-2 Video
    Mpeg2Video,
    /// MPEG-4 Part 2
    Mpeg4,
    /// H.263
    H263,
    /// Theora
    Theora,
    /// Motion JPEG
    Mjpeg,
    /// PNG
    Png,
    /// Apple ProRes
    Prores,
    /// FFV1 无损
    Ffv1,
    /// 未压缩视频
    RawVideo,

    // ========================
    // 音频编解码器
    // ========================
    /// AAC
    Aac,
    /// MP3
    Mp3,
    /// MP2
    Mp2,
    /// Opus
    Opus,
    /// Vorbis
    Vorbis,
    /// FLAC
    Flac,
    /// Apple Lossless
    Alac,
    /// AC-3
    Ac3,
    /// E-AC-3
    Eac3,
    /// PCM 有符号 16 位小端
    PcmS16le,
    /// PCM 有符号 16 位大端
    PcmS16be,
    /// PCM 有符号 24 位小端
    PcmS24le,
    /// PCM 有符号 32 位小端
    PcmS32le,
    /// PCM 32 位浮点小端
    PcmF32le,
    /// PCM 无符号 8 位
    PcmU8,
    /// G.711 A-law
    PcmAlaw,
    /// G.711 mu-law
    PcmMulaw,

    /// 其他运行时编解码器, 按名称保存
    Other(CodecName),
}

/// 运行时编解码器名称, 定长内联存储
///
/// 只接受小写字母、数字与下划线, 最长 [`CodecName::CAPACITY`] 字节.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct CodecName {
    len: u8,
    buf: [u8; Self::CAPACITY],
}

impl CodecName {
    /// 名称最大长度
    pub const CAPACITY: usize = 32;

    /// 校验并保存名称
    pub fn new(name: &str) -> Option<Self> {
        let bytes = name.as_bytes();
        let valid = bytes
            .iter()
            .all(|&b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'_');
        if bytes.is_empty() || bytes.len() > Self::CAPACITY || !valid {
            return None;
        }
        let mut buf = [0u8; Self::CAPACITY];
        buf[..bytes.len()].copy_from_slice(bytes);
        Some(Self {
            len: bytes.len() as u8,
            buf,
        })
    }

    /// 名称字符串
    pub fn as_str(&self) -> &str {
        std::str::from_utf8(&self.buf[..self.len as usize]).unwrap_or_default()
    }
}

impl fmt::Debug for CodecName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.as_str())
    }
}

impl CodecId {
    const ALL: &'static [Self] = &[
        Self::None,
        Self::H264,
        Self::Hevc,
        Self::Vp8,
        Self::Vp9,
        Self::Av1,
        Self::Mpeg1Video,
        Self::Mpeg2Video,
        Self::Mpeg4,
        Self::H263,
        Self::Theora,
        Self::Mjpeg,
        Self::Png,
        Self::Prores,
        Self::Ffv1,
        Self::RawVideo,
        Self::Aac,
        Self::Mp3,
        Self::Mp2,
        Self::Opus,
        Self::Vorbis,
        Self::Flac,
        Self::Alac,
        Self::Ac3,
        Self::Eac3,
        Self::PcmS16le,
        Self::PcmS16be,
        Self::PcmS24le,
        Self::PcmS32le,
        Self::PcmF32le,
        Self::PcmU8,
        Self::PcmAlaw,
        Self::PcmMulaw,
    ];

    /// 编解码器对应的媒体类型
    pub const fn media_type(&self) -> MediaType {
        match self {
            Self::None => MediaType::Unknown,
            Self::H264
            | Self::Hevc
            | Self::Vp8
            | Self::Vp9
            | Self::Av1
            | Self::Mpeg1Video
            | Self::Mpeg2Video
            | Self::Mpeg4
            | Self::H263
            | Self::Theora
            | Self::Mjpeg
            | Self::Png
            | Self::Prores
            | Self::Ffv1
            | Self::RawVideo => MediaType::Video,
            Self::Other(_) => MediaType::Unknown,
            _ => MediaType::Audio,
        }
    }

    /// FFmpeg 名称
    pub fn name(&self) -> &str {
        match self {
            Self::None => "none",
            Self::H264 => "h264",
            Self::Hevc => "hevc",
            Self::Vp8 => "vp8",
            Self::Vp9 => "vp9",
            Self::Av1 => "av1",
            Self::Mpeg1Video => "mpeg1video",
            Self::Mpeg2Video => "mpeg2video",
            Self::Mpeg4 => "mpeg4",
            Self::H263 => "h263",
            Self::Theora => "theora",
            Self::Mjpeg => "mjpeg",
            Self::Png => "png",
            Self::Prores => "prores",
            Self::Ffv1 => "ffv1",
            Self::RawVideo => "rawvideo",
            Self::Aac => "aac",
            Self::Mp3 => "mp3",
            Self::Mp2 => "mp2",
            Self::Opus => "opus",
            Self::Vorbis => "vorbis",
            Self::Flac => "flac",
            Self::Alac => "alac",
            Self::Ac3 => "ac3",
            Self::Eac3 => "eac3",
            Self::PcmS16le => "pcm_s16le",
            Self::PcmS16be => "pcm_s16be",
            Self::PcmS24le => "pcm_s24le",
            Self::PcmS32le => "pcm_s32le",
            Self::PcmF32le => "pcm_f32le",
            Self::PcmU8 => "pcm_u8",
            Self::PcmAlaw => "pcm_alaw",
            Self::PcmMulaw => "pcm_mulaw",
            Self::Other(name) => name.as_str(),
        }
    }

    /// 由 FFmpeg 名称查找; "h265" 作为 "hevc" 的别名
    ///
    /// 未收录的合法名称返回 [`CodecId::Other`], 运行时是否支持在使用时才确定.
    pub fn from_name(name: &str) -> Option<Self> {
        if name == "h265" {
            return Some(Self::Hevc);
        }
        Self::ALL
            .iter()
            .copied()
            .find(|c| c.name() == name)
            .or_else(|| CodecName::new(name).map(Self::Other))
    }

    /// 是否为具名变体之外的编解码器
    pub fn is_other(&self) -> bool {
        matches!(self, Self::Other(_))
    }
}

impl fmt::Display for CodecId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for CodecId {
    type Err = XMediaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s).ok_or_else(|| XMediaError::CodecNotFound(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codec_names() {
        assert_eq!(CodecId::Hevc.name(), "hevc");
        assert_eq!(CodecId::from_name("h265"), Some(CodecId::Hevc));
        assert_eq!(CodecId::from_name("pcm_s16le"), Some(CodecId::PcmS16le));
        assert!("Bad Name".parse::<CodecId>().is_err());
        assert!("".parse::<CodecId>().is_err());
    }

    #[test]
    fn test_other_codecs_keep_name() {
        for name in ["dts", "truehd", "vc1", "wmav2", "adpcm_ima_wav", "amr_nb", "dvvideo"] {
            let id: CodecId = name.parse().unwrap();
            assert!(id.is_other());
            assert_eq!(id.name(), name);
            assert_eq!(id.to_string(), name);
        }
        assert_eq!(CodecId::from_name("dts"), CodecId::from_name("dts"));
        assert_ne!(CodecId::from_name("dts"), CodecId::from_name("truehd"));
        assert_eq!(CodecName::new(&"x".repeat(CodecName::CAPACITY + 1)), None);
    }

    #[test]
    fn test_codec_media_type() {
        assert_eq!(CodecId::H264.media_type(), MediaType::Video);
        assert_eq!(CodecId::Opus.media_type(), MediaType::Audio);
        assert_eq!(CodecId::None.media_type(), MediaType::Unknown);
        assert_eq!(CodecId::from_name("vc1").map(|c| c.media_type()), Some(MediaType::Unknown));
    }
}
