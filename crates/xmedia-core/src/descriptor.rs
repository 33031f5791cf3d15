//! 编解码描述符.
//!
//! 与运行时无关的编解码参数集合, 在解码端由输入流填充, 在编码端应用到
//! 输出流与编码器上下文. 未设置的字段为 `None`, 应用时只写入已设置的字段.
//! 媒体类型决定哪一组字段有意义.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::channel_layout::ChannelLayout;
use crate::codec_id::CodecId;
use crate::error::{XMediaError, XMediaResult};
use crate::media_type::MediaType;
use crate::pixel_format::PixelFormat;
use crate::rational::Rational;
use crate::sample_format::SampleFormat;

/// 运行时要求的 extradata 尾部填充字节数 (`AV_INPUT_BUFFER_PADDING_SIZE`)
pub const EXTRADATA_PADDING: usize = 64;

/// 视频缩放策略
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ScalePolicy {
    /// 不指定
    None,
    /// 直接拉伸到目标尺寸
    #[default]
    Stretch,
    /// 保持宽高比, 黑边填充
    Aspect,
}

impl ScalePolicy {
    /// 策略名称
    pub const fn name(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Stretch => "stretch",
            Self::Aspect => "aspect",
        }
    }
}

impl fmt::Display for ScalePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ScalePolicy {
    type Err = XMediaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "stretch" => Ok(Self::Stretch),
            "aspect" => Ok(Self::Aspect),
            "none" => Ok(Self::None),
            _ => Err(XMediaError::InvalidArgument(format!("未知缩放策略: {s}"))),
        }
    }
}

/// 带运行时填充的 extradata 缓冲区
///
/// 缓冲区末尾保留 [`EXTRADATA_PADDING`] 个零字节, `len()` 只计有效部分.
#[derive(Clone, PartialEq, Eq)]
pub struct Extradata {
    buf: Vec<u8>,
    size: usize,
}

impl Extradata {
    /// 复制数据并追加零填充
    pub fn new(data: &[u8]) -> Self {
        let mut buf = Vec::with_capacity(data.len() + EXTRADATA_PADDING);
        buf.extend_from_slice(data);
        buf.resize(data.len() + EXTRADATA_PADDING, 0);
        Self {
            buf,
            size: data.len(),
        }
    }

    /// 有效数据 (不含填充)
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf[..self.size]
    }

    /// 含填充的完整缓冲区
    pub fn padded(&self) -> &[u8] {
        &self.buf
    }

    /// 有效数据长度
    pub fn len(&self) -> usize {
        self.size
    }

    /// 是否为空
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }
}

impl fmt::Debug for Extradata {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Extradata").field("size", &self.size).finish()
    }
}

/// 编解码描述符
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CodecDescriptor {
    /// 媒体类型
    pub media_type: MediaType,
    /// 编解码器
    pub codec_id: CodecId,
    /// 时间基
    pub time_base: Option<Rational>,
    /// 码率 (bit/s)
    pub bit_rate: Option<i64>,
    /// 每帧采样数 (音频)
    pub frame_size: Option<i32>,
    /// 编码档次
    pub profile: Option<i32>,
    /// 压缩级别
    pub compression_level: Option<i32>,

    /// 像素格式
    pub pixel_format: Option<PixelFormat>,
    /// 缩放策略
    pub scale_policy: ScalePolicy,
    /// 采样宽高比
    pub aspect_ratio: Option<Rational>,
    /// 帧率
    pub frame_rate: Option<Rational>,
    /// 宽度
    pub width: Option<u32>,
    /// 高度
    pub height: Option<u32>,

    /// 采样格式
    pub sample_format: Option<SampleFormat>,
    /// 采样率
    pub sample_rate: Option<u32>,
    /// 声道布局
    pub channel_layout: Option<ChannelLayout>,
    /// 每采样位数
    pub bits_per_sample: Option<u32>,

    /// 编解码器私有数据 (SPS/PPS、OpusHead 等)
    pub extradata: Option<Extradata>,
}

impl CodecDescriptor {
    /// 创建指定媒体类型与编解码器的空描述符
    pub fn new(media_type: MediaType, codec_id: CodecId) -> Self {
        Self {
            media_type,
            codec_id,
            ..Self::default()
        }
    }

    /// 视频描述符
    pub fn video(codec_id: CodecId, width: u32, height: u32, pixel_format: PixelFormat) -> Self {
        Self {
            width: Some(width),
            height: Some(height),
            pixel_format: Some(pixel_format),
            ..Self::new(MediaType::Video, codec_id)
        }
    }

    /// 音频描述符
    pub fn audio(
        codec_id: CodecId,
        sample_rate: u32,
        channels: u32,
        sample_format: SampleFormat,
    ) -> Self {
        Self {
            sample_rate: Some(sample_rate),
            sample_format: Some(sample_format),
            channel_layout: Some(ChannelLayout::default_for(channels)),
            ..Self::new(MediaType::Audio, codec_id)
        }
    }

    /// 声道数
    pub fn channels(&self) -> Option<u32> {
        self.channel_layout.map(|l| l.channels)
    }

    /// 按声道数设置默认声道布局
    pub fn set_channels(&mut self, channels: u32) {
        self.channel_layout = Some(ChannelLayout::default_for(channels));
    }

    /// 设置 extradata (复制并填充)
    pub fn set_extradata(&mut self, data: &[u8]) {
        self.extradata = (!data.is_empty()).then(|| Extradata::new(data));
    }

    /// 取走 extradata, 本描述符的槽位随之清空
    pub fn take_extradata(&mut self) -> Option<Extradata> {
        self.extradata.take()
    }

    /// 单行摘要, 用于日志
    pub fn dump_str(&self) -> String {
        let specific = match self.media_type {
            MediaType::Audio => format!(
                "fmt({}), chan({}), sr({}), bps({})",
                self.sample_format.map_or("unknown", |f| f.name()),
                opt_num(self.channels()),
                opt_num(self.sample_rate),
                opt_num(self.bits_per_sample),
            ),
            MediaType::Video => format!(
                "fmt({}), size({}x{}), ar({}), fr({})",
                self.pixel_format.map_or("unknown", |f| f.name()),
                opt_num(self.width),
                opt_num(self.height),
                opt_ratio(self.aspect_ratio, ':'),
                opt_ratio(self.frame_rate, '.'),
            ),
            _ => String::new(),
        };
        format!(
            "type({}), codec({}), {}, tb({})",
            self.media_type,
            self.codec_id,
            specific,
            opt_ratio(self.time_base, '.'),
        )
    }

    /// 序列化为 JSON
    pub fn to_json(&self, pretty: bool) -> XMediaResult<String> {
        let repr = DescriptorJson::from(self);
        let json = if pretty {
            serde_json::to_string_pretty(&repr)?
        } else {
            serde_json::to_string(&repr)?
        };
        Ok(json)
    }

    /// 从 JSON 解析, 只读取与媒体类型相关的字段
    pub fn from_json(json: &str) -> XMediaResult<Self> {
        let repr: DescriptorJson = serde_json::from_str(json)?;
        repr.into_descriptor()
    }
}

fn opt_num<T: fmt::Display>(v: Option<T>) -> String {
    v.map_or_else(|| "-1".to_string(), |v| v.to_string())
}

fn opt_ratio(r: Option<Rational>, sep: char) -> String {
    r.map_or_else(|| format!("-1{sep}-1"), |r| format!("{}{sep}{}", r.num, r.den))
}

/// JSON 表示, 键名与外部工具约定一致
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DescriptorJson {
    media_type: String,
    codec_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    time_base: Option<Rational>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    compress_level: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    frame_size: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    bit_rate: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    profile: Option<i32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    sample_fmt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    bits_per_sample: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    sample_rate: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    channels: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    scale_fmt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pix_fmt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    aspect_ratio: Option<Rational>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    frame_rate: Option<Rational>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    size: Option<[u32; 2]>,
}

impl From<&CodecDescriptor> for DescriptorJson {
    fn from(d: &CodecDescriptor) -> Self {
        let mut repr = Self {
            media_type: d.media_type.name().to_string(),
            codec_id: d.codec_id.name().to_string(),
            time_base: d.time_base,
            compress_level: d.compression_level,
            frame_size: d.frame_size,
            bit_rate: d.bit_rate,
            profile: d.profile,
            ..Self::default()
        };

        match d.media_type {
            MediaType::Audio => {
                repr.sample_fmt = d.sample_format.map(|f| f.name().to_string());
                repr.bits_per_sample = d.bits_per_sample;
                repr.sample_rate = d.sample_rate;
                repr.channels = d.channels();
            }
            MediaType::Video => {
                repr.scale_fmt = Some(d.scale_policy.name().to_string());
                repr.pix_fmt = d.pixel_format.map(|f| f.name().to_string());
                repr.aspect_ratio = d.aspect_ratio;
                repr.frame_rate = d.frame_rate;
                repr.size = d.width.zip(d.height).map(|(w, h)| [w, h]);
            }
            _ => {}
        }
        repr
    }
}

impl DescriptorJson {
    fn into_descriptor(self) -> XMediaResult<CodecDescriptor> {
        let media_type = MediaType::from_name(&self.media_type);
        let codec_id = self.codec_id.parse::<CodecId>()?;

        let mut d = CodecDescriptor {
            time_base: self.time_base,
            compression_level: self.compress_level,
            frame_size: self.frame_size,
            bit_rate: self.bit_rate,
            profile: self.profile,
            ..CodecDescriptor::new(media_type, codec_id)
        };

        match media_type {
            MediaType::Audio => {
                d.sample_format = self.sample_fmt.as_deref().map(str::parse).transpose()?;
                d.bits_per_sample = self.bits_per_sample;
                d.sample_rate = self.sample_rate;
                if let Some(n) = self.channels {
                    d.set_channels(n);
                }
            }
            MediaType::Video => {
                d.pixel_format = self.pix_fmt.as_deref().map(str::parse).transpose()?;
                if let Some(policy) = self.scale_fmt.as_deref() {
                    d.scale_policy = policy.parse()?;
                }
                d.aspect_ratio = self.aspect_ratio;
                d.frame_rate = self.frame_rate;
                if let Some([w, h]) = self.size {
                    d.width = Some(w);
                    d.height = Some(h);
                }
            }
            _ => {}
        }
        Ok(d)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_video() -> CodecDescriptor {
        let mut d = CodecDescriptor::video(CodecId::H264, 1280, 720, PixelFormat::Yuv420p);
        d.time_base = Some(Rational::new(1, 25));
        d.frame_rate = Some(Rational::new(25, 1));
        d.aspect_ratio = Some(Rational::new(1, 1));
        d.bit_rate = Some(2_000_000);
        d.scale_policy = ScalePolicy::Aspect;
        d
    }

    #[test]
    fn test_extradata_padding_and_take() {
        let mut d = CodecDescriptor::new(MediaType::Video, CodecId::H264);
        d.set_extradata(&[1, 2, 3]);
        let extra = d.take_extradata().unwrap();
        assert_eq!(extra.as_bytes(), &[1, 2, 3]);
        assert_eq!(extra.padded().len(), 3 + EXTRADATA_PADDING);
        assert!(d.extradata.is_none());
    }

    #[test]
    fn test_dump_str_video() {
        let s = sample_video().dump_str();
        assert_eq!(
            s,
            "type(video), codec(h264), fmt(yuv420p), size(1280x720), ar(1:1), fr(25.1), tb(1.25)"
        );
    }

    #[test]
    fn test_dump_str_audio() {
        let d = CodecDescriptor::audio(CodecId::Aac, 48000, 2, SampleFormat::F32p);
        assert_eq!(
            d.dump_str(),
            "type(audio), codec(aac), fmt(fltp), chan(2), sr(48000), bps(-1), tb(-1.-1)"
        );
    }

    #[test]
    fn test_json_roundtrip_video() {
        let d = sample_video();
        let json = d.to_json(false).unwrap();
        assert!(json.contains("\"size\":[1280,720]"));
        assert!(json.contains("\"scaleFmt\":\"aspect\""));
        let back = CodecDescriptor::from_json(&json).unwrap();
        assert_eq!(back, d);
    }

    #[test]
    fn test_json_roundtrip_audio() {
        let mut d = CodecDescriptor::audio(CodecId::Opus, 48000, 2, SampleFormat::S16);
        d.time_base = Some(Rational::new(1, 48000));
        d.frame_size = Some(960);
        let back = CodecDescriptor::from_json(&d.to_json(true).unwrap()).unwrap();
        assert_eq!(back, d);
    }

    #[test]
    fn test_json_reads_only_relevant_subset() {
        let json = r#"{"mediaType":"audio","codecId":"aac","pixFmt":"yuv420p","sampleRate":44100,"channels":1}"#;
        let d = CodecDescriptor::from_json(json).unwrap();
        assert_eq!(d.pixel_format, None);
        assert_eq!(d.sample_rate, Some(44100));
        assert_eq!(d.channel_layout, Some(ChannelLayout::mono()));
    }

    #[test]
    fn test_json_unknown_codec_rejected() {
        let json = r#"{"mediaType":"video","codecId":"no_such_codec"}"#;
        assert!(CodecDescriptor::from_json(json).is_err());
    }

    #[test]
    fn test_scale_policy_parse() {
        assert_eq!("aspect".parse::<ScalePolicy>().unwrap(), ScalePolicy::Aspect);
        assert_eq!(ScalePolicy::default(), ScalePolicy::Stretch);
        assert!("fit".parse::<ScalePolicy>().is_err());
    }
}
