//! 流水线配置.
//!
//! [`TranscodeOptions`] 可由 JSON (camelCase 字段) 加载, 也可由命令行逐项填写.
//! 编解码器、像素/采样格式等以名称保存, 打开流水线前由
//! [`TranscodeOptions::overrides`] 统一校验并解析.

use std::path::Path;

use serde::{Deserialize, Serialize};
use xmedia_core::{
    CodecDescriptor, CodecId, MediaType, PixelFormat, Rational, SampleFormat, ScalePolicy,
    TsMode, XMediaError, XMediaResult,
};
use xmedia_format::{DEFAULT_IO_BUFFER_SIZE, convert};

/// 流水线选项
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TranscodeOptions {
    /// 输入 URL
    pub input: String,
    /// 输入格式名
    pub input_format: Option<String>,
    /// 输出 URL
    pub output: String,
    /// 输出格式名
    pub output_format: Option<String>,

    /// 视频编解码器名
    pub video_codec: Option<String>,
    /// 像素格式名
    pub pixel_format: Option<String>,
    /// 缩放策略 (stretch / aspect)
    pub scale_policy: String,
    /// 输出宽度
    pub width: Option<u32>,
    /// 输出高度
    pub height: Option<u32>,
    /// 帧率, `num:den`
    pub frame_rate: Option<String>,

    /// 音频编解码器名
    pub audio_codec: Option<String>,
    /// 采样格式名
    pub sample_format: Option<String>,
    /// 采样率
    pub sample_rate: Option<u32>,
    /// 声道数
    pub channels: Option<u32>,

    /// 自定义 I/O 缓冲区大小
    pub io_buffer_size: usize,
    /// 通过自定义 I/O 写出
    pub custom_io: bool,
    /// 时间戳策略
    pub ts_mode: TsMode,
    /// 单调性修正增量, 0 表示关闭
    pub ts_fix: i64,
    /// 只转封装
    pub remux: bool,
    /// 输入结束后从头循环
    #[serde(rename = "loop")]
    pub looping: bool,
    /// 调试输出
    pub debug: bool,
    /// 元数据文件
    pub metadata_file: Option<String>,
}

impl Default for TranscodeOptions {
    fn default() -> Self {
        Self {
            input: String::new(),
            input_format: None,
            output: String::new(),
            output_format: None,
            video_codec: None,
            pixel_format: None,
            scale_policy: ScalePolicy::Aspect.name().to_string(),
            width: None,
            height: None,
            frame_rate: None,
            audio_codec: None,
            sample_format: None,
            sample_rate: None,
            channels: None,
            io_buffer_size: DEFAULT_IO_BUFFER_SIZE,
            custom_io: false,
            ts_mode: TsMode::Rescale,
            ts_fix: 0,
            remux: false,
            looping: false,
            debug: false,
            metadata_file: None,
        }
    }
}

impl TranscodeOptions {
    /// 从 JSON 文件加载
    pub fn load_json(path: impl AsRef<Path>) -> XMediaResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    /// 校验输入输出并解析全部覆盖项
    pub fn overrides(&self) -> XMediaResult<StreamOverrides> {
        if self.input.is_empty() {
            return Err(XMediaError::InvalidArgument("缺少输入".into()));
        }
        if self.output.is_empty() {
            return Err(XMediaError::InvalidArgument("缺少输出".into()));
        }
        let codec = |name: &Option<String>| -> XMediaResult<Option<CodecId>> {
            name.as_deref().map(convert::resolve_codec).transpose()
        };
        let scale_policy: ScalePolicy = self.scale_policy.parse()?;
        Ok(StreamOverrides {
            video_codec: codec(&self.video_codec)?,
            pixel_format: self
                .pixel_format
                .as_deref()
                .map(str::parse::<PixelFormat>)
                .transpose()?,
            scale_policy: (scale_policy != ScalePolicy::None).then_some(scale_policy),
            size: match (self.width, self.height) {
                (Some(w), Some(h)) if w > 0 && h > 0 => Some((w, h)),
                _ => None,
            },
            frame_rate: self.frame_rate.as_deref().map(parse_frame_rate).transpose()?,
            audio_codec: codec(&self.audio_codec)?,
            sample_format: self
                .sample_format
                .as_deref()
                .map(str::parse::<SampleFormat>)
                .transpose()?,
            sample_rate: self.sample_rate.filter(|&r| r > 0),
            channels: self.channels.filter(|&c| c > 0),
        })
    }

    /// 输出格式名, 未指定时取输出 URL 的扩展名
    pub fn output_format_name(&self) -> Option<String> {
        self.output_format.clone().or_else(|| {
            Path::new(&self.output)
                .extension()
                .and_then(|e| e.to_str())
                .map(str::to_ascii_lowercase)
        })
    }

    /// 自定义 I/O 输出时附加的复用器选项
    ///
    /// MP4 按关键帧分片并前置空 moov; MPEG-TS 只在开头写一次 PAT/SDT.
    pub fn custom_io_muxer_options(&self) -> Vec<(String, String)> {
        let Some(format) = self.output_format_name() else {
            return Vec::new();
        };
        if format.starts_with("mp4") {
            vec![("movflags".into(), "frag_keyframe+empty_moov".into())]
        } else if format.starts_with("mpegts") || format == "ts" {
            let period = (i32::MAX / 2 - 1).to_string();
            vec![
                ("sdt_period".into(), period.clone()),
                ("pat_period".into(), period),
            ]
        } else {
            Vec::new()
        }
    }
}

/// 解析 `num:den` 形式的帧率
pub fn parse_frame_rate(text: &str) -> XMediaResult<Rational> {
    let invalid = || XMediaError::InvalidArgument(format!("无效帧率: {text}"));
    let (num, den) = text.split_once(':').ok_or_else(invalid)?;
    let num: i32 = num.trim().parse().map_err(|_| invalid())?;
    let den: i32 = den.trim().parse().map_err(|_| invalid())?;
    if num <= 0 || den <= 0 {
        return Err(invalid());
    }
    Ok(Rational::new(num, den))
}

/// 已解析的输出流覆盖项
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StreamOverrides {
    /// 视频编解码器
    pub video_codec: Option<CodecId>,
    /// 像素格式
    pub pixel_format: Option<PixelFormat>,
    /// 缩放策略
    pub scale_policy: Option<ScalePolicy>,
    /// 输出尺寸
    pub size: Option<(u32, u32)>,
    /// 帧率
    pub frame_rate: Option<Rational>,
    /// 音频编解码器
    pub audio_codec: Option<CodecId>,
    /// 采样格式
    pub sample_format: Option<SampleFormat>,
    /// 采样率
    pub sample_rate: Option<u32>,
    /// 声道数
    pub channels: Option<u32>,
}

impl StreamOverrides {
    /// 把覆盖项应用到由源流复制来的描述符上 (转码时)
    ///
    /// extradata 与每帧采样数交给编码器重新生成; 更换编解码器时档次与
    /// 每采样位数一并清除. 音频时间基取采样率倒数, 视频指定帧率时取帧率倒数.
    pub fn apply(&self, desc: &mut CodecDescriptor) {
        desc.extradata = None;
        desc.frame_size = None;
        match desc.media_type {
            MediaType::Video => {
                if let Some(policy) = self.scale_policy {
                    desc.scale_policy = policy;
                }
                if let Some(id) = self.video_codec {
                    change_codec(desc, id);
                }
                if let Some(fmt) = self.pixel_format {
                    desc.pixel_format = Some(fmt);
                }
                if let Some((w, h)) = self.size {
                    desc.width = Some(w);
                    desc.height = Some(h);
                }
                if let Some(fr) = self.frame_rate {
                    desc.frame_rate = Some(fr);
                    desc.time_base = Some(fr.invert());
                }
            }
            MediaType::Audio => {
                if let Some(id) = self.audio_codec {
                    change_codec(desc, id);
                }
                if let Some(fmt) = self.sample_format {
                    desc.sample_format = Some(fmt);
                }
                if let Some(ch) = self.channels {
                    desc.set_channels(ch);
                }
                if let Some(rate) = self.sample_rate {
                    desc.sample_rate = Some(rate);
                }
                if let Some(rate) = desc.sample_rate.and_then(|r| i32::try_from(r).ok()) {
                    desc.time_base = Some(Rational::new(1, rate));
                }
            }
            _ => {}
        }
    }
}

fn change_codec(desc: &mut CodecDescriptor, id: CodecId) {
    if desc.codec_id != id {
        desc.codec_id = id;
        desc.profile = None;
        desc.bits_per_sample = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> TranscodeOptions {
        TranscodeOptions {
            input: "in.mkv".into(),
            output: "out.mp4".into(),
            ..TranscodeOptions::default()
        }
    }

    #[test]
    fn test_defaults() {
        let opts = TranscodeOptions::default();
        assert_eq!(opts.io_buffer_size, 65536);
        assert_eq!(opts.ts_mode, TsMode::Rescale);
        assert_eq!(opts.scale_policy, "aspect");
    }

    #[test]
    fn test_json_camel_case() {
        let json = r#"{
            "input": "a.mkv",
            "output": "b.ts",
            "videoCodec": "h264",
            "frameRate": "30000:1001",
            "ioBufferSize": 4096,
            "tsMode": "compute",
            "loop": true
        }"#;
        let opts: TranscodeOptions = serde_json::from_str(json).unwrap();
        assert_eq!(opts.video_codec.as_deref(), Some("h264"));
        assert_eq!(opts.io_buffer_size, 4096);
        assert_eq!(opts.ts_mode, TsMode::Compute);
        assert!(opts.looping);
        assert_eq!(opts.scale_policy, "aspect");
        let ov = opts.overrides().unwrap();
        assert_eq!(ov.frame_rate, Some(Rational::new(30000, 1001)));
        assert_eq!(ov.video_codec, Some(CodecId::H264));
    }

    #[test]
    fn test_overrides_reject_unknown_names() {
        let mut opts = base();
        opts.pixel_format = Some("yuv999".into());
        assert!(opts.overrides().is_err());

        let mut opts = base();
        opts.audio_codec = Some("nope".into());
        assert!(opts.overrides().is_err());

        let mut opts = base();
        opts.output.clear();
        assert!(opts.overrides().is_err());
    }

    #[test]
    fn test_overrides_accept_unlisted_runtime_codec() {
        let mut opts = base();
        opts.audio_codec = Some("adpcm_ima_wav".into());
        let ov = opts.overrides().unwrap();
        assert_eq!(ov.audio_codec.map(|c| c.to_string()).as_deref(), Some("adpcm_ima_wav"));
    }

    #[test]
    fn test_frame_rate_parse() {
        assert_eq!(parse_frame_rate("90000:3000").unwrap(), Rational::new(90000, 3000));
        assert!(parse_frame_rate("25").is_err());
        assert!(parse_frame_rate("0:1").is_err());
        assert!(parse_frame_rate("a:b").is_err());
    }

    #[test]
    fn test_size_requires_both() {
        let mut opts = base();
        opts.width = Some(640);
        assert_eq!(opts.overrides().unwrap().size, None);
        opts.height = Some(360);
        assert_eq!(opts.overrides().unwrap().size, Some((640, 360)));
    }

    #[test]
    fn test_apply_video_overrides() {
        let mut desc = CodecDescriptor::video(CodecId::Mpeg4, 1280, 720, PixelFormat::Yuv420p);
        desc.profile = Some(3);
        desc.set_extradata(&[1, 2, 3]);
        desc.time_base = Some(Rational::new(1, 90000));
        let ov = StreamOverrides {
            video_codec: Some(CodecId::H264),
            size: Some((640, 360)),
            frame_rate: Some(Rational::new(25, 1)),
            scale_policy: Some(ScalePolicy::Aspect),
            ..StreamOverrides::default()
        };
        ov.apply(&mut desc);
        assert_eq!(desc.codec_id, CodecId::H264);
        assert_eq!(desc.profile, None);
        assert!(desc.extradata.is_none());
        assert_eq!((desc.width, desc.height), (Some(640), Some(360)));
        assert_eq!(desc.time_base, Some(Rational::new(1, 25)));
        assert_eq!(desc.scale_policy, ScalePolicy::Aspect);
    }

    #[test]
    fn test_apply_audio_overrides() {
        let mut desc = CodecDescriptor::audio(CodecId::Aac, 48000, 2, SampleFormat::F32p);
        desc.profile = Some(1);
        let ov = StreamOverrides {
            sample_rate: Some(16000),
            channels: Some(1),
            ..StreamOverrides::default()
        };
        ov.apply(&mut desc);
        assert_eq!(desc.codec_id, CodecId::Aac);
        assert_eq!(desc.profile, Some(1));
        assert_eq!(desc.channels(), Some(1));
        assert_eq!(desc.time_base, Some(Rational::new(1, 16000)));
    }

    #[test]
    fn test_custom_io_muxer_options() {
        let mut opts = base();
        assert_eq!(
            opts.custom_io_muxer_options(),
            vec![("movflags".to_string(), "frag_keyframe+empty_moov".to_string())]
        );
        opts.output_format = Some("mpegts".into());
        let mux = opts.custom_io_muxer_options();
        assert_eq!(mux.len(), 2);
        assert_eq!(mux[0].1, "1073741822");
        opts.output_format = Some("matroska".into());
        assert!(opts.custom_io_muxer_options().is_empty());
    }
}
