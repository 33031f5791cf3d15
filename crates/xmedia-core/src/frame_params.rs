//! 帧变换参数与变换决策.
//!
//! 编码前比较输入帧与目标参数, 决定是否需要缩放 (视频) 或重采样 (音频).

use crate::channel_layout::ChannelLayout;
use crate::descriptor::{CodecDescriptor, ScalePolicy};
use crate::media_type::MediaType;
use crate::pixel_format::PixelFormat;
use crate::sample_format::SampleFormat;

/// 帧变换目标参数
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameParams {
    /// 媒体类型
    pub media_type: MediaType,
    /// 目标输出流索引
    pub dst_index: Option<usize>,
    /// 输出帧 PTS, 未设置时沿用输入帧
    pub pts: Option<i64>,

    /// 目标像素格式
    pub pixel_format: Option<PixelFormat>,
    /// 缩放策略
    pub scale_policy: ScalePolicy,
    /// 目标宽度
    pub width: Option<u32>,
    /// 目标高度
    pub height: Option<u32>,

    /// 目标采样格式
    pub sample_format: Option<SampleFormat>,
    /// 目标采样率
    pub sample_rate: Option<u32>,
    /// 目标声道数
    pub channels: Option<u32>,
}

impl FrameParams {
    /// 由输出流描述符合成参数
    pub fn from_descriptor(desc: &CodecDescriptor, dst_index: usize) -> Self {
        let mut params = Self {
            media_type: desc.media_type,
            dst_index: Some(dst_index),
            ..Self::default()
        };
        match desc.media_type {
            MediaType::Video => {
                params.scale_policy = desc.scale_policy;
                params.pixel_format = desc.pixel_format;
                params.width = desc.width;
                params.height = desc.height;
            }
            MediaType::Audio => {
                params.sample_rate = desc.sample_rate;
                params.sample_format = desc.sample_format;
                params.channels = desc.channels();
            }
            _ => {}
        }
        params
    }

    /// 目标声道布局
    pub fn channel_layout(&self) -> Option<ChannelLayout> {
        self.channels.map(ChannelLayout::default_for)
    }

    /// 目标尺寸 (宽高均为正时)
    pub fn size(&self) -> Option<(u32, u32)> {
        match (self.width, self.height) {
            (Some(w), Some(h)) if w > 0 && h > 0 => Some((w, h)),
            _ => None,
        }
    }
}

/// 输入视频帧的几何信息
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VideoFrameInfo {
    /// 宽度
    pub width: u32,
    /// 高度
    pub height: u32,
    /// 像素格式, 未识别时为 `None`
    pub pixel_format: Option<PixelFormat>,
    /// 前三个平面的行字节数
    pub linesize: [usize; 3],
}

/// 视频缩放目标
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VideoTarget {
    /// 目标宽度
    pub width: u32,
    /// 目标高度
    pub height: u32,
    /// 目标像素格式, `None` 表示保持输入格式
    pub pixel_format: Option<PixelFormat>,
}

/// 判断视频帧是否需要缩放, 需要时返回目标
///
/// - 目标尺寸有效且与输入不同: 缩放到目标尺寸;
/// - 否则行字节数小于宽度 (或平面色度行小于半宽): 按原尺寸重新排布;
/// - 目标像素格式与输入不同: 转换格式.
pub fn plan_video(params: &FrameParams, frame: &VideoFrameInfo) -> Option<VideoTarget> {
    let mut target = VideoTarget {
        width: frame.width,
        height: frame.height,
        pixel_format: frame.pixel_format,
    };
    let mut rescale = false;

    let half = frame.width as usize / 2;
    let [ls0, ls1, ls2] = frame.linesize;
    match params.size() {
        Some((w, h)) if (w, h) != (frame.width, frame.height) => {
            target.width = w;
            target.height = h;
            rescale = true;
        }
        _ if frame.width as usize > ls0
            || (ls1 > 0 && half > ls1)
            || (ls2 > 0 && half > ls2) =>
        {
            rescale = true;
        }
        _ => {}
    }

    if let Some(fmt) = params.pixel_format {
        if Some(fmt) != frame.pixel_format {
            target.pixel_format = Some(fmt);
            rescale = true;
        }
    }

    rescale.then_some(target)
}

/// 输入音频帧信息
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioFrameInfo {
    /// 采样率
    pub sample_rate: u32,
    /// 采样格式
    pub sample_format: Option<SampleFormat>,
    /// 声道数
    pub channels: u32,
}

/// 音频重采样目标
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioTarget {
    /// 目标采样率
    pub sample_rate: u32,
    /// 目标采样格式, `None` 表示保持输入格式
    pub sample_format: Option<SampleFormat>,
    /// 目标声道数
    pub channels: u32,
}

/// 判断音频帧是否需要重采样: 采样率、采样格式、声道数任一不同即需要
pub fn plan_audio(params: &FrameParams, frame: &AudioFrameInfo) -> Option<AudioTarget> {
    let mut target = AudioTarget {
        sample_rate: frame.sample_rate,
        sample_format: frame.sample_format,
        channels: frame.channels,
    };
    let mut resample = false;

    if let Some(rate) = params.sample_rate.filter(|&r| r > 0) {
        if rate != frame.sample_rate {
            target.sample_rate = rate;
            resample = true;
        }
    }
    if let Some(fmt) = params.sample_format {
        if Some(fmt) != frame.sample_format {
            target.sample_format = Some(fmt);
            resample = true;
        }
    }
    if let Some(ch) = params.channels.filter(|&c| c > 0) {
        if ch != frame.channels {
            target.channels = ch;
            resample = true;
        }
    }

    resample.then_some(target)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CodecId;

    fn frame_720p() -> VideoFrameInfo {
        VideoFrameInfo {
            width: 1280,
            height: 720,
            pixel_format: Some(PixelFormat::Yuv420p),
            linesize: [1280, 640, 640],
        }
    }

    fn video_params(w: u32, h: u32, fmt: Option<PixelFormat>) -> FrameParams {
        FrameParams {
            media_type: MediaType::Video,
            width: Some(w),
            height: Some(h),
            pixel_format: fmt,
            ..FrameParams::default()
        }
    }

    #[test]
    fn test_video_same_geometry_skips() {
        let params = video_params(1280, 720, Some(PixelFormat::Yuv420p));
        assert_eq!(plan_video(&params, &frame_720p()), None);
    }

    #[test]
    fn test_video_resize() {
        let params = video_params(640, 360, None);
        let target = plan_video(&params, &frame_720p()).unwrap();
        assert_eq!((target.width, target.height), (640, 360));
        assert_eq!(target.pixel_format, Some(PixelFormat::Yuv420p));
    }

    #[test]
    fn test_video_pixel_format_change() {
        let params = video_params(1280, 720, Some(PixelFormat::Nv12));
        let target = plan_video(&params, &frame_720p()).unwrap();
        assert_eq!((target.width, target.height), (1280, 720));
        assert_eq!(target.pixel_format, Some(PixelFormat::Nv12));
    }

    #[test]
    fn test_video_short_linesize_forces_repack() {
        let mut frame = frame_720p();
        frame.linesize = [1280, 600, 640];
        let params = FrameParams {
            media_type: MediaType::Video,
            ..FrameParams::default()
        };
        let target = plan_video(&params, &frame).unwrap();
        assert_eq!((target.width, target.height), (1280, 720));
    }

    #[test]
    fn test_video_packed_format_not_repacked() {
        let frame = VideoFrameInfo {
            width: 320,
            height: 240,
            pixel_format: Some(PixelFormat::Rgb24),
            linesize: [960, 0, 0],
        };
        let params = video_params(320, 240, Some(PixelFormat::Rgb24));
        assert_eq!(plan_video(&params, &frame), None);
    }

    #[test]
    fn test_audio_plan() {
        let frame = AudioFrameInfo {
            sample_rate: 44100,
            sample_format: Some(SampleFormat::F32p),
            channels: 2,
        };
        let same = FrameParams {
            media_type: MediaType::Audio,
            sample_rate: Some(44100),
            sample_format: Some(SampleFormat::F32p),
            channels: Some(2),
            ..FrameParams::default()
        };
        assert_eq!(plan_audio(&same, &frame), None);

        let mono = FrameParams {
            channels: Some(1),
            ..same.clone()
        };
        let target = plan_audio(&mono, &frame).unwrap();
        assert_eq!(target.channels, 1);
        assert_eq!(target.sample_rate, 44100);
    }

    #[test]
    fn test_params_from_descriptor() {
        let mut desc = CodecDescriptor::video(CodecId::H264, 640, 360, PixelFormat::Yuv420p);
        desc.scale_policy = ScalePolicy::Aspect;
        let params = FrameParams::from_descriptor(&desc, 3);
        assert_eq!(params.dst_index, Some(3));
        assert_eq!(params.size(), Some((640, 360)));
        assert_eq!(params.scale_policy, ScalePolicy::Aspect);
        assert_eq!(params.sample_rate, None);

        let audio = CodecDescriptor::audio(CodecId::Aac, 48000, 2, SampleFormat::F32p);
        let params = FrameParams::from_descriptor(&audio, 1);
        assert_eq!(params.channels, Some(2));
        assert_eq!(params.channel_layout(), Some(ChannelLayout::stereo()));
    }
}
