//! 帧变换: 重采样、拉伸、等比缩放 (黑边)、黑色 YUV 帧与居中叠加.
//!
//! 每次调用独立创建并释放运行时的缩放/重采样上下文. 输出帧的 PTS 优先取
//! 参数中的值, 否则沿用输入帧; 视频还会沿用输入帧的 `pkt_dts`.

use std::os::raw::c_int;
use std::ptr;

use ffmpeg_next::ffi;
use ffmpeg_next::frame;
use ffmpeg_next::software::scaling;
use log::debug;
use xmedia_core::frame_params::{AudioFrameInfo, VideoFrameInfo};
use xmedia_core::{
    ChannelLayout, FrameParams, MediaType, PixelFormat, ScalePolicy, XMediaError, XMediaResult,
};
use xmedia_scale::plane::{BLACK_CHROMA, BLACK_LUMA};
use xmedia_scale::{Letterbox, PlaneMut, PlaneRef, overlay_plane};

use crate::codec::{read_channel_layout, write_channel_layout};
use crate::convert;

/// 解码得到或待编码的帧
pub enum MediaFrame {
    /// 视频帧
    Video(frame::Video),
    /// 音频帧
    Audio(frame::Audio),
}

impl MediaFrame {
    /// 按媒体类型创建空帧
    pub fn empty(media_type: MediaType) -> Option<Self> {
        match media_type {
            MediaType::Video => Some(Self::Video(frame::Video::empty())),
            MediaType::Audio => Some(Self::Audio(frame::Audio::empty())),
            _ => None,
        }
    }

    /// 媒体类型
    pub fn media_type(&self) -> MediaType {
        match self {
            Self::Video(_) => MediaType::Video,
            Self::Audio(_) => MediaType::Audio,
        }
    }

    /// 显示时间戳
    pub fn pts(&self) -> Option<i64> {
        match self {
            Self::Video(f) => f.pts(),
            Self::Audio(f) => f.pts(),
        }
    }

    /// 设置显示时间戳
    pub fn set_pts(&mut self, pts: Option<i64>) {
        match self {
            Self::Video(f) => f.set_pts(pts),
            Self::Audio(f) => f.set_pts(pts),
        }
    }

    pub(crate) unsafe fn as_ptr(&self) -> *const ffi::AVFrame {
        unsafe {
            match self {
                Self::Video(f) => f.as_ptr(),
                Self::Audio(f) => f.as_ptr(),
            }
        }
    }

    pub(crate) unsafe fn as_mut_ptr(&mut self) -> *mut ffi::AVFrame {
        unsafe {
            match self {
                Self::Video(f) => f.as_mut_ptr(),
                Self::Audio(f) => f.as_mut_ptr(),
            }
        }
    }

    /// 释放帧数据, 保留帧对象以便复用
    pub fn unref(&mut self) {
        unsafe { ffi::av_frame_unref(self.as_mut_ptr()) };
    }
}

/// 视频帧几何信息
pub fn video_info(f: &frame::Video) -> VideoFrameInfo {
    let fmt = unsafe { (*f.as_ptr()).format };
    let ls = unsafe { (*f.as_ptr()).linesize };
    VideoFrameInfo {
        width: f.width(),
        height: f.height(),
        pixel_format: convert::pixel_from_raw(fmt),
        linesize: [0, 1, 2].map(|i| usize::try_from(ls[i]).unwrap_or(0)),
    }
}

/// 音频帧信息
pub fn audio_info(f: &frame::Audio) -> AudioFrameInfo {
    let (fmt, channels) = unsafe { ((*f.as_ptr()).format, (*f.as_ptr()).ch_layout.nb_channels) };
    AudioFrameInfo {
        sample_rate: f.rate(),
        sample_format: convert::sample_from_raw(fmt),
        channels: u32::try_from(channels).unwrap_or(0),
    }
}

/// 音频帧声道数
pub fn channel_count(f: &frame::Audio) -> u32 {
    audio_info(f).channels
}

/// 按声道数设置音频帧的默认声道布局
pub fn init_channels(f: &mut frame::Audio, channels: u32) {
    unsafe {
        write_channel_layout(
            &mut (*f.as_mut_ptr()).ch_layout,
            ChannelLayout::default_for(channels),
        )
    };
}

/// 音频帧声道布局
pub fn channel_layout(f: &frame::Audio) -> Option<ChannelLayout> {
    unsafe { read_channel_layout(&(*f.as_ptr()).ch_layout) }
}

fn av_check(ret: c_int, what: &str) -> XMediaResult<c_int> {
    if ret < 0 {
        Err(XMediaError::runtime(ret, what))
    } else {
        Ok(ret)
    }
}

fn dim(v: u32) -> c_int {
    c_int::try_from(v).unwrap_or(c_int::MAX)
}

/// 音频重采样
///
/// 需要参数中的采样格式、正的采样率与声道数. 输出采样数为
/// `ceil((delay + in.nb_samples) * dst_rate / src_rate)`, 只做一次转换.
pub fn resample(input: &frame::Audio, params: &FrameParams) -> XMediaResult<frame::Audio> {
    let sample_format = params
        .sample_format
        .ok_or_else(|| XMediaError::InvalidArgument("重采样缺少目标采样格式".into()))?;
    let (rate, channels) = match (params.sample_rate, params.channels) {
        (Some(r), Some(c)) if r > 0 && c > 0 => (r, c),
        (r, c) => {
            return Err(XMediaError::InvalidArgument(format!(
                "重采样参数无效: sr({}), ch({})",
                r.map_or(-1, i64::from),
                c.map_or(-1, i64::from)
            )));
        }
    };
    let dst_fmt = convert::sample_to_av(sample_format)?;
    let src_rate = input.rate();
    if src_rate == 0 {
        return Err(XMediaError::InvalidData("输入音频帧采样率为 0".into()));
    }

    let mut output = frame::Audio::empty();
    unsafe {
        let src = input.as_ptr();
        let dst = output.as_mut_ptr();
        write_channel_layout(&mut (*dst).ch_layout, ChannelLayout::default_for(channels));

        let mut swr: *mut ffi::SwrContext = ptr::null_mut();
        let ret = ffi::swr_alloc_set_opts2(
            &mut swr,
            &(*dst).ch_layout,
            dst_fmt,
            dim(rate),
            &(*src).ch_layout,
            std::mem::transmute::<c_int, ffi::AVSampleFormat>((*src).format),
            (*src).sample_rate,
            0,
            ptr::null_mut(),
        );
        av_check(ret, "创建重采样上下文失败")?;
        let result = (|| -> XMediaResult<()> {
            av_check(ffi::swr_init(swr), "初始化重采样上下文失败")?;

            let delay = ffi::swr_get_delay(swr, i64::from(src_rate));
            let nb_samples = ffi::av_rescale_rnd(
                delay + i64::from((*src).nb_samples),
                i64::from(rate),
                i64::from(src_rate),
                ffi::AVRounding::AV_ROUND_UP,
            );
            (*dst).nb_samples = c_int::try_from(nb_samples).unwrap_or(c_int::MAX);
            (*dst).format = dst_fmt as c_int;
            (*dst).sample_rate = dim(rate);
            (*dst).pts = params.pts.or(input.pts()).unwrap_or(ffi::AV_NOPTS_VALUE);
            av_check(ffi::av_frame_get_buffer(dst, 0), "分配音频帧缓冲区失败")?;

            debug!(
                "重采样: sr({} -> {rate}), ch({}), pts({})",
                src_rate,
                channels,
                (*dst).pts
            );
            let converted = ffi::swr_convert(
                swr,
                (*dst).data.as_mut_ptr(),
                (*dst).nb_samples,
                (*src).data.as_ptr() as *mut *const u8,
                (*src).nb_samples,
            );
            let converted = av_check(converted, "重采样失败")?;
            // 实际转换出的采样数可能少于预估
            (*dst).nb_samples = converted;
            Ok(())
        })();
        ffi::swr_free(&mut swr);
        result?;
    }
    Ok(output)
}

/// 拉伸缩放 (双三次)
pub fn stretch(input: &frame::Video, params: &FrameParams) -> XMediaResult<frame::Video> {
    let pixel_format = params
        .pixel_format
        .ok_or_else(|| XMediaError::InvalidArgument("缩放缺少目标像素格式".into()))?;
    let (width, height) = params
        .size()
        .ok_or_else(|| XMediaError::InvalidArgument("缩放目标尺寸无效".into()))?;
    let src_fmt = input.format();
    if src_fmt == ffmpeg_next::format::Pixel::None {
        return Err(XMediaError::InvalidData("输入视频帧像素格式未知".into()));
    }

    let mut scaler = scaling::Context::get(
        src_fmt,
        input.width(),
        input.height(),
        convert::pixel_to_next(pixel_format)?,
        width,
        height,
        scaling::Flags::BICUBIC,
    )
    .map_err(|e| XMediaError::runtime(i32::from(e), "创建缩放上下文失败"))?;

    let mut output = frame::Video::empty();
    scaler
        .run(input, &mut output)
        .map_err(|e| XMediaError::runtime(i32::from(e), "缩放视频帧失败"))?;
    output.set_pts(params.pts.or(input.pts()));
    unsafe { (*output.as_mut_ptr()).pkt_dts = (*input.as_ptr()).pkt_dts };

    debug!(
        "缩放: in({}x{}), out({width}x{height}), pts({:?})",
        input.width(),
        input.height(),
        output.pts()
    );
    Ok(output)
}

/// 等比缩放: 按比例适配后居中贴到黑底画布上, 输出固定为 YUV420P
pub fn aspect(input: &frame::Video, params: &FrameParams) -> XMediaResult<frame::Video> {
    if params.pixel_format.is_none() {
        return Err(XMediaError::InvalidArgument("缩放缺少目标像素格式".into()));
    }
    let (width, height) = params
        .size()
        .ok_or_else(|| XMediaError::InvalidArgument("缩放目标尺寸无效".into()))?;
    let fit = Letterbox::fit(input.width(), input.height(), width, height)?;
    if fit.is_full() {
        return stretch(input, params);
    }

    debug!(
        "保持宽高比: in({}x{}), fit({}x{}), out({width}x{height})",
        input.width(),
        input.height(),
        fit.width,
        fit.height
    );
    let fitted = stretch(
        input,
        &FrameParams {
            width: Some(fit.width),
            height: Some(fit.height),
            pixel_format: Some(PixelFormat::Yuv420p),
            ..params.clone()
        },
    )?;

    let mut canvas = black_yuv420(width, height, None)?;
    overlay_yuv420(&mut canvas, &fitted)?;
    canvas.set_pts(params.pts.or(input.pts()));
    unsafe { (*canvas.as_mut_ptr()).pkt_dts = (*input.as_ptr()).pkt_dts };
    Ok(canvas)
}

/// 按缩放策略分派到 [`stretch`] 或 [`aspect`]
pub fn scale(input: &frame::Video, params: &FrameParams) -> XMediaResult<frame::Video> {
    match params.scale_policy {
        ScalePolicy::Aspect => aspect(input, params),
        ScalePolicy::Stretch | ScalePolicy::None => stretch(input, params),
    }
}

fn yuv420_planes(width: u32, height: u32) -> [(usize, usize); 3] {
    let (w, h) = (width as usize, height as usize);
    [(w, h), (w / 2, h / 2), (w / 2, h / 2)]
}

fn new_yuv420(width: u32, height: u32) -> XMediaResult<frame::Video> {
    if width == 0 || height == 0 {
        return Err(XMediaError::InvalidArgument(format!(
            "YUV 帧尺寸无效: {width}x{height}"
        )));
    }
    Ok(frame::Video::new(
        ffmpeg_next::format::Pixel::YUV420P,
        width,
        height,
    ))
}

/// 黑色 YUV420P 帧: Y 为 0x00, U/V 为 0x80
pub fn black_yuv420(width: u32, height: u32, pts: Option<i64>) -> XMediaResult<frame::Video> {
    let mut out = new_yuv420(width, height)?;
    for (i, (w, h)) in yuv420_planes(width, height).into_iter().enumerate() {
        let stride = out.stride(i);
        let mut plane = PlaneMut::new(out.data_mut(i), stride, w, h)?;
        plane.fill(if i == 0 { BLACK_LUMA } else { BLACK_CHROMA });
    }
    out.set_pts(pts);
    Ok(out)
}

/// 把 `src` 居中叠加到 `dst` 上, 两者均须为 YUV420P
pub fn overlay_yuv420(dst: &mut frame::Video, src: &frame::Video) -> XMediaResult<()> {
    let yuv = ffmpeg_next::format::Pixel::YUV420P;
    if dst.format() != yuv || src.format() != yuv {
        return Err(XMediaError::InvalidArgument("叠加只支持 YUV420P".into()));
    }
    if src.width() > dst.width() || src.height() > dst.height() {
        return Err(XMediaError::InvalidArgument(format!(
            "叠加源大于目标: src({}x{}), dst({}x{})",
            src.width(),
            src.height(),
            dst.width(),
            dst.height()
        )));
    }
    let x = ((dst.width() - src.width()) / 2) as usize;
    let y = ((dst.height() - src.height()) / 2) as usize;
    let (dst_w, dst_h) = (dst.width(), dst.height());
    let src_planes = yuv420_planes(src.width(), src.height());
    let dst_planes = yuv420_planes(dst_w, dst_h);

    for i in 0..3 {
        let (sw, sh) = src_planes[i];
        let (dw, dh) = dst_planes[i];
        let (ox, oy) = if i == 0 { (x, y) } else { (x / 2, y / 2) };
        let src_plane = PlaneRef::new(src.data(i), src.stride(i), sw, sh)?;
        let stride = dst.stride(i);
        let mut dst_plane = PlaneMut::new(dst.data_mut(i), stride, dw, dh)?;
        overlay_plane(&mut dst_plane, &src_plane, ox, oy)?;
    }
    Ok(())
}

/// 由连续存储的 YUV420P 缓冲区创建帧, 长度必须为 `w*h + 2*(w*h/4)`
pub fn from_yuv420p(buf: &[u8], params: &FrameParams) -> XMediaResult<frame::Video> {
    let (width, height) = params
        .size()
        .ok_or_else(|| XMediaError::InvalidArgument("YUV 帧尺寸无效".into()))?;
    let (w, h) = (width as usize, height as usize);
    let expected = w * h + 2 * (w * h / 4);
    if buf.is_empty() || buf.len() != expected {
        return Err(XMediaError::InvalidArgument(format!(
            "YUV 缓冲区长度无效: expected({expected}), have({})",
            buf.len()
        )));
    }

    let mut out = new_yuv420(width, height)?;
    let mut offset = 0;
    for (i, (pw, ph)) in yuv420_planes(width, height).into_iter().enumerate() {
        let len = pw * ph;
        let src = PlaneRef::new(&buf[offset..offset + len], pw, pw, ph)?;
        offset += len;
        let stride = out.stride(i);
        let mut dst = PlaneMut::new(out.data_mut(i), stride, pw, ph)?;
        overlay_plane(&mut dst, &src, 0, 0)?;
    }
    out.set_pts(params.pts);
    Ok(out)
}

/// 由交错 S16 PCM 创建音频帧 (如外部解码得到的 Opus 数据)
pub fn from_s16(buf: &[u8], params: &FrameParams) -> XMediaResult<frame::Audio> {
    let (rate, channels) = match (params.sample_rate, params.channels) {
        (Some(r), Some(c)) if r > 0 && c > 0 => (r, c),
        _ => {
            return Err(XMediaError::InvalidArgument(
                "PCM 帧缺少采样率或声道数".into(),
            ));
        }
    };
    let frame_bytes = channels as usize * 2;
    let samples = buf.len() / frame_bytes;
    if samples == 0 {
        return Err(XMediaError::InvalidArgument("PCM 缓冲区为空".into()));
    }

    let mut out = frame::Audio::empty();
    unsafe {
        let f = out.as_mut_ptr();
        write_channel_layout(&mut (*f).ch_layout, ChannelLayout::default_for(channels));
        (*f).format = ffi::AVSampleFormat::AV_SAMPLE_FMT_S16 as c_int;
        (*f).sample_rate = dim(rate);
        (*f).nb_samples = c_int::try_from(samples).unwrap_or(c_int::MAX);
        av_check(ffi::av_frame_get_buffer(f, 0), "分配 PCM 帧缓冲区失败")?;
    }
    let used = samples * frame_bytes;
    out.data_mut(0)[..used].copy_from_slice(&buf[..used]);
    out.set_pts(params.pts);
    Ok(out)
}
