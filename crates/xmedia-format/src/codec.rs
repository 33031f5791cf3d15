//! 编解码描述符与运行时结构之间的读写.
//!
//! 写入方向只处理描述符中已设置的字段; extradata 以移动语义交给运行时,
//! 写入后描述符的 extradata 槽位为空.

use std::os::raw::c_int;
use std::ptr;

use ffmpeg_next::ffi;
use xmedia_core::descriptor::EXTRADATA_PADDING;
use xmedia_core::{
    ChannelLayout, CodecDescriptor, Extradata, MediaType, Rational, XMediaError, XMediaResult,
};

use crate::convert;

/// 把声道布局写入运行时布局结构
///
/// 掩码完整时按掩码建立原生顺序布局, 否则按声道数取默认布局.
pub(crate) unsafe fn write_channel_layout(dst: *mut ffi::AVChannelLayout, layout: ChannelLayout) {
    unsafe {
        ffi::av_channel_layout_uninit(dst);
        if !layout.has_mask() || ffi::av_channel_layout_from_mask(dst, layout.mask.bits()) < 0 {
            ffi::av_channel_layout_default(dst, layout.channels as c_int);
        }
    }
}

/// 读取运行时声道布局
pub(crate) unsafe fn read_channel_layout(src: *const ffi::AVChannelLayout) -> Option<ChannelLayout> {
    let layout = unsafe { &*src };
    if layout.nb_channels <= 0 {
        return None;
    }
    let channels = layout.nb_channels as u32;
    if layout.order == ffi::AVChannelOrder::AV_CHANNEL_ORDER_NATIVE {
        let from_mask = ChannelLayout::from_mask(unsafe { layout.u.mask });
        if from_mask.channels == channels {
            return Some(from_mask);
        }
    }
    Some(ChannelLayout::default_for(channels))
}

/// 用运行时分配器复制 extradata (含零填充)
unsafe fn write_extradata(
    slot: *mut *mut u8,
    size_slot: *mut c_int,
    extra: &Extradata,
) -> XMediaResult<()> {
    unsafe {
        if !(*slot).is_null() {
            ffi::av_freep(slot.cast());
            *size_slot = 0;
        }
        let buf = ffi::av_mallocz(extra.len() + EXTRADATA_PADDING) as *mut u8;
        if buf.is_null() {
            return Err(XMediaError::runtime(
                ffi::AVERROR(ffi::ENOMEM),
                "分配 extradata 失败",
            ));
        }
        ptr::copy_nonoverlapping(extra.as_bytes().as_ptr(), buf, extra.len());
        *slot = buf;
        *size_slot = extra.len() as c_int;
    }
    Ok(())
}

unsafe fn read_extradata(data: *const u8, size: c_int) -> Option<Extradata> {
    if data.is_null() || size <= 0 {
        return None;
    }
    let bytes = unsafe { std::slice::from_raw_parts(data, size as usize) };
    Some(Extradata::new(bytes))
}

fn dim(v: u32) -> c_int {
    c_int::try_from(v).unwrap_or(c_int::MAX)
}

fn valid(r: Option<Rational>) -> Option<ffi::AVRational> {
    r.filter(Rational::is_valid).map(convert::rational_to_av)
}

/// 把描述符写入编解码器上下文
pub unsafe fn apply_to_context(
    desc: &mut CodecDescriptor,
    ctx: *mut ffi::AVCodecContext,
) -> XMediaResult<()> {
    let c = unsafe { &mut *ctx };
    c.codec_type = convert::media_type_to_av(desc.media_type);
    c.codec_id = convert::codec_to_av(desc.codec_id)?;
    if let Some(tb) = valid(desc.time_base) {
        c.time_base = tb;
    }
    if let Some(v) = desc.bit_rate {
        c.bit_rate = v;
    }
    if let Some(v) = desc.frame_size {
        c.frame_size = v;
    }
    if let Some(v) = desc.profile {
        c.profile = v;
    }
    if let Some(v) = desc.compression_level {
        c.compression_level = v;
    }

    match desc.media_type {
        MediaType::Video => {
            if let Some(fmt) = desc.pixel_format {
                c.pix_fmt = convert::pixel_to_av(fmt)?;
            }
            if let Some(ar) = valid(desc.aspect_ratio) {
                c.sample_aspect_ratio = ar;
            }
            if let Some(fr) = valid(desc.frame_rate) {
                c.framerate = fr;
            }
            if let Some(w) = desc.width {
                c.width = dim(w);
            }
            if let Some(h) = desc.height {
                c.height = dim(h);
            }
        }
        MediaType::Audio => {
            if let Some(fmt) = desc.sample_format {
                c.sample_fmt = convert::sample_to_av(fmt)?;
            }
            if let Some(sr) = desc.sample_rate {
                c.sample_rate = dim(sr);
            }
            if let Some(layout) = desc.channel_layout {
                unsafe { write_channel_layout(&mut c.ch_layout, layout) };
            }
            if let Some(bps) = desc.bits_per_sample {
                c.bits_per_raw_sample = dim(bps);
            }
        }
        _ => {}
    }

    if let Some(extra) = desc.take_extradata() {
        unsafe { write_extradata(&mut c.extradata, &mut c.extradata_size, &extra)? };
    }
    Ok(())
}

/// 把描述符写入流参数 (仅复用, 不经过编码器)
pub unsafe fn apply_to_parameters(
    desc: &mut CodecDescriptor,
    par: *mut ffi::AVCodecParameters,
) -> XMediaResult<()> {
    let p = unsafe { &mut *par };
    p.codec_type = convert::media_type_to_av(desc.media_type);
    p.codec_id = convert::codec_to_av(desc.codec_id)?;
    if let Some(v) = desc.bit_rate {
        p.bit_rate = v;
    }
    if let Some(v) = desc.frame_size {
        p.frame_size = v;
    }
    if let Some(v) = desc.profile {
        p.profile = v;
    }

    match desc.media_type {
        MediaType::Video => {
            if let Some(fmt) = desc.pixel_format {
                p.format = convert::pixel_to_av(fmt)? as c_int;
            }
            if let Some(ar) = valid(desc.aspect_ratio) {
                p.sample_aspect_ratio = ar;
            }
            if let Some(w) = desc.width {
                p.width = dim(w);
            }
            if let Some(h) = desc.height {
                p.height = dim(h);
            }
        }
        MediaType::Audio => {
            if let Some(fmt) = desc.sample_format {
                p.format = convert::sample_to_av(fmt)? as c_int;
            }
            if let Some(sr) = desc.sample_rate {
                p.sample_rate = dim(sr);
            }
            if let Some(layout) = desc.channel_layout {
                unsafe { write_channel_layout(&mut p.ch_layout, layout) };
            }
            if let Some(bps) = desc.bits_per_sample {
                p.bits_per_coded_sample = dim(bps);
            }
        }
        _ => {}
    }

    if let Some(extra) = desc.take_extradata() {
        unsafe { write_extradata(&mut p.extradata, &mut p.extradata_size, &extra)? };
    }
    Ok(())
}

fn positive(v: c_int) -> Option<u32> {
    u32::try_from(v).ok().filter(|&v| v > 0)
}

fn rational_opt(r: ffi::AVRational) -> Option<Rational> {
    Some(convert::rational_from_av(r)).filter(Rational::is_valid)
}

/// 从流参数读取描述符 (含 extradata 副本)
pub unsafe fn descriptor_from_parameters(par: *const ffi::AVCodecParameters) -> CodecDescriptor {
    let p = unsafe { &*par };
    let media_type = convert::media_type_from_av(p.codec_type);
    let mut d = CodecDescriptor::new(media_type, convert::codec_from_av(p.codec_id));
    d.bit_rate = Some(p.bit_rate).filter(|&v| v > 0);
    d.frame_size = Some(p.frame_size).filter(|&v| v > 0);
    d.profile = Some(p.profile).filter(|&v| v >= 0);

    match media_type {
        MediaType::Video => {
            d.pixel_format = convert::pixel_from_raw(p.format);
            d.aspect_ratio = rational_opt(p.sample_aspect_ratio);
            d.width = positive(p.width);
            d.height = positive(p.height);
        }
        MediaType::Audio => {
            d.sample_format = convert::sample_from_raw(p.format);
            d.sample_rate = positive(p.sample_rate);
            d.channel_layout = unsafe { read_channel_layout(&p.ch_layout) };
            d.bits_per_sample = positive(p.bits_per_coded_sample);
        }
        _ => {}
    }
    d.extradata = unsafe { read_extradata(p.extradata, p.extradata_size) };
    d
}

/// 从已打开的编解码器上下文读取描述符
pub unsafe fn descriptor_from_context(ctx: *const ffi::AVCodecContext) -> CodecDescriptor {
    let c = unsafe { &*ctx };
    let media_type = convert::media_type_from_av(c.codec_type);
    let mut d = CodecDescriptor::new(media_type, convert::codec_from_av(c.codec_id));
    d.time_base = rational_opt(c.time_base);
    d.bit_rate = Some(c.bit_rate).filter(|&v| v > 0);
    d.frame_size = Some(c.frame_size).filter(|&v| v > 0);
    d.profile = Some(c.profile).filter(|&v| v >= 0);
    d.compression_level = Some(c.compression_level).filter(|&v| v >= 0);

    match media_type {
        MediaType::Video => {
            d.pixel_format = convert::pixel_from_av(c.pix_fmt);
            d.aspect_ratio = rational_opt(c.sample_aspect_ratio);
            d.frame_rate = rational_opt(c.framerate);
            d.width = positive(c.width);
            d.height = positive(c.height);
        }
        MediaType::Audio => {
            d.sample_format = convert::sample_from_av(c.sample_fmt);
            d.sample_rate = positive(c.sample_rate);
            d.channel_layout = unsafe { read_channel_layout(&c.ch_layout) };
            d.bits_per_sample = positive(c.bits_per_raw_sample);
        }
        _ => {}
    }
    d.extradata = unsafe { read_extradata(c.extradata, c.extradata_size) };
    d
}

#[cfg(test)]
mod tests {
    use super::*;
    use xmedia_core::{CodecId, PixelFormat, SampleFormat};

    #[test]
    fn test_apply_moves_extradata_into_parameters() {
        let mut desc = CodecDescriptor::video(CodecId::H264, 1280, 720, PixelFormat::Yuv420p);
        desc.set_extradata(&[0, 0, 0, 1, 0x67, 0x42]);
        unsafe {
            let mut par = ffi::avcodec_parameters_alloc();
            apply_to_parameters(&mut desc, par).unwrap();
            assert!(desc.extradata.is_none());
            assert_eq!((*par).width, 1280);
            assert_eq!((*par).extradata_size, 6);

            let back = descriptor_from_parameters(par);
            assert_eq!(back.codec_id, CodecId::H264);
            assert_eq!(back.pixel_format, Some(PixelFormat::Yuv420p));
            assert_eq!(back.extradata.unwrap().as_bytes(), &[0, 0, 0, 1, 0x67, 0x42]);
            ffi::avcodec_parameters_free(&mut par);
        }
    }

    #[test]
    fn test_audio_layout_round_trip() {
        let mut desc = CodecDescriptor::audio(CodecId::Aac, 48000, 2, SampleFormat::F32p);
        unsafe {
            let mut par = ffi::avcodec_parameters_alloc();
            apply_to_parameters(&mut desc, par).unwrap();
            let back = descriptor_from_parameters(par);
            assert_eq!(back.sample_rate, Some(48000));
            assert_eq!(back.channel_layout, Some(ChannelLayout::stereo()));
            assert_eq!(back.sample_format, Some(SampleFormat::F32p));
            ffi::avcodec_parameters_free(&mut par);
        }
    }
}
