//! XMedia 类型与 FFmpeg 运行时类型之间的转换.
//!
//! 像素格式、采样格式与编解码器 ID 均按运行时注册的名称互转,
//! 不依赖运行时枚举值在不同版本间保持稳定.

use std::ffi::{CStr, CString};
use std::os::raw::c_int;

use ffmpeg_next::ffi;
use xmedia_core::{
    CodecId, MediaType, PixelFormat, Rational, SampleFormat, XMediaError, XMediaResult,
};

/// 运行时状态码的文字描述
pub fn describe_code(code: i32) -> String {
    ffmpeg_next::Error::from(code).to_string()
}

/// 运行时 EAGAIN
pub fn eagain() -> c_int {
    ffi::AVERROR(ffi::EAGAIN)
}

/// 接收循环的正常结束码 (EAGAIN 或 EOF)
pub fn is_drained(code: c_int) -> bool {
    code == eagain() || code == ffi::AVERROR_EOF
}

pub(crate) fn cstring(s: &str) -> XMediaResult<CString> {
    CString::new(s).map_err(|_| XMediaError::InvalidArgument(format!("字符串包含 NUL: {s:?}")))
}

unsafe fn cstr_to_str<'a>(p: *const std::os::raw::c_char) -> Option<&'a str> {
    if p.is_null() {
        return None;
    }
    unsafe { CStr::from_ptr(p) }.to_str().ok()
}

/// 有理数转运行时表示
pub fn rational_to_av(r: Rational) -> ffi::AVRational {
    ffi::AVRational {
        num: r.num,
        den: r.den,
    }
}

/// 运行时有理数转 XMedia 表示
pub fn rational_from_av(r: ffi::AVRational) -> Rational {
    Rational::new(r.num, r.den)
}

/// 运行时 `Rational` 包装类型转 XMedia 表示
pub fn rational_from_next(r: ffmpeg_next::Rational) -> Rational {
    Rational::new(r.numerator(), r.denominator())
}

/// 媒体类型转运行时表示
pub fn media_type_to_av(t: MediaType) -> ffi::AVMediaType {
    match t {
        MediaType::Video => ffi::AVMediaType::AVMEDIA_TYPE_VIDEO,
        MediaType::Audio => ffi::AVMediaType::AVMEDIA_TYPE_AUDIO,
        MediaType::Subtitle => ffi::AVMediaType::AVMEDIA_TYPE_SUBTITLE,
        MediaType::Data => ffi::AVMediaType::AVMEDIA_TYPE_DATA,
        MediaType::Attachment => ffi::AVMediaType::AVMEDIA_TYPE_ATTACHMENT,
        MediaType::Unknown => ffi::AVMediaType::AVMEDIA_TYPE_UNKNOWN,
    }
}

/// 运行时媒体类型转 XMedia 表示
pub fn media_type_from_av(t: ffi::AVMediaType) -> MediaType {
    match t {
        ffi::AVMediaType::AVMEDIA_TYPE_VIDEO => MediaType::Video,
        ffi::AVMediaType::AVMEDIA_TYPE_AUDIO => MediaType::Audio,
        ffi::AVMediaType::AVMEDIA_TYPE_SUBTITLE => MediaType::Subtitle,
        ffi::AVMediaType::AVMEDIA_TYPE_DATA => MediaType::Data,
        ffi::AVMediaType::AVMEDIA_TYPE_ATTACHMENT => MediaType::Attachment,
        _ => MediaType::Unknown,
    }
}

/// 像素格式转运行时表示
pub fn pixel_to_av(fmt: PixelFormat) -> XMediaResult<ffi::AVPixelFormat> {
    let name = cstring(fmt.name())?;
    let av = unsafe { ffi::av_get_pix_fmt(name.as_ptr()) };
    if av == ffi::AVPixelFormat::AV_PIX_FMT_NONE {
        return Err(XMediaError::Unsupported(format!("运行时不支持像素格式: {fmt}")));
    }
    Ok(av)
}

/// 运行时像素格式转 XMedia 表示, 未识别时返回 `None`
pub fn pixel_from_av(fmt: ffi::AVPixelFormat) -> Option<PixelFormat> {
    if fmt == ffi::AVPixelFormat::AV_PIX_FMT_NONE {
        return None;
    }
    let name = unsafe { cstr_to_str(ffi::av_get_pix_fmt_name(fmt)) }?;
    PixelFormat::from_name(name)
}

/// 以整数保存的运行时像素格式 (如 `AVCodecParameters.format`)
pub fn pixel_from_raw(raw: c_int) -> Option<PixelFormat> {
    if raw < 0 {
        return None;
    }
    // 取值来自运行时自身, 是合法的枚举值
    let fmt: ffi::AVPixelFormat = unsafe { std::mem::transmute(raw) };
    pixel_from_av(fmt)
}

/// 像素格式转 `ffmpeg_next` 包装类型
pub fn pixel_to_next(fmt: PixelFormat) -> XMediaResult<ffmpeg_next::format::Pixel> {
    pixel_to_av(fmt).map(ffmpeg_next::format::Pixel::from)
}

/// 采样格式转运行时表示
pub fn sample_to_av(fmt: SampleFormat) -> XMediaResult<ffi::AVSampleFormat> {
    let name = cstring(fmt.name())?;
    let av = unsafe { ffi::av_get_sample_fmt(name.as_ptr()) };
    if av == ffi::AVSampleFormat::AV_SAMPLE_FMT_NONE {
        return Err(XMediaError::Unsupported(format!("运行时不支持采样格式: {fmt}")));
    }
    Ok(av)
}

/// 运行时采样格式转 XMedia 表示
pub fn sample_from_av(fmt: ffi::AVSampleFormat) -> Option<SampleFormat> {
    if fmt == ffi::AVSampleFormat::AV_SAMPLE_FMT_NONE {
        return None;
    }
    let name = unsafe { cstr_to_str(ffi::av_get_sample_fmt_name(fmt)) }?;
    SampleFormat::from_name(name)
}

/// 以整数保存的运行时采样格式
pub fn sample_from_raw(raw: c_int) -> Option<SampleFormat> {
    if raw < 0 {
        return None;
    }
    let fmt: ffi::AVSampleFormat = unsafe { std::mem::transmute(raw) };
    sample_from_av(fmt)
}

/// 编解码器 ID 转运行时表示
pub fn codec_to_av(id: CodecId) -> XMediaResult<ffi::AVCodecID> {
    if id == CodecId::None {
        return Err(XMediaError::InvalidArgument("未指定编解码器".into()));
    }
    let name = cstring(id.name())?;
    let desc = unsafe { ffi::avcodec_descriptor_get_by_name(name.as_ptr()) };
    if desc.is_null() {
        return Err(XMediaError::CodecNotFound(id.name().to_string()));
    }
    Ok(unsafe { (*desc).id })
}

/// 运行时编解码器 ID 转 XMedia 表示
///
/// 未收录为具名变体的编解码器以 [`CodecId::Other`] 保存运行时名称,
/// 可经 [`codec_to_av`] 无损转回; 运行时不认识的 ID 返回 [`CodecId::None`].
pub fn codec_from_av(id: ffi::AVCodecID) -> CodecId {
    let desc = unsafe { ffi::avcodec_descriptor_get(id) };
    if desc.is_null() {
        return CodecId::None;
    }
    unsafe { cstr_to_str((*desc).name) }
        .and_then(CodecId::from_name)
        .unwrap_or(CodecId::None)
}

/// 按运行时注册表解析编解码器名称, 运行时不认识的名称报错
pub fn resolve_codec(name: &str) -> XMediaResult<CodecId> {
    let id = CodecId::from_name(name)
        .ok_or_else(|| XMediaError::CodecNotFound(name.to_string()))?;
    codec_to_av(id).map(codec_from_av)
}
