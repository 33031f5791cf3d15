//! 解码器: 打开输入, 枚举音视频流并把解码后的帧交给回调.
//!
//! 使用流程:
//! 1. `open()` 打开容器, 为每个音视频流建立流记录与解码上下文
//! 2. 循环 `read_packet()` 读取数据包
//! 3. `decode_packet()` 把帧逐个交给回调, 或在转封装时直接转交编码器
//! 4. 输入结束后 `drain()` 取出解码器内残留的帧
//!
//! 只解封装 (`demux_only`) 时不建立解码上下文.

use std::os::raw::c_int;
use std::ptr;

use ffmpeg_next::codec;
use ffmpeg_next::ffi;
use ffmpeg_next::format::context::Input;
use ffmpeg_next::{Dictionary, Packet};
use log::debug;
use xmedia_core::{
    CodecDescriptor, MediaType, StatusReporter, StreamState, StreamTable, XMediaError,
    XMediaResult,
};

use crate::codec::{apply_to_context, descriptor_from_parameters};
use crate::convert;
use crate::frame::MediaFrame;
use crate::stream::StreamRecord;

/// 向后定位标志
pub const SEEK_BACKWARD: i32 = ffi::AVSEEK_FLAG_BACKWARD as i32;

/// 解码器
pub struct Decoder {
    status: StatusReporter,
    streams: StreamTable<StreamRecord>,
    input: Option<Input>,
    demux_only: bool,
    options: Vec<(String, String)>,
}

impl Decoder {
    /// 创建解码器
    pub fn new(status: StatusReporter) -> Self {
        Self {
            status,
            streams: StreamTable::new(),
            input: None,
            demux_only: false,
            options: Vec::new(),
        }
    }

    /// 只解封装, 不建立解码上下文
    pub fn set_demux_only(&mut self, demux_only: bool) {
        self.demux_only = demux_only;
    }

    /// 追加一条打开输入时的解封装选项
    pub fn set_option(&mut self, key: &str, value: &str) {
        self.options.push((key.to_string(), value.to_string()));
    }

    /// 打开输入并为每个音视频流建立流记录
    pub fn open(&mut self, url: &str, format_hint: Option<&str>) -> XMediaResult<()> {
        if self.input.is_some() {
            return Err(self.status.fail(XMediaError::Lifecycle("输入已打开".into())));
        }
        let c_url = convert::cstring(url)?;
        let ifmt = match format_hint {
            Some(hint) => {
                let c_hint = convert::cstring(hint)?;
                let f = unsafe { ffi::av_find_input_format(c_hint.as_ptr()) };
                if f.is_null() {
                    return Err(self.status.fail(XMediaError::InvalidArgument(format!(
                        "未知输入格式: {hint}"
                    ))));
                }
                f
            }
            None => ptr::null(),
        };

        let mut dict = Dictionary::new();
        for (k, v) in &self.options {
            dict.set(k, v);
        }
        let mut input = unsafe {
            let mut ps = ptr::null_mut();
            let mut opts = dict.disown();
            let ret = ffi::avformat_open_input(&mut ps, c_url.as_ptr(), ifmt as _, &mut opts);
            ffi::av_dict_free(&mut opts);
            if ret < 0 {
                return Err(self.status.runtime(ret, format!("无法打开输入: {url}")));
            }
            let input = Input::wrap(ps);
            let ret = ffi::avformat_find_stream_info(ps, ptr::null_mut());
            if ret < 0 {
                return Err(self.status.runtime(ret, format!("无法获取流信息: {url}")));
            }
            input
        };

        // 任一流失败时整体放弃, 已建立的流记录随之释放
        let count = unsafe { (*input.as_ptr()).nb_streams } as usize;
        let mut records = Vec::with_capacity(count);
        for index in 0..count {
            if let Some(record) = unsafe { self.open_stream_record(&mut input, index)? } {
                records.push(record);
            }
        }
        for record in records {
            self.status.debug(format!(
                "输入流 #{}: {}",
                record.state.src_index.unwrap_or_default(),
                record.descriptor().dump_str()
            ));
            self.streams.push(record);
        }
        debug!("已打开输入 {url}, 共 {} 条流", self.streams.len());
        self.input = Some(input);
        Ok(())
    }

    unsafe fn open_stream_record(
        &mut self,
        input: &mut Input,
        index: usize,
    ) -> XMediaResult<Option<StreamRecord>> {
        let ictx = unsafe { input.as_mut_ptr() };
        let st = unsafe { *(*ictx).streams.add(index) };
        let par = unsafe { (*st).codecpar };
        let media_type = convert::media_type_from_av(unsafe { (*par).codec_type });
        if !matches!(media_type, MediaType::Video | MediaType::Audio) {
            unsafe { (*st).discard = ffi::AVDiscard::AVDISCARD_ALL };
            return Ok(None);
        }

        let mut desc = unsafe { descriptor_from_parameters(par) };
        let tb = unsafe { (*st).time_base };
        desc.time_base = Some(convert::rational_from_av(tb)).filter(|r| r.is_valid());
        let mut frame_rate = ffi::AVRational { num: 0, den: 1 };
        if media_type == MediaType::Video {
            frame_rate = unsafe { ffi::av_guess_frame_rate(ictx, st, ptr::null_mut()) };
            desc.frame_rate = Some(convert::rational_from_av(frame_rate)).filter(|r| r.is_valid());
        }

        let mut record = StreamRecord::new(desc);
        record.state.src_index = Some(index);
        if self.demux_only {
            return Ok(Some(record));
        }

        unsafe {
            let dec = ffi::avcodec_find_decoder((*par).codec_id);
            if dec.is_null() {
                let name = record.descriptor().codec_id.name();
                return Err(self.status.fail(XMediaError::CodecNotFound(format!(
                    "流 #{index} 无可用解码器: {name}"
                ))));
            }
            let raw = ffi::avcodec_alloc_context3(dec);
            if raw.is_null() {
                return Err(self
                    .status
                    .runtime(ffi::AVERROR(ffi::ENOMEM), "分配解码上下文失败"));
            }
            let ctx = codec::Context::wrap(raw, None);
            let ret = ffi::avcodec_parameters_to_context(raw, par);
            if ret < 0 {
                return Err(self.status.runtime(ret, format!("流 #{index} 参数不适用")));
            }
            (*raw).pkt_timebase = tb;
            if media_type == MediaType::Video {
                (*raw).framerate = frame_rate;
            }
            // 输入上的 codec_whitelist 同样约束各流解码器
            let mut opts: *mut ffi::AVDictionary = ptr::null_mut();
            if !(*ictx).codec_whitelist.is_null() {
                ffi::av_dict_set(
                    &mut opts,
                    c"codec_whitelist".as_ptr(),
                    (*ictx).codec_whitelist,
                    0,
                );
            }
            let ret = ffi::avcodec_open2(raw, dec, &mut opts);
            ffi::av_dict_free(&mut opts);
            if ret < 0 {
                return Err(self.status.runtime(ret, format!("无法打开流 #{index} 的解码器")));
            }
            record.attach_codec(ctx);
        }
        record.state.codec_open = true;
        Ok(Some(record))
    }

    /// 以描述符建立一路独立解码流 (裸码流输入), 返回分配的源索引
    pub fn open_codec(&mut self, descriptor: &CodecDescriptor) -> XMediaResult<usize> {
        let src = self.streams.next_src_index();
        let mut applied = descriptor.clone();
        unsafe {
            let id = convert::codec_to_av(descriptor.codec_id).map_err(|e| self.status.fail(e))?;
            let dec = ffi::avcodec_find_decoder(id);
            if dec.is_null() {
                return Err(self.status.fail(XMediaError::CodecNotFound(
                    descriptor.codec_id.name().to_string(),
                )));
            }
            let raw = ffi::avcodec_alloc_context3(dec);
            if raw.is_null() {
                return Err(self
                    .status
                    .runtime(ffi::AVERROR(ffi::ENOMEM), "分配解码上下文失败"));
            }
            let ctx = codec::Context::wrap(raw, None);
            apply_to_context(&mut applied, raw).map_err(|e| self.status.fail(e))?;
            if let Some(tb) = descriptor.time_base.filter(|r| r.is_valid()) {
                (*raw).pkt_timebase = convert::rational_to_av(tb);
            }
            let ret = ffi::avcodec_open2(raw, dec, ptr::null_mut());
            if ret < 0 {
                return Err(self.status.runtime(
                    ret,
                    format!("无法打开解码器: {}", descriptor.codec_id),
                ));
            }
            let mut record = StreamRecord::new(descriptor.clone());
            record.state.src_index = Some(src);
            record.state.codec_open = true;
            record.attach_codec(ctx);
            self.streams.push(record);
        }
        debug!("已建立独立解码流 #{src}: {}", descriptor.codec_id);
        Ok(src)
    }

    /// 读取下一个数据包; 输入结束时返回 [`XMediaError::Eof`]
    pub fn read_packet(&mut self, packet: &mut Packet) -> XMediaResult<()> {
        let Self { input, status, .. } = self;
        let Some(input) = input.as_mut() else {
            return Err(status.fail(XMediaError::Lifecycle("输入未打开".into())));
        };
        match packet.read(input) {
            Ok(()) => Ok(()),
            Err(ffmpeg_next::Error::Eof) => Err(XMediaError::Eof),
            Err(e) => Err(status.runtime(i32::from(e), "读取数据包失败")),
        }
    }

    /// 以裸数据构造送往 `src` 流的数据包
    pub fn create_packet(&self, data: &[u8], src: usize) -> Packet {
        let mut packet = Packet::copy(data);
        packet.set_stream(src);
        packet
    }

    /// 解码一个数据包, 每得到一帧调用一次 `on_frame`
    ///
    /// 损坏的数据包返回可恢复的 [`XMediaError::InvalidData`]; 回调失败立即返回.
    pub fn decode_packet<F>(&mut self, packet: &Packet, mut on_frame: F) -> XMediaResult<()>
    where
        F: FnMut(&mut MediaFrame, &StreamState) -> XMediaResult<()>,
    {
        let Self {
            status, streams, ..
        } = self;
        let src = packet.stream();
        let Some(record) = streams.by_src_mut(src) else {
            return Err(status.fail(XMediaError::StreamNotFound(format!("源流 #{src}"))));
        };
        if !record.state.codec_open {
            return Err(status.fail(XMediaError::Lifecycle(format!("源流 #{src} 解码器未打开"))));
        }
        let ctx = record.codec_ptr();
        let ret = unsafe { ffi::avcodec_send_packet(ctx, packet.as_ptr()) };
        if ret == ffi::AVERROR_INVALIDDATA {
            status.set_code(ret);
            return Err(status.fail(XMediaError::InvalidData(format!("源流 #{src} 数据包损坏"))));
        }
        if ret < 0 && !convert::is_drained(ret) {
            return Err(status.runtime(ret, format!("源流 #{src} 送入数据包失败")));
        }
        receive_frames(status, record, src, &mut on_frame)
    }

    /// 向所有已打开的解码器发送结束信号并取出残留帧
    pub fn drain<F>(&mut self, mut on_frame: F) -> XMediaResult<()>
    where
        F: FnMut(&mut MediaFrame, &StreamState) -> XMediaResult<()>,
    {
        let Self {
            status, streams, ..
        } = self;
        for record in streams.iter_mut() {
            if !record.state.codec_open {
                continue;
            }
            let src = record.state.src_index.unwrap_or_default();
            let ret = unsafe { ffi::avcodec_send_packet(record.codec_ptr(), ptr::null()) };
            if ret < 0 && !convert::is_drained(ret) {
                return Err(status.runtime(ret, format!("源流 #{src} 结束解码失败")));
            }
            receive_frames(status, record, src, &mut on_frame)?;
        }
        Ok(())
    }

    /// 定位到 `src` 流的 `ts` 处 (以该流时间基为单位)
    pub fn seek(&mut self, src: usize, ts: i64, flags: i32) -> XMediaResult<()> {
        let Self { input, status, .. } = self;
        let Some(input) = input.as_mut() else {
            return Err(status.fail(XMediaError::Lifecycle("输入未打开".into())));
        };
        let ret = unsafe { ffi::av_seek_frame(input.as_mut_ptr(), src as c_int, ts, flags) };
        if ret < 0 {
            return Err(status.runtime(ret, format!("定位源流 #{src} 失败")));
        }
        debug!("已定位源流 #{src} 到 {ts}");
        Ok(())
    }

    /// 丢弃所有解码器内部缓存 (定位后使用)
    pub fn flush_buffers(&mut self) {
        for record in self.streams.iter_mut() {
            if record.state.codec_open {
                unsafe { ffi::avcodec_flush_buffers(record.codec_ptr()) };
            }
        }
    }

    /// 源流描述符
    pub fn codec_info(&self, src: usize) -> Option<&CodecDescriptor> {
        self.streams.by_src(src).map(StreamRecord::descriptor)
    }

    /// 源流描述符副本
    pub fn copy_codec_info(&mut self, src: usize) -> XMediaResult<CodecDescriptor> {
        match self.streams.by_src(src) {
            Some(record) => Ok(record.descriptor().clone()),
            None => Err(self
                .status
                .fail(XMediaError::StreamNotFound(format!("源流 #{src}")))),
        }
    }

    /// 流表
    pub fn streams(&self) -> &StreamTable<StreamRecord> {
        &self.streams
    }

    /// 可变流表 (用于记录源到目标的映射)
    pub fn streams_mut(&mut self) -> &mut StreamTable<StreamRecord> {
        &mut self.streams
    }

    /// 状态报告器
    pub fn status(&self) -> &StatusReporter {
        &self.status
    }
}

fn receive_frames<F>(
    status: &mut StatusReporter,
    record: &mut StreamRecord,
    src: usize,
    on_frame: &mut F,
) -> XMediaResult<()>
where
    F: FnMut(&mut MediaFrame, &StreamState) -> XMediaResult<()>,
{
    let ctx = record.codec_ptr();
    let (state, frame) = record.split_frame();
    let Some(frame) = frame else {
        return Err(status.fail(XMediaError::Unsupported(format!("源流 #{src} 不是音视频流"))));
    };
    loop {
        let ret = unsafe { ffi::avcodec_receive_frame(ctx, frame.as_mut_ptr()) };
        if convert::is_drained(ret) {
            return Ok(());
        }
        if ret < 0 {
            return Err(status.runtime(ret, format!("源流 #{src} 接收帧失败")));
        }
        unsafe {
            let f = frame.as_mut_ptr();
            if (*f).pts == ffi::AV_NOPTS_VALUE {
                (*f).pts = (*f).best_effort_timestamp;
            }
        }
        let result = on_frame(frame, state);
        frame.unref();
        result?;
    }
}

impl std::fmt::Debug for Decoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Decoder")
            .field("streams", &self.streams.len())
            .field("open", &self.input.is_some())
            .field("demux_only", &self.demux_only)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use xmedia_core::{CodecId, PixelFormat, Rational};

    #[test]
    fn test_read_before_open_is_lifecycle_error() {
        let mut decoder = Decoder::new(StatusReporter::silent());
        let mut packet = Packet::empty();
        let err = decoder.read_packet(&mut packet).unwrap_err();
        assert!(matches!(err, XMediaError::Lifecycle(_)));
    }

    #[test]
    fn test_open_missing_file_fails() {
        let mut decoder = Decoder::new(StatusReporter::silent());
        let err = decoder.open("/nonexistent/input.mkv", None).unwrap_err();
        assert!(err.code().is_some());
        assert!(decoder.streams().is_empty());
    }

    #[test]
    fn test_unknown_format_hint() {
        let mut decoder = Decoder::new(StatusReporter::silent());
        let err = decoder.open("x", Some("no-such-format")).unwrap_err();
        assert!(matches!(err, XMediaError::InvalidArgument(_)));
    }

    #[test]
    fn test_open_codec_allocates_src_index() {
        let mut decoder = Decoder::new(StatusReporter::silent());
        let mut desc = CodecDescriptor::video(CodecId::RawVideo, 16, 16, PixelFormat::Yuv420p);
        desc.time_base = Some(Rational::new(1, 25));
        let first = decoder.open_codec(&desc).unwrap();
        let second = decoder.open_codec(&desc).unwrap();
        assert_eq!(first, 0);
        assert_eq!(second, 1);
        assert_eq!(decoder.codec_info(1).map(|d| d.width), Some(Some(16)));
    }

    #[test]
    fn test_decode_raw_packet() {
        let mut decoder = Decoder::new(StatusReporter::silent());
        let mut desc = CodecDescriptor::video(CodecId::RawVideo, 16, 16, PixelFormat::Yuv420p);
        desc.time_base = Some(Rational::new(1, 25));
        let src = decoder.open_codec(&desc).unwrap();

        let mut packet = decoder.create_packet(&vec![0x40u8; 16 * 16 * 3 / 2], src);
        packet.set_pts(Some(7));
        let mut frames = 0;
        decoder
            .decode_packet(&packet, |frame, state| {
                assert_eq!(state.src_index, Some(src));
                assert_eq!(frame.media_type(), MediaType::Video);
                assert_eq!(frame.pts(), Some(7));
                frames += 1;
                Ok(())
            })
            .unwrap();
        assert_eq!(frames, 1);
    }

    #[test]
    fn test_flush_buffers_then_decode() {
        let mut decoder = Decoder::new(StatusReporter::silent());
        let mut desc = CodecDescriptor::video(CodecId::RawVideo, 16, 16, PixelFormat::Yuv420p);
        desc.time_base = Some(Rational::new(1, 25));
        let src = decoder.open_codec(&desc).unwrap();

        let mut frames = Vec::new();
        for pts in [0, 1] {
            let mut packet = decoder.create_packet(&vec![0x40u8; 16 * 16 * 3 / 2], src);
            packet.set_pts(Some(pts));
            decoder
                .decode_packet(&packet, |frame, _| {
                    frames.push(frame.pts());
                    Ok(())
                })
                .unwrap();
            decoder.flush_buffers();
        }
        assert_eq!(frames, vec![Some(0), Some(1)]);
    }

    #[test]
    fn test_decode_unknown_stream() {
        let mut decoder = Decoder::new(StatusReporter::silent());
        let packet = decoder.create_packet(&[1, 2, 3], 9);
        let err = decoder.decode_packet(&packet, |_, _| Ok(())).unwrap_err();
        assert!(matches!(err, XMediaError::StreamNotFound(_)));
    }
}
