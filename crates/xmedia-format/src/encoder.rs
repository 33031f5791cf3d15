//! 编码器: 建立输出流, 编码帧并按时间戳策略写入复用器.
//!
//! 使用流程:
//! 1. `open_format()` 或 `guess_format()` 分配输出格式上下文
//! 2. 每个输出流调用一次 `open_stream()`
//! 3. 可选 `add_meta()` 写入元数据与章节
//! 4. `open_output()` 建立输出 I/O 并写入头部
//! 5. `write_frame*()` / `write_packet()` 写入数据
//! 6. `finish_write()` 冲刷编码器并写入尾部
//!
//! 输出 I/O 有三种: 自定义输出目标 ([`MuxerSink`])、运行时打开的 URL、
//! 以及不需要文件的格式.

use std::os::raw::c_int;
use std::ptr;

use ffmpeg_next::codec;
use ffmpeg_next::ffi;
use ffmpeg_next::format::context::Output;
use ffmpeg_next::{Dictionary, Packet};
use log::{debug, warn};
use xmedia_core::frame_params::{plan_audio, plan_video};
use xmedia_core::timestamp::PacketTimestamps;
use xmedia_core::{
    CodecDescriptor, FrameParams, MediaType, Metadata, Rational, StatusReporter, StreamTable,
    TimestampFixer, TsMode, XMediaError, XMediaResult,
};

use crate::codec::{apply_to_context, apply_to_parameters, descriptor_from_context};
use crate::convert;
use crate::frame::{self, MediaFrame};
use crate::io::{CustomIo, DEFAULT_IO_BUFFER_SIZE, MuxerSink};
use crate::meta;
use crate::stream::StreamRecord;

/// 输出目标: 格式名与 URL 至少给出一个
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputTarget {
    /// 只给出格式名
    Format(String),
    /// 只给出 URL, 格式由扩展名推断
    Url(String),
    /// 同时给出格式名与 URL
    Both {
        /// 格式名
        format: String,
        /// 输出 URL
        url: String,
    },
}

impl OutputTarget {
    /// 由可选的格式名与 URL 构造, 两者皆空时报错
    pub fn new(format: Option<&str>, url: Option<&str>) -> XMediaResult<Self> {
        match (format, url) {
            (Some(f), Some(u)) => Ok(Self::Both {
                format: f.to_string(),
                url: u.to_string(),
            }),
            (Some(f), None) => Ok(Self::Format(f.to_string())),
            (None, Some(u)) => Ok(Self::Url(u.to_string())),
            (None, None) => Err(XMediaError::InvalidArgument(
                "输出格式与输出 URL 不能同时为空".into(),
            )),
        }
    }

    /// 格式名
    pub fn format(&self) -> Option<&str> {
        match self {
            Self::Format(f) | Self::Both { format: f, .. } => Some(f),
            Self::Url(_) => None,
        }
    }

    /// 输出 URL
    pub fn url(&self) -> Option<&str> {
        match self {
            Self::Url(u) | Self::Both { url: u, .. } => Some(u),
            Self::Format(_) => None,
        }
    }
}

/// 数据包检查结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketVerdict {
    /// 写入复用器
    Write,
    /// 丢弃该包
    Skip,
    /// 中止编码
    Abort,
}

impl PacketVerdict {
    /// 由整数约定转换: 负数中止, 零丢弃, 正数写入
    pub fn from_code(code: i32) -> Self {
        match code {
            c if c < 0 => Self::Abort,
            0 => Self::Skip,
            _ => Self::Write,
        }
    }
}

type PacketInspector = Box<dyn FnMut(&Packet) -> PacketVerdict>;

/// 编码器
pub struct Encoder {
    status: StatusReporter,
    streams: StreamTable<StreamRecord>,
    output: Option<Output>,
    url: Option<String>,
    sink: Option<Box<dyn MuxerSink>>,
    io: Option<CustomIo>,
    io_buffer_size: usize,
    inspector: Option<PacketInspector>,
    fixer: TimestampFixer,
    mux_only: bool,
    header_written: bool,
    trailer_written: bool,
}

impl Encoder {
    /// 创建编码器
    pub fn new(status: StatusReporter) -> Self {
        Self {
            status,
            streams: StreamTable::new(),
            output: None,
            url: None,
            sink: None,
            io: None,
            io_buffer_size: DEFAULT_IO_BUFFER_SIZE,
            inspector: None,
            fixer: TimestampFixer::default(),
            mux_only: false,
            header_written: false,
            trailer_written: false,
        }
    }

    /// 只复用, 不建立编码上下文
    pub fn set_mux_only(&mut self, mux_only: bool) {
        self.mux_only = mux_only;
    }

    /// 设置时间戳策略与单调性修正增量
    pub fn set_timestamps(&mut self, mode: TsMode, ts_fix: i64) {
        self.fixer = TimestampFixer::new(mode, ts_fix);
    }

    /// 设置自定义 I/O 缓冲区大小, 0 表示默认值
    pub fn set_io_buffer_size(&mut self, size: usize) {
        self.io_buffer_size = if size == 0 {
            DEFAULT_IO_BUFFER_SIZE
        } else {
            size
        };
    }

    /// 以自定义输出目标接收复用器输出, 需在 `open_output()` 之前设置
    pub fn set_muxer_sink(&mut self, sink: Box<dyn MuxerSink>) {
        self.sink = Some(sink);
    }

    /// 设置数据包检查回调
    pub fn set_packet_inspector<F>(&mut self, inspector: F)
    where
        F: FnMut(&Packet) -> PacketVerdict + 'static,
    {
        self.inspector = Some(Box::new(inspector));
    }

    fn output_mut(&mut self) -> XMediaResult<&mut Output> {
        let Self { output, status, .. } = self;
        match output.as_mut() {
            Some(o) => Ok(o),
            None => Err(status.fail(XMediaError::Lifecycle("输出格式未打开".into()))),
        }
    }

    /// 分配输出格式上下文
    pub fn open_format(&mut self, target: &OutputTarget) -> XMediaResult<()> {
        if self.output.is_some() {
            return Err(self.status.fail(XMediaError::Lifecycle("输出格式已打开".into())));
        }
        let c_fmt = target.format().map(convert::cstring).transpose()?;
        let c_url = target.url().map(convert::cstring).transpose()?;
        unsafe {
            let mut ps = ptr::null_mut();
            let ret = ffi::avformat_alloc_output_context2(
                &mut ps,
                ptr::null_mut(),
                c_fmt.as_ref().map_or(ptr::null(), |s| s.as_ptr()),
                c_url.as_ref().map_or(ptr::null(), |s| s.as_ptr()),
            );
            if ret < 0 || ps.is_null() {
                return Err(self.status.runtime(ret, format!("无法分配输出格式: {target:?}")));
            }
            self.output = Some(Output::wrap(ps));
        }
        self.url = target.url().map(str::to_string);
        debug!("已分配输出格式: {target:?}");
        Ok(())
    }

    /// 按格式名或 URL 猜测输出格式并分配上下文
    pub fn guess_format(&mut self, target: &OutputTarget) -> XMediaResult<()> {
        if self.output.is_some() {
            return Err(self.status.fail(XMediaError::Lifecycle("输出格式已打开".into())));
        }
        let c_fmt = target.format().map(convert::cstring).transpose()?;
        let c_url = target.url().map(convert::cstring).transpose()?;
        unsafe {
            let ofmt = ffi::av_guess_format(
                c_fmt.as_ref().map_or(ptr::null(), |s| s.as_ptr()),
                c_url.as_ref().map_or(ptr::null(), |s| s.as_ptr()),
                ptr::null(),
            );
            if ofmt.is_null() {
                return Err(self.status.fail(XMediaError::InvalidArgument(format!(
                    "无法猜测输出格式: {target:?}"
                ))));
            }
            let ps = ffi::avformat_alloc_context();
            if ps.is_null() {
                return Err(self
                    .status
                    .runtime(ffi::AVERROR(ffi::ENOMEM), "分配输出格式上下文失败"));
            }
            (*ps).oformat = ofmt as _;
            if let Some(url) = &c_url {
                (*ps).url = ffi::av_strdup(url.as_ptr());
            }
            self.output = Some(Output::wrap(ps));
        }
        self.url = target.url().map(str::to_string);
        Ok(())
    }

    /// 新建输出流, 返回目标索引
    ///
    /// 只复用时描述符直接写入流参数; 否则打开编码器, 再由编码器上下文
    /// 回填流参数与描述符.
    pub fn open_stream(&mut self, descriptor: &CodecDescriptor) -> XMediaResult<usize> {
        let octx = unsafe { self.output_mut()?.as_mut_ptr() };
        let mut desc = descriptor.clone();
        unsafe {
            let st = ffi::avformat_new_stream(octx, ptr::null());
            if st.is_null() {
                return Err(self
                    .status
                    .runtime(ffi::AVERROR(ffi::ENOMEM), "新建输出流失败"));
            }
            let dst = (*st).index as usize;
            if let Some(tb) = desc.time_base.filter(Rational::is_valid) {
                (*st).time_base = convert::rational_to_av(tb);
            }

            if self.mux_only {
                apply_to_parameters(&mut desc, (*st).codecpar).map_err(|e| self.status.fail(e))?;
                (*(*st).codecpar).codec_tag = 0;
                let mut record = StreamRecord::new(descriptor.clone());
                record.state.dst_index = Some(dst);
                self.status.debug(format!("输出流 #{dst} (复用): {}", descriptor.dump_str()));
                self.streams.push(record);
                return Ok(dst);
            }

            let mut ctx = open_encoder(&mut desc, octx).map_err(|e| self.status.fail(e))?;
            let raw = ctx.as_mut_ptr();
            let ret = ffi::avcodec_parameters_from_context((*st).codecpar, raw);
            if ret < 0 {
                return Err(self.status.runtime(ret, format!("输出流 #{dst} 参数回填失败")));
            }
            (*st).time_base = (*raw).time_base;

            let mut refreshed = descriptor_from_context(raw);
            refreshed.scale_policy = descriptor.scale_policy;
            self.status
                .debug(format!("输出流 #{dst}: {}", refreshed.dump_str()));
            let mut record = StreamRecord::new(refreshed);
            record.state.dst_index = Some(dst);
            record.state.codec_open = true;
            record.attach_codec(ctx);
            self.streams.push(record);
            Ok(dst)
        }
    }

    /// 以当前描述符重建 `dst` 流的编码器, 计数器保留
    pub fn restart_codec(&mut self, dst: usize) -> XMediaResult<()> {
        let octx = unsafe { self.output_mut()?.as_mut_ptr() };
        let Self {
            status, streams, ..
        } = self;
        let Some(record) = streams.by_dst_mut(dst) else {
            return Err(status.fail(XMediaError::StreamNotFound(format!("目标流 #{dst}"))));
        };
        if !record.state.codec_open {
            return Err(status.fail(XMediaError::Lifecycle(format!("目标流 #{dst} 编码器未打开"))));
        }
        let mut desc = record.descriptor().clone();
        record.release_codec();
        let ctx = unsafe { open_encoder(&mut desc, octx) }.map_err(|e| status.fail(e))?;
        record.attach_codec(ctx);
        record.state.codec_open = true;
        debug!("已重建目标流 #{dst} 的编码器");
        Ok(())
    }

    /// 建立输出 I/O 并写入头部
    pub fn open_output(&mut self, options: &[(String, String)]) -> XMediaResult<()> {
        let octx = unsafe { self.output_mut()?.as_mut_ptr() };
        unsafe {
            if let Some(sink) = self.sink.take() {
                let mut io =
                    CustomIo::new(sink, self.io_buffer_size).map_err(|e| self.status.fail(e))?;
                (*octx).pb = io.as_mut_ptr();
                (*octx).flags |= ffi::AVFMT_FLAG_CUSTOM_IO as c_int;
                (*octx).packet_size = u32::try_from(self.io_buffer_size).unwrap_or(u32::MAX);
                self.io = Some(io);
                debug!("输出使用自定义 I/O, 缓冲区 {} 字节", self.io_buffer_size);
            } else if (*(*octx).oformat).flags & ffi::AVFMT_NOFILE as c_int == 0 {
                let Some(url) = self.url.as_deref() else {
                    return Err(self
                        .status
                        .fail(XMediaError::InvalidArgument("输出需要 URL".into())));
                };
                let c_url = convert::cstring(url)?;
                let ret =
                    ffi::avio_open(&mut (*octx).pb, c_url.as_ptr(), ffi::AVIO_FLAG_WRITE as c_int);
                if ret < 0 {
                    return Err(self.status.runtime(ret, format!("无法打开输出: {url}")));
                }
            }
        }
        self.write_header(options)
    }

    /// 写入头部, 只能调用一次
    pub fn write_header(&mut self, options: &[(String, String)]) -> XMediaResult<()> {
        if self.header_written {
            return Err(self.status.fail(XMediaError::Lifecycle("头部已写入".into())));
        }
        let mut dict = Dictionary::new();
        for (k, v) in options {
            dict.set(k, v);
        }
        let Self { output, status, .. } = self;
        let Some(output) = output.as_mut() else {
            return Err(status.fail(XMediaError::Lifecycle("输出格式未打开".into())));
        };
        match output.write_header_with(dict) {
            Ok(unused) => {
                for (k, v) in unused.iter() {
                    warn!("复用器未使用选项: {k}={v}");
                }
            }
            Err(e) => return Err(status.runtime(i32::from(e), "写入头部失败")),
        }
        self.header_written = true;
        self.status.info("已写入输出头部");
        Ok(())
    }

    /// 按时间戳策略改写并写入一个数据包
    ///
    /// 写入前做单调性修正, 并把交给复用器的 PTS/DTS 记入流记录.
    pub fn write_packet(&mut self, packet: &mut Packet) -> XMediaResult<()> {
        let Self {
            status,
            streams,
            output,
            fixer,
            header_written,
            ..
        } = self;
        let Some(output) = output.as_mut() else {
            return Err(status.fail(XMediaError::Lifecycle("输出格式未打开".into())));
        };
        if !*header_written {
            return Err(status.fail(XMediaError::Lifecycle("尚未写入头部".into())));
        }
        let dst = packet.stream();
        let dst_tb = output
            .stream(dst)
            .map(|s| convert::rational_from_next(s.time_base()));
        let (Some(record), Some(dst_tb)) = (streams.by_dst_mut(dst), dst_tb) else {
            return Err(status.fail(XMediaError::StreamNotFound(format!("目标流 #{dst}"))));
        };

        let mut ts = PacketTimestamps {
            pts: packet.pts(),
            dts: packet.dts(),
            duration: packet.duration(),
            pos: packet.position() as i64,
        };
        fixer
            .apply(&mut ts, &record.state, dst_tb)
            .map_err(|e| status.fail(e))?;
        let before = ts;
        if fixer.fix_monotonic(&mut ts, &record.state) {
            debug!(
                "已修正目标流 #{dst} 时间戳: pts {:?} -> {:?}, dts {:?} -> {:?}",
                before.pts, ts.pts, before.dts, ts.dts
            );
        }
        packet.set_pts(ts.pts);
        packet.set_dts(ts.dts);
        packet.set_duration(ts.duration);
        packet.set_position(ts.pos as isize);
        record.state.last_pts = ts.pts;
        record.state.last_dts = ts.dts;

        packet
            .write_interleaved(output)
            .map_err(|e| status.runtime(i32::from(e), format!("目标流 #{dst} 写入数据包失败")))?;
        record.state.packet_count += 1;
        Ok(())
    }

    /// 编码一帧并写出得到的全部数据包; `None` 表示冲刷
    pub fn write_frame(&mut self, frame: Option<&MediaFrame>, dst: usize) -> XMediaResult<()> {
        let ctx = {
            let Self {
                status, streams, ..
            } = self;
            let Some(record) = streams.by_dst_mut(dst) else {
                return Err(status.fail(XMediaError::StreamNotFound(format!("目标流 #{dst}"))));
            };
            if !record.state.codec_open {
                return Err(
                    status.fail(XMediaError::Lifecycle(format!("目标流 #{dst} 编码器未打开")))
                );
            }
            record.codec_ptr()
        };

        let frame_ptr = frame.map_or(ptr::null(), |f| unsafe { f.as_ptr() });
        let ret = unsafe { ffi::avcodec_send_frame(ctx, frame_ptr) };
        if ret < 0 && !(frame.is_none() && ret == ffi::AVERROR_EOF) {
            return Err(self.status.runtime(ret, format!("目标流 #{dst} 送入帧失败")));
        }

        loop {
            let mut packet = Packet::empty();
            let ret = unsafe { ffi::avcodec_receive_packet(ctx, packet.as_mut_ptr()) };
            if convert::is_drained(ret) {
                return Ok(());
            }
            if ret < 0 {
                return Err(self.status.runtime(ret, format!("目标流 #{dst} 接收数据包失败")));
            }
            packet.set_stream(dst);
            let verdict = match self.inspector.as_mut() {
                Some(inspect) => inspect(&packet),
                None => PacketVerdict::Write,
            };
            match verdict {
                PacketVerdict::Write => self.write_packet(&mut packet)?,
                PacketVerdict::Skip => continue,
                PacketVerdict::Abort => {
                    return Err(self
                        .status
                        .runtime(ffi::AVERROR_EXIT, format!("目标流 #{dst} 数据包检查要求中止")));
                }
            }
        }
    }

    /// 按目标参数变换后编码
    ///
    /// 视频按需缩放, 音频按需重采样. 变换失败只丢弃当前帧.
    pub fn write_frame_transformed(
        &mut self,
        input: &MediaFrame,
        params: &FrameParams,
    ) -> XMediaResult<()> {
        let Some(dst) = params.dst_index else {
            return Err(self
                .status
                .fail(XMediaError::InvalidArgument("缺少目标流索引".into())));
        };
        let transformed = match input {
            MediaFrame::Video(v) => {
                let info = frame::video_info(v);
                match plan_video(params, &info) {
                    None => return self.write_frame(Some(input), dst),
                    Some(target) => {
                        let p = FrameParams {
                            width: Some(target.width),
                            height: Some(target.height),
                            pixel_format: target.pixel_format.or(info.pixel_format),
                            ..params.clone()
                        };
                        frame::scale(v, &p).map(MediaFrame::Video)
                    }
                }
            }
            MediaFrame::Audio(a) => {
                let info = frame::audio_info(a);
                match plan_audio(params, &info) {
                    None => return self.write_frame(Some(input), dst),
                    Some(target) => {
                        let p = FrameParams {
                            sample_rate: Some(target.sample_rate),
                            sample_format: target.sample_format.or(info.sample_format),
                            channels: Some(target.channels),
                            ..params.clone()
                        };
                        frame::resample(a, &p).map(MediaFrame::Audio)
                    }
                }
            }
        };
        match transformed {
            Ok(out) => self.write_frame(Some(&out), dst),
            Err(e) => {
                let _ = self.status.fail(e);
                warn!("目标流 #{dst} 帧变换失败, 丢弃该帧");
                Ok(())
            }
        }
    }

    /// 以 `dst` 流的描述符为目标编码一帧
    pub fn write_frame_for_stream(&mut self, input: &MediaFrame, dst: usize) -> XMediaResult<()> {
        let params = match self.streams.by_dst(dst) {
            Some(record) => FrameParams::from_descriptor(record.descriptor(), dst),
            None => {
                return Err(self
                    .status
                    .fail(XMediaError::StreamNotFound(format!("目标流 #{dst}"))));
            }
        };
        self.write_frame_transformed(input, &params)
    }

    /// 冲刷一个输出流的编码器
    pub fn flush_stream(&mut self, dst: usize) -> XMediaResult<()> {
        self.write_frame(None, dst)
    }

    /// 冲刷全部已打开的编码器
    pub fn flush_streams(&mut self) -> XMediaResult<()> {
        let targets: Vec<usize> = self
            .streams
            .iter()
            .filter(|r| r.state.codec_open)
            .filter_map(|r| r.state.dst_index)
            .collect();
        for dst in targets {
            self.flush_stream(dst)?;
        }
        Ok(())
    }

    /// 丢弃一个编码器的内部缓存
    pub fn flush_buffer(&mut self, dst: usize) -> XMediaResult<()> {
        let Self {
            status, streams, ..
        } = self;
        match streams.by_dst_mut(dst) {
            Some(record) if record.state.codec_open => {
                unsafe { ffi::avcodec_flush_buffers(record.codec_ptr()) };
                Ok(())
            }
            Some(_) => Err(status.fail(XMediaError::Lifecycle(format!("目标流 #{dst} 编码器未打开")))),
            None => Err(status.fail(XMediaError::StreamNotFound(format!("目标流 #{dst}")))),
        }
    }

    /// 丢弃全部编码器的内部缓存
    pub fn flush_buffers(&mut self) {
        for record in self.streams.iter_mut() {
            if record.state.codec_open {
                unsafe { ffi::avcodec_flush_buffers(record.codec_ptr()) };
            }
        }
    }

    /// 可选冲刷编码器, 然后写入尾部
    pub fn finish_write(&mut self, flush: bool) -> XMediaResult<()> {
        if !self.header_written {
            return Err(self.status.fail(XMediaError::Lifecycle("尚未写入头部".into())));
        }
        if self.trailer_written {
            return Ok(());
        }
        if flush {
            self.flush_streams()?;
        }
        let Self { output, status, .. } = self;
        if let Some(output) = output.as_mut() {
            output
                .write_trailer()
                .map_err(|e| status.runtime(i32::from(e), "写入尾部失败"))?;
        }
        self.trailer_written = true;
        self.status.info("已写入输出尾部");
        Ok(())
    }

    /// 转移元数据与章节到输出, 调用后 `meta` 为空
    ///
    /// 输出格式未打开时报错, `meta` 保持不变.
    pub fn add_meta(&mut self, meta: &mut Metadata) -> XMediaResult<()> {
        let Self { output, status, .. } = self;
        let Some(output) = output.as_mut() else {
            return Err(status.fail(XMediaError::Lifecycle("输出格式未打开".into())));
        };
        if meta.is_empty() {
            return Ok(());
        }
        meta::attach(output, meta.take()).map_err(|e| status.fail(e))
    }

    /// 追加一个章节 (时间以 `time_base` 为单位)
    pub fn add_chapter(
        &mut self,
        id: i64,
        time_base: Rational,
        start: i64,
        end: i64,
        title: Option<&str>,
    ) -> XMediaResult<()> {
        let chapter = xmedia_core::Chapter {
            id,
            time_base,
            start,
            end,
            title: title.map(str::to_string),
        };
        let Self { output, status, .. } = self;
        let Some(output) = output.as_mut() else {
            return Err(status.fail(XMediaError::Lifecycle("输出格式未打开".into())));
        };
        meta::attach_chapter(output, &chapter).map_err(|e| status.fail(e))
    }

    /// 目标流描述符
    pub fn codec_info(&self, dst: usize) -> Option<&CodecDescriptor> {
        self.streams.by_dst(dst).map(StreamRecord::descriptor)
    }

    /// 目标流描述符副本
    pub fn copy_codec_info(&mut self, dst: usize) -> XMediaResult<CodecDescriptor> {
        match self.streams.by_dst(dst) {
            Some(record) => Ok(record.descriptor().clone()),
            None => Err(self
                .status
                .fail(XMediaError::StreamNotFound(format!("目标流 #{dst}")))),
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

/// 按描述符分配并打开编码器
///
/// 时间基缺失时视频取帧率倒数, 音频取采样率倒数; 像素或采样格式缺失
/// 或不被编码器支持时改用编码器支持的第一个格式.
unsafe fn open_encoder(
    desc: &mut CodecDescriptor,
    octx: *mut ffi::AVFormatContext,
) -> XMediaResult<codec::Context> {
    let id = convert::codec_to_av(desc.codec_id)?;
    unsafe {
        let enc = ffi::avcodec_find_encoder(id);
        if enc.is_null() {
            return Err(XMediaError::CodecNotFound(format!(
                "无可用编码器: {}",
                desc.codec_id
            )));
        }
        let raw = ffi::avcodec_alloc_context3(enc);
        if raw.is_null() {
            return Err(XMediaError::runtime(
                ffi::AVERROR(ffi::ENOMEM),
                "分配编码上下文失败",
            ));
        }
        let ctx = codec::Context::wrap(raw, None);

        if desc.time_base.filter(Rational::is_valid).is_none() {
            desc.time_base = default_time_base(desc);
        }
        apply_to_context(desc, raw)?;
        match desc.media_type {
            MediaType::Video => {
                let pix_fmts = (*enc).pix_fmts;
                if !pix_fmts.is_null() && !list_contains(pix_fmts, (*raw).pix_fmt, |f| {
                    f == ffi::AVPixelFormat::AV_PIX_FMT_NONE
                }) {
                    debug!("编码器不支持像素格式 {:?}, 改用 {:?}", (*raw).pix_fmt, *pix_fmts);
                    (*raw).pix_fmt = *pix_fmts;
                }
            }
            MediaType::Audio => {
                let sample_fmts = (*enc).sample_fmts;
                if !sample_fmts.is_null() && !list_contains(sample_fmts, (*raw).sample_fmt, |f| {
                    f == ffi::AVSampleFormat::AV_SAMPLE_FMT_NONE
                }) {
                    debug!("编码器不支持采样格式 {:?}, 改用 {:?}", (*raw).sample_fmt, *sample_fmts);
                    (*raw).sample_fmt = *sample_fmts;
                }
            }
            _ => {}
        }

        if !octx.is_null() && (*(*octx).oformat).flags & ffi::AVFMT_GLOBALHEADER as c_int != 0 {
            (*raw).flags |= ffi::AV_CODEC_FLAG_GLOBAL_HEADER as c_int;
        }
        let ret = ffi::avcodec_open2(raw, enc, ptr::null_mut());
        if ret < 0 {
            return Err(XMediaError::runtime(
                ret,
                format!("无法打开编码器: {}", desc.codec_id),
            ));
        }
        Ok(ctx)
    }
}

fn default_time_base(desc: &CodecDescriptor) -> Option<Rational> {
    match desc.media_type {
        MediaType::Video => Some(
            desc.frame_rate
                .filter(Rational::is_valid)
                .map_or(Rational::new(1, 25), Rational::invert),
        ),
        MediaType::Audio => desc
            .sample_rate
            .filter(|&r| r > 0)
            .map(|r| Rational::new(1, i32::try_from(r).unwrap_or(i32::MAX))),
        _ => None,
    }
}

/// 在以终止值结尾的运行时列表中查找
unsafe fn list_contains<T: Copy + PartialEq>(
    mut list: *const T,
    value: T,
    is_end: impl Fn(T) -> bool,
) -> bool {
    unsafe {
        while !is_end(*list) {
            if *list == value {
                return true;
            }
            list = list.add(1);
        }
    }
    false
}

impl Drop for Encoder {
    fn drop(&mut self) {
        // 自定义 I/O 由本结构释放, 格式上下文释放时不能再关闭它
        if self.io.is_some() {
            if let Some(output) = self.output.as_mut() {
                unsafe { (*output.as_mut_ptr()).pb = ptr::null_mut() };
            }
        }
        self.output = None;
        self.io = None;
    }
}

impl std::fmt::Debug for Encoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Encoder")
            .field("streams", &self.streams.len())
            .field("url", &self.url)
            .field("custom_io", &self.io.is_some())
            .field("mux_only", &self.mux_only)
            .field("header_written", &self.header_written)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;
    use xmedia_core::{CodecId, PixelFormat, SampleFormat};

    use crate::io::WriteSink;

    fn raw_video() -> CodecDescriptor {
        let mut desc = CodecDescriptor::video(CodecId::RawVideo, 32, 24, PixelFormat::Yuv420p);
        desc.time_base = Some(Rational::new(1, 25));
        desc.frame_rate = Some(Rational::new(25, 1));
        desc
    }

    #[test]
    fn test_output_target_requires_one() {
        assert!(OutputTarget::new(None, None).is_err());
        let t = OutputTarget::new(Some("nut"), None).unwrap();
        assert_eq!(t.format(), Some("nut"));
        assert_eq!(t.url(), None);
        let t = OutputTarget::new(Some("nut"), Some("a.nut")).unwrap();
        assert_eq!(t.url(), Some("a.nut"));
    }

    #[test]
    fn test_verdict_from_code() {
        assert_eq!(PacketVerdict::from_code(-1), PacketVerdict::Abort);
        assert_eq!(PacketVerdict::from_code(0), PacketVerdict::Skip);
        assert_eq!(PacketVerdict::from_code(3), PacketVerdict::Write);
    }

    #[test]
    fn test_open_stream_before_format() {
        let mut enc = Encoder::new(StatusReporter::silent());
        let err = enc.open_stream(&raw_video()).unwrap_err();
        assert!(matches!(err, XMediaError::Lifecycle(_)));
    }

    #[test]
    fn test_write_packet_before_header() {
        let mut enc = Encoder::new(StatusReporter::silent());
        enc.open_format(&OutputTarget::Format("nut".into())).unwrap();
        enc.open_stream(&raw_video()).unwrap();
        let mut packet = Packet::copy(&[0u8; 16]);
        let err = enc.write_packet(&mut packet).unwrap_err();
        assert!(matches!(err, XMediaError::Lifecycle(_)));
    }

    #[test]
    fn test_custom_io_receives_output() {
        let written = Rc::new(RefCell::new(0usize));
        let mut enc = Encoder::new(StatusReporter::silent());
        enc.open_format(&OutputTarget::Format("nut".into())).unwrap();
        let dst = enc.open_stream(&raw_video()).unwrap();
        assert_eq!(dst, 0);
        {
            let written = Rc::clone(&written);
            enc.set_muxer_sink(Box::new(move |buf: &[u8]| -> std::io::Result<usize> {
                *written.borrow_mut() += buf.len();
                Ok(buf.len())
            }));
        }
        enc.set_io_buffer_size(4096);
        enc.open_output(&[]).unwrap();

        let params = FrameParams::from_descriptor(enc.codec_info(dst).unwrap(), dst);
        for i in 0..5 {
            let mut f = frame::from_yuv420p(&vec![0x10; 32 * 24 * 3 / 2], &params).unwrap();
            f.set_pts(Some(i));
            enc.write_frame(Some(&MediaFrame::Video(f)), dst).unwrap();
        }
        enc.finish_write(true).unwrap();
        assert_eq!(enc.streams().by_dst(dst).unwrap().state.packet_count, 5);
        drop(enc);
        assert!(*written.borrow() > 0);
    }

    #[test]
    fn test_inspector_skips_packets() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("skip.nut");
        let mut enc = Encoder::new(StatusReporter::silent());
        enc.open_format(&OutputTarget::Format("nut".into())).unwrap();
        let dst = enc.open_stream(&raw_video()).unwrap();
        enc.set_muxer_sink(Box::new(WriteSink::create(&path).unwrap()));
        let mut seen = 0;
        enc.set_packet_inspector(move |_| {
            seen += 1;
            if seen % 2 == 0 { PacketVerdict::Skip } else { PacketVerdict::Write }
        });
        enc.open_output(&[]).unwrap();

        let params = FrameParams::from_descriptor(enc.codec_info(dst).unwrap(), dst);
        for i in 0..4 {
            let mut f = frame::from_yuv420p(&vec![0x20; 32 * 24 * 3 / 2], &params).unwrap();
            f.set_pts(Some(i));
            enc.write_frame(Some(&MediaFrame::Video(f)), dst).unwrap();
        }
        enc.finish_write(true).unwrap();
        assert_eq!(enc.streams().by_dst(dst).unwrap().state.packet_count, 2);
    }

    #[test]
    fn test_audio_frame_resampled_to_stream() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audio.nut");
        let mut enc = Encoder::new(StatusReporter::silent());
        enc.open_format(&OutputTarget::new(None, path.to_str()).unwrap())
            .unwrap();
        let mut desc = CodecDescriptor::audio(CodecId::PcmS16le, 16000, 1, SampleFormat::S16);
        desc.time_base = Some(Rational::new(1, 16000));
        let dst = enc.open_stream(&desc).unwrap();
        enc.open_output(&[]).unwrap();

        // 48 kHz 立体声输入, 目标为 16 kHz 单声道
        let src = FrameParams {
            media_type: MediaType::Audio,
            sample_format: Some(SampleFormat::S16),
            sample_rate: Some(48000),
            channels: Some(2),
            ..FrameParams::default()
        };
        let mut pcm = frame::from_s16(&vec![0u8; 960 * 2 * 2], &src).unwrap();
        pcm.set_pts(Some(0));
        enc.write_frame_for_stream(&MediaFrame::Audio(pcm), dst).unwrap();
        enc.finish_write(true).unwrap();
        assert!(enc.streams().by_dst(dst).unwrap().state.packet_count >= 1);
        assert!(std::fs::metadata(&path).unwrap().len() > 0);
    }

    #[test]
    fn test_add_meta_before_format_keeps_metadata() {
        let mut enc = Encoder::new(StatusReporter::silent());
        let mut meta = Metadata::new();
        meta.add_field("title", "demo").unwrap();
        let err = enc.add_meta(&mut meta).unwrap_err();
        assert!(matches!(err, XMediaError::Lifecycle(_)));
        assert_eq!(meta.field("title"), Some("demo"));
    }

    #[test]
    fn test_guessed_format_with_codec_restart() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("restart.nut");
        let mut enc = Encoder::new(StatusReporter::silent());
        enc.guess_format(&OutputTarget::Url(path.to_str().unwrap().into()))
            .unwrap();
        let dst = enc.open_stream(&raw_video()).unwrap();
        enc.open_output(&[]).unwrap();

        let params = FrameParams::from_descriptor(enc.codec_info(dst).unwrap(), dst);
        let write = |enc: &mut Encoder, pts: i64| {
            let mut f = frame::from_yuv420p(&vec![0x30; 32 * 24 * 3 / 2], &params).unwrap();
            f.set_pts(Some(pts));
            enc.write_frame(Some(&MediaFrame::Video(f)), dst).unwrap();
        };
        for pts in 0..3 {
            write(&mut enc, pts);
        }
        enc.restart_codec(dst).unwrap();
        for pts in 3..5 {
            write(&mut enc, pts);
        }
        enc.flush_buffer(dst).unwrap();
        assert!(matches!(
            enc.flush_buffer(9).unwrap_err(),
            XMediaError::StreamNotFound(_)
        ));
        enc.flush_buffers();
        enc.finish_write(true).unwrap();

        let state = &enc.streams().by_dst(dst).unwrap().state;
        assert!(state.codec_open);
        assert_eq!(state.packet_count, 5);
        assert_eq!(state.last_pts, Some(4));
        drop(enc);
        assert!(std::fs::metadata(&path).unwrap().len() > 0);
    }

    #[test]
    fn test_guess_format_unknown() {
        let mut enc = Encoder::new(StatusReporter::silent());
        let err = enc
            .guess_format(&OutputTarget::Format("no-such-muxer".into()))
            .unwrap_err();
        assert!(matches!(err, XMediaError::InvalidArgument(_)));
    }

    #[test]
    fn test_add_meta_empties_source() {
        let mut enc = Encoder::new(StatusReporter::silent());
        enc.open_format(&OutputTarget::Format("matroska".into())).unwrap();
        let mut meta = Metadata::new();
        meta.add_field("title", "demo").unwrap();
        meta.add_chapter_seconds(0, 10, Some("intro"));
        enc.add_meta(&mut meta).unwrap();
        assert!(meta.is_empty());
    }
}
