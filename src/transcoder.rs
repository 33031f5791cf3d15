//! 转码/转封装流水线.
//!
//! 初始化顺序固定: 运行时 → 打开输入 → 按源流建立输出流并记录映射 →
//! 写入元数据 → 打开输出. 主循环逐包读取, 转封装时直接写包,
//! 转码时解码后把帧交给对应的输出流. 中断标志只在循环开头检查.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use log::{debug, warn};
use xmedia_core::rational::rescale_q;
use xmedia_core::{
    CodecDescriptor, Metadata, StatusReporter, StreamState, XMediaError, XMediaResult,
};
use xmedia_format::{
    Decoder, Encoder, MediaFrame, MuxerSink, OutputTarget, Packet, SEEK_BACKWARD, WriteSink,
};

use crate::options::{StreamOverrides, TranscodeOptions};

/// 一次运行的统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TranscodeSummary {
    /// 读取的数据包数
    pub packets_read: u64,
    /// 解码得到的帧数
    pub frames_decoded: u64,
    /// 因损坏被跳过的数据包数
    pub packets_skipped: u64,
    /// 循环重新开始的次数
    pub loops: u64,
    /// 是否因中断结束
    pub interrupted: bool,
}

/// 流水线
pub struct Transcoder {
    options: TranscodeOptions,
    overrides: StreamOverrides,
    decoder: Decoder,
    encoder: Encoder,
    metadata: Metadata,
    sink: Option<Box<dyn MuxerSink>>,
    interrupted: Arc<AtomicBool>,
    status: StatusReporter,
    opened: bool,
}

impl Transcoder {
    /// 校验选项并创建流水线; 指定了元数据文件时一并加载
    pub fn new(options: TranscodeOptions, status: StatusReporter) -> XMediaResult<Self> {
        let mut status = status;
        let overrides = options.overrides().map_err(|e| status.fail(e))?;
        let metadata = match options.metadata_file.as_deref() {
            Some(path) => Metadata::load_file(path).map_err(|e| status.fail(e))?,
            None => Metadata::new(),
        };
        Ok(Self {
            overrides,
            decoder: Decoder::new(status.clone()),
            encoder: Encoder::new(status.clone()),
            metadata,
            sink: None,
            interrupted: Arc::new(AtomicBool::new(false)),
            status,
            options,
            opened: false,
        })
    }

    /// 中断标志, 置位后主循环在下一次迭代前退出
    pub fn interrupt_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.interrupted)
    }

    /// 追加元数据 (在 `open()` 之前)
    pub fn metadata_mut(&mut self) -> &mut Metadata {
        &mut self.metadata
    }

    /// 以自定义输出目标接收复用器输出, 替代按输出路径创建的文件
    pub fn set_muxer_sink(&mut self, sink: Box<dyn MuxerSink>) {
        self.sink = Some(sink);
    }

    /// 解码器
    pub fn decoder(&self) -> &Decoder {
        &self.decoder
    }

    /// 编码器
    pub fn encoder(&self) -> &Encoder {
        &self.encoder
    }

    /// 选项
    pub fn options(&self) -> &TranscodeOptions {
        &self.options
    }

    /// 打开输入与输出, 建立源流与目标流的映射
    pub fn open(&mut self) -> XMediaResult<()> {
        if self.opened {
            return Err(self.status.fail(XMediaError::Lifecycle("流水线已打开".into())));
        }
        xmedia_format::init().map_err(|e| self.status.fail(e))?;
        xmedia_format::set_log_level(self.options.debug);

        let remux = self.options.remux;
        self.decoder.set_demux_only(remux);
        self.decoder
            .open(&self.options.input, self.options.input_format.as_deref())?;
        if self.decoder.streams().is_empty() {
            return Err(self
                .status
                .fail(XMediaError::InvalidArgument("输入没有音视频流".into())));
        }

        self.encoder.set_mux_only(remux);
        self.encoder
            .set_timestamps(self.options.ts_mode, self.options.ts_fix);
        self.encoder.set_io_buffer_size(self.options.io_buffer_size);
        let target = OutputTarget::new(
            self.options.output_format.as_deref(),
            Some(&self.options.output),
        )?;
        self.encoder.open_format(&target)?;

        let sources: Vec<(usize, CodecDescriptor)> = self
            .decoder
            .streams()
            .iter()
            .filter_map(|r| r.state.src_index.map(|src| (src, r.descriptor().clone())))
            .collect();
        for (src, mut desc) in sources {
            if !remux {
                self.overrides.apply(&mut desc);
            }
            let dst = self.encoder.open_stream(&desc)?;
            if let Some(record) = self.encoder.streams_mut().by_dst_mut(dst) {
                record.state.src_index = Some(src);
            }
            if let Some(record) = self.decoder.streams_mut().by_src_mut(src) {
                record.state.dst_index = Some(dst);
            }
            self.status.info(format!("流映射: #{src} -> #{dst}"));
        }

        self.encoder.add_meta(&mut self.metadata)?;

        let mut muxer_options = Vec::new();
        if let Some(sink) = self.sink.take() {
            self.encoder.set_muxer_sink(sink);
            muxer_options = self.options.custom_io_muxer_options();
        } else if self.options.custom_io {
            let sink = WriteSink::create(&self.options.output).map_err(|e| self.status.fail(e))?;
            self.encoder.set_muxer_sink(Box::new(sink));
            muxer_options = self.options.custom_io_muxer_options();
        }
        self.encoder.open_output(&muxer_options)?;
        self.opened = true;
        Ok(())
    }

    /// 运行主循环直到输入结束、出错或被中断, 结束时总会尝试写入尾部
    pub fn run(&mut self) -> XMediaResult<TranscodeSummary> {
        if !self.opened {
            return Err(self.status.fail(XMediaError::Lifecycle("流水线未打开".into())));
        }
        let remux = self.options.remux;
        let mut summary = TranscodeSummary::default();
        let mut outcome = Ok(());

        loop {
            if self.interrupted.load(Ordering::SeqCst) {
                summary.interrupted = true;
                self.status.info("收到中断, 结束处理");
                break;
            }
            let mut packet = Packet::empty();
            match self.decoder.read_packet(&mut packet) {
                Ok(()) => {}
                Err(XMediaError::Eof) if self.options.looping => {
                    let src = self.first_source();
                    debug!("输入结束, 定位源流 #{src} 到起点");
                    if let Err(e) = self.decoder.seek(src, 0, SEEK_BACKWARD) {
                        outcome = Err(e);
                        break;
                    }
                    summary.loops += 1;
                    continue;
                }
                Err(XMediaError::Eof) => {
                    if !remux {
                        outcome = self.drain(&mut summary);
                    }
                    break;
                }
                Err(e) => {
                    outcome = Err(e);
                    break;
                }
            }
            summary.packets_read += 1;

            let step = if remux {
                self.remux_packet(&mut packet)
            } else {
                self.transcode_packet(&packet, &mut summary)
            };
            match step {
                Ok(()) => {}
                Err(e) if e.is_recoverable() => {
                    summary.packets_skipped += 1;
                    warn!("跳过损坏的数据包: {e}");
                }
                Err(e) => {
                    outcome = Err(e);
                    break;
                }
            }
        }

        let finish = self.encoder.finish_write(!remux);
        outcome?;
        finish?;
        self.status.info(format!(
            "处理完成: 读取 {} 包, 解码 {} 帧, 跳过 {} 包",
            summary.packets_read, summary.frames_decoded, summary.packets_skipped
        ));
        Ok(summary)
    }

    fn first_source(&self) -> usize {
        self.decoder
            .streams()
            .iter()
            .filter_map(|r| r.state.src_index)
            .min()
            .unwrap_or(0)
    }

    /// 按源流映射改写流索引后直接写包, 未映射的流丢弃
    fn remux_packet(&mut self, packet: &mut Packet) -> XMediaResult<()> {
        let src = packet.stream();
        let Some(dst) = self
            .decoder
            .streams()
            .by_src(src)
            .and_then(|r| r.state.dst_index)
        else {
            return Ok(());
        };
        packet.set_stream(dst);
        self.encoder.write_packet(packet)
    }

    fn transcode_packet(
        &mut self,
        packet: &Packet,
        summary: &mut TranscodeSummary,
    ) -> XMediaResult<()> {
        let Self {
            decoder, encoder, ..
        } = self;
        decoder.decode_packet(packet, |frame, state| {
            summary.frames_decoded += 1;
            forward_frame(encoder, frame, state)
        })
    }

    fn drain(&mut self, summary: &mut TranscodeSummary) -> XMediaResult<()> {
        let Self {
            decoder, encoder, ..
        } = self;
        decoder.drain(|frame, state| {
            summary.frames_decoded += 1;
            forward_frame(encoder, frame, state)
        })
    }
}

/// 把源流解码得到的帧交给映射的输出流; 时间戳换算到输出流时间基
fn forward_frame(
    encoder: &mut Encoder,
    frame: &mut MediaFrame,
    state: &StreamState,
) -> XMediaResult<()> {
    let Some(dst) = state.dst_index else {
        return Err(XMediaError::StreamNotFound(format!(
            "源流 #{} 没有对应的输出流",
            state.src_index.unwrap_or_default()
        )));
    };
    let src_tb = state.descriptor.time_base;
    let dst_tb = encoder.codec_info(dst).and_then(|d| d.time_base);
    if let (Some(from), Some(to)) = (src_tb, dst_tb) {
        if from != to {
            frame.set_pts(frame.pts().map(|pts| rescale_q(pts, from, to)));
        }
    }
    encoder.write_frame_for_stream(frame, dst)
}

impl std::fmt::Debug for Transcoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transcoder")
            .field("options", &self.options)
            .field("decoder", &self.decoder)
            .field("encoder", &self.encoder)
            .field("opened", &self.opened)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_rejects_missing_output() {
        let opts = TranscodeOptions {
            input: "in.mkv".into(),
            ..TranscodeOptions::default()
        };
        assert!(Transcoder::new(opts, StatusReporter::silent()).is_err());
    }

    #[test]
    fn test_run_before_open() {
        let opts = TranscodeOptions {
            input: "in.mkv".into(),
            output: "out.mkv".into(),
            ..TranscodeOptions::default()
        };
        let mut t = Transcoder::new(opts, StatusReporter::silent()).unwrap();
        let err = t.run().unwrap_err();
        assert!(matches!(err, XMediaError::Lifecycle(_)));
    }

    #[test]
    fn test_interrupt_flag_is_shared() {
        let opts = TranscodeOptions {
            input: "in.mkv".into(),
            output: "out.mkv".into(),
            ..TranscodeOptions::default()
        };
        let t = Transcoder::new(opts, StatusReporter::silent()).unwrap();
        t.interrupt_flag().store(true, Ordering::SeqCst);
        assert!(t.interrupted.load(Ordering::SeqCst));
    }
}
