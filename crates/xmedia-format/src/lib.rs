//! # xmedia-format
//!
//! XMedia 与 FFmpeg 运行时的绑定层: 解码器、编码器、帧变换与自定义输出 I/O.
//!
//! 描述符、流表、时间戳策略等运行时无关的部分位于 `xmedia-core`,
//! 本 crate 只负责把它们落到运行时结构上.

pub mod codec;
pub mod convert;
pub mod decoder;
pub mod encoder;
pub mod frame;
pub mod io;
pub mod meta;
pub mod stream;

// 重导出常用类型
pub use convert::describe_code;
pub use decoder::{Decoder, SEEK_BACKWARD};
pub use encoder::{Encoder, OutputTarget, PacketVerdict};
pub use frame::MediaFrame;
pub use io::{DEFAULT_IO_BUFFER_SIZE, MuxerSink, WriteSink};
pub use stream::StreamRecord;

pub use ffmpeg_next::Packet;

use xmedia_core::{StatusKind, StatusReporter, XMediaError, XMediaResult};

/// 初始化运行时 (含设备与网络协议)
pub fn init() -> XMediaResult<()> {
    ffmpeg_next::init().map_err(|e| XMediaError::runtime(i32::from(e), "初始化运行时失败"))?;
    ffmpeg_next::format::network::init();
    Ok(())
}

/// 设置运行时自身的日志级别: 调试模式为 verbose, 否则只输出警告
pub fn set_log_level(debug: bool) {
    use ffmpeg_next::util::log::{Level, set_level};
    set_level(if debug { Level::Verbose } else { Level::Warning });
}

/// 创建附带运行时错误描述的状态报告器
pub fn status_reporter<F>(kinds: StatusKind, callback: F) -> StatusReporter
where
    F: Fn(StatusKind, &str) + Send + Sync + 'static,
{
    StatusReporter::new(kinds, callback).with_describer(describe_code)
}
