//! # XMedia
//!
//! 基于 FFmpeg 运行时的转码/转封装流水线.
//!
//! - **解码**: 打开任意输入, 枚举音视频流, 逐帧回调;
//! - **编码**: 按描述符建立输出流, 五种时间戳策略与单调性修正;
//! - **帧变换**: 拉伸缩放、等比缩放 (黑边)、重采样;
//! - **码流工具**: NAL 单元扫描、H.264 extradata、OpusHead;
//! - **元数据**: 字段与章节, 文本格式加载.
//!
//! # 快速开始
//!
//! ```rust,no_run
//! use xmedia::core::StatusReporter;
//! use xmedia::{TranscodeOptions, Transcoder};
//!
//! let options = TranscodeOptions {
//!     input: "input.mkv".into(),
//!     output: "output.mkv".into(),
//!     remux: true,
//!     ..TranscodeOptions::default()
//! };
//! let mut transcoder = Transcoder::new(options, StatusReporter::silent())?;
//! transcoder.open()?;
//! let summary = transcoder.run()?;
//! println!("读取 {} 个数据包", summary.packets_read);
//! # Ok::<(), xmedia::core::XMediaError>(())
//! ```
//!
//! # Crate 结构
//!
//! | Crate | 功能 |
//! |-------|------|
//! | `xmedia-core` | 运行时无关的核心类型 |
//! | `xmedia-codec` | NAL / H.264 / Opus 码流工具 |
//! | `xmedia-scale` | YUV420P 黑边与叠加 |
//! | `xmedia-format` | FFmpeg 运行时绑定 |

pub mod options;
pub mod transcoder;

/// 核心类型
pub use xmedia_core as core;

/// 码流工具
pub use xmedia_codec as codec;

/// 平面像素处理
pub use xmedia_scale as scale;

/// 运行时绑定
pub use xmedia_format as format;

pub use options::{StreamOverrides, TranscodeOptions, parse_frame_rate};
pub use transcoder::{TranscodeSummary, Transcoder};

/// 获取 XMedia 版本号
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
