//! # xmedia-core
//!
//! XMedia 转码流水线的核心类型, 不依赖任何编解码运行时.
//!
//! 包括编解码描述符、流表、时间戳策略、元数据与章节、帧变换决策以及状态报告器.
//! 与运行时的绑定见 `xmedia-format`.

pub mod channel_layout;
pub mod codec_id;
pub mod descriptor;
pub mod error;
pub mod frame_params;
pub mod media_type;
pub mod metadata;
pub mod pixel_format;
pub mod rational;
pub mod sample_format;
pub mod status;
pub mod stream;
pub mod timestamp;

// 重导出常用类型
pub use channel_layout::ChannelLayout;
pub use codec_id::{CodecId, CodecName};
pub use descriptor::{CodecDescriptor, Extradata, ScalePolicy};
pub use error::{XMediaError, XMediaResult};
pub use frame_params::FrameParams;
pub use media_type::MediaType;
pub use metadata::{Chapter, Metadata};
pub use pixel_format::PixelFormat;
pub use rational::Rational;
pub use sample_format::SampleFormat;
pub use status::{StatusKind, StatusReporter};
pub use stream::{HasStreamState, StreamState, StreamTable};
pub use timestamp::{TimestampFixer, TsMode};
