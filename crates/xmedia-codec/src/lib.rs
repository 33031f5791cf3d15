//! # xmedia-codec
//!
//! 与编解码运行时无关的码流工具.
//!
//! - [`nal`]: Annex-B 起始码扫描与 NAL 单元枚举;
//! - [`h264`]: 提取 SPS/PPS 并拼装 H.264 extradata;
//! - [`opus`]: 生成与解析 19 字节 OpusHead.

pub mod h264;
pub mod nal;
pub mod opus;

pub use h264::H264ParameterSets;
pub use nal::{NAL_PPS, NAL_SPS, NalUnit, parse_units};
pub use opus::OpusHead;
