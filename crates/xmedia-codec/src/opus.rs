//! OpusHead (RFC 7845 §5.1) 生成与解析.
//!
//! ```text
//! "OpusHead"(8) | version(1) | channels(1) | pre_skip(2 LE)
//! | input_sample_rate(4 LE) | output_gain(2 LE, 有符号) | mapping_family(1)
//! ```

use std::io::{Cursor, Read};

use byteorder::{LittleEndian, ReadBytesExt};
use bytes::BufMut;
use xmedia_core::{XMediaError, XMediaResult};

/// OpusHead 魔数
pub const OPUS_MAGIC: &[u8; 8] = b"OpusHead";

/// 基本 OpusHead 长度
pub const OPUS_HEAD_SIZE: usize = 19;

/// OpusHead 可变字段
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpusHead {
    /// 声道数
    pub channels: u8,
    /// 解码起始需丢弃的采样数 (48kHz)
    pub pre_skip: u16,
    /// 原始输入采样率
    pub input_sample_rate: u32,
    /// 输出增益 (Q7.8 dB)
    pub output_gain: i16,
    /// 声道映射族
    pub mapping_family: u8,
}

impl OpusHead {
    /// 常用参数: 无预跳过、零增益、映射族 0
    pub fn new(channels: u8, input_sample_rate: u32) -> Self {
        Self {
            channels,
            pre_skip: 0,
            input_sample_rate,
            output_gain: 0,
            mapping_family: 0,
        }
    }

    /// 序列化为 19 字节 extradata
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(OPUS_HEAD_SIZE);
        out.put_slice(OPUS_MAGIC);
        out.put_u8(1);
        out.put_u8(self.channels);
        out.put_u16_le(self.pre_skip);
        out.put_u32_le(self.input_sample_rate);
        out.put_i16_le(self.output_gain);
        out.put_u8(self.mapping_family);
        out
    }

    /// 从 extradata 解析
    pub fn parse(data: &[u8]) -> XMediaResult<Self> {
        if data.len() < OPUS_HEAD_SIZE {
            return Err(XMediaError::InvalidData(format!(
                "OpusHead 长度不足: {} < {OPUS_HEAD_SIZE}",
                data.len()
            )));
        }
        let mut cur = Cursor::new(data);
        let mut magic = [0u8; 8];
        cur.read_exact(&mut magic)?;
        if &magic != OPUS_MAGIC {
            return Err(XMediaError::InvalidData("OpusHead 魔数不匹配".into()));
        }
        let _version = cur.read_u8()?;
        Ok(Self {
            channels: cur.read_u8()?,
            pre_skip: cur.read_u16::<LittleEndian>()?,
            input_sample_rate: cur.read_u32::<LittleEndian>()?,
            output_gain: cur.read_i16::<LittleEndian>()?,
            mapping_family: cur.read_u8()?,
        })
    }
}
