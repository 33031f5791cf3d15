//! H.264 参数集提取与 extradata 拼装.
//!
//! extradata 采用 Annex-B 形式: `00 00 00 01 SPS 00 00 00 01 PPS`.

use bytes::{BufMut, Bytes, BytesMut};
use xmedia_core::{XMediaError, XMediaResult};

use crate::nal::{NAL_PPS, NAL_SPS, parse_units};

/// Annex-B 4 字节起始码
pub const START_CODE: [u8; 4] = [0x00, 0x00, 0x00, 0x01];

/// 从码流中取得的 SPS 与 PPS (含 NAL 头部字节)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct H264ParameterSets<'a> {
    /// 序列参数集
    pub sps: &'a [u8],
    /// 图像参数集
    pub pps: &'a [u8],
}

impl<'a> H264ParameterSets<'a> {
    /// 在 Annex-B 码流中查找第一个 SPS 和第一个 PPS
    pub fn find(buf: &'a [u8]) -> Option<Self> {
        let units = parse_units(buf);
        let first = |kind: u8| {
            units
                .iter()
                .find(|u| u.unit_type == kind && u.size > 0)
                .map(|u| u.payload(buf))
        };
        Some(Self {
            sps: first(NAL_SPS)?,
            pps: first(NAL_PPS)?,
        })
    }

    /// 拼装 extradata, 长度为 `sps + pps + 8`
    pub fn to_extradata(&self) -> Bytes {
        let mut out = BytesMut::with_capacity(self.sps.len() + self.pps.len() + 8);
        out.put_slice(&START_CODE);
        out.put_slice(self.sps);
        out.put_slice(&START_CODE);
        out.put_slice(self.pps);
        out.freeze()
    }
}

/// 由独立的 SPS/PPS 拼装 extradata
pub fn build_extradata(sps: &[u8], pps: &[u8]) -> XMediaResult<Bytes> {
    if sps.is_empty() || pps.is_empty() {
        return Err(XMediaError::InvalidArgument(
            "H.264: 拼装 extradata 需要非空的 SPS 与 PPS".into(),
        ));
    }
    Ok(H264ParameterSets { sps, pps }.to_extradata())
}

/// 从一帧 Annex-B 数据直接生成 extradata, 缺少 SPS 或 PPS 时返回 `None`
pub fn extradata_from_stream(buf: &[u8]) -> Option<Bytes> {
    H264ParameterSets::find(buf).map(|sets| sets.to_extradata())
}
