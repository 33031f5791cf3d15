//! NAL (Network Abstraction Layer) 单元扫描.
//!
//! # Annex B 格式
//!
//! Annex B 使用起始码 (start code) 分隔 NAL 单元:
//! - 3 字节起始码: `00 00 01`
//! - 4 字节起始码: `00 00 00 01`
//!
//! # NAL 头部 (1 字节)
//! ```text
//! ┌─────────────────────────────────────┐
//! │ forbidden(1) | ref_idc(2) | type(5) │
//! └─────────────────────────────────────┘
//! ```
//!
//! 每个单元的大小由下一个单元的起始码位置回填, 最后一个单元延伸到缓冲区末尾.

/// 序列参数集 (SPS) 的单元类型
pub const NAL_SPS: u8 = 7;

/// 图像参数集 (PPS) 的单元类型
pub const NAL_PPS: u8 = 8;

/// 缓冲区中的一个 NAL 单元 (只记录位置, 不复制数据)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NalUnit {
    /// 起始码位置
    pub nal_pos: usize,
    /// 起始码之后的数据位置 (NAL 头部字节)
    pub data_pos: usize,
    /// 单元类型 (头部低 5 位)
    pub unit_type: u8,
    /// 参考标志 (头部第 5 位)
    pub reference: bool,
    /// 数据长度 (含头部字节, 不含起始码)
    pub size: usize,
}

impl NalUnit {
    /// 起始码长度
    pub fn prefix_len(&self) -> usize {
        self.data_pos - self.nal_pos
    }

    /// 单元数据 (含头部字节)
    pub fn payload<'a>(&self, buf: &'a [u8]) -> &'a [u8] {
        &buf[self.data_pos..self.data_pos + self.size]
    }
}

/// 检查 `pos` 处的起始码, 先查 3 字节形式再查 4 字节形式, 返回起始码长度
///
/// 调用方保证 `pos + 4 <= buf.len()`.
pub fn start_code_len(buf: &[u8], pos: usize) -> usize {
    match &buf[pos..pos + 4] {
        [0, 0, 1, _] => 3,
        [0, 0, 0, 1] => 4,
        _ => 0,
    }
}

/// 枚举缓冲区中的全部 NAL 单元
///
/// 匹配到起始码后跳过起始码继续扫描, 4 字节起始码只产生一个单元.
pub fn parse_units(buf: &[u8]) -> Vec<NalUnit> {
    let mut units: Vec<NalUnit> = Vec::new();
    let mut i = 0;

    while i + 4 < buf.len() {
        let sc = start_code_len(buf, i);
        if sc == 0 {
            i += 1;
            continue;
        }
        let data_pos = i + sc;
        let header = buf[data_pos];
        units.push(NalUnit {
            nal_pos: i,
            data_pos,
            unit_type: header & 0x1F,
            reference: header & 0x20 != 0,
            size: 0,
        });
        i = data_pos;
    }

    // 回填大小
    let ends: Vec<usize> = units
        .iter()
        .skip(1)
        .map(|u| u.nal_pos)
        .chain(std::iter::once(buf.len()))
        .collect();
    for (unit, end) in units.iter_mut().zip(ends) {
        unit.size = end - unit.data_pos;
    }

    log::trace!("NAL 扫描: {} 字节, {} 个单元", buf.len(), units.len());
    units
}
