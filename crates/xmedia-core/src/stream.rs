//! 流记录状态与流表.
//!
//! 流表按插入顺序保存流记录, 支持按插入下标、源索引、目标索引查找.
//! 解码端记录设置源索引, 编码端记录设置目标索引, 另一侧由流水线在映射时补齐.
//! 记录只追加不删除, 下标在整个运行期间保持稳定.

use crate::descriptor::CodecDescriptor;

/// 流记录中与运行时无关的部分
#[derive(Debug, Clone, Default)]
pub struct StreamState {
    /// 编解码描述符 (副本)
    pub descriptor: CodecDescriptor,
    /// 输入侧流索引
    pub src_index: Option<usize>,
    /// 输出侧流索引
    pub dst_index: Option<usize>,
    /// 编解码器是否已打开
    pub codec_open: bool,
    /// 已写出的数据包数
    pub packet_count: u64,
    /// 最近写出的 PTS
    pub last_pts: Option<i64>,
    /// 最近写出的 DTS
    pub last_dts: Option<i64>,
}

impl StreamState {
    /// 以描述符创建
    pub fn new(descriptor: CodecDescriptor) -> Self {
        Self {
            descriptor,
            ..Self::default()
        }
    }
}

/// 可放入 [`StreamTable`] 的记录
pub trait HasStreamState {
    /// 只读状态
    fn state(&self) -> &StreamState;
    /// 可变状态
    fn state_mut(&mut self) -> &mut StreamState;
}

impl HasStreamState for StreamState {
    fn state(&self) -> &StreamState {
        self
    }

    fn state_mut(&mut self) -> &mut StreamState {
        self
    }
}

/// 有序流表
#[derive(Debug)]
pub struct StreamTable<T> {
    records: Vec<T>,
}

impl<T> Default for StreamTable<T> {
    fn default() -> Self {
        Self {
            records: Vec::new(),
        }
    }
}

impl<T: HasStreamState> StreamTable<T> {
    /// 创建空表
    pub fn new() -> Self {
        Self::default()
    }

    /// 追加记录, 返回插入下标
    pub fn push(&mut self, record: T) -> usize {
        self.records.push(record);
        self.records.len() - 1
    }

    /// 记录数
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// 是否为空
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// 按插入下标获取
    pub fn get(&self, index: usize) -> Option<&T> {
        self.records.get(index)
    }

    /// 按插入下标获取 (可变)
    pub fn get_mut(&mut self, index: usize) -> Option<&mut T> {
        self.records.get_mut(index)
    }

    /// 按源索引查找
    pub fn by_src(&self, src: usize) -> Option<&T> {
        self.records
            .iter()
            .find(|r| r.state().src_index == Some(src))
    }

    /// 按源索引查找 (可变)
    pub fn by_src_mut(&mut self, src: usize) -> Option<&mut T> {
        self.records
            .iter_mut()
            .find(|r| r.state().src_index == Some(src))
    }

    /// 按目标索引查找
    pub fn by_dst(&self, dst: usize) -> Option<&T> {
        self.records
            .iter()
            .find(|r| r.state().dst_index == Some(dst))
    }

    /// 按目标索引查找 (可变)
    pub fn by_dst_mut(&mut self, dst: usize) -> Option<&mut T> {
        self.records
            .iter_mut()
            .find(|r| r.state().dst_index == Some(dst))
    }

    /// 遍历全部记录
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.records.iter()
    }

    /// 遍历全部记录 (可变)
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut T> {
        self.records.iter_mut()
    }

    /// 下一个未被占用的源索引, 从当前记录数开始递增查找
    pub fn next_src_index(&self) -> usize {
        let mut index = self.records.len();
        while self.by_src(index).is_some() {
            index += 1;
        }
        index
    }

    /// 下一个未被占用的目标索引
    pub fn next_dst_index(&self) -> usize {
        let mut index = self.records.len();
        while self.by_dst(index).is_some() {
            index += 1;
        }
        index
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_src(src: usize) -> StreamState {
        StreamState {
            src_index: Some(src),
            ..StreamState::default()
        }
    }

    #[test]
    fn test_lookup_by_side() {
        let mut table = StreamTable::new();
        table.push(with_src(0));
        let i = table.push(with_src(3));
        table.get_mut(i).unwrap().dst_index = Some(1);

        assert_eq!(table.len(), 2);
        assert_eq!(table.by_src(3).unwrap().dst_index, Some(1));
        assert_eq!(table.by_dst(1).unwrap().src_index, Some(3));
        assert!(table.by_src(1).is_none());
        assert!(table.by_dst(0).is_none());
    }

    #[test]
    fn test_next_src_index_skips_taken() {
        let mut table = StreamTable::new();
        table.push(with_src(1));
        // 长度为 1, 但 1 已被占用
        assert_eq!(table.next_src_index(), 2);
        table.push(with_src(2));
        assert_eq!(table.next_src_index(), 3);
    }

    #[test]
    fn test_counters_start_unset() {
        let state = StreamState::new(CodecDescriptor::default());
        assert_eq!(state.packet_count, 0);
        assert!(state.last_pts.is_none());
        assert!(!state.codec_open);
    }
}
