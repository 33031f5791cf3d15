//! 带运行时句柄的流记录.

use std::fmt;

use ffmpeg_next::codec;
use ffmpeg_next::ffi;
use xmedia_core::{CodecDescriptor, HasStreamState, StreamState};

use crate::frame::MediaFrame;

/// 流记录: 运行时无关的状态 + 编解码器上下文 + 复用的帧对象
///
/// 上下文在记录释放时由 `codec::Context` 一并释放.
pub struct StreamRecord {
    /// 状态与描述符
    pub state: StreamState,
    codec: Option<codec::Context>,
    frame: Option<MediaFrame>,
}

impl StreamRecord {
    /// 以描述符创建, 尚未关联编解码器
    pub fn new(descriptor: CodecDescriptor) -> Self {
        let frame = MediaFrame::empty(descriptor.media_type);
        Self {
            state: StreamState::new(descriptor),
            codec: None,
            frame,
        }
    }

    /// 描述符
    pub fn descriptor(&self) -> &CodecDescriptor {
        &self.state.descriptor
    }

    /// 关联编解码器上下文 (取得所有权)
    pub(crate) fn attach_codec(&mut self, ctx: codec::Context) {
        self.codec = Some(ctx);
    }

    /// 释放编解码器上下文
    pub(crate) fn release_codec(&mut self) {
        self.codec = None;
        self.state.codec_open = false;
    }

    /// 编解码器上下文指针, 未关联时为空
    pub(crate) fn codec_ptr(&mut self) -> *mut ffi::AVCodecContext {
        match self.codec.as_mut() {
            Some(ctx) => unsafe { ctx.as_mut_ptr() },
            None => std::ptr::null_mut(),
        }
    }

    /// 拆分出状态与复用帧, 供解码循环同时读写
    pub(crate) fn split_frame(&mut self) -> (&StreamState, Option<&mut MediaFrame>) {
        (&self.state, self.frame.as_mut())
    }
}

impl HasStreamState for StreamRecord {
    fn state(&self) -> &StreamState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut StreamState {
        &mut self.state
    }
}

impl fmt::Debug for StreamRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamRecord")
            .field("state", &self.state)
            .field("has_codec", &self.codec.is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use xmedia_core::{CodecId, MediaType, PixelFormat, StreamTable};

    #[test]
    fn test_record_without_codec() {
        let desc = CodecDescriptor::video(CodecId::H264, 320, 240, PixelFormat::Yuv420p);
        let mut record = StreamRecord::new(desc);
        assert!(record.codec_ptr().is_null());
        let (state, frame) = record.split_frame();
        assert!(!state.codec_open);
        assert_eq!(frame.map(|f| f.media_type()), Some(MediaType::Video));
    }

    #[test]
    fn test_table_of_records() {
        let mut table = StreamTable::new();
        let mut record = StreamRecord::new(CodecDescriptor::new(MediaType::Audio, CodecId::Aac));
        record.state.src_index = Some(4);
        table.push(record);
        assert_eq!(table.by_src(4).map(|r| r.descriptor().codec_id), Some(CodecId::Aac));
    }
}
