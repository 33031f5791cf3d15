//! 自定义输出 I/O.
//!
//! 复用器产出的字节经由运行时的 AVIOContext 回调交给 [`MuxerSink`].
//! 缓冲区大小即每次回调的最大字节数.

use std::fs::File;
use std::io::Write;
use std::os::raw::{c_int, c_void};
use std::ptr;

use ffmpeg_next::ffi;
use log::warn;
use xmedia_core::{XMediaError, XMediaResult};

/// 默认 I/O 缓冲区大小
pub const DEFAULT_IO_BUFFER_SIZE: usize = 64 * 1024;

/// 复用器输出目标
pub trait MuxerSink {
    /// 写入一段复用器输出, 返回实际写入的字节数
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize>;
}

/// 把任意 `Write` 适配为 [`MuxerSink`]
pub struct WriteSink<W: Write>(pub W);

impl<W: Write> MuxerSink for WriteSink<W> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.write_all(buf)?;
        Ok(buf.len())
    }
}

impl WriteSink<File> {
    /// 创建 (截断) 输出文件
    pub fn create(path: impl AsRef<std::path::Path>) -> XMediaResult<Self> {
        Ok(Self(File::create(path)?))
    }
}

impl<F> MuxerSink for F
where
    F: FnMut(&[u8]) -> std::io::Result<usize>,
{
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self(buf)
    }
}

unsafe extern "C" fn write_packet(opaque: *mut c_void, buf: *const u8, size: c_int) -> c_int {
    if opaque.is_null() || buf.is_null() || size < 0 {
        return ffi::AVERROR(ffi::EINVAL);
    }
    let sink = unsafe { &mut *(opaque as *mut Box<dyn MuxerSink>) };
    let data = unsafe { std::slice::from_raw_parts(buf, size as usize) };
    match sink.write(data) {
        Ok(n) => c_int::try_from(n).unwrap_or(size),
        Err(e) => {
            warn!("自定义输出写入失败: {e}");
            ffi::AVERROR_EXTERNAL
        }
    }
}

/// 自定义 I/O 上下文, 释放时回收 AVIOContext、其缓冲区与输出目标
pub struct CustomIo {
    avio: *mut ffi::AVIOContext,
    sink: *mut Box<dyn MuxerSink>,
}

impl CustomIo {
    /// 分配缓冲区并建立只写的 AVIOContext
    pub fn new(sink: Box<dyn MuxerSink>, buffer_size: usize) -> XMediaResult<Self> {
        let size = if buffer_size == 0 {
            DEFAULT_IO_BUFFER_SIZE
        } else {
            buffer_size
        };
        let size_c = c_int::try_from(size)
            .map_err(|_| XMediaError::InvalidArgument(format!("I/O 缓冲区过大: {size}")))?;

        let sink = Box::into_raw(Box::new(sink));
        unsafe {
            let buffer = ffi::av_malloc(size) as *mut u8;
            if buffer.is_null() {
                drop(Box::from_raw(sink));
                return Err(XMediaError::runtime(
                    ffi::AVERROR(ffi::ENOMEM),
                    format!("分配输出缓冲区失败: {size}"),
                ));
            }
            // 不同运行时版本的回调参数常量性不同, 函数签名一致
            let avio = ffi::avio_alloc_context(
                buffer,
                size_c,
                1,
                sink.cast(),
                None,
                Some(std::mem::transmute(
                    write_packet as unsafe extern "C" fn(*mut c_void, *const u8, c_int) -> c_int,
                )),
                None,
            );
            if avio.is_null() {
                ffi::av_free(buffer.cast());
                drop(Box::from_raw(sink));
                return Err(XMediaError::runtime(
                    ffi::AVERROR(ffi::ENOMEM),
                    "分配输出 I/O 上下文失败",
                ));
            }
            Ok(Self { avio, sink })
        }
    }

    /// AVIOContext 指针, 交给格式上下文的 `pb`
    pub fn as_mut_ptr(&mut self) -> *mut ffi::AVIOContext {
        self.avio
    }
}

impl Drop for CustomIo {
    fn drop(&mut self) {
        unsafe {
            if !self.avio.is_null() {
                ffi::avio_flush(self.avio);
                ffi::av_freep(ptr::addr_of_mut!((*self.avio).buffer).cast());
                ffi::avio_context_free(&mut self.avio);
            }
            if !self.sink.is_null() {
                drop(Box::from_raw(self.sink));
                self.sink = ptr::null_mut();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn test_write_sink_counts_bytes() {
        let mut sink = WriteSink(Vec::new());
        assert_eq!(MuxerSink::write(&mut sink, b"abc").unwrap(), 3);
        assert_eq!(sink.0, b"abc");
    }

    #[test]
    fn test_callback_receives_flushed_bytes() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = {
            let seen = Rc::clone(&seen);
            move |buf: &[u8]| -> std::io::Result<usize> {
                seen.borrow_mut().extend_from_slice(buf);
                Ok(buf.len())
            }
        };
        let mut io = CustomIo::new(Box::new(sink), 16).unwrap();
        unsafe {
            let payload = [7u8; 40];
            ffi::avio_write(io.as_mut_ptr(), payload.as_ptr(), payload.len() as c_int);
            ffi::avio_flush(io.as_mut_ptr());
        }
        drop(io);
        assert_eq!(seen.borrow().len(), 40);
    }
}
