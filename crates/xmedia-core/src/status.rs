//! 状态报告器.
//!
//! 把流水线事件按级别 (INFO / ERROR / DEBUG) 分发给用户回调. 错误消息会附带
//! 最近一次运行时状态码的文字描述. 库内部诊断走 `log`, 面向调用方的事件走这里.

use std::fmt;
use std::sync::Arc;

use bitflags::bitflags;

use crate::error::XMediaError;

bitflags! {
    /// 事件级别掩码
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct StatusKind: u16 {
        /// 一般信息
        const INFO  = 1 << 0;
        /// 错误
        const ERROR = 1 << 1;
        /// 调试信息
        const DEBUG = 1 << 2;
        /// 全部级别
        const ALL   = Self::INFO.bits() | Self::ERROR.bits() | Self::DEBUG.bits();
    }
}

/// 状态回调
pub type StatusCallback = Arc<dyn Fn(StatusKind, &str) + Send + Sync>;

/// 运行时状态码描述函数
pub type CodeDescriber = fn(i32) -> String;

fn describe_plain(code: i32) -> String {
    format!("运行时错误码 {code}")
}

/// 状态报告器
///
/// 克隆时复制级别掩码、回调与描述函数, 但缓存的运行时状态码归零.
pub struct StatusReporter {
    kinds: StatusKind,
    callback: Option<StatusCallback>,
    describe: CodeDescriber,
    code: i32,
}

impl StatusReporter {
    /// 创建报告器, 只有 `kinds` 中的级别会送达回调
    pub fn new<F>(kinds: StatusKind, callback: F) -> Self
    where
        F: Fn(StatusKind, &str) + Send + Sync + 'static,
    {
        Self {
            kinds,
            callback: Some(Arc::new(callback)),
            describe: describe_plain,
            code: 0,
        }
    }

    /// 不输出任何事件的报告器
    pub fn silent() -> Self {
        Self {
            kinds: StatusKind::empty(),
            callback: None,
            describe: describe_plain,
            code: 0,
        }
    }

    /// 替换运行时状态码描述函数
    pub fn with_describer(mut self, describe: CodeDescriber) -> Self {
        self.describe = describe;
        self
    }

    /// 启用的级别
    pub fn kinds(&self) -> StatusKind {
        self.kinds
    }

    /// 最近一次运行时状态码
    pub fn code(&self) -> i32 {
        self.code
    }

    /// 记录运行时状态码
    pub fn set_code(&mut self, code: i32) {
        self.code = code;
    }

    fn emit(&self, kind: StatusKind, msg: &str) -> bool {
        match &self.callback {
            Some(cb) if self.kinds.contains(kind) => {
                cb(kind, msg);
                true
            }
            _ => false,
        }
    }

    /// 报告一般信息, 返回是否送达
    pub fn info(&self, msg: impl AsRef<str>) -> bool {
        self.emit(StatusKind::INFO, msg.as_ref())
    }

    /// 报告调试信息, 返回是否送达
    pub fn debug(&self, msg: impl AsRef<str>) -> bool {
        self.emit(StatusKind::DEBUG, msg.as_ref())
    }

    /// 报告错误, 追加运行时状态码描述
    pub fn error(&self, msg: impl AsRef<str>) -> bool {
        if !self.kinds.contains(StatusKind::ERROR) {
            return false;
        }
        let detail = if self.code < 0 {
            (self.describe)(self.code)
        } else {
            "未知运行时错误".to_string()
        };
        self.emit(StatusKind::ERROR, &format!("{} ({detail})", msg.as_ref()))
    }

    /// 报告错误并原样返回, 便于 `return Err(status.fail(..))`
    pub fn fail(&mut self, err: XMediaError) -> XMediaError {
        match &err {
            XMediaError::Runtime { code, message } => {
                self.code = *code;
                self.error(message);
            }
            other => {
                self.code = 0;
                self.error(other.to_string());
            }
        }
        err
    }

    /// 以运行时状态码构造错误并报告
    pub fn runtime(&mut self, code: i32, msg: impl Into<String>) -> XMediaError {
        self.fail(XMediaError::runtime(code, msg))
    }
}

impl Clone for StatusReporter {
    fn clone(&self) -> Self {
        Self {
            kinds: self.kinds,
            callback: self.callback.clone(),
            describe: self.describe,
            code: 0,
        }
    }
}

impl Default for StatusReporter {
    fn default() -> Self {
        Self::silent()
    }
}

impl fmt::Debug for StatusReporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StatusReporter")
            .field("kinds", &self.kinds)
            .field("code", &self.code)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn collecting(kinds: StatusKind) -> (StatusReporter, Arc<Mutex<Vec<(StatusKind, String)>>>) {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        let reporter = StatusReporter::new(kinds, move |kind, msg| {
            sink.lock().unwrap().push((kind, msg.to_string()));
        });
        (reporter, events)
    }

    #[test]
    fn test_disabled_kind_is_silent() {
        let (reporter, events) = collecting(StatusKind::ERROR);
        assert!(!reporter.info("hello"));
        assert!(!reporter.debug("hello"));
        assert!(events.lock().unwrap().is_empty());
    }

    #[test]
    fn test_error_appends_runtime_description() {
        let (reporter, events) = collecting(StatusKind::ALL);
        let mut reporter = reporter.with_describer(|code| format!("desc{code}"));
        reporter.set_code(-11);
        assert!(reporter.error("写包失败"));
        reporter.set_code(0);
        reporter.error("打开失败");
        let events = events.lock().unwrap();
        assert_eq!(events[0], (StatusKind::ERROR, "写包失败 (desc-11)".to_string()));
        assert_eq!(events[1].1, "打开失败 (未知运行时错误)");
    }

    #[test]
    fn test_fail_records_code() {
        let (mut reporter, events) = collecting(StatusKind::ALL);
        let err = reporter.runtime(-5, "读包失败");
        assert_eq!(err.code(), Some(-5));
        assert_eq!(reporter.code(), -5);
        assert_eq!(events.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_clone_resets_code() {
        let (mut reporter, events) = collecting(StatusKind::INFO);
        reporter.set_code(-1);
        let copy = reporter.clone();
        assert_eq!(copy.code(), 0);
        assert_eq!(copy.kinds(), StatusKind::INFO);
        copy.info("来自副本");
        assert_eq!(events.lock().unwrap().len(), 1);
    }
}
