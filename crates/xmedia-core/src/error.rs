//! 统一错误类型定义.
//!
//! 所有 XMedia crate 共用的错误类型, 失败在返回前已经通过状态报告器输出.

use thiserror::Error;

/// XMedia 统一错误类型
#[derive(Debug, Error)]
pub enum XMediaError {
    /// 无效参数 (缺少必填项、数值越界等)
    #[error("无效参数: {0}")]
    InvalidArgument(String),

    /// 底层运行时返回负状态码
    #[error("{message} (code {code})")]
    Runtime {
        /// 运行时状态码 (负值)
        code: i32,
        /// 人类可读描述
        message: String,
    },

    /// 按源索引或目标索引未找到流
    #[error("未找到流: {0}")]
    StreamNotFound(String),

    /// 调用顺序错误 (如未打开即解码、未写头即写包)
    #[error("生命周期错误: {0}")]
    Lifecycle(String),

    /// 已到达流末尾
    #[error("已到达流末尾")]
    Eof,

    /// 无效数据 (损坏的码流等)
    #[error("无效数据: {0}")]
    InvalidData(String),

    /// 未找到指定的编解码器
    #[error("未找到编解码器: {0}")]
    CodecNotFound(String),

    /// 不支持的操作
    #[error("不支持的操作: {0}")]
    Unsupported(String),

    /// I/O 错误
    #[error("I/O 错误: {0}")]
    Io(#[from] std::io::Error),

    /// JSON 解析错误
    #[error("JSON 错误: {0}")]
    Json(#[from] serde_json::Error),
}

impl XMediaError {
    /// 创建运行时错误
    pub fn runtime(code: i32, message: impl Into<String>) -> Self {
        Self::Runtime {
            code,
            message: message.into(),
        }
    }

    /// 错误对应的运行时状态码 (仅 Runtime 变体)
    pub fn code(&self) -> Option<i32> {
        match self {
            Self::Runtime { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// 是否为流末尾
    pub fn is_eof(&self) -> bool {
        matches!(self, Self::Eof)
    }

    /// 是否可恢复: 损坏的单个数据包不终止整个流水线
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::InvalidData(_))
    }
}

/// XMedia 统一 Result 类型
pub type XMediaResult<T> = Result<T, XMediaError>;
