//! 错误处理模块
//!
//! 统一的错误类型，带错误代码分类，两个服务共用

pub mod builder;
pub mod code;

pub use builder::ErrorBuilder;
pub use code::ErrorCode;

use thiserror::Error;

/// 统一错误类型
#[derive(Error, Debug)]
pub enum SignupError {
    /// 带错误代码的错误（Kafka、HTTP 边界等）
    #[error("[{code}] {reason}")]
    Localized {
        code: ErrorCode,
        reason: String,
        details: Option<String>,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// 配置错误
    #[error("configuration error: {0}")]
    Config(String),

    /// IO 错误
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl SignupError {
    /// 创建带错误代码的错误
    pub fn localized(code: ErrorCode, reason: impl Into<String>) -> Self {
        ErrorBuilder::new(code, reason).build_error()
    }

    /// 创建配置错误
    pub fn config(msg: impl Into<String>) -> Self {
        SignupError::Config(msg.into())
    }

    /// 创建消息发送失败错误
    pub fn message_send_failed(reason: impl Into<String>) -> Self {
        Self::localized(ErrorCode::MessageSendFailed, reason)
    }

    /// 获取错误代码
    pub fn code(&self) -> Option<ErrorCode> {
        match self {
            SignupError::Localized { code, .. } => Some(*code),
            SignupError::Config(_) => Some(ErrorCode::ConfigurationError),
            SignupError::Io(_) => None,
        }
    }

    /// 获取错误原因
    pub fn reason(&self) -> String {
        match self {
            SignupError::Localized { reason, .. } => reason.clone(),
            SignupError::Config(msg) => msg.clone(),
            SignupError::Io(err) => err.to_string(),
        }
    }

    /// 获取错误详情
    pub fn details(&self) -> Option<&str> {
        match self {
            SignupError::Localized { details, .. } => details.as_deref(),
            _ => None,
        }
    }

    /// 判断是否为可重试的错误
    pub fn is_retryable(&self) -> bool {
        self.code().map(|code| code.is_retryable()).unwrap_or(false)
    }
}

/// 结果类型别名
pub type Result<T> = std::result::Result<T, SignupError>;

/// 将 Kafka 客户端错误转换为 `SignupError`
pub fn map_kafka_error<E, S>(error: E, code: ErrorCode, reason: S) -> SignupError
where
    E: std::fmt::Display,
    S: Into<String>,
{
    ErrorBuilder::new(code, reason.into())
        .details(error.to_string())
        .build_error()
}
