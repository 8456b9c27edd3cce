//! 错误代码定义
//!
//! 错误代码按类别分组，每个类别占用1000个代码范围：
//! - 1000-1999: 配置相关错误
//! - 4000-4999: 消息相关错误
//! - 6000-6999: 系统相关错误
//! - 9000-9999: 通用错误

use serde::{Deserialize, Serialize};
use std::fmt;

/// 错误代码枚举
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(u32)]
pub enum ErrorCode {
    // ============================================================
    // 配置相关错误 (1000-1999)
    // ============================================================
    ConfigurationError = 1000,

    // ============================================================
    // 消息相关错误 (4000-4999)
    // ============================================================
    MessageSendFailed = 4000,
    MessageReceiveFailed = 4001,
    MessageCommitFailed = 4002,
    MessageHandleFailed = 4003,

    // ============================================================
    // 系统相关错误 (6000-6999)
    // ============================================================
    InternalError = 6000,
    ServiceUnavailable = 6001,
    BrokerUnavailable = 6002,

    // ============================================================
    // 通用错误 (9000-9999)
    // ============================================================
    InvalidParameter = 9001,
    OperationTimeout = 9004,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl ErrorCode {
    /// 获取错误代码的数字值
    #[inline]
    pub fn as_u32(&self) -> u32 {
        *self as u32
    }

    /// 获取错误代码的字符串表示
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::ConfigurationError => "CONFIGURATION_ERROR",
            ErrorCode::MessageSendFailed => "MESSAGE_SEND_FAILED",
            ErrorCode::MessageReceiveFailed => "MESSAGE_RECEIVE_FAILED",
            ErrorCode::MessageCommitFailed => "MESSAGE_COMMIT_FAILED",
            ErrorCode::MessageHandleFailed => "MESSAGE_HANDLE_FAILED",
            ErrorCode::InternalError => "INTERNAL_ERROR",
            ErrorCode::ServiceUnavailable => "SERVICE_UNAVAILABLE",
            ErrorCode::BrokerUnavailable => "BROKER_UNAVAILABLE",
            ErrorCode::InvalidParameter => "INVALID_PARAMETER",
            ErrorCode::OperationTimeout => "OPERATION_TIMEOUT",
        }
    }

    /// 判断是否为可重试的错误
    ///
    /// 配置和参数错误重试也不会成功
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ErrorCode::MessageSendFailed
                | ErrorCode::MessageReceiveFailed
                | ErrorCode::MessageCommitFailed
                | ErrorCode::ServiceUnavailable
                | ErrorCode::BrokerUnavailable
                | ErrorCode::OperationTimeout
        )
    }
}
