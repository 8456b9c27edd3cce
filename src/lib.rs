//! Signup Notify
//!
//! user-service 把新用户邮箱写入 Kafka topic `user-signups`，
//! notification-service 以消费者组 `notification-group` 读取并记录日志。
//! 投递保证（acks=all、幂等、重试）完全交给 Kafka 客户端配置。

pub mod config;
pub mod consumer;
pub mod error;
pub mod http;
pub mod kafka;
pub mod producer;
pub mod retry;
pub mod runtime;
pub mod telemetry;

pub use config::{AppConfig, DEFAULT_CONSUMER_GROUP, DEFAULT_TOPIC};
pub use consumer::{LoggingSignupHandler, SignupHandler, UserSignupConsumer};
pub use error::{ErrorBuilder, ErrorCode, Result, SignupError};
pub use producer::{SignupPublisher, UserSignupProducer};
pub use runtime::ServiceRuntime;
