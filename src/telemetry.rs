//! 日志初始化

use tracing_subscriber::{EnvFilter, fmt};

use crate::config::{LogFormat, LoggingConfig};

/// 优先使用环境变量 RUST_LOG，否则使用配置的级别
pub fn env_filter(logging_config: &LoggingConfig) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging_config.level))
}

/// 从配置初始化日志系统
///
/// 重复初始化（例如测试中）静默忽略
pub fn init_tracing_from_config(logging_config: &LoggingConfig) {
    let builder = fmt::Subscriber::builder()
        .with_target(logging_config.with_target)
        .with_thread_ids(logging_config.with_thread_ids)
        .with_file(logging_config.with_file)
        .with_line_number(logging_config.with_line_number)
        .with_env_filter(env_filter(logging_config));

    let _ = match logging_config.format {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Pretty => builder.try_init(),
    };
}
