//! 服务配置
//!
//! 两个服务共用同一套配置结构，从 TOML 文件加载，再用环境变量覆盖。
//! 所有字段都有默认值，空文件也是合法配置。

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{Result, SignupError};
use crate::kafka::{KafkaConsumerConfig, KafkaProducerConfig};

/// 注册事件 topic
pub const DEFAULT_TOPIC: &str = "user-signups";
/// 通知服务的消费者组
pub const DEFAULT_CONSUMER_GROUP: &str = "notification-group";

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct AppConfig {
    pub service: ServiceConfig,
    pub kafka: KafkaConfig,
    pub http: HttpConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub name: String,
    pub version: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: "signup-notify".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Kafka 连接与 topic 配置
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct KafkaConfig {
    /// Kafka 服务器地址列表，逗号分隔
    pub bootstrap_servers: String,
    pub topic: String,
    /// 客户端标识
    pub client_id: Option<String>,
    pub producer: ProducerSettings,
    pub consumer: ConsumerSettings,
}

impl Default for KafkaConfig {
    fn default() -> Self {
        Self {
            bootstrap_servers: "localhost:9092".to_string(),
            topic: DEFAULT_TOPIC.to_string(),
            client_id: None,
            producer: ProducerSettings::default(),
            consumer: ConsumerSettings::default(),
        }
    }
}

/// 生产者调优参数
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ProducerSettings {
    /// 确认级别，启用幂等性时强制为 "all"
    pub acks: String,
    pub retries: u32,
    pub enable_idempotence: bool,
    /// 批量大小（字节）
    pub batch_size: usize,
    pub linger_ms: u64,
    /// 发送缓冲区总大小（字节）
    pub buffer_memory_bytes: usize,
    pub max_in_flight_requests: u32,
    pub compression_type: String,
    pub request_timeout_ms: u64,
    /// 单条消息从入队到确认的总时限（毫秒）
    pub message_timeout_ms: u64,
    pub retry_backoff_ms: u64,
    /// 本地队列满时等待入队的时间（毫秒）
    pub send_timeout_ms: u64,
}

impl Default for ProducerSettings {
    fn default() -> Self {
        Self {
            acks: "all".to_string(),
            retries: 3,
            enable_idempotence: true,
            batch_size: 16 * 1024,
            linger_ms: 1,
            buffer_memory_bytes: 32 * 1024 * 1024,
            max_in_flight_requests: 5,
            compression_type: "snappy".to_string(),
            request_timeout_ms: 30_000,
            message_timeout_ms: 120_000,
            retry_backoff_ms: 100,
            send_timeout_ms: 5_000,
        }
    }
}

/// 消费者调优参数
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ConsumerSettings {
    pub group_id: String,
    /// "earliest" / "latest" / "error"
    pub auto_offset_reset: String,
    pub enable_auto_commit: bool,
    pub max_poll_interval_ms: u64,
    pub session_timeout_ms: u64,
    pub heartbeat_interval_ms: u64,
    pub fetch_min_bytes: usize,
    pub fetch_max_wait_ms: u64,
    /// 同组内并发消费者实例数
    pub concurrency: usize,
    /// 连续接收失败的最大重试次数
    pub max_receive_retries: usize,
    /// 处理器遇到可重试错误时的最大尝试次数，用尽后跳过该消息
    pub max_handle_attempts: usize,
    pub retry_base_delay_ms: u64,
    pub retry_max_delay_ms: u64,
}

impl Default for ConsumerSettings {
    fn default() -> Self {
        Self {
            group_id: DEFAULT_CONSUMER_GROUP.to_string(),
            auto_offset_reset: "earliest".to_string(),
            enable_auto_commit: false,
            max_poll_interval_ms: 300_000,
            session_timeout_ms: 10_000,
            heartbeat_interval_ms: 3_000,
            fetch_min_bytes: 1,
            fetch_max_wait_ms: 500,
            concurrency: 3,
            max_receive_retries: 5,
            max_handle_attempts: 3,
            retry_base_delay_ms: 200,
            retry_max_delay_ms: 10_000,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HttpConfig {
    pub address: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            address: "0.0.0.0:8080".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// 日志配置
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// 日志级别，`RUST_LOG` 优先
    pub level: String,
    pub format: LogFormat,
    pub with_target: bool,
    pub with_thread_ids: bool,
    pub with_file: bool,
    pub with_line_number: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
            with_target: true,
            with_thread_ids: false,
            with_file: false,
            with_line_number: false,
        }
    }
}

impl AppConfig {
    /// 从 TOML 文件加载
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| SignupError::config(e.to_string()))
    }

    /// 加载完整配置：文件（如果存在）-> 环境变量覆盖 -> 校验
    ///
    /// 调用时日志通常还没有初始化，配置来源随结果一起返回，由调用方在初始化日志之后输出
    pub fn load(path: Option<&Path>) -> Result<(Self, ConfigSource)> {
        let (mut config, source) = match path {
            Some(path) if path.exists() => {
                (Self::load_from_file(path)?, ConfigSource::File(path.to_path_buf()))
            }
            Some(path) => (Self::default(), ConfigSource::Missing(path.to_path_buf())),
            None => (Self::default(), ConfigSource::Defaults),
        };

        config.apply_env_overrides();
        config.validate()?;
        Ok((config, source))
    }

    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    /// 用给定的查找函数应用覆盖项，空值忽略
    pub fn apply_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("KAFKA_BOOTSTRAP_SERVERS") {
            self.kafka.bootstrap_servers = v;
        }
        if let Some(v) = get("KAFKA_CONSUMER_GROUP_ID") {
            self.kafka.consumer.group_id = v;
        }
        if let Some(v) = get("KAFKA_TOPIC") {
            self.kafka.topic = v;
        }
        if let Some(v) = get("HTTP_ADDRESS") {
            self.http.address = v;
        }
        if let Some(v) = get("LOG_LEVEL") {
            self.logging.level = v;
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.kafka.bootstrap_servers.trim().is_empty() {
            return Err(SignupError::config("kafka.bootstrap_servers must not be empty"));
        }
        if self.kafka.topic.trim().is_empty() {
            return Err(SignupError::config("kafka.topic must not be empty"));
        }
        if self.kafka.consumer.group_id.trim().is_empty() {
            return Err(SignupError::config("kafka.consumer.group_id must not be empty"));
        }
        if self.kafka.consumer.max_handle_attempts == 0 {
            return Err(SignupError::config("kafka.consumer.max_handle_attempts must be at least 1"));
        }
        if self.kafka.consumer.concurrency == 0 {
            return Err(SignupError::config("kafka.consumer.concurrency must be at least 1"));
        }
        Ok(())
    }
}

/// 配置来源
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    File(PathBuf),
    /// 指定的文件不存在，使用默认值
    Missing(PathBuf),
    /// 没有指定配置文件
    Defaults,
}

impl ConfigSource {
    pub fn log(&self) {
        match self {
            ConfigSource::File(path) => {
                info!(path = %path.display(), "Loaded configuration file");
            }
            ConfigSource::Missing(path) => {
                warn!(path = %path.display(), "Configuration file not found, using defaults");
            }
            ConfigSource::Defaults => {
                info!("No configuration file given, using defaults");
            }
        }
    }
}

/// 两个服务共用的命令行参数
#[derive(clap::Parser, Debug, Clone, Default)]
#[command(version = env!("CARGO_PKG_VERSION"), long_about = None)]
pub struct ServiceArgs {
    /// 配置文件路径
    #[arg(long, env = "SIGNUP_CONFIG_PATH")]
    pub config: Option<PathBuf>,
}

impl KafkaProducerConfig for AppConfig {
    fn kafka_bootstrap(&self) -> &str {
        &self.kafka.bootstrap_servers
    }

    fn client_id(&self) -> Option<&str> {
        self.kafka.client_id.as_deref()
    }

    fn acks(&self) -> &str {
        &self.kafka.producer.acks
    }

    fn retries(&self) -> u32 {
        self.kafka.producer.retries
    }

    fn enable_idempotence(&self) -> bool {
        self.kafka.producer.enable_idempotence
    }

    fn batch_size(&self) -> usize {
        self.kafka.producer.batch_size
    }

    fn linger_ms(&self) -> u64 {
        self.kafka.producer.linger_ms
    }

    fn buffer_memory_bytes(&self) -> usize {
        self.kafka.producer.buffer_memory_bytes
    }

    fn max_in_flight_requests(&self) -> u32 {
        self.kafka.producer.max_in_flight_requests
    }

    fn compression_type(&self) -> &str {
        &self.kafka.producer.compression_type
    }

    fn request_timeout_ms(&self) -> u64 {
        self.kafka.producer.request_timeout_ms
    }

    fn message_timeout_ms(&self) -> u64 {
        self.kafka.producer.message_timeout_ms
    }

    fn retry_backoff_ms(&self) -> u64 {
        self.kafka.producer.retry_backoff_ms
    }
}

impl KafkaConsumerConfig for AppConfig {
    fn kafka_bootstrap(&self) -> &str {
        &self.kafka.bootstrap_servers
    }

    fn consumer_group(&self) -> &str {
        &self.kafka.consumer.group_id
    }

    fn kafka_topic(&self) -> &str {
        &self.kafka.topic
    }

    fn client_id(&self) -> Option<&str> {
        self.kafka.client_id.as_deref()
    }

    fn fetch_min_bytes(&self) -> usize {
        self.kafka.consumer.fetch_min_bytes
    }

    fn fetch_max_wait_ms(&self) -> u64 {
        self.kafka.consumer.fetch_max_wait_ms
    }

    fn session_timeout_ms(&self) -> u64 {
        self.kafka.consumer.session_timeout_ms
    }

    fn heartbeat_interval_ms(&self) -> u64 {
        self.kafka.consumer.heartbeat_interval_ms
    }

    fn max_poll_interval_ms(&self) -> u64 {
        self.kafka.consumer.max_poll_interval_ms
    }

    fn enable_auto_commit(&self) -> bool {
        self.kafka.consumer.enable_auto_commit
    }

    fn auto_offset_reset(&self) -> &str {
        &self.kafka.consumer.auto_offset_reset
    }
}
