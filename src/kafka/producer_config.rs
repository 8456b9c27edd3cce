//! Kafka 生产者配置 Trait
//!
//! 默认值即 user-service 的可靠性配置：acks=all、幂等、3 次重试

/// Kafka 生产者配置 Trait
///
/// 需要构建 Kafka 生产者的配置都应该实现此 trait
pub trait KafkaProducerConfig: Send + Sync {
    /// Kafka Bootstrap Servers 地址
    fn kafka_bootstrap(&self) -> &str;

    /// 客户端标识，默认不设置
    fn client_id(&self) -> Option<&str> {
        None
    }

    /// 确认级别，默认 "all"（leader 与所有 ISR 副本都确认）
    fn acks(&self) -> &str {
        "all"
    }

    /// 重试次数，默认 3
    fn retries(&self) -> u32 {
        3
    }

    /// 是否启用幂等性，默认 true
    fn enable_idempotence(&self) -> bool {
        true
    }

    /// 批量发送大小（字节），默认 16KB
    fn batch_size(&self) -> usize {
        16 * 1024
    }

    /// 批量发送延迟（毫秒），默认 1ms
    fn linger_ms(&self) -> u64 {
        1
    }

    /// 发送缓冲区总大小（字节），默认 32MB
    fn buffer_memory_bytes(&self) -> usize {
        32 * 1024 * 1024
    }

    /// 每个连接最大未确认请求数，默认 5（幂等性要求 <= 5）
    fn max_in_flight_requests(&self) -> u32 {
        5
    }

    /// 压缩类型，默认 "snappy"
    /// 可选值: "none", "gzip", "snappy", "lz4", "zstd"
    fn compression_type(&self) -> &str {
        "snappy"
    }

    /// 请求超时（毫秒），默认 30 秒
    fn request_timeout_ms(&self) -> u64 {
        30_000
    }

    /// 消息投递总超时（毫秒），默认 2 分钟
    fn message_timeout_ms(&self) -> u64 {
        120_000
    }

    /// 重试间隔（毫秒），默认 100ms
    fn retry_backoff_ms(&self) -> u64 {
        100
    }
}
