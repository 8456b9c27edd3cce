//! Kafka 消费者配置 Trait
//!
//! 默认关闭自动提交，由消费循环在每条消息处理成功后同步提交 offset

/// Kafka 消费者配置 Trait
///
/// 需要构建 Kafka 消费者的配置都应该实现此 trait
pub trait KafkaConsumerConfig: Send + Sync {
    /// Kafka Bootstrap Servers 地址
    fn kafka_bootstrap(&self) -> &str;

    /// Consumer Group ID
    fn consumer_group(&self) -> &str;

    /// Kafka Topic 名称
    fn kafka_topic(&self) -> &str;

    /// 客户端标识，默认不设置
    fn client_id(&self) -> Option<&str> {
        None
    }

    /// 最小 fetch 字节数，默认 1
    fn fetch_min_bytes(&self) -> usize {
        1
    }

    /// 最大 fetch 等待时间（毫秒），默认 500
    fn fetch_max_wait_ms(&self) -> u64 {
        500
    }

    /// 会话超时（毫秒），默认 10000
    fn session_timeout_ms(&self) -> u64 {
        10_000
    }

    /// 心跳间隔（毫秒），默认 3000，需小于会话超时的三分之一
    fn heartbeat_interval_ms(&self) -> u64 {
        3_000
    }

    /// 两次 poll 之间的最大间隔（毫秒），默认 5 分钟
    fn max_poll_interval_ms(&self) -> u64 {
        300_000
    }

    /// 是否自动提交 offset，默认 false
    fn enable_auto_commit(&self) -> bool {
        false
    }

    /// Offset 重置策略，默认 "earliest"
    fn auto_offset_reset(&self) -> &str {
        "earliest"
    }
}
