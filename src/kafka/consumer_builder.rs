//! Kafka 消费者构建器

use rdkafka::config::ClientConfig;
use rdkafka::consumer::{Consumer, StreamConsumer};
use tracing::{info, warn};

use crate::kafka::consumer_config::KafkaConsumerConfig;

/// 根据配置生成 rdkafka 客户端配置
pub fn consumer_client_config(config: &dyn KafkaConsumerConfig) -> ClientConfig {
    let mut client_config = ClientConfig::new();
    client_config
        .set("bootstrap.servers", config.kafka_bootstrap())
        .set("group.id", config.consumer_group())
        .set("enable.partition.eof", "false")
        .set("enable.auto.commit", config.enable_auto_commit().to_string())
        .set("auto.offset.reset", config.auto_offset_reset())
        .set("session.timeout.ms", config.session_timeout_ms().to_string())
        .set("heartbeat.interval.ms", config.heartbeat_interval_ms().to_string())
        .set("max.poll.interval.ms", config.max_poll_interval_ms().to_string())
        .set("fetch.min.bytes", config.fetch_min_bytes().to_string())
        .set("fetch.wait.max.ms", config.fetch_max_wait_ms().to_string())
        .set("security.protocol", "plaintext");

    if let Some(client_id) = config.client_id() {
        client_config.set("client.id", client_id);
    }

    client_config
}

/// 构建 Kafka 消费者
pub fn build_kafka_consumer(
    config: &dyn KafkaConsumerConfig,
) -> Result<StreamConsumer, rdkafka::error::KafkaError> {
    if heartbeat_exceeds_session_third(config) {
        warn!(
            heartbeat_interval_ms = config.heartbeat_interval_ms(),
            session_timeout_ms = config.session_timeout_ms(),
            "Heartbeat interval is more than a third of the session timeout"
        );
    }

    consumer_client_config(config).create()
}

/// 心跳间隔是否超过会话超时的三分之一
fn heartbeat_exceeds_session_third(config: &dyn KafkaConsumerConfig) -> bool {
    config.heartbeat_interval_ms().saturating_mul(3) > config.session_timeout_ms()
}

/// 订阅 Kafka topic
///
/// 分区在第一次 poll 时由 group coordinator 分配；同组内实例数多于分区数时，
/// 部分实例拿不到分区是正常情况，这里不等待分配结果
pub fn subscribe_topic(
    consumer: &StreamConsumer,
    topic: &str,
) -> Result<(), rdkafka::error::KafkaError> {
    consumer.subscribe(&[topic])?;
    info!(topic = %topic, "Successfully subscribed to Kafka topic");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Settings;

    impl KafkaConsumerConfig for Settings {
        fn kafka_bootstrap(&self) -> &str {
            "localhost:9092"
        }

        fn consumer_group(&self) -> &str {
            "notification-group"
        }

        fn kafka_topic(&self) -> &str {
            "user-signups"
        }
    }

    #[test]
    fn default_knobs_use_manual_commit_from_earliest() {
        let cfg = consumer_client_config(&Settings);

        assert_eq!(cfg.get("group.id"), Some("notification-group"));
        assert_eq!(cfg.get("enable.auto.commit"), Some("false"));
        assert_eq!(cfg.get("auto.offset.reset"), Some("earliest"));
        assert_eq!(cfg.get("session.timeout.ms"), Some("10000"));
        assert_eq!(cfg.get("heartbeat.interval.ms"), Some("3000"));
        assert_eq!(cfg.get("max.poll.interval.ms"), Some("300000"));
        assert_eq!(cfg.get("fetch.min.bytes"), Some("1"));
        assert_eq!(cfg.get("fetch.wait.max.ms"), Some("500"));
        assert_eq!(cfg.get("enable.partition.eof"), Some("false"));
    }

    #[test]
    fn heartbeat_check_saturates_on_huge_values() {
        let mut app = crate::config::AppConfig::default();
        assert!(!heartbeat_exceeds_session_third(&app));

        app.kafka.consumer.heartbeat_interval_ms = u64::MAX;
        assert!(heartbeat_exceeds_session_third(&app));
    }

    #[test]
    fn app_config_group_override_reaches_client_config() {
        let mut app = crate::config::AppConfig::default();
        app.kafka.consumer.group_id = "notification-group-canary".to_string();
        app.kafka.consumer.auto_offset_reset = "latest".to_string();

        let cfg = consumer_client_config(&app);
        assert_eq!(cfg.get("group.id"), Some("notification-group-canary"));
        assert_eq!(cfg.get("auto.offset.reset"), Some("latest"));
    }
}
