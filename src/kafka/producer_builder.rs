//! Kafka 生产者构建器

use rdkafka::config::ClientConfig;
use rdkafka::producer::FutureProducer;
use tracing::{info, warn};

use crate::kafka::producer_config::KafkaProducerConfig;

/// 根据配置生成 rdkafka 客户端配置
///
/// 启用幂等性时 acks 强制为 "all"
pub fn producer_client_config(config: &dyn KafkaProducerConfig) -> ClientConfig {
    let acks = if config.enable_idempotence() && config.acks() != "all" {
        warn!(
            configured_acks = %config.acks(),
            "Idempotent producer requires acks=all, overriding"
        );
        "all"
    } else {
        config.acks()
    };

    // librdkafka 的缓冲区单位是 KB
    let buffer_kbytes = (config.buffer_memory_bytes() / 1024).max(1);

    let mut client_config = ClientConfig::new();
    client_config
        .set("bootstrap.servers", config.kafka_bootstrap())
        .set("acks", acks)
        .set("retries", config.retries().to_string())
        .set("enable.idempotence", config.enable_idempotence().to_string())
        .set("batch.size", config.batch_size().to_string())
        .set("linger.ms", config.linger_ms().to_string())
        .set("queue.buffering.max.kbytes", buffer_kbytes.to_string())
        .set(
            "max.in.flight.requests.per.connection",
            config.max_in_flight_requests().to_string(),
        )
        .set("compression.type", config.compression_type())
        .set("request.timeout.ms", config.request_timeout_ms().to_string())
        .set("message.timeout.ms", config.message_timeout_ms().to_string())
        .set("retry.backoff.ms", config.retry_backoff_ms().to_string())
        .set("security.protocol", "plaintext");

    if let Some(client_id) = config.client_id() {
        client_config.set("client.id", client_id);
    }

    client_config
}

/// 构建 Kafka 生产者
pub fn build_kafka_producer(
    config: &dyn KafkaProducerConfig,
) -> Result<FutureProducer, rdkafka::error::KafkaError> {
    let producer: FutureProducer = producer_client_config(config).create()?;

    info!(
        bootstrap = %config.kafka_bootstrap(),
        idempotence = config.enable_idempotence(),
        retries = config.retries(),
        compression = %config.compression_type(),
        "Kafka producer created successfully"
    );

    Ok(producer)
}
