//! Kafka 工具模块
//!
//! 生产者、消费者的配置接口与构建函数，两个服务共用

pub mod consumer_builder;
pub mod consumer_config;
pub mod producer_builder;
pub mod producer_config;

pub use consumer_builder::{build_kafka_consumer, consumer_client_config, subscribe_topic};
pub use consumer_config::KafkaConsumerConfig;
pub use producer_builder::{build_kafka_producer, producer_client_config};
pub use producer_config::KafkaProducerConfig;
