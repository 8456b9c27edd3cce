//! 注册事件生产者
//!
//! 把新用户的邮箱作为纯字符串写入 `user-signups` topic。
//! 不做校验、不做批量、不做应用层重试，这些都交给 Kafka 客户端配置。

use std::time::Duration;

use async_trait::async_trait;
use rdkafka::producer::{FutureProducer, FutureRecord, Producer};
use tracing::{debug, error, info};

use crate::config::AppConfig;
use crate::error::{ErrorCode, Result, map_kafka_error};
use crate::kafka::{KafkaProducerConfig, build_kafka_producer};

/// 注册事件发布接口
#[async_trait]
pub trait SignupPublisher: Send + Sync {
    /// 发布注册邮箱，在 broker 确认后返回
    async fn send_signup_email(&self, email: &str) -> Result<()>;

    /// 目标 topic
    fn topic(&self) -> &str;
}

pub struct UserSignupProducer {
    producer: FutureProducer,
    topic: String,
    send_timeout: Duration,
}

impl UserSignupProducer {
    pub fn new(producer: FutureProducer, topic: impl Into<String>, send_timeout: Duration) -> Self {
        Self {
            producer,
            topic: topic.into(),
            send_timeout,
        }
    }

    /// 按服务配置构建生产者
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let producer = build_kafka_producer(config as &dyn KafkaProducerConfig).map_err(|err| {
            map_kafka_error(err, ErrorCode::BrokerUnavailable, "failed to build kafka producer")
        })?;

        Ok(Self::new(
            producer,
            config.kafka.topic.clone(),
            Duration::from_millis(config.kafka.producer.send_timeout_ms),
        ))
    }

    /// 等待所有在途消息投递完成
    pub fn flush(&self, timeout: Duration) -> Result<()> {
        self.producer.flush(timeout).map_err(|err| {
            map_kafka_error(err, ErrorCode::OperationTimeout, "failed to flush kafka producer")
        })?;
        info!(topic = %self.topic, "Kafka producer flushed");
        Ok(())
    }
}

#[async_trait]
impl SignupPublisher for UserSignupProducer {
    async fn send_signup_email(&self, email: &str) -> Result<()> {
        // 不设置 key，由分区器轮询分配
        let record: FutureRecord<'_, (), str> = FutureRecord::to(&self.topic).payload(email);

        match self.producer.send(record, self.send_timeout).await {
            Ok(_) => {
                debug!(topic = %self.topic, "Signup email published");
                Ok(())
            }
            Err((err, _message)) => {
                error!(topic = %self.topic, error = %err, "Failed to publish signup email");
                Err(map_kafka_error(
                    err,
                    ErrorCode::MessageSendFailed,
                    "failed to publish signup email",
                ))
            }
        }
    }

    fn topic(&self) -> &str {
        &self.topic
    }
}
