//! 注册事件消费者
//!
//! 以 `notification-group` 消费 `user-signups`，把收到的邮箱交给 `SignupHandler`。
//! 自动提交关闭：每条消息处理完后立即提交它之后的 offset。
//! 处理器失败时按重试策略原地重试，重试用尽后记录错误并跳过，offset 照常提交，
//! 不会阻塞分区上后续的消息。

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rdkafka::consumer::{CommitMode, Consumer, StreamConsumer};
use rdkafka::{Message, Offset, TopicPartitionList};
use tokio::sync::oneshot;
use tracing::{debug, error, info, warn};

use crate::config::{AppConfig, ConsumerSettings};
use crate::error::{ErrorCode, Result, SignupError, map_kafka_error};
use crate::kafka::{KafkaConsumerConfig, build_kafka_consumer, subscribe_topic};
use crate::retry::{ExponentialBackoffPolicy, FixedRetryPolicy, RetryPolicy};
use crate::runtime::{MessageConsumer, TaskResult};

/// 注册事件处理接口
#[async_trait]
pub trait SignupHandler: Send + Sync {
    async fn handle(&self, email: &str) -> Result<()>;
}

/// 只记录日志的处理器
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingSignupHandler;

#[async_trait]
impl SignupHandler for LoggingSignupHandler {
    async fn handle(&self, email: &str) -> Result<()> {
        info!(email = %email, "Received user signup email: {}", email);
        Ok(())
    }
}

/// 从 topic 取到的一条消息
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignupRecord {
    pub topic: String,
    pub partition: i32,
    pub offset: i64,
    pub payload: Option<Vec<u8>>,
}

/// 消息来源
///
/// 消费循环只依赖取消息和提交两个操作
#[async_trait]
pub trait SignupSource: Send + Sync {
    async fn next_record(&self) -> Result<SignupRecord>;

    /// 提交该消息之后的 offset
    fn commit_record(&self, record: &SignupRecord) -> Result<()>;
}

#[async_trait]
impl SignupSource for StreamConsumer {
    async fn next_record(&self) -> Result<SignupRecord> {
        let message = self.recv().await.map_err(|err| {
            map_kafka_error(err, ErrorCode::MessageReceiveFailed, "error receiving message from kafka")
        })?;

        Ok(SignupRecord {
            topic: message.topic().to_string(),
            partition: message.partition(),
            offset: message.offset(),
            payload: message.payload().map(<[u8]>::to_vec),
        })
    }

    fn commit_record(&self, record: &SignupRecord) -> Result<()> {
        let mut offsets = TopicPartitionList::new();
        offsets
            .add_partition_offset(&record.topic, record.partition, Offset::Offset(record.offset + 1))
            .map_err(|err| map_kafka_error(err, ErrorCode::MessageCommitFailed, "invalid commit offset"))?;

        self.commit(&offsets, CommitMode::Async)
            .map_err(|err| map_kafka_error(err, ErrorCode::MessageCommitFailed, "offset commit failed"))
    }
}

/// 单条消息的处理结果，三种结果都会提交 offset
#[derive(Debug)]
pub enum RecordOutcome {
    Handled,
    /// 无 value 的消息（tombstone）
    Skipped,
    /// 重试用尽，跳过
    Failed { error: SignupError, attempts: usize },
}

/// 把消息 value 解码为字符串，非法 UTF-8 按替换字符处理
pub fn decode_signup_payload(payload: Option<&[u8]>) -> Option<String> {
    payload.map(|bytes| String::from_utf8_lossy(bytes).into_owned())
}

/// 解码并交给处理器，可重试的失败按策略重试
pub async fn dispatch_record(
    handler: &dyn SignupHandler,
    payload: Option<&[u8]>,
    policy: &dyn RetryPolicy,
) -> RecordOutcome {
    let Some(email) = decode_signup_payload(payload) else {
        return RecordOutcome::Skipped;
    };

    let mut attempt = 0usize;
    loop {
        attempt += 1;
        match handler.handle(&email).await {
            Ok(()) => return RecordOutcome::Handled,
            Err(err) if policy.should_retry(attempt, &err) => {
                let delay = policy.backoff_duration(attempt);
                warn!(
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "Signup handler failed, retrying"
                );
                tokio::time::sleep(delay).await;
            }
            Err(err) => {
                return RecordOutcome::Failed {
                    error: err,
                    attempts: attempt,
                };
            }
        }
    }
}

pub struct UserSignupConsumer<S = StreamConsumer> {
    name: String,
    source: S,
    handler: Arc<dyn SignupHandler>,
    receive_policy: ExponentialBackoffPolicy,
    handle_policy: FixedRetryPolicy,
    commit_policy: FixedRetryPolicy,
}

impl UserSignupConsumer<StreamConsumer> {
    /// 构建并订阅
    ///
    /// `instance` 只用于区分同一进程内的多个实例
    pub fn from_config(
        config: &AppConfig,
        instance: usize,
        handler: Arc<dyn SignupHandler>,
    ) -> Result<Self> {
        let consumer = build_kafka_consumer(config as &dyn KafkaConsumerConfig).map_err(|err| {
            map_kafka_error(err, ErrorCode::BrokerUnavailable, "failed to build kafka consumer")
        })?;

        let topic = KafkaConsumerConfig::kafka_topic(config);
        subscribe_topic(&consumer, topic).map_err(|err| {
            map_kafka_error(err, ErrorCode::BrokerUnavailable, "failed to subscribe kafka topic")
        })?;

        let name = format!("signup-consumer-{}", instance);
        info!(
            consumer = %name,
            bootstrap = %config.kafka.bootstrap_servers,
            group = %config.kafka.consumer.group_id,
            topic = %topic,
            "Signup consumer initialized"
        );

        Ok(Self::with_source(name, consumer, handler, &config.kafka.consumer))
    }
}

impl<S: SignupSource> UserSignupConsumer<S> {
    pub fn with_source(
        name: impl Into<String>,
        source: S,
        handler: Arc<dyn SignupHandler>,
        settings: &ConsumerSettings,
    ) -> Self {
        let base_delay = Duration::from_millis(settings.retry_base_delay_ms);
        Self {
            name: name.into(),
            source,
            handler,
            receive_policy: ExponentialBackoffPolicy::new(
                settings.max_receive_retries,
                base_delay,
                Duration::from_millis(settings.retry_max_delay_ms),
            ),
            handle_policy: FixedRetryPolicy::new(settings.max_handle_attempts, base_delay),
            commit_policy: FixedRetryPolicy::new(3, base_delay),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// 消费循环，直到收到关闭信号
    ///
    /// 连续接收失败超过重试上限时返回错误
    pub async fn consume_messages(&self, mut shutdown_rx: oneshot::Receiver<()>) -> Result<()> {
        info!(
            consumer = %self.name,
            max_receive_retries = self.receive_policy.max_attempts(),
            "Starting Kafka consumer loop"
        );

        let mut failures = 0usize;

        loop {
            tokio::select! {
                _ = &mut shutdown_rx => {
                    info!(consumer = %self.name, "Consumer loop stopped");
                    return Ok(());
                }
                received = self.source.next_record() => match received {
                    Ok(record) => {
                        failures = 0;
                        self.process_record(&record).await;
                    }
                    Err(error) => {
                        failures += 1;

                        if !self.receive_policy.should_retry(failures, &error) {
                            error!(
                                consumer = %self.name,
                                failures,
                                error = %error,
                                "Giving up after repeated receive failures"
                            );
                            return Err(error);
                        }

                        let delay = self.receive_policy.backoff_duration(failures);
                        warn!(
                            consumer = %self.name,
                            failures,
                            delay_ms = delay.as_millis() as u64,
                            error = %error,
                            "Receive failed, backing off"
                        );

                        tokio::select! {
                            _ = tokio::time::sleep(delay) => {}
                            _ = &mut shutdown_rx => {
                                info!(consumer = %self.name, "Consumer loop stopped during backoff");
                                return Ok(());
                            }
                        }
                    }
                }
            }
        }
    }

    async fn process_record(&self, record: &SignupRecord) {
        debug!(
            consumer = %self.name,
            partition = record.partition,
            offset = record.offset,
            "Received message from Kafka"
        );

        let outcome = dispatch_record(
            self.handler.as_ref(),
            record.payload.as_deref(),
            &self.handle_policy,
        )
        .await;

        match &outcome {
            RecordOutcome::Handled => {}
            RecordOutcome::Skipped => {
                warn!(
                    partition = record.partition,
                    offset = record.offset,
                    "Kafka message without payload encountered, skipping"
                );
            }
            RecordOutcome::Failed { error, attempts } => {
                error!(
                    partition = record.partition,
                    offset = record.offset,
                    attempts,
                    error = %error,
                    "Failed to handle signup message, skipping"
                );
            }
        }

        if let Err(err) = self.commit(record).await {
            error!(
                partition = record.partition,
                offset = record.offset,
                error = %err,
                "Failed to commit offset"
            );
        }
    }

    async fn commit(&self, record: &SignupRecord) -> Result<()> {
        let mut attempt = 0usize;
        loop {
            attempt += 1;
            match self.source.commit_record(record) {
                Ok(()) => return Ok(()),
                Err(error) => {
                    if !self.commit_policy.should_retry(attempt, &error) {
                        return Err(error);
                    }
                    tokio::time::sleep(self.commit_policy.backoff_duration(attempt)).await;
                }
            }
        }
    }
}

impl<S: SignupSource + 'static> MessageConsumer for UserSignupConsumer<S> {
    fn consume(
        &self,
        shutdown_rx: oneshot::Receiver<()>,
    ) -> Pin<Box<dyn Future<Output = TaskResult> + Send + '_>> {
        Box::pin(async move {
            self.consume_messages(shutdown_rx)
                .await
                .map_err(|e| Box::new(e) as Box<dyn std::error::Error + Send + Sync>)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingHandler {
        seen: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl SignupHandler for RecordingHandler {
        async fn handle(&self, email: &str) -> Result<()> {
            self.seen.lock().unwrap().push(email.to_string());
            if email.starts_with("bad") {
                return Err(SignupError::localized(ErrorCode::MessageHandleFailed, "rejected"));
            }
            Ok(())
        }
    }

    /// 前 `failures` 次返回可重试错误
    struct FlakyHandler {
        failures: usize,
        calls: Mutex<usize>,
    }

    impl FlakyHandler {
        fn new(failures: usize) -> Self {
            Self {
                failures,
                calls: Mutex::new(0),
            }
        }

        fn calls(&self) -> usize {
            *self.calls.lock().unwrap()
        }
    }

    #[async_trait]
    impl SignupHandler for FlakyHandler {
        async fn handle(&self, _email: &str) -> Result<()> {
            let mut calls = self.calls.lock().unwrap();
            *calls += 1;
            if *calls <= self.failures {
                return Err(SignupError::localized(ErrorCode::ServiceUnavailable, "mailer down"));
            }
            Ok(())
        }
    }

    /// 按脚本返回消息，脚本用完后一直挂起
    #[derive(Default)]
    struct ScriptedSource {
        script: Mutex<VecDeque<Result<SignupRecord>>>,
        commit_failures: Mutex<usize>,
        committed: Mutex<Vec<i64>>,
    }

    impl ScriptedSource {
        fn new(script: Vec<Result<SignupRecord>>) -> Self {
            Self {
                script: Mutex::new(script.into()),
                ..Default::default()
            }
        }

        fn committed(&self) -> Vec<i64> {
            self.committed.lock().unwrap().clone()
        }

        fn drained(&self) -> bool {
            self.script.lock().unwrap().is_empty()
        }
    }

    #[async_trait]
    impl SignupSource for ScriptedSource {
        async fn next_record(&self) -> Result<SignupRecord> {
            let next = self.script.lock().unwrap().pop_front();
            match next {
                Some(result) => result,
                None => std::future::pending().await,
            }
        }

        fn commit_record(&self, record: &SignupRecord) -> Result<()> {
            let mut failures = self.commit_failures.lock().unwrap();
            if *failures > 0 {
                *failures -= 1;
                return Err(SignupError::localized(
                    ErrorCode::MessageCommitFailed,
                    "coordinator not available",
                ));
            }
            self.committed.lock().unwrap().push(record.offset);
            Ok(())
        }
    }

    fn record(offset: i64, payload: Option<&str>) -> Result<SignupRecord> {
        Ok(SignupRecord {
            topic: "user-signups".to_string(),
            partition: 0,
            offset,
            payload: payload.map(|p| p.as_bytes().to_vec()),
        })
    }

    fn receive_error() -> Result<SignupRecord> {
        Err(SignupError::localized(ErrorCode::MessageReceiveFailed, "broker transport failure"))
    }

    fn fast_settings() -> ConsumerSettings {
        ConsumerSettings {
            max_receive_retries: 3,
            max_handle_attempts: 3,
            retry_base_delay_ms: 1,
            retry_max_delay_ms: 5,
            ..ConsumerSettings::default()
        }
    }

    fn quick_policy() -> FixedRetryPolicy {
        FixedRetryPolicy::new(3, Duration::from_millis(1))
    }

    async fn wait_until(mut condition: impl FnMut() -> bool) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while !condition() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("condition not reached in time");
    }

    #[test]
    fn decodes_utf8_payload_as_is() {
        assert_eq!(
            decode_signup_payload(Some("bob@example.com".as_bytes())),
            Some("bob@example.com".to_string())
        );
        assert_eq!(decode_signup_payload(Some(&b""[..])), Some(String::new()));
    }

    #[test]
    fn invalid_utf8_is_replaced_not_rejected() {
        let decoded = decode_signup_payload(Some(&[b'a', 0xff, b'b'][..])).unwrap();
        assert_eq!(decoded, "a\u{FFFD}b");
    }

    #[test]
    fn tombstone_has_no_email() {
        assert_eq!(decode_signup_payload(None), None);
    }

    #[tokio::test]
    async fn handled_records_reach_handler() {
        let handler = RecordingHandler::default();

        let outcome =
            dispatch_record(&handler, Some("carol@example.com".as_bytes()), &quick_policy()).await;

        assert!(matches!(outcome, RecordOutcome::Handled));
        assert_eq!(*handler.seen.lock().unwrap(), vec!["carol@example.com".to_string()]);
    }

    #[tokio::test]
    async fn tombstones_are_skipped() {
        let handler = RecordingHandler::default();

        let outcome = dispatch_record(&handler, None, &quick_policy()).await;

        assert!(matches!(outcome, RecordOutcome::Skipped));
        assert!(handler.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn non_retryable_handler_failure_is_not_retried() {
        let handler = RecordingHandler::default();

        let outcome =
            dispatch_record(&handler, Some("bad@example.com".as_bytes()), &quick_policy()).await;

        match outcome {
            RecordOutcome::Failed { error, attempts } => {
                assert_eq!(error.code(), Some(ErrorCode::MessageHandleFailed));
                assert_eq!(attempts, 1);
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert_eq!(handler.seen.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn retryable_handler_failure_recovers_within_budget() {
        let handler = FlakyHandler::new(2);

        let outcome =
            dispatch_record(&handler, Some("erin@example.com".as_bytes()), &quick_policy()).await;

        assert!(matches!(outcome, RecordOutcome::Handled));
        assert_eq!(handler.calls(), 3);
    }

    #[tokio::test]
    async fn retryable_handler_failure_gives_up_after_budget() {
        let handler = FlakyHandler::new(usize::MAX);

        let outcome =
            dispatch_record(&handler, Some("erin@example.com".as_bytes()), &quick_policy()).await;

        assert!(matches!(outcome, RecordOutcome::Failed { attempts: 3, .. }));
        assert_eq!(handler.calls(), 3);
    }

    #[tokio::test]
    async fn logging_handler_accepts_any_string() {
        assert!(LoggingSignupHandler.handle("not-even-an-email").await.is_ok());
    }

    #[tokio::test]
    async fn every_record_is_committed_in_order() {
        let handler = Arc::new(RecordingHandler::default());
        let source = ScriptedSource::new(vec![
            record(0, Some("alice@example.com")),
            record(1, None),
            record(2, Some("bad@example.com")),
            record(3, Some("bob@example.com")),
        ]);
        let consumer = Arc::new(UserSignupConsumer::with_source(
            "signup-consumer-0",
            source,
            handler.clone(),
            &fast_settings(),
        ));

        let (tx, rx) = oneshot::channel();
        let running = consumer.clone();
        let task = tokio::spawn(async move { running.consume_messages(rx).await });

        wait_until(|| consumer.source.committed().len() == 4).await;
        tx.send(()).unwrap();

        assert!(task.await.unwrap().is_ok());
        // 处理失败的消息也提交，分区继续向前
        assert_eq!(consumer.source.committed(), vec![0, 1, 2, 3]);
        assert_eq!(
            *handler.seen.lock().unwrap(),
            vec!["alice@example.com", "bad@example.com", "bob@example.com"]
        );
    }

    #[tokio::test]
    async fn commit_is_retried_until_it_succeeds() {
        let source = ScriptedSource::new(vec![record(7, Some("frank@example.com"))]);
        *source.commit_failures.lock().unwrap() = 2;
        let consumer = Arc::new(UserSignupConsumer::with_source(
            "signup-consumer-0",
            source,
            Arc::new(LoggingSignupHandler),
            &fast_settings(),
        ));

        let (tx, rx) = oneshot::channel();
        let running = consumer.clone();
        let task = tokio::spawn(async move { running.consume_messages(rx).await });

        wait_until(|| consumer.source.committed() == vec![7]).await;
        tx.send(()).unwrap();
        assert!(task.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn consecutive_receive_failures_exhaust_retry_budget() {
        let consumer = UserSignupConsumer::with_source(
            "signup-consumer-0",
            ScriptedSource::new(vec![receive_error(), receive_error(), receive_error()]),
            Arc::new(LoggingSignupHandler),
            &fast_settings(),
        );

        let (_tx, rx) = oneshot::channel();
        let result = tokio::time::timeout(Duration::from_secs(5), consumer.consume_messages(rx))
            .await
            .expect("consumer loop should give up");

        let err = result.unwrap_err();
        assert_eq!(err.code(), Some(ErrorCode::MessageReceiveFailed));
        assert!(consumer.source.drained());
    }

    #[tokio::test]
    async fn successful_receive_resets_failure_count() {
        let consumer = Arc::new(UserSignupConsumer::with_source(
            "signup-consumer-0",
            ScriptedSource::new(vec![
                receive_error(),
                receive_error(),
                record(0, Some("grace@example.com")),
                receive_error(),
                receive_error(),
            ]),
            Arc::new(LoggingSignupHandler),
            &fast_settings(),
        ));

        let (tx, rx) = oneshot::channel();
        let running = consumer.clone();
        let task = tokio::spawn(async move { running.consume_messages(rx).await });

        wait_until(|| consumer.source.drained() && consumer.source.committed() == vec![0]).await;
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!task.is_finished());

        tx.send(()).unwrap();
        assert!(task.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn consumer_builds_and_subscribes_without_broker() {
        let mut config = AppConfig::default();
        config.kafka.bootstrap_servers = "127.0.0.1:1".to_string();

        let consumer =
            UserSignupConsumer::from_config(&config, 2, Arc::new(LoggingSignupHandler)).unwrap();
        assert_eq!(consumer.name(), "signup-consumer-2");
    }

    #[tokio::test]
    async fn consumer_stops_on_shutdown() {
        let mut config = AppConfig::default();
        config.kafka.bootstrap_servers = "127.0.0.1:1".to_string();
        let consumer =
            UserSignupConsumer::from_config(&config, 0, Arc::new(LoggingSignupHandler)).unwrap();

        let (tx, rx) = oneshot::channel();
        tx.send(()).unwrap();

        let result = tokio::time::timeout(Duration::from_secs(5), consumer.consume_messages(rx)).await;
        assert!(matches!(result, Ok(Ok(()))));
    }
}
