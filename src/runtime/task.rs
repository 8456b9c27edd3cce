//! 任务定义模块
//!
//! 运行时管理的任务抽象：消息消费者、HTTP 服务等

use std::future::Future;
use std::pin::Pin;

use tokio::sync::oneshot;

/// 任务执行结果
pub type TaskResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

/// 任务 trait
///
/// 所有需要在运行时中管理的任务都必须实现此 trait
pub trait Task: Send {
    /// 获取任务名称
    fn name(&self) -> &str;

    /// 运行任务
    ///
    /// 收到 `shutdown_rx` 信号（或其发送端被丢弃）时任务应该尽快返回
    fn run(
        self: Box<Self>,
        shutdown_rx: oneshot::Receiver<()>,
    ) -> Pin<Box<dyn Future<Output = TaskResult> + Send>>;
}

// -------- Message Consumer Task --------

/// 消息消费者 trait
pub trait MessageConsumer: Send + Sync {
    /// 消费消息，直到收到关闭信号或出现不可恢复的错误
    fn consume(
        &self,
        shutdown_rx: oneshot::Receiver<()>,
    ) -> Pin<Box<dyn Future<Output = TaskResult> + Send + '_>>;
}

/// 消息消费者任务
///
/// 将实现了 `MessageConsumer` trait 的对象包装成 `Task`
pub struct MessageConsumerTask {
    name: String,
    consumer: Box<dyn MessageConsumer>,
}

impl MessageConsumerTask {
    pub fn new(name: impl Into<String>, consumer: Box<dyn MessageConsumer>) -> Self {
        Self {
            name: name.into(),
            consumer,
        }
    }
}

impl Task for MessageConsumerTask {
    fn name(&self) -> &str {
        &self.name
    }

    fn run(
        self: Box<Self>,
        shutdown_rx: oneshot::Receiver<()>,
    ) -> Pin<Box<dyn Future<Output = TaskResult> + Send>> {
        Box::pin(async move { self.consumer.consume(shutdown_rx).await })
    }
}

// -------- Spawn Task --------

type ShutdownFutureFn = Box<
    dyn FnOnce(oneshot::Receiver<()>) -> Pin<Box<dyn Future<Output = TaskResult> + Send>>
        + Send
        + 'static,
>;

/// Spawn 任务
///
/// 用闭包延迟构建 Future，以便在 run 时传入 shutdown_rx（例如 HTTP server）
pub struct SpawnTask {
    name: String,
    future_fn: ShutdownFutureFn,
}

impl SpawnTask {
    /// # 示例
    /// ```rust,no_run
    /// use signup_notify::runtime::task::{SpawnTask, TaskResult};
    ///
    /// let task = SpawnTask::with_shutdown("my-task", |shutdown_rx| async move {
    ///     let _ = shutdown_rx.await;
    ///     TaskResult::Ok(())
    /// });
    /// ```
    pub fn with_shutdown<F, Fut>(name: impl Into<String>, future_fn: F) -> Self
    where
        F: FnOnce(oneshot::Receiver<()>) -> Fut + Send + 'static,
        Fut: Future<Output = TaskResult> + Send + 'static,
    {
        Self {
            name: name.into(),
            future_fn: Box::new(move |shutdown_rx| Box::pin(future_fn(shutdown_rx))),
        }
    }
}

impl Task for SpawnTask {
    fn name(&self) -> &str {
        &self.name
    }

    fn run(
        self: Box<Self>,
        shutdown_rx: oneshot::Receiver<()>,
    ) -> Pin<Box<dyn Future<Output = TaskResult> + Send>> {
        (self.future_fn)(shutdown_rx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EchoConsumer;

    impl MessageConsumer for EchoConsumer {
        fn consume(
            &self,
            shutdown_rx: oneshot::Receiver<()>,
        ) -> Pin<Box<dyn Future<Output = TaskResult> + Send + '_>> {
            Box::pin(async move {
                let _ = shutdown_rx.await;
                TaskResult::Ok(())
            })
        }
    }

    #[tokio::test]
    async fn message_consumer_task_runs_until_shutdown() {
        let task: Box<dyn Task> = Box::new(MessageConsumerTask::new("signup-consumer-0", Box::new(EchoConsumer)));
        assert_eq!(task.name(), "signup-consumer-0");

        let (tx, rx) = oneshot::channel();
        let handle = tokio::spawn(task.run(rx));
        tx.send(()).unwrap();

        assert!(handle.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn spawn_task_receives_shutdown_channel() {
        let task: Box<dyn Task> = Box::new(SpawnTask::with_shutdown("http", |shutdown_rx| async move {
            shutdown_rx
                .await
                .map_err(|e| Box::new(e) as Box<dyn std::error::Error + Send + Sync>)
        }));

        let (tx, rx) = oneshot::channel();
        let fut = task.run(rx);
        tx.send(()).unwrap();
        assert!(fut.await.is_ok());
    }
}
