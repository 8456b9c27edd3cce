//! 服务运行时实现

use std::future::Future;

use anyhow::Result;
use tokio::sync::oneshot;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use crate::runtime::config::RuntimeConfig;
use crate::runtime::task::{MessageConsumer, MessageConsumerTask, SpawnTask, Task, TaskResult};

/// 服务运行时
///
/// 1. 启动所有任务，每个任务持有自己的关闭信号接收端
/// 2. 等待关闭信号（Ctrl+C / SIGTERM），或某个任务提前失败
/// 3. 通知所有任务关闭，在 `shutdown_timeout` 内等待其退出，超时则中止
pub struct ServiceRuntime {
    service_name: String,
    tasks: Vec<Box<dyn Task>>,
    config: RuntimeConfig,
}

impl ServiceRuntime {
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            tasks: Vec::new(),
            config: RuntimeConfig::default(),
        }
    }

    /// 设置运行时配置
    pub fn with_config(mut self, config: RuntimeConfig) -> Self {
        self.config = config;
        self
    }

    /// 添加任务
    pub fn add_task(mut self, task: Box<dyn Task>) -> Self {
        info!(task_name = %task.name(), "Adding task to runtime");
        self.tasks.push(task);
        self
    }

    /// 添加消息消费者
    pub fn add_message_consumer(
        self,
        name: impl Into<String>,
        consumer: Box<dyn MessageConsumer>,
    ) -> Self {
        self.add_task(Box::new(MessageConsumerTask::new(name, consumer)))
    }

    /// 添加需要关闭信号的任务（例如 HTTP server）
    pub fn add_spawn_with_shutdown<F, Fut>(self, name: impl Into<String>, future_fn: F) -> Self
    where
        F: FnOnce(oneshot::Receiver<()>) -> Fut + Send + 'static,
        Fut: Future<Output = TaskResult> + Send + 'static,
    {
        self.add_task(Box::new(SpawnTask::with_shutdown(name, future_fn)))
    }

    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }

    /// 运行服务，直到收到 Ctrl+C / SIGTERM
    pub async fn run(self) -> Result<()> {
        self.run_until(shutdown_signal()).await
    }

    /// 运行服务，直到 `signal` 完成
    ///
    /// 某个任务提前失败时同样触发关闭，并在停机完成后返回错误
    pub async fn run_until<S>(mut self, signal: S) -> Result<()>
    where
        S: Future<Output = ()> + Send,
    {
        info!(
            service_name = %self.service_name,
            task_count = self.tasks.len(),
            "🚀 Starting service runtime"
        );

        let tasks = std::mem::take(&mut self.tasks);
        let (mut join_set, task_shutdowns) = Self::start_tasks(tasks);

        let mut failure: Option<String> = None;
        tokio::pin!(signal);

        loop {
            tokio::select! {
                _ = &mut signal => {
                    info!("Shutdown signal received");
                    break;
                }
                joined = join_set.join_next() => match joined {
                    None => {
                        info!("All tasks exited");
                        break;
                    }
                    Some(Ok((task_name, Ok(())))) => {
                        info!(task_name = %task_name, "Task exited before shutdown");
                    }
                    Some(Ok((task_name, Err(e)))) => {
                        error!(task_name = %task_name, error = %e, "❌ Task failed, shutting down");
                        failure = Some(format!("task '{}' failed: {}", task_name, e));
                        break;
                    }
                    Some(Err(e)) => {
                        error!(error = %e, "❌ Task panicked or was cancelled, shutting down");
                        failure = Some(format!("task join error: {}", e));
                        break;
                    }
                }
            }
        }

        // 已退出任务的接收端已被丢弃，发送失败可以忽略
        for tx in task_shutdowns {
            let _ = tx.send(());
        }

        Self::wait_for_tasks_shutdown(&self.config, &mut join_set).await;

        info!(service_name = %self.service_name, "Service runtime stopped");

        match failure {
            Some(reason) => Err(anyhow::anyhow!(reason)),
            None => Ok(()),
        }
    }

    fn start_tasks(
        tasks: Vec<Box<dyn Task>>,
    ) -> (JoinSet<(String, TaskResult)>, Vec<oneshot::Sender<()>>) {
        let mut join_set = JoinSet::new();
        let mut task_shutdowns = Vec::with_capacity(tasks.len());

        for task in tasks {
            let task_name = task.name().to_string();
            let (task_shutdown_tx, task_shutdown_rx) = oneshot::channel();
            task_shutdowns.push(task_shutdown_tx);

            let task_future = task.run(task_shutdown_rx);
            join_set.spawn(async move {
                info!(task_name = %task_name, "Task started");
                let result = task_future.await;
                (task_name, result)
            });
        }

        (join_set, task_shutdowns)
    }

    async fn wait_for_tasks_shutdown(
        config: &RuntimeConfig,
        join_set: &mut JoinSet<(String, TaskResult)>,
    ) {
        let drained = tokio::time::timeout(config.shutdown_timeout, async {
            while let Some(result) = join_set.join_next().await {
                match result {
                    Ok((task_name, Ok(()))) => {
                        info!(task_name = %task_name, "✅ Task completed gracefully");
                    }
                    Ok((task_name, Err(e))) => {
                        warn!(task_name = %task_name, error = %e, "Task completed with error");
                    }
                    Err(e) => {
                        warn!(error = %e, "Task join error");
                    }
                }
            }
        })
        .await;

        match drained {
            Ok(()) => info!("All tasks completed"),
            Err(_) => {
                warn!(
                    timeout = ?config.shutdown_timeout,
                    remaining = join_set.len(),
                    "Tasks shutdown timeout, aborting remaining tasks"
                );
                join_set.abort_all();
            }
        }
    }
}

/// Ctrl+C，或 Unix 上的 SIGTERM
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Shutdown signal received (Ctrl+C)"),
        _ = terminate => info!("Shutdown signal received (SIGTERM)"),
    }
}
