//! 服务运行时
//!
//! 统一管理服务生命周期：启动任务、等待关闭信号、优雅停机
//!
//! # 使用示例
//!
//! ```rust,no_run
//! use signup_notify::runtime::ServiceRuntime;
//!
//! # async fn run(consumer: Box<dyn signup_notify::runtime::MessageConsumer>) -> anyhow::Result<()> {
//! ServiceRuntime::new("notification-service")
//!     .add_message_consumer("signup-consumer-0", consumer)
//!     .run()
//!     .await
//! # }
//! ```

pub mod config;
pub mod runtime;
pub mod task;

pub use config::RuntimeConfig;
pub use runtime::{ServiceRuntime, shutdown_signal};
pub use task::{MessageConsumer, MessageConsumerTask, SpawnTask, Task, TaskResult};
