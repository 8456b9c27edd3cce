use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use signup_notify::config::{AppConfig, ServiceArgs};
use signup_notify::runtime::ServiceRuntime;
use signup_notify::telemetry::init_tracing_from_config;
use signup_notify::{LoggingSignupHandler, SignupHandler, UserSignupConsumer};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let args = ServiceArgs::parse();
    let (config, source) =
        AppConfig::load(args.config.as_deref()).context("failed to load configuration")?;

    init_tracing_from_config(&config.logging);
    source.log();
    info!(
        service = %config.service.name,
        version = %config.service.version,
        bootstrap = %config.kafka.bootstrap_servers,
        topic = %config.kafka.topic,
        group = %config.kafka.consumer.group_id,
        concurrency = config.kafka.consumer.concurrency,
        "Starting notification-service"
    );

    let handler: Arc<dyn SignupHandler> = Arc::new(LoggingSignupHandler);
    let mut runtime = ServiceRuntime::new(config.service.name.clone());

    // 同组内多个实例，分区在实例之间分配
    for instance in 0..config.kafka.consumer.concurrency {
        let consumer = UserSignupConsumer::from_config(&config, instance, handler.clone())
            .with_context(|| format!("failed to create signup consumer {}", instance))?;
        let name = consumer.name().to_string();
        runtime = runtime.add_message_consumer(name, Box::new(consumer));
    }

    runtime.run().await
}
