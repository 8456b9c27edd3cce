use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use signup_notify::config::{AppConfig, ServiceArgs};
use signup_notify::http::{self, AppState};
use signup_notify::runtime::ServiceRuntime;
use signup_notify::telemetry::init_tracing_from_config;
use signup_notify::{SignupPublisher, UserSignupProducer};
use tracing::{info, warn};

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
        "Starting user-service"
    );

    let producer = Arc::new(
        UserSignupProducer::from_config(&config).context("failed to create kafka producer")?,
    );
    let publisher: Arc<dyn SignupPublisher> = producer.clone();
    let app = http::router(AppState::new(publisher, config.service.name.clone()));
    let address = config.http.address.clone();

    let result = ServiceRuntime::new(config.service.name.clone())
        .add_spawn_with_shutdown("http-server", move |shutdown_rx| async move {
            http::serve(&address, app, shutdown_rx)
                .await
                .map_err(|e| Box::new(e) as Box<dyn std::error::Error + Send + Sync>)
        })
        .run()
        .await;

    // 退出前把在途消息发完
    if let Err(e) = producer.flush(Duration::from_secs(10)) {
        warn!(error = %e, "Producer flush incomplete on shutdown");
    }

    result
}

