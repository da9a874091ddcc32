//! Worker process entry point: loads config, connects to Postgres,
//! builds the configured provider adapters, and runs the broker consumer
//! loop until a shutdown signal arrives.
//!
//! Sequencing mirrors `rustpress-server/src/main.rs::run_app` (config
//! load -> pool -> state -> serve) and shutdown wiring borrows
//! `rustpress-server/src/shutdown.rs::listen_for_shutdown_signals`,
//! adapted to a `tokio::sync::watch` signal since `notify-broker`'s
//! consumer loop is `select!`-driven rather than axum's graceful
//! shutdown future.

use std::sync::Arc;

use notify_core::cipher::AesGcmCipher;
use notify_core::config::load_config;
use notify_core::error::Result;
use notify_database::{pool, Repository};
use notify_providers::{build_mail_provider, build_sms_provider};
use notify_worker::{MailQueueHandler, SmsQueueHandler, Worker};
use tokio::sync::watch;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn init_tracing(format: &notify_core::config::LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "notify_worker=info,notify=info".into());
    let registry = tracing_subscriber::registry().with(filter);
    match format {
        notify_core::config::LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        notify_core::config::LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = Arc::new(load_config()?);
    init_tracing(&config.logging.format);
    info!("notify-worker starting");

    let db_pool = pool::connect(&config.database).await?;
    let repository = Repository::new(db_pool);
    let cipher = Arc::new(AesGcmCipher::new(config.cipher.aes_key.as_bytes())?);

    let sms_provider = build_sms_provider(&config.providers)?;
    let mail_provider = build_mail_provider(&config.providers)?;

    let sms_handler = SmsQueueHandler::new(repository.clone(), Arc::clone(&cipher), sms_provider);
    let mail_handler = MailQueueHandler::new(repository, cipher, mail_provider);
    let worker = Worker::new(Arc::clone(&config), sms_handler, mail_handler);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        info!("shutdown signal received");
        let _ = shutdown_tx.send(true);
    });

    worker.run(shutdown_rx).await?;
    info!("notify-worker stopped");
    Ok(())
}
