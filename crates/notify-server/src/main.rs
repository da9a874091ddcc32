//! gRPC server entry point: loads config, connects to Postgres, builds
//! the broker producer and cipher, and serves the `Notify` service until
//! a shutdown signal arrives.
//!
//! Sequencing mirrors `rustpress-server/src/main.rs::run_app` (config ->
//! pool -> state -> serve); shutdown wiring uses tonic's
//! `serve_with_shutdown`, the closest equivalent to the teacher's axum
//! graceful-shutdown future.

mod error;
mod grpc;

mod notify_proto {
    tonic::include_proto!("notify");
}

use std::sync::Arc;

use notify_broker::BrokerProducer;
use notify_core::cipher::AesGcmCipher;
use notify_core::config::load_config;
use notify_core::error::Result;
use notify_database::{pool, Repository};
use notify_publisher::Publisher;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::grpc::NotifyGrpcService;
use crate::notify_proto::notify_server::NotifyServer;

fn init_tracing(format: &notify_core::config::LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "notify_server=info,notify=info".into());
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
    info!("notify-server starting");

    let db_pool = pool::connect(&config.database).await?;
    let repository = Repository::new(db_pool);
    let producer = BrokerProducer::new(&config.broker)?;
    let cipher = Arc::new(AesGcmCipher::new(config.cipher.aes_key.as_bytes())?);

    let publisher = Arc::new(Publisher::new(repository.clone(), producer, Arc::clone(&cipher), Arc::clone(&config)));
    let service = NotifyGrpcService::new(publisher, repository, cipher);

    let addr = config.grpc.address().parse().map_err(|e| {
        notify_core::error::Error::Configuration { message: format!("invalid grpc address: {e}") }
    })?;
    info!(%addr, "listening");

    let shutdown_timeout = config.grpc.shutdown_timeout();
    tonic::transport::Server::builder()
        .add_service(NotifyServer::new(service))
        .serve_with_shutdown(addr, async move {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown signal received, draining for {:?}", shutdown_timeout);
        })
        .await
        .map_err(|e| notify_core::error::Error::internal(format!("grpc server failed: {e}")))?;

    info!("notify-server stopped");
    Ok(())
}
