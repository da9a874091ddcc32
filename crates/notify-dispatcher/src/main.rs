//! Dispatcher process entry point: a cron-triggered one-shot binary.
//! Exit code reflects only scan/setup success (§4.3 step 4); per-message
//! enqueue failures are logged and do not change the exit code.

use std::process::ExitCode;

use notify_broker::BrokerProducer;
use notify_core::config::load_config;
use notify_database::{pool, Repository};
use notify_dispatcher::{run_named_job, DispatchScheduledMessagesJob};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn init_tracing(format: &notify_core::config::LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "notify_dispatcher=info,notify=info".into());
    let registry = tracing_subscriber::registry().with(filter);
    match format {
        notify_core::config::LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        notify_core::config::LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let config = match load_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("failed to load config: {e}");
            return ExitCode::FAILURE;
        }
    };
    init_tracing(&config.logging.format);
    info!(job_name = %config.job_name, "notify-dispatcher starting");

    let db_pool = match pool::connect(&config.database).await {
        Ok(pool) => pool,
        Err(e) => {
            error!(error = %e, "failed to connect to database");
            return ExitCode::FAILURE;
        }
    };
    let producer = match BrokerProducer::new(&config.broker) {
        Ok(producer) => producer,
        Err(e) => {
            error!(error = %e, "failed to create broker producer");
            return ExitCode::FAILURE;
        }
    };

    let repository = Repository::new(db_pool);
    let job = DispatchScheduledMessagesJob::new(repository, producer, &config);

    match run_named_job(&config.job_name, &job).await {
        Ok(()) => {
            info!("notify-dispatcher finished");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "dispatch scan failed");
            ExitCode::FAILURE
        }
    }
}
