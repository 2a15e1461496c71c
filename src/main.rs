//! Reminder dispatcher binary.
//!
//! Configuration comes from the environment (and `.env`). Log output goes to stderr;
//! `RUST_LOG` overrides the default `info` filter.
//!
//! Exit codes:
//! - `0` graceful shutdown after a termination signal
//! - `1` runtime failure (store cannot be opened, shutdown grace exceeded)
//! - `2` configuration error

use std::process::ExitCode;

use remindvisor::{Config, Service};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cfg = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            tracing::error!(error = %e, label = e.as_label(), "invalid configuration");
            return ExitCode::from(2);
        }
    };

    tracing::info!(
        interval_secs = cfg.dispatch_interval.as_secs(),
        country_prefix = %cfg.country_prefix,
        gateway = %cfg.gateway.base_url,
        "remindvisor starting"
    );

    let service = match Service::builder(cfg).build() {
        Ok(service) => service,
        Err(e) => {
            tracing::error!(error = %e, label = e.as_label(), "startup failed");
            return ExitCode::FAILURE;
        }
    };

    match service.run().await {
        Ok(()) => {
            tracing::info!("remindvisor shut down cleanly");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, label = e.as_label(), "remindvisor exited with error");
            ExitCode::FAILURE
        }
    }
}
