mod config;
mod context;
mod runtime;
mod summary;

use std::sync::Arc;

use anyhow::Context as _;
use chrono::Local;
use log::{info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::config::AgentConfig;
use crate::context::ServiceContext;
use crate::runtime::{ensure_background_started, ensure_background_stopped};

fn init_tracing(log_json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AgentConfig::from_env().context("reading BLOOMTRACK_* configuration")?;
    init_tracing(config.log_json);

    info!(
        "[Agent] data dir {} backup every {}s fetch limit {} remote sync {}",
        config.data_dir.display(),
        config.backup_interval.as_secs(),
        config.fetch_limit,
        if config.remote_enabled() { "on" } else { "off" }
    );
    let context = Arc::new(ServiceContext::build(config)?);
    ensure_background_started(Arc::clone(&context)).await?;

    if let Some(uid) = context.config.user_id.as_deref() {
        if !context.sign_in(uid) {
            warn!("[Agent] identity for {} was not cached locally", uid);
        }
    }

    let today = Local::now().date_naive();
    let store = context.primary_store();
    match summary::pregnancy_summary(&store, today) {
        Some(line) => info!("[Agent] pregnancy: {}", line),
        None => info!("[Agent] no pregnancy dates stored"),
    }
    if let Some(line) = summary::cycle_summary(&store, today) {
        info!("[Agent] cycle: {}", line);
    }

    tokio::signal::ctrl_c()
        .await
        .context("waiting for shutdown signal")?;
    info!("[Agent] shutting down");
    ensure_background_stopped(context).await
}
