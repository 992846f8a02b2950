use std::sync::Arc;

use bloomtrack_core::sync::spawn_initial_fetch;
use log::{debug, info, warn};

use crate::context::ServiceContext;

/// Start the backup watcher and the initial-fetch listener. Calling it
/// again while both run is a no-op; a finished listener is respawned.
pub async fn ensure_background_started(context: Arc<ServiceContext>) -> anyhow::Result<()> {
    let watcher = context.backup_watcher();
    if !watcher.is_running() && !watcher.start() {
        anyhow::bail!("backup watcher could not start outside a tokio runtime");
    }

    let runtime = context.runtime();
    let mut guard = runtime.background_task.lock().await;
    if let Some(handle) = guard.as_ref() {
        if !handle.is_finished() {
            debug!("[Agent] background listener already running");
            return Ok(());
        }
        guard.take();
    }

    let events = context.auth_session().events().subscribe();
    *guard = Some(spawn_initial_fetch(context.record_sync(), events));
    info!("[Agent] background services started");
    Ok(())
}

pub async fn ensure_background_stopped(context: Arc<ServiceContext>) -> anyhow::Result<()> {
    let runtime = context.runtime();
    let mut guard = runtime.background_task.lock().await;
    if let Some(handle) = guard.take() {
        handle.abort();
        if let Err(err) = handle.await {
            if !err.is_cancelled() {
                warn!("[Agent] background listener ended abnormally: {}", err);
            }
        }
    }
    context.backup_watcher().stop();
    info!("[Agent] background services stopped");
    Ok(())
}
