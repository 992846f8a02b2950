use std::sync::Arc;

use log::{debug, warn};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;

use super::service::RecordSyncService;
use crate::identity::AuthEvent;

/// Pull every record kind each time a user authenticates. Runs until the
/// event channel closes or the handle is aborted.
pub fn spawn_initial_fetch(
    service: Arc<RecordSyncService>,
    mut events: broadcast::Receiver<AuthEvent>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(AuthEvent::UserAuthenticated { user_id }) => {
                    debug!("[RecordSync] initial fetch for {}", user_id);
                    service.refresh_all_for(&user_id).await;
                }
                Ok(AuthEvent::SignedOut) => {}
                Err(RecvError::Lagged(skipped)) => {
                    warn!("[RecordSync] missed {} auth events", skipped);
                }
                Err(RecvError::Closed) => break,
            }
        }
    })
}
