use std::sync::Arc;

use anyhow::Context;
use bloomtrack_cloud_sync::{DocumentApiClient, StaticAccessToken};
use bloomtrack_core::backup::{BackupWatcher, WatcherConfig};
use bloomtrack_core::identity::{AuthSession, IdentityResolver, UserIdentity};
use bloomtrack_core::store::{LocalStore, MemoryBackend};
use bloomtrack_core::sync::{
    DocumentStore, RecordSyncClient, RecordSyncService, UnconfiguredDocumentStore,
};
use bloomtrack_storage_sqlite::SqliteStore;
use log::info;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::config::AgentConfig;

#[derive(Debug, Default)]
pub struct AgentRuntimeState {
    /// Initial-fetch listener spawned by `ensure_background_started`.
    pub background_task: Mutex<Option<JoinHandle<()>>>,
}

impl AgentRuntimeState {
    pub fn new() -> Self {
        Self::default()
    }
}

pub struct ServiceContext {
    pub config: AgentConfig,
    pub primary_store: LocalStore,
    pub backup_watcher: Arc<BackupWatcher>,
    pub auth_session: Arc<AuthSession>,
    pub record_sync: Arc<RecordSyncService>,
    pub runtime: Arc<AgentRuntimeState>,
}

fn remote_for(config: &AgentConfig) -> anyhow::Result<Arc<dyn DocumentStore>> {
    match config.api_url.as_deref() {
        Some(url) => {
            let tokens = Arc::new(StaticAccessToken(config.access_token.clone()));
            let client = DocumentApiClient::new(url, tokens)
                .with_context(|| format!("building document API client for {}", url))?;
            info!("[Agent] remote sync enabled against {}", client.base_url());
            Ok(Arc::new(client))
        }
        None => {
            info!("[Agent] no API URL configured; remote sync disabled");
            Ok(Arc::new(UnconfiguredDocumentStore))
        }
    }
}

impl ServiceContext {
    /// Open the primary store and wire every service around it.
    pub fn build(config: AgentConfig) -> anyhow::Result<Self> {
        let data_dir = config.data_dir.to_string_lossy().to_string();
        let sqlite = SqliteStore::open(&data_dir)
            .with_context(|| format!("opening primary store in {}", data_dir))?;
        let primary_store = LocalStore::new(Arc::new(sqlite.open_handle()));
        let session_store = LocalStore::new(Arc::new(MemoryBackend::new()));

        let watcher_config = WatcherConfig::default().with_interval(config.backup_interval);
        let backup_watcher = Arc::new(BackupWatcher::new(
            primary_store.clone(),
            session_store,
            watcher_config,
        ));

        let auth_session = Arc::new(AuthSession::new(primary_store.clone()));
        let identity = IdentityResolver::new(auth_session.clone(), primary_store.clone());
        let client = RecordSyncClient::new(remote_for(&config)?, primary_store.clone())
            .with_fetch_limit(config.fetch_limit);
        let record_sync = Arc::new(RecordSyncService::new(
            client,
            identity,
            primary_store.clone(),
        ));

        Ok(Self {
            config,
            primary_store,
            backup_watcher,
            auth_session,
            record_sync,
            runtime: Arc::new(AgentRuntimeState::new()),
        })
    }

    pub fn primary_store(&self) -> LocalStore {
        self.primary_store.clone()
    }

    pub fn backup_watcher(&self) -> Arc<BackupWatcher> {
        Arc::clone(&self.backup_watcher)
    }

    pub fn auth_session(&self) -> Arc<AuthSession> {
        Arc::clone(&self.auth_session)
    }

    pub fn record_sync(&self) -> Arc<RecordSyncService> {
        Arc::clone(&self.record_sync)
    }

    pub fn runtime(&self) -> Arc<AgentRuntimeState> {
        Arc::clone(&self.runtime)
    }

    pub fn sign_in(&self, uid: &str) -> bool {
        self.auth_session.sign_in(UserIdentity::new(uid))
    }

    /// Sign out and refresh the backup so the removed identity is not
    /// restored by the next poll.
    pub fn sign_out(&self) -> bool {
        let removed = self.auth_session.sign_out();
        self.backup_watcher.snapshot_now();
        removed
    }
}
