//! Local-first record operations.

use std::collections::BTreeMap;

use log::{debug, info};
use serde::Serialize;

use super::client::RecordSyncClient;
use crate::identity::IdentityResolver;
use crate::records::{
    load_records, remove_record, upsert_record, BmiRecord, ContractionSession, ExerciseRecord,
    KickSession, MoodEntry, RecordKind, TrackedRecord, WeightRecord,
};
use crate::store::LocalStore;

/// Result of a local-first write.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncOutcome {
    pub local_saved: bool,
    pub remote_synced: bool,
}

/// Writes locally first, then mirrors to the remote for the resolved user.
/// A failed remote write never undoes the local one.
pub struct RecordSyncService {
    client: RecordSyncClient,
    identity: IdentityResolver,
    store: LocalStore,
}

impl RecordSyncService {
    pub fn new(client: RecordSyncClient, identity: IdentityResolver, store: LocalStore) -> Self {
        Self {
            client,
            identity,
            store,
        }
    }

    pub fn client(&self) -> &RecordSyncClient {
        &self.client
    }

    fn current_uid(&self) -> Option<String> {
        match self.identity.resolve_uid() {
            Ok(uid) => Some(uid),
            Err(err) => {
                debug!("[RecordSync] skipping remote step: {}", err);
                None
            }
        }
    }

    pub async fn save_record<R: TrackedRecord>(&self, record: R) -> SyncOutcome {
        let local_saved = upsert_record(&self.store, record.clone());
        let remote_synced = match self.current_uid() {
            Some(uid) => self.client.save(&uid, &record).await,
            None => false,
        };
        SyncOutcome {
            local_saved,
            remote_synced,
        }
    }

    pub async fn delete_record<R: TrackedRecord>(&self, id: &str) -> SyncOutcome {
        let local_saved = remove_record::<R>(&self.store, id);
        let remote_synced = match self.current_uid() {
            Some(uid) => self.client.delete::<R>(&uid, id).await,
            None => false,
        };
        SyncOutcome {
            local_saved,
            remote_synced,
        }
    }

    /// Pull one kind for the resolved user; the local list when nobody is
    /// signed in.
    pub async fn refresh<R: TrackedRecord>(&self) -> Vec<R> {
        match self.current_uid() {
            Some(uid) => self.client.fetch_for_user(&uid).await,
            None => load_records(&self.store),
        }
    }

    /// Pull every kind for the resolved user.
    pub async fn refresh_all(&self) -> BTreeMap<RecordKind, usize> {
        match self.current_uid() {
            Some(uid) => self.refresh_all_for(&uid).await,
            None => BTreeMap::new(),
        }
    }

    /// Pull every kind for `uid` concurrently. Returns the local list size
    /// per kind afterwards.
    pub async fn refresh_all_for(&self, uid: &str) -> BTreeMap<RecordKind, usize> {
        let (weights, bmis, exercises, kicks, contractions, moods) = tokio::join!(
            self.client.fetch_for_user::<WeightRecord>(uid),
            self.client.fetch_for_user::<BmiRecord>(uid),
            self.client.fetch_for_user::<ExerciseRecord>(uid),
            self.client.fetch_for_user::<KickSession>(uid),
            self.client.fetch_for_user::<ContractionSession>(uid),
            self.client.fetch_for_user::<MoodEntry>(uid),
        );
        let counts = BTreeMap::from([
            (RecordKind::Weight, weights.len()),
            (RecordKind::Bmi, bmis.len()),
            (RecordKind::Exercise, exercises.len()),
            (RecordKind::Kick, kicks.len()),
            (RecordKind::Contraction, contractions.len()),
            (RecordKind::Mood, moods.len()),
        ]);
        info!(
            "[RecordSync] refreshed {} records for {}",
            counts.values().sum::<usize>(),
            uid
        );
        counts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::{AuthSession, UserIdentity};
    use crate::records::{Intensity, Mood};
    use crate::store::MemoryBackend;
    use crate::sync::memory::InMemoryDocumentStore;
    use crate::sync::DocumentStore;
    use chrono::NaiveDate;
    use std::sync::Arc;

    struct Harness {
        service: RecordSyncService,
        session: Arc<AuthSession>,
        remote: Arc<InMemoryDocumentStore>,
        store: LocalStore,
    }

    fn harness() -> Harness {
        let store = LocalStore::new(Arc::new(MemoryBackend::new()));
        let remote = Arc::new(InMemoryDocumentStore::new());
        let session = Arc::new(AuthSession::new(store.clone()));
        let service = RecordSyncService::new(
            RecordSyncClient::new(remote.clone(), store.clone()),
            IdentityResolver::new(session.clone(), store.clone()),
            store.clone(),
        );
        Harness {
            service,
            session,
            remote,
            store,
        }
    }

    fn mood(id: &str) -> MoodEntry {
        MoodEntry {
            id: id.to_string(),
            date: NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
            mood: Mood::Tired,
            energy: 2,
            note: "slept badly".to_string(),
        }
    }

    #[tokio::test]
    async fn signed_out_save_stays_local() {
        let h = harness();
        let outcome = h.service.save_record(mood("m1")).await;
        assert_eq!(
            outcome,
            SyncOutcome {
                local_saved: true,
                remote_synced: false
            }
        );
        assert_eq!(load_records::<MoodEntry>(&h.store), vec![mood("m1")]);
        assert!(h.remote.is_empty());
    }

    #[tokio::test]
    async fn signed_in_save_reaches_remote() {
        let h = harness();
        h.session.sign_in(UserIdentity::new("u1"));
        let outcome = h.service.save_record(mood("m1")).await;
        assert!(outcome.local_saved && outcome.remote_synced);
        assert!(h
            .remote
            .get_document("users/u1/moodEntries/m1")
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn remote_failure_does_not_revert_local_write() {
        let h = harness();
        h.session.sign_in(UserIdentity::new("u1"));
        h.remote.set_online(false);

        let outcome = h.service.save_record(mood("m1")).await;
        assert!(outcome.local_saved);
        assert!(!outcome.remote_synced);
        assert_eq!(load_records::<MoodEntry>(&h.store).len(), 1);

        let outcome = h.service.delete_record::<MoodEntry>("m1").await;
        assert!(outcome.local_saved);
        assert!(!outcome.remote_synced);
        assert!(load_records::<MoodEntry>(&h.store).is_empty());
    }

    #[tokio::test]
    async fn refresh_all_pulls_every_kind() {
        let h = harness();
        let client = h.service.client();
        assert!(client.save("u1", &mood("m1")).await);
        assert!(
            client
                .save(
                    "u1",
                    &ExerciseRecord {
                        id: "e1".to_string(),
                        date: NaiveDate::from_ymd_opt(2024, 6, 2).unwrap(),
                        activity: "swim".to_string(),
                        duration_minutes: 25,
                        intensity: Intensity::Moderate,
                        note: String::new(),
                    }
                )
                .await
        );

        assert!(h.service.refresh_all().await.is_empty());

        h.session.sign_in(UserIdentity::new("u1"));
        let counts = h.service.refresh_all().await;
        assert_eq!(counts[&RecordKind::Mood], 1);
        assert_eq!(counts[&RecordKind::Exercise], 1);
        assert_eq!(counts[&RecordKind::Weight], 0);
        assert_eq!(h.service.refresh::<MoodEntry>().await, vec![mood("m1")]);
    }

    #[tokio::test]
    async fn refresh_keeps_records_that_never_reached_the_remote() {
        let h = harness();
        h.session.sign_in(UserIdentity::new("u1"));
        assert!(h.service.save_record(mood("a")).await.remote_synced);

        h.remote.set_online(false);
        let offline = h.service.save_record(mood("b")).await;
        assert_eq!(
            offline,
            SyncOutcome {
                local_saved: true,
                remote_synced: false
            }
        );

        h.remote.set_online(true);
        let ids: Vec<String> = h
            .service
            .refresh::<MoodEntry>()
            .await
            .into_iter()
            .map(|m| m.id)
            .collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert_eq!(load_records::<MoodEntry>(&h.store).len(), 2);
    }
}
