//! Repository traits for the Netsite topology core
//!
//! Storage backends implement [`TopologyRepository`]. The in-memory
//! implementation lives behind the `testing` feature; the Postgres one is
//! in `netsite-state-postgres`.

use async_trait::async_trait;

use super::projection::Projection;
use super::publish::PublishPlan;
use super::snapshot::{Site, SiteId, Snapshot, SnapshotKind};
use crate::CoreError;

/// Persistence for site topology blobs and their relational projection
#[async_trait]
pub trait TopologyRepository: Send + Sync {
    /// Find a site by id
    async fn find_site(&self, id: &SiteId) -> Result<Option<Site>, CoreError>;

    /// Read the draft or published blob of a site
    async fn get_snapshot(&self, id: &SiteId, kind: SnapshotKind) -> Result<Option<Snapshot>, CoreError>;

    /// Upsert the draft blob. Touches nothing else.
    async fn save_draft(&self, snapshot: &Snapshot) -> Result<(), CoreError>;

    /// Apply a publish plan as one unit: delete the site's projection rows,
    /// update the site from the core node, insert the new rows and upsert
    /// both blobs. On error nothing of it is visible.
    async fn publish(&self, plan: &PublishPlan) -> Result<(), CoreError>;

    /// Read the site's relational projection (empty if never published)
    async fn load_projection(&self, id: &SiteId) -> Result<Projection, CoreError>;
}

#[cfg(feature = "testing")]
pub mod memory {
    use super::*;
    use dashmap::DashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::sync::Mutex;
    use tracing::{debug, warn};

    /// Everything stored for one site. Replaced as a whole, so a reader
    /// never sees a blob from one publish next to rows from another.
    #[derive(Debug, Clone)]
    struct SiteEntry {
        site: Site,
        draft: Option<Snapshot>,
        published: Option<Snapshot>,
        projection: Projection,
    }

    impl SiteEntry {
        fn new(site: Site) -> Self {
            Self {
                site,
                draft: None,
                published: None,
                projection: Projection::default(),
            }
        }
    }

    /// In-memory topology store.
    ///
    /// Writers serialize on one lock. A publish stages a copy of the site's
    /// entry and swaps it in only after the last staged write succeeded,
    /// which gives it the same all-or-nothing behavior as a database
    /// transaction.
    pub struct MemoryTopologyRepository {
        entries: Arc<DashMap<SiteId, SiteEntry>>,
        write_lock: Mutex<()>,
        // 0 disables failure injection
        fail_on_insert: AtomicUsize,
    }

    impl MemoryTopologyRepository {
        /// Create an empty store
        pub fn new() -> Self {
            Self {
                entries: Arc::new(DashMap::with_capacity(16)),
                write_lock: Mutex::new(()),
                fail_on_insert: AtomicUsize::new(0),
            }
        }

        /// Add or replace a site record. Stored blobs and rows are kept.
        pub fn register_site(&self, site: Site) {
            self.entries
                .entry(site.id.clone())
                .and_modify(|entry| entry.site = site.clone())
                .or_insert_with(|| SiteEntry::new(site));
        }

        /// The published blob together with the rows of the same publish
        pub fn published_view(&self, id: &SiteId) -> Option<(Snapshot, Projection)> {
            let entry = self.entries.get(id)?;
            let published = entry.published.clone()?;
            Some((published, entry.projection.clone()))
        }

        /// Make the `n`-th row write of the next publish fail with a store
        /// error. Fires once; `0` disarms it.
        pub fn fail_on_nth_insert(&self, n: usize) {
            self.fail_on_insert.store(n, Ordering::SeqCst);
        }

        fn staged_insert(&self, count: &mut usize) -> Result<(), CoreError> {
            *count += 1;
            let armed = self.fail_on_insert.load(Ordering::SeqCst);
            if armed != 0 && armed == *count {
                self.fail_on_insert.store(0, Ordering::SeqCst);
                return Err(CoreError::StateStoreError(format!(
                    "Injected failure on insert #{}",
                    count
                )));
            }
            Ok(())
        }

        fn entry(&self, id: &SiteId) -> Result<SiteEntry, CoreError> {
            self.entries
                .get(id)
                .map(|entry| entry.clone())
                .ok_or_else(|| CoreError::SiteNotFound(id.0.clone()))
        }
    }

    impl Default for MemoryTopologyRepository {
        fn default() -> Self {
            Self::new()
        }
    }

    #[async_trait]
    impl TopologyRepository for MemoryTopologyRepository {
        async fn find_site(&self, id: &SiteId) -> Result<Option<Site>, CoreError> {
            Ok(self.entries.get(id).map(|entry| entry.site.clone()))
        }

        async fn get_snapshot(&self, id: &SiteId, kind: SnapshotKind) -> Result<Option<Snapshot>, CoreError> {
            Ok(self.entries.get(id).and_then(|entry| match kind {
                SnapshotKind::Draft => entry.draft.clone(),
                SnapshotKind::Published => entry.published.clone(),
            }))
        }

        async fn save_draft(&self, snapshot: &Snapshot) -> Result<(), CoreError> {
            let _guard = self.write_lock.lock().await;
            let mut entry = self.entry(&snapshot.site_id)?;
            entry.draft = Some(snapshot.clone());
            self.entries.insert(snapshot.site_id.clone(), entry);
            Ok(())
        }

        async fn publish(&self, plan: &PublishPlan) -> Result<(), CoreError> {
            let _guard = self.write_lock.lock().await;

            let mut entry = self.entry(&plan.site_id)?;
            plan.site_update.apply(&mut entry.site);

            // Stage the rewrite; the old rows count as deleted from here on
            let mut staged = Projection::default();
            let mut inserts = 0;
            for row in &plan.projection.labels {
                self.staged_insert(&mut inserts)?;
                staged.labels.push(row.clone());
            }
            for row in &plan.projection.connections {
                self.staged_insert(&mut inserts)?;
                staged.connections.push(row.clone());
            }
            for row in &plan.projection.load_tags {
                self.staged_insert(&mut inserts)?;
                staged.load_tags.push(row.clone());
            }
            for row in &plan.projection.segments {
                self.staged_insert(&mut inserts)?;
                staged.segments.push(row.clone());
            }
            self.staged_insert(&mut inserts)?;
            entry.draft = Some(plan.snapshot.clone());
            self.staged_insert(&mut inserts)?;
            entry.published = Some(plan.snapshot.clone());
            entry.projection = staged;

            debug!(site_id = %plan.site_id, rows = inserts, "Swapping staged publish");
            self.entries.insert(plan.site_id.clone(), entry);

            Ok(())
        }

        async fn load_projection(&self, id: &SiteId) -> Result<Projection, CoreError> {
            match self.entries.get(id) {
                Some(entry) => Ok(entry.projection.clone()),
                None => {
                    warn!(site_id = %id, "Projection requested for unknown site");
                    Ok(Projection::default())
                }
            }
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;
        use crate::domain::wire::Graph;
        use serde_json::json;

        fn site() -> Site {
            Site::new("1", "AMS1", "Amsterdam")
        }

        fn plan(target_label: &str) -> PublishPlan {
            let graph: Graph = serde_json::from_value(json!({
                "nodes": [
                    {"id": "AMS1", "label": "Amsterdam", "kind": "core"},
                    {"id": "n", "label": target_label}
                ],
                "edges": [{"id": "e1", "source": "AMS1", "target": "n", "loads": ["4G", "5G"]}]
            }))
            .unwrap();
            PublishPlan::build(&site(), &graph, json!({}), None).unwrap()
        }

        #[tokio::test]
        async fn test_publish_writes_everything() {
            let repo = MemoryTopologyRepository::new();
            repo.register_site(site());
            let plan = plan("Rotterdam");

            repo.publish(&plan).await.unwrap();

            let published = repo.get_snapshot(&site().id, SnapshotKind::Published).await.unwrap();
            let draft = repo.get_snapshot(&site().id, SnapshotKind::Draft).await.unwrap();
            assert_eq!(published.as_ref().map(|s| &s.payload), Some(&plan.snapshot.payload));
            assert_eq!(draft.map(|s| s.payload), published.map(|s| s.payload));
            assert_eq!(repo.load_projection(&site().id).await.unwrap(), plan.projection);
        }

        #[tokio::test]
        async fn test_failed_publish_leaves_previous_state() {
            let repo = MemoryTopologyRepository::new();
            repo.register_site(site());
            let first = plan("Rotterdam");
            repo.publish(&first).await.unwrap();

            let second = plan("Utrecht");
            for n in 1..=second.projection.insert_count() + 2 {
                repo.fail_on_nth_insert(n);
                let err = repo.publish(&second).await.unwrap_err();
                assert!(err.is_retryable());

                let published = repo
                    .get_snapshot(&site().id, SnapshotKind::Published)
                    .await
                    .unwrap()
                    .unwrap();
                assert_eq!(published.payload, first.snapshot.payload);
                assert_eq!(repo.load_projection(&site().id).await.unwrap(), first.projection);
            }

            // Injection is one-shot, so the retry goes through
            repo.publish(&second).await.unwrap();
            assert_eq!(repo.load_projection(&site().id).await.unwrap(), second.projection);
        }

        #[tokio::test]
        async fn test_publish_unknown_site() {
            let repo = MemoryTopologyRepository::new();
            let result = repo.publish(&plan("Rotterdam")).await;
            assert!(matches!(result, Err(CoreError::SiteNotFound(_))));
        }

        #[tokio::test]
        async fn test_save_draft_leaves_published_alone() {
            let repo = MemoryTopologyRepository::new();
            repo.register_site(site());
            let snapshot = Snapshot::new(site().id, Graph::default(), json!({}), Some("ops".into()));

            repo.save_draft(&snapshot).await.unwrap();

            assert!(repo.get_snapshot(&site().id, SnapshotKind::Draft).await.unwrap().is_some());
            assert!(repo.get_snapshot(&site().id, SnapshotKind::Published).await.unwrap().is_none());
            assert_eq!(repo.load_projection(&site().id).await.unwrap(), Projection::default());
        }

        #[tokio::test]
        async fn test_save_draft_for_unknown_site() {
            let repo = MemoryTopologyRepository::new();
            let snapshot = Snapshot::new(site().id, Graph::default(), json!({}), None);
            let result = repo.save_draft(&snapshot).await;
            assert!(matches!(result, Err(CoreError::SiteNotFound(_))));
        }

        #[tokio::test]
        async fn test_register_site_keeps_stored_topology() {
            let repo = MemoryTopologyRepository::new();
            repo.register_site(site());
            let plan = plan("Rotterdam");
            repo.publish(&plan).await.unwrap();

            repo.register_site(Site::new("1", "AMS1", "Amsterdam Zuid"));

            let found = repo.find_site(&site().id).await.unwrap().unwrap();
            assert_eq!(found.name, "Amsterdam Zuid");
            assert_eq!(repo.load_projection(&site().id).await.unwrap(), plan.projection);
        }

        #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
        async fn test_readers_never_see_a_half_swapped_publish() {
            let repo = Arc::new(MemoryTopologyRepository::new());
            repo.register_site(site());
            let plans = Arc::new([plan("Rotterdam"), plan("Utrecht")]);
            repo.publish(&plans[0]).await.unwrap();

            let writer = {
                let repo = repo.clone();
                let plans = plans.clone();
                tokio::spawn(async move {
                    for i in 0..200 {
                        repo.publish(&plans[i % 2]).await.unwrap();
                        tokio::task::yield_now().await;
                    }
                })
            };

            let reader = {
                let repo = repo.clone();
                let plans = plans.clone();
                tokio::spawn(async move {
                    for _ in 0..500 {
                        let (published, projection) = repo.published_view(&site().id).unwrap();
                        let expected = plans
                            .iter()
                            .find(|p| p.snapshot.payload == published.payload)
                            .unwrap();
                        assert_eq!(projection, expected.projection);
                        tokio::task::yield_now().await;
                    }
                })
            };

            writer.await.unwrap();
            reader.await.unwrap();
        }
    }
}
