use crate::{
    domain::alternates::{find_alternates, AlternateMap},
    domain::codec,
    domain::projection::Projection,
    domain::publish::PublishPlan,
    domain::repository::TopologyRepository,
    domain::snapshot::{Site, SiteId, Snapshot, SnapshotKind, TopologyState},
    domain::wire::Graph,
    CoreError,
};
use std::sync::Arc;

/// Caller clearance, decided upstream and trusted here
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Access {
    /// May read drafts
    pub can_read: bool,
    /// May save and publish
    pub can_write: bool,
    /// Recorded as `updated_by` on writes
    pub user: Option<String>,
}

impl Access {
    /// Read-only clearance
    pub fn read_only() -> Self {
        Self {
            can_read: true,
            ..Default::default()
        }
    }

    /// Full clearance
    pub fn writer(user: Option<String>) -> Self {
        Self {
            can_read: true,
            can_write: true,
            user,
        }
    }

    fn require_read(&self, site_id: &SiteId) -> Result<(), CoreError> {
        if self.can_read || self.can_write {
            Ok(())
        } else {
            Err(CoreError::Forbidden(format!("No read access to site {}", site_id)))
        }
    }

    fn require_write(&self, site_id: &SiteId) -> Result<(), CoreError> {
        if self.can_write {
            Ok(())
        } else {
            Err(CoreError::Forbidden(format!("No write access to site {}", site_id)))
        }
    }
}

/// Draft/publish lifecycle of site topologies
pub struct TopologyService {
    repo: Arc<dyn TopologyRepository>,
}

impl TopologyService {
    /// Create a new topology service
    pub fn new(repo: Arc<dyn TopologyRepository>) -> Self {
        Self { repo }
    }

    async fn require_site(&self, site_id: &SiteId) -> Result<Site, CoreError> {
        self.repo
            .find_site(site_id)
            .await?
            .ok_or_else(|| CoreError::SiteNotFound(site_id.0.clone()))
    }

    /// The site's draft graph, if one was saved
    pub async fn get_draft(&self, site_id: &SiteId, access: &Access) -> Result<Option<Graph>, CoreError> {
        access.require_read(site_id)?;
        let draft = self.repo.get_snapshot(site_id, SnapshotKind::Draft).await?;
        Ok(draft.map(|s| s.payload))
    }

    /// Store a draft. The graph is normalized on the way in (ids resolved,
    /// handles and `labelT` cleaned up); nothing else is touched.
    pub async fn save_draft(
        &self,
        site_id: &SiteId,
        graph: Graph,
        meta: serde_json::Value,
        access: &Access,
    ) -> Result<(), CoreError> {
        access.require_write(site_id)?;
        self.require_site(site_id).await?;

        let (nodes, edges) = codec::decode(&graph);
        let payload = codec::encode(&nodes, &edges);
        let snapshot = Snapshot::new(site_id.clone(), payload, meta, access.user.clone());

        self.repo.save_draft(&snapshot).await?;

        tracing::info!(
            site_id = %site_id,
            nodes = snapshot.payload.nodes.len(),
            edges = snapshot.payload.edges.len(),
            "Draft saved"
        );
        Ok(())
    }

    /// Validate and publish a graph. Validation errors surface before any
    /// storage write; store errors leave the previous publish intact.
    pub async fn publish(
        &self,
        site_id: &SiteId,
        graph: Graph,
        meta: serde_json::Value,
        access: &Access,
    ) -> Result<(), CoreError> {
        access.require_write(site_id)?;
        let site = self.require_site(site_id).await?;

        let plan = PublishPlan::build(&site, &graph, meta, access.user.clone())?;
        let rows = plan.projection.insert_count();

        if let Err(e) = self.repo.publish(&plan).await {
            tracing::error!(site_id = %site_id, error = %e, "Publish rolled back");
            return Err(e);
        }

        tracing::info!(
            site_id = %site_id,
            site_name = %plan.site_update.name,
            rows,
            "Topology published"
        );
        Ok(())
    }

    /// The graph viewers see
    pub async fn get_published(&self, site_id: &SiteId) -> Result<Option<Graph>, CoreError> {
        let published = self.repo.get_snapshot(site_id, SnapshotKind::Published).await?;
        Ok(published.map(|s| s.payload))
    }

    /// Alternates for the offline edges of a graph
    pub fn find_alternates(&self, offline: &[String], graph: &Graph) -> AlternateMap {
        let (_, edges) = codec::decode(graph);
        find_alternates(offline, &edges)
    }

    /// Where the site is in its draft/publish lifecycle
    pub async fn topology_state(&self, site_id: &SiteId) -> Result<TopologyState, CoreError> {
        self.require_site(site_id).await?;
        let draft = self.repo.get_snapshot(site_id, SnapshotKind::Draft).await?;
        let published = self.repo.get_snapshot(site_id, SnapshotKind::Published).await?;
        Ok(TopologyState::from_snapshots(draft.as_ref(), published.as_ref()))
    }

    /// Relational rows of the last publish
    pub async fn published_projection(&self, site_id: &SiteId) -> Result<Projection, CoreError> {
        self.require_site(site_id).await?;
        self.repo.load_projection(site_id).await
    }
}
