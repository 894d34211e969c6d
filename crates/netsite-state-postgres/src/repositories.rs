use async_trait::async_trait;
use chrono::{DateTime, Utc};
use netsite_core::{
    domain::model::{NodeKind, Point},
    domain::projection::{ConnectionRow, LoadTagRow, NodeLabelRow, Projection, SegmentRow},
    domain::publish::PublishPlan,
    CoreError, Graph, Site, SiteId, Snapshot, SnapshotKind, TopologyRepository,
};
use sqlx::{postgres::PgRow, Postgres, Row, Transaction};
use tracing::{debug, error};

use crate::PostgresConnection;

fn snapshot_table(kind: SnapshotKind) -> &'static str {
    match kind {
        SnapshotKind::Draft => "topology_drafts",
        SnapshotKind::Published => "topology_published",
    }
}

fn read_err(what: &'static str) -> impl Fn(sqlx::Error) -> CoreError {
    move |e| CoreError::StateStoreError(format!("Failed to read {}: {}", what, e))
}

fn write_err(what: &'static str) -> impl Fn(sqlx::Error) -> CoreError {
    move |e| CoreError::StateStoreError(format!("Failed to write {}: {}", what, e))
}

/// Postgres implementation of the TopologyRepository
#[derive(Clone)]
pub struct PostgresTopologyRepository {
    conn: PostgresConnection,
}

impl PostgresTopologyRepository {
    /// Create a new Postgres topology repository
    pub fn new(conn: PostgresConnection) -> Self {
        Self { conn }
    }

    /// Insert or update a site record. Sites are owned by the surrounding
    /// inventory; this exists for provisioning and tests.
    pub async fn upsert_site(&self, site: &Site) -> Result<(), CoreError> {
        if self.conn.is_test_mode() {
            debug!(site_id = %site.id, "Test mode PostgreSQL: upsert_site");
            return Ok(());
        }

        sqlx::query(
            "
            INSERT INTO sites (id, code, name, x, y, width, height, color)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (id) DO UPDATE SET
                code = $2, name = $3, x = $4, y = $5, width = $6, height = $7, color = $8,
                updated_at = NOW()
            ",
        )
        .bind(&site.id.0)
        .bind(&site.code)
        .bind(&site.name)
        .bind(site.x)
        .bind(site.y)
        .bind(site.width)
        .bind(site.height)
        .bind(&site.color)
        .execute(self.conn.pool()?)
        .await
        .map_err(write_err("site"))?;

        Ok(())
    }

    fn snapshot_from_row(row: &PgRow) -> Result<Snapshot, CoreError> {
        let payload: serde_json::Value = row.try_get("payload").map_err(read_err("snapshot payload"))?;
        // A damaged entry in the stored blob drops that entry, not the read
        let payload = Graph::from_value(&payload);
        let updated_at: DateTime<Utc> = row.try_get("updated_at").map_err(read_err("snapshot"))?;

        Ok(Snapshot {
            site_id: SiteId(row.try_get("site_id").map_err(read_err("snapshot"))?),
            payload,
            meta: row.try_get("meta").map_err(read_err("snapshot"))?,
            updated_by: row.try_get("updated_by").map_err(read_err("snapshot"))?,
            updated_at,
        })
    }

    async fn upsert_snapshot(
        tx: &mut Transaction<'_, Postgres>,
        kind: SnapshotKind,
        snapshot: &Snapshot,
    ) -> Result<(), CoreError> {
        let payload = serde_json::to_value(&snapshot.payload)?;
        let query = format!(
            "
            INSERT INTO {} (site_id, payload, meta, updated_by, updated_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (site_id) DO UPDATE SET
                payload = $2, meta = $3, updated_by = $4, updated_at = $5
            ",
            snapshot_table(kind)
        );

        sqlx::query(&query)
            .bind(&snapshot.site_id.0)
            .bind(&payload)
            .bind(&snapshot.meta)
            .bind(&snapshot.updated_by)
            .bind(snapshot.updated_at)
            .execute(&mut **tx)
            .await
            .map_err(write_err("snapshot"))?;

        Ok(())
    }

    async fn rewrite_projection(
        tx: &mut Transaction<'_, Postgres>,
        plan: &PublishPlan,
    ) -> Result<(), CoreError> {
        let site_id = &plan.site_id.0;

        for table in ["connection_segments", "connection_load_tags", "connections", "node_labels"] {
            sqlx::query(&format!("DELETE FROM {} WHERE site_id = $1", table))
                .bind(site_id)
                .execute(&mut **tx)
                .await
                .map_err(write_err("projection cleanup"))?;
        }

        let update = &plan.site_update;
        let updated = sqlx::query(
            "UPDATE sites SET name = $2, x = $3, y = $4, width = $5, height = $6, color = $7, updated_at = NOW() WHERE id = $1",
        )
        .bind(site_id)
        .bind(&update.name)
        .bind(update.x)
        .bind(update.y)
        .bind(update.width)
        .bind(update.height)
        .bind(&update.color)
        .execute(&mut **tx)
        .await
        .map_err(write_err("site"))?;
        if updated.rows_affected() == 0 {
            return Err(CoreError::SiteNotFound(site_id.clone()));
        }

        for row in &plan.projection.labels {
            sqlx::query(
                "
                INSERT INTO node_labels (site_id, node_id, label, kind, x, y, width, height, color)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                ",
            )
            .bind(site_id)
            .bind(&row.node_id)
            .bind(&row.label)
            .bind(row.kind.as_str())
            .bind(row.x)
            .bind(row.y)
            .bind(row.width)
            .bind(row.height)
            .bind(&row.color)
            .execute(&mut **tx)
            .await
            .map_err(write_err("node label"))?;
        }

        for row in &plan.projection.connections {
            sqlx::query(
                "
                INSERT INTO connections (site_id, edge_id, source, target, label, color)
                VALUES ($1, $2, $3, $4, $5, $6)
                ",
            )
            .bind(site_id)
            .bind(&row.edge_id)
            .bind(&row.source)
            .bind(&row.target)
            .bind(&row.label)
            .bind(&row.color)
            .execute(&mut **tx)
            .await
            .map_err(write_err("connection"))?;
        }

        for row in &plan.projection.load_tags {
            sqlx::query(
                "INSERT INTO connection_load_tags (site_id, edge_id, position, tag) VALUES ($1, $2, $3, $4)",
            )
            .bind(site_id)
            .bind(&row.edge_id)
            .bind(row.position)
            .bind(&row.tag)
            .execute(&mut **tx)
            .await
            .map_err(write_err("load tag"))?;
        }

        for row in &plan.projection.segments {
            sqlx::query(
                "
                INSERT INTO connection_segments (site_id, edge_id, seq, start_x, start_y, end_x, end_y, meta)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                ",
            )
            .bind(site_id)
            .bind(&row.edge_id)
            .bind(row.seq)
            .bind(row.start.x)
            .bind(row.start.y)
            .bind(row.end.x)
            .bind(row.end.y)
            .bind(&row.meta)
            .execute(&mut **tx)
            .await
            .map_err(write_err("segment"))?;
        }

        Ok(())
    }
}

#[async_trait]
impl TopologyRepository for PostgresTopologyRepository {
    async fn find_site(&self, id: &SiteId) -> Result<Option<Site>, CoreError> {
        if self.conn.is_test_mode() {
            debug!(site_id = %id, "Test mode PostgreSQL: find_site");
            return Ok(None);
        }

        let row = sqlx::query("SELECT id, code, name, x, y, width, height, color FROM sites WHERE id = $1")
            .bind(&id.0)
            .fetch_optional(self.conn.pool()?)
            .await
            .map_err(read_err("site"))?;

        row.map(|row| -> Result<Site, CoreError> {
            Ok(Site {
                id: SiteId(row.try_get("id").map_err(read_err("site"))?),
                code: row.try_get("code").map_err(read_err("site"))?,
                name: row.try_get("name").map_err(read_err("site"))?,
                x: row.try_get("x").map_err(read_err("site"))?,
                y: row.try_get("y").map_err(read_err("site"))?,
                width: row.try_get("width").map_err(read_err("site"))?,
                height: row.try_get("height").map_err(read_err("site"))?,
                color: row.try_get("color").map_err(read_err("site"))?,
            })
        })
        .transpose()
    }

    async fn get_snapshot(&self, id: &SiteId, kind: SnapshotKind) -> Result<Option<Snapshot>, CoreError> {
        if self.conn.is_test_mode() {
            debug!(site_id = %id, ?kind, "Test mode PostgreSQL: get_snapshot");
            return Ok(None);
        }

        let query = format!(
            "SELECT site_id, payload, meta, updated_by, updated_at FROM {} WHERE site_id = $1",
            snapshot_table(kind)
        );
        let row = sqlx::query(&query)
            .bind(&id.0)
            .fetch_optional(self.conn.pool()?)
            .await
            .map_err(read_err("snapshot"))?;

        row.as_ref().map(Self::snapshot_from_row).transpose()
    }

    async fn save_draft(&self, snapshot: &Snapshot) -> Result<(), CoreError> {
        if self.conn.is_test_mode() {
            debug!(site_id = %snapshot.site_id, "Test mode PostgreSQL: save_draft");
            return Ok(());
        }

        let mut tx = self.conn.pool()?.begin().await?;
        Self::upsert_snapshot(&mut tx, SnapshotKind::Draft, snapshot).await?;
        tx.commit().await.map_err(write_err("draft"))?;
        Ok(())
    }

    async fn publish(&self, plan: &PublishPlan) -> Result<(), CoreError> {
        if self.conn.is_test_mode() {
            debug!(site_id = %plan.site_id, "Test mode PostgreSQL: publish");
            return Ok(());
        }

        // Dropping the transaction without commit rolls everything back
        let mut tx = self.conn.pool()?.begin().await?;

        if let Err(e) = Self::rewrite_projection(&mut tx, plan).await {
            error!(site_id = %plan.site_id, error = %e, "Publish failed, rolling back");
            return Err(e);
        }
        Self::upsert_snapshot(&mut tx, SnapshotKind::Draft, &plan.snapshot).await?;
        Self::upsert_snapshot(&mut tx, SnapshotKind::Published, &plan.snapshot).await?;

        tx.commit().await.map_err(write_err("publish"))?;
        debug!(site_id = %plan.site_id, rows = plan.projection.insert_count(), "Publish committed");
        Ok(())
    }

    async fn load_projection(&self, id: &SiteId) -> Result<Projection, CoreError> {
        if self.conn.is_test_mode() {
            debug!(site_id = %id, "Test mode PostgreSQL: load_projection");
            return Ok(Projection::default());
        }
        let pool = self.conn.pool()?;

        let labels = sqlx::query(
            "SELECT node_id, label, kind, x, y, width, height, color FROM node_labels WHERE site_id = $1 ORDER BY node_id",
        )
        .bind(&id.0)
        .fetch_all(pool)
        .await
        .map_err(read_err("node labels"))?
        .iter()
        .map(|row| -> Result<NodeLabelRow, CoreError> {
            let kind: String = row.try_get("kind").map_err(read_err("node label"))?;
            Ok(NodeLabelRow {
                site_id: id.clone(),
                node_id: row.try_get("node_id").map_err(read_err("node label"))?,
                label: row.try_get("label").map_err(read_err("node label"))?,
                kind: NodeKind::parse(&kind).unwrap_or_default(),
                x: row.try_get("x").map_err(read_err("node label"))?,
                y: row.try_get("y").map_err(read_err("node label"))?,
                width: row.try_get("width").map_err(read_err("node label"))?,
                height: row.try_get("height").map_err(read_err("node label"))?,
                color: row.try_get("color").map_err(read_err("node label"))?,
            })
        })
        .collect::<Result<Vec<_>, CoreError>>()?;

        let connections = sqlx::query(
            "SELECT edge_id, source, target, label, color FROM connections WHERE site_id = $1 ORDER BY edge_id",
        )
        .bind(&id.0)
        .fetch_all(pool)
        .await
        .map_err(read_err("connections"))?
        .iter()
        .map(|row| -> Result<ConnectionRow, CoreError> {
            Ok(ConnectionRow {
                edge_id: row.try_get("edge_id").map_err(read_err("connection"))?,
                site_id: id.clone(),
                source: row.try_get("source").map_err(read_err("connection"))?,
                target: row.try_get("target").map_err(read_err("connection"))?,
                label: row.try_get("label").map_err(read_err("connection"))?,
                color: row.try_get("color").map_err(read_err("connection"))?,
            })
        })
        .collect::<Result<Vec<_>, CoreError>>()?;

        let load_tags = sqlx::query(
            "SELECT edge_id, position, tag FROM connection_load_tags WHERE site_id = $1 ORDER BY edge_id, position",
        )
        .bind(&id.0)
        .fetch_all(pool)
        .await
        .map_err(read_err("load tags"))?
        .iter()
        .map(|row| -> Result<LoadTagRow, CoreError> {
            Ok(LoadTagRow {
                edge_id: row.try_get("edge_id").map_err(read_err("load tag"))?,
                position: row.try_get("position").map_err(read_err("load tag"))?,
                tag: row.try_get("tag").map_err(read_err("load tag"))?,
            })
        })
        .collect::<Result<Vec<_>, CoreError>>()?;

        let segments = sqlx::query(
            "
            SELECT edge_id, seq, start_x, start_y, end_x, end_y, meta
            FROM connection_segments WHERE site_id = $1 ORDER BY edge_id, seq
            ",
        )
        .bind(&id.0)
        .fetch_all(pool)
        .await
        .map_err(read_err("segments"))?
        .iter()
        .map(|row| -> Result<SegmentRow, CoreError> {
            Ok(SegmentRow {
                edge_id: row.try_get("edge_id").map_err(read_err("segment"))?,
                seq: row.try_get("seq").map_err(read_err("segment"))?,
                start: Point::new(
                    row.try_get("start_x").map_err(read_err("segment"))?,
                    row.try_get("start_y").map_err(read_err("segment"))?,
                ),
                end: Point::new(
                    row.try_get("end_x").map_err(read_err("segment"))?,
                    row.try_get("end_y").map_err(read_err("segment"))?,
                ),
                meta: row.try_get("meta").map_err(read_err("segment"))?,
            })
        })
        .collect::<Result<Vec<_>, CoreError>>()?;

        Ok(Projection {
            labels,
            connections,
            load_tags,
            segments,
        })
    }
}
