/// Generate SQL migrations for the PostgreSQL topology store
///
/// Applied in order on startup; every statement is idempotent.
pub fn generate_migrations() -> Vec<(&'static str, &'static str)> {
    vec![
        (
            "20250301000000_sites",
            r#"
            CREATE TABLE IF NOT EXISTS sites (
                id TEXT PRIMARY KEY,
                code TEXT NOT NULL UNIQUE,
                name TEXT NOT NULL,
                x DOUBLE PRECISION NOT NULL DEFAULT 0,
                y DOUBLE PRECISION NOT NULL DEFAULT 0,
                width DOUBLE PRECISION NOT NULL DEFAULT 120,
                height DOUBLE PRECISION NOT NULL DEFAULT 48,
                color TEXT,
                updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            );
            "#,
        ),
        (
            "20250301000100_topology_snapshots",
            r#"
            CREATE TABLE IF NOT EXISTS topology_drafts (
                site_id TEXT PRIMARY KEY REFERENCES sites(id) ON DELETE CASCADE,
                payload JSONB NOT NULL,
                meta JSONB NOT NULL DEFAULT '{}'::jsonb,
                updated_by TEXT,
                updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            );

            CREATE TABLE IF NOT EXISTS topology_published (
                site_id TEXT PRIMARY KEY REFERENCES sites(id) ON DELETE CASCADE,
                payload JSONB NOT NULL,
                meta JSONB NOT NULL DEFAULT '{}'::jsonb,
                updated_by TEXT,
                updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            );
            "#,
        ),
        (
            "20250301000200_relational_projection",
            r#"
            CREATE TABLE IF NOT EXISTS node_labels (
                site_id TEXT NOT NULL REFERENCES sites(id) ON DELETE CASCADE,
                node_id TEXT NOT NULL,
                label TEXT NOT NULL,
                kind TEXT NOT NULL,
                x DOUBLE PRECISION NOT NULL,
                y DOUBLE PRECISION NOT NULL,
                width DOUBLE PRECISION NOT NULL,
                height DOUBLE PRECISION NOT NULL,
                color TEXT,
                PRIMARY KEY (site_id, node_id)
            );

            CREATE TABLE IF NOT EXISTS connections (
                site_id TEXT NOT NULL REFERENCES sites(id) ON DELETE CASCADE,
                edge_id TEXT NOT NULL,
                source TEXT NOT NULL,
                target TEXT NOT NULL,
                label TEXT NOT NULL DEFAULT '',
                color TEXT,
                PRIMARY KEY (site_id, edge_id)
            );

            CREATE TABLE IF NOT EXISTS connection_load_tags (
                site_id TEXT NOT NULL,
                edge_id TEXT NOT NULL,
                position INTEGER NOT NULL,
                tag TEXT NOT NULL,
                PRIMARY KEY (site_id, edge_id, position),
                FOREIGN KEY (site_id, edge_id) REFERENCES connections(site_id, edge_id)
            );

            CREATE TABLE IF NOT EXISTS connection_segments (
                site_id TEXT NOT NULL,
                edge_id TEXT NOT NULL,
                seq INTEGER NOT NULL,
                start_x DOUBLE PRECISION NOT NULL,
                start_y DOUBLE PRECISION NOT NULL,
                end_x DOUBLE PRECISION NOT NULL,
                end_y DOUBLE PRECISION NOT NULL,
                meta JSONB NOT NULL,
                PRIMARY KEY (site_id, edge_id, seq),
                FOREIGN KEY (site_id, edge_id) REFERENCES connections(site_id, edge_id)
            );
            "#,
        ),
        (
            "20250301000300_projection_indexes",
            r#"
            CREATE INDEX IF NOT EXISTS idx_connections_source ON connections(site_id, source);
            CREATE INDEX IF NOT EXISTS idx_connections_target ON connections(site_id, target);
            CREATE INDEX IF NOT EXISTS idx_connection_load_tags_tag ON connection_load_tags(tag);
            "#,
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migrations_are_ordered_and_unique() {
        let migrations = generate_migrations();
        let names: Vec<&str> = migrations.iter().map(|(name, _)| *name).collect();
        let mut sorted = names.clone();
        sorted.sort();
        sorted.dedup();
        assert_eq!(names, sorted);
    }

    #[test]
    fn test_child_tables_follow_their_parents() {
        let sql: String = generate_migrations().iter().map(|(_, sql)| *sql).collect();
        let pos = |table: &str| {
            sql.find(&format!("CREATE TABLE IF NOT EXISTS {} ", table))
                .unwrap_or_else(|| panic!("missing table {}", table))
        };

        assert!(pos("sites") < pos("topology_drafts"));
        assert!(pos("sites") < pos("node_labels"));
        assert!(pos("connections") < pos("connection_load_tags"));
        assert!(pos("connections") < pos("connection_segments"));
        assert!(pos("topology_published") > pos("sites"));
    }
}
