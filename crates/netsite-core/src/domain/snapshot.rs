use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use super::wire::Graph;

/// Site identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SiteId(pub String);

impl fmt::Display for SiteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SiteId {
    fn from(value: &str) -> Self {
        SiteId(value.to_string())
    }
}

/// The parts of a site record the topology core reads and writes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Site {
    /// Site id
    pub id: SiteId,
    /// Site code; the core node's id
    pub code: String,
    /// Display name; follows the core node's label
    pub name: String,
    /// Core node left coordinate
    pub x: f64,
    /// Core node top coordinate
    pub y: f64,
    /// Core node width
    pub width: f64,
    /// Core node height
    pub height: f64,
    /// Core node fill color
    #[serde(default)]
    pub color: Option<String>,
}

impl Site {
    /// A site with its core node at the origin and default size
    pub fn new(id: impl Into<String>, code: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: SiteId(id.into()),
            code: code.into(),
            name: name.into(),
            x: 0.0,
            y: 0.0,
            width: super::model::DEFAULT_NODE_WIDTH,
            height: super::model::DEFAULT_NODE_HEIGHT,
            color: None,
        }
    }
}

/// Which of the two per-site blobs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SnapshotKind {
    /// Mutable draft
    Draft,
    /// What viewers see
    Published,
}

/// A stored topology blob
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    /// Owning site
    pub site_id: SiteId,
    /// The graph payload
    pub payload: Graph,
    /// Free-form editor metadata (viewport, notes, ...)
    pub meta: serde_json::Value,
    /// Last writer, when known
    pub updated_by: Option<String>,
    /// Last write time
    pub updated_at: DateTime<Utc>,
}

impl Snapshot {
    /// A snapshot stamped now
    pub fn new(site_id: SiteId, payload: Graph, meta: serde_json::Value, updated_by: Option<String>) -> Self {
        Self {
            site_id,
            payload,
            meta,
            updated_by,
            updated_at: Utc::now(),
        }
    }
}

/// Per-site lifecycle. Publish is the only transition that advances the
/// published state; there is no unpublish.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TopologyState {
    /// Nothing stored yet
    NoTopology,
    /// A draft exists but was never published
    DraftOnly,
    /// Draft and published payloads are identical
    Published,
    /// The draft moved on since the last publish
    DraftAheadOfPublished,
}

impl TopologyState {
    /// Derive the state from the two stored blobs
    pub fn from_snapshots(draft: Option<&Snapshot>, published: Option<&Snapshot>) -> Self {
        match (draft, published) {
            (None, None) => TopologyState::NoTopology,
            (Some(_), None) => TopologyState::DraftOnly,
            (None, Some(_)) => TopologyState::Published,
            (Some(d), Some(p)) if d.payload == p.payload => TopologyState::Published,
            (Some(_), Some(_)) => TopologyState::DraftAheadOfPublished,
        }
    }
}
