//! Draft/publish payload as stored and exchanged with editors.
//!
//! Every field except the ids is optional on the way in; readers must
//! tolerate partially filled entries (see [`crate::domain::codec`]).

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use super::model::Point;

fn lenient_entries<T: DeserializeOwned>(value: &Value, key: &str) -> Vec<T> {
    let items = match value.get(key) {
        Some(Value::Array(items)) => items,
        Some(Value::Null) | None => return Vec::new(),
        Some(_) => {
            warn!(field = key, "Topology field is not an array");
            return Vec::new();
        }
    };

    items
        .iter()
        .filter_map(|item| match T::deserialize(item) {
            Ok(entry) => Some(entry),
            Err(e) => {
                debug!(field = key, error = %e, "Skipping unreadable entry");
                None
            }
        })
        .collect()
}

/// Stored topology blob for one site
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Graph {
    /// Diagram nodes
    #[serde(default)]
    pub nodes: Vec<WireNode>,

    /// Diagram edges
    #[serde(default)]
    pub edges: Vec<WireEdge>,
}

impl Graph {
    /// Whether the blob carries neither nodes nor edges
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.edges.is_empty()
    }

    /// Read a raw blob without failing. Non-object blobs and non-array
    /// `nodes`/`edges` give empty lists; entries that do not deserialize
    /// (a numeric id, a string coordinate) are dropped one by one.
    pub fn from_value(value: &Value) -> Self {
        Self {
            nodes: lenient_entries(value, "nodes"),
            edges: lenient_entries(value, "edges"),
        }
    }
}

/// A node entry in the stored blob
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireNode {
    /// Node id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Display label
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Left coordinate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<f64>,
    /// Top coordinate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<f64>,
    /// Rendered width
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<f64>,
    /// Rendered height
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<f64>,
    /// Fill color
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    /// `core`, `node` or `label`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}

/// An edge entry in the stored blob
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireEdge {
    /// Edge id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Source node id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    /// Target node id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    /// Source handle id, e.g. `s-bottom-1`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_handle: Option<String>,
    /// Target handle id, e.g. `t-top-1`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_handle: Option<String>,
    /// Display label
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Stroke color
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    /// Whether the edge is structural (carries no loads)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub structural: Option<bool>,
    /// Load tags
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loads: Option<Vec<String>>,
    /// Renderer edge type (shape)
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub edge_type: Option<String>,
    /// Animated stroke
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub animated: Option<bool>,
    /// Label position along the path
    #[serde(rename = "labelT", default, skip_serializing_if = "Option::is_none")]
    pub label_t: Option<f64>,
    /// Label displacement from the path point
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label_offset: Option<Point>,
}
