//! Normalized relational projection of a published graph.
//!
//! The rows are a read-optimized cache for consumers that do not want to
//! parse the blob. They are rebuilt wholesale on every publish and never
//! patched incrementally.

use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;

use super::model::{Edge, EdgeShape, Node, NodeKind, Point};
use super::snapshot::{Site, SiteId};

/// One row per edge
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionRow {
    /// Edge id
    pub edge_id: String,
    /// Owning site
    pub site_id: SiteId,
    /// Source node id
    pub source: String,
    /// Target node id
    pub target: String,
    /// Edge label
    pub label: String,
    /// Stroke color
    pub color: Option<String>,
}

/// Path geometry of a connection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentRow {
    /// Owning edge
    pub edge_id: String,
    /// Order of the segment along the path
    pub seq: i32,
    /// Start point
    pub start: Point,
    /// End point
    pub end: Point,
    /// `{ "shape": ..., "animated": ... }`
    pub meta: serde_json::Value,
}

/// One row per load tag of a connection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadTagRow {
    /// Owning edge
    pub edge_id: String,
    /// Position in the edge's load list
    pub position: i32,
    /// Tag as entered
    pub tag: String,
}

/// Label/position of a non-core node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeLabelRow {
    /// Owning site
    pub site_id: SiteId,
    /// Persisted node id
    pub node_id: String,
    /// Display label
    pub label: String,
    /// `node` or `label`
    pub kind: NodeKind,
    /// Left coordinate
    pub x: f64,
    /// Top coordinate
    pub y: f64,
    /// Width
    pub width: f64,
    /// Height
    pub height: f64,
    /// Fill color
    pub color: Option<String>,
}

/// Every relational row derived from one published graph
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Projection {
    /// Non-core node rows
    pub labels: Vec<NodeLabelRow>,
    /// Edge rows
    pub connections: Vec<ConnectionRow>,
    /// Load tag rows
    pub load_tags: Vec<LoadTagRow>,
    /// Geometry rows
    pub segments: Vec<SegmentRow>,
}

/// JSON sidecar stored with each segment
pub fn segment_meta(shape: EdgeShape, animated: bool) -> serde_json::Value {
    json!({ "shape": shape.as_str(), "animated": animated })
}

impl Projection {
    /// Build the rows for a decoded graph. Each edge gets exactly one
    /// straight segment between its endpoint centers, whatever its
    /// rendered shape.
    pub fn build(site_id: &SiteId, nodes: &[Node], edges: &[Edge]) -> Self {
        let centers: HashMap<&str, Point> = nodes.iter().map(|n| (n.id.as_str(), n.center())).collect();

        let labels = nodes
            .iter()
            .filter(|n| !n.is_core())
            .map(|n| NodeLabelRow {
                site_id: site_id.clone(),
                node_id: n.id.clone(),
                label: n.label.clone(),
                kind: n.kind,
                x: n.x,
                y: n.y,
                width: n.width,
                height: n.height,
                color: n.color.clone(),
            })
            .collect();

        let mut connections = Vec::with_capacity(edges.len());
        let mut load_tags = Vec::new();
        let mut segments = Vec::with_capacity(edges.len());

        for edge in edges {
            connections.push(ConnectionRow {
                edge_id: edge.id.clone(),
                site_id: site_id.clone(),
                source: edge.source.clone(),
                target: edge.target.clone(),
                label: edge.label.clone(),
                color: edge.color.clone(),
            });

            load_tags.extend(edge.loads.iter().enumerate().map(|(i, tag)| LoadTagRow {
                edge_id: edge.id.clone(),
                position: i as i32,
                tag: tag.clone(),
            }));

            segments.push(SegmentRow {
                edge_id: edge.id.clone(),
                seq: 0,
                start: centers.get(edge.source.as_str()).copied().unwrap_or_default(),
                end: centers.get(edge.target.as_str()).copied().unwrap_or_default(),
                meta: segment_meta(edge.shape, edge.animated),
            });
        }

        Self {
            labels,
            connections,
            load_tags,
            segments,
        }
    }

    /// Number of row inserts a publish performs for this projection
    pub fn insert_count(&self) -> usize {
        self.labels.len() + self.connections.len() + self.load_tags.len() + self.segments.len()
    }

    /// Rebuild the topology from rows: the core node comes from the site
    /// record, everything else from the label/connection rows.
    pub fn reconstruct(&self, site: &Site) -> (Vec<Node>, Vec<Edge>) {
        let mut nodes = Vec::with_capacity(self.labels.len() + 1);
        nodes.push(Node {
            id: site.code.clone(),
            label: site.name.clone(),
            kind: NodeKind::Core,
            x: site.x,
            y: site.y,
            width: site.width,
            height: site.height,
            color: site.color.clone(),
        });
        nodes.extend(self.labels.iter().map(|row| Node {
            id: row.node_id.clone(),
            label: row.label.clone(),
            kind: row.kind,
            x: row.x,
            y: row.y,
            width: row.width,
            height: row.height,
            color: row.color.clone(),
        }));

        let mut loads: HashMap<&str, Vec<&LoadTagRow>> = HashMap::new();
        for row in &self.load_tags {
            loads.entry(row.edge_id.as_str()).or_default().push(row);
        }
        let meta: HashMap<&str, &serde_json::Value> = self
            .segments
            .iter()
            .map(|s| (s.edge_id.as_str(), &s.meta))
            .collect();

        let edges = self
            .connections
            .iter()
            .map(|row| {
                let mut edge = Edge::new(row.edge_id.clone(), row.source.clone(), row.target.clone());
                edge.label = row.label.clone();
                edge.color = row.color.clone();
                if let Some(tags) = loads.get_mut(row.edge_id.as_str()) {
                    tags.sort_by_key(|t| t.position);
                    edge.loads = tags.iter().map(|t| t.tag.clone()).collect();
                }
                if let Some(meta) = meta.get(row.edge_id.as_str()) {
                    edge.shape = meta
                        .get("shape")
                        .and_then(|v| v.as_str())
                        .map(EdgeShape::from_wire)
                        .unwrap_or_default();
                    edge.animated = meta.get("animated").and_then(|v| v.as_bool()).unwrap_or(false);
                }
                edge
            })
            .collect();

        (nodes, edges)
    }
}
