//! Pure first half of a publish: validate the incoming graph and compute
//! everything the transactional rewrite needs.
//!
//! Nothing here touches storage, so a rejected graph never opens a
//! transaction.

use std::collections::HashSet;

use tracing::{debug, warn};

use super::codec;
use super::model::{Edge, Node, NodeKind};
use super::projection::Projection;
use super::snapshot::{Site, SiteId, Snapshot};
use super::wire::Graph;
use crate::CoreError;

/// Site fields rewritten from the core node
#[derive(Debug, Clone, PartialEq)]
pub struct SiteUpdate {
    /// Site name (core node label)
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
    pub color: Option<String>,
}

impl SiteUpdate {
    /// Apply the update to a site record
    pub fn apply(&self, site: &mut Site) {
        site.name = self.name.clone();
        site.x = self.x;
        site.y = self.y;
        site.width = self.width;
        site.height = self.height;
        site.color = self.color.clone();
    }
}

/// Everything a repository needs to publish atomically
#[derive(Debug, Clone, PartialEq)]
pub struct PublishPlan {
    /// Target site
    pub site_id: SiteId,
    /// Site fields taken from the core node
    pub site_update: SiteUpdate,
    /// Rows replacing the site's relational projection
    pub projection: Projection,
    /// Blob written as both draft and published snapshot
    pub snapshot: Snapshot,
}

fn require(value: Option<&String>, what: &str, index: usize) -> Result<String, CoreError> {
    value
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .ok_or_else(|| CoreError::ValidationError(format!("{} #{} is missing", what, index)))
}

/// Reject graphs a publish must not accept: empty arrays, entries without
/// ids, duplicate ids and dangling endpoints.
pub fn validate_graph(graph: &Graph) -> Result<(), CoreError> {
    if graph.nodes.is_empty() {
        return Err(CoreError::ValidationError("Graph has no nodes".to_string()));
    }
    if graph.edges.is_empty() {
        return Err(CoreError::ValidationError("Graph has no edges".to_string()));
    }

    let mut node_ids = HashSet::with_capacity(graph.nodes.len());
    for (i, node) in graph.nodes.iter().enumerate() {
        let id = require(node.id.as_ref(), "Node id of node", i)?;
        if !node_ids.insert(id.clone()) {
            return Err(CoreError::ValidationError(format!("Duplicate node id: {}", id)));
        }
    }

    let mut edge_ids = HashSet::with_capacity(graph.edges.len());
    for (i, edge) in graph.edges.iter().enumerate() {
        let id = require(edge.id.as_ref(), "Edge id of edge", i)?;
        let source = require(edge.source.as_ref(), "Source of edge", i)?;
        let target = require(edge.target.as_ref(), "Target of edge", i)?;

        if !edge_ids.insert(id.clone()) {
            return Err(CoreError::ValidationError(format!("Duplicate edge id: {}", id)));
        }
        for endpoint in [&source, &target] {
            if !node_ids.contains(endpoint) {
                return Err(CoreError::ValidationError(format!(
                    "Edge {} references unknown node {}",
                    id, endpoint
                )));
            }
        }
    }

    Ok(())
}

/// Find the core node: the single `kind = core` node, or failing that the
/// node whose id is the site's code (which is then promoted to core).
fn locate_core(nodes: &mut [Node], site: &Site) -> Result<usize, CoreError> {
    let cores = nodes.iter().filter(|n| n.is_core()).count();
    if cores > 1 {
        return Err(CoreError::ValidationError(format!(
            "Graph has {} core nodes, expected one",
            cores
        )));
    }

    if let Some(idx) = nodes.iter().position(|n| n.is_core()) {
        return Ok(idx);
    }

    let idx = nodes.iter().position(|n| n.id == site.code).ok_or_else(|| {
        CoreError::ValidationError(format!("Graph has no core node for site {}", site.code))
    })?;
    debug!(site_code = %site.code, "Promoting node matching the site code to core");
    nodes[idx].kind = NodeKind::Core;
    Ok(idx)
}

/// The core node's id is the site code. A core carrying another id is
/// renamed and its edges follow; a different node already holding the
/// code makes the graph ambiguous.
fn pin_core_id(nodes: &mut [Node], edges: &mut [Edge], core: usize, site: &Site) -> Result<(), CoreError> {
    if nodes[core].id == site.code {
        return Ok(());
    }
    if nodes.iter().any(|n| n.id == site.code) {
        return Err(CoreError::ValidationError(format!(
            "Node {} uses the site code but is not the core node",
            site.code
        )));
    }

    let old = std::mem::replace(&mut nodes[core].id, site.code.clone());
    warn!(site_code = %site.code, core_id = %old, "Renaming core node to the site code");
    for edge in edges.iter_mut() {
        if edge.source == old {
            edge.source = site.code.clone();
        }
        if edge.target == old {
            edge.target = site.code.clone();
        }
    }
    Ok(())
}

impl PublishPlan {
    /// Validate `graph` against `site` and compute the plan
    pub fn build(
        site: &Site,
        graph: &Graph,
        meta: serde_json::Value,
        updated_by: Option<String>,
    ) -> Result<Self, CoreError> {
        validate_graph(graph)?;

        let (mut nodes, mut edges) = codec::decode(graph);
        let core_idx = locate_core(&mut nodes, site)?;
        pin_core_id(&mut nodes, &mut edges, core_idx, site)?;

        let core = &nodes[core_idx];
        let site_update = SiteUpdate {
            name: core.label.clone(),
            x: core.x,
            y: core.y,
            width: core.width,
            height: core.height,
            color: core.color.clone(),
        };

        let payload = codec::encode(&nodes, &edges);

        // Rows come from the stored blob itself so they can always be
        // rebuilt from it.
        let (stored_nodes, stored_edges) = codec::decode(&payload);
        let projection = Projection::build(&site.id, &stored_nodes, &stored_edges);

        Ok(Self {
            site_id: site.id.clone(),
            site_update,
            projection,
            snapshot: Snapshot::new(site.id.clone(), payload, meta, updated_by),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn site() -> Site {
        Site::new("1", "AMS1", "Amsterdam")
    }

    fn graph(value: serde_json::Value) -> Graph {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_plan_from_valid_graph() {
        let g = graph(json!({
            "nodes": [
                {"id": "AMS1", "label": "Amsterdam Zuid", "kind": "core", "x": 10, "y": 20, "width": 150, "height": 60},
                {"id": "tmp-1", "label": "Rotterdam"},
                {"id": "tmp-2", "label": "legend", "kind": "label"}
            ],
            "edges": [
                {"id": "e1", "source": "AMS1", "target": "tmp-1", "loads": ["4G", "DWDM"]}
            ]
        }));

        let plan = PublishPlan::build(&site(), &g, json!({"zoom": 1}), Some("ops".into())).unwrap();

        assert_eq!(plan.site_update.name, "Amsterdam Zuid");
        assert_eq!((plan.site_update.x, plan.site_update.width), (10.0, 150.0));
        assert_eq!(plan.projection.labels.len(), 2);
        assert_eq!(plan.projection.connections[0].target, "Rotterdam");
        assert_eq!(plan.projection.load_tags.len(), 2);
        assert_eq!(plan.snapshot.payload.edges[0].target.as_deref(), Some("Rotterdam"));
        assert_eq!(plan.snapshot.updated_by.as_deref(), Some("ops"));
    }

    #[test]
    fn test_core_found_by_site_code() {
        let g = graph(json!({
            "nodes": [{"id": "AMS1", "label": "Amsterdam"}, {"id": "b", "label": "B"}],
            "edges": [{"id": "e1", "source": "AMS1", "target": "b"}]
        }));

        let plan = PublishPlan::build(&site(), &g, json!(null), None).unwrap();
        assert_eq!(plan.projection.labels.len(), 1);
        assert_eq!(plan.snapshot.payload.nodes[0].kind.as_deref(), Some("core"));
    }

    #[test]
    fn test_rejections_happen_before_storage() {
        let cases = [
            json!({"nodes": [], "edges": []}),
            json!({"nodes": [{"id": "AMS1", "kind": "core"}], "edges": []}),
            json!({"nodes": [{"id": "AMS1", "kind": "core"}, {"label": "x"}],
                   "edges": [{"id": "e1", "source": "AMS1", "target": "AMS1"}]}),
            json!({"nodes": [{"id": "AMS1", "kind": "core"}],
                   "edges": [{"id": "e1", "source": "AMS1", "target": "ghost"}]}),
            json!({"nodes": [{"id": "AMS1", "kind": "core"}, {"id": "AMS1"}],
                   "edges": [{"id": "e1", "source": "AMS1", "target": "AMS1"}]}),
            json!({"nodes": [{"id": "x"}, {"id": "y"}],
                   "edges": [{"id": "e1", "source": "x", "target": "y"}]}),
            json!({"nodes": [{"id": "AMS1", "kind": "core"}, {"id": "b", "kind": "core"}],
                   "edges": [{"id": "e1", "source": "AMS1", "target": "b"}]}),
        ];

        for case in cases {
            let result = PublishPlan::build(&site(), &graph(case.clone()), json!(null), None);
            assert!(
                matches!(result, Err(CoreError::ValidationError(_))),
                "expected rejection for {case}"
            );
        }
    }

    #[test]
    fn test_core_is_renamed_to_site_code() {
        let site = site();
        let g = graph(json!({
            "nodes": [
                {"id": "XYZ", "label": "Amsterdam", "kind": "core", "color": "#ff0000"},
                {"id": "b", "label": "B"}
            ],
            "edges": [{"id": "e1", "source": "XYZ", "target": "b", "loads": ["4G"]}]
        }));

        let plan = PublishPlan::build(&site, &g, json!(null), None).unwrap();

        let payload = &plan.snapshot.payload;
        assert_eq!(payload.nodes[0].id.as_deref(), Some("AMS1"));
        assert_eq!(payload.edges[0].source.as_deref(), Some("AMS1"));
        assert_eq!(plan.site_update.color.as_deref(), Some("#ff0000"));

        let mut published = site.clone();
        plan.site_update.apply(&mut published);
        let (nodes, edges) = plan.projection.reconstruct(&published);
        let ids: HashSet<&str> = nodes.iter().map(|n| n.id.as_str()).collect();
        for edge in &edges {
            assert!(ids.contains(edge.source.as_str()), "dangling source {}", edge.source);
            assert!(ids.contains(edge.target.as_str()), "dangling target {}", edge.target);
        }
        assert_eq!((nodes, edges), codec::decode(payload));
    }

    #[test]
    fn test_site_code_held_by_another_node_is_rejected() {
        let g = graph(json!({
            "nodes": [{"id": "XYZ", "kind": "core"}, {"id": "AMS1", "label": "Impostor"}],
            "edges": [{"id": "e1", "source": "XYZ", "target": "AMS1"}]
        }));

        let result = PublishPlan::build(&site(), &g, json!(null), None);
        assert!(matches!(result, Err(CoreError::ValidationError(msg)) if msg.contains("AMS1")));
    }
}
