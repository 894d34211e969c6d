//! Mapping between the editable graph and the stored draft payload.
//!
//! Encoding renames every non-core node after its current label so the
//! stored ids stay readable, and rewrites edge endpoints through the same
//! mapping. Decoding is lenient: malformed entries are dropped one by one
//! instead of failing the whole payload.

use std::collections::{HashMap, HashSet};

use serde_json::Value;
use tracing::debug;

use super::model::{
    clamp_label_t, Edge, EdgeShape, HandleRef, Node, NodeKind, DEFAULT_LABEL_T,
    DEFAULT_NODE_HEIGHT, DEFAULT_NODE_WIDTH,
};
use super::wire::{Graph, WireEdge, WireNode};

const FALLBACK_SLUG: &str = "node";

/// Turn a label into an id fragment: whitespace becomes `_`, anything
/// outside `[A-Za-z0-9_-]` is dropped.
pub fn slugify(label: &str) -> String {
    let mut slug = String::with_capacity(label.len());
    let mut pending_sep = false;

    for c in label.trim().chars() {
        if c.is_whitespace() {
            pending_sep = !slug.is_empty();
        } else if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
            if pending_sep {
                slug.push('_');
                pending_sep = false;
            }
            slug.push(c);
        }
    }

    if slug.is_empty() {
        FALLBACK_SLUG.to_string()
    } else {
        slug
    }
}

/// Resolve the persisted id of every node, keyed by current id.
///
/// Core nodes keep their id. Every other node gets the slug of its label,
/// suffixed `_2`, `_3`, ... when the slug is already taken within this
/// call. When two nodes share a current id the first one wins.
pub fn resolve_node_ids(nodes: &[Node]) -> HashMap<String, String> {
    let mut taken: HashSet<String> = nodes
        .iter()
        .filter(|n| n.is_core())
        .map(|n| n.id.clone())
        .collect();
    let mut mapping = HashMap::with_capacity(nodes.len());

    for node in nodes {
        if mapping.contains_key(&node.id) {
            continue;
        }

        let persisted = if node.is_core() {
            node.id.clone()
        } else {
            let base = slugify(&node.label);
            let mut candidate = base.clone();
            let mut suffix = 2;
            while taken.contains(&candidate) {
                candidate = format!("{}_{}", base, suffix);
                suffix += 1;
            }
            taken.insert(candidate.clone());
            candidate
        };

        mapping.insert(node.id.clone(), persisted);
    }

    mapping
}

/// Normalize a stored handle id: only `{s|t}-{side}-{digits}` survives,
/// with its slot rewritten to `1`.
pub fn normalize_handle(raw: Option<&str>) -> Option<String> {
    raw.and_then(HandleRef::normalize).map(|h| h.to_string())
}

/// Encode the editable graph into a draft payload
pub fn encode(nodes: &[Node], edges: &[Edge]) -> Graph {
    let mapping = resolve_node_ids(nodes);
    let remap = |id: &str| mapping.get(id).cloned().unwrap_or_else(|| id.to_string());

    let mut seen = HashSet::with_capacity(nodes.len());
    let wire_nodes = nodes
        .iter()
        .filter(|node| seen.insert(node.id.as_str()))
        .map(|node| WireNode {
            id: Some(remap(&node.id)),
            label: Some(node.label.clone()),
            x: Some(node.x),
            y: Some(node.y),
            width: Some(node.width),
            height: Some(node.height),
            color: node.color.clone(),
            kind: Some(node.kind.as_str().to_string()),
        })
        .collect();

    let wire_edges = edges
        .iter()
        .map(|edge| WireEdge {
            id: Some(edge.id.clone()),
            source: Some(remap(&edge.source)),
            target: Some(remap(&edge.target)),
            source_handle: edge.source_handle.map(|h| HandleRef { slot: 1, ..h }.to_string()),
            target_handle: edge.target_handle.map(|h| HandleRef { slot: 1, ..h }.to_string()),
            label: Some(edge.label.clone()),
            color: edge.color.clone(),
            structural: Some(edge.is_structural()),
            loads: Some(edge.loads.clone()),
            edge_type: Some(edge.shape.as_str().to_string()),
            animated: Some(edge.animated),
            label_t: Some(clamp_label_t(edge.label_t())),
            label_offset: Some(edge.label_offset),
        })
        .collect();

    Graph {
        nodes: wire_nodes,
        edges: wire_edges,
    }
}

fn non_empty(value: Option<&String>) -> Option<String> {
    value
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn finite_or(value: Option<f64>, default: f64) -> f64 {
    value.filter(|v| v.is_finite()).unwrap_or(default)
}

fn decode_node(entry: &WireNode) -> Option<Node> {
    let id = non_empty(entry.id.as_ref())?;
    let kind = entry
        .kind
        .as_deref()
        .and_then(NodeKind::parse)
        .unwrap_or_default();

    Some(Node {
        label: entry.label.clone().unwrap_or_else(|| id.clone()),
        kind,
        x: finite_or(entry.x, 0.0),
        y: finite_or(entry.y, 0.0),
        width: finite_or(entry.width, DEFAULT_NODE_WIDTH),
        height: finite_or(entry.height, DEFAULT_NODE_HEIGHT),
        color: entry.color.clone(),
        id,
    })
}

fn decode_edge(entry: &WireEdge) -> Option<Edge> {
    let id = non_empty(entry.id.as_ref())?;
    let source = non_empty(entry.source.as_ref())?;
    let target = non_empty(entry.target.as_ref())?;

    let mut edge = Edge::new(id, source, target);
    edge.source_handle = entry.source_handle.as_deref().and_then(HandleRef::normalize);
    edge.target_handle = entry.target_handle.as_deref().and_then(HandleRef::normalize);
    edge.label = entry.label.clone().unwrap_or_default();
    edge.color = entry.color.clone();
    edge.shape = entry
        .edge_type
        .as_deref()
        .map(EdgeShape::from_wire)
        .unwrap_or_default();
    edge.animated = entry.animated.unwrap_or(false);
    edge.set_label_t(entry.label_t.unwrap_or(DEFAULT_LABEL_T));
    edge.label_offset = entry.label_offset.unwrap_or_default();

    // An edge flagged structural carries no loads, whatever stale tags the
    // blob still holds.
    if entry.structural != Some(true) {
        edge.loads = entry
            .loads
            .iter()
            .flatten()
            .map(|tag| tag.trim())
            .filter(|tag| !tag.is_empty())
            .map(str::to_string)
            .collect();
    }

    Some(edge)
}

/// Decode a stored payload into the editable graph.
///
/// Nodes without an id, edges without id/source/target, duplicate ids and
/// edges whose endpoints are not among the decoded nodes are skipped.
pub fn decode(graph: &Graph) -> (Vec<Node>, Vec<Edge>) {
    let mut nodes = Vec::with_capacity(graph.nodes.len());
    let mut node_ids = HashSet::with_capacity(graph.nodes.len());

    for entry in &graph.nodes {
        match decode_node(entry) {
            Some(node) if node_ids.insert(node.id.clone()) => nodes.push(node),
            Some(node) => debug!(node_id = %node.id, "Skipping duplicate node"),
            None => debug!("Skipping node without id"),
        }
    }

    let mut edges = Vec::with_capacity(graph.edges.len());
    let mut edge_ids = HashSet::with_capacity(graph.edges.len());

    for entry in &graph.edges {
        let Some(edge) = decode_edge(entry) else {
            debug!(edge_id = ?entry.id, "Skipping malformed edge");
            continue;
        };
        if !node_ids.contains(&edge.source) || !node_ids.contains(&edge.target) {
            debug!(edge_id = %edge.id, source = %edge.source, target = %edge.target, "Skipping dangling edge");
            continue;
        }
        if !edge_ids.insert(edge.id.clone()) {
            debug!(edge_id = %edge.id, "Skipping duplicate edge");
            continue;
        }
        edges.push(edge);
    }

    (nodes, edges)
}

/// Decode a raw stored blob. Non-object blobs decode to an empty graph and
/// entries that do not deserialize are skipped.
pub fn decode_value(value: &Value) -> (Vec<Node>, Vec<Edge>) {
    decode(&Graph::from_value(value))
}
