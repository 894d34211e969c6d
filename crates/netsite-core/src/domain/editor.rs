//! Owned, versioned in-memory graph that editors mutate.
//!
//! Every successful mutation bumps [`TopologyGraph::version`]; callers
//! re-render (and re-run outage analysis) when the version moves and export
//! payloads through [`TopologyGraph::snapshot`].

use tracing::debug;
use uuid::Uuid;

use super::codec;
use super::geometry::{edge_path, Viewport};
use super::model::{Edge, EdgeShape, HandleRef, Node, NodeKind, Point};
use super::wire::Graph;
use crate::CoreError;

fn short_id(prefix: &str) -> String {
    let id = Uuid::new_v4().simple().to_string();
    format!("{}-{}", prefix, &id[..8])
}

/// Editable topology of one site
#[derive(Debug, Clone, PartialEq)]
pub struct TopologyGraph {
    nodes: Vec<Node>,
    edges: Vec<Edge>,
    version: u64,
}

impl TopologyGraph {
    /// A fresh diagram holding only the site's core node
    pub fn new(site_code: impl Into<String>, site_name: impl Into<String>) -> Self {
        Self {
            nodes: vec![Node::new(site_code, site_name, NodeKind::Core, 0.0, 0.0)],
            edges: Vec::new(),
            version: 0,
        }
    }

    /// Load a stored payload, skipping malformed entries
    pub fn from_graph(graph: &Graph) -> Self {
        let (nodes, edges) = codec::decode(graph);
        Self {
            nodes,
            edges,
            version: 0,
        }
    }

    /// Encode the current state as a draft payload
    pub fn snapshot(&self) -> Graph {
        codec::encode(&self.nodes, &self.edges)
    }

    /// Monotonic mutation counter
    pub fn version(&self) -> u64 {
        self.version
    }

    /// All nodes
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// All edges
    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// Look up a node
    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// Look up an edge
    pub fn edge(&self, id: &str) -> Option<&Edge> {
        self.edges.iter().find(|e| e.id == id)
    }

    /// The site's core node, if the diagram has one
    pub fn core(&self) -> Option<&Node> {
        self.nodes.iter().find(|n| n.is_core())
    }

    fn node_mut(&mut self, id: &str) -> Result<&mut Node, CoreError> {
        self.nodes
            .iter_mut()
            .find(|n| n.id == id)
            .ok_or_else(|| CoreError::ValidationError(format!("Unknown node: {}", id)))
    }

    fn edge_mut(&mut self, id: &str) -> Result<&mut Edge, CoreError> {
        self.edges
            .iter_mut()
            .find(|e| e.id == id)
            .ok_or_else(|| CoreError::ValidationError(format!("Unknown edge: {}", id)))
    }

    fn touch(&mut self) {
        self.version += 1;
    }

    /// Add a facility or label node and return its id
    pub fn add_node(&mut self, label: impl Into<String>, kind: NodeKind, x: f64, y: f64) -> Result<String, CoreError> {
        if kind == NodeKind::Core {
            return Err(CoreError::ValidationError(
                "A diagram has exactly one core node".to_string(),
            ));
        }
        let id = short_id("n");
        self.nodes.push(Node::new(id.clone(), label, kind, x, y));
        self.touch();
        Ok(id)
    }

    /// Move a node
    pub fn move_node(&mut self, id: &str, x: f64, y: f64) -> Result<(), CoreError> {
        let node = self.node_mut(id)?;
        node.x = x;
        node.y = y;
        self.touch();
        Ok(())
    }

    /// Resize a node; non-positive sizes are rejected
    pub fn resize_node(&mut self, id: &str, width: f64, height: f64) -> Result<(), CoreError> {
        if !(width > 0.0 && height > 0.0) {
            return Err(CoreError::ValidationError(format!(
                "Invalid size {}x{} for node {}",
                width, height, id
            )));
        }
        let node = self.node_mut(id)?;
        node.width = width;
        node.height = height;
        self.touch();
        Ok(())
    }

    /// Change a node's label. Renaming the core node renames the site on
    /// the next publish.
    pub fn rename_node(&mut self, id: &str, label: impl Into<String>) -> Result<(), CoreError> {
        let node = self.node_mut(id)?;
        node.label = label.into();
        if node.is_core() {
            debug!(site_code = %node.id, name = %node.label, "Core node renamed");
        }
        self.touch();
        Ok(())
    }

    /// Remove a node together with its edges. The core node stays.
    pub fn remove_node(&mut self, id: &str) -> Result<(), CoreError> {
        let idx = self
            .nodes
            .iter()
            .position(|n| n.id == id)
            .ok_or_else(|| CoreError::ValidationError(format!("Unknown node: {}", id)))?;
        if self.nodes[idx].is_core() {
            return Err(CoreError::ValidationError(
                "The core node cannot be removed".to_string(),
            ));
        }
        self.nodes.remove(idx);
        self.edges.retain(|e| e.source != id && e.target != id);
        self.touch();
        Ok(())
    }

    /// Connect two existing nodes and return the new edge id
    pub fn add_edge(&mut self, source: &str, target: &str) -> Result<String, CoreError> {
        for endpoint in [source, target] {
            if self.node(endpoint).is_none() {
                return Err(CoreError::ValidationError(format!(
                    "Edge endpoint {} does not exist",
                    endpoint
                )));
            }
        }
        let id = short_id("e");
        self.edges.push(Edge::new(id.clone(), source, target));
        self.touch();
        Ok(id)
    }

    /// Remove an edge
    pub fn remove_edge(&mut self, id: &str) -> Result<(), CoreError> {
        let before = self.edges.len();
        self.edges.retain(|e| e.id != id);
        if self.edges.len() == before {
            return Err(CoreError::ValidationError(format!("Unknown edge: {}", id)));
        }
        self.touch();
        Ok(())
    }

    /// Replace an edge's loads; blank tags are dropped
    pub fn set_loads<I, S>(&mut self, id: &str, loads: I) -> Result<(), CoreError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let loads = loads
            .into_iter()
            .map(Into::into)
            .map(|tag: String| tag.trim().to_string())
            .filter(|tag| !tag.is_empty())
            .collect();
        self.edge_mut(id)?.loads = loads;
        self.touch();
        Ok(())
    }

    /// Mark an edge structural. Setting it clears the loads; clearing it
    /// leaves them untouched (an edge without loads stays structural).
    pub fn set_structural(&mut self, id: &str, structural: bool) -> Result<(), CoreError> {
        let edge = self.edge_mut(id)?;
        if structural {
            edge.loads.clear();
        }
        self.touch();
        Ok(())
    }

    /// Change the rendered shape
    pub fn set_shape(&mut self, id: &str, shape: EdgeShape) -> Result<(), CoreError> {
        self.edge_mut(id)?.shape = shape;
        self.touch();
        Ok(())
    }

    /// Change the edge label text
    pub fn set_edge_label(&mut self, id: &str, label: impl Into<String>) -> Result<(), CoreError> {
        self.edge_mut(id)?.label = label.into();
        self.touch();
        Ok(())
    }

    /// Pin the edge to explicit handles; `None` lets the renderer choose
    pub fn set_handles(
        &mut self,
        id: &str,
        source_handle: Option<HandleRef>,
        target_handle: Option<HandleRef>,
    ) -> Result<(), CoreError> {
        let edge = self.edge_mut(id)?;
        edge.source_handle = source_handle.map(|h| HandleRef { slot: 1, ..h });
        edge.target_handle = target_handle.map(|h| HandleRef { slot: 1, ..h });
        self.touch();
        Ok(())
    }

    /// Move the label along the edge; clamped to `[0, 1]`
    pub fn set_label_t(&mut self, id: &str, t: f64) -> Result<(), CoreError> {
        self.edge_mut(id)?.set_label_t(t);
        self.touch();
        Ok(())
    }

    /// Displace the label from its path point
    pub fn set_label_offset(&mut self, id: &str, offset: Point) -> Result<(), CoreError> {
        self.edge_mut(id)?.label_offset = offset;
        self.touch();
        Ok(())
    }

    /// Where the edge's label is drawn, `None` when the edge or one of its
    /// endpoints is missing
    pub fn label_position(&self, edge_id: &str) -> Option<Point> {
        let edge = self.edge(edge_id)?;
        let path = edge_path(edge, self.node(&edge.source)?, self.node(&edge.target)?);
        Some(path.point_at(edge.label_t(), edge.label_offset))
    }

    /// Drag an edge label to a client-space point and store the resulting
    /// `labelT`. Returns the new parameter.
    pub fn drag_label(&mut self, edge_id: &str, client: Point, viewport: &Viewport) -> Option<f64> {
        let edge = self.edge(edge_id)?;
        let path = edge_path(edge, self.node(&edge.source)?, self.node(&edge.target)?);
        let hit = path.nearest_parameter(viewport.to_diagram(client));

        self.edge_mut(edge_id).ok()?.set_label_t(hit.t);
        self.touch();
        Some(hit.t)
    }
}
