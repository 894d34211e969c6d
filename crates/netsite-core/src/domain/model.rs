//! Editable topology model: facilities (nodes) and circuits (edges).

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

lazy_static! {
    // `{s|t}-{side}-{slot}`, the only handle ids the editor emits
    static ref HANDLE_ID_REGEX: Regex =
        Regex::new(r"^([st])-(top|bottom|left|right)-(\d+)$").unwrap();
}

/// Default node width when a stored node carries none
pub const DEFAULT_NODE_WIDTH: f64 = 120.0;

/// Default node height when a stored node carries none
pub const DEFAULT_NODE_HEIGHT: f64 = 48.0;

/// Default label position along an edge
pub const DEFAULT_LABEL_T: f64 = 0.5;

/// A 2D point in diagram coordinates
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    /// Horizontal coordinate
    pub x: f64,
    /// Vertical coordinate
    pub y: f64,
}

impl Point {
    /// Create a new point
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Squared euclidean distance to another point
    pub fn distance_sq(&self, other: &Point) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx * dx + dy * dy
    }

    /// Euclidean distance to another point
    pub fn distance(&self, other: &Point) -> f64 {
        self.distance_sq(other).sqrt()
    }

    /// Linear interpolation towards `other`
    pub fn lerp(&self, other: &Point, t: f64) -> Point {
        Point::new(self.x + (other.x - self.x) * t, self.y + (other.y - self.y) * t)
    }
}

impl std::ops::Add for Point {
    type Output = Point;

    fn add(self, rhs: Point) -> Point {
        Point::new(self.x + rhs.x, self.y + rhs.y)
    }
}

/// Role of a node in the site diagram
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    /// The site itself. Exactly one per diagram; its id is the site code.
    Core,
    /// A facility connected to the site
    #[default]
    Node,
    /// A free-floating text label
    Label,
}

impl NodeKind {
    /// Parse the wire representation, `None` for unknown kinds
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "core" => Some(NodeKind::Core),
            "node" => Some(NodeKind::Node),
            "label" => Some(NodeKind::Label),
            _ => None,
        }
    }

    /// Wire representation
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::Core => "core",
            NodeKind::Node => "node",
            NodeKind::Label => "label",
        }
    }
}

/// Rendered shape of an edge path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EdgeShape {
    /// Direct line between the handles
    Straight,
    /// Orthogonal routing with sharp corners
    Step,
    /// Cubic bezier curve
    Bezier,
    /// Orthogonal routing with rounded corners
    #[default]
    SmoothStep,
}

impl EdgeShape {
    /// Parse the renderer's edge `type`. The renderer calls its bezier
    /// edge `default`; anything unknown renders as smoothstep.
    pub fn from_wire(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "straight" => EdgeShape::Straight,
            "step" => EdgeShape::Step,
            "bezier" | "default" | "simplebezier" => EdgeShape::Bezier,
            _ => EdgeShape::SmoothStep,
        }
    }

    /// Wire representation
    pub fn as_str(&self) -> &'static str {
        match self {
            EdgeShape::Straight => "straight",
            EdgeShape::Step => "step",
            EdgeShape::Bezier => "bezier",
            EdgeShape::SmoothStep => "smoothstep",
        }
    }
}

/// Side of a node's perimeter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HandleSide {
    /// Top edge
    Top,
    /// Bottom edge
    Bottom,
    /// Left edge
    Left,
    /// Right edge
    Right,
}

impl HandleSide {
    fn parse(value: &str) -> Option<Self> {
        match value {
            "top" => Some(HandleSide::Top),
            "bottom" => Some(HandleSide::Bottom),
            "left" => Some(HandleSide::Left),
            "right" => Some(HandleSide::Right),
            _ => None,
        }
    }

    /// Wire representation
    pub fn as_str(&self) -> &'static str {
        match self {
            HandleSide::Top => "top",
            HandleSide::Bottom => "bottom",
            HandleSide::Left => "left",
            HandleSide::Right => "right",
        }
    }

    /// Whether edges leave this side horizontally
    pub fn is_horizontal(&self) -> bool {
        matches!(self, HandleSide::Left | HandleSide::Right)
    }

    /// Unit vector pointing out of the node on this side
    pub fn direction(&self) -> Point {
        match self {
            HandleSide::Top => Point::new(0.0, -1.0),
            HandleSide::Bottom => Point::new(0.0, 1.0),
            HandleSide::Left => Point::new(-1.0, 0.0),
            HandleSide::Right => Point::new(1.0, 0.0),
        }
    }
}

/// Whether a handle starts or terminates an edge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HandleRole {
    /// `s-` prefixed handle
    Source,
    /// `t-` prefixed handle
    Target,
}

/// A named attachment point on a node's perimeter, e.g. `s-right-1`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandleRef {
    /// Source or target handle
    pub role: HandleRole,
    /// Perimeter side
    pub side: HandleSide,
    /// Slot index along the side
    pub slot: u32,
}

impl HandleRef {
    /// Parse a handle id. Only `{s|t}-{top|bottom|left|right}-{digits}` is
    /// accepted.
    pub fn parse(value: &str) -> Option<Self> {
        let caps = HANDLE_ID_REGEX.captures(value.trim())?;
        let role = if &caps[1] == "s" {
            HandleRole::Source
        } else {
            HandleRole::Target
        };
        let side = HandleSide::parse(&caps[2])?;
        let slot = caps[3].parse().ok()?;
        Some(Self { role, side, slot })
    }

    /// Parse a handle id and collapse its slot to `1`, the single handle
    /// each side renders.
    pub fn normalize(value: &str) -> Option<Self> {
        Self::parse(value).map(|handle| Self { slot: 1, ..handle })
    }
}

impl fmt::Display for HandleRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let role = match self.role {
            HandleRole::Source => "s",
            HandleRole::Target => "t",
        };
        write!(f, "{}-{}-{}", role, self.side.as_str(), self.slot)
    }
}

/// A facility (or label) on the diagram
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    /// Node id; the site code for the core node
    pub id: String,
    /// Display label
    pub label: String,
    /// Node role
    pub kind: NodeKind,
    /// Left coordinate
    pub x: f64,
    /// Top coordinate
    pub y: f64,
    /// Rendered width
    pub width: f64,
    /// Rendered height
    pub height: f64,
    /// Optional fill color
    pub color: Option<String>,
}

impl Node {
    /// Create a node of `kind` at the given position with default size
    pub fn new(id: impl Into<String>, label: impl Into<String>, kind: NodeKind, x: f64, y: f64) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            kind,
            x,
            y,
            width: DEFAULT_NODE_WIDTH,
            height: DEFAULT_NODE_HEIGHT,
            color: None,
        }
    }

    /// Center of the node's bounding box
    pub fn center(&self) -> Point {
        Point::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    /// Whether this is the site's core node
    pub fn is_core(&self) -> bool {
        self.kind == NodeKind::Core
    }
}

/// A circuit between two nodes
#[derive(Debug, Clone, PartialEq)]
pub struct Edge {
    /// Edge id
    pub id: String,
    /// Source node id
    pub source: String,
    /// Target node id
    pub target: String,
    /// Explicit source handle, `None` lets the renderer pick
    pub source_handle: Option<HandleRef>,
    /// Explicit target handle, `None` lets the renderer pick
    pub target_handle: Option<HandleRef>,
    /// Display label
    pub label: String,
    /// Load tags carried by this circuit, in display order
    pub loads: Vec<String>,
    /// Rendered shape
    pub shape: EdgeShape,
    /// Whether the edge renders animated
    pub animated: bool,
    /// Label position along the path, always within `[0, 1]`
    label_t: f64,
    /// Label displacement from the path point
    pub label_offset: Point,
    /// Optional stroke color
    pub color: Option<String>,
}

impl Edge {
    /// Create an edge with default styling
    pub fn new(id: impl Into<String>, source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            source: source.into(),
            target: target.into(),
            source_handle: None,
            target_handle: None,
            label: String::new(),
            loads: Vec::new(),
            shape: EdgeShape::default(),
            animated: false,
            label_t: DEFAULT_LABEL_T,
            label_offset: Point::default(),
            color: None,
        }
    }

    /// Builder-style load assignment
    pub fn with_loads<I, S>(mut self, loads: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.loads = loads.into_iter().map(Into::into).collect();
        self
    }

    /// Builder-style shape assignment
    pub fn with_shape(mut self, shape: EdgeShape) -> Self {
        self.shape = shape;
        self
    }

    /// A structural edge carries no loads. It is rendered for context
    /// only and can never be marked offline.
    pub fn is_structural(&self) -> bool {
        self.loads.is_empty()
    }

    /// Label position along the path
    pub fn label_t(&self) -> f64 {
        self.label_t
    }

    /// Set the label position; clamped to `[0, 1]`, NaN resets to the
    /// default.
    pub fn set_label_t(&mut self, t: f64) {
        self.label_t = clamp_label_t(t);
    }

    /// Whether the two edges share at least one endpoint
    pub fn shares_endpoint(&self, other: &Edge) -> bool {
        self.source == other.source
            || self.source == other.target
            || self.target == other.source
            || self.target == other.target
    }
}

/// Clamp a label parameter into `[0, 1]`
pub fn clamp_label_t(t: f64) -> f64 {
    if t.is_nan() {
        DEFAULT_LABEL_T
    } else {
        t.clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handle_parse_and_display() {
        let handle = HandleRef::parse("s-right-3").unwrap();
        assert_eq!(handle.role, HandleRole::Source);
        assert_eq!(handle.side, HandleSide::Right);
        assert_eq!(handle.slot, 3);
        assert_eq!(handle.to_string(), "s-right-3");
    }

    #[test]
    fn test_handle_normalize_rewrites_slot() {
        assert_eq!(HandleRef::normalize("t-top-7").unwrap().to_string(), "t-top-1");
    }

    #[test]
    fn test_handle_rejects_other_shapes() {
        for raw in ["", "right", "x-top-1", "s-middle-1", "s-top-", "s-top-1a", "s_top_1"] {
            assert!(HandleRef::normalize(raw).is_none(), "{raw} should be rejected");
        }
    }

    #[test]
    fn test_label_t_is_clamped() {
        let mut edge = Edge::new("e1", "A", "B");
        edge.set_label_t(1.7);
        assert_eq!(edge.label_t(), 1.0);
        edge.set_label_t(-0.2);
        assert_eq!(edge.label_t(), 0.0);
        edge.set_label_t(f64::NAN);
        assert_eq!(edge.label_t(), DEFAULT_LABEL_T);
    }

    #[test]
    fn test_structural_follows_loads() {
        let edge = Edge::new("e1", "A", "B");
        assert!(edge.is_structural());
        assert!(!edge.with_loads(["DWDM"]).is_structural());
    }

    #[test]
    fn test_shape_from_wire() {
        assert_eq!(EdgeShape::from_wire("default"), EdgeShape::Bezier);
        assert_eq!(EdgeShape::from_wire("Step"), EdgeShape::Step);
        assert_eq!(EdgeShape::from_wire("custom"), EdgeShape::SmoothStep);
    }
}
