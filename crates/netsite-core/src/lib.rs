//!
//! Netsite Core - topology engine for network site diagrams
//!
//! This crate holds the graph model edited per site, its persisted JSON
//! form, edge geometry, outage analysis and the draft/publish lifecycle.
//! Storage is abstracted behind [`TopologyRepository`].

#![forbid(unsafe_code)]
#![warn(missing_docs)]

/// Domain layer - topology model, codec, geometry and analysis
pub mod domain;

/// Application services
pub mod application;

/// Error types
pub mod error;

pub use error::CoreError;

pub use application::topology_service::{Access, TopologyService};
pub use domain::alternates::{find_alternates, AlternateMap, AlternateRoute, OutageSimulation};
pub use domain::codec::{decode, decode_value, encode};
pub use domain::editor::TopologyGraph;
pub use domain::geometry::{EdgePath, Viewport};
pub use domain::load_tag::{normalize_load_tag, same_technology};
pub use domain::model::{Edge, EdgeShape, HandleRef, HandleSide, Node, NodeKind, Point};
pub use domain::projection::Projection;
pub use domain::publish::PublishPlan;
pub use domain::repository::TopologyRepository;
pub use domain::snapshot::{Site, SiteId, Snapshot, SnapshotKind, TopologyState};
pub use domain::wire::{Graph, WireEdge, WireNode};
