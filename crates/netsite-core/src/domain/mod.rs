/// Nodes, edges, handles and points
pub mod model;

/// Persisted JSON shape of a topology graph
pub mod wire;

/// Load tag normalization
pub mod load_tag;

/// Conversion between the editor model and the persisted graph
pub mod codec;

/// Edge path construction and parameterization
pub mod geometry;

/// Outage simulation and alternate routes
pub mod alternates;

/// In-editor topology graph
pub mod editor;

/// Sites, stored snapshots and the publish lifecycle
pub mod snapshot;

/// Relational rows derived from a published graph
pub mod projection;

/// Publish validation and planning
pub mod publish;

/// Repository interfaces
pub mod repository;
