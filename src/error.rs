//! Error types for converge-netflow.

use crate::types::{EdgeId, NodeId};
use thiserror::Error;

/// Result type alias using [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the public API. SPF/KSP/CapacityCalculator treat
/// unreachability as a normal (empty/zero) outcome rather than an error;
/// see each module's documentation for exactly when these are raised.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// A referenced node id is not present in the graph.
    #[error("unknown node: {0}")]
    UnknownNode(NodeId),

    /// A referenced edge id is not present in the graph.
    #[error("unknown edge: {0}")]
    UnknownEdge(EdgeId),

    /// `add_node` was called with an id already present in the graph.
    #[error("duplicate node: {0}")]
    DuplicateNode(NodeId),

    /// `add_edge` was called with a caller-supplied key already present.
    #[error("duplicate edge key: {0}")]
    DuplicateEdgeKey(EdgeId),

    /// Keyed edge removal was called with an id whose (src, dst) doesn't
    /// match the edge actually stored under that id.
    #[error("edge {edge} does not connect {src} -> {dst}")]
    EdgeEndpointMismatch {
        /// The edge id that was looked up.
        edge: EdgeId,
        /// The source the caller expected.
        src: NodeId,
        /// The destination the caller expected.
        dst: NodeId,
    },

    /// An unrecognized `FlowPlacement` variant reached a component that
    /// switches on it exhaustively (reserved for forward compatibility;
    /// the enum is currently closed so this should not occur in practice).
    #[error("unsupported flow placement")]
    UnsupportedPlacement,

    /// A `FlowPolicy`/`EdgeSelect` configuration is internally inconsistent:
    /// `UserDefined` with no callable, `EqualBalanced` with no
    /// `max_flow_count`, or `static_paths` whose length disagrees with an
    /// explicitly set `max_flow_count`.
    #[error("invalid selector/policy configuration: {0}")]
    InvalidSelectorConfig(String),

    /// `Demand::place` was called on a `Demand` with no `FlowPolicy` set.
    #[error("no flow policy attached to demand")]
    NoPolicyAttached,

    /// `FlowPolicy::place_demand` exceeded its iteration guard. This
    /// indicates a misconfigured policy (e.g. a `reoptimize`/`create` cycle
    /// that never converges), not a timeout.
    #[error("flow policy exceeded iteration guard of {limit} placements")]
    PolicyLoop {
        /// The guard limit that was exceeded.
        limit: u32,
    },
}
