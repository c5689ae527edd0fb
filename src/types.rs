//! Common types shared across the flow engine.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Numeric edge/path cost. The core is generic only over `f64`; callers that
/// model integral costs (hop count, latency in whole microseconds, ...) can
/// simply use integral values stored in an `f64`.
pub type Cost = f64;

/// A cheap-to-clone, hashable node identifier.
///
/// The original Python core (`ngraph.lib.graph.MultiDiGraph`) lets callers use
/// any hashable value as a node id; in practice all call sites pass strings.
/// `Arc<str>` gives the same ergonomics (construct from `&str`, clone is a
/// refcount bump) without forcing every predecessor map and path bundle to
/// clone owned `String`s.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(Arc<str>);

impl NodeId {
    /// Borrow the node id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for NodeId {
    fn from(s: &str) -> Self {
        Self(Arc::from(s))
    }
}

impl From<String> for NodeId {
    fn from(s: String) -> Self {
        Self(Arc::from(s.as_str()))
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::borrow::Borrow<str> for NodeId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// A unique edge identifier, assigned monotonically by [`crate::graph::Graph`]
/// on insertion. Ids are never reused once an edge is removed, matching
/// `_next_edge_id`/`new_edge_key` in the original `graph.py`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EdgeId(pub u64);

impl std::fmt::Display for EdgeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// How flow is distributed among the parallel paths/edges of a placement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlowPlacement {
    /// Split proportionally to each edge's remaining capacity (Dinic-like).
    Proportional,
    /// Split equally among parallel paths/edges of equal cost.
    EqualBalanced,
}

/// An arbitrary caller-supplied attribute value, for the open-ended part of
/// the node/edge attribute bag (labels, colors, metadata the hardware/
/// components library out-of-scope layers attach). The strongly-typed core
/// fields (`cost`, `capacity`, `flow`, `flows`) are never stored here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttrValue {
    /// A floating point number.
    Float(f64),
    /// A signed integer.
    Int(i64),
    /// A boolean flag.
    Bool(bool),
    /// Free text.
    Text(String),
}

impl From<f64> for AttrValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<i64> for AttrValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<bool> for AttrValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<&str> for AttrValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

/// Capacity values below this threshold are treated as zero when building
/// residual graphs and level graphs. `2^-12`, per the spec's hard numeric
/// contract (not a tunable).
pub const MIN_CAP: f64 = 0.000_244_140_625; // 2^-12

/// Flow values below this threshold are truncated to zero after placement,
/// and placements below it are rejected outright. Equal to [`MIN_CAP`] by
/// contract.
pub const MIN_FLOW: f64 = MIN_CAP;

/// Absolute tolerance used when comparing edge costs for tie purposes in
/// [`crate::graph::edge_select::EdgeSelect`].
pub const COST_TOLERANCE: f64 = 1e-12;

/// Identifies a single flow within a [`crate::policy::FlowPolicy`]: the
/// demand endpoints it serves, a caller-defined traffic class, and a
/// sequence number distinguishing multiple flows of the same class between
/// the same endpoints. Mirrors `FlowIndex` in `ngraph.lib.flow`.
///
/// Lives here rather than in `policy` because the graph's node/edge `flows`
/// attribute maps are keyed by it directly (§4.1/§4.7), and `graph` must not
/// depend on `policy`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FlowIndex {
    /// Source node of the demand this flow serves.
    pub src: NodeId,
    /// Destination node of the demand this flow serves.
    pub dst: NodeId,
    /// Caller-defined traffic class.
    pub flow_class: i32,
    /// Sequence number among flows of the same class/endpoints.
    pub seq: u64,
}

impl std::fmt::Display for FlowIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}->{}[class={}, #{}]", self.src, self.dst, self.flow_class, self.seq)
    }
}
