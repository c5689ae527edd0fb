//! Graph storage: a strict directed multigraph with stable opaque edge ids.
//!
//! This is the leaf dependency of the flow engine (spec §4.1): nodes and
//! edges carry attribute bags, edge ids are assigned monotonically and never
//! reused, and parallel edges between the same ordered pair of nodes are
//! permitted and distinguished solely by id.
//!
//! ## Module layout
//!
//! - [`edge_select`] — the `EdgeSelect` strategy family (§4.2).
//! - [`spf`] — Dijkstra with ECMP recording, and Yen's k-shortest-paths
//!   (§4.3, §4.4).
//! - [`path`] / [`path_bundle`] — concrete path enumeration and the
//!   loop-free sub-DAG unit of flow attachment (§4.5).
//! - [`capacity`] — the max-flow-through-a-DAG calculator, both flow
//!   placement disciplines (§4.6).
//! - [`place`] — committing a capacity calculation to the graph (§4.7).
//! - [`max_flow`] — iterated augmentation and flow analytics (§4.8, §4.10).

pub mod capacity;
pub mod edge_select;
pub mod max_flow;
pub mod path;
pub mod path_bundle;
pub mod place;
pub mod spf;

pub use capacity::{calc_graph_capacity, FlowDict};
pub use edge_select::EdgeSelect;
pub use max_flow::{
    calc_max_flow, run_sensitivity, saturated_edges, FlowSummary, MaxFlowOptions, MaxFlowResult,
};
pub use path::{resolve_paths, Path};
pub use path_bundle::PathBundle;
pub use place::{place_flow_on_graph, remove_flow_from_graph, PlacementMeta};
pub use spf::{ksp, spf, Ksp};

use crate::error::{Error, Result};
use crate::types::{AttrValue, Cost, EdgeId, FlowIndex, NodeId};
use indexmap::IndexMap;
use smallvec::SmallVec;

/// The short-vector type used for a bundle of parallel edges between a
/// single ordered pair of nodes. Almost always holds 1-3 entries.
pub type EdgeIdVec = SmallVec<[EdgeId; 4]>;

/// A predecessor map as produced by [`spf::spf`]/[`spf::ksp`]: for each node
/// reachable on the DAG, the set of (predecessor, parallel-edge-bundle)
/// pairs feeding into it. `pred[src]` is always empty.
pub type PredMap = IndexMap<NodeId, IndexMap<NodeId, EdgeIdVec>>;

/// Edge attributes: the strongly-typed core fields plus an open-ended extra
/// bag for caller-supplied metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct EdgeAttrs {
    /// Non-negative routing cost.
    pub cost: Cost,
    /// Non-negative capacity.
    pub capacity: f64,
    /// Aggregate flow currently placed on this edge.
    pub flow: f64,
    /// Per-flow-id contribution to `flow`.
    pub flows: IndexMap<FlowIndex, f64>,
    /// Arbitrary caller-supplied attributes (labels, colors, ...).
    pub extra: IndexMap<String, AttrValue>,
}

impl EdgeAttrs {
    /// Construct edge attributes with the given cost/capacity and no flow
    /// placed yet.
    pub fn new(cost: Cost, capacity: f64) -> Self {
        Self {
            cost,
            capacity,
            flow: 0.0,
            flows: IndexMap::new(),
            extra: IndexMap::new(),
        }
    }

    /// Attach an extra attribute, builder-style.
    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<AttrValue>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    /// Remaining (unused) capacity, floored at zero.
    pub fn residual(&self) -> f64 {
        (self.capacity - self.flow).max(0.0)
    }
}

/// Node attributes: flow bookkeeping plus an open-ended extra bag.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NodeAttrs {
    /// Aggregate flow currently transiting this node.
    pub flow: f64,
    /// Per-flow-id contribution to `flow`.
    pub flows: IndexMap<FlowIndex, f64>,
    /// Arbitrary caller-supplied attributes.
    pub extra: IndexMap<String, AttrValue>,
}

#[derive(Debug, Clone)]
struct EdgeRecord {
    src: NodeId,
    dst: NodeId,
    attrs: EdgeAttrs,
}

/// A strict directed multigraph with stable, never-reused edge identifiers.
#[derive(Debug, Clone, Default)]
pub struct Graph {
    nodes: IndexMap<NodeId, NodeAttrs>,
    edges: IndexMap<EdgeId, EdgeRecord>,
    /// `adjacency[u][v]` is the bundle of parallel edge ids from `u` to `v`.
    adjacency: IndexMap<NodeId, IndexMap<NodeId, EdgeIdVec>>,
    next_edge_id: u64,
}

impl Graph {
    /// Create an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node with the given id and extra attributes.
    ///
    /// # Errors
    /// Returns [`Error::DuplicateNode`] if `id` is already present.
    pub fn add_node(&mut self, id: impl Into<NodeId>) -> Result<NodeId> {
        self.add_node_with_attrs(id, IndexMap::new())
    }

    /// Add a node with the given id and a pre-built extra attribute map.
    ///
    /// # Errors
    /// Returns [`Error::DuplicateNode`] if `id` is already present.
    pub fn add_node_with_attrs(
        &mut self,
        id: impl Into<NodeId>,
        extra: IndexMap<String, AttrValue>,
    ) -> Result<NodeId> {
        let id = id.into();
        if self.nodes.contains_key(&id) {
            return Err(Error::DuplicateNode(id));
        }
        self.nodes.insert(
            id.clone(),
            NodeAttrs {
                extra,
                ..Default::default()
            },
        );
        self.adjacency.insert(id.clone(), IndexMap::new());
        Ok(id)
    }

    /// Add an edge from `src` to `dst`. If `key` is `None`, a fresh id is
    /// assigned from the graph's monotonic counter; otherwise `key` is used
    /// verbatim.
    ///
    /// # Errors
    /// Returns [`Error::UnknownNode`] if either endpoint is missing, or
    /// [`Error::DuplicateEdgeKey`] if `key` is supplied and already in use.
    pub fn add_edge(
        &mut self,
        src: impl Into<NodeId>,
        dst: impl Into<NodeId>,
        attrs: EdgeAttrs,
        key: Option<EdgeId>,
    ) -> Result<EdgeId> {
        let src = src.into();
        let dst = dst.into();
        if !self.nodes.contains_key(&src) {
            return Err(Error::UnknownNode(src));
        }
        if !self.nodes.contains_key(&dst) {
            return Err(Error::UnknownNode(dst));
        }

        let edge_id = match key {
            Some(id) => {
                if self.edges.contains_key(&id) {
                    return Err(Error::DuplicateEdgeKey(id));
                }
                id
            }
            None => {
                let id = EdgeId(self.next_edge_id);
                self.next_edge_id += 1;
                id
            }
        };

        self.edges.insert(
            edge_id,
            EdgeRecord {
                src: src.clone(),
                dst: dst.clone(),
                attrs,
            },
        );
        self.adjacency
            .entry(src)
            .or_default()
            .entry(dst)
            .or_default()
            .push(edge_id);

        tracing::debug!(edge = %edge_id, "added edge");
        Ok(edge_id)
    }

    /// Remove a node and every edge incident to it (in either direction).
    ///
    /// # Errors
    /// Returns [`Error::UnknownNode`] if `id` is not present.
    pub fn remove_node(&mut self, id: &NodeId) -> Result<()> {
        if !self.nodes.contains_key(id) {
            return Err(Error::UnknownNode(id.clone()));
        }

        let touching: Vec<EdgeId> = self
            .edges
            .iter()
            .filter(|(_, rec)| &rec.src == id || &rec.dst == id)
            .map(|(eid, _)| *eid)
            .collect();
        for eid in touching {
            self.remove_edge_by_id(eid)?;
        }

        self.nodes.shift_remove(id);
        self.adjacency.shift_remove(id);
        Ok(())
    }

    /// Remove edge(s) between `src` and `dst`. With `key`, removes exactly
    /// that edge. Without `key`, removes every edge between the pair; it is
    /// not an error for there to be none.
    ///
    /// # Errors
    /// Returns [`Error::UnknownEdge`] if `key` is supplied but not present
    /// at all, or [`Error::EdgeEndpointMismatch`] if it is present but does
    /// not connect `src` to `dst`.
    pub fn remove_edge(
        &mut self,
        src: &NodeId,
        dst: &NodeId,
        key: Option<EdgeId>,
    ) -> Result<()> {
        match key {
            Some(id) => {
                let rec = self.edges.get(&id).ok_or(Error::UnknownEdge(id))?;
                if &rec.src != src || &rec.dst != dst {
                    return Err(Error::EdgeEndpointMismatch {
                        edge: id,
                        src: src.clone(),
                        dst: dst.clone(),
                    });
                }
                self.remove_edge_by_id(id)
            }
            None => {
                let ids: EdgeIdVec = self
                    .adjacency
                    .get(src)
                    .and_then(|m| m.get(dst))
                    .cloned()
                    .unwrap_or_default();
                for id in ids {
                    self.remove_edge_by_id(id)?;
                }
                Ok(())
            }
        }
    }

    /// Remove an edge directly by id.
    ///
    /// # Errors
    /// Returns [`Error::UnknownEdge`] if `id` is not present.
    pub fn remove_edge_by_id(&mut self, id: EdgeId) -> Result<()> {
        let rec = self.edges.shift_remove(&id).ok_or(Error::UnknownEdge(id))?;
        if let Some(bundle) = self
            .adjacency
            .get_mut(&rec.src)
            .and_then(|m| m.get_mut(&rec.dst))
        {
            bundle.retain(|e| *e != id);
        }
        Ok(())
    }

    /// Whether `id` names a node in this graph.
    pub fn contains_node(&self, id: &NodeId) -> bool {
        self.nodes.contains_key(id)
    }

    /// Iterate over all node ids, in insertion order.
    pub fn nodes(&self) -> impl Iterator<Item = &NodeId> {
        self.nodes.keys()
    }

    /// Number of nodes.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Number of edges.
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Read-only access to a node's attributes.
    pub fn node_attrs(&self, id: &NodeId) -> Result<&NodeAttrs> {
        self.nodes.get(id).ok_or_else(|| Error::UnknownNode(id.clone()))
    }

    /// Mutable access to a node's attributes.
    pub fn node_attrs_mut(&mut self, id: &NodeId) -> Result<&mut NodeAttrs> {
        self.nodes
            .get_mut(id)
            .ok_or_else(|| Error::UnknownNode(id.clone()))
    }

    /// Read-only access to an edge's attributes.
    pub fn edge_attrs(&self, id: EdgeId) -> Result<&EdgeAttrs> {
        self.edges.get(&id).map(|r| &r.attrs).ok_or(Error::UnknownEdge(id))
    }

    /// Mutable access to an edge's attributes.
    pub fn edge_attrs_mut(&mut self, id: EdgeId) -> Result<&mut EdgeAttrs> {
        self.edges
            .get_mut(&id)
            .map(|r| &mut r.attrs)
            .ok_or(Error::UnknownEdge(id))
    }

    /// The (src, dst) endpoints of an edge.
    pub fn edge_endpoints(&self, id: EdgeId) -> Result<(&NodeId, &NodeId)> {
        self.edges
            .get(&id)
            .map(|r| (&r.src, &r.dst))
            .ok_or(Error::UnknownEdge(id))
    }

    /// Iterate over every edge as `(id, src, dst, attrs)`, in insertion
    /// order. Mirrors `graph.py`'s `get_edges()`.
    pub fn get_edges(&self) -> impl Iterator<Item = (EdgeId, &NodeId, &NodeId, &EdgeAttrs)> {
        self.edges
            .iter()
            .map(|(id, rec)| (*id, &rec.src, &rec.dst, &rec.attrs))
    }

    /// The outgoing neighbor bundles of `node`: for each neighbor reachable
    /// by at least one edge, the parallel-edge id bundle to it. `None` if
    /// `node` is not in the graph.
    pub fn edges_out(&self, node: &NodeId) -> Option<&IndexMap<NodeId, EdgeIdVec>> {
        self.adjacency.get(node)
    }

    /// Deep copy of the graph. Cloning `Graph` is already deep (no shared
    /// mutable state between copies), so this is a thin, spec-compatible
    /// alias for `.clone()`.
    pub fn copy(&self) -> Self {
        self.clone()
    }

    /// Ensure every node and edge carries `flow = 0` and an empty `flows`
    /// map. If `reset` is true, existing flow state is overwritten;
    /// otherwise it is left alone. Grounded on `ngraph.lib.algorithms
    /// .flow_init.init_flow_graph`, called by [`max_flow::calc_max_flow`]
    /// before every run.
    pub fn init_flow_state(&mut self, reset: bool) {
        for rec in self.edges.values_mut() {
            if reset {
                rec.attrs.flow = 0.0;
                rec.attrs.flows.clear();
            }
        }
        for attrs in self.nodes.values_mut() {
            if reset {
                attrs.flow = 0.0;
                attrs.flows.clear();
            }
        }
    }
}
