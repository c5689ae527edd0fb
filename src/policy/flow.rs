//! `Flow`: a placement of volume along a single [`PathBundle`] (§4.9 data
//! model).
//!
//! Grounded on `ngraph.lib.flow.Flow`.

use crate::error::Result;
use crate::graph::{place_flow_on_graph, remove_flow_from_graph, Graph, PathBundle};
use crate::types::{EdgeId, FlowIndex, FlowPlacement, NodeId, MIN_FLOW};
use std::collections::HashSet;

/// A fraction of a demand routed along one [`PathBundle`]. Models an MPLS
/// LSP, an ECMP-balanced IP forwarding split, or any other traffic unit
/// that follows a fixed set of paths until re-optimized.
#[derive(Debug, Clone)]
pub struct Flow {
    path_bundle: PathBundle,
    flow_index: FlowIndex,
    excluded_edges: HashSet<EdgeId>,
    excluded_nodes: HashSet<NodeId>,
    placed_flow: f64,
}

impl Flow {
    /// Construct a new, unplaced flow pinned to `path_bundle`.
    pub fn new(
        path_bundle: PathBundle,
        flow_index: FlowIndex,
        excluded_edges: HashSet<EdgeId>,
        excluded_nodes: HashSet<NodeId>,
    ) -> Self {
        Self {
            path_bundle,
            flow_index,
            excluded_edges,
            excluded_nodes,
            placed_flow: 0.0,
        }
    }

    /// The path bundle this flow is pinned to.
    pub fn path_bundle(&self) -> &PathBundle {
        &self.path_bundle
    }

    /// This flow's unique index (also its key in the graph's per-edge and
    /// per-node `flows` attribute maps).
    pub fn flow_index(&self) -> &FlowIndex {
        &self.flow_index
    }

    /// Edges excluded from path-finding when this flow is re-optimized.
    /// Preserved across re-optimization per spec §3.
    pub fn excluded_edges(&self) -> &HashSet<EdgeId> {
        &self.excluded_edges
    }

    /// Nodes excluded from path-finding when this flow is re-optimized.
    pub fn excluded_nodes(&self) -> &HashSet<NodeId> {
        &self.excluded_nodes
    }

    /// Cumulative volume placed on the graph by this flow so far.
    pub fn placed_flow(&self) -> f64 {
        self.placed_flow
    }

    /// Attempt to place `to_place` additional units of flow on `graph`
    /// along this flow's path bundle.
    ///
    /// Returns `(placed, remaining)`: `placed` is the amount actually
    /// committed, `remaining` is the portion of `to_place` that could not
    /// be. Requests below [`MIN_FLOW`] are rejected outright without
    /// touching the graph.
    ///
    /// # Errors
    /// Propagates errors from the underlying capacity calculation.
    pub fn place_flow(
        &mut self,
        graph: &mut Graph,
        to_place: f64,
        flow_placement: FlowPlacement,
    ) -> Result<(f64, f64)> {
        if to_place < MIN_FLOW {
            return Ok((0.0, to_place));
        }

        let meta = place_flow_on_graph(
            graph,
            self.path_bundle.src_node(),
            self.path_bundle.dst_node(),
            self.path_bundle.pred(),
            to_place,
            Some(self.flow_index.clone()),
            flow_placement,
        )?;
        self.placed_flow += meta.placed_flow;
        Ok((meta.placed_flow, meta.remaining_flow))
    }

    /// Remove this flow's contribution from `graph` and reset
    /// [`placed_flow`](Self::placed_flow) to zero.
    pub fn remove_flow(&mut self, graph: &mut Graph) {
        remove_flow_from_graph(graph, Some(&self.flow_index));
        self.placed_flow = 0.0;
    }
}
