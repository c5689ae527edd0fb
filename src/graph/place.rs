//! Committing a capacity calculation to the graph (§4.7).
//!
//! Grounded on `ngraph.lib.algorithms.place_flow.place_flow_on_graph` /
//! `remove_flow_from_graph`.

use super::capacity::calc_graph_capacity;
use super::{Graph, PredMap};
use crate::error::Result;
use crate::types::{FlowIndex, FlowPlacement, NodeId};
use crate::types::EdgeId;
use std::collections::HashSet;

/// What happened when flow was placed: how much landed, how much didn't,
/// and which nodes/edges carried it.
#[derive(Debug, Clone, PartialEq)]
pub struct PlacementMeta {
    /// The amount of flow actually placed.
    pub placed_flow: f64,
    /// The portion of the request that could not be placed.
    pub remaining_flow: f64,
    /// Nodes that participated in the placement (always includes `src`
    /// and `dst` when any flow was placed).
    pub nodes: HashSet<NodeId>,
    /// Edges that carried some portion of the placed flow.
    pub edges: HashSet<EdgeId>,
}

impl PlacementMeta {
    fn unplaced(requested: f64) -> Self {
        Self {
            placed_flow: 0.0,
            remaining_flow: requested,
            nodes: HashSet::new(),
            edges: HashSet::new(),
        }
    }
}

/// Place up to `flow` units from `src` to `dst` on `graph`, guided by the
/// predecessor DAG `pred` and split according to `flow_placement`.
///
/// Pass `f64::INFINITY` for `flow` to place as much as the DAG allows.
///
/// # Errors
/// Propagates [`crate::error::Error::UnknownNode`] from the underlying
/// capacity calculation if `src`/`dst` are missing from `graph`.
pub fn place_flow_on_graph(
    graph: &mut Graph,
    src: &NodeId,
    dst: &NodeId,
    pred: &PredMap,
    flow: f64,
    flow_index: Option<FlowIndex>,
    flow_placement: FlowPlacement,
) -> Result<PlacementMeta> {
    let (rem_cap, flow_dict) = calc_graph_capacity(graph, src, dst, pred, flow_placement)?;

    let placed_flow = rem_cap.min(flow);
    let remaining_flow = if flow.is_infinite() {
        f64::INFINITY
    } else {
        (flow - rem_cap).max(0.0)
    };

    if placed_flow <= 0.0 {
        return Ok(PlacementMeta::unplaced(flow));
    }

    let mut meta = PlacementMeta {
        placed_flow,
        remaining_flow,
        nodes: HashSet::new(),
        edges: HashSet::new(),
    };
    meta.nodes.insert(src.clone());
    meta.nodes.insert(dst.clone());

    for (node_a, to_dict) in &flow_dict {
        for (node_b, &flow_fraction) in to_dict {
            if flow_fraction <= 0.0 {
                continue;
            }
            meta.nodes.insert(node_a.clone());
            meta.nodes.insert(node_b.clone());

            let subflow = flow_fraction * placed_flow;
            let node_attrs = graph.node_attrs_mut(node_a)?;
            node_attrs.flow += subflow;
            if let Some(idx) = &flow_index {
                *node_attrs.flows.entry(idx.clone()).or_insert(0.0) += subflow;
            }

            // the forward edge bundle node_b -> node_a carries this flow
            let Some(edge_list) = pred.get(node_b).and_then(|m| m.get(node_a)) else {
                continue;
            };
            let edge_list: Vec<EdgeId> = edge_list.iter().copied().collect();

            match flow_placement {
                FlowPlacement::Proportional => {
                    let total_rem_cap: f64 = edge_list
                        .iter()
                        .map(|&eid| graph.edge_attrs(eid).map(|a| a.residual()).unwrap_or(0.0))
                        .sum();
                    if total_rem_cap > 0.0 {
                        for &eid in &edge_list {
                            let unused = graph.edge_attrs(eid)?.residual();
                            if unused > 0.0 {
                                let edge_subflow = subflow / total_rem_cap * unused;
                                if edge_subflow > 0.0 {
                                    meta.edges.insert(eid);
                                    let attrs = graph.edge_attrs_mut(eid)?;
                                    attrs.flow += edge_subflow;
                                    if let Some(idx) = &flow_index {
                                        *attrs.flows.entry(idx.clone()).or_insert(0.0) +=
                                            edge_subflow;
                                    }
                                }
                            }
                        }
                    }
                }
                FlowPlacement::EqualBalanced => {
                    if !edge_list.is_empty() {
                        let edge_subflow = subflow / edge_list.len() as f64;
                        for &eid in &edge_list {
                            meta.edges.insert(eid);
                            let attrs = graph.edge_attrs_mut(eid)?;
                            attrs.flow += edge_subflow;
                            if let Some(idx) = &flow_index {
                                *attrs.flows.entry(idx.clone()).or_insert(0.0) += edge_subflow;
                            }
                        }
                    }
                }
            }
        }
    }

    tracing::debug!(src = %src, dst = %dst, placed = meta.placed_flow, "placed flow on graph");
    Ok(meta)
}

/// Remove one flow (if `flow_index` is given) or every flow from `graph`.
///
/// Edges: a specific `flow_index` has its contribution subtracted from the
/// aggregate `flow` and its entry dropped from `flows`; `None` zeros both
/// attributes on every edge.
///
/// Nodes: node-level flow is not tracked per-edge-bundle the way edges
/// are, so either form zeros `flow` and clears `flows` on every node —
/// this is a deliberate simplification from the edge-level behavior, not
/// a bug (see `DESIGN.md`).
pub fn remove_flow_from_graph(graph: &mut Graph, flow_index: Option<&FlowIndex>) {
    let edge_ids: Vec<EdgeId> = graph.get_edges().map(|(id, _, _, _)| id).collect();
    for eid in edge_ids {
        let attrs = graph
            .edge_attrs_mut(eid)
            .expect("id collected from get_edges must exist");
        match flow_index {
            Some(idx) => {
                if let Some(removed) = attrs.flows.shift_remove(idx) {
                    attrs.flow -= removed;
                }
            }
            None => {
                attrs.flow = 0.0;
                attrs.flows.clear();
            }
        }
    }

    let node_ids: Vec<NodeId> = graph.nodes().cloned().collect();
    for nid in node_ids {
        let attrs = graph
            .node_attrs_mut(&nid)
            .expect("id collected from nodes() must exist");
        attrs.flow = 0.0;
        attrs.flows.clear();
    }

    tracing::debug!(flow_index = ?flow_index, "removed flow from graph");
}
