//! `CapacityCalculator` (§4.6): the maximum feasible flow through a
//! predecessor DAG, under either flow placement discipline.
//!
//! Grounded on `ngraph.lib.algorithms.calc_capacity`. The residual graph
//! here is built fresh per call from the DAG SPF produced — never from the
//! original graph's own adjacency — per the design note that a stale
//! residual would corrupt the caller's cumulative `flow` state.

use super::{EdgeIdVec, Graph, PredMap};
use crate::error::{Error, Result};
use crate::types::{FlowPlacement, NodeId, MIN_CAP, MIN_FLOW};
use indexmap::IndexMap;
use std::collections::{HashSet, VecDeque};

/// Signed fractional flow on each ordered pair `(u, v)` touched by a
/// capacity calculation; positive means forward (`u -> v`).
pub type FlowDict = IndexMap<NodeId, IndexMap<NodeId, f64>>;

struct GraphData {
    /// Forward adjacency restricted to the sub-DAG backward-reachable from
    /// the call's destination: `succ[u][v]` is the edge bundle of the
    /// forward edge `u -> v`.
    succ: IndexMap<NodeId, IndexMap<NodeId, EdgeIdVec>>,
    levels: IndexMap<NodeId, i64>,
    residual_cap: FlowDict,
    flow_dict: FlowDict,
}

fn init_graph_data(
    graph: &Graph,
    pred: &PredMap,
    init_node: &NodeId,
    placement: FlowPlacement,
) -> GraphData {
    let mut succ: IndexMap<NodeId, IndexMap<NodeId, EdgeIdVec>> = IndexMap::new();
    let mut levels: IndexMap<NodeId, i64> = IndexMap::new();
    let mut residual_cap: FlowDict = IndexMap::new();
    let mut flow_dict: FlowDict = IndexMap::new();

    let mut visited: HashSet<NodeId> = HashSet::new();
    let mut queue: VecDeque<NodeId> = VecDeque::new();
    queue.push_back(init_node.clone());

    while let Some(node) = queue.pop_front() {
        visited.insert(node.clone());
        levels.entry(node.clone()).or_insert(-1);

        if let Some(preds) = pred.get(&node) {
            for (adj_node, edge_list) in preds {
                succ.entry(adj_node.clone())
                    .or_default()
                    .entry(node.clone())
                    .or_insert_with(|| edge_list.clone());

                let capacities: Vec<f64> = edge_list
                    .iter()
                    .map(|&eid| {
                        let a = graph.edge_attrs(eid).expect("edge in pred bundle exists");
                        (a.capacity - a.flow).max(0.0)
                    })
                    .collect();

                match placement {
                    FlowPlacement::Proportional => {
                        let fwd_capacity: f64 = capacities.iter().sum();
                        residual_cap.entry(node.clone()).or_default().insert(
                            adj_node.clone(),
                            if fwd_capacity >= MIN_CAP { fwd_capacity } else { 0.0 },
                        );
                        residual_cap
                            .entry(adj_node.clone())
                            .or_default()
                            .insert(node.clone(), 0.0);
                    }
                    FlowPlacement::EqualBalanced => {
                        let rev_cap = if capacities.is_empty() {
                            0.0
                        } else {
                            let min_cap = capacities.iter().cloned().fold(f64::INFINITY, f64::min);
                            min_cap * capacities.len() as f64
                        };
                        residual_cap.entry(adj_node.clone()).or_default().insert(
                            node.clone(),
                            if rev_cap >= MIN_CAP { rev_cap } else { 0.0 },
                        );
                        residual_cap
                            .entry(node.clone())
                            .or_default()
                            .insert(adj_node.clone(), 0.0);
                    }
                }

                flow_dict
                    .entry(node.clone())
                    .or_default()
                    .insert(adj_node.clone(), 0.0);
                flow_dict
                    .entry(adj_node.clone())
                    .or_default()
                    .insert(node.clone(), 0.0);

                if !visited.contains(adj_node) {
                    queue.push_back(adj_node.clone());
                }
            }
        }
    }

    for n in graph.nodes() {
        succ.entry(n.clone()).or_default();
    }

    GraphData {
        succ,
        levels,
        residual_cap,
        flow_dict,
    }
}

fn set_levels_bfs(start: &NodeId, levels: &mut IndexMap<NodeId, i64>, residual_cap: &FlowDict) {
    for v in levels.values_mut() {
        *v = -1;
    }
    levels.insert(start.clone(), 0);

    let mut queue = VecDeque::new();
    queue.push_back(start.clone());
    while let Some(u) = queue.pop_front() {
        let level_u = levels[&u];
        if let Some(neighbors) = residual_cap.get(&u) {
            let neighbors: Vec<(NodeId, f64)> =
                neighbors.iter().map(|(k, v)| (k.clone(), *v)).collect();
            for (v, cap_uv) in neighbors {
                if cap_uv >= MIN_CAP && levels.get(&v).copied().unwrap_or(-1) < 0 {
                    levels.insert(v.clone(), level_u + 1);
                    queue.push_back(v);
                }
            }
        }
    }
}

fn push_flow_dfs(
    current: &NodeId,
    sink: &NodeId,
    flow_in: f64,
    residual_cap: &mut FlowDict,
    flow_dict: &mut FlowDict,
    levels: &IndexMap<NodeId, i64>,
) -> f64 {
    if current == sink {
        return flow_in;
    }

    let neighbors: Vec<(NodeId, f64)> = residual_cap
        .get(current)
        .map(|m| m.iter().map(|(k, v)| (k.clone(), *v)).collect())
        .unwrap_or_default();

    let cur_level = levels.get(current).copied().unwrap_or(-1);
    let mut remaining = flow_in;
    let mut total_pushed = 0.0;

    for (nxt, cap_uv) in neighbors {
        if cap_uv < MIN_CAP {
            continue;
        }
        if levels.get(&nxt).copied().unwrap_or(-1) != cur_level + 1 {
            continue;
        }
        let flow_to_push = remaining.min(cap_uv);
        if flow_to_push < MIN_FLOW {
            continue;
        }

        let pushed = push_flow_dfs(&nxt, sink, flow_to_push, residual_cap, flow_dict, levels);
        if pushed >= MIN_FLOW {
            *residual_cap.entry(current.clone()).or_default().entry(nxt.clone()).or_insert(0.0) -=
                pushed;
            *residual_cap.entry(nxt.clone()).or_default().entry(current.clone()).or_insert(0.0) +=
                pushed;
            *flow_dict.entry(current.clone()).or_default().entry(nxt.clone()).or_insert(0.0) +=
                pushed;
            *flow_dict.entry(nxt.clone()).or_default().entry(current.clone()).or_insert(0.0) -=
                pushed;

            remaining -= pushed;
            total_pushed += pushed;
            if remaining < MIN_FLOW {
                break;
            }
        }
    }

    total_pushed
}

fn equal_balance_bfs(
    src: &NodeId,
    succ: &IndexMap<NodeId, IndexMap<NodeId, EdgeIdVec>>,
    flow_dict: &mut FlowDict,
) {
    let mut node_split: IndexMap<NodeId, usize> = IndexMap::new();
    for (node, neighbors) in succ {
        let total: usize = neighbors.values().map(|bundle| bundle.len()).sum();
        node_split.insert(node.clone(), total);
    }

    let mut queue: VecDeque<(NodeId, f64)> = VecDeque::new();
    queue.push_back((src.clone(), 1.0));
    let mut visited: HashSet<NodeId> = HashSet::new();

    while let Some((node, incoming_flow)) = queue.pop_front() {
        visited.insert(node.clone());
        let split_count = node_split.get(&node).copied().unwrap_or(0);
        if split_count == 0 || incoming_flow < MIN_FLOW {
            continue;
        }

        let Some(neighbors) = succ.get(&node) else {
            continue;
        };
        for (nxt, edge_tuple) in neighbors {
            if edge_tuple.is_empty() {
                continue;
            }
            let push_flow = incoming_flow * edge_tuple.len() as f64 / split_count as f64;
            if push_flow < MIN_FLOW {
                continue;
            }

            *flow_dict.entry(node.clone()).or_default().entry(nxt.clone()).or_insert(0.0) +=
                push_flow;
            *flow_dict.entry(nxt.clone()).or_default().entry(node.clone()).or_insert(0.0) -=
                push_flow;

            if !visited.contains(nxt) {
                queue.push_back((nxt.clone(), push_flow));
            }
        }
    }
}

/// Compute the maximum feasible flow through `pred` from `src` to `dst`
/// under `placement`, returning the scalar total and the signed fractional
/// flow on every touched ordered pair.
///
/// Returns `(0.0, _)` with an all-zero `flow_dict` if `dst` is unreachable
/// in `pred` (SPF's normal "no path" outcome, not an error here).
///
/// # Errors
/// Returns [`Error::UnknownNode`] if `src` or `dst` is not present in
/// `graph` itself.
pub fn calc_graph_capacity(
    graph: &Graph,
    src: &NodeId,
    dst: &NodeId,
    pred: &PredMap,
    placement: FlowPlacement,
) -> Result<(f64, FlowDict)> {
    if !graph.contains_node(src) {
        return Err(Error::UnknownNode(src.clone()));
    }
    if !graph.contains_node(dst) {
        return Err(Error::UnknownNode(dst.clone()));
    }

    let GraphData {
        succ,
        mut levels,
        mut residual_cap,
        mut flow_dict,
    } = init_graph_data(graph, pred, dst, placement);

    let mut total_flow = 0.0;

    match placement {
        FlowPlacement::Proportional => {
            loop {
                set_levels_bfs(dst, &mut levels, &residual_cap);
                if levels.get(src).copied().unwrap_or(-1) <= 0 {
                    break;
                }
                let pushed = push_flow_dfs(
                    dst,
                    src,
                    f64::INFINITY,
                    &mut residual_cap,
                    &mut flow_dict,
                    &levels,
                );
                if pushed < MIN_FLOW {
                    break;
                }
                total_flow += pushed;
            }

            if total_flow < MIN_FLOW {
                total_flow = 0.0;
                for m in flow_dict.values_mut() {
                    for v in m.values_mut() {
                        *v = 0.0;
                    }
                }
            } else {
                for m in flow_dict.values_mut() {
                    for v in m.values_mut() {
                        *v = -(*v / total_flow);
                    }
                }
            }
        }
        FlowPlacement::EqualBalanced => {
            equal_balance_bfs(src, &succ, &mut flow_dict);

            let mut min_ratio = f64::INFINITY;
            for (u, neighbors) in &succ {
                for v in neighbors.keys() {
                    let assigned = flow_dict.get(u).and_then(|m| m.get(v)).copied().unwrap_or(0.0);
                    if assigned >= MIN_FLOW {
                        let cap_uv = residual_cap.get(u).and_then(|m| m.get(v)).copied().unwrap_or(0.0);
                        let ratio = cap_uv / assigned;
                        if ratio < min_ratio {
                            min_ratio = ratio;
                        }
                    }
                }
            }

            if min_ratio.is_infinite() || min_ratio < MIN_FLOW {
                total_flow = 0.0;
            } else {
                total_flow = min_ratio;
                for m in flow_dict.values_mut() {
                    for v in m.values_mut() {
                        let val = *v * total_flow;
                        *v = if val.abs() >= MIN_FLOW { val } else { 0.0 };
                    }
                }
                for m in flow_dict.values_mut() {
                    for v in m.values_mut() {
                        *v /= total_flow;
                    }
                }
            }
        }
    }

    for m in flow_dict.values_mut() {
        for v in m.values_mut() {
            if v.abs() < MIN_FLOW {
                *v = 0.0;
            }
        }
    }

    tracing::debug!(src = %src, dst = %dst, total_flow, "calculated graph capacity");
    Ok((total_flow, flow_dict))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::edge_select::EdgeSelect;
    use crate::graph::{spf, EdgeAttrs};
    use approx::assert_abs_diff_eq;

    fn spf_pred(g: &Graph, src: &str, selector: EdgeSelect) -> PredMap {
        spf::spf(
            g,
            &NodeId::from(src),
            &selector,
            true,
            &Default::default(),
            &Default::default(),
            None,
        )
        .unwrap()
        .1
    }

    #[test]
    fn proportional_splits_parallel_capacity() {
        // A -> B with two parallel edges of capacity 2 and 3; all flow
        // should normalize to fraction 1.0 leaving A.
        let mut g = Graph::new();
        g.add_node("A").unwrap();
        g.add_node("B").unwrap();
        g.add_edge("A", "B", EdgeAttrs::new(1.0, 2.0), None).unwrap();
        g.add_edge("A", "B", EdgeAttrs::new(1.0, 3.0), None).unwrap();

        let pred = spf_pred(&g, "A", EdgeSelect::AllMinCostWithCapRemaining);
        let (total, flow_dict) =
            calc_graph_capacity(&g, &"A".into(), &"B".into(), &pred, FlowPlacement::Proportional)
                .unwrap();
        assert_abs_diff_eq!(total, 5.0, epsilon = 1e-9);
        assert_abs_diff_eq!(flow_dict[&NodeId::from("A")][&NodeId::from("B")], 1.0, epsilon = 1e-9);
    }

    #[test]
    fn equal_balanced_bans_zero_capacity_bundle_member() {
        // A -> B with two parallel edges, one of them zero-capacity: the
        // "ban the bundle" rule means the whole bundle contributes zero.
        let mut g = Graph::new();
        g.add_node("A").unwrap();
        g.add_node("B").unwrap();
        g.add_edge("A", "B", EdgeAttrs::new(1.0, 0.0), None).unwrap();
        g.add_edge("A", "B", EdgeAttrs::new(1.0, 10.0), None).unwrap();

        let pred = spf_pred(&g, "A", EdgeSelect::AllMinCost);
        let (total, _) =
            calc_graph_capacity(&g, &"A".into(), &"B".into(), &pred, FlowPlacement::EqualBalanced)
                .unwrap();
        assert_eq!(total, 0.0);
    }

    #[test]
    fn unreachable_destination_yields_zero() {
        let mut g = Graph::new();
        g.add_node("A").unwrap();
        g.add_node("B").unwrap();
        let pred = spf_pred(&g, "A", EdgeSelect::AllMinCost);
        let (total, _) =
            calc_graph_capacity(&g, &"A".into(), &"B".into(), &pred, FlowPlacement::Proportional)
                .unwrap();
        assert_eq!(total, 0.0);
    }

    #[test]
    fn unknown_node_fails() {
        let mut g = Graph::new();
        g.add_node("A").unwrap();
        let pred: PredMap = IndexMap::new();
        let err = calc_graph_capacity(&g, &"A".into(), &"Z".into(), &pred, FlowPlacement::Proportional)
            .unwrap_err();
        assert_eq!(err, Error::UnknownNode("Z".into()));
    }
}
