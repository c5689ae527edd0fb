//! Iterated shortest-path augmentation and flow analytics (§4.8, §4.10).
//!
//! Grounded on `ngraph.lib.algorithms.max_flow`.

use super::edge_select::EdgeSelect;
use super::{place, spf, Graph};
use crate::error::{Error, Result};
use crate::types::{Cost, EdgeId, FlowPlacement, NodeId, MIN_FLOW};
use indexmap::IndexMap;
use ordered_float::OrderedFloat;
use std::collections::HashSet;

/// Options controlling a [`calc_max_flow`] run.
#[derive(Debug, Clone)]
pub struct MaxFlowOptions {
    /// How flow is split among parallel equal-cost paths/edges.
    pub flow_placement: FlowPlacement,
    /// If true, place flow along a single shortest-path augmentation and
    /// stop (models one ECMP pass rather than true max flow).
    pub shortest_path: bool,
    /// If true (the default), operate on a clone of the input graph,
    /// leaving the caller's graph untouched.
    pub copy_graph: bool,
    /// If true, zero any pre-existing flow state before augmenting.
    pub reset_flow_graph: bool,
    /// If true, compute and return a [`FlowSummary`].
    pub return_summary: bool,
    /// If true, return the mutated working graph.
    pub return_graph: bool,
}

impl Default for MaxFlowOptions {
    fn default() -> Self {
        Self {
            flow_placement: FlowPlacement::Proportional,
            shortest_path: false,
            copy_graph: true,
            reset_flow_graph: false,
            return_summary: false,
            return_graph: false,
        }
    }
}

/// The result of a [`calc_max_flow`] call.
#[derive(Debug, Clone)]
pub struct MaxFlowResult {
    /// The total flow placed.
    pub total_flow: f64,
    /// Present iff [`MaxFlowOptions::return_summary`] was set.
    pub summary: Option<FlowSummary>,
    /// Present iff [`MaxFlowOptions::return_graph`] was set.
    pub graph: Option<Graph>,
}

/// Detailed analytics about a completed max-flow computation.
#[derive(Debug, Clone)]
pub struct FlowSummary {
    /// The maximum flow value achieved.
    pub total_flow: f64,
    /// Flow amount placed on each edge.
    pub edge_flow: IndexMap<EdgeId, f64>,
    /// Remaining capacity on each edge after flow placement.
    pub residual_cap: IndexMap<EdgeId, f64>,
    /// Nodes reachable from `src` in the residual graph.
    pub reachable: HashSet<NodeId>,
    /// Saturated edges crossing the source side of the min cut.
    pub min_cut: Vec<EdgeId>,
    /// Total flow volume placed at each distinct path cost seen during
    /// sequential augmentation.
    pub cost_distribution: IndexMap<OrderedFloat<Cost>, f64>,
}

fn build_flow_summary(
    graph: &Graph,
    src: &NodeId,
    total_flow: f64,
    cost_distribution: IndexMap<OrderedFloat<Cost>, f64>,
) -> FlowSummary {
    let mut edge_flow = IndexMap::new();
    let mut residual_cap = IndexMap::new();
    for (id, _, _, attrs) in graph.get_edges() {
        edge_flow.insert(id, attrs.flow);
        residual_cap.insert(id, attrs.capacity - attrs.flow);
    }

    let mut reachable: HashSet<NodeId> = HashSet::new();
    let mut stack = vec![src.clone()];
    while let Some(n) = stack.pop() {
        if reachable.contains(&n) {
            continue;
        }
        reachable.insert(n.clone());
        if let Some(neighbors) = graph.edges_out(&n) {
            for (nbr, bundle) in neighbors {
                for &eid in bundle {
                    let attrs = graph.edge_attrs(eid).expect("edge from adjacency exists");
                    if attrs.capacity - attrs.flow > 0.0 && !reachable.contains(nbr) {
                        stack.push(nbr.clone());
                    }
                }
            }
        }
    }

    let mut min_cut = Vec::new();
    for (id, u, v, attrs) in graph.get_edges() {
        if reachable.contains(u) && !reachable.contains(v) && attrs.capacity - attrs.flow == 0.0 {
            min_cut.push(id);
        }
    }

    FlowSummary {
        total_flow,
        edge_flow,
        residual_cap,
        reachable,
        min_cut,
        cost_distribution,
    }
}

/// Compute the maximum flow from `src` to `dst` by iterated shortest-path
/// augmentation under `ALL_MIN_COST_WITH_CAP_REMAINING`.
///
/// With `options.copy_graph` (the default) the caller's graph is left
/// untouched; otherwise augmentation mutates `graph` in place.
///
/// # Errors
/// Returns [`Error::UnknownNode`] if `src`/`dst` are missing from `graph`.
pub fn calc_max_flow(
    graph: &mut Graph,
    src: &NodeId,
    dst: &NodeId,
    options: &MaxFlowOptions,
) -> Result<MaxFlowResult> {
    if !graph.contains_node(src) {
        return Err(Error::UnknownNode(src.clone()));
    }
    if !graph.contains_node(dst) {
        return Err(Error::UnknownNode(dst.clone()));
    }

    let mut owned_clone;
    let working: &mut Graph = if options.copy_graph {
        owned_clone = graph.copy();
        &mut owned_clone
    } else {
        graph
    };
    working.init_flow_state(options.reset_flow_graph);

    let mut total_flow = 0.0;
    let mut cost_distribution: IndexMap<OrderedFloat<Cost>, f64> = IndexMap::new();

    if src != dst {
        let (costs, pred) = spf::spf(
            working,
            src,
            &EdgeSelect::AllMinCostWithCapRemaining,
            true,
            &HashSet::new(),
            &HashSet::new(),
            None,
        )?;

        if pred.contains_key(dst) {
            let meta = place::place_flow_on_graph(
                working,
                src,
                dst,
                &pred,
                f64::INFINITY,
                None,
                options.flow_placement,
            )?;
            if meta.placed_flow > 0.0 {
                total_flow += meta.placed_flow;
                *cost_distribution.entry(OrderedFloat(costs[dst])).or_insert(0.0) +=
                    meta.placed_flow;
            }

            if !options.shortest_path {
                loop {
                    let (costs, pred) = spf::spf(
                        working,
                        src,
                        &EdgeSelect::AllMinCostWithCapRemaining,
                        true,
                        &HashSet::new(),
                        &HashSet::new(),
                        None,
                    )?;
                    if !pred.contains_key(dst) {
                        break;
                    }
                    let meta = place::place_flow_on_graph(
                        working,
                        src,
                        dst,
                        &pred,
                        f64::INFINITY,
                        None,
                        options.flow_placement,
                    )?;
                    if meta.placed_flow < MIN_FLOW {
                        break;
                    }
                    total_flow += meta.placed_flow;
                    *cost_distribution.entry(OrderedFloat(costs[dst])).or_insert(0.0) +=
                        meta.placed_flow;
                }
            }
        }
    }

    let summary = options
        .return_summary
        .then(|| build_flow_summary(working, src, total_flow, cost_distribution));
    let graph_out = options.return_graph.then(|| working.clone());

    tracing::debug!(src = %src, dst = %dst, total_flow, "computed max flow");
    Ok(MaxFlowResult {
        total_flow,
        summary,
        graph: graph_out,
    })
}

/// Identify saturated (bottleneck) edges: those whose residual capacity is
/// within `tolerance` of zero in a max-flow solution.
///
/// # Errors
/// Propagates errors from [`calc_max_flow`].
pub fn saturated_edges(
    graph: &mut Graph,
    src: &NodeId,
    dst: &NodeId,
    options: &MaxFlowOptions,
    tolerance: f64,
) -> Result<Vec<EdgeId>> {
    let mut opts = options.clone();
    opts.return_summary = true;
    let result = calc_max_flow(graph, src, dst, &opts)?;
    let summary = result.summary.expect("return_summary was forced true above");
    Ok(summary
        .residual_cap
        .into_iter()
        .filter(|&(_, residual)| residual <= tolerance)
        .map(|(id, _)| id)
        .collect())
}

/// For each saturated edge, measure the change in total flow if its
/// capacity were adjusted by `change_amount` (negative capacities clamp to
/// zero). Useful for identifying high-impact bottlenecks.
///
/// # Errors
/// Propagates errors from [`calc_max_flow`]/[`saturated_edges`].
pub fn run_sensitivity(
    graph: &mut Graph,
    src: &NodeId,
    dst: &NodeId,
    options: &MaxFlowOptions,
    change_amount: f64,
) -> Result<IndexMap<EdgeId, f64>> {
    let mut scalar_opts = options.clone();
    scalar_opts.return_summary = false;
    scalar_opts.return_graph = false;

    let baseline = calc_max_flow(graph, src, dst, &scalar_opts)?.total_flow;
    let saturated = saturated_edges(graph, src, dst, options, 1e-10)?;

    let mut sensitivity = IndexMap::new();
    for eid in saturated {
        let original_cap = graph.edge_attrs(eid)?.capacity;
        let new_cap = (original_cap + change_amount).max(0.0);

        let mut test_graph = graph.copy();
        test_graph.edge_attrs_mut(eid)?.capacity = new_cap;

        let new_flow = calc_max_flow(&mut test_graph, src, dst, &scalar_opts)?.total_flow;
        sensitivity.insert(eid, new_flow - baseline);
    }
    Ok(sensitivity)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::EdgeAttrs;
    use approx::assert_abs_diff_eq;

    fn line_graph() -> Graph {
        // S1: A -[cap5]-> B -[cap3]-> C, single path, bottlenecked at 3.
        let mut g = Graph::new();
        g.add_node("A").unwrap();
        g.add_node("B").unwrap();
        g.add_node("C").unwrap();
        g.add_edge("A", "B", EdgeAttrs::new(1.0, 5.0), None).unwrap();
        g.add_edge("B", "C", EdgeAttrs::new(1.0, 3.0), None).unwrap();
        g
    }

    #[test]
    fn self_loop_returns_zero() {
        let mut g = line_graph();
        let result = calc_max_flow(&mut g, &"A".into(), &"A".into(), &MaxFlowOptions::default())
            .unwrap();
        assert_eq!(result.total_flow, 0.0);
    }

    #[test]
    fn line_graph_bottlenecked_at_min_capacity() {
        let mut g = line_graph();
        let result = calc_max_flow(&mut g, &"A".into(), &"C".into(), &MaxFlowOptions::default())
            .unwrap();
        assert_abs_diff_eq!(result.total_flow, 3.0, epsilon = 1e-9);
        // copy_graph defaults true: caller's graph must be untouched.
        assert_eq!(g.edge_attrs(EdgeId(0)).unwrap().flow, 0.0);
    }

    #[test]
    fn copy_graph_false_mutates_caller_graph() {
        let mut g = line_graph();
        let opts = MaxFlowOptions {
            copy_graph: false,
            ..Default::default()
        };
        calc_max_flow(&mut g, &"A".into(), &"C".into(), &opts).unwrap();
        assert!(g.edge_attrs(EdgeId(0)).unwrap().flow > 0.0);
    }

    #[test]
    fn unreachable_destination_yields_zero() {
        let mut g = Graph::new();
        g.add_node("A").unwrap();
        g.add_node("B").unwrap();
        let result = calc_max_flow(&mut g, &"A".into(), &"B".into(), &MaxFlowOptions::default())
            .unwrap();
        assert_eq!(result.total_flow, 0.0);
    }

    #[test]
    fn summary_min_cut_contains_the_bottleneck_edge() {
        let mut g = line_graph();
        let opts = MaxFlowOptions {
            return_summary: true,
            ..Default::default()
        };
        let result =
            calc_max_flow(&mut g, &"A".into(), &"C".into(), &opts).unwrap();
        let summary = result.summary.unwrap();
        assert!(summary.min_cut.contains(&EdgeId(1)));
        assert!(summary.reachable.contains(&NodeId::from("A")));
        assert!(summary.reachable.contains(&NodeId::from("B")));
        assert!(!summary.reachable.contains(&NodeId::from("C")));
    }

    #[test]
    fn saturated_edges_reports_the_bottleneck() {
        let mut g = line_graph();
        let sat =
            saturated_edges(&mut g, &"A".into(), &"C".into(), &MaxFlowOptions::default(), 1e-9)
                .unwrap();
        assert_eq!(sat, vec![EdgeId(1)]);
    }

    #[test]
    fn sensitivity_shows_capacity_increase_on_bottleneck_raises_flow() {
        let mut g = line_graph();
        let sensitivity =
            run_sensitivity(&mut g, &"A".into(), &"C".into(), &MaxFlowOptions::default(), 1.0)
                .unwrap();
        assert_abs_diff_eq!(sensitivity[&EdgeId(1)], 1.0, epsilon = 1e-9);
    }

    /// S3: square with rerouting. A->B has 1+2=3 of capacity over two
    /// parallel edges, likewise B->C; A->D->C is a cost-2 detour with 3 of
    /// capacity. Full max flow is 6 (3 over the short path, 3 over the
    /// detour); a single shortest-path augmentation is bounded to 3 (the
    /// short path only); with EQUAL_BALANCED it is bounded to 2 (equal
    /// split across the weaker of the two parallel edges).
    fn square_graph() -> Graph {
        let mut g = Graph::new();
        for n in ["A", "B", "C", "D"] {
            g.add_node(n).unwrap();
        }
        g.add_edge("A", "B", EdgeAttrs::new(1.0, 1.0), None).unwrap();
        g.add_edge("A", "B", EdgeAttrs::new(1.0, 2.0), None).unwrap();
        g.add_edge("B", "C", EdgeAttrs::new(1.0, 1.0), None).unwrap();
        g.add_edge("B", "C", EdgeAttrs::new(1.0, 2.0), None).unwrap();
        g.add_edge("A", "D", EdgeAttrs::new(2.0, 3.0), None).unwrap();
        g.add_edge("D", "C", EdgeAttrs::new(2.0, 3.0), None).unwrap();
        g
    }

    #[test]
    fn square_full_max_flow_is_six() {
        let mut g = square_graph();
        let result = calc_max_flow(&mut g, &"A".into(), &"C".into(), &MaxFlowOptions::default())
            .unwrap();
        assert_abs_diff_eq!(result.total_flow, 6.0, epsilon = 1e-9);
    }

    #[test]
    fn square_single_shortest_path_pass_is_three() {
        let mut g = square_graph();
        let opts = MaxFlowOptions {
            shortest_path: true,
            ..Default::default()
        };
        let result = calc_max_flow(&mut g, &"A".into(), &"C".into(), &opts).unwrap();
        assert_abs_diff_eq!(result.total_flow, 3.0, epsilon = 1e-9);
    }

    #[test]
    fn square_single_shortest_path_equal_balanced_is_two() {
        let mut g = square_graph();
        let opts = MaxFlowOptions {
            shortest_path: true,
            flow_placement: FlowPlacement::EqualBalanced,
            ..Default::default()
        };
        let result = calc_max_flow(&mut g, &"A".into(), &"C".into(), &opts).unwrap();
        assert_abs_diff_eq!(result.total_flow, 2.0, epsilon = 1e-9);
    }

    /// S4: the six-node `graph3` figure. A->C has two edge-disjoint routes
    /// (A-B-C at capacity 6, A-E-C at capacity min(5,4)=4), for a
    /// PROPORTIONAL max flow of 10.
    fn graph3() -> Graph {
        let mut g = Graph::new();
        for n in ["A", "B", "C", "D", "E", "F"] {
            g.add_node(n).unwrap();
        }
        g.add_edge("A", "B", EdgeAttrs::new(1.0, 2.0), None).unwrap();
        g.add_edge("A", "B", EdgeAttrs::new(1.0, 4.0), None).unwrap();
        g.add_edge("A", "B", EdgeAttrs::new(1.0, 6.0), None).unwrap();
        g.add_edge("B", "C", EdgeAttrs::new(1.0, 1.0), None).unwrap();
        g.add_edge("B", "C", EdgeAttrs::new(1.0, 2.0), None).unwrap();
        g.add_edge("B", "C", EdgeAttrs::new(1.0, 3.0), None).unwrap();
        g.add_edge("C", "D", EdgeAttrs::new(2.0, 3.0), None).unwrap();
        g.add_edge("A", "E", EdgeAttrs::new(1.0, 5.0), None).unwrap();
        g.add_edge("E", "C", EdgeAttrs::new(1.0, 4.0), None).unwrap();
        g.add_edge("A", "D", EdgeAttrs::new(4.0, 2.0), None).unwrap();
        g.add_edge("C", "F", EdgeAttrs::new(1.0, 1.0), None).unwrap();
        g.add_edge("F", "D", EdgeAttrs::new(1.0, 2.0), None).unwrap();
        g
    }

    #[test]
    fn graph3_proportional_max_flow_is_ten() {
        let mut g = graph3();
        let opts = MaxFlowOptions {
            flow_placement: FlowPlacement::Proportional,
            ..Default::default()
        };
        let result = calc_max_flow(&mut g, &"A".into(), &"C".into(), &opts).unwrap();
        assert_abs_diff_eq!(result.total_flow, 10.0, epsilon = 1e-9);
    }
}
