//! Concrete path enumeration over a predecessor map (§4.5).
//!
//! Grounded on `ngraph.lib.algorithms.path_utils.resolve_to_paths`: an
//! explicit backtracking stack walks backward from `dst` through `pred`,
//! rejecting cycles via a "seen" set, and builds concrete forward paths once
//! it reaches `src`. Python's generator becomes an eagerly-built `Vec` here
//! (predecessor DAGs handed to this function are small — the product of a
//! single SPF/KSP run — so laziness buys nothing and an `Iterator` over a
//! materialized `Vec` is the simplest faithful translation).

use super::{EdgeIdVec, PredMap};
use crate::types::{Cost, EdgeId, NodeId};

/// A concrete ordered path from a source to a destination. Each node but
/// the last carries the bundle of parallel edges taken to the next node;
/// the final node's bundle is always empty.
#[derive(Debug, Clone, PartialEq)]
pub struct Path {
    nodes: Vec<NodeId>,
    edge_groups: Vec<EdgeIdVec>,
    cost: Option<Cost>,
}

impl Path {
    /// The nodes visited, in order, source first.
    pub fn nodes_seq(&self) -> &[NodeId] {
        &self.nodes
    }

    /// `(node, outgoing_edge_bundle)` pairs, one per node including the
    /// destination (whose bundle is always empty).
    pub fn segments(&self) -> impl Iterator<Item = (&NodeId, &EdgeIdVec)> {
        self.nodes.iter().zip(self.edge_groups.iter())
    }

    /// The set of every edge id used anywhere on this path.
    pub fn edge_set(&self) -> std::collections::HashSet<EdgeId> {
        self.edge_groups.iter().flatten().copied().collect()
    }

    /// The path's source node.
    pub fn src_node(&self) -> &NodeId {
        &self.nodes[0]
    }

    /// The path's destination node.
    pub fn dst_node(&self) -> &NodeId {
        self.nodes.last().expect("path always has at least one node")
    }

    /// This path's cost, if known (set by the caller that built it from a
    /// cost-bearing structure such as a `PathBundle`).
    pub fn cost(&self) -> Option<Cost> {
        self.cost
    }

    /// Attach a known cost, builder-style.
    pub fn with_cost(mut self, cost: Cost) -> Self {
        self.cost = Some(cost);
        self
    }

    /// Number of nodes on the path.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether this path has no nodes (never constructed by
    /// [`resolve_paths`], but kept for API symmetry).
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

struct Frame {
    node: NodeId,
    incoming_bundle: EdgeIdVec,
    next_pred_idx: usize,
}

/// Enumerate every concrete path from `src` to `dst` described by `pred`.
///
/// Yields nothing if `dst` is not a key of `pred`. With
/// `split_parallel_edges`, a path segment backed by `K` parallel edges
/// expands into `K` separate single-edge paths (the Cartesian product over
/// all segments but the last, which is always empty).
pub fn resolve_paths(
    pred: &PredMap,
    src: &NodeId,
    dst: &NodeId,
    split_parallel_edges: bool,
) -> impl Iterator<Item = Path> {
    let mut out = Vec::new();

    if !pred.contains_key(dst) {
        return out.into_iter();
    }

    let mut stack = vec![Frame {
        node: dst.clone(),
        incoming_bundle: EdgeIdVec::new(),
        next_pred_idx: 0,
    }];
    let mut seen = std::collections::HashSet::new();
    seen.insert(dst.clone());

    while let Some(top) = stack.last_mut() {
        if top.node == *src {
            let nodes: Vec<NodeId> = stack.iter().rev().map(|f| f.node.clone()).collect();
            let edge_groups: Vec<EdgeIdVec> =
                stack.iter().rev().map(|f| f.incoming_bundle.clone()).collect();
            let path = Path {
                nodes,
                edge_groups,
                cost: None,
            };
            if split_parallel_edges {
                out.extend(expand_parallel(&path));
            } else {
                out.push(path);
            }
            let node = stack.pop().unwrap().node;
            seen.remove(&node);
            continue;
        }

        let preds: Vec<NodeId> = pred
            .get(&top.node)
            .map(|m| m.keys().cloned().collect())
            .unwrap_or_default();

        if top.next_pred_idx >= preds.len() {
            let node = stack.pop().unwrap().node;
            seen.remove(&node);
            continue;
        }

        let next_pred = preds[top.next_pred_idx].clone();
        top.next_pred_idx += 1;

        if seen.contains(&next_pred) {
            continue;
        }

        let bundle = pred
            .get(&top.node)
            .and_then(|m| m.get(&next_pred))
            .cloned()
            .unwrap_or_default();

        seen.insert(next_pred.clone());
        stack.push(Frame {
            node: next_pred,
            incoming_bundle: bundle,
            next_pred_idx: 0,
        });
    }

    out.into_iter()
}

fn expand_parallel(path: &Path) -> Vec<Path> {
    let n = path.edge_groups.len();
    if n == 0 {
        return Vec::new();
    }
    // every group but the last (which is always empty) contributes a choice
    let mut combos: Vec<Vec<EdgeId>> = vec![Vec::new()];
    for group in &path.edge_groups[..n - 1] {
        let mut next = Vec::with_capacity(combos.len() * group.len().max(1));
        for combo in &combos {
            for &edge in group.iter() {
                let mut c = combo.clone();
                c.push(edge);
                next.push(c);
            }
        }
        combos = next;
    }

    combos
        .into_iter()
        .map(|choices| {
            let mut edge_groups: Vec<EdgeIdVec> =
                choices.into_iter().map(|e| EdgeIdVec::from_elem(e, 1)).collect();
            edge_groups.push(EdgeIdVec::new());
            Path {
                nodes: path.nodes.clone(),
                edge_groups,
                cost: path.cost,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{EdgeAttrs, Graph};
    use crate::types::NodeId;

    fn pred_from_spf(g: &Graph, src: &str) -> PredMap {
        super::super::spf::spf(
            g,
            &NodeId::from(src),
            &super::super::edge_select::EdgeSelect::AllMinCost,
            true,
            &Default::default(),
            &Default::default(),
            None,
        )
        .unwrap()
        .1
    }

    #[test]
    fn empty_when_dst_unreachable() {
        let mut g = Graph::new();
        g.add_node("A").unwrap();
        g.add_node("B").unwrap();
        let pred = pred_from_spf(&g, "A");
        let paths: Vec<_> = resolve_paths(&pred, &"A".into(), &"B".into(), false).collect();
        assert!(paths.is_empty());
    }

    #[test]
    fn single_edge_path() {
        let mut g = Graph::new();
        g.add_node("A").unwrap();
        g.add_node("B").unwrap();
        g.add_edge("A", "B", EdgeAttrs::new(1.0, 5.0), None).unwrap();
        let pred = pred_from_spf(&g, "A");
        let paths: Vec<_> = resolve_paths(&pred, &"A".into(), &"B".into(), false).collect();
        assert_eq!(paths.len(), 1);
        assert_eq!(paths[0].nodes_seq(), &[NodeId::from("A"), NodeId::from("B")]);
    }

    #[test]
    fn split_parallel_edges_yields_one_path_per_edge() {
        let mut g = Graph::new();
        g.add_node("A").unwrap();
        g.add_node("B").unwrap();
        g.add_edge("A", "B", EdgeAttrs::new(1.0, 5.0), None).unwrap();
        g.add_edge("A", "B", EdgeAttrs::new(1.0, 5.0), None).unwrap();
        let pred = pred_from_spf(&g, "A");
        let paths: Vec<_> = resolve_paths(&pred, &"A".into(), &"B".into(), true).collect();
        assert_eq!(paths.len(), 2);
        let unsplit: Vec<_> = resolve_paths(&pred, &"A".into(), &"B".into(), false).collect();
        assert_eq!(unsplit.len(), 1);
    }

    #[test]
    fn no_cycles_even_with_a_cyclic_looking_pred_map() {
        // Build a pred map with a spurious self-reference; resolve_paths
        // must still terminate and never revisit a node.
        let mut g = Graph::new();
        g.add_node("A").unwrap();
        g.add_node("B").unwrap();
        g.add_node("C").unwrap();
        g.add_edge("A", "B", EdgeAttrs::new(1.0, 5.0), None).unwrap();
        g.add_edge("B", "C", EdgeAttrs::new(1.0, 5.0), None).unwrap();
        let pred = pred_from_spf(&g, "A");
        let paths: Vec<_> = resolve_paths(&pred, &"A".into(), &"C".into(), false).collect();
        assert_eq!(paths.len(), 1);
        assert_eq!(
            paths[0].nodes_seq(),
            &[NodeId::from("A"), NodeId::from("B"), NodeId::from("C")]
        );
    }
}
