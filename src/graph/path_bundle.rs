//! `PathBundle`: a loop-free sub-DAG from a single source to a single
//! destination sharing one aggregate cost — the unit of flow attachment
//! used by [`crate::policy::Flow`].
//!
//! Grounded on `ngraph.lib.path_bundle.PathBundle`. Only the operations
//! `spec.md` actually names are kept: `from_path`, `add`, and
//! `get_sub_path_bundle` exist in the original but have no counterpart here
//! and are intentionally not ported (see `DESIGN.md`).

use super::{EdgeIdVec, PredMap};
use crate::types::{Cost, EdgeId, NodeId};
use indexmap::IndexMap;
use std::collections::{HashSet, VecDeque};

/// A named, loop-free single-cost sub-DAG from `src` to `dst`.
#[derive(Debug, Clone, PartialEq)]
pub struct PathBundle {
    src: NodeId,
    dst: NodeId,
    cost: Cost,
    pred: PredMap,
    nodes: HashSet<NodeId>,
    edges: HashSet<EdgeId>,
    edge_tuples: HashSet<Vec<EdgeId>>,
}

impl PathBundle {
    /// Build a bundle by restricting `full_pred` (as produced by
    /// [`super::spf::spf`]/[`super::spf::ksp`]) to the sub-DAG actually
    /// reachable backward from `dst`.
    pub fn new(src: impl Into<NodeId>, dst: impl Into<NodeId>, full_pred: &PredMap, cost: Cost) -> Self {
        let src = src.into();
        let dst = dst.into();

        let mut pred: PredMap = IndexMap::new();
        pred.insert(src.clone(), IndexMap::new());
        let mut nodes = HashSet::new();
        nodes.insert(src.clone());
        nodes.insert(dst.clone());

        let mut queue = VecDeque::new();
        let mut queued = HashSet::new();
        queue.push_back(dst.clone());
        queued.insert(dst.clone());

        while let Some(u) = queue.pop_front() {
            if u == src {
                continue;
            }
            if let Some(preds) = full_pred.get(&u) {
                pred.insert(u.clone(), preds.clone());
                for p in preds.keys() {
                    nodes.insert(p.clone());
                    if queued.insert(p.clone()) {
                        queue.push_back(p.clone());
                    }
                }
            }
        }

        let mut edges = HashSet::new();
        let mut edge_tuples = HashSet::new();
        for preds in pred.values() {
            for bundle in preds.values() {
                edges.extend(bundle.iter().copied());
                edge_tuples.insert(bundle.iter().copied().collect::<Vec<_>>());
            }
        }

        Self {
            src,
            dst,
            cost,
            pred,
            nodes,
            edges,
            edge_tuples,
        }
    }

    /// The bundle's source node.
    pub fn src_node(&self) -> &NodeId {
        &self.src
    }

    /// The bundle's destination node.
    pub fn dst_node(&self) -> &NodeId {
        &self.dst
    }

    /// The shared cost of every path in this bundle.
    pub fn cost(&self) -> Cost {
        self.cost
    }

    /// The restricted predecessor map backing this bundle.
    pub fn pred(&self) -> &PredMap {
        &self.pred
    }

    /// Every node on this bundle's sub-DAG.
    pub fn nodes(&self) -> &HashSet<NodeId> {
        &self.nodes
    }

    /// Every edge id used anywhere on this bundle's sub-DAG.
    pub fn edges(&self) -> &HashSet<EdgeId> {
        &self.edges
    }

    /// The distinct parallel-edge groupings used by this bundle.
    pub fn edge_tuples(&self) -> &HashSet<Vec<EdgeId>> {
        &self.edge_tuples
    }

    /// Enumerate the concrete paths making up this bundle.
    pub fn resolve_to_paths(
        &self,
        split_parallel_edges: bool,
    ) -> impl Iterator<Item = super::path::Path> + '_ {
        let cost = self.cost;
        super::path::resolve_paths(&self.pred, &self.src, &self.dst, split_parallel_edges)
            .map(move |p| p.with_cost(cost))
    }

    /// Whether this bundle's edge set is a superset of `other`'s.
    pub fn contains(&self, other: &PathBundle) -> bool {
        other.edges.is_subset(&self.edges)
    }

    /// Whether this bundle's edge set is a subset of `other`'s.
    pub fn is_subset_of(&self, other: &PathBundle) -> bool {
        self.edges.is_subset(&other.edges)
    }

    /// Whether this bundle and `other` share no edges.
    pub fn is_disjoint_from(&self, other: &PathBundle) -> bool {
        self.edges.is_disjoint(&other.edges)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::edge_select::EdgeSelect;
    use crate::graph::{spf, EdgeAttrs, Graph};

    #[test]
    fn restricts_to_reachable_sub_dag() {
        let mut g = Graph::new();
        g.add_node("A").unwrap();
        g.add_node("B").unwrap();
        g.add_node("C").unwrap();
        g.add_node("D").unwrap(); // unreachable-from-dst branch
        g.add_edge("A", "B", EdgeAttrs::new(1.0, 5.0), None).unwrap();
        g.add_edge("B", "C", EdgeAttrs::new(1.0, 5.0), None).unwrap();
        g.add_edge("A", "D", EdgeAttrs::new(1.0, 5.0), None).unwrap();

        let (costs, pred) = spf::spf(
            &g,
            &"A".into(),
            &EdgeSelect::AllMinCost,
            true,
            &Default::default(),
            &Default::default(),
            None,
        )
        .unwrap();

        let bundle = PathBundle::new("A", "C", &pred, costs[&NodeId::from("C")]);
        assert!(bundle.nodes().contains(&NodeId::from("B")));
        assert!(!bundle.nodes().contains(&NodeId::from("D")));
        assert_eq!(bundle.edges().len(), 2);
    }

    #[test]
    fn disjoint_and_subset_checks() {
        let mut g = Graph::new();
        g.add_node("A").unwrap();
        g.add_node("B").unwrap();
        g.add_node("C").unwrap();
        g.add_edge("A", "B", EdgeAttrs::new(1.0, 5.0), None).unwrap();
        g.add_edge("B", "C", EdgeAttrs::new(1.0, 5.0), None).unwrap();

        let (costs, pred) = spf::spf(
            &g,
            &"A".into(),
            &EdgeSelect::AllMinCost,
            true,
            &Default::default(),
            &Default::default(),
            None,
        )
        .unwrap();

        let full = PathBundle::new("A", "C", &pred, costs[&NodeId::from("C")]);
        let partial = PathBundle::new("A", "B", &pred, costs[&NodeId::from("B")]);
        assert!(full.contains(&partial));
        assert!(partial.is_subset_of(&full));
        assert!(!full.is_disjoint_from(&partial));
    }
}
