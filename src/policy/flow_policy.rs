//! `FlowPolicy`: converts a (src, dst, volume) demand into a managed
//! collection of [`Flow`]s consistent with a configuration (§4.9).
//!
//! Grounded on `ngraph.lib.flow_policy.FlowPolicy`/`FlowPolicyConfig`/
//! `get_flow_policy`.

use super::Flow;
use crate::error::{Error, Result};
use crate::graph::{spf, EdgeSelect, Graph, PathBundle};
use crate::types::{Cost, EdgeId, FlowIndex, FlowPlacement, NodeId, MIN_FLOW};
use indexmap::IndexMap;
use std::collections::{HashSet, VecDeque};

/// One of this crate's five pre-tuned [`FlowPolicyConfig`] presets, mirroring
/// `ngraph.lib.flow_policy.FlowPolicyConfig` (an `IntEnum` there; a plain
/// tagged enum here since the core never serializes it by ordinal).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowPolicyPreset {
    /// Hop-by-hop ECMP, e.g. IP forwarding with equal-cost multipath.
    ShortestPathsEcmp,
    /// Hop-by-hop UCMP: shortest paths with capacity-proportional splitting.
    ShortestPathsUcmp,
    /// "Ideal" traffic engineering: unlimited proportional LSPs following
    /// capacity-aware shortest paths.
    TeUcmpUnlim,
    /// Traffic engineering with up to 256 load-factored LSPs, re-optimized
    /// after every placement.
    TeEcmpUpTo256Lsp,
    /// Traffic engineering with exactly 16 load-factored LSPs, re-optimized
    /// after every placement.
    TeEcmp16Lsp,
}

/// Configuration for a [`FlowPolicy`]: path algorithm is fixed to SPF (the
/// only one this core implements), so the knobs that remain are flow
/// placement discipline, edge selection strategy, and the flow-count/cost
/// bounds described in spec §3.
#[derive(Debug, Clone)]
pub struct FlowPolicyConfig {
    /// How flow is split among the parallel paths/edges of a placement.
    pub flow_placement: FlowPlacement,
    /// The edge selection strategy driving SPF's path expansion.
    pub edge_select: EdgeSelect,
    /// Whether SPF records equal-cost multipath predecessors.
    pub multipath: bool,
    /// The minimum number of flows to create for a demand (default 1).
    pub min_flow_count: usize,
    /// The maximum number of flows allowed for a demand, if any.
    pub max_flow_count: Option<usize>,
    /// Absolute limit on allowable path cost.
    pub max_path_cost: Option<Cost>,
    /// Relative factor limit, multiplying the best path cost seen so far.
    pub max_path_cost_factor: Option<f64>,
    /// If set, flows are pinned onto these bundles rather than discovered
    /// via path-finding.
    pub static_paths: Option<Vec<PathBundle>>,
    /// Additional parameter interpreted per `EdgeSelect` variant (typically
    /// a capacity threshold overriding `MIN_CAP`).
    pub edge_select_value: Option<f64>,
    /// If true, every flow is re-run through path-finding after each
    /// `place_demand` call to seek a fresh solution.
    pub reoptimize_flows_on_each_placement: bool,
}

impl FlowPolicyConfig {
    /// Start a configuration with the given placement/selection strategy
    /// and every other knob at its default (`min_flow_count = 1`, no
    /// bounds, no static paths, no forced re-optimization).
    pub fn new(flow_placement: FlowPlacement, edge_select: EdgeSelect, multipath: bool) -> Self {
        Self {
            flow_placement,
            edge_select,
            multipath,
            min_flow_count: 1,
            max_flow_count: None,
            max_path_cost: None,
            max_path_cost_factor: None,
            static_paths: None,
            edge_select_value: None,
            reoptimize_flows_on_each_placement: false,
        }
    }

    /// Builder: override `min_flow_count`.
    pub fn with_min_flow_count(mut self, n: usize) -> Self {
        self.min_flow_count = n;
        self
    }

    /// Builder: set `max_flow_count`.
    pub fn with_max_flow_count(mut self, n: usize) -> Self {
        self.max_flow_count = Some(n);
        self
    }

    /// Builder: set an absolute `max_path_cost`.
    pub fn with_max_path_cost(mut self, cost: Cost) -> Self {
        self.max_path_cost = Some(cost);
        self
    }

    /// Builder: set a relative `max_path_cost_factor`.
    pub fn with_max_path_cost_factor(mut self, factor: f64) -> Self {
        self.max_path_cost_factor = Some(factor);
        self
    }

    /// Builder: pin this policy to a fixed list of static paths.
    pub fn with_static_paths(mut self, paths: Vec<PathBundle>) -> Self {
        self.static_paths = Some(paths);
        self
    }

    /// Builder: set `edge_select_value`.
    pub fn with_edge_select_value(mut self, value: f64) -> Self {
        self.edge_select_value = Some(value);
        self
    }

    /// Builder: enable re-optimization of every flow after each placement.
    pub fn with_reoptimize_flows_on_each_placement(mut self, enabled: bool) -> Self {
        self.reoptimize_flows_on_each_placement = enabled;
        self
    }

    /// Build the configuration matching one of the five named presets of
    /// spec §4.9.
    pub fn from_preset(preset: FlowPolicyPreset) -> Self {
        match preset {
            FlowPolicyPreset::ShortestPathsEcmp => {
                Self::new(FlowPlacement::EqualBalanced, EdgeSelect::AllMinCost, true)
                    .with_max_flow_count(1)
            }
            FlowPolicyPreset::ShortestPathsUcmp => {
                Self::new(FlowPlacement::Proportional, EdgeSelect::AllMinCost, true)
                    .with_max_flow_count(1)
            }
            FlowPolicyPreset::TeUcmpUnlim => Self::new(
                FlowPlacement::Proportional,
                EdgeSelect::AllMinCostWithCapRemaining,
                false,
            ),
            FlowPolicyPreset::TeEcmpUpTo256Lsp => Self::new(
                FlowPlacement::EqualBalanced,
                EdgeSelect::SingleMinCostWithCapRemainingLoadFactored,
                false,
            )
            .with_max_flow_count(256)
            .with_reoptimize_flows_on_each_placement(true),
            FlowPolicyPreset::TeEcmp16Lsp => Self::new(
                FlowPlacement::EqualBalanced,
                EdgeSelect::SingleMinCostWithCapRemainingLoadFactored,
                false,
            )
            .with_min_flow_count(16)
            .with_max_flow_count(16)
            .with_reoptimize_flows_on_each_placement(true),
        }
    }
}

const POLICY_LOOP_GUARD: u32 = 10_000;

/// Stateful collection of [`Flow`]s realizing a demand, per a
/// [`FlowPolicyConfig`] (§3, §4.9).
#[derive(Debug, Clone)]
pub struct FlowPolicy {
    config: FlowPolicyConfig,
    flows: IndexMap<FlowIndex, Flow>,
    best_path_cost: Option<Cost>,
    next_flow_id: u64,
}

impl FlowPolicy {
    /// Construct a policy from `config`, validating the invariants of
    /// spec §3: `static_paths` length must agree with an explicitly set
    /// `max_flow_count`, and `EQUAL_BALANCED` placement requires
    /// `max_flow_count` to be set.
    ///
    /// # Errors
    /// Returns [`Error::InvalidSelectorConfig`] if either invariant is
    /// violated.
    pub fn new(mut config: FlowPolicyConfig) -> Result<Self> {
        if let Some(paths) = &config.static_paths {
            if !paths.is_empty() {
                if let Some(max) = config.max_flow_count {
                    if max != paths.len() {
                        return Err(Error::InvalidSelectorConfig(
                            "max_flow_count must equal the number of static paths".to_string(),
                        ));
                    }
                }
                config.max_flow_count = Some(paths.len());
            }
        }
        if config.flow_placement == FlowPlacement::EqualBalanced && config.max_flow_count.is_none()
        {
            return Err(Error::InvalidSelectorConfig(
                "max_flow_count must be set for EQUAL_BALANCED placement".to_string(),
            ));
        }

        Ok(Self {
            config,
            flows: IndexMap::new(),
            best_path_cost: None,
            next_flow_id: 0,
        })
    }

    /// This policy's configuration.
    pub fn config(&self) -> &FlowPolicyConfig {
        &self.config
    }

    /// Number of flows currently tracked by this policy.
    pub fn flow_count(&self) -> usize {
        self.flows.len()
    }

    /// Sum of all placed flow volumes across all tracked flows.
    pub fn placed_demand(&self) -> f64 {
        self.flows.values().map(Flow::placed_flow).sum()
    }

    /// Read-only access to the tracked flows, keyed by [`FlowIndex`].
    pub fn flows(&self) -> &IndexMap<FlowIndex, Flow> {
        &self.flows
    }

    fn get_path_bundle(
        &mut self,
        graph: &Graph,
        src: &NodeId,
        dst: &NodeId,
        min_flow: Option<f64>,
        excluded_edges: &HashSet<EdgeId>,
        excluded_nodes: &HashSet<NodeId>,
    ) -> Result<Option<PathBundle>> {
        let capacity_threshold = min_flow.or(self.config.edge_select_value);
        let (costs, pred) = spf(
            graph,
            src,
            &self.config.edge_select,
            self.config.multipath,
            excluded_edges,
            excluded_nodes,
            capacity_threshold,
        )?;

        if !pred.contains_key(dst) {
            return Ok(None);
        }
        let dst_cost = costs[dst];
        if self.best_path_cost.is_none() {
            self.best_path_cost = Some(dst_cost);
        }

        if self.config.max_path_cost.is_some() || self.config.max_path_cost_factor.is_some() {
            let factor = self.config.max_path_cost_factor.unwrap_or(1.0);
            let max_cost = self.config.max_path_cost.unwrap_or(Cost::INFINITY);
            let bound = max_cost.min(self.best_path_cost.expect("set just above") * factor);
            if dst_cost > bound {
                return Ok(None);
            }
        }

        Ok(Some(PathBundle::new(src.clone(), dst.clone(), &pred, dst_cost)))
    }

    #[allow(clippy::too_many_arguments)]
    fn create_flow(
        &mut self,
        graph: &Graph,
        src: &NodeId,
        dst: &NodeId,
        flow_class: i32,
        min_flow: Option<f64>,
        path_bundle: Option<PathBundle>,
        excluded_edges: HashSet<EdgeId>,
        excluded_nodes: HashSet<NodeId>,
    ) -> Result<Option<FlowIndex>> {
        let bundle = match path_bundle {
            Some(b) => Some(b),
            None => self.get_path_bundle(graph, src, dst, min_flow, &excluded_edges, &excluded_nodes)?,
        };
        let Some(bundle) = bundle else {
            return Ok(None);
        };

        let flow_index = FlowIndex {
            src: src.clone(),
            dst: dst.clone(),
            flow_class,
            seq: self.next_flow_id,
        };
        self.next_flow_id += 1;

        let flow = Flow::new(bundle, flow_index.clone(), excluded_edges, excluded_nodes);
        self.flows.insert(flow_index.clone(), flow);
        Ok(Some(flow_index))
    }

    fn create_initial_flows(
        &mut self,
        graph: &Graph,
        src: &NodeId,
        dst: &NodeId,
        flow_class: i32,
        min_flow: Option<f64>,
    ) -> Result<()> {
        if let Some(static_paths) = self.config.static_paths.clone() {
            for bundle in static_paths {
                if bundle.src_node() != src || bundle.dst_node() != dst {
                    return Err(Error::InvalidSelectorConfig(
                        "source and destination of static paths do not match demand".to_string(),
                    ));
                }
                self.create_flow(
                    graph,
                    src,
                    dst,
                    flow_class,
                    min_flow,
                    Some(bundle),
                    HashSet::new(),
                    HashSet::new(),
                )?;
            }
        } else {
            for _ in 0..self.config.min_flow_count {
                self.create_flow(
                    graph,
                    src,
                    dst,
                    flow_class,
                    min_flow,
                    None,
                    HashSet::new(),
                    HashSet::new(),
                )?;
            }
        }
        Ok(())
    }

    fn reoptimize_flow(
        &mut self,
        graph: &mut Graph,
        flow_index: &FlowIndex,
        headroom: f64,
    ) -> Result<Option<FlowIndex>> {
        let flow = self
            .flows
            .get_mut(flow_index)
            .expect("caller always passes a tracked flow_index");
        let flow_volume = flow.placed_flow();
        let new_min_volume = flow_volume + headroom;
        flow.remove_flow(graph);

        let src = flow.path_bundle().src_node().clone();
        let dst = flow.path_bundle().dst_node().clone();
        let excluded_edges = flow.excluded_edges().clone();
        let excluded_nodes = flow.excluded_nodes().clone();
        let old_edges = flow.path_bundle().edges().clone();

        let candidate =
            self.get_path_bundle(graph, &src, &dst, Some(new_min_volume), &excluded_edges, &excluded_nodes)?;

        let flow = self
            .flows
            .get_mut(flow_index)
            .expect("flow_index still tracked across get_path_bundle");

        match candidate {
            Some(bundle) if bundle.edges() != &old_edges => {
                let mut new_flow = Flow::new(bundle, flow_index.clone(), excluded_edges, excluded_nodes);
                new_flow.place_flow(graph, flow_volume, self.config.flow_placement)?;
                self.flows.insert(flow_index.clone(), new_flow);
                Ok(Some(flow_index.clone()))
            }
            _ => {
                // no strictly better path: revert to the old bundle at its
                // previously placed volume.
                flow.place_flow(graph, flow_volume, self.config.flow_placement)?;
                Ok(None)
            }
        }
    }

    /// Place `volume` units of demand `(src, dst, flow_class)` on `graph`,
    /// creating, filling, and (if permitted) re-optimizing flows as needed
    /// (§4.9 step-by-step algorithm).
    ///
    /// Returns `(placed, remaining)`.
    ///
    /// # Errors
    /// Returns [`Error::PolicyLoop`] if the internal placement loop exceeds
    /// its iteration guard (a misconfigured policy that never converges),
    /// or propagates errors from path-finding/placement.
    pub fn place_demand(
        &mut self,
        graph: &mut Graph,
        src: &NodeId,
        dst: &NodeId,
        flow_class: i32,
        mut volume: f64,
        target_flow_volume: Option<f64>,
        min_flow: Option<f64>,
    ) -> Result<(f64, f64)> {
        if self.flows.is_empty() {
            self.create_initial_flows(graph, src, dst, flow_class, min_flow)?;
        }

        let mut flow_queue: VecDeque<FlowIndex> = self.flows.keys().cloned().collect();
        let target = target_flow_volume.unwrap_or(volume);

        let mut total_placed = 0.0;
        let mut iterations: u32 = 0;

        while volume >= MIN_FLOW && !flow_queue.is_empty() {
            let flow_index = flow_queue.pop_front().expect("checked non-empty above");
            let to_place = target.min(volume);

            let flow = self
                .flows
                .get_mut(&flow_index)
                .expect("flow popped from our own queue is always tracked");
            let (placed, _) = flow.place_flow(graph, to_place, self.config.flow_placement)?;
            volume -= placed;
            total_placed += placed;

            let flow_placed = self.flows[&flow_index].placed_flow();
            if target - flow_placed >= MIN_FLOW && self.config.static_paths.is_none() {
                let under_max = match self.config.max_flow_count {
                    Some(max) => self.flows.len() < max,
                    None => true,
                };
                let new_flow_index = if under_max {
                    self.create_flow(
                        graph,
                        src,
                        dst,
                        flow_class,
                        None,
                        None,
                        HashSet::new(),
                        HashSet::new(),
                    )?
                } else {
                    self.reoptimize_flow(graph, &flow_index, MIN_FLOW)?
                };
                if let Some(idx) = new_flow_index {
                    flow_queue.push_back(idx);
                }
            }

            iterations += 1;
            if iterations > POLICY_LOOP_GUARD {
                tracing::warn!(src = %src, dst = %dst, flow_class, "flow policy exceeded iteration guard");
                return Err(Error::PolicyLoop {
                    limit: POLICY_LOOP_GUARD,
                });
            }
        }

        if self.config.flow_placement == FlowPlacement::EqualBalanced && !self.flows.is_empty() {
            let target_flow_volume = self.placed_demand() / self.flows.len() as f64;
            let needs_rebalance = self
                .flows
                .values()
                .any(|f| (target_flow_volume - f.placed_flow()).abs() >= MIN_FLOW);
            if needs_rebalance {
                let (placed, excess) =
                    self.rebalance_demand(graph, src, dst, flow_class, target_flow_volume)?;
                total_placed = placed;
                volume += excess;
            }
        }

        if self.config.reoptimize_flows_on_each_placement {
            let indices: Vec<FlowIndex> = self.flows.keys().cloned().collect();
            for idx in indices {
                self.reoptimize_flow(graph, &idx, 0.0)?;
            }
        }

        tracing::debug!(src = %src, dst = %dst, flow_class, total_placed, "placed demand");
        Ok((total_placed, volume))
    }

    /// Re-balance an already-placed `EQUAL_BALANCED` demand toward
    /// `target_flow_volume` per flow: removes every flow's graph
    /// contribution and re-enters [`place_demand`](Self::place_demand)
    /// with the saved aggregate volume.
    ///
    /// # Errors
    /// Propagates errors from [`place_demand`](Self::place_demand).
    pub fn rebalance_demand(
        &mut self,
        graph: &mut Graph,
        src: &NodeId,
        dst: &NodeId,
        flow_class: i32,
        target_flow_volume: f64,
    ) -> Result<(f64, f64)> {
        let volume = self.placed_demand();
        self.remove_demand(graph);
        self.place_demand(graph, src, dst, flow_class, volume, Some(target_flow_volume), None)
    }

    /// Zero every tracked flow's contribution to `graph`, keeping the
    /// `Flow` objects (and their path bundles) for subsequent re-placement.
    pub fn remove_demand(&mut self, graph: &mut Graph) {
        for flow in self.flows.values_mut() {
            flow.remove_flow(graph);
        }
    }
}

/// Build a [`FlowPolicy`] pre-configured for one of the named presets of
/// spec §4.9. Presets are internally consistent by construction, so this
/// never fails.
pub fn get_flow_policy(preset: FlowPolicyPreset) -> FlowPolicy {
    FlowPolicy::new(FlowPolicyConfig::from_preset(preset))
        .expect("built-in presets satisfy FlowPolicy's configuration invariants")
}
