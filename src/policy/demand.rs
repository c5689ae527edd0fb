//! `Demand`: a traffic matrix entry realized on a graph through an attached
//! [`FlowPolicy`] (§4.9 data model).
//!
//! Grounded on `ngraph.lib.demand.Demand`/`DemandStatus`.

use super::FlowPolicy;
use crate::error::{Error, Result};
use crate::graph::Graph;
use crate::types::{NodeId, MIN_FLOW};

/// How much of a [`Demand`]'s requested volume has been placed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DemandStatus {
    /// Nothing has been placed yet.
    NotPlaced,
    /// Some, but not all, of the requested volume has been placed.
    Partial,
    /// The entire requested volume has been placed.
    Placed,
}

/// A single entry of a traffic matrix: route `volume` units from `src` to
/// `dst`, tagged with `demand_class`, using an attached [`FlowPolicy`] to
/// find and place paths.
#[derive(Debug, Clone)]
pub struct Demand {
    src: NodeId,
    dst: NodeId,
    volume: f64,
    demand_class: i32,
    placed_demand: f64,
    policy: Option<FlowPolicy>,
}

impl Demand {
    /// Construct a new, unplaced demand with no policy attached.
    pub fn new(src: impl Into<NodeId>, dst: impl Into<NodeId>, volume: f64, demand_class: i32) -> Self {
        Self {
            src: src.into(),
            dst: dst.into(),
            volume,
            demand_class,
            placed_demand: 0.0,
            policy: None,
        }
    }

    /// The demand's source node.
    pub fn src_node(&self) -> &NodeId {
        &self.src
    }

    /// The demand's destination node.
    pub fn dst_node(&self) -> &NodeId {
        &self.dst
    }

    /// The total volume this demand requests.
    pub fn volume(&self) -> f64 {
        self.volume
    }

    /// The demand's class tag, used to distinguish co-located demands and
    /// to key the flows a policy creates for it.
    pub fn demand_class(&self) -> i32 {
        self.demand_class
    }

    /// Volume placed on the graph so far.
    pub fn placed_demand(&self) -> f64 {
        self.placed_demand
    }

    /// Attach (or replace) the [`FlowPolicy`] this demand will use to place
    /// its volume.
    pub fn attach_policy(&mut self, policy: FlowPolicy) {
        self.policy = Some(policy);
    }

    /// Read-only access to the attached policy, if any.
    pub fn policy(&self) -> Option<&FlowPolicy> {
        self.policy.as_ref()
    }

    /// Mutable access to the attached policy, if any.
    pub fn policy_mut(&mut self) -> Option<&mut FlowPolicy> {
        self.policy.as_mut()
    }

    /// Derive this demand's placement status from `placed_demand` versus
    /// `volume`, within the [`MIN_FLOW`] tolerance band (§3).
    pub fn status(&self) -> DemandStatus {
        if self.placed_demand < MIN_FLOW {
            DemandStatus::NotPlaced
        } else if self.volume - self.placed_demand < MIN_FLOW {
            DemandStatus::Placed
        } else {
            DemandStatus::Partial
        }
    }

    /// Place up to `max_placement` (or the full remaining volume if
    /// `None`) units of this demand on `graph`, honoring `max_fraction`: a
    /// value in `(0, 1]` caps the attempted volume to that fraction of the
    /// demand's total `volume`. `0.0` places the entire volume at once for
    /// an infinite-volume demand, and nothing for a finite one.
    ///
    /// Returns `(placed, remaining)`.
    ///
    /// # Errors
    /// Returns [`Error::NoPolicyAttached`] if no policy has been attached
    /// via [`attach_policy`](Self::attach_policy). Propagates errors from
    /// the underlying policy placement.
    pub fn place(
        &mut self,
        graph: &mut Graph,
        max_fraction: f64,
        max_placement: Option<f64>,
    ) -> Result<(f64, f64)> {
        let Some(policy) = self.policy.as_mut() else {
            return Err(Error::NoPolicyAttached);
        };

        let mut to_place = self.volume - self.placed_demand;
        if let Some(cap) = max_placement {
            to_place = to_place.min(cap);
        }
        let to_place = if max_fraction > 0.0 {
            to_place.min(self.volume * max_fraction)
        } else if self.volume.is_infinite() {
            self.volume
        } else {
            0.0
        };

        let (placed, remaining) = policy.place_demand(
            graph,
            &self.src,
            &self.dst,
            self.demand_class,
            to_place,
            None,
            None,
        )?;
        self.placed_demand += placed;

        tracing::debug!(
            src = %self.src,
            dst = %self.dst,
            demand_class = self.demand_class,
            placed,
            status = ?self.status(),
            "placed demand"
        );
        Ok((placed, remaining))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{EdgeAttrs, EdgeSelect};
    use crate::policy::FlowPolicyConfig;
    use crate::types::FlowPlacement;

    fn line_graph() -> Graph {
        let mut g = Graph::new();
        g.add_node("A").unwrap();
        g.add_node("B").unwrap();
        g.add_edge("A", "B", EdgeAttrs::new(1.0, 10.0), None).unwrap();
        g
    }

    #[test]
    fn unplaced_demand_has_not_placed_status() {
        let demand = Demand::new("A", "B", 5.0, 0);
        assert_eq!(demand.status(), DemandStatus::NotPlaced);
    }

    #[test]
    fn placing_without_a_policy_errors() {
        let mut g = line_graph();
        let mut demand = Demand::new("A", "B", 5.0, 0);
        let err = demand.place(&mut g, 1.0, None).unwrap_err();
        assert_eq!(err, Error::NoPolicyAttached);
    }

    #[test]
    fn full_placement_reaches_placed_status() {
        let mut g = line_graph();
        let mut demand = Demand::new("A", "B", 5.0, 0);
        let config = FlowPolicyConfig::new(FlowPlacement::Proportional, EdgeSelect::AllMinCostWithCapRemaining, true);
        demand.attach_policy(FlowPolicy::new(config).unwrap());

        let (placed, remaining) = demand.place(&mut g, 1.0, None).unwrap();
        assert_eq!(placed, 5.0);
        assert_eq!(remaining, 0.0);
        assert_eq!(demand.status(), DemandStatus::Placed);
    }

    #[test]
    fn partial_placement_when_capacity_constrained() {
        let mut g = line_graph();
        let mut demand = Demand::new("A", "B", 20.0, 0);
        let config = FlowPolicyConfig::new(FlowPlacement::Proportional, EdgeSelect::AllMinCostWithCapRemaining, true);
        demand.attach_policy(FlowPolicy::new(config).unwrap());

        demand.place(&mut g, 1.0, None).unwrap();
        assert_eq!(demand.status(), DemandStatus::Partial);
        assert_eq!(demand.placed_demand(), 10.0);
    }

    #[test]
    fn max_fraction_caps_by_total_volume_not_remaining() {
        let mut g = line_graph();
        let mut demand = Demand::new("A", "B", 10.0, 0);
        let config = FlowPolicyConfig::new(FlowPlacement::Proportional, EdgeSelect::AllMinCostWithCapRemaining, true);
        demand.attach_policy(FlowPolicy::new(config).unwrap());

        // First call places 4 units, leaving 6 remaining of a volume of 10.
        demand.place(&mut g, 0.4, None).unwrap();
        assert_eq!(demand.placed_demand(), 4.0);

        // A second call at max_fraction=0.5 is capped by 0.5 * volume (5),
        // not 0.5 * remaining (3): min(remaining=6, volume*0.5=5) = 5.
        let (placed, remaining) = demand.place(&mut g, 0.5, None).unwrap();
        assert_eq!(placed, 5.0);
        assert_eq!(remaining, 0.0);
        assert_eq!(demand.placed_demand(), 9.0);
    }

    #[test]
    fn zero_max_fraction_places_nothing_for_finite_volume() {
        let mut g = line_graph();
        let mut demand = Demand::new("A", "B", 5.0, 0);
        let config = FlowPolicyConfig::new(FlowPlacement::Proportional, EdgeSelect::AllMinCostWithCapRemaining, true);
        demand.attach_policy(FlowPolicy::new(config).unwrap());

        let (placed, remaining) = demand.place(&mut g, 0.0, None).unwrap();
        assert_eq!(placed, 0.0);
        assert_eq!(remaining, 0.0);
        assert_eq!(demand.status(), DemandStatus::NotPlaced);
    }

    #[test]
    fn zero_max_fraction_places_everything_for_infinite_volume() {
        let mut g = line_graph();
        let mut demand = Demand::new("A", "B", f64::INFINITY, 0);
        let config = FlowPolicyConfig::new(FlowPlacement::Proportional, EdgeSelect::AllMinCostWithCapRemaining, true);
        demand.attach_policy(FlowPolicy::new(config).unwrap());

        let (placed, _remaining) = demand.place(&mut g, 0.0, None).unwrap();
        assert_eq!(placed, 10.0);
        assert_eq!(demand.status(), DemandStatus::Partial);
    }
}
