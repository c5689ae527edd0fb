//! Flow policy and demand placement (§4.9): turning a `(src, dst, volume)`
//! traffic-matrix entry into a managed set of flows on a [`crate::graph::Graph`].

mod demand;
mod flow;
mod flow_policy;

pub use demand::{Demand, DemandStatus};
pub use flow::Flow;
pub use flow_policy::{get_flow_policy, FlowPolicy, FlowPolicyConfig, FlowPolicyPreset};
