//! # converge-netflow
//!
//! A network flow engine core for the converge platform: a directed
//! multigraph with stable, never-reused edge ids, shortest-path and
//! k-shortest-paths search (SPF/Yen's), capacity calculation (Dinic's/
//! equal-balanced), flow placement, max-flow, and a flow-policy layer that
//! turns a `(src, dst, volume)` traffic demand into a managed set of flows.
//!
//! ## Modules
//!
//! - [`graph`] - the graph data model, path search (SPF/KSP), capacity
//!   calculation, flow placement, and max-flow/flow-summary analytics.
//! - [`policy`] - `FlowPolicy`/`Demand`: placing traffic demands across a
//!   graph under ECMP/UCMP and traffic-engineering disciplines.
//!
//! ## Quick Start
//!
//! ```rust
//! use converge_netflow::prelude::*;
//!
//! let mut g = Graph::new();
//! g.add_node("A").unwrap();
//! g.add_node("B").unwrap();
//! g.add_edge("A", "B", converge_netflow::graph::EdgeAttrs::new(1.0, 10.0), None).unwrap();
//!
//! let result = converge_netflow::graph::calc_max_flow(
//!     &mut g,
//!     &NodeId::from("A"),
//!     &NodeId::from("B"),
//!     &converge_netflow::graph::MaxFlowOptions::default(),
//! )
//! .unwrap();
//! assert_eq!(result.total_flow, 10.0);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod graph;
pub mod policy;

mod error;
mod types;

pub use error::{Error, Result};
pub use types::*;

/// Prelude for common imports.
pub mod prelude {
    pub use crate::graph::{EdgeSelect, Graph};
    pub use crate::policy::{Demand, FlowPolicy, FlowPolicyConfig};
    pub use crate::types::{Cost, EdgeId, FlowPlacement, NodeId};
    pub use crate::Error;
    pub use crate::Result;
}
