//! Zone graph semantics over networks of timed automata
//!
//! This crate composes the discrete semantics of `zora-timed-automaton` with
//! the zone algebra of `zora-dbm` into a symbolic transition system:
//!
//! - [`pool::SharedPool`]: hash-consing allocation of state components,
//! - [`state::ZgState`] / [`state::ZgTransition`]: symbolic states
//!   `(vloc, intval, zone)` and transitions built from shared components,
//! - [`semantics::Semantics`]: the elapsed / non-elapsed time strategies,
//!   finished by a [`semantics::Extrapolation`],
//! - [`zone_graph::ZoneGraph`]: the composed transition system consumed by
//!   the reachability algorithm.

pub mod pool;
pub mod semantics;
pub mod state;
pub mod zone_graph;

pub use pool::SharedPool;
pub use semantics::{Extrapolation, Semantics};
pub use state::{ZgState, ZgTransition};
pub use zone_graph::{ReferenceClocks, ZoneGraph, ZoneGraphError};
