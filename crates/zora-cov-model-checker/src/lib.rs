//! Coverage-based symbolic reachability for timed automata
//!
//! This crate implements the reachability checker on top of the zone graph:
//! a subsumption graph deduplicates symbolic states under the coverage
//! order, a waiting set drives the exploration in BFS or DFS order, and the
//! [`run`] entry point answers whether a state carrying a given set of
//! labels is reachable.
//!
//! ```
//! use std::rc::Rc;
//! use zora_cov_model_checker::{run, CoveringPolicy, SearchOrder};
//! use zora_timed_automaton::builder::{LocationBuilder, SystemBuilder};
//!
//! let system = SystemBuilder::new("sys")
//!     .with_process("P").unwrap()
//!     .initialize()
//!     .with_location("P", "l0", LocationBuilder::new().initial().with_label("hit")).unwrap()
//!     .build();
//!
//! let outcome = run(
//!     Rc::new(system),
//!     "hit",
//!     SearchOrder::Bfs,
//!     CoveringPolicy::Full,
//!     128,
//!     1024,
//! ).unwrap();
//! assert!(outcome.stats.reached);
//! ```

use std::fmt;
use std::rc::Rc;

use log::warn;

use zora_timed_automaton::static_analysis::every_process_has_initial_location;
use zora_timed_automaton::system::System;
use zora_zone_graph::{
    Extrapolation, ReferenceClocks, Semantics, ZoneGraph, ZoneGraphError,
};

pub mod algorithm;
pub mod dot;
pub mod graph;
pub mod waiting;

pub use algorithm::{CoverageAlgorithm, CoveringPolicy, Stats};
pub use dot::dot_output;
pub use graph::{Edge, EdgeKind, Node, NodeRef, SubsumptionGraph};
pub use waiting::{SearchOrder, WaitingSet};

/// Configuration error aborting a reachability run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunError {
    /// The zone graph could not be constructed
    ZoneGraph(ZoneGraphError),
}

impl fmt::Display for RunError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunError::ZoneGraph(e) => write!(f, "cannot build the zone graph: {e}"),
        }
    }
}

impl std::error::Error for RunError {}

impl From<ZoneGraphError> for RunError {
    fn from(value: ZoneGraphError) -> Self {
        RunError::ZoneGraph(value)
    }
}

/// Result of a reachability run
///
/// The zone graph is returned along with the subsumption graph: rendering
/// node attributes needs the system and the pools that built the states.
pub struct RunOutcome {
    /// Statistics of the run, including the reachability verdict
    pub stats: Stats,
    /// The subsumption graph built by the exploration
    pub graph: SubsumptionGraph,
    /// The zone graph the exploration ran on
    pub zone_graph: ZoneGraph,
}

/// Decide whether a state carrying all the given labels is reachable
///
/// `labels` is a comma-separated list of label names and denotes the set a
/// reached state must carry: the empty string denotes the empty set, which
/// every valid state matches, and a name the system never declares can
/// match no state, so the run explores the whole graph and reports
/// unreachable. `block_size` and `table_size` configure the pools and hash
/// tables. The exploration uses the elapsed zone semantics with ExtraLU+
/// extrapolation.
pub fn run(
    system: Rc<System>,
    labels: &str,
    search_order: SearchOrder,
    covering: CoveringPolicy,
    block_size: usize,
    table_size: usize,
) -> Result<RunOutcome, RunError> {
    run_with_stop(
        system,
        labels,
        search_order,
        covering,
        block_size,
        table_size,
        || false,
    )
}

/// [`run`] with a cancellation probe checked once per expanded node
#[allow(clippy::too_many_arguments)]
pub fn run_with_stop(
    system: Rc<System>,
    labels: &str,
    search_order: SearchOrder,
    covering: CoveringPolicy,
    block_size: usize,
    table_size: usize,
    should_stop: impl Fn() -> bool,
) -> Result<RunOutcome, RunError> {
    if !every_process_has_initial_location(&system) {
        warn!("system has no initial state");
    }

    let mut accepting = Some(system.empty_label_set());
    for name in labels.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        match system.label(name) {
            Some(label) => {
                if let Some(set) = accepting.as_mut() {
                    set.set(label.0, true);
                }
            }
            None => {
                // A label no location carries cannot be matched; the run
                // still explores the graph and reports unreachable.
                warn!("label '{name}' does not appear in the system");
                accepting = None;
            }
        }
    }

    let mut zone_graph = ZoneGraph::new(
        system,
        Semantics::Elapsed,
        Extrapolation::ExtraLuPlusLocal,
        ReferenceClocks::sequential(),
        block_size,
        table_size,
    )?;
    let mut graph = SubsumptionGraph::new(table_size);

    let stats = CoverageAlgorithm::new(
        &mut zone_graph,
        &mut graph,
        accepting,
        search_order,
        covering,
    )
    .run(should_stop);

    Ok(RunOutcome {
        stats,
        graph,
        zone_graph,
    })
}
