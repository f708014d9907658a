//! Coverage reachability over the zone graph
//!
//! The algorithm drives the zone graph from its initial states through a
//! waiting set, maintaining the subsumption graph as the set of
//! representative symbolic states. A freshly computed state that is covered
//! by a stored node is not expanded; under the full covering policy, stored
//! nodes covered by a new state are removed so the graph stays an antichain
//! under strict subsumption.
//!
//! Termination of the loop follows from the extrapolation: per discrete
//! part only finitely many extrapolated zones exist, and covered states are
//! never re-inserted.

use std::fmt;
use std::rc::Rc;
use std::time::Instant;

use bitvec::vec::BitVec;
use log::{debug, info};
use serde::Serialize;

use zora_timed_automaton::state::Vedge;
use zora_zone_graph::{ZgState, ZgTransition, ZoneGraph};

use crate::graph::{EdgeKind, NodeRef, SubsumptionGraph};
use crate::waiting::{SearchOrder, WaitingSet};

/// Policy deciding which stored nodes a new state may cover
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CoveringPolicy {
    /// New states cover stored nodes: covered nodes are removed and their
    /// predecessors are redirected, keeping the graph an antichain
    Full,
    /// Only leaf nodes are checked for coverage, once, when popped
    LeafNodes,
}

/// Statistics of one reachability run
#[derive(Debug, Clone, Default, Serialize)]
pub struct Stats {
    /// Number of nodes expanded
    pub visited_states: u64,
    /// Number of nodes stored in the subsumption graph when the run ended
    pub stored_states: u64,
    /// Total number of states discarded by coverage
    pub covered_states: u64,
    /// States covered by a stored node at insertion time, plus stored nodes
    /// covered by a new state under the full policy
    pub covered_on_insert: u64,
    /// Nodes found covered when popped under the leaf policy
    pub covered_on_pop: u64,
    /// Wall time of the run in milliseconds
    pub time_ms: u64,
    /// Whether a state carrying the accepting labels was reached
    pub reached: bool,
    /// Whether the run was stopped by the caller's probe
    pub cancelled: bool,
}

impl fmt::Display for Stats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "REACHABLE {}", self.reached)?;
        writeln!(f, "STORED_STATES {}", self.stored_states)?;
        writeln!(f, "VISITED_STATES {}", self.visited_states)?;
        writeln!(f, "COVERED_STATES {}", self.covered_states)?;
        write!(f, "RUNNING_TIME_MS {}", self.time_ms)
    }
}

/// Coverage reachability algorithm
///
/// One instance runs one query; the subsumption graph is built in place and
/// returned to the caller through the borrow.
pub struct CoverageAlgorithm<'a> {
    zone_graph: &'a mut ZoneGraph,
    graph: &'a mut SubsumptionGraph,
    waiting: WaitingSet,
    policy: CoveringPolicy,
    /// Accepting label set; `None` when the query names a label the system
    /// does not carry, which no state can match
    accepting: Option<BitVec>,
    stats: Stats,
}

impl<'a> CoverageAlgorithm<'a> {
    /// Create an algorithm instance over a zone graph and an empty
    /// subsumption graph
    pub fn new(
        zone_graph: &'a mut ZoneGraph,
        graph: &'a mut SubsumptionGraph,
        accepting: Option<BitVec>,
        search_order: SearchOrder,
        policy: CoveringPolicy,
    ) -> Self {
        CoverageAlgorithm {
            zone_graph,
            graph,
            waiting: WaitingSet::new(search_order),
            policy,
            accepting,
            stats: Stats::default(),
        }
    }

    /// Run the exploration to completion
    ///
    /// `should_stop` is probed once per popped node; when it returns true
    /// the run stops with the partial graph and the `cancelled` flag set.
    pub fn run(mut self, should_stop: impl Fn() -> bool) -> Stats {
        let start = Instant::now();

        for vloc in self.zone_graph.initial_edges() {
            match self.zone_graph.initial(vloc) {
                Ok((state, transition)) => self.handle(state, transition, None, true),
                Err(status) => {
                    debug!("initial state discarded: {status}");
                }
            }
        }

        while let Some(node) = self.waiting.pop() {
            if should_stop() {
                self.stats.cancelled = true;
                break;
            }

            if self.policy == CoveringPolicy::LeafNodes {
                let state = node.borrow().state().clone();
                if let Some(covering) = self.graph.lookup_covering_excluding(&state, &node) {
                    self.graph.add_edge(
                        &node,
                        &covering,
                        EdgeKind::Abstract,
                        Rc::new(Vedge::empty()),
                    );
                    self.stats.covered_on_pop += 1;
                    continue;
                }
            }

            self.stats.visited_states += 1;

            if self.is_accepting(&node) {
                self.graph.mark_final(&node);
                self.stats.reached = true;
                break;
            }

            let state = node.borrow().state().clone();
            for vedge in self.zone_graph.outgoing_edges(&state) {
                match self.zone_graph.next(&state, vedge) {
                    Ok((successor, transition)) => {
                        self.handle(successor, transition, Some(&node), false)
                    }
                    Err(status) => {
                        debug!("transition discarded: {status}");
                    }
                }
            }
        }

        self.stats.stored_states = self.graph.len() as u64;
        self.stats.covered_states = self.stats.covered_on_insert + self.stats.covered_on_pop;
        self.stats.time_ms = start.elapsed().as_millis() as u64;

        info!(
            "coverage reachability finished: reached={} visited={} stored={} covered={}",
            self.stats.reached,
            self.stats.visited_states,
            self.stats.stored_states,
            self.stats.covered_states,
        );

        self.stats
    }

    /// Check whether a node carries all accepting labels and may end a run
    ///
    /// The check is the superset test `labels(state) ⊇ accepting`: the
    /// empty accepting set matches every valid state, and an unsatisfiable
    /// set (`None`) matches none.
    fn is_accepting(&self, node: &NodeRef) -> bool {
        let Some(accepting) = &self.accepting else {
            return false;
        };
        let state = node.borrow().state().clone();
        let labels = self.zone_graph.labels(&state);
        accepting.iter_ones().all(|l| labels[l]) && self.zone_graph.is_valid_final(&state)
    }

    /// Insert a freshly computed state into the graph, unless covered
    fn handle(
        &mut self,
        state: ZgState,
        transition: ZgTransition,
        src: Option<&NodeRef>,
        is_initial: bool,
    ) {
        // A stored node covering the state absorbs it.
        if let Some(covering) = self.graph.lookup_covering(&state) {
            if let Some(src) = src {
                self.graph.add_edge(
                    src,
                    &covering,
                    EdgeKind::Abstract,
                    Rc::clone(&transition.vedge),
                );
            }
            self.stats.covered_on_insert += 1;
            return;
        }

        // Under full covering, stored nodes covered by the new state are
        // removed first, so the graph stays an antichain.
        let covered = match self.policy {
            CoveringPolicy::Full => self.graph.nodes_covered_by(&state),
            CoveringPolicy::LeafNodes => Vec::new(),
        };

        let node = self.graph.insert(state);
        for old in covered {
            self.waiting.fast_remove(&old);
            self.graph.redirect_incoming(&old, &node);
            self.graph.remove_node(&old);
            self.stats.covered_on_insert += 1;
        }

        if let Some(src) = src {
            self.graph
                .add_edge(src, &node, EdgeKind::Actual, Rc::clone(&transition.vedge));
        }
        if is_initial {
            self.graph.mark_initial(&node);
        }
        self.waiting.insert(&node);
    }
}
