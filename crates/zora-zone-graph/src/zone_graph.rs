//! The zone graph: discrete semantics composed with zone semantics
//!
//! A [`ZoneGraph`] owns the compiled system, the semantics and extrapolation
//! strategies, and the hash-consing pools for state components. Its
//! `initial`/`next` functions run the discrete layer first and, on success,
//! push the collected clock constraints and resets through the zone
//! pipeline; any failure is reported as a [`StateStatus`] and the candidate
//! transition is discarded by the caller.

use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use bitvec::vec::BitVec;

use zora_dbm::Dbm;
use zora_timed_automaton::semantics::{self as ta, StateStatus};
use zora_timed_automaton::state::{Intval, Vedge, Vloc};
use zora_timed_automaton::static_analysis::variable_access;
use zora_timed_automaton::system::System;

use crate::pool::SharedPool;
use crate::semantics::{Extrapolation, Semantics};
use crate::state::{ZgState, ZgTransition};

/// Layout of reference clocks backing the DBM encoding
///
/// The sequential semantics uses a single reference clock. Layouts with
/// more reference clocks (one per process) are only sound for systems
/// without shared variables, which is checked at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReferenceClocks {
    refcount: usize,
}

impl ReferenceClocks {
    /// The single-reference-clock layout of the sequential semantics
    pub fn sequential() -> Self {
        ReferenceClocks { refcount: 1 }
    }

    /// A layout with one reference clock per process
    pub fn per_process(process_count: usize) -> Self {
        ReferenceClocks {
            refcount: process_count.max(1),
        }
    }

    /// Number of reference clocks
    pub fn refcount(&self) -> usize {
        self.refcount
    }
}

/// Error raised when a zone graph cannot be constructed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ZoneGraphError {
    /// Multiple reference clocks over a system with shared variables are
    /// unsound
    UnsoundSharedVariables,
}

impl fmt::Display for ZoneGraphError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ZoneGraphError::UnsoundSharedVariables => write!(
                f,
                "a zone graph with multiple reference clocks is not sound for systems with shared variables"
            ),
        }
    }
}

impl std::error::Error for ZoneGraphError {}

/// Zone graph of a system of timed processes
#[derive(Debug)]
pub struct ZoneGraph {
    system: Rc<System>,
    semantics: Semantics,
    extrapolation: Extrapolation,
    vloc_pool: SharedPool<Vloc>,
    intval_pool: SharedPool<Intval>,
    vedge_pool: SharedPool<Vedge>,
    zone_pool: SharedPool<Dbm>,
}

impl ZoneGraph {
    /// Create a zone graph over a system
    ///
    /// `block_size` and `table_size` configure the pools. Construction fails
    /// when the reference-clock layout is unsound for the system.
    pub fn new(
        system: Rc<System>,
        semantics: Semantics,
        extrapolation: Extrapolation,
        reference_clocks: ReferenceClocks,
        block_size: usize,
        table_size: usize,
    ) -> Result<Self, ZoneGraphError> {
        if reference_clocks.refcount() > 1 && variable_access(&system).has_shared_variable() {
            return Err(ZoneGraphError::UnsoundSharedVariables);
        }

        Ok(ZoneGraph {
            system,
            semantics,
            extrapolation,
            vloc_pool: SharedPool::new(block_size, table_size),
            intval_pool: SharedPool::new(block_size, table_size),
            vedge_pool: SharedPool::new(block_size, table_size),
            zone_pool: SharedPool::new(block_size, table_size),
        })
    }

    /// Underlying system
    pub fn system(&self) -> &System {
        &self.system
    }

    /// Enumerate the initial location tuples
    pub fn initial_edges(&self) -> Vec<Vloc> {
        ta::initial_edges(&self.system).collect()
    }

    /// Compute the initial symbolic state for one tuple of initial locations
    pub fn initial(&mut self, vloc: Vloc) -> Result<(ZgState, ZgTransition), StateStatus> {
        let discrete = ta::initial(&self.system, vloc)?;
        let delay = ta::delay_allowed(&self.system, &discrete.vloc);

        let zone = self.semantics.initial_zone(
            self.system.clock_count(),
            delay,
            &discrete.invariant,
            self.extrapolation,
            self.system.lu_bounds(),
        )?;

        let state = ZgState {
            vloc: self.vloc_pool.share(discrete.vloc),
            intval: self.intval_pool.share(discrete.intval),
            zone: self.zone_pool.share(zone),
        };
        let transition = ZgTransition {
            vedge: self.vedge_pool.share(Vedge::empty()),
        };
        Ok((state, transition))
    }

    /// Enumerate the candidate edge tuples leaving a state
    pub fn outgoing_edges(&self, state: &ZgState) -> Vec<Vedge> {
        ta::outgoing_edges(&self.system, &state.vloc)
    }

    /// Compute the successor state along an edge tuple
    pub fn next(
        &mut self,
        state: &ZgState,
        vedge: Vedge,
    ) -> Result<(ZgState, ZgTransition), StateStatus> {
        let discrete = ta::next(&self.system, &state.vloc, &state.intval, &vedge)?;

        let delay_src = ta::delay_allowed(&self.system, &state.vloc);
        let delay_tgt = ta::delay_allowed(&self.system, &discrete.vloc);

        let zone = self.semantics.next_zone(
            &state.zone,
            delay_src,
            &discrete.src_invariant,
            &discrete.guard,
            &discrete.resets,
            delay_tgt,
            &discrete.tgt_invariant,
            self.extrapolation,
            self.system.lu_bounds(),
        )?;

        let successor = ZgState {
            vloc: self.vloc_pool.share(discrete.vloc),
            intval: self.intval_pool.share(discrete.intval),
            zone: self.zone_pool.share(zone),
        };
        let transition = ZgTransition {
            vedge: self.vedge_pool.share(vedge),
        };
        Ok((successor, transition))
    }

    /// Labels of a state, as a bitset over the system alphabet
    pub fn labels(&self, state: &ZgState) -> BitVec {
        ta::labels(&self.system, &state.vloc)
    }

    /// Check whether a state can end an accepting run
    ///
    /// A run can only end in a state whose zone is not empty; zones produced
    /// by `initial`/`next` always are, so this guards against states built
    /// from foreign components.
    pub fn is_valid_final(&self, state: &ZgState) -> bool {
        !state.zone.is_empty()
    }

    /// Check whether a state is an initial state of the product
    pub fn is_initial(&self, state: &ZgState) -> bool {
        ta::is_initial(&self.system, &state.vloc)
    }

    /// Attributes of a state, for output formatters
    pub fn attributes(&self, state: &ZgState) -> BTreeMap<String, String> {
        let mut m = BTreeMap::new();
        m.insert("vloc".to_string(), state.vloc.display_with(&self.system));
        m.insert("intval".to_string(), state.intval.display_with(&self.system));
        m.insert(
            "zone".to_string(),
            state.zone.display_with_names(&self.system.clock_names()),
        );
        m
    }

    /// Attributes of a transition, for output formatters
    pub fn transition_attributes(&self, transition: &ZgTransition) -> BTreeMap<String, String> {
        let mut m = BTreeMap::new();
        m.insert(
            "vedge".to_string(),
            transition.vedge.display_with(&self.system),
        );
        m
    }

    /// Release pooled payloads no longer referenced by any state
    pub fn collect(&mut self) -> usize {
        let freed = self.vloc_pool.collect()
            + self.intval_pool.collect()
            + self.vedge_pool.collect()
            + self.zone_pool.collect();
        log::debug!("pool collection released {freed} payloads");
        freed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use zora_dbm::{Bound, ClockId, REFERENCE};
    use zora_timed_automaton::builder::{EdgeBuilder, LocationBuilder, SystemBuilder};
    use zora_timed_automaton::expressions::{ClockExpr, CmpOp, Constraint, IntExpr};
    use zora_timed_automaton::statement::Statement;

    fn toggle_system() -> Rc<System> {
        let builder = SystemBuilder::new("toggle")
            .with_process("P")
            .unwrap()
            .with_clock("x")
            .unwrap()
            .with_event("a")
            .unwrap()
            .initialize();
        let x = builder.clock("x").unwrap();

        Rc::new(
            builder
                .with_location("P", "l0", LocationBuilder::new().initial())
                .unwrap()
                .with_location("P", "l1", LocationBuilder::new().with_label("hit"))
                .unwrap()
                .with_edge(
                    "P",
                    "l0",
                    "l1",
                    "a",
                    EdgeBuilder::new()
                        .with_guard(Constraint::clock(ClockExpr::single(
                            x,
                            CmpOp::Ge,
                            IntExpr::Const(1),
                        )))
                        .with_statement(Statement::ClockAssign {
                            clock: x,
                            base: REFERENCE,
                            value: IntExpr::Const(0),
                        }),
                )
                .unwrap()
                .build(),
        )
    }

    fn toggle_graph() -> ZoneGraph {
        ZoneGraph::new(
            toggle_system(),
            Semantics::Elapsed,
            Extrapolation::ExtraLuPlusLocal,
            ReferenceClocks::sequential(),
            64,
            1024,
        )
        .unwrap()
    }

    #[test]
    fn test_initial_state() {
        let mut zg = toggle_graph();
        let inits = zg.initial_edges();
        assert_eq!(inits.len(), 1);

        let (state, transition) = zg.initial(inits[0].clone()).unwrap();
        assert!(transition.vedge.is_empty());
        // Elapsed semantics: x may have any value >= 0.
        assert_eq!(state.zone.get(ClockId(1), REFERENCE), Bound::INFINITY);
        assert!(zg.is_valid_final(&state));
        assert!(zg.is_initial(&state));
    }

    #[test]
    fn test_next_state_fires_guard_and_reset() {
        let mut zg = toggle_graph();
        let inits = zg.initial_edges();
        let (state, _) = zg.initial(inits[0].clone()).unwrap();

        let edges = zg.outgoing_edges(&state);
        assert_eq!(edges.len(), 1);

        let (successor, transition) = zg.next(&state, edges[0].clone()).unwrap();
        assert_eq!(transition.vedge.len(), 1);

        let hit = zg.system().label("hit").unwrap();
        assert!(zg.labels(&successor)[hit.0]);
    }

    #[test]
    fn test_states_share_components() {
        let mut zg = toggle_graph();
        let inits = zg.initial_edges();
        let (state, _) = zg.initial(inits[0].clone()).unwrap();

        // Firing the loop l0 -> l1 -> (no edge back): recompute the initial
        // state and check the components are shared.
        let (again, _) = zg.initial(inits[0].clone()).unwrap();
        assert!(Rc::ptr_eq(&state.vloc, &again.vloc));
        assert!(Rc::ptr_eq(&state.intval, &again.intval));
        assert!(Rc::ptr_eq(&state.zone, &again.zone));
    }

    #[test]
    fn test_attributes() {
        let mut zg = toggle_graph();
        let inits = zg.initial_edges();
        let (state, transition) = zg.initial(inits[0].clone()).unwrap();

        let attrs = zg.attributes(&state);
        assert_eq!(attrs.get("vloc").unwrap(), "<l0>");
        assert_eq!(attrs.get("intval").unwrap(), "");
        assert!(attrs.contains_key("zone"));

        let attrs = zg.transition_attributes(&transition);
        assert_eq!(attrs.get("vedge").unwrap(), "<>");
    }

    #[test]
    fn test_shared_variable_guard() {
        let builder = SystemBuilder::new("shared")
            .with_process("P")
            .unwrap()
            .with_process("Q")
            .unwrap()
            .with_event("a")
            .unwrap()
            .with_int_variable("n", 0, 1, 0)
            .unwrap()
            .initialize();
        let n = builder.int_variable("n").unwrap();

        let system = Rc::new(
            builder
                .with_location("P", "l0", LocationBuilder::new().initial())
                .unwrap()
                .with_location("Q", "m0", LocationBuilder::new().initial())
                .unwrap()
                .with_edge(
                    "P",
                    "l0",
                    "l0",
                    "a",
                    EdgeBuilder::new().with_statement(Statement::IntAssign {
                        var: n,
                        value: IntExpr::Const(1),
                    }),
                )
                .unwrap()
                .with_edge(
                    "Q",
                    "m0",
                    "m0",
                    "a",
                    EdgeBuilder::new().with_statement(Statement::IntAssign {
                        var: n,
                        value: IntExpr::Const(0),
                    }),
                )
                .unwrap()
                .build(),
        );

        // One reference clock: fine.
        assert!(ZoneGraph::new(
            Rc::clone(&system),
            Semantics::Elapsed,
            Extrapolation::ExtraLuPlusLocal,
            ReferenceClocks::sequential(),
            64,
            1024,
        )
        .is_ok());

        // Multiple reference clocks over a shared variable: rejected.
        let err = ZoneGraph::new(
            system,
            Semantics::Elapsed,
            Extrapolation::ExtraLuPlusLocal,
            ReferenceClocks::per_process(2),
            64,
            1024,
        )
        .unwrap_err();
        assert_eq!(err, ZoneGraphError::UnsoundSharedVariables);
    }
}
