//! Discrete semantics of the synchronized product
//!
//! This module implements the discrete layer of the product automaton:
//! enumeration of initial location tuples as the cartesian product of the
//! per-process initial locations, enumeration of candidate edge tuples
//! (synchronization instances first, then asynchronous edges) filtered by
//! the committed-location rule, and the `initial`/`next` functions.
//!
//! Integer effects are applied eagerly; clock constraints and resets are
//! only collected, to be interpreted by the zone layer. Transition failures
//! are reported through [`StateStatus`] and recovered locally by the caller:
//! a non-`Ok` status discards the candidate transition, nothing else.

use std::fmt;

use bitvec::vec::BitVec;
use log::debug;

use zora_dbm::{ClockConstraint, ClockReset};

use crate::expressions::{Constraint, EvalCtx};
use crate::state::{Intval, Vedge, Vloc};
use crate::statement::ExecState;
use crate::system::{SyncStrength, System};
use crate::{EdgeId, ProcessId};

/// Status of a discrete or symbolic transition computation
///
/// The discrete layer produces the first group; the clock statuses are
/// produced by the zone layer when a zone operation empties the zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StateStatus {
    /// The transition is valid
    Ok,
    /// An integer guard evaluated to false
    GuardViolated,
    /// The integer part of a source invariant does not hold
    SrcInvariantViolated,
    /// The integer part of a target invariant does not hold
    TgtInvariantViolated,
    /// A statement assigned a value outside a variable's declared range, or
    /// its evaluation was undefined
    IntVarOutOfRange,
    /// The edge tuple does not match the current locations
    IncompatibleEdge,
    /// A process has no initial location
    NoInitialLocation,
    /// The zone became empty on the guard
    ClocksGuardViolated,
    /// The zone became empty on the source invariant
    ClocksSrcInvariantViolated,
    /// The zone became empty on the target invariant
    ClocksTgtInvariantViolated,
}

impl fmt::Display for StateStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StateStatus::Ok => write!(f, "ok"),
            StateStatus::GuardViolated => write!(f, "guard violated"),
            StateStatus::SrcInvariantViolated => write!(f, "source invariant violated"),
            StateStatus::TgtInvariantViolated => write!(f, "target invariant violated"),
            StateStatus::IntVarOutOfRange => write!(f, "integer variable out of range"),
            StateStatus::IncompatibleEdge => write!(f, "incompatible edge"),
            StateStatus::NoInitialLocation => write!(f, "no initial location"),
            StateStatus::ClocksGuardViolated => write!(f, "guard violated on clocks"),
            StateStatus::ClocksSrcInvariantViolated => {
                write!(f, "source invariant violated on clocks")
            }
            StateStatus::ClocksTgtInvariantViolated => {
                write!(f, "target invariant violated on clocks")
            }
        }
    }
}

/// Discrete part of an initial state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscreteState {
    /// Tuple of initial locations
    pub vloc: Vloc,
    /// Declared initial integer valuation
    pub intval: Intval,
    /// Clock part of the conjoined initial-location invariants
    pub invariant: Vec<ClockConstraint>,
}

/// Discrete part of a successor state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscreteSuccessor {
    /// Tuple of target locations
    pub vloc: Vloc,
    /// Updated integer valuation
    pub intval: Intval,
    /// Clock part of the source invariant
    pub src_invariant: Vec<ClockConstraint>,
    /// Clock part of the conjoined guards
    pub guard: Vec<ClockConstraint>,
    /// Clock resets in execution order
    pub resets: Vec<ClockReset>,
    /// Clock part of the target invariant
    pub tgt_invariant: Vec<ClockConstraint>,
}

/// Iterator over the cartesian product of per-process initial locations
///
/// A system with zero processes yields exactly one empty tuple. A system
/// where some process has no initial location yields nothing.
pub struct InitialEdgesIter<'a> {
    system: &'a System,
    indices: Vec<usize>,
    done: bool,
}

impl Iterator for InitialEdgesIter<'_> {
    type Item = Vloc;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let vloc = Vloc::new(
            self.indices
                .iter()
                .enumerate()
                .map(|(p, i)| self.system.initial_locations_of(ProcessId(p))[*i])
                .collect(),
        );

        // Advance the rightmost index, cascading like an odometer.
        self.done = true;
        for p in (0..self.indices.len()).rev() {
            self.indices[p] += 1;
            if self.indices[p] < self.system.initial_locations_of(ProcessId(p)).len() {
                self.done = false;
                break;
            }
            self.indices[p] = 0;
        }

        Some(vloc)
    }
}

/// Enumerate the initial location tuples of the system
pub fn initial_edges(system: &System) -> InitialEdgesIter<'_> {
    let empty = (0..system.process_count())
        .any(|p| system.initial_locations_of(ProcessId(p)).is_empty());
    InitialEdgesIter {
        system,
        indices: vec![0; system.process_count()],
        done: empty,
    }
}

/// Compute the discrete part of the initial state for one choice of initial
/// locations
pub fn initial(system: &System, vloc: Vloc) -> Result<DiscreteState, StateStatus> {
    if vloc.len() != system.process_count() {
        return Err(StateStatus::NoInitialLocation);
    }

    let intval = Intval::new(system.initial_intval());
    let mut invariant = Vec::new();
    eval_invariant(
        system,
        &vloc,
        &intval,
        &mut invariant,
        StateStatus::SrcInvariantViolated,
    )?;

    Ok(DiscreteState {
        vloc,
        intval,
        invariant,
    })
}

/// Enumerate the candidate edge tuples leaving a location tuple
///
/// Synchronization vectors are instantiated first, in declaration order,
/// each as the cartesian product of the matching edges of its participating
/// processes; asynchronous edges follow, by increasing process id and edge
/// declaration order. When some process is committed, only tuples involving
/// a committed process are yielded.
pub fn outgoing_edges(system: &System, vloc: &Vloc) -> Vec<Vedge> {
    let committed_active = vloc.iter().any(|l| system.location(l).is_committed());
    let mut result = Vec::new();

    for sync in system.syncs() {
        // Matching edges per participating process.
        let mut participants: Vec<(ProcessId, Vec<EdgeId>)> = Vec::new();
        let mut enabled = true;
        for constraint in sync.constraints() {
            let location = vloc.get(constraint.process());
            let matching: Vec<EdgeId> = system
                .outgoing_edges_of(location)
                .iter()
                .copied()
                .filter(|e| system.edge(*e).event() == constraint.event())
                .collect();
            match constraint.strength() {
                SyncStrength::Strong if matching.is_empty() => {
                    enabled = false;
                    break;
                }
                SyncStrength::Strong => participants.push((constraint.process(), matching)),
                SyncStrength::Weak => {
                    if !matching.is_empty() {
                        participants.push((constraint.process(), matching));
                    }
                }
            }
        }
        if !enabled || participants.is_empty() {
            continue;
        }

        if committed_active
            && !participants
                .iter()
                .any(|(p, _)| system.location(vloc.get(*p)).is_committed())
        {
            continue;
        }

        // Cartesian product over the matching edges of the participants.
        let mut indices = vec![0usize; participants.len()];
        loop {
            let pairs: Vec<(ProcessId, EdgeId)> = participants
                .iter()
                .zip(indices.iter())
                .map(|((p, edges), i)| (*p, edges[*i]))
                .collect();
            result.push(Vedge::new(pairs));

            let mut advanced = false;
            for k in (0..indices.len()).rev() {
                indices[k] += 1;
                if indices[k] < participants[k].1.len() {
                    advanced = true;
                    break;
                }
                indices[k] = 0;
            }
            if !advanced {
                break;
            }
        }
    }

    for p in 0..system.process_count() {
        let p = ProcessId(p);
        let location = vloc.get(p);
        if committed_active && !system.location(location).is_committed() {
            continue;
        }
        for e in system.outgoing_edges_of(location) {
            if !system.is_synchronized(p, system.edge(*e).event()) {
                result.push(Vedge::new(vec![(p, *e)]));
            }
        }
    }

    result
}

/// Compute the discrete part of the successor along an edge tuple
pub fn next(
    system: &System,
    vloc: &Vloc,
    intval: &Intval,
    vedge: &Vedge,
) -> Result<DiscreteSuccessor, StateStatus> {
    // Compatibility of the edge tuple with the current locations.
    for window in vedge.pairs().windows(2) {
        if window[0].0 == window[1].0 {
            return Err(StateStatus::IncompatibleEdge);
        }
    }
    for (p, e) in vedge.pairs() {
        let edge = system.edge(*e);
        if edge.process() != *p || edge.source() != vloc.get(*p) {
            return Err(StateStatus::IncompatibleEdge);
        }
    }

    // Source invariant over the current valuation.
    let mut src_invariant = Vec::new();
    eval_invariant(
        system,
        vloc,
        intval,
        &mut src_invariant,
        StateStatus::SrcInvariantViolated,
    )?;

    // Guards of all fired edges over the current valuation.
    let mut guard = Vec::new();
    let ctx = EvalCtx {
        intval: intval.values(),
        params: system.param_values(),
        locals: &[],
    };
    for (_, e) in vedge.pairs() {
        for constraint in system.edge(*e).guard() {
            match constraint {
                Constraint::Int(expr) => match expr.eval(&ctx) {
                    Ok(true) => {}
                    Ok(false) => return Err(StateStatus::GuardViolated),
                    Err(e) => {
                        debug!("guard evaluation failed: {e}");
                        return Err(StateStatus::IntVarOutOfRange);
                    }
                },
                Constraint::Clock(expr) => {
                    if let Err(e) = expr.lower(&ctx, &mut guard) {
                        debug!("guard evaluation failed: {e}");
                        return Err(StateStatus::IntVarOutOfRange);
                    }
                }
            }
        }
    }

    // Statements of all fired edges, in tuple order.
    let mut new_intval = intval.clone();
    let mut resets = Vec::new();
    for (_, e) in vedge.pairs() {
        let mut state = ExecState {
            intval: new_intval.values_mut(),
            params: system.param_values(),
            locals: Vec::new(),
            resets: &mut resets,
            fuel: system.statement_fuel(),
        };
        if let Err(e) = system.edge(*e).statement().execute(system, &mut state) {
            debug!("statement execution failed: {e}");
            return Err(StateStatus::IntVarOutOfRange);
        }
    }

    // Target locations.
    let mut new_vloc = vloc.clone();
    for (p, e) in vedge.pairs() {
        new_vloc.set(*p, system.edge(*e).target());
    }

    // Target invariant over the updated valuation.
    let mut tgt_invariant = Vec::new();
    eval_invariant(
        system,
        &new_vloc,
        &new_intval,
        &mut tgt_invariant,
        StateStatus::TgtInvariantViolated,
    )?;

    Ok(DiscreteSuccessor {
        vloc: new_vloc,
        intval: new_intval,
        src_invariant,
        guard,
        resets,
        tgt_invariant,
    })
}

/// Labels of a location tuple, as the union bitset over the alphabet
pub fn labels(system: &System, vloc: &Vloc) -> BitVec {
    let mut result = system.empty_label_set();
    for l in vloc.iter() {
        for set in system.location(l).labels().iter_ones() {
            result.set(set, true);
        }
    }
    result
}

/// Check whether all locations of the tuple are initial
pub fn is_initial(system: &System, vloc: &Vloc) -> bool {
    vloc.iter().all(|l| system.location(l).is_initial())
}

/// Check whether time may elapse at a location tuple
///
/// Time cannot elapse while some process is in a committed location.
pub fn delay_allowed(system: &System, vloc: &Vloc) -> bool {
    !vloc.iter().any(|l| system.location(l).is_committed())
}

/// Evaluate the integer part of the invariant of every location in the
/// tuple and collect the clock part
fn eval_invariant(
    system: &System,
    vloc: &Vloc,
    intval: &Intval,
    out: &mut Vec<ClockConstraint>,
    violation: StateStatus,
) -> Result<(), StateStatus> {
    let ctx = EvalCtx {
        intval: intval.values(),
        params: system.param_values(),
        locals: &[],
    };
    for l in vloc.iter() {
        for constraint in system.location(l).invariant() {
            match constraint {
                Constraint::Int(expr) => match expr.eval(&ctx) {
                    Ok(true) => {}
                    Ok(false) => return Err(violation),
                    Err(e) => {
                        debug!("invariant evaluation failed: {e}");
                        return Err(StateStatus::IntVarOutOfRange);
                    }
                },
                Constraint::Clock(expr) => {
                    if let Err(e) = expr.lower(&ctx, out) {
                        debug!("invariant evaluation failed: {e}");
                        return Err(StateStatus::IntVarOutOfRange);
                    }
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{EdgeBuilder, LocationBuilder, SystemBuilder};
    use crate::expressions::{BoolExpr, ClockExpr, CmpOp, IntExpr};
    use crate::statement::Statement;
    use crate::LocationId;

    fn toggle_system() -> System {
        let builder = SystemBuilder::new("toggle")
            .with_process("P")
            .unwrap()
            .with_clock("x")
            .unwrap()
            .with_event("a")
            .unwrap()
            .initialize();
        let x = builder.clock("x").unwrap();

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
                        base: zora_dbm::REFERENCE,
                        value: IntExpr::Const(0),
                    }),
            )
            .unwrap()
            .build()
    }

    #[test]
    fn test_initial_edges_cartesian_product() {
        let system = SystemBuilder::new("sys")
            .with_process("P")
            .unwrap()
            .with_process("Q")
            .unwrap()
            .initialize()
            .with_location("P", "a", LocationBuilder::new().initial())
            .unwrap()
            .with_location("P", "b", LocationBuilder::new().initial())
            .unwrap()
            .with_location("Q", "c", LocationBuilder::new().initial())
            .unwrap()
            .build();

        let tuples: Vec<Vloc> = initial_edges(&system).collect();
        assert_eq!(
            tuples,
            vec![
                Vloc::new(vec![LocationId(0), LocationId(2)]),
                Vloc::new(vec![LocationId(1), LocationId(2)]),
            ]
        );
    }

    #[test]
    fn test_initial_edges_zero_process_system() {
        let system = SystemBuilder::new("empty").initialize().build();
        let tuples: Vec<Vloc> = initial_edges(&system).collect();
        assert_eq!(tuples, vec![Vloc::new(Vec::new())]);
    }

    #[test]
    fn test_initial_edges_without_initial_location() {
        let system = SystemBuilder::new("sys")
            .with_process("P")
            .unwrap()
            .initialize()
            .with_location("P", "l0", LocationBuilder::new())
            .unwrap()
            .build();
        assert_eq!(initial_edges(&system).count(), 0);
    }

    #[test]
    fn test_next_guard_and_reset() {
        let system = toggle_system();
        let vloc = Vloc::new(vec![LocationId(0)]);
        let initial = initial(&system, vloc).unwrap();

        let edges = outgoing_edges(&system, &initial.vloc);
        assert_eq!(edges.len(), 1);

        let successor = next(&system, &initial.vloc, &initial.intval, &edges[0]).unwrap();
        assert_eq!(successor.vloc, Vloc::new(vec![LocationId(1)]));
        assert_eq!(successor.guard.len(), 1);
        assert_eq!(successor.resets.len(), 1);
    }

    #[test]
    fn test_next_incompatible_edge() {
        let system = toggle_system();
        let vloc = Vloc::new(vec![LocationId(1)]);
        let intval = Intval::new(Vec::new());

        // The only edge leaves l0, not l1.
        let vedge = Vedge::new(vec![(ProcessId(0), EdgeId(0))]);
        assert_eq!(
            next(&system, &vloc, &intval, &vedge),
            Err(StateStatus::IncompatibleEdge)
        );
    }

    #[test]
    fn test_int_guard_violation() {
        let builder = SystemBuilder::new("sys")
            .with_process("P")
            .unwrap()
            .with_event("a")
            .unwrap()
            .with_int_variable("n", 0, 3, 0)
            .unwrap()
            .initialize();
        let n = builder.int_variable("n").unwrap();

        let system = builder
            .with_location("P", "l0", LocationBuilder::new().initial())
            .unwrap()
            .with_location("P", "l1", LocationBuilder::new())
            .unwrap()
            .with_edge(
                "P",
                "l0",
                "l1",
                "a",
                EdgeBuilder::new().with_guard(Constraint::int(BoolExpr::Cmp(
                    Box::new(IntExpr::Var(n)),
                    CmpOp::Ge,
                    Box::new(IntExpr::Const(1)),
                ))),
            )
            .unwrap()
            .build();

        let initial = initial(&system, Vloc::new(vec![LocationId(0)])).unwrap();
        let edges = outgoing_edges(&system, &initial.vloc);
        assert_eq!(
            next(&system, &initial.vloc, &initial.intval, &edges[0]),
            Err(StateStatus::GuardViolated)
        );
    }

    #[test]
    fn test_increment_past_max_is_out_of_range() {
        let builder = SystemBuilder::new("sys")
            .with_process("P")
            .unwrap()
            .with_event("a")
            .unwrap()
            .with_int_variable("n", 0, 0, 0)
            .unwrap()
            .initialize();
        let n = builder.int_variable("n").unwrap();

        let system = builder
            .with_location("P", "l0", LocationBuilder::new().initial())
            .unwrap()
            .with_edge(
                "P",
                "l0",
                "l0",
                "a",
                EdgeBuilder::new().with_statement(Statement::IntAssign {
                    var: n,
                    value: IntExpr::Binary(
                        Box::new(IntExpr::Var(n)),
                        crate::expressions::IntOp::Add,
                        Box::new(IntExpr::Const(1)),
                    ),
                }),
            )
            .unwrap()
            .build();

        let initial = initial(&system, Vloc::new(vec![LocationId(0)])).unwrap();
        let edges = outgoing_edges(&system, &initial.vloc);
        assert_eq!(
            next(&system, &initial.vloc, &initial.intval, &edges[0]),
            Err(StateStatus::IntVarOutOfRange)
        );
    }

    #[test]
    fn test_sync_suppresses_async_firing() {
        let system = SystemBuilder::new("sys")
            .with_process("P")
            .unwrap()
            .with_process("Q")
            .unwrap()
            .with_event("a")
            .unwrap()
            .initialize()
            .with_location("P", "l0", LocationBuilder::new().initial())
            .unwrap()
            .with_location("P", "l1", LocationBuilder::new())
            .unwrap()
            .with_location("Q", "m0", LocationBuilder::new().initial())
            .unwrap()
            .with_location("Q", "m1", LocationBuilder::new())
            .unwrap()
            .with_edge("P", "l0", "l1", "a", EdgeBuilder::new())
            .unwrap()
            .with_edge("Q", "m0", "m1", "a", EdgeBuilder::new())
            .unwrap()
            .with_sync(vec![
                ("P", "a", SyncStrength::Strong),
                ("Q", "a", SyncStrength::Strong),
            ])
            .unwrap()
            .build();

        let vloc = Vloc::new(vec![LocationId(0), LocationId(2)]);
        let edges = outgoing_edges(&system, &vloc);

        // Only the synchronized tuple fires; no asynchronous `a` appears.
        assert_eq!(edges.len(), 1);
        assert_eq!(
            edges[0],
            Vedge::new(vec![(ProcessId(0), EdgeId(0)), (ProcessId(1), EdgeId(1))])
        );
    }

    #[test]
    fn test_committed_location_preempts_other_processes() {
        let system = SystemBuilder::new("sys")
            .with_process("P")
            .unwrap()
            .with_process("Q")
            .unwrap()
            .with_event("a")
            .unwrap()
            .with_event("b")
            .unwrap()
            .initialize()
            .with_location("P", "l0", LocationBuilder::new().initial().committed())
            .unwrap()
            .with_location("P", "l1", LocationBuilder::new())
            .unwrap()
            .with_location("Q", "m0", LocationBuilder::new().initial())
            .unwrap()
            .with_location("Q", "m1", LocationBuilder::new())
            .unwrap()
            .with_edge("P", "l0", "l1", "a", EdgeBuilder::new())
            .unwrap()
            .with_edge("Q", "m0", "m1", "b", EdgeBuilder::new())
            .unwrap()
            .build();

        // While P is committed at l0, only P's edge is offered.
        let vloc = Vloc::new(vec![LocationId(0), LocationId(2)]);
        let edges = outgoing_edges(&system, &vloc);
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0], Vedge::new(vec![(ProcessId(0), EdgeId(0))]));

        // After P moves to l1, Q's edge becomes available.
        let vloc = Vloc::new(vec![LocationId(1), LocationId(2)]);
        let edges = outgoing_edges(&system, &vloc);
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0], Vedge::new(vec![(ProcessId(1), EdgeId(1))]));
    }

    #[test]
    fn test_labels_union() {
        let system = toggle_system();
        let hit = system.label("hit").unwrap();

        let l0 = labels(&system, &Vloc::new(vec![LocationId(0)]));
        assert!(!l0[hit.0]);
        let l1 = labels(&system, &Vloc::new(vec![LocationId(1)]));
        assert!(l1[hit.0]);
    }
}
