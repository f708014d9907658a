//! Static analyses over a compiled system
//!
//! Two analyses are required by the exploration layers: the check that every
//! process declares an initial location (a system failing it has no initial
//! state, which is reported as a warning, not an error), and the variable
//! access map recording which processes read or write each integer variable
//! and clock. The access map is used to reject zone-graph configurations
//! that are unsound for systems with shared variables.

use std::collections::HashSet;

use zora_dbm::{ClockId, REFERENCE};

use crate::expressions::Constraint;
use crate::statement::VariableAccesses;
use crate::system::System;
use crate::{IntVarId, ProcessId};

/// Which processes access each variable of the system
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariableAccessMap {
    intvar_accessors: Vec<HashSet<ProcessId>>,
    clock_accessors: Vec<HashSet<ProcessId>>,
}

impl VariableAccessMap {
    /// Processes reading or writing an integer variable
    pub fn intvar_accessors(&self, v: IntVarId) -> &HashSet<ProcessId> {
        &self.intvar_accessors[v.0]
    }

    /// Processes reading or writing a clock
    pub fn clock_accessors(&self, c: ClockId) -> &HashSet<ProcessId> {
        &self.clock_accessors[c.0 - 1]
    }

    /// Check whether some variable or clock is accessed by more than one
    /// process
    pub fn has_shared_variable(&self) -> bool {
        self.intvar_accessors
            .iter()
            .chain(self.clock_accessors.iter())
            .any(|accessors| accessors.len() > 1)
    }
}

/// Compute the variable access map of a system
pub fn variable_access(system: &System) -> VariableAccessMap {
    let mut intvar_accessors = vec![HashSet::new(); system.intvar_count()];
    let mut clock_accessors = vec![HashSet::new(); system.clock_count()];

    let mut record = |process: ProcessId, accesses: &VariableAccesses| {
        for v in accesses
            .read_intvars
            .iter()
            .chain(accesses.written_intvars.iter())
        {
            intvar_accessors[v.0].insert(process);
        }
        for c in accesses
            .read_clocks
            .iter()
            .chain(accesses.written_clocks.iter())
        {
            debug_assert!(*c != REFERENCE);
            clock_accessors[c.0 - 1].insert(process);
        }
    };

    for i in 0..system.location_count() {
        let location = system.location(crate::LocationId(i));
        let mut accesses = VariableAccesses::default();
        for constraint in location.invariant() {
            constraint_accesses(constraint, &mut accesses);
        }
        record(location.process(), &accesses);
    }

    for i in 0..system.edge_count() {
        let edge = system.edge(crate::EdgeId(i));
        let mut accesses = VariableAccesses::default();
        for constraint in edge.guard() {
            constraint_accesses(constraint, &mut accesses);
        }
        edge.statement().collect_accesses(&mut accesses);
        record(edge.process(), &accesses);
    }

    VariableAccessMap {
        intvar_accessors,
        clock_accessors,
    }
}

/// Record the variables read by a guard or invariant conjunct
fn constraint_accesses(constraint: &Constraint, accesses: &mut VariableAccesses) {
    match constraint {
        Constraint::Int(expr) => {
            expr.collect_reads(&mut accesses.read_intvars, &mut accesses.read_params);
        }
        Constraint::Clock(expr) => {
            if expr.lhs != REFERENCE {
                accesses.read_clocks.push(expr.lhs);
            }
            if expr.rhs != REFERENCE {
                accesses.read_clocks.push(expr.rhs);
            }
            expr.bound
                .collect_reads(&mut accesses.read_intvars, &mut accesses.read_params);
        }
    }
}

/// Check that every process declares at least one initial location
///
/// A system failing this check has no initial state; the exploration still
/// runs and reports an empty reachable set.
pub fn every_process_has_initial_location(system: &System) -> bool {
    (0..system.process_count()).all(|p| !system.initial_locations_of(ProcessId(p)).is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{EdgeBuilder, LocationBuilder, SystemBuilder};
    use crate::expressions::{BoolExpr, ClockExpr, CmpOp, Constraint, IntExpr};
    use crate::statement::Statement;

    #[test]
    fn test_every_process_has_initial_location() {
        let system = SystemBuilder::new("sys")
            .with_process("P")
            .unwrap()
            .initialize()
            .with_location("P", "l0", LocationBuilder::new().initial())
            .unwrap()
            .build();
        assert!(every_process_has_initial_location(&system));

        let system = SystemBuilder::new("sys")
            .with_process("P")
            .unwrap()
            .initialize()
            .with_location("P", "l0", LocationBuilder::new())
            .unwrap()
            .build();
        assert!(!every_process_has_initial_location(&system));
    }

    #[test]
    fn test_access_map_local_variables() {
        let builder = SystemBuilder::new("sys")
            .with_process("P")
            .unwrap()
            .with_process("Q")
            .unwrap()
            .with_clock("x")
            .unwrap()
            .with_event("a")
            .unwrap()
            .with_int_variable("n", 0, 3, 0)
            .unwrap()
            .initialize();
        let x = builder.clock("x").unwrap();
        let n = builder.int_variable("n").unwrap();

        let system = builder
            .with_location("P", "l0", LocationBuilder::new().initial())
            .unwrap()
            .with_location("Q", "m0", LocationBuilder::new().initial())
            .unwrap()
            .with_edge(
                "P",
                "l0",
                "l0",
                "a",
                EdgeBuilder::new()
                    .with_guard(Constraint::clock(ClockExpr::single(
                        x,
                        CmpOp::Ge,
                        IntExpr::Const(1),
                    )))
                    .with_statement(Statement::IntAssign {
                        var: n,
                        value: IntExpr::Const(1),
                    }),
            )
            .unwrap()
            .build();

        let map = variable_access(&system);
        assert!(!map.has_shared_variable());
        assert_eq!(map.intvar_accessors(n).len(), 1);
        assert_eq!(map.clock_accessors(x).len(), 1);
    }

    #[test]
    fn test_access_map_shared_variable() {
        let builder = SystemBuilder::new("sys")
            .with_process("P")
            .unwrap()
            .with_process("Q")
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
            .with_location(
                "Q",
                "m0",
                LocationBuilder::new()
                    .initial()
                    .with_invariant(Constraint::int(BoolExpr::Cmp(
                        Box::new(IntExpr::Var(n)),
                        CmpOp::Le,
                        Box::new(IntExpr::Const(3)),
                    ))),
            )
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
            .build();

        let map = variable_access(&system);
        assert!(map.has_shared_variable());
        assert_eq!(map.intvar_accessors(n).len(), 2);
    }
}
