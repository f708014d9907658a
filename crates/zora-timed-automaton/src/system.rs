//! Compiled system of communicating timed processes
//!
//! A [`System`] is the immutable result of compiling a declaration through
//! the [`crate::builder::SystemBuilder`]. All names are resolved to flat
//! identifiers, per-location outgoing edge tables and per-process initial
//! location lists are precomputed, and the LU bounds of every clock are
//! extracted from the guards and invariants.

use bitvec::vec::BitVec;

use zora_dbm::LuBounds;

use crate::expressions::Constraint;
use crate::statement::{IntVarRanges, Statement};
use crate::{EdgeId, EventId, IntVarId, LabelId, LocationId, ParamId, ProcessId};

/// Declaration of a process
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessDecl {
    pub(crate) name: String,
}

/// Declaration of a clock
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClockDecl {
    pub(crate) name: String,
}

/// Declaration of a bounded integer variable
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntVarDecl {
    pub(crate) name: String,
    pub(crate) min: i64,
    pub(crate) max: i64,
    pub(crate) initial: i64,
}

/// Declaration of a bounded parameter
///
/// Parameters are read-only during exploration; their value is fixed to the
/// declared minimum when the system is compiled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamDecl {
    pub(crate) name: String,
    pub(crate) min: i64,
    pub(crate) max: i64,
}

/// A location of one process
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    pub(crate) name: String,
    pub(crate) process: ProcessId,
    pub(crate) initial: bool,
    pub(crate) committed: bool,
    pub(crate) invariant: Vec<Constraint>,
    pub(crate) labels: BitVec,
}

impl Location {
    /// Name of the location
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Process the location belongs to
    pub fn process(&self) -> ProcessId {
        self.process
    }

    /// Check whether the location is an initial location of its process
    pub fn is_initial(&self) -> bool {
        self.initial
    }

    /// Check whether the location is committed
    pub fn is_committed(&self) -> bool {
        self.committed
    }

    /// Invariant of the location
    pub fn invariant(&self) -> &[Constraint] {
        &self.invariant
    }

    /// Labels carried by the location, as a bitset over the label alphabet
    pub fn labels(&self) -> &BitVec {
        &self.labels
    }
}

/// An edge of one process
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edge {
    pub(crate) process: ProcessId,
    pub(crate) source: LocationId,
    pub(crate) target: LocationId,
    pub(crate) event: EventId,
    pub(crate) guard: Vec<Constraint>,
    pub(crate) statement: Statement,
}

impl Edge {
    /// Process the edge belongs to
    pub fn process(&self) -> ProcessId {
        self.process
    }

    /// Source location
    pub fn source(&self) -> LocationId {
        self.source
    }

    /// Target location
    pub fn target(&self) -> LocationId {
        self.target
    }

    /// Event of the edge
    pub fn event(&self) -> EventId {
        self.event
    }

    /// Guard of the edge
    pub fn guard(&self) -> &[Constraint] {
        &self.guard
    }

    /// Update statement of the edge
    pub fn statement(&self) -> &Statement {
        &self.statement
    }
}

/// Participation strength of a process in a synchronization vector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyncStrength {
    /// The process must have a matching edge for the vector to fire
    Strong,
    /// The process joins when it has a matching edge and is skipped
    /// otherwise
    Weak,
}

/// One process/event constraint of a synchronization vector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncConstraint {
    pub(crate) process: ProcessId,
    pub(crate) event: EventId,
    pub(crate) strength: SyncStrength,
}

impl SyncConstraint {
    /// Process constrained by this entry
    pub fn process(&self) -> ProcessId {
        self.process
    }

    /// Local event the process must fire
    pub fn event(&self) -> EventId {
        self.event
    }

    /// Participation strength
    pub fn strength(&self) -> SyncStrength {
        self.strength
    }
}

/// A synchronization vector over the processes of the system
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncVector {
    pub(crate) constraints: Vec<SyncConstraint>,
}

impl SyncVector {
    /// Constraints of the vector, ordered by increasing process id
    pub fn constraints(&self) -> &[SyncConstraint] {
        &self.constraints
    }
}

/// Compiled system of timed processes
#[derive(Debug, Clone)]
pub struct System {
    pub(crate) name: String,
    pub(crate) processes: Vec<ProcessDecl>,
    pub(crate) clocks: Vec<ClockDecl>,
    pub(crate) intvars: Vec<IntVarDecl>,
    pub(crate) params: Vec<ParamDecl>,
    pub(crate) events: Vec<String>,
    pub(crate) labels: Vec<String>,
    pub(crate) locations: Vec<Location>,
    pub(crate) edges: Vec<Edge>,
    pub(crate) syncs: Vec<SyncVector>,
    /// Outgoing edges per location, in declaration order
    pub(crate) outgoing: Vec<Vec<EdgeId>>,
    /// Initial locations per process, in declaration order
    pub(crate) initial_locations: Vec<Vec<LocationId>>,
    /// Events that take part in some synchronization, per process
    pub(crate) synchronized: Vec<BitVec>,
    /// LU bounds extracted from all guards and invariants
    pub(crate) lu_bounds: LuBounds,
    /// Fixed parameter values
    pub(crate) param_values: Vec<i64>,
    /// Loop iteration budget derived from the integer state space
    pub(crate) statement_fuel: u64,
}

impl System {
    /// Name of the system
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of processes
    pub fn process_count(&self) -> usize {
        self.processes.len()
    }

    /// Name of a process
    pub fn process_name(&self, p: ProcessId) -> &str {
        &self.processes[p.0].name
    }

    /// Number of user clocks
    pub fn clock_count(&self) -> usize {
        self.clocks.len()
    }

    /// Names of the user clocks, indexed by clock id minus one
    pub fn clock_names(&self) -> Vec<String> {
        self.clocks.iter().map(|c| c.name.clone()).collect()
    }

    /// Number of flattened integer variable slots
    pub fn intvar_count(&self) -> usize {
        self.intvars.len()
    }

    /// Name of an integer variable
    pub fn intvar_name(&self, v: IntVarId) -> &str {
        &self.intvars[v.0].name
    }

    /// Declared initial values of the integer variables
    pub fn initial_intval(&self) -> Vec<i64> {
        self.intvars.iter().map(|v| v.initial).collect()
    }

    /// Number of parameters
    pub fn param_count(&self) -> usize {
        self.params.len()
    }

    /// Fixed values of the parameters
    pub fn param_values(&self) -> &[i64] {
        &self.param_values
    }

    /// Declared range of a parameter
    pub fn param_range(&self, p: ParamId) -> (i64, i64) {
        (self.params[p.0].min, self.params[p.0].max)
    }

    /// Number of events
    pub fn event_count(&self) -> usize {
        self.events.len()
    }

    /// Name of an event
    pub fn event_name(&self, e: EventId) -> &str {
        &self.events[e.0]
    }

    /// Size of the label alphabet
    pub fn label_count(&self) -> usize {
        self.labels.len()
    }

    /// Look up a label by name
    pub fn label(&self, name: &str) -> Option<LabelId> {
        self.labels.iter().position(|l| l == name).map(LabelId)
    }

    /// Name of a label
    pub fn label_name(&self, l: LabelId) -> &str {
        &self.labels[l.0]
    }

    /// A location by id
    pub fn location(&self, l: LocationId) -> &Location {
        &self.locations[l.0]
    }

    /// Number of locations over all processes
    pub fn location_count(&self) -> usize {
        self.locations.len()
    }

    /// An edge by id
    pub fn edge(&self, e: EdgeId) -> &Edge {
        &self.edges[e.0]
    }

    /// Number of edges over all processes
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Outgoing edges of a location, in declaration order
    pub fn outgoing_edges_of(&self, l: LocationId) -> &[EdgeId] {
        &self.outgoing[l.0]
    }

    /// Initial locations of a process, in declaration order
    pub fn initial_locations_of(&self, p: ProcessId) -> &[LocationId] {
        &self.initial_locations[p.0]
    }

    /// Synchronization vectors, in declaration order
    pub fn syncs(&self) -> &[SyncVector] {
        &self.syncs
    }

    /// Check whether an event of a process takes part in some
    /// synchronization vector
    ///
    /// Edges with a synchronized event never fire asynchronously.
    pub fn is_synchronized(&self, p: ProcessId, e: EventId) -> bool {
        self.synchronized[p.0][e.0]
    }

    /// LU bounds of the clocks, extracted from all guards and invariants
    pub fn lu_bounds(&self) -> &LuBounds {
        &self.lu_bounds
    }

    /// Loop iteration budget for statement execution
    pub fn statement_fuel(&self) -> u64 {
        self.statement_fuel
    }

    /// An empty bitset sized for the label alphabet
    pub fn empty_label_set(&self) -> BitVec {
        BitVec::repeat(false, self.labels.len())
    }
}

impl IntVarRanges for System {
    fn range(&self, var: IntVarId) -> (i64, i64) {
        let decl = &self.intvars[var.0];
        (decl.min, decl.max)
    }
}
