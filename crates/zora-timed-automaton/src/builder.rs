//! Staged builder for declaring and compiling a [`System`]
//!
//! The builder is the target of the external declaration parser and the
//! entry point for programmatic system construction. It has two stages:
//! in the first stage processes, events, clocks, integer variables and
//! parameters are declared. Calling [`SystemBuilder::initialize`] moves to
//! the second stage, where locations, edges and synchronizations are added
//! against the declared names. [`InitializedSystemBuilder::build`] compiles
//! the validated declaration into an immutable [`System`].
//!
//! Every declaration error (duplicate name, reference to an undeclared
//! entity, invalid range, non-convex clock constraint) is reported eagerly
//! through [`BuilderError`], so `build` itself cannot fail.

use std::collections::HashMap;
use std::fmt;

use bitvec::vec::BitVec;

use zora_dbm::{ClockId, LuBounds, REFERENCE};

use crate::expressions::{BoolExpr, ClockExpr, CmpOp, Constraint, IntExpr};
use crate::statement::Statement;
use crate::system::{
    ClockDecl, Edge, IntVarDecl, Location, ParamDecl, ProcessDecl, SyncConstraint, SyncStrength,
    SyncVector, System,
};
use crate::{EdgeId, EventId, IntVarId, LocationId, ParamId, ProcessId};

/// Error raised while declaring a system
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuilderError {
    /// A process with this name is already declared
    DuplicateProcess(String),
    /// A clock with this name is already declared
    DuplicateClock(String),
    /// An integer variable with this name is already declared
    DuplicateIntVariable(String),
    /// A parameter with this name is already declared
    DuplicateParameter(String),
    /// An event with this name is already declared
    DuplicateEvent(String),
    /// The process already has a location with this name
    DuplicateLocation {
        /// Process owning the location
        process: String,
        /// Duplicated location name
        name: String,
    },
    /// Reference to an undeclared process
    UnknownProcess(String),
    /// Reference to an undeclared clock
    UnknownClock(String),
    /// Reference to an undeclared integer variable
    UnknownIntVariable(String),
    /// Reference to an undeclared parameter
    UnknownParameter(String),
    /// Reference to an undeclared event
    UnknownEvent(String),
    /// Reference to an undeclared location of a process
    UnknownLocation {
        /// Process that was searched
        process: String,
        /// Missing location name
        name: String,
    },
    /// Declared range with `min > max`
    InvalidVariableRange {
        /// Variable name
        name: String,
        /// Declared minimum
        min: i64,
        /// Declared maximum
        max: i64,
    },
    /// Declared initial value outside the declared range
    InitialValueOutOfRange {
        /// Variable name
        name: String,
        /// Declared initial value
        initial: i64,
    },
    /// Parameter range violating `0 <= min <= max`
    InvalidParameterRange {
        /// Parameter name
        name: String,
        /// Declared minimum
        min: i64,
        /// Declared maximum
        max: i64,
    },
    /// Clock constraints must be convex: `!=` is rejected
    DisequalityClockConstraint,
    /// An expression references a clock id outside the declaration
    InvalidClockId(ClockId),
    /// An expression references an integer variable id outside the
    /// declaration
    InvalidIntVariableId(IntVarId),
    /// An expression references a parameter id outside the declaration
    InvalidParameterId(ParamId),
    /// An expression references a statement local that is not in scope
    InvalidLocalReference(usize),
    /// A statement assigns the reference clock
    ResetsReferenceClock,
    /// A synchronization vector without constraints
    EmptySynchronization,
    /// A synchronization vector constraining the same process twice
    DuplicateSyncProcess(String),
}

impl fmt::Display for BuilderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuilderError::DuplicateProcess(n) => write!(f, "process '{n}' is already declared"),
            BuilderError::DuplicateClock(n) => write!(f, "clock '{n}' is already declared"),
            BuilderError::DuplicateIntVariable(n) => {
                write!(f, "integer variable '{n}' is already declared")
            }
            BuilderError::DuplicateParameter(n) => {
                write!(f, "parameter '{n}' is already declared")
            }
            BuilderError::DuplicateEvent(n) => write!(f, "event '{n}' is already declared"),
            BuilderError::DuplicateLocation { process, name } => {
                write!(f, "process '{process}' already has a location '{name}'")
            }
            BuilderError::UnknownProcess(n) => write!(f, "process '{n}' is not declared"),
            BuilderError::UnknownClock(n) => write!(f, "clock '{n}' is not declared"),
            BuilderError::UnknownIntVariable(n) => {
                write!(f, "integer variable '{n}' is not declared")
            }
            BuilderError::UnknownParameter(n) => write!(f, "parameter '{n}' is not declared"),
            BuilderError::UnknownEvent(n) => write!(f, "event '{n}' is not declared"),
            BuilderError::UnknownLocation { process, name } => {
                write!(f, "process '{process}' has no location '{name}'")
            }
            BuilderError::InvalidVariableRange { name, min, max } => {
                write!(f, "variable '{name}' declares the empty range [{min}, {max}]")
            }
            BuilderError::InitialValueOutOfRange { name, initial } => {
                write!(f, "initial value {initial} of variable '{name}' is outside its range")
            }
            BuilderError::InvalidParameterRange { name, min, max } => {
                write!(f, "parameter '{name}' requires 0 <= min <= max, got [{min}, {max}]")
            }
            BuilderError::DisequalityClockConstraint => {
                write!(f, "clock constraints must be convex, '!=' is not supported")
            }
            BuilderError::InvalidClockId(id) => write!(f, "clock id {id} is not declared"),
            BuilderError::InvalidIntVariableId(id) => {
                write!(f, "integer variable id {id} is not declared")
            }
            BuilderError::InvalidParameterId(id) => {
                write!(f, "parameter id {id} is not declared")
            }
            BuilderError::InvalidLocalReference(depth) => {
                write!(f, "local reference {depth} is not in scope")
            }
            BuilderError::ResetsReferenceClock => {
                write!(f, "the reference clock cannot be assigned")
            }
            BuilderError::EmptySynchronization => {
                write!(f, "a synchronization vector needs at least one constraint")
            }
            BuilderError::DuplicateSyncProcess(n) => {
                write!(f, "process '{n}' appears twice in a synchronization vector")
            }
        }
    }
}

impl std::error::Error for BuilderError {}

/// First builder stage: declaration of processes, events, clocks, integer
/// variables and parameters
///
/// # Example
///
/// ```
/// use zora_timed_automaton::builder::SystemBuilder;
///
/// let builder = SystemBuilder::new("sys")
///     .with_process("P").unwrap()
///     .with_clock("x").unwrap()
///     .with_event("a").unwrap()
///     .initialize();
/// assert!(builder.clock("x").is_ok());
/// ```
#[derive(Debug, Clone)]
pub struct SystemBuilder {
    name: String,
    processes: Vec<ProcessDecl>,
    clocks: Vec<ClockDecl>,
    intvars: Vec<IntVarDecl>,
    params: Vec<ParamDecl>,
    events: Vec<String>,
}

impl SystemBuilder {
    /// Create a builder for a system with the given name
    pub fn new(name: impl ToString) -> Self {
        SystemBuilder {
            name: name.to_string(),
            processes: Vec::new(),
            clocks: Vec::new(),
            intvars: Vec::new(),
            params: Vec::new(),
            events: Vec::new(),
        }
    }

    /// Declare a process
    pub fn with_process(mut self, name: impl ToString) -> Result<Self, BuilderError> {
        let name = name.to_string();
        if self.processes.iter().any(|p| p.name == name) {
            return Err(BuilderError::DuplicateProcess(name));
        }
        self.processes.push(ProcessDecl { name });
        Ok(self)
    }

    /// Declare a clock
    pub fn with_clock(mut self, name: impl ToString) -> Result<Self, BuilderError> {
        let name = name.to_string();
        if self.clocks.iter().any(|c| c.name == name) {
            return Err(BuilderError::DuplicateClock(name));
        }
        self.clocks.push(ClockDecl { name });
        Ok(self)
    }

    /// Declare a bounded integer variable with its initial value
    pub fn with_int_variable(
        mut self,
        name: impl ToString,
        min: i64,
        max: i64,
        initial: i64,
    ) -> Result<Self, BuilderError> {
        let name = name.to_string();
        if self.intvars.iter().any(|v| v.name == name) {
            return Err(BuilderError::DuplicateIntVariable(name));
        }
        if min > max {
            return Err(BuilderError::InvalidVariableRange { name, min, max });
        }
        if initial < min || initial > max {
            return Err(BuilderError::InitialValueOutOfRange { name, initial });
        }
        self.intvars.push(IntVarDecl {
            name,
            min,
            max,
            initial,
        });
        Ok(self)
    }

    /// Declare a bounded parameter
    ///
    /// Parameters require `0 <= min <= max`; their value is fixed to `min`
    /// when the system is compiled.
    pub fn with_parameter(
        mut self,
        name: impl ToString,
        min: i64,
        max: i64,
    ) -> Result<Self, BuilderError> {
        let name = name.to_string();
        if self.params.iter().any(|p| p.name == name) {
            return Err(BuilderError::DuplicateParameter(name));
        }
        if min < 0 || min > max {
            return Err(BuilderError::InvalidParameterRange { name, min, max });
        }
        self.params.push(ParamDecl { name, min, max });
        Ok(self)
    }

    /// Declare an event
    pub fn with_event(mut self, name: impl ToString) -> Result<Self, BuilderError> {
        let name = name.to_string();
        if self.events.iter().any(|e| *e == name) {
            return Err(BuilderError::DuplicateEvent(name));
        }
        self.events.push(name);
        Ok(self)
    }

    /// Complete the declaration stage
    pub fn initialize(self) -> InitializedSystemBuilder {
        InitializedSystemBuilder {
            decl: self,
            locations: Vec::new(),
            location_index: HashMap::new(),
            edges: Vec::new(),
            syncs: Vec::new(),
            labels: Vec::new(),
        }
    }
}

/// Attributes of a location under declaration
#[derive(Debug, Clone, Default)]
pub struct LocationBuilder {
    initial: bool,
    committed: bool,
    labels: Vec<String>,
    invariant: Vec<Constraint>,
}

impl LocationBuilder {
    /// Create a location with no attributes
    pub fn new() -> Self {
        LocationBuilder::default()
    }

    /// Mark the location initial
    pub fn initial(mut self) -> Self {
        self.initial = true;
        self
    }

    /// Mark the location committed
    pub fn committed(mut self) -> Self {
        self.committed = true;
        self
    }

    /// Attach a label
    ///
    /// Labels are added to the system alphabet on first use.
    pub fn with_label(mut self, label: impl ToString) -> Self {
        self.labels.push(label.to_string());
        self
    }

    /// Add a conjunct to the invariant
    pub fn with_invariant(mut self, constraint: Constraint) -> Self {
        self.invariant.push(constraint);
        self
    }
}

/// Attributes of an edge under declaration
#[derive(Debug, Clone)]
pub struct EdgeBuilder {
    guard: Vec<Constraint>,
    statement: Statement,
}

impl Default for EdgeBuilder {
    fn default() -> Self {
        EdgeBuilder {
            guard: Vec::new(),
            statement: Statement::Nop,
        }
    }
}

impl EdgeBuilder {
    /// Create an edge with an empty guard and no effect
    pub fn new() -> Self {
        EdgeBuilder::default()
    }

    /// Add a conjunct to the guard
    pub fn with_guard(mut self, constraint: Constraint) -> Self {
        self.guard.push(constraint);
        self
    }

    /// Set the update statement
    pub fn with_statement(mut self, statement: Statement) -> Self {
        self.statement = statement;
        self
    }
}

/// Second builder stage: locations, edges and synchronizations
#[derive(Debug, Clone)]
pub struct InitializedSystemBuilder {
    decl: SystemBuilder,
    locations: Vec<Location>,
    location_index: HashMap<(ProcessId, String), LocationId>,
    edges: Vec<Edge>,
    syncs: Vec<SyncVector>,
    labels: Vec<String>,
}

impl InitializedSystemBuilder {
    /// Look up a process by name
    pub fn process(&self, name: &str) -> Result<ProcessId, BuilderError> {
        self.decl
            .processes
            .iter()
            .position(|p| p.name == name)
            .map(ProcessId)
            .ok_or_else(|| BuilderError::UnknownProcess(name.to_string()))
    }

    /// Look up a clock by name
    pub fn clock(&self, name: &str) -> Result<ClockId, BuilderError> {
        self.decl
            .clocks
            .iter()
            .position(|c| c.name == name)
            .map(|i| ClockId(i + 1))
            .ok_or_else(|| BuilderError::UnknownClock(name.to_string()))
    }

    /// Look up an integer variable by name
    pub fn int_variable(&self, name: &str) -> Result<IntVarId, BuilderError> {
        self.decl
            .intvars
            .iter()
            .position(|v| v.name == name)
            .map(IntVarId)
            .ok_or_else(|| BuilderError::UnknownIntVariable(name.to_string()))
    }

    /// Look up a parameter by name
    pub fn parameter(&self, name: &str) -> Result<ParamId, BuilderError> {
        self.decl
            .params
            .iter()
            .position(|p| p.name == name)
            .map(ParamId)
            .ok_or_else(|| BuilderError::UnknownParameter(name.to_string()))
    }

    /// Look up an event by name
    pub fn event(&self, name: &str) -> Result<EventId, BuilderError> {
        self.decl
            .events
            .iter()
            .position(|e| e == name)
            .map(EventId)
            .ok_or_else(|| BuilderError::UnknownEvent(name.to_string()))
    }

    /// Look up a location of a process by name
    pub fn location(&self, process: &str, name: &str) -> Result<LocationId, BuilderError> {
        let p = self.process(process)?;
        self.location_index
            .get(&(p, name.to_string()))
            .copied()
            .ok_or_else(|| BuilderError::UnknownLocation {
                process: process.to_string(),
                name: name.to_string(),
            })
    }

    /// Declare a location of a process
    pub fn with_location(
        mut self,
        process: &str,
        name: &str,
        attributes: LocationBuilder,
    ) -> Result<Self, BuilderError> {
        let p = self.process(process)?;
        if self.location_index.contains_key(&(p, name.to_string())) {
            return Err(BuilderError::DuplicateLocation {
                process: process.to_string(),
                name: name.to_string(),
            });
        }
        for constraint in &attributes.invariant {
            self.validate_constraint(constraint)?;
        }

        // Register labels on first use, in order of appearance.
        let mut label_ids = Vec::new();
        for label in &attributes.labels {
            let id = match self.labels.iter().position(|l| l == label) {
                Some(i) => i,
                None => {
                    self.labels.push(label.clone());
                    self.labels.len() - 1
                }
            };
            label_ids.push(id);
        }

        // The bitset is sized to the labels known so far; build() resizes
        // every location to the final alphabet.
        let mut bits = BitVec::new();
        for id in &label_ids {
            while bits.len() <= *id {
                bits.push(false);
            }
            bits.set(*id, true);
        }

        let id = LocationId(self.locations.len());
        self.location_index.insert((p, name.to_string()), id);
        self.locations.push(Location {
            name: name.to_string(),
            process: p,
            initial: attributes.initial,
            committed: attributes.committed,
            invariant: attributes.invariant,
            labels: bits,
        });
        Ok(self)
    }

    /// Declare an edge of a process
    pub fn with_edge(
        mut self,
        process: &str,
        source: &str,
        target: &str,
        event: &str,
        attributes: EdgeBuilder,
    ) -> Result<Self, BuilderError> {
        let p = self.process(process)?;
        let source = self.location(process, source)?;
        let target = self.location(process, target)?;
        let event = self.event(event)?;
        for constraint in &attributes.guard {
            self.validate_constraint(constraint)?;
        }
        self.validate_statement(&attributes.statement, 0)?;

        self.edges.push(Edge {
            process: p,
            source,
            target,
            event,
            guard: attributes.guard,
            statement: attributes.statement,
        });
        Ok(self)
    }

    /// Declare a synchronization vector
    ///
    /// Constraints are given as `(process, event, strength)` triples and are
    /// stored sorted by process id.
    pub fn with_sync(
        mut self,
        constraints: Vec<(&str, &str, SyncStrength)>,
    ) -> Result<Self, BuilderError> {
        if constraints.is_empty() {
            return Err(BuilderError::EmptySynchronization);
        }
        let mut resolved = Vec::new();
        for (process, event, strength) in constraints {
            let p = self.process(process)?;
            let e = self.event(event)?;
            if resolved.iter().any(|c: &SyncConstraint| c.process == p) {
                return Err(BuilderError::DuplicateSyncProcess(process.to_string()));
            }
            resolved.push(SyncConstraint {
                process: p,
                event: e,
                strength,
            });
        }
        resolved.sort_by_key(|c| c.process);
        self.syncs.push(SyncVector {
            constraints: resolved,
        });
        Ok(self)
    }

    /// Compile the declaration into an immutable [`System`]
    pub fn build(self) -> System {
        let process_count = self.decl.processes.len();
        let clock_count = self.decl.clocks.len();
        let label_count = self.labels.len();

        // Per-location label bitsets sized to the final alphabet.
        let mut locations = self.locations;
        for location in &mut locations {
            let mut bits = BitVec::repeat(false, label_count);
            for (i, set) in location.labels.iter().enumerate() {
                if *set {
                    bits.set(i, true);
                }
            }
            location.labels = bits;
        }

        // Per-location outgoing edge table, in edge declaration order.
        let mut outgoing = vec![Vec::new(); locations.len()];
        for (i, edge) in self.edges.iter().enumerate() {
            outgoing[edge.source.0].push(EdgeId(i));
        }

        // Initial locations per process, in location declaration order.
        let mut initial_locations = vec![Vec::new(); process_count];
        for (i, location) in locations.iter().enumerate() {
            if location.initial {
                initial_locations[location.process.0].push(LocationId(i));
            }
        }

        // Events taking part in some synchronization, per process.
        let event_count = self.decl.events.len();
        let mut synchronized = vec![BitVec::repeat(false, event_count); process_count];
        for sync in &self.syncs {
            for constraint in &sync.constraints {
                synchronized[constraint.process.0].set(constraint.event.0, true);
            }
        }

        // LU bounds over all guards and invariants.
        let intvars = self.decl.intvars;
        let params = self.decl.params;
        let intvar_range = |v: IntVarId| (intvars[v.0].min, intvars[v.0].max);
        let param_range = |p: ParamId| (params[p.0].min, params[p.0].max);
        let mut lu_bounds = LuBounds::new(clock_count);
        let clock_constraints = locations
            .iter()
            .flat_map(|l| l.invariant.iter())
            .chain(self.edges.iter().flat_map(|e| e.guard.iter()));
        for constraint in clock_constraints {
            if let Constraint::Clock(expr) = constraint {
                expr.record_lu(&mut lu_bounds, &intvar_range, &param_range);
            }
        }

        let param_values = params.iter().map(|p| p.min).collect();

        // Iteration budget: a diverging loop visits some integer valuation
        // twice, so the size of the integer state space bounds any
        // terminating run.
        let statement_fuel = intvars
            .iter()
            .fold(1u64, |acc, v| {
                let span = (v.max as i128 - v.min as i128 + 1).min(u64::MAX as i128) as u64;
                acc.saturating_mul(span)
            })
            .saturating_mul(4)
            .max(1024);

        System {
            name: self.decl.name,
            processes: self.decl.processes,
            clocks: self.decl.clocks,
            intvars,
            params,
            events: self.decl.events,
            labels: self.labels,
            locations,
            edges: self.edges,
            syncs: self.syncs,
            outgoing,
            initial_locations,
            synchronized,
            lu_bounds,
            param_values,
            statement_fuel,
        }
    }

    fn validate_int_expr(&self, expr: &IntExpr, depth: usize) -> Result<(), BuilderError> {
        match expr {
            IntExpr::Const(_) => Ok(()),
            IntExpr::Var(v) => {
                if v.0 >= self.decl.intvars.len() {
                    return Err(BuilderError::InvalidIntVariableId(*v));
                }
                Ok(())
            }
            IntExpr::Param(p) => {
                if p.0 >= self.decl.params.len() {
                    return Err(BuilderError::InvalidParameterId(*p));
                }
                Ok(())
            }
            IntExpr::Local(d) => {
                if *d >= depth {
                    return Err(BuilderError::InvalidLocalReference(*d));
                }
                Ok(())
            }
            IntExpr::Binary(lhs, _, rhs) => {
                self.validate_int_expr(lhs, depth)?;
                self.validate_int_expr(rhs, depth)
            }
            IntExpr::Neg(e) => self.validate_int_expr(e, depth),
        }
    }

    fn validate_bool_expr(&self, expr: &BoolExpr, depth: usize) -> Result<(), BuilderError> {
        match expr {
            BoolExpr::True | BoolExpr::False => Ok(()),
            BoolExpr::Cmp(lhs, _, rhs) => {
                self.validate_int_expr(lhs, depth)?;
                self.validate_int_expr(rhs, depth)
            }
            BoolExpr::And(lhs, rhs) | BoolExpr::Or(lhs, rhs) => {
                self.validate_bool_expr(lhs, depth)?;
                self.validate_bool_expr(rhs, depth)
            }
            BoolExpr::Not(e) => self.validate_bool_expr(e, depth),
        }
    }

    fn validate_clock_id(&self, clock: ClockId) -> Result<(), BuilderError> {
        if clock.0 > self.decl.clocks.len() {
            return Err(BuilderError::InvalidClockId(clock));
        }
        Ok(())
    }

    fn validate_constraint(&self, constraint: &Constraint) -> Result<(), BuilderError> {
        match constraint {
            Constraint::Int(expr) => self.validate_bool_expr(expr, 0),
            Constraint::Clock(ClockExpr { lhs, rhs, op, bound }) => {
                if *op == CmpOp::Ne {
                    return Err(BuilderError::DisequalityClockConstraint);
                }
                self.validate_clock_id(*lhs)?;
                self.validate_clock_id(*rhs)?;
                self.validate_int_expr(bound, 0)
            }
        }
    }

    fn validate_statement(&self, statement: &Statement, depth: usize) -> Result<(), BuilderError> {
        match statement {
            Statement::Nop => Ok(()),
            Statement::IntAssign { var, value } => {
                if var.0 >= self.decl.intvars.len() {
                    return Err(BuilderError::InvalidIntVariableId(*var));
                }
                self.validate_int_expr(value, depth)
            }
            Statement::ClockAssign { clock, base, value } => {
                if *clock == REFERENCE {
                    return Err(BuilderError::ResetsReferenceClock);
                }
                self.validate_clock_id(*clock)?;
                self.validate_clock_id(*base)?;
                self.validate_int_expr(value, depth)
            }
            Statement::Seq(statements) => {
                for s in statements {
                    self.validate_statement(s, depth)?;
                }
                Ok(())
            }
            Statement::If {
                condition,
                then_branch,
                else_branch,
            } => {
                self.validate_bool_expr(condition, depth)?;
                self.validate_statement(then_branch, depth)?;
                self.validate_statement(else_branch, depth)
            }
            Statement::While { condition, body } => {
                self.validate_bool_expr(condition, depth)?;
                self.validate_statement(body, depth)
            }
            Statement::Local { init, body } => {
                self.validate_int_expr(init, depth)?;
                self.validate_statement(body, depth + 1)
            }
        }
    }
}
