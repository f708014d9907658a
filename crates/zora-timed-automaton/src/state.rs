//! Discrete state components: location tuples, integer valuations and edge
//! tuples
//!
//! These are the shared payloads of a symbolic state. They are plain value
//! types here; the zone-graph layer hash-conses them into reference-counted
//! canonical representatives.

use std::fmt;

use crate::system::System;
use crate::{EdgeId, LocationId, ProcessId};

/// Tuple of current locations, one per process
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Vloc(Vec<LocationId>);

impl Vloc {
    /// Create a location tuple
    pub fn new(locations: Vec<LocationId>) -> Self {
        Vloc(locations)
    }

    /// Number of processes
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check whether the tuple is empty (zero-process system)
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Location of a process
    pub fn get(&self, p: ProcessId) -> LocationId {
        self.0[p.0]
    }

    /// Replace the location of a process
    pub fn set(&mut self, p: ProcessId, l: LocationId) {
        self.0[p.0] = l;
    }

    /// Iterate over the locations by increasing process id
    pub fn iter(&self) -> impl Iterator<Item = LocationId> + '_ {
        self.0.iter().copied()
    }

    /// Render the tuple with location names, e.g. `<l0,m1>`
    pub fn display_with(&self, system: &System) -> String {
        let names: Vec<&str> = self.0.iter().map(|l| system.location(*l).name()).collect();
        format!("<{}>", names.join(","))
    }
}

/// Valuation of the flattened integer variables
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Intval(Vec<i64>);

impl Intval {
    /// Create a valuation
    pub fn new(values: Vec<i64>) -> Self {
        Intval(values)
    }

    /// Values by increasing variable id
    pub fn values(&self) -> &[i64] {
        &self.0
    }

    /// Mutable access for the statement layer
    pub fn values_mut(&mut self) -> &mut [i64] {
        &mut self.0
    }

    /// Render the valuation with variable names, e.g. `n=0,m=1`
    pub fn display_with(&self, system: &System) -> String {
        let parts: Vec<String> = self
            .0
            .iter()
            .enumerate()
            .map(|(i, v)| format!("{}={}", system.intvar_name(crate::IntVarId(i)), v))
            .collect();
        parts.join(",")
    }
}

/// Tuple of edges fired by one transition
///
/// Contains one `(process, edge)` pair per participating process, ordered by
/// increasing process id. An asynchronous transition has exactly one pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Vedge(Vec<(ProcessId, EdgeId)>);

impl Vedge {
    /// Create an edge tuple; pairs are sorted by process id
    pub fn new(mut pairs: Vec<(ProcessId, EdgeId)>) -> Self {
        pairs.sort_by_key(|(p, _)| *p);
        Vedge(pairs)
    }

    /// The empty tuple of an initial pseudo-transition
    pub fn empty() -> Self {
        Vedge(Vec::new())
    }

    /// Number of participating processes
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check whether the tuple is empty
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Pairs by increasing process id
    pub fn pairs(&self) -> &[(ProcessId, EdgeId)] {
        &self.0
    }

    /// Render the tuple, e.g. `<P@l0->l1:a,Q@m0->m1:a>`
    pub fn display_with(&self, system: &System) -> String {
        let parts: Vec<String> = self
            .0
            .iter()
            .map(|(p, e)| {
                let edge = system.edge(*e);
                format!(
                    "{}@{}->{}:{}",
                    system.process_name(*p),
                    system.location(edge.source()).name(),
                    system.location(edge.target()).name(),
                    system.event_name(edge.event()),
                )
            })
            .collect();
        format!("<{}>", parts.join(","))
    }
}

impl fmt::Display for Vloc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(|l| l.to_string()).collect();
        write!(f, "<{}>", parts.join(","))
    }
}

impl fmt::Display for Intval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(|v| v.to_string()).collect();
        write!(f, "{}", parts.join(","))
    }
}

impl fmt::Display for Vedge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(|(p, e)| format!("{p}@{e}")).collect();
        write!(f, "<{}>", parts.join(","))
    }
}
