//! A library to describe and execute networks of communicating timed automata
//!
//! This crate contains the static model of a system of timed processes and its
//! discrete semantics. A system is declared through the staged
//! [`builder::SystemBuilder`], which resolves names, validates the
//! declaration and compiles it into an immutable [`system::System`] with flat
//! identifier tables.
//!
//! On top of the compiled system, the [`semantics`] module implements the
//! discrete layer of the product automaton: lazy enumeration of initial
//! location tuples, enumeration of synchronized and asynchronous edge tuples
//! respecting committed locations, and the `initial`/`next` functions that
//! evaluate guards and statements over integer valuations while emitting
//! clock constraints and resets symbolically.
//!
//! The continuous part (zones) is deliberately absent here: a zone graph is
//! built by composing this crate with `zora-zone-graph`.

use std::fmt;

pub mod builder;
pub mod expressions;
pub mod semantics;
pub mod state;
pub mod statement;
pub mod static_analysis;
pub mod system;

pub use zora_dbm::ClockId;

macro_rules! flat_id {
    ( $( $(#[$doc:meta])* $name:ident ),* $(,)? ) => {
        $(
            $(#[$doc])*
            #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
            pub struct $name(pub usize);

            impl fmt::Display for $name {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    write!(f, "{}", self.0)
                }
            }
        )*
    };
}

flat_id!(
    /// Flat identifier of a process
    ProcessId,
    /// Flat identifier of a location
    LocationId,
    /// Flat identifier of an edge
    EdgeId,
    /// Flat identifier of an event
    EventId,
    /// Flat identifier of an integer variable slot
    IntVarId,
    /// Flat identifier of a bounded parameter
    ParamId,
    /// Flat identifier of a label in the alphabet
    LabelId,
);
