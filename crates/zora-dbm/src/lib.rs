//! Canonical difference-bound matrices for the ZORA model checker
//!
//! This crate implements the zone representation used by the symbolic
//! reachability core:
//! - [`Bound`]: difference bounds `(c, <)` / `(c, <=)` with infinity
//!   saturation,
//! - [`Dbm`]: canonical difference-bound matrices with the zone operations
//!   (intersection, reset, time elapse, inclusion) and the ExtraLU+
//!   extrapolation that keeps the zone graph finite,
//! - [`ClockConstraint`] / [`ClockReset`]: the atomic constraint and update
//!   forms guards and statements are lowered to,
//! - [`LuBounds`]: the per-clock LU table driving extrapolation.
//!
//! All matrices handed to operations are expected canonical; every operation
//! either preserves canonical form or re-closes before returning, and every
//! operation that can empty the zone reports it through [`ZoneState`].

pub mod bound;
pub mod constraint;
pub mod dbm;

pub use bound::Bound;
pub use constraint::{ClockConstraint, ClockId, ClockReset, LuBounds, REFERENCE};
pub use dbm::{Dbm, ZoneState};
