//! Clock identifiers, atomic clock constraints and clock resets
//!
//! Guards and invariants of a timed automaton are lowered to conjunctions of
//! [`ClockConstraint`]s of the form `x - y < c` / `x - y <= c`, and updates
//! are lowered to sequences of [`ClockReset`]s of the form `x := y + v`.
//! Both refer to clocks through flat [`ClockId`]s, where [`REFERENCE`] is the
//! synthetic reference clock that is always zero.

use std::fmt;

use crate::bound::Bound;

/// Flat identifier of a clock
///
/// Clock 0 is the reference clock; user clocks are numbered from 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClockId(pub usize);

/// The reference clock, fixed to value zero in every valuation
pub const REFERENCE: ClockId = ClockId(0);

impl fmt::Display for ClockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "x{}", self.0)
    }
}

/// Atomic clock constraint `x_lhs - x_rhs (bound)`
///
/// With `rhs` the reference clock this is an upper bound on `lhs`, and with
/// `lhs` the reference clock a lower bound on `rhs`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClockConstraint {
    /// Left-hand side clock of the difference
    pub lhs: ClockId,
    /// Right-hand side clock of the difference
    pub rhs: ClockId,
    /// Bound on the difference
    pub bound: Bound,
}

impl ClockConstraint {
    /// Create the constraint `lhs - rhs (bound)`
    pub fn new(lhs: ClockId, rhs: ClockId, bound: Bound) -> Self {
        ClockConstraint { lhs, rhs, bound }
    }

    /// Create the upper-bound constraint `x (bound)`
    pub fn upper(x: ClockId, bound: Bound) -> Self {
        ClockConstraint::new(x, REFERENCE, bound)
    }

    /// Create the lower-bound constraint `x >= c` (or `x > c` when strict),
    /// encoded as `0 - x <= -c` (resp. `< -c`)
    pub fn lower(x: ClockId, value: i64, strict: bool) -> Self {
        let bound = if strict {
            Bound::lt(-value)
        } else {
            Bound::le(-value)
        };
        ClockConstraint::new(REFERENCE, x, bound)
    }

    /// Render the constraint using the given clock names
    ///
    /// Names are indexed by user clock id minus one; the reference clock is
    /// rendered as `0`.
    pub fn display_with_names(&self, names: &[String]) -> String {
        let name = |c: ClockId| {
            if c == REFERENCE {
                "0".to_string()
            } else {
                names[c.0 - 1].clone()
            }
        };
        format!("{}-{}{}", name(self.lhs), name(self.rhs), self.bound)
    }
}

impl fmt::Display for ClockConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}{}", self.lhs, self.rhs, self.bound)
    }
}

/// Clock reset `x_left := x_right + value`
///
/// The three reset shapes of a timed automaton are all instances:
/// `x := c` is `x := 0 + c` with the reference clock on the right,
/// `x := y` is `x := y + 0`, and `x := y + c` is the general form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClockReset {
    /// Clock being assigned
    pub left: ClockId,
    /// Clock read on the right-hand side (possibly [`REFERENCE`])
    pub right: ClockId,
    /// Constant added to the right-hand side clock
    pub value: i64,
}

impl ClockReset {
    /// Create the reset `left := right + value`
    pub fn new(left: ClockId, right: ClockId, value: i64) -> Self {
        debug_assert!(left != REFERENCE, "cannot reset the reference clock");
        ClockReset { left, right, value }
    }

    /// Create the reset `x := value`
    pub fn to_value(x: ClockId, value: i64) -> Self {
        ClockReset::new(x, REFERENCE, value)
    }

    /// Create the reset `x := y`
    pub fn to_clock(x: ClockId, y: ClockId) -> Self {
        ClockReset::new(x, y, 0)
    }
}

impl fmt::Display for ClockReset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.right == REFERENCE {
            write!(f, "{}:={}", self.left, self.value)
        } else if self.value == 0 {
            write!(f, "{}:={}", self.left, self.right)
        } else {
            write!(f, "{}:={}+{}", self.left, self.right, self.value)
        }
    }
}

/// Per-clock LU bounds driving the ExtraLU+ extrapolation
///
/// For every user clock the table records the maximal constant the clock is
/// compared against as a lower bound (`L`) and as an upper bound (`U`).
/// `None` means the clock is never compared in that direction, which the
/// extrapolation treats as minus infinity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LuBounds {
    lower: Vec<Option<i64>>,
    upper: Vec<Option<i64>>,
}

impl LuBounds {
    /// Create an LU table for `clock_count` user clocks with no recorded
    /// comparisons
    pub fn new(clock_count: usize) -> Self {
        LuBounds {
            lower: vec![None; clock_count],
            upper: vec![None; clock_count],
        }
    }

    /// Number of user clocks covered by the table
    pub fn clock_count(&self) -> usize {
        self.lower.len()
    }

    /// Record that `x` is compared as a lower bound against constant `c`
    pub fn update_lower(&mut self, x: ClockId, c: i64) {
        debug_assert!(x != REFERENCE);
        let slot = &mut self.lower[x.0 - 1];
        *slot = Some(slot.map_or(c, |prev| prev.max(c)));
    }

    /// Record that `x` is compared as an upper bound against constant `c`
    pub fn update_upper(&mut self, x: ClockId, c: i64) {
        debug_assert!(x != REFERENCE);
        let slot = &mut self.upper[x.0 - 1];
        *slot = Some(slot.map_or(c, |prev| prev.max(c)));
    }

    /// Record the constants of an atomic constraint
    ///
    /// An upper-bound constraint `x - 0 <= c` contributes `c` to `U(x)`, a
    /// lower-bound constraint `0 - x <= -c` contributes `c` to `L(x)`, and a
    /// diagonal constraint `x - y <= c` contributes to `U(x)` and `L(y)`.
    pub fn record(&mut self, constraint: &ClockConstraint) {
        if constraint.bound.is_infinite() {
            return;
        }
        let c = constraint.bound.value();
        if constraint.lhs != REFERENCE {
            self.update_upper(constraint.lhs, c);
        }
        if constraint.rhs != REFERENCE {
            self.update_lower(constraint.rhs, -c);
        }
    }

    /// Lower bound of clock `x`, `None` meaning minus infinity
    pub fn lower(&self, x: ClockId) -> Option<i64> {
        if x == REFERENCE {
            return Some(0);
        }
        self.lower[x.0 - 1]
    }

    /// Upper bound of clock `x`, `None` meaning minus infinity
    pub fn upper(&self, x: ClockId) -> Option<i64> {
        if x == REFERENCE {
            return Some(0);
        }
        self.upper[x.0 - 1]
    }
}
