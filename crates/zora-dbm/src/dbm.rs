//! Canonical difference-bound matrices
//!
//! A [`Dbm`] of dimension `d` stores `d * d` [`Bound`]s and represents the
//! convex set of clock valuations `{ v | v(x_i) - v(x_j) (M[i][j]) }`, with
//! clock 0 the reference clock fixed to zero. All operations expect their
//! input in canonical (tightest) form and either preserve it or re-close the
//! matrix before returning. Operations that can produce the empty zone report
//! it through [`ZoneState`]; callers treat an empty result as a discarded
//! successor, not as an error.

use std::fmt;

use crate::bound::Bound;
use crate::constraint::{ClockConstraint, ClockId, ClockReset, LuBounds, REFERENCE};

/// Emptiness status returned by zone operations
///
/// The status must be inspected: dropping it silently would let an empty
/// zone flow into the exploration as if it were a real successor.
#[must_use]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZoneState {
    /// The zone still contains at least one valuation
    NonEmpty,
    /// The zone became empty
    Empty,
}

impl ZoneState {
    /// Check whether the status signals the empty zone
    pub fn is_empty(self) -> bool {
        matches!(self, ZoneState::Empty)
    }
}

/// A difference-bound matrix in canonical form
///
/// Equality, hashing and ordering are over the canonical matrix, so two
/// [`Dbm`]s denote the same zone iff they compare equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Dbm {
    dim: usize,
    bounds: Vec<Bound>,
}

impl Dbm {
    /// The zone containing exactly the zero valuation, over `clock_count`
    /// user clocks
    pub fn zero(clock_count: usize) -> Self {
        let dim = clock_count + 1;
        Dbm {
            dim,
            bounds: vec![Bound::LE_ZERO; dim * dim],
        }
    }

    /// The unconstrained zone over `clock_count` user clocks
    pub fn universe(clock_count: usize) -> Self {
        let dim = clock_count + 1;
        let mut dbm = Dbm {
            dim,
            bounds: vec![Bound::INFINITY; dim * dim],
        };
        for i in 0..dim {
            dbm.set(i, i, Bound::LE_ZERO);
        }
        dbm
    }

    /// Dimension of the matrix, i.e. number of clocks including the
    /// reference clock
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Number of user clocks
    pub fn clock_count(&self) -> usize {
        self.dim - 1
    }

    #[inline]
    fn index(&self, i: usize, j: usize) -> usize {
        debug_assert!(i < self.dim && j < self.dim);
        i * self.dim + j
    }

    #[inline]
    fn at(&self, i: usize, j: usize) -> Bound {
        self.bounds[self.index(i, j)]
    }

    #[inline]
    fn set(&mut self, i: usize, j: usize, bound: Bound) {
        let index = self.index(i, j);
        self.bounds[index] = bound;
    }

    /// Entry of the matrix for the pair of clocks `(i, j)`
    pub fn get(&self, i: ClockId, j: ClockId) -> Bound {
        self.at(i.0, j.0)
    }

    /// Check whether the zone is empty
    ///
    /// An empty zone has a negative entry on the diagonal.
    pub fn is_empty(&self) -> bool {
        (0..self.dim).any(|i| self.at(i, i) < Bound::LE_ZERO)
    }

    /// Mark the zone empty
    fn make_empty(&mut self) {
        self.set(0, 0, Bound::LT_ZERO);
    }

    /// Check whether every valuation of the zone satisfies the constraint
    pub fn satisfies(&self, constraint: &ClockConstraint) -> bool {
        self.get(constraint.lhs, constraint.rhs) <= constraint.bound
    }

    /// Zone inclusion: `self` is included in `other`
    ///
    /// On canonical matrices inclusion is the elementwise order on bounds.
    pub fn is_le(&self, other: &Dbm) -> bool {
        debug_assert_eq!(self.dim, other.dim, "inconsistent DBM dimensions");
        self.bounds
            .iter()
            .zip(other.bounds.iter())
            .all(|(a, b)| a <= b)
    }

    /// Floyd-Warshall canonicalisation
    ///
    /// Tightens every entry to the shortest path between its clocks. The
    /// result is canonical, or [`ZoneState::Empty`] when a negative cycle is
    /// found.
    pub fn close(&mut self) -> ZoneState {
        for k in 0..self.dim {
            for i in 0..self.dim {
                let ik = self.at(i, k);
                if ik.is_infinite() {
                    continue;
                }
                for j in 0..self.dim {
                    let through_k = ik.add(&self.at(k, j));
                    if through_k < self.at(i, j) {
                        self.set(i, j, through_k);
                    }
                }
            }
        }

        if self.is_empty() {
            self.make_empty();
            return ZoneState::Empty;
        }
        ZoneState::NonEmpty
    }

    /// Re-close the matrix after entry `(i, j)` was tightened
    ///
    /// Propagates the new bound along every path through `(i, j)`. Quadratic
    /// instead of the cubic full closure.
    fn close_from(&mut self, i: usize, j: usize) {
        let ij = self.at(i, j);
        for p in 0..self.dim {
            let pi = self.at(p, i);
            if pi.is_infinite() {
                continue;
            }
            let p_via = pi.add(&ij);
            for q in 0..self.dim {
                let jq = self.at(j, q);
                if jq.is_infinite() {
                    continue;
                }
                let pq = p_via.add(&jq);
                if pq < self.at(p, q) {
                    self.set(p, q, pq);
                }
            }
        }
    }

    /// Tighten entry `(i, j)` to `min(M[i][j], bound)` and restore canonical
    /// form
    pub fn tighten(&mut self, i: ClockId, j: ClockId, bound: Bound) -> ZoneState {
        if bound >= self.at(i.0, j.0) {
            return ZoneState::NonEmpty;
        }

        self.set(i.0, j.0, bound);
        self.close_from(i.0, j.0);

        if self.is_empty() {
            self.make_empty();
            return ZoneState::Empty;
        }
        ZoneState::NonEmpty
    }

    /// Intersect the zone with a conjunction of atomic constraints
    pub fn conjunct(&mut self, constraints: &[ClockConstraint]) -> ZoneState {
        for c in constraints {
            if self.tighten(c.lhs, c.rhs, c.bound).is_empty() {
                return ZoneState::Empty;
            }
        }
        ZoneState::NonEmpty
    }

    /// Apply the clock resets in order
    pub fn reset(&mut self, resets: &[ClockReset]) -> ZoneState {
        for r in resets {
            if self.apply_reset(r).is_empty() {
                return ZoneState::Empty;
            }
        }
        ZoneState::NonEmpty
    }

    /// Apply one reset `x := y + v`
    ///
    /// For `x != y` the assignment rewrites row and column of `x` from those
    /// of `y`, which preserves canonical form. The self-referential shift
    /// `x := x + v` translates both, then re-imposes nonnegativity of `x`.
    fn apply_reset(&mut self, r: &ClockReset) -> ZoneState {
        let x = r.left.0;
        let y = r.right.0;
        debug_assert!(x != 0, "cannot reset the reference clock");

        let pos = Bound::le(r.value);
        let neg = Bound::le(-r.value);

        if x == y {
            if r.value == 0 {
                return ZoneState::NonEmpty;
            }
            for i in 0..self.dim {
                if i == x {
                    continue;
                }
                let xi = self.at(x, i);
                self.set(x, i, xi.add(&pos));
                let ix = self.at(i, x);
                self.set(i, x, ix.add(&neg));
            }
            // A negative shift may push the clock below zero.
            return self.tighten(REFERENCE, ClockId(x), Bound::LE_ZERO);
        }

        for i in 0..self.dim {
            if i == x {
                continue;
            }
            let yi = self.at(y, i);
            self.set(x, i, yi.add(&pos));
            let iy = self.at(i, y);
            self.set(i, x, iy.add(&neg));
        }

        // Resetting to a negative constant yields an empty zone.
        if self.at(x, 0) < Bound::LE_ZERO {
            self.make_empty();
            return ZoneState::Empty;
        }
        ZoneState::NonEmpty
    }

    /// Time elapse: open every upper bound while keeping the lower bounds
    ///
    /// Canonical form is preserved.
    pub fn time_elapse(&mut self) {
        for i in 1..self.dim {
            self.set(i, 0, Bound::INFINITY);
        }
    }

    /// ExtraLU+ extrapolation with per-clock (local) LU bounds
    ///
    /// Enlarges the zone above the recorded LU bounds so that the set of
    /// reachable zones per discrete state is finite. A missing bound is
    /// treated as minus infinity, which removes the corresponding entry
    /// entirely. The result is re-canonicalised before returning.
    pub fn extra_lu_plus_local(&mut self, lu: &LuBounds) {
        debug_assert_eq!(lu.clock_count(), self.clock_count());
        debug_assert!(!self.is_empty(), "cannot extrapolate the empty zone");

        let src = self.clone();

        for i in 0..self.dim {
            for j in 0..self.dim {
                if i == j || src.at(i, j).is_infinite() {
                    continue;
                }

                let l_i = lu.lower(ClockId(i));
                let u_j = lu.upper(ClockId(j));

                if i != 0 && exceeds(src.at(i, j), l_i) {
                    self.set(i, j, Bound::INFINITY);
                } else if i != 0 && neg_exceeds(src.at(0, i), l_i) {
                    self.set(i, j, Bound::INFINITY);
                } else if i != 0 && j != 0 && neg_exceeds(src.at(0, j), u_j) {
                    self.set(i, j, Bound::INFINITY);
                } else if i == 0 && neg_exceeds(src.at(0, j), u_j) {
                    let widened = match u_j {
                        Some(u) => Bound::lt(-u),
                        None => Bound::INFINITY,
                    };
                    self.set(0, j, widened);
                }
            }
        }

        // Widening cannot empty the zone, but it can break tightness.
        let state = self.close();
        debug_assert!(!state.is_empty());
    }

    /// Render the zone as a conjunction of constraints over the given clock
    /// names
    ///
    /// Entries are emitted in row-major order, so the rendering is
    /// deterministic for a given canonical matrix. The empty zone renders as
    /// `false` and the unconstrained zone as `true`.
    pub fn display_with_names(&self, names: &[String]) -> String {
        if self.is_empty() {
            return "false".to_string();
        }

        let mut atoms = Vec::new();
        for i in 0..self.dim {
            for j in 0..self.dim {
                if i == j {
                    continue;
                }
                let bound = self.at(i, j);
                if bound.is_infinite() {
                    continue;
                }
                // Skip the implicit nonnegativity bound of the reference row.
                if i == 0 && bound == Bound::LE_ZERO {
                    continue;
                }
                let c = ClockConstraint::new(ClockId(i), ClockId(j), bound);
                atoms.push(c.display_with_names(names));
            }
        }

        if atoms.is_empty() {
            return "true".to_string();
        }
        atoms.join(" & ")
    }
}

impl fmt::Display for Dbm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<String> = (1..self.dim).map(|i| format!("x{i}")).collect();
        write!(f, "{}", self.display_with_names(&names))
    }
}

/// Check `bound > threshold` where a missing threshold is minus infinity
fn exceeds(bound: Bound, threshold: Option<i64>) -> bool {
    match threshold {
        None => true,
        Some(t) => bound.is_infinite() || bound.value() > t,
    }
}

/// Check `-bound > threshold` where a missing threshold is minus infinity
/// and an infinite bound negates to minus infinity
fn neg_exceeds(bound: Bound, threshold: Option<i64>) -> bool {
    match threshold {
        None => !bound.is_infinite(),
        Some(t) => !bound.is_infinite() && -bound.value() > t,
    }
}
