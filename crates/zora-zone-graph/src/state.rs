//! Symbolic states and transitions of the zone graph
//!
//! A [`ZgState`] is the shared triple `(vloc, intval, zone)`; its components
//! are canonical representatives handed out by the pools, so two states with
//! equal payloads share identity component-wise. The *discrete part* of a
//! state is the pair `(vloc, intval)`: subsumption compares states with equal
//! discrete parts by zone inclusion.

use std::cmp::Ordering;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

use zora_dbm::Dbm;
use zora_timed_automaton::state::{Intval, Vedge, Vloc};

/// Symbolic state of the zone graph
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ZgState {
    /// Tuple of current locations
    pub vloc: Rc<Vloc>,
    /// Valuation of the integer variables
    pub intval: Rc<Intval>,
    /// Zone over the clocks
    pub zone: Rc<Dbm>,
}

impl ZgState {
    /// Hash of the discrete part `(vloc, intval)` only
    ///
    /// All states with the same discrete part land in the same bucket of the
    /// subsumption graph, where they are compared by zone inclusion.
    pub fn discrete_hash(&self) -> u64 {
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        self.vloc.hash(&mut hasher);
        self.intval.hash(&mut hasher);
        hasher.finish()
    }

    /// Check whether two states have the same discrete part
    pub fn same_discrete_part(&self, other: &ZgState) -> bool {
        (Rc::ptr_eq(&self.vloc, &other.vloc) || self.vloc == other.vloc)
            && (Rc::ptr_eq(&self.intval, &other.intval) || self.intval == other.intval)
    }

    /// Subsumption: same discrete part and zone included in `other`'s
    pub fn is_le(&self, other: &ZgState) -> bool {
        self.same_discrete_part(other) && self.zone.is_le(&other.zone)
    }

    /// Total lexical order on `(vloc, intval, zone)`
    ///
    /// Used to sort nodes deterministically for output.
    pub fn lexical_cmp(&self, other: &ZgState) -> Ordering {
        self.vloc
            .cmp(&other.vloc)
            .then_with(|| self.intval.cmp(&other.intval))
            .then_with(|| self.zone.cmp(&other.zone))
    }
}

/// Symbolic transition of the zone graph
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ZgTransition {
    /// Tuple of fired edges; empty for initial pseudo-transitions
    pub vedge: Rc<Vedge>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use zora_timed_automaton::LocationId;

    fn state(locs: Vec<usize>, ints: Vec<i64>, clock_count: usize) -> ZgState {
        ZgState {
            vloc: Rc::new(Vloc::new(locs.into_iter().map(LocationId).collect())),
            intval: Rc::new(Intval::new(ints)),
            zone: Rc::new(Dbm::zero(clock_count)),
        }
    }

    #[test]
    fn test_discrete_hash_ignores_zone() {
        let a = state(vec![0], vec![1], 1);
        let mut b = state(vec![0], vec![1], 1);
        let mut zone = Dbm::zero(1);
        zone.time_elapse();
        b.zone = Rc::new(zone);

        assert_eq!(a.discrete_hash(), b.discrete_hash());
        assert!(a.same_discrete_part(&b));
        assert_ne!(a, b);
    }

    #[test]
    fn test_subsumption_requires_equal_discrete_part() {
        let a = state(vec![0], vec![0], 1);
        let b = state(vec![1], vec![0], 1);
        assert!(!a.is_le(&b));

        let mut larger = state(vec![0], vec![0], 1);
        let mut zone = Dbm::zero(1);
        zone.time_elapse();
        larger.zone = Rc::new(zone);
        assert!(a.is_le(&larger));
        assert!(!larger.is_le(&a));
    }

    #[test]
    fn test_lexical_order() {
        let a = state(vec![0], vec![0], 1);
        let b = state(vec![1], vec![0], 1);
        assert_eq!(a.lexical_cmp(&b), Ordering::Less);
        assert_eq!(a.lexical_cmp(&a), Ordering::Equal);
    }
}
