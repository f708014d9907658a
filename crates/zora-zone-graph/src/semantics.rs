//! Zone semantics strategies and extrapolation policies
//!
//! A [`Semantics`] fixes where time elapse happens along a transition. Under
//! [`Semantics::Elapsed`], stored zones are closed under delay: the elapse is
//! applied at the *target* of each transition (and on the initial zone), so
//! a stored zone contains every valuation reachable by letting time pass.
//! Under [`Semantics::NonElapsed`], stored zones are "sharp" and the elapse
//! is applied at the *source* before firing the edge.
//!
//! Both strategies finish with the configured [`Extrapolation`], which is
//! what makes the set of reachable zones finite per discrete state.

use zora_dbm::{ClockConstraint, ClockReset, Dbm, LuBounds};
use zora_timed_automaton::semantics::StateStatus;

/// Where time elapse is applied along a transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Semantics {
    /// Stored zones are closed under delay; elapse happens at the target
    Elapsed,
    /// Stored zones are sharp; elapse happens at the source
    NonElapsed,
}

/// Widening operator applied to every produced zone
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Extrapolation {
    /// ExtraLU+ with per-clock LU bounds
    ExtraLuPlusLocal,
}

impl Extrapolation {
    /// Apply the widening to a non-empty zone
    pub fn apply(&self, zone: &mut Dbm, lu: &LuBounds) {
        match self {
            Extrapolation::ExtraLuPlusLocal => zone.extra_lu_plus_local(lu),
        }
    }
}

impl Semantics {
    /// Compute the initial zone for a tuple of initial locations
    ///
    /// Starts from the zero zone, intersects with the initial invariant,
    /// elapses when the strategy and the locations allow it, and widens.
    pub fn initial_zone(
        &self,
        clock_count: usize,
        delay_allowed: bool,
        invariant: &[ClockConstraint],
        extrapolation: Extrapolation,
        lu: &LuBounds,
    ) -> Result<Dbm, StateStatus> {
        let mut zone = Dbm::zero(clock_count);
        if zone.conjunct(invariant).is_empty() {
            return Err(StateStatus::ClocksSrcInvariantViolated);
        }

        if matches!(self, Semantics::Elapsed) && delay_allowed {
            zone.time_elapse();
            if zone.conjunct(invariant).is_empty() {
                return Err(StateStatus::ClocksSrcInvariantViolated);
            }
        }

        extrapolation.apply(&mut zone, lu);
        Ok(zone)
    }

    /// Compute the successor zone along a discrete transition
    ///
    /// The zone pipeline follows the strategy: guard, resets and target
    /// invariant always apply; the elapse step is taken at the source
    /// (non-elapsed) or at the target (elapsed), each guarded by the
    /// committed-location delay flags.
    #[allow(clippy::too_many_arguments)]
    pub fn next_zone(
        &self,
        zone: &Dbm,
        delay_src: bool,
        src_invariant: &[ClockConstraint],
        guard: &[ClockConstraint],
        resets: &[ClockReset],
        delay_tgt: bool,
        tgt_invariant: &[ClockConstraint],
        extrapolation: Extrapolation,
        lu: &LuBounds,
    ) -> Result<Dbm, StateStatus> {
        let mut zone = zone.clone();

        if matches!(self, Semantics::NonElapsed) && delay_src {
            zone.time_elapse();
            if zone.conjunct(src_invariant).is_empty() {
                return Err(StateStatus::ClocksSrcInvariantViolated);
            }
        }

        if zone.conjunct(guard).is_empty() {
            return Err(StateStatus::ClocksGuardViolated);
        }

        // A reset can only fail on a negative assigned value; the zone died
        // before reaching the target.
        if zone.reset(resets).is_empty() {
            return Err(StateStatus::ClocksTgtInvariantViolated);
        }

        if zone.conjunct(tgt_invariant).is_empty() {
            return Err(StateStatus::ClocksTgtInvariantViolated);
        }

        if matches!(self, Semantics::Elapsed) && delay_tgt {
            zone.time_elapse();
            if zone.conjunct(tgt_invariant).is_empty() {
                return Err(StateStatus::ClocksTgtInvariantViolated);
            }
        }

        extrapolation.apply(&mut zone, lu);
        Ok(zone)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use zora_dbm::{Bound, ClockId, REFERENCE};

    fn x() -> ClockId {
        ClockId(1)
    }

    #[test]
    fn test_elapsed_initial_zone_is_delay_closed() {
        let lu = LuBounds::new(1);
        let zone = Semantics::Elapsed
            .initial_zone(1, true, &[], Extrapolation::ExtraLuPlusLocal, &lu)
            .unwrap();
        // No invariant, no comparisons: one elapse step widens to universe.
        assert_eq!(zone, Dbm::universe(1));
    }

    #[test]
    fn test_elapsed_initial_zone_without_delay() {
        let lu = LuBounds::new(1);
        let zone = Semantics::Elapsed
            .initial_zone(1, false, &[], Extrapolation::ExtraLuPlusLocal, &lu)
            .unwrap();
        // Committed initial location: time cannot pass, the zone stays at 0.
        assert_eq!(zone.get(x(), REFERENCE), Bound::LE_ZERO);
    }

    #[test]
    fn test_non_elapsed_initial_zone_is_sharp() {
        let lu = LuBounds::new(1);
        let zone = Semantics::NonElapsed
            .initial_zone(1, true, &[], Extrapolation::ExtraLuPlusLocal, &lu)
            .unwrap();
        assert_eq!(zone.get(x(), REFERENCE), Bound::LE_ZERO);
    }

    #[test]
    fn test_initial_zone_invariant_violation() {
        let mut lu = LuBounds::new(1);
        lu.update_lower(x(), 1);
        // invariant x >= 1 excludes the zero valuation
        let result = Semantics::Elapsed.initial_zone(
            1,
            true,
            &[ClockConstraint::lower(x(), 1, false)],
            Extrapolation::ExtraLuPlusLocal,
            &lu,
        );
        assert_eq!(result, Err(StateStatus::ClocksSrcInvariantViolated));
    }

    #[test]
    fn test_next_zone_guard_violation() {
        let mut lu = LuBounds::new(1);
        lu.update_lower(x(), 5);
        let zone = Dbm::zero(1);

        // guard x >= 5 on a zone where x = 0 and no delay
        let result = Semantics::Elapsed.next_zone(
            &zone,
            false,
            &[],
            &[ClockConstraint::lower(x(), 5, false)],
            &[],
            false,
            &[],
            Extrapolation::ExtraLuPlusLocal,
            &lu,
        );
        assert_eq!(result, Err(StateStatus::ClocksGuardViolated));
    }

    #[test]
    fn test_next_zone_guard_reset_invariant() {
        let mut lu = LuBounds::new(1);
        // L covers the invariant constant, so the upper bound of the stored
        // zone survives the widening.
        lu.update_lower(x(), 2);
        lu.update_upper(x(), 2);

        // Elapsed source zone: x unbounded above.
        let mut src = Dbm::zero(1);
        src.time_elapse();

        // guard x >= 1, reset x := 0, invariant x <= 2, delay at target.
        let zone = Semantics::Elapsed
            .next_zone(
                &src,
                true,
                &[],
                &[ClockConstraint::lower(x(), 1, false)],
                &[ClockReset::to_value(x(), 0)],
                true,
                &[ClockConstraint::upper(x(), Bound::le(2))],
                Extrapolation::ExtraLuPlusLocal,
                &lu,
            )
            .unwrap();

        // After reset and delay under x <= 2: 0 <= x <= 2.
        assert_eq!(zone.get(x(), REFERENCE), Bound::le(2));
        assert_eq!(zone.get(REFERENCE, x()), Bound::LE_ZERO);
    }

    #[test]
    fn test_next_zone_target_invariant_violation() {
        let mut lu = LuBounds::new(1);
        lu.update_upper(x(), 1);

        // x = 3 cannot enter a location with invariant x <= 1.
        let mut src = Dbm::zero(1);
        let state = src.reset(&[ClockReset::to_value(x(), 3)]);
        assert!(!state.is_empty());

        let result = Semantics::Elapsed.next_zone(
            &src,
            false,
            &[],
            &[],
            &[],
            false,
            &[ClockConstraint::upper(x(), Bound::le(1))],
            Extrapolation::ExtraLuPlusLocal,
            &lu,
        );
        assert_eq!(result, Err(StateStatus::ClocksTgtInvariantViolated));
    }
}
