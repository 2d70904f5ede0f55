// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Starburst-style motion primitives.
//!
//! Each input value is tracked by a fast and a slow leaky integrator that rise
//! instantly and decay at their own rates. Where the fast trace leads the slow one
//! more on one side of a neighbor pair than on the other, something has just moved
//! onto that side.

use serde::{Deserialize, Serialize};

/// Direction index of a star motion signal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(usize)]
pub enum MotionDirection {
    Left = 0,
    Right = 1,
    Down = 2,
    Up = 3,
}

impl MotionDirection {
    pub const COUNT: usize = 4;
    pub const ALL: [MotionDirection; 4] = [
        MotionDirection::Left,
        MotionDirection::Right,
        MotionDirection::Down,
        MotionDirection::Up,
    ];

    /// Feature index of this direction for source feature `feature`
    #[inline]
    pub fn star_feature(self, feature: usize) -> usize {
        feature * Self::COUNT + self as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MotionParams {
    /// Time constant (frames) of the slow integrator
    pub slow_tau: f32,
    /// Time constant (frames) of the fast integrator
    pub fast_tau: f32,
    /// Multiplier on the fast-minus-slow difference between neighbors
    pub gain: f32,
    /// Time constant (frames) of full-field integration and its energy normalizer
    pub integ_tau: f32,
}

impl Default for MotionParams {
    fn default() -> Self {
        Self {
            slow_tau: 10.0,
            fast_tau: 5.0,
            gain: 20.0,
            integ_tau: 5.0,
        }
    }
}

impl MotionParams {
    pub fn fast_dt(&self) -> f32 {
        1.0 / self.fast_tau
    }

    pub fn slow_dt(&self) -> f32 {
        1.0 / self.slow_tau
    }

    pub fn integ_dt(&self) -> f32 {
        1.0 / self.integ_tau
    }

    /// One frame of a rise-instantly, decay-slowly integrator
    #[inline]
    pub fn integrate(value: f32, trace: f32, dt: f32) -> f32 {
        if value > trace {
            value
        } else {
            trace + dt * (value - trace)
        }
    }

    /// Opponent motion for a neighbor pair ordered lower → higher coordinate.
    ///
    /// Returns `(toward_lower, toward_higher)`; at most one is non-zero.
    #[inline]
    pub fn star_pair(&self, fast_lo: f32, slow_lo: f32, fast_hi: f32, slow_hi: f32) -> (f32, f32) {
        let min_act = fast_lo.min(slow_lo).min(fast_hi).min(slow_hi);
        let lo_del = fast_lo - slow_lo;
        let hi_del = fast_hi - slow_hi;
        if lo_del > hi_del {
            (min_act * (self.gain * (lo_del - hi_del)).min(1.0), 0.0)
        } else {
            (0.0, min_act * (self.gain * (hi_del - lo_del)).min(1.0))
        }
    }

    /// Integrate raw full-field sums normalized by integrated energy.
    ///
    /// `state` is `[left, right, down, up, energy]`; directions read 0 while the
    /// energy normalizer is not positive.
    pub fn full_field_step(&self, energy: f32, raw: &[f32; 4], state: &mut [f32; 5]) {
        let dt = self.integ_dt();
        state[4] += dt * (energy - state[4]);
        let norm = state[4];
        for (d, &r) in raw.iter().enumerate() {
            let target = if norm > 0.0 { r / norm } else { 0.0 };
            state[d] += dt * (target - state[d]);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_integrator_rises_instantly_and_decays() {
        let p = MotionParams::default();
        assert_eq!(MotionParams::integrate(0.8, 0.1, p.fast_dt()), 0.8);
        let decayed = MotionParams::integrate(0.0, 0.8, p.fast_dt());
        assert_relative_eq!(decayed, 0.64, epsilon = 1e-6);
        let slow = MotionParams::integrate(0.0, 0.8, p.slow_dt());
        assert!(slow > decayed);
    }

    #[test]
    fn test_star_pair_signals_fresh_side() {
        let p = MotionParams::default();
        // higher side just turned on: fast leads slow there
        let (lo, hi) = p.star_pair(0.5, 0.5, 0.9, 0.6);
        assert_eq!(lo, 0.0);
        assert!(hi > 0.0);
        let (lo, hi) = p.star_pair(0.9, 0.6, 0.5, 0.5);
        assert!(lo > 0.0);
        assert_eq!(hi, 0.0);
    }

    #[test]
    fn test_full_field_zero_energy_reads_zero() {
        let p = MotionParams::default();
        let mut state = [0.0; 5];
        p.full_field_step(0.0, &[1.0, 2.0, 3.0, 4.0], &mut state);
        assert_eq!(&state[..4], &[0.0; 4]);
    }

    #[test]
    fn test_star_feature_layout() {
        assert_eq!(MotionDirection::Up.star_feature(0), 3);
        assert_eq!(MotionDirection::Left.star_feature(2), 8);
    }
}
