// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Feedforward / feedback inhibition parameters and per-pool state

use ndarray::{ArrayView1, ArrayViewMut1};

/// Layout of one inhibition record in the Inhibs arena
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(usize)]
pub enum InhibVar {
    FFi = 0,
    FBi,
    Gi,
    GiOrig,
    LayGi,
    GeAvg,
    GeMax,
    ActAvg,
    ActMax,
}

impl InhibVar {
    pub const COUNT: usize = 9;
}

/// Inhibition record for one pool (or the whole layer)
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct InhibState {
    /// Feedforward inhibition
    pub ffi: f32,
    /// Feedback inhibition, integrated over rounds
    pub fbi: f32,
    /// Total inhibitory conductance
    pub gi: f32,
    /// Gi before any external combination
    pub gi_orig: f32,
    /// Layer Gi seen by this pool
    pub lay_gi: f32,
    pub ge_avg: f32,
    pub ge_max: f32,
    pub act_avg: f32,
    pub act_max: f32,
}

impl InhibState {
    pub fn load(v: ArrayView1<f32>) -> Self {
        Self {
            ffi: v[InhibVar::FFi as usize],
            fbi: v[InhibVar::FBi as usize],
            gi: v[InhibVar::Gi as usize],
            gi_orig: v[InhibVar::GiOrig as usize],
            lay_gi: v[InhibVar::LayGi as usize],
            ge_avg: v[InhibVar::GeAvg as usize],
            ge_max: v[InhibVar::GeMax as usize],
            act_avg: v[InhibVar::ActAvg as usize],
            act_max: v[InhibVar::ActMax as usize],
        }
    }

    pub fn store(&self, mut v: ArrayViewMut1<f32>) {
        v[InhibVar::FFi as usize] = self.ffi;
        v[InhibVar::FBi as usize] = self.fbi;
        v[InhibVar::Gi as usize] = self.gi;
        v[InhibVar::GiOrig as usize] = self.gi_orig;
        v[InhibVar::LayGi as usize] = self.lay_gi;
        v[InhibVar::GeAvg as usize] = self.ge_avg;
        v[InhibVar::GeMax as usize] = self.ge_max;
        v[InhibVar::ActAvg as usize] = self.act_avg;
        v[InhibVar::ActMax as usize] = self.act_max;
    }

    /// Zero the inhibition terms, keeping the Ge/Act statistics
    pub fn zero_inhib(&mut self) {
        self.ffi = 0.0;
        self.fbi = 0.0;
        self.gi = 0.0;
        self.gi_orig = 0.0;
        self.lay_gi = 0.0;
    }
}

/// FFFB parameters for one scope (layer or pool)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FffbParams {
    /// When false this scope contributes no inhibition
    pub on: bool,
    /// Overall inhibition gain
    pub gi: f32,
    /// Feedforward gain on average (and optionally max) excitation
    pub ff: f32,
    /// Feedback gain on average activity
    pub fb: f32,
    /// Feedback integration time constant
    pub fb_tau: f32,
    /// Blend of max over average excitation for the feedforward term (0..1)
    pub max_vs_avg: f32,
    /// Feedforward offset; excitation below this produces no inhibition
    pub ff0: f32,
    /// 1 / fb_tau, refreshed by [`FffbParams::update`]
    pub fb_dt: f32,
}

impl Default for FffbParams {
    fn default() -> Self {
        let mut p = Self {
            on: true,
            gi: 1.8,
            ff: 1.0,
            fb: 1.0,
            fb_tau: 1.4,
            max_vs_avg: 0.0,
            ff0: 0.1,
            fb_dt: 0.0,
        };
        p.update();
        p
    }
}

impl FffbParams {
    pub fn update(&mut self) {
        self.fb_dt = 1.0 / self.fb_tau;
    }

    /// Feedforward inhibition from average and maximum excitation
    #[inline]
    pub fn ff_inhib(&self, avg_ge: f32, max_ge: f32) -> f32 {
        let ff_netin = avg_ge + self.max_vs_avg * (max_ge - avg_ge);
        if ff_netin > self.ff0 {
            self.ff * (ff_netin - self.ff0)
        } else {
            0.0
        }
    }

    #[inline]
    pub fn fb_inhib(&self, avg_act: f32) -> f32 {
        self.fb * avg_act
    }

    /// One integration step of feedback inhibition toward `target`
    #[inline]
    pub fn fb_update(&self, fbi: f32, target: f32) -> f32 {
        fbi + self.fb_dt * (target - fbi)
    }

    /// Update `state` from its current Ge/Act statistics
    pub fn inhib(&self, state: &mut InhibState) {
        if !self.on {
            state.zero_inhib();
            return;
        }
        state.ffi = self.ff_inhib(state.ge_avg, state.ge_max);
        let target = self.fb_inhib(state.act_avg);
        state.fbi = self.fb_update(state.fbi, target);
        state.gi = self.gi * (state.ffi + state.fbi);
        state.gi_orig = state.gi;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::Array1;

    fn peaked() -> InhibState {
        InhibState {
            ge_avg: 0.3,
            ge_max: 0.9,
            ..Default::default()
        }
    }

    #[test]
    fn test_zero_gains_drive_gi_to_zero() {
        let params = FffbParams {
            ff: 0.0,
            fb: 0.0,
            ..Default::default()
        };
        let mut state = peaked();
        state.fbi = 0.7;
        state.act_avg = 0.5;
        for _ in 0..60 {
            params.inhib(&mut state);
        }
        assert!(state.gi.abs() < 1e-6);
        assert_eq!(state.ffi, 0.0);
    }

    #[test]
    fn test_max_vs_avg_increases_gi() {
        let mut last = -1.0;
        for step in 0..=10 {
            let params = FffbParams {
                max_vs_avg: step as f32 / 10.0,
                ..Default::default()
            };
            let mut state = peaked();
            params.inhib(&mut state);
            assert!(state.gi > last, "Gi must grow with MaxVsAvg");
            last = state.gi;
        }
    }

    #[test]
    fn test_ff0_threshold() {
        let params = FffbParams::default();
        assert_eq!(params.ff_inhib(0.05, 0.05), 0.0);
        assert_relative_eq!(params.ff_inhib(0.5, 0.5), 0.4, epsilon = 1e-6);
    }

    #[test]
    fn test_disabled_scope_zeroes_inhibition() {
        let params = FffbParams {
            on: false,
            ..Default::default()
        };
        let mut state = peaked();
        state.gi = 2.0;
        state.fbi = 1.0;
        params.inhib(&mut state);
        assert_eq!(state.gi, 0.0);
        assert_eq!(state.fbi, 0.0);
        assert_eq!(state.ge_max, 0.9);
    }

    #[test]
    fn test_load_store_round_trip() {
        let state = InhibState {
            ffi: 1.0,
            fbi: 2.0,
            gi: 3.0,
            gi_orig: 4.0,
            lay_gi: 5.0,
            ge_avg: 6.0,
            ge_max: 7.0,
            act_avg: 8.0,
            act_max: 9.0,
        };
        let mut buf = Array1::<f32>::zeros(InhibVar::COUNT);
        state.store(buf.view_mut());
        assert_eq!(buf[InhibVar::ActMax as usize], 9.0);
        assert_eq!(InhibState::load(buf.view()), state);
    }
}
