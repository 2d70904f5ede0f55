// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! KWTA convergence loop over a grid of pools.
//!
//! Pools are the outer `[y][x]` positions of a Values slot; the units of a pool are
//! its `[polarity][feature]` entries. Layer inhibition is computed over every unit,
//! pool inhibition within each pool, and a unit sees the larger of the two.

use ndarray::{s, ArrayView4, ArrayViewMut3, ArrayViewMut4, Axis};
use tracing::trace;

use super::fffb::{FffbParams, InhibState};
use super::nxx1::Nxx1Params;
use crate::exec::RowMap;
use crate::geometry::Dims2;

/// Convergence is not tested until this many rounds have completed
pub const MIN_ROUNDS_BEFORE_EXIT: usize = 4;

/// Per-channel conductance values (excitatory, leak, inhibitory, potassium)
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Chans {
    pub e: f32,
    pub l: f32,
    pub i: f32,
    pub k: f32,
}

impl Chans {
    pub const fn new(e: f32, l: f32, i: f32, k: f32) -> Self {
        Self { e, l, i, k }
    }

    fn minus_scalar(&self, v: f32) -> Self {
        Self::new(self.e - v, self.l - v, self.i - v, self.k - v)
    }

    fn scalar_minus(v: f32, other: &Self) -> Self {
        Self::new(v - other.e, v - other.l, v - other.i, v - other.k)
    }
}

/// Parameters of one KWTA invocation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KwtaParams {
    pub on: bool,
    /// Upper bound on convergence rounds
    pub iters: usize,
    /// Early-exit threshold on the largest activation change of a round
    pub del_act_thr: f32,
    /// Inhibition computed over every unit of the slot
    pub layer: FffbParams,
    /// Inhibition computed within each pool
    pub pool: FffbParams,
    pub xx1: Nxx1Params,
    /// Activation integration time constant
    pub act_tau: f32,
    /// Maximal conductances
    pub gbar: Chans,
    /// Reversal potentials
    pub erev: Chans,
    erev_sub_thr: Chans,
    thr_sub_erev: Chans,
    act_dt: f32,
}

impl Default for KwtaParams {
    fn default() -> Self {
        let mut p = Self {
            on: true,
            iters: 20,
            del_act_thr: 0.005,
            layer: FffbParams::default(),
            pool: FffbParams {
                gi: 2.0,
                ..FffbParams::default()
            },
            xx1: Nxx1Params::default(),
            act_tau: 3.0,
            gbar: Chans::new(0.5, 0.1, 1.0, 1.0),
            erev: Chans::new(1.0, 0.3, 0.3, 0.1),
            erev_sub_thr: Chans::default(),
            thr_sub_erev: Chans::default(),
            act_dt: 0.0,
        };
        p.update();
        p
    }
}

impl KwtaParams {
    /// Recompute derived values. Must follow any parameter change.
    pub fn update(&mut self) {
        self.layer.update();
        self.pool.update();
        self.xx1.update();
        self.erev_sub_thr = self.erev.minus_scalar(self.xx1.thr);
        self.thr_sub_erev = Chans::scalar_minus(self.xx1.thr, &self.erev);
        self.act_dt = 1.0 / self.act_tau;
    }

    pub fn act_dt(&self) -> f32 {
        self.act_dt
    }

    /// Excitation needed to reach threshold against inhibition `gi`
    #[inline]
    pub fn ge_thr_from_g(&self, gi: f32) -> f32 {
        (self.gbar.i * gi * self.erev_sub_thr.i + self.gbar.l * self.erev_sub_thr.l)
            / self.thr_sub_erev.e
    }

    /// One activation step. Returns the new activation and the change applied.
    #[inline]
    pub fn act_from_g(&self, ge_thr: f32, ge: f32, act: f32) -> (f32, f32) {
        let target = self.xx1.noisy_xx1(ge * self.gbar.e - ge_thr);
        let del = self.act_dt * (target - act);
        (act + del, del)
    }
}

/// Orthogonal-neighbor inhibition applied to 4-orientation line features
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NeighInhib {
    pub on: bool,
    /// Gain on the strongest same-orientation neighbor along the orthogonal axis
    pub gi: f32,
}

impl Default for NeighInhib {
    fn default() -> Self {
        Self { on: true, gi: 0.6 }
    }
}

/// Lifecycle of one KWTA invocation. Both terminal states are normal outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConvergenceState {
    Initializing,
    Iterating { round: usize },
    Converged { rounds: usize },
    MaxItersReached { rounds: usize },
}

impl ConvergenceState {
    /// Transition after `completed` rounds whose largest change was `max_del`
    pub fn advance(self, completed: usize, max_del: f32, params: &KwtaParams) -> Self {
        if completed >= MIN_ROUNDS_BEFORE_EXIT && max_del < params.del_act_thr {
            ConvergenceState::Converged { rounds: completed }
        } else if completed >= params.iters {
            ConvergenceState::MaxItersReached { rounds: completed }
        } else {
            ConvergenceState::Iterating { round: completed }
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ConvergenceState::Converged { .. } | ConvergenceState::MaxItersReached { .. }
        )
    }

    pub fn rounds(&self) -> usize {
        match *self {
            ConvergenceState::Initializing => 0,
            ConvergenceState::Iterating { round } => round,
            ConvergenceState::Converged { rounds }
            | ConvergenceState::MaxItersReached { rounds } => rounds,
        }
    }
}

/// Logical extent of the pooled values
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolShape {
    pub pools: Dims2,
    pub polarities: usize,
    pub features: usize,
}

impl PoolShape {
    pub fn units(&self) -> usize {
        self.polarities * self.features
    }
}

/// Result of one KWTA invocation for one batch entry
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KwtaOutcome {
    pub state: ConvergenceState,
    /// Largest activation change in the final round
    pub max_del_act: f32,
    /// Final layer-scope inhibition record
    pub layer: InhibState,
}

impl KwtaOutcome {
    pub fn rounds(&self) -> usize {
        self.state.rounds()
    }
}

#[derive(Debug, Clone, Copy)]
struct RowStats {
    act_sum: f32,
    act_max: f32,
    max_del: f32,
}

/// Run pooled KWTA for one batch entry.
///
/// `ge` and `act` are `[poolY][poolX][polarity][feature]`; `inhibs` is
/// `[poolY + 1][poolX + 1][InhibVar]` with the layer record stored at
/// `[poolY][poolX]`. Views may be larger than `shape`; only the leading extent is
/// touched. `ext_gi`, when present, is extra per-unit drive from neighbor
/// inhibition.
pub fn run_pooled<M: RowMap>(
    params: &KwtaParams,
    shape: PoolShape,
    ge: ArrayView4<f32>,
    ext_gi: Option<ArrayView4<f32>>,
    act: ArrayViewMut4<f32>,
    inhibs: ArrayViewMut3<f32>,
    rows: &M,
) -> KwtaOutcome {
    let (py, px) = (shape.pools.y, shape.pools.x);
    let (np, nf) = (shape.polarities, shape.features);
    let ge = ge.slice_move(s![..py, ..px, ..np, ..nf]);
    let ext = ext_gi.map(|e| e.slice_move(s![..py, ..px, ..np, ..nf]));
    let mut act = act.slice_move(s![..py, ..px, ..np, ..nf]);
    let mut inhibs = inhibs.slice_move(s![..=py, ..=px, ..]);

    act.fill(0.0);
    inhibs.fill(0.0);

    let mut layer = InhibState::default();

    if !params.on {
        act.assign(&ge);
        return KwtaOutcome {
            state: ConvergenceState::Converged { rounds: 0 },
            max_del_act: 0.0,
            layer,
        };
    }

    let units = shape.units() as f32;
    let total = units * (py * px) as f32;

    let mut ge_sum = 0.0f32;
    let mut ge_max = f32::NEG_INFINITY;
    for y in 0..py {
        for x in 0..px {
            let pool = ge.slice(s![y, x, .., ..]);
            let sum = pool.sum();
            let max = pool.fold(f32::NEG_INFINITY, |m, &v| m.max(v));
            let stats = InhibState {
                ge_avg: sum / units,
                ge_max: max,
                ..Default::default()
            };
            stats.store(inhibs.slice_mut(s![y, x, ..]));
            ge_sum += sum;
            ge_max = ge_max.max(max);
        }
    }
    layer.ge_avg = ge_sum / total;
    layer.ge_max = ge_max;

    let mut state = ConvergenceState::Initializing;
    let mut max_del = 0.0f32;
    if params.iters == 0 {
        state = ConvergenceState::MaxItersReached { rounds: 0 };
    }

    while !state.is_terminal() {
        params.layer.inhib(&mut layer);
        let lay_gi = layer.gi;

        let (mut pool_rows, _) = inhibs.view_mut().split_at(Axis(0), py);
        let work: Vec<_> = act
            .outer_iter_mut()
            .zip(pool_rows.outer_iter_mut())
            .enumerate()
            .collect();

        let ge = &ge;
        let ext = ext.as_ref();
        let row_stats = rows.map_rows(work, |(y, (mut act_row, mut inh_row))| {
            let mut stats = RowStats {
                act_sum: 0.0,
                act_max: f32::NEG_INFINITY,
                max_del: 0.0,
            };
            for x in 0..px {
                let mut pool = InhibState::load(inh_row.row(x));
                params.pool.inhib(&mut pool);
                pool.lay_gi = lay_gi;
                let gi_pool = lay_gi.max(pool.gi);

                let mut sum = 0.0f32;
                let mut max = f32::NEG_INFINITY;
                for p in 0..np {
                    for f in 0..nf {
                        let mut gi = gi_pool;
                        if let Some(ext) = ext {
                            let e = ext[[y, x, p, f]];
                            gi = gi.max(params.pool.gi * params.pool.ff_inhib(e, e));
                        }
                        let ge_thr = params.ge_thr_from_g(gi);
                        let (new_act, del) =
                            params.act_from_g(ge_thr, ge[[y, x, p, f]], act_row[[x, p, f]]);
                        act_row[[x, p, f]] = new_act;
                        stats.max_del = stats.max_del.max(del.abs());
                        sum += new_act;
                        max = max.max(new_act);
                    }
                }
                pool.act_avg = sum / units;
                pool.act_max = max;
                pool.store(inh_row.row_mut(x));

                stats.act_sum += sum;
                stats.act_max = stats.act_max.max(max);
            }
            stats
        });

        let mut act_sum = 0.0f32;
        let mut act_max = f32::NEG_INFINITY;
        max_del = 0.0;
        for r in &row_stats {
            act_sum += r.act_sum;
            act_max = act_max.max(r.act_max);
            max_del = max_del.max(r.max_del);
        }
        layer.act_avg = act_sum / total;
        layer.act_max = act_max;

        state = state.advance(state.rounds() + 1, max_del, params);
    }

    layer.store(inhibs.slice_mut(s![py, px, ..]));
    trace!(
        rounds = state.rounds(),
        max_del_act = max_del,
        layer_gi = layer.gi,
        "kwta finished"
    );

    KwtaOutcome {
        state,
        max_del_act: max_del,
        layer,
    }
}
