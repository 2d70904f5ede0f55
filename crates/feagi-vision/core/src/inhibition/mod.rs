// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*
 * Copyright 2025 Neuraville Inc.
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 */

//! # Inhibition Engine
//!
//! Feedforward/feedback (FFFB) inhibition and the k-winners-take-all style
//! convergence loop that turns filter drive into sparse activity.
//!
//! ## Per round
//!
//! ```text
//! ffNetin = avgGe + MaxVsAvg * (maxGe - avgGe)
//! ffi     = FF * max(0, ffNetin - FF0)
//! fbi    += FBDt * (FB * avgAct - fbi)
//! Gi      = gain * (ffi + fbi)
//! gi      = max(layerGi, poolGi)            (pool scope)
//! geThr   = (Gbar.I*gi*(Erev.I-Thr) + Gbar.L*(Erev.L-Thr)) / (Thr-Erev.E)
//! act    += (1/ActTau) * (NoisyXX1(ge*Gbar.E - geThr) - act)
//! ```

mod fffb;
mod kwta;
mod nxx1;

pub use fffb::{FffbParams, InhibState, InhibVar};
pub use kwta::{
    run_pooled, Chans, ConvergenceState, KwtaOutcome, KwtaParams, NeighInhib, PoolShape,
    MIN_ROUNDS_BEFORE_EXIT,
};
pub use nxx1::Nxx1Params;
