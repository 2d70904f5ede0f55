// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Configuration wiring
//!
//! Turns `feagi_vision.toml` sections into the parameter types the core and the
//! engine consume, and builds execution contexts and logging from them.

use feagi_config::{
    FffbConfig, KwtaConfig, LoggingSection, MotionConfig, NeighInhibConfig, VisionConfig,
};
use feagi_observability::{CrateDebugFlags, LogFormat, LoggingConfig};
use feagi_vision_core::{FffbParams, KwtaParams, MotionParams, NeighInhib, Result, VisionError};
use feagi_vision_engine::{BackendConfig, BackendType, BarrierPolicy, ExecutionContext};

fn fffb_params(cfg: &FffbConfig) -> FffbParams {
    let mut params = FffbParams {
        on: cfg.on,
        gi: cfg.gi,
        ff: cfg.ff,
        fb: cfg.fb,
        fb_tau: cfg.fb_tau,
        max_vs_avg: cfg.max_vs_avg,
        ff0: cfg.ff0,
        ..FffbParams::default()
    };
    params.update();
    params
}

/// KWTA parameters; conductances and the activation function keep their defaults
pub fn kwta_params(cfg: &KwtaConfig) -> KwtaParams {
    let mut params = KwtaParams::default();
    params.on = cfg.on;
    params.iters = cfg.iters;
    params.del_act_thr = cfg.del_act_thr;
    params.act_tau = cfg.act_tau;
    params.layer = fffb_params(&cfg.layer);
    params.pool = fffb_params(&cfg.pool);
    params.update();
    params
}

pub fn neigh_inhib(cfg: &NeighInhibConfig) -> NeighInhib {
    NeighInhib {
        on: cfg.on,
        gi: cfg.gi,
    }
}

pub fn motion_params(cfg: &MotionConfig) -> MotionParams {
    MotionParams {
        slow_tau: cfg.slow_tau,
        fast_tau: cfg.fast_tau,
        gain: cfg.gain,
        integ_tau: cfg.integ_tau,
    }
}

pub fn backend_type(config: &VisionConfig) -> Result<BackendType> {
    config.backend.kind.parse()
}

pub fn barrier_policy(config: &VisionConfig) -> Result<BarrierPolicy> {
    match config.backend.barrier.to_lowercase().as_str() {
        "full" => Ok(BarrierPolicy::Full),
        "data-dependent" => Ok(BarrierPolicy::DataDependent),
        other => Err(VisionError::InvalidParameter(format!(
            "unknown barrier policy '{}'",
            other
        ))),
    }
}

/// Backend selection thresholds; `threads = 0` keeps rayon's global pool
pub fn backend_config(config: &VisionConfig) -> BackendConfig {
    BackendConfig {
        gpu_min_work_items: config.backend.gpu_min_work_items,
        threads: (config.system.threads > 0).then_some(config.system.threads),
        ..BackendConfig::default()
    }
}

/// Execution context for a pipeline producing `work_items` outputs per run
pub fn execution_context(config: &VisionConfig, work_items: usize) -> Result<ExecutionContext> {
    ExecutionContext::from_config(
        backend_type(config)?,
        work_items,
        &backend_config(config),
        barrier_policy(config)?,
    )
}

pub fn logging_config(cfg: &LoggingSection) -> anyhow::Result<LoggingConfig> {
    let format: LogFormat = cfg.format.parse().map_err(anyhow::Error::msg)?;
    Ok(LoggingConfig {
        level: cfg.level.clone(),
        format,
        ..LoggingConfig::default()
    })
}

/// Install console logging from the `[logging]` section plus `--debug-*` flags
pub fn init_logging(config: &VisionConfig, flags: &CrateDebugFlags) -> anyhow::Result<()> {
    let logging = logging_config(&config.logging)?;
    feagi_observability::init_console_logging(flags, &logging)
}
