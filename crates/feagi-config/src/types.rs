// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Configuration type definitions
//!
//! Every struct maps to a section of `feagi_vision.toml`. Missing sections and
//! fields fall back to their defaults.

use serde::{Deserialize, Deserializer, Serialize};

/// Root configuration structure
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct VisionConfig {
    pub system: SystemConfig,
    pub backend: BackendSection,
    pub kwta: KwtaConfig,
    pub neigh_inhib: NeighInhibConfig,
    pub motion: MotionConfig,
    pub logging: LoggingSection,
}

/// Process-level settings
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SystemConfig {
    /// Worker threads for the CPU backend (0 = rayon default)
    pub threads: usize,
    /// Data-parallel copies processed per run
    pub batch: usize,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            threads: 0,
            batch: 1,
        }
    }
}

/// Execution backend selection
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct BackendSection {
    /// cpu | sequential | wgpu | auto
    pub kind: String,
    /// full | data-dependent
    pub barrier: String,
    /// Per-frame work below which `auto` never picks the GPU
    pub gpu_min_work_items: usize,
}

impl Default for BackendSection {
    fn default() -> Self {
        Self {
            kind: "auto".to_string(),
            barrier: "full".to_string(),
            gpu_min_work_items: 4_000_000,
        }
    }
}

/// Feedforward/feedback inhibition for one scope (layer or pool)
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct FffbConfig {
    pub on: bool,
    pub gi: f32,
    pub ff: f32,
    pub fb: f32,
    pub fb_tau: f32,
    pub max_vs_avg: f32,
    pub ff0: f32,
}

impl Default for FffbConfig {
    fn default() -> Self {
        Self {
            on: true,
            gi: 1.8,
            ff: 1.0,
            fb: 1.0,
            fb_tau: 1.4,
            max_vs_avg: 0.0,
            ff0: 0.1,
        }
    }
}

/// k-winners-take-all convergence settings
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct KwtaConfig {
    pub on: bool,
    pub iters: usize,
    pub del_act_thr: f32,
    pub act_tau: f32,
    pub layer: FffbConfig,
    /// Missing fields fall back to the pool preset, not to [`FffbConfig::default`]
    #[serde(deserialize_with = "pool_fffb")]
    pub pool: FffbConfig,
}

impl Default for KwtaConfig {
    fn default() -> Self {
        Self {
            on: true,
            iters: 20,
            del_act_thr: 0.005,
            act_tau: 3.0,
            layer: FffbConfig::default(),
            pool: FffbConfig::pool_default(),
        }
    }
}

impl FffbConfig {
    /// Pool-scope preset: stronger inhibition than the layer
    pub fn pool_default() -> Self {
        Self {
            gi: 2.0,
            ..Self::default()
        }
    }
}

/// Field-wise overrides for one FFFB scope
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FffbOverrides {
    on: Option<bool>,
    gi: Option<f32>,
    ff: Option<f32>,
    fb: Option<f32>,
    fb_tau: Option<f32>,
    max_vs_avg: Option<f32>,
    ff0: Option<f32>,
}

impl FffbOverrides {
    fn apply(self, base: FffbConfig) -> FffbConfig {
        FffbConfig {
            on: self.on.unwrap_or(base.on),
            gi: self.gi.unwrap_or(base.gi),
            ff: self.ff.unwrap_or(base.ff),
            fb: self.fb.unwrap_or(base.fb),
            fb_tau: self.fb_tau.unwrap_or(base.fb_tau),
            max_vs_avg: self.max_vs_avg.unwrap_or(base.max_vs_avg),
            ff0: self.ff0.unwrap_or(base.ff0),
        }
    }
}

fn pool_fffb<'de, D>(deserializer: D) -> Result<FffbConfig, D::Error>
where
    D: Deserializer<'de>,
{
    FffbOverrides::deserialize(deserializer).map(|o| o.apply(FffbConfig::pool_default()))
}

/// Orthogonal-neighbor inhibition of line features
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct NeighInhibConfig {
    pub on: bool,
    pub gi: f32,
}

impl Default for NeighInhibConfig {
    fn default() -> Self {
        Self { on: true, gi: 0.6 }
    }
}

/// Motion integration time constants (frames) and gain
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct MotionConfig {
    pub fast_tau: f32,
    pub slow_tau: f32,
    pub gain: f32,
    pub integ_tau: f32,
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            fast_tau: 5.0,
            slow_tau: 10.0,
            gain: 20.0,
            integ_tau: 5.0,
        }
    }
}

/// Logging output
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingSection {
    /// trace | debug | info | warn | error
    pub level: String,
    /// text | json
    pub format: String,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "text".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: VisionConfig = toml::from_str(
            r#"
            [kwta]
            iters = 40

            [kwta.pool]
            on = false
            "#,
        )
        .unwrap();
        assert_eq!(config.kwta.iters, 40);
        assert!(!config.kwta.pool.on);
        // untouched fields keep their per-scope defaults
        assert_eq!(config.kwta.pool.gi, 2.0);
        assert_eq!(
            config.kwta.pool,
            FffbConfig {
                on: false,
                ..FffbConfig::pool_default()
            }
        );
        assert_eq!(config.kwta.layer, FffbConfig::default());
        assert_eq!(config.motion, MotionConfig::default());
    }

    #[test]
    fn test_partial_pool_table_keeps_pool_preset() {
        let config: VisionConfig = toml::from_str("[kwta.pool]\non = true\n").unwrap();
        assert_eq!(config.kwta.pool, KwtaConfig::default().pool);

        let config: VisionConfig = toml::from_str("[kwta.pool]\nff0 = 0.2\n").unwrap();
        assert_eq!(config.kwta.pool.gi, KwtaConfig::default().pool.gi);
        assert_eq!(config.kwta.pool.ff0, 0.2);

        // a [kwta] table without a pool table keeps the whole preset
        let config: VisionConfig = toml::from_str("[kwta]\niters = 5\n").unwrap();
        assert_eq!(config.kwta.pool, FffbConfig::pool_default());
    }

    #[test]
    fn test_pool_default_is_stronger_than_layer() {
        let kwta = KwtaConfig::default();
        assert!(kwta.pool.gi > kwta.layer.gi);
    }
}
