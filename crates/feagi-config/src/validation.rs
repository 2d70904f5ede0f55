// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Configuration validation
//!
//! This module provides validation logic to ensure configuration values are
//! within valid ranges and name known backends, barriers and log settings.

use crate::{ConfigError, ConfigResult, FffbConfig, VisionConfig};

const BACKEND_KINDS: &[&str] = &["cpu", "parallel", "sequential", "serial", "wgpu", "gpu", "auto"];
const BARRIER_POLICIES: &[&str] = &["full", "data-dependent"];
const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];
const LOG_FORMATS: &[&str] = &["text", "pretty", "json"];

/// Validation errors that can occur during config validation
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigValidationError {
    NotPositive { field: String, value: f32 },
    Negative { field: String, value: f32 },
    OutOfRange { field: String, value: f32, min: f32, max: f32 },
    UnknownChoice { field: String, value: String, allowed: &'static [&'static str] },
    InvalidValue { field: String, reason: String },
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotPositive { field, value } => {
                write!(f, "{} = {} must be greater than 0", field, value)
            }
            Self::Negative { field, value } => {
                write!(f, "{} = {} must not be negative", field, value)
            }
            Self::OutOfRange { field, value, min, max } => {
                write!(f, "{} = {} is outside [{}, {}]", field, value, min, max)
            }
            Self::UnknownChoice { field, value, allowed } => {
                write!(
                    f,
                    "{} = '{}' is not one of: {}",
                    field,
                    value,
                    allowed.join(", ")
                )
            }
            Self::InvalidValue { field, reason } => {
                write!(f, "Invalid configuration value for {}: {}", field, reason)
            }
        }
    }
}

/// Validate the complete configuration
///
/// Checks for:
/// - Positive time constants and iteration counts
/// - Non-negative gains
/// - Known backend, barrier and logging choices
///
/// # Errors
///
/// Returns `ConfigError::ValidationError` listing every problem found
pub fn validate_config(config: &VisionConfig) -> ConfigResult<()> {
    let errors = collect_errors(config);
    if errors.is_empty() {
        return Ok(());
    }
    let error_messages = errors
        .iter()
        .map(|e| format!("  - {}", e))
        .collect::<Vec<_>>()
        .join("\n");
    Err(ConfigError::ValidationError(format!(
        "Configuration validation failed:\n{}",
        error_messages
    )))
}

/// Every problem in `config`, in section order
pub fn collect_errors(config: &VisionConfig) -> Vec<ConfigValidationError> {
    let mut errors = Vec::new();
    validate_system(config, &mut errors);
    validate_choices(config, &mut errors);
    validate_kwta(config, &mut errors);
    validate_motion(config, &mut errors);
    errors
}

fn positive(field: &str, value: f32, errors: &mut Vec<ConfigValidationError>) {
    if !(value > 0.0) {
        errors.push(ConfigValidationError::NotPositive {
            field: field.to_string(),
            value,
        });
    }
}

fn non_negative(field: &str, value: f32, errors: &mut Vec<ConfigValidationError>) {
    if !(value >= 0.0) {
        errors.push(ConfigValidationError::Negative {
            field: field.to_string(),
            value,
        });
    }
}

fn choice(
    field: &str,
    value: &str,
    allowed: &'static [&'static str],
    errors: &mut Vec<ConfigValidationError>,
) {
    if !allowed.contains(&value.to_lowercase().as_str()) {
        errors.push(ConfigValidationError::UnknownChoice {
            field: field.to_string(),
            value: value.to_string(),
            allowed,
        });
    }
}

fn validate_system(config: &VisionConfig, errors: &mut Vec<ConfigValidationError>) {
    if config.system.batch == 0 {
        errors.push(ConfigValidationError::InvalidValue {
            field: "system.batch".to_string(),
            reason: "must be at least 1".to_string(),
        });
    }
}

fn validate_choices(config: &VisionConfig, errors: &mut Vec<ConfigValidationError>) {
    choice("backend.kind", &config.backend.kind, BACKEND_KINDS, errors);
    choice("backend.barrier", &config.backend.barrier, BARRIER_POLICIES, errors);
    choice("logging.level", &config.logging.level, LOG_LEVELS, errors);
    choice("logging.format", &config.logging.format, LOG_FORMATS, errors);
}

fn validate_fffb(scope: &str, fffb: &FffbConfig, errors: &mut Vec<ConfigValidationError>) {
    non_negative(&format!("kwta.{}.gi", scope), fffb.gi, errors);
    non_negative(&format!("kwta.{}.ff", scope), fffb.ff, errors);
    non_negative(&format!("kwta.{}.fb", scope), fffb.fb, errors);
    non_negative(&format!("kwta.{}.ff0", scope), fffb.ff0, errors);
    positive(&format!("kwta.{}.fb_tau", scope), fffb.fb_tau, errors);
    if !(0.0..=1.0).contains(&fffb.max_vs_avg) {
        errors.push(ConfigValidationError::OutOfRange {
            field: format!("kwta.{}.max_vs_avg", scope),
            value: fffb.max_vs_avg,
            min: 0.0,
            max: 1.0,
        });
    }
}

fn validate_kwta(config: &VisionConfig, errors: &mut Vec<ConfigValidationError>) {
    let kwta = &config.kwta;
    if kwta.iters == 0 {
        errors.push(ConfigValidationError::InvalidValue {
            field: "kwta.iters".to_string(),
            reason: "at least one iteration is required".to_string(),
        });
    }
    non_negative("kwta.del_act_thr", kwta.del_act_thr, errors);
    positive("kwta.act_tau", kwta.act_tau, errors);
    validate_fffb("layer", &kwta.layer, errors);
    validate_fffb("pool", &kwta.pool, errors);
    non_negative("neigh_inhib.gi", config.neigh_inhib.gi, errors);
}

fn validate_motion(config: &VisionConfig, errors: &mut Vec<ConfigValidationError>) {
    let motion = &config.motion;
    positive("motion.fast_tau", motion.fast_tau, errors);
    positive("motion.slow_tau", motion.slow_tau, errors);
    positive("motion.integ_tau", motion.integ_tau, errors);
    non_negative("motion.gain", motion.gain, errors);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = VisionConfig::default();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_every_problem_reported() {
        let mut config = VisionConfig::default();
        config.motion.fast_tau = 0.0;
        config.kwta.iters = 0;
        config.kwta.pool.gi = -1.0;
        config.backend.kind = "quantum".to_string();

        let errors = collect_errors(&config);
        assert_eq!(errors.len(), 4);

        let err = validate_config(&config).unwrap_err().to_string();
        assert!(err.contains("motion.fast_tau"));
        assert!(err.contains("kwta.iters"));
        assert!(err.contains("kwta.pool.gi"));
        assert!(err.contains("quantum"));
    }

    #[test]
    fn test_nan_tau_rejected() {
        let mut config = VisionConfig::default();
        config.kwta.act_tau = f32::NAN;
        assert!(matches!(
            collect_errors(&config).as_slice(),
            [ConfigValidationError::NotPositive { .. }]
        ));
    }

    #[test]
    fn test_max_vs_avg_range() {
        let mut config = VisionConfig::default();
        config.kwta.layer.max_vs_avg = 1.5;
        let errors = collect_errors(&config);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].to_string().contains("kwta.layer.max_vs_avg"));
    }

    #[test]
    fn test_choices_are_case_insensitive() {
        let mut config = VisionConfig::default();
        config.backend.kind = "CPU".to_string();
        config.backend.barrier = "Data-Dependent".to_string();
        config.logging.format = "JSON".to_string();
        assert!(validate_config(&config).is_ok());

        config.system.batch = 0;
        assert!(validate_config(&config).is_err());
    }
}
