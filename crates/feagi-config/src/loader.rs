// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Configuration file loading with override support
//!
//! This module implements the 3-tier configuration loading system:
//! 1. TOML file (base defaults)
//! 2. Environment variables (runtime overrides)
//! 3. CLI arguments (explicit user overrides)

use crate::validation::validate_config;
use crate::{ConfigError, ConfigResult, VisionConfig};
use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// File name searched for upward from the working directory
pub const CONFIG_FILE_NAME: &str = "feagi_vision.toml";

/// Environment variable naming an explicit config file
pub const CONFIG_PATH_ENV: &str = "FEAGI_VISION_CONFIG_PATH";

/// How many parent directories are searched above the working directory
const MAX_PARENT_LEVELS: usize = 5;

/// Find the configuration file
///
/// Search order:
/// 1. `FEAGI_VISION_CONFIG_PATH` environment variable
/// 2. `./feagi_vision.toml`
/// 3. `feagi_vision.toml` in up to 5 parent directories
///
/// # Errors
///
/// Returns `ConfigError::FileNotFound` if no config file is found in any location
pub fn find_config_file() -> ConfigResult<PathBuf> {
    if let Ok(env_path) = env::var(CONFIG_PATH_ENV) {
        let path = PathBuf::from(env_path);
        if path.exists() {
            return Ok(path);
        }
        return Err(ConfigError::FileNotFound(format!(
            "Config file specified by {} not found: {}",
            CONFIG_PATH_ENV,
            path.display()
        )));
    }

    let cwd = env::current_dir()?;
    let search_paths: Vec<PathBuf> = cwd
        .ancestors()
        .take(MAX_PARENT_LEVELS + 1)
        .map(|dir| dir.join(CONFIG_FILE_NAME))
        .collect();

    if let Some(path) = search_paths.iter().find(|p| p.exists()) {
        return Ok(path.clone());
    }

    let search_list = search_paths
        .iter()
        .map(|p| format!("  - {}", p.display()))
        .collect::<Vec<_>>()
        .join("\n");
    Err(ConfigError::FileNotFound(format!(
        "'{}' not found in any of these locations:\n{}\n\nSet {} to specify a custom location.",
        CONFIG_FILE_NAME, search_list, CONFIG_PATH_ENV
    )))
}

/// Load configuration from TOML file
///
/// # Arguments
///
/// * `config_path` - Optional path to config file. If `None`, will search for config file.
/// * `cli_args` - Optional CLI argument overrides
///
/// # Errors
///
/// Returns error if config file is not found, contains invalid TOML, or fails validation
pub fn load_config(
    config_path: Option<&Path>,
    cli_args: Option<&HashMap<String, String>>,
) -> ConfigResult<VisionConfig> {
    let config_file = match config_path {
        Some(path) => path.to_path_buf(),
        None => find_config_file()?,
    };
    let content = fs::read_to_string(&config_file)?;
    let config: VisionConfig = toml::from_str(&content)?;
    finish(config, cli_args)
}

/// Like [`load_config`], but starts from built-in defaults when no file is found
pub fn load_config_or_default(
    cli_args: Option<&HashMap<String, String>>,
) -> ConfigResult<VisionConfig> {
    match find_config_file() {
        Ok(path) => load_config(Some(&path), cli_args),
        Err(ConfigError::FileNotFound(_)) => finish(VisionConfig::default(), cli_args),
        Err(e) => Err(e),
    }
}

fn finish(
    mut config: VisionConfig,
    cli_args: Option<&HashMap<String, String>>,
) -> ConfigResult<VisionConfig> {
    apply_environment_overrides(&mut config)?;
    if let Some(cli) = cli_args {
        apply_cli_overrides(&mut config, cli)?;
    }
    validate_config(&config)?;
    Ok(config)
}

fn parse<T: std::str::FromStr>(key: &str, value: &str) -> ConfigResult<T> {
    value
        .trim()
        .parse::<T>()
        .map_err(|_| ConfigError::InvalidValue(format!("{} = '{}'", key, value)))
}

fn parse_bool(key: &str, value: &str) -> ConfigResult<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue(format!("{} = '{}'", key, value))),
    }
}

/// Apply environment variable overrides to configuration
///
/// Supported environment variables:
/// - `FEAGI_VISION_BACKEND` -> `backend.kind`
/// - `FEAGI_VISION_BARRIER` -> `backend.barrier`
/// - `FEAGI_VISION_THREADS` -> `system.threads`
/// - `FEAGI_VISION_LOG_LEVEL` -> `logging.level`
/// - `FEAGI_VISION_KWTA_ITERS` -> `kwta.iters`
///
/// # Errors
///
/// Returns `ConfigError::InvalidValue` if a numeric variable does not parse
pub fn apply_environment_overrides(config: &mut VisionConfig) -> ConfigResult<()> {
    if let Ok(value) = env::var("FEAGI_VISION_BACKEND") {
        config.backend.kind = value.trim().to_lowercase();
    }
    if let Ok(value) = env::var("FEAGI_VISION_BARRIER") {
        config.backend.barrier = value.trim().to_lowercase();
    }
    if let Ok(value) = env::var("FEAGI_VISION_THREADS") {
        config.system.threads = parse("FEAGI_VISION_THREADS", &value)?;
    }
    if let Ok(value) = env::var("FEAGI_VISION_LOG_LEVEL") {
        config.logging.level = value.trim().to_lowercase();
    }
    if let Ok(value) = env::var("FEAGI_VISION_KWTA_ITERS") {
        config.kwta.iters = parse("FEAGI_VISION_KWTA_ITERS", &value)?;
    }
    Ok(())
}

/// Apply CLI argument overrides to configuration
///
/// Keys are dotted section paths (`kwta.iters`, `backend.kind`, `motion.gain`, ...).
///
/// # Errors
///
/// Returns `ConfigError::InvalidValue` for unknown keys and unparsable values
pub fn apply_cli_overrides(
    config: &mut VisionConfig,
    cli_args: &HashMap<String, String>,
) -> ConfigResult<()> {
    // Sorted so the first reported error does not depend on hash order
    let mut keys: Vec<&String> = cli_args.keys().collect();
    keys.sort();
    for key in keys {
        let value = &cli_args[key];
        let k = key.as_str();
        match k {
            "system.threads" | "threads" => config.system.threads = parse(k, value)?,
            "system.batch" | "batch" => config.system.batch = parse(k, value)?,
            "backend.kind" | "backend" => config.backend.kind = value.trim().to_lowercase(),
            "backend.barrier" | "barrier" => {
                config.backend.barrier = value.trim().to_lowercase()
            }
            "backend.gpu_min_work_items" => config.backend.gpu_min_work_items = parse(k, value)?,
            "kwta.on" => config.kwta.on = parse_bool(k, value)?,
            "kwta.iters" => config.kwta.iters = parse(k, value)?,
            "kwta.del_act_thr" => config.kwta.del_act_thr = parse(k, value)?,
            "kwta.act_tau" => config.kwta.act_tau = parse(k, value)?,
            "kwta.layer.on" => config.kwta.layer.on = parse_bool(k, value)?,
            "kwta.layer.gi" => config.kwta.layer.gi = parse(k, value)?,
            "kwta.pool.on" => config.kwta.pool.on = parse_bool(k, value)?,
            "kwta.pool.gi" => config.kwta.pool.gi = parse(k, value)?,
            "neigh_inhib.on" => config.neigh_inhib.on = parse_bool(k, value)?,
            "neigh_inhib.gi" => config.neigh_inhib.gi = parse(k, value)?,
            "motion.fast_tau" => config.motion.fast_tau = parse(k, value)?,
            "motion.slow_tau" => config.motion.slow_tau = parse(k, value)?,
            "motion.gain" => config.motion.gain = parse(k, value)?,
            "motion.integ_tau" => config.motion.integ_tau = parse(k, value)?,
            "logging.level" | "log_level" => config.logging.level = value.trim().to_lowercase(),
            "logging.format" | "log_format" => {
                config.logging.format = value.trim().to_lowercase()
            }
            _ => {
                return Err(ConfigError::InvalidValue(format!(
                    "unknown override key '{}'",
                    key
                )))
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use std::sync::Mutex;
    use tempfile::tempdir;

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    const ENV_VARS: &[&str] = &[
        "FEAGI_VISION_BACKEND",
        "FEAGI_VISION_BARRIER",
        "FEAGI_VISION_THREADS",
        "FEAGI_VISION_LOG_LEVEL",
        "FEAGI_VISION_KWTA_ITERS",
        CONFIG_PATH_ENV,
    ];

    fn clear_env() {
        for var in ENV_VARS {
            env::remove_var(var);
        }
    }

    #[test]
    fn test_find_config_file_env_var() {
        let _env_lock = ENV_LOCK.lock().unwrap();
        clear_env();
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("custom.toml");
        File::create(&config_path).unwrap();

        env::set_var(CONFIG_PATH_ENV, config_path.to_str().unwrap());
        let result = find_config_file();
        env::remove_var(CONFIG_PATH_ENV);

        assert_eq!(result.unwrap(), config_path);
    }

    #[test]
    fn test_missing_env_path_is_reported() {
        let _env_lock = ENV_LOCK.lock().unwrap();
        clear_env();
        env::set_var(CONFIG_PATH_ENV, "/definitely/not/here.toml");
        let result = find_config_file();
        env::remove_var(CONFIG_PATH_ENV);
        assert!(matches!(result, Err(ConfigError::FileNotFound(_))));
    }

    #[test]
    fn test_load_minimal_config() {
        let _env_lock = ENV_LOCK.lock().unwrap();
        clear_env();
        let dir = tempdir().unwrap();
        let config_path = dir.path().join(CONFIG_FILE_NAME);
        let mut file = File::create(&config_path).unwrap();
        writeln!(file, "[backend]").unwrap();
        writeln!(file, "kind = \"sequential\"").unwrap();
        writeln!(file, "[motion]").unwrap();
        writeln!(file, "gain = 12.5").unwrap();

        let config = load_config(Some(&config_path), None).unwrap();
        assert_eq!(config.backend.kind, "sequential");
        assert_eq!(config.motion.gain, 12.5);
        assert_eq!(config.kwta.iters, 20);
    }

    #[test]
    fn test_invalid_toml() {
        let _env_lock = ENV_LOCK.lock().unwrap();
        clear_env();
        let dir = tempdir().unwrap();
        let config_path = dir.path().join(CONFIG_FILE_NAME);
        fs::write(&config_path, "[kwta\niters = ").unwrap();
        assert!(matches!(
            load_config(Some(&config_path), None),
            Err(ConfigError::ParseError(_))
        ));
    }

    #[test]
    fn test_environment_overrides() {
        let _env_lock = ENV_LOCK.lock().unwrap();
        clear_env();
        let mut config = VisionConfig::default();

        env::set_var("FEAGI_VISION_BACKEND", "CPU");
        env::set_var("FEAGI_VISION_THREADS", "6");
        env::set_var("FEAGI_VISION_KWTA_ITERS", "35");
        let result = apply_environment_overrides(&mut config);
        clear_env();

        result.unwrap();
        assert_eq!(config.backend.kind, "cpu");
        assert_eq!(config.system.threads, 6);
        assert_eq!(config.kwta.iters, 35);
    }

    #[test]
    fn test_bad_env_number() {
        let _env_lock = ENV_LOCK.lock().unwrap();
        clear_env();
        let mut config = VisionConfig::default();
        env::set_var("FEAGI_VISION_THREADS", "many");
        let result = apply_environment_overrides(&mut config);
        clear_env();
        assert!(matches!(result, Err(ConfigError::InvalidValue(_))));
    }

    #[test]
    fn test_cli_overrides() {
        let mut config = VisionConfig::default();
        let mut cli_args = HashMap::new();
        cli_args.insert("kwta.pool.gi".to_string(), "2.4".to_string());
        cli_args.insert("neigh_inhib.on".to_string(), "off".to_string());
        cli_args.insert("barrier".to_string(), "data-dependent".to_string());

        apply_cli_overrides(&mut config, &cli_args).unwrap();

        assert_eq!(config.kwta.pool.gi, 2.4);
        assert!(!config.neigh_inhib.on);
        assert_eq!(config.backend.barrier, "data-dependent");

        cli_args.insert("kwta.bogus".to_string(), "1".to_string());
        assert!(apply_cli_overrides(&mut config, &cli_args).is_err());
    }

    #[test]
    fn test_override_precedence() {
        let _env_lock = ENV_LOCK.lock().unwrap();
        clear_env();
        let dir = tempdir().unwrap();
        let config_path = dir.path().join(CONFIG_FILE_NAME);
        let mut file = File::create(&config_path).unwrap();
        writeln!(file, "[backend]").unwrap();
        writeln!(file, "kind = \"wgpu\"").unwrap();
        writeln!(file, "[kwta]").unwrap();
        writeln!(file, "iters = 10").unwrap();

        env::set_var("FEAGI_VISION_BACKEND", "sequential");
        env::set_var("FEAGI_VISION_KWTA_ITERS", "30");

        let mut cli_args = HashMap::new();
        cli_args.insert("backend.kind".to_string(), "cpu".to_string());

        let config = load_config(Some(&config_path), Some(&cli_args));
        clear_env();
        let config = config.unwrap();

        // CLI wins for backend, env wins for iters (no CLI override)
        assert_eq!(config.backend.kind, "cpu");
        assert_eq!(config.kwta.iters, 30);
    }

    #[test]
    fn test_validation_runs_after_overrides() {
        let _env_lock = ENV_LOCK.lock().unwrap();
        clear_env();
        let dir = tempdir().unwrap();
        let config_path = dir.path().join(CONFIG_FILE_NAME);
        fs::write(&config_path, "[kwta]\niters = 10\n").unwrap();

        let mut cli_args = HashMap::new();
        cli_args.insert("kwta.iters".to_string(), "0".to_string());
        assert!(matches!(
            load_config(Some(&config_path), Some(&cli_args)),
            Err(ConfigError::ValidationError(_))
        ));
    }
}
