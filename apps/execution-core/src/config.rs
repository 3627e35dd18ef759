//! Runtime configuration: loaded from YAML, with `${VAR}` / `${VAR:-default}`
//! environment interpolation before parsing (§6.4, §10.3).

use std::collections::HashSet;
use std::path::Path;

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Top-level configuration for one runtime instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub mode: RunMode,
    #[serde(default = "default_max_open_positions")]
    pub max_open_positions: u32,
    #[serde(default)]
    pub cooldown_s: i64,
    #[serde(default = "default_reconciliation_interval_s")]
    pub reconciliation_interval_s: i64,
    #[serde(default = "default_true")]
    pub single_trade_per_symbol: bool,
    #[serde(default)]
    pub protections: ProtectionsConfig,
    #[serde(default)]
    pub risk: RiskConfig,
    #[serde(default)]
    pub event_bus: EventBusConfig,
    #[serde(default)]
    pub health: HealthConfig,
}

/// Runtime mode (§6.4): governs the reconciliation policy and whether the
/// broker adapter is a dry-run or talks to a real account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    Live,
    Paper,
    Backtest,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProtectionsConfig {
    pub daily_loss_limit_usd: Option<f64>,
    pub max_drawdown_pct: Option<f64>,
    pub stoploss_guard_max_losses: Option<u32>,
    pub time_window_start: Option<String>,
    pub time_window_end: Option<String>,
    pub volatility_max_std: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskConfig {
    #[serde(default = "default_max_position_size_usd")]
    pub max_position_size_usd: f64,
    #[serde(default = "default_max_portfolio_exposure_usd")]
    pub max_portfolio_exposure_usd: f64,
    #[serde(default = "default_min_buying_power_reserve")]
    pub min_buying_power_reserve: f64,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            max_position_size_usd: default_max_position_size_usd(),
            max_portfolio_exposure_usd: default_max_portfolio_exposure_usd(),
            min_buying_power_reserve: default_min_buying_power_reserve(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventBusConfig {
    #[serde(default = "default_event_bus_queue_size")]
    pub queue_size: usize,
    #[serde(default)]
    pub backpressure_policy: BackpressurePolicySetting,
}

impl Default for EventBusConfig {
    fn default() -> Self {
        Self {
            queue_size: default_event_bus_queue_size(),
            backpressure_policy: BackpressurePolicySetting::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackpressurePolicySetting {
    #[default]
    Block,
    Drop,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthConfig {
    #[serde(default)]
    pub critical_subsystems: HashSet<String>,
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            critical_subsystems: HashSet::new(),
            failure_threshold: default_failure_threshold(),
        }
    }
}

const fn default_max_open_positions() -> u32 {
    10
}

const fn default_reconciliation_interval_s() -> i64 {
    300
}

const fn default_true() -> bool {
    true
}

const fn default_max_position_size_usd() -> f64 {
    10_000.0
}

const fn default_max_portfolio_exposure_usd() -> f64 {
    100_000.0
}

const fn default_min_buying_power_reserve() -> f64 {
    1_000.0
}

const fn default_event_bus_queue_size() -> usize {
    1024
}

const fn default_failure_threshold() -> u32 {
    3
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("config YAML error: {0}")]
    Yaml(String),
    #[error("config validation error: {0}")]
    Validation(String),
}

/// Load and validate configuration from a YAML file, interpolating
/// `${VAR}` / `${VAR:-default}` references against the process environment
/// before parsing.
///
/// # Errors
///
/// Returns an error if the file cannot be read, the YAML is malformed, an
/// interpolated variable is unset with no default, or validation fails.
pub fn load_config(path: impl AsRef<Path>) -> Result<Config, ConfigError> {
    let raw = std::fs::read_to_string(path)?;
    load_config_from_string(&raw)
}

/// Parse and validate configuration from a YAML string, as [`load_config`].
///
/// # Errors
///
/// Returns an error if the YAML is malformed, an interpolated variable is
/// unset with no default, or validation fails.
pub fn load_config_from_string(raw: &str) -> Result<Config, ConfigError> {
    let interpolated = interpolate_env_vars(raw)?;
    let config: Config = serde_yaml_bw::from_str(&interpolated).map_err(|e| ConfigError::Yaml(e.to_string()))?;
    validate_config(&config)?;
    Ok(config)
}

/// Replace `${VAR}` and `${VAR:-default}` references with the environment
/// variable's value, or the default if unset. Leaves the placeholder
/// untouched if a variable is unset and carries no default — the resulting
/// YAML will then fail to parse at that point, surfacing the mistake.
///
/// # Errors
///
/// Returns an error if `${VAR}` (no default) references an unset variable.
pub fn interpolate_env_vars(raw: &str) -> Result<String, ConfigError> {
    let re = Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)(:-([^}]*))?\}").expect("static interpolation regex");
    let mut err = None;
    let replaced = re.replace_all(raw, |caps: &regex::Captures| {
        let var = &caps[1];
        let default = caps.get(3).map(|m| m.as_str());
        match (std::env::var(var), default) {
            (Ok(value), _) => value,
            (Err(_), Some(default)) => default.to_string(),
            (Err(_), None) => {
                err = Some(ConfigError::Validation(format!("environment variable {var} is unset and has no default")));
                String::new()
            }
        }
    });
    if let Some(e) = err {
        return Err(e);
    }
    Ok(replaced.into_owned())
}

/// Sanity-check cross-field invariants that serde's field-level defaults
/// can't express.
///
/// # Errors
///
/// Returns an error describing the first invariant violated.
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.max_open_positions == 0 {
        return Err(ConfigError::Validation("max_open_positions must be at least 1".to_string()));
    }
    if config.reconciliation_interval_s <= 0 {
        return Err(ConfigError::Validation("reconciliation_interval_s must be positive".to_string()));
    }
    if config.risk.max_position_size_usd <= 0.0 {
        return Err(ConfigError::Validation("risk.max_position_size_usd must be positive".to_string()));
    }
    if config.risk.max_portfolio_exposure_usd <= 0.0 {
        return Err(ConfigError::Validation("risk.max_portfolio_exposure_usd must be positive".to_string()));
    }
    if config.mode == RunMode::Live && config.health.critical_subsystems.is_empty() {
        return Err(ConfigError::Validation("live mode requires at least one critical subsystem configured".to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = "mode: paper\n";

    #[test]
    fn minimal_config_loads_with_defaults() {
        let config = load_config_from_string(MINIMAL).unwrap();
        assert_eq!(config.mode, RunMode::Paper);
        assert_eq!(config.max_open_positions, 10);
        assert_eq!(config.reconciliation_interval_s, 300);
        assert!(config.single_trade_per_symbol);
    }

    #[test]
    fn interpolates_env_var_with_default() {
        let raw = "mode: paper\nmax_open_positions: ${MAX_POSITIONS:-7}\n";
        let config = load_config_from_string(raw).unwrap();
        assert_eq!(config.max_open_positions, 7);
    }

    #[test]
    #[allow(unsafe_code)]
    fn interpolates_env_var_from_environment() {
        unsafe {
            std::env::set_var("EXECUTION_CORE_TEST_COOLDOWN", "45");
        }
        let raw = "mode: paper\ncooldown_s: ${EXECUTION_CORE_TEST_COOLDOWN}\n";
        let config = load_config_from_string(raw).unwrap();
        assert_eq!(config.cooldown_s, 45);
        unsafe {
            std::env::remove_var("EXECUTION_CORE_TEST_COOLDOWN");
        }
    }

    #[test]
    #[allow(unsafe_code)]
    fn unset_env_var_without_default_is_an_error() {
        unsafe {
            std::env::remove_var("EXECUTION_CORE_TEST_MISSING");
        }
        let raw = "mode: paper\ncooldown_s: ${EXECUTION_CORE_TEST_MISSING}\n";
        assert!(load_config_from_string(raw).is_err());
    }

    #[test]
    fn live_mode_without_critical_subsystems_fails_validation() {
        let raw = "mode: live\n";
        assert!(load_config_from_string(raw).is_err());
    }

    #[test]
    fn zero_max_open_positions_fails_validation() {
        let raw = "mode: paper\nmax_open_positions: 0\n";
        assert!(load_config_from_string(raw).is_err());
    }
}
