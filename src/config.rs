use std::path::PathBuf;

use crate::pipeline::structuring::{BalanceConfig, DEFAULT_API_URL, DEFAULT_MODEL};

/// Application-level constants
pub const APP_NAME: &str = "ProjectLens";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default timeout for one model call.
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;

pub const ENV_API_KEY: &str = "OPENROUTER_API_KEY";
pub const ENV_MODEL: &str = "PROJECTLENS_MODEL";
pub const ENV_API_URL: &str = "PROJECTLENS_API_URL";
pub const ENV_TIMEOUT_SECS: &str = "PROJECTLENS_TIMEOUT_SECS";
pub const ENV_BALANCE_TOLERANCE: &str = "PROJECTLENS_BALANCE_TOLERANCE";
pub const ENV_OVER_BUDGET_RATIO: &str = "PROJECTLENS_OVER_BUDGET_RATIO";
pub const ENV_DATA_DIR: &str = "PROJECTLENS_DATA_DIR";
/// Sent as `HTTP-Referer` for OpenRouter app attribution.
pub const ENV_REFERER: &str = "PROJECTLENS_REFERER";

/// Log filter used when `RUST_LOG` is unset.
pub fn default_log_filter() -> &'static str {
    "info,reqwest=warn,hyper=warn"
}

/// Get the application data directory.
///
/// `PROJECTLENS_DATA_DIR` wins; otherwise `<data dir>/ProjectLens` as
/// reported by the platform. `None` when neither is available.
pub fn app_data_dir() -> Option<PathBuf> {
    if let Some(dir) = std::env::var_os(ENV_DATA_DIR) {
        return Some(PathBuf::from(dir));
    }
    dirs::data_dir().map(|d| d.join(APP_NAME))
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {var}: {value:?}")]
    InvalidValue { var: &'static str, value: String },
}

/// Settings for one analyzer process.
#[derive(Debug, Clone)]
pub struct AnalyzerConfig {
    pub api_key: Option<String>,
    pub api_url: String,
    pub model: String,
    pub timeout_secs: u64,
    pub referer: Option<String>,
    pub balance: BalanceConfig,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_url: DEFAULT_API_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            referer: None,
            balance: BalanceConfig::default(),
        }
    }
}

impl AnalyzerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Build from any variable source. Unset or blank variables keep defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |var: &str| lookup(var).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let mut config = Self {
            api_key: get(ENV_API_KEY),
            referer: get(ENV_REFERER),
            ..Self::default()
        };

        if let Some(url) = get(ENV_API_URL) {
            config.api_url = url;
        }
        if let Some(model) = get(ENV_MODEL) {
            config.model = model;
        }
        if let Some(raw) = get(ENV_TIMEOUT_SECS) {
            config.timeout_secs = parse_var(ENV_TIMEOUT_SECS, &raw, |v: &u64| *v > 0)?;
        }
        if let Some(raw) = get(ENV_BALANCE_TOLERANCE) {
            config.balance.tolerance =
                parse_var(ENV_BALANCE_TOLERANCE, &raw, |v: &f64| v.is_finite() && *v >= 0.0)?;
        }
        if let Some(raw) = get(ENV_OVER_BUDGET_RATIO) {
            config.balance.over_budget_ratio =
                parse_var(ENV_OVER_BUDGET_RATIO, &raw, |v: &f64| v.is_finite() && *v > 0.0)?;
        }

        Ok(config)
    }
}

fn parse_var<T: std::str::FromStr>(
    var: &'static str,
    raw: &str,
    valid: impl Fn(&T) -> bool,
) -> Result<T, ConfigError> {
    raw.parse::<T>()
        .ok()
        .filter(|v| valid(v))
        .ok_or_else(|| ConfigError::InvalidValue {
            var,
            value: raw.to_string(),
        })
}
