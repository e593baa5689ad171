//! Ambient process configuration: logging verbosity and default pool/depth
//! knobs a binary embedding this crate would load at startup (spec.md §1
//! ambient-stack expansion). Distinct from [`crate::args::DataArgs`] /
//! [`crate::args::RequestArgs`], which size a single running scheduler —
//! `Settings` is the file-level configuration those are usually built from.
//!
//! Loaded the way the teacher's `config.rs` loads `Settings`: a `figment`
//! `Provider` supplying defaults, layered under an optional TOML file and
//! environment overrides.

use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Toml};
use figment::{Figment, Provider};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub log_level: String,
    pub pools: PoolSettings,
    pub request: RequestSettings,
    pub monitor: MonitorSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            log_level: "info".to_string(),
            pools: PoolSettings::default(),
            request: RequestSettings::default(),
            monitor: MonitorSettings::default(),
        }
    }
}

impl Provider for Settings {
    fn metadata(&self) -> figment::Metadata {
        figment::Metadata::named("Crawler Defaults")
    }

    fn data(&self) -> Result<figment::value::Map<figment::Profile, figment::value::Dict>, figment::Error> {
        Serialized::defaults(Settings::default()).data()
    }
}

/// Default sizing for the four data pools, one capacity/max-count pair per
/// pool (mirrors [`crate::args::DataArgs`]'s field set).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolSettings {
    pub req_buffer_cap: u32,
    pub req_max_buffer_number: u32,
    pub resp_buffer_cap: u32,
    pub resp_max_buffer_number: u32,
    pub item_buffer_cap: u32,
    pub item_max_buffer_number: u32,
    pub error_buffer_cap: u32,
    pub error_max_buffer_number: u32,
}

impl Default for PoolSettings {
    fn default() -> Self {
        PoolSettings {
            req_buffer_cap: 50,
            req_max_buffer_number: 1000,
            resp_buffer_cap: 50,
            resp_max_buffer_number: 1000,
            item_buffer_cap: 50,
            item_max_buffer_number: 100,
            error_buffer_cap: 50,
            error_max_buffer_number: 100,
        }
    }
}

impl From<PoolSettings> for crate::args::DataArgs {
    fn from(settings: PoolSettings) -> Self {
        crate::args::DataArgs {
            req_buffer_cap: settings.req_buffer_cap,
            req_max_buffer_number: settings.req_max_buffer_number,
            resp_buffer_cap: settings.resp_buffer_cap,
            resp_max_buffer_number: settings.resp_max_buffer_number,
            item_buffer_cap: settings.item_buffer_cap,
            item_max_buffer_number: settings.item_max_buffer_number,
            error_buffer_cap: settings.error_buffer_cap,
            error_max_buffer_number: settings.error_max_buffer_number,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RequestSettings {
    pub max_depth: u32,
    pub accepted_domains: Vec<String>,
}

impl Default for RequestSettings {
    fn default() -> Self {
        RequestSettings {
            max_depth: 3,
            accepted_domains: Vec::new(),
        }
    }
}

/// Runtime knobs for [`crate::monitor::monitor`], durations expressed in
/// milliseconds for clean TOML/env round-tripping.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorSettings {
    pub check_interval_ms: u64,
    pub summarize_interval_ms: u64,
    pub max_idle_count: u32,
    pub auto_stop: bool,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        MonitorSettings {
            check_interval_ms: 500,
            summarize_interval_ms: 5_000,
            max_idle_count: 100,
            auto_stop: false,
        }
    }
}

impl From<MonitorSettings> for crate::monitor::MonitorConfig {
    fn from(settings: MonitorSettings) -> Self {
        crate::monitor::MonitorConfig {
            check_interval: std::time::Duration::from_millis(settings.check_interval_ms),
            summarize_interval: std::time::Duration::from_millis(settings.summarize_interval_ms),
            max_idle_count: settings.max_idle_count,
            auto_stop: settings.auto_stop,
        }
    }
}

impl Settings {
    /// Library defaults only, no file or environment layering — useful in
    /// tests and as an embeddable baseline.
    pub fn defaults() -> Self {
        Settings::default()
    }

    /// Loads defaults, then an optional TOML file at `path` (if it
    /// exists), then `CRAWLER_`-prefixed environment overrides, in that
    /// priority order.
    pub fn load(path: Option<&str>) -> Result<Self> {
        let mut figment = Figment::from(Settings::default());
        if let Some(path) = path {
            figment = figment.merge(Toml::file(path));
        }
        figment = figment.merge(Env::prefixed("CRAWLER_").split("_"));
        figment
            .extract()
            .context("failed to assemble crawler settings")
    }

    pub fn validate(&self) -> Result<()> {
        let valid_log_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_log_levels.contains(&self.log_level.to_lowercase().as_str()) {
            anyhow::bail!("invalid log level: {}", self.log_level);
        }
        if self.request.max_depth == 0 {
            anyhow::bail!("request.max_depth must be greater than 0");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_pass_validation() {
        assert!(Settings::defaults().validate().is_ok());
    }

    #[test]
    fn rejects_unknown_log_level() {
        let mut settings = Settings::defaults();
        settings.log_level = "verbose".to_string();
        assert!(settings.validate().is_err());
    }

    #[test]
    fn pool_settings_convert_into_data_args() {
        let args: crate::args::DataArgs = PoolSettings::default().into();
        assert!(args.check().is_ok());
    }

    #[test]
    fn monitor_settings_convert_into_monitor_config() {
        let config: crate::monitor::MonitorConfig = MonitorSettings::default().into();
        assert_eq!(config.check_interval, std::time::Duration::from_millis(500));
        assert_eq!(config.max_idle_count, 100);
    }
}
