use crate::error::ConfigError;
use crate::time_unit::parse_interval;
use config::{Config, Environment, File, FileFormat};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_MAX_PANIC_RESTARTS: i64 = 5;
const DEFAULT_BACKOFF_SECONDS: i64 = 5;
const DEFAULT_METRICS_LISTEN: &str = ":9090";
const DEFAULT_SHUTDOWN_TIMEOUT_SECS: u64 = 30;

/// Root configuration of the service.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServiceConfig {
    pub service: ServiceSection,
    pub scheduler: SchedulerSection,
    pub metrics: MetricsSection,
    /// Timer name to interval ("5s", "15m", ...).
    pub timers: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServiceSection {
    pub name: String,
    pub display_name: String,
    pub description: String,
    pub log_dir: PathBuf,
    pub log_level: String,
    pub shutdown_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct SchedulerSection {
    pub max_panic_restarts: i64,
    pub backoff_seconds: i64,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct MetricsSection {
    pub enabled: bool,
    pub listen: String,
}

impl Default for ServiceSection {
    fn default() -> Self {
        Self {
            name: "servicekit".to_string(),
            display_name: "Service Kit".to_string(),
            description: String::new(),
            log_dir: PathBuf::from("./logs"),
            log_level: "info".to_string(),
            shutdown_timeout_secs: DEFAULT_SHUTDOWN_TIMEOUT_SECS,
        }
    }
}

impl Default for SchedulerSection {
    fn default() -> Self {
        Self {
            max_panic_restarts: DEFAULT_MAX_PANIC_RESTARTS,
            backoff_seconds: DEFAULT_BACKOFF_SECONDS,
        }
    }
}

impl Default for MetricsSection {
    fn default() -> Self {
        Self {
            enabled: false,
            listen: DEFAULT_METRICS_LISTEN.to_string(),
        }
    }
}

impl ServiceSection {
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }
}

impl SchedulerSection {
    pub fn max_restarts(&self) -> u32 {
        u32::try_from(self.max_panic_restarts).unwrap_or(u32::MAX)
    }

    pub fn backoff(&self) -> Duration {
        Duration::from_secs(self.backoff_seconds.max(0) as u64)
    }
}

impl MetricsSection {
    /// Resolve the listen address. A bare ":port" binds every interface.
    pub fn listen_addr(&self) -> Result<SocketAddr, ConfigError> {
        let listen = self.listen.trim();
        let candidate = if listen.starts_with(':') {
            format!("0.0.0.0{}", listen)
        } else {
            listen.to_string()
        };
        candidate.parse().map_err(|_| ConfigError::InvalidListen {
            value: self.listen.clone(),
        })
    }
}

impl ServiceConfig {
    /// Parse configuration from an in-memory document.
    pub fn parse(content: &str, format: FileFormat) -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .add_source(File::from_str(content, format))
            .build()?;
        Self::from_settings(settings)
    }

    fn from_settings(settings: Config) -> Result<Self, ConfigError> {
        let mut cfg: ServiceConfig = settings.try_deserialize()?;
        cfg.apply_defaults();
        cfg.validate()?;
        Ok(cfg)
    }

    fn apply_defaults(&mut self) {
        if self.service.log_dir.as_os_str().is_empty() {
            self.service.log_dir = PathBuf::from("./logs");
        }
        if self.service.log_level.trim().is_empty() {
            self.service.log_level = "info".to_string();
        }
        if self.service.shutdown_timeout_secs == 0 {
            self.service.shutdown_timeout_secs = DEFAULT_SHUTDOWN_TIMEOUT_SECS;
        }
        if self.scheduler.max_panic_restarts <= 0 {
            self.scheduler.max_panic_restarts = DEFAULT_MAX_PANIC_RESTARTS;
        }
        if self.scheduler.backoff_seconds <= 0 {
            self.scheduler.backoff_seconds = DEFAULT_BACKOFF_SECONDS;
        }
        if self.metrics.listen.trim().is_empty() {
            self.metrics.listen = DEFAULT_METRICS_LISTEN.to_string();
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        self.metrics.listen_addr()?;
        self.timer_intervals()?;
        Ok(())
    }

    /// Configured timers with their parsed intervals, ordered by name.
    pub fn timer_intervals(&self) -> Result<Vec<(String, Duration)>, ConfigError> {
        self.timers
            .iter()
            .map(|(name, value)| match parse_interval(value) {
                Some(interval) if !interval.is_zero() => Ok((name.clone(), interval)),
                _ => Err(ConfigError::InvalidInterval {
                    timer: name.clone(),
                    value: value.clone(),
                }),
            })
            .collect()
    }
}

fn environment() -> Environment {
    Environment::with_prefix("APP")
        .prefix_separator("_")
        .separator("__")
        .try_parsing(true)
}

/// Load config from a file, picking the format from its extension
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<ServiceConfig, ConfigError> {
    let settings = Config::builder()
        .add_source(File::from(path.as_ref()))
        .add_source(environment())
        .build()?;
    ServiceConfig::from_settings(settings)
}

/// Load config from a specific TOML file
pub fn load_toml_config<P: AsRef<Path>>(path: P) -> Result<ServiceConfig, ConfigError> {
    let settings = Config::builder()
        .add_source(File::from(path.as_ref()).format(FileFormat::Toml))
        .add_source(environment())
        .build()?;
    ServiceConfig::from_settings(settings)
}

/// Load config from a specific YAML file
pub fn load_yaml_config<P: AsRef<Path>>(path: P) -> Result<ServiceConfig, ConfigError> {
    let settings = Config::builder()
        .add_source(File::from(path.as_ref()).format(FileFormat::Yaml))
        .add_source(environment())
        .build()?;
    ServiceConfig::from_settings(settings)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_toml() {
        let cfg = ServiceConfig::parse(
            r#"
            [service]
            name = "billing-sync"
            log_dir = "/var/log/billing"
            shutdown_timeout_secs = 10

            [scheduler]
            max_panic_restarts = 3
            backoff_seconds = 2

            [metrics]
            enabled = true
            listen = "127.0.0.1:9100"

            [timers]
            every_5s = "5s"
            every_15m = "15m"
            "#,
            FileFormat::Toml,
        )
        .unwrap();

        assert_eq!(cfg.service.name, "billing-sync");
        assert_eq!(cfg.service.log_dir, PathBuf::from("/var/log/billing"));
        assert_eq!(cfg.service.shutdown_timeout(), Duration::from_secs(10));
        assert_eq!(cfg.scheduler.max_restarts(), 3);
        assert_eq!(cfg.scheduler.backoff(), Duration::from_secs(2));
        assert!(cfg.metrics.enabled);
        assert_eq!(
            cfg.metrics.listen_addr().unwrap(),
            "127.0.0.1:9100".parse::<SocketAddr>().unwrap()
        );
        assert_eq!(
            cfg.timer_intervals().unwrap(),
            vec![
                ("every_15m".to_string(), Duration::from_secs(900)),
                ("every_5s".to_string(), Duration::from_secs(5)),
            ]
        );
    }

    #[test]
    fn test_defaults_for_missing_and_non_positive_values() {
        let cfg = ServiceConfig::parse(
            concat!(
                "scheduler:\n",
                "  max_panic_restarts: 0\n",
                "  backoff_seconds: -1\n",
                "metrics:\n",
                "  listen: \"\"\n",
            ),
            FileFormat::Yaml,
        )
        .unwrap();

        assert_eq!(cfg.service.log_dir, PathBuf::from("./logs"));
        assert_eq!(cfg.scheduler.max_restarts(), 5);
        assert_eq!(cfg.scheduler.backoff(), Duration::from_secs(5));
        assert_eq!(cfg.metrics.listen, ":9090");
        assert_eq!(cfg.service.shutdown_timeout(), Duration::from_secs(30));
        assert!(!cfg.metrics.enabled);
    }

    #[test]
    fn test_bare_port_listens_on_all_interfaces() {
        let metrics = MetricsSection {
            enabled: true,
            listen: ":9090".to_string(),
        };
        assert_eq!(
            metrics.listen_addr().unwrap(),
            "0.0.0.0:9090".parse::<SocketAddr>().unwrap()
        );
    }

    #[test]
    fn test_invalid_timer_interval_is_rejected() {
        let err = ServiceConfig::parse(
            r#"
            [timers]
            broken = "every now and then"
            "#,
            FileFormat::Toml,
        )
        .unwrap_err();

        assert!(matches!(err, ConfigError::InvalidInterval { ref timer, .. } if timer == "broken"));
    }

    #[test]
    fn test_invalid_listen_is_rejected() {
        let err = ServiceConfig::parse(
            r#"
            [metrics]
            listen = "not-an-address"
            "#,
            FileFormat::Toml,
        )
        .unwrap_err();

        assert!(matches!(err, ConfigError::InvalidListen { .. }));
    }

    #[test]
    fn test_missing_file_fails() {
        let err = load_config("/nonexistent/servicekit.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Load(_)));
    }
}
