//! Structured logging.
//!
//! Human-readable lines go to stdout (picked up by journald or a console),
//! JSON lines are appended to `<log_dir>/<service name>.log`.
//! `RUST_LOG` overrides the configured level.

use crate::config::ServiceSection;
use crate::error::LoggingError;
use std::fs::{self, OpenOptions};
use std::path::PathBuf;
use std::sync::Mutex;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install the global subscriber. Returns the path of the JSON log file.
pub fn init(config: &ServiceSection) -> Result<PathBuf, LoggingError> {
    fs::create_dir_all(&config.log_dir)?;
    let path = config.log_dir.join(format!("{}.log", config.name));
    let file = OpenOptions::new().create(true).append(true).open(&path)?;

    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.log_level)?,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .with(
            fmt::layer()
                .json()
                .with_ansi(false)
                .with_writer(Mutex::new(file)),
        )
        .try_init()
        .map_err(|_| LoggingError::AlreadyInitialized)?;

    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_creates_log_file_once() {
        let log_dir =
            std::env::temp_dir().join(format!("servicekit-logging-{}", std::process::id()));
        let config = ServiceSection {
            name: "logging-test".to_string(),
            log_dir: log_dir.clone(),
            ..ServiceSection::default()
        };

        let path = init(&config).unwrap();
        assert_eq!(path, log_dir.join("logging-test.log"));
        assert!(path.exists());

        tracing::info!(check = true, "written to the json log");
        assert!(matches!(init(&config), Err(LoggingError::AlreadyInitialized)));

        let _ = fs::remove_dir_all(&log_dir);
    }
}
