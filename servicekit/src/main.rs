use servicekit::{init_logging, load_config, platform, App, ServiceConfig};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{error, info};

/// Timers registered when the config file has no `[timers]` section
const DEFAULT_TIMERS: [(&str, Duration); 4] = [
    ("every_5s", Duration::from_secs(5)),
    ("every_30s", Duration::from_secs(30)),
    ("every_15m", Duration::from_secs(15 * 60)),
    ("every_3h", Duration::from_secs(3 * 60 * 60)),
];

/// `APP_CONFIG` if set, else `configs/config.toml` next to the executable
fn config_path() -> Result<PathBuf, std::io::Error> {
    if let Some(path) = std::env::var_os("APP_CONFIG") {
        return Ok(PathBuf::from(path));
    }
    let exe = std::env::current_exe()?;
    let dir = exe.parent().map(PathBuf::from).unwrap_or_default();
    Ok(dir.join("configs").join("config.toml"))
}

fn build_app(config: ServiceConfig) -> Result<App, Box<dyn std::error::Error>> {
    let app = App::new(config)?;

    if app.config().timers.is_empty() {
        for (name, interval) in DEFAULT_TIMERS {
            app.scheduler().add_timer(name, interval, move |_ctx| async move {
                info!(timer = name, "Timer executed");
            })?;
        }
    } else {
        app.add_configured_timers(|timer, _ctx| async move {
            info!(timer = %timer, "Timer executed");
        })?;
    }

    Ok(app)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let path = config_path()?;
    let config = load_config(&path)?;
    let log_file = init_logging(&config.service)?;

    info!(
        config = %path.display(),
        log_file = %log_file.display(),
        "Running in console mode"
    );

    let app = build_app(config)?;
    if let Err(e) = platform::run(&app).await {
        error!(error = %e, "Application error");
        return Err(e.into());
    }
    Ok(())
}
