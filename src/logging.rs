use crate::error::{Error, Result};
use simplelog::*;
use std::fs::{self, OpenOptions};
use std::path::PathBuf;
use std::sync::OnceLock;

static INIT: OnceLock<std::result::Result<(), String>> = OnceLock::new();

/// `$HOME/.local/share/mclksync/logs`
pub fn log_dir() -> Result<PathBuf> {
    let home = std::env::var("HOME")
        .map_err(|_| Error::Logger("HOME environment variable not set".to_string()))?;
    Ok(PathBuf::from(home)
        .join(".local")
        .join("share")
        .join("mclksync")
        .join("logs"))
}

/// Logs everything up to `level` to `app.log`, and warnings and errors to
/// stderr. Only the first call installs the logger; later calls return
/// its outcome.
pub fn init_logger(level: LevelFilter) -> Result<()> {
    INIT.get_or_init(|| install(level).map_err(|e| e.to_string()))
        .clone()
        .map_err(Error::Logger)
}

fn install(level: LevelFilter) -> Result<()> {
    let log_dir = log_dir()?;
    fs::create_dir_all(&log_dir)?;

    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_dir.join("app.log"))?;

    let config = ConfigBuilder::new()
        .set_time_format_rfc3339()
        .build();

    CombinedLogger::init(vec![
        WriteLogger::new(level, config.clone(), log_file),
        TermLogger::new(
            LevelFilter::Warn,
            config,
            TerminalMode::Stderr,
            ColorChoice::Auto,
        ),
    ])
    .map_err(|e| Error::Logger(e.to_string()))
}
