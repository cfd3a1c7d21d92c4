use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter};
use std::path::{Path, PathBuf};

use kestrel_world::config::paths::{APP_NAME, ProjectPaths};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

const MAX_LOG_SIZE: u64 = 1024 * 1024; // 1MB

/// Initialize logging for a component.
///
/// - `component_name`: Name of the component (e.g., "server", "sandbox")
/// - `file_enabled`: If true, also writes `<data_dir>/logs/<component>.log`.
///
/// `RUST_LOG` overrides the default `info` filter. Returns a guard that must
/// be kept alive for the duration of the program.
pub fn init_logging(component_name: &str, file_enabled: bool) -> io::Result<Option<WorkerGuard>> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    if !file_enabled {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
        return Ok(None);
    }

    let log_dir = log_directory()?;
    fs::create_dir_all(&log_dir)?;
    let log_path = log_dir.join(format!("{component_name}.log"));
    truncate_if_needed(&log_path)?;

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)?;
    let (non_blocking_file, guard) = tracing_appender::non_blocking(BufWriter::new(file));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_writer(io::stdout).with_ansi(true))
        .with(
            fmt::layer()
                .with_writer(non_blocking_file)
                .with_ansi(false)
                .with_target(true),
        )
        .init();

    tracing::info!("Logging to file: {}", log_path.display());
    Ok(Some(guard))
}

fn log_directory() -> io::Result<PathBuf> {
    ProjectPaths::new(APP_NAME)
        .map(|paths| paths.log_dir())
        .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "Failed to find home directory"))
}

/// Start over once the file grows past MAX_LOG_SIZE
fn truncate_if_needed(log_path: &Path) -> io::Result<()> {
    if log_path.exists() && fs::metadata(log_path)?.len() > MAX_LOG_SIZE {
        File::create(log_path)?;
    }
    Ok(())
}
