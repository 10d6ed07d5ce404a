//! Log setup: stderr plus a dated file under `logs/`.

use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::EnvFilter;

use nacta_sync::Layout;

/// Install the global subscriber. `RUST_LOG` overrides `level`.
///
/// Returns the path of today's log file.
pub fn init(layout: &Layout, level: &str) -> anyhow::Result<PathBuf> {
    let path = layout.log_file(chrono::Local::now().date_naive());
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("cannot open log file {}", path.display()))?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(false)
        .with_target(false)
        .with_writer(std::io::stderr.and(Arc::new(file)))
        .try_init()
        .map_err(|e| anyhow::anyhow!("logging already initialised: {e}"))?;

    Ok(path)
}
