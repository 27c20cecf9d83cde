//! Tracing subscriber setup

use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

const DEFAULT_FILTER: &str = "info";

/// Install the global subscriber.
///
/// Logs always go to `log_file` through a non-blocking writer; with `verbose` they are
/// also printed to stderr. The filter comes from `RUST_LOG` and defaults to `info`.
/// The returned guard flushes the file writer when dropped and must be held until exit.
pub fn init(log_file: &Path, verbose: bool) -> anyhow::Result<WorkerGuard> {
    let directory = log_file.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(directory)?;

    let file_name = log_file
        .file_name()
        .map(|name| name.to_os_string())
        .unwrap_or_else(|| "ccui-state.log".into());

    let appender = tracing_appender::rolling::never(directory, file_name);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let file_layer = fmt::layer().with_writer(writer).with_ansi(false);
    let stderr_layer = verbose.then(|| {
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(stderr_layer)
        .try_init()?;

    Ok(guard)
}
