//! Tracing subscriber setup
//!
//! Library code only emits events through `tracing`; binaries and tests pick
//! a subscriber here. Both initializers honour `RUST_LOG` and tolerate an
//! already-installed global subscriber.

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

fn env_filter(default_filter: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter))
}

/// Human-readable logs on stderr. `default_filter` applies when `RUST_LOG` is unset.
pub fn init_logging(default_filter: &str) {
    let subscriber = tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .with(env_filter(default_filter));

    // Try to set as global default, but don't fail if already set
    let _ = subscriber.try_init();
}

/// Structured JSON logs in daily rolling files under `log_dir`, keeping at
/// most `max_files`. Events are flushed until the returned guard is dropped.
pub fn init_file_logging(
    log_dir: &str,
    max_files: usize,
) -> Result<WorkerGuard, Box<dyn std::error::Error>> {
    std::fs::create_dir_all(log_dir)?;

    let file_appender = tracing_appender::rolling::Builder::new()
        .rotation(tracing_appender::rolling::Rotation::DAILY)
        .filename_prefix("landmark-te")
        .filename_suffix("log")
        .max_log_files(max_files)
        .build(log_dir)?;
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let subscriber = tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(non_blocking),
        )
        .with(env_filter("info"));

    let _ = subscriber.try_init();

    Ok(guard)
}
