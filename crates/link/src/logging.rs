use std::path::PathBuf;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

const LOG_FILE_PREFIX: &str = "dslink.log";

#[derive(Debug, Clone)]
pub struct LogSettings {
    /// Default level, overridden per target by `RUST_LOG`
    pub level: tracing::Level,
    /// Directory for daily log files; stderr only if unset
    pub dir: Option<PathBuf>,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: tracing::Level::INFO,
            dir: None,
        }
    }
}

/// Install the global subscriber and panic hook.
///
/// Log lines go to stderr so command output on stdout stays pipeable.
/// Returns guards that must be kept alive for the duration of the program.
pub fn init_logging(settings: &LogSettings) -> Vec<WorkerGuard> {
    let mut guards = Vec::new();
    let env = std::env::var(EnvFilter::DEFAULT_ENV).ok();

    let (stderr_writer, stderr_guard) = tracing_appender::non_blocking(std::io::stderr());
    guards.push(stderr_guard);

    let stderr_layer = tracing_subscriber::fmt::layer()
        .compact()
        .with_writer(stderr_writer)
        .with_filter(env_filter(settings.level, env.as_deref()));

    let file_layer = settings.dir.as_ref().map(|log_dir| {
        if let Err(e) = std::fs::create_dir_all(log_dir) {
            eprintln!(
                "Warning: Failed to create log directory {:?}: {}",
                log_dir, e
            );
        }

        let file_appender = tracing_appender::rolling::daily(log_dir, LOG_FILE_PREFIX);
        let (file_writer, file_guard) = tracing_appender::non_blocking(file_appender);
        guards.push(file_guard);

        // handshake spans close once per dial, so their timings land in the file
        tracing_subscriber::fmt::layer()
            .with_writer(file_writer)
            .with_ansi(false)
            .with_span_events(FmtSpan::CLOSE)
            .with_filter(env_filter(settings.level, env.as_deref()))
    });

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(file_layer)
        .init();

    register_panic_logger();
    tracing::debug!(
        level = %settings.level,
        dir = ?settings.dir,
        version = env!("CARGO_PKG_VERSION"),
        "logging initialized"
    );
    guards
}

/// Filter from `RUST_LOG`-style directives, falling back to `level`
fn env_filter(level: tracing::Level, directives: Option<&str>) -> EnvFilter {
    EnvFilter::builder()
        .with_default_directive(level.into())
        .parse_lossy(directives.unwrap_or_default())
}

/// Log panics through `tracing`, inside whatever link span was active
pub fn register_panic_logger() {
    std::panic::set_hook(Box::new(|panic| {
        let (file, line) = panic
            .location()
            .map(|loc| (loc.file(), loc.line()))
            .unwrap_or(("<unknown>", 0));
        tracing::error!(
            message = %panic,
            panic.file = file,
            panic.line = line,
            version = env!("CARGO_PKG_VERSION"),
            "dslink panicked"
        );
    }));
}
