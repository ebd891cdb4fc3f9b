use tracing_subscriber::EnvFilter;

/// Level used when `RUST_LOG` is unset or unparsable.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Installs the fmt subscriber, filtered by `RUST_LOG` (default `info`).
pub fn init() {
    let directives = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    tracing_subscriber::fmt()
        .with_env_filter(env_filter(directives.as_deref()))
        .init();
}

fn env_filter(directives: Option<&str>) -> EnvFilter {
    directives
        .filter(|d| !d.trim().is_empty())
        .and_then(|d| EnvFilter::try_new(d).ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_LOG_LEVEL))
}
