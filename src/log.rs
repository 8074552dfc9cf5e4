//! Diagnostics side channel: `tracing` events rendered to stderr.
//!
//! The subscriber is installed once, on the first intercepted lookup. The level comes from
//! `OTEL_INJECTOR_LOG_LEVEL`, read through the injector's environment accessor.

use once_cell::sync::OnceCell;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use crate::env::EnvAccessor;

pub const ENV_LOG_LEVEL: &str = "OTEL_INJECTOR_LOG_LEVEL";

static INIT: OnceCell<()> = OnceCell::new();

/// Filter directive for a configured level; unknown or missing values mean `error`.
pub fn directive_for(level: Option<&str>) -> &'static str {
    match level.map(|l| l.trim().to_ascii_lowercase()).as_deref() {
        Some("debug") => "debug",
        Some("info") => "info",
        Some("warn") | Some("warning") => "warn",
        Some("none") | Some("off") => "off",
        _ => "error",
    }
}

/// Install the stderr subscriber (first call only).
pub fn init(env: &dyn EnvAccessor) {
    INIT.get_or_init(|| {
        let level = env.var(ENV_LOG_LEVEL);
        let filter = EnvFilter::new(directive_for(level.as_deref()));
        // Another subscriber may already be installed (tests); keep it.
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_ansi(false)
            .without_time()
            .try_init();
        debug!(
            "otel-injector v{} (built {} for {} [{}], {})",
            env!("CARGO_PKG_VERSION"),
            env!("OTEL_INJECTOR_BUILD_DATE"),
            env!("OTEL_INJECTOR_BUILD_TARGET"),
            env!("OTEL_INJECTOR_BUILD_PROFILE"),
            env!("OTEL_INJECTOR_BUILD_RUSTC"),
        );
    });
}
