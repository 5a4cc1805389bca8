use tracing_subscriber::{EnvFilter, fmt};

/// Installs the global fmt subscriber. Safe to call more than once; later
/// calls are no-ops.
pub fn init() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn"));

    let _ = fmt().with_env_filter(env_filter).with_target(false).try_init();
}
