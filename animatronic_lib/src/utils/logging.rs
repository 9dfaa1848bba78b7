//! Tracing setup shared by every node in the dataflow.
//!
//! Subscribers are installed thread-locally so they never fight with the
//! global subscriber dora installs for its own runtime.

use tracing::subscriber::DefaultGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::EnvFilter;

/// Install the node's subscriber with `info` as the default level.
///
/// `RUST_LOG` overrides the default. Keep the returned guard alive for the
/// lifetime of `main`.
///
/// ```no_run
/// use animatronic_lib::init_tracing;
///
/// let _guard = init_tracing();
/// ```
pub fn init_tracing() -> DefaultGuard {
    init_tracing_with("info")
}

/// Like [`init_tracing`] but with a caller-chosen default directive, e.g.
/// `"animatronic_lib=debug,info"` for a bench session.
pub fn init_tracing_with(default_directive: &str) -> DefaultGuard {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

    let fmt_layer = tracing_subscriber::fmt::layer()
        .compact()
        .with_target(false)
        .with_file(false)
        .with_line_number(false);

    let subscriber = tracing_subscriber::Registry::default()
        .with(env_filter)
        .with(fmt_layer);

    tracing::subscriber::set_default(subscriber)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing::info;

    #[test]
    fn test_guard_scopes_subscriber() {
        let guard = init_tracing_with("debug");
        info!("subscriber installed");
        drop(guard);
    }
}
