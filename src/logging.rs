//! Tracing initialization for embedders and binaries
//!
//! The library itself only emits `tracing` events; call [`init_tracing`]
//! once from the hosting process to route them somewhere visible.

use tracing_subscriber::{fmt, EnvFilter};

/// Install a compact stdout subscriber.
///
/// Respects `RUST_LOG` for filtering and defaults to `info`. Does nothing
/// if a global subscriber is already set.
pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .try_init();
}
