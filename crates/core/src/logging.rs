//! Tracing setup shared by every binary, following the same
//! `tracing_subscriber::fmt()` + `EnvFilter` pattern the teacher's
//! `youtube/src/main.rs` uses, but defaulting quieter: these are periodic
//! or long-running server processes, not an interactively-paired plugin.

use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

/// Install a `tracing` subscriber that writes structured logs to stdout,
/// honouring `RUST_LOG` and defaulting to `info`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .try_init();
}
