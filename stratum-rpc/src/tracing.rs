//! Tracing setup for binaries built on this crate.
//!
//! Call [`init_stdout`] once at startup to install a subscriber. Library code
//! only emits events; frames are logged at TRACE (`rx`/`tx` fields), so
//! `RUST_LOG=stratum_rpc=trace` shows the raw wire traffic.

use tracing_subscriber::{
    filter::{EnvFilter, LevelFilter},
    prelude::*,
};

pub mod prelude {
    #[allow(unused_imports)]
    pub use tracing::{debug, error, info, trace, warn};
}

/// Log to stdout, filtering according to RUST_LOG, defaulting to INFO.
pub fn init_stdout() {
    let env_filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .with_env_var("RUST_LOG")
        .from_env_lossy();

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();
}
