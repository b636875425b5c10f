//! # Precis
//!
//! Summarise free text into exactly five bullet sentences with a remote
//! generative model, and keep a per-user history of the results.
//!
//! ## Features
//!
//! - **Strict Output Contract**: Model replies are parsed into a fixed-arity `Bullets` value or rejected
//! - **Persistent History**: sled-backed record store queried newest first
//! - **Race-free Sessions**: Stale completions are discarded by epoch tickets

pub mod agent;
pub mod config;
pub mod gateway;
pub mod generation;
pub mod history;
pub mod prompt;
pub mod session;
pub mod storage;
pub mod summary;
pub mod validator;

pub use config::Config;
pub use session::SummarySession;
pub use storage::Storage;
pub use summary::Bullets;

/// Install a stderr `tracing` subscriber filtered by `RUST_LOG`
/// (default `precis=info`). Calling it again is a no-op.
pub fn setup_logging() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("precis=info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
