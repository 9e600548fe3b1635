#![forbid(unsafe_code)]

//! Scripted command-line walk through the jtree selector.

pub mod cli;
pub mod error;
pub mod step;

pub use cli::{Cli, run, run_from_env};
pub use error::{DemoError, Result};
pub use step::Step;

/// Install a stderr `fmt` subscriber filtered by `RUST_LOG` (default `warn`).
pub fn init_logging() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
