//! Logging setup.
//!
//! Logs go to stderr: when serving, stdout carries the MCP protocol.
//! `RUST_LOG` overrides the level derived from `-v` / `-q`.

use tracing::Level;
use tracing_subscriber::EnvFilter;

/// `-q` wins; otherwise info, debug (`-v`), trace (`-vv`).
pub fn derive_level(verbose: u8, quiet: bool) -> Level {
    if quiet {
        return Level::ERROR;
    }
    match verbose {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    }
}

pub fn init_logging(level: Level) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.as_str().to_ascii_lowercase()));
    // a second init (tests) is harmless
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
