//! Tracing setup
//!
//! Logs go to stderr so command output stays clean for piping. The level
//! comes from the config file unless `RUST_LOG` overrides it, e.g.:
//!
//! ```bash
//! RUST_LOG=canvas_sync=debug canvas-sync sync
//! RUST_LOG=canvas_sync::session=trace canvas-sync plan
//! ```

use tracing_subscriber::EnvFilter;

/// Initialize the tracing subscriber
///
/// `default_level` applies when RUST_LOG is unset or empty.
pub fn init_tracing(default_level: &str) {
	let filter = EnvFilter::try_from_default_env()
		.unwrap_or_else(|_| EnvFilter::new(default_level));
	tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}

// vim: ts=4
