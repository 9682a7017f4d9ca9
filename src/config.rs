//! Configuration
//!
//! A single config struct with built-in defaults, optionally overridden
//! by `~/.canvas-sync/config.toml` and then by CLI flags (highest
//! priority). Everything the engine tunes lives here so behavior is
//! reproducible from one file.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::conflict::ConflictPolicy;
use crate::error::SyncError;
use crate::scan::ScanOptions;
use crate::transport::RetryPolicy;

/// Tool-wide configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Config {
	/// Glob patterns excluded from scanning (e.g. "*.tmp")
	pub exclude_patterns: Vec<String>,

	/// Honor .gitignore and .canvasignore files
	pub respect_ignore_files: bool,

	/// Policy applied uniformly to conflicts in a run
	pub conflict_policy: ConflictPolicy,

	/// Number of parallel transfers
	pub parallel_transfers: usize,

	/// Transport attempts per operation, including the first
	pub retry_attempts: u32,

	/// Backoff before the second attempt, doubling per retry
	pub retry_base_delay_ms: u64,

	/// Reuse hashes of files whose mtime and size are unchanged
	pub cache_enabled: bool,

	/// Log level when RUST_LOG is not set
	pub log_level: String,
}

impl Default for Config {
	fn default() -> Self {
		Config {
			exclude_patterns: vec![],
			respect_ignore_files: true,
			conflict_policy: ConflictPolicy::Manual,
			parallel_transfers: 4,
			retry_attempts: 3,
			retry_base_delay_ms: 500,
			cache_enabled: true,
			log_level: "info".to_string(),
		}
	}
}

impl Config {
	/// Global configuration directory (~/.canvas-sync)
	pub fn config_home() -> PathBuf {
		std::env::var("HOME")
			.ok()
			.map(|h| PathBuf::from(h).join(".canvas-sync"))
			.unwrap_or_else(|| PathBuf::from(".canvas-sync"))
	}

	/// Load the config file if present, defaults otherwise
	pub fn load() -> Result<Config, SyncError> {
		let path = Self::config_home().join("config.toml");
		if !path.exists() {
			return Ok(Config::default());
		}
		let contents = std::fs::read_to_string(&path)?;
		toml::from_str(&contents).map_err(|e| SyncError::InvalidConfig {
			message: format!("cannot parse {}: {}", path.display(), e),
		})
	}

	pub fn scan_options(&self) -> ScanOptions {
		ScanOptions {
			exclude_patterns: self.exclude_patterns.clone(),
			respect_ignore_files: self.respect_ignore_files,
		}
	}

	pub fn retry_policy(&self) -> RetryPolicy {
		RetryPolicy {
			max_attempts: self.retry_attempts.max(1),
			base_delay: Duration::from_millis(self.retry_base_delay_ms),
		}
	}
}


// vim: ts=4
