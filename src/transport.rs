//! Remote transport interface
//!
//! The sync engine never talks to a remote service directly; it goes
//! through [`Transport`], and adapters convert raw responses into the
//! typed snapshot model at this boundary. Retry behavior lives in the
//! [`Retrying`] wrapper, not in the engine.

use async_trait::async_trait;
use std::future::Future;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::TransportError;
use crate::scan::{self, ScanOptions};
use crate::types::{ContentHash, CourseId, Origin, Snapshot};

/// Result type for transport operations
pub type TransportResult<T> = Result<T, TransportError>;

/// Remote side of a sync session
///
/// `delete-local` operations never reach the transport; they are applied
/// by the filesystem helpers in [`crate::scan`].
#[async_trait]
pub trait Transport: Send + Sync {
	/// Fetch the current remote state as a typed snapshot
	async fn fetch_remote_snapshot(&self, course: &CourseId) -> TransportResult<Snapshot>;

	/// Store a file on the remote, returning the hash of what landed
	async fn upload(&self, path: &Path, data: &[u8]) -> TransportResult<ContentHash>;

	/// Fetch a file's bytes from the remote
	async fn download(&self, path: &Path) -> TransportResult<Vec<u8>>;

	/// Remove a file from the remote
	async fn delete_remote(&self, path: &Path) -> TransportResult<()>;
}

/// Bounded retry with exponential backoff for transient failures
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
	/// Total attempts, including the first
	pub max_attempts: u32,

	/// Delay before the second attempt; doubles per retry
	pub base_delay: Duration,
}

impl Default for RetryPolicy {
	fn default() -> Self {
		RetryPolicy { max_attempts: 3, base_delay: Duration::from_millis(500) }
	}
}

impl RetryPolicy {
	/// Delay before retry number `attempt` (0-based), capped at 30s
	pub fn delay(&self, attempt: u32) -> Duration {
		let factor = 1u32 << attempt.min(16);
		self.base_delay.saturating_mul(factor).min(Duration::from_secs(30))
	}
}

/// Run a transport call under a retry policy
///
/// Only errors marked retryable trigger another attempt; permanent
/// failures surface immediately.
pub async fn with_retry<R, F, Fut>(policy: &RetryPolicy, mut call: F) -> TransportResult<R>
where
	F: FnMut() -> Fut + Send,
	Fut: Future<Output = TransportResult<R>> + Send,
{
	let mut attempt = 0;
	loop {
		match call().await {
			Ok(value) => return Ok(value),
			Err(e) if e.retryable() && attempt + 1 < policy.max_attempts => {
				let delay = policy.delay(attempt);
				warn!(attempt = attempt + 1, delay_ms = delay.as_millis() as u64,
					"transient transport failure, retrying: {}", e);
				tokio::time::sleep(delay).await;
				attempt += 1;
			}
			Err(e) => return Err(e),
		}
	}
}

/// Transport wrapper applying a [`RetryPolicy`] to every call
pub struct Retrying<T> {
	inner: T,
	policy: RetryPolicy,
}

impl<T> Retrying<T> {
	pub fn new(inner: T, policy: RetryPolicy) -> Self {
		Retrying { inner, policy }
	}
}

#[async_trait]
impl<T: Transport> Transport for Retrying<T> {
	async fn fetch_remote_snapshot(&self, course: &CourseId) -> TransportResult<Snapshot> {
		with_retry(&self.policy, || self.inner.fetch_remote_snapshot(course)).await
	}

	async fn upload(&self, path: &Path, data: &[u8]) -> TransportResult<ContentHash> {
		with_retry(&self.policy, || self.inner.upload(path, data)).await
	}

	async fn download(&self, path: &Path) -> TransportResult<Vec<u8>> {
		with_retry(&self.policy, || self.inner.download(path)).await
	}

	async fn delete_remote(&self, path: &Path) -> TransportResult<()> {
		with_retry(&self.policy, || self.inner.delete_remote(path)).await
	}
}

/// Directory tree standing in for the remote course
///
/// Useful for offline work and for exercising the whole engine without a
/// live API; a Canvas REST adapter plugs in behind the same trait.
pub struct DirMirror {
	root: std::path::PathBuf,
}

impl DirMirror {
	pub fn new(root: impl Into<std::path::PathBuf>) -> Self {
		DirMirror { root: root.into() }
	}
}

#[async_trait]
impl Transport for DirMirror {
	async fn fetch_remote_snapshot(&self, course: &CourseId) -> TransportResult<Snapshot> {
		debug!(course = %course, root = %self.root.display(), "scanning mirror");
		let options = ScanOptions { exclude_patterns: vec![], respect_ignore_files: false };
		scan::snapshot_tree(&self.root, Origin::Remote, &options, None).map_err(to_transport_error)
	}

	async fn upload(&self, path: &Path, data: &[u8]) -> TransportResult<ContentHash> {
		scan::write_file(&self.root, path, data)?;
		Ok(ContentHash::of_bytes(data))
	}

	async fn download(&self, path: &Path) -> TransportResult<Vec<u8>> {
		scan::read_file(&self.root, path).map_err(|e| {
			if e.kind() == std::io::ErrorKind::NotFound {
				TransportError::NotFound { path: path.to_string_lossy().into_owned() }
			} else {
				TransportError::Io(e)
			}
		})
	}

	async fn delete_remote(&self, path: &Path) -> TransportResult<()> {
		scan::delete_file(&self.root, path)?;
		Ok(())
	}
}

fn to_transport_error(e: crate::error::SyncError) -> TransportError {
	match e {
		crate::error::SyncError::Io(io) => TransportError::Io(io),
		other => TransportError::Unavailable { message: other.to_string() },
	}
}


// vim: ts=4
