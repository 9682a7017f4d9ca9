//! Snapshot store: persistent per-course sync state
//!
//! One JSON record per course, holding the three tracked snapshots and a
//! monotonic version counter. Saves go through a temp file and rename, so
//! a crash mid-write can never leave a half-written record; a failed run
//! keeps the previous base and the next run recomputes the same diff.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::StoreError;
use crate::types::{CourseId, Snapshot, SnapshotKind};

/// Persisted sync state for one course
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CourseRecord {
	/// Course this record belongs to
	pub course: CourseId,

	/// Sync generation, bumped on every committed run
	pub version: u64,

	/// Last fully synchronized state
	pub base: Snapshot,

	/// Working tree as of the last invocation
	pub local: Snapshot,

	/// Remote state as of the last fetch
	pub remote: Snapshot,
}

impl CourseRecord {
	/// Fresh record for a course that has never synced
	pub fn new(course: CourseId) -> Self {
		CourseRecord {
			course,
			version: 0,
			base: Snapshot::empty(),
			local: Snapshot::empty(),
			remote: Snapshot::empty(),
		}
	}

	pub fn snapshot(&self, kind: SnapshotKind) -> &Snapshot {
		match kind {
			SnapshotKind::Base => &self.base,
			SnapshotKind::Local => &self.local,
			SnapshotKind::Remote => &self.remote,
		}
	}

	pub fn set_snapshot(&mut self, kind: SnapshotKind, snapshot: Snapshot) {
		match kind {
			SnapshotKind::Base => self.base = snapshot,
			SnapshotKind::Local => self.local = snapshot,
			SnapshotKind::Remote => self.remote = snapshot,
		}
	}
}

/// Store for one course's record, rooted in its `.canvas` directory
pub struct SnapshotStore {
	state_dir: PathBuf,
	course: CourseId,
}

impl SnapshotStore {
	pub fn new(state_dir: impl Into<PathBuf>, course: CourseId) -> Self {
		SnapshotStore { state_dir: state_dir.into(), course }
	}

	/// Load the course record, or a fresh one if none was saved yet
	///
	/// An unparseable record is reported as [`StoreError::Corrupted`]; the
	/// caller decides whether to fall back to a full re-sync.
	pub async fn load(&self) -> Result<CourseRecord, StoreError> {
		let path = self.record_path();

		if !path.exists() {
			return Ok(CourseRecord::new(self.course.clone()));
		}

		let contents = tokio::fs::read_to_string(&path)
			.await
			.map_err(|e| StoreError::LoadFailed { source: Box::new(e) })?;

		serde_json::from_str(&contents).map_err(|e| StoreError::Corrupted {
			message: format!("cannot parse {}: {}", path.display(), e),
		})
	}

	/// Convenience for read-only callers that need a single snapshot
	pub async fn load_snapshot(&self, kind: SnapshotKind) -> Result<Snapshot, StoreError> {
		Ok(self.load().await?.snapshot(kind).clone())
	}

	/// The last fully synchronized state
	pub async fn current_base(&self) -> Result<Snapshot, StoreError> {
		self.load_snapshot(SnapshotKind::Base).await
	}

	/// Atomically replace the persisted record
	pub async fn save(&self, record: &CourseRecord) -> Result<(), StoreError> {
		let path = self.record_path();

		if let Some(parent) = path.parent() {
			if !parent.exists() {
				tokio::fs::create_dir_all(parent)
					.await
					.map_err(|e| StoreError::SaveFailed { source: Box::new(e) })?;
			}
		}

		let json = serde_json::to_string(record)
			.map_err(|e| StoreError::SaveFailed { source: Box::new(e) })?;

		// Temp file plus rename, so the old record survives a crash.
		let tmp = path.with_extension("json.tmp");
		tokio::fs::write(&tmp, json)
			.await
			.map_err(|e| StoreError::SaveFailed { source: Box::new(e) })?;
		tokio::fs::rename(&tmp, &path)
			.await
			.map_err(|e| StoreError::SaveFailed { source: Box::new(e) })
	}

	/// Path of the persisted record
	pub fn record_path(&self) -> PathBuf {
		self.state_dir.join("state.json")
	}

	/// Acquire the per-course exclusive lock
	///
	/// Two concurrent syncs against the same course could commit divergent
	/// base snapshots, so only one session may run at a time.
	pub fn lock(&self) -> Result<StoreLock, StoreError> {
		StoreLock::acquire(&self.state_dir)
	}
}

/// RAII lock guard for exclusive sync access
pub struct StoreLock {
	path: PathBuf,
}

impl StoreLock {
	fn acquire(state_dir: &Path) -> Result<Self, StoreError> {
		let lock_path = state_dir.join("sync.lock");

		if lock_path.exists() {
			let holder = std::fs::read_to_string(&lock_path).unwrap_or_default();
			return Err(StoreError::LockFailed {
				message: format!(
					"sync already in progress (pid {}). If stale, delete: {}",
					holder.trim(),
					lock_path.display()
				),
			});
		}

		if let Some(parent) = lock_path.parent() {
			std::fs::create_dir_all(parent)
				.map_err(|e| StoreError::LockFailed { message: e.to_string() })?;
		}

		let pid = std::process::id();
		std::fs::write(&lock_path, pid.to_string())
			.map_err(|e| StoreError::LockFailed { message: e.to_string() })?;

		Ok(StoreLock { path: lock_path })
	}
}

impl Drop for StoreLock {
	fn drop(&mut self) {
		// Remove lock file on drop (whether success or failure)
		let _ = std::fs::remove_file(&self.path);
	}
}


// vim: ts=4
