//! Sync session orchestration
//!
//! A [`SyncSession`] is the explicit context for one invocation against
//! one course: it takes the course lock, rebuilds the local and remote
//! snapshots, resolves changes against base, executes the plan with
//! bounded concurrency, and commits a new base covering exactly the paths
//! that fully succeeded. A failed or conflicted path keeps its old base
//! entry, so the next run picks it up again; a cancelled run commits
//! nothing.

use futures::stream::{self, StreamExt};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::cache::ScanCache;
use crate::config::Config;
use crate::conflict::{resolve, Conflict, Resolution};
use crate::diff;
use crate::error::{StoreError, SyncError};
use crate::plan::{phase_slices, plan};
use crate::scan;
use crate::store::{CourseRecord, SnapshotStore, StoreLock};
use crate::transport::Transport;
use crate::types::{ContentHash, CourseId, OpKind, Operation, Origin, PathEntry, Snapshot};

const CACHE_FILE: &str = "cache.redb";

/// Context for one sync invocation against one course
pub struct SyncSession {
	pub id: Uuid,
	pub course: CourseId,
	pub config: Config,
	cancelled: Arc<AtomicBool>,
}

impl SyncSession {
	pub fn new(course: CourseId, config: Config) -> Self {
		SyncSession { id: Uuid::new_v4(), course, config, cancelled: Arc::new(AtomicBool::new(false)) }
	}

	/// Flag a signal handler can set to stop the run safely
	pub fn cancel_flag(&self) -> Arc<AtomicBool> {
		self.cancelled.clone()
	}

	pub fn is_cancelled(&self) -> bool {
		self.cancelled.load(Ordering::Relaxed)
	}
}

/// Planned work without execution
#[derive(Debug, Clone)]
pub struct PlanReport {
	pub operations: Vec<Operation>,
	pub conflicts: Vec<Conflict>,
}

/// One path that could not be synchronized this run
#[derive(Debug, Clone)]
pub struct FailedPath {
	pub path: PathBuf,
	pub error: String,
}

/// Outcome of a completed run
#[derive(Debug, Clone)]
pub struct RunReport {
	pub session: Uuid,
	pub synced: Vec<PathBuf>,
	pub failed: Vec<FailedPath>,
	pub conflicts: Vec<Conflict>,
	pub uploaded: u32,
	pub downloaded: u32,
	pub deleted: u32,
	pub duration_ms: u64,
}

impl RunReport {
	fn new(session: Uuid) -> Self {
		RunReport {
			session,
			synced: vec![],
			failed: vec![],
			conflicts: vec![],
			uploaded: 0,
			downloaded: 0,
			deleted: 0,
			duration_ms: 0,
		}
	}

	/// True when every changed path synchronized
	pub fn is_clean(&self) -> bool {
		self.failed.is_empty() && self.conflicts.is_empty()
	}
}

struct Prepared {
	store: SnapshotStore,
	lock: StoreLock,
	record: CourseRecord,
	local: Snapshot,
	remote: Snapshot,
	resolution: Resolution,
}

/// Compute the plan for the current state without executing anything
pub async fn plan_changes(
	session: &SyncSession,
	root: &Path,
	canvas_dir: &Path,
	transport: &dyn Transport,
) -> Result<PlanReport, SyncError> {
	let prepared = prepare(session, root, canvas_dir, transport).await?;
	Ok(PlanReport {
		operations: plan(prepared.resolution.operations),
		conflicts: prepared.resolution.conflicts,
	})
}

/// Run a full sync: plan, execute, and commit the new base
pub async fn sync(
	session: &SyncSession,
	root: &Path,
	canvas_dir: &Path,
	transport: &dyn Transport,
) -> Result<RunReport, SyncError> {
	let started = Instant::now();
	let mut prepared = prepare(session, root, canvas_dir, transport).await?;

	let planned = plan(prepared.resolution.operations.clone());
	info!(
		session = %session.id,
		operations = planned.len(),
		conflicts = prepared.resolution.conflicts.len(),
		"plan ready"
	);

	let results = execute(session, root, transport, &planned).await;

	if session.is_cancelled() {
		// Nothing commits on cancellation. Transfers that already ran
		// reappear as same-hash agreements next time, so the state
		// converges without a base advance here.
		info!(session = %session.id, "cancelled, base left unchanged");
		return Err(SyncError::Aborted);
	}

	let mut report = RunReport::new(session.id);
	report.conflicts = prepared.resolution.conflicts.clone();

	let mut new_base = prepared.record.base.clone();
	let next_version = prepared.record.version + 1;
	let mut base_changed = false;

	for agreement in &prepared.resolution.agreements {
		base_changed = true;
		match &agreement.hash {
			Some(hash) => {
				new_base.insert(PathEntry {
					path: agreement.path.clone(),
					hash: hash.clone(),
					version: next_version,
					origin: Origin::Synced,
				});
			}
			None => {
				new_base.remove(&agreement.path);
			}
		}
		report.synced.push(agreement.path.clone());
	}

	for (op, result) in &results {
		match result {
			Ok(()) => {
				base_changed = true;
				match op.kind {
					OpKind::Upload | OpKind::Download => {
						new_base.insert(PathEntry {
							path: op.path.clone(),
							hash: op.hash.clone(),
							version: next_version,
							origin: Origin::Synced,
						});
					}
					OpKind::DeleteLocal | OpKind::DeleteRemote => {
						new_base.remove(&op.path);
					}
				}
				match op.kind {
					OpKind::Upload => report.uploaded += 1,
					OpKind::Download => report.downloaded += 1,
					OpKind::DeleteLocal | OpKind::DeleteRemote => report.deleted += 1,
				}
				report.synced.push(op.path.clone());
			}
			Err(message) => {
				warn!(path = %op.path.display(), op = %op.kind, "operation failed: {}", message);
				report.failed.push(FailedPath { path: op.path.clone(), error: message.clone() });
			}
		}
	}

	if base_changed {
		prepared.record.version = next_version;
	}
	prepared.record.base = new_base;
	prepared.record.local = prepared.local;
	prepared.record.remote = prepared.remote;
	prepared.store.save(&prepared.record).await?;
	drop(prepared.lock);

	report.duration_ms = started.elapsed().as_millis() as u64;
	info!(
		session = %session.id,
		synced = report.synced.len(),
		failed = report.failed.len(),
		conflicts = report.conflicts.len(),
		duration_ms = report.duration_ms,
		"sync finished"
	);
	Ok(report)
}

/// Take the lock, rebuild snapshots and resolve changes against base
async fn prepare(
	session: &SyncSession,
	root: &Path,
	canvas_dir: &Path,
	transport: &dyn Transport,
) -> Result<Prepared, SyncError> {
	let store = SnapshotStore::new(canvas_dir, session.course.clone());
	let lock = store.lock()?;

	let record = match store.load().await {
		Ok(record) => record,
		Err(StoreError::Corrupted { message }) => {
			warn!("persisted state unreadable, performing full re-sync: {}", message);
			CourseRecord::new(session.course.clone())
		}
		Err(e) => return Err(e.into()),
	};

	let cache = if session.config.cache_enabled {
		match ScanCache::open(&canvas_dir.join(CACHE_FILE)) {
			Ok(cache) => Some(cache),
			Err(e) => {
				warn!("scan cache unavailable: {}", e);
				None
			}
		}
	} else {
		None
	};

	let local = scan::scan_local_tree(root, &session.config.scan_options(), cache.as_ref())?;
	debug!(files = local.len(), "local tree scanned");

	let remote = transport.fetch_remote_snapshot(&session.course).await?;
	debug!(files = remote.len(), "remote snapshot fetched");

	let local_changes = diff::changes(&record.base, &local);
	let remote_changes = diff::changes(&record.base, &remote);
	let resolution = resolve(&local_changes, &remote_changes, session.config.conflict_policy);

	Ok(Prepared { store, lock, record, local, remote, resolution })
}

/// Execute planned operations phase by phase with bounded concurrency
///
/// Phases stay ordered (deletes, uploads, downloads); operations inside a
/// phase touch independent paths and may run in any order.
async fn execute(
	session: &SyncSession,
	root: &Path,
	transport: &dyn Transport,
	planned: &[Operation],
) -> Vec<(Operation, Result<(), String>)> {
	let jobs = session.config.parallel_transfers.max(1);
	let mut results = Vec::with_capacity(planned.len());

	for phase in phase_slices(planned) {
		if session.is_cancelled() {
			break;
		}
		let phase_results: Vec<(Operation, Result<(), String>)> =
			stream::iter(phase.iter().map(|op| {
				let op = op.clone();
				async move {
					if session.is_cancelled() {
						return (op, Err("cancelled".to_string()));
					}
					debug!(op = %op, "applying");
					let result = apply_operation(root, transport, &op).await;
					(op, result)
				}
			}))
			.buffer_unordered(jobs)
			.collect()
			.await;
		results.extend(phase_results);
	}
	results
}

/// Apply one operation, verifying content hashes on both directions
async fn apply_operation(
	root: &Path,
	transport: &dyn Transport,
	op: &Operation,
) -> Result<(), String> {
	match op.kind {
		OpKind::Upload => {
			let data =
				scan::read_file(root, &op.path).map_err(|e| format!("read failed: {}", e))?;
			if ContentHash::of_bytes(&data) != op.hash {
				// The file moved under us since the scan. Skip it; the
				// next run sees the new content.
				return Err("file changed during sync".to_string());
			}
			let stored = transport.upload(&op.path, &data).await.map_err(|e| e.to_string())?;
			if stored != op.hash {
				return Err(format!("upload hash mismatch: expected {}, got {}", op.hash, stored));
			}
			Ok(())
		}
		OpKind::Download => {
			let data = transport.download(&op.path).await.map_err(|e| e.to_string())?;
			let received = ContentHash::of_bytes(&data);
			if received != op.hash {
				return Err(format!(
					"download hash mismatch: expected {}, got {}",
					op.hash, received
				));
			}
			scan::write_file(root, &op.path, &data).map_err(|e| format!("write failed: {}", e))
		}
		OpKind::DeleteLocal => {
			scan::delete_file(root, &op.path).map_err(|e| format!("delete failed: {}", e))
		}
		OpKind::DeleteRemote => transport.delete_remote(&op.path).await.map_err(|e| e.to_string()),
	}
}

// vim: ts=4
