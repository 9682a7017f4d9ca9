/// Session orchestration against an in-memory transport
///
/// Exercises base advancement, partial failure, retry behavior,
/// conflict handling and cancellation without touching a real remote.
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use canvas_sync::config::Config;
use canvas_sync::error::{SyncError, TransportError};
use canvas_sync::session::{self, SyncSession};
use canvas_sync::store::SnapshotStore;
use canvas_sync::transport::{Retrying, RetryPolicy, Transport, TransportResult};
use canvas_sync::types::{ContentHash, CourseId, Origin, PathEntry, Snapshot};
use canvas_sync::workspace::{CourseMeta, Workspace};

#[derive(Debug)]
enum FailMode {
	Permanent,
	Transient(u32),
}

#[derive(Default)]
struct MockState {
	files: BTreeMap<PathBuf, Vec<u8>>,
	fail_uploads: BTreeMap<PathBuf, FailMode>,
	corrupt_downloads: BTreeSet<PathBuf>,
	upload_attempts: BTreeMap<PathBuf, u32>,
}

/// In-memory remote; clones share state so tests can inspect it later
#[derive(Clone, Default)]
struct MockTransport {
	state: Arc<Mutex<MockState>>,
}

impl MockTransport {
	fn seed(&self, path: &str, data: &[u8]) {
		self.state.lock().unwrap().files.insert(PathBuf::from(path), data.to_vec());
	}

	fn remove(&self, path: &str) {
		self.state.lock().unwrap().files.remove(&PathBuf::from(path));
	}

	fn fail_upload(&self, path: &str, mode: FailMode) {
		self.state.lock().unwrap().fail_uploads.insert(PathBuf::from(path), mode);
	}

	fn corrupt_download(&self, path: &str) {
		self.state.lock().unwrap().corrupt_downloads.insert(PathBuf::from(path));
	}

	fn file(&self, path: &str) -> Option<Vec<u8>> {
		self.state.lock().unwrap().files.get(&PathBuf::from(path)).cloned()
	}

	fn upload_attempts(&self, path: &str) -> u32 {
		self.state.lock().unwrap().upload_attempts.get(&PathBuf::from(path)).copied().unwrap_or(0)
	}
}

#[async_trait]
impl Transport for MockTransport {
	async fn fetch_remote_snapshot(&self, _course: &CourseId) -> TransportResult<Snapshot> {
		let state = self.state.lock().unwrap();
		Ok(Snapshot::from_entries(state.files.iter().map(|(path, data)| {
			PathEntry::new(path.clone(), ContentHash::of_bytes(data), Origin::Remote)
		})))
	}

	async fn upload(&self, path: &Path, data: &[u8]) -> TransportResult<ContentHash> {
		let mut state = self.state.lock().unwrap();
		*state.upload_attempts.entry(path.to_path_buf()).or_insert(0) += 1;
		match state.fail_uploads.get_mut(path) {
			Some(FailMode::Permanent) => {
				return Err(TransportError::Rejected { message: "upload refused".to_string() })
			}
			Some(FailMode::Transient(remaining)) if *remaining > 0 => {
				*remaining -= 1;
				return Err(TransportError::RateLimited);
			}
			_ => {}
		}
		state.files.insert(path.to_path_buf(), data.to_vec());
		Ok(ContentHash::of_bytes(data))
	}

	async fn download(&self, path: &Path) -> TransportResult<Vec<u8>> {
		let state = self.state.lock().unwrap();
		if state.corrupt_downloads.contains(path) {
			return Ok(b"garbage".to_vec());
		}
		state
			.files
			.get(path)
			.cloned()
			.ok_or_else(|| TransportError::NotFound { path: path.to_string_lossy().into_owned() })
	}

	async fn delete_remote(&self, path: &Path) -> TransportResult<()> {
		self.state.lock().unwrap().files.remove(path);
		Ok(())
	}
}

const COURSE: &str = "course-101";

fn test_config() -> Config {
	Config {
		cache_enabled: false,
		parallel_transfers: 2,
		retry_base_delay_ms: 1,
		..Config::default()
	}
}

fn setup_course() -> (tempfile::TempDir, Workspace) {
	let dir = tempfile::tempdir().unwrap();
	let meta = CourseMeta { course: CourseId::new(COURSE), remote: None };
	let ws = Workspace::init(dir.path(), &meta).unwrap();
	(dir, ws)
}

async fn sync_once(
	ws: &Workspace,
	transport: &dyn Transport,
) -> Result<session::RunReport, SyncError> {
	let session = SyncSession::new(CourseId::new(COURSE), test_config());
	session::sync(&session, ws.root(), &ws.canvas_dir(), transport).await
}

async fn load_base(ws: &Workspace) -> Snapshot {
	SnapshotStore::new(ws.canvas_dir(), CourseId::new(COURSE)).current_base().await.unwrap()
}

fn write_local(ws: &Workspace, rel: &str, data: &[u8]) {
	let path = ws.root().join(rel);
	if let Some(parent) = path.parent() {
		std::fs::create_dir_all(parent).unwrap();
	}
	std::fs::write(path, data).unwrap();
}

#[tokio::test]
async fn test_local_add_uploads_and_advances_base() {
	let (_dir, ws) = setup_course();
	let remote = MockTransport::default();

	// Both sides start with the same x, so the first run settles base.
	write_local(&ws, "x.txt", b"one");
	remote.seed("x.txt", b"one");
	sync_once(&ws, &remote).await.unwrap();
	assert_eq!(load_base(&ws).await.len(), 1);

	write_local(&ws, "y.txt", b"two");
	let report = sync_once(&ws, &remote).await.unwrap();

	assert_eq!(report.uploaded, 1);
	assert!(report.is_clean());
	assert_eq!(remote.file("y.txt"), Some(b"two".to_vec()));

	let base = load_base(&ws).await;
	assert_eq!(base.len(), 2);
	assert_eq!(
		base.get(&PathBuf::from("y.txt")).map(|e| e.hash.clone()),
		Some(ContentHash::of_bytes(b"two"))
	);
}

#[tokio::test]
async fn test_second_run_is_idempotent() {
	let (_dir, ws) = setup_course();
	let remote = MockTransport::default();
	write_local(&ws, "a.txt", b"alpha");

	sync_once(&ws, &remote).await.unwrap();
	let report = sync_once(&ws, &remote).await.unwrap();
	assert!(report.synced.is_empty());
	assert_eq!(report.uploaded + report.downloaded + report.deleted, 0);

	// The plan itself is empty, not just the execution.
	let session = SyncSession::new(CourseId::new(COURSE), test_config());
	let plan =
		session::plan_changes(&session, ws.root(), &ws.canvas_dir(), &remote).await.unwrap();
	assert!(plan.operations.is_empty());
	assert!(plan.conflicts.is_empty());
}

#[tokio::test]
async fn test_remote_add_downloads_file() {
	let (_dir, ws) = setup_course();
	let remote = MockTransport::default();
	remote.seed("Modules/Week1/slides.pdf", b"pdf bytes");

	let report = sync_once(&ws, &remote).await.unwrap();
	assert_eq!(report.downloaded, 1);
	assert_eq!(
		std::fs::read(ws.root().join("Modules/Week1/slides.pdf")).unwrap(),
		b"pdf bytes"
	);
}

#[tokio::test]
async fn test_permanent_failure_keeps_path_out_of_base() {
	let (_dir, ws) = setup_course();
	let remote = MockTransport::default();
	write_local(&ws, "a.txt", b"alpha");
	write_local(&ws, "b.txt", b"beta");
	remote.fail_upload("a.txt", FailMode::Permanent);

	let report = sync_once(&ws, &remote).await.unwrap();
	assert_eq!(report.failed.len(), 1);
	assert_eq!(report.failed[0].path, PathBuf::from("a.txt"));
	assert_eq!(report.uploaded, 1);

	// b advanced, a did not.
	let base = load_base(&ws).await;
	assert!(base.get(&PathBuf::from("b.txt")).is_some());
	assert!(base.get(&PathBuf::from("a.txt")).is_none());

	// The failed path is planned again on the next run.
	let session = SyncSession::new(CourseId::new(COURSE), test_config());
	let plan =
		session::plan_changes(&session, ws.root(), &ws.canvas_dir(), &remote).await.unwrap();
	assert_eq!(plan.operations.len(), 1);
	assert_eq!(plan.operations[0].path, PathBuf::from("a.txt"));
}

#[tokio::test]
async fn test_transient_failure_retries_until_success() {
	let (_dir, ws) = setup_course();
	let remote = MockTransport::default();
	write_local(&ws, "a.txt", b"alpha");
	remote.fail_upload("a.txt", FailMode::Transient(2));

	let policy = RetryPolicy { max_attempts: 3, base_delay: Duration::from_millis(1) };
	let retrying = Retrying::new(remote.clone(), policy);

	let report = sync_once(&ws, &retrying).await.unwrap();
	assert!(report.is_clean());
	assert_eq!(remote.upload_attempts("a.txt"), 3);
	assert_eq!(remote.file("a.txt"), Some(b"alpha".to_vec()));
}

#[tokio::test]
async fn test_exhausted_retries_surface_as_failure() {
	let (_dir, ws) = setup_course();
	let remote = MockTransport::default();
	write_local(&ws, "a.txt", b"alpha");
	remote.fail_upload("a.txt", FailMode::Transient(10));

	let policy = RetryPolicy { max_attempts: 2, base_delay: Duration::from_millis(1) };
	let retrying = Retrying::new(remote.clone(), policy);

	let report = sync_once(&ws, &retrying).await.unwrap();
	assert_eq!(report.failed.len(), 1);
	assert_eq!(remote.upload_attempts("a.txt"), 2);
	assert!(load_base(&ws).await.is_empty());
}

#[tokio::test]
async fn test_conflict_under_manual_changes_nothing() {
	let (_dir, ws) = setup_course();
	let remote = MockTransport::default();

	// Settle a shared base first.
	write_local(&ws, "essay.md", b"v1");
	remote.seed("essay.md", b"v1");
	sync_once(&ws, &remote).await.unwrap();

	// Now both sides diverge.
	write_local(&ws, "essay.md", b"local v2");
	remote.seed("essay.md", b"remote v2");

	let report = sync_once(&ws, &remote).await.unwrap();
	assert_eq!(report.conflicts.len(), 1);
	assert!(report.synced.is_empty());

	// Neither side moved and base still records v1.
	assert_eq!(std::fs::read(ws.root().join("essay.md")).unwrap(), b"local v2");
	assert_eq!(remote.file("essay.md"), Some(b"remote v2".to_vec()));
	let base = load_base(&ws).await;
	assert_eq!(
		base.get(&PathBuf::from("essay.md")).map(|e| e.hash.clone()),
		Some(ContentHash::of_bytes(b"v1"))
	);
}

#[tokio::test]
async fn test_deletions_propagate_both_ways() {
	let (_dir, ws) = setup_course();
	let remote = MockTransport::default();

	write_local(&ws, "keep.txt", b"k");
	write_local(&ws, "drop-remote.txt", b"d");
	remote.seed("keep.txt", b"k");
	remote.seed("drop-remote.txt", b"d");
	remote.seed("drop-local.txt", b"d2");
	write_local(&ws, "drop-local.txt", b"d2");
	sync_once(&ws, &remote).await.unwrap();

	// One side deletes each file.
	std::fs::remove_file(ws.root().join("drop-remote.txt")).unwrap();
	remote.remove("drop-local.txt");

	let report = sync_once(&ws, &remote).await.unwrap();
	assert_eq!(report.deleted, 2);
	assert!(remote.file("drop-remote.txt").is_none());
	assert!(!ws.root().join("drop-local.txt").exists());

	let base = load_base(&ws).await;
	assert_eq!(base.len(), 1);
	assert!(base.get(&PathBuf::from("keep.txt")).is_some());
}

#[tokio::test]
async fn test_download_hash_mismatch_fails_path_only() {
	let (_dir, ws) = setup_course();
	let remote = MockTransport::default();
	remote.seed("good.txt", b"fine");
	remote.seed("bad.txt", b"expected");
	remote.corrupt_download("bad.txt");

	let report = sync_once(&ws, &remote).await.unwrap();
	assert_eq!(report.downloaded, 1);
	assert_eq!(report.failed.len(), 1);
	assert_eq!(report.failed[0].path, PathBuf::from("bad.txt"));

	let base = load_base(&ws).await;
	assert!(base.get(&PathBuf::from("good.txt")).is_some());
	assert!(base.get(&PathBuf::from("bad.txt")).is_none());
	assert!(!ws.root().join("bad.txt").exists());
}

#[tokio::test]
async fn test_cancellation_commits_nothing() {
	let (_dir, ws) = setup_course();
	let remote = MockTransport::default();

	write_local(&ws, "x.txt", b"one");
	remote.seed("x.txt", b"one");
	sync_once(&ws, &remote).await.unwrap();
	let store = SnapshotStore::new(ws.canvas_dir(), CourseId::new(COURSE));
	let version_before = store.load().await.unwrap().version;

	write_local(&ws, "y.txt", b"two");
	let session = SyncSession::new(CourseId::new(COURSE), test_config());
	session.cancel_flag().store(true, Ordering::Relaxed);

	let result = session::sync(&session, ws.root(), &ws.canvas_dir(), &remote).await;
	assert!(matches!(result, Err(SyncError::Aborted)));

	// Base and version untouched, nothing reached the remote.
	assert_eq!(store.load().await.unwrap().version, version_before);
	assert!(remote.file("y.txt").is_none());
}

// vim: ts=4
