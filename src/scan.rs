//! Local tree scanning and file operations
//!
//! Walks a course tree into a [`Snapshot`] of content hashes. Honors
//! ignore files the way git does, plus `.canvasignore` for course-specific
//! exclusions. The `.canvas` metadata directory never syncs.

use globset::{Glob, GlobSet, GlobSetBuilder};
use ignore::WalkBuilder;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;
use tracing::warn;

use crate::cache::{CacheEntry, ScanCache};
use crate::error::SyncError;
use crate::types::{ContentHash, Origin, PathEntry, Snapshot};

/// Name of the per-course metadata directory, never part of a snapshot
pub const CANVAS_DIR: &str = ".canvas";

/// Custom ignore file honored in addition to .gitignore
pub const IGNORE_FILE: &str = ".canvasignore";

/// Options controlling a tree scan
#[derive(Debug, Clone)]
pub struct ScanOptions {
	/// Glob patterns to exclude (relative to the scanned root)
	pub exclude_patterns: Vec<String>,

	/// Honor .gitignore and .canvasignore files
	pub respect_ignore_files: bool,
}

impl Default for ScanOptions {
	fn default() -> Self {
		ScanOptions { exclude_patterns: vec![], respect_ignore_files: true }
	}
}

/// Scan the working tree into a local snapshot
pub fn scan_local_tree(
	root: &Path,
	options: &ScanOptions,
	cache: Option<&ScanCache>,
) -> Result<Snapshot, SyncError> {
	snapshot_tree(root, Origin::Local, options, cache)
}

/// Walk a directory tree into a snapshot with the given origin tag
///
/// Hashing is synchronous; only files are tracked, directories exist
/// implicitly through the paths under them.
pub fn snapshot_tree(
	root: &Path,
	origin: Origin,
	options: &ScanOptions,
	cache: Option<&ScanCache>,
) -> Result<Snapshot, SyncError> {
	let excludes = build_globset(&options.exclude_patterns)?;

	let mut walker = WalkBuilder::new(root);
	walker
		.standard_filters(false)
		.hidden(false)
		.ignore(options.respect_ignore_files)
		.git_ignore(options.respect_ignore_files);
	if options.respect_ignore_files {
		walker.add_custom_ignore_filename(IGNORE_FILE);
	}
	walker.filter_entry(|entry| entry.file_name() != std::ffi::OsStr::new(CANVAS_DIR));

	let mut snapshot = Snapshot::empty();
	let mut fresh: Vec<(String, CacheEntry)> = Vec::new();

	for entry in walker.build() {
		let entry = match entry {
			Ok(e) => e,
			Err(e) => {
				warn!("skipping unreadable entry: {}", e);
				continue;
			}
		};
		if !entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
			continue;
		}

		let path = entry.path();
		let rel = match path.strip_prefix(root) {
			Ok(r) => r.to_path_buf(),
			Err(_) => continue,
		};
		if excludes.is_match(&rel) {
			continue;
		}

		let meta = entry.metadata().map_err(|e| SyncError::Other {
			message: format!("cannot stat {}: {}", path.display(), e),
		})?;
		let mtime = file_mtime(&meta);
		let size = meta.len();
		let rel_key = rel.to_string_lossy().into_owned();

		let hash = match cache.and_then(|c| c.lookup(&rel_key, mtime, size)) {
			Some(hash) => hash,
			None => {
				let hash = hash_file(path)?;
				fresh.push((rel_key, CacheEntry::new(mtime, size, hash.clone())));
				hash
			}
		};

		snapshot.insert(PathEntry::new(rel, hash, origin));
	}

	if let Some(cache) = cache {
		// Cache misses are already hashed; a failed write only costs the
		// next scan some re-hashing.
		if let Err(e) = cache.record(&fresh) {
			warn!("scan cache update failed: {}", e);
		}
	}

	Ok(snapshot)
}

/// Hash one file's content without loading it whole into memory
pub fn hash_file(path: &Path) -> Result<ContentHash, SyncError> {
	let mut file = fs::File::open(path)?;
	let mut hasher = blake3::Hasher::new();
	io::copy(&mut file, &mut hasher)?;
	Ok(ContentHash::from_blake3(hasher.finalize()))
}

/// Read a tracked file's bytes
pub fn read_file(root: &Path, rel: &Path) -> io::Result<Vec<u8>> {
	fs::read(root.join(rel))
}

/// Write a tracked file, creating parent directories as needed
///
/// Writes to a temp file and renames, so a crash cannot leave a
/// half-written file behind in the working tree.
pub fn write_file(root: &Path, rel: &Path, data: &[u8]) -> io::Result<()> {
	let target = root.join(rel);
	if let Some(parent) = target.parent() {
		fs::create_dir_all(parent)?;
	}
	let tmp = tmp_path(&target);
	fs::write(&tmp, data)?;
	fs::rename(&tmp, &target)
}

/// Remove a tracked file; already absent counts as removed
pub fn delete_file(root: &Path, rel: &Path) -> io::Result<()> {
	let target = root.join(rel);
	match fs::remove_file(&target) {
		Ok(()) => Ok(()),
		Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
		Err(e) => Err(e),
	}
}

fn tmp_path(target: &Path) -> PathBuf {
	let mut name = target.file_name().unwrap_or_default().to_os_string();
	name.push(".canvas-tmp");
	target.with_file_name(name)
}

fn build_globset(patterns: &[String]) -> Result<GlobSet, SyncError> {
	let mut builder = GlobSetBuilder::new();
	for pattern in patterns {
		let glob = Glob::new(pattern).map_err(|e| SyncError::InvalidConfig {
			message: format!("bad exclude pattern {:?}: {}", pattern, e),
		})?;
		builder.add(glob);
	}
	builder.build().map_err(|e| SyncError::InvalidConfig { message: e.to_string() })
}

fn file_mtime(meta: &fs::Metadata) -> i64 {
	meta.modified()
		.ok()
		.and_then(|t| t.duration_since(UNIX_EPOCH).ok())
		.map(|d| d.as_secs() as i64)
		.unwrap_or(0)
}


// vim: ts=4
