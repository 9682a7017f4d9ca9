//! Core data model: hashes, snapshots, operations

use serde::{Deserialize, Serialize};
use std::collections::{btree_map, BTreeMap};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

/// Stable identifier of a remote course
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Debug, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CourseId(pub String);

impl CourseId {
	pub fn new(id: impl Into<String>) -> Self {
		CourseId(id.into())
	}
}

impl fmt::Display for CourseId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.0)
	}
}

/// Content hash of a file (blake3, hex encoded)
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Debug, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentHash(pub String);

impl ContentHash {
	/// Hash a byte buffer
	pub fn of_bytes(data: &[u8]) -> Self {
		ContentHash(hex::encode(blake3::hash(data).as_bytes()))
	}

	/// Wrap a finished blake3 hash
	pub fn from_blake3(hash: blake3::Hash) -> Self {
		ContentHash(hex::encode(hash.as_bytes()))
	}
}

impl fmt::Display for ContentHash {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.0)
	}
}

impl From<&str> for ContentHash {
	fn from(s: &str) -> Self {
		ContentHash(s.to_string())
	}
}

/// Which side a path entry was last observed on
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Origin {
	Local,
	Remote,
	Synced,
}

/// One tracked file inside a snapshot
///
/// The version is a logical counter stamped by the store when the base
/// snapshot advances, never a wall-clock time.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct PathEntry {
	/// Path relative to the course root
	pub path: PathBuf,

	/// Content hash of the file
	pub hash: ContentHash,

	/// Sync generation in which this entry last changed
	pub version: u64,

	/// Side the entry was observed on
	pub origin: Origin,
}

impl PathEntry {
	pub fn new(path: impl Into<PathBuf>, hash: ContentHash, origin: Origin) -> Self {
		PathEntry { path: path.into(), hash, version: 0, origin }
	}
}

/// Which of the three tracked snapshots is meant
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SnapshotKind {
	/// Last state both sides were confirmed synchronized against
	Base,
	/// Current working tree
	Local,
	/// Last fetched remote state
	Remote,
}

impl fmt::Display for SnapshotKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			SnapshotKind::Base => write!(f, "base"),
			SnapshotKind::Local => write!(f, "local"),
			SnapshotKind::Remote => write!(f, "remote"),
		}
	}
}

/// Point-in-time mapping of paths to content hashes
///
/// Paths are unique within a snapshot; the BTreeMap keeps them in
/// lexicographic order so diffs and logs are reproducible.
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct Snapshot {
	/// Unix seconds when the snapshot was taken
	pub taken_at: u64,

	entries: BTreeMap<PathBuf, PathEntry>,
}

impl Snapshot {
	/// Create an empty snapshot stamped with the current time
	pub fn empty() -> Self {
		Snapshot { taken_at: unix_now(), entries: BTreeMap::new() }
	}

	/// Build a snapshot from path entries; later duplicates win
	pub fn from_entries(entries: impl IntoIterator<Item = PathEntry>) -> Self {
		let mut snap = Snapshot::empty();
		for entry in entries {
			snap.insert(entry);
		}
		snap
	}

	pub fn insert(&mut self, entry: PathEntry) {
		self.entries.insert(entry.path.clone(), entry);
	}

	pub fn remove(&mut self, path: &Path) -> Option<PathEntry> {
		self.entries.remove(path)
	}

	pub fn get(&self, path: &Path) -> Option<&PathEntry> {
		self.entries.get(path)
	}

	pub fn contains(&self, path: &Path) -> bool {
		self.entries.contains_key(path)
	}

	pub fn len(&self) -> usize {
		self.entries.len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}

	/// Entries in lexicographic path order
	pub fn iter(&self) -> btree_map::Iter<'_, PathBuf, PathEntry> {
		self.entries.iter()
	}
}

impl Default for Snapshot {
	fn default() -> Self {
		Snapshot::empty()
	}
}

/// One planned unit of synchronization work
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OpKind {
	Upload,
	Download,
	DeleteLocal,
	DeleteRemote,
}

impl OpKind {
	/// Execution phase: deletions free remote quota before new content
	/// lands, uploads run before downloads.
	pub fn phase(&self) -> u8 {
		match self {
			OpKind::DeleteLocal | OpKind::DeleteRemote => 0,
			OpKind::Upload => 1,
			OpKind::Download => 2,
		}
	}
}

impl fmt::Display for OpKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			OpKind::Upload => write!(f, "upload"),
			OpKind::Download => write!(f, "download"),
			OpKind::DeleteLocal => write!(f, "delete-local"),
			OpKind::DeleteRemote => write!(f, "delete-remote"),
		}
	}
}

/// A planned action against one path, immutable once created
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct Operation {
	pub kind: OpKind,

	/// Path relative to the course root
	pub path: PathBuf,

	/// Hash of the content being transferred or removed
	pub hash: ContentHash,
}

impl Operation {
	pub fn new(kind: OpKind, path: impl Into<PathBuf>, hash: ContentHash) -> Self {
		Operation { kind, path: path.into(), hash }
	}
}

impl fmt::Display for Operation {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{} {}", self.kind, self.path.display())
	}
}

/// Current time as unix seconds
pub fn unix_now() -> u64 {
	SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or(0)
}


// vim: ts=4
