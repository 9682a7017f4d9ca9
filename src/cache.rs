//! Scan cache for incremental tree hashing
//!
//! Stores file hashes keyed by relative path, with mtime and size as the
//! change signal. A hit skips re-hashing the file; snapshot comparison
//! itself is always hash against hash. The cache is advisory, so losing
//! or deleting it only costs one full re-hash.

use redb::{ReadableDatabase, ReadableTable, TableDefinition};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::StoreError;
use crate::types::ContentHash;

/// Cache entry for a single file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
	#[serde(rename = "mt")]
	pub mtime: i64,
	#[serde(rename = "sz")]
	pub size: u64,
	#[serde(rename = "h")]
	pub hash: String,
}

impl CacheEntry {
	pub fn new(mtime: i64, size: u64, hash: ContentHash) -> Self {
		CacheEntry { mtime, size, hash: hash.0 }
	}
}

/// Table of file cache entries
/// Key: relative file path (String)
/// Value: serialized CacheEntry (bytes)
const FILES_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("files");

/// redb-backed hash cache for one course tree
pub struct ScanCache {
	db: redb::Database,
}

impl ScanCache {
	/// Open or create the cache database
	pub fn open(path: &Path) -> Result<Self, StoreError> {
		let db = redb::Database::create(path)
			.map_err(|e| StoreError::LoadFailed { source: Box::new(e) })?;
		Ok(ScanCache { db })
	}

	/// Look up a cached hash; only valid while mtime and size both match
	pub fn lookup(&self, rel: &str, mtime: i64, size: u64) -> Option<ContentHash> {
		let txn = self.db.begin_read().ok()?;
		let table = txn.open_table(FILES_TABLE).ok()?;
		let guard = table.get(rel).ok()??;
		let entry: CacheEntry = serde_json::from_slice(guard.value()).ok()?;
		(entry.mtime == mtime && entry.size == size).then(|| ContentHash(entry.hash))
	}

	/// Write freshly hashed entries in one transaction
	pub fn record(&self, entries: &[(String, CacheEntry)]) -> Result<(), StoreError> {
		if entries.is_empty() {
			return Ok(());
		}

		let txn = self
			.db
			.begin_write()
			.map_err(|e| StoreError::SaveFailed { source: Box::new(e) })?;
		{
			let mut table = txn
				.open_table(FILES_TABLE)
				.map_err(|e| StoreError::SaveFailed { source: Box::new(e) })?;
			for (rel, entry) in entries {
				let bytes = serde_json::to_vec(entry)
					.map_err(|e| StoreError::SaveFailed { source: Box::new(e) })?;
				table
					.insert(rel.as_str(), bytes.as_slice())
					.map_err(|e| StoreError::SaveFailed { source: Box::new(e) })?;
			}
		}
		txn.commit().map_err(|e| StoreError::SaveFailed { source: Box::new(e) })
	}
}


// vim: ts=4
