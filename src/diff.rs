//! Snapshot diffing
//!
//! Compares two snapshots by content hash only. Modification times never
//! enter the comparison, so clock skew and re-saves with identical content
//! cannot produce false positives. Records come out in lexicographic path
//! order, which keeps plans and logs reproducible across runs.

use std::cmp::Ordering;
use std::collections::{btree_map, BTreeMap};
use std::iter::Peekable;
use std::path::{Path, PathBuf};

use crate::types::{ContentHash, PathEntry, Snapshot};

/// How a path changed relative to the base snapshot
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ChangeKind {
	Added,
	Deleted,
	Modified,
	Unchanged,
}

/// One path's change relative to base, for a single side
#[derive(Clone, PartialEq, Debug)]
pub struct ChangeRecord {
	pub path: PathBuf,
	pub kind: ChangeKind,

	/// Hash in the base snapshot, if the path existed there
	pub base: Option<ContentHash>,

	/// Hash in the compared snapshot, if the path exists there
	pub target: Option<ContentHash>,
}

impl ChangeRecord {
	pub fn is_change(&self) -> bool {
		self.kind != ChangeKind::Unchanged
	}

	fn deleted(path: &Path, base: &PathEntry) -> Self {
		ChangeRecord {
			path: path.to_path_buf(),
			kind: ChangeKind::Deleted,
			base: Some(base.hash.clone()),
			target: None,
		}
	}

	fn added(path: &Path, target: &PathEntry) -> Self {
		ChangeRecord {
			path: path.to_path_buf(),
			kind: ChangeKind::Added,
			base: None,
			target: Some(target.hash.clone()),
		}
	}

	fn compared(path: &Path, base: &PathEntry, target: &PathEntry) -> Self {
		let kind = if base.hash == target.hash {
			ChangeKind::Unchanged
		} else {
			ChangeKind::Modified
		};
		ChangeRecord {
			path: path.to_path_buf(),
			kind,
			base: Some(base.hash.clone()),
			target: Some(target.hash.clone()),
		}
	}
}

/// Lazy diff of two snapshots, one record per path present in either
pub fn diff<'a>(base: &'a Snapshot, other: &'a Snapshot) -> Diff<'a> {
	Diff { base: base.iter().peekable(), other: other.iter().peekable() }
}

/// Changed paths only, keyed for lookup by the resolver
pub fn changes(base: &Snapshot, other: &Snapshot) -> BTreeMap<PathBuf, ChangeRecord> {
	diff(base, other).filter(|r| r.is_change()).map(|r| (r.path.clone(), r)).collect()
}

/// Merge-join iterator over the union of two snapshots' paths
pub struct Diff<'a> {
	base: Peekable<btree_map::Iter<'a, PathBuf, PathEntry>>,
	other: Peekable<btree_map::Iter<'a, PathBuf, PathEntry>>,
}

impl<'a> Iterator for Diff<'a> {
	type Item = ChangeRecord;

	fn next(&mut self) -> Option<ChangeRecord> {
		// Both maps iterate in path order, so advancing the smaller key
		// walks the union lexicographically.
		let order = match (self.base.peek(), self.other.peek()) {
			(None, None) => return None,
			(Some(_), None) => Ordering::Less,
			(None, Some(_)) => Ordering::Greater,
			(Some((bp, _)), Some((op, _))) => bp.cmp(op),
		};

		match order {
			Ordering::Less => {
				let (path, entry) = self.base.next()?;
				Some(ChangeRecord::deleted(path, entry))
			}
			Ordering::Greater => {
				let (path, entry) = self.other.next()?;
				Some(ChangeRecord::added(path, entry))
			}
			Ordering::Equal => {
				let (path, base_entry) = self.base.next()?;
				let (_, other_entry) = self.other.next()?;
				Some(ChangeRecord::compared(path, base_entry, other_entry))
			}
		}
	}
}


// vim: ts=4
