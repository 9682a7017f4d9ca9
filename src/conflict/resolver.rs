//! Three-way change classification
//!
//! For every path changed on either side since base, combines the local
//! and remote change tags into an operation, an agreement (no transfer
//! needed but base should advance), or a conflict.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use tracing::info;

use super::{Conflict, ConflictKind, ConflictPolicy};
use crate::diff::{ChangeKind, ChangeRecord};
use crate::types::{ContentHash, OpKind, Operation};

/// A path both sides already agree on, so base advances without transfer
#[derive(Debug, Clone, PartialEq)]
pub struct Agreement {
	pub path: PathBuf,

	/// Agreed content hash, None when both sides deleted the path
	pub hash: Option<ContentHash>,
}

/// Output of the resolver, unordered; the planner sequences operations
#[derive(Debug, Clone, Default)]
pub struct Resolution {
	pub operations: Vec<Operation>,
	pub conflicts: Vec<Conflict>,
	pub agreements: Vec<Agreement>,
}

/// Combine per-side change tags for every changed path
///
/// `local` and `remote` hold only changed records (see [`crate::diff::changes`]);
/// a path missing from one map is unchanged on that side.
pub fn resolve(
	local: &BTreeMap<PathBuf, ChangeRecord>,
	remote: &BTreeMap<PathBuf, ChangeRecord>,
	policy: ConflictPolicy,
) -> Resolution {
	let mut out = Resolution::default();

	let paths: BTreeSet<&PathBuf> = local.keys().chain(remote.keys()).collect();
	for path in paths {
		classify(path, local.get(path), remote.get(path), policy, &mut out);
	}
	out
}

fn classify(
	path: &Path,
	local: Option<&ChangeRecord>,
	remote: Option<&ChangeRecord>,
	policy: ConflictPolicy,
	out: &mut Resolution,
) {
	use ChangeKind::*;

	let local_kind = local.map(|r| r.kind).unwrap_or(Unchanged);
	let remote_kind = remote.map(|r| r.kind).unwrap_or(Unchanged);

	match (local_kind, remote_kind) {
		(Unchanged, Unchanged) => {}

		// One-sided changes mirror straight into operations.
		(Unchanged, Added | Modified) => {
			let hash = target_hash(remote);
			out.operations.push(Operation::new(OpKind::Download, path, hash));
		}
		(Unchanged, Deleted) => {
			let hash = base_hash(remote);
			out.operations.push(Operation::new(OpKind::DeleteLocal, path, hash));
		}
		(Added | Modified, Unchanged) => {
			let hash = target_hash(local);
			out.operations.push(Operation::new(OpKind::Upload, path, hash));
		}
		(Deleted, Unchanged) => {
			let hash = base_hash(local);
			out.operations.push(Operation::new(OpKind::DeleteRemote, path, hash));
		}

		// Both sides deleted: nothing to transfer, base forgets the path.
		(Deleted, Deleted) => {
			out.agreements.push(Agreement { path: path.to_path_buf(), hash: None });
		}

		(Added | Modified, Added | Modified) => {
			let local_hash = target_hash(local);
			let remote_hash = target_hash(remote);
			if local_hash == remote_hash {
				// Same content reached independently.
				out.agreements
					.push(Agreement { path: path.to_path_buf(), hash: Some(local_hash) });
			} else {
				divergent(
					path,
					ConflictKind::ModifyModify,
					Some(local_hash),
					Some(remote_hash),
					policy,
					out,
				);
			}
		}

		(Deleted, Added | Modified) => {
			divergent(
				path,
				ConflictKind::DeleteModify,
				None,
				Some(target_hash(remote)),
				policy,
				out,
			);
		}
		(Added | Modified, Deleted) => {
			divergent(
				path,
				ConflictKind::ModifyDelete,
				Some(target_hash(local)),
				None,
				policy,
				out,
			);
		}
	}
}

/// Apply the run policy to a divergent path
fn divergent(
	path: &Path,
	kind: ConflictKind,
	local: Option<ContentHash>,
	remote: Option<ContentHash>,
	policy: ConflictPolicy,
	out: &mut Resolution,
) {
	let op = match policy {
		ConflictPolicy::Manual => {
			out.conflicts.push(Conflict { path: path.to_path_buf(), kind, local, remote });
			return;
		}
		ConflictPolicy::PreferLocal => match &local {
			Some(hash) => Operation::new(OpKind::Upload, path, hash.clone()),
			// Local side deleted it, so the remote copy goes too.
			None => Operation::new(OpKind::DeleteRemote, path, remote.clone().unwrap_or_default()),
		},
		ConflictPolicy::PreferRemote => match &remote {
			Some(hash) => Operation::new(OpKind::Download, path, hash.clone()),
			None => Operation::new(OpKind::DeleteLocal, path, local.clone().unwrap_or_default()),
		},
	};

	info!(path = %path.display(), conflict = %kind, policy = %policy, resolved = %op.kind,
		"conflict resolved by policy");
	out.operations.push(op);
}

fn target_hash(record: Option<&ChangeRecord>) -> ContentHash {
	record.and_then(|r| r.target.clone()).unwrap_or_default()
}

fn base_hash(record: Option<&ChangeRecord>) -> ContentHash {
	record.and_then(|r| r.base.clone()).unwrap_or_default()
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::diff::changes;
	use crate::types::{Origin, PathEntry, Snapshot};

	fn snap(entries: &[(&str, &str)]) -> Snapshot {
		Snapshot::from_entries(
			entries.iter().map(|(p, h)| PathEntry::new(*p, ContentHash::from(*h), Origin::Local)),
		)
	}

	fn run(
		base: &[(&str, &str)],
		local: &[(&str, &str)],
		remote: &[(&str, &str)],
		policy: ConflictPolicy,
	) -> Resolution {
		let (base, local, remote) = (snap(base), snap(local), snap(remote));
		resolve(&changes(&base, &local), &changes(&base, &remote), policy)
	}

	#[test]
	fn test_one_sided_local_add_uploads() {
		let res = run(&[], &[("a.txt", "h1")], &[], ConflictPolicy::Manual);
		assert_eq!(res.operations, vec![Operation::new(OpKind::Upload, "a.txt", "h1".into())]);
		assert!(res.conflicts.is_empty());
	}

	#[test]
	fn test_one_sided_remote_delete_deletes_local() {
		let res = run(&[("a.txt", "h1")], &[("a.txt", "h1")], &[], ConflictPolicy::Manual);
		assert_eq!(res.operations, vec![Operation::new(OpKind::DeleteLocal, "a.txt", "h1".into())]);
	}

	#[test]
	fn test_divergent_modify_is_conflict_under_manual() {
		let res = run(
			&[("a.txt", "h1")],
			&[("a.txt", "h2")],
			&[("a.txt", "h3")],
			ConflictPolicy::Manual,
		);
		assert!(res.operations.is_empty());
		assert_eq!(res.conflicts.len(), 1);
		let c = &res.conflicts[0];
		assert_eq!(c.kind, ConflictKind::ModifyModify);
		assert_eq!(c.local, Some("h2".into()));
		assert_eq!(c.remote, Some("h3".into()));
	}

	#[test]
	fn test_same_hash_double_add_is_agreement() {
		let res = run(&[], &[("a.txt", "h1")], &[("a.txt", "h1")], ConflictPolicy::Manual);
		assert!(res.operations.is_empty());
		assert!(res.conflicts.is_empty());
		assert_eq!(
			res.agreements,
			vec![Agreement { path: "a.txt".into(), hash: Some("h1".into()) }]
		);
	}

	#[test]
	fn test_double_delete_is_agreement() {
		let res = run(&[("a.txt", "h1")], &[], &[], ConflictPolicy::Manual);
		assert_eq!(res.agreements, vec![Agreement { path: "a.txt".into(), hash: None }]);
		assert!(res.operations.is_empty());
	}

	#[test]
	fn test_prefer_local_turns_conflict_into_upload() {
		let res = run(
			&[("a.txt", "h1")],
			&[("a.txt", "h2")],
			&[("a.txt", "h3")],
			ConflictPolicy::PreferLocal,
		);
		assert!(res.conflicts.is_empty());
		assert_eq!(res.operations, vec![Operation::new(OpKind::Upload, "a.txt", "h2".into())]);
	}

	#[test]
	fn test_prefer_remote_on_modify_delete_deletes_local() {
		let res =
			run(&[("a.txt", "h1")], &[("a.txt", "h2")], &[], ConflictPolicy::PreferRemote);
		assert!(res.conflicts.is_empty());
		assert_eq!(res.operations, vec![Operation::new(OpKind::DeleteLocal, "a.txt", "h2".into())]);
	}

	#[test]
	fn test_delete_modify_is_conflict_under_manual() {
		let res =
			run(&[("a.txt", "h1")], &[], &[("a.txt", "h3")], ConflictPolicy::Manual);
		assert!(res.operations.is_empty());
		assert_eq!(res.conflicts.len(), 1);
		assert_eq!(res.conflicts[0].kind, ConflictKind::DeleteModify);
	}
}

// vim: ts=4
