//! Conflict detection and resolution

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

pub mod resolver;

pub use resolver::{resolve, Agreement, Resolution};

use crate::types::ContentHash;

/// A divergent change to the same path on both sides since base
#[derive(Debug, Clone, PartialEq)]
pub struct Conflict {
	/// Path where the conflict occurred
	pub path: PathBuf,

	/// Type of conflict
	pub kind: ConflictKind,

	/// Candidate hash on the local side, None if deleted there
	pub local: Option<ContentHash>,

	/// Candidate hash on the remote side, None if deleted there
	pub remote: Option<ContentHash>,
}

impl fmt::Display for Conflict {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{} ({})", self.path.display(), self.kind)
	}
}

/// Types of conflicts that can occur
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictKind {
	/// Both sides changed the file to different content
	ModifyModify,

	/// Deleted locally, changed remotely
	DeleteModify,

	/// Changed locally, deleted remotely
	ModifyDelete,
}

impl fmt::Display for ConflictKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			ConflictKind::ModifyModify => write!(f, "both sides changed"),
			ConflictKind::DeleteModify => write!(f, "deleted here, changed on remote"),
			ConflictKind::ModifyDelete => write!(f, "changed here, deleted on remote"),
		}
	}
}

/// Policy applied uniformly to every conflict in a run
///
/// `Manual` keeps conflicted paths out of the plan and surfaces them in
/// the run report. The preference policies pick a side; the resolver logs
/// every such decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum ConflictPolicy {
	/// Surface conflicts, plan nothing for them (default)
	#[default]
	Manual,

	/// The local version wins
	PreferLocal,

	/// The remote version wins
	PreferRemote,
}

impl FromStr for ConflictPolicy {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.to_lowercase().as_str() {
			"manual" | "ask" => Ok(Self::Manual),
			"prefer-local" | "local" => Ok(Self::PreferLocal),
			"prefer-remote" | "remote" => Ok(Self::PreferRemote),
			_ => Err(format!(
				"Unknown conflict policy: {}. Valid options: manual, prefer-local, prefer-remote",
				s
			)),
		}
	}
}

impl fmt::Display for ConflictPolicy {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Manual => write!(f, "manual"),
			Self::PreferLocal => write!(f, "prefer-local"),
			Self::PreferRemote => write!(f, "prefer-remote"),
		}
	}
}


// vim: ts=4
