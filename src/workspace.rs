//! Course workspace layout
//!
//! A course tree is marked by a `.canvas` directory at its root, holding
//! `metadata.json` (the stable course identity and remote location),
//! `staged.json` (files staged for submission), the persisted sync state
//! and the scan cache. Commands may run from any subdirectory; the
//! workspace is found by walking up, like a git repository.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::WorkspaceError;
use crate::scan::CANVAS_DIR;
use crate::types::CourseId;

const METADATA_FILE: &str = "metadata.json";
const STAGED_FILE: &str = "staged.json";

/// Course identity and remote location, persisted at init time
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseMeta {
	pub course: CourseId,

	/// Remote location for the directory-mirror transport
	pub remote: Option<String>,
}

/// Outcome of a staging request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageOutcome {
	Staged,
	AlreadyStaged,
	Unstaged,
	NotStaged,
	Missing,
}

/// Handle to an initialized course tree
pub struct Workspace {
	root: PathBuf,
}

impl Workspace {
	/// Initialize a course workspace in `dir`
	pub fn init(dir: &Path, meta: &CourseMeta) -> Result<Workspace, WorkspaceError> {
		let canvas = dir.join(CANVAS_DIR);
		if canvas.exists() {
			return Err(WorkspaceError::AlreadyInitialized { path: dir.to_path_buf() });
		}

		fs::create_dir_all(&canvas)?;
		let json = serde_json::to_string(meta)
			.map_err(|e| WorkspaceError::MetadataInvalid { message: e.to_string() })?;
		fs::write(canvas.join(METADATA_FILE), json)?;
		fs::write(canvas.join(STAGED_FILE), "[]")?;

		let root = dir.canonicalize()?;
		Ok(Workspace { root })
	}

	/// Find the enclosing course workspace by walking up from `start`
	pub fn find(start: &Path) -> Result<Workspace, WorkspaceError> {
		let mut dir = start.canonicalize()?;
		loop {
			if dir.join(CANVAS_DIR).is_dir() {
				return Ok(Workspace { root: dir });
			}
			if !dir.pop() {
				return Err(WorkspaceError::NotACourse);
			}
		}
	}

	/// Open a workspace whose root is already known
	pub fn open(root: &Path) -> Result<Workspace, WorkspaceError> {
		if !root.join(CANVAS_DIR).is_dir() {
			return Err(WorkspaceError::NotACourse);
		}
		Ok(Workspace { root: root.canonicalize()? })
	}

	pub fn root(&self) -> &Path {
		&self.root
	}

	/// The `.canvas` metadata directory
	pub fn canvas_dir(&self) -> PathBuf {
		self.root.join(CANVAS_DIR)
	}

	pub fn metadata(&self) -> Result<CourseMeta, WorkspaceError> {
		let path = self.canvas_dir().join(METADATA_FILE);
		let contents = fs::read_to_string(&path)?;
		serde_json::from_str(&contents).map_err(|e| WorkspaceError::MetadataInvalid {
			message: format!("cannot parse {}: {}", path.display(), e),
		})
	}

	/// Currently staged files, relative to the course root
	pub fn staged(&self) -> Result<Vec<PathBuf>, WorkspaceError> {
		let path = self.canvas_dir().join(STAGED_FILE);
		if !path.exists() {
			return Ok(vec![]);
		}
		let contents = fs::read_to_string(&path)?;
		serde_json::from_str(&contents).map_err(|e| WorkspaceError::MetadataInvalid {
			message: format!("cannot parse {}: {}", path.display(), e),
		})
	}

	/// Stage a file for submission
	pub fn stage(&self, file: &Path) -> Result<StageOutcome, WorkspaceError> {
		let rel = match self.rel_path(file) {
			Some(rel) => rel,
			None => return Ok(StageOutcome::Missing),
		};

		let mut staged = self.staged()?;
		if staged.contains(&rel) {
			return Ok(StageOutcome::AlreadyStaged);
		}
		staged.push(rel);
		self.write_staged(&staged)?;
		Ok(StageOutcome::Staged)
	}

	/// Remove a file from the staging set
	pub fn unstage(&self, file: &Path) -> Result<StageOutcome, WorkspaceError> {
		// Unstaging works even after the file itself was deleted.
		let rel = self
			.rel_path(file)
			.unwrap_or_else(|| file.to_path_buf());

		let mut staged = self.staged()?;
		let before = staged.len();
		staged.retain(|p| p != &rel);
		if staged.len() == before {
			return Ok(StageOutcome::NotStaged);
		}
		self.write_staged(&staged)?;
		Ok(StageOutcome::Unstaged)
	}

	/// Clear the staging set
	pub fn clear_staged(&self) -> Result<(), WorkspaceError> {
		self.write_staged(&[])
	}

	/// Resolve a user-supplied path to a root-relative one, if it exists
	/// inside the course tree
	fn rel_path(&self, file: &Path) -> Option<PathBuf> {
		let absolute = file.canonicalize().ok()?;
		absolute.strip_prefix(&self.root).ok().map(Path::to_path_buf)
	}

	fn write_staged(&self, staged: &[PathBuf]) -> Result<(), WorkspaceError> {
		let json = serde_json::to_string(staged)
			.map_err(|e| WorkspaceError::MetadataInvalid { message: e.to_string() })?;
		fs::write(self.canvas_dir().join(STAGED_FILE), json)?;
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn init_course(dir: &Path) -> Workspace {
		let meta = CourseMeta { course: CourseId::new("course-101"), remote: None };
		Workspace::init(dir, &meta).unwrap()
	}

	#[test]
	fn test_init_and_find_from_subdir() {
		let dir = tempfile::tempdir().unwrap();
		init_course(dir.path());
		fs::create_dir_all(dir.path().join("Modules/Week1")).unwrap();

		let ws = Workspace::find(&dir.path().join("Modules/Week1")).unwrap();
		assert_eq!(ws.root(), dir.path().canonicalize().unwrap());
		assert_eq!(ws.metadata().unwrap().course, CourseId::new("course-101"));
	}

	#[test]
	fn test_find_outside_course_fails() {
		let dir = tempfile::tempdir().unwrap();
		assert!(matches!(Workspace::find(dir.path()), Err(WorkspaceError::NotACourse)));
	}

	#[test]
	fn test_double_init_fails() {
		let dir = tempfile::tempdir().unwrap();
		init_course(dir.path());
		let meta = CourseMeta { course: CourseId::new("course-101"), remote: None };
		assert!(matches!(
			Workspace::init(dir.path(), &meta),
			Err(WorkspaceError::AlreadyInitialized { .. })
		));
	}

	#[test]
	fn test_stage_unstage_cycle() {
		let dir = tempfile::tempdir().unwrap();
		let ws = init_course(dir.path());
		fs::write(dir.path().join("essay.md"), b"draft").unwrap();

		assert_eq!(ws.stage(&dir.path().join("essay.md")).unwrap(), StageOutcome::Staged);
		assert_eq!(ws.stage(&dir.path().join("essay.md")).unwrap(), StageOutcome::AlreadyStaged);
		assert_eq!(ws.staged().unwrap(), vec![PathBuf::from("essay.md")]);

		assert_eq!(ws.unstage(&dir.path().join("essay.md")).unwrap(), StageOutcome::Unstaged);
		assert_eq!(ws.unstage(&dir.path().join("essay.md")).unwrap(), StageOutcome::NotStaged);
		assert!(ws.staged().unwrap().is_empty());
	}

	#[test]
	fn test_stage_missing_file() {
		let dir = tempfile::tempdir().unwrap();
		let ws = init_course(dir.path());
		assert_eq!(ws.stage(&dir.path().join("ghost.md")).unwrap(), StageOutcome::Missing);
	}
}

// vim: ts=4
