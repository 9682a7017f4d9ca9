//! Error types for canvas-sync operations

use std::error::Error;
use std::fmt;
use std::io;
use std::path::PathBuf;

/// Main error type for sync operations
#[derive(Debug)]
pub enum SyncError {
	/// Persisted state problem (nested)
	Store(StoreError),

	/// Remote transport failure (nested)
	Transport(TransportError),

	/// Course workspace problem (nested)
	Workspace(WorkspaceError),

	/// Invalid configuration
	InvalidConfig { message: String },

	/// Operation cancelled by user
	Aborted,

	/// I/O error
	Io(io::Error),

	/// Generic error message
	Other { message: String },
}

impl fmt::Display for SyncError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			SyncError::Store(e) => write!(f, "State error: {}", e),
			SyncError::Transport(e) => write!(f, "Transport error: {}", e),
			SyncError::Workspace(e) => write!(f, "Workspace error: {}", e),
			SyncError::InvalidConfig { message } => {
				write!(f, "Invalid configuration: {}", message)
			}
			SyncError::Aborted => write!(f, "Operation cancelled by user"),
			SyncError::Io(e) => write!(f, "I/O error: {}", e),
			SyncError::Other { message } => write!(f, "{}", message),
		}
	}
}

impl Error for SyncError {}

impl From<io::Error> for SyncError {
	fn from(e: io::Error) -> Self {
		SyncError::Io(e)
	}
}

impl From<String> for SyncError {
	fn from(e: String) -> Self {
		SyncError::Other { message: e }
	}
}

impl From<StoreError> for SyncError {
	fn from(e: StoreError) -> Self {
		SyncError::Store(e)
	}
}

impl From<TransportError> for SyncError {
	fn from(e: TransportError) -> Self {
		SyncError::Transport(e)
	}
}

impl From<WorkspaceError> for SyncError {
	fn from(e: WorkspaceError) -> Self {
		SyncError::Workspace(e)
	}
}

/// Snapshot store errors
#[derive(Debug)]
pub enum StoreError {
	/// Failed to read the course record
	LoadFailed { source: Box<dyn Error + Send + Sync> },

	/// Failed to write the course record
	SaveFailed { source: Box<dyn Error + Send + Sync> },

	/// Persisted record cannot be parsed
	Corrupted { message: String },

	/// Another sync holds the course lock
	LockFailed { message: String },
}

impl fmt::Display for StoreError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			StoreError::LoadFailed { source } => write!(f, "Failed to load state: {}", source),
			StoreError::SaveFailed { source } => write!(f, "Failed to save state: {}", source),
			StoreError::Corrupted { message } => write!(f, "State corrupted: {}", message),
			StoreError::LockFailed { message } => write!(f, "Lock failed: {}", message),
		}
	}
}

impl Error for StoreError {}

/// Remote transport errors
///
/// Every variant is either retryable (transient, worth another attempt
/// after backoff) or permanent. The session only retries the former.
#[derive(Debug)]
pub enum TransportError {
	/// Remote endpoint unreachable or answered with a server error
	Unavailable { message: String },

	/// Remote asked us to slow down
	RateLimited,

	/// Path does not exist on the remote
	NotFound { path: String },

	/// Remote refused the operation (permissions, quota, validation)
	Rejected { message: String },

	/// Underlying I/O failure
	Io(io::Error),
}

impl TransportError {
	/// Whether the operation is worth retrying after backoff
	pub fn retryable(&self) -> bool {
		match self {
			TransportError::Unavailable { .. } => true,
			TransportError::RateLimited => true,
			TransportError::NotFound { .. } => false,
			TransportError::Rejected { .. } => false,
			TransportError::Io(e) => e.kind() == io::ErrorKind::Interrupted,
		}
	}
}

impl fmt::Display for TransportError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			TransportError::Unavailable { message } => {
				write!(f, "Remote unavailable: {}", message)
			}
			TransportError::RateLimited => write!(f, "Remote rate limit hit"),
			TransportError::NotFound { path } => write!(f, "Not found on remote: {}", path),
			TransportError::Rejected { message } => {
				write!(f, "Remote rejected operation: {}", message)
			}
			TransportError::Io(e) => write!(f, "Transport I/O error: {}", e),
		}
	}
}

impl Error for TransportError {}

impl From<io::Error> for TransportError {
	fn from(e: io::Error) -> Self {
		TransportError::Io(e)
	}
}

/// Course workspace errors
#[derive(Debug)]
pub enum WorkspaceError {
	/// Command was run outside a course tree
	NotACourse,

	/// Workspace already initialized at this location
	AlreadyInitialized { path: PathBuf },

	/// Metadata or staging file cannot be parsed
	MetadataInvalid { message: String },

	/// Underlying I/O failure
	Io(io::Error),
}

impl fmt::Display for WorkspaceError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			WorkspaceError::NotACourse => {
				write!(f, "Not inside a course (no .canvas directory found)")
			}
			WorkspaceError::AlreadyInitialized { path } => {
				write!(f, "Course already initialized at {}", path.display())
			}
			WorkspaceError::MetadataInvalid { message } => {
				write!(f, "Invalid course metadata: {}", message)
			}
			WorkspaceError::Io(e) => write!(f, "Workspace I/O error: {}", e),
		}
	}
}

impl Error for WorkspaceError {}

impl From<io::Error> for WorkspaceError {
	fn from(e: io::Error) -> Self {
		WorkspaceError::Io(e)
	}
}


// vim: ts=4
