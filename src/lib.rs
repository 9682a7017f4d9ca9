//! # canvas-sync - Git-style synchronization for Canvas LMS courses
//!
//! canvas-sync keeps a local course tree and a remote Canvas course in
//! step the way git keeps a working tree and a remote in step: it tracks
//! a base snapshot (the last agreed state), diffs both sides against it
//! by content hash, classifies divergent paths as conflicts, and executes
//! an ordered operation plan through a pluggable transport.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use canvas_sync::config::Config;
//! use canvas_sync::session::{self, SyncSession};
//! use canvas_sync::transport::{DirMirror, Retrying};
//! use canvas_sync::types::CourseId;
//! use canvas_sync::workspace::Workspace;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::load()?;
//!     let ws = Workspace::find(std::path::Path::new("."))?;
//!     let course = ws.metadata()?.course;
//!     let transport = Retrying::new(DirMirror::new("/srv/course-mirror"), config.retry_policy());
//!     let session = SyncSession::new(course, config);
//!     let report = session::sync(&session, ws.root(), &ws.canvas_dir(), &transport).await?;
//!     println!("synced {} paths", report.synced.len());
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod config;
pub mod conflict;
pub mod diff;
pub mod error;
pub mod logging;
pub mod plan;
pub mod scan;
pub mod session;
pub mod store;
pub mod transport;
pub mod types;
pub mod workspace;

// Re-export commonly used types and functions
pub use config::Config;
pub use conflict::{Conflict, ConflictPolicy};
pub use error::{StoreError, SyncError, TransportError, WorkspaceError};
pub use session::{RunReport, SyncSession};
pub use types::{ContentHash, CourseId, Operation, Snapshot};

// vim: ts=4
