use clap::{Arg, ArgAction, Command};
use std::error::Error;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::atomic::Ordering;

use canvas_sync::config::Config;
use canvas_sync::conflict::ConflictPolicy;
use canvas_sync::error::{StoreError, SyncError};
use canvas_sync::session::{self, PlanReport, RunReport, SyncSession};
use canvas_sync::store::SnapshotStore;
use canvas_sync::transport::{DirMirror, Retrying};
use canvas_sync::types::CourseId;
use canvas_sync::workspace::{CourseMeta, StageOutcome, Workspace};
use canvas_sync::{diff, logging, scan};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
	let matches = Command::new("canvas-sync")
		.version("0.1.0")
		.about("Git-style synchronization between a local course tree and a Canvas course")
		.subcommand_required(true)
		.subcommand(
			Command::new("init")
				.about("Initialize a course workspace and pull its content")
				.arg(Arg::new("course").required(true).help("Stable course identifier"))
				.arg(
					Arg::new("remote")
						.long("remote")
						.value_name("DIR")
						.help("Remote location (directory mirror)"),
				)
				.arg(
					Arg::new("dir")
						.long("dir")
						.value_name("PATH")
						.help("Directory to initialize (default: current)"),
				),
		)
		.subcommand(
			Command::new("sync")
				.about("Synchronize the course tree with the remote")
				.arg(
					Arg::new("policy")
						.long("policy")
						.value_name("POLICY")
						.help("Conflict policy: manual, prefer-local, prefer-remote"),
				)
				.arg(
					Arg::new("jobs")
						.long("jobs")
						.short('j')
						.value_name("N")
						.help("Parallel transfers"),
				)
				.arg(
					Arg::new("dry-run")
						.long("dry-run")
						.action(ArgAction::SetTrue)
						.help("Plan only, change nothing"),
				)
				.arg(Arg::new("remote").long("remote").value_name("DIR").help("Override remote")),
		)
		.subcommand(
			Command::new("plan")
				.about("Show what a sync would do, without doing it")
				.arg(Arg::new("remote").long("remote").value_name("DIR").help("Override remote")),
		)
		.subcommand(Command::new("status").about("Show staged files and local changes"))
		.subcommand(
			Command::new("stage")
				.about("Stage a file for submission")
				.arg(Arg::new("file").required(true)),
		)
		.subcommand(
			Command::new("unstage")
				.about("Remove a file from the staging set")
				.arg(Arg::new("file").required(true)),
		)
		.get_matches();

	let config = Config::load()?;
	logging::init_tracing(&config.log_level);

	match matches.subcommand() {
		Some(("init", sub)) => {
			let course = sub.get_one::<String>("course").ok_or("init: course id required")?;
			let remote = sub.get_one::<String>("remote").cloned();
			let dir = sub.get_one::<String>("dir").map(PathBuf::from).unwrap_or_else(|| ".".into());
			cmd_init(config, course, remote, &dir).await
		}
		Some(("sync", sub)) => {
			let mut config = config;
			if let Some(policy) = sub.get_one::<String>("policy") {
				config.conflict_policy = ConflictPolicy::from_str(policy)?;
			}
			if let Some(jobs) = sub.get_one::<String>("jobs") {
				config.parallel_transfers =
					jobs.parse().map_err(|_| format!("invalid job count: {}", jobs))?;
			}
			let remote = sub.get_one::<String>("remote").cloned();
			if sub.get_flag("dry-run") {
				cmd_plan(config, remote).await
			} else {
				cmd_sync(config, remote).await
			}
		}
		Some(("plan", sub)) => {
			let remote = sub.get_one::<String>("remote").cloned();
			cmd_plan(config, remote).await
		}
		Some(("status", _)) => cmd_status(config).await,
		Some(("stage", sub)) => {
			let file = sub.get_one::<String>("file").ok_or("stage: file argument required")?;
			cmd_stage(Path::new(file), true)
		}
		Some(("unstage", sub)) => {
			let file = sub.get_one::<String>("file").ok_or("unstage: file argument required")?;
			cmd_stage(Path::new(file), false)
		}
		_ => unreachable!("subcommand required"),
	}
}

async fn cmd_init(
	config: Config,
	course: &str,
	remote: Option<String>,
	dir: &Path,
) -> Result<(), Box<dyn Error>> {
	std::fs::create_dir_all(dir)?;
	let meta = CourseMeta { course: CourseId::new(course), remote: remote.clone() };
	let ws = Workspace::init(dir, &meta)?;
	println!("Course {} initialized at {}", course, ws.root().display());

	// With a remote configured, the first sync pulls the course content.
	if remote.is_some() {
		let report = run_sync(&ws, config, remote).await?;
		print_report(&report);
	}
	Ok(())
}

async fn cmd_sync(config: Config, remote: Option<String>) -> Result<(), Box<dyn Error>> {
	let ws = Workspace::find(Path::new("."))?;
	let report = run_sync(&ws, config, remote).await?;
	print_report(&report);
	if !report.is_clean() {
		std::process::exit(1);
	}
	Ok(())
}

async fn cmd_plan(config: Config, remote: Option<String>) -> Result<(), Box<dyn Error>> {
	let ws = Workspace::find(Path::new("."))?;
	let course = ws.metadata()?.course;
	let transport = build_transport(&ws, &config, remote)?;
	let session = SyncSession::new(course, config);
	let report =
		session::plan_changes(&session, ws.root(), &ws.canvas_dir(), &transport).await?;
	print_plan(&report);
	Ok(())
}

async fn cmd_status(config: Config) -> Result<(), Box<dyn Error>> {
	let ws = Workspace::find(Path::new("."))?;
	let course = ws.metadata()?.course;

	let staged = ws.staged()?;
	if staged.is_empty() {
		println!("No files are currently staged.");
	} else {
		println!("Currently staged:");
		for file in &staged {
			println!("\t{}", file.display());
		}
	}

	let store = SnapshotStore::new(ws.canvas_dir(), course);
	let base = match store.current_base().await {
		Ok(base) => base,
		Err(StoreError::Corrupted { message }) => {
			eprintln!("warning: sync state unreadable ({}), showing all files as added", message);
			canvas_sync::types::Snapshot::empty()
		}
		Err(e) => return Err(Box::new(SyncError::from(e))),
	};

	let local = scan::scan_local_tree(ws.root(), &config.scan_options(), None)?;
	let changes = diff::changes(&base, &local);
	if changes.is_empty() {
		println!("Working tree matches the last synced state.");
		return Ok(());
	}

	println!("Changes since last sync:");
	for (path, record) in &changes {
		let tag = match record.kind {
			diff::ChangeKind::Added => "added",
			diff::ChangeKind::Deleted => "deleted",
			diff::ChangeKind::Modified => "modified",
			diff::ChangeKind::Unchanged => continue,
		};
		println!("\t{}: {}", tag, path.display());
	}
	Ok(())
}

fn cmd_stage(file: &Path, stage: bool) -> Result<(), Box<dyn Error>> {
	let ws = Workspace::find(Path::new("."))?;
	let outcome = if stage { ws.stage(file)? } else { ws.unstage(file)? };
	match outcome {
		StageOutcome::Staged => println!("Staged {}", file.display()),
		StageOutcome::AlreadyStaged => println!("{} is already staged.", file.display()),
		StageOutcome::Unstaged => println!("Unstaged {}", file.display()),
		StageOutcome::NotStaged => println!("{} is not staged.", file.display()),
		StageOutcome::Missing => println!("{} does not exist.", file.display()),
	}
	Ok(())
}

async fn run_sync(
	ws: &Workspace,
	config: Config,
	remote: Option<String>,
) -> Result<RunReport, Box<dyn Error>> {
	let course = ws.metadata()?.course;
	let transport = build_transport(ws, &config, remote)?;
	let session = SyncSession::new(course, config);

	// First interrupt requests a safe stop; the run finishes in-flight
	// operations and commits nothing.
	let flag = session.cancel_flag();
	tokio::spawn(async move {
		if tokio::signal::ctrl_c().await.is_ok() {
			eprintln!("interrupt received, stopping without committing...");
			flag.store(true, Ordering::Relaxed);
		}
	});

	let report = session::sync(&session, ws.root(), &ws.canvas_dir(), &transport).await?;
	Ok(report)
}

/// Resolve the remote location and wrap the transport in the retry policy
fn build_transport(
	ws: &Workspace,
	config: &Config,
	remote: Option<String>,
) -> Result<Retrying<DirMirror>, Box<dyn Error>> {
	let location = match remote.or(ws.metadata()?.remote) {
		Some(location) => location,
		None => {
			return Err(Box::new(SyncError::InvalidConfig {
				message: "no remote configured; pass --remote or set it in metadata".to_string(),
			}))
		}
	};
	Ok(Retrying::new(DirMirror::new(location), config.retry_policy()))
}

fn print_plan(report: &PlanReport) {
	if report.operations.is_empty() {
		println!("Nothing to do.");
	} else {
		println!("Planned operations:");
		for op in &report.operations {
			println!("\t{}", op);
		}
	}
	print_conflicts(&report.conflicts);
}

fn print_report(report: &RunReport) {
	println!(
		"Synced {} path(s): {} uploaded, {} downloaded, {} deleted ({} ms)",
		report.synced.len(),
		report.uploaded,
		report.downloaded,
		report.deleted,
		report.duration_ms
	);
	print_conflicts(&report.conflicts);
	if !report.failed.is_empty() {
		println!("Failed (will retry next run):");
		for failure in &report.failed {
			println!("\t{}: {}", failure.path.display(), failure.error);
		}
	}
}

fn print_conflicts(conflicts: &[canvas_sync::Conflict]) {
	if conflicts.is_empty() {
		return;
	}
	println!("Conflicts (resolve manually or rerun with --policy):");
	for conflict in conflicts {
		println!("\t{}", conflict);
	}
}

// vim: ts=4
