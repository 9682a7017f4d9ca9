//! Sync planning
//!
//! Turns the resolver's unordered operation set into a deterministic
//! execution sequence. Deletions run first so remote storage quota is
//! freed before new content lands; uploads run before downloads so a
//! re-fetched remote snapshot already reflects pushed content.

use crate::types::Operation;

/// Order operations into their execution sequence
///
/// Paths are unique per run, so ordering only matters across phases.
/// Within a phase, operations are sorted lexicographically by path to
/// keep plans reproducible.
pub fn plan(mut operations: Vec<Operation>) -> Vec<Operation> {
	operations.sort_by(|a, b| {
		a.kind.phase().cmp(&b.kind.phase()).then_with(|| a.path.cmp(&b.path))
	});
	operations
}

/// Operations of one execution phase, in planned order
pub fn phase_slices(planned: &[Operation]) -> Vec<&[Operation]> {
	let mut slices = Vec::new();
	let mut start = 0;
	for i in 1..=planned.len() {
		if i == planned.len() || planned[i].kind.phase() != planned[start].kind.phase() {
			slices.push(&planned[start..i]);
			start = i;
		}
	}
	slices
}


// vim: ts=4
