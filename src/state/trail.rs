//! The trail & backtrack log (spec §4.2, component C2).
//!
//! The trail is an undoable log of domain mutations. `push_checkpoint`
//! returns an opaque handle; `restore_to` pops entries and restores
//! snapshots in reverse. Branching always brackets a checkpoint around its
//! recursive call (spec §9).

use crate::domain::Domain;
use crate::variable::SimpleIntegerVariable;

/// An entry in the trail: the variable whose domain changed, and the shape it
/// had immediately before the change.
#[derive(Clone, Debug)]
struct TrailEntry {
	variable: SimpleIntegerVariable,
	previous_shape: Domain,
}

/// An opaque handle to a point in the trail, returned by
/// [`Trail::push_checkpoint`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Checkpoint(usize);

/// The undo log backing depth-first search (spec §9 GLOSSARY).
#[derive(Clone, Debug, Default)]
pub struct Trail {
	entries: Vec<TrailEntry>,
}

impl Trail {
	/// Record that `variable`'s domain was `previous_shape` immediately before
	/// the mutation that is about to become visible.
	pub fn record(&mut self, variable: SimpleIntegerVariable, previous_shape: Domain) {
		self.entries.push(TrailEntry {
			variable,
			previous_shape,
		});
	}

	/// Push a checkpoint, returning a handle that can later be passed to
	/// [`Self::restore_to`].
	pub fn push_checkpoint(&self) -> Checkpoint {
		Checkpoint(self.entries.len())
	}

	/// Pop and undo every entry recorded since `checkpoint`, restoring each
	/// variable's domain to its pre-mutation shape, in reverse order.
	pub fn restore_to(&mut self, checkpoint: Checkpoint, domains: &mut crate::domain::DomainStore) {
		debug_assert!(checkpoint.0 <= self.entries.len());
		while self.entries.len() > checkpoint.0 {
			let entry = self.entries.pop().expect("checked non-empty above");
			let _ = domains.replace(entry.variable, entry.previous_shape);
		}
	}

	/// The number of entries recorded since the trail was created (or last
	/// restored to checkpoint 0). Exposed for statistics and tests.
	pub fn len(&self) -> usize {
		self.entries.len()
	}

	/// Whether the trail currently has no entries.
	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}
}
