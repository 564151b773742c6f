//! Bidirectional atom ↔ reaction relation.
//!
//! Both directions are kept in step by every mutation, so
//! `reaction ∈ get_reactions(atom)` holds exactly when `atom ∈ get_atoms(reaction)`.

use std::cell::RefCell;

use fxhash::FxHashMap;
use smallvec::SmallVec;

use crate::atom::AtomId;
use crate::reaction::{self, ReactionId};

pub type Reactions = SmallVec<[ReactionId; 4]>;
pub type Atoms = SmallVec<[AtomId; 4]>;

#[derive(Default)]
struct Table {
	atom_reactions: FxHashMap<AtomId, Reactions>,
	reaction_atoms: FxHashMap<ReactionId, Atoms>,
}

thread_local! {
	static TABLE: RefCell<Table> = RefCell::new(Table::default());
}

fn remove_item<A>(list: &mut SmallVec<A>, item: &A::Item) -> bool
where
	A: smallvec::Array,
	A::Item: PartialEq,
{
	match list.iter().position(|x| x == item) {
		Some(index) => {
			list.remove(index);
			true
		}
		None => false,
	}
}

impl Table {
	fn track(&mut self, atom: AtomId, reaction: ReactionId) {
		let reactions = self.atom_reactions.entry(atom).or_default();
		if !reactions.contains(&reaction) {
			reactions.push(reaction);
		}

		let atoms = self.reaction_atoms.entry(reaction).or_default();
		if !atoms.contains(&atom) {
			atoms.push(atom);
		}
	}

	fn untrack(&mut self, atom: AtomId, reaction: ReactionId) {
		if let Some(reactions) = self.atom_reactions.get_mut(&atom) {
			remove_item(reactions, &reaction);
			if reactions.is_empty() {
				self.atom_reactions.remove(&atom);
			}
		}

		if let Some(atoms) = self.reaction_atoms.get_mut(&reaction) {
			remove_item(atoms, &atom);
			if atoms.is_empty() {
				self.reaction_atoms.remove(&reaction);
			}
		}
	}

	fn untrack_reaction(&mut self, reaction: ReactionId) {
		let Some(atoms) = self.reaction_atoms.remove(&reaction) else {
			return;
		};

		for atom in atoms {
			if let Some(reactions) = self.atom_reactions.get_mut(&atom) {
				remove_item(reactions, &reaction);
				if reactions.is_empty() {
					self.atom_reactions.remove(&atom);
				}
			}
		}
	}

	fn untrack_atom(&mut self, atom: AtomId) {
		let Some(reactions) = self.atom_reactions.remove(&atom) else {
			return;
		};

		for reaction in reactions {
			if let Some(atoms) = self.reaction_atoms.get_mut(&reaction) {
				remove_item(atoms, &atom);
				if atoms.is_empty() {
					self.reaction_atoms.remove(&reaction);
				}
			}
		}
	}
}

/// Registers that `reaction` depends on `atom`. Idempotent.
///
/// Tracking a destroyed reaction is ignored, which tolerates a read racing
/// with the teardown of the reaction that performed it.
pub fn track(atom: AtomId, reaction: ReactionId) {
	if !reaction::is_alive(reaction) {
		tracing::debug!(?atom, ?reaction, "ignoring track of destroyed reaction");
		return;
	}

	TABLE.with(|table| table.borrow_mut().track(atom, reaction));
}

pub fn untrack(atom: AtomId, reaction: ReactionId) {
	TABLE.with(|table| table.borrow_mut().untrack(atom, reaction));
}

/// Drops every edge owned by `reaction`.
pub fn untrack_reaction(reaction: ReactionId) {
	let _ = TABLE.try_with(|table| table.borrow_mut().untrack_reaction(reaction));
}

/// Drops every edge pointing at `atom`.
pub fn untrack_atom(atom: AtomId) {
	// Called from `Drop` impls, possibly while the thread is shutting down.
	let _ = TABLE.try_with(|table| table.borrow_mut().untrack_atom(atom));
}

pub fn get_reactions(atom: AtomId) -> Reactions {
	TABLE.with(|table| {
		table
			.borrow()
			.atom_reactions
			.get(&atom)
			.cloned()
			.unwrap_or_default()
	})
}

pub fn get_atoms(reaction: ReactionId) -> Atoms {
	TABLE.with(|table| {
		table
			.borrow()
			.reaction_atoms
			.get(&reaction)
			.cloned()
			.unwrap_or_default()
	})
}
