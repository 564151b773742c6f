use std::cell::Cell;
use std::fmt;

/// Identity of one reactive state cell.
///
/// An atom carries no value. It is only the join key between a [`Value`](crate::Value)
/// or [`Memo`](crate::Memo) and the reactions that read it.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AtomId(u64);

/// Logical clock reading.
pub type Revision = u64;

thread_local! {
	static NEXT_ATOM: Cell<u64> = Cell::new(0);
	static CLOCK: Cell<Revision> = Cell::new(0);
}

pub fn create_atom() -> AtomId {
	NEXT_ATOM.with(|next| {
		let id = next.get() + 1;
		next.set(id);
		AtomId(id)
	})
}

/// Current reading of the logical clock.
pub fn revision() -> Revision {
	CLOCK.with(|clock| clock.get())
}

/// Advances the logical clock by one and returns the new reading.
///
/// Called once per write that scheduled at least one reaction.
pub(crate) fn tick() -> Revision {
	CLOCK.with(|clock| {
		let next = clock.get() + 1;
		clock.set(next);
		next
	})
}

impl AtomId {
	pub fn as_u64(self) -> u64 {
		self.0
	}
}

impl fmt::Debug for AtomId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "Atom#{}", self.0)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn atoms_are_monotonic() {
		let a = create_atom();
		let b = create_atom();
		let c = create_atom();

		assert!(a < b);
		assert!(b < c);
	}

	#[test]
	fn clock_only_moves_forward() {
		let before = revision();
		let next = tick();

		assert_eq!(next, before + 1);
		assert_eq!(revision(), next);
	}
}
