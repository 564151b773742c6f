use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use fxhash::FxHashMap;

/// Identity of one re-runnable computation.
///
/// Ids are issued in ascending order, which is also the order the
/// reactor replays [scheduled](crate::schedule_reactions) reactions in.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ReactionId(u64);

/// Compute callback stored against a [`ReactionId`].
pub type Compute = Rc<dyn Fn(ReactionId)>;

thread_local! {
	static NEXT_REACTION: Cell<u64> = Cell::new(0);
	static REGISTRY: RefCell<FxHashMap<ReactionId, Compute>> = RefCell::new(FxHashMap::default());
}

#[must_use]
pub fn create_reaction(compute: impl Fn(ReactionId) + 'static) -> ReactionId {
	let id = NEXT_REACTION.with(|next| {
		let id = next.get() + 1;
		next.set(id);
		ReactionId(id)
	});

	REGISTRY.with(|registry| registry.borrow_mut().insert(id, Rc::new(compute)));
	tracing::trace!(reaction = ?id, "reaction created");
	id
}

/// Drops the compute callback of `id`. Running or tracking it afterwards is a no-op.
pub fn destroy_reaction(id: ReactionId) {
	let removed = REGISTRY
		.try_with(|registry| registry.borrow_mut().remove(&id))
		.ok()
		.flatten();

	if removed.is_some() {
		tracing::debug!(reaction = ?id, "reaction destroyed");
	}
}

pub fn is_alive(id: ReactionId) -> bool {
	REGISTRY.with(|registry| registry.borrow().contains_key(&id))
}

/// Invokes the compute callback of `id` in the current context.
///
/// Returns `false` when the reaction has already been destroyed.
pub fn run_reaction(id: ReactionId) -> bool {
	// The registry borrow must end before user code runs: computations
	// create and destroy reactions themselves.
	let compute = REGISTRY.with(|registry| registry.borrow().get(&id).cloned());

	match compute {
		Some(compute) => {
			compute(id);
			true
		}
		None => {
			tracing::debug!(reaction = ?id, "skipping destroyed reaction");
			false
		}
	}
}

impl ReactionId {
	pub fn as_u64(self) -> u64 {
		self.0
	}
}

impl fmt::Debug for ReactionId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "Reaction#{}", self.0)
	}
}
