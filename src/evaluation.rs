use std::panic::{catch_unwind, resume_unwind, AssertUnwindSafe};

use crate::disposer::flush_disposer;
use crate::owner::{run_with, Owner};
use crate::tracking::{get_atoms, track, untrack_reaction};

/// Recomputes under `owner` with a fresh subscription set.
///
/// The reaction's current atoms are dropped and its scope flushed before
/// `func` runs, so only what `func` reads this time is tracked. If `func`
/// panics, the scope is flushed again, the previous atoms are tracked again
/// and the panic continues into the caller.
pub fn run_update<R>(owner: Owner, func: impl FnOnce() -> R) -> R {
	let previous = owner.reaction.map(|reaction| (reaction, get_atoms(reaction)));

	if let Some(reaction) = owner.reaction {
		untrack_reaction(reaction);
	}
	if let Some(disposer) = owner.disposer {
		flush_disposer(disposer);
	}

	match catch_unwind(AssertUnwindSafe(|| run_with(owner, func))) {
		Ok(value) => value,
		Err(payload) => {
			if let Some(disposer) = owner.disposer {
				flush_disposer(disposer);
			}

			if let Some((reaction, atoms)) = previous {
				tracing::debug!(?reaction, "recompute panicked, restoring subscriptions");
				for atom in atoms {
					track(atom, reaction);
				}
			}

			resume_unwind(payload)
		}
	}
}
