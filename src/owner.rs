//! Ambient record of the running reaction and the active disposer scope.

use std::cell::Cell;

use crate::disposer::{create_disposer, flush_disposer, DisposerId};
use crate::reaction::ReactionId;

/// What is running right now.
///
/// `reaction` answers "who depends on what I read"; `disposer` answers
/// "where do cleanups go". Either may be absent.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Owner {
	pub disposer: Option<DisposerId>,
	pub reaction: Option<ReactionId>,
}

thread_local! {
	static CURRENT: Cell<Owner> = Cell::new(Owner::default());
}

impl Owner {
	/// The owner installed on this thread.
	pub fn current() -> Owner {
		CURRENT.with(|current| current.get())
	}

	/// An owner with neither a reaction nor a scope.
	pub fn detached() -> Owner {
		Owner::default()
	}

	pub fn with_disposer(self, disposer: Option<DisposerId>) -> Owner {
		Owner { disposer, ..self }
	}

	pub fn with_reaction(self, reaction: Option<ReactionId>) -> Owner {
		Owner { reaction, ..self }
	}
}

/// Restores the previous owner when dropped, including during unwinding.
struct Restore(Owner);

impl Drop for Restore {
	fn drop(&mut self) {
		let _ = CURRENT.try_with(|current| current.set(self.0));
	}
}

/// Runs `func` with `owner` installed, restoring the previous owner on every exit path.
///
/// Build partial overrides from [`Owner::current`]:
/// `run_with(Owner::current().with_reaction(None), ...)`.
pub fn run_with<R>(owner: Owner, func: impl FnOnce() -> R) -> R {
	let _restore = Restore(CURRENT.with(|current| current.replace(owner)));
	func()
}

/// Runs `func` without an active reaction, so nothing it reads is tracked.
///
/// Cleanups registered inside still go to the current scope.
pub fn freeze<R>(func: impl FnOnce() -> R) -> R {
	run_with(Owner::current().with_reaction(None), func)
}

/// Manual teardown handle for a [`root`] scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dispose(DisposerId);

impl Dispose {
	pub fn dispose(&self) {
		flush_disposer(self.0);
	}

	pub fn disposer(&self) -> DisposerId {
		self.0
	}
}

/// Opens a scope that is not owned by any reaction.
///
/// Reactions created inside live until [`Dispose::dispose`] is called, even
/// when `root` itself runs inside a reaction that later recomputes.
pub fn root<R>(func: impl FnOnce(Dispose) -> R) -> R {
	let disposer = create_disposer();
	let owner = Owner {
		disposer: Some(disposer),
		reaction: None,
	};

	run_with(owner, || func(Dispose(disposer)))
}
