use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::disposer::{create_disposer, flush_disposer, on_cleanup, DisposerId};
use crate::evaluation::run_update;
use crate::owner::Owner;
use crate::reaction::{create_reaction, destroy_reaction, run_reaction, ReactionId};
use crate::reactor::{cancel_reaction, schedule_reactions};
use crate::tracking::untrack_reaction;

type Body<T> = Box<dyn FnMut(Option<&T>) -> T>;

struct Reactive<T> {
	func: RefCell<Body<T>>,
	value: RefCell<Option<T>>,
	/// Set when the reaction is asked to run while it is already running.
	rerun: Cell<bool>,
	disposer: DisposerId,
}

impl<T> Reactive<T> {
	fn update(&self, reaction: ReactionId) {
		let Ok(mut body) = self.func.try_borrow_mut() else {
			// Something this run triggered invalidated the run itself. Replay
			// once the current run is done.
			tracing::debug!(?reaction, "reactive invalidated while running, deferring rerun");
			self.rerun.set(true);
			return;
		};

		self.rerun.set(false);

		let owner = Owner {
			disposer: Some(self.disposer),
			reaction: Some(reaction),
		};

		let func = &mut **body;
		let next = run_update(owner, || func(self.value.borrow().as_ref()));
		*self.value.borrow_mut() = Some(next);
		drop(body);

		if self.rerun.replace(false) {
			schedule_reactions([reaction]);
		}
	}
}

/// Runs `func` now and again whenever something it read changes.
///
/// `func` receives what it returned last time, `None` on the first run.
/// Cleanups registered inside run before each rerun. The reaction itself is
/// torn down together with the scope that was current when it was created.
pub fn reactive<T: 'static>(func: impl FnMut(Option<&T>) -> T + 'static) -> ReactionId {
	spawn(None, Box::new(func))
}

/// Like [`reactive`], but seeded with `initial` so `func` always sees a previous value.
pub fn reactive_with<T: 'static>(initial: T, mut func: impl FnMut(&T) -> T + 'static) -> ReactionId {
	spawn(
		Some(initial),
		Box::new(move |previous: Option<&T>| match previous {
			Some(previous) => func(previous),
			None => unreachable!("seeded reactive lost its value"),
		}),
	)
}

fn spawn<T: 'static>(initial: Option<T>, func: Body<T>) -> ReactionId {
	let disposer = create_disposer();
	let body = Rc::new(Reactive {
		func: RefCell::new(func),
		value: RefCell::new(initial),
		rerun: Cell::new(false),
		disposer,
	});

	let reaction = create_reaction(move |id| body.update(id));

	on_cleanup(move || {
		cancel_reaction(reaction);
		untrack_reaction(reaction);
		destroy_reaction(reaction);
		flush_disposer(disposer);
	});

	tracing::trace!(?reaction, ?disposer, "reactive created");
	run_reaction(reaction);
	reaction
}
