//! Batches, deduplicates and replays stale reactions.
//!
//! Writes hand the reactions they invalidate to [`schedule_reactions`]. The
//! first request after an idle period queues one microtask tick. When the tick
//! fires, the collected ids are replayed in ascending id order, i.e. creation
//! order. Reactions scheduled while a tick is draining join that same drain.

use std::cell::{Cell, RefCell};
use std::collections::BTreeSet;
use std::panic::{catch_unwind, AssertUnwindSafe};

use crate::error::{self, Error};
use crate::microtask;
use crate::owner::{run_with, Owner};
use crate::reaction::{run_reaction, ReactionId};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Priority {
	#[default]
	Normal,
	/// Replayed by a timer task, after every pending microtask tick.
	Low,
}

#[derive(Default)]
struct Reactor {
	pending: BTreeSet<ReactionId>,
	low: BTreeSet<ReactionId>,
	draining: Option<BTreeSet<ReactionId>>,
	tick_requested: bool,
	low_tick_requested: bool,
}

thread_local! {
	static REACTOR: RefCell<Reactor> = RefCell::new(Reactor::default());
	static PRIORITY: Cell<Priority> = Cell::new(Priority::Normal);
}

fn with_reactor<R>(func: impl FnOnce(&mut Reactor) -> R) -> R {
	REACTOR.with(|reactor| func(&mut reactor.borrow_mut()))
}

pub fn current_priority() -> Priority {
	PRIORITY.with(|priority| priority.get())
}

/// Runs `func` with every scheduling request inside it tagged `priority`.
pub fn run_with_priority<R>(priority: Priority, func: impl FnOnce() -> R) -> R {
	struct Restore(Priority);

	impl Drop for Restore {
		fn drop(&mut self) {
			let _ = PRIORITY.try_with(|priority| priority.set(self.0));
		}
	}

	let _restore = Restore(PRIORITY.with(|current| current.replace(priority)));
	func()
}

pub fn schedule_reactions(reactions: impl IntoIterator<Item = ReactionId>) {
	let priority = current_priority();

	let (request_tick, request_low_tick) = with_reactor(|reactor| {
		let mut added = false;

		for id in reactions {
			added = true;

			match (priority, reactor.draining.as_mut()) {
				(Priority::Normal, Some(draining)) => {
					reactor.low.remove(&id);
					draining.insert(id);
				}
				(Priority::Normal, None) => {
					reactor.low.remove(&id);
					reactor.pending.insert(id);
				}
				(Priority::Low, draining) => {
					let queued = reactor.pending.contains(&id)
						|| draining.map_or(false, |draining| draining.contains(&id));
					if !queued {
						reactor.low.insert(id);
					}
				}
			}
		}

		if !added {
			return (false, false);
		}

		let request_tick = !reactor.pending.is_empty() && !reactor.tick_requested;
		if request_tick {
			reactor.tick_requested = true;
		}

		let request_low_tick = !reactor.low.is_empty() && !reactor.low_tick_requested;
		if request_low_tick {
			reactor.low_tick_requested = true;
		}

		(request_tick, request_low_tick)
	});

	if request_tick {
		tracing::trace!("tick requested");
		microtask::queue(tick);
	}

	if request_low_tick {
		tracing::trace!("low priority tick requested");
		microtask::queue_task(low_tick);
	}
}

/// Removes `reaction` from whatever set currently holds it. Always safe to call.
pub fn cancel_reaction(reaction: ReactionId) {
	let _ = REACTOR.try_with(|reactor| {
		let mut reactor = reactor.borrow_mut();
		let mut removed = reactor.pending.remove(&reaction);
		removed |= reactor.low.remove(&reaction);
		if let Some(draining) = reactor.draining.as_mut() {
			removed |= draining.remove(&reaction);
		}

		if removed {
			tracing::debug!(?reaction, "reaction cancelled");
		}
	});
}

/// Whether `reaction` is waiting to be replayed by a tick.
pub fn is_scheduled(reaction: ReactionId) -> bool {
	with_reactor(|reactor| {
		reactor.pending.contains(&reaction)
			|| reactor.low.contains(&reaction)
			|| reactor
				.draining
				.as_ref()
				.map_or(false, |draining| draining.contains(&reaction))
	})
}

/// Whether a tick is currently replaying reactions.
pub fn is_draining() -> bool {
	with_reactor(|reactor| reactor.draining.is_some())
}

fn tick() {
	let batch = with_reactor(|reactor| {
		reactor.tick_requested = false;
		std::mem::take(&mut reactor.pending)
	});

	drain(batch);
}

fn low_tick() {
	let batch = with_reactor(|reactor| {
		reactor.low_tick_requested = false;
		std::mem::take(&mut reactor.low)
	});

	drain(batch);
}

struct Draining;

impl Drop for Draining {
	fn drop(&mut self) {
		let _ = REACTOR.try_with(|reactor| reactor.borrow_mut().draining = None);
	}
}

fn drain(batch: BTreeSet<ReactionId>) {
	if batch.is_empty() {
		return;
	}

	let started = with_reactor(|reactor| match reactor.draining.as_mut() {
		Some(draining) => {
			draining.extend(batch.iter().copied());
			false
		}
		None => {
			reactor.draining = Some(batch);
			true
		}
	});

	if !started {
		return;
	}

	let _draining = Draining;
	let mut count = 0usize;
	tracing::trace!("drain started");

	loop {
		let next = with_reactor(|reactor| {
			let id = reactor.draining.as_mut().and_then(|draining| draining.pop_first());
			if let Some(id) = id {
				reactor.low.remove(&id);
			}
			id
		});

		let Some(reaction) = next else {
			break;
		};

		count += 1;
		let result = catch_unwind(AssertUnwindSafe(|| {
			run_with(Owner::detached(), || run_reaction(reaction))
		}));

		if let Err(payload) = result {
			error::report(Error::Computation {
				reaction,
				message: error::panic_message(&*payload),
			});
		}
	}

	tracing::trace!(count, "drain finished");
}
