//! Cached derived values.
//!
//! A memo owns one reaction and one atom. When something it read changes, the
//! reactor runs the reaction, which only bumps the memo's pending revision and
//! schedules whoever reads the memo. The function itself reruns lazily, on the
//! next read that finds the cache stale, so a memo that nobody reads costs
//! nothing per write and a memo read many times per batch computes once.
//!
//! A read that lands while the reaction is still queued computes right away
//! and takes over the queued run: the run is cancelled and the readers are
//! scheduled from the read instead.

use std::cell::{Cell, RefCell};
use std::fmt::{self, Debug};
use std::rc::Rc;

use crate::atom::{create_atom, AtomId};
use crate::disposer::{create_disposer, flush_disposer, on_cleanup, DisposerId};
use crate::evaluation::run_update;
use crate::owner::Owner;
use crate::reaction::{create_reaction, destroy_reaction, ReactionId};
use crate::reactor::{cancel_reaction, is_scheduled, schedule_reactions};
use crate::tracking::{get_reactions, track, untrack_atom, untrack_reaction, Reactions};

pub struct Memo<T> {
	body: Rc<MemoBody<T>>,
}

struct MemoBody<T> {
	func: Box<dyn Fn() -> T>,
	value: RefCell<Option<T>>,
	/// Revision the cached value was computed at.
	computed: Cell<u64>,
	/// Bumped every time the memo's reaction is invalidated.
	pending: Rc<Cell<u64>>,
	atom: AtomId,
	reaction: ReactionId,
	disposer: DisposerId,
}

fn teardown(reaction: ReactionId, disposer: DisposerId, atom: AtomId) {
	cancel_reaction(reaction);
	untrack_reaction(reaction);
	destroy_reaction(reaction);
	flush_disposer(disposer);
	untrack_atom(atom);
}

impl<T> Drop for MemoBody<T> {
	fn drop(&mut self) {
		teardown(self.reaction, self.disposer, self.atom);
	}
}

impl<T> Clone for Memo<T> {
	fn clone(&self) -> Self {
		Memo {
			body: self.body.clone(),
		}
	}
}

impl<T: 'static> Memo<T> {
	/// Creates a memo torn down together with the current scope.
	///
	/// `func` does not run until the first read.
	pub fn new(func: impl Fn() -> T + 'static) -> Self {
		let atom = create_atom();
		let disposer = create_disposer();
		let pending = Rc::new(Cell::new(1));

		let reaction = create_reaction({
			let pending = pending.clone();
			move |_| {
				pending.set(pending.get() + 1);
				schedule_reactions(get_reactions(atom));
			}
		});

		on_cleanup(move || teardown(reaction, disposer, atom));

		Memo {
			body: Rc::new(MemoBody {
				func: Box::new(func),
				value: RefCell::new(None),
				computed: Cell::new(0),
				pending,
				atom,
				reaction,
				disposer,
			}),
		}
	}

	pub fn atom(&self) -> AtomId {
		self.body.atom
	}

	pub fn reaction(&self) -> ReactionId {
		self.body.reaction
	}

	fn recompute(&self) {
		let body = &self.body;
		let owner = Owner {
			disposer: Some(body.disposer),
			reaction: Some(body.reaction),
		};

		let value = run_update(owner, || (body.func)());
		*body.value.borrow_mut() = Some(value);
	}

	fn refresh(&self) {
		let body = &self.body;

		if body.computed.get() < body.pending.get() {
			self.recompute();
			body.computed.set(body.pending.get());
		} else if is_scheduled(body.reaction) {
			// Invalidated but the reactor has not run the reaction yet. Compute
			// now, drop the queued run and wake the readers it would have woken.
			// A later write queues the reaction again.
			self.recompute();
			cancel_reaction(body.reaction);
			body.computed.set(body.pending.get());

			let running = Owner::current().reaction;
			let readers: Reactions = get_reactions(body.atom)
				.into_iter()
				.filter(|reader| Some(*reader) != running)
				.collect();
			schedule_reactions(readers);
		}
	}

	pub fn with<R>(&self, func: impl FnOnce(&T) -> R) -> R {
		self.refresh();

		if let Some(reaction) = Owner::current().reaction {
			track(self.body.atom, reaction);
		}

		let cached = self.body.value.borrow();
		if let Some(value) = cached.as_ref() {
			return func(value);
		}
		drop(cached);

		self.recompute();
		self.body.computed.set(self.body.pending.get());
		self.with(func)
	}

	pub fn get(&self) -> T
	where
		T: Clone,
	{
		self.with(T::clone)
	}

	/// Whether the next read will run the memo's function.
	pub fn is_stale(&self) -> bool {
		let computed = self.body.computed.get();
		let pending = self.body.pending.get();
		computed < pending || is_scheduled(self.body.reaction)
	}
}

impl<T: Debug> Debug for Memo<T> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Memo")
			.field("value", &*self.body.value.borrow())
			.field("computed", &self.body.computed.get())
			.field("pending", &self.body.pending.get())
			.field("reaction", &self.body.reaction)
			.finish()
	}
}

pub fn create_memo<T: 'static>(func: impl Fn() -> T + 'static) -> Memo<T> {
	Memo::new(func)
}
