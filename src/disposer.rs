//! Scoped cleanup callbacks.
//!
//! A disposer is a list of callbacks flushed in registration order. Flushing
//! empties the list, so flushing twice runs every callback once. Callbacks
//! registered while any flush is running are invoked on the spot instead of
//! being queued into a scope that may already be gone.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::rc::Rc;

use fxhash::FxHashMap;

use crate::error::{self, Error};
use crate::microtask;
use crate::owner::Owner;

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DisposerId(u64);

impl DisposerId {
	/// Scope that collects cleanups registered with no scope active.
	/// It is flushed automatically on the next timer task.
	pub const GLOBAL: DisposerId = DisposerId(0);
}

impl fmt::Debug for DisposerId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		if *self == DisposerId::GLOBAL {
			f.write_str("Disposer#global")
		} else {
			write!(f, "Disposer#{}", self.0)
		}
	}
}

/// A cleanup callback with identity.
///
/// Clones share the identity: registering the same `Cleanup` twice into one
/// scope keeps a single entry, and a `Cleanup` runs at most once overall.
#[derive(Clone)]
pub struct Cleanup {
	func: Rc<RefCell<Option<Box<dyn FnOnce()>>>>,
}

impl Cleanup {
	pub fn new(func: impl FnOnce() + 'static) -> Self {
		Cleanup {
			func: Rc::new(RefCell::new(Some(Box::new(func)))),
		}
	}

	pub fn is_spent(&self) -> bool {
		self.func.borrow().is_none()
	}

	fn run(&self) {
		let func = self.func.borrow_mut().take();
		if let Some(func) = func {
			func();
		}
	}
}

impl PartialEq for Cleanup {
	fn eq(&self, other: &Self) -> bool {
		Rc::ptr_eq(&self.func, &other.func)
	}
}

impl Eq for Cleanup {}

impl fmt::Debug for Cleanup {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Cleanup").field("spent", &self.is_spent()).finish()
	}
}

thread_local! {
	static NEXT_DISPOSER: Cell<u64> = Cell::new(0);
	static DISPOSERS: RefCell<FxHashMap<DisposerId, Vec<Cleanup>>> = RefCell::new(FxHashMap::default());
	static FLUSHING: Cell<usize> = Cell::new(0);
	static GLOBAL_FLUSH_SCHEDULED: Cell<bool> = Cell::new(false);
}

#[must_use]
pub fn create_disposer() -> DisposerId {
	NEXT_DISPOSER.with(|next| {
		let id = next.get() + 1;
		next.set(id);
		DisposerId(id)
	})
}

pub fn is_flushing() -> bool {
	FLUSHING.with(|depth| depth.get() > 0)
}

fn schedule_global_flush() {
	if GLOBAL_FLUSH_SCHEDULED.with(|scheduled| scheduled.replace(true)) {
		return;
	}

	microtask::queue_task(|| {
		GLOBAL_FLUSH_SCHEDULED.with(|scheduled| scheduled.set(false));
		flush_disposer(DisposerId::GLOBAL);
	});
}

/// Registers `cleanup` against `disposer`, or against the global scope when `None`.
pub fn register_cleanup(cleanup: &Cleanup, disposer: Option<DisposerId>) {
	if is_flushing() {
		cleanup.run();
		return;
	}

	let disposer = match disposer {
		Some(disposer) => disposer,
		None => {
			schedule_global_flush();
			DisposerId::GLOBAL
		}
	};

	DISPOSERS.with(|disposers| {
		let mut disposers = disposers.borrow_mut();
		let list = disposers.entry(disposer).or_default();
		if !list.contains(cleanup) {
			list.push(cleanup.clone());
		}
	});
}

/// Registers `func` against the ambient scope.
pub fn on_cleanup(func: impl FnOnce() + 'static) {
	register_cleanup(&Cleanup::new(func), Owner::current().disposer);
}

struct Flushing;

impl Flushing {
	fn enter() -> Self {
		FLUSHING.with(|depth| depth.set(depth.get() + 1));
		Flushing
	}
}

impl Drop for Flushing {
	fn drop(&mut self) {
		let _ = FLUSHING.try_with(|depth| depth.set(depth.get() - 1));
	}
}

/// Runs and forgets every callback registered against `disposer`.
///
/// A panicking callback is reported as [`Error::Cleanup`] and the remaining
/// callbacks still run.
pub fn flush_disposer(disposer: DisposerId) {
	let cleanups = DISPOSERS
		.try_with(|disposers| disposers.borrow_mut().remove(&disposer))
		.ok()
		.flatten();

	let Some(cleanups) = cleanups else {
		return;
	};

	tracing::debug!(?disposer, count = cleanups.len(), "flushing disposer");
	let _flushing = Flushing::enter();

	for cleanup in cleanups {
		if let Err(payload) = catch_unwind(AssertUnwindSafe(|| cleanup.run())) {
			error::report(Error::Cleanup {
				disposer,
				message: error::panic_message(&*payload),
			});
		}
	}
}
