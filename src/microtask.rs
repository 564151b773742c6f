//! Single-threaded deferred execution queue.
//!
//! Two queues are kept per thread: microtasks, which carry reactor ticks, and
//! timer tasks, which run only once the microtask queue is empty. On native
//! targets the host drives the loop with [`run_microtasks`] or
//! [`run_until_idle`] at its own yield points. On `wasm32` the browser's
//! `queueMicrotask` and `setTimeout` are armed to drive it automatically.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;

type Task = Box<dyn FnOnce()>;

thread_local! {
	static MICROTASKS: RefCell<VecDeque<Task>> = RefCell::new(VecDeque::new());
	static TASKS: RefCell<VecDeque<Task>> = RefCell::new(VecDeque::new());
	static RUNNING: Cell<bool> = Cell::new(false);
}

/// Defers `func` until the current synchronous call stack unwinds,
/// ahead of any timer task.
pub fn queue<F: FnOnce() + 'static>(func: F) {
	MICROTASKS.with(|queue| queue.borrow_mut().push_back(Box::new(func)));

	#[cfg(target_arch = "wasm32")]
	host::arm_microtask();
}

/// Defers `func` behind every pending microtask.
pub fn queue_task<F: FnOnce() + 'static>(func: F) {
	TASKS.with(|queue| queue.borrow_mut().push_back(Box::new(func)));

	#[cfg(target_arch = "wasm32")]
	host::arm_task();
}

pub fn has_pending() -> bool {
	MICROTASKS.with(|queue| !queue.borrow().is_empty()) || TASKS.with(|queue| !queue.borrow().is_empty())
}

pub fn in_microtask() -> bool {
	RUNNING.with(|running| running.get())
}

struct Running;

impl Running {
	fn enter() -> Option<Running> {
		RUNNING.with(|running| {
			if running.get() {
				None
			} else {
				running.set(true);
				Some(Running)
			}
		})
	}
}

impl Drop for Running {
	fn drop(&mut self) {
		let _ = RUNNING.try_with(|running| running.set(false));
	}
}

fn pop(queue: &'static std::thread::LocalKey<RefCell<VecDeque<Task>>>) -> Option<Task> {
	queue.with(|queue| queue.borrow_mut().pop_front())
}

/// Runs microtasks until the queue is empty, including the ones queued
/// while draining.
///
/// Returns the number of tasks run. Calling it from inside a running task
/// does nothing: the outer drain will pick up whatever gets queued.
pub fn run_microtasks() -> usize {
	let Some(_running) = Running::enter() else {
		tracing::warn!("refusing to drain microtasks re-entrantly");
		return 0;
	};

	let mut count = 0;
	while let Some(task) = pop(&MICROTASKS) {
		task();
		count += 1;
	}
	count
}

/// Runs one timer task, draining microtasks before and after it.
///
/// Returns `false` when there was no timer task to run.
pub fn run_task() -> bool {
	run_microtasks();

	let ran = {
		let Some(_running) = Running::enter() else {
			tracing::warn!("refusing to run timer task re-entrantly");
			return false;
		};

		match pop(&TASKS) {
			Some(task) => {
				task();
				true
			}
			None => false,
		}
	};

	run_microtasks();
	ran
}

/// Alternates microtask drains and timer tasks until both queues are empty.
pub fn run_until_idle() {
	if in_microtask() {
		tracing::warn!("refusing to run the loop re-entrantly");
		return;
	}

	while run_task() {}
}

#[cfg(target_arch = "wasm32")]
mod host {
	use std::cell::Cell;

	use wasm_bindgen::prelude::*;

	#[wasm_bindgen]
	extern "C" {
		#[wasm_bindgen(js_name = queueMicrotask)]
		fn queue_microtask(closure: &JsValue);

		#[wasm_bindgen(js_name = setTimeout)]
		fn set_timeout(closure: &JsValue, millis: i32) -> JsValue;
	}

	thread_local! {
		static MICROTASK_ARMED: Cell<bool> = Cell::new(false);
	}

	pub(super) fn arm_microtask() {
		if MICROTASK_ARMED.with(|armed| armed.replace(true)) {
			return;
		}

		queue_microtask(&Closure::once_into_js(|| {
			MICROTASK_ARMED.with(|armed| armed.set(false));
			super::run_microtasks();
		}));
	}

	pub(super) fn arm_task() {
		let _ = set_timeout(
			&Closure::once_into_js(|| {
				super::run_task();
			}),
			0,
		);
	}
}
