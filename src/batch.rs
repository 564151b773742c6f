use std::cell::Cell;

use crate::microtask;

thread_local! {
	static STARTED: Cell<bool> = Cell::new(false);
}

pub fn in_batch() -> bool {
	STARTED.with(|started| started.get())
}

struct Stop;

impl Drop for Stop {
	fn drop(&mut self) {
		let _ = STARTED.try_with(|started| started.set(false));
	}
}

fn batch_start() -> Option<Stop> {
	STARTED.with(|started| {
		if started.replace(true) {
			None
		} else {
			Some(Stop)
		}
	})
}

/// Runs `func` and then replays whatever it invalidated before returning.
///
/// Writes inside `func` are grouped as usual. When the outermost `batch`
/// returns and no microtask is already running, the pending reactor tick is
/// drained synchronously instead of waiting for the host loop. Nested batches
/// and batches inside a running tick only group.
pub fn batch<R>(func: impl FnOnce() -> R) -> R {
	let root = batch_start();
	let result = func();

	if let Some(stop) = root {
		drop(stop);
		if !microtask::in_microtask() {
			batch_run();
		}
	}

	result
}

pub fn batch_run() {
	let count = microtask::run_microtasks();
	tracing::trace!(count, "batch flushed");
}
