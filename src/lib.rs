//! Fine-grained reactive engine.
//!
//! State lives in atoms, derived computations are reactions, and a
//! per-thread tracking table records which reaction read which atom. Writes
//! schedule the affected reactions, and the reactor replays them once per
//! microtask tick in creation order. Every reaction belongs to a disposer
//! scope, so tearing the scope down tears the reaction down with it.
//!
//! ```no_run
//! use atomic_reactor::{microtask, reactive, root, Memo, Value};
//!
//! let count = Value::new(1);
//!
//! let dispose = root(|dispose| {
//! 	let double = Memo::new({
//! 		let count = count.clone();
//! 		move || count.get() * 2
//! 	});
//!
//! 	reactive(move |_: Option<&()>| println!("double = {}", double.get()));
//! 	dispose
//! });
//!
//! count.set(2);
//! microtask::run_microtasks();
//!
//! dispose.dispose();
//! ```

pub mod macros;
pub mod microtask;

mod atom;
mod batch;
mod disposer;
mod error;
mod evaluation;
mod memo;
mod owner;
mod reaction;
mod reactive;
mod reactor;
mod tracking;
mod value;

pub use atom::{create_atom, revision, AtomId, Revision};
pub use batch::{batch, batch_run, in_batch};
pub use disposer::{create_disposer, flush_disposer, is_flushing, on_cleanup, register_cleanup, Cleanup, DisposerId};
pub use error::{reset_error_handler, set_error_handler, Error, ErrorHandler};
pub use evaluation::run_update;
pub use memo::{create_memo, Memo};
pub use owner::{freeze, root, run_with, Dispose, Owner};
pub use reaction::{create_reaction, destroy_reaction, is_alive, run_reaction, Compute, ReactionId};
pub use reactive::{reactive, reactive_with};
pub use reactor::{
	cancel_reaction, current_priority, is_draining, is_scheduled, run_with_priority, schedule_reactions, Priority,
};
pub use tracking::{get_atoms, get_reactions, track, untrack, untrack_atom, untrack_reaction, Atoms, Reactions};
pub use value::{create_value, Compare, Value, ValueGetter, ValueSetter};
