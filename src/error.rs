use std::any::Any;
use std::cell::RefCell;
use std::rc::Rc;

use crate::disposer::DisposerId;
use crate::microtask;
use crate::reaction::ReactionId;

/// Failures that happen away from the caller that caused them.
///
/// A panic inside a reaction run by the reactor, or inside a cleanup callback
/// run by a disposer flush, does not abort the drain or the flush. It is turned
/// into one of these and handed to the thread's error handler on a fresh task.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
	#[error("reaction {reaction:?} panicked: {message}")]
	Computation { reaction: ReactionId, message: String },

	#[error("cleanup in disposer {disposer:?} panicked: {message}")]
	Cleanup { disposer: DisposerId, message: String },
}

pub type ErrorHandler = Rc<dyn Fn(&Error)>;

thread_local! {
	static HANDLER: RefCell<Option<ErrorHandler>> = RefCell::new(None);
}

/// Installs the handler that receives background errors on this thread.
pub fn set_error_handler(handler: impl Fn(&Error) + 'static) {
	HANDLER.with(|slot| *slot.borrow_mut() = Some(Rc::new(handler)));
}

/// Restores the default handler, which logs through `tracing`.
pub fn reset_error_handler() {
	HANDLER.with(|slot| slot.borrow_mut().take());
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
	if let Some(message) = payload.downcast_ref::<&'static str>() {
		(*message).to_owned()
	} else if let Some(message) = payload.downcast_ref::<String>() {
		message.clone()
	} else {
		"<non-string panic payload>".to_owned()
	}
}

/// Delivers `error` to the handler once the current stack has unwound.
pub(crate) fn report(error: Error) {
	microtask::queue_task(move || {
		let handler = HANDLER.with(|slot| slot.borrow().clone());
		match handler {
			Some(handler) => handler(&error),
			None => tracing::error!(%error, "unhandled background error"),
		}
	});
}
