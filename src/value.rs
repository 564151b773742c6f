use std::cell::{Cell, RefCell};
use std::fmt::{self, Debug};
use std::rc::Rc;

use smallvec::SmallVec;

use crate::atom::{self, create_atom, AtomId};
use crate::owner::Owner;
use crate::reactor::schedule_reactions;
use crate::tracking::{get_reactions, track, untrack_atom};

/// Decides whether a write is skipped.
pub enum Compare<T> {
	/// Skip writes equal (`PartialEq`) to the current value.
	Equal,
	/// Never skip: every write notifies.
	Always,
	/// Skip when the predicate returns `true` for `(current, next)`.
	With(Box<dyn Fn(&T, &T) -> bool>),
}

impl<T> Compare<T> {
	pub fn with(func: impl Fn(&T, &T) -> bool + 'static) -> Self {
		Compare::With(Box::new(func))
	}
}

type SkipFn<T> = Box<dyn Fn(&T, &T) -> bool>;

/// A mutable reactive cell.
///
/// Reading it inside a running reaction subscribes that reaction; writing it
/// schedules every subscriber for the next tick. The value itself changes
/// immediately.
pub struct Value<T> {
	body: Rc<ValueBody<T>>,
}

struct ValueBody<T> {
	value: RefCell<T>,
	skip: Option<SkipFn<T>>,
	atom: Cell<Option<AtomId>>,
}

impl<T> Drop for ValueBody<T> {
	fn drop(&mut self) {
		if let Some(atom) = self.atom.get() {
			untrack_atom(atom);
		}
	}
}

impl<T> Clone for Value<T> {
	fn clone(&self) -> Self {
		Value {
			body: self.body.clone(),
		}
	}
}

impl<T> Default for Value<T>
where
	T: Default + PartialEq + 'static,
{
	fn default() -> Self {
		Value::new(T::default())
	}
}

impl<T: 'static> Value<T> {
	pub fn new(value: T) -> Self
	where
		T: PartialEq,
	{
		Self::with_compare(value, Compare::Equal)
	}

	pub fn with_compare(value: T, compare: Compare<T>) -> Self
	where
		T: PartialEq,
	{
		let skip: Option<SkipFn<T>> = match compare {
			Compare::Equal => Some(Box::new(|current: &T, next: &T| current == next)),
			Compare::Always => None,
			Compare::With(func) => Some(func),
		};

		Self::from_parts(value, skip)
	}

	/// A value that notifies on every write. No `PartialEq` bound.
	pub fn always(value: T) -> Self {
		Self::from_parts(value, None)
	}

	/// A value that skips writes when `skip(current, next)` holds. No `PartialEq` bound.
	pub fn with_skip(value: T, skip: impl Fn(&T, &T) -> bool + 'static) -> Self {
		Self::from_parts(value, Some(Box::new(skip)))
	}

	fn from_parts(value: T, skip: Option<SkipFn<T>>) -> Self {
		Value {
			body: Rc::new(ValueBody {
				value: RefCell::new(value),
				skip,
				atom: Cell::new(None),
			}),
		}
	}

	/// The atom behind this value, if any reaction ever read it.
	pub fn atom(&self) -> Option<AtomId> {
		self.body.atom.get()
	}

	fn subscribe(&self) {
		let Some(reaction) = Owner::current().reaction else {
			return;
		};

		let atom = match self.body.atom.get() {
			Some(atom) => atom,
			None => {
				let atom = create_atom();
				self.body.atom.set(Some(atom));
				atom
			}
		};

		track(atom, reaction);
	}

	fn notify(&self) {
		let Some(atom) = self.body.atom.get() else {
			return;
		};

		// A reaction writing what it reads must not reschedule itself.
		let running = Owner::current().reaction;
		let reactions: SmallVec<[_; 4]> = get_reactions(atom)
			.into_iter()
			.filter(|reaction| Some(*reaction) != running)
			.collect();

		if reactions.is_empty() {
			return;
		}

		let revision = atom::tick();
		tracing::trace!(?atom, revision, count = reactions.len(), "value changed");
		schedule_reactions(reactions);
	}

	pub fn get(&self) -> T
	where
		T: Clone,
	{
		self.with(T::clone)
	}

	pub fn with<R>(&self, func: impl FnOnce(&T) -> R) -> R {
		self.subscribe();
		func(&self.body.value.borrow())
	}

	pub fn get_untracked(&self) -> T
	where
		T: Clone,
	{
		self.body.value.borrow().clone()
	}

	pub fn set(&self, value: T) {
		let _ = self.replace(value);
	}

	/// Writes `value` and returns the previous one.
	///
	/// When the write is skipped by the comparison rule, `value` itself is
	/// handed back and nothing changes.
	pub fn replace(&self, value: T) -> T {
		let skipped = match &self.body.skip {
			Some(skip) => skip(&self.body.value.borrow(), &value),
			None => false,
		};

		if skipped {
			return value;
		}

		let old = std::mem::replace(&mut *self.body.value.borrow_mut(), value);
		self.notify();
		old
	}

	/// Mutates in place. Always notifies: the previous value is not kept
	/// around to compare against.
	pub fn update(&self, func: impl FnOnce(&mut T)) {
		func(&mut self.body.value.borrow_mut());
		self.notify();
	}

	pub fn split(self) -> (ValueGetter<T>, ValueSetter<T>) {
		(ValueGetter(self.clone()), ValueSetter(self))
	}
}

impl<T: Debug + 'static> Debug for Value<T> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Value")
			.field("value", &*self.body.value.borrow())
			.field("atom", &self.body.atom.get())
			.finish()
	}
}

/// Read half of [`create_value`].
pub struct ValueGetter<T>(Value<T>);

/// Write half of [`create_value`].
pub struct ValueSetter<T>(Value<T>);

impl<T> Clone for ValueGetter<T> {
	fn clone(&self) -> Self {
		ValueGetter(self.0.clone())
	}
}

impl<T> Clone for ValueSetter<T> {
	fn clone(&self) -> Self {
		ValueSetter(self.0.clone())
	}
}

impl<T: Clone + 'static> ValueGetter<T> {
	pub fn get(&self) -> T {
		self.0.get()
	}
}

impl<T: 'static> ValueSetter<T> {
	pub fn set(&self, value: T) {
		self.0.set(value)
	}
}

/// Creates a value and returns its read and write halves.
pub fn create_value<T: PartialEq + 'static>(value: T) -> (ValueGetter<T>, ValueSetter<T>) {
	Value::new(value).split()
}
