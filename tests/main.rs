use std::cell::{Cell, RefCell};
use std::rc::Rc;

use atomic_reactor::microtask::{run_microtasks, run_until_idle};
use atomic_reactor::{
	batch, cancel_reaction, create_reaction, create_value, freeze, is_alive, on_cleanup, reactive, reactive_with, root,
	run_with_priority, schedule_reactions, set_error_handler, Error, Memo, Priority, Value,
};


use mock::{Observer, SharedObserver};

fn init() -> Rc<RefCell<Vec<Error>>> {
	let _ = tracing_subscriber::fmt()
		.with_max_level(tracing_subscriber::filter::LevelFilter::DEBUG)
		.with_test_writer()
		.try_init();

	let errors = Rc::new(RefCell::new(Vec::new()));
	set_error_handler({
		let errors = errors.clone();
		move |error| errors.borrow_mut().push(error.clone())
	});
	errors
}

#[test]
fn value_scenario() {
	let errors = init();
	let observer = SharedObserver::new();
	let (get, set) = create_value(1);

	observer.expect_saw(1, 1);

	root(|_| {
		reactive({
			let observer = observer.clone();
			move |_: Option<&()>| observer.lock().saw(get.get())
		});
	});

	observer.verify();

	set.set(2);
	observer.verify();

	observer.expect_saw(2, 1);
	run_microtasks();
	observer.verify();

	run_until_idle();
	assert!(errors.borrow().is_empty());
}

#[test]
fn repeated_writes_run_reaction_once() {
	let errors = init();
	let observer = SharedObserver::new();
	let a = Value::new(10);

	observer.expect_saw(10, 1);

	root(|_| {
		reactive({
			let a = a.clone();
			let observer = observer.clone();
			move |_: Option<&()>| observer.lock().saw(a.get())
		});
	});

	observer.verify();
	observer.expect_saw(40, 1);

	a.set(20);
	a.set(30);
	a.set(40);
	run_microtasks();

	observer.verify();
	assert!(errors.borrow().is_empty());
}

#[test]
fn equal_write_does_not_invalidate() {
	init();
	let observer = SharedObserver::new();
	let a = Value::new(1);

	observer.expect_saw(1, 1);

	root(|_| {
		reactive({
			let a = a.clone();
			let observer = observer.clone();
			move |_: Option<&()>| observer.lock().saw(a.get())
		});
	});

	observer.verify();
	observer.expect_saw(1, 0);

	a.set(1);
	run_until_idle();

	observer.verify();
}

#[test]
fn reactions_replay_in_creation_order() {
	init();
	let log = Rc::new(RefCell::new(Vec::new()));
	let first = Value::new(0);
	let second = Value::new(0);

	root(|_| {
		reactive({
			let first = first.clone();
			let log = log.clone();
			move |_: Option<&()>| log.borrow_mut().push(("first", first.get()))
		});
		reactive({
			let second = second.clone();
			let log = log.clone();
			move |_: Option<&()>| log.borrow_mut().push(("second", second.get()))
		});
	});

	log.borrow_mut().clear();

	second.set(1);
	first.set(1);
	run_microtasks();

	assert_eq!(*log.borrow(), vec![("first", 1), ("second", 1)]);
}

#[test]
fn reaction_scheduled_during_drain_runs_in_same_drain() {
	init();
	let log = Rc::new(RefCell::new(Vec::new()));

	let late = create_reaction({
		let log = log.clone();
		move |_| log.borrow_mut().push("late")
	});
	let early = create_reaction({
		let log = log.clone();
		move |_| {
			log.borrow_mut().push("early");
			schedule_reactions([late]);
		}
	});

	schedule_reactions([early]);
	assert_eq!(run_microtasks(), 1);

	assert_eq!(*log.borrow(), vec!["early", "late"]);
}

#[test]
fn cancelled_reaction_never_runs() {
	init();
	let observer = SharedObserver::new();
	observer.expect_runs(0);

	let reaction = create_reaction({
		let observer = observer.clone();
		move |_| observer.lock().ran()
	});

	schedule_reactions([reaction]);
	schedule_reactions([reaction]);
	cancel_reaction(reaction);
	run_until_idle();

	observer.verify();
}

#[test]
fn dependencies_follow_the_branch_taken() {
	init();
	let runs = Rc::new(Cell::new(0));
	let use_a = Value::new(true);
	let a = Value::new(0);
	let b = Value::new(0);

	root(|_| {
		reactive({
			let (use_a, a, b) = (use_a.clone(), a.clone(), b.clone());
			let runs = runs.clone();
			move |_: Option<&()>| {
				runs.set(runs.get() + 1);
				if use_a.get() {
					a.get();
				} else {
					b.get();
				}
			}
		});
	});
	assert_eq!(runs.get(), 1);

	b.set(1);
	run_microtasks();
	assert_eq!(runs.get(), 1);

	use_a.set(false);
	run_microtasks();
	assert_eq!(runs.get(), 2);

	a.set(1);
	run_microtasks();
	assert_eq!(runs.get(), 2);

	b.set(2);
	run_microtasks();
	assert_eq!(runs.get(), 3);
}

#[test]
fn scope_cleanups_run_once_in_order() {
	init();
	let log = Rc::new(RefCell::new(Vec::new()));

	let dispose = root(|dispose| {
		for name in ["a", "b", "c"] {
			let log = log.clone();
			on_cleanup(move || log.borrow_mut().push(name));
		}
		dispose
	});

	dispose.dispose();
	dispose.dispose();

	assert_eq!(*log.borrow(), vec!["a", "b", "c"]);
}

#[test]
fn memo_is_cached_until_read() {
	let errors = init();
	let observer = SharedObserver::new();
	let v = Value::new(1);

	observer.expect_runs(0);

	let memo = root(|_| {
		Memo::new({
			let v = v.clone();
			let observer = observer.clone();
			move || {
				observer.lock().ran();
				v.get()
			}
		})
	});

	v.set(2);
	observer.verify();

	observer.expect_runs(1);
	assert_eq!(memo.get(), 2);
	observer.verify();

	observer.expect_runs(0);
	assert_eq!(memo.get(), 2);
	run_until_idle();
	assert_eq!(memo.get(), 2);
	observer.verify();

	assert!(errors.borrow().is_empty());
}

#[test]
fn diamond_through_memos_runs_consumer_once() {
	init();
	let seen = Rc::new(RefCell::new(Vec::new()));
	let a = Value::new(1);

	root(|_| {
		let double = Memo::new({
			let a = a.clone();
			move || a.get() * 2
		});
		let triple = Memo::new({
			let a = a.clone();
			move || a.get() * 3
		});

		reactive({
			let seen = seen.clone();
			move |_: Option<&()>| seen.borrow_mut().push((double.get(), triple.get()))
		});
	});

	a.set(2);
	run_microtasks();

	assert_eq!(*seen.borrow(), vec![(2, 3), (4, 6)]);
}

#[test]
fn reader_older_than_memo_runs_once_per_write() {
	let errors = init();
	let v = Value::new(1);
	let slot: Rc<RefCell<Option<Memo<i32>>>> = Rc::new(RefCell::new(None));
	let seen = Rc::new(RefCell::new(Vec::new()));

	root(|_| {
		reactive({
			let (v, slot, seen) = (v.clone(), slot.clone(), seen.clone());
			move |_: Option<&()>| {
				let base = v.get();
				let derived = slot.borrow().as_ref().map(|memo| memo.get());
				seen.borrow_mut().push((base, derived));
			}
		});

		let memo = Memo::new({
			let v = v.clone();
			move || v.get() * 10
		});
		assert_eq!(memo.get(), 10);
		*slot.borrow_mut() = Some(memo);
	});

	v.set(2);
	run_microtasks();
	assert_eq!(*seen.borrow(), vec![(1, None), (2, Some(20))]);

	v.set(3);
	run_microtasks();
	assert_eq!(*seen.borrow(), vec![(1, None), (2, Some(20)), (3, Some(30))]);

	run_until_idle();
	assert!(errors.borrow().is_empty());
}

#[test]
fn memo_read_between_writes_stays_current() {
	init();
	let v = Value::new(1);
	let seen = Rc::new(RefCell::new(Vec::new()));

	let memo = root(|_| {
		let memo = Memo::new({
			let v = v.clone();
			move || v.get() * 2
		});

		reactive({
			let memo = memo.clone();
			let seen = seen.clone();
			move |_: Option<&()>| seen.borrow_mut().push(memo.get())
		});

		memo
	});

	v.set(2);
	assert_eq!(memo.get(), 4);
	v.set(3);
	run_microtasks();

	assert_eq!(memo.get(), 6);
	assert_eq!(seen.borrow().last(), Some(&6));
}

#[test]
fn reaction_writing_what_it_reads_does_not_loop() {
	let errors = init();
	let runs = Rc::new(Cell::new(0));
	let counter = Value::new(0);

	root(|_| {
		reactive({
			let counter = counter.clone();
			let runs = runs.clone();
			move |_: Option<&()>| {
				runs.set(runs.get() + 1);
				counter.set(counter.get() + 1);
			}
		});
	});

	run_until_idle();
	assert_eq!(runs.get(), 1);
	assert_eq!(counter.get_untracked(), 1);

	counter.set(10);
	run_until_idle();
	assert_eq!(runs.get(), 2);
	assert_eq!(counter.get_untracked(), 11);

	assert!(errors.borrow().is_empty());
}

#[test]
fn derived_write_reaches_observer_once() {
	init();
	let observer = SharedObserver::new();
	let a = Value::new(1i64);
	let b = Value::new(0i64);

	observer.expect_saw(2, 1);

	root(|_| {
		reactive({
			let (a, b) = (a.clone(), b.clone());
			move |_: Option<&()>| b.set(a.get() * 2)
		});
		reactive({
			let b = b.clone();
			let observer = observer.clone();
			move |_: Option<&()>| observer.lock().saw(b.get())
		});
	});

	observer.verify();
	observer.expect_saw(20, 1);

	a.set(10);
	run_microtasks();

	observer.verify();
}

#[test]
fn root_inside_reaction_survives_rerun() {
	init();
	let outer = Value::new(0);
	let inner = Value::new(0);
	let inner_runs = Rc::new(Cell::new(0));
	let roots = Rc::new(RefCell::new(Vec::new()));

	root(|_| {
		reactive({
			let (outer, inner) = (outer.clone(), inner.clone());
			let (inner_runs, roots) = (inner_runs.clone(), roots.clone());
			move |_: Option<&()>| {
				if outer.get() > 0 {
					return;
				}

				let inner = inner.clone();
				let inner_runs = inner_runs.clone();
				roots.borrow_mut().push(root(move |_| {
					reactive(move |_: Option<&()>| {
						inner.get();
						inner_runs.set(inner_runs.get() + 1);
					})
				}));
			}
		});
	});

	outer.set(1);
	run_microtasks();

	inner.set(1);
	run_microtasks();

	assert_eq!(inner_runs.get(), 2);
	assert!(is_alive(roots.borrow()[0]));
}

#[test]
fn frozen_reads_are_not_tracked() {
	init();
	let runs = Rc::new(Cell::new(0));
	let tracked = Value::new(0);
	let hidden = Value::new(0);

	root(|_| {
		reactive({
			let (tracked, hidden) = (tracked.clone(), hidden.clone());
			let runs = runs.clone();
			move |_: Option<&()>| {
				tracked.get();
				freeze(|| hidden.get());
				runs.set(runs.get() + 1);
			}
		});
	});

	hidden.set(1);
	run_microtasks();
	assert_eq!(runs.get(), 1);

	tracked.set(1);
	run_microtasks();
	assert_eq!(runs.get(), 2);
}

#[test]
fn batch_flushes_synchronously() {
	init();
	let seen = Rc::new(RefCell::new(Vec::new()));
	let a = Value::new(1);

	root(|_| {
		reactive({
			let a = a.clone();
			let seen = seen.clone();
			move |_: Option<&()>| seen.borrow_mut().push(a.get())
		});
	});

	batch(|| {
		a.set(2);
		a.set(3);
	});

	assert_eq!(*seen.borrow(), vec![1, 3]);
}

#[test]
fn low_priority_reaction_runs_after_normal_ones() {
	init();
	let log = Rc::new(RefCell::new(Vec::new()));

	let low = create_reaction({
		let log = log.clone();
		move |_| log.borrow_mut().push("low")
	});
	let normal = create_reaction({
		let log = log.clone();
		move |_| log.borrow_mut().push("normal")
	});

	run_with_priority(Priority::Low, || schedule_reactions([low]));
	schedule_reactions([normal]);
	run_until_idle();

	assert_eq!(*log.borrow(), vec!["normal", "low"]);
}

#[test]
fn panicking_reaction_is_reported_and_others_still_run() {
	let errors = init();
	let a = Value::new(0);
	let healthy = Rc::new(Cell::new(0));

	let broken = root(|_| {
		let broken = reactive({
			let a = a.clone();
			move |_: Option<&()>| {
				if a.get() == 1 {
					panic!("broken on one");
				}
			}
		});

		reactive({
			let a = a.clone();
			let healthy = healthy.clone();
			move |_: Option<&()>| healthy.set(a.get())
		});

		broken
	});

	a.set(1);
	run_until_idle();

	assert_eq!(healthy.get(), 1);
	assert_eq!(
		*errors.borrow(),
		vec![Error::Computation {
			reaction: broken,
			message: "broken on one".into()
		}]
	);

	a.set(2);
	run_until_idle();
	assert_eq!(healthy.get(), 2);
	assert_eq!(errors.borrow().len(), 1);
}

#[test]
fn accumulating_reactive() {
	init();
	let a = Value::new(1);
	let history = Rc::new(RefCell::new(Vec::new()));

	root(|_| {
		reactive_with(Vec::new(), {
			let a = a.clone();
			let history = history.clone();
			move |seen: &Vec<i32>| {
				let mut seen = seen.clone();
				seen.push(a.get());
				*history.borrow_mut() = seen.clone();
				seen
			}
		});
	});

	a.set(2);
	run_microtasks();
	a.set(3);
	run_microtasks();

	assert_eq!(*history.borrow(), vec![1, 2, 3]);
}

#[test]
fn capture_macros() {
	init();
	let a = Value::new(1);
	let b = Value::new(2);
	let seen = Rc::new(Cell::new(0));

	root(|_| {
		let sum = atomic_reactor::memo!((a, b) => a.get() + b.get());
		atomic_reactor::reactive!((sum, seen) _prev => seen.set(sum.get()));
	});

	assert_eq!(seen.get(), 3);

	b.set(5);
	run_microtasks();
	assert_eq!(seen.get(), 6);
}
