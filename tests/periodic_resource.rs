use std::{cell::Cell, rc::Rc};

use nodecore::{Control, EVENT_INIT, EVENT_TIMER, Event, ManualClock, Resolution, Scheduler, TaskletId, Timer, TimerId};

/// Periodic resource built from core primitives only: an event timer wakes a thread, the thread queues a
/// tasklet, and every `notify_every` runs the tasklet calls the observer hook.
struct Periodic {
	period_ms: u64,
	timer: Rc<Cell<Option<TimerId>>>,
	tasklet: TaskletId,
}

struct Counters {
	runs: Rc<Cell<u32>>,
	notified: Rc<Cell<u32>>,
	timer: Rc<Cell<Option<TimerId>>>,
}

impl Periodic {
	fn install(sched: &mut Scheduler, period_ms: u64, notify_every: u32) -> Counters {
		let counters = Counters {
			runs: Rc::new(Cell::new(0)),
			notified: Rc::new(Cell::new(0)),
			timer: Rc::new(Cell::new(None)),
		};

		let (runs, notified) = (counters.runs.clone(), counters.notified.clone());
		let tasklet = sched
			.add_tasklet(move |_, _| {
				runs.set(runs.get() + 1);
				if runs.get() % notify_every == 0 {
					notified.set(notified.get() + 1);
				}
			})
			.unwrap();

		let mut state = Periodic { period_ms, timer: counters.timer.clone(), tasklet };
		sched.register_thread_fn("periodic", move |s, ev| state.dispatch(s, ev)).unwrap();

		counters
	}

	fn dispatch(&mut self, sched: &mut Scheduler, ev: Event) -> Control {
		match (ev.id, ev.target, self.timer.get()) {
			(EVENT_INIT, Some(me), None) => {
				let timer = sched.add_timer(Timer::etimer(Resolution::Milli, me)).unwrap();
				sched.start_timer(timer, self.period_ms).unwrap();
				self.timer.set(Some(timer));
			}
			(EVENT_TIMER, _, Some(timer)) if ev.data == timer.index() => {
				sched.reset_timer(timer).unwrap();
				sched.post_tasklet(self.tasklet).unwrap();
			}
			_ => {}
		}

		Control::Continue
	}
}

#[test]
fn notifies_every_fourth_period() {
	let clock = ManualClock::new();
	let mut sched = Scheduler::new(clock.clone());
	let counters = Periodic::install(&mut sched, 500, 4);
	sched.run_pass();

	for _ in 0..8 {
		clock.advance_ms(500);
		sched.run_pass();
	}

	assert_eq!(counters.runs.get(), 8);
	assert_eq!(counters.notified.get(), 2);
}

#[test]
fn late_passes_do_not_drift() {
	let clock = ManualClock::new();
	let mut sched = Scheduler::new(clock.clone());
	let counters = Periodic::install(&mut sched, 500, 4);
	sched.run_pass();

	let timer = counters.timer.get().unwrap();
	assert_eq!(sched.timer_deadline(timer), Ok(Some(500)));

	// every pass lands 200ms late
	for n in 1..=5u64 {
		clock.set_us((n * 500 + 200) * 1_000);
		sched.run_pass();
		assert_eq!(sched.timer_deadline(timer), Ok(Some((n + 1) * 500)));
	}

	assert_eq!(counters.runs.get(), 5);
}

#[test]
fn quiet_periods_do_not_run_the_tasklet() {
	let clock = ManualClock::new();
	let mut sched = Scheduler::new(clock.clone());
	let counters = Periodic::install(&mut sched, 500, 4);
	sched.run_pass();

	clock.advance_ms(499);
	for _ in 0..3 {
		sched.run_pass();
	}

	assert_eq!(counters.runs.get(), 0);
	assert!(!sched.tasklets_pending());
}
