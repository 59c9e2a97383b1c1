use log::{debug, trace, warn};

use crate::clock::{Clock, Resolution};
use crate::config::{Config, EVENT_QUEUE_DEPTH};
use crate::error::{Error, Resource, Result};
use crate::event::{EVENT_EXIT, EVENT_INIT, EVENT_POLL, EVENT_TIMER, Event, EventAllocator, EventData, EventId, EventQueue};
use crate::platform::Platform;
use crate::tasklet::{TaskletId, TaskletQueue};
use crate::thread::{Control, FnThread, Thread, ThreadId, ThreadTable};
use crate::timer::{Fired, Timer, TimerId, TimerSet, TimerState};

/// What a single [`Scheduler::run_pass`] did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassReport {
	/// Timers whose expiry was handled
	pub timers_fired: usize,
	/// Events taken off the queue, plus a synthesized poll
	pub events_dispatched: usize,
	/// Tasklet callbacks invoked
	pub tasklets_run: usize,
}

/// The execution context: owns the event queue, timers, tasklets and the thread table.
///
/// Everything runs on the caller's thread. Callbacks and threads receive `&mut Scheduler` and may post,
/// arm timers or queue tasklets; those calls take effect in the current or the next pass.
pub struct Scheduler {
	clock: Box<dyn Clock>,
	config: Config,

	events: EventQueue<EVENT_QUEUE_DEPTH>,
	allocator: EventAllocator,

	timers: TimerSet,
	tasklets: TaskletQueue,
	threads: ThreadTable,

	passes: u64,
}

impl Scheduler {
	/// A scheduler reading `clock`, with the default [`Config`]
	pub fn new(clock: impl Clock + 'static) -> Self {
		Self::with_config(clock, Config::default())
	}

	/// A scheduler reading `clock`, tuned by `config`
	pub fn with_config(clock: impl Clock + 'static, config: Config) -> Self {
		Self {
			clock: Box::new(clock),
			allocator: EventAllocator::new(config.event_id_limit),
			config,
			events: EventQueue::new(),
			timers: TimerSet::new(),
			tasklets: TaskletQueue::new(),
			threads: ThreadTable::new(),
			passes: 0,
		}
	}

	/// The clock driving this scheduler
	pub fn clock(&self) -> &dyn Clock {
		self.clock.as_ref()
	}

	/// Current reading in `resolution`
	pub fn now(&self, resolution: Resolution) -> u64 {
		self.clock.now(resolution)
	}

	/// Active configuration
	pub fn config(&self) -> &Config {
		&self.config
	}

	/// Passes completed so far
	pub fn passes(&self) -> u64 {
		self.passes
	}

	/// Hands out a fresh event identifier
	pub fn alloc_event(&mut self) -> Result<EventId> {
		let id = self.allocator.alloc()?;
		debug!("allocated event {}", id);
		Ok(id)
	}

	/// Broadcasts `id` to every registered thread
	pub fn post(&mut self, id: EventId, data: EventData) -> Result<()> {
		self.events.post(id, data, None)
	}

	/// Posts `id` to a single thread
	pub fn post_to(&mut self, id: EventId, data: EventData, target: ThreadId) -> Result<()> {
		self.events.post(id, data, Some(target))
	}

	/// Number of queued events
	pub fn pending_events(&self) -> usize {
		self.events.len()
	}

	/// Adds a thread to the dispatch table
	pub fn register_thread<T: Thread + 'static>(&mut self, thread: T) -> Result<ThreadId> {
		let id = self.threads.insert(Box::new(thread))?;
		debug!("registered {} as {}", self.threads.name(id).unwrap_or("thread"), id);

		if self.config.init_on_register {
			if let Err(err) = self.post_to(EVENT_INIT, 0, id) {
				// roll back
				self.threads.remove(id);
				return Err(err);
			}
		}

		Ok(id)
	}

	/// Adds a closure as a thread
	pub fn register_thread_fn<F>(&mut self, name: &'static str, f: F) -> Result<ThreadId>
	where
		F: FnMut(&mut Scheduler, Event) -> Control + 'static,
	{
		self.register_thread(FnThread { name, f })
	}

	/// Asks `id` to exit; it is deregistered once it has handled `EVENT_EXIT`
	pub fn exit_thread(&mut self, id: ThreadId) -> Result<()> {
		if !self.threads.contains(id) {
			return Err(Error::NotRegistered(Resource::Threads, id.index()));
		}

		self.post_to(EVENT_EXIT, 0, id)
	}

	/// Whether `id` is still registered
	pub fn is_registered(&self, id: ThreadId) -> bool {
		self.threads.contains(id)
	}

	/// Number of registered threads
	pub fn thread_count(&self) -> usize {
		self.threads.len()
	}

	/// Registers a timer, initially idle
	pub fn add_timer(&mut self, timer: Timer) -> Result<TimerId> {
		let id = self.timers.insert(timer)?;
		debug!("registered {}", id);
		Ok(id)
	}

	/// Deregisters a timer
	pub fn remove_timer(&mut self, id: TimerId) -> Result<()> {
		self.timers.remove(id)?;
		debug!("removed {}", id);
		Ok(())
	}

	/// Arms `id` to expire `duration` ticks from now, in the timer's resolution
	pub fn start_timer(&mut self, id: TimerId, duration: u64) -> Result<()> {
		self.timers.start_at(id, self.clock.now_us(), duration)
	}

	/// Arms `id` to expire at `t0 + duration`, both in the timer's resolution
	pub fn start_timer_at(&mut self, id: TimerId, t0: u64, duration: u64) -> Result<()> {
		self.timers.start_at_ticks(id, t0, duration)
	}

	/// Disarms `id`, also acknowledging an expiry
	pub fn stop_timer(&mut self, id: TimerId) -> Result<()> {
		self.timers.stop(id)
	}

	/// Re-arms `id` one period after its previous deadline, keeping its phase
	pub fn reset_timer(&mut self, id: TimerId) -> Result<()> {
		self.timers.reset(id)
	}

	/// Re-arms `id` one period after now
	pub fn restart_timer(&mut self, id: TimerId) -> Result<()> {
		self.timers.restart(id, self.clock.now_us())
	}

	/// Whether `id` has reached its deadline; stays `true` until stopped or re-armed
	pub fn timer_expired(&self, id: TimerId) -> bool {
		self.timers.expired(id, self.clock.now_us())
	}

	/// Lifecycle state of `id`
	pub fn timer_state(&self, id: TimerId) -> Result<TimerState> {
		self.timers.state(id)
	}

	/// Absolute deadline of an armed or expired timer, in its resolution.
	///
	/// Deadlines are kept on the wrapping microsecond counter, so this is the deadline in microseconds
	/// converted to the timer's ticks.
	pub fn timer_deadline(&self, id: TimerId) -> Result<Option<u64>> {
		self.timers.deadline(id)
	}

	/// Ticks left until `id` expires, `None` if it is idle
	pub fn timer_remaining(&self, id: TimerId) -> Result<Option<u64>> {
		self.timers.remaining(id, self.clock.now_us())
	}

	/// Number of registered timers
	pub fn timer_count(&self) -> usize {
		self.timers.len()
	}

	/// Registers a tasklet, initially not queued
	pub fn add_tasklet<F>(&mut self, callback: F) -> Result<TaskletId>
	where
		F: FnMut(&mut Scheduler, TaskletId) + 'static,
	{
		let id = self.tasklets.insert(Box::new(callback))?;
		debug!("registered {}", id);
		Ok(id)
	}

	/// Deregisters a tasklet, dropping it from the queue if needed
	pub fn remove_tasklet(&mut self, id: TaskletId) -> Result<()> {
		self.tasklets.remove(id)?;
		debug!("removed {}", id);
		Ok(())
	}

	/// Queues `id` for the next drain. Returns `false` if it was already queued, the posts coalesce
	pub fn post_tasklet(&mut self, id: TaskletId) -> Result<bool> {
		self.tasklets.post(id)
	}

	/// Takes `id` back out of the queue. Returns `false` if it wasn't queued
	pub fn cancel_tasklet(&mut self, id: TaskletId) -> Result<bool> {
		self.tasklets.cancel(id)
	}

	/// Whether `id` is waiting for a drain
	pub fn tasklet_queued(&self, id: TaskletId) -> bool {
		self.tasklets.is_queued(id)
	}

	/// Whether any tasklet is waiting for a drain
	pub fn tasklets_pending(&self) -> bool {
		self.tasklets.pending() > 0
	}

	/// Number of registered tasklets
	pub fn tasklet_count(&self) -> usize {
		self.tasklets.len()
	}

	/// Runs every tasklet queued at the time of the call, in post order.
	///
	/// A tasklet posted from inside a callback, itself included, waits for the next drain. Called from inside a
	/// tasklet, the nested drain leaves the caller queued for a later one.
	pub fn run_tasklets(&mut self) -> usize {
		let queued = self.tasklets.pending();
		let mut ran = 0;

		for _ in 0..queued {
			let Some((id, callback)) = self.tasklets.pop() else { break };
			let Some(mut callback) = callback else { continue };

			callback(self, id);
			self.tasklets.restore(id, callback);
			ran += 1;
		}

		ran
	}

	/// One bounded pass: expire timers, dispatch events, drain tasklets. Never blocks
	pub fn run_pass(&mut self) -> PassReport {
		let timers_fired = self.expire_timers(self.clock.now_us());
		let events_dispatched = self.dispatch_events();
		let tasklets_run = self.run_tasklets();

		self.passes = self.passes.wrapping_add(1);
		trace!(
			"[PASS {}] timers: {}, events: {}, tasklets: {}",
			self.passes,
			timers_fired,
			events_dispatched,
			tasklets_run
		);

		PassReport { timers_fired, events_dispatched, tasklets_run }
	}

	/// Alternates passes and platform polls forever
	pub fn run(&mut self, platform: &mut impl Platform) -> ! {
		loop {
			self.run_pass();
			platform.process_drivers();
		}
	}

	/// Alternates passes and platform polls until `done` yields.
	///
	/// Returns `None` if the sending half is dropped without a value.
	pub fn run_until<T>(&mut self, platform: &mut impl Platform, done: oneshot::Receiver<T>) -> Option<T> {
		loop {
			self.run_pass();

			match done.try_recv() {
				Ok(value) => return Some(value),
				Err(oneshot::TryRecvError::Empty) => {}
				Err(oneshot::TryRecvError::Disconnected) => return None,
			}

			platform.process_drivers();
		}
	}

	/// Fires every timer due at `now_us`, judged on one reading for all resolutions
	fn expire_timers(&mut self, now_us: u64) -> usize {
		let due = self.timers.due(now_us);
		let mut fired = 0;

		for id in due {
			let Some(action) = self.timers.fire(id, now_us) else { continue };
			fired += 1;

			match action {
				Fired::Callback(mut callback) => {
					callback(self, id);
					self.timers.restore(id, callback);
				}
				Fired::Event(owner) => {
					if let Err(err) = self.post_to(EVENT_TIMER, id.index(), owner) {
						warn!("dropping expiry of {} for {}: {}", id, owner, err);
					}
				}
			}
		}

		fired
	}

	/// Delivers the events pending at this point; anything posted meanwhile waits for the next pass
	fn dispatch_events(&mut self) -> usize {
		let pending = self.events.len();

		if pending == 0 {
			if self.config.poll_when_idle && self.threads.len() > 0 {
				self.deliver(Event::new(EVENT_POLL, 0));
				return 1;
			}
			return 0;
		}

		let mut dispatched = 0;
		for _ in 0..pending {
			let Some(event) = self.events.poll() else { break };
			self.deliver(event);
			dispatched += 1;
		}

		dispatched
	}

	fn deliver(&mut self, event: Event) {
		match event.target {
			Some(id) => self.dispatch_to(id, event),
			None => {
				for id in self.threads.ids() {
					self.dispatch_to(id, event);
				}
			}
		}
	}

	fn dispatch_to(&mut self, id: ThreadId, event: Event) {
		let Some(mut thread) = self.threads.take(id) else {
			debug!("dropping event {} for {}: not registered", event.id, id);
			return;
		};

		let control = thread.dispatch(self, event);

		if control == Control::Exited || event.id == EVENT_EXIT {
			debug!("{} ({}) exited", id, thread.name());
			self.threads.retire(id);
		} else {
			self.threads.restore(id, thread);
		}
	}
}
