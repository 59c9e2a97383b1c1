use std::fmt;

use heapless::Vec;

use crate::clock::{self, Resolution};
use crate::config::MAX_TIMERS;
use crate::error::{Error, Resource, Result};
use crate::scheduler::Scheduler;
use crate::thread::ThreadId;

/// Longest timer span, in microseconds, whose deadline still compares correctly under wraparound
pub const MAX_DURATION: u64 = i64::MAX as u64;

/// Direct expiry callback, runs inside the scheduler pass and must not block
pub type TimerCallback = Box<dyn FnMut(&mut Scheduler, TimerId)>;

/// Handle of a registered timer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(pub(crate) u8);

impl TimerId {
	/// Slot index in the timer table, also the data word of its `EVENT_TIMER`
	pub fn index(self) -> usize {
		self.0 as usize
	}
}

impl fmt::Display for TimerId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "timer#{}", self.0)
	}
}

/// Lifecycle of a timer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerState {
	/// Not armed
	Idle,
	/// Armed, deadline not yet observed
	Running,
	/// Deadline observed by a pass, waiting for the owner to re-arm or stop it
	Expired,
}

/// What happens when a timer expires
pub enum Action {
	/// Call this inline
	Callback(TimerCallback),
	/// Post `EVENT_TIMER` to this thread
	Event(ThreadId),
}

impl fmt::Debug for Action {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Action::Callback(_) => f.write_str("Callback(..)"),
			Action::Event(owner) => f.debug_tuple("Event").field(owner).finish(),
		}
	}
}

/// Description of a timer to register with [`Scheduler::add_timer`]
#[derive(Debug)]
pub struct Timer {
	resolution: Resolution,
	action: Action,
}

impl Timer {
	/// Millisecond callback timer
	pub fn new<F>(callback: F) -> Self
	where
		F: FnMut(&mut Scheduler, TimerId) + 'static,
	{
		Self::milli(callback)
	}

	/// Millisecond callback timer
	pub fn milli<F>(callback: F) -> Self
	where
		F: FnMut(&mut Scheduler, TimerId) + 'static,
	{
		Self::with_resolution(Resolution::Milli, Action::Callback(Box::new(callback)))
	}

	/// Microsecond callback timer
	pub fn micro<F>(callback: F) -> Self
	where
		F: FnMut(&mut Scheduler, TimerId) + 'static,
	{
		Self::with_resolution(Resolution::Micro, Action::Callback(Box::new(callback)))
	}

	/// Real-time callback timer
	pub fn real<F>(callback: F) -> Self
	where
		F: FnMut(&mut Scheduler, TimerId) + 'static,
	{
		Self::with_resolution(Resolution::Real, Action::Callback(Box::new(callback)))
	}

	/// Event timer: posts `EVENT_TIMER` to `owner` on expiry
	pub fn etimer(resolution: Resolution, owner: ThreadId) -> Self {
		Self::with_resolution(resolution, Action::Event(owner))
	}

	/// Timer with an explicit resolution and action
	pub fn with_resolution(resolution: Resolution, action: Action) -> Self {
		Self { resolution, action }
	}

	/// Resolution this timer counts in
	pub fn resolution(&self) -> Resolution {
		self.resolution
	}
}

/// Borrowed-out action of a timer whose deadline passed
pub(crate) enum Fired {
	Callback(TimerCallback),
	Event(ThreadId),
}

enum SlotAction {
	// `None` while the callback is lent out to a running pass
	Callback(Option<TimerCallback>),
	Event(ThreadId),
}

struct TimerSlot {
	resolution: Resolution,
	state: TimerState,
	// µs reading the current run of periods is measured from
	origin: u64,
	// ticks from `origin` to the deadline, grows by one period per reset
	elapsed: u64,
	period: Option<u64>,
	// µs, cached from `origin` and `elapsed`
	deadline: u64,
	action: SlotAction,
}

impl TimerSlot {
	fn arm(&mut self, origin: u64, elapsed: u64) {
		self.origin = origin;
		self.elapsed = elapsed;
		self.deadline = origin.wrapping_add(self.resolution.span_micros(elapsed));
		self.state = TimerState::Running;
	}
}

/// All registered timers.
///
/// Deadlines of every resolution live on the wrapping microsecond counter, so one reading decides expiry for all
/// of them and the counter wrapping is harmless.
pub(crate) struct TimerSet {
	slots: Vec<Option<TimerSlot>, MAX_TIMERS>,
}

fn check_duration(resolution: Resolution, duration: u64) -> Result<u64> {
	match resolution.exact_span(duration) > MAX_DURATION as u128 {
		true => Err(Error::DurationTooLong(duration)),
		false => Ok(duration),
	}
}

impl TimerSet {
	pub(crate) const fn new() -> Self {
		Self { slots: Vec::new() }
	}

	pub(crate) fn insert(&mut self, timer: Timer) -> Result<TimerId> {
		let slot = TimerSlot {
			resolution: timer.resolution,
			state: TimerState::Idle,
			origin: 0,
			elapsed: 0,
			period: None,
			deadline: 0,
			action: match timer.action {
				Action::Callback(callback) => SlotAction::Callback(Some(callback)),
				Action::Event(owner) => SlotAction::Event(owner),
			},
		};

		if let Some(idx) = self.slots.iter().position(Option::is_none) {
			self.slots[idx] = Some(slot);
			return Ok(TimerId(idx as u8));
		}

		let idx = self.slots.len();
		self.slots.push(Some(slot)).map_err(|_| Error::ResourceExhausted(Resource::Timers))?;
		Ok(TimerId(idx as u8))
	}

	pub(crate) fn remove(&mut self, id: TimerId) -> Result<()> {
		match self.slots.get_mut(id.index()).and_then(Option::take) {
			Some(_) => Ok(()),
			None => Err(Error::NotRegistered(Resource::Timers, id.index())),
		}
	}

	fn slot(&self, id: TimerId) -> Result<&TimerSlot> {
		match self.slots.get(id.index()) {
			Some(Some(slot)) => Ok(slot),
			_ => Err(Error::NotRegistered(Resource::Timers, id.index())),
		}
	}

	fn slot_mut(&mut self, id: TimerId) -> Result<&mut TimerSlot> {
		match self.slots.get_mut(id.index()) {
			Some(Some(slot)) => Ok(slot),
			_ => Err(Error::NotRegistered(Resource::Timers, id.index())),
		}
	}

	/// Arms `id` to fire `duration` ticks after `base_us`; re-arming a running timer replaces its deadline
	pub(crate) fn start_at(&mut self, id: TimerId, base_us: u64, duration: u64) -> Result<()> {
		let slot = self.slot_mut(id)?;
		let duration = check_duration(slot.resolution, duration)?;

		slot.period = Some(duration);
		slot.arm(base_us, duration);
		Ok(())
	}

	/// Like [`TimerSet::start_at`] with `base` given in the timer's own ticks
	pub(crate) fn start_at_ticks(&mut self, id: TimerId, base: u64, duration: u64) -> Result<()> {
		let base_us = self.slot(id)?.resolution.span_micros(base);
		self.start_at(id, base_us, duration)
	}

	pub(crate) fn stop(&mut self, id: TimerId) -> Result<()> {
		self.slot_mut(id)?.state = TimerState::Idle;
		Ok(())
	}

	/// Phase-preserving re-arm: the new deadline follows the previous one
	pub(crate) fn reset(&mut self, id: TimerId) -> Result<()> {
		let slot = self.slot_mut(id)?;

		match (slot.state, slot.period) {
			(TimerState::Idle, _) | (_, None) => Err(Error::InvalidState("reset of an idle timer")),
			(_, Some(period)) => {
				slot.arm(slot.origin, slot.elapsed.wrapping_add(period));
				Ok(())
			}
		}
	}

	/// Phase-resetting re-arm: the new deadline follows `now_us`
	pub(crate) fn restart(&mut self, id: TimerId, now_us: u64) -> Result<()> {
		let slot = self.slot_mut(id)?;

		match slot.period {
			None => Err(Error::InvalidState("restart of a timer that was never started")),
			Some(period) => {
				slot.arm(now_us, period);
				Ok(())
			}
		}
	}

	pub(crate) fn state(&self, id: TimerId) -> Result<TimerState> {
		Ok(self.slot(id)?.state)
	}

	/// Deadline of an armed or expired timer in its own ticks, counted on the wrapping microsecond counter
	pub(crate) fn deadline(&self, id: TimerId) -> Result<Option<u64>> {
		let slot = self.slot(id)?;

		Ok(match slot.state {
			TimerState::Idle => None,
			TimerState::Running | TimerState::Expired => Some(slot.resolution.from_micros(slot.deadline)),
		})
	}

	/// Ticks left before the deadline, rounded up; zero once it has passed
	pub(crate) fn remaining(&self, id: TimerId, now_us: u64) -> Result<Option<u64>> {
		let slot = self.slot(id)?;

		Ok(match slot.state {
			TimerState::Idle => None,
			TimerState::Running | TimerState::Expired => match clock::is_before(now_us, slot.deadline) {
				true => Some(slot.resolution.covering(slot.deadline.wrapping_sub(now_us))),
				false => Some(0),
			},
		})
	}

	/// Whether the timer's deadline has been reached at `now_us`
	pub(crate) fn expired(&self, id: TimerId, now_us: u64) -> bool {
		match self.slot(id) {
			Ok(slot) => match slot.state {
				TimerState::Idle => false,
				TimerState::Running => clock::deadline_reached(now_us, slot.deadline),
				TimerState::Expired => true,
			},
			Err(_) => false,
		}
	}

	/// Running timers due at `now_us`, most overdue first
	pub(crate) fn due(&self, now_us: u64) -> Vec<TimerId, MAX_TIMERS> {
		let mut due: Vec<(TimerId, u64), MAX_TIMERS> = Vec::new();

		for (idx, slot) in self.slots.iter().enumerate() {
			let Some(slot) = slot else { continue };
			if slot.state == TimerState::Running && clock::deadline_reached(now_us, slot.deadline) {
				// same capacity as `slots`
				let _ = due.push((TimerId(idx as u8), now_us.wrapping_sub(slot.deadline)));
			}
		}

		// stable, ties keep slot order
		due.sort_by(|a, b| b.1.cmp(&a.1));
		due.iter().map(|(id, _)| *id).collect()
	}

	/// Moves a due timer to `Expired` and lends out its action.
	///
	/// Returns `None` if the timer was stopped, re-armed into the future or removed since `due` saw it.
	pub(crate) fn fire(&mut self, id: TimerId, now_us: u64) -> Option<Fired> {
		let slot = self.slot_mut(id).ok()?;
		if slot.state != TimerState::Running || !clock::deadline_reached(now_us, slot.deadline) {
			return None;
		}

		let fired = match &mut slot.action {
			SlotAction::Event(owner) => Fired::Event(*owner),
			// still running from an earlier expiry
			SlotAction::Callback(callback) => Fired::Callback(callback.take()?),
		};

		slot.state = TimerState::Expired;
		Some(fired)
	}

	/// Gives a lent callback back, unless the slot was removed while it ran
	pub(crate) fn restore(&mut self, id: TimerId, callback: TimerCallback) {
		if let Ok(slot) = self.slot_mut(id) {
			if let SlotAction::Callback(lent @ None) = &mut slot.action {
				*lent = Some(callback);
			}
		}
	}

	pub(crate) fn len(&self) -> usize {
		self.slots.iter().filter(|s| s.is_some()).count()
	}
}
