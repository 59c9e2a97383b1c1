use std::fmt;

use heapless::Vec;

use crate::config::MAX_THREADS;
use crate::error::{Error, Resource, Result};
use crate::event::Event;
use crate::scheduler::Scheduler;

/// Handle of a registered thread.
///
/// Carries the generation of its slot: once the thread is gone, a new thread in the same slot gets a different id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ThreadId {
	slot: u8,
	generation: u8,
}

impl ThreadId {
	/// Slot index in the thread table
	pub fn index(self) -> usize {
		self.slot as usize
	}
}

impl fmt::Display for ThreadId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "thread#{}.{}", self.slot, self.generation)
	}
}

/// What a thread wants after handling an event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
	/// Stay registered
	Continue,
	/// Deregister, later events addressed to this thread are dropped
	Exited,
}

/// A unit of application logic invoked once per relevant event.
///
/// No call stack survives between invocations: whatever the thread needs to remember lives in `self`.
pub trait Thread {
	/// Handles one event
	fn dispatch(&mut self, sched: &mut Scheduler, event: Event) -> Control;

	/// Name used in logs
	fn name(&self) -> &'static str {
		"thread"
	}
}

/// Protothread as a pure step function over an explicitly owned state value.
///
/// `S` is usually an enum whose variants are the points the thread can wait at:
///
/// ```ignore
/// enum Blink { Off, On }
///
/// fn step(state: &mut Blink, sched: &mut Scheduler, ev: Event) -> Control {
/// 	if ev.id == EVENT_TIMER {
/// 		*state = match state { Blink::Off => Blink::On, Blink::On => Blink::Off };
/// 	}
/// 	Control::Continue
/// }
///
/// sched.register_thread(Protothread::new("blink", Blink::Off, step))?;
/// ```
pub struct Protothread<S> {
	name: &'static str,
	state: S,
	step: fn(&mut S, &mut Scheduler, Event) -> Control,
}

impl<S> Protothread<S> {
	/// Wraps `step` around its initial `state`
	pub fn new(name: &'static str, state: S, step: fn(&mut S, &mut Scheduler, Event) -> Control) -> Self {
		Self { name, state, step }
	}

	/// Current state
	pub fn state(&self) -> &S {
		&self.state
	}
}

impl<S> Thread for Protothread<S> {
	fn dispatch(&mut self, sched: &mut Scheduler, event: Event) -> Control {
		(self.step)(&mut self.state, sched, event)
	}

	fn name(&self) -> &'static str {
		self.name
	}
}

/// Closure-backed thread, see [`Scheduler::register_thread_fn`]
pub(crate) struct FnThread<F> {
	pub(crate) name: &'static str,
	pub(crate) f: F,
}

impl<F> Thread for FnThread<F>
where
	F: FnMut(&mut Scheduler, Event) -> Control,
{
	fn dispatch(&mut self, sched: &mut Scheduler, event: Event) -> Control {
		(self.f)(sched, event)
	}

	fn name(&self) -> &'static str {
		self.name
	}
}

struct ThreadSlot {
	name: &'static str,
	// taken out while the thread is being dispatched
	handler: Option<Box<dyn Thread>>,
}

/// Fixed-capacity table from [`ThreadId`] to dispatch handler
pub(crate) struct ThreadTable {
	slots: Vec<Option<ThreadSlot>, MAX_THREADS>,
	// bumped each time a slot is freed
	generations: [u8; MAX_THREADS],
}

impl ThreadTable {
	pub(crate) const fn new() -> Self {
		Self { slots: Vec::new(), generations: [0; MAX_THREADS] }
	}

	fn id(&self, idx: usize) -> ThreadId {
		ThreadId { slot: idx as u8, generation: self.generations[idx] }
	}

	fn live(&self, id: ThreadId) -> Option<&ThreadSlot> {
		match self.slots.get(id.index()) {
			Some(Some(slot)) if self.generations[id.index()] == id.generation => Some(slot),
			_ => None,
		}
	}

	fn live_mut(&mut self, id: ThreadId) -> Option<&mut ThreadSlot> {
		match self.slots.get_mut(id.index()) {
			Some(Some(slot)) if self.generations[id.index()] == id.generation => Some(slot),
			_ => None,
		}
	}

	fn free(&mut self, idx: usize) {
		self.slots[idx] = None;
		self.generations[idx] = self.generations[idx].wrapping_add(1);
	}

	pub(crate) fn insert(&mut self, handler: Box<dyn Thread>) -> Result<ThreadId> {
		let slot = ThreadSlot { name: handler.name(), handler: Some(handler) };

		if let Some(idx) = self.slots.iter().position(Option::is_none) {
			self.slots[idx] = Some(slot);
			return Ok(self.id(idx));
		}

		let idx = self.slots.len();
		self.slots.push(Some(slot)).map_err(|_| Error::ResourceExhausted(Resource::Threads))?;
		Ok(self.id(idx))
	}

	pub(crate) fn remove(&mut self, id: ThreadId) -> bool {
		match self.live(id) {
			Some(_) => {
				self.free(id.index());
				true
			}
			None => false,
		}
	}

	pub(crate) fn contains(&self, id: ThreadId) -> bool {
		self.live(id).is_some()
	}

	pub(crate) fn name(&self, id: ThreadId) -> Option<&'static str> {
		self.live(id).map(|slot| slot.name)
	}

	pub(crate) fn len(&self) -> usize {
		self.slots.iter().filter(|s| s.is_some()).count()
	}

	/// Registered ids, in slot order
	pub(crate) fn ids(&self) -> Vec<ThreadId, MAX_THREADS> {
		let mut ids = Vec::new();
		for (idx, slot) in self.slots.iter().enumerate() {
			if slot.is_some() {
				// same capacity as `slots`
				let _ = ids.push(self.id(idx));
			}
		}
		ids
	}

	/// Borrows the handler out of its slot for the duration of a dispatch
	pub(crate) fn take(&mut self, id: ThreadId) -> Option<Box<dyn Thread>> {
		self.live_mut(id)?.handler.take()
	}

	/// Clears the slot of a handler taken with [`ThreadTable::take`], leaving a reused slot alone
	pub(crate) fn retire(&mut self, id: ThreadId) {
		if matches!(self.live(id), Some(ThreadSlot { handler: None, .. })) {
			self.free(id.index());
		}
	}

	/// Returns a handler taken with [`ThreadTable::take`], unless its slot was cleared or reused meanwhile
	pub(crate) fn restore(&mut self, id: ThreadId, handler: Box<dyn Thread>) {
		if let Some(slot) = self.live_mut(id) {
			if slot.handler.is_none() {
				slot.handler = Some(handler);
			}
		}
	}
}
