use std::fmt;

use heapless::Deque;

use crate::error::{Error, Resource, Result};
use crate::thread::ThreadId;

/// Opaque payload word carried by an [`Event`]
pub type EventData = usize;

/// Identifier of an event kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EventId(pub(crate) u8);

impl EventId {
	/// Raw identifier value
	pub fn get(self) -> u8 {
		self.0
	}
}

impl fmt::Display for EventId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match *self {
			EVENT_NONE => f.write_str("none"),
			EVENT_POLL => f.write_str("poll"),
			EVENT_TIMER => f.write_str("timer"),
			EVENT_INIT => f.write_str("init"),
			EVENT_EXIT => f.write_str("exit"),
			EventId(id) => write!(f, "#{}", id),
		}
	}
}

/// Placeholder that carries no meaning
pub const EVENT_NONE: EventId = EventId(0);
/// Level-triggered "check your condition" nudge, synthesized on idle passes
pub const EVENT_POLL: EventId = EventId(1);
/// Posted to the owner of an event timer when it expires, data is the timer index
pub const EVENT_TIMER: EventId = EventId(2);
/// Delivered to a thread right after it is registered
pub const EVENT_INIT: EventId = EventId(3);
/// Asks a thread to exit, it is deregistered once it has handled it
pub const EVENT_EXIT: EventId = EventId(4);
/// First identifier handed out by the allocator
pub const FIRST_USER_EVENT: EventId = EventId(5);

/// A queued notification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Event {
	/// What happened
	pub id: EventId,
	/// Opaque payload
	pub data: EventData,
	/// Receiving thread, `None` broadcasts to every registered thread
	pub target: Option<ThreadId>,
}

impl Event {
	/// Builds a broadcast event
	pub fn new(id: EventId, data: EventData) -> Self {
		Self { id, data, target: None }
	}

	/// Builds an event addressed to a single thread
	pub fn to(id: EventId, data: EventData, target: ThreadId) -> Self {
		Self { id, data, target: Some(target) }
	}
}

/// Hands out fresh event identifiers, never reusing one
#[derive(Debug)]
pub(crate) struct EventAllocator {
	next: u16,
	limit: u8,
}

impl EventAllocator {
	pub(crate) fn new(limit: u8) -> Self {
		Self { next: FIRST_USER_EVENT.0 as u16, limit }
	}

	pub(crate) fn alloc(&mut self) -> Result<EventId> {
		if self.next > self.limit as u16 {
			return Err(Error::ResourceExhausted(Resource::EventIds));
		}

		let id = EventId(self.next as u8);
		self.next += 1;
		Ok(id)
	}
}

/// Bounded FIFO of pending events
pub struct EventQueue<const N: usize> {
	queue: Deque<Event, N>,
}

impl<const N: usize> EventQueue<N> {
	/// An empty queue
	pub const fn new() -> Self {
		Self { queue: Deque::new() }
	}

	/// Enqueues at the tail; a full queue is left untouched
	pub fn post(&mut self, id: EventId, data: EventData, target: Option<ThreadId>) -> Result<()> {
		self.queue.push_back(Event { id, data, target }).map_err(|_| Error::QueueFull)
	}

	/// Dequeues the head
	pub fn poll(&mut self) -> Option<Event> {
		self.queue.pop_front()
	}

	/// Number of pending events
	pub fn len(&self) -> usize {
		self.queue.len()
	}

	/// `true` when nothing is pending
	pub fn is_empty(&self) -> bool {
		self.queue.is_empty()
	}

	/// `true` when the next `post` would fail
	pub fn is_full(&self) -> bool {
		self.queue.is_full()
	}

	/// Maximum number of pending events
	pub const fn capacity(&self) -> usize {
		N
	}
}

impl<const N: usize> Default for EventQueue<N> {
	fn default() -> Self {
		Self::new()
	}
}
