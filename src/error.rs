use std::fmt;

use thiserror::Error;

/// Fixed-capacity resources owned by the [`Scheduler`](crate::Scheduler)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
	/// Identifiers handed out by [`alloc_event`](crate::Scheduler::alloc_event)
	EventIds,
	/// Slots in the timer table
	Timers,
	/// Slots in the tasklet table
	Tasklets,
	/// Slots in the thread table
	Threads,
}

impl fmt::Display for Resource {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let name = match self {
			Resource::EventIds => "event id space",
			Resource::Timers => "timer table",
			Resource::Tasklets => "tasklet table",
			Resource::Threads => "thread table",
		};

		fmt::Display::fmt(name, f)
	}
}

/// Every error the core can report.
///
/// All of them are recoverable by the caller; the scheduler itself never fails a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Error {
	/// A bounded table or identifier space has no room left
	#[error("{0} exhausted")]
	ResourceExhausted(Resource),

	/// The bounded event queue is saturated, the event was not enqueued
	#[error("event queue full")]
	QueueFull,

	/// The operation does not apply to the object's current state
	#[error("invalid state: {0}")]
	InvalidState(&'static str),

	/// The duration can't be compared with wrapping signed arithmetic
	#[error("timer duration {0} exceeds the maximum span")]
	DurationTooLong(u64),

	/// The handle does not refer to a registered object
	#[error("no entry in the {0} for index {1}")]
	NotRegistered(Resource, usize),
}

/// Shorthand for results carrying [`Error`]
pub type Result<T> = std::result::Result<T, Error>;
