/// Depth of the event queue
pub const EVENT_QUEUE_DEPTH: usize = 32;

/// Number of timers that can be registered at once
pub const MAX_TIMERS: usize = 16;

/// Number of tasklets that can be registered at once
pub const MAX_TASKLETS: usize = 16;

/// Number of threads that can be registered at once
pub const MAX_THREADS: usize = 8;

/// Run-time knobs of a [`Scheduler`](crate::Scheduler).
///
/// Capacities are compile-time constants in this module; only behaviour is tunable here.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
	/// Highest identifier [`alloc_event`](crate::Scheduler::alloc_event) may hand out
	pub event_id_limit: u8,
	/// Deliver `EVENT_POLL` to every thread on passes that find the queue empty
	pub poll_when_idle: bool,
	/// Post a targeted `EVENT_INIT` to each thread as it is registered
	pub init_on_register: bool,
}

impl Config {
	/// Caps the event id space at `limit` (inclusive)
	pub fn with_event_id_limit(self, limit: u8) -> Self {
		Self { event_id_limit: limit, ..self }
	}

	/// Enables or disables synthesized `EVENT_POLL` on idle passes
	pub fn with_poll_when_idle(self, poll_when_idle: bool) -> Self {
		Self { poll_when_idle, ..self }
	}

	/// Enables or disables `EVENT_INIT` on registration
	pub fn with_init_on_register(self, init_on_register: bool) -> Self {
		Self { init_on_register, ..self }
	}
}

impl Default for Config {
	fn default() -> Self {
		Self { event_id_limit: u8::MAX, poll_when_idle: true, init_on_register: true }
	}
}
