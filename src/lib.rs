#![deny(missing_docs)]
#![doc = include_str!("../README.md")]


/// [`Clock`](clock::Clock) sources and wraparound-tolerant deadline comparison
pub mod clock;
/// Table capacities and run-time [`Config`](config::Config)
pub mod config;
/// [`Error`](error::Error) taxonomy
pub mod error;
/// [`Event`](event::Event) identifiers and the bounded [`EventQueue`](event::EventQueue)
pub mod event;
/// Host hook serviced between passes
pub mod platform;
/// The [`Scheduler`](scheduler::Scheduler) context and its run-loop
pub mod scheduler;
/// Deferred, coalescing callbacks
pub mod tasklet;
/// Protothread-style [`Thread`](thread::Thread)s
pub mod thread;
/// Micro, milli and real-time [`Timer`](timer::Timer)s
pub mod timer;

pub use clock::{Clock, ManualClock, RTIMER_SECOND, Resolution, SystemClock};
pub use config::Config;
pub use error::{Error, Resource, Result};
pub use event::{
	EVENT_EXIT, EVENT_INIT, EVENT_NONE, EVENT_POLL, EVENT_TIMER, Event, EventData, EventId, EventQueue, FIRST_USER_EVENT,
};
pub use platform::Platform;
pub use scheduler::{PassReport, Scheduler};
pub use tasklet::{TaskletCallback, TaskletId};
pub use thread::{Control, Protothread, Thread, ThreadId};
pub use timer::{Action, MAX_DURATION, Timer, TimerCallback, TimerId, TimerState};
