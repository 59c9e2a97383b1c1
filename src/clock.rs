use std::{cell::Cell, rc::Rc, time};

/// Real-time (rtimer) ticks per second
pub const RTIMER_SECOND: u64 = 32_768;

/// Granularity a timer measures against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resolution {
	/// Microsecond ticks
	Micro,
	/// Millisecond ticks
	Milli,
	/// Real-time ticks, [`RTIMER_SECOND`] per second
	Real,
}

impl Resolution {
	/// Converts `ticks` of this resolution into microseconds, saturating at `u64::MAX`
	pub fn to_micros(self, ticks: u64) -> u64 {
		match self {
			Resolution::Micro => ticks,
			Resolution::Milli => ticks.saturating_mul(1_000),
			Resolution::Real => {
				let us = ticks as u128 * 1_000_000 / RTIMER_SECOND as u128;
				u64::try_from(us).unwrap_or(u64::MAX)
			}
		}
	}

	/// Whole ticks of this resolution elapsed in `us` microseconds
	pub fn from_micros(self, us: u64) -> u64 {
		match self {
			Resolution::Micro => us,
			Resolution::Milli => us / 1_000,
			Resolution::Real => (us as u128 * RTIMER_SECOND as u128 / 1_000_000) as u64,
		}
	}

	/// Ticks needed to cover `us` microseconds, rounded up
	pub(crate) fn covering(self, us: u64) -> u64 {
		let ticks = self.from_micros(us);
		match self.span_micros(ticks) < us {
			true => ticks + 1,
			false => ticks,
		}
	}

	/// First microsecond at which `ticks` of this resolution have elapsed, modulo the counter width.
	///
	/// Arithmetic on the wrapping microsecond counter stays consistent because the result wraps with it.
	pub(crate) fn span_micros(self, ticks: u64) -> u64 {
		self.exact_span(ticks) as u64
	}

	pub(crate) fn exact_span(self, ticks: u64) -> u128 {
		match self {
			Resolution::Micro => ticks as u128,
			Resolution::Milli => ticks as u128 * 1_000,
			Resolution::Real => (ticks as u128 * 1_000_000).div_ceil(RTIMER_SECOND as u128),
		}
	}
}

/// Monotonic tick source, read-only to the rest of the core.
///
/// Only `now_us` is required: the coarser views derive from it so that all three agree on what "now" is.
/// Timers are judged against `now_us` alone, which is the only view that wraps at the counter width.
pub trait Clock {
	/// Microseconds since boot
	fn now_us(&self) -> u64;

	/// Milliseconds since boot
	fn now_ms(&self) -> u64 {
		Resolution::Milli.from_micros(self.now_us())
	}

	/// Real-time ticks since boot
	fn now_rt(&self) -> u64 {
		Resolution::Real.from_micros(self.now_us())
	}

	/// Reads the view matching `resolution`
	fn now(&self, resolution: Resolution) -> u64 {
		match resolution {
			Resolution::Micro => self.now_us(),
			Resolution::Milli => self.now_ms(),
			Resolution::Real => self.now_rt(),
		}
	}
}

/// `true` once `now` has reached `deadline`, tolerant of counter wraparound
#[inline]
pub fn deadline_reached(now: u64, deadline: u64) -> bool {
	(now.wrapping_sub(deadline) as i64) >= 0
}

/// `true` if `a` lies strictly before `b`, tolerant of counter wraparound
#[inline]
pub fn is_before(a: u64, b: u64) -> bool {
	(a.wrapping_sub(b) as i64) < 0
}

/// Wall clock of the host, seeded when constructed
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
	boot: time::Instant,
}

impl SystemClock {
	/// Starts counting from now
	pub fn new() -> Self {
		Self { boot: time::Instant::now() }
	}
}

impl Default for SystemClock {
	fn default() -> Self {
		Self::new()
	}
}

impl Clock for SystemClock {
	fn now_us(&self) -> u64 {
		self.boot.elapsed().as_micros() as u64
	}
}

/// Simulated clock that only moves when told to.
///
/// Clones share the same counter, so a test keeps one handle and gives another to the scheduler.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
	us: Rc<Cell<u64>>,
}

impl ManualClock {
	/// A clock reading zero
	pub fn new() -> Self {
		Self::default()
	}

	/// A clock reading `us` microseconds
	pub fn starting_at(us: u64) -> Self {
		Self { us: Rc::new(Cell::new(us)) }
	}

	/// Jumps to `us` microseconds
	pub fn set_us(&self, us: u64) {
		self.us.set(us);
	}

	/// Moves forward by `us` microseconds, wrapping at the counter width
	pub fn advance_us(&self, us: u64) {
		self.us.set(self.us.get().wrapping_add(us));
	}

	/// Moves forward by `ms` milliseconds
	pub fn advance_ms(&self, ms: u64) {
		self.advance_us(ms.saturating_mul(1_000));
	}

	/// Moves forward by `dur`
	pub fn advance(&self, dur: time::Duration) {
		self.advance_us(dur.as_micros() as u64);
	}
}

impl Clock for ManualClock {
	fn now_us(&self) -> u64 {
		self.us.get()
	}
}
