/// The host side of the run-loop: services device drivers between scheduler passes.
///
/// It should hand control back at least as often as the finest timer resolution in use,
/// otherwise expiry is late by up to one platform poll.
pub trait Platform {
	/// Polls drivers once and returns
	fn process_drivers(&mut self);
}

impl<F: FnMut()> Platform for F {
	fn process_drivers(&mut self) {
		self()
	}
}
