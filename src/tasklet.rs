use std::fmt;

use heapless::{Deque, Vec};

use crate::config::MAX_TASKLETS;
use crate::error::{Error, Resource, Result};
use crate::scheduler::Scheduler;

/// Deferred callback, runs during the tasklet drain of a pass and must not block
pub type TaskletCallback = Box<dyn FnMut(&mut Scheduler, TaskletId)>;

/// Handle of a registered tasklet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskletId(pub(crate) u8);

impl TaskletId {
	/// Slot index in the tasklet table
	pub fn index(self) -> usize {
		self.0 as usize
	}
}

impl fmt::Display for TaskletId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "tasklet#{}", self.0)
	}
}

struct TaskletSlot {
	// `None` while the callback runs
	callback: Option<TaskletCallback>,
	queued: bool,
}

/// Coalescing FIFO of deferred callbacks.
///
/// A tasklet sits in the queue at most once, so the queue can never hold more entries than there are slots.
pub(crate) struct TaskletQueue {
	slots: Vec<Option<TaskletSlot>, MAX_TASKLETS>,
	queue: Deque<TaskletId, MAX_TASKLETS>,
}

impl TaskletQueue {
	pub(crate) const fn new() -> Self {
		Self { slots: Vec::new(), queue: Deque::new() }
	}

	pub(crate) fn insert(&mut self, callback: TaskletCallback) -> Result<TaskletId> {
		let slot = TaskletSlot { callback: Some(callback), queued: false };

		if let Some(idx) = self.slots.iter().position(Option::is_none) {
			self.slots[idx] = Some(slot);
			return Ok(TaskletId(idx as u8));
		}

		let idx = self.slots.len();
		self.slots.push(Some(slot)).map_err(|_| Error::ResourceExhausted(Resource::Tasklets))?;
		Ok(TaskletId(idx as u8))
	}

	pub(crate) fn remove(&mut self, id: TaskletId) -> Result<()> {
		self.cancel(id)?;
		match self.slots.get_mut(id.index()).and_then(Option::take) {
			Some(_) => Ok(()),
			None => Err(Error::NotRegistered(Resource::Tasklets, id.index())),
		}
	}

	fn slot_mut(&mut self, id: TaskletId) -> Result<&mut TaskletSlot> {
		match self.slots.get_mut(id.index()) {
			Some(Some(slot)) => Ok(slot),
			_ => Err(Error::NotRegistered(Resource::Tasklets, id.index())),
		}
	}

	/// Queues `id`; `Ok(false)` means it was already queued and the post coalesced
	pub(crate) fn post(&mut self, id: TaskletId) -> Result<bool> {
		let slot = self.slot_mut(id)?;
		if slot.queued {
			return Ok(false);
		}

		slot.queued = true;
		// at most one entry per slot
		let _ = self.queue.push_back(id);
		Ok(true)
	}

	/// Takes `id` out of the queue; `Ok(false)` if it wasn't queued
	pub(crate) fn cancel(&mut self, id: TaskletId) -> Result<bool> {
		let slot = self.slot_mut(id)?;
		if !slot.queued {
			return Ok(false);
		}

		slot.queued = false;
		let mut kept = Deque::new();
		while let Some(queued) = self.queue.pop_front() {
			if queued != id {
				let _ = kept.push_back(queued);
			}
		}
		self.queue = kept;
		Ok(true)
	}

	pub(crate) fn is_queued(&self, id: TaskletId) -> bool {
		matches!(self.slots.get(id.index()), Some(Some(TaskletSlot { queued: true, .. })))
	}

	pub(crate) fn pending(&self) -> usize {
		self.queue.len()
	}

	/// Dequeues the head, clears its flag and lends out its callback.
	///
	/// A tasklet whose callback is running further up the stack is not re-entered: it goes back to the tail,
	/// still queued, and comes out as `(id, None)`.
	pub(crate) fn pop(&mut self) -> Option<(TaskletId, Option<TaskletCallback>)> {
		loop {
			let id = self.queue.pop_front()?;
			let Ok(slot) = self.slot_mut(id) else { continue };

			return match slot.callback.take() {
				Some(callback) => {
					slot.queued = false;
					Some((id, Some(callback)))
				}
				None => {
					// the entry was just popped, so there is room
					let _ = self.queue.push_back(id);
					Some((id, None))
				}
			};
		}
	}

	/// Gives a lent callback back, unless the slot was removed or reused while it ran
	pub(crate) fn restore(&mut self, id: TaskletId, callback: TaskletCallback) {
		if let Ok(slot) = self.slot_mut(id) {
			if slot.callback.is_none() {
				slot.callback = Some(callback);
			}
		}
	}

	pub(crate) fn len(&self) -> usize {
		self.slots.iter().filter(|s| s.is_some()).count()
	}
}
