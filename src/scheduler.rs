//! A priority queue of render work, drained in animation frames under a time budget.

use crate::{
	catch::run_guarded,
	host::{FrameHandle, FrameHost},
};
use core::cell::RefCell;
use serde::{Deserialize, Serialize};
use std::{
	collections::VecDeque,
	rc::{Rc, Weak},
};
use tracing::{debug, instrument, trace, trace_span, warn};

/// Higher runs first. Equal priorities run in the order they were scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Priority(pub i32);
impl Priority {
	pub const LOW: Self = Self(0);
	pub const NORMAL: Self = Self(1);
	pub const HIGH: Self = Self(5);
	pub const CRITICAL: Self = Self(10);
}
impl Default for Priority {
	fn default() -> Self {
		Self::NORMAL
	}
}
impl From<i32> for Priority {
	fn from(priority: i32) -> Self {
		Self(priority)
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TaskId(u64);

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
	/// Work budget per frame, in milliseconds.
	pub frame_budget_ms: f64,
	/// Number of frames per FPS sample.
	pub sample_frames: u32,
	/// Expected interval between frames, used to count dropped frames.
	pub target_frame_ms: f64,
}
impl Default for SchedulerConfig {
	fn default() -> Self {
		Self {
			frame_budget_ms: 16.0,
			sample_frames: 60,
			target_frame_ms: 1000.0 / 60.0,
		}
	}
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct SchedulerMetrics {
	/// Frames per second over the last complete sample, or `0.0` before the first one.
	pub fps: f64,
	pub dropped_frames: u64,
	pub queue_depth: usize,
	/// Mean pump duration over the last [`sample_frames`](`SchedulerConfig::sample_frames`) frames.
	pub average_render_ms: f64,
	pub max_render_ms: f64,
	pub frames: u64,
	pub tasks_run: u64,
	pub tasks_failed: u64,
}

struct Task {
	id: TaskId,
	callback: Box<dyn FnOnce()>,
	priority: Priority,
	timestamp: f64,
}

#[derive(Default)]
struct State {
	queue: VecDeque<Task>,
	next_id: u64,
	pending_frame: Option<FrameHandle>,
	/// Set while tasks run. The pump requests the next frame itself once it is done.
	pumping: bool,
	metrics: SchedulerMetrics,
	render_times: VecDeque<f64>,
	sample_start: Option<f64>,
	frames_in_sample: u32,
}

struct Inner<H> {
	host: Rc<H>,
	config: SchedulerConfig,
	state: RefCell<State>,
}

/// Batches work into animation frames.
///
/// Each frame runs queued tasks in priority order until the queue is empty or the
/// [frame budget](`SchedulerConfig::frame_budget_ms`) is used up, then requests another frame if work remains.
/// A long task is never interrupted, so a single frame can overrun by at most one task.
///
/// Clones share the same queue.
pub struct Scheduler<H: FrameHost + 'static>(Rc<Inner<H>>);
impl<H: FrameHost + 'static> Clone for Scheduler<H> {
	fn clone(&self) -> Self {
		Self(Rc::clone(&self.0))
	}
}
impl<H: FrameHost + 'static> Scheduler<H> {
	#[must_use]
	pub fn new(host: Rc<H>, config: SchedulerConfig) -> Self {
		Self(Rc::new(Inner {
			host,
			config,
			state: RefCell::default(),
		}))
	}

	#[must_use]
	pub fn host(&self) -> &Rc<H> {
		&self.0.host
	}

	#[must_use]
	pub fn config(&self) -> &SchedulerConfig {
		&self.0.config
	}

	/// Queues `callback(data)` to run in an upcoming frame.
	#[instrument(skip(self, callback, data))]
	pub fn schedule<T: 'static>(&self, callback: impl FnOnce(T) + 'static, data: T, priority: Priority) -> TaskId {
		let timestamp = self.0.host.now();
		let id = {
			let mut state = self.0.state.borrow_mut();
			let id = TaskId(state.next_id);
			state.next_id += 1;

			// Stable: after every task of equal or higher priority.
			let index = state.queue.iter().position(|task| task.priority < priority).unwrap_or(state.queue.len());
			state.queue.insert(
				index,
				Task {
					id,
					callback: Box::new(move || callback(data)),
					priority,
					timestamp,
				},
			);
			trace!("Queued task {:?} at position {}.", id, index);
			id
		};
		self.request_pump();
		id
	}

	/// Removes a task that hasn't started yet. Returns whether it was found.
	pub fn cancel(&self, id: TaskId) -> bool {
		let mut state = self.0.state.borrow_mut();
		let Some(index) = state.queue.iter().position(|task| task.id == id) else {
			return false;
		};
		state.queue.remove(index);
		if state.queue.is_empty() {
			if let Some(handle) = state.pending_frame.take() {
				self.0.host.cancel_frame(handle)
			}
		}
		true
	}

	/// Drops all queued tasks and the pending frame request.
	pub fn clear(&self) {
		let mut state = self.0.state.borrow_mut();
		if let Some(handle) = state.pending_frame.take() {
			self.0.host.cancel_frame(handle)
		}
		let dropped = state.queue.len();
		state.queue.clear();
		state.sample_start = None;
		state.frames_in_sample = 0;
		if dropped > 0 {
			warn!("Cleared {} pending task(s).", dropped);
		}
	}

	#[must_use]
	pub fn get_metrics(&self) -> SchedulerMetrics {
		let state = self.0.state.borrow();
		SchedulerMetrics {
			queue_depth: state.queue.len(),
			..state.metrics
		}
	}

	#[must_use]
	pub fn is_idle(&self) -> bool {
		self.0.state.borrow().queue.is_empty()
	}

	fn request_pump(&self) {
		let mut state = self.0.state.borrow_mut();
		if state.pumping || state.pending_frame.is_some() || state.queue.is_empty() {
			return;
		}
		let weak: Weak<Inner<H>> = Rc::downgrade(&self.0);
		state.pending_frame = Some(self.0.host.request_frame(Box::new(move |timestamp| {
			if let Some(inner) = weak.upgrade() {
				Self(inner).pump(timestamp)
			}
		})));
	}

	fn pump(&self, timestamp: f64) {
		let span = trace_span!("Scheduler pump", timestamp);
		let _enter = span.enter();

		{
			let mut state = self.0.state.borrow_mut();
			state.pending_frame = None;
			state.pumping = true;
		}
		let host = &self.0.host;
		let start = host.now();
		let mut ran = 0_usize;
		let mut failed = 0_usize;

		loop {
			if host.now() - start >= self.0.config.frame_budget_ms {
				trace!("Frame budget exhausted after {} task(s).", ran + failed);
				break;
			}
			let Some(task) = self.0.state.borrow_mut().queue.pop_front() else {
				break;
			};
			let Task { id, callback, priority, timestamp: queued_at } = task;
			let span = trace_span!("Running task", ?id, ?priority, queued_at);
			let _enter = span.enter();
			if run_guarded("Scheduled task", callback) {
				ran += 1;
			} else {
				failed += 1;
			}
		}

		let duration = host.now() - start;
		self.0.state.borrow_mut().pumping = false;
		self.record_frame(timestamp, duration, ran, failed);
		self.request_pump();
	}

	fn record_frame(&self, timestamp: f64, duration: f64, ran: usize, failed: usize) {
		let config = &self.0.config;
		let mut state = self.0.state.borrow_mut();
		let state = &mut *state;

		state.metrics.frames += 1;
		state.metrics.tasks_run += ran as u64;
		state.metrics.tasks_failed += failed as u64;

		state.render_times.push_back(duration);
		while state.render_times.len() > config.sample_frames.max(1) as usize {
			state.render_times.pop_front();
		}
		state.metrics.average_render_ms = state.render_times.iter().sum::<f64>() / state.render_times.len() as f64;
		state.metrics.max_render_ms = state.metrics.max_render_ms.max(duration);

		match state.sample_start {
			None => state.sample_start = Some(timestamp),
			Some(sample_start) => {
				state.frames_in_sample += 1;
				if state.frames_in_sample >= config.sample_frames {
					let elapsed = timestamp - sample_start;
					if elapsed > 0.0 {
						let frames = f64::from(state.frames_in_sample);
						state.metrics.fps = frames * 1000.0 / elapsed;
						let expected = (elapsed / config.target_frame_ms).round();
						if expected > frames {
							#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
							let dropped = (expected - frames) as u64;
							state.metrics.dropped_frames += dropped;
						}
						debug!("{:.1} FPS, {} dropped frame(s) so far.", state.metrics.fps, state.metrics.dropped_frames);
					}
					state.sample_start = Some(timestamp);
					state.frames_in_sample = 0;
				}
			}
		}

		// Idle gaps aren't dropped frames.
		if state.queue.is_empty() {
			state.sample_start = None;
			state.frames_in_sample = 0;
		}
	}
}
