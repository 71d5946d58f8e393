//! Time and frame sources the engine runs against.

use core::cell::{Cell, RefCell};

/// Milliseconds on a monotonic-enough timeline, like [***performance.now()***](https://developer.mozilla.org/en-US/docs/Web/API/Performance/now).
pub trait Clock {
	fn now(&self) -> f64;
}

/// Identifies a pending animation frame request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameHandle(pub i32);

/// Delivers animation frames, like [***requestAnimationFrame()***](https://developer.mozilla.org/en-US/docs/Web/API/window/requestAnimationFrame).
pub trait FrameHost: Clock {
	/// Calls `callback` once, with the frame timestamp, before the next repaint.
	fn request_frame(&self, callback: Box<dyn FnOnce(f64)>) -> FrameHandle;
	fn cancel_frame(&self, handle: FrameHandle);
}

/// Wall-clock time: `Date.now()` in the browser, [`std::time::SystemTime`] elsewhere.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;
impl Clock for SystemClock {
	#[cfg(target_arch = "wasm32")]
	fn now(&self) -> f64 {
		js_sys::Date::now()
	}

	#[cfg(not(target_arch = "wasm32"))]
	fn now(&self) -> f64 {
		use std::time::{SystemTime, UNIX_EPOCH};
		SystemTime::now().duration_since(UNIX_EPOCH).map_or(0.0, |elapsed| elapsed.as_secs_f64() * 1000.0)
	}
}

/// A [`FrameHost`] driven by hand, with a fake clock.
///
/// Every [`now`](`Clock::now`) reading advances the clock by [`tick`](`ManualFrameHost::set_tick`) milliseconds,
/// which lets work that polls the clock observe time passing without sleeping.
#[derive(Default)]
pub struct ManualFrameHost {
	time: Cell<f64>,
	tick: Cell<f64>,
	next_handle: Cell<i32>,
	#[allow(clippy::type_complexity)]
	pending: RefCell<Vec<(FrameHandle, Box<dyn FnOnce(f64)>)>>,
}
impl ManualFrameHost {
	#[must_use]
	pub fn new() -> Self {
		Self::default()
	}

	pub fn set_tick(&self, tick: f64) {
		self.tick.set(tick)
	}

	pub fn advance(&self, ms: f64) {
		self.time.set(self.time.get() + ms)
	}

	/// The current time, without advancing it.
	#[must_use]
	pub fn peek(&self) -> f64 {
		self.time.get()
	}

	#[must_use]
	pub fn pending_frames(&self) -> usize {
		self.pending.borrow().len()
	}

	/// Runs every callback requested so far (but not those they request in turn).
	/// Returns how many ran.
	pub fn run_frame(&self) -> usize {
		let callbacks = self.pending.take();
		let count = callbacks.len();
		let timestamp = self.time.get();
		for (_, callback) in callbacks {
			callback(timestamp);
		}
		count
	}

	/// Advances by `frame_ms` and runs a frame until nothing is pending or `max_frames` frames have run.
	/// Returns the number of frames that ran.
	pub fn run_until_idle(&self, frame_ms: f64, max_frames: usize) -> usize {
		let mut frames = 0;
		while frames < max_frames && self.pending_frames() > 0 {
			self.advance(frame_ms);
			self.run_frame();
			frames += 1;
		}
		frames
	}
}
impl Clock for ManualFrameHost {
	fn now(&self) -> f64 {
		let now = self.time.get();
		self.time.set(now + self.tick.get());
		now
	}
}
impl FrameHost for ManualFrameHost {
	fn request_frame(&self, callback: Box<dyn FnOnce(f64)>) -> FrameHandle {
		let handle = FrameHandle(self.next_handle.get());
		self.next_handle.set(handle.0.wrapping_add(1));
		self.pending.borrow_mut().push((handle, callback));
		handle
	}

	fn cancel_frame(&self, handle: FrameHandle) {
		self.pending.borrow_mut().retain(|(pending, _)| *pending != handle)
	}
}
