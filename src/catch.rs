use core::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use tracing::error;

/// Runs `f`, logging instead of propagating a panic. Returns whether `f` completed.
///
/// Panics can only be caught where they unwind. Under `panic = "abort"` (the `wasm32` default) they still abort.
pub(crate) fn run_guarded(what: &str, f: impl FnOnce()) -> bool {
	match catch_unwind(AssertUnwindSafe(f)) {
		Ok(()) => true,
		Err(payload) => {
			error!("{} panicked: {}", what, panic_message(payload.as_ref()));
			false
		}
	}
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
	if let Some(message) = payload.downcast_ref::<&str>() {
		message
	} else if let Some(message) = payload.downcast_ref::<String>() {
		message
	} else {
		"(non-string panic payload)"
	}
}
