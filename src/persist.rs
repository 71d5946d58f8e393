//! Where committed snapshots go besides the store itself.

use crate::error::StoreError;
use core::cell::RefCell;
use hashbrown::HashMap;
use serde_json::Value;
use std::rc::Rc;
use tracing::debug;

/// Key-value storage for serialized snapshots, like [***localStorage***](https://developer.mozilla.org/en-US/docs/Web/API/Window/localStorage).
pub trait SnapshotStorage {
	fn save(&self, key: &str, json: &str) -> Result<(), StoreError>;
	fn load(&self, key: &str) -> Result<Option<String>, StoreError>;
	fn remove(&self, key: &str) -> Result<(), StoreError>;
}

impl<T: SnapshotStorage + ?Sized> SnapshotStorage for Rc<T> {
	fn save(&self, key: &str, json: &str) -> Result<(), StoreError> {
		(**self).save(key, json)
	}

	fn load(&self, key: &str) -> Result<Option<String>, StoreError> {
		(**self).load(key)
	}

	fn remove(&self, key: &str) -> Result<(), StoreError> {
		(**self).remove(key)
	}
}

#[derive(Debug, Default)]
pub struct MemoryStorage(RefCell<HashMap<String, String>>);
impl MemoryStorage {
	#[must_use]
	pub fn new() -> Self {
		Self::default()
	}
}
impl SnapshotStorage for MemoryStorage {
	fn save(&self, key: &str, json: &str) -> Result<(), StoreError> {
		self.0.borrow_mut().insert(key.to_owned(), json.to_owned());
		Ok(())
	}

	fn load(&self, key: &str) -> Result<Option<String>, StoreError> {
		Ok(self.0.borrow().get(key).cloned())
	}

	fn remove(&self, key: &str) -> Result<(), StoreError> {
		self.0.borrow_mut().remove(key);
		Ok(())
	}
}

/// Receives every committed action with its resulting state, for development tooling.
pub trait Inspector {
	fn on_commit(&self, action: &str, state: &Value);
}

/// Forwards commits to `tracing` under the `repovista::inspector` target.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingInspector;
impl Inspector for TracingInspector {
	fn on_commit(&self, action: &str, state: &Value) {
		if cfg!(feature = "dangerous-logging") {
			debug!(target: "repovista::inspector", action, %state);
		} else {
			debug!(target: "repovista::inspector", action);
		}
	}
}
