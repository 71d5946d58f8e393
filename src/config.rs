use crate::{scheduler::{Priority, SchedulerConfig}, store::StoreOptions};
use serde::{Deserialize, Serialize};

/// How a single [`RenderEngine::render`](`crate::engine::RenderEngine::render`) call is carried out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderOptions {
	/// Diff and patch synchronously instead of queueing a scheduler task.
	pub immediate: bool,
	pub priority: Priority,
}
impl RenderOptions {
	#[must_use]
	pub fn immediate() -> Self {
		Self {
			immediate: true,
			..Self::default()
		}
	}

	#[must_use]
	pub fn with_priority(priority: impl Into<Priority>) -> Self {
		Self {
			immediate: false,
			priority: priority.into(),
		}
	}
}

/// All runtime settings, with every field optional in JSON.
///
/// ```
/// let config = repovista::config::EngineConfig::from_json(r#"{ "store": { "max_history": 10 } }"#).unwrap();
/// assert_eq!(config.store.max_history, 10);
/// assert_eq!(config.scheduler.frame_budget_ms, 16.0);
/// ```
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
	pub store: StoreOptions,
	pub scheduler: SchedulerConfig,
	pub render: RenderOptions,
}
impl EngineConfig {
	pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
		serde_json::from_str(json)
	}
}
