use thiserror::Error;

/// Why a [`Store`](`crate::store::Store`) operation could not produce a new snapshot.
#[derive(Debug, Error)]
pub enum StoreError {
	/// The state could not be converted to or from its JSON form.
	///
	/// Raised by merge updates whose result doesn't fit the state type, and by [`Store::restore`](`crate::store::Store::restore`).
	#[error("state (de)serialization failed: {0}")]
	Serde(#[from] serde_json::Error),

	/// A merge update must be a JSON object.
	#[error("merge updates must be JSON objects, found {found}")]
	MergeNotAnObject { found: &'static str },

	#[error("snapshot storage failed: {0}")]
	Storage(String),
}

/// Failure reported by a [`Dom`](`crate::dom::Dom`) backend.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomError {
	#[error("could not create <{tag}>: {reason}")]
	CreateElement { tag: String, reason: String },

	#[error("could not set attribute {name:?}: {reason}")]
	Attribute { name: String, reason: String },

	#[error("could not bind {event:?} listener: {reason}")]
	Event { event: String, reason: String },

	#[error("tree mutation failed: {0}")]
	Mutation(String),

	#[error("node is not an element")]
	NotAnElement,

	#[error("{0} is unavailable")]
	Unavailable(&'static str),
}

/// Why a render target could not be resolved.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MountError {
	#[error("no element matches selector {0:?}")]
	SelectorNotFound(String),

	#[error(transparent)]
	Dom(#[from] DomError),
}

/// A failed registry request, carrying the HTTP status the backend answered with.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("registry request failed with status {status}: {message}")]
pub struct ApiError {
	pub status: u16,
	pub message: String,
}
impl ApiError {
	#[must_use]
	pub fn new(status: u16, message: impl Into<String>) -> Self {
		Self {
			status,
			message: message.into(),
		}
	}

	#[must_use]
	pub fn not_found(what: &str) -> Self {
		Self::new(404, format!("{} not found", what))
	}
}

/// Why a registry-backed store action failed.
#[derive(Debug, Error)]
pub enum ActionError {
	#[error(transparent)]
	Api(#[from] ApiError),

	#[error(transparent)]
	Store(#[from] StoreError),
}
