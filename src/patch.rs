//! Defines the edit records produced by [`diff`](`crate::diff::diff`) and consumed by [`apply`](`crate::apply::apply`).

use crate::vdom::{EventHandler, Key, VNode};

/// Child indices leading from the render root to a node.
///
/// [`PatchKind::Remove`] paths address the old tree. All other paths address the new tree,
/// which is what the live DOM looks like once removals, reorders and creations above them have been applied.
pub type Path = Vec<usize>;

#[derive(Debug, Clone, PartialEq)]
pub struct Patch {
	pub path: Path,
	pub kind: PatchKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PatchKind {
	/// Insert `node` so that it ends up at the last index of `path`.
	Create { node: VNode },
	/// Remove the node at `path`.
	Remove,
	/// Swap the node at `path` for a freshly built `node`.
	Replace { node: VNode },
	/// Update the text node at `path`.
	Text { content: String },
	/// Update the element's properties.
	Props { changes: Vec<PropChange> },
	/// Rearrange the retained children of the element at `path`.
	Reorder { moves: Vec<Move> },
}
impl PatchKind {
	#[must_use]
	pub fn name(&self) -> &'static str {
		match self {
			Self::Create { .. } => "CREATE",
			Self::Remove => "REMOVE",
			Self::Replace { .. } => "REPLACE",
			Self::Text { .. } => "TEXT",
			Self::Props { .. } => "PROPS",
			Self::Reorder { .. } => "REORDER",
		}
	}
}

/// One property delta, by kind.
#[derive(Debug, Clone, PartialEq)]
pub enum PropChange {
	SetAttribute { name: String, value: String },
	RemoveAttribute { name: String },
	/// Replaces any listener previously bound for `name`.
	BindEvent { name: String, handler: EventHandler },
	UnbindEvent { name: String },
	SetStyle { property: String, value: String },
	RemoveStyle { property: String },
}

/// A keyed child that changed position.
///
/// `from` and `to` count only the siblings that exist in both the old and the new list,
/// so they coincide with plain child indices whenever nothing was added or removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Move {
	pub key: Option<Key>,
	pub from: usize,
	pub to: usize,
}
