//! The narrow DOM surface the engine mutates.
//!
//! [`WebDom`](`crate::web::WebDom`) implements it on top of [`web_sys`], [`MemoryDom`](`crate::memory::MemoryDom`) in plain memory.

use crate::{error::DomError, vdom::EventHandler};

/// A tree of element and text nodes that patches can be applied to.
///
/// Child indices always refer to the live [***childNodes***](https://developer.mozilla.org/en-US/docs/Web/API/Node/childNodes) at the time of the call.
pub trait Dom {
	type Node: Clone + 'static;

	fn create_element(&self, tag: &str) -> Result<Self::Node, DomError>;
	fn create_text(&self, content: &str) -> Self::Node;

	fn child_count(&self, parent: &Self::Node) -> usize;
	fn child_at(&self, parent: &Self::Node, index: usize) -> Option<Self::Node>;

	/// Inserts `child` before `reference`, or appends it if `reference` is [`None`].
	///
	/// Moves `child` if it is already attached somewhere.
	fn insert_before(&self, parent: &Self::Node, child: &Self::Node, reference: Option<&Self::Node>) -> Result<(), DomError>;
	fn remove_child(&self, parent: &Self::Node, child: &Self::Node) -> Result<(), DomError>;
	fn replace_child(&self, parent: &Self::Node, new_child: &Self::Node, old_child: &Self::Node) -> Result<(), DomError>;

	fn set_text(&self, node: &Self::Node, content: &str);

	fn set_attribute(&self, element: &Self::Node, name: &str, value: &str) -> Result<(), DomError>;
	fn remove_attribute(&self, element: &Self::Node, name: &str) -> Result<(), DomError>;

	fn set_style(&self, element: &Self::Node, property: &str, value: &str) -> Result<(), DomError>;
	fn remove_style(&self, element: &Self::Node, property: &str) -> Result<(), DomError>;

	/// Binds `handler` as the only listener for `event` installed through this trait, replacing any previous one.
	fn bind_event(&self, element: &Self::Node, event: &str, handler: &EventHandler) -> Result<(), DomError>;
	fn unbind_event(&self, element: &Self::Node, event: &str) -> Result<(), DomError>;

	/// Resolves a CSS selector against the document.
	fn query_selector(&self, selector: &str) -> Option<Self::Node>;

	fn same_node(&self, a: &Self::Node, b: &Self::Node) -> bool;

	fn append_child(&self, parent: &Self::Node, child: &Self::Node) -> Result<(), DomError> {
		self.insert_before(parent, child, None)
	}

	fn clear_children(&self, parent: &Self::Node) -> Result<(), DomError> {
		while let Some(child) = self.child_at(parent, 0) {
			self.remove_child(parent, &child)?;
		}
		Ok(())
	}
}
