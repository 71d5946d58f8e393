//! An in-memory [`Dom`] for hosts without a browser, such as native tests.

use crate::{dom::Dom, error::DomError, vdom::{Event, EventHandler}};
use core::{
	cell::{Cell, RefCell},
	fmt::{self, Debug, Formatter, Write as _},
};
use std::{
	collections::BTreeMap,
	rc::{Rc, Weak},
};
use tracing::trace;

#[derive(Debug)]
enum NodeKind {
	Element {
		tag: String,
		attributes: BTreeMap<String, String>,
		style: BTreeMap<String, String>,
		listeners: BTreeMap<String, EventHandler>,
	},
	Text(String),
}

#[derive(Debug)]
struct NodeData {
	kind: NodeKind,
	parent: Weak<RefCell<NodeData>>,
	children: Vec<MemoryNode>,
}

/// A handle to a node owned by a [`MemoryDom`]. Clones refer to the same node.
#[derive(Clone)]
pub struct MemoryNode(Rc<RefCell<NodeData>>);
impl MemoryNode {
	fn new(kind: NodeKind) -> Self {
		Self(Rc::new(RefCell::new(NodeData {
			kind,
			parent: Weak::new(),
			children: Vec::new(),
		})))
	}

	#[must_use]
	pub fn tag(&self) -> Option<String> {
		match &self.0.borrow().kind {
			NodeKind::Element { tag, .. } => Some(tag.clone()),
			NodeKind::Text(_) => None,
		}
	}

	/// The data of a text node.
	#[must_use]
	pub fn text(&self) -> Option<String> {
		match &self.0.borrow().kind {
			NodeKind::Text(text) => Some(text.clone()),
			NodeKind::Element { .. } => None,
		}
	}

	/// Concatenated text of this node and all its descendants.
	#[must_use]
	pub fn text_content(&self) -> String {
		match &self.0.borrow().kind {
			NodeKind::Text(text) => text.clone(),
			NodeKind::Element { .. } => self.children().iter().map(Self::text_content).collect(),
		}
	}

	#[must_use]
	pub fn attribute(&self, name: &str) -> Option<String> {
		match &self.0.borrow().kind {
			NodeKind::Element { attributes, .. } => attributes.get(name).cloned(),
			NodeKind::Text(_) => None,
		}
	}

	#[must_use]
	pub fn style(&self, property: &str) -> Option<String> {
		match &self.0.borrow().kind {
			NodeKind::Element { style, .. } => style.get(property).cloned(),
			NodeKind::Text(_) => None,
		}
	}

	#[must_use]
	pub fn has_listener(&self, event: &str) -> bool {
		matches!(&self.0.borrow().kind, NodeKind::Element { listeners, .. } if listeners.contains_key(event))
	}

	#[must_use]
	pub fn children(&self) -> Vec<MemoryNode> {
		self.0.borrow().children.clone()
	}

	#[must_use]
	pub fn parent(&self) -> Option<MemoryNode> {
		self.0.borrow().parent.upgrade().map(Self)
	}

	#[must_use]
	pub fn ptr_eq(&self, other: &Self) -> bool {
		Rc::ptr_eq(&self.0, &other.0)
	}

	/// Invokes the listener bound for `event.name`, if any. Returns whether one was found.
	pub fn dispatch(&self, event: &Event) -> bool {
		let handler = match &self.0.borrow().kind {
			NodeKind::Element { listeners, .. } => listeners.get(&event.name).cloned(),
			NodeKind::Text(_) => None,
		};
		match handler {
			Some(handler) => {
				handler.call(event);
				true
			}
			None => false,
		}
	}

	/// Serializes the subtree as HTML. Styles are written as a `style` attribute after the regular attributes.
	#[must_use]
	pub fn to_html(&self) -> String {
		let mut html = String::new();
		self.write_html(&mut html);
		html
	}

	fn write_html(&self, html: &mut String) {
		let data = self.0.borrow();
		match &data.kind {
			NodeKind::Text(text) => html.push_str(&escape(text)),
			NodeKind::Element { tag, attributes, style, .. } => {
				html.push('<');
				html.push_str(tag);
				for (name, value) in attributes {
					let _ = write!(html, " {}=\"{}\"", name, escape(value));
				}
				if !style.is_empty() {
					let style = style.iter().map(|(property, value)| format!("{}: {};", property, value)).collect::<Vec<_>>().join(" ");
					let _ = write!(html, " style=\"{}\"", escape(&style));
				}
				html.push('>');
				for child in &data.children {
					child.write_html(html);
				}
				let _ = write!(html, "</{}>", tag);
			}
		}
	}

	fn index_in(&self, parent: &MemoryNode) -> Option<usize> {
		parent.0.borrow().children.iter().position(|child| child.ptr_eq(self))
	}

	fn detach(&self) {
		if let Some(parent) = self.parent() {
			if let Some(index) = self.index_in(&parent) {
				parent.0.borrow_mut().children.remove(index);
			}
		}
		self.0.borrow_mut().parent = Weak::new();
	}

	fn matches(&self, selector: &str) -> bool {
		if let Some(id) = selector.strip_prefix('#') {
			self.attribute("id").as_deref() == Some(id)
		} else if let Some(class) = selector.strip_prefix('.') {
			self.attribute("class").map_or(false, |classes| classes.split_whitespace().any(|c| c == class))
		} else {
			self.tag().map_or(false, |tag| tag.eq_ignore_ascii_case(selector))
		}
	}

	fn find(&self, selector: &str) -> Option<MemoryNode> {
		if self.matches(selector) {
			return Some(self.clone());
		}
		self.children().iter().find_map(|child| child.find(selector))
	}
}
impl Debug for MemoryNode {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.write_str(&self.to_html())
	}
}

fn escape(text: &str) -> String {
	text.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;").replace('"', "&quot;")
}

/// A document with a `<body>`, kept entirely in memory.
///
/// Selectors support `#id`, `.class` and bare tag names.
#[derive(Debug)]
pub struct MemoryDom {
	body: MemoryNode,
	created: Cell<usize>,
}
impl Default for MemoryDom {
	fn default() -> Self {
		Self::new()
	}
}
impl MemoryDom {
	#[must_use]
	pub fn new() -> Self {
		Self {
			body: MemoryNode::new(NodeKind::Element {
				tag: "body".to_owned(),
				attributes: BTreeMap::new(),
				style: BTreeMap::new(),
				listeners: BTreeMap::new(),
			}),
			created: Cell::new(0),
		}
	}

	#[must_use]
	pub fn body(&self) -> MemoryNode {
		self.body.clone()
	}

	/// How many nodes this document has created so far.
	#[must_use]
	pub fn created_nodes(&self) -> usize {
		self.created.get()
	}

	/// Creates an element and appends it to `<body>`.
	pub fn append_container(&self, id: &str) -> Result<MemoryNode, DomError> {
		let container = self.create_element("div")?;
		self.set_attribute(&container, "id", id)?;
		self.append_child(&self.body, &container)?;
		Ok(container)
	}
}

fn element_data<R>(node: &MemoryNode, f: impl FnOnce(&mut BTreeMap<String, String>, &mut BTreeMap<String, String>, &mut BTreeMap<String, EventHandler>) -> R) -> Result<R, DomError> {
	match &mut node.0.borrow_mut().kind {
		NodeKind::Element { attributes, style, listeners, .. } => Ok(f(attributes, style, listeners)),
		NodeKind::Text(_) => Err(DomError::NotAnElement),
	}
}

impl Dom for MemoryDom {
	type Node = MemoryNode;

	fn create_element(&self, tag: &str) -> Result<MemoryNode, DomError> {
		if tag.is_empty() || tag.contains(|c: char| c.is_whitespace() || c == '<' || c == '>') {
			return Err(DomError::CreateElement {
				tag: tag.to_owned(),
				reason: "invalid tag name".to_owned(),
			});
		}
		self.created.set(self.created.get() + 1);
		Ok(MemoryNode::new(NodeKind::Element {
			tag: tag.to_ascii_lowercase(),
			attributes: BTreeMap::new(),
			style: BTreeMap::new(),
			listeners: BTreeMap::new(),
		}))
	}

	fn create_text(&self, content: &str) -> MemoryNode {
		self.created.set(self.created.get() + 1);
		MemoryNode::new(NodeKind::Text(content.to_owned()))
	}

	fn child_count(&self, parent: &MemoryNode) -> usize {
		parent.0.borrow().children.len()
	}

	fn child_at(&self, parent: &MemoryNode, index: usize) -> Option<MemoryNode> {
		parent.0.borrow().children.get(index).cloned()
	}

	fn insert_before(&self, parent: &MemoryNode, child: &MemoryNode, reference: Option<&MemoryNode>) -> Result<(), DomError> {
		if parent.tag().is_none() {
			return Err(DomError::NotAnElement);
		}
		if reference.map_or(false, |reference| reference.ptr_eq(child)) {
			return Ok(());
		}
		if let Some(reference) = reference {
			if reference.index_in(parent).is_none() {
				return Err(DomError::Mutation("reference node is not a child of the parent".to_owned()));
			}
		}

		child.detach();
		let index = match reference {
			Some(reference) => reference.index_in(parent).unwrap_or_else(|| self.child_count(parent)),
			None => self.child_count(parent),
		};
		parent.0.borrow_mut().children.insert(index, child.clone());
		child.0.borrow_mut().parent = Rc::downgrade(&parent.0);
		trace!("Inserted node at index {}.", index);
		Ok(())
	}

	fn remove_child(&self, parent: &MemoryNode, child: &MemoryNode) -> Result<(), DomError> {
		if child.index_in(parent).is_none() {
			return Err(DomError::Mutation("node to remove is not a child of the parent".to_owned()));
		}
		child.detach();
		Ok(())
	}

	fn replace_child(&self, parent: &MemoryNode, new_child: &MemoryNode, old_child: &MemoryNode) -> Result<(), DomError> {
		self.insert_before(parent, new_child, Some(old_child))?;
		self.remove_child(parent, old_child)
	}

	fn set_text(&self, node: &MemoryNode, content: &str) {
		if let NodeKind::Text(text) = &mut node.0.borrow_mut().kind {
			*text = content.to_owned()
		}
	}

	fn set_attribute(&self, element: &MemoryNode, name: &str, value: &str) -> Result<(), DomError> {
		element_data(element, |attributes, _, _| {
			attributes.insert(name.to_owned(), value.to_owned());
		})
	}

	fn remove_attribute(&self, element: &MemoryNode, name: &str) -> Result<(), DomError> {
		element_data(element, |attributes, _, _| {
			attributes.remove(name);
		})
	}

	fn set_style(&self, element: &MemoryNode, property: &str, value: &str) -> Result<(), DomError> {
		element_data(element, |_, style, _| {
			style.insert(property.to_owned(), value.to_owned());
		})
	}

	fn remove_style(&self, element: &MemoryNode, property: &str) -> Result<(), DomError> {
		element_data(element, |_, style, _| {
			style.remove(property);
		})
	}

	fn bind_event(&self, element: &MemoryNode, event: &str, handler: &EventHandler) -> Result<(), DomError> {
		element_data(element, |_, _, listeners| {
			listeners.insert(event.to_owned(), handler.clone());
		})
	}

	fn unbind_event(&self, element: &MemoryNode, event: &str) -> Result<(), DomError> {
		element_data(element, |_, _, listeners| {
			listeners.remove(event);
		})
	}

	fn query_selector(&self, selector: &str) -> Option<MemoryNode> {
		self.body.find(selector.trim())
	}

	fn same_node(&self, a: &MemoryNode, b: &MemoryNode) -> bool {
		a.ptr_eq(b)
	}
}
