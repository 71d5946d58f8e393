//! The disposable virtual node tree that view code builds on every render pass.
//!
//! Property kinds are decided when a node is built: [`Element::attr`], [`Element::on`] and [`Element::style`]
//! each fill their own map in [`Props`], so nothing downstream has to inspect property names to tell them apart.

use core::{
	any::{type_name, Any},
	cell::RefCell,
	fmt::{self, Debug, Formatter},
};
use std::{collections::BTreeMap, rc::Rc};

/// Stable sibling identity used for keyed reconciliation.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Key(Rc<str>);
impl Key {
	#[must_use]
	pub fn as_str(&self) -> &str {
		&self.0
	}
}
impl From<&str> for Key {
	fn from(key: &str) -> Self {
		Self(key.into())
	}
}
impl From<String> for Key {
	fn from(key: String) -> Self {
		Self(key.into())
	}
}
impl From<u64> for Key {
	fn from(key: u64) -> Self {
		Self(key.to_string().into())
	}
}
impl From<usize> for Key {
	fn from(key: usize) -> Self {
		Self(key.to_string().into())
	}
}

/// A backend-neutral snapshot of a DOM event, as delivered to an [`EventHandler`].
///
/// The web backend fills [`value`](`Event::value`) from the target's `value` (for inputs)
/// and [`key`](`Event::key`) from [***KeyboardEvent.key***](https://developer.mozilla.org/en-US/docs/Web/API/KeyboardEvent/key).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Event {
	pub name: String,
	pub value: Option<String>,
	pub key: Option<String>,
}
impl Event {
	#[must_use]
	pub fn new(name: impl Into<String>) -> Self {
		Self {
			name: name.into(),
			..Self::default()
		}
	}

	#[must_use]
	pub fn with_value(mut self, value: impl Into<String>) -> Self {
		self.value = Some(value.into());
		self
	}

	#[must_use]
	pub fn with_key(mut self, key: impl Into<String>) -> Self {
		self.key = Some(key.into());
		self
	}
}

/// A shared event callback. Two handlers are equal only if they are the same allocation,
/// so rebuilding a closure on every render rebinds the listener.
#[derive(Clone)]
pub struct EventHandler(Rc<dyn Fn(&Event)>);
impl EventHandler {
	pub fn new(handler: impl Fn(&Event) + 'static) -> Self {
		Self(Rc::new(handler))
	}

	pub fn call(&self, event: &Event) {
		(self.0)(event)
	}
}
impl PartialEq for EventHandler {
	fn eq(&self, other: &Self) -> bool {
		Rc::ptr_eq(&self.0, &other.0)
	}
}
impl Debug for EventHandler {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		write!(f, "EventHandler({:p})", Rc::as_ptr(&self.0).cast::<()>())
	}
}

/// The properties of an [`Element`], split by kind.
///
/// `class` is an ordinary attribute. Children live on the [`Element`] itself.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Props {
	pub attributes: BTreeMap<String, String>,
	pub events: BTreeMap<String, EventHandler>,
	pub style: BTreeMap<String, String>,
}
impl Props {
	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.attributes.is_empty() && self.events.is_empty() && self.style.is_empty()
	}
}

/// Passed to a [`NodeRef`] when the engine attaches or detaches the node it is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DomRef<T> {
	Added(T),
	Removing(T),
}

/// A slot that holds the live node of the element it's attached to, while that element is mounted.
///
/// The stored node is the [`Dom::Node`](`crate::dom::Dom::Node`) of whichever backend rendered it.
#[derive(Clone, Default)]
pub struct NodeRef(Rc<RefCell<Option<Rc<dyn Any>>>>);
impl NodeRef {
	#[must_use]
	pub fn new() -> Self {
		Self::default()
	}

	/// Retrieves a clone of the bound node, if there is one and it has type `N`.
	#[must_use]
	pub fn get<N: Clone + 'static>(&self) -> Option<N> {
		self.0.borrow().as_ref().and_then(|node| node.downcast_ref::<N>().cloned())
	}

	#[must_use]
	pub fn is_bound(&self) -> bool {
		self.0.borrow().is_some()
	}

	pub(crate) fn notify(&self, dom_ref: DomRef<Rc<dyn Any>>) {
		*self.0.borrow_mut() = match dom_ref {
			DomRef::Added(node) => Some(node),
			DomRef::Removing(_) => None,
		}
	}

	/// Sends [`DomRef::Removing`] with the currently bound node, if any.
	pub(crate) fn release(&self) {
		let bound = self.0.borrow().clone();
		if let Some(node) = bound {
			self.notify(DomRef::Removing(node))
		}
	}
}
impl PartialEq for NodeRef {
	fn eq(&self, other: &Self) -> bool {
		Rc::ptr_eq(&self.0, &other.0)
	}
}
impl Debug for NodeRef {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.debug_tuple("NodeRef").field(&self.is_bound()).finish()
	}
}

/// Delivered to [`Component::on_lifecycle`] by the [`RenderEngine`](`crate::engine::RenderEngine`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
	/// The component appeared at its position for the first time.
	Mount,
	/// The component was rendered again at the same position.
	Update,
	/// The component no longer appears at its position.
	Unmount,
}

/// A stateless view function with optional lifecycle hooks.
///
/// A component's props are its own fields. Its identity across renders is its [`name`](`Component::name`)
/// together with its position in the tree, so rebuilding the component value on every pass is expected.
pub trait Component {
	fn render(&self) -> VNode;

	fn on_lifecycle(&self, _event: Lifecycle) {}

	fn name(&self) -> &'static str {
		type_name::<Self>()
	}
}

/// Adapts a plain closure into a [`Component`] without lifecycle hooks.
pub struct FnComponent<F>(pub F);
impl<F: Fn() -> VNode> Component for FnComponent<F> {
	fn render(&self) -> VNode {
		(self.0)()
	}

	fn name(&self) -> &'static str {
		type_name::<F>()
	}
}

#[derive(Clone, Debug, PartialEq)]
pub struct Element {
	pub tag: String,
	pub props: Props,
	pub children: Vec<VNode>,
	pub key: Option<Key>,
	pub node_ref: Option<NodeRef>,
}
impl Element {
	#[must_use]
	pub fn new(tag: impl Into<String>) -> Self {
		Self {
			tag: tag.into(),
			props: Props::default(),
			children: Vec::new(),
			key: None,
			node_ref: None,
		}
	}

	#[must_use]
	pub fn key(mut self, key: impl Into<Key>) -> Self {
		self.key = Some(key.into());
		self
	}

	#[must_use]
	pub fn attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
		self.props.attributes.insert(name.into(), value.into());
		self
	}

	#[must_use]
	pub fn class(self, class: impl Into<String>) -> Self {
		self.attr("class", class)
	}

	/// Binds `handler` to the event `name` (e.g. `"click"`, not `"onClick"`).
	#[must_use]
	pub fn on(mut self, name: impl Into<String>, handler: impl Fn(&Event) + 'static) -> Self {
		self.props.events.insert(name.into(), EventHandler::new(handler));
		self
	}

	/// Like [`Element::on`], but reuses an existing handler so that it compares equal across renders.
	#[must_use]
	pub fn on_handler(mut self, name: impl Into<String>, handler: EventHandler) -> Self {
		self.props.events.insert(name.into(), handler);
		self
	}

	#[must_use]
	pub fn style(mut self, property: impl Into<String>, value: impl Into<String>) -> Self {
		self.props.style.insert(property.into(), value.into());
		self
	}

	#[must_use]
	pub fn child(mut self, child: impl Into<VNode>) -> Self {
		self.children.push(child.into());
		self
	}

	#[must_use]
	pub fn children<I>(mut self, children: I) -> Self
	where
		I: IntoIterator,
		I::Item: Into<VNode>,
	{
		self.children.extend(children.into_iter().map(Into::into));
		self
	}

	#[must_use]
	pub fn node_ref(mut self, node_ref: &NodeRef) -> Self {
		self.node_ref = Some(node_ref.clone());
		self
	}
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Text {
	pub content: String,
}

#[derive(Clone)]
pub struct ComponentNode {
	pub component: Rc<dyn Component>,
	pub key: Option<Key>,
}
impl PartialEq for ComponentNode {
	fn eq(&self, other: &Self) -> bool {
		Rc::ptr_eq(&self.component, &other.component) && self.key == other.key
	}
}
impl Debug for ComponentNode {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.debug_struct("ComponentNode").field("component", &self.component.name()).field("key", &self.key).finish()
	}
}

/// One node of a virtual tree.
///
/// Trees are rebuilt for each render and never mutated afterwards.
#[derive(Clone, Debug, PartialEq)]
pub enum VNode {
	Element(Element),
	Text(Text),
	Component(ComponentNode),
}
impl VNode {
	#[must_use]
	pub fn text(content: impl Into<String>) -> Self {
		Self::Text(Text { content: content.into() })
	}

	pub fn component(component: impl Component + 'static) -> Self {
		Self::Component(ComponentNode {
			component: Rc::new(component),
			key: None,
		})
	}

	pub fn keyed_component(key: impl Into<Key>, component: impl Component + 'static) -> Self {
		Self::Component(ComponentNode {
			component: Rc::new(component),
			key: Some(key.into()),
		})
	}

	#[must_use]
	pub fn key(&self) -> Option<&Key> {
		match self {
			Self::Element(element) => element.key.as_ref(),
			Self::Text(_) => None,
			Self::Component(component) => component.key.as_ref(),
		}
	}

	#[must_use]
	pub fn children(&self) -> &[VNode] {
		match self {
			Self::Element(element) => &element.children,
			Self::Text(_) | Self::Component(_) => &[],
		}
	}

	/// Whether `self` and `other` can be updated in place rather than replaced.
	#[must_use]
	pub fn same_type(&self, other: &Self) -> bool {
		match (self, other) {
			(Self::Element(a), Self::Element(b)) => a.tag == b.tag,
			(Self::Text(_), Self::Text(_)) => true,
			(Self::Component(a), Self::Component(b)) => a.component.name() == b.component.name(),
			_ => false,
		}
	}

	/// Expands every [`VNode::Component`] into the tree it renders, reporting each component and its path to `visit`.
	///
	/// A component's key is carried over to its rendered root unless that root has its own.
	pub fn resolve(&self, visit: &mut dyn FnMut(&[usize], &Rc<dyn Component>)) -> VNode {
		let mut path = Vec::new();
		resolve_at(self, &mut path, visit)
	}

	/// Counts element and text nodes, after component expansion.
	#[must_use]
	pub fn host_len(&self) -> usize {
		match self {
			Self::Element(element) => 1 + element.children.iter().map(Self::host_len).sum::<usize>(),
			Self::Text(_) => 1,
			Self::Component(component) => component.component.render().host_len(),
		}
	}
}

fn resolve_at(node: &VNode, path: &mut Vec<usize>, visit: &mut dyn FnMut(&[usize], &Rc<dyn Component>)) -> VNode {
	match node {
		VNode::Text(_) => node.clone(),
		VNode::Element(element) => {
			let mut children = Vec::with_capacity(element.children.len());
			for (i, child) in element.children.iter().enumerate() {
				path.push(i);
				children.push(resolve_at(child, path, visit));
				path.pop();
			}
			VNode::Element(Element { children, ..element.clone() })
		}
		VNode::Component(ComponentNode { component, key }) => {
			visit(path, component);
			let mut rendered = resolve_at(&component.render(), path, visit);
			if let (Some(key), VNode::Element(element)) = (key, &mut rendered) {
				if element.key.is_none() {
					element.key = Some(key.clone());
				}
			}
			rendered
		}
	}
}

impl From<Element> for VNode {
	fn from(element: Element) -> Self {
		Self::Element(element)
	}
}
impl From<&str> for VNode {
	fn from(text: &str) -> Self {
		Self::text(text)
	}
}
impl From<String> for VNode {
	fn from(text: String) -> Self {
		Self::text(text)
	}
}

/// Shorthand for [`Element::new`].
#[must_use]
pub fn h(tag: impl Into<String>) -> Element {
	Element::new(tag)
}
