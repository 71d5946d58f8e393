//! Browser backends on top of [`web_sys`].
//!
//! Everything here compiles on all targets but only works inside a browser main thread.

use crate::{
	app::AppState,
	dom::Dom,
	error::{DomError, StoreError},
	host::{Clock, FrameHandle, FrameHost},
	persist::SnapshotStorage,
	query::QueryState,
	store::{Filter, Store, Subscription},
	vdom::{Event, EventHandler},
};
use js_sys::{Function, Reflect};
use tracing::{error, trace, warn};
use wasm_bindgen::{closure::Closure, JsCast, JsValue};
use web_sys::{CharacterData, Document, Element, HtmlElement, HtmlInputElement, KeyboardEvent, Node, Performance, UrlSearchParams, Window};

fn describe(value: &JsValue) -> String {
	value.as_string().unwrap_or_else(|| format!("{:?}", value))
}

fn window() -> Result<Window, DomError> {
	web_sys::window().ok_or(DomError::Unavailable("window"))
}

/// Property under which the listener for `event` installed by [`WebDom`] is kept on its element.
fn listener_key(event: &str) -> JsValue {
	JsValue::from_str(&format!("__repovista_on_{}", event))
}

fn convert_event(event: &web_sys::Event) -> Event {
	let mut converted = Event::new(event.type_());
	if let Some(input) = event.target().and_then(|target| target.dyn_into::<HtmlInputElement>().ok()) {
		converted.value = Some(input.value());
	}
	if let Some(keyboard) = event.dyn_ref::<KeyboardEvent>() {
		converted.key = Some(keyboard.key());
	}
	converted
}

/// The live document.
///
/// Each element holds at most one listener per event name installed through [`Dom::bind_event`].
/// Listener closures are handed to the JavaScript garbage collector and live as long as their element references them.
#[derive(Debug, Clone)]
pub struct WebDom {
	document: Document,
}
impl WebDom {
	pub fn new() -> Result<Self, DomError> {
		let document = window()?.document().ok_or(DomError::Unavailable("document"))?;
		Ok(Self { document })
	}

	#[must_use]
	pub fn document(&self) -> &Document {
		&self.document
	}

	#[must_use]
	pub fn body(&self) -> Option<Node> {
		self.document.body().map(Into::into)
	}
}

fn as_element(node: &Node) -> Result<&Element, DomError> {
	node.dyn_ref::<Element>().ok_or(DomError::NotAnElement)
}

impl Dom for WebDom {
	type Node = Node;

	fn create_element(&self, tag: &str) -> Result<Node, DomError> {
		self.document.create_element(tag).map(Into::into).map_err(|error| DomError::CreateElement {
			tag: tag.to_owned(),
			reason: describe(&error),
		})
	}

	fn create_text(&self, content: &str) -> Node {
		self.document.create_text_node(content).into()
	}

	fn child_count(&self, parent: &Node) -> usize {
		parent.child_nodes().length() as usize
	}

	fn child_at(&self, parent: &Node, index: usize) -> Option<Node> {
		parent.child_nodes().item(u32::try_from(index).ok()?)
	}

	fn insert_before(&self, parent: &Node, child: &Node, reference: Option<&Node>) -> Result<(), DomError> {
		parent.insert_before(child, reference).map(drop).map_err(|error| DomError::Mutation(describe(&error)))
	}

	fn remove_child(&self, parent: &Node, child: &Node) -> Result<(), DomError> {
		parent.remove_child(child).map(drop).map_err(|error| DomError::Mutation(describe(&error)))
	}

	fn replace_child(&self, parent: &Node, new_child: &Node, old_child: &Node) -> Result<(), DomError> {
		parent.replace_child(new_child, old_child).map(drop).map_err(|error| DomError::Mutation(describe(&error)))
	}

	fn set_text(&self, node: &Node, content: &str) {
		match node.dyn_ref::<CharacterData>() {
			Some(character_data) => character_data.set_data(content),
			None => node.set_text_content(Some(content)),
		}
	}

	fn set_attribute(&self, element: &Node, name: &str, value: &str) -> Result<(), DomError> {
		as_element(element)?.set_attribute(name, value).map_err(|error| DomError::Attribute {
			name: name.to_owned(),
			reason: describe(&error),
		})
	}

	fn remove_attribute(&self, element: &Node, name: &str) -> Result<(), DomError> {
		as_element(element)?.remove_attribute(name).map_err(|error| DomError::Attribute {
			name: name.to_owned(),
			reason: describe(&error),
		})
	}

	fn set_style(&self, element: &Node, property: &str, value: &str) -> Result<(), DomError> {
		let html_element = element.dyn_ref::<HtmlElement>().ok_or(DomError::NotAnElement)?;
		html_element.style().set_property(property, value).map_err(|error| DomError::Attribute {
			name: format!("style.{}", property),
			reason: describe(&error),
		})
	}

	fn remove_style(&self, element: &Node, property: &str) -> Result<(), DomError> {
		let html_element = element.dyn_ref::<HtmlElement>().ok_or(DomError::NotAnElement)?;
		html_element.style().remove_property(property).map(drop).map_err(|error| DomError::Attribute {
			name: format!("style.{}", property),
			reason: describe(&error),
		})
	}

	fn bind_event(&self, element: &Node, event: &str, handler: &EventHandler) -> Result<(), DomError> {
		self.unbind_event(element, event)?;

		let handler = handler.clone();
		let listener = Closure::<dyn Fn(web_sys::Event)>::new(move |event: web_sys::Event| handler.call(&convert_event(&event))).into_js_value();
		let bind_error = |error: JsValue| DomError::Event {
			event: event.to_owned(),
			reason: describe(&error),
		};
		element.add_event_listener_with_callback(event, listener.unchecked_ref()).map_err(bind_error)?;
		Reflect::set(element, &listener_key(event), &listener).map_err(bind_error)?;
		trace!("Bound {:?} listener.", event);
		Ok(())
	}

	fn unbind_event(&self, element: &Node, event: &str) -> Result<(), DomError> {
		let key = listener_key(event);
		let unbind_error = |error: JsValue| DomError::Event {
			event: event.to_owned(),
			reason: describe(&error),
		};
		let listener = Reflect::get(element, &key).map_err(unbind_error)?;
		if let Some(listener) = listener.dyn_ref::<Function>() {
			element.remove_event_listener_with_callback(event, listener).map_err(unbind_error)?;
			Reflect::delete_property(element, &key).map_err(unbind_error)?;
		}
		Ok(())
	}

	fn query_selector(&self, selector: &str) -> Option<Node> {
		match self.document.query_selector(selector) {
			Ok(element) => element.map(Into::into),
			Err(error) => {
				warn!("Invalid selector {:?}: {}", selector, describe(&error));
				None
			}
		}
	}

	fn same_node(&self, a: &Node, b: &Node) -> bool {
		a.is_same_node(Some(b))
	}
}

/// Animation frames and [***performance.now()***](https://developer.mozilla.org/en-US/docs/Web/API/Performance/now) of the current window.
#[derive(Debug, Clone)]
pub struct WebFrameHost {
	window: Window,
	performance: Option<Performance>,
}
impl WebFrameHost {
	pub fn new() -> Result<Self, DomError> {
		let window = window()?;
		let performance = window.performance();
		Ok(Self { window, performance })
	}
}
impl Clock for WebFrameHost {
	fn now(&self) -> f64 {
		self.performance.as_ref().map_or_else(js_sys::Date::now, Performance::now)
	}
}
impl FrameHost for WebFrameHost {
	fn request_frame(&self, callback: Box<dyn FnOnce(f64)>) -> FrameHandle {
		let callback = Closure::once_into_js(move |timestamp: f64| callback(timestamp));
		match self.window.request_animation_frame(callback.unchecked_ref()) {
			Ok(handle) => FrameHandle(handle),
			Err(error) => {
				error!("requestAnimationFrame failed: {}", describe(&error));
				FrameHandle(-1)
			}
		}
	}

	fn cancel_frame(&self, handle: FrameHandle) {
		if let Err(error) = self.window.cancel_animation_frame(handle.0) {
			warn!("cancelAnimationFrame failed: {}", describe(&error));
		}
	}
}

/// [***localStorage***](https://developer.mozilla.org/en-US/docs/Web/API/Window/localStorage) of the current window.
#[derive(Debug, Clone)]
pub struct LocalStorage(web_sys::Storage);
impl LocalStorage {
	pub fn new() -> Result<Self, StoreError> {
		let storage = window()
			.map_err(|error| StoreError::Storage(error.to_string()))?
			.local_storage()
			.map_err(|error| StoreError::Storage(describe(&error)))?
			.ok_or_else(|| StoreError::Storage("localStorage is unavailable".to_owned()))?;
		Ok(Self(storage))
	}
}
impl SnapshotStorage for LocalStorage {
	fn save(&self, key: &str, json: &str) -> Result<(), StoreError> {
		self.0.set_item(key, json).map_err(|error| StoreError::Storage(describe(&error)))
	}

	fn load(&self, key: &str) -> Result<Option<String>, StoreError> {
		self.0.get_item(key).map_err(|error| StoreError::Storage(describe(&error)))
	}

	fn remove(&self, key: &str) -> Result<(), StoreError> {
		self.0.remove_item(key).map_err(|error| StoreError::Storage(describe(&error)))
	}
}

const QUERY_KEYS: [&str; 4] = ["search", "sort", "page", "limit"];

/// Reads `search`, `sort`, `page` and `limit` from the current location.
pub fn read_query() -> Result<QueryState, DomError> {
	let search = window()?.location().search().map_err(|error| DomError::Mutation(describe(&error)))?;
	let params = UrlSearchParams::new_with_str(&search).map_err(|error| DomError::Mutation(describe(&error)))?;
	Ok(QueryState::from_pairs(QUERY_KEYS.iter().filter_map(|&key| params.get(key).map(|value| (key, value)))))
}

/// Replaces the current history entry's query string with `query`, keeping path and fragment.
pub fn write_query(query: &QueryState) -> Result<(), DomError> {
	let window = window()?;
	let location = window.location();
	let params = UrlSearchParams::new().map_err(|error| DomError::Mutation(describe(&error)))?;
	for (key, value) in query.to_pairs() {
		params.append(key, &value);
	}
	let query_string = String::from(params.to_string());

	let path = location.pathname().map_err(|error| DomError::Mutation(describe(&error)))?;
	let hash = location.hash().map_err(|error| DomError::Mutation(describe(&error)))?;
	let url = if query_string.is_empty() {
		format!("{}{}", path, hash)
	} else {
		format!("{}?{}{}", path, query_string, hash)
	};
	window
		.history()
		.and_then(|history| history.replace_state_with_url(&JsValue::NULL, "", Some(&url)))
		.map_err(|error| DomError::Mutation(describe(&error)))
}

/// Keeps the location's query string in step with `store`.
pub fn sync_location(store: &Store<AppState>) -> Subscription {
	store.subscribe(
		Filter::predicate(|previous: &AppState, current: &AppState| QueryState::from_state(previous) != QueryState::from_state(current)),
		|change| {
			if let Err(error) = write_query(&QueryState::from_state(change.current)) {
				warn!("Could not update the location: {}", error);
			}
		},
	)
}
