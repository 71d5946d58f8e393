#![cfg(target_arch = "wasm32")]

use repovista::{
	config::RenderOptions,
	engine::{RenderEngine, RenderOutcome, Target},
	host::ManualFrameHost,
	query::QueryState,
	scheduler::{Scheduler, SchedulerConfig},
	vdom::{h, VNode},
	web::{read_query, write_query, WebDom},
};
use std::{
	cell::Cell,
	rc::Rc,
	sync::Once,
};
use wasm_bindgen::JsCast;
use wasm_bindgen_test::{wasm_bindgen_test, wasm_bindgen_test_configure};
use web_sys::{HtmlElement, Node};

wasm_bindgen_test_configure!(run_in_browser);

static LOG_INIT: Once = Once::new();

fn engine(id: &str) -> (RenderEngine<WebDom, ManualFrameHost>, Node) {
	LOG_INIT.call_once(tracing_wasm::set_as_global_default);

	let dom = WebDom::new().unwrap();
	let container = dom.document().create_element("div").unwrap();
	container.set_id(id);
	dom.document().body().unwrap().append_child(&container).unwrap();

	let scheduler = Scheduler::new(Rc::new(ManualFrameHost::new()), SchedulerConfig::default());
	(RenderEngine::new(dom, scheduler), container.into())
}

fn inner_html(node: &Node) -> String {
	node.dyn_ref::<HtmlElement>().unwrap().inner_html()
}

fn list(keys: &[&str]) -> VNode {
	h("ul").children(keys.iter().map(|&key| h("li").key(key).class("row").child(key))).into()
}

#[wasm_bindgen_test]
fn keyed_list_transitions() {
	let (engine, container) = engine("keyed");

	assert_eq!(engine.render(Target::Selector("#keyed"), list(&["a", "b", "c"]), RenderOptions::immediate()).unwrap(), RenderOutcome::Mounted);
	let first_li = container.first_child().unwrap().first_child().unwrap();

	let outcome = engine.render(Target::Node(&container), list(&["c", "a", "d"]), RenderOptions::immediate()).unwrap();
	assert!(matches!(outcome, RenderOutcome::Patched(report) if report.is_clean()));
	assert_eq!(
		inner_html(&container),
		r#"<ul><li class="row">c</li><li class="row">a</li><li class="row">d</li></ul>"#
	);

	let ul = container.first_child().unwrap();
	assert!(ul.child_nodes().item(1).unwrap().is_same_node(Some(&first_li)), "The `a` row was moved, not recreated.");
}

#[wasm_bindgen_test]
fn styles_and_attributes() {
	let (engine, container) = engine("props");

	engine
		.render(Target::Node(&container), h("p").attr("title", "old").style("color", "red").child("x").into(), RenderOptions::immediate())
		.unwrap();
	engine
		.render(Target::Node(&container), h("p").style("font-weight", "bold").child("x").into(), RenderOptions::immediate())
		.unwrap();

	let p: HtmlElement = container.first_child().unwrap().dyn_into().unwrap();
	assert_eq!(p.get_attribute("title"), None);
	assert_eq!(p.style().get_property_value("color").unwrap(), "");
	assert_eq!(p.style().get_property_value("font-weight").unwrap(), "bold");
}

#[wasm_bindgen_test]
fn click_handlers_are_bound_and_unbound() {
	let (engine, container) = engine("events");
	let clicks = Rc::new(Cell::new(0));

	let with_handler: VNode = h("button")
		.attr("id", "counter")
		.on("click", {
			let clicks = Rc::clone(&clicks);
			move |event| {
				assert_eq!(event.name, "click");
				clicks.set(clicks.get() + 1)
			}
		})
		.child("+1")
		.into();
	engine.render(Target::Node(&container), with_handler, RenderOptions::immediate()).unwrap();

	let button: HtmlElement = container.first_child().unwrap().dyn_into().unwrap();
	button.click();
	assert_eq!(clicks.get(), 1);

	engine
		.render(Target::Node(&container), h("button").attr("id", "counter").child("+1").into(), RenderOptions::immediate())
		.unwrap();
	button.click();
	assert_eq!(clicks.get(), 1);

	assert!(engine.unmount(Target::Node(&container)).unwrap());
	assert_eq!(inner_html(&container), "");
}

#[wasm_bindgen_test]
fn location_query_round_trip() {
	let query = QueryState::from_pairs([("search", "nginx proxy"), ("sort", "size:desc"), ("page", "2")]);
	write_query(&query).unwrap();
	assert_eq!(read_query().unwrap(), query);

	write_query(&QueryState::default()).unwrap();
	assert_eq!(web_sys::window().unwrap().location().search().unwrap(), "");
}
