use repovista::{
	diff::{diff, diff_props},
	patch::{Move, Patch, PatchKind, PropChange},
	vdom::{h, EventHandler, VNode},
};

fn keyed_list(keys: &[&str]) -> VNode {
	h("ul").children(keys.iter().map(|&key| h("li").key(key).child(key))).into()
}

fn kinds(patches: &[Patch]) -> Vec<&'static str> {
	patches.iter().map(|patch| patch.kind.name()).collect()
}

#[test]
fn identical_reference_yields_nothing() {
	let tree = keyed_list(&["a", "b"]);
	assert!(diff(Some(&tree), Some(&tree)).is_empty());
}

#[test]
fn equal_trees_yield_nothing() {
	assert!(diff(Some(&keyed_list(&["a", "b"])), Some(&keyed_list(&["a", "b"]))).is_empty());
}

#[test]
fn missing_old_creates_root() {
	let new = keyed_list(&["a"]);
	let patches = diff(None, Some(&new));
	assert_eq!(patches, vec![Patch { path: vec![], kind: PatchKind::Create { node: new } }]);
}

#[test]
fn missing_new_removes_root() {
	let patches = diff(Some(&keyed_list(&["a"])), None);
	assert_eq!(patches, vec![Patch { path: vec![], kind: PatchKind::Remove }]);
}

#[test]
fn text_change() {
	let old: VNode = h("p").child("before").into();
	let new: VNode = h("p").child("after").into();
	assert_eq!(
		diff(Some(&old), Some(&new)),
		vec![Patch {
			path: vec![0],
			kind: PatchKind::Text { content: "after".to_owned() }
		}]
	);
}

#[test]
fn unkeyed_type_change_replaces() {
	let old: VNode = h("section").child(h("div")).into();
	let new: VNode = h("section").child(h("span")).into();
	let patches = diff(Some(&old), Some(&new));
	assert_eq!(patches.len(), 1);
	assert_eq!(patches[0].path, vec![0]);
	assert!(matches!(&patches[0].kind, PatchKind::Replace { node: VNode::Element(element) } if element.tag == "span"));
}

#[test]
fn type_change_replaces_even_similar_subtrees() {
	let old: VNode = h("div").child(h("p").child("same")).into();
	let new: VNode = h("section").child(h("p").child("same")).into();
	assert_eq!(kinds(&diff(Some(&old), Some(&new))), ["REPLACE"]);
}

#[test]
fn keyed_rotation_is_a_single_reorder() {
	let patches = diff(Some(&keyed_list(&["A", "B", "C"])), Some(&keyed_list(&["C", "A", "B"])));
	assert_eq!(kinds(&patches), ["REORDER"]);

	let PatchKind::Reorder { moves } = &patches[0].kind else {
		unreachable!()
	};
	assert_eq!(patches[0].path, Vec::<usize>::new());
	assert_eq!(
		moves,
		&vec![
			Move { key: Some("C".into()), from: 2, to: 0 },
			Move { key: Some("A".into()), from: 0, to: 1 },
			Move { key: Some("B".into()), from: 1, to: 2 },
		]
	);
}

#[test]
fn keyed_removal_and_insertion() {
	let patches = diff(Some(&keyed_list(&["a", "b", "c"])), Some(&keyed_list(&["a", "c", "d"])));
	assert_eq!(kinds(&patches), ["REMOVE", "CREATE"]);
	assert_eq!(patches[0].path, vec![1]);
	assert_eq!(patches[1].path, vec![2]);
}

#[test]
fn removal_alone_needs_no_reorder() {
	// Positions among retained siblings don't change.
	let patches = diff(Some(&keyed_list(&["a", "b", "c"])), Some(&keyed_list(&["b", "c"])));
	assert_eq!(kinds(&patches), ["REMOVE"]);
	assert_eq!(patches[0].path, vec![0]);
}

#[test]
fn keyed_children_are_diffed_against_their_match() {
	let old: VNode = h("ul").child(h("li").key("x").child("one")).child(h("li").key("y").child("two")).into();
	let new: VNode = h("ul").child(h("li").key("y").child("TWO")).child(h("li").key("x").child("one")).into();
	let patches = diff(Some(&old), Some(&new));
	assert_eq!(kinds(&patches), ["REORDER", "TEXT"]);
	assert_eq!(patches[1].path, vec![0, 0]);
}

#[test]
fn duplicate_keys_fall_back_to_positional() {
	let old = keyed_list(&["a", "a"]);
	let new = keyed_list(&["b", "a"]);
	let patches = diff(Some(&old), Some(&new));
	assert_eq!(kinds(&patches), ["TEXT"]);
	assert_eq!(patches[0].path, vec![0, 0]);
}

#[test]
fn unkeyed_siblings_of_keyed_children_keep_their_position() {
	let old: VNode = h("div").child(h("h1").child("title")).child(h("p").key("k")).into();
	let new: VNode = h("div").child(h("h1").child("renamed")).child(h("p").key("k")).into();
	let patches = diff(Some(&old), Some(&new));
	assert_eq!(kinds(&patches), ["TEXT"]);
	assert_eq!(patches[0].path, vec![0, 0]);
}

#[test]
fn props_delta() {
	let handler = EventHandler::new(|_| ());
	let old = h("a").attr("href", "/old").attr("title", "t").style("color", "red").on_handler("click", handler.clone());
	let new = h("a").attr("href", "/new").style("font-weight", "bold").on_handler("click", handler);

	let changes = diff_props(&old.props, &new.props);
	assert_eq!(
		changes,
		vec![
			PropChange::RemoveAttribute { name: "title".to_owned() },
			PropChange::SetAttribute {
				name: "href".to_owned(),
				value: "/new".to_owned()
			},
			PropChange::RemoveStyle { property: "color".to_owned() },
			PropChange::SetStyle {
				property: "font-weight".to_owned(),
				value: "bold".to_owned()
			},
		]
	);
}

#[test]
fn fresh_closures_rebind() {
	let old = h("button").on("click", |_| ());
	let new = h("button").on("click", |_| ());
	assert!(matches!(&diff_props(&old.props, &new.props)[..], [PropChange::BindEvent { name, .. }] if name == "click"));
}
