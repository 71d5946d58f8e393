//! Computes the edits that turn one virtual tree into another.
//!
//! Diffing is pure: it never looks at the live DOM. The order in which edits must be applied
//! is decided later by [`apply`](`crate::apply`).

use crate::{
	patch::{Move, Patch, PatchKind, Path, PropChange},
	vdom::{Element, Key, Props, VNode},
};
use core::ptr;
use hashbrown::HashMap;
use tracing::{debug, instrument, trace, trace_span, warn};

/// Diffs `old` against `new`, returning the patches in discovery order.
///
/// Paths are relative to the root node, so a change to the root's first child is reported at `[0]`.
/// A missing `old` yields a single [`PatchKind::Create`] at the root, a missing `new` a single [`PatchKind::Remove`].
#[must_use]
#[instrument(skip(old, new))]
pub fn diff(old: Option<&VNode>, new: Option<&VNode>) -> Vec<Patch> {
	let mut patches = Vec::new();
	diff_node(old, new, &mut Vec::new(), &mut Vec::new(), &mut patches);
	debug!("Diff produced {} patch(es).", patches.len());
	patches
}

/// `old_path` locates `old` in the old tree (used for removals), `new_path` locates `new` in the new one.
fn diff_node(old: Option<&VNode>, new: Option<&VNode>, old_path: &mut Path, new_path: &mut Path, patches: &mut Vec<Patch>) {
	let (old, new) = match (old, new) {
		(None, None) => return,
		(None, Some(new)) => {
			return patches.push(Patch {
				path: new_path.clone(),
				kind: PatchKind::Create { node: new.clone() },
			})
		}
		(Some(_), None) => {
			return patches.push(Patch {
				path: old_path.clone(),
				kind: PatchKind::Remove,
			})
		}
		(Some(old), Some(new)) => (old, new),
	};

	if ptr::eq(old, new) {
		return trace!("Identical node references. Skipping.");
	}

	match (old, new) {
		(VNode::Text(t_1), VNode::Text(t_2)) => {
			if t_1.content != t_2.content {
				patches.push(Patch {
					path: new_path.clone(),
					kind: PatchKind::Text { content: t_2.content.clone() },
				})
			}
		}

		(VNode::Element(e_1), VNode::Element(e_2)) if e_1.tag == e_2.tag => {
			let span = trace_span!("Diffing element", tag = %e_2.tag);
			let _enter = span.enter();
			diff_element(e_1, e_2, old_path, new_path, patches)
		}

		(VNode::Component(c_1), VNode::Component(c_2)) if old.same_type(new) => {
			let span = trace_span!("Diffing component", name = c_2.component.name());
			let _enter = span.enter();
			let (r_1, r_2) = (c_1.component.render(), c_2.component.render());
			diff_node(Some(&r_1), Some(&r_2), old_path, new_path, patches)
		}

		// Mismatching nodes: Rebuild.
		(_, new) => patches.push(Patch {
			path: new_path.clone(),
			kind: PatchKind::Replace { node: new.clone() },
		}),
	}
}

fn diff_element(e_1: &Element, e_2: &Element, old_path: &mut Path, new_path: &mut Path, patches: &mut Vec<Patch>) {
	let changes = diff_props(&e_1.props, &e_2.props);
	if !changes.is_empty() {
		patches.push(Patch {
			path: new_path.clone(),
			kind: PatchKind::Props { changes },
		})
	}

	let (c_1, c_2) = (&e_1.children, &e_2.children);
	if c_1.is_empty() && c_2.is_empty() {
		return;
	}

	if c_1.iter().chain(c_2).any(|child| child.key().is_some()) {
		match (slot_map(c_1), slot_map(c_2)) {
			(Some(s_1), Some(s_2)) => return diff_keyed_children(c_1, c_2, &s_1, &s_2, old_path, new_path, patches),
			_ => warn!("Duplicate key among <{}> children. Falling back to positional diffing.", e_2.tag),
		}
	}

	diff_positional_children(c_1, c_2, old_path, new_path, patches)
}

fn diff_positional_children(c_1: &[VNode], c_2: &[VNode], old_path: &mut Path, new_path: &mut Path, patches: &mut Vec<Patch>) {
	for i in 0..c_1.len().max(c_2.len()) {
		old_path.push(i);
		new_path.push(i);
		diff_node(c_1.get(i), c_2.get(i), old_path, new_path, patches);
		old_path.pop();
		new_path.pop();
	}
}

/// Sibling identity in keyed mode. Unkeyed children among keyed ones keep their position as identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Slot<'a> {
	Key(&'a Key),
	Position(usize),
}

fn slot_of(child: &VNode, index: usize) -> Slot<'_> {
	child.key().map_or(Slot::Position(index), Slot::Key)
}

/// [`None`] if a key occurs more than once.
fn slot_map(children: &[VNode]) -> Option<HashMap<Slot<'_>, usize>> {
	let mut map = HashMap::with_capacity(children.len());
	for (i, child) in children.iter().enumerate() {
		if map.insert(slot_of(child, i), i).is_some() {
			return None;
		}
	}
	Some(map)
}

#[allow(clippy::too_many_arguments)]
fn diff_keyed_children(
	c_1: &[VNode],
	c_2: &[VNode],
	s_1: &HashMap<Slot<'_>, usize>,
	s_2: &HashMap<Slot<'_>, usize>,
	old_path: &mut Path,
	new_path: &mut Path,
	patches: &mut Vec<Patch>,
) {
	let span = trace_span!("Diffing keyed children", "c_1.len()" = c_1.len(), "c_2.len()" = c_2.len());
	let _enter = span.enter();

	// Removals, addressed in the old tree:
	let mut retained = HashMap::with_capacity(c_1.len());
	for (i_1, child) in c_1.iter().enumerate() {
		let slot = slot_of(child, i_1);
		if s_2.contains_key(&slot) {
			let compact = retained.len();
			retained.insert(slot, compact);
		} else {
			old_path.push(i_1);
			patches.push(Patch {
				path: old_path.clone(),
				kind: PatchKind::Remove,
			});
			old_path.pop();
		}
	}

	// Moves among the retained children:
	let mut moves = Vec::new();
	let mut rank = 0;
	for (i_2, child) in c_2.iter().enumerate() {
		let slot = slot_of(child, i_2);
		if let Some(&from) = retained.get(&slot) {
			if from != rank {
				moves.push(Move {
					key: child.key().cloned(),
					from,
					to: rank,
				})
			}
			rank += 1;
		}
	}
	if !moves.is_empty() {
		trace!("{} keyed child(ren) moved.", moves.len());
		patches.push(Patch {
			path: new_path.clone(),
			kind: PatchKind::Reorder { moves },
		})
	}

	// Updates and creations, addressed in the new tree:
	for (i_2, child) in c_2.iter().enumerate() {
		new_path.push(i_2);
		match s_1.get(&slot_of(child, i_2)) {
			Some(&i_1) => {
				old_path.push(i_1);
				diff_node(Some(&c_1[i_1]), Some(child), old_path, new_path, patches);
				old_path.pop();
			}
			None => patches.push(Patch {
				path: new_path.clone(),
				kind: PatchKind::Create { node: child.clone() },
			}),
		}
		new_path.pop();
	}
}

/// Computes the property delta between two elements of the same tag.
#[must_use]
pub fn diff_props(old: &Props, new: &Props) -> Vec<PropChange> {
	let mut changes = Vec::new();

	for name in old.attributes.keys().filter(|name| !new.attributes.contains_key(*name)) {
		changes.push(PropChange::RemoveAttribute { name: name.clone() })
	}
	for (name, value) in &new.attributes {
		if old.attributes.get(name) != Some(value) {
			changes.push(PropChange::SetAttribute {
				name: name.clone(),
				value: value.clone(),
			})
		}
	}

	for name in old.events.keys().filter(|name| !new.events.contains_key(*name)) {
		changes.push(PropChange::UnbindEvent { name: name.clone() })
	}
	for (name, handler) in &new.events {
		if old.events.get(name) != Some(handler) {
			changes.push(PropChange::BindEvent {
				name: name.clone(),
				handler: handler.clone(),
			})
		}
	}

	for property in old.style.keys().filter(|property| !new.style.contains_key(*property)) {
		changes.push(PropChange::RemoveStyle { property: property.clone() })
	}
	for (property, value) in &new.style {
		if old.style.get(property) != Some(value) {
			changes.push(PropChange::SetStyle {
				property: property.clone(),
				value: value.clone(),
			})
		}
	}

	changes
}
