//! Applies patches produced by [`diff`](`crate::diff::diff`) to a live tree.

use crate::{
	dom::Dom,
	error::DomError,
	patch::{Move, Patch, PatchKind, PropChange},
	vdom::VNode,
};
use core::{cmp::Ordering, iter};
use tracing::{debug, error, instrument, trace, trace_span, warn};

/// Outcome counters of one [`apply`] call.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ApplyReport {
	pub applied: usize,
	/// Removals whose target was already gone.
	pub skipped: usize,
	/// Patches that could not be applied. Nonzero means the DOM may be out of sync with the new tree.
	pub failed: usize,
}
impl ApplyReport {
	#[must_use]
	pub fn is_clean(&self) -> bool {
		self.failed == 0
	}
}

/// Applies `patches` to the tree rendered into `container`, whose first child is the root node.
///
/// Patches are reordered first:
///
/// 1. Removals, deepest first and higher sibling indices before lower ones, while the DOM still has the old shape.
/// 2. Reorders and creations, shallowest first, reorders before creations under the same parent,
///    creations by ascending index. After this the DOM has the new shape.
/// 3. Replacements, text and property updates.
///
/// Only removals go deepest first. Reorder and creation paths index the new tree, so their parents
/// must already be in place, which is why step 2 runs shallowest first.
///
/// Failures are logged and counted but never abort the pass.
#[instrument(skip(dom, container, patches), fields(patches = patches.len()))]
pub fn apply<D: Dom>(dom: &D, container: &D::Node, patches: &[Patch]) -> ApplyReport {
	let mut ordered: Vec<&Patch> = patches.iter().collect();
	ordered.sort_by(|a, b| apply_order(a, b));

	let mut report = ApplyReport::default();
	for patch in ordered {
		let span = trace_span!("Applying patch", kind = patch.kind.name(), depth = patch.path.len());
		let _enter = span.enter();
		match apply_patch(dom, container, patch) {
			Ok(()) => report.applied += 1,
			Err(Failure::Dangling) if matches!(patch.kind, PatchKind::Remove) => {
				trace!("Removal target is already gone. Skipping.");
				report.skipped += 1;
			}
			Err(Failure::Dangling) => {
				error!("Path {} does not resolve against the live DOM. Skipping {} patch.", describe_path(&patch.path), patch.kind.name());
				report.failed += 1;
			}
			Err(Failure::Dom(error)) => {
				error!("Failed to apply {} patch at {}: {}", patch.kind.name(), describe_path(&patch.path), error);
				report.failed += 1;
			}
		}
	}
	debug!("Applied {} patch(es), skipped {}, {} failed.", report.applied, report.skipped, report.failed);
	report
}

fn apply_order(a: &Patch, b: &Patch) -> Ordering {
	fn rank(patch: &Patch) -> (u8, usize, u8) {
		let depth = patch.path.len();
		match patch.kind {
			PatchKind::Remove => (0, usize::MAX - depth, 0),
			PatchKind::Reorder { .. } => (1, depth + 1, 0),
			PatchKind::Create { .. } => (1, depth, 1),
			PatchKind::Replace { .. } | PatchKind::Text { .. } | PatchKind::Props { .. } => (2, 0, 0),
		}
	}

	rank(a).cmp(&rank(b)).then_with(|| match (&a.kind, &b.kind) {
		(PatchKind::Remove, PatchKind::Remove) => b.path.cmp(&a.path),
		(PatchKind::Create { .. }, PatchKind::Create { .. }) => a.path.cmp(&b.path),
		_ => Ordering::Equal,
	})
}

enum Failure {
	Dangling,
	Dom(DomError),
}
impl From<DomError> for Failure {
	fn from(error: DomError) -> Self {
		Self::Dom(error)
	}
}

fn describe_path(path: &[usize]) -> String {
	if cfg!(feature = "log-paths") {
		format!("{:?}", path)
	} else {
		format!("(depth {})", path.len())
	}
}

/// Walks `path` from the root node, the first child of `container`.
pub(crate) fn resolve<D: Dom>(dom: &D, container: &D::Node, path: &[usize]) -> Option<D::Node> {
	path.iter().try_fold(dom.child_at(container, 0)?, |node, &i| dom.child_at(&node, i))
}

fn resolve_parent<D: Dom>(dom: &D, container: &D::Node, path: &[usize]) -> Option<(D::Node, usize)> {
	match path.split_last() {
		None => Some((container.clone(), 0)),
		Some((&index, parent_path)) => Some((resolve(dom, container, parent_path)?, index)),
	}
}

fn apply_patch<D: Dom>(dom: &D, container: &D::Node, Patch { path, kind }: &Patch) -> Result<(), Failure> {
	match kind {
		PatchKind::Remove => {
			let (parent, index) = resolve_parent(dom, container, path).ok_or(Failure::Dangling)?;
			let node = dom.child_at(&parent, index).ok_or(Failure::Dangling)?;
			dom.remove_child(&parent, &node)?;
		}

		PatchKind::Create { node } => {
			let (parent, index) = resolve_parent(dom, container, path).ok_or(Failure::Dangling)?;
			if index > dom.child_count(&parent) {
				return Err(Failure::Dangling);
			}
			let created = create_node(dom, node)?;
			dom.insert_before(&parent, &created, dom.child_at(&parent, index).as_ref())?;
		}

		PatchKind::Replace { node } => {
			let (parent, index) = resolve_parent(dom, container, path).ok_or(Failure::Dangling)?;
			let old = dom.child_at(&parent, index).ok_or(Failure::Dangling)?;
			let created = create_node(dom, node)?;
			dom.replace_child(&parent, &created, &old)?;
		}

		PatchKind::Text { content } => {
			let node = resolve(dom, container, path).ok_or(Failure::Dangling)?;
			dom.set_text(&node, content);
		}

		PatchKind::Props { changes } => {
			let element = resolve(dom, container, path).ok_or(Failure::Dangling)?;
			for change in changes {
				apply_prop_change(dom, &element, change)?;
			}
		}

		PatchKind::Reorder { moves } => {
			let parent = resolve(dom, container, path).ok_or(Failure::Dangling)?;
			reorder(dom, &parent, moves)?;
		}
	}
	Ok(())
}

/// Arranges the current children of `parent` so that each moved child lands at its `to` position.
/// Children not named in `moves` keep their position.
fn reorder<D: Dom>(dom: &D, parent: &D::Node, moves: &[Move]) -> Result<(), Failure> {
	let live: Vec<D::Node> = (0..dom.child_count(parent)).map_while(|i| dom.child_at(parent, i)).collect();

	let mut target: Vec<Option<usize>> = (0..live.len()).map(Some).collect();
	for &Move { from, to, .. } in moves {
		match target.get_mut(from) {
			Some(slot) if to < live.len() => *slot = Some(to),
			_ => {
				warn!("Move {} -> {} is out of range for {} live child(ren).", from, to, live.len());
				return Err(Failure::Dangling);
			}
		}
	}

	let mut order: Vec<Option<&D::Node>> = iter::repeat(None).take(live.len()).collect();
	for (node, to) in live.iter().zip(target) {
		match to.and_then(|to| order.get_mut(to)) {
			Some(slot) if slot.is_none() => *slot = Some(node),
			_ => {
				warn!("Reorder moves don't form a permutation. Skipping.");
				return Err(Failure::Dangling);
			}
		}
	}

	for (i, node) in order.into_iter().flatten().enumerate() {
		let current = dom.child_at(parent, i);
		if !current.as_ref().map_or(false, |current| dom.same_node(current, node)) {
			dom.insert_before(parent, node, current.as_ref())?;
		}
	}
	Ok(())
}

fn apply_prop_change<D: Dom>(dom: &D, element: &D::Node, change: &PropChange) -> Result<(), DomError> {
	match change {
		PropChange::SetAttribute { name, value } => dom.set_attribute(element, name, value),
		PropChange::RemoveAttribute { name } => dom.remove_attribute(element, name),
		PropChange::BindEvent { name, handler } => dom.bind_event(element, name, handler),
		PropChange::UnbindEvent { name } => dom.unbind_event(element, name),
		PropChange::SetStyle { property, value } => dom.set_style(element, property, value),
		PropChange::RemoveStyle { property } => dom.remove_style(element, property),
	}
}

/// Builds a detached DOM subtree for `vnode`.
///
/// This is used both for the initial mount and for [`PatchKind::Create`]/[`PatchKind::Replace`], so both paths assign properties the same way.
pub fn create_node<D: Dom>(dom: &D, vnode: &VNode) -> Result<D::Node, DomError> {
	match vnode {
		VNode::Text(text) => {
			if cfg!(feature = "dangerous-logging") {
				trace!("Creating text node {:?}", text.content);
			}
			Ok(dom.create_text(&text.content))
		}

		VNode::Element(element) => {
			let span = trace_span!("Creating element", tag = %element.tag);
			let _enter = span.enter();

			let node = dom.create_element(&element.tag)?;
			for (name, value) in &element.props.attributes {
				dom.set_attribute(&node, name, value)?;
			}
			for (property, value) in &element.props.style {
				dom.set_style(&node, property, value)?;
			}
			for (name, handler) in &element.props.events {
				dom.bind_event(&node, name, handler)?;
			}
			for child in &element.children {
				let child = create_node(dom, child)?;
				dom.append_child(&node, &child)?;
			}
			Ok(node)
		}

		VNode::Component(component) => create_node(dom, &component.component.render()),
	}
}
