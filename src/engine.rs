//! Mounts virtual trees into containers and keeps them in sync across renders.

use crate::{
	apply::{apply, create_node, resolve, ApplyReport},
	catch::run_guarded,
	config::RenderOptions,
	diff::diff,
	dom::Dom,
	error::{DomError, MountError},
	host::FrameHost,
	scheduler::{Scheduler, TaskId},
	vdom::{Component, DomRef, Lifecycle, NodeRef, VNode},
};
use core::cell::RefCell;
use std::rc::{Rc, Weak};
use tracing::{debug, error, instrument, trace, warn};

/// Where to render.
#[derive(Debug, Clone, Copy)]
pub enum Target<'a, N> {
	Node(&'a N),
	/// A CSS selector, resolved once per call.
	Selector(&'a str),
}

/// What a [`RenderEngine::render`] call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderOutcome {
	/// The container's content was built from scratch.
	Mounted,
	/// The container's previous tree was diffed against the new one and patched.
	Patched(ApplyReport),
	/// The render was queued and will run in an upcoming frame.
	Scheduled(TaskId),
}

#[derive(Clone)]
struct MountedComponent {
	path: Vec<usize>,
	name: &'static str,
	component: Rc<dyn Component>,
}
impl MountedComponent {
	fn same_identity(&self, other: &Self) -> bool {
		self.name == other.name && self.path == other.path
	}
}

struct Mount<N> {
	container: N,
	/// Resolved tree last rendered into `container`.
	tree: VNode,
	/// Whether the DOM is known to match `tree`.
	in_sync: bool,
	components: Vec<MountedComponent>,
}

struct Pending<N> {
	container: N,
	task: TaskId,
}

struct Inner<D: Dom, H: FrameHost + 'static> {
	dom: D,
	scheduler: Scheduler<H>,
	defaults: RenderOptions,
	mounts: RefCell<Vec<Mount<D::Node>>>,
	pending: RefCell<Vec<Pending<D::Node>>>,
}

/// Renders [`VNode`] trees into DOM containers.
///
/// The first render into a container builds its content from scratch. Later renders diff against the cached tree
/// and apply only the resulting patches. If patching fails partway, the cache is marked stale and the next render
/// rebuilds the container.
///
/// A scheduled render supersedes any render still queued for the same container.
///
/// Clones share their state.
pub struct RenderEngine<D: Dom + 'static, H: FrameHost + 'static>(Rc<Inner<D, H>>);
impl<D: Dom + 'static, H: FrameHost + 'static> Clone for RenderEngine<D, H> {
	fn clone(&self) -> Self {
		Self(Rc::clone(&self.0))
	}
}
impl<D: Dom + 'static, H: FrameHost + 'static> RenderEngine<D, H> {
	pub fn new(dom: D, scheduler: Scheduler<H>) -> Self {
		Self::with_defaults(dom, scheduler, RenderOptions::default())
	}

	/// `defaults` are used by [`RenderEngine::render_default`].
	pub fn with_defaults(dom: D, scheduler: Scheduler<H>, defaults: RenderOptions) -> Self {
		Self(Rc::new(Inner {
			dom,
			scheduler,
			defaults,
			mounts: RefCell::default(),
			pending: RefCell::default(),
		}))
	}

	#[must_use]
	pub fn dom(&self) -> &D {
		&self.0.dom
	}

	#[must_use]
	pub fn scheduler(&self) -> &Scheduler<H> {
		&self.0.scheduler
	}

	pub fn resolve_target(&self, target: Target<'_, D::Node>) -> Result<D::Node, MountError> {
		match target {
			Target::Node(node) => Ok(node.clone()),
			Target::Selector(selector) => self.0.dom.query_selector(selector).ok_or_else(|| MountError::SelectorNotFound(selector.to_owned())),
		}
	}

	/// Renders `vnode` into `target`, synchronously if [`RenderOptions::immediate`] is set
	/// and otherwise as a scheduler task at [`RenderOptions::priority`].
	///
	/// Components are rendered when the render runs, not when it is requested.
	#[instrument(skip(self, target, vnode), fields(immediate = options.immediate, priority = options.priority.0))]
	pub fn render(&self, target: Target<'_, D::Node>, vnode: VNode, options: RenderOptions) -> Result<RenderOutcome, MountError> {
		let container = self.resolve_target(target)?;
		self.cancel_pending(&container);

		if options.immediate {
			return Ok(self.commit(&container, &vnode)?);
		}

		let engine: Weak<Inner<D, H>> = Rc::downgrade(&self.0);
		let task = self.0.scheduler.schedule(
			move |(container, vnode): (D::Node, VNode)| {
				let Some(inner) = engine.upgrade() else {
					return;
				};
				let engine = Self(inner);
				engine.forget_pending(&container);
				if let Err(error) = engine.commit(&container, &vnode) {
					error!("Scheduled render failed: {}", error);
				}
			},
			(container.clone(), vnode),
			options.priority,
		);
		self.0.pending.borrow_mut().push(Pending { container, task });
		Ok(RenderOutcome::Scheduled(task))
	}

	/// [`RenderEngine::render`] with the options this engine was created with.
	pub fn render_default(&self, target: Target<'_, D::Node>, vnode: VNode) -> Result<RenderOutcome, MountError> {
		self.render(target, vnode, self.0.defaults)
	}

	/// Removes everything rendered into `target`, cancelling queued renders and running unmount hooks.
	///
	/// Returns `Ok(false)` if nothing was mounted there.
	pub fn unmount(&self, target: Target<'_, D::Node>) -> Result<bool, MountError> {
		let container = self.resolve_target(target)?;
		self.cancel_pending(&container);
		let Some(mount) = self.take_mount(&container) else {
			return Ok(false);
		};

		for (_, node_ref) in collect_refs(&mount.tree) {
			node_ref.release();
		}
		self.0.dom.clear_children(&container)?;
		fire_lifecycle(&mount.components, &[]);
		debug!("Unmounted.");
		Ok(true)
	}

	/// Forgets the cached tree of `container`, so that its next render rebuilds it from scratch.
	pub fn invalidate(&self, container: &D::Node) -> bool {
		let mut mounts = self.0.mounts.borrow_mut();
		match mounts.iter_mut().find(|mount| self.0.dom.same_node(&mount.container, container)) {
			Some(mount) => {
				mount.in_sync = false;
				true
			}
			None => false,
		}
	}

	/// The resolved tree last rendered into `container`, if it is known to be in sync with the DOM.
	#[must_use]
	pub fn rendered_tree(&self, container: &D::Node) -> Option<VNode> {
		self.0
			.mounts
			.borrow()
			.iter()
			.find(|mount| mount.in_sync && self.0.dom.same_node(&mount.container, container))
			.map(|mount| mount.tree.clone())
	}

	#[must_use]
	pub fn has_pending_render(&self, container: &D::Node) -> bool {
		self.0.pending.borrow().iter().any(|pending| self.0.dom.same_node(&pending.container, container))
	}

	fn cancel_pending(&self, container: &D::Node) {
		let superseded: Vec<TaskId> = {
			let mut pending = self.0.pending.borrow_mut();
			let mut superseded = Vec::new();
			pending.retain(|pending| {
				let matches = self.0.dom.same_node(&pending.container, container);
				if matches {
					superseded.push(pending.task);
				}
				!matches
			});
			superseded
		};
		for task in superseded {
			trace!("Superseding queued render {:?}.", task);
			self.0.scheduler.cancel(task);
		}
	}

	fn forget_pending(&self, container: &D::Node) {
		self.0.pending.borrow_mut().retain(|pending| !self.0.dom.same_node(&pending.container, container))
	}

	fn take_mount(&self, container: &D::Node) -> Option<Mount<D::Node>> {
		let mut mounts = self.0.mounts.borrow_mut();
		let index = mounts.iter().position(|mount| self.0.dom.same_node(&mount.container, container))?;
		Some(mounts.swap_remove(index))
	}

	fn commit(&self, container: &D::Node, vnode: &VNode) -> Result<RenderOutcome, DomError> {
		let dom = &self.0.dom;

		let mut components = Vec::new();
		let tree = vnode.resolve(&mut |path, component| {
			components.push(MountedComponent {
				path: path.to_vec(),
				name: component.name(),
				component: Rc::clone(component),
			})
		});

		let previous = self.take_mount(container);
		let new_refs = collect_refs(&tree);
		if let Some(previous) = &previous {
			for (_, old_ref) in collect_refs(&previous.tree) {
				if !new_refs.iter().any(|(_, new_ref)| *new_ref == old_ref) {
					old_ref.release();
				}
			}
		}

		let result = match &previous {
			Some(previous) if previous.in_sync => {
				let patches = diff(Some(&previous.tree), Some(&tree));
				debug!("Diffed {} patch(es).", patches.len());
				Ok(RenderOutcome::Patched(apply(dom, container, &patches)))
			}
			_ => rebuild(dom, container, &tree).map(|()| RenderOutcome::Mounted),
		};

		match result {
			Ok(outcome) => {
				let in_sync = match outcome {
					RenderOutcome::Patched(report) if !report.is_clean() => {
						warn!("{} patch(es) failed. The container will be rebuilt on its next render.", report.failed);
						false
					}
					_ => true,
				};
				bind_refs(dom, container, &new_refs);

				let previous_components = previous.map(|previous| previous.components).unwrap_or_default();
				let current_components = components.clone();
				self.0.mounts.borrow_mut().push(Mount {
					container: container.clone(),
					tree,
					in_sync,
					components,
				});
				// Hooks may render again, so the cache must be settled first.
				fire_lifecycle(&previous_components, &current_components);
				Ok(outcome)
			}
			Err(error) => {
				if let Some(previous) = previous {
					self.0.mounts.borrow_mut().push(Mount { in_sync: false, ..previous });
				}
				Err(error)
			}
		}
	}
}

fn rebuild<D: Dom>(dom: &D, container: &D::Node, tree: &VNode) -> Result<(), DomError> {
	let root = create_node(dom, tree)?;
	dom.clear_children(container)?;
	dom.append_child(container, &root)
}

fn collect_refs(tree: &VNode) -> Vec<(Vec<usize>, NodeRef)> {
	fn walk(node: &VNode, path: &mut Vec<usize>, refs: &mut Vec<(Vec<usize>, NodeRef)>) {
		if let VNode::Element(element) = node {
			if let Some(node_ref) = &element.node_ref {
				refs.push((path.clone(), node_ref.clone()));
			}
			for (i, child) in element.children.iter().enumerate() {
				path.push(i);
				walk(child, path, refs);
				path.pop();
			}
		}
	}

	let mut refs = Vec::new();
	walk(tree, &mut Vec::new(), &mut refs);
	refs
}

fn bind_refs<D: Dom>(dom: &D, container: &D::Node, refs: &[(Vec<usize>, NodeRef)]) {
	for (path, node_ref) in refs {
		match resolve(dom, container, path) {
			Some(node) => node_ref.notify(DomRef::Added(Rc::new(node))),
			None => warn!("Could not bind a node ref: its element is missing from the DOM."),
		}
	}
}

fn fire_lifecycle(previous: &[MountedComponent], current: &[MountedComponent]) {
	for old in previous {
		if !current.iter().any(|new| new.same_identity(old)) {
			run_guarded("Unmount hook", || old.component.on_lifecycle(Lifecycle::Unmount));
		}
	}
	for new in current {
		let event = if previous.iter().any(|old| old.same_identity(new)) {
			Lifecycle::Update
		} else {
			Lifecycle::Mount
		};
		run_guarded("Lifecycle hook", || new.component.on_lifecycle(event));
	}
}
