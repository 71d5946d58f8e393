//! The application state container.

use crate::{
	catch::run_guarded,
	error::StoreError,
	history::{History, HistoryEntry},
	host::{Clock, SystemClock},
	middleware::{Middleware, Verdict},
	path::{deep_merge, kind_of, lookup},
	persist::{Inspector, SnapshotStorage, TracingInspector},
};
use core::{
	any::Any,
	cell::{Cell, RefCell},
	mem,
};
use hashbrown::HashMap;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use std::rc::{Rc, Weak};
use tracing::{debug, instrument, trace, warn};

pub const INIT_ACTION: &str = "@@INIT";
pub const UNDO_ACTION: &str = "@@UNDO";
pub const REDO_ACTION: &str = "@@REDO";
pub const RESET_ACTION: &str = "@@RESET";
pub const RESTORE_ACTION: &str = "@@RESTORE";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreOptions {
	/// Upper bound on retained history entries, the initial one included.
	pub max_history: usize,
	/// Storage key under which every committed snapshot is saved, if any.
	pub persist_key: Option<String>,
	/// Forward every commit to the store's [`Inspector`].
	pub devtools: bool,
}
impl Default for StoreOptions {
	fn default() -> Self {
		Self {
			max_history: 50,
			persist_key: None,
			devtools: false,
		}
	}
}

/// How [`Store::set_state`] derives the candidate state.
pub enum Update<S> {
	/// Mutate a private copy of the current state.
	Draft(Box<dyn FnOnce(&mut S)>),
	/// Deep-merge a JSON object into the current state's JSON form.
	Merge(Value),
}
impl<S> Update<S> {
	pub fn draft(draft: impl FnOnce(&mut S) + 'static) -> Self {
		Self::Draft(Box::new(draft))
	}

	#[must_use]
	pub fn merge(patch: Value) -> Self {
		Self::Merge(patch)
	}
}
impl<S> From<Value> for Update<S> {
	fn from(patch: Value) -> Self {
		Self::Merge(patch)
	}
}

/// Passed to observers after each commit.
#[derive(Debug)]
pub struct StateChange<'a, S> {
	pub action: &'a str,
	pub previous: &'a Rc<S>,
	pub current: &'a Rc<S>,
}

/// Decides which commits an observer is told about.
pub enum Filter<S> {
	All,
	/// Only commits that change the value at this dot-path.
	Path(String),
	/// Only commits for which this returns `true`, given `(previous, current)`.
	Predicate(Box<dyn Fn(&S, &S) -> bool>),
}
impl<S> Filter<S> {
	pub fn predicate(predicate: impl Fn(&S, &S) -> bool + 'static) -> Self {
		Self::Predicate(Box::new(predicate))
	}
}
impl<S> From<&str> for Filter<S> {
	fn from(path: &str) -> Self {
		Self::Path(path.to_owned())
	}
}

/// Returned by [`Store::subscribe`]. Dropping it keeps the observer registered.
#[must_use = "Dropping a `Subscription` does not unsubscribe. Call `.unsubscribe()` or `.forget()`."]
pub struct Subscription(Option<Box<dyn FnOnce()>>);
impl Subscription {
	pub fn unsubscribe(mut self) {
		if let Some(unsubscribe) = self.0.take() {
			unsubscribe()
		}
	}

	/// Keeps the observer registered for the lifetime of the store.
	pub fn forget(self) {}
}

type Observer<S> = Rc<RefCell<dyn FnMut(&StateChange<'_, S>)>>;

struct ObserverEntry<S> {
	id: u64,
	filter: Rc<Filter<S>>,
	observer: Observer<S>,
}

struct Computed<S> {
	selector: Box<dyn Fn(&S) -> Rc<dyn Any>>,
	dependencies: Vec<String>,
	cache: Option<(Vec<Option<Value>>, Rc<dyn Any>)>,
	computations: usize,
}

struct Core<S> {
	state: Rc<S>,
	history: History<S>,
}

/// Holds the canonical snapshot of `S` and everything that reacts to it.
///
/// Snapshots are shared as [`Rc<S>`] and never mutated: every commit allocates a new one,
/// so a snapshot obtained earlier keeps its contents forever.
///
/// All methods take `&self`, so observers may read from or write to the store while being notified.
/// Middleware must not call back into the store.
pub struct Store<S: 'static> {
	options: StoreOptions,
	clock: Box<dyn Clock>,
	core: RefCell<Core<S>>,
	observers: Rc<RefCell<Vec<ObserverEntry<S>>>>,
	next_observer_id: Cell<u64>,
	middleware: RefCell<Vec<Box<dyn Middleware<S>>>>,
	computed: RefCell<HashMap<String, Computed<S>>>,
	storage: Option<Box<dyn SnapshotStorage>>,
	inspector: Option<Box<dyn Inspector>>,
}
impl<S> Store<S>
where
	S: Clone + Serialize + DeserializeOwned + 'static,
{
	#[must_use]
	pub fn new(initial: S, options: StoreOptions) -> Self {
		Self::with_clock(initial, options, SystemClock)
	}

	pub fn with_clock(initial: S, options: StoreOptions, clock: impl Clock + 'static) -> Self {
		let state = Rc::new(initial);
		let history = History::new(
			HistoryEntry {
				state: Rc::clone(&state),
				action: INIT_ACTION.to_owned(),
				timestamp: clock.now(),
			},
			options.max_history,
		);
		Self {
			options,
			clock: Box::new(clock),
			core: RefCell::new(Core { state, history }),
			observers: Rc::default(),
			next_observer_id: Cell::new(0),
			middleware: RefCell::default(),
			computed: RefCell::default(),
			storage: None,
			inspector: None,
		}
	}

	/// Attaches storage used by [`StoreOptions::persist_key`] and [`Store::restore`].
	#[must_use]
	pub fn with_storage(mut self, storage: impl SnapshotStorage + 'static) -> Self {
		self.storage = Some(Box::new(storage));
		self
	}

	/// Replaces the default [`TracingInspector`] used when [`StoreOptions::devtools`] is set.
	#[must_use]
	pub fn with_inspector(mut self, inspector: impl Inspector + 'static) -> Self {
		self.inspector = Some(Box::new(inspector));
		self
	}

	#[must_use]
	pub fn options(&self) -> &StoreOptions {
		&self.options
	}

	/// The current snapshot.
	#[must_use]
	pub fn get_state(&self) -> Rc<S> {
		Rc::clone(&self.core.borrow().state)
	}

	/// An owned copy of the current snapshot, free to mutate.
	#[must_use]
	pub fn snapshot(&self) -> S {
		S::clone(&self.core.borrow().state)
	}

	/// The JSON value at a dot-delimited `path` of the current snapshot (see [`lookup`](`crate::path::lookup`)).
	#[must_use]
	pub fn get(&self, path: &str) -> Option<Value> {
		let state = self.get_state();
		match serde_json::to_value(&*state) {
			Ok(json) => lookup(&json, path).cloned(),
			Err(error) => {
				warn!("Could not serialize state to read {:?}: {}", path, error);
				None
			}
		}
	}

	/// Derives a candidate from the current state, runs it through the middleware chain and commits the result.
	///
	/// Returns `Ok(false)` if a middleware vetoed the update, in which case nothing changed and nobody was notified.
	#[instrument(skip(self, update))]
	pub fn set_state(&self, update: impl Into<Update<S>>, action: &str) -> Result<bool, StoreError> {
		let previous = self.get_state();
		let candidate = match update.into() {
			Update::Draft(draft) => {
				let mut draft_state = S::clone(&previous);
				draft(&mut draft_state);
				draft_state
			}
			Update::Merge(patch) => {
				if !patch.is_object() {
					return Err(StoreError::MergeNotAnObject { found: kind_of(&patch) });
				}
				let mut json = serde_json::to_value(&*previous)?;
				deep_merge(&mut json, patch);
				serde_json::from_value(json)?
			}
		};

		let mut candidate = Rc::new(candidate);
		for middleware in self.middleware.borrow_mut().iter_mut() {
			match middleware.process(action, &previous, &candidate) {
				Verdict::Continue => (),
				Verdict::Replace(replacement) => candidate = Rc::new(replacement),
				Verdict::Veto => {
					debug!("Action {:?} vetoed by middleware.", action);
					return Ok(false);
				}
			}
		}

		{
			let mut core = self.core.borrow_mut();
			core.state = Rc::clone(&candidate);
			core.history.push(HistoryEntry {
				state: Rc::clone(&candidate),
				action: action.to_owned(),
				timestamp: self.clock.now(),
			});
		}
		self.after_commit(action, &previous, &candidate);
		Ok(true)
	}

	/// Registers `observer` for commits that pass `filter`.
	pub fn subscribe(&self, filter: impl Into<Filter<S>>, observer: impl FnMut(&StateChange<'_, S>) + 'static) -> Subscription {
		let id = self.next_observer_id.get();
		self.next_observer_id.set(id + 1);
		self.observers.borrow_mut().push(ObserverEntry {
			id,
			filter: Rc::new(filter.into()),
			observer: Rc::new(RefCell::new(observer)),
		});

		let observers: Weak<RefCell<Vec<ObserverEntry<S>>>> = Rc::downgrade(&self.observers);
		Subscription(Some(Box::new(move || {
			if let Some(observers) = observers.upgrade() {
				observers.borrow_mut().retain(|entry| entry.id != id)
			}
		})))
	}

	/// Appends `middleware` to the chain.
	pub fn use_middleware(&self, middleware: impl Middleware<S> + 'static) {
		self.middleware.borrow_mut().push(Box::new(middleware))
	}

	/// Defines a memoized derived value, recomputed on read only if the values at `dependencies` (dot-paths) changed.
	///
	/// Redefining `name` discards the previous definition and its cache.
	pub fn computed<T: 'static>(&self, name: &str, selector: impl Fn(&S) -> T + 'static, dependencies: &[&str]) {
		self.computed.borrow_mut().insert(
			name.to_owned(),
			Computed {
				selector: Box::new(move |state| Rc::new(selector(state)) as Rc<dyn Any>),
				dependencies: dependencies.iter().map(|&dependency| dependency.to_owned()).collect(),
				cache: None,
				computations: 0,
			},
		);
	}

	/// Reads a computed value. [`None`] if `name` is undefined or its type isn't `T`.
	#[must_use]
	pub fn get_computed<T: Clone + 'static>(&self, name: &str) -> Option<T> {
		let state = self.get_state();
		let mut computed = self.computed.borrow_mut();
		let entry = computed.get_mut(name)?;

		let dependency_values: Vec<Option<Value>> = if entry.dependencies.is_empty() {
			Vec::new()
		} else {
			let json = serde_json::to_value(&*state).ok()?;
			entry.dependencies.iter().map(|dependency| lookup(&json, dependency).cloned()).collect()
		};

		let stale = entry.cache.as_ref().map_or(true, |(cached, _)| *cached != dependency_values);
		if stale {
			trace!("Recomputing {:?}.", name);
			let value = (entry.selector)(&state);
			entry.cache = Some((dependency_values, value));
			entry.computations += 1;
		}
		entry.cache.as_ref().and_then(|(_, value)| value.downcast_ref::<T>().cloned())
	}

	/// How often the computed value `name` has been evaluated.
	#[must_use]
	pub fn computations(&self, name: &str) -> Option<usize> {
		self.computed.borrow().get(name).map(|entry| entry.computations)
	}

	/// Steps back one history entry. Returns `false` at the beginning of history.
	pub fn undo(&self) -> bool {
		self.travel(UNDO_ACTION, |history| history.undo().map(|entry| Rc::clone(&entry.state)))
	}

	/// Steps forward one history entry. Returns `false` at the end of history.
	pub fn redo(&self) -> bool {
		self.travel(REDO_ACTION, |history| history.redo().map(|entry| Rc::clone(&entry.state)))
	}

	/// Collapses history to its first entry and makes that the current state.
	pub fn reset(&self) {
		self.travel(RESET_ACTION, |history| Some(Rc::clone(&history.reset().state)));
	}

	fn travel(&self, action: &str, step: impl FnOnce(&mut History<S>) -> Option<Rc<S>>) -> bool {
		let (previous, current) = {
			let mut core = self.core.borrow_mut();
			let Some(target) = step(&mut core.history) else {
				trace!("{} is a no-op here.", action);
				return false;
			};
			(mem::replace(&mut core.state, Rc::clone(&target)), target)
		};
		self.after_commit(action, &previous, &current);
		true
	}

	/// Loads the snapshot saved under [`StoreOptions::persist_key`] and commits it as [`RESTORE_ACTION`].
	///
	/// Returns `Ok(false)` if persistence isn't configured or nothing was saved yet.
	pub fn restore(&self) -> Result<bool, StoreError> {
		let (Some(key), Some(storage)) = (&self.options.persist_key, &self.storage) else {
			return Ok(false);
		};
		let Some(json) = storage.load(key)? else {
			return Ok(false);
		};
		let restored: S = serde_json::from_str(&json)?;

		let previous = self.get_state();
		let current = Rc::new(restored);
		{
			let mut core = self.core.borrow_mut();
			core.state = Rc::clone(&current);
			core.history.push(HistoryEntry {
				state: Rc::clone(&current),
				action: RESTORE_ACTION.to_owned(),
				timestamp: self.clock.now(),
			});
		}
		self.after_commit(RESTORE_ACTION, &previous, &current);
		Ok(true)
	}

	#[must_use]
	pub fn can_undo(&self) -> bool {
		self.core.borrow().history.can_undo()
	}

	#[must_use]
	pub fn can_redo(&self) -> bool {
		self.core.borrow().history.can_redo()
	}

	#[must_use]
	pub fn history_len(&self) -> usize {
		self.core.borrow().history.len()
	}

	/// Action names of all retained history entries, oldest first.
	#[must_use]
	pub fn history_actions(&self) -> Vec<String> {
		self.core.borrow().history.entries().map(|entry| entry.action.clone()).collect()
	}

	fn after_commit(&self, action: &str, previous: &Rc<S>, current: &Rc<S>) {
		let wants_json = (self.options.persist_key.is_some() && self.storage.is_some()) || self.options.devtools;
		if wants_json {
			match serde_json::to_value(&**current) {
				Ok(json) => {
					self.persist(&json);
					if self.options.devtools {
						match &self.inspector {
							Some(inspector) => inspector.on_commit(action, &json),
							None => TracingInspector.on_commit(action, &json),
						}
					}
				}
				Err(error) => warn!("Could not serialize committed state: {}", error),
			}
		}
		self.notify(action, previous, current);
	}

	fn persist(&self, json: &Value) {
		if let (Some(key), Some(storage)) = (&self.options.persist_key, &self.storage) {
			if let Err(error) = storage.save(key, &json.to_string()) {
				warn!("Failed to persist state under {:?}: {}", key, error)
			}
		}
	}

	fn notify(&self, action: &str, previous: &Rc<S>, current: &Rc<S>) {
		let observers: Vec<(Rc<Filter<S>>, Observer<S>)> = self.observers.borrow().iter().map(|entry| (Rc::clone(&entry.filter), Rc::clone(&entry.observer))).collect();
		if observers.is_empty() {
			return;
		}

		let mut jsons: Option<(Value, Value)> = None;
		let change = StateChange { action, previous, current };
		for (filter, observer) in observers {
			let interested = match &*filter {
				Filter::All => true,
				Filter::Predicate(predicate) => predicate(previous, current),
				Filter::Path(path) => {
					if jsons.is_none() {
						match (serde_json::to_value(&**previous), serde_json::to_value(&**current)) {
							(Ok(previous), Ok(current)) => jsons = Some((previous, current)),
							(Err(error), _) | (_, Err(error)) => {
								warn!("Could not serialize state to evaluate observer filters: {}", error);
								continue;
							}
						}
					}
					jsons.as_ref().map_or(true, |(previous, current)| lookup(previous, path) != lookup(current, path))
				}
			};
			if !interested {
				continue;
			}

			let Ok(mut observer) = observer.try_borrow_mut() else {
				warn!("Observer is already running further up the stack. Skipping it for {:?}.", action);
				continue;
			};
			run_guarded("State observer", || observer(&change));
		}
	}
}
