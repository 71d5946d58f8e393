//! The registry backend as seen from the front end, and the store actions driven by it.

use crate::{
	app::{clamp_page_size, total_pages, AppState, Repository, SortField, SortOrder, SortSpec, Tag, TagRef},
	error::{ActionError, ApiError, StoreError},
	store::{Store, Update},
};
use core::cell::{Cell, RefCell};
use serde::{Deserialize, Serialize};
use std::{cmp::Ordering, collections::BTreeMap};
use tracing::{debug, instrument, warn};

/// Parameters of a repository listing request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListQuery {
	pub search: Option<String>,
	pub sort: SortSpec,
	pub page: u32,
	pub limit: u32,
}
impl ListQuery {
	#[must_use]
	pub fn from_state(state: &AppState) -> Self {
		let search = state.search_query.trim();
		Self {
			search: (!search.is_empty()).then(|| search.to_owned()),
			sort: state.sort,
			page: state.current_page.max(1),
			limit: clamp_page_size(state.page_size),
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryPage {
	pub repositories: Vec<Repository>,
	pub total: u64,
	pub page: u32,
	pub limit: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagPage {
	pub tags: Vec<Tag>,
	pub total: u64,
}

/// The data-fetch interface the front end consumes.
#[allow(async_fn_in_trait)]
pub trait RegistryApi {
	async fn list_repositories(&self, query: &ListQuery) -> Result<RepositoryPage, ApiError>;
	async fn list_tags(&self, repository: &str) -> Result<TagPage, ApiError>;
}

/// Sets `loading`, fetches the page described by the current state and stores it.
///
/// A page past the end of a non-empty listing (say, restored from a stale URL) is fetched again as the last page.
///
/// On failure, the error message lands in [`AppState::error`] and is also returned.
#[instrument(skip(store, api))]
pub async fn load_repositories(store: &Store<AppState>, api: &impl RegistryApi) -> Result<(), ActionError> {
	store.set_state(
		Update::draft(|state: &mut AppState| {
			state.loading = true;
			state.error = None;
		}),
		"repositories/request",
	)?;

	let mut query = ListQuery::from_state(&store.get_state());
	let mut result = api.list_repositories(&query).await;
	if let Ok(page) = &result {
		let last_page = total_pages(page.total, page.limit);
		if page.total > 0 && page.page > last_page {
			debug!("Page {} is past the last page {}. Fetching that instead.", page.page, last_page);
			query.page = last_page;
			result = api.list_repositories(&query).await;
		}
	}

	match result {
		Ok(page) => {
			debug!("Loaded {} of {} repositories.", page.repositories.len(), page.total);
			store.set_state(
				Update::draft(move |state: &mut AppState| {
					state.repositories = page.repositories;
					state.total_count = page.total;
					state.current_page = page.page.max(1);
					state.page_size = page.limit;
					state.loading = false;
				}),
				"repositories/loaded",
			)?;
			Ok(())
		}
		Err(error) => {
			warn!("Loading repositories failed: {}", error);
			fail(store, "repositories/failed", &error)?;
			Err(error.into())
		}
	}
}

/// Collapses `repository` if it is expanded, otherwise expands it and fetches its tags unless already loaded.
///
/// Returns whether the repository is now expanded.
#[instrument(skip(store, api))]
pub async fn toggle_repository(store: &Store<AppState>, api: &impl RegistryApi, repository: &str) -> Result<bool, ActionError> {
	let state = store.get_state();
	let name = repository.to_owned();

	if state.is_expanded(repository) {
		store.set_state(
			Update::draft(move |state: &mut AppState| {
				state.expanded.remove(&name);
			}),
			"repositories/collapse",
		)?;
		return Ok(false);
	}

	let needs_tags = !state.tags.contains_key(repository);
	store.set_state(
		Update::draft({
			let name = name.clone();
			move |state: &mut AppState| {
				state.expanded.insert(name);
			}
		}),
		"repositories/expand",
	)?;

	if needs_tags {
		match api.list_tags(repository).await {
			Ok(page) => {
				store.set_state(
					Update::draft(move |state: &mut AppState| {
						state.tags.insert(name, page.tags);
					}),
					"tags/loaded",
				)?;
			}
			Err(error) => {
				warn!("Loading tags of {:?} failed: {}", repository, error);
				fail(store, "tags/failed", &error)?;
				return Err(error.into());
			}
		}
	}
	Ok(true)
}

fn fail(store: &Store<AppState>, action: &str, error: &ApiError) -> Result<bool, StoreError> {
	let message = error.to_string();
	store.set_state(
		Update::draft(move |state: &mut AppState| {
			state.loading = false;
			state.error = Some(message);
		}),
		action,
	)
}

/// Selects the given tag, or clears the selection if it is already selected.
pub fn select_tag(store: &Store<AppState>, repository: &str, tag: &str) -> Result<bool, StoreError> {
	let selected = TagRef {
		repository: repository.to_owned(),
		tag: tag.to_owned(),
	};
	store.set_state(
		Update::draft(move |state: &mut AppState| {
			state.selected_tag = if state.selected_tag.as_ref() == Some(&selected) {
				None
			} else {
				Some(selected)
			}
		}),
		"tags/select",
	)
}

pub fn set_search(store: &Store<AppState>, search_query: &str) -> Result<bool, StoreError> {
	let search_query = search_query.to_owned();
	store.set_state(Update::draft(move |state: &mut AppState| state.search_query = search_query), "search/set")
}

pub fn set_sort(store: &Store<AppState>, sort: SortSpec) -> Result<bool, StoreError> {
	store.set_state(Update::draft(move |state: &mut AppState| state.sort = sort), "sort/set")
}

pub fn set_page(store: &Store<AppState>, page: u32) -> Result<bool, StoreError> {
	store.set_state(Update::draft(move |state: &mut AppState| state.current_page = page), "page/set")
}

pub fn set_page_size(store: &Store<AppState>, page_size: u32) -> Result<bool, StoreError> {
	store.set_state(Update::draft(move |state: &mut AppState| state.page_size = page_size), "page/size")
}

/// A [`RegistryApi`] answering from memory, with case-insensitive substring search, stable sorting and pagination.
#[derive(Debug, Default)]
pub struct InMemoryRegistry {
	registry: Option<String>,
	repositories: Vec<Repository>,
	tags: BTreeMap<String, Vec<Tag>>,
	failure: RefCell<Option<ApiError>>,
	requests: Cell<usize>,
}
impl InMemoryRegistry {
	/// `registry` is the host prefix used in generated pull commands.
	#[must_use]
	pub fn new(registry: Option<&str>) -> Self {
		Self {
			registry: registry.map(ToOwned::to_owned),
			..Self::default()
		}
	}

	/// Adds an image, creating its repository if needed and updating the repository's summary.
	pub fn push_tag(&mut self, repository: &str, tag: &str, digest: &str, size_bytes: u64, created: Option<&str>) -> &mut Self {
		let mut entry = Tag::new(self.registry.as_deref(), repository, tag, digest, size_bytes);
		entry.created = created.map(ToOwned::to_owned);

		let tags = self.tags.entry(repository.to_owned()).or_default();
		tags.retain(|existing| existing.tag != tag);
		tags.push(entry);

		let tag_count = u32::try_from(tags.len()).unwrap_or(u32::MAX);
		let size_bytes = tags.iter().map(|tag| tag.size_bytes).sum();
		let last_updated = tags.iter().filter_map(|tag| tag.created.clone()).max();

		match self.repositories.iter_mut().find(|existing| existing.name == repository) {
			Some(existing) => {
				existing.tag_count = tag_count;
				existing.size_bytes = Some(size_bytes);
				existing.last_updated = last_updated;
			}
			None => self.repositories.push(Repository {
				name: repository.to_owned(),
				tag_count,
				last_updated,
				size_bytes: Some(size_bytes),
			}),
		}
		self
	}

	/// Makes the next request fail with `error`.
	pub fn fail_next(&self, error: ApiError) {
		*self.failure.borrow_mut() = Some(error);
	}

	/// How many requests were answered so far, failures included.
	#[must_use]
	pub fn requests(&self) -> usize {
		self.requests.get()
	}

	fn begin_request(&self) -> Result<(), ApiError> {
		self.requests.set(self.requests.get() + 1);
		match self.failure.borrow_mut().take() {
			Some(error) => Err(error),
			None => Ok(()),
		}
	}
}

fn compare(field: SortField, a: &Repository, b: &Repository) -> Ordering {
	let by_field = match field {
		SortField::Name => Ordering::Equal,
		SortField::TagCount => a.tag_count.cmp(&b.tag_count),
		SortField::LastUpdated => a.last_updated.cmp(&b.last_updated),
		SortField::Size => a.size_bytes.cmp(&b.size_bytes),
	};
	by_field.then_with(|| a.name.to_lowercase().cmp(&b.name.to_lowercase()))
}

impl RegistryApi for InMemoryRegistry {
	async fn list_repositories(&self, query: &ListQuery) -> Result<RepositoryPage, ApiError> {
		self.begin_request()?;

		let needle = query.search.as_deref().map(str::to_lowercase);
		let mut matches: Vec<&Repository> = self
			.repositories
			.iter()
			.filter(|repository| needle.as_deref().map_or(true, |needle| repository.name.to_lowercase().contains(needle)))
			.collect();
		matches.sort_by(|a, b| match query.sort.order {
			SortOrder::Asc => compare(query.sort.field, a, b),
			SortOrder::Desc => compare(query.sort.field, b, a),
		});

		let limit = clamp_page_size(query.limit);
		let page = query.page.max(1);
		let skip = usize::try_from(u64::from(page - 1) * u64::from(limit)).unwrap_or(usize::MAX);
		Ok(RepositoryPage {
			total: matches.len() as u64,
			repositories: matches.into_iter().skip(skip).take(limit as usize).cloned().collect(),
			page,
			limit,
		})
	}

	async fn list_tags(&self, repository: &str) -> Result<TagPage, ApiError> {
		self.begin_request()?;
		let tags = self
			.tags
			.get(repository)
			.ok_or_else(|| ApiError::not_found(&format!("Repository {:?}", repository)))?;
		Ok(TagPage {
			tags: tags.clone(),
			total: tags.len() as u64,
		})
	}
}
