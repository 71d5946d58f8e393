//! The page's query-string parameters (`search`, `sort`, `page`, `limit`) and their mapping onto [`AppState`].
//!
//! Only decoded key-value pairs are handled here. [`web`](`crate::web`) reads and writes the actual location.

use crate::{
	app::{clamp_page_size, AppState, SortSpec, DEFAULT_PAGE_SIZE, RESTORE_QUERY_ACTION},
	error::StoreError,
	store::{Store, Update},
};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryState {
	pub search: String,
	pub sort: SortSpec,
	pub page: u32,
	pub limit: u32,
}
impl Default for QueryState {
	fn default() -> Self {
		Self {
			search: String::new(),
			sort: SortSpec::default(),
			page: 1,
			limit: DEFAULT_PAGE_SIZE,
		}
	}
}
impl QueryState {
	/// Reads the known parameters. Unknown keys are ignored, missing or unparsable values keep their default.
	pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
	where
		K: AsRef<str>,
		V: AsRef<str>,
	{
		let mut query = Self::default();
		for (key, value) in pairs {
			let value = value.as_ref();
			match key.as_ref() {
				"search" => query.search = value.to_owned(),
				"sort" => match value.parse() {
					Ok(sort) => query.sort = sort,
					Err(error) => debug!("Ignoring `sort` parameter: {}", error),
				},
				"page" => match value.parse::<u32>() {
					Ok(page) if page >= 1 => query.page = page,
					_ => debug!("Ignoring `page` parameter {:?}.", value),
				},
				"limit" => match value.parse::<u32>() {
					Ok(limit) => query.limit = clamp_page_size(limit),
					Err(_) => debug!("Ignoring `limit` parameter {:?}.", value),
				},
				_ => (),
			}
		}
		query
	}

	/// The parameters that differ from their defaults, in `search`, `sort`, `page`, `limit` order.
	#[must_use]
	pub fn to_pairs(&self) -> Vec<(&'static str, String)> {
		let defaults = Self::default();
		let mut pairs = Vec::new();
		if !self.search.is_empty() {
			pairs.push(("search", self.search.clone()));
		}
		if self.sort != defaults.sort {
			pairs.push(("sort", self.sort.to_string()));
		}
		if self.page != defaults.page {
			pairs.push(("page", self.page.to_string()));
		}
		if self.limit != defaults.limit {
			pairs.push(("limit", self.limit.to_string()));
		}
		pairs
	}

	#[must_use]
	pub fn from_state(state: &AppState) -> Self {
		Self {
			search: state.search_query.clone(),
			sort: state.sort,
			page: state.current_page.max(1),
			limit: clamp_page_size(state.page_size),
		}
	}

	pub fn apply_to(&self, state: &mut AppState) {
		state.search_query = self.search.clone();
		state.sort = self.sort;
		state.current_page = self.page;
		state.page_size = self.limit;
	}
}

/// Commits `query` to `store` as one [`RESTORE_QUERY_ACTION`] action, which keeps its page even though search and sort change.
pub fn restore(store: &Store<AppState>, query: QueryState) -> Result<bool, StoreError> {
	store.set_state(Update::draft(move |state: &mut AppState| query.apply_to(state)), RESTORE_QUERY_ACTION)
}
