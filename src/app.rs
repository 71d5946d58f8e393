//! RepoVista's own state: the registry listing, its query parameters and what is expanded or selected.

use crate::{
	middleware::{Middleware, Verdict},
	store::Store,
};
use core::{fmt, str::FromStr};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

pub const DEFAULT_PAGE_SIZE: u32 = 20;
pub const MAX_PAGE_SIZE: u32 = 100;

pub const TOTAL_PAGES: &str = "totalPages";
pub const HAS_NEXT_PAGE: &str = "hasNextPage";
pub const HAS_PREV_PAGE: &str = "hasPrevPage";

/// Applies a whole query at once. Exempt from [`reset_page_on_query_change`].
pub const RESTORE_QUERY_ACTION: &str = "query/restore";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Repository {
	pub name: String,
	pub tag_count: u32,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub last_updated: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub size_bytes: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tag {
	pub repository: String,
	pub tag: String,
	pub digest: String,
	pub size_bytes: u64,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub created: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub architecture: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub os: Option<String>,
	pub pull_command: String,
}
impl Tag {
	/// A tag without platform metadata. `registry` only affects [`Tag::pull_command`].
	#[must_use]
	pub fn new(registry: Option<&str>, repository: &str, tag: &str, digest: &str, size_bytes: u64) -> Self {
		Self {
			repository: repository.to_owned(),
			tag: tag.to_owned(),
			digest: digest.to_owned(),
			size_bytes,
			created: None,
			architecture: None,
			os: None,
			pull_command: pull_command(registry, repository, tag),
		}
	}
}

/// `docker pull [registry/]repository:tag`
#[must_use]
pub fn pull_command(registry: Option<&str>, repository: &str, tag: &str) -> String {
	match registry.map(|registry| registry.trim_end_matches('/')).filter(|registry| !registry.is_empty()) {
		Some(registry) => format!("docker pull {}/{}:{}", registry, repository, tag),
		None => format!("docker pull {}:{}", repository, tag),
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagRef {
	pub repository: String,
	pub tag: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortField {
	#[default]
	Name,
	TagCount,
	LastUpdated,
	Size,
}
impl SortField {
	#[must_use]
	pub fn as_str(self) -> &'static str {
		match self {
			SortField::Name => "name",
			SortField::TagCount => "tag_count",
			SortField::LastUpdated => "last_updated",
			SortField::Size => "size",
		}
	}
}
impl FromStr for SortField {
	type Err = UnknownSortField;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Ok(match s {
			"name" => SortField::Name,
			"tag_count" => SortField::TagCount,
			"last_updated" => SortField::LastUpdated,
			"size" => SortField::Size,
			_ => return Err(UnknownSortField(s.to_owned())),
		})
	}
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown sort field {0:?}. Expected one of `name`, `tag_count`, `last_updated` or `size`.")]
pub struct UnknownSortField(pub String);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
	#[default]
	Asc,
	Desc,
}
impl SortOrder {
	#[must_use]
	pub fn as_str(self) -> &'static str {
		match self {
			SortOrder::Asc => "asc",
			SortOrder::Desc => "desc",
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct SortSpec {
	pub field: SortField,
	pub order: SortOrder,
}
impl SortSpec {
	#[must_use]
	pub fn new(field: SortField, order: SortOrder) -> Self {
		Self { field, order }
	}
}
/// `field` for ascending order, `field:desc` otherwise.
impl fmt::Display for SortSpec {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self.order {
			SortOrder::Asc => f.write_str(self.field.as_str()),
			SortOrder::Desc => write!(f, "{}:desc", self.field.as_str()),
		}
	}
}
impl FromStr for SortSpec {
	type Err = UnknownSortField;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let (field, order) = match s.split_once(':') {
			Some((field, "desc")) => (field, SortOrder::Desc),
			Some((field, "asc")) => (field, SortOrder::Asc),
			Some(_) => return Err(UnknownSortField(s.to_owned())),
			None => (s, SortOrder::Asc),
		};
		Ok(Self::new(field.parse()?, order))
	}
}

/// Everything the RepoVista front end renders from.
///
/// `expanded` serializes as a sorted JSON array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AppState {
	pub repositories: Vec<Repository>,
	/// Loaded tag lists by repository name.
	pub tags: BTreeMap<String, Vec<Tag>>,
	pub search_query: String,
	pub sort: SortSpec,
	/// 1-based.
	pub current_page: u32,
	pub page_size: u32,
	pub total_count: u64,
	pub loading: bool,
	pub error: Option<String>,
	pub expanded: BTreeSet<String>,
	pub selected_tag: Option<TagRef>,
}
impl Default for AppState {
	fn default() -> Self {
		Self {
			repositories: Vec::new(),
			tags: BTreeMap::new(),
			search_query: String::new(),
			sort: SortSpec::default(),
			current_page: 1,
			page_size: DEFAULT_PAGE_SIZE,
			total_count: 0,
			loading: false,
			error: None,
			expanded: BTreeSet::new(),
			selected_tag: None,
		}
	}
}
impl AppState {
	#[must_use]
	pub fn total_pages(&self) -> u32 {
		total_pages(self.total_count, self.page_size)
	}

	#[must_use]
	pub fn has_next_page(&self) -> bool {
		self.current_page < self.total_pages()
	}

	#[must_use]
	pub fn has_prev_page(&self) -> bool {
		self.current_page > 1
	}

	#[must_use]
	pub fn is_expanded(&self, repository: &str) -> bool {
		self.expanded.contains(repository)
	}
}

#[must_use]
pub fn total_pages(total_count: u64, page_size: u32) -> u32 {
	let page_size = u64::from(page_size.clamp(1, MAX_PAGE_SIZE));
	u32::try_from((total_count + page_size - 1) / page_size).unwrap_or(u32::MAX)
}

#[must_use]
pub fn clamp_page_size(page_size: u32) -> u32 {
	page_size.clamp(1, MAX_PAGE_SIZE)
}

/// Sends the listing back to page 1 whenever the search query or sort order changes.
#[must_use]
pub fn reset_page_on_query_change() -> impl Middleware<AppState> {
	|action: &str, previous: &AppState, candidate: &AppState| {
		if action == RESTORE_QUERY_ACTION {
			return Verdict::Continue;
		}
		let query_changed = previous.search_query != candidate.search_query || previous.sort != candidate.sort;
		if query_changed && candidate.current_page != 1 {
			debug!("{} changed the query. Returning to page 1.", action);
			Verdict::Replace(AppState {
				current_page: 1,
				..candidate.clone()
			})
		} else {
			Verdict::Continue
		}
	}
}

/// Clamps `page_size` to `1..=100` and `current_page` to the known page range instead of rejecting the update.
#[must_use]
pub fn clamp_page() -> impl Middleware<AppState> {
	|action: &str, _previous: &AppState, candidate: &AppState| {
		let page_size = clamp_page_size(candidate.page_size);
		let last_page = total_pages(candidate.total_count, page_size).max(1);
		let current_page = if candidate.total_count == 0 {
			candidate.current_page.max(1)
		} else {
			candidate.current_page.clamp(1, last_page)
		};

		if page_size == candidate.page_size && current_page == candidate.current_page {
			Verdict::Continue
		} else {
			debug!(
				"{} left the page out of range. Clamping to page {} of size {}.",
				action, current_page, page_size
			);
			Verdict::Replace(AppState {
				current_page,
				page_size,
				..candidate.clone()
			})
		}
	}
}

/// Registers [`TOTAL_PAGES`], [`HAS_NEXT_PAGE`] and [`HAS_PREV_PAGE`] on `store`.
pub fn register_computed(store: &Store<AppState>) {
	store.computed(TOTAL_PAGES, AppState::total_pages, &["totalCount", "pageSize"]);
	store.computed(HAS_NEXT_PAGE, AppState::has_next_page, &["currentPage", "totalCount", "pageSize"]);
	store.computed(HAS_PREV_PAGE, AppState::has_prev_page, &["currentPage"]);
}

/// Installs the page middlewares (query reset first) and computed properties.
pub fn install(store: &Store<AppState>) {
	store.use_middleware(reset_page_on_query_change());
	store.use_middleware(clamp_page());
	register_computed(store);
}
