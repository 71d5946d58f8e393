use repovista::{
	app::{self, pull_command, AppState, SortField, SortOrder, SortSpec, Tag, TagRef, HAS_NEXT_PAGE, HAS_PREV_PAGE, TOTAL_PAGES},
	error::{ActionError, ApiError},
	query::{self, QueryState},
	registry::{self, InMemoryRegistry, ListQuery, RegistryApi},
	store::{Store, StoreOptions, Update},
};
use serde_json::json;

fn store() -> Store<AppState> {
	let store = Store::new(AppState::default(), StoreOptions::default());
	app::install(&store);
	store
}

fn registry() -> InMemoryRegistry {
	let mut registry = InMemoryRegistry::new(Some("registry.example.com:5000"));
	registry
		.push_tag("nginx", "1.25", "sha256:aa", 70, Some("2024-03-01T00:00:00Z"))
		.push_tag("nginx", "latest", "sha256:ab", 71, Some("2024-04-01T00:00:00Z"))
		.push_tag("library/nginx-proxy", "2", "sha256:b0", 40, Some("2024-01-15T00:00:00Z"))
		.push_tag("redis", "7", "sha256:c0", 30, Some("2024-02-01T00:00:00Z"))
		.push_tag("postgres", "16", "sha256:d0", 150, None)
		.push_tag("postgres", "15", "sha256:d1", 140, None)
		.push_tag("postgres", "14", "sha256:d2", 130, None)
		.push_tag("Alpine", "3.19", "sha256:e0", 3, Some("2023-12-07T00:00:00Z"));
	registry
}

fn names(state: &AppState) -> Vec<&str> {
	state.repositories.iter().map(|repository| repository.name.as_str()).collect()
}

#[test]
fn search_returns_to_first_page() {
	let store = store();
	store
		.set_state(
			Update::draft(|state: &mut AppState| {
				state.total_count = 100;
				state.current_page = 3;
			}),
			"setup",
		)
		.unwrap();
	assert_eq!(store.get_state().current_page, 3);

	store.set_state(json!({ "searchQuery": "nginx" }), "search/set").unwrap();
	let state = store.get_state();
	assert_eq!(state.search_query, "nginx");
	assert_eq!(state.current_page, 1);

	registry::set_page(&store, 2).unwrap();
	registry::set_sort(&store, SortSpec::new(SortField::Size, SortOrder::Desc)).unwrap();
	assert_eq!(store.get_state().current_page, 1, "Sorting counts as a query change too.");
}

#[test]
fn page_changes_alone_are_kept() {
	let store = store();
	store.set_state(json!({ "totalCount": 95 }), "setup").unwrap();
	registry::set_page(&store, 4).unwrap();
	assert_eq!(store.get_state().current_page, 4);
}

#[test]
fn pages_are_clamped() {
	let store = store();
	store.set_state(json!({ "totalCount": 45 }), "setup").unwrap();

	registry::set_page(&store, 9).unwrap();
	assert_eq!(store.get_state().current_page, 3);

	registry::set_page(&store, 0).unwrap();
	assert_eq!(store.get_state().current_page, 1);

	registry::set_page_size(&store, 500).unwrap();
	let state = store.get_state();
	assert_eq!(state.page_size, 100);
	assert_eq!(state.total_pages(), 1);

	registry::set_page_size(&store, 0).unwrap();
	assert_eq!(store.get_state().page_size, 1);
}

#[test]
fn pages_are_not_clamped_before_anything_is_loaded() {
	let store = store();
	registry::set_page(&store, 5).unwrap();
	assert_eq!(store.get_state().current_page, 5);
}

#[test]
fn computed_pagination() {
	let store = store();
	store.set_state(json!({ "totalCount": 41 }), "setup").unwrap();
	assert_eq!(store.get_computed::<u32>(TOTAL_PAGES), Some(3));
	assert_eq!(store.get_computed::<bool>(HAS_NEXT_PAGE), Some(true));
	assert_eq!(store.get_computed::<bool>(HAS_PREV_PAGE), Some(false));

	registry::set_page(&store, 3).unwrap();
	assert_eq!(store.get_computed::<bool>(HAS_NEXT_PAGE), Some(false));
	assert_eq!(store.get_computed::<bool>(HAS_PREV_PAGE), Some(true));

	store.set_state(json!({ "loading": true }), "unrelated").unwrap();
	assert_eq!(store.get_computed::<u32>(TOTAL_PAGES), Some(3));
	assert_eq!(store.computations(TOTAL_PAGES), Some(1));
}

#[test]
fn total_pages() {
	assert_eq!(app::total_pages(0, 20), 0);
	assert_eq!(app::total_pages(1, 20), 1);
	assert_eq!(app::total_pages(20, 20), 1);
	assert_eq!(app::total_pages(21, 20), 2);
	assert_eq!(app::total_pages(10, 0), 10, "Page sizes are clamped to at least 1.");
}

#[test]
fn pull_commands() {
	assert_eq!(pull_command(None, "nginx", "latest"), "docker pull nginx:latest");
	assert_eq!(pull_command(Some("registry.local:5000/"), "team/app", "1.0"), "docker pull registry.local:5000/team/app:1.0");
	assert_eq!(pull_command(Some(""), "redis", "7"), "docker pull redis:7");
	assert_eq!(Tag::new(Some("r.io"), "x", "y", "sha256:0", 1).pull_command, "docker pull r.io/x:y");
}

#[test]
fn sort_specs() {
	assert_eq!("name".parse(), Ok(SortSpec::default()));
	assert_eq!("tag_count:desc".parse(), Ok(SortSpec::new(SortField::TagCount, SortOrder::Desc)));
	assert_eq!("size:asc".parse(), Ok(SortSpec::new(SortField::Size, SortOrder::Asc)));
	assert!("popularity".parse::<SortSpec>().is_err());
	assert!("name:sideways".parse::<SortSpec>().is_err());
	assert_eq!(SortSpec::new(SortField::LastUpdated, SortOrder::Desc).to_string(), "last_updated:desc");
}

#[test]
fn state_json_shape() {
	let mut state = AppState::default();
	state.expanded.insert("redis".to_owned());
	state.expanded.insert("nginx".to_owned());
	state.selected_tag = Some(TagRef {
		repository: "nginx".to_owned(),
		tag: "latest".to_owned(),
	});

	let json = serde_json::to_value(&state).unwrap();
	assert_eq!(json["currentPage"], json!(1));
	assert_eq!(json["pageSize"], json!(20));
	assert_eq!(json["sort"], json!({ "field": "name", "order": "asc" }));
	assert_eq!(json["expanded"], json!(["nginx", "redis"]));

	let back: AppState = serde_json::from_value(json).unwrap();
	assert_eq!(back, state);
	let sparse: AppState = serde_json::from_value(json!({ "searchQuery": "x" })).unwrap();
	assert_eq!(sparse.current_page, 1);
}

#[test]
fn list_query_from_state() {
	let state = AppState {
		search_query: "  nginx ".to_owned(),
		current_page: 0,
		page_size: 1000,
		..AppState::default()
	};
	let query = ListQuery::from_state(&state);
	assert_eq!(query.search.as_deref(), Some("nginx"));
	assert_eq!(query.page, 1);
	assert_eq!(query.limit, 100);

	assert_eq!(ListQuery::from_state(&AppState::default()).search, None);
}

#[test]
fn in_memory_search_sort_and_paging() {
	let registry = registry();
	let query = |search: Option<&str>, sort: &str, page: u32, limit: u32| ListQuery {
		search: search.map(ToOwned::to_owned),
		sort: sort.parse().unwrap(),
		page,
		limit,
	};
	let listed = |query: ListQuery| -> (Vec<String>, u64) {
		let page = pollster::block_on(registry.list_repositories(&query)).unwrap();
		(page.repositories.into_iter().map(|repository| repository.name).collect(), page.total)
	};

	assert_eq!(listed(query(Some("NGINX"), "name", 1, 20)), (vec!["library/nginx-proxy".to_owned(), "nginx".to_owned()], 2));
	assert_eq!(
		listed(query(None, "name", 1, 20)).0,
		["Alpine", "library/nginx-proxy", "nginx", "postgres", "redis"],
		"Names compare case-insensitively."
	);
	assert_eq!(listed(query(None, "tag_count:desc", 1, 2)), (vec!["postgres".to_owned(), "nginx".to_owned()], 5));
	// Descending order reverses the name tie-break as well.
	assert_eq!(listed(query(None, "tag_count:desc", 2, 2)).0, ["redis", "library/nginx-proxy"]);
	assert_eq!(listed(query(None, "tag_count:desc", 3, 2)).0, ["Alpine"]);
	assert_eq!(listed(query(None, "size", 1, 1)).0, ["Alpine"]);
	assert_eq!(listed(query(None, "last_updated:desc", 1, 1)).0, ["nginx"]);
	assert_eq!(listed(query(None, "name", 9, 20)), (vec![], 5));
	assert_eq!(registry.requests(), 8);
}

#[test]
fn load_repositories_into_the_store() {
	let store = store();
	let registry = registry();
	registry::set_page_size(&store, 2).unwrap();
	registry::set_sort(&store, SortSpec::new(SortField::Name, SortOrder::Desc)).unwrap();

	pollster::block_on(registry::load_repositories(&store, &registry)).unwrap();
	let state = store.get_state();
	assert_eq!(names(&state), ["redis", "postgres"]);
	assert_eq!(state.total_count, 5);
	assert_eq!(state.total_pages(), 3);
	assert!(!state.loading);
	assert_eq!(state.error, None);

	registry::set_page(&store, 3).unwrap();
	pollster::block_on(registry::load_repositories(&store, &registry)).unwrap();
	assert_eq!(names(&store.get_state()), ["Alpine"]);

	let actions = store.history_actions();
	assert_eq!(actions[actions.len() - 2..], ["repositories/request", "repositories/loaded"]);
}

#[test]
fn failed_load_sets_the_error() {
	let store = store();
	let registry = registry();
	registry.fail_next(ApiError::new(503, "registry unavailable"));

	let result = pollster::block_on(registry::load_repositories(&store, &registry));
	assert!(matches!(result, Err(ActionError::Api(ApiError { status: 503, .. }))));

	let state = store.get_state();
	assert!(!state.loading);
	assert_eq!(state.error.as_deref(), Some("registry request failed with status 503: registry unavailable"));

	pollster::block_on(registry::load_repositories(&store, &registry)).unwrap();
	assert_eq!(store.get_state().error, None, "A successful retry clears the error.");
}

#[test]
fn expanding_loads_tags_once() {
	let store = store();
	let registry = registry();

	assert!(pollster::block_on(registry::toggle_repository(&store, &registry, "postgres")).unwrap());
	let state = store.get_state();
	assert!(state.is_expanded("postgres"));
	assert_eq!(state.tags["postgres"].len(), 3);
	assert_eq!(state.tags["postgres"][0].pull_command, "docker pull registry.example.com:5000/postgres:16");
	assert_eq!(registry.requests(), 1);

	assert!(!pollster::block_on(registry::toggle_repository(&store, &registry, "postgres")).unwrap());
	assert!(!store.get_state().is_expanded("postgres"));
	assert!(pollster::block_on(registry::toggle_repository(&store, &registry, "postgres")).unwrap());
	assert_eq!(registry.requests(), 1, "Tags are only fetched once.");
}

#[test]
fn expanding_an_unknown_repository_fails() {
	let store = store();
	let registry = registry();
	let result = pollster::block_on(registry::toggle_repository(&store, &registry, "ghost"));
	assert!(matches!(result, Err(ActionError::Api(ApiError { status: 404, .. }))));

	let state = store.get_state();
	assert!(state.error.is_some());
	assert!(!state.tags.contains_key("ghost"));
}

#[test]
fn tag_selection_toggles() {
	let store = store();
	registry::select_tag(&store, "nginx", "latest").unwrap();
	assert_eq!(store.get_state().selected_tag.as_ref().map(|selected| selected.tag.as_str()), Some("latest"));

	registry::select_tag(&store, "nginx", "1.25").unwrap();
	assert_eq!(store.get_state().selected_tag.as_ref().map(|selected| selected.tag.as_str()), Some("1.25"));

	registry::select_tag(&store, "nginx", "1.25").unwrap();
	assert_eq!(store.get_state().selected_tag, None);
}

#[test]
fn query_parameters() {
	let query = QueryState::from_pairs([("search", "nginx"), ("sort", "size:desc"), ("page", "3"), ("limit", "500"), ("utm_source", "x")]);
	assert_eq!(
		query,
		QueryState {
			search: "nginx".to_owned(),
			sort: SortSpec::new(SortField::Size, SortOrder::Desc),
			page: 3,
			limit: 100,
		}
	);
	assert_eq!(
		query.to_pairs(),
		[
			("search", "nginx".to_owned()),
			("sort", "size:desc".to_owned()),
			("page", "3".to_owned()),
			("limit", "100".to_owned()),
		]
	);

	let garbage = QueryState::from_pairs([("sort", "weird"), ("page", "0"), ("limit", "many")]);
	assert_eq!(garbage, QueryState::default());
	assert!(garbage.to_pairs().is_empty());
}

#[test]
fn query_restore_keeps_the_page() {
	let store = store();
	let query = QueryState::from_pairs([("search", "redis"), ("page", "2")]);
	assert!(query::restore(&store, query.clone()).unwrap());

	let state = store.get_state();
	assert_eq!(state.search_query, "redis");
	assert_eq!(state.current_page, 2);
	assert_eq!(QueryState::from_state(&state), query);
}

#[test]
fn stale_page_past_the_end_loads_the_last_page() {
	let store = store();
	let mut registry = InMemoryRegistry::new(None);
	for i in 0..30 {
		registry.push_tag(&format!("repo-{:02}", i), "latest", "sha256:00", 1, None);
	}

	query::restore(&store, QueryState::from_pairs([("page", "5")])).unwrap();
	assert_eq!(store.get_state().current_page, 5);

	pollster::block_on(registry::load_repositories(&store, &registry)).unwrap();
	let state = store.get_state();
	assert_eq!(state.current_page, 2);
	assert_eq!(state.total_count, 30);
	assert_eq!(state.repositories.len(), 10);
	assert_eq!(state.repositories[0].name, "repo-20");
	assert_eq!(registry.requests(), 2);
}

#[test]
fn empty_listing_is_not_refetched() {
	let store = store();
	let registry = InMemoryRegistry::new(None);
	registry::set_page(&store, 3).unwrap();

	pollster::block_on(registry::load_repositories(&store, &registry)).unwrap();
	let state = store.get_state();
	assert!(state.repositories.is_empty());
	assert_eq!(state.total_count, 0);
	assert_eq!(registry.requests(), 1);
}
