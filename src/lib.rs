#![doc(html_root_url = "https://docs.rs/repovista/0.1.0")]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

//! The client-side core of RepoVista: an immutable [`Store`](`store::Store`) with time travel,
//! a keyed [`diff`](`diff::diff`)/[`apply`](`apply::apply`) pair over a [`Dom`](`dom::Dom`) backend,
//! a frame-budgeted [`Scheduler`](`scheduler::Scheduler`) and the [`RenderEngine`](`engine::RenderEngine`) tying them together.

#[cfg(doctest)]
pub mod readme {
	doc_comment::doctest!("../README.md");
}

pub mod app;
pub mod apply;
pub mod config;
pub mod diff;
pub mod dom;
pub mod engine;
pub mod error;
pub mod history;
pub mod host;
pub mod memory;
pub mod middleware;
pub mod patch;
pub mod path;
pub mod persist;
pub mod query;
pub mod registry;
pub mod scheduler;
pub mod store;
pub mod vdom;
pub mod web;

mod catch;
