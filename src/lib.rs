#![doc(html_root_url = "https://docs.rs/fiber-dom/0.1.0")]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

//! An incremental fiber reconciler with hooks.
//!
//! Declarative [`Element`] trees are diffed by position against a persistent fiber tree, one fiber per unit of work,
//! so rendering can be spread over many short [`Renderer::tick`]s. Once a generation is complete, the minimal set of
//! mutations is committed to a [`Host`] in one go.
//!
//! Function [`Component`]s keep state across renders through [`Hooks::use_state`] and run side effects after commit
//! through [`Hooks::use_effect`].
//!
//! [`testing::RecordingHost`] is an in-memory host for tests. With the `web` feature, [`web::DomHost`] renders into
//! the browser DOM and [`web::run_on_idle`] drives a [`Renderer`] from `requestIdleCallback`.

#[cfg(doctest)]
pub mod readme {
	doc_comment::doctest!("../README.md");
}

pub mod element;
pub mod fiber;
pub mod hooks;
pub mod host;
pub mod scheduler;
pub mod testing;

mod commit;
mod error;
mod immediate;
mod reconcile;

#[cfg(feature = "web")]
mod rc_hash_map;
#[cfg(feature = "web")]
pub mod web;

pub use element::{build, text, Component, Element, ElementType, Event, EventHandler, PropValue, Props, Style};
pub use error::RenderError;
pub use fiber::{EffectTag, FiberId};
pub use hooks::{Cleanup, Dep, Hooks, Setter};
pub use host::Host;
pub use immediate::render_immediate;
pub use scheduler::{Deadline, Progress, Renderer, UnitBudget, Unbounded};
