//! The browser DOM as [`Host`], and a `requestIdleCallback` driver.
//!
//! Event listeners are backed by one [`Closure`] per distinct [`EventHandler`], reference-counted across all nodes
//! and events it is attached to.

use crate::{
	element::{Event, EventHandler, Style},
	host::Host,
	rc_hash_map::RcHashMap,
	scheduler::{Deadline, Progress, Renderer},
};
use core::cell::RefCell;
use js_sys::{Function, Reflect};
use std::rc::Rc;
use thiserror::Error;
use tracing::{debug, error, instrument, trace, warn};
use wasm_bindgen::{closure::Closure, JsCast, JsValue};
use web_sys::{Document, HtmlElement, IdleDeadline, Node, Window};

#[derive(Debug, Error)]
pub enum DomError {
	#[error("JavaScript exception: {0}")]
	Js(String),
	#[error("no global `window`")]
	NoWindow,
	#[error("no `document` on `window`")]
	NoDocument,
	#[error("too many (more than 65k) active references to the same event handler")]
	ListenerCountSaturated,
	#[error("removed event listener was never added")]
	UnknownListener,
}
impl From<JsValue> for DomError {
	fn from(value: JsValue) -> Self {
		Self::Js(format!("{:?}", value))
	}
}

/// Mutates the DOM of one [`Document`].
pub struct DomHost {
	document: Document,
	listeners: RcHashMap<usize, u16, Closure<dyn Fn(web_sys::Event)>>,
}
impl core::fmt::Debug for DomHost {
	fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
		f.debug_struct("DomHost").field("document", &self.document).field("listeners", &self.listeners.len()).finish()
	}
}
impl DomHost {
	#[must_use]
	pub fn new(document: Document) -> Self {
		Self {
			document,
			listeners: RcHashMap::new(),
		}
	}

	/// A host for the document of the global `window`.
	///
	/// # Errors
	///
	/// Iff there is no global `window` or it has no `document`.
	pub fn for_window() -> Result<Self, DomError> {
		let document = web_sys::window().ok_or(DomError::NoWindow)?.document().ok_or(DomError::NoDocument)?;
		Ok(Self::new(document))
	}

	#[must_use]
	pub fn document(&self) -> &Document {
		&self.document
	}

	/// The number of distinct event handlers that currently have a listener closure.
	#[must_use]
	pub fn listener_closure_count(&self) -> usize {
		self.listeners.len()
	}
}

impl Host for DomHost {
	type Node = Node;
	type Error = DomError;

	fn create_element(&mut self, tag: &str) -> Result<Node, DomError> {
		Ok(self.document.create_element(tag)?.into())
	}

	fn create_text(&mut self, text: &str) -> Result<Node, DomError> {
		Ok(self.document.create_text_node(text).into())
	}

	fn set_property(&mut self, node: &Node, name: &str, value: &str) -> Result<(), DomError> {
		Reflect::set(node, &JsValue::from_str(name), &JsValue::from_str(value))?;
		Ok(())
	}

	fn set_style(&mut self, node: &Node, style: &Style) -> Result<(), DomError> {
		match node.dyn_ref::<HtmlElement>() {
			Some(element) => element.style().set_css_text(&style.css_text()),
			None => match node.dyn_ref::<web_sys::Element>() {
				Some(element) => element.set_attribute("style", &style.css_text())?,
				None => warn!(?node, "Ignoring style on a node that isn't an element."),
			},
		}
		Ok(())
	}

	fn remove_property(&mut self, node: &Node, name: &str) -> Result<(), DomError> {
		if name == "style" {
			if let Some(element) = node.dyn_ref::<web_sys::Element>() {
				element.remove_attribute("style")?;
				return Ok(());
			}
		}
		Reflect::set(node, &JsValue::from_str(name), &JsValue::from_str(""))?;
		Ok(())
	}

	#[instrument(level = "trace", skip(self, handler))]
	fn add_event_listener(&mut self, node: &Node, event: &str, handler: &EventHandler) -> Result<(), DomError> {
		let closure = self
			.listeners
			.increment_or_insert_with(handler.key(), || {
				trace!("Creating listener closure.");
				let handler = handler.clone();
				Closure::wrap(Box::new(move |event: web_sys::Event| handler.call(&Event::new(&event))) as Box<dyn Fn(web_sys::Event)>)
			})
			.map_err(|_| DomError::ListenerCountSaturated)?;
		let function: &Function = closure.as_ref().unchecked_ref();
		node.add_event_listener_with_callback(event, function)?;
		Ok(())
	}

	#[instrument(level = "trace", skip(self, handler))]
	fn remove_event_listener(&mut self, node: &Node, event: &str, handler: &EventHandler) -> Result<(), DomError> {
		let closure = self
			.listeners
			.weak_decrement(&handler.key())
			.map_err(|_| DomError::UnknownListener)?
			.ok_or(DomError::UnknownListener)?;
		let function: &Function = closure.as_ref().unchecked_ref();
		node.remove_event_listener_with_callback(event, function)?;

		let freed = self.listeners.drain_weak().count();
		trace!(freed, "Freed listener closure(s).");
		Ok(())
	}

	fn append_child(&mut self, parent: &Node, child: &Node) -> Result<(), DomError> {
		parent.append_child(child)?;
		Ok(())
	}

	fn remove_child(&mut self, parent: &Node, child: &Node) -> Result<(), DomError> {
		parent.remove_child(child)?;
		Ok(())
	}
}

/// Yields once less than a millisecond of idle time remains.
impl Deadline for IdleDeadline {
	fn should_yield(&mut self) -> bool {
		self.time_remaining() < 1.0
	}
}

type IdleCallback = Rc<RefCell<Option<Closure<dyn FnMut(IdleDeadline)>>>>;

/// Keeps ticking a [`Renderer`] from `requestIdleCallback` until dropped.
#[must_use = "Dropping the `IdleLoop` stops it."]
pub struct IdleLoop {
	window: Window,
	handle: Rc<RefCell<u32>>,
	callback: IdleCallback,
}
impl core::fmt::Debug for IdleLoop {
	fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
		f.debug_struct("IdleLoop").field("handle", &self.handle.borrow()).finish_non_exhaustive()
	}
}
impl Drop for IdleLoop {
	fn drop(&mut self) {
		self.window.cancel_idle_callback(*self.handle.borrow());
		// Breaks the closure's reference cycle through `callback`.
		drop(self.callback.borrow_mut().take());
		debug!("Stopped idle loop.");
	}
}

/// Starts ticking `renderer` whenever the browser is idle, one tick per idle period.
///
/// Errors from individual ticks are logged and the loop keeps going.
///
/// # Errors
///
/// Iff there is no global `window` or the first callback can't be requested.
pub fn run_on_idle(renderer: Rc<RefCell<Renderer<DomHost>>>) -> Result<IdleLoop, DomError> {
	let window = web_sys::window().ok_or(DomError::NoWindow)?;
	let handle = Rc::new(RefCell::new(0));
	let callback: IdleCallback = Rc::default();

	let closure = Closure::wrap(Box::new({
		let (window, handle, callback) = (window.clone(), Rc::clone(&handle), Rc::clone(&callback));
		move |deadline: IdleDeadline| {
			match renderer.try_borrow_mut() {
				Ok(mut renderer) => match renderer.tick(deadline) {
					Ok(Progress::Idle) => (),
					Ok(progress) => trace!(?progress, "Idle tick."),
					Err(error) => error!(%error, "Tick failed."),
				},
				Err(_) => warn!("Renderer is borrowed elsewhere. Skipping this idle period."),
			}

			if let Some(callback) = callback.borrow().as_ref() {
				match window.request_idle_callback(callback.as_ref().unchecked_ref()) {
					Ok(next) => *handle.borrow_mut() = next,
					Err(error) => error!(?error, "Failed to request the next idle callback. Stopping."),
				}
			}
		}
	}) as Box<dyn FnMut(IdleDeadline)>);

	*handle.borrow_mut() = window.request_idle_callback(closure.as_ref().unchecked_ref())?;
	*callback.borrow_mut() = Some(closure);
	debug!("Started idle loop.");
	Ok(IdleLoop { window, handle, callback })
}
