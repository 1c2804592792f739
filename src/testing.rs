//! An in-memory [`Host`] that records every operation, for tests.

use crate::{
	element::{Event, EventHandler, Style, NODE_VALUE},
	host::Host,
};
use core::{
	any::Any,
	fmt::{self, Debug, Formatter, Write},
};
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::trace;

/// A handle to a node of a [`RecordingHost`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(usize);

/// One recorded host call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HostOp {
	CreateElement { node: NodeId, tag: String },
	CreateText { node: NodeId },
	SetProperty { node: NodeId, name: String, value: String },
	SetStyle { node: NodeId, css_text: String },
	RemoveProperty { node: NodeId, name: String },
	AddEventListener { node: NodeId, event: String },
	RemoveEventListener { node: NodeId, event: String },
	AppendChild { parent: NodeId, child: NodeId },
	RemoveChild { parent: NodeId, child: NodeId },
}
impl HostOp {
	/// Whether this operation changes the node tree itself rather than a node's properties.
	#[must_use]
	pub fn is_structural(&self) -> bool {
		matches!(
			self,
			HostOp::CreateElement { .. } | HostOp::CreateText { .. } | HostOp::AppendChild { .. } | HostOp::RemoveChild { .. }
		)
	}
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RecordingHostError {
	#[error("unknown node {0:?}")]
	UnknownNode(NodeId),
	#[error("{child:?} is not a child of {parent:?}")]
	NotAChild { parent: NodeId, child: NodeId },
	#[error("no listener for {event:?} on {node:?} matches the handler")]
	UnknownListener { node: NodeId, event: String },
	#[error("injected failure at {0:?}")]
	Injected(HostOp),
}

#[derive(Debug)]
enum Kind {
	Element(String),
	Text,
}

#[derive(Debug)]
struct Node {
	kind: Kind,
	properties: BTreeMap<String, String>,
	style: Option<String>,
	listeners: Vec<(String, EventHandler)>,
	parent: Option<NodeId>,
	children: Vec<NodeId>,
}
impl Node {
	fn new(kind: Kind) -> Self {
		Self {
			kind,
			properties: BTreeMap::new(),
			style: None,
			listeners: Vec::new(),
			parent: None,
			children: Vec::new(),
		}
	}
}

/// Keeps a node tree in memory and a log of every [`Host`] call made against it.
///
/// Nodes are never freed, so [`NodeId`]s stay valid for the lifetime of the host.
#[derive(Default)]
pub struct RecordingHost {
	nodes: Vec<Node>,
	ops: Vec<HostOp>,
	#[allow(clippy::type_complexity)]
	fail_when: Option<Box<dyn Fn(&HostOp) -> bool>>,
}
impl Debug for RecordingHost {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.debug_struct("RecordingHost")
			.field("nodes", &self.nodes.len())
			.field("ops", &self.ops.len())
			.field("fail_when", &self.fail_when.is_some())
			.finish()
	}
}
impl RecordingHost {
	#[must_use]
	pub fn new() -> Self {
		Self::default()
	}

	/// Creates an element without recording it, to mount into.
	pub fn create_container(&mut self, tag: &str) -> NodeId {
		self.push(Kind::Element(tag.to_owned()))
	}

	#[must_use]
	pub fn ops(&self) -> &[HostOp] {
		&self.ops
	}

	/// Returns and forgets the operations recorded so far.
	pub fn take_ops(&mut self) -> Vec<HostOp> {
		std::mem::take(&mut self.ops)
	}

	pub fn clear_ops(&mut self) {
		self.ops.clear()
	}

	/// Makes every later operation matching `predicate` fail with [`RecordingHostError::Injected`] instead.
	pub fn fail_when(&mut self, predicate: impl 'static + Fn(&HostOp) -> bool) {
		self.fail_when = Some(Box::new(predicate))
	}

	pub fn stop_failing(&mut self) {
		self.fail_when = None
	}

	/// The element tag of `node`, or [`None`] for text nodes and unknown handles.
	#[must_use]
	pub fn tag(&self, node: NodeId) -> Option<&str> {
		match &self.nodes.get(node.0)?.kind {
			Kind::Element(tag) => Some(tag),
			Kind::Text => None,
		}
	}

	#[must_use]
	pub fn property(&self, node: NodeId, name: &str) -> Option<&str> {
		self.nodes.get(node.0)?.properties.get(name).map(String::as_str)
	}

	/// The CSS text last assigned through [`Host::set_style`].
	#[must_use]
	pub fn style(&self, node: NodeId) -> Option<&str> {
		self.nodes.get(node.0)?.style.as_deref()
	}

	#[must_use]
	pub fn children(&self, node: NodeId) -> &[NodeId] {
		self.nodes.get(node.0).map_or(&[], |node| &node.children)
	}

	#[must_use]
	pub fn parent(&self, node: NodeId) -> Option<NodeId> {
		self.nodes.get(node.0)?.parent
	}

	/// The number of listeners for `event` currently attached to `node`.
	#[must_use]
	pub fn listener_count(&self, node: NodeId, event: &str) -> usize {
		self.nodes
			.get(node.0)
			.map_or(0, |node| node.listeners.iter().filter(|(name, _)| name == event).count())
	}

	/// The concatenated text of all text nodes at or below `node`.
	#[must_use]
	pub fn text_content(&self, node: NodeId) -> String {
		let mut text = String::new();
		self.collect_text(node, &mut text);
		text
	}

	fn collect_text(&self, node: NodeId, text: &mut String) {
		if let Some(data) = self.nodes.get(node.0) {
			match data.kind {
				Kind::Text => text.push_str(data.properties.get(NODE_VALUE).map_or("", String::as_str)),
				Kind::Element(_) => {
					for &child in &data.children {
						self.collect_text(child, text)
					}
				}
			}
		}
	}

	/// Serializes the children of `node` as HTML-like markup, with attributes in name order.
	#[must_use]
	pub fn to_markup(&self, node: NodeId) -> String {
		let mut markup = String::new();
		for &child in self.children(node) {
			self.write_markup(child, &mut markup);
		}
		markup
	}

	fn write_markup(&self, node: NodeId, markup: &mut String) {
		let data = match self.nodes.get(node.0) {
			Some(data) => data,
			None => return,
		};
		match &data.kind {
			Kind::Text => markup.push_str(data.properties.get(NODE_VALUE).map_or("", String::as_str)),
			Kind::Element(tag) => {
				markup.push('<');
				markup.push_str(tag);
				for (name, value) in &data.properties {
					// Writing to a `String` can't fail.
					let _ = write!(markup, " {}={:?}", name, value);
				}
				if let Some(style) = &data.style {
					let _ = write!(markup, " style={:?}", style);
				}
				markup.push('>');
				for &child in &data.children {
					self.write_markup(child, markup);
				}
				let _ = write!(markup, "</{}>", tag);
			}
		}
	}

	/// Calls every listener for `event` on `node` with `payload`. Returns how many were called.
	///
	/// Handlers are collected before any is called, so they may freely re-enter the renderer.
	pub fn dispatch(&self, node: NodeId, event: &str, payload: &dyn Any) -> usize {
		let handlers: Vec<EventHandler> = self.nodes.get(node.0).map_or_else(Vec::new, |node| {
			node.listeners
				.iter()
				.filter(|(name, _)| name == event)
				.map(|(_, handler)| handler.clone())
				.collect()
		});
		trace!(?node, event, handlers = handlers.len(), "Dispatching.");
		for handler in &handlers {
			handler.call(&Event::new(payload));
		}
		handlers.len()
	}

	fn push(&mut self, kind: Kind) -> NodeId {
		self.nodes.push(Node::new(kind));
		NodeId(self.nodes.len() - 1)
	}

	fn record(&mut self, op: HostOp) -> Result<(), RecordingHostError> {
		if self.fail_when.as_ref().map_or(false, |fail_when| fail_when(&op)) {
			return Err(RecordingHostError::Injected(op));
		}
		self.ops.push(op);
		Ok(())
	}

	fn node_mut(&mut self, node: NodeId) -> Result<&mut Node, RecordingHostError> {
		self.nodes.get_mut(node.0).ok_or(RecordingHostError::UnknownNode(node))
	}

	fn detach(&mut self, child: NodeId) -> Result<(), RecordingHostError> {
		if let Some(parent) = self.node_mut(child)?.parent.take() {
			self.node_mut(parent)?.children.retain(|&c| c != child);
		}
		Ok(())
	}
}

impl Host for RecordingHost {
	type Node = NodeId;
	type Error = RecordingHostError;

	fn create_element(&mut self, tag: &str) -> Result<NodeId, RecordingHostError> {
		let node = NodeId(self.nodes.len());
		self.record(HostOp::CreateElement { node, tag: tag.to_owned() })?;
		Ok(self.push(Kind::Element(tag.to_owned())))
	}

	fn create_text(&mut self, text: &str) -> Result<NodeId, RecordingHostError> {
		let node = NodeId(self.nodes.len());
		self.record(HostOp::CreateText { node })?;
		let node = self.push(Kind::Text);
		if !text.is_empty() {
			self.node_mut(node)?.properties.insert(NODE_VALUE.to_owned(), text.to_owned());
		}
		Ok(node)
	}

	fn set_property(&mut self, node: &NodeId, name: &str, value: &str) -> Result<(), RecordingHostError> {
		self.node_mut(*node)?;
		self.record(HostOp::SetProperty {
			node: *node,
			name: name.to_owned(),
			value: value.to_owned(),
		})?;
		self.node_mut(*node)?.properties.insert(name.to_owned(), value.to_owned());
		Ok(())
	}

	fn set_style(&mut self, node: &NodeId, style: &Style) -> Result<(), RecordingHostError> {
		self.node_mut(*node)?;
		let css_text = style.css_text();
		self.record(HostOp::SetStyle {
			node: *node,
			css_text: css_text.clone(),
		})?;
		self.node_mut(*node)?.style = Some(css_text);
		Ok(())
	}

	fn remove_property(&mut self, node: &NodeId, name: &str) -> Result<(), RecordingHostError> {
		self.node_mut(*node)?;
		self.record(HostOp::RemoveProperty { node: *node, name: name.to_owned() })?;
		let data = self.node_mut(*node)?;
		if name == "style" {
			data.style = None;
		}
		data.properties.remove(name);
		Ok(())
	}

	fn add_event_listener(&mut self, node: &NodeId, event: &str, handler: &EventHandler) -> Result<(), RecordingHostError> {
		self.node_mut(*node)?;
		self.record(HostOp::AddEventListener { node: *node, event: event.to_owned() })?;
		self.node_mut(*node)?.listeners.push((event.to_owned(), handler.clone()));
		Ok(())
	}

	fn remove_event_listener(&mut self, node: &NodeId, event: &str, handler: &EventHandler) -> Result<(), RecordingHostError> {
		let position = self
			.node_mut(*node)?
			.listeners
			.iter()
			.position(|(name, h)| name == event && h.ptr_eq(handler))
			.ok_or_else(|| RecordingHostError::UnknownListener {
				node: *node,
				event: event.to_owned(),
			})?;
		self.record(HostOp::RemoveEventListener { node: *node, event: event.to_owned() })?;
		self.node_mut(*node)?.listeners.remove(position);
		Ok(())
	}

	fn append_child(&mut self, parent: &NodeId, child: &NodeId) -> Result<(), RecordingHostError> {
		self.node_mut(*parent)?;
		self.node_mut(*child)?;
		self.record(HostOp::AppendChild { parent: *parent, child: *child })?;
		self.detach(*child)?;
		self.node_mut(*parent)?.children.push(*child);
		self.node_mut(*child)?.parent = Some(*parent);
		Ok(())
	}

	fn remove_child(&mut self, parent: &NodeId, child: &NodeId) -> Result<(), RecordingHostError> {
		if self.node_mut(*child)?.parent != Some(*parent) {
			return Err(RecordingHostError::NotAChild { parent: *parent, child: *child });
		}
		self.record(HostOp::RemoveChild { parent: *parent, child: *child })?;
		self.detach(*child)
	}
}
