//! The narrow interface to the rendering surface.

use crate::element::{EventHandler, PropValue, Props, Style, EVENT_PREFIX, TEXT_ELEMENT};
use core::fmt::Debug;
use tracing::{instrument, trace, warn};

/// A rendering surface the reconciler commits to.
///
/// All calls are expected to be synchronous. Failures are not caught: they abort the current tick or immediate
/// render and are handed to its caller as [`RenderError::Host`](`crate::RenderError::Host`).
pub trait Host {
	/// A handle to a host node. Cloning must yield a handle to the *same* node.
	type Node: Clone + Debug;
	type Error: std::error::Error + 'static;

	fn create_element(&mut self, tag: &str) -> Result<Self::Node, Self::Error>;
	fn create_text(&mut self, text: &str) -> Result<Self::Node, Self::Error>;

	fn set_property(&mut self, node: &Self::Node, name: &str, value: &str) -> Result<(), Self::Error>;
	fn set_style(&mut self, node: &Self::Node, style: &Style) -> Result<(), Self::Error>;
	fn remove_property(&mut self, node: &Self::Node, name: &str) -> Result<(), Self::Error>;

	/// `event` is already stripped of its prefix and lower-cased, see [`event_name`].
	fn add_event_listener(&mut self, node: &Self::Node, event: &str, handler: &EventHandler) -> Result<(), Self::Error>;
	fn remove_event_listener(&mut self, node: &Self::Node, event: &str, handler: &EventHandler) -> Result<(), Self::Error>;

	fn append_child(&mut self, parent: &Self::Node, child: &Self::Node) -> Result<(), Self::Error>;
	fn remove_child(&mut self, parent: &Self::Node, child: &Self::Node) -> Result<(), Self::Error>;
}

#[must_use]
pub fn is_event(name: &str) -> bool {
	name.starts_with(EVENT_PREFIX)
}

/// The event subscribed to by an `on…` prop: `onClick` → `click`.
#[must_use]
pub fn event_name(name: &str) -> Option<String> {
	name.strip_prefix(EVENT_PREFIX).map(str::to_lowercase)
}

fn changed(prev: &Props, next: &Props, name: &str) -> bool {
	match (prev.get(name), next.get(name)) {
		(Some(a), Some(b)) => !a.same(b),
		_ => true,
	}
}

/// A single host call of a property delta.
#[derive(Clone, Debug)]
pub(crate) enum Mutation {
	RemoveListener { event: String, handler: EventHandler },
	RemoveProperty(String),
	SetProperty { name: String, value: String },
	SetStyle(Style),
	AddListener { event: String, handler: EventHandler },
}
impl Mutation {
	pub(crate) fn apply<H: Host + ?Sized>(&self, host: &mut H, node: &H::Node) -> Result<(), H::Error> {
		match self {
			Mutation::RemoveListener { event, handler } => {
				trace!(event = event.as_str(), "Removing event listener.");
				host.remove_event_listener(node, event, handler)
			}
			Mutation::RemoveProperty(name) => {
				trace!(name = name.as_str(), "Removing property.");
				host.remove_property(node, name)
			}
			Mutation::SetProperty { name, value } => {
				#[cfg(feature = "dangerous-logging")]
				trace!(name = name.as_str(), value = value.as_str(), "Setting property.");
				#[cfg(not(feature = "dangerous-logging"))]
				trace!(name = name.as_str(), "Setting property.");
				host.set_property(node, name, value)
			}
			Mutation::SetStyle(style) => {
				trace!(declarations = style.iter().count(), "Setting style.");
				host.set_style(node, style)
			}
			Mutation::AddListener { event, handler } => {
				trace!(event = event.as_str(), "Adding event listener.");
				host.add_event_listener(node, event, handler)
			}
		}
	}

	fn is_listener(&self) -> bool {
		matches!(self, Mutation::RemoveListener { .. } | Mutation::AddListener { .. })
	}
}

/// The event subscriptions of `props`, in sorted prop name order.
pub(crate) fn listeners(props: &Props) -> impl Iterator<Item = (String, &EventHandler)> {
	props.sorted_names().into_iter().filter_map(move |name| match (event_name(name), props.get(name)) {
		(Some(event), Some(PropValue::Handler(handler))) => Some((event, handler)),
		_ => None,
	})
}

/// The host calls that turn `prev` into `next`.
///
/// Stale listeners go first, then removed properties, then new or changed properties, then new listeners.
pub(crate) fn property_delta(prev: &Props, next: &Props) -> Vec<Mutation> {
	let prev_names = prev.sorted_names();
	let next_names = next.sorted_names();
	let mut delta = Vec::new();

	for &name in prev_names.iter().filter(|&&name| is_event(name)) {
		if !next.contains(name) || changed(prev, next, name) {
			if let (Some(event), Some(PropValue::Handler(handler))) = (event_name(name), prev.get(name)) {
				delta.push(Mutation::RemoveListener { event, handler: handler.clone() });
			}
		}
	}

	for &name in prev_names.iter().filter(|&&name| !is_event(name)) {
		if !next.contains(name) {
			delta.push(Mutation::RemoveProperty(name.to_owned()));
		}
	}

	for &name in next_names.iter().filter(|&&name| !is_event(name)) {
		if !changed(prev, next, name) {
			continue;
		}
		match next.get(name) {
			Some(PropValue::Text(value)) => delta.push(Mutation::SetProperty {
				name: name.to_owned(),
				value: value.clone(),
			}),
			Some(PropValue::Style(style)) => delta.push(Mutation::SetStyle(style.clone())),
			Some(other) => warn!(name, ?other, "Ignoring property value that the host can't represent."),
			None => (),
		}
	}

	for &name in next_names.iter().filter(|&&name| is_event(name)) {
		if !changed(prev, next, name) {
			continue;
		}
		match (event_name(name), next.get(name)) {
			(Some(event), Some(PropValue::Handler(handler))) => delta.push(Mutation::AddListener { event, handler: handler.clone() }),
			(_, other) => warn!(name, ?other, "Ignoring event prop without handler."),
		}
	}

	delta
}

/// Applies the property delta between `prev` and `next` to `node`.
///
/// Stale listeners go first, then removed properties, then new or changed properties, then new listeners.
#[instrument(level = "trace", skip_all, fields(node = ?node))]
pub fn update_properties<H: Host + ?Sized>(host: &mut H, node: &H::Node, prev: &Props, next: &Props) -> Result<(), H::Error> {
	for mutation in property_delta(prev, next) {
		mutation.apply(host, node)?;
	}
	Ok(())
}

/// Creates the host node for a host tag and assigns the properties of `props` to it.
///
/// Event listeners are left out. They are attached once the node is placed, see [`attach_listeners`].
#[instrument(level = "trace", skip(host, props))]
pub(crate) fn create_node<H: Host + ?Sized>(host: &mut H, tag: &str, props: &Props) -> Result<H::Node, H::Error> {
	let node = if tag == TEXT_ELEMENT { host.create_text("")? } else { host.create_element(tag)? };
	for mutation in property_delta(&Props::new(), props).into_iter().filter(|mutation| !mutation.is_listener()) {
		mutation.apply(host, &node)?;
	}
	Ok(node)
}

pub(crate) fn attach_listeners<H: Host + ?Sized>(host: &mut H, node: &H::Node, props: &Props) -> Result<(), H::Error> {
	for (event, handler) in listeners(props) {
		trace!(event = event.as_str(), "Adding event listener.");
		host.add_event_listener(node, &event, handler)?;
	}
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::testing::{HostOp, RecordingHost};

	#[test]
	fn event_names() {
		assert_eq!(event_name("onClick").as_deref(), Some("click"));
		assert_eq!(event_name("onKeyDown").as_deref(), Some("keydown"));
		assert_eq!(event_name("id"), None);
		assert!(!is_event("children"));
	}

	#[test]
	fn delta_order_and_content() {
		let mut host = RecordingHost::new();
		let node = host.create_element("input").unwrap();
		let kept = EventHandler::new(|_| ());
		let prev = Props::new()
			.with("id", "a")
			.with("title", "gone")
			.with("value", "same")
			.with("onInput", EventHandler::new(|_| ()))
			.with("onFocus", kept.clone());
		let next = Props::new().with("id", "b").with("value", "same").with("onInput", EventHandler::new(|_| ())).with("onFocus", kept);
		host.clear_ops();

		update_properties(&mut host, &node, &prev, &next).unwrap();

		assert_eq!(
			host.ops(),
			[
				HostOp::RemoveEventListener { node, event: "input".to_owned() },
				HostOp::RemoveProperty { node, name: "title".to_owned() },
				HostOp::SetProperty {
					node,
					name: "id".to_owned(),
					value: "b".to_owned()
				},
				HostOp::AddEventListener { node, event: "input".to_owned() },
			]
		);
	}

	#[test]
	fn identical_props_are_a_no_op() {
		let mut host = RecordingHost::new();
		let node = host.create_element("p").unwrap();
		let props = Props::new().with("id", "x").with("style", Style::new().with("color", "red"));
		host.clear_ops();
		update_properties(&mut host, &node, &props, &props.clone()).unwrap();
		assert!(host.ops().is_empty());
	}

	#[test]
	fn created_nodes_have_no_listeners_yet() {
		let mut host = RecordingHost::new();
		let props = Props::new().with("id", "x").on("click", |_| ());
		let node = create_node(&mut host, "button", &props).unwrap();
		assert_eq!(host.listener_count(node, "click"), 0);
		assert_eq!(host.property(node, "id"), Some("x"));

		attach_listeners(&mut host, &node, &props).unwrap();
		assert_eq!(host.listener_count(node, "click"), 1);
	}

	#[test]
	fn text_nodes_receive_their_value() {
		let mut host = RecordingHost::new();
		let node = create_node(&mut host, TEXT_ELEMENT, &crate::element::text("hi").props).unwrap();
		assert_eq!(host.text_content(node), "hi");
	}
}
