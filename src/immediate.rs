//! Eager one-shot mounting, without fibers or diffing.

use crate::{
	element::{Element, ElementType},
	error::RenderError,
	hooks::{Hooks, Invalidation},
	host::{attach_listeners, create_node, Host},
};
use tracing::{instrument, trace, trace_span};

/// Recursively creates host nodes for `element` and appends the result to `container`.
///
/// Components are invoked once with a throwaway hook context: state starts at its initial value, effects never run
/// and setters have no effect. The whole tree is validated and built before it is attached, so a malformed element
/// leaves `container` untouched.
///
/// # Errors
///
/// [`RenderError::MalformedChildren`] if any element's `children` prop is not a sequence of elements,
/// [`RenderError::Host`] if a host operation fails.
#[instrument(skip(host, element), fields(element_type = %element.element_type))]
pub fn render_immediate<H: Host + ?Sized>(host: &mut H, element: &Element, container: &H::Node) -> Result<(), RenderError<H::Error>> {
	let invalidation = Invalidation::default();
	let node = mount(host, element, &invalidation)?;
	host.append_child(container, &node).map_err(RenderError::Host)
}

fn mount<H: Host + ?Sized>(host: &mut H, element: &Element, invalidation: &Invalidation) -> Result<H::Node, RenderError<H::Error>> {
	let span = trace_span!("Mounting", element_type = %element.element_type);
	let _enter = span.enter();

	match &element.element_type {
		ElementType::Component(component) => {
			let mut hooks = Hooks::new(&[], invalidation);
			let rendered = component.render(&mut hooks, &element.props);
			drop(hooks.finish());
			mount(host, &rendered, invalidation)
		}
		ElementType::Host(tag) => {
			let children = element
				.props
				.children()
				.ok_or_else(|| RenderError::MalformedChildren { element_type: tag.clone() })?;
			let node = create_node(host, tag, &element.props).map_err(RenderError::Host)?;
			attach_listeners(host, &node, &element.props).map_err(RenderError::Host)?;
			for child in children {
				let child = mount(host, child, invalidation)?;
				host.append_child(&node, &child).map_err(RenderError::Host)?;
			}
			trace!(?node, children = children.len(), "Mounted.");
			Ok(node)
		}
	}
}
