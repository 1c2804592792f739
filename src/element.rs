//! The immutable description of what should exist.
//!
//! [`Element`]s are cheap to clone: their [`Props`] are reference-counted, so a host element's children can be handed to
//! the reconciler without copying the subtree.

use crate::hooks::Hooks;
use core::{
	any::Any,
	fmt::{self, Debug, Display, Formatter},
};
use hashbrown::HashMap;
use std::{collections::BTreeMap, rc::Rc};

/// The host tag of text elements. Their text lives in the [`NODE_VALUE`] prop.
pub const TEXT_ELEMENT: &str = "TEXT_ELEMENT";

/// The reserved prop name holding an element's children.
pub const CHILDREN: &str = "children";

/// The prop name carrying a text element's content.
pub const NODE_VALUE: &str = "nodeValue";

/// The prefix that marks a prop as an event subscription, as in `onClick`.
pub const EVENT_PREFIX: &str = "on";

/// A function component.
///
/// It receives the per-invocation hook context and its props and returns exactly one [`Element`].
pub type RenderFn = fn(&mut Hooks<'_>, &Props) -> Element;

/// A named reference to a function component.
///
/// Two components are the same iff they wrap the same function, regardless of name.
///
/// Identity is the function's address. That is not fully reliable: the compiler may merge two components with
/// identical bodies into one function, which then reconcile as the same component, and the same function can end up
/// with different addresses in different codegen units. Give distinct components distinct bodies, and wrap each one
/// in a [`Component`] in one place only (for example a `const`) when identity across crates matters.
#[derive(Clone, Copy)]
pub struct Component {
	name: &'static str,
	render: RenderFn,
}
impl Component {
	#[must_use]
	pub const fn new(name: &'static str, render: RenderFn) -> Self {
		Self { name, render }
	}

	#[must_use]
	pub fn name(&self) -> &'static str {
		self.name
	}

	pub(crate) fn render(&self, hooks: &mut Hooks<'_>, props: &Props) -> Element {
		(self.render)(hooks, props)
	}
}
impl PartialEq for Component {
	fn eq(&self, other: &Self) -> bool {
		self.render as usize == other.render as usize
	}
}
impl Eq for Component {}
impl Debug for Component {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		write!(f, "Component({})", self.name)
	}
}

/// Wraps a function in a [`Component`] named after it.
#[macro_export]
macro_rules! component {
	($render:path) => {
		$crate::element::Component::new(stringify!($render), $render)
	};
}

/// What an [`Element`] or fiber stands for.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ElementType {
	/// A host surface tag like `"div"`, or [`TEXT_ELEMENT`].
	Host(String),
	Component(Component),
}
impl ElementType {
	#[must_use]
	pub fn is_text(&self) -> bool {
		matches!(self, Self::Host(tag) if tag == TEXT_ELEMENT)
	}
}
impl Display for ElementType {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		match self {
			Self::Host(tag) => f.write_str(tag),
			Self::Component(component) => write!(f, "{}()", component.name),
		}
	}
}
impl From<&str> for ElementType {
	fn from(tag: &str) -> Self {
		Self::Host(tag.to_owned())
	}
}
impl From<String> for ElementType {
	fn from(tag: String) -> Self {
		Self::Host(tag)
	}
}
impl From<Component> for ElementType {
	fn from(component: Component) -> Self {
		Self::Component(component)
	}
}

/// An event payload as handed to an [`EventHandler`].
///
/// The payload type depends on the host, e.g. `web_sys::Event` for the `web` feature's `DomHost`.
pub struct Event<'a> {
	payload: &'a dyn Any,
}
impl<'a> Event<'a> {
	#[must_use]
	pub fn new(payload: &'a dyn Any) -> Self {
		Self { payload }
	}

	#[must_use]
	pub fn downcast_ref<T: Any>(&self) -> Option<&'a T> {
		self.payload.downcast_ref()
	}
}

/// A reference-counted event callback. Handlers are equal iff they share an allocation.
#[derive(Clone)]
pub struct EventHandler(Rc<dyn Fn(&Event<'_>)>);
impl EventHandler {
	pub fn new(handler: impl 'static + Fn(&Event<'_>)) -> Self {
		Self(Rc::new(handler))
	}

	pub fn call(&self, event: &Event<'_>) {
		(self.0)(event)
	}

	#[must_use]
	pub fn ptr_eq(&self, other: &Self) -> bool {
		self.key() == other.key()
	}

	/// A stable identity for as long as this handler (or a clone of it) is alive.
	pub(crate) fn key(&self) -> usize {
		Rc::as_ptr(&self.0).cast::<()>() as usize
	}
}
impl Debug for EventHandler {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		write!(f, "EventHandler({:#x})", self.key())
	}
}

/// A style sub-mapping with camelCase names, as in `backgroundColor`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Style(BTreeMap<String, String>);
impl Style {
	#[must_use]
	pub fn new() -> Self {
		Self::default()
	}

	#[must_use]
	pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
		self.0.insert(name.into(), value.into());
		self
	}

	pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
		self.0.iter().map(|(name, value)| (name.as_str(), value.as_str()))
	}

	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	/// Renders the declarations as CSS text, converting names to kebab-case.
	#[must_use]
	pub fn css_text(&self) -> String {
		self.iter().fold(String::new(), |mut css, (name, value)| {
			for c in name.chars() {
				if c.is_ascii_uppercase() {
					css.push('-');
					css.push(c.to_ascii_lowercase());
				} else {
					css.push(c);
				}
			}
			css.push_str(": ");
			css.push_str(value);
			css.push(';');
			css
		})
	}
}

#[derive(Clone, Debug)]
pub enum PropValue {
	Text(String),
	Handler(EventHandler),
	Style(Style),
	Children(Vec<Element>),
}
impl PropValue {
	/// Whether a host would observe no change when going from `self` to `other`.
	///
	/// Children never compare equal, since they are not host properties.
	#[must_use]
	pub fn same(&self, other: &Self) -> bool {
		match (self, other) {
			(Self::Text(a), Self::Text(b)) => a == b,
			(Self::Handler(a), Self::Handler(b)) => a.ptr_eq(b),
			(Self::Style(a), Self::Style(b)) => a == b,
			_ => false,
		}
	}
}
impl From<&str> for PropValue {
	fn from(text: &str) -> Self {
		Self::Text(text.to_owned())
	}
}
impl From<String> for PropValue {
	fn from(text: String) -> Self {
		Self::Text(text)
	}
}
impl From<EventHandler> for PropValue {
	fn from(handler: EventHandler) -> Self {
		Self::Handler(handler)
	}
}
impl From<Style> for PropValue {
	fn from(style: Style) -> Self {
		Self::Style(style)
	}
}

/// Named element properties, including the reserved [`CHILDREN`] entry.
#[derive(Clone, Debug, Default)]
pub struct Props(HashMap<String, PropValue>);
impl Props {
	#[must_use]
	pub fn new() -> Self {
		Self::default()
	}

	#[must_use]
	pub fn with(mut self, name: impl Into<String>, value: impl Into<PropValue>) -> Self {
		self.insert(name, value);
		self
	}

	/// Shorthand for an `on…` prop.
	#[must_use]
	pub fn on(self, event: &str, handler: impl 'static + Fn(&Event<'_>)) -> Self {
		let mut name = String::with_capacity(EVENT_PREFIX.len() + event.len());
		name.push_str(EVENT_PREFIX);
		let mut chars = event.chars();
		if let Some(first) = chars.next() {
			name.extend(first.to_uppercase());
			name.extend(chars);
		}
		self.with(name, EventHandler::new(handler))
	}

	pub fn insert(&mut self, name: impl Into<String>, value: impl Into<PropValue>) -> Option<PropValue> {
		self.0.insert(name.into(), value.into())
	}

	pub fn remove(&mut self, name: &str) -> Option<PropValue> {
		self.0.remove(name)
	}

	#[must_use]
	pub fn get(&self, name: &str) -> Option<&PropValue> {
		self.0.get(name)
	}

	#[must_use]
	pub fn text(&self, name: &str) -> Option<&str> {
		match self.0.get(name) {
			Some(PropValue::Text(text)) => Some(text),
			_ => None,
		}
	}

	#[must_use]
	pub fn contains(&self, name: &str) -> bool {
		self.0.contains_key(name)
	}

	pub fn iter(&self) -> impl Iterator<Item = (&str, &PropValue)> {
		self.0.iter().map(|(name, value)| (name.as_str(), value))
	}

	#[must_use]
	pub fn len(&self) -> usize {
		self.0.len()
	}

	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	/// The declared children.
	///
	/// A missing entry counts as no children. Returns [`None`] iff the [`CHILDREN`] entry holds something other than a
	/// sequence of elements.
	#[must_use]
	pub fn children(&self) -> Option<&[Element]> {
		match self.0.get(CHILDREN) {
			None => Some(&[]),
			Some(PropValue::Children(children)) => Some(children),
			Some(_) => None,
		}
	}

	/// Property names in sorted order, excluding [`CHILDREN`].
	pub(crate) fn sorted_names(&self) -> Vec<&str> {
		let mut names: Vec<_> = self.0.keys().map(String::as_str).filter(|&name| name != CHILDREN).collect();
		names.sort_unstable();
		names
	}
}

/// An immutable description of a desired node.
#[derive(Clone, Debug)]
pub struct Element {
	pub element_type: ElementType,
	pub props: Rc<Props>,
}
impl Element {
	/// Creates an element from finished props, without touching their [`CHILDREN`].
	#[must_use]
	pub fn new(element_type: impl Into<ElementType>, props: Props) -> Self {
		Self {
			element_type: element_type.into(),
			props: Rc::new(props),
		}
	}
}

/// Creates a [`TEXT_ELEMENT`] carrying `value` as its [`NODE_VALUE`].
#[must_use]
pub fn text(value: impl Into<String>) -> Element {
	Element::new(TEXT_ELEMENT, Props::new().with(NODE_VALUE, value.into()).with(CHILDREN, PropValue::Children(Vec::new())))
}

/// Builds an element, storing the flattened `children` under [`CHILDREN`].
///
/// `children` may be a single child, a sequence of children or a tuple mixing both; each sequence is flattened one
/// level and non-element leaves become [`text`] elements. Use `()` for no children.
pub fn build(element_type: impl Into<ElementType>, props: Props, children: impl IntoChildren) -> Element {
	let mut flattened = Vec::new();
	children.extend_children(&mut flattened);
	Element::new(element_type, props.with(CHILDREN, PropValue::Children(flattened)))
}

/// Variadic [`build`]: `element!("div", props, child_a, [child_b, child_c], "text")`.
#[macro_export]
macro_rules! element {
	($element_type:expr $(,)?) => {
		$crate::element::build($element_type, $crate::element::Props::new(), ())
	};
	($element_type:expr, $props:expr $(, $child:expr)* $(,)?) => {{
		#[allow(unused_mut)]
		let mut children = ::std::vec::Vec::<$crate::element::Element>::new();
		$($crate::element::IntoChildren::extend_children($child, &mut children);)*
		$crate::element::build($element_type, $props, children)
	}};
}

/// A single child: an [`Element`] or a literal that becomes a [`text`] element.
pub trait IntoChild {
	fn into_child(self) -> Element;
}
impl IntoChild for Element {
	fn into_child(self) -> Element {
		self
	}
}
impl IntoChild for &Element {
	fn into_child(self) -> Element {
		self.clone()
	}
}
impl IntoChild for &str {
	fn into_child(self) -> Element {
		text(self)
	}
}
impl IntoChild for String {
	fn into_child(self) -> Element {
		text(self)
	}
}
impl IntoChild for &String {
	fn into_child(self) -> Element {
		text(self.as_str())
	}
}
macro_rules! display_child {
	($($t:ty),*) => {$(
		impl IntoChild for $t {
			fn into_child(self) -> Element {
				text(self.to_string())
			}
		}
	)*};
}
display_child!(char, i8, i16, i32, i64, isize, u8, u16, u32, u64, usize, f32, f64);

/// One argument's worth of children.
pub trait IntoChildren {
	fn extend_children(self, children: &mut Vec<Element>);
}
impl IntoChildren for () {
	fn extend_children(self, _: &mut Vec<Element>) {}
}
macro_rules! single_children {
	($($t:ty),*) => {$(
		impl IntoChildren for $t {
			fn extend_children(self, children: &mut Vec<Element>) {
				children.push(self.into_child())
			}
		}
	)*};
}
single_children!(Element, &Element, &str, String, &String, char, i8, i16, i32, i64, isize, u8, u16, u32, u64, usize, f32, f64);
impl<T: IntoChild> IntoChildren for Vec<T> {
	fn extend_children(self, children: &mut Vec<Element>) {
		children.extend(self.into_iter().map(IntoChild::into_child))
	}
}
impl<T: IntoChild, const N: usize> IntoChildren for [T; N] {
	fn extend_children(self, children: &mut Vec<Element>) {
		children.extend(self.into_iter().map(IntoChild::into_child))
	}
}
impl<T: IntoChild> IntoChildren for Option<T> {
	fn extend_children(self, children: &mut Vec<Element>) {
		children.extend(self.map(IntoChild::into_child))
	}
}
macro_rules! tuple_children {
	($($name:ident),+) => {
		impl<$($name: IntoChildren),+> IntoChildren for ($($name,)+) {
			#[allow(non_snake_case)]
			fn extend_children(self, children: &mut Vec<Element>) {
				let ($($name,)+) = self;
				$($name.extend_children(children);)+
			}
		}
	};
}
tuple_children!(A);
tuple_children!(A, B);
tuple_children!(A, B, C);
tuple_children!(A, B, C, D);
tuple_children!(A, B, C, D, E);
tuple_children!(A, B, C, D, E, F);
tuple_children!(A, B, C, D, E, F, G);
tuple_children!(A, B, C, D, E, F, G, H);
