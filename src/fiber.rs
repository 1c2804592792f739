//! The persistent work tree.
//!
//! Fibers live in a [`FiberTree`] arena and refer to each other through [`FiberId`] handles only, so the
//! parent/child/sibling/alternate graph never forms ownership cycles.

use crate::{
	element::{Element, ElementType, Props},
	hooks::Hook,
};
use hashbrown::HashSet;
use slotmap::{new_key_type, SlotMap};
use std::{ops::Index, rc::Rc};
use tracing::{instrument, trace};

new_key_type! {
	/// A handle to a [`Fiber`] in a [`FiberTree`].
	pub struct FiberId;
}

/// The mutation intent assigned to a fiber by diffing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EffectTag {
	Update,
	Placement,
	Deletion,
}

/// The host tag of generation roots. Roots carry the container node and are never committed themselves.
pub(crate) const ROOT: &str = "ROOT";

#[derive(Debug)]
pub struct Fiber<N> {
	pub(crate) node: Option<N>,
	pub(crate) element_type: ElementType,
	pub(crate) props: Rc<Props>,
	pub(crate) parent: Option<FiberId>,
	pub(crate) child: Option<FiberId>,
	pub(crate) sibling: Option<FiberId>,
	pub(crate) alternate: Option<FiberId>,
	pub(crate) hooks: Vec<Hook>,
	pub(crate) effect_tag: Option<EffectTag>,
}
impl<N> Fiber<N> {
	pub(crate) fn root(container: N, props: Rc<Props>, alternate: Option<FiberId>) -> Self {
		Self {
			node: Some(container),
			element_type: ElementType::Host(ROOT.to_owned()),
			props,
			parent: None,
			child: None,
			sibling: None,
			alternate,
			hooks: Vec::new(),
			effect_tag: None,
		}
	}

	/// A reusing fiber for a position whose type didn't change.
	pub(crate) fn update(element: Element, parent: FiberId, node: Option<N>, alternate: FiberId) -> Self {
		Self {
			node,
			element_type: element.element_type,
			props: element.props,
			parent: Some(parent),
			child: None,
			sibling: None,
			alternate: Some(alternate),
			hooks: Vec::new(),
			effect_tag: Some(EffectTag::Update),
		}
	}

	pub(crate) fn placement(element: Element, parent: FiberId) -> Self {
		Self {
			node: None,
			element_type: element.element_type,
			props: element.props,
			parent: Some(parent),
			child: None,
			sibling: None,
			alternate: None,
			hooks: Vec::new(),
			effect_tag: Some(EffectTag::Placement),
		}
	}

	/// The host node, if this is a host fiber that was already processed.
	pub fn node(&self) -> Option<&N> {
		self.node.as_ref()
	}

	pub fn element_type(&self) -> &ElementType {
		&self.element_type
	}

	pub fn props(&self) -> &Props {
		&self.props
	}

	pub fn parent(&self) -> Option<FiberId> {
		self.parent
	}

	pub fn child(&self) -> Option<FiberId> {
		self.child
	}

	pub fn sibling(&self) -> Option<FiberId> {
		self.sibling
	}

	/// The fiber that occupied this position in the last committed tree, until this fiber is committed itself.
	pub fn alternate(&self) -> Option<FiberId> {
		self.alternate
	}

	pub fn hooks(&self) -> &[Hook] {
		&self.hooks
	}

	pub fn effect_tag(&self) -> Option<EffectTag> {
		self.effect_tag
	}
}

/// The fiber arena of one renderer.
#[derive(Debug)]
pub struct FiberTree<N> {
	fibers: SlotMap<FiberId, Fiber<N>>,
}
impl<N> Default for FiberTree<N> {
	fn default() -> Self {
		Self::new()
	}
}
impl<N> FiberTree<N> {
	#[must_use]
	pub fn new() -> Self {
		Self { fibers: SlotMap::with_key() }
	}

	pub(crate) fn insert(&mut self, fiber: Fiber<N>) -> FiberId {
		self.fibers.insert(fiber)
	}

	#[must_use]
	pub fn get(&self, id: FiberId) -> Option<&Fiber<N>> {
		self.fibers.get(id)
	}

	/// The number of live fibers, including not yet released ones from earlier generations.
	#[must_use]
	pub fn len(&self) -> usize {
		self.fibers.len()
	}

	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.fibers.is_empty()
	}

	/// The direct children of `id`, in order.
	pub fn children(&self, id: FiberId) -> impl '_ + Iterator<Item = FiberId> {
		let mut next = self.fibers.get(id).and_then(|fiber| fiber.child);
		core::iter::from_fn(move || {
			let current = next?;
			next = self.fibers.get(current).and_then(|fiber| fiber.sibling);
			Some(current)
		})
	}

	/// The pre-order successor of `id` within the subtree rooted at `boundary`.
	///
	/// Descends into the first child if there is one, otherwise climbs towards `boundary` until an ancestor (or `id`
	/// itself) has a next sibling. The walk ends once `boundary` is reached.
	#[must_use]
	pub fn successor(&self, id: FiberId, boundary: FiberId) -> Option<FiberId> {
		let fiber = self.fibers.get(id)?;
		if let Some(child) = fiber.child {
			return Some(child);
		}

		let mut current = id;
		while current != boundary {
			let fiber = self.fibers.get(current)?;
			if let Some(sibling) = fiber.sibling {
				return Some(sibling);
			}
			current = fiber.parent?;
		}
		None
	}

	/// The subtree rooted at `id`, in pre-order.
	pub fn subtree(&self, id: FiberId) -> impl '_ + Iterator<Item = FiberId> {
		let mut next = self.fibers.contains_key(id).then(|| id);
		core::iter::from_fn(move || {
			let current = next?;
			next = self.successor(current, id);
			Some(current)
		})
	}

	/// Releases every fiber not in the tree rooted at `root` and detaches the survivors from their alternates.
	///
	/// Returns the number of released fibers.
	#[instrument(level = "debug", skip(self))]
	pub(crate) fn retain_generation(&mut self, root: FiberId) -> usize {
		let live: HashSet<FiberId> = self.subtree(root).collect();
		let before = self.fibers.len();
		self.fibers.retain(|id, fiber| {
			let keep = live.contains(&id);
			if keep {
				fiber.alternate = None;
			}
			keep
		});
		let released = before - self.fibers.len();
		trace!(released, live = live.len(), "Released fibers of earlier generations.");
		released
	}
}
impl<N> Index<FiberId> for FiberTree<N> {
	type Output = Fiber<N>;

	fn index(&self, id: FiberId) -> &Fiber<N> {
		&self.fibers[id]
	}
}
impl<N> core::ops::IndexMut<FiberId> for FiberTree<N> {
	fn index_mut(&mut self, id: FiberId) -> &mut Fiber<N> {
		&mut self.fibers[id]
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::element::text;

	/// root ─ a ─ a1
	///      │   └ a2
	///      └ b ─ b1
	fn build_tree() -> (FiberTree<()>, [FiberId; 6]) {
		let mut tree = FiberTree::new();
		let root = tree.insert(Fiber::root((), Rc::new(Props::new()), None));
		let a = tree.insert(Fiber::placement(text("a"), root));
		let b = tree.insert(Fiber::placement(text("b"), root));
		let a1 = tree.insert(Fiber::placement(text("a1"), a));
		let a2 = tree.insert(Fiber::placement(text("a2"), a));
		let b1 = tree.insert(Fiber::placement(text("b1"), b));
		tree[root].child = Some(a);
		tree[a].sibling = Some(b);
		tree[a].child = Some(a1);
		tree[a1].sibling = Some(a2);
		tree[b].child = Some(b1);
		(tree, [root, a, a1, a2, b, b1])
	}

	#[test]
	fn pre_order_walk() {
		let (tree, ids) = build_tree();
		assert_eq!(tree.subtree(ids[0]).collect::<Vec<_>>(), ids);
	}

	#[test]
	fn walk_is_resumable_from_any_fiber() {
		let (tree, [root, a, a1, a2, b, b1]) = build_tree();
		assert_eq!(tree.successor(a2, root), Some(b));
		assert_eq!(tree.successor(a1, root), Some(a2));
		assert_eq!(tree.successor(b1, root), None);
		assert_eq!(tree.successor(a, root), Some(a1));
	}

	#[test]
	fn subtree_stays_within_bounds() {
		let (tree, [_, a, a1, a2, ..]) = build_tree();
		assert_eq!(tree.subtree(a).collect::<Vec<_>>(), [a, a1, a2]);
		assert_eq!(tree.subtree(a2).collect::<Vec<_>>(), [a2]);
	}

	#[test]
	fn children_in_order() {
		let (tree, [root, a, _, _, b, _]) = build_tree();
		assert_eq!(tree.children(root).collect::<Vec<_>>(), [a, b]);
	}

	#[test]
	fn retain_generation_releases_unreachable() {
		let (mut tree, [_, a, a1, a2, ..]) = build_tree();
		let stale = tree.insert(Fiber::placement(text("stale"), a));
		tree[a1].alternate = Some(stale);
		assert_eq!(tree.retain_generation(a), 4);
		assert_eq!(tree.len(), 3);
		assert!(tree.get(stale).is_none());
		assert_eq!(tree[a1].alternate, None);
		assert!(tree.get(a2).is_some());
	}
}
