use crate::{
	element::Element,
	fiber::{EffectTag, Fiber, FiberId, FiberTree},
};
use tracing::{instrument, trace};

/// Diffs `elements` against the previous children of `parent` (its alternate's children) by position.
///
/// Produces a fresh child chain under `parent`: same-type positions reuse the old fiber's host node as
/// [`EffectTag::Update`]s, new or retyped positions become [`EffectTag::Placement`]s, and old fibers without a
/// same-type counterpart are tagged [`EffectTag::Deletion`] and appended to `deletions`.
#[instrument(level = "trace", skip(tree, deletions, elements), fields(elements = elements.len()))]
pub(crate) fn reconcile_children<N: Clone>(tree: &mut FiberTree<N>, deletions: &mut Vec<FiberId>, parent: FiberId, elements: Vec<Element>) {
	let mut old = tree[parent].alternate.and_then(|alternate| tree[alternate].child);
	let mut previous_sibling: Option<FiberId> = None;
	let mut elements = elements.into_iter();
	tree[parent].child = None;

	for index in 0.. {
		let new_fiber = match (elements.next(), old) {
			(None, None) => break,
			(Some(element), Some(old_id)) if element.element_type == tree[old_id].element_type => {
				trace!(index, ?old_id, "Same type. Updating.");
				let node = tree[old_id].node.clone();
				Some(tree.insert(Fiber::update(element, parent, node, old_id)))
			}
			(element, old_id) => {
				if let Some(old_id) = old_id {
					trace!(index, ?old_id, "Deleting.");
					tree[old_id].effect_tag = Some(EffectTag::Deletion);
					deletions.push(old_id);
				}
				element.map(|element| {
					trace!(index, element_type = %element.element_type, "Placing.");
					tree.insert(Fiber::placement(element, parent))
				})
			}
		};

		if let Some(old_id) = old {
			old = tree[old_id].sibling;
		}

		if let Some(new_fiber) = new_fiber {
			match previous_sibling {
				None => tree[parent].child = Some(new_fiber),
				Some(previous_sibling) => tree[previous_sibling].sibling = Some(new_fiber),
			}
			previous_sibling = Some(new_fiber);
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::element::{build, ElementType, Props};
	use std::rc::Rc;

	fn committed(tree: &mut FiberTree<u32>, tags: &[&str]) -> FiberId {
		let root = tree.insert(Fiber::root(0, Rc::new(Props::new()), None));
		let elements = tags.iter().map(|&tag| build(tag, Props::new(), ())).collect();
		reconcile_children(tree, &mut Vec::new(), root, elements);
		let children: Vec<_> = tree.children(root).collect();
		for (i, child) in children.into_iter().enumerate() {
			tree[child].node = Some(i as u32 + 1);
		}
		root
	}

	fn next_generation(tree: &mut FiberTree<u32>, previous: FiberId, elements: Vec<Element>) -> (FiberId, Vec<FiberId>) {
		let root = tree.insert(Fiber::root(0, Rc::new(Props::new()), Some(previous)));
		let mut deletions = Vec::new();
		reconcile_children(tree, &mut deletions, root, elements);
		(root, deletions)
	}

	#[test]
	fn same_type_updates_and_keeps_node() {
		let mut tree = FiberTree::new();
		let previous = committed(&mut tree, &["a", "b"]);
		let old: Vec<_> = tree.children(previous).collect();
		let (root, deletions) = next_generation(&mut tree, previous, vec![build("a", Props::new().with("id", "x"), ()), build("b", Props::new(), ())]);

		let new: Vec<_> = tree.children(root).collect();
		assert_eq!(new.len(), 2);
		assert!(deletions.is_empty());
		for (new, old) in new.into_iter().zip(old) {
			assert_eq!(tree[new].effect_tag, Some(EffectTag::Update));
			assert_eq!(tree[new].alternate, Some(old));
			assert_eq!(tree[new].node, tree[old].node);
			assert_eq!(tree[new].parent, Some(root));
		}
	}

	#[test]
	fn type_change_places_and_deletes() {
		let mut tree = FiberTree::new();
		let previous = committed(&mut tree, &["a"]);
		let old = tree[previous].child.unwrap();
		let (root, deletions) = next_generation(&mut tree, previous, vec![build("b", Props::new(), ())]);

		let new = tree[root].child.unwrap();
		assert_eq!(tree[new].effect_tag, Some(EffectTag::Placement));
		assert_eq!(tree[new].node, None);
		assert_eq!(tree[new].alternate, None);
		assert_eq!(deletions, [old]);
		assert_eq!(tree[old].effect_tag, Some(EffectTag::Deletion));
	}

	#[test]
	fn shrinking_and_growing() {
		let mut tree = FiberTree::new();
		let previous = committed(&mut tree, &["a", "b", "c"]);
		let old: Vec<_> = tree.children(previous).collect();

		let (root, deletions) = next_generation(&mut tree, previous, vec![build("a", Props::new(), ())]);
		assert_eq!(tree.children(root).count(), 1);
		assert_eq!(deletions, old[1..]);

		let (root, deletions) = next_generation(&mut tree, previous, (0..5).map(|_| build("a", Props::new(), ())).collect());
		let tags: Vec<_> = tree.children(root).map(|id| tree[id].effect_tag).collect();
		assert_eq!(
			tags,
			[
				Some(EffectTag::Update),
				Some(EffectTag::Placement),
				Some(EffectTag::Placement),
				Some(EffectTag::Placement),
				Some(EffectTag::Placement)
			]
		);
		assert_eq!(deletions, old[1..]);
	}

	#[test]
	fn reordering_is_replacement() {
		let mut tree = FiberTree::new();
		let previous = committed(&mut tree, &["a", "b"]);
		let (root, deletions) = next_generation(&mut tree, previous, vec![build("b", Props::new(), ()), build("a", Props::new(), ())]);
		assert!(tree.children(root).all(|id| tree[id].effect_tag == Some(EffectTag::Placement)));
		assert_eq!(deletions.len(), 2);
		assert!(tree.children(root).all(|id| matches!(tree[id].element_type, ElementType::Host(_))));
	}
}
