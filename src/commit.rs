//! Applying a finished generation to the host.

use crate::{
	error::RenderError,
	fiber::{EffectTag, FiberId},
	hooks::Hook,
	host::{listeners, property_delta, Host, Mutation},
	scheduler::Renderer,
};
use std::rc::Rc;
use tracing::{error, info, instrument, trace, trace_span, warn};

/// One host call of the commit phase.
enum Step<N> {
	Append { parent: N, child: N },
	Remove { parent: N, child: N },
	Mutate(N, Mutation),
}
impl<N: core::fmt::Debug> Step<N> {
	fn apply<H: Host<Node = N> + ?Sized>(&self, host: &mut H) -> Result<(), H::Error> {
		match self {
			Step::Append { parent, child } => {
				trace!(?child, ?parent, "Appending.");
				host.append_child(parent, child)
			}
			Step::Remove { parent, child } => {
				trace!(?child, ?parent, "Removing.");
				host.remove_child(parent, child)
			}
			Step::Mutate(node, mutation) => mutation.apply(host, node),
		}
	}
}

impl<H: Host> Renderer<H> {
	/// Commits the finished generation: deletions first, in discovery order, then every tagged fiber in pre-order.
	///
	/// Runs to completion without yielding. On a host failure, mutations applied so far stay applied and the next call
	/// resumes with the deletion or fiber that failed.
	#[instrument(level = "debug", skip(self))]
	pub(crate) fn commit_root(&mut self) -> Result<(), RenderError<H::Error>> {
		let root = match self.wip_root {
			Some(root) => root,
			None => return Ok(()),
		};

		let deletions = self.deletions.len();
		for done in 0..deletions {
			if let Err(error) = self.commit_deletion(self.deletions[done]) {
				self.deletions.drain(..done);
				return Err(error);
			}
		}
		self.deletions.clear();

		let (mut placements, mut updates) = (0_usize, 0_usize);
		let mut next = self.commit_cursor.take().or(self.tree[root].child);
		while let Some(id) = next {
			match self.commit_work(id) {
				Ok(Some(EffectTag::Placement)) => placements += 1,
				Ok(Some(EffectTag::Update)) => updates += 1,
				Ok(_) => (),
				Err(error) => {
					self.commit_cursor = Some(id);
					return Err(error);
				}
			}
			next = self.tree.successor(id, root);
		}

		self.current_root = Some(root);
		self.wip_root = None;
		let released = self.tree.retain_generation(root);
		info!(placements, updates, deletions, released, fibers = self.tree.len(), "Committed generation.");
		Ok(())
	}

	fn commit_work(&mut self, id: FiberId) -> Result<Option<EffectTag>, RenderError<H::Error>> {
		let fiber = &self.tree[id];
		let span = trace_span!("Committing", ?id, element_type = %fiber.element_type, tag = ?fiber.effect_tag);
		let _enter = span.enter();

		match fiber.effect_tag {
			Some(EffectTag::Placement) => {
				let mut steps = Vec::new();
				if let Some(node) = &fiber.node {
					match self.host_parent(id) {
						Some(parent) => steps.push(Step::Append { parent, child: node.clone() }),
						None => warn!(?node, "Placed fiber has no host parent."),
					}
					steps.extend(listeners(&fiber.props).map(|(event, handler)| {
						Step::Mutate(node.clone(), Mutation::AddListener { event, handler: handler.clone() })
					}));
				}
				self.run_steps(&steps)?;
				self.commit_state(id);
				self.run_effects(id);
			}
			Some(EffectTag::Update) => {
				self.run_cleanups(id);
				let fiber = &self.tree[id];
				let mut steps = Vec::new();
				if let (Some(node), Some(alternate)) = (&fiber.node, fiber.alternate) {
					let previous = &self.tree[alternate].props;
					if !Rc::ptr_eq(previous, &fiber.props) {
						steps.extend(property_delta(previous, &fiber.props).into_iter().map(|mutation| Step::Mutate(node.clone(), mutation)));
					}
				}
				self.run_steps(&steps)?;
				self.commit_state(id);
				self.run_effects(id);
			}
			Some(EffectTag::Deletion) => error!("Deletion-tagged fiber in the committed tree. Skipping."),
			None => (),
		}
		Ok(self.tree[id].effect_tag)
	}

	/// Runs the cleanups of every effect in the subtree of `id` and detaches its event listeners, then removes its
	/// topmost host node(s).
	///
	/// Cleanups run at most once, so a retry after a host failure only repeats the host calls that did not go through.
	fn commit_deletion(&mut self, id: FiberId) -> Result<(), RenderError<H::Error>> {
		let span = trace_span!("Deleting", ?id, element_type = %self.tree[id].element_type);
		let _enter = span.enter();

		let subtree: Vec<_> = self.tree.subtree(id).collect();
		for &fiber in &subtree {
			for hook in &self.tree[fiber].hooks {
				if let Hook::Effect(effect) = hook {
					if let Some(cleanup) = effect.take_cleanup() {
						trace!(?fiber, "Running cleanup of deleted effect.");
						cleanup.run();
					}
				}
			}
		}
		let mut steps = Vec::new();
		for &fiber in &subtree {
			let fiber = &self.tree[fiber];
			if let Some(node) = &fiber.node {
				steps.extend(listeners(&fiber.props).map(|(event, handler)| {
					Step::Mutate(node.clone(), Mutation::RemoveListener { event, handler: handler.clone() })
				}));
			}
		}

		let nodes = self.host_nodes(id);
		match self.host_parent(id) {
			_ if nodes.is_empty() => warn!("Deleted fiber has no host node."),
			Some(parent) => steps.extend(nodes.into_iter().map(|child| Step::Remove { parent: parent.clone(), child })),
			None => warn!("Deleted fiber has no host parent. Skipping host removal."),
		}
		self.run_steps(&steps)
	}

	/// Applies `steps`, skipping those an interrupted earlier attempt already applied.
	fn run_steps(&mut self, steps: &[Step<H::Node>]) -> Result<(), RenderError<H::Error>> {
		if self.commit_steps > 0 {
			trace!(skipped = self.commit_steps, "Resuming.");
		}
		for step in steps.iter().skip(self.commit_steps) {
			step.apply(&mut self.host).map_err(RenderError::Host)?;
			self.commit_steps += 1;
		}
		self.commit_steps = 0;
		Ok(())
	}

	/// The host node of `id`, or the nearest host nodes below it if `id` is a component fiber.
	fn host_nodes(&self, id: FiberId) -> Vec<H::Node> {
		if let Some(node) = &self.tree[id].node {
			return vec![node.clone()];
		}
		self.tree.children(id).flat_map(|child| self.host_nodes(child)).collect()
	}

	/// The host node of the nearest ancestor that has one.
	fn host_parent(&self, id: FiberId) -> Option<H::Node> {
		let mut ancestor = self.tree[id].parent;
		while let Some(id) = ancestor {
			let fiber = self.tree.get(id)?;
			if let Some(node) = &fiber.node {
				return Some(node.clone());
			}
			ancestor = fiber.parent;
		}
		None
	}

	fn commit_state(&mut self, id: FiberId) {
		for hook in &mut self.tree[id].hooks {
			if let Hook::State(state) = hook {
				state.commit();
			}
		}
	}

	/// Invokes the previous cleanups of effects that are about to rerun.
	fn run_cleanups(&mut self, id: FiberId) {
		for hook in &self.tree[id].hooks {
			if let Hook::Effect(effect) = hook {
				if effect.is_pending() {
					if let Some(cleanup) = effect.take_cleanup() {
						trace!("Running cleanup.");
						cleanup.run();
					}
				}
			}
		}
	}

	/// Runs pending effects, first invoking any cleanup that is still outstanding for them.
	fn run_effects(&mut self, id: FiberId) {
		let effects: Vec<_> = self.tree[id]
			.hooks
			.iter_mut()
			.filter_map(|hook| match hook {
				Hook::Effect(effect) => effect.take_effect(),
				Hook::State(_) => None,
			})
			.collect();
		for (effect, cleanup) in effects {
			let previous = cleanup.borrow_mut().take();
			if let Some(previous) = previous {
				trace!("Running cleanup.");
				previous.run();
			}
			trace!("Running effect.");
			let next = effect();
			*cleanup.borrow_mut() = next;
		}
	}
}
