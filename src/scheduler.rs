//! The cooperative, tick-driven work loop.
//!
//! A [`Renderer`] owns all render generation state of one mounted tree. An external driver calls
//! [`Renderer::tick`] repeatedly, each time with a [`Deadline`]. Work only ever suspends between two fibers, and a
//! finished generation is always committed within the tick that finished it.

use crate::{
	element::{Element, ElementType, PropValue, Props, CHILDREN},
	error::RenderError,
	fiber::{Fiber, FiberId, FiberTree},
	hooks::{Hooks, Invalidation},
	host::{self, Host},
	reconcile::reconcile_children,
};
use core::time::Duration;
use std::{rc::Rc, time::Instant};
use tracing::{debug, error, instrument, trace, trace_span};

/// When a tick's remaining time drops below this, the tick yields.
pub const YIELD_MARGIN: Duration = Duration::from_millis(1);

/// Decides when a tick has to hand control back to its driver. Polled after each unit of work.
pub trait Deadline {
	fn should_yield(&mut self) -> bool;
}
impl<D: Deadline + ?Sized> Deadline for &mut D {
	fn should_yield(&mut self) -> bool {
		(**self).should_yield()
	}
}

/// Never yields: runs the current generation to completion.
#[derive(Clone, Copy, Debug, Default)]
pub struct Unbounded;
impl Deadline for Unbounded {
	fn should_yield(&mut self) -> bool {
		false
	}
}

/// Yields after a fixed number of units of work. At least one unit is always processed.
#[derive(Clone, Copy, Debug)]
pub struct UnitBudget(pub usize);
impl Deadline for UnitBudget {
	fn should_yield(&mut self) -> bool {
		self.0 = self.0.saturating_sub(1);
		self.0 == 0
	}
}

/// Yields once less than [`YIELD_MARGIN`] remains until this instant.
///
/// Note that [`Instant::now`] is unavailable on `wasm32-unknown-unknown`. Use `web_sys::IdleDeadline` there.
impl Deadline for Instant {
	fn should_yield(&mut self) -> bool {
		self.saturating_duration_since(Instant::now()) < YIELD_MARGIN
	}
}

/// What a [`Renderer::tick`] achieved.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Progress {
	/// There was nothing to do.
	Idle,
	/// The deadline was reached with work remaining.
	Yielded,
	/// A generation was committed.
	Committed,
}

/// The render generation state of one tree mounted into one container.
#[derive(Debug)]
pub struct Renderer<H: Host> {
	pub(crate) host: H,
	pub(crate) tree: FiberTree<H::Node>,
	pub(crate) current_root: Option<FiberId>,
	pub(crate) wip_root: Option<FiberId>,
	pub(crate) next_unit_of_work: Option<FiberId>,
	pub(crate) deletions: Vec<FiberId>,
	/// Where an interrupted commit resumes.
	pub(crate) commit_cursor: Option<FiberId>,
	/// Host calls already applied for the deletion or fiber an interrupted commit resumes with.
	pub(crate) commit_steps: usize,
	pub(crate) invalidation: Invalidation,
}
impl<H: Host> Renderer<H> {
	pub fn new(host: H) -> Self {
		Self {
			host,
			tree: FiberTree::new(),
			current_root: None,
			wip_root: None,
			next_unit_of_work: None,
			deletions: Vec::new(),
			commit_cursor: None,
			commit_steps: 0,
			invalidation: Invalidation::default(),
		}
	}

	pub fn host(&self) -> &H {
		&self.host
	}

	pub fn host_mut(&mut self) -> &mut H {
		&mut self.host
	}

	pub fn into_host(self) -> H {
		self.host
	}

	pub fn fibers(&self) -> &FiberTree<H::Node> {
		&self.tree
	}

	/// The root of the last committed tree.
	pub fn current_root(&self) -> Option<FiberId> {
		self.current_root
	}

	/// The root of the generation in progress.
	pub fn wip_root(&self) -> Option<FiberId> {
		self.wip_root
	}

	/// The fiber the next tick will process.
	pub fn next_unit_of_work(&self) -> Option<FiberId> {
		self.next_unit_of_work
	}

	/// Old fibers the generation in progress will remove, in discovery order.
	pub fn deletions(&self) -> &[FiberId] {
		&self.deletions
	}

	/// Whether a tick would do anything.
	pub fn has_pending_work(&self) -> bool {
		self.wip_root.is_some() || (self.current_root.is_some() && self.invalidation.is_raised())
	}

	/// Requests that `container` shows `element`.
	///
	/// Nothing happens until the next [`tick`](`Renderer::tick`). Any unfinished generation is discarded, and so is a
	/// pending re-render requested by a [`Setter`](`crate::Setter`): the queued state changes are picked up by the new
	/// generation instead.
	#[instrument(skip(self, element, container), fields(element_type = %element.element_type))]
	pub fn render(&mut self, element: Element, container: H::Node) {
		if self.invalidation.take() {
			debug!("Folding pending state changes into the new render.");
		}
		let props = Props::new().with(CHILDREN, PropValue::Children(vec![element]));
		self.start_generation(Fiber::root(container, Rc::new(props), self.current_root));
	}

	fn start_generation(&mut self, root: Fiber<H::Node>) {
		let root = self.tree.insert(root);
		if let Some(superseded) = self.wip_root.replace(root) {
			debug!(?superseded, "Discarding unfinished generation.");
		}
		debug!(?root, alternate = ?self.tree[root].alternate, "Starting generation.");
		self.deletions.clear();
		self.commit_cursor = None;
		self.commit_steps = 0;
		self.next_unit_of_work = Some(root);
	}

	/// Restarts from the committed root if a [`Setter`](`crate::Setter`) was called since the last check.
	fn check_invalidation(&mut self) {
		let current_root = match self.current_root {
			Some(current_root) => current_root,
			None => return,
		};
		if !self.invalidation.take() {
			return;
		}

		debug!("State changed. Re-rendering from the committed root.");
		let current = &self.tree[current_root];
		let container = match current.node.clone() {
			Some(container) => container,
			None => return error!(?current_root, "Committed root lost its container. Ignoring state change."),
		};
		let root = Fiber::root(container, Rc::clone(&current.props), Some(current_root));
		self.start_generation(root)
	}

	/// Processes fibers until the work runs out or `deadline` asks to yield, then commits a finished generation.
	///
	/// # Errors
	///
	/// Aborts on the first failing unit of work or commit step. The failing unit is left as the next unit of work, and
	/// an interrupted commit resumes at the fiber that failed.
	#[instrument(level = "debug", skip_all)]
	pub fn tick(&mut self, mut deadline: impl Deadline) -> Result<Progress, RenderError<H::Error>> {
		let mut progress = Progress::Idle;
		loop {
			self.check_invalidation();
			let unit = match self.next_unit_of_work {
				Some(unit) => unit,
				None => break,
			};
			self.next_unit_of_work = self.perform_unit_of_work(unit)?;
			if self.next_unit_of_work.is_some() && deadline.should_yield() {
				progress = Progress::Yielded;
				break;
			}
		}

		if self.next_unit_of_work.is_none() && self.wip_root.is_some() {
			self.commit_root()?;
			progress = Progress::Committed;
		}
		trace!(?progress);
		Ok(progress)
	}

	/// Ticks without deadline until no work is left, including re-renders requested by effects.
	///
	/// # Errors
	///
	/// See [`tick`](`Renderer::tick`).
	pub fn flush(&mut self) -> Result<(), RenderError<H::Error>> {
		while self.has_pending_work() {
			self.tick(Unbounded)?;
		}
		Ok(())
	}

	/// Reconciles the children of `id` and returns the next fiber in pre-order.
	fn perform_unit_of_work(&mut self, id: FiberId) -> Result<Option<FiberId>, RenderError<H::Error>> {
		let span = trace_span!("Unit of work", ?id, element_type = %self.tree[id].element_type);
		let _enter = span.enter();

		match self.tree[id].element_type.clone() {
			ElementType::Component(component) => {
				let invalidation = self.invalidation.clone();
				let fiber = &self.tree[id];
				let previous = fiber.alternate.map_or(&[][..], |alternate| &self.tree[alternate].hooks[..]);
				let mut hooks = Hooks::new(previous, &invalidation);
				let element = component.render(&mut hooks, &fiber.props);
				let hooks = hooks.finish();
				self.tree[id].hooks = hooks;
				reconcile_children(&mut self.tree, &mut self.deletions, id, vec![element]);
			}
			ElementType::Host(tag) => {
				let fiber = &self.tree[id];
				let children = fiber
					.props
					.children()
					.ok_or_else(|| RenderError::MalformedChildren { element_type: tag.clone() })?
					.to_vec();
				if fiber.node.is_none() {
					let node = host::create_node(&mut self.host, &tag, &fiber.props).map_err(RenderError::Host)?;
					trace!(?node, "Created host node.");
					self.tree[id].node = Some(node);
				}
				reconcile_children(&mut self.tree, &mut self.deletions, id, children);
			}
		}

		let root = self.wip_root.unwrap_or(id);
		Ok(self.tree.successor(id, root))
	}
}
