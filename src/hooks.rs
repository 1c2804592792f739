//! Per-fiber, call-order-indexed state and effect slots.
//!
//! A component must call the same hooks in the same order on every render. Hooks are matched to their previous
//! generation purely by position, so conditional or reordered hook calls are undefined behaviour: the engine
//! detects a kind mismatch at a position, logs a warning and treats the slot as fresh, but makes no other attempt
//! at recovery.

use core::{
	any::{type_name, Any},
	cell::{Cell, RefCell},
	fmt::{self, Debug, Formatter},
	marker::PhantomData,
};
use std::rc::Rc;
use tracing::{trace, warn};

/// The renderer's "please re-render from the committed root" flag, shared with every [`Setter`].
#[derive(Clone, Debug, Default)]
pub(crate) struct Invalidation(Rc<Cell<bool>>);
impl Invalidation {
	pub(crate) fn raise(&self) {
		self.0.set(true)
	}

	pub(crate) fn is_raised(&self) -> bool {
		self.0.get()
	}

	pub(crate) fn take(&self) -> bool {
		self.0.replace(false)
	}
}

enum Action<T> {
	Replace(T),
	Update(Box<dyn Fn(&T) -> T>),
}

/// The pending-action queue of one state slot, shared by all generations of that slot.
#[derive(Default)]
pub(crate) struct StateCell {
	queue: RefCell<Vec<Rc<dyn Any>>>,
}

pub struct StateHook {
	value: Rc<dyn Any>,
	cell: Rc<StateCell>,
	/// How many queued actions `value` already includes.
	consumed: usize,
}
impl StateHook {
	/// Drops the actions this generation applied. Called once the generation is committed.
	pub(crate) fn commit(&mut self) {
		let mut queue = self.cell.queue.borrow_mut();
		let consumed = self.consumed.min(queue.len());
		queue.drain(..consumed);
		self.consumed = 0;
	}
}

/// A cleanup returned by an effect.
pub struct Cleanup(Box<dyn FnOnce()>);
impl Cleanup {
	pub fn new(cleanup: impl 'static + FnOnce()) -> Self {
		Self(Box::new(cleanup))
	}

	pub(crate) fn run(self) {
		(self.0)()
	}
}
impl Debug for Cleanup {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.write_str("Cleanup")
	}
}

pub(crate) type EffectFn = Box<dyn FnOnce() -> Option<Cleanup>>;

/// The last run's cleanup of one effect slot, shared by all generations of that slot.
pub(crate) type CleanupCell = Rc<RefCell<Option<Cleanup>>>;

pub struct EffectHook {
	/// Present iff the effect has to run when this generation is committed, after the previous cleanup.
	effect: Option<EffectFn>,
	cleanup: CleanupCell,
	deps: Option<Vec<Dep>>,
}
impl EffectHook {
	pub(crate) fn is_pending(&self) -> bool {
		self.effect.is_some()
	}

	pub(crate) fn take_effect(&mut self) -> Option<(EffectFn, CleanupCell)> {
		let effect = self.effect.take()?;
		Some((effect, Rc::clone(&self.cleanup)))
	}

	pub(crate) fn take_cleanup(&self) -> Option<Cleanup> {
		self.cleanup.borrow_mut().take()
	}
}

/// One slot of a fiber's hook list.
pub enum Hook {
	State(StateHook),
	Effect(EffectHook),
}
impl Hook {
	/// This generation's state value, if this is a state hook of type `T`.
	#[must_use]
	pub fn state<T: Any>(&self) -> Option<&T> {
		match self {
			Hook::State(state) => state.value.downcast_ref(),
			Hook::Effect(_) => None,
		}
	}

	/// The number of state actions enqueued but not yet committed.
	#[must_use]
	pub fn pending_actions(&self) -> usize {
		match self {
			Hook::State(state) => state.cell.queue.borrow().len(),
			Hook::Effect(_) => 0,
		}
	}

	/// Whether this is an effect hook that will run on commit.
	#[must_use]
	pub fn effect_pending(&self) -> bool {
		matches!(self, Hook::Effect(effect) if effect.is_pending())
	}
}
impl Debug for Hook {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		match self {
			Hook::State(state) => f.debug_struct("State").field("consumed", &state.consumed).finish_non_exhaustive(),
			Hook::Effect(effect) => f
				.debug_struct("Effect")
				.field("pending", &effect.is_pending())
				.field("deps", &effect.deps)
				.finish_non_exhaustive(),
		}
	}
}

trait DepValue: Debug {
	fn as_any(&self) -> &dyn Any;
	fn eq_dep(&self, other: &dyn DepValue) -> bool;
}
impl<T: 'static + PartialEq + Debug> DepValue for T {
	fn as_any(&self) -> &dyn Any {
		self
	}

	fn eq_dep(&self, other: &dyn DepValue) -> bool {
		other.as_any().downcast_ref::<T>().map_or(false, |other| self == other)
	}
}

/// One entry of an effect's dependency sequence. Entries of different types never compare equal.
pub struct Dep(Box<dyn DepValue>);
impl Dep {
	pub fn new<T: 'static + PartialEq + Debug>(value: T) -> Self {
		Self(Box::new(value))
	}
}
impl PartialEq for Dep {
	fn eq(&self, other: &Self) -> bool {
		self.0.eq_dep(&*other.0)
	}
}
impl Debug for Dep {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		self.0.fmt(f)
	}
}

/// Builds an effect dependency sequence: `deps![]` runs once, `deps![a, b]` reruns when `a` or `b` change.
#[macro_export]
macro_rules! deps {
	() => {
		::core::option::Option::Some(::std::vec::Vec::<$crate::Dep>::new())
	};
	($($dep:expr),+ $(,)?) => {
		::core::option::Option::Some(::std::vec![$($crate::Dep::new($dep)),+])
	};
}

fn deps_changed(previous: Option<&[Dep]>, next: Option<&[Dep]>) -> bool {
	match (previous, next) {
		(Some(previous), Some(next)) => previous.len() != next.len() || previous.iter().zip(next).any(|(a, b)| a != b),
		_ => true,
	}
}

/// Enqueues actions on one state slot and schedules a re-render from the committed root.
pub struct Setter<T> {
	cell: Rc<StateCell>,
	invalidation: Invalidation,
	_phantom: PhantomData<fn(T)>,
}
impl<T> Clone for Setter<T> {
	fn clone(&self) -> Self {
		Self {
			cell: Rc::clone(&self.cell),
			invalidation: self.invalidation.clone(),
			_phantom: PhantomData,
		}
	}
}
impl<T> Debug for Setter<T> {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		write!(f, "Setter<{}>", type_name::<T>())
	}
}
impl<T: 'static> Setter<T> {
	/// Replaces the state with `value`.
	pub fn set(&self, value: T) {
		self.enqueue(Action::Replace(value))
	}

	/// Replaces the state with `update(&previous)`, where `previous` includes all earlier queued actions.
	pub fn update(&self, update: impl 'static + Fn(&T) -> T) {
		self.enqueue(Action::Update(Box::new(update)))
	}

	fn enqueue(&self, action: Action<T>) {
		self.cell.queue.borrow_mut().push(Rc::new(action));
		trace!(pending = self.cell.queue.borrow().len(), "Enqueued state action.");
		self.invalidation.raise()
	}
}

/// The hook context of one component invocation.
///
/// Created fresh for every invocation, so the hook index starts at zero each time.
pub struct Hooks<'a> {
	previous: &'a [Hook],
	hooks: Vec<Hook>,
	invalidation: &'a Invalidation,
}
impl<'a> Hooks<'a> {
	pub(crate) fn new(previous: &'a [Hook], invalidation: &'a Invalidation) -> Self {
		Self {
			previous,
			hooks: Vec::with_capacity(previous.len()),
			invalidation,
		}
	}

	pub(crate) fn finish(self) -> Vec<Hook> {
		if !self.previous.is_empty() && self.previous.len() != self.hooks.len() {
			warn!(previous = self.previous.len(), current = self.hooks.len(), "Hook count changed between renders.");
		}
		self.hooks
	}

	/// The position of the next hook call.
	#[must_use]
	pub fn index(&self) -> usize {
		self.hooks.len()
	}

	fn previous_hook(&self) -> Option<&'a Hook> {
		self.previous.get(self.hooks.len())
	}

	/// Returns this slot's current state and its [`Setter`].
	///
	/// The first render yields `initial`. Later renders start from the previous generation's state and apply every
	/// action enqueued since, in order.
	pub fn use_state<T: 'static + Clone>(&mut self, initial: T) -> (T, Setter<T>) {
		let index = self.index();
		let (mut value, cell) = match self.previous_hook() {
			None => (initial, Rc::default()),
			Some(Hook::State(previous)) => match previous.value.downcast_ref::<T>() {
				Some(value) => (value.clone(), Rc::clone(&previous.cell)),
				None => {
					warn!(index, expected = type_name::<T>(), "State hook type changed between renders. Starting over.");
					(initial, Rc::default())
				}
			},
			Some(Hook::Effect(_)) => {
				warn!(index, "Expected an effect hook but `use_state` was called. Starting over.");
				(initial, Rc::default())
			}
		};

		let consumed = {
			let queue = cell.queue.borrow();
			for action in queue.iter() {
				match action.downcast_ref::<Action<T>>() {
					Some(Action::Replace(next)) => value = next.clone(),
					Some(Action::Update(update)) => value = update(&value),
					None => warn!(index, "Skipping state action of foreign type."),
				}
			}
			queue.len()
		};
		trace!(index, consumed, "State hook.");

		self.hooks.push(Hook::State(StateHook {
			value: Rc::new(value.clone()),
			cell: Rc::clone(&cell),
			consumed,
		}));
		(
			value,
			Setter {
				cell,
				invalidation: self.invalidation.clone(),
				_phantom: PhantomData,
			},
		)
	}

	/// Schedules `effect` to run on commit if `deps` changed since the previous render.
	///
	/// Without `deps` (`None`) the effect runs after every render. With `deps![]` it runs once. Before a rerun, the
	/// [`Cleanup`] returned by the previous run is invoked. Cleanups also run when the fiber is deleted.
	pub fn use_effect(&mut self, deps: Option<Vec<Dep>>, effect: impl 'static + FnOnce() -> Option<Cleanup>) {
		let index = self.index();
		let previous = match self.previous_hook() {
			None => None,
			Some(Hook::Effect(previous)) => Some(previous),
			Some(Hook::State(_)) => {
				warn!(index, "Expected a state hook but `use_effect` was called. Starting over.");
				None
			}
		};

		let changed = previous.map_or(true, |previous| deps_changed(previous.deps.as_deref(), deps.as_deref()));
		trace!(index, changed, "Effect hook.");

		self.hooks.push(Hook::Effect(EffectHook {
			effect: changed.then(|| Box::new(effect) as EffectFn),
			cleanup: previous.map_or_else(Rc::default, |previous| Rc::clone(&previous.cleanup)),
			deps,
		}));
	}
}
