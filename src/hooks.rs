//! Synchronous extension points that can veto a step of the pipeline.
//!
//! Hooks run alongside the matching cancelable DOM event. A step proceeds only if every hook registered for its
//! [`HookPoint`] returns [`Flow::Proceed`] and the event was not cancelled.

use crate::{merge::MergeStrategy, request::RequestDescriptor, transport::Response};
use std::{cell::RefCell, rc::Rc};
use tracing::debug;
use web_sys::Element;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookPoint {
	/// Before a request is dispatched. Aborting skips the request entirely.
	BeforeRequest,
	/// A target has no matching fragment in the response. Aborting keeps the target and suppresses the render error.
	TargetMissing,
	/// Before a fragment is merged into its target. Aborting skips the merge.
	MergeBegin,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
	Proceed,
	Abort,
}

#[derive(Debug)]
pub struct HookContext<'a> {
	pub point: HookPoint,
	/// The origin element for [`HookPoint::BeforeRequest`], otherwise the target.
	pub element: &'a Element,
	pub request: Option<&'a RequestDescriptor>,
	pub response: Option<&'a Response>,
	pub strategy: Option<MergeStrategy>,
}

impl<'a> HookContext<'a> {
	#[must_use]
	pub fn new(point: HookPoint, element: &'a Element) -> Self {
		Self {
			point,
			element,
			request: None,
			response: None,
			strategy: None,
		}
	}
}

pub type Hook = Rc<dyn Fn(&HookContext<'_>) -> Flow>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HookId(u64);

#[derive(Default)]
struct Registry {
	next: u64,
	hooks: Vec<(HookId, HookPoint, Hook)>,
}

thread_local! {
	static REGISTRY: RefCell<Registry> = RefCell::new(Registry::default());
}

/// Registers `hook` for `point`.
pub fn register(point: HookPoint, hook: impl Fn(&HookContext<'_>) -> Flow + 'static) -> HookId {
	REGISTRY.with(|registry| {
		let mut registry = registry.borrow_mut();
		let id = HookId(registry.next);
		registry.next += 1;
		registry.hooks.push((id, point, Rc::new(hook)));
		id
	})
}

/// Removes a hook. Returns whether it was registered.
pub fn unregister(id: HookId) -> bool {
	REGISTRY.with(|registry| {
		let hooks = &mut registry.borrow_mut().hooks;
		let before = hooks.len();
		hooks.retain(|(existing, _, _)| *existing != id);
		hooks.len() != before
	})
}

/// Runs the hooks for `context.point` in registration order, stopping at the first [`Flow::Abort`].
pub(crate) fn run(context: &HookContext<'_>) -> Flow {
	// Cloned out so that hooks may (un)register hooks.
	let hooks: Vec<Hook> = REGISTRY.with(|registry| {
		registry
			.borrow()
			.hooks
			.iter()
			.filter(|(_, point, _)| *point == context.point)
			.map(|(_, _, hook)| Rc::clone(hook))
			.collect()
	});

	for hook in hooks {
		if hook(context) == Flow::Abort {
			debug!(point = ?context.point, "Aborted by hook.");
			return Flow::Abort;
		}
	}
	Flow::Proceed
}
