//! Tracks the in-flight request per target id.
//!
//! At most one request is owned by a target id at a time. Registering a new one cancels the previous owner, along
//! with any request for a busy descendant of the new target, before the new entry is stored.
//! Descendants are scanned only at registration time.

use hashbrown::HashMap;
use std::cell::RefCell;
use tracing::trace;
use wasm_bindgen::JsCast;
use web_sys::{AbortController, Element, Node};

/// Busy marker attribute.
pub const BUSY: &str = "aria-busy";

/// A node that can carry the busy marker.
pub trait TargetNode {
	fn is_busy(&self) -> bool;
	fn set_busy(&self, busy: bool);
	/// Whether `other` is `self` or one of its descendants.
	fn contains(&self, other: &Self) -> bool;
}

/// A cooperative cancellation token.
pub trait Cancel {
	fn cancel(&self);
}

impl TargetNode for Element {
	fn is_busy(&self) -> bool {
		self.has_attribute(BUSY)
	}

	fn set_busy(&self, busy: bool) {
		if busy {
			// Can't fail for a valid attribute name.
			drop(self.set_attribute(BUSY, "true"));
		} else {
			drop(self.remove_attribute(BUSY));
		}
	}

	fn contains(&self, other: &Self) -> bool {
		let node: &Node = self.unchecked_ref();
		node.contains(Some(other.unchecked_ref()))
	}
}

impl Cancel for AbortController {
	fn cancel(&self) {
		self.abort();
	}
}

struct Entry<N, C> {
	token: C,
	target: N,
}

pub struct PendingTracker<N, C> {
	entries: HashMap<String, Entry<N, C>>,
}

impl<N, C> Default for PendingTracker<N, C> {
	fn default() -> Self {
		Self { entries: HashMap::new() }
	}
}

impl<N: TargetNode + PartialEq, C: Cancel + PartialEq> PendingTracker<N, C> {
	#[must_use]
	pub fn new() -> Self {
		Self::default()
	}

	/// Registers `token` as the owner of `id`, cancelling whatever it supersedes, and marks `target` busy.
	///
	/// Entries already owned by `token` (other targets of the same request) are never cancelled.
	pub fn set(&mut self, id: &str, target: N, token: C) {
		if self.entries.get(id).map_or(false, |entry| entry.token != token) {
			self.abort(id);
		}

		let superseded: Vec<String> = self
			.entries
			.iter()
			.filter(|(_, entry)| entry.token != token && entry.target != target && entry.target.is_busy() && target.contains(&entry.target))
			.map(|(id, _)| id.clone())
			.collect();
		for id in superseded {
			trace!("Cancelling request for busy descendant #{}.", id);
			self.abort(&id);
		}

		target.set_busy(true);
		self.entries.insert(id.to_owned(), Entry { token, target });
	}

	/// Cancels the request owning `id`, if any, and clears its target's busy marker.
	pub fn abort(&mut self, id: &str) {
		if let Some(Entry { token, target }) = self.entries.remove(id) {
			trace!("Cancelling request for #{}.", id);
			token.cancel();
			target.set_busy(false);
		}
	}

	/// Forgets `id` once its request resolved, but only if `token` still owns it.
	///
	/// The busy marker is left alone, since the merge clears it.
	pub fn finish(&mut self, id: &str, token: &C) {
		if self.entries.get(id).map_or(false, |entry| &entry.token == token) {
			self.entries.remove(id);
		}
	}

	/// [`abort`](`PendingTracker::abort`)s `id`, but only if `token` still owns it.
	pub fn abort_owned(&mut self, id: &str, token: &C) {
		if self.entries.get(id).map_or(false, |entry| &entry.token == token) {
			self.abort(id);
		}
	}

	/// Points `id`'s entry at `target`, which replaced the previous node (after an optimistic replay).
	pub fn retarget(&mut self, id: &str, target: N) {
		if let Some(entry) = self.entries.get_mut(id) {
			target.set_busy(true);
			entry.target = target;
		}
	}

	#[must_use]
	pub fn is_pending(&self, id: &str) -> bool {
		self.entries.contains_key(id)
	}

	#[must_use]
	pub fn len(&self) -> usize {
		self.entries.len()
	}

	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}
}

thread_local! {
	static PENDING: RefCell<PendingTracker<Element, AbortController>> = RefCell::new(PendingTracker::new());
}

/// Runs `f` with the shared tracker.
pub fn with<T>(f: impl FnOnce(&mut PendingTracker<Element, AbortController>) -> T) -> T {
	PENDING.with(|pending| f(&mut pending.borrow_mut()))
}

/// Cancels the request currently owning `id`. A miss is a no-op.
pub fn abort(id: &str) {
	with(|pending| pending.abort(id));
}
