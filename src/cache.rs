//! A small FIFO cache of successful `GET` responses, used for optimistic replay when a link is followed again.
//!
//! Note that entries are never invalidated by mutating requests, so a replay may briefly show content that a
//! `POST` has since changed. The live request that always follows a replay corrects this.

use crate::transport::Response;
use hashbrown::HashMap;
use std::{cell::RefCell, collections::VecDeque};
use tracing::trace;

/// Maximum number of cached responses.
pub const CAPACITY: usize = 10;

thread_local! {
	static CACHE: RefCell<ResponseCache> = RefCell::new(ResponseCache::new(CAPACITY));
}

/// Runs `f` with the shared response cache.
pub fn with<T>(f: impl FnOnce(&mut ResponseCache) -> T) -> T {
	CACHE.with(|cache| f(&mut cache.borrow_mut()))
}

/// Cache identity of `url`: everything before the first `#`.
#[must_use]
pub fn key(url: &str) -> &str {
	url.split('#').next().unwrap_or(url)
}

#[derive(Debug)]
pub struct ResponseCache {
	capacity: usize,
	order: VecDeque<String>,
	entries: HashMap<String, Response>,
}

impl ResponseCache {
	#[must_use]
	pub fn new(capacity: usize) -> Self {
		Self {
			capacity,
			order: VecDeque::with_capacity(capacity),
			entries: HashMap::with_capacity(capacity),
		}
	}

	#[must_use]
	pub fn get(&self, url: &str) -> Option<&Response> {
		self.entries.get(key(url))
	}

	/// Stores `response` under [`key`]`(url)`.
	///
	/// If the cache is already full, the oldest entry is evicted first, even when `url` is already present.
	/// Overwriting an entry that survives keeps its original position in the eviction order.
	pub fn set(&mut self, url: &str, response: Response) {
		if self.entries.len() >= self.capacity {
			if let Some(oldest) = self.order.pop_front() {
				trace!("Evicting cached response for {:?}.", oldest);
				self.entries.remove(&oldest);
			}
		}

		let key = key(url);
		if self.entries.insert(key.to_owned(), response).is_none() {
			self.order.push_back(key.to_owned());
		}
	}

	#[must_use]
	pub fn len(&self) -> usize {
		self.entries.len()
	}

	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}

	pub fn clear(&mut self) {
		self.order.clear();
		self.entries.clear();
	}
}
