//! Process-wide defaults.
//!
//! Set once during startup through [`configure`] and read as snapshots by the request and merge pipeline.
//! Later calls to [`configure`] are last-write-wins.

use crate::merge::MergeStrategy;
use std::{cell::RefCell, fmt, rc::Rc};
use tracing::debug;
use wasm_bindgen::JsValue;
use web_sys::Element;

/// Request header marking requests issued by this crate.
pub const REQUEST_HEADER: &str = "X-Ajax-Request";
/// Request header listing the target ids, space-separated.
pub const TARGET_HEADER: &str = "X-Ajax-Target";
/// Target id standing for the whole document.
pub const TOP: &str = "_top";

/// The external fine-grained tree diffing collaborator used by [`MergeStrategy::Morph`].
///
/// Called with the existing element and the incoming one. The existing element must represent the target afterwards.
pub type Morph = Rc<dyn Fn(&Element, &Element) -> Result<(), JsValue>>;

#[derive(Clone, Default)]
pub struct Config {
	/// Sent with every request, before per-element headers.
	pub headers: Vec<(String, String)>,
	/// Strategy for targets that don't declare one.
	pub merge: MergeStrategy,
	/// Whether merges run inside a view transition unless a target opts in itself.
	pub transition: bool,
	pub morph: Option<Morph>,
}

impl fmt::Debug for Config {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Config")
			.field("headers", &self.headers)
			.field("merge", &self.merge)
			.field("transition", &self.transition)
			.field("morph", &self.morph.as_ref().map(|_| "Fn(&Element, &Element)"))
			.finish()
	}
}

thread_local! {
	static CONFIG: RefCell<Config> = RefCell::new(Config::default());
}

/// Updates the global configuration.
pub fn configure(f: impl FnOnce(&mut Config)) {
	CONFIG.with(|config| {
		let mut config = config.borrow_mut();
		f(&mut config);
		debug!(config = ?*config, "Configured.");
	});
}

/// A copy of the current global configuration.
#[must_use]
pub fn snapshot() -> Config {
	CONFIG.with(|config| config.borrow().clone())
}
