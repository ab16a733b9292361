//! Browser history synchronisation.

use crate::error::{Error, Result};
use core::{fmt, str::FromStr};
use js_sys::{Object, Reflect};
use tracing::{debug, instrument};
use wasm_bindgen::{JsValue, UnwrapThrowExt};
use web_sys::PopStateEvent;

/// Property set on every history state object written here.
pub const MARKER: &str = "__ajax_dom";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryStrategy {
	/// Add a new entry.
	Push,
	/// Overwrite the current entry.
	Replace,
}

impl HistoryStrategy {
	#[must_use]
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Push => "push",
			Self::Replace => "replace",
		}
	}

	/// Records `url` as the current location.
	#[instrument]
	pub fn apply(self, url: &str) -> Result<()> {
		let history = web_sys::window().expect_throw("ajax-dom: No `window` found.").history()?;
		let state = state(url);
		match self {
			Self::Push => history.push_state_with_url(&state, "", Some(url))?,
			Self::Replace => history.replace_state_with_url(&state, "", Some(url))?,
		}
		debug!("History updated.");
		Ok(())
	}
}

impl FromStr for HistoryStrategy {
	type Err = Error;

	fn from_str(s: &str) -> Result<Self> {
		match s.trim().to_ascii_lowercase().as_str() {
			"push" => Ok(Self::Push),
			"replace" => Ok(Self::Replace),
			_ => Err(Error::UnknownStrategy(s.to_owned())),
		}
	}
}

impl fmt::Display for HistoryStrategy {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

fn state(url: &str) -> JsValue {
	let state = Object::new();
	// Plain object, can't fail.
	drop(Reflect::set(&state, &JsValue::from_str(MARKER), &JsValue::TRUE));
	drop(Reflect::set(&state, &JsValue::from_str("url"), &JsValue::from_str(url)));
	state.into()
}

/// Whether `state` was written by [`HistoryStrategy::apply`].
#[must_use]
pub fn is_own_state(state: &JsValue) -> bool {
	state.is_object() && Reflect::get(state, &JsValue::from_str(MARKER)).map_or(false, |marker| marker.is_truthy())
}

/// Reloads the page when the browser moves onto an entry created here, so the server renders it in full.
pub(crate) fn on_pop_state(event: &PopStateEvent) {
	if is_own_state(&event.state()) {
		debug!("Reloading for history entry.");
		if let Some(window) = web_sys::window() {
			if let Err(error) = window.location().reload() {
				tracing::error!("Failed to reload: {:?}", error);
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn names() {
		assert_eq!("push".parse::<HistoryStrategy>().unwrap(), HistoryStrategy::Push);
		assert_eq!("Replace".parse::<HistoryStrategy>().unwrap(), HistoryStrategy::Replace);
		assert!("back".parse::<HistoryStrategy>().is_err());
	}
}
