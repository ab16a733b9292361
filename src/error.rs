//! The crate's error type.
//!
//! Failures before a response is retrieved are returned as [`Err`]. Once a response exists, transport failure is
//! represented by [`Response::ok`](`crate::transport::Response::ok`) instead, except for [`Error::Render`],
//! which exists so that the interceptor can fall back to native navigation.

use thiserror::Error;
use wasm_bindgen::JsValue;

/// Shorthand for `Result<T, ajax_dom::Error>`.
pub type Result<T> = core::result::Result<T, Error>;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
	/// The origin element declared no target list and has no `id` of its own.
	#[error("target missing: add an `id` to {element} or declare target ids")]
	Identifier { element: String },

	/// A declared target id does not match any element in the live document.
	#[error("target #{0} was not found in the current document")]
	TargetNotFound(String),

	/// The response lacked a fragment for a target and the `ajax:missing` event was not cancelled.
	#[error("target #{id} was not found in the response (status {status})")]
	Render { id: String, status: u16 },

	/// The request was superseded by a newer one for the same target (or an enclosing one).
	///
	/// This is not a failure from the caller's perspective.
	#[error("operation superseded")]
	Cancelled,

	#[error("unknown strategy {0:?}")]
	UnknownStrategy(String),

	#[error("configuration error: {0}")]
	Config(String),

	#[error("platform error: {0}")]
	Js(String),
}

impl Error {
	#[must_use]
	pub fn is_cancelled(&self) -> bool {
		matches!(self, Self::Cancelled)
	}

	#[must_use]
	pub fn is_render(&self) -> bool {
		matches!(self, Self::Render { .. })
	}
}

impl From<JsValue> for Error {
	fn from(value: JsValue) -> Self {
		Self::Js(value.as_string().unwrap_or_else(|| format!("{:?}", value)))
	}
}
