//! Programmatic requests, for actions that aren't links or forms.

use crate::{
	element::{self, ElementConfig},
	error::{Error, Result},
	render::{self, RenderOptions},
	request::{self, Body, Encoding, Method},
	target,
};
use tracing::instrument;
use web_sys::Element;

/// Options for [`ajax`].
#[derive(Debug, Clone, Default)]
pub struct AjaxOptions {
	/// Space-separated target ids, overriding `origin`'s declared ones. `_top` renders the whole document.
	/// A blank list is an identifier error.
	pub target: Option<String>,
	/// Also update every `x-sync` element.
	pub sync: bool,
	/// Defaults to `GET`.
	pub method: Option<String>,
	pub body: Option<Body>,
	pub encoding: Encoding,
	/// Dispatch the request lifecycle events on `origin`.
	pub events: bool,
}

/// Requests `action` on behalf of `origin` and renders the response into its targets.
///
/// Returns the elements that represent the targets afterwards.
///
/// # Errors
///
/// [`Error::Cancelled`](`crate::Error::Cancelled`) if a later request for the same targets superseded this one.
/// [`Error::Identifier`](`crate::Error::Identifier`) and [`Error::TargetNotFound`](`crate::Error::TargetNotFound`) if the
/// targets can't be resolved, before anything is requested. A blank [`AjaxOptions::target`] doesn't resolve.
#[instrument(skip(origin, options), fields(target = ?options.target))]
pub async fn ajax(origin: &Element, action: &str, options: AjaxOptions) -> Result<Vec<Element>> {
	let AjaxOptions {
		target,
		sync,
		method,
		body,
		encoding,
		events,
	} = options;

	let explicit = target
		.as_deref()
		.map(|ids| element::parse_ids(ids).ok_or_else(|| Error::Identifier { element: target::describe(origin) }))
		.transpose()?;
	let mut targets = target::targets(origin, explicit)?;
	if sync {
		targets = target::add_sync_targets(targets);
	}

	let method = method.map(|method| method.parse::<Method>().unwrap_or_default()).unwrap_or_default();
	let request = request::build(origin, action, method, body, encoding);
	let options = RenderOptions::live(ElementConfig::of(origin).history);
	render::render(request, targets, origin, events, options).await
}
