//! Resolves declared target ids to live elements.

use crate::{
	config::TOP,
	element::{ElementConfig, SYNC},
	error::{Error, Result},
};
use tracing::trace;
use wasm_bindgen::{JsCast, UnwrapThrowExt};
use web_sys::{Document, Element};

pub(crate) fn document() -> Document {
	web_sys::window()
		.expect_throw("ajax-dom: No `window` found.")
		.document()
		.expect_throw("ajax-dom: No `document` found.")
}

/// The ids `origin` targets: `explicit` if given, else its declared targets, else its own `id`.
///
/// An empty list means the whole document (`_top`).
pub fn parse_ids(origin: &Element, explicit: Option<Vec<String>>) -> Result<Vec<String>> {
	let ids = match explicit.or_else(|| ElementConfig::of(origin).targets) {
		Some(ids) => ids,
		None => {
			let id = origin.id();
			if id.is_empty() {
				return Err(Error::Identifier { element: describe(origin) });
			}
			vec![id]
		}
	};

	if ids.iter().any(|id| id == TOP) {
		Ok(Vec::new())
	} else {
		Ok(ids)
	}
}

/// Looks up every id in the live document. Fails on the first one that doesn't exist.
pub fn resolve(ids: &[String]) -> Result<Vec<Element>> {
	let document = document();
	ids.iter()
		.map(|id| document.get_element_by_id(id).ok_or_else(|| Error::TargetNotFound(id.clone())))
		.collect()
}

/// Resolves `origin`'s targets.
pub fn targets(origin: &Element, explicit: Option<Vec<String>>) -> Result<Vec<Element>> {
	resolve(&parse_ids(origin, explicit)?)
}

/// Appends every `x-sync` element that isn't already among `targets`.
///
/// Whole-document renders (no targets) are left alone, since they update sync elements anyway.
pub fn add_sync_targets(mut targets: Vec<Element>) -> Vec<Element> {
	if targets.is_empty() {
		return targets;
	}

	let synced = match document().query_selector_all(&format!("[{}]", SYNC)) {
		Ok(synced) => synced,
		Err(error) => {
			tracing::error!("Failed to query sync targets: {:?}", error);
			return targets;
		}
	};
	for i in 0..synced.length() {
		let element = match synced.item(i).and_then(|node| node.dyn_into::<Element>().ok()) {
			Some(element) => element,
			None => continue,
		};
		if element.id().is_empty() {
			tracing::warn!("Ignoring sync element without `id`: {:?}", describe(&element));
			continue;
		}
		if !targets.contains(&element) {
			trace!("Adding sync target #{}.", element.id());
			targets.push(element);
		}
	}
	targets
}

/// `<tag id="…">`-style description for messages.
pub(crate) fn describe(element: &Element) -> String {
	let id = element.id();
	if id.is_empty() {
		format!("<{}>", element.local_name())
	} else {
		format!("<{} id={:?}>", element.local_name(), id)
	}
}
