//! Per-element declared configuration.
//!
//! The directive layer declares configuration with [`ElementConfig::attach`], which keeps it in a `WeakMap` keyed
//! by the element, so that it lives exactly as long as the element does.
//! Elements without attached configuration are read from their plain attributes instead.

use crate::{history::HistoryStrategy, merge::MergeStrategy};
use js_sys::{Array, Object, Reflect, WeakMap};
use tracing::warn;
use wasm_bindgen::{JsCast, JsValue};
use web_sys::Element;

/// Space-separated target ids, or `_top`.
pub const TARGET: &str = "x-target";
pub const MERGE: &str = "x-merge";
pub const MERGE_TRANSITION: &str = "x-merge-transition";
/// A JSON object of extra request headers.
pub const HEADERS: &str = "x-headers";
/// `x-focus="false"` opts out of focus transfer.
pub const FOCUS: &str = "x-focus";
/// `push` or `replace`.
pub const HISTORY: &str = "x-history";
/// Marks elements that are updated by every request.
pub const SYNC: &str = "x-sync";
/// Opts links, forms and submitters out of interception.
pub const NO_AJAX: &str = "noajax";
/// The URL an element's content was loaded from.
pub const SOURCE: &str = "data-source";
pub const AUTOFOCUS: &str = "x-autofocus";
/// `x-head="re-eval"` makes an identical `<head>` element re-run on every whole-document render.
pub const HEAD: &str = "x-head";

thread_local! {
	static CONFIGS: WeakMap = WeakMap::new();
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementConfig {
	/// Declared target ids. `None` falls back to the element's own `id`.
	pub targets: Option<Vec<String>>,
	pub merge: Option<MergeStrategy>,
	pub transition: bool,
	pub headers: Vec<(String, String)>,
	pub focus: bool,
	pub history: Option<HistoryStrategy>,
	pub sync: bool,
}

impl Default for ElementConfig {
	fn default() -> Self {
		Self {
			targets: None,
			merge: None,
			transition: false,
			headers: Vec::new(),
			focus: true,
			history: None,
			sync: false,
		}
	}
}

impl ElementConfig {
	/// Whether `element` opted into interception, through attached configuration or [`TARGET`].
	#[must_use]
	pub fn is_declared(element: &Element) -> bool {
		CONFIGS.with(|configs| configs.has(element.unchecked_ref())) || element.has_attribute(TARGET)
	}

	/// Declares `self` for `element`, replacing any earlier declaration.
	pub fn attach(self, element: &Element) {
		let value = self.to_js();
		CONFIGS.with(|configs| {
			configs.set(element.unchecked_ref(), &value);
		});
	}

	/// Removes the declaration for `element`. Attributes are read again afterwards.
	pub fn detach(element: &Element) {
		CONFIGS.with(|configs| {
			configs.delete(element.unchecked_ref());
		});
	}

	/// The configuration declared for `element`.
	#[must_use]
	pub fn of(element: &Element) -> Self {
		let attached = CONFIGS.with(|configs| configs.get(element.unchecked_ref()));
		if attached.is_undefined() {
			Self::from_attributes(element)
		} else {
			Self::from_js(&attached)
		}
	}

	#[must_use]
	pub fn from_attributes(element: &Element) -> Self {
		Self {
			targets: element.get_attribute(TARGET).and_then(|ids| parse_ids(&ids)),
			merge: element.get_attribute(MERGE).and_then(|name| match name.parse() {
				Ok(strategy) => Some(strategy),
				Err(error) => {
					warn!("Ignoring {}: {}", MERGE, error);
					None
				}
			}),
			transition: element.has_attribute(MERGE_TRANSITION),
			headers: element.get_attribute(HEADERS).map(|json| parse_headers(&json)).unwrap_or_default(),
			focus: element.get_attribute(FOCUS).map_or(true, |focus| focus != "false"),
			history: element.get_attribute(HISTORY).and_then(|name| match name.parse() {
				Ok(strategy) => Some(strategy),
				Err(error) => {
					warn!("Ignoring {}: {}", HISTORY, error);
					None
				}
			}),
			sync: element.has_attribute(SYNC),
		}
	}

	fn to_js(&self) -> JsValue {
		let object = Object::new();
		let set = |key: &str, value: &JsValue| {
			// Setting a property on a fresh plain object can't fail.
			drop(Reflect::set(&object, &JsValue::from_str(key), value));
		};
		if let Some(targets) = &self.targets {
			set("targets", &JsValue::from_str(&targets.join(" ")));
		}
		if let Some(merge) = self.merge {
			set("merge", &JsValue::from_str(merge.as_str()));
		}
		set("transition", &JsValue::from_bool(self.transition));
		set(
			"headers",
			&self
				.headers
				.iter()
				.map(|(name, value)| Array::of2(&JsValue::from_str(name), &JsValue::from_str(value)))
				.collect::<Array>(),
		);
		set("focus", &JsValue::from_bool(self.focus));
		if let Some(history) = self.history {
			set("history", &JsValue::from_str(history.as_str()));
		}
		set("sync", &JsValue::from_bool(self.sync));
		object.into()
	}

	fn from_js(value: &JsValue) -> Self {
		let get = |key: &str| Reflect::get(value, &JsValue::from_str(key)).unwrap_or(JsValue::UNDEFINED);
		let defaults = Self::default();
		Self {
			targets: get("targets").as_string().and_then(|ids| parse_ids(&ids)),
			merge: get("merge").as_string().and_then(|name| name.parse().ok()),
			transition: get("transition").as_bool().unwrap_or(defaults.transition),
			headers: get("headers")
				.dyn_into::<Array>()
				.map(|headers| {
					headers
						.iter()
						.filter_map(|pair| {
							let pair: Array = pair.dyn_into().ok()?;
							Some((pair.get(0).as_string()?, pair.get(1).as_string()?))
						})
						.collect()
				})
				.unwrap_or_default(),
			focus: get("focus").as_bool().unwrap_or(defaults.focus),
			history: get("history").as_string().and_then(|name| name.parse().ok()),
			sync: get("sync").as_bool().unwrap_or(defaults.sync),
		}
	}
}

/// Splits a space-separated id list. Blank lists mean "no explicit targets".
#[must_use]
pub fn parse_ids(ids: &str) -> Option<Vec<String>> {
	let ids: Vec<String> = ids.split_whitespace().map(str::to_owned).collect();
	if ids.is_empty() {
		None
	} else {
		Some(ids)
	}
}

/// Parses a JSON object of header names to values. Non-string values are serialised.
#[must_use]
pub fn parse_headers(json: &str) -> Vec<(String, String)> {
	match serde_json::from_str::<serde_json::Map<String, serde_json::Value>>(json) {
		Ok(object) => object
			.into_iter()
			.map(|(name, value)| {
				let value = match value {
					serde_json::Value::String(value) => value,
					other => other.to_string(),
				};
				(name, value)
			})
			.collect(),
		Err(error) => {
			warn!("Ignoring malformed {}: {}", HEADERS, error);
			Vec::new()
		}
	}
}
