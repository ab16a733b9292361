//! Lifecycle events, dispatched as bubbling, composed, cancelable `CustomEvent`s.

use crate::transport::Response;
use js_sys::{Object, Reflect};
use tracing::{error, trace};
use wasm_bindgen::JsValue;
use web_sys::{CustomEvent, CustomEventInit, Element};

/// Cancelable. Prevents the request.
pub const BEFORE: &str = "ajax:before";
pub const SUCCESS: &str = "ajax:success";
pub const ERROR: &str = "ajax:error";
/// Always follows [`SUCCESS`] or [`ERROR`].
pub const AFTER: &str = "ajax:after";
/// Cancelable. Keeps a target that the response has no fragment for.
pub const MISSING: &str = "ajax:missing";
/// Cancelable. A listener that cancels it must call `event.detail.merge()` to run the merge later.
pub const MERGE: &str = "ajax:merge";
pub const MERGED: &str = "ajax:merged";

/// Dispatches `name` on `element`. Returns `false` if a listener cancelled it.
pub fn dispatch(element: &Element, name: &str, detail: &JsValue) -> bool {
	let init = CustomEventInit::new();
	init.set_bubbles(true);
	init.set_cancelable(true);
	init.set_composed(true);
	init.set_detail(detail);

	let event = match CustomEvent::new_with_event_init_dict(name, &init) {
		Ok(event) => event,
		Err(error) => {
			error!("Failed to create {:?} event: {:?}", name, error);
			return true;
		}
	};
	trace!("Dispatching {:?}.", name);
	match element.dispatch_event(&event) {
		Ok(proceed) => proceed,
		Err(error) => {
			error!("Failed to dispatch {:?} event: {:?}", name, error);
			true
		}
	}
}

/// An event detail object with the given properties.
#[must_use]
pub fn detail(properties: &[(&str, &JsValue)]) -> JsValue {
	let object = Object::new();
	for (key, value) in properties {
		drop(Reflect::set(&object, &JsValue::from_str(key), value));
	}
	object.into()
}

/// `{ url, status, ok, html }`.
#[must_use]
pub fn response_detail(response: &Response) -> JsValue {
	detail(&[
		("url", &JsValue::from_str(&response.url)),
		("status", &JsValue::from(response.status)),
		("ok", &JsValue::from_bool(response.ok)),
		("html", &JsValue::from_str(&response.html)),
	])
}
