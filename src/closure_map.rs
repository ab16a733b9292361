use hashbrown::{hash_map::Entry, HashMap};
use js_sys::Function;
use std::cell::RefCell;
use tracing::trace;
use wasm_bindgen::{closure::Closure, JsCast};

thread_local! {
	static CLOSURE_MAP: RefCell<HashMap<&'static str, Closure<dyn Fn(web_sys::Event)>>> = RefCell::default();
}

/// Keeps `handler` alive under `key` and returns the JavaScript function to register.
///
/// Publishing an already published key returns the existing function and drops `handler`.
pub(crate) fn publish(key: &'static str, handler: impl Fn(web_sys::Event) + 'static) -> Function {
	CLOSURE_MAP.with(move |closure_map| {
		let mut closure_map = closure_map.borrow_mut();
		let closure = match closure_map.entry(key) {
			Entry::Occupied(occupied) => occupied.into_mut(),
			Entry::Vacant(vacant) => {
				trace!("Created Closure {:?}.", key);
				vacant.insert(Closure::wrap(Box::new(handler) as Box<dyn Fn(web_sys::Event)>))
			}
		};
		closure.as_ref().unchecked_ref::<Function>().clone()
	})
}

/// The function published under `key`, if any.
pub(crate) fn get(key: &'static str) -> Option<Function> {
	CLOSURE_MAP.with(|closure_map| {
		closure_map
			.borrow()
			.get(key)
			.map(|closure| closure.as_ref().unchecked_ref::<Function>().clone())
	})
}

/// Drops the closure published under `key`, returning its function so it can be unregistered first.
///
/// Calling the returned function afterwards throws.
pub(crate) fn unpublish(key: &'static str) -> Option<Function> {
	CLOSURE_MAP.with(|closure_map| {
		closure_map.borrow_mut().remove(key).map(|closure| {
			trace!("Destroyed Closure {:?}.", key);
			closure.as_ref().unchecked_ref::<Function>().clone()
		})
	})
}
