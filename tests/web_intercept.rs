#![cfg(target_arch = "wasm32")]

use ajax_dom::{
	cache,
	hooks::{self, Flow, HookPoint},
	interceptor::{self, clicked_link, resubmit, submitted_form, BYPASS, DISABLED},
	transport::Response,
};
use js_sys::{Function, Promise, Reflect, JSON};
use std::{cell::RefCell, rc::Rc};
use wasm_bindgen::{closure::Closure, JsCast, JsValue};
use wasm_bindgen_futures::JsFuture;
use wasm_bindgen_test::{wasm_bindgen_test, wasm_bindgen_test_configure};
use web_sys::{window, Element, Event, HtmlElement, HtmlFormElement, MouseEvent, MouseEventInit, SubmitEvent};

wasm_bindgen_test_configure!(run_in_browser);

static mut LOG_INITIALIZED: bool = false;

fn init() {
	unsafe {
		if !LOG_INITIALIZED {
			tracing_wasm::set_as_global_default();
			LOG_INITIALIZED = true;
		}
	}
}

fn fixture(html: &str) -> Element {
	let document = window().unwrap().document().unwrap();
	let container = document.create_element("div").unwrap();
	container.set_inner_html(html);
	document.body().unwrap().append_child(&container).unwrap();
	container
}

fn by_id(id: &str) -> Element {
	window().unwrap().document().unwrap().get_element_by_id(id).unwrap()
}

async fn sleep(milliseconds: i32) {
	let promise = Promise::new(&mut |resolve, _reject| {
		window()
			.unwrap()
			.set_timeout_with_callback_and_timeout_and_arguments_0(&resolve, milliseconds)
			.unwrap();
	});
	JsFuture::from(promise).await.unwrap();
}

/// Answers every `fetch` with `html` and `status` after `delay` milliseconds, until dropped.
struct StubFetch {
	original: JsValue,
}

impl StubFetch {
	fn new(status: u16, html: &str, delay: u32) -> Self {
		let window = window().unwrap();
		let original = Reflect::get(&window, &JsValue::from_str("fetch")).unwrap();
		let body = JSON::stringify(&JsValue::from_str(html)).unwrap();
		let stub = Function::new_no_args(&format!(
			"return new Promise(resolve => setTimeout(() => resolve(new Response({}, {{ status: {}, headers: {{ 'Content-Type': 'text/html' }} }})), {}));",
			String::from(body),
			status,
			delay
		));
		Reflect::set(&window, &JsValue::from_str("fetch"), &stub).unwrap();
		Self { original }
	}
}

impl Drop for StubFetch {
	fn drop(&mut self) {
		Reflect::set(&window().unwrap(), &JsValue::from_str("fetch"), &self.original).unwrap();
	}
}

/// Whether a click on `id` would be intercepted. The click itself is cancelled.
fn intercepts(id: &str, modify: impl FnOnce(&MouseEventInit)) -> bool {
	let init = MouseEventInit::new();
	init.set_bubbles(true);
	init.set_cancelable(true);
	modify(&init);
	let event = MouseEvent::new_with_mouse_event_init_dict("click", &init).unwrap();

	let document = window().unwrap().document().unwrap();
	let observed: Rc<RefCell<Option<bool>>> = Rc::default();
	let observe = Closure::wrap(Box::new({
		let observed = Rc::clone(&observed);
		move |event: Event| {
			*observed.borrow_mut() = Some(clicked_link(event.unchecked_ref()).is_some());
			event.prevent_default();
		}
	}) as Box<dyn Fn(Event)>);
	document.add_event_listener_with_callback("click", observe.as_ref().unchecked_ref()).unwrap();
	by_id(id).dispatch_event(&event).unwrap();
	document.remove_event_listener_with_callback("click", observe.as_ref().unchecked_ref()).unwrap();

	let observed = observed.borrow().expect("click did not reach the document");
	observed
}

#[wasm_bindgen_test]
fn link_eligibility() {
	init();
	let container = fixture(
		r##"<a id="link-plain" href="/page" x-target="link-plain"><span id="link-inner">text</span></a>
		<a id="link-undeclared" href="/page"></a>
		<a id="link-noajax" href="/page" x-target="link-noajax" noajax></a>
		<a id="link-hash" href="#section" x-target="link-hash"></a>
		<a id="link-blank" href="/page" target="_blank" x-target="link-blank"></a>
		<a id="link-self" href="/page" target="_self" x-target="link-self"></a>
		<a id="link-external" href="https://example.com/page" x-target="link-external"></a>
		<a id="link-download" href="/page" download x-target="link-download"></a>"##,
	);

	assert!(intercepts("link-plain", |_| ()));
	assert!(intercepts("link-inner", |_| ()));
	assert!(intercepts("link-self", |_| ()));

	assert!(!intercepts("link-plain", |init| init.set_ctrl_key(true)));
	assert!(!intercepts("link-plain", |init| init.set_meta_key(true)));
	assert!(!intercepts("link-plain", |init| init.set_shift_key(true)));
	assert!(!intercepts("link-plain", |init| init.set_button(1)));

	for id in ["link-undeclared", "link-noajax", "link-hash", "link-blank", "link-external", "link-download"].iter() {
		assert!(!intercepts(id, |_| ()), "{} was intercepted", id);
	}
	container.remove();
}

#[wasm_bindgen_test]
fn in_page_link_is_left_alone() {
	init();
	let location = window().unwrap().location();
	let here = format!("{}{}#section", location.pathname().unwrap(), location.search().unwrap());
	let container = fixture(&format!(r#"<a id="link-in-page" href="{}" x-target="link-in-page"></a>"#, here));

	assert!(!intercepts("link-in-page", |_| ()));
	container.remove();
}

/// Runs `submit` while recording, for each submit event, whether it would be intercepted. Every submission is cancelled.
fn record_submissions(submit: impl FnOnce()) -> Vec<bool> {
	let recorded: Rc<RefCell<Vec<bool>>> = Rc::default();
	let listener = Closure::wrap(Box::new({
		let recorded = Rc::clone(&recorded);
		move |event: Event| {
			recorded.borrow_mut().push(submitted_form(event.unchecked_ref::<SubmitEvent>()).is_some());
			event.prevent_default();
		}
	}) as Box<dyn Fn(Event)>);
	let document = window().unwrap().document().unwrap();
	document.add_event_listener_with_callback("submit", listener.as_ref().unchecked_ref()).unwrap();
	submit();
	document.remove_event_listener_with_callback("submit", listener.as_ref().unchecked_ref()).unwrap();
	let recorded = recorded.borrow().clone();
	recorded
}

#[wasm_bindgen_test]
fn render_error_resubmits_natively_once() {
	init();
	let container = fixture(r#"<form id="form-declared" action="/save" method="post" x-target="form-declared"><button id="form-save" name="intent" value="save">Save</button></form>"#);
	let form: HtmlFormElement = by_id("form-declared").unchecked_into();

	let submissions = record_submissions(|| {
		form.request_submit().unwrap();
		resubmit(&form, Some(by_id("form-save").unchecked_ref()), "https://example.com/items/5/save");
		form.request_submit().unwrap();
	});

	assert_eq!(submissions, vec![true, false, true]);
	assert!(!form.has_attribute(BYPASS));
	assert_eq!(form.get_attribute("action").as_deref(), Some("/save"));
	container.remove();
}

#[wasm_bindgen_test]
async fn failed_submission_falls_back_once_to_the_same_action() {
	init();
	interceptor::install().unwrap();
	let origin = window().unwrap().location().origin().unwrap();
	let container = fixture(&format!(
		r#"<div data-source="{}/items/5/"><form id="fallback-form" action="save" method="post" x-target="fallback-form"><button id="fallback-save">Save</button></form></div>"#,
		origin
	));
	let form: HtmlFormElement = by_id("fallback-form").unchecked_into();
	let button: HtmlElement = by_id("fallback-save").unchecked_into();

	let native: Rc<RefCell<Vec<String>>> = Rc::default();
	let listener = Closure::wrap(Box::new({
		let native = Rc::clone(&native);
		move |event: Event| {
			if !event.default_prevented() {
				let form: HtmlFormElement = event.target().unwrap().unchecked_into();
				native.borrow_mut().push(form.action());
				event.prevent_default();
			}
		}
	}) as Box<dyn Fn(Event)>);
	window().unwrap().add_event_listener_with_callback("submit", listener.as_ref().unchecked_ref()).unwrap();

	let fetch = StubFetch::new(422, "<p>Invalid</p>", 20);
	form.request_submit_with_submitter(&button).unwrap();
	sleep(0).await;

	assert_eq!(button.get_attribute(DISABLED).as_deref(), Some("true"));
	let click = MouseEvent::new_with_mouse_event_init_dict("click", &{
		let init = MouseEventInit::new();
		init.set_bubbles(true);
		init.set_cancelable(true);
		init
	})
	.unwrap();
	assert!(!button.dispatch_event(&click).unwrap(), "click on a pending submitter went through");
	assert!(native.borrow().is_empty());

	sleep(200).await;
	drop(fetch);

	assert_eq!(*native.borrow(), vec![format!("{}/items/5/save", origin)]);
	assert!(!button.has_attribute(DISABLED));
	assert_eq!(form.get_attribute("action").as_deref(), Some("save"));
	assert!(!form.has_attribute(BYPASS));

	window().unwrap().remove_event_listener_with_callback("submit", listener.as_ref().unchecked_ref()).unwrap();
	interceptor::uninstall().unwrap();
	container.remove();
}

#[wasm_bindgen_test]
async fn link_replays_cached_page_before_the_live_one() {
	init();
	interceptor::install().unwrap();
	let origin = window().unwrap().location().origin().unwrap();
	let href = format!("{}/navigate-cached", origin);
	cache::with(|cache| {
		cache.set(
			&href,
			Response {
				url: href.clone(),
				status: 200,
				ok: true,
				html: r#"<div id="navigate-box">cached</div>"#.to_owned(),
			},
		)
	});
	let container = fixture(r#"<a id="navigate-link" href="/navigate-cached" x-target="navigate-box">Go</a><div id="navigate-box">old</div>"#);

	let before_live: Rc<RefCell<Option<String>>> = Rc::default();
	let hook = hooks::register(HookPoint::MergeBegin, {
		let before_live = Rc::clone(&before_live);
		move |context| {
			*before_live.borrow_mut() = context.element.text_content();
			Flow::Proceed
		}
	});

	let fetch = StubFetch::new(200, r#"<div id="navigate-box">live</div>"#, 20);
	by_id("navigate-link").unchecked_into::<HtmlElement>().click();
	sleep(0).await;
	assert_eq!(by_id("navigate-box").text_content().as_deref(), Some("cached"));

	sleep(200).await;
	drop(fetch);

	assert_eq!(before_live.borrow().as_deref(), Some("cached"));
	let target = by_id("navigate-box");
	assert_eq!(target.text_content().as_deref(), Some("live"));
	assert!(!target.has_attribute("aria-busy"));

	assert!(hooks::unregister(hook));
	cache::with(|cache| cache.clear());
	assert!(cache::with(|cache| cache.get(&href).is_none()));
	interceptor::uninstall().unwrap();
	container.remove();
}

#[wasm_bindgen_test]
fn form_eligibility() {
	init();
	let container = fixture(
		r#"<form id="form-undeclared" action="/save"></form>
		<form id="form-noajax" action="/save" x-target="form-noajax" noajax></form>
		<form id="form-dialog" method="dialog" x-target="form-dialog"></form>
		<form id="form-blank" action="/save" target="_blank" x-target="form-blank"></form>
		<form id="form-opt-out" action="/save" x-target="form-opt-out"><button id="form-opt-out-button" noajax>Save</button></form>"#,
	);

	let submissions = record_submissions(|| {
		for id in ["form-undeclared", "form-noajax", "form-dialog", "form-blank"].iter() {
			by_id(id).unchecked_into::<HtmlFormElement>().request_submit().unwrap();
		}
		by_id("form-opt-out")
			.unchecked_into::<HtmlFormElement>()
			.request_submit_with_submitter(by_id("form-opt-out-button").unchecked_ref())
			.unwrap();
	});

	assert_eq!(submissions, vec![false; 5]);
	container.remove();
}

#[wasm_bindgen_test]
fn install_is_idempotent() {
	init();
	interceptor::install().unwrap();
	interceptor::install().unwrap();
	interceptor::uninstall().unwrap();
	interceptor::uninstall().unwrap();
}
