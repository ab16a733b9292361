//! Intercepts link clicks and form submissions.
//!
//! A capture-phase listener on `window` re-registers the actual handlers on `document` for every event, which makes
//! them the last listeners to run there. Application listeners that cancel the event therefore always opt out in time.

use crate::{
	cache, closure_map,
	element::{ElementConfig, NO_AJAX},
	error::{Error, Result},
	history,
	render::{self, RenderOptions},
	request::{self, Body, Encoding, Method},
	target::{self, document},
	transport,
};
use tracing::{debug, error, instrument, trace, warn};
use wasm_bindgen::{closure::Closure, throw_str, JsCast, UnwrapThrowExt};
use wasm_bindgen_futures::spawn_local;
use web_sys::{AddEventListenerOptions, Element, Event, HtmlAnchorElement, HtmlElement, HtmlFormElement, MouseEvent, PopStateEvent, SubmitEvent};

/// Set on a form to let its next submission through natively.
pub const BYPASS: &str = "x-ajax-bypass";
/// Set on a submitter while its form's request is pending.
pub const DISABLED: &str = "aria-disabled";

const ACTION: &str = "action";
const FORM_ACTION: &str = "formaction";
const CLICK: &str = "click";
const SUBMIT: &str = "submit";
const RELAY: &str = "relay";
const POP_STATE: &str = "popstate";

fn window() -> web_sys::Window {
	web_sys::window().expect_throw("ajax-dom: No `window` found.")
}

fn capture() -> AddEventListenerOptions {
	let options = AddEventListenerOptions::new();
	options.set_capture(true);
	options
}

/// Starts intercepting links and forms. Calling this again has no effect.
#[instrument]
pub fn install() -> Result<()> {
	if closure_map::get(RELAY).is_some() {
		return Ok(());
	}

	let window = window();
	let document = document();

	let click = closure_map::publish(CLICK, on_click);
	let submit = closure_map::publish(SUBMIT, on_submit);
	document.add_event_listener_with_callback(CLICK, &click)?;
	document.add_event_listener_with_callback(SUBMIT, &submit)?;

	let relay = closure_map::publish(RELAY, relay);
	window.add_event_listener_with_callback_and_add_event_listener_options(CLICK, &relay, &capture())?;
	window.add_event_listener_with_callback_and_add_event_listener_options(SUBMIT, &relay, &capture())?;

	let pop_state = closure_map::publish(POP_STATE, |event| {
		if let Ok(event) = event.dyn_into::<PopStateEvent>() {
			history::on_pop_state(&event);
		}
	});
	window.add_event_listener_with_callback(POP_STATE, &pop_state)?;

	debug!("Installed.");
	Ok(())
}

/// Stops intercepting. Requests already underway still render.
#[instrument]
pub fn uninstall() -> Result<()> {
	let window = window();
	let document = document();

	if let Some(relay) = closure_map::unpublish(RELAY) {
		window.remove_event_listener_with_callback_and_bool(CLICK, &relay, true)?;
		window.remove_event_listener_with_callback_and_bool(SUBMIT, &relay, true)?;
	}
	for kind in [CLICK, SUBMIT].iter().copied() {
		if let Some(handler) = closure_map::unpublish(kind) {
			document.remove_event_listener_with_callback(kind, &handler)?;
		}
	}
	if let Some(pop_state) = closure_map::unpublish(POP_STATE) {
		window.remove_event_listener_with_callback(POP_STATE, &pop_state)?;
	}

	debug!("Uninstalled.");
	Ok(())
}

/// Moves the handler for `event`'s type to the end of `document`'s listener list.
fn relay(event: Event) {
	let kind = match event.type_().as_str() {
		CLICK => CLICK,
		SUBMIT => SUBMIT,
		_ => return,
	};
	if let Some(handler) = closure_map::get(kind) {
		let document = document();
		if let Err(error) = document
			.remove_event_listener_with_callback(kind, &handler)
			.and_then(|()| document.add_event_listener_with_callback(kind, &handler))
		{
			error!("Failed to re-register {:?} handler: {:?}", kind, error);
		}
	}
}

/// The link a click should be intercepted for, if any.
#[must_use]
pub fn clicked_link(event: &MouseEvent) -> Option<HtmlAnchorElement> {
	if event.default_prevented() || event.button() != 0 || event.ctrl_key() || event.meta_key() || event.shift_key() || event.alt_key() {
		return None;
	}

	let clicked: Element = event.target()?.dyn_into().ok()?;
	let link: HtmlAnchorElement = clicked.closest("a[href]").ok()??.dyn_into().ok()?;
	if link.is_content_editable()
		|| link.get_attribute("href").map_or(true, |href| href.starts_with('#'))
		|| link.has_attribute("download")
		|| link.has_attribute(NO_AJAX)
		|| !matches!(link.target().as_str(), "" | "_self")
		|| !ElementConfig::is_declared(&link)
	{
		return None;
	}

	let location = window().location();
	if Some(link.origin()) != location.origin().ok() {
		return None;
	}
	let here = format!("{}{}", location.pathname().unwrap_or_default(), location.search().unwrap_or_default());
	if !link.hash().is_empty() && format!("{}{}", link.pathname(), link.search()) == here {
		trace!("In-page link.");
		return None;
	}

	Some(link)
}

/// The form a submission should be intercepted for, if any.
///
/// Consumes the [`BYPASS`] marker.
#[must_use]
pub fn submitted_form(event: &SubmitEvent) -> Option<HtmlFormElement> {
	let form: HtmlFormElement = event.target()?.dyn_into().ok()?;
	let bypass = form.has_attribute(BYPASS);
	if bypass {
		drop(form.remove_attribute(BYPASS));
	}
	if bypass || event.default_prevented() {
		return None;
	}

	let submitter = event.submitter();
	let submitter_attribute = |name: &str| submitter.as_ref().and_then(|submitter| submitter.get_attribute(name));
	if submitter_attribute("formmethod").unwrap_or_else(|| form.method()).eq_ignore_ascii_case("dialog")
		|| form.has_attribute(NO_AJAX)
		|| submitter.as_ref().map_or(false, |submitter| submitter.has_attribute(NO_AJAX))
		|| !matches!(submitter_attribute("formtarget").unwrap_or_else(|| form.target()).as_str(), "" | "_self")
		|| !ElementConfig::is_declared(&form)
	{
		return None;
	}

	Some(form)
}

/// The origin's targets, plus sync targets if it asks for them.
fn resolve_targets(origin: &Element) -> Result<Vec<Element>> {
	let targets = target::targets(origin, None)?;
	Ok(if ElementConfig::of(origin).sync {
		target::add_sync_targets(targets)
	} else {
		targets
	})
}

fn on_click(event: Event) {
	let event = match event.dyn_into::<MouseEvent>() {
		Ok(event) => event,
		Err(_) => return,
	};
	let link = match clicked_link(&event) {
		Some(link) => link,
		None => return,
	};

	event.prevent_default();
	event.stop_immediate_propagation();

	match resolve_targets(&link) {
		Ok(targets) => spawn_local(navigate(link, targets)),
		Err(error) => throw_str(&error.to_string()),
	}
}

fn on_submit(event: Event) {
	let event = match event.dyn_into::<SubmitEvent>() {
		Ok(event) => event,
		Err(_) => return,
	};
	let form = match submitted_form(&event) {
		Some(form) => form,
		None => return,
	};

	event.prevent_default();
	event.stop_immediate_propagation();

	match resolve_targets(&form) {
		Ok(targets) => spawn_local(submit(form, event.submitter(), targets)),
		Err(error) => throw_str(&error.to_string()),
	}
}

/// `action` resolved against `origin`'s referrer, or as is if it doesn't resolve.
fn resolve(origin: &Element, action: String) -> String {
	request::resolve(&action, &request::referrer(origin)).unwrap_or(action)
}

/// Follows `link`, replaying a cached response for it while the live request is underway.
async fn navigate(link: HtmlAnchorElement, targets: Vec<Element>) {
	let origin: Element = link.into();
	let href = resolve(&origin, origin.get_attribute("href").unwrap_or_default());

	let result = async {
		let request = request::build(&origin, &href, Method::Get, None, Encoding::UrlEncoded);
		let in_flight = match transport::dispatch(request, &targets, &origin, true)? {
			Some(in_flight) => in_flight,
			None => return Ok(()),
		};

		if !targets.is_empty() {
			if let Some(cached) = cache::with(|cache| cache.get(&href).cloned()) {
				trace!("Replaying cached response.");
				if let Err(error) = render::merge_response(&cached, targets.clone(), RenderOptions::replay()).await {
					warn!("Replay failed: {}", error);
				}
			}
		}

		let response = in_flight.response().await?;
		let options = RenderOptions::live(ElementConfig::of(&origin).history);
		render::merge_response(&response, targets, options).await.map(drop)
	}
	.await;

	if let Err(error) = result {
		settle(error, || {
			if let Err(error) = window().location().set_href(&href) {
				error!("Failed to navigate natively: {:?}", error);
			}
		});
	}
}

/// Submits `form`, keeping `submitter` disabled until the response rendered.
async fn submit(form: HtmlFormElement, submitter: Option<HtmlElement>, targets: Vec<Element>) {
	let origin: Element = form.clone().into();
	let submitter_attribute = |name: &str| submitter.as_ref().and_then(|submitter| submitter.get_attribute(name));

	let method = submitter_attribute("formmethod").unwrap_or_else(|| form.method()).parse::<Method>().unwrap_or_default();
	let action = submitter_attribute(FORM_ACTION)
		.or_else(|| form.get_attribute(ACTION))
		.filter(|action| !action.is_empty())
		.unwrap_or_else(|| request::referrer(&origin));
	let action = resolve(&origin, action);
	let encoding = Encoding::from_enctype(&submitter_attribute("formenctype").unwrap_or_else(|| form.enctype()));

	let result = async {
		let body = Body::from_form(&form, submitter.as_ref())?;
		let request = request::build(&origin, &action, method, Some(body), encoding);
		let _disabled = submitter.as_ref().map(DisabledSubmitter::new);
		let options = RenderOptions::live(ElementConfig::of(&origin).history);
		render::render(request, targets, &origin, true, options).await.map(drop)
	}
	.await;

	if let Err(error) = result {
		settle(error, || resubmit(&form, submitter.as_ref(), &action));
	}
}

/// Swallows cancellations, falls back on render errors and logs everything else.
fn settle(error: Error, fallback: impl FnOnce()) {
	match error {
		error if error.is_cancelled() => trace!("Superseded."),
		error if error.is_render() => {
			warn!("{}; falling back to native navigation.", error);
			fallback();
		}
		error => error!("{}", error),
	}
}

/// Submits `form` once more, natively, to `action`.
///
/// `action` overrides the form's (or `submitter`'s) own for this submission only.
pub fn resubmit(form: &HtmlFormElement, submitter: Option<&HtmlElement>, action: &str) {
	let (element, name) = match submitter {
		Some(submitter) if submitter.has_attribute(FORM_ACTION) => (submitter.unchecked_ref::<Element>(), FORM_ACTION),
		_ => (form.unchecked_ref::<Element>(), ACTION),
	};
	let previous = element.get_attribute(name);

	if let Err(error) = form.set_attribute(BYPASS, "").and_then(|()| element.set_attribute(name, action)) {
		drop(form.remove_attribute(BYPASS));
		return error!("Failed to mark form for native submission: {:?}", error);
	}
	let submitted = match submitter {
		Some(submitter) => form.request_submit_with_submitter(Some(submitter)).or_else(|_| form.request_submit()),
		None => form.request_submit(),
	};
	let restored = match previous {
		Some(previous) => element.set_attribute(name, &previous),
		None => element.remove_attribute(name),
	};
	if let Err(error) = restored {
		warn!("Failed to restore {:?}: {:?}", name, error);
	}
	if let Err(error) = submitted {
		drop(form.remove_attribute(BYPASS));
		error!("Failed to resubmit form: {:?}", error);
	}
}

/// Marks a submitter disabled and swallows its clicks until dropped.
struct DisabledSubmitter {
	submitter: HtmlElement,
	swallow: Closure<dyn Fn(Event)>,
}

impl DisabledSubmitter {
	fn new(submitter: &HtmlElement) -> Self {
		let swallow = Closure::wrap(Box::new(|event: Event| {
			event.prevent_default();
			event.stop_immediate_propagation();
		}) as Box<dyn Fn(Event)>);
		drop(submitter.set_attribute(DISABLED, "true"));
		if let Err(error) = submitter.add_event_listener_with_callback(CLICK, swallow.as_ref().unchecked_ref()) {
			error!("Failed to disable submitter: {:?}", error);
		}
		Self {
			submitter: submitter.clone(),
			swallow,
		}
	}
}

impl Drop for DisabledSubmitter {
	fn drop(&mut self) {
		drop(self.submitter.remove_attribute(DISABLED));
		if let Err(error) = self.submitter.remove_event_listener_with_callback(CLICK, self.swallow.as_ref().unchecked_ref()) {
			error!("Failed to re-enable submitter: {:?}", error);
		}
	}
}
