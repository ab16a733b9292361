//! Renders responses into the document.
//!
//! A response without body is a no-op. Without targets, the response replaces the whole document.
//! Otherwise each target is merged with the same-id element from the response.

use crate::{
	config::{self, Config, TOP},
	element::{ElementConfig, AUTOFOCUS, SOURCE},
	error::{Error, Result},
	events,
	head,
	history::HistoryStrategy,
	hooks::{self, Flow, HookContext, HookPoint},
	merge::MergeStrategy,
	pending::{self, TargetNode},
	request::RequestDescriptor,
	target::document,
	transport::{self, Response},
};
use futures::channel::oneshot;
use js_sys::Promise;
use tracing::{debug, error, instrument, trace, warn};
use wasm_bindgen::{closure::Closure, JsCast, JsValue};
use wasm_bindgen_futures::JsFuture;
use web_sys::{AddEventListenerOptions, Document, DomParser, Element, HtmlElement, SupportedType};

/// How a response is rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RenderOptions {
	/// Record the response URL in history. Whole-document renders always push.
	pub history: Option<HistoryStrategy>,
	/// Transfer focus to an autofocus element in the merged content.
	pub focus: bool,
	/// An optimistic replay from cache: no history, no focus, no events and no removal of missing targets.
	/// Only idempotent strategies are replayed, so the live render can't duplicate content.
	/// Targets stay busy, as the live request is still pending.
	pub replay: bool,
}

impl RenderOptions {
	#[must_use]
	pub fn live(history: Option<HistoryStrategy>) -> Self {
		Self {
			history,
			focus: true,
			replay: false,
		}
	}

	#[must_use]
	pub fn replay() -> Self {
		Self {
			history: None,
			focus: false,
			replay: true,
		}
	}
}

/// Requests `request` and renders the response into `targets`.
///
/// Returns the elements that represent the targets afterwards. A vetoed request renders nothing.
pub async fn render(request: RequestDescriptor, targets: Vec<Element>, origin: &Element, events: bool, options: RenderOptions) -> Result<Vec<Element>> {
	let in_flight = match transport::dispatch(request, &targets, origin, events)? {
		Some(in_flight) => in_flight,
		None => return Ok(Vec::new()),
	};
	let response = in_flight.response().await?;
	merge_response(&response, targets, options).await
}

/// Renders an already received `response`.
#[instrument(skip(response, targets), fields(url = %response.url, status = response.status, targets = targets.len()))]
pub async fn merge_response(response: &Response, targets: Vec<Element>, options: RenderOptions) -> Result<Vec<Element>> {
	if response.html.trim().is_empty() {
		debug!("Empty response.");
		if !options.replay {
			if targets.is_empty() {
				release_top();
			}
			for target in targets {
				release(&current(target));
			}
		}
		return Ok(Vec::new());
	}

	if targets.is_empty() {
		return match replace_document(&document(), response).await {
			Ok(body) => Ok(vec![body]),
			Err(error) => {
				if !options.replay {
					release_top();
				}
				Err(error)
			}
		};
	}

	let incoming = parse(&response.html)?;
	let config = config::snapshot();
	let mut merged = Vec::with_capacity(targets.len());

	let mut remaining = targets.into_iter();
	while let Some(target) = remaining.next() {
		let target = current(target);
		match merge_target(&target, &incoming, response, &config, options).await {
			Ok(Some(entry)) => merged.push(entry),
			Ok(None) => (),
			Err(error) => {
				if !options.replay {
					release(&target);
					for target in remaining {
						release(&current(target));
					}
				}
				return Err(error);
			}
		}
	}

	if let Some(history) = options.history {
		history.apply(&response.url)?;
	}

	if options.focus {
		let candidate = merged.iter().filter(|(_, focus)| *focus).find_map(|(element, _)| autofocus(element));
		if let Some(candidate) = candidate {
			next_tick().await;
			focus(&candidate);
		}
	}

	Ok(merged.into_iter().map(|(element, _)| element).collect())
}

/// Merges the fragment of `incoming` that matches `target`'s id.
///
/// Returns the element now representing the target and whether it may take focus, or `None` if it was skipped.
async fn merge_target(
	target: &Element,
	incoming: &Document,
	response: &Response,
	config: &Config,
	options: RenderOptions,
) -> Result<Option<(Element, bool)>> {
	let id = target.id();

	let content = match incoming.get_element_by_id(&id) {
		Some(content) => content,
		None if options.replay => {
			trace!(%id, "Missing from cached response.");
			return Ok(None);
		}
		None => {
			if !on_missing(target, response)? {
				target.set_busy(false);
			}
			return Ok(None);
		}
	};

	let declared = ElementConfig::of(target);
	let strategy = declared.merge.unwrap_or(config.merge);
	let transition = !options.replay && (declared.transition || config.transition);

	if options.replay && !strategy.is_idempotent() {
		trace!(%id, %strategy, "Not replaying insertion.");
		return Ok(None);
	}

	if !options.replay && !merge_begin(target, strategy, response).await {
		target.set_busy(false);
		return Ok(None);
	}

	// Ours was released when the response arrived, so any entry now belongs to a newer request.
	if !options.replay && pending::with(|pending| pending.is_pending(&id)) {
		debug!(%id, "Superseded before merging.");
		return Ok(None);
	}

	let element = strategy.merge(target, &content, transition).await?;
	if options.replay {
		pending::with(|pending| pending.retarget(&id, element.clone()));
	} else {
		target.set_busy(false);
		element.set_busy(false);
		events::dispatch(&element, events::MERGED, &events::detail(&[("strategy", &JsValue::from_str(strategy.as_str()))]));
	}
	if let Err(error) = element.set_attribute(SOURCE, &response.url) {
		warn!("Failed to record {}: {:?}", SOURCE, error);
	}
	Ok(Some((element, declared.focus)))
}

/// Clears `target`'s busy marker unless a newer request owns its id.
fn release(target: &Element) {
	if !pending::with(|pending| pending.is_pending(&target.id())) {
		target.set_busy(false);
	}
}

/// [`release`] for a whole-document request, which marks `<body>`.
fn release_top() {
	if let Some(body) = document().body() {
		if !pending::with(|pending| pending.is_pending(TOP)) {
			body.set_busy(false);
		}
	}
}

/// Replaces `document`'s `<body>` with the response's, after reconciling `<head>`, and pushes a history entry.
///
/// The response's status is not consulted.
pub async fn replace_document(document: &Document, response: &Response) -> Result<Element> {
	let incoming = parse(&response.html)?;

	if let (Some(current_head), Some(incoming_head)) = (document.head(), incoming.head()) {
		head::reconcile(document, &current_head, &incoming_head);
	}

	let current_body = document.body().ok_or_else(|| Error::Render {
		id: "body".to_owned(),
		status: response.status,
	})?;
	let incoming_body = incoming.body().ok_or_else(|| Error::Render {
		id: "body".to_owned(),
		status: response.status,
	})?;
	let transition = config::snapshot().transition;
	let body: Element = incoming_body.into();
	let body = MergeStrategy::Replace.merge(current_body.as_ref(), &body, transition).await?;
	head::rescript_all(document, &body);

	HistoryStrategy::Push.apply(&response.url)?;
	Ok(body)
}

/// Dispatches `ajax:missing`. Removes `target` for successful responses, fails for unsuccessful ones.
///
/// Returns whether the target was removed.
fn on_missing(target: &Element, response: &Response) -> Result<bool> {
	let mut context = HookContext::new(HookPoint::TargetMissing, target);
	context.response = Some(response);
	let proceed = hooks::run(&context) == Flow::Proceed && events::dispatch(target, events::MISSING, &events::response_detail(response));
	if !proceed {
		debug!("Missing target kept.");
		return Ok(false);
	}

	if response.ok {
		debug!("Removing target missing from response.");
		target.remove();
		Ok(true)
	} else {
		Err(Error::Render {
			id: target.id(),
			status: response.status,
		})
	}
}

/// Dispatches `ajax:merge` and waits for a listener that cancelled it to call `detail.merge()`.
///
/// Returns whether to merge.
async fn merge_begin(target: &Element, strategy: MergeStrategy, response: &Response) -> bool {
	let mut context = HookContext::new(HookPoint::MergeBegin, target);
	context.response = Some(response);
	context.strategy = Some(strategy);
	if hooks::run(&context) == Flow::Abort {
		return false;
	}

	let (sender, receiver) = oneshot::channel::<()>();
	let resume = Closure::once_into_js(move || {
		// The merge may have been given up on already.
		drop(sender.send(()));
	});
	let detail = events::detail(&[
		("strategy", &JsValue::from_str(strategy.as_str())),
		("response", &events::response_detail(response)),
		("merge", &resume),
	]);
	if events::dispatch(target, events::MERGE, &detail) {
		return true;
	}

	debug!("Merge deferred by listener.");
	receiver.await.is_ok()
}

/// `target`, or the element that replaced it (by id) if it was detached in the meantime.
fn current(target: Element) -> Element {
	if target.is_connected() {
		return target;
	}
	match document().get_element_by_id(&target.id()) {
		Some(replacement) => replacement,
		None => target,
	}
}

fn parse(html: &str) -> Result<Document> {
	Ok(DomParser::new()?.parse_from_string(html, SupportedType::TextHtml)?)
}

/// The first visible `x-autofocus` or `autofocus` element in or at `root`.
fn autofocus(root: &Element) -> Option<HtmlElement> {
	[format!("[{}]", AUTOFOCUS), "[autofocus]".to_owned()].iter().find_map(|selector| {
		let mut candidates = Vec::new();
		if root.matches(selector).unwrap_or(false) {
			candidates.push(root.clone());
		}
		if let Ok(nodes) = root.query_selector_all(selector) {
			candidates.extend((0..nodes.length()).filter_map(|i| nodes.item(i)).filter_map(|node| node.dyn_into::<Element>().ok()));
		}
		candidates
			.into_iter()
			.find(|candidate| candidate.get_client_rects().length() > 0)
			.and_then(|candidate| candidate.dyn_into::<HtmlElement>().ok())
	})
}

/// Focuses `element`, making it focusable until it loses focus if necessary.
fn focus(element: &HtmlElement) {
	if !element.has_attribute("tabindex") {
		drop(element.set_attribute("tabindex", "-1"));
		let blurred = element.clone();
		let remove = Closure::once_into_js(move || drop(blurred.remove_attribute("tabindex")));
		let options = AddEventListenerOptions::new();
		options.set_once(true);
		if let Err(error) = element.add_event_listener_with_callback_and_add_event_listener_options("blur", remove.unchecked_ref(), &options) {
			error!("Failed to add blur listener: {:?}", error);
		}
	}
	if let Err(error) = element.focus() {
		error!("Failed to focus: {:?}", error);
	}
}

/// Resolves on the next task, after layout settled.
pub(crate) async fn next_tick() {
	let promise = Promise::new(&mut |resolve, _reject| {
		if let Some(window) = web_sys::window() {
			if window.set_timeout_with_callback(&resolve).is_ok() {
				return;
			}
		}
		drop(resolve.call0(&JsValue::UNDEFINED));
	});
	drop(JsFuture::from(promise).await);
}
