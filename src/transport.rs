//! Issues managed requests.

use crate::{
	cache,
	config::{REQUEST_HEADER, TARGET_HEADER, TOP},
	element::ElementConfig,
	error::{Error, Result},
	events,
	hooks::{self, Flow, HookContext, HookPoint},
	pending,
	request::{self, Method, RequestDescriptor},
	target::document,
};
use tracing::{debug, instrument, warn};
use wasm_bindgen::{JsCast, UnwrapThrowExt};
use wasm_bindgen_futures::JsFuture;
use web_sys::{AbortController, Element, Headers, Request, RequestInit};

/// A received response. Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
	/// The final URL, after redirects.
	pub url: String,
	/// `0` if the request failed without a response.
	pub status: u16,
	pub ok: bool,
	pub html: String,
}

/// A dispatched request that hasn't resolved yet.
#[must_use = "The request is only tracked until its response is awaited."]
pub struct InFlight {
	request: RequestDescriptor,
	url: String,
	origin: Element,
	events: bool,
	keys: Vec<String>,
	controller: AbortController,
	fetch: JsFuture,
}

/// Dispatches `request` on behalf of `origin`, to be merged into `targets` (the whole document if empty).
///
/// Supersedes pending requests for the same targets. Returns `None` if the request was vetoed.
#[instrument(skip(targets, origin), fields(targets = targets.len()))]
pub fn dispatch(request: RequestDescriptor, targets: &[Element], origin: &Element, events: bool) -> Result<Option<InFlight>> {
	let url = request::resolve(request.action(), request.referrer())?;

	let mut context = HookContext::new(HookPoint::BeforeRequest, origin);
	context.request = Some(&request);
	let vetoed = hooks::run(&context) == Flow::Abort || (events && !events::dispatch(origin, events::BEFORE, &events::detail(&[])));
	if vetoed {
		debug!("Request vetoed.");
		return Ok(None);
	}

	let ids: Vec<String> = targets.iter().map(Element::id).collect();
	let headers = Headers::new()?;
	for (name, value) in request.headers() {
		headers.set(name, value)?;
	}
	for target in targets {
		for (name, value) in ElementConfig::of(target).headers {
			headers.set(&name, &value)?;
		}
	}
	headers.set(REQUEST_HEADER, "true")?;
	headers.set(TARGET_HEADER, &if ids.is_empty() { TOP.to_owned() } else { ids.join(" ") })?;

	let controller = AbortController::new()?;
	let init = RequestInit::new();
	init.set_method(request.method().as_str());
	init.set_headers(&headers);
	init.set_signal(Some(&controller.signal()));
	if !request.referrer().is_empty() {
		init.set_referrer(request.referrer());
	}
	if let Some(payload) = request.payload()? {
		if payload.is_string() && !headers.has("Content-Type")? {
			headers.set("Content-Type", "application/x-www-form-urlencoded")?;
		}
		init.set_body(&payload);
	}
	let fetch_request = Request::new_with_str_and_init(&url, &init)?;

	let keys = if ids.is_empty() {
		let body = document().body().expect_throw("ajax-dom: No `<body>` found.");
		pending::with(|pending| pending.set(TOP, body.into(), controller.clone()));
		vec![TOP.to_owned()]
	} else {
		pending::with(|pending| {
			for target in targets {
				pending.set(&target.id(), target.clone(), controller.clone());
			}
		});
		ids
	};

	let window = web_sys::window().expect_throw("ajax-dom: No `window` found.");
	let fetch = JsFuture::from(window.fetch_with_request(&fetch_request));
	debug!(%url, method = %request.method(), "Request dispatched.");

	Ok(Some(InFlight {
		request,
		url,
		origin: origin.clone(),
		events,
		keys,
		controller,
		fetch,
	}))
}

impl InFlight {
	/// Cancels this request and clears the busy markers it set.
	pub fn cancel(&self) {
		pending::with(|pending| {
			for key in &self.keys {
				pending.abort_owned(key, &self.controller);
			}
		});
		self.controller.abort();
	}

	/// Ids this request was registered under.
	#[must_use]
	pub fn keys(&self) -> &[String] {
		&self.keys
	}

	/// Awaits the response.
	///
	/// Fails with [`Error::Cancelled`] if the request was superseded, in which case no events are dispatched.
	/// Other failures are reported as a [`Response`] that isn't [`ok`](`Response::ok`).
	pub async fn response(self) -> Result<Response> {
		let Self {
			request,
			url,
			origin,
			events,
			keys,
			controller,
			fetch,
		} = self;

		let fetched = fetch.await;
		if controller.signal().aborted() {
			return Err(Error::Cancelled);
		}

		let response = match fetched.and_then(JsCast::dyn_into::<web_sys::Response>) {
			Ok(fetched) => {
				let html = match fetched.text() {
					Ok(text) => JsFuture::from(text).await,
					Err(error) => Err(error),
				};
				if controller.signal().aborted() {
					return Err(Error::Cancelled);
				}
				let html = html.map(|html| html.as_string().unwrap_or_default()).unwrap_or_else(|error| {
					warn!("Failed to read response body: {:?}", error);
					String::new()
				});
				Response {
					url: fetched.url(),
					status: fetched.status(),
					ok: fetched.ok(),
					html,
				}
			}
			Err(error) => {
				warn!("Request failed: {:?}", error);
				Response {
					url: url.clone(),
					status: 0,
					ok: false,
					html: String::new(),
				}
			}
		};

		pending::with(|pending| {
			for key in &keys {
				pending.finish(key, &controller);
			}
		});

		if *request.method() == Method::Get && response.ok {
			cache::with(|cache| cache.set(&url, response.clone()));
		}

		if events {
			let detail = events::response_detail(&response);
			events::dispatch(&origin, if response.ok { events::SUCCESS } else { events::ERROR }, &detail);
			events::dispatch(&origin, events::AFTER, &detail);
		}
		debug!(url = %response.url, status = response.status, "Response received.");
		Ok(response)
	}
}
