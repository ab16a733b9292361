//! Normalised request descriptors, built once per action.

use crate::{
	element::{self, ElementConfig},
	error::{Error, Result},
};
use core::{fmt, str::FromStr};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use wasm_bindgen::{JsCast, JsValue};
use web_sys::{Element, File, FormData, HtmlElement, HtmlFormElement, Url};

/// The characters `encodeURIComponent` escapes.
const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
	.remove(b'-')
	.remove(b'_')
	.remove(b'.')
	.remove(b'!')
	.remove(b'~')
	.remove(b'*')
	.remove(b'\'')
	.remove(b'(')
	.remove(b')');

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Method {
	Get,
	Post,
	Put,
	Patch,
	Delete,
	Other(String),
}

impl Method {
	#[must_use]
	pub fn as_str(&self) -> &str {
		match self {
			Self::Get => "GET",
			Self::Post => "POST",
			Self::Put => "PUT",
			Self::Patch => "PATCH",
			Self::Delete => "DELETE",
			Self::Other(other) => other,
		}
	}
}

impl Default for Method {
	fn default() -> Self {
		Self::Get
	}
}

impl FromStr for Method {
	type Err = core::convert::Infallible;

	fn from_str(s: &str) -> core::result::Result<Self, Self::Err> {
		let upper = s.trim().to_ascii_uppercase();
		Ok(match upper.as_str() {
			"" | "GET" => Self::Get,
			"POST" => Self::Post,
			"PUT" => Self::Put,
			"PATCH" => Self::Patch,
			"DELETE" => Self::Delete,
			_ => Self::Other(upper),
		})
	}
}

impl fmt::Display for Method {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
	UrlEncoded,
	Multipart,
}

impl Default for Encoding {
	fn default() -> Self {
		Self::UrlEncoded
	}
}

impl Encoding {
	/// Parses a form's `enctype`.
	#[must_use]
	pub fn from_enctype(enctype: &str) -> Self {
		if enctype.eq_ignore_ascii_case("multipart/form-data") {
			Self::Multipart
		} else {
			Self::UrlEncoded
		}
	}
}

#[derive(Debug, Clone)]
pub enum FieldValue {
	Text(String),
	File(File),
}

/// A request payload.
#[derive(Debug, Clone)]
pub enum Body {
	/// Named fields, in order. Names may repeat.
	Fields(Vec<(String, FieldValue)>),
	/// An already encoded payload, sent unchanged.
	Encoded(String),
}

impl Body {
	/// Text fields from `pairs`.
	pub fn from_pairs<K: Into<String>, V: Into<String>>(pairs: impl IntoIterator<Item = (K, V)>) -> Self {
		Self::Fields(pairs.into_iter().map(|(k, v)| (k.into(), FieldValue::Text(v.into()))).collect())
	}

	/// Converts a plain key-value object field by field. Nested objects and arrays are serialised to JSON text.
	#[must_use]
	pub fn from_json(object: &serde_json::Map<String, serde_json::Value>) -> Self {
		Self::Fields(
			object
				.iter()
				.map(|(key, value)| {
					let text = match value {
						serde_json::Value::String(string) => string.clone(),
						serde_json::Value::Null => String::new(),
						other => other.to_string(),
					};
					(key.clone(), FieldValue::Text(text))
				})
				.collect(),
		)
	}

	/// Collects `form`'s successful controls, followed by the submitter's name and value if it has a name.
	pub fn from_form(form: &HtmlFormElement, submitter: Option<&HtmlElement>) -> Result<Self> {
		let form_data = FormData::new_with_form(form)?;
		let mut body = Self::from_form_data(&form_data)?;
		if let Some(submitter) = submitter {
			body.push_submitter(submitter.get_attribute("name").as_deref(), submitter_value(submitter).as_deref());
		}
		Ok(body)
	}

	pub fn from_form_data(form_data: &FormData) -> Result<Self> {
		let entries = js_sys::try_iter(form_data)?.ok_or_else(|| Error::Js("`FormData` is not iterable".to_owned()))?;
		let mut fields = Vec::new();
		for entry in entries {
			let entry: js_sys::Array = entry?.dyn_into()?;
			let name = entry.get(0).as_string().unwrap_or_default();
			let value = entry.get(1);
			fields.push((
				name,
				match value.dyn_into::<File>() {
					Ok(file) => FieldValue::File(file),
					Err(value) => FieldValue::Text(value.as_string().unwrap_or_default()),
				},
			));
		}
		Ok(Self::Fields(fields))
	}

	/// Appends the submitting control's field, if it is named.
	pub fn push_submitter(&mut self, name: Option<&str>, value: Option<&str>) {
		let name = match name {
			Some(name) if !name.is_empty() => name,
			_ => return,
		};
		let value = value.unwrap_or_default();
		match self {
			Self::Fields(fields) => fields.push((name.to_owned(), FieldValue::Text(value.to_owned()))),
			Self::Encoded(encoded) => {
				if !encoded.is_empty() {
					encoded.push('&');
				}
				encoded.push_str(&encode_pair(name, value));
			}
		}
	}

	/// `name=value` pairs joined by `&`. Files are represented by their file name.
	#[must_use]
	pub fn to_query(&self) -> String {
		match self {
			Self::Encoded(encoded) => encoded.clone(),
			Self::Fields(fields) => fields
				.iter()
				.map(|(name, value)| match value {
					FieldValue::Text(text) => encode_pair(name, text),
					FieldValue::File(file) => encode_pair(name, &file.name()),
				})
				.collect::<Vec<_>>()
				.join("&"),
		}
	}

	/// Like [`Body::to_query`], but without file fields.
	fn to_text_query(&self) -> String {
		match self {
			Self::Encoded(encoded) => encoded.clone(),
			Self::Fields(fields) => fields
				.iter()
				.filter_map(|(name, value)| match value {
					FieldValue::Text(text) => Some(encode_pair(name, text)),
					FieldValue::File(_) => None,
				})
				.collect::<Vec<_>>()
				.join("&"),
		}
	}

	/// Builds a multipart payload.
	pub fn to_form_data(&self) -> Result<FormData> {
		let form_data = FormData::new()?;
		match self {
			Self::Fields(fields) => {
				for (name, value) in fields {
					match value {
						FieldValue::Text(text) => form_data.append_with_str(name, text)?,
						FieldValue::File(file) => form_data.append_with_blob_and_filename(name, file, &file.name())?,
					}
				}
			}
			Self::Encoded(encoded) => {
				for pair in encoded.split('&').filter(|pair| !pair.is_empty()) {
					let mut split = pair.splitn(2, '=');
					let name = decode(split.next().unwrap_or_default());
					let value = decode(split.next().unwrap_or_default());
					form_data.append_with_str(&name, &value)?;
				}
			}
		}
		Ok(form_data)
	}
}

fn submitter_value(submitter: &HtmlElement) -> Option<String> {
	js_sys::Reflect::get(submitter, &JsValue::from_str("value")).ok().and_then(|value| value.as_string())
}

fn encode_pair(name: &str, value: &str) -> String {
	format!("{}={}", utf8_percent_encode(name, COMPONENT), utf8_percent_encode(value, COMPONENT))
}

fn decode(component: &str) -> String {
	percent_encoding::percent_decode_str(&component.replace('+', " ")).decode_utf8_lossy().into_owned()
}

/// Appends `body`'s text fields to `action`'s query string, keeping any existing query and fragment.
#[must_use]
pub fn merge_into_action(action: &str, body: &Body) -> String {
	let query = body.to_text_query();
	if query.is_empty() {
		return action.to_owned();
	}

	let mut parts = action.splitn(2, '#');
	let mut merged = parts.next().unwrap_or_default().to_owned();
	let fragment = parts.next();
	if !merged.ends_with('?') && !merged.ends_with('&') {
		merged.push(if merged.contains('?') { '&' } else { '?' });
	}
	merged.push_str(&query);
	if let Some(fragment) = fragment {
		merged.push('#');
		merged.push_str(fragment);
	}
	merged
}

/// A normalised request. Immutable once built.
#[derive(Debug, Clone)]
pub struct RequestDescriptor {
	action: String,
	method: Method,
	body: Option<Body>,
	headers: Vec<(String, String)>,
	referrer: String,
	encoding: Encoding,
}

impl RequestDescriptor {
	/// Normalises a request.
	///
	/// For `GET`, `body` is merged into `action`'s query string and dropped.
	#[must_use]
	pub fn new(action: &str, method: Method, body: Option<Body>, referrer: impl Into<String>, encoding: Encoding) -> Self {
		let (action, body) = match body {
			Some(body) if method == Method::Get => (merge_into_action(action, &body), None),
			body => (action.to_owned(), body),
		};
		Self {
			action,
			method,
			body,
			headers: Vec::new(),
			referrer: referrer.into(),
			encoding,
		}
	}

	/// Adds headers, replacing earlier ones of the same name (case-insensitively).
	#[must_use]
	pub fn with_headers<K: Into<String>, V: Into<String>>(mut self, headers: impl IntoIterator<Item = (K, V)>) -> Self {
		for (name, value) in headers {
			let name = name.into();
			self.headers.retain(|(existing, _)| !existing.eq_ignore_ascii_case(&name));
			self.headers.push((name, value.into()));
		}
		self
	}

	#[must_use]
	pub fn action(&self) -> &str {
		&self.action
	}

	#[must_use]
	pub fn method(&self) -> &Method {
		&self.method
	}

	#[must_use]
	pub fn body(&self) -> Option<&Body> {
		self.body.as_ref()
	}

	#[must_use]
	pub fn headers(&self) -> &[(String, String)] {
		&self.headers
	}

	#[must_use]
	pub fn referrer(&self) -> &str {
		&self.referrer
	}

	#[must_use]
	pub fn encoding(&self) -> Encoding {
		self.encoding
	}

	/// The payload as transmitted: URL-encoded text unless multipart.
	pub fn payload(&self) -> Result<Option<JsValue>> {
		Ok(match (&self.body, self.encoding) {
			(None, _) => None,
			(Some(Body::Encoded(encoded)), _) => Some(JsValue::from_str(encoded)),
			(Some(body), Encoding::UrlEncoded) => Some(JsValue::from_str(&body.to_query())),
			(Some(body), Encoding::Multipart) => Some(body.to_form_data()?.into()),
		})
	}
}

/// The location `origin` was loaded from: the nearest enclosing `data-source`, else the document's URL.
#[must_use]
pub fn referrer(origin: &Element) -> String {
	origin
		.closest(&format!("[{}]", element::SOURCE))
		.ok()
		.flatten()
		.and_then(|source| source.get_attribute(element::SOURCE))
		.unwrap_or_else(|| {
			web_sys::window()
				.and_then(|window| window.location().href().ok())
				.unwrap_or_default()
		})
}

/// `action` resolved against `referrer`, the way every intercepted or programmatic request is.
///
/// # Errors
///
/// If `action` is neither absolute nor relative to a valid `referrer`.
pub fn resolve(action: &str, referrer: &str) -> Result<String> {
	Ok(Url::new_with_base(action, referrer).or_else(|_| Url::new(action))?.href())
}

/// Builds a request for an action triggered by `origin`, with the origin's declared headers.
#[must_use]
pub fn build(origin: &Element, action: &str, method: Method, body: Option<Body>, encoding: Encoding) -> RequestDescriptor {
	RequestDescriptor::new(action, method, body, referrer(origin), encoding)
		.with_headers(crate::config::snapshot().headers)
		.with_headers(ElementConfig::of(origin).headers)
}
