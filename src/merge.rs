//! Merge strategies: how an incoming fragment is combined with the element it targets.

use crate::{
	config,
	error::{Error, Result},
};
use core::{fmt, str::FromStr};
use js_sys::{Array, Function, Promise, Reflect};
use std::{cell::RefCell, rc::Rc};
use tracing::{error, instrument, trace_span, warn};
use wasm_bindgen::{closure::Closure, JsCast, JsValue};
use wasm_bindgen_futures::JsFuture;
use web_sys::{Document, Element, Node};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeStrategy {
	/// Insert the fragment's children before the target.
	Before,
	/// Insert the fragment's children after the target.
	After,
	/// Insert the fragment's children at the start of the target's children.
	Prepend,
	/// Insert the fragment's children at the end of the target's children.
	Append,
	/// Replace the target's children with the fragment's children.
	Update,
	/// Replace the target with the fragment.
	Replace,
	/// Diff the fragment into the target through [`Config::morph`](`crate::config::Config::morph`).
	Morph,
}

impl Default for MergeStrategy {
	fn default() -> Self {
		Self::Replace
	}
}

impl MergeStrategy {
	#[must_use]
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Before => "before",
			Self::After => "after",
			Self::Prepend => "prepend",
			Self::Append => "append",
			Self::Update => "update",
			Self::Replace => "replace",
			Self::Morph => "morph",
		}
	}

	/// Whether merging the same content twice has the same effect as merging it once.
	#[must_use]
	pub fn is_idempotent(self) -> bool {
		matches!(self, Self::Update | Self::Replace | Self::Morph)
	}

	/// Merges `content` into `target` right away and returns the element that represents the target afterwards.
	pub fn apply(self, target: &Element, content: &Element) -> Result<Element> {
		let span = trace_span!("Merging", strategy = self.as_str(), id = %target.id());
		let _enter = span.enter();

		match self {
			Self::Before => target.before_with_node(&children(content))?,
			Self::After => target.after_with_node(&children(content))?,
			Self::Prepend => target.prepend_with_node(&children(content))?,
			Self::Append => target.append_with_node(&children(content))?,
			Self::Update => target.replace_children_with_node(&children(content)),
			Self::Replace => {
				target.replace_with_with_node_1(content)?;
				return Ok(content.clone());
			}
			Self::Morph => {
				let morph = config::snapshot()
					.morph
					.ok_or_else(|| Error::Config("the `morph` strategy requires a morph implementation, see `Config::morph`".to_owned()))?;
				morph(target, content)?;
			}
		}
		Ok(target.clone())
	}

	/// Like [`MergeStrategy::apply`], but inside a view transition if `transition` is set and the platform supports it.
	///
	/// Configuration errors are logged and leave `target` in place.
	#[instrument(skip(target, content), fields(id = %target.id()))]
	pub async fn merge(self, target: &Element, content: &Element, transition: bool) -> Result<Element> {
		let merged = if transition {
			match view_transition_support(target) {
				Some((document, start)) => self.apply_in_transition(&document, &start, target, content).await,
				None => self.apply(target, content),
			}
		} else {
			self.apply(target, content)
		};

		match merged {
			Err(Error::Config(message)) => {
				error!("{}", message);
				Ok(target.clone())
			}
			merged => merged,
		}
	}

	async fn apply_in_transition(self, document: &Document, start: &Function, target: &Element, content: &Element) -> Result<Element> {
		let slot: Rc<RefCell<Option<Result<Element>>>> = Rc::default();
		let update = Closure::once_into_js({
			let slot = Rc::clone(&slot);
			let (target, content) = (target.clone(), content.clone());
			move || {
				*slot.borrow_mut() = Some(self.apply(&target, &content));
			}
		});

		let transition = start.call1(document, &update)?;
		if let Ok(finished) = Reflect::get(&transition, &JsValue::from_str("finished")).and_then(JsCast::dyn_into::<Promise>) {
			if let Err(error) = JsFuture::from(finished).await {
				// Skipped transitions reject `finished`, but still run the update.
				warn!("View transition did not finish: {:?}", error);
			}
		}

		let merged = slot.borrow_mut().take();
		match merged {
			Some(merged) => merged,
			None => self.apply(target, content),
		}
	}
}

impl FromStr for MergeStrategy {
	type Err = Error;

	fn from_str(s: &str) -> Result<Self> {
		Ok(match s.trim().to_ascii_lowercase().as_str() {
			"before" => Self::Before,
			"after" => Self::After,
			"prepend" => Self::Prepend,
			"append" => Self::Append,
			"update" => Self::Update,
			"replace" => Self::Replace,
			"morph" => Self::Morph,
			_ => return Err(Error::UnknownStrategy(s.to_owned())),
		})
	}
}

impl fmt::Display for MergeStrategy {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// A snapshot of `element`'s child nodes. (`childNodes` is live, so it can't be moved from directly.)
fn children(element: &Element) -> Array {
	let child_nodes = element.child_nodes();
	(0..child_nodes.length()).filter_map(|i| child_nodes.item(i)).map(JsValue::from).collect()
}

fn view_transition_support(target: &Element) -> Option<(Document, Function)> {
	let node: &Node = target.as_ref();
	let document = node.owner_document()?;
	let start = Reflect::get(&document, &JsValue::from_str("startViewTransition")).ok()?;
	start.dyn_into::<Function>().ok().map(|start| (document, start))
}
