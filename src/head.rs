//! Reconciles the live `<head>` with an incoming one.
//!
//! Elements are matched by their serialised form. Matches are kept as they are, unless marked
//! `x-head="re-eval"`, so stylesheets and scripts that are already loaded don't reload.
//! Removals happen only after all additions, so replacement stylesheets are in place first.

use crate::element::HEAD;
use tracing::{error, instrument, trace};
use wasm_bindgen::JsCast;
use web_sys::{Document, Element};

const RE_EVAL: &str = "re-eval";

/// What to do with each element.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct HeadPlan {
	/// Indices into the current children.
	pub remove: Vec<usize>,
	/// Indices into the incoming children, in order.
	pub add: Vec<usize>,
}

/// Plans a reconciliation from serialised elements and their re-eval markers.
///
/// `current` and `incoming` are `(outer_html, re_eval)` pairs.
#[must_use]
pub fn plan(current: &[(String, bool)], incoming: &[(String, bool)]) -> HeadPlan {
	let mut matched = vec![false; incoming.len()];
	let mut plan = HeadPlan::default();

	for (i, (html, re_eval)) in current.iter().enumerate() {
		let found = (0..incoming.len()).find(|&j| !matched[j] && incoming[j].0 == *html);
		match found {
			Some(j) if !*re_eval => matched[j] = true,
			_ => plan.remove.push(i),
		}
	}

	plan.add = (0..incoming.len()).filter(|&j| !matched[j]).collect();
	plan
}

/// Applies [`plan`] to `current`, moving elements out of `incoming`.
#[instrument(skip(current, incoming))]
pub fn reconcile(document: &Document, current: &Element, incoming: &Element) {
	let current_children = elements(current);
	let incoming_children = elements(incoming);
	let plan = plan(&describe(&current_children), &describe(&incoming_children));
	trace!(remove = plan.remove.len(), add = plan.add.len(), "Reconciling <head>.");

	for &j in &plan.add {
		let element = &incoming_children[j];
		let element = if element.local_name() == "script" {
			match rescript(document, element) {
				Ok(script) => script,
				Err(error) => {
					error!("Failed to recreate <script>: {:?}", error);
					continue;
				}
			}
		} else {
			element.clone()
		};
		if let Err(error) = current.append_child(&element) {
			error!("Failed to add <head> element: {:?}", error);
		}
	}

	for &i in &plan.remove {
		current_children[i].remove();
	}
}

fn elements(parent: &Element) -> Vec<Element> {
	let children = parent.children();
	(0..children.length()).filter_map(|i| children.item(i)).collect()
}

fn describe(elements: &[Element]) -> Vec<(String, bool)> {
	elements
		.iter()
		.map(|element| (element.outer_html(), element.get_attribute(HEAD).map_or(false, |head| head == RE_EVAL)))
		.collect()
}

/// A copy of `script` created by `document`, so that it executes once connected.
///
/// Parsed `<script>`s (and moved ones) are inert.
pub fn rescript(document: &Document, script: &Element) -> Result<Element, wasm_bindgen::JsValue> {
	let fresh = document.create_element("script")?;
	let attributes = script.attributes();
	for i in 0..attributes.length() {
		if let Some(attribute) = attributes.item(i) {
			fresh.set_attribute(&attribute.name(), &attribute.value())?;
		}
	}
	fresh.set_text_content(script.text_content().as_deref());
	Ok(fresh)
}

/// Replaces every `<script>` under `root` with an executable copy.
pub fn rescript_all(document: &Document, root: &Element) {
	let scripts = match root.query_selector_all("script") {
		Ok(scripts) => scripts,
		Err(error) => return error!("Failed to query scripts: {:?}", error),
	};
	for i in 0..scripts.length() {
		let script = match scripts.item(i).and_then(|node| node.dyn_into::<Element>().ok()) {
			Some(script) => script,
			None => continue,
		};
		match rescript(document, &script) {
			Ok(fresh) => {
				if let Err(error) = script.replace_with_with_node_1(&fresh) {
					error!("Failed to replace <script>: {:?}", error);
				}
			}
			Err(error) => error!("Failed to recreate <script>: {:?}", error),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn elements(items: &[&str]) -> Vec<(String, bool)> {
		items.iter().map(|item| (item.to_string(), false)).collect()
	}

	#[test]
	fn keeps_matches_adds_and_removes_the_rest() {
		let plan = plan(&elements(&["A", "B", "C"]), &elements(&["B", "C", "D"]));
		assert_eq!(plan, HeadPlan { remove: vec![0], add: vec![2] });
	}

	#[test]
	fn re_eval_elements_are_replaced() {
		let current = vec![("S".to_owned(), true), ("T".to_owned(), false)];
		let plan = plan(&current, &elements(&["S", "T"]));
		assert_eq!(plan, HeadPlan { remove: vec![0], add: vec![0] });
	}

	#[test]
	fn duplicates_match_once_each() {
		let fewer = plan(&elements(&["M", "M"]), &elements(&["M"]));
		assert_eq!(fewer, HeadPlan { remove: vec![1], add: vec![] });

		let more = plan(&elements(&["M"]), &elements(&["M", "M"]));
		assert_eq!(more, HeadPlan { remove: vec![], add: vec![1] });
	}
}
