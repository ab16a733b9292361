#![cfg(target_arch = "wasm32")]

use ajax_dom::head;
use wasm_bindgen_test::{wasm_bindgen_test, wasm_bindgen_test_configure};
use web_sys::{window, Document, DomParser, Element, SupportedType};

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

fn parse(html: &str) -> Document {
	DomParser::new().unwrap().parse_from_string(html, SupportedType::TextHtml).unwrap()
}

fn children(parent: &Element) -> Vec<Element> {
	let children = parent.children();
	(0..children.length()).filter_map(|i| children.item(i)).collect()
}

#[wasm_bindgen_test]
fn reconcile_keeps_identical_elements() {
	init();
	let current = parse(r#"<head><meta name="a"><meta name="b"><meta name="c"></head>"#);
	let incoming = parse(r#"<head><meta name="b"><meta name="c"><meta name="d"></head>"#);
	let current_head: Element = current.head().unwrap().into();
	let before = children(&current_head);

	head::reconcile(&current, &current_head, &incoming.head().unwrap());

	let after = children(&current_head);
	assert_eq!(after.len(), 3);
	assert_eq!(after[0], before[1]);
	assert_eq!(after[1], before[2]);
	assert_eq!(after[2].get_attribute("name").as_deref(), Some("d"));
	assert!(!before[0].is_connected());
}

#[wasm_bindgen_test]
fn re_eval_elements_are_re_added() {
	init();
	let current = parse(r#"<head><script x-head="re-eval">1</script><title>T</title></head>"#);
	let incoming = parse(r#"<head><script x-head="re-eval">1</script><title>T</title></head>"#);
	let current_head: Element = current.head().unwrap().into();
	let before = children(&current_head);

	head::reconcile(&current, &current_head, &incoming.head().unwrap());

	let after = children(&current_head);
	assert_eq!(after.len(), 2);
	assert_eq!(after[0], before[1], "<title> was replaced");
	assert_ne!(after[1], before[0], "<script> was kept");
	assert_eq!(after[1].local_name(), "script");
	assert_eq!(after[1].text_content().as_deref(), Some("1"));
}

#[wasm_bindgen_test]
fn rescript_copies_attributes_and_source() {
	init();
	let document = window().unwrap().document().unwrap();
	let parsed = parse(r#"<script type="module" data-x="1">void 0</script>"#);
	let script = parsed.query_selector("script").unwrap().unwrap();

	let fresh = head::rescript(&document, &script).unwrap();

	assert_ne!(fresh, script);
	assert_eq!(fresh.outer_html(), script.outer_html());
}
