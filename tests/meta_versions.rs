#![cfg(not(target_arch = "wasm32"))]

#[test]
fn html_root_url() {
	version_sync::assert_html_root_url_updated!("src/lib.rs");
}

#[test]
fn installation() {
	version_sync::assert_contains_regex!("README.md", "^ajax-dom = \"{version}\"$");
}

#[test]
fn versioning() {
	version_sync::assert_contains_regex!("README.md", r"^`ajax-dom` strictly follows \[Semantic Versioning 2\.0\.0\]");
}
