#![doc(html_root_url = "https://docs.rs/ajax-dom/0.0.1")]
#![warn(clippy::pedantic)]

#[cfg(doctest)]
pub mod readme {
	doc_comment::doctest!("../README.md");
}

mod ajax;
mod closure_map;

pub mod cache;
pub mod config;
pub mod element;
pub mod error;
pub mod events;
pub mod head;
pub mod history;
pub mod hooks;
pub mod interceptor;
pub mod merge;
pub mod pending;
pub mod render;
pub mod request;
pub mod target;
pub mod transport;

pub use ajax::{ajax, AjaxOptions};
pub use config::{configure, Config};
pub use error::{Error, Result};
pub use interceptor::{install, uninstall};
