//! URL handling module
//!
//! This module provides URL normalization and host-key extraction. A URL's
//! normalized string is its identity in the frontier; its host key is the
//! unit of politeness.

mod host;
mod normalize;

pub use host::{host_key, robots_url};
pub use normalize::{normalize_url, resolve_and_normalize, ALLOWED_SCHEMES};
