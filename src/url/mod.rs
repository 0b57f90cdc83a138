//! Link handling for Shelf-Mirror
//!
//! Every page and asset the crawler touches is identified by a [`Link`]: a
//! path relative to the site root. This module owns the link type and the
//! resolution of hrefs found on a page into such links.

mod link;
mod resolve;

pub use link::Link;
pub use resolve::{dirname, resolve_link};
