//! Relative link resolution
//!
//! Resolves an href found on a page into a site-root-relative [`Link`],
//! the way a filesystem resolves a relative path against a directory.
//! Nothing here touches the network or the disk.

use super::Link;
use crate::{UrlError, UrlResult};

/// Returns the directory part of a site-relative path
///
/// The root directory is the empty string, so `dirname("index.html")` is `""`
/// and `dirname("catalogue/")` is `"catalogue"`.
pub fn dirname(path: &str) -> &str {
    match path.rfind('/') {
        Some(idx) => &path[..idx],
        None => "",
    }
}

/// Resolves `rel` as found on the page at `base` into a site-relative link
///
/// # Resolution Rules
///
/// - Start from the directory segments of `base`
/// - Each `..` segment of `rel` drops the last directory segment
/// - `.` and empty segments are ignored
/// - Every other segment is appended
/// - A leading `/` in `rel` starts from the site root instead of `base`
/// - `?query` and `#fragment` suffixes are dropped
///
/// # Errors
///
/// - [`UrlError::EscapesRoot`] when `rel` backtracks above the site root.
///   Such a link cannot be mapped into the output tree, so it is rejected
///   rather than clamped.
/// - [`UrlError::NotRelative`] when `rel` carries a scheme or host
/// - [`UrlError::Empty`] when nothing is left to point at
///
/// # Examples
///
/// ```
/// use shelf_mirror::url::resolve_link;
///
/// let link = resolve_link(
///     "catalogue/category/books_1/index.html",
///     "../../a-light-in-the-attic_1000/index.html",
/// )
/// .unwrap();
/// assert_eq!(link.as_str(), "catalogue/a-light-in-the-attic_1000/index.html");
/// ```
pub fn resolve_link(base: &str, rel: &str) -> UrlResult<Link> {
    let rel = strip_suffixes(rel.trim());

    if rel.is_empty() {
        return Err(UrlError::Empty);
    }

    if has_scheme(rel) || rel.starts_with("//") {
        return Err(UrlError::NotRelative(rel.to_string()));
    }

    let mut segments: Vec<&str> = if rel.starts_with('/') {
        Vec::new()
    } else {
        dirname(base)
            .split('/')
            .filter(|s| !s.is_empty() && *s != ".")
            .collect()
    };

    for segment in rel.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                if segments.pop().is_none() {
                    return Err(UrlError::EscapesRoot {
                        base: base.to_string(),
                        rel: rel.to_string(),
                    });
                }
            }
            other => segments.push(other),
        }
    }

    if segments.is_empty() {
        return Err(UrlError::Empty);
    }

    Ok(Link::from_segments(&segments))
}

fn strip_suffixes(rel: &str) -> &str {
    match rel.find(['?', '#']) {
        Some(idx) => &rel[..idx],
        None => rel,
    }
}

/// True for `scheme:` prefixes such as `https:`, `mailto:` or `javascript:`
fn has_scheme(rel: &str) -> bool {
    let head = rel.split('/').next().unwrap_or_default();
    head.contains(':')
}
