use crate::{UrlError, UrlResult};
use serde::Serialize;
use std::fmt;

/// A site-root-relative path identifying a page or asset
///
/// A `Link` never carries a scheme or host, never starts with `/` and never
/// contains `..` segments. The string is used verbatim as the output file
/// path below the run directory.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Link(String);

impl Link {
    /// Creates a link from an already site-relative path
    ///
    /// # Examples
    ///
    /// ```
    /// use shelf_mirror::Link;
    ///
    /// let link = Link::new("catalogue/page-2.html").unwrap();
    /// assert_eq!(link.as_str(), "catalogue/page-2.html");
    /// assert!(Link::new("../index.html").is_err());
    /// ```
    pub fn new(path: impl Into<String>) -> UrlResult<Self> {
        let path = path.into();

        if path.is_empty() {
            return Err(UrlError::Empty);
        }

        if path.starts_with('/') || path.contains("://") {
            return Err(UrlError::NotRelative(path));
        }

        if path.split('/').any(|segment| segment == "..") {
            return Err(UrlError::EscapesRoot {
                base: String::new(),
                rel: path,
            });
        }

        Ok(Self(path))
    }

    pub(crate) fn from_segments(segments: &[&str]) -> Self {
        Self(segments.join("/"))
    }

    /// Returns the link as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the link and returns the inner path
    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for Link {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Link {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<&str> for Link {
    type Error = UrlError;

    fn try_from(value: &str) -> UrlResult<Self> {
        Self::new(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_relative_path() {
        let link = Link::new("media/cache/27/a5/x.jpg").unwrap();
        assert_eq!(link.to_string(), "media/cache/27/a5/x.jpg");
    }

    #[test]
    fn test_rejects_empty() {
        assert_eq!(Link::new(""), Err(UrlError::Empty));
    }

    #[test]
    fn test_rejects_absolute_forms() {
        assert!(matches!(
            Link::new("/index.html"),
            Err(UrlError::NotRelative(_))
        ));
        assert!(matches!(
            Link::new("https://books.toscrape.com/index.html"),
            Err(UrlError::NotRelative(_))
        ));
    }

    #[test]
    fn test_rejects_parent_segments() {
        assert!(Link::new("catalogue/../index.html").is_err());
    }

    #[test]
    fn test_dots_inside_names_are_fine() {
        assert!(Link::new("static/oscar/css/styles..min.css").is_ok());
    }
}
