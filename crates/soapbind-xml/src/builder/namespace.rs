use core::fmt;
use std::{borrow::Cow, hash::Hash};

/// The namespace permanently bound to the `xml` prefix.
/// It never needs a declaration.
pub const XML_NAMESPACE: &str = "http://www.w3.org/XML/1998/namespace";

/// Represents a namespace in XML.
#[derive(Debug, Clone, Eq)]
pub struct Namespace<'a> {
    pub url: Cow<'a, str>,
}

impl PartialEq for Namespace<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.url == other.url
    }
}

impl fmt::Display for Namespace<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.url.fmt(f)
    }
}

impl Hash for Namespace<'_> {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.url.hash(state);
    }
}

impl<'a> Namespace<'a> {
    /// Creates a new instance of `Namespace` with the given URI.
    ///
    /// # Example
    ///
    /// ```
    /// use soapbind_xml::builder::Namespace;
    /// let namespace = Namespace::new("http://example.com");
    /// ```
    pub fn new(uri: impl Into<Cow<'a, str>>) -> Self {
        Namespace { url: uri.into() }
    }

    pub fn is_xml(&self) -> bool {
        self.url == XML_NAMESPACE
    }
}

impl<'a> From<&'a str> for Namespace<'a> {
    fn from(value: &'a str) -> Self {
        Namespace::new(value)
    }
}

impl From<String> for Namespace<'_> {
    fn from(value: String) -> Self {
        Namespace::new(value)
    }
}
