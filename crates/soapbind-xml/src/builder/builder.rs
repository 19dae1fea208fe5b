use std::fmt;

use crate::builder::{AliasMap, Element, NamespaceWrite, XmlBuilderError};

/// The `<?xml ...?>` prolog. SOAP messages are always XML 1.0.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Declaration<'a> {
    encoding: &'a str,
}

impl Default for Declaration<'_> {
    fn default() -> Self {
        Self { encoding: "UTF-8" }
    }
}

impl<'a> Declaration<'a> {
    pub fn with_encoding(encoding: &'a str) -> Self {
        Self { encoding }
    }
}

impl fmt::Display for Declaration<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, r#"<?xml version="1.0" encoding="{}"?>"#, self.encoding)
    }
}

/// Writes one document: an optional declaration followed by the root element.
///
/// ```
/// use soapbind_xml::builder::{Builder, Declaration, Element};
/// let xml = Builder::new(Some(Declaration::default()), Element::new("root"))
///     .to_xml_string()
///     .unwrap();
/// assert_eq!(xml, r#"<?xml version="1.0" encoding="UTF-8"?><root/>"#);
/// ```
pub struct Builder<'a> {
    declaration: Option<Declaration<'a>>,
    element: Element<'a>,
}

impl<'a> Builder<'a> {
    pub fn new(declaration: Option<Declaration<'a>>, element: Element<'a>) -> Self {
        Builder {
            declaration,
            element,
        }
    }

    pub fn write_to<W: std::io::Write>(&self, mut w: W) -> Result<(), XmlBuilderError> {
        if let Some(declaration) = &self.declaration {
            write!(w, "{declaration}")?;
        }
        self.element.ns_write(&mut w, &AliasMap::new())
    }

    pub fn to_xml_string(&self) -> Result<String, XmlBuilderError> {
        let mut buf = Vec::new();
        self.write_to(&mut buf)?;
        Ok(String::from_utf8(buf)?)
    }
}
