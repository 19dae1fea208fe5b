use std::borrow::Cow;

use crate::builder::{AliasMap, Namespace, NamespaceWrite, XmlBuilderError, escape_attribute};

/// Represents an XML attribute with a name and value.
#[derive(Debug, Clone)]
pub struct Attribute<'a> {
    /// The name of the attribute.
    name: Cow<'a, str>,
    /// The value of the attribute, unescaped.
    value: Cow<'a, str>,

    namespace: Option<Namespace<'a>>,
}

impl<'a> Attribute<'a> {
    /// Creates a new instance of `Attribute`.
    ///
    /// # Example
    ///
    /// ```
    /// use soapbind_xml::builder::Attribute;
    /// let attribute = Attribute::new("name", "value");
    /// ```
    pub fn new(name: impl Into<Cow<'a, str>>, value: impl Into<Cow<'a, str>>) -> Self {
        Attribute {
            name: name.into(),
            value: value.into(),
            namespace: None,
        }
    }

    pub fn new_with_namespace(
        name: impl Into<Cow<'a, str>>,
        value: impl Into<Cow<'a, str>>,
        namespace: Option<impl Into<Namespace<'a>>>,
    ) -> Self {
        Attribute {
            name: name.into(),
            value: value.into(),
            namespace: namespace.map(Into::into),
        }
    }

    pub fn set_namespace(mut self, namespace: impl Into<Namespace<'a>>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }
}

impl<'a> NamespaceWrite<'a> for Attribute<'a> {
    fn ns_write<W: std::io::Write>(
        &self,
        w: &mut W,
        alias_map: &AliasMap<'a>,
    ) -> Result<(), XmlBuilderError> {
        let name = match &self.namespace {
            None => Cow::Borrowed(self.name.as_ref()),
            Some(ns) if ns.is_xml() => Cow::Owned(format!("xml:{}", self.name)),
            Some(ns) => match alias_map.get(ns) {
                Some(Some(alias)) => Cow::Owned(format!("{alias}:{}", self.name)),
                // Unprefixed attributes never pick up the default namespace.
                Some(None) => {
                    return Err(XmlBuilderError::NamespaceHasNoAlias {
                        tag: self.name.to_string(),
                        ns: ns.url.to_string(),
                    });
                }
                None => {
                    return Err(XmlBuilderError::MissingAliasMapForAttribute {
                        attr: self.name.to_string(),
                        ns: ns.url.to_string(),
                    });
                }
            },
        };

        write!(w, " {}=\"{}\"", name, escape_attribute(&self.value)?)?;
        Ok(())
    }
}
