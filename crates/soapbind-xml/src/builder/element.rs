use std::borrow::Cow;

use crate::builder::{
    AliasMap, Attribute, Namespace, NamespaceWrite, XmlBuilderError, escape_attribute, escape_text,
};

#[derive(Debug, Clone)]
pub enum Content<'a> {
    /// Represents a text content within an XML element.
    Text(Cow<'a, str>),
    /// Represents a child element within an XML element.
    Elements(Vec<Element<'a>>),

    None,
}

/// Represents an XML element.
#[derive(Debug, Clone)]
pub struct Element<'a> {
    /// The local name of the element.
    name: Cow<'a, str>,
    /// The namespace the element belongs to.
    namespace: Option<Namespace<'a>>,
    /// `xmlns` declarations made on this element, in insertion order.
    namespace_declarations: Vec<(Namespace<'a>, Option<Cow<'a, str>>)>,
    /// The attributes of the element.
    attributes: Vec<Attribute<'a>>,
    /// The child elements of the element.
    content: Content<'a>,
}

impl<'a> Element<'a> {
    /// Creates a new instance of `Element` with the given name.
    ///
    /// # Example
    ///
    /// ```
    /// use soapbind_xml::builder::Element;
    /// let element = Element::new("root");
    /// ```
    pub fn new(name: impl Into<Cow<'a, str>>) -> Self {
        Element {
            name: name.into(),
            namespace: None,
            namespace_declarations: Vec::new(),
            attributes: Vec::new(),
            content: Content::None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn namespace(&self) -> Option<&Namespace<'a>> {
        self.namespace.as_ref()
    }

    pub fn content(&self) -> &Content<'a> {
        &self.content
    }

    /// Sets the namespace of the element. The namespace must be declared on this
    /// element or one of its ancestors by the time the document is written.
    ///
    /// # Example
    ///
    /// ```
    /// use soapbind_xml::builder::{Element, Namespace};
    /// let element = Element::new("root")
    ///     .set_namespace(Namespace::new("http://example.com"))
    ///     .add_namespace_declaration("http://example.com", Some("ex"));
    /// ```
    pub fn set_namespace(mut self, namespace: impl Into<Namespace<'a>>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    pub fn set_namespace_optional(mut self, namespace: Option<impl Into<Namespace<'a>>>) -> Self {
        self.namespace = namespace.map(Into::into);
        self
    }

    /// Declares `xmlns:alias="url"` (or `xmlns="url"` when `alias` is `None`) on this element.
    pub fn add_namespace_declaration(
        mut self,
        url: impl Into<Cow<'a, str>>,
        alias: Option<impl Into<Cow<'a, str>>>,
    ) -> Self {
        self.namespace_declarations
            .push((Namespace::new(url), alias.map(Into::into)));
        self
    }

    /// Adds an attribute to the element and returns a modified `Element`.
    ///
    /// # Example
    ///
    /// ```
    /// use soapbind_xml::builder::{Element, Attribute};
    /// let element = Element::new("root")
    ///     .add_attribute(Attribute::new("attr1", "value1"));
    /// ```
    pub fn add_attribute(mut self, attribute: Attribute<'a>) -> Self {
        self.attributes.push(attribute);
        self
    }

    /// Adds a child element. Any text content previously set is discarded.
    pub fn add_child(mut self, child: Element<'a>) -> Self {
        match self.content {
            Content::None | Content::Text(_) => {
                self.content = Content::Elements(vec![child]);
            }
            Content::Elements(ref mut children) => {
                children.push(child);
            }
        }
        self
    }

    pub fn add_children(mut self, children: impl IntoIterator<Item = Element<'a>>) -> Self {
        for child in children {
            self = self.add_child(child);
        }
        self
    }

    /// Sets the text content of the element. Any child elements are discarded.
    /// The text is escaped when written.
    pub fn set_text(mut self, text: impl Into<Cow<'a, str>>) -> Self {
        self.content = Content::Text(text.into());
        self
    }

    fn qualified_name(&self, alias_map: &AliasMap<'a>) -> Result<Cow<'_, str>, XmlBuilderError> {
        let Some(ns) = &self.namespace else {
            return Ok(Cow::Borrowed(self.name.as_ref()));
        };

        match alias_map.get(ns) {
            Some(Some(alias)) => Ok(Cow::Owned(format!("{alias}:{}", self.name))),
            Some(None) => Ok(Cow::Borrowed(self.name.as_ref())),
            None => Err(XmlBuilderError::NamespaceNotDeclared {
                tag: self.name.to_string(),
                ns: ns.url.to_string(),
            }),
        }
    }
}

impl<'a> NamespaceWrite<'a> for Element<'a> {
    fn ns_write<W: std::io::Write>(
        &self,
        w: &mut W,
        alias_map: &AliasMap<'a>,
    ) -> Result<(), XmlBuilderError> {
        let scoped;
        let alias_map = if self.namespace_declarations.is_empty() {
            alias_map
        } else {
            let mut map = alias_map.clone();
            for (ns, alias) in &self.namespace_declarations {
                map.insert(ns.clone(), alias.clone());
            }
            scoped = map;
            &scoped
        };

        let name = self.qualified_name(alias_map)?;
        write!(w, "<{name}")?;

        for (ns, alias) in &self.namespace_declarations {
            match alias {
                Some(alias) => write!(w, " xmlns:{alias}=\"{}\"", escape_attribute(&ns.url)?)?,
                None => write!(w, " xmlns=\"{}\"", escape_attribute(&ns.url)?)?,
            }
        }

        for attribute in &self.attributes {
            attribute.ns_write(w, alias_map)?;
        }

        match &self.content {
            Content::None => write!(w, "/>")?,
            Content::Text(value) => write!(w, ">{}</{name}>", escape_text(value)?)?,
            Content::Elements(children) => {
                write!(w, ">")?;
                for child in children {
                    child.ns_write(w, alias_map)?;
                }
                write!(w, "</{name}>")?;
            }
        }

        Ok(())
    }
}
