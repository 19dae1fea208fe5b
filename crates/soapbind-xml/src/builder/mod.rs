//! A small XML writer: elements, attributes, namespace declarations and an optional
//! declaration. Namespace aliases are resolved against the `xmlns` declarations in
//! scope while writing, and all text and attribute values are escaped.
mod attribute;
#[allow(clippy::module_inception)]
mod builder;
mod element;
mod namespace;

use std::{borrow::Cow, collections::HashMap};

pub use self::attribute::*;
pub use self::builder::*;
pub use self::element::*;
pub use self::namespace::*;

pub type AliasMap<'a> = HashMap<Namespace<'a>, Option<Cow<'a, str>>>;

#[derive(Debug, thiserror::Error)]
pub enum XmlBuilderError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("UTF-8 error: {0}")]
    Utf8Error(#[from] std::string::FromUtf8Error),
    #[error("Missing alias for attribute '{attr}' in namespace '{ns}'")]
    MissingAliasMapForAttribute { attr: String, ns: String },
    #[error("Namespace '{ns}' not declared for tag '{tag}'")]
    NamespaceNotDeclared { tag: String, ns: String },
    #[error("Namespace '{ns}' has no alias for '{tag}'")]
    NamespaceHasNoAlias { tag: String, ns: String },
    #[error("Character {character:?} is not allowed in XML 1.0")]
    InvalidChar { character: char },
}

pub trait NamespaceWrite<'a> {
    fn ns_write<W: std::io::Write>(
        &self,
        w: &mut W,
        aliases: &AliasMap<'a>,
    ) -> Result<(), XmlBuilderError>;
}

/// Escapes the characters that may not appear literally in element text.
pub fn escape_text(value: &str) -> Result<Cow<'_, str>, XmlBuilderError> {
    escape(value, false)
}

/// Escapes the characters that may not appear literally in a double-quoted attribute value.
pub fn escape_attribute(value: &str) -> Result<Cow<'_, str>, XmlBuilderError> {
    escape(value, true)
}

/// The `Char` production of XML 1.0. Anything else cannot be written, escaped or not.
const fn is_xml_char(c: char) -> bool {
    matches!(c, '\t' | '\n' | '\r' | '\u{20}'..='\u{D7FF}' | '\u{E000}'..='\u{FFFD}' | '\u{10000}'..)
}

fn escape(value: &str, attribute: bool) -> Result<Cow<'_, str>, XmlBuilderError> {
    if let Some(character) = value.chars().find(|&c| !is_xml_char(c)) {
        return Err(XmlBuilderError::InvalidChar { character });
    }

    let needs_escape = |c: char| match c {
        '&' | '<' | '>' | '\r' => true,
        '"' | '\'' | '\n' | '\t' => attribute,
        _ => false,
    };

    if !value.chars().any(needs_escape) {
        return Ok(Cow::Borrowed(value));
    }

    let mut escaped = String::with_capacity(value.len() + 16);
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' if attribute => escaped.push_str("&quot;"),
            '\'' if attribute => escaped.push_str("&apos;"),
            '\n' if attribute => escaped.push_str("&#xA;"),
            '\t' if attribute => escaped.push_str("&#x9;"),
            '\r' => escaped.push_str("&#xD;"),
            other => escaped.push(other),
        }
    }
    Ok(Cow::Owned(escaped))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SOAP_ENV: &str = "http://schemas.xmlsoap.org/soap/envelope/";
    const CALC: &str = "urn:example:calculator";

    #[test]
    fn test_empty_element_is_self_closing() {
        let builder = Builder::new(None, Element::new("Body"));
        assert_eq!(builder.to_xml_string().unwrap(), "<Body/>");
    }

    #[test]
    fn test_envelope_shape() {
        let body = Element::new("Body")
            .set_namespace(SOAP_ENV)
            .add_child(Element::new("Add").set_namespace(CALC).add_children(vec![
                Element::new("a").set_text("1"),
                Element::new("b").set_text("2"),
            ]));
        let envelope = Element::new("Envelope")
            .set_namespace(SOAP_ENV)
            .add_namespace_declaration(SOAP_ENV, Some("soap"))
            .add_namespace_declaration(CALC, Some("calc"))
            .add_child(body);

        assert_eq!(
            Builder::new(None, envelope).to_xml_string().unwrap(),
            concat!(
                r#"<soap:Envelope xmlns:soap="http://schemas.xmlsoap.org/soap/envelope/" xmlns:calc="urn:example:calculator">"#,
                "<soap:Body><calc:Add><a>1</a><b>2</b></calc:Add></soap:Body></soap:Envelope>"
            )
        );
    }

    #[test]
    fn test_empty_children_keep_the_element_empty() {
        let element = Element::new("Ping").add_children(Vec::new());
        assert_eq!(Builder::new(None, element).to_xml_string().unwrap(), "<Ping/>");
    }

    #[test]
    fn test_redeclared_prefix_in_child() {
        let child = Element::new("Header")
            .set_namespace(SOAP_ENV)
            .add_namespace_declaration(SOAP_ENV, Some("env"));
        let root = Element::new("Envelope")
            .set_namespace(SOAP_ENV)
            .add_namespace_declaration(SOAP_ENV, Some("soap"))
            .add_child(child);

        let xml_string = Builder::new(None, root).to_xml_string().unwrap();
        assert_eq!(
            xml_string,
            r#"<soap:Envelope xmlns:soap="http://schemas.xmlsoap.org/soap/envelope/"><env:Header xmlns:env="http://schemas.xmlsoap.org/soap/envelope/"/></soap:Envelope>"#
        );
    }

    #[test]
    fn test_default_namespace_element_is_unprefixed() {
        let element = Element::new("root")
            .set_namespace("http://example.com/default")
            .add_namespace_declaration("http://example.com/default", None::<&str>);

        let xml_string = Builder::new(None, element).to_xml_string().unwrap();
        assert_eq!(xml_string, r#"<root xmlns="http://example.com/default"/>"#);
    }

    #[test]
    fn test_undeclared_namespace_is_an_error() {
        let element = Element::new("root").set_namespace("http://example.com/missing");

        let result = Builder::new(None, element).to_xml_string();
        assert!(matches!(
            result,
            Err(XmlBuilderError::NamespaceNotDeclared { .. })
        ));
    }

    #[test]
    fn test_attribute_with_namespace() {
        let attr = Attribute::new_with_namespace("nil", "true", Some("http://example.com"));
        let element = Element::new("test")
            .add_namespace_declaration("http://example.com", Some("ex"))
            .add_attribute(attr);

        let xml_string = Builder::new(None, element).to_xml_string().unwrap();
        assert_eq!(
            xml_string,
            r#"<test xmlns:ex="http://example.com" ex:nil="true"/>"#
        );
    }

    #[test]
    fn test_xml_lang_attribute_needs_no_declaration() {
        let element = Element::new("Text")
            .add_attribute(Attribute::new("lang", "en").set_namespace(XML_NAMESPACE))
            .set_text("boom");

        let xml_string = Builder::new(None, element).to_xml_string().unwrap();
        assert_eq!(xml_string, r#"<Text xml:lang="en">boom</Text>"#);
    }

    #[test]
    fn test_special_characters_in_text_are_escaped() {
        let element = Element::new("test").set_text("a < b && c > \"d\" 'e'");
        let xml_string = Builder::new(None, element).to_xml_string().unwrap();
        assert_eq!(
            xml_string,
            "<test>a &lt; b &amp;&amp; c &gt; \"d\" 'e'</test>"
        );
    }

    #[test]
    fn test_special_characters_in_attributes_are_escaped() {
        let element = Element::new("test").add_attribute(Attribute::new("name", "<\"x\" & 'y'>"));
        let xml_string = Builder::new(None, element).to_xml_string().unwrap();
        assert_eq!(
            xml_string,
            r#"<test name="&lt;&quot;x&quot; &amp; &apos;y&apos;&gt;"/>"#
        );
    }

    #[test]
    fn test_escaped_text_survives_parsing() {
        let original = "1 < 2 & \"quotes\" ]]> end";
        let element = Element::new("v").set_text(original);
        let xml_string = Builder::new(None, element).to_xml_string().unwrap();

        let document = crate::parser::parse(&xml_string).unwrap();
        assert_eq!(document.root_element().text(), Some(original));
    }

    #[test]
    fn test_characters_outside_xml_are_rejected() {
        let element = Element::new("s").set_text("a\u{1}b");
        assert!(matches!(
            Builder::new(None, element).to_xml_string(),
            Err(XmlBuilderError::InvalidChar { character: '\u{1}' })
        ));

        let element = Element::new("s").add_attribute(Attribute::new("id", "\u{FFFE}"));
        assert!(matches!(
            Builder::new(None, element).to_xml_string(),
            Err(XmlBuilderError::InvalidChar { .. })
        ));

        let element = Element::new("s").set_text("tab\there \u{1F600}");
        assert_eq!(
            Builder::new(None, element).to_xml_string().unwrap(),
            "<s>tab\there \u{1F600}</s>"
        );
    }

    #[test]
    fn test_child_replaces_text() {
        let element = Element::new("result")
            .set_text("pending")
            .add_child(Element::new("value"));

        let xml_string = Builder::new(None, element).to_xml_string().unwrap();
        assert_eq!(xml_string, "<result><value/></result>");
    }

    #[test]
    fn test_builder_with_declaration() {
        let element = Element::new("root").set_text("content");
        let xml_string = Builder::new(Some(Declaration::with_encoding("ISO-8859-1")), element)
            .to_xml_string()
            .unwrap();
        assert_eq!(
            xml_string,
            r#"<?xml version="1.0" encoding="ISO-8859-1"?><root>content</root>"#
        );
    }
}
