//! SOAP envelopes: reading the `Envelope`/`Header`/`Body` frame, writing it back,
//! and the generic (schema-less) mapping used for untyped content.
pub mod codec;

use soapbind_wsdl::{
    SoapVersion,
    names::{PrefixTable, XSI_NS},
};
use soapbind_xml::{
    XmlError,
    builder::{Attribute, Builder, Declaration, Element},
    parser::{Node, XmlDeserialize, XmlVisitor, element_children, text_content},
};

use crate::value::{Record, Value};

pub const ENVELOPE_PREFIX: &str = "soap";

/// The frame of a parsed envelope. Nodes borrow from the parsed document.
#[derive(Debug, Clone, Copy)]
pub struct ParsedEnvelope<'a> {
    pub version: SoapVersion,
    pub header: Option<Node<'a, 'a>>,
    pub body: Node<'a, 'a>,
}

impl<'a> ParsedEnvelope<'a> {
    /// First element child of `soap:Body`, if any.
    pub fn first_body_element(&self) -> Option<Node<'a, 'a>> {
        element_children(self.body).next()
    }

    /// Whether `node` is a `Fault` of this envelope's SOAP version.
    pub fn is_fault(&self, node: Node<'_, '_>) -> bool {
        node.tag_name().name() == "Fault"
            && node.tag_name().namespace() == Some(self.version.envelope_namespace())
    }
}

pub struct ParsedEnvelopeVisitor<'a> {
    version: Option<SoapVersion>,
    header: Option<Node<'a, 'a>>,
    body: Option<Node<'a, 'a>>,
}

impl<'a> XmlVisitor<'a> for ParsedEnvelopeVisitor<'a> {
    type Value = ParsedEnvelope<'a>;

    fn visit_node(&mut self, node: Node<'a, 'a>) -> Result<(), XmlError> {
        let tag = node.tag_name();
        if tag.name() != "Envelope" {
            return Err(XmlError::XmlInvalidTag {
                expected: "Envelope".to_owned(),
                found: tag.name().to_owned(),
            });
        }
        let version = tag
            .namespace()
            .and_then(SoapVersion::from_envelope_namespace)
            .ok_or_else(|| XmlError::XmlInvalidNamespace {
                expected: "a SOAP 1.1 or 1.2 envelope namespace".to_owned(),
                found: tag.namespace().map(str::to_owned),
            })?;
        self.version = Some(version);
        Ok(())
    }

    fn visit_children(
        &mut self,
        children: impl Iterator<Item = Node<'a, 'a>>,
    ) -> Result<(), XmlError> {
        let Some(version) = self.version else {
            return Ok(());
        };
        let namespace = version.envelope_namespace();

        for child in children.filter(Node::is_element) {
            if child.tag_name().namespace() != Some(namespace) {
                continue;
            }
            let slot = match child.tag_name().name() {
                "Header" => &mut self.header,
                "Body" => &mut self.body,
                _ => continue,
            };
            if slot.is_some() {
                return Err(XmlError::TagCountInvalid {
                    tag: child.tag_name().name().to_owned(),
                    value: 2,
                });
            }
            *slot = Some(child);
        }
        Ok(())
    }

    fn finish(self) -> Result<Self::Value, XmlError> {
        Ok(ParsedEnvelope {
            version: self
                .version
                .ok_or_else(|| XmlError::InvalidXml("Envelope was not visited".to_owned()))?,
            header: self.header,
            body: self
                .body
                .ok_or_else(|| XmlError::InvalidXml("Envelope must contain a Body".to_owned()))?,
        })
    }
}

impl<'a> XmlDeserialize<'a> for ParsedEnvelope<'a> {
    type Visitor = ParsedEnvelopeVisitor<'a>;

    fn visitor() -> Self::Visitor {
        ParsedEnvelopeVisitor {
            version: None,
            header: None,
            body: None,
        }
    }
}

/// Assembles `soap:Envelope`, declaring the envelope and `xsi` prefixes plus every
/// prefix of `prefixes` so that contract elements keep their contract prefixes.
pub fn envelope<'a>(
    version: SoapVersion,
    prefixes: Option<&'a PrefixTable>,
    header: Option<Vec<Element<'a>>>,
    body: Vec<Element<'a>>,
) -> Element<'a> {
    let namespace = version.envelope_namespace();
    let mut envelope = Element::new("Envelope")
        .set_namespace(namespace)
        .add_namespace_declaration(namespace, Some(ENVELOPE_PREFIX))
        .add_namespace_declaration(XSI_NS, Some("xsi"));
    if let Some(prefixes) = prefixes {
        for (ns, prefix) in prefixes.iter() {
            envelope = envelope.add_namespace_declaration(ns, Some(prefix));
        }
    }

    if let Some(header) = header {
        envelope = envelope.add_child(
            Element::new("Header")
                .set_namespace(namespace)
                .add_children(header),
        );
    }

    // an empty Body must still be written as an element, not dropped
    let body_element = Element::new("Body").set_namespace(namespace);
    envelope.add_child(body_element.add_children(body))
}

pub fn to_xml(envelope: Element<'_>, declaration: bool) -> Result<String, XmlError> {
    let declaration = declaration.then(Declaration::default);
    Ok(Builder::new(declaration, envelope).to_xml_string()?)
}

pub(crate) fn nil_attribute<'a>() -> Attribute<'a> {
    Attribute::new_with_namespace("nil", "true", Some(XSI_NS))
}

pub(crate) fn is_nil(node: Node<'_, '_>) -> bool {
    matches!(node.attribute((XSI_NS, "nil")), Some("true" | "1"))
}

/// Writes `value` without a schema: records become child elements, lists repeat the
/// element, scalars are written in their lexical form. Names are unqualified.
pub(crate) fn encode_generic<'a>(name: &'a str, value: &'a Value) -> Vec<Element<'a>> {
    match value {
        Value::Absent => Vec::new(),
        Value::Nil => vec![Element::new(name).add_attribute(nil_attribute())],
        Value::Primitive(p) => vec![Element::new(name).set_text(p.to_string())],
        Value::Record(record) => vec![Element::new(name).add_children(
            record
                .iter()
                .flat_map(|(key, value)| encode_generic(key, value)),
        )],
        Value::List(items) => items
            .iter()
            .flat_map(|item| encode_generic(name, item))
            .collect(),
    }
}

/// Reads an element without a schema. Elements with element children become
/// records (repeated names collect into lists); leaves become strings.
pub(crate) fn decode_generic(node: Node<'_, '_>) -> Value {
    if is_nil(node) {
        return Value::Nil;
    }
    if element_children(node).next().is_none() {
        return Value::from(text_content(node));
    }
    Value::Record(decode_generic_children(node))
}

pub(crate) fn decode_generic_children(node: Node<'_, '_>) -> Record {
    let mut record = Record::new();
    for child in element_children(node) {
        push_repeated(&mut record, child.tag_name().name(), decode_generic(child));
    }
    record
}

/// Inserts `value` under `key`, turning the entry into a list on the second occurrence.
pub(crate) fn push_repeated(record: &mut Record, key: &str, value: Value) {
    match record.get_mut(key) {
        None => record.insert(key, value),
        Some(Value::List(items)) => items.push(value),
        Some(previous) => {
            let first = std::mem::take(previous);
            *previous = Value::List(vec![first, value]);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use soapbind_xml::parser::parse;

    #[test]
    fn test_parse_envelope_frame() {
        let xml = r#"<s:Envelope xmlns:s="http://www.w3.org/2003/05/soap-envelope">
                <s:Header><token>abc</token></s:Header>
                <s:Body><ping/></s:Body>
            </s:Envelope>"#;
        let document = parse(xml).unwrap();
        let envelope = ParsedEnvelope::from_node(document.root_element()).unwrap();

        assert_eq!(envelope.version, SoapVersion::V12);
        assert!(envelope.header.is_some());
        assert_eq!(
            envelope.first_body_element().unwrap().tag_name().name(),
            "ping"
        );
    }

    #[test]
    fn test_envelope_without_body_is_rejected() {
        let xml = r#"<soap:Envelope xmlns:soap="http://schemas.xmlsoap.org/soap/envelope/"/>"#;
        let document = parse(xml).unwrap();
        assert!(ParsedEnvelope::from_node(document.root_element()).is_err());
    }

    #[test]
    fn test_unknown_envelope_namespace_is_rejected() {
        let xml = r#"<Envelope xmlns="urn:not-soap"><Body/></Envelope>"#;
        let document = parse(xml).unwrap();
        assert!(matches!(
            ParsedEnvelope::from_node(document.root_element()),
            Err(XmlError::XmlInvalidNamespace { .. })
        ));
    }

    #[test]
    fn test_generic_round_trip_collects_repeated_names() {
        let value = Value::from(
            Record::new()
                .with("item", vec![Value::from("a"), Value::from("b")])
                .with("flag", Value::Nil)
                .with("note", "x < y"),
        );
        let element = Element::new("root").add_children(
            value
                .as_record()
                .unwrap()
                .iter()
                .flat_map(|(k, v)| encode_generic(k, v)),
        );
        let xml = Builder::new(None, element.add_namespace_declaration(XSI_NS, Some("xsi")))
            .to_xml_string()
            .unwrap();

        let document = parse(&xml).unwrap();
        let decoded = decode_generic(document.root_element());
        assert_eq!(decoded, value);
    }
}
