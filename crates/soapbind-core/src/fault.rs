use std::fmt::Display;

use soapbind_wsdl::SoapVersion;
use soapbind_xml::{
    XmlError,
    builder::{Attribute, Element, XML_NAMESPACE},
    parser::{Node, XmlVisitor, element_children, text_content},
};

use crate::{
    envelope::{decode_generic, decode_generic_children, encode_generic},
    value::{Record, Value},
};

/// The standard fault codes, spelled per SOAP version on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FaultCode {
    /// `Client` in SOAP 1.1, `Sender` in SOAP 1.2.
    Client,
    /// `Server` in SOAP 1.1, `Receiver` in SOAP 1.2.
    Server,
    VersionMismatch,
    MustUnderstand,
    /// Any other code, kept as written.
    Other(String),
}

impl FaultCode {
    fn local_name(&self, version: SoapVersion) -> &str {
        match (self, version) {
            (Self::Client, SoapVersion::V11) => "Client",
            (Self::Client, SoapVersion::V12) => "Sender",
            (Self::Server, SoapVersion::V11) => "Server",
            (Self::Server, SoapVersion::V12) => "Receiver",
            (Self::VersionMismatch, _) => "VersionMismatch",
            (Self::MustUnderstand, _) => "MustUnderstand",
            (Self::Other(code), _) => code,
        }
    }

    /// The QName text written into the fault.
    pub fn wire(&self, version: SoapVersion) -> String {
        match self {
            Self::Other(code) => code.clone(),
            standard => format!("soap:{}", standard.local_name(version)),
        }
    }

    /// Reads a code QName, resolving its prefix against `node`.
    fn parse(text: &str, node: Node<'_, '_>, version: SoapVersion) -> Self {
        let text = text.trim();
        let (prefix, local) = match text.split_once(':') {
            Some((prefix, local)) => (Some(prefix), local),
            None => (None, text),
        };
        let namespace = node.lookup_namespace_uri(prefix);
        if namespace != Some(version.envelope_namespace()) {
            return Self::Other(text.to_owned());
        }

        // SOAP 1.1 subcodes are dot-suffixed, e.g. Client.Authentication
        match local.split('.').next().unwrap_or(local) {
            "Client" | "Sender" => Self::Client,
            "Server" | "Receiver" => Self::Server,
            "VersionMismatch" => Self::VersionMismatch,
            "MustUnderstand" => Self::MustUnderstand,
            _ => Self::Other(text.to_owned()),
        }
    }
}

impl Display for FaultCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.local_name(SoapVersion::V11))
    }
}

/// A SOAP fault, either received from a peer or produced by the dispatcher.
#[derive(Debug, Clone, PartialEq, thiserror::Error, typed_builder::TypedBuilder)]
#[error("{code}: {string}")]
pub struct Fault {
    pub code: FaultCode,
    #[builder(setter(into))]
    pub string: String,
    #[builder(default, setter(into, strip_option))]
    pub actor: Option<String>,
    #[builder(default, setter(strip_option))]
    pub detail: Option<Value>,
}

impl Fault {
    /// A fault caused by the request.
    pub fn client(string: impl Into<String>) -> Self {
        Self::builder().code(FaultCode::Client).string(string).build()
    }

    /// A fault caused by the service.
    pub fn server(string: impl Into<String>) -> Self {
        Self::builder().code(FaultCode::Server).string(string).build()
    }

    /// HTTP status a fault response is sent with.
    pub const HTTP_STATUS: u16 = 500;

    /// Builds `soap:Fault` in the shape `version` prescribes.
    pub fn to_element(&self, version: SoapVersion) -> Element<'_> {
        let ns = version.envelope_namespace();
        let fault = Element::new("Fault").set_namespace(ns);

        match version {
            SoapVersion::V11 => {
                let mut fault = fault
                    .add_child(Element::new("faultcode").set_text(self.code.wire(version)))
                    .add_child(Element::new("faultstring").set_text(self.string.as_str()));
                if let Some(actor) = &self.actor {
                    fault = fault.add_child(Element::new("faultactor").set_text(actor.as_str()));
                }
                if let Some(detail) = &self.detail {
                    fault = fault.add_child(detail_element("detail", None, detail));
                }
                fault
            }
            SoapVersion::V12 => {
                let mut fault = fault
                    .add_child(
                        Element::new("Code").set_namespace(ns).add_child(
                            Element::new("Value")
                                .set_namespace(ns)
                                .set_text(self.code.wire(version)),
                        ),
                    )
                    .add_child(
                        Element::new("Reason").set_namespace(ns).add_child(
                            Element::new("Text")
                                .set_namespace(ns)
                                .add_attribute(Attribute::new_with_namespace(
                                    "lang",
                                    "en",
                                    Some(XML_NAMESPACE),
                                ))
                                .set_text(self.string.as_str()),
                        ),
                    );
                if let Some(actor) = &self.actor {
                    fault = fault.add_child(
                        Element::new("Role")
                            .set_namespace(ns)
                            .set_text(actor.as_str()),
                    );
                }
                if let Some(detail) = &self.detail {
                    fault = fault.add_child(detail_element("Detail", Some(ns), detail));
                }
                fault
            }
        }
    }
}

fn detail_element<'a>(name: &'a str, namespace: Option<&'a str>, detail: &'a Value) -> Element<'a> {
    let element = Element::new(name).set_namespace_optional(namespace);
    match detail {
        Value::Record(record) => element.add_children(
            record
                .iter()
                .flat_map(|(key, value)| encode_generic(key, value)),
        ),
        Value::Primitive(p) => element.set_text(p.to_string()),
        Value::Absent | Value::Nil | Value::List(_) => {
            element.add_children(encode_generic("item", detail))
        }
    }
}

/// Reads a `Fault` element in either SOAP version's shape.
pub struct FaultVisitor {
    version: SoapVersion,
    code: Option<FaultCode>,
    string: Option<String>,
    actor: Option<String>,
    detail: Option<Value>,
}

impl FaultVisitor {
    pub fn new(version: SoapVersion) -> Self {
        Self {
            version,
            code: None,
            string: None,
            actor: None,
            detail: None,
        }
    }
}

fn read_detail(node: Node<'_, '_>) -> Value {
    if element_children(node).next().is_some() {
        Value::Record(decode_generic_children(node))
    } else {
        decode_generic(node)
    }
}

impl<'a> XmlVisitor<'a> for FaultVisitor {
    type Value = Fault;

    fn visit_node(&mut self, node: Node<'a, 'a>) -> Result<(), XmlError> {
        soapbind_xml::parser::expect_element(
            node,
            "Fault",
            Some(self.version.envelope_namespace()),
        )
    }

    fn visit_children(
        &mut self,
        children: impl Iterator<Item = Node<'a, 'a>>,
    ) -> Result<(), XmlError> {
        for child in children.filter(Node::is_element) {
            match (self.version, child.tag_name().name()) {
                (SoapVersion::V11, "faultcode") => {
                    self.code = Some(FaultCode::parse(&text_content(child), child, self.version));
                }
                (SoapVersion::V11, "faultstring") => self.string = Some(text_content(child)),
                (SoapVersion::V11, "faultactor") | (SoapVersion::V12, "Role" | "Node") => {
                    self.actor.get_or_insert_with(|| text_content(child));
                }
                (SoapVersion::V11, "detail") | (SoapVersion::V12, "Detail") => {
                    self.detail = Some(read_detail(child));
                }
                (SoapVersion::V12, "Code") => {
                    let value = element_children(child).find(|c| c.tag_name().name() == "Value");
                    self.code = value
                        .map(|value| FaultCode::parse(&text_content(value), value, self.version));
                }
                (SoapVersion::V12, "Reason") => {
                    self.string = element_children(child)
                        .find(|c| c.tag_name().name() == "Text")
                        .map(text_content);
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn finish(self) -> Result<Self::Value, XmlError> {
        Ok(Fault {
            code: self.code.ok_or_else(|| {
                XmlError::InvalidXml("Fault is missing its fault code".to_owned())
            })?,
            string: self.string.unwrap_or_default(),
            actor: self.actor,
            detail: self.detail,
        })
    }
}

/// Decodes a `Fault` element of `version`.
pub fn read_fault(node: Node<'_, '_>, version: SoapVersion) -> Result<Fault, XmlError> {
    soapbind_xml::parser::NodeDeserializer::new(node).deserialize(FaultVisitor::new(version))
}

impl From<Fault> for Value {
    fn from(fault: Fault) -> Self {
        let mut record = Record::new()
            .with("code", fault.code.to_string())
            .with("string", fault.string);
        if let Some(actor) = fault.actor {
            record.insert("actor", actor);
        }
        if let Some(detail) = fault.detail {
            record.insert("detail", detail);
        }
        Self::Record(record)
    }
}
