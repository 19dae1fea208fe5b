use std::{collections::BTreeMap, fmt::Display, sync::Arc};

use crate::{
    names::{QualifiedName, SOAP11_ENVELOPE_NS, SOAP12_ENVELOPE_NS},
    schema::{Schema, TypeRef},
    style::EncodingRule,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SoapVersion {
    V11,
    V12,
}

impl SoapVersion {
    pub fn envelope_namespace(self) -> &'static str {
        match self {
            Self::V11 => SOAP11_ENVELOPE_NS,
            Self::V12 => SOAP12_ENVELOPE_NS,
        }
    }

    pub fn from_envelope_namespace(namespace: &str) -> Option<Self> {
        match namespace {
            SOAP11_ENVELOPE_NS => Some(Self::V11),
            SOAP12_ENVELOPE_NS => Some(Self::V12),
            _ => None,
        }
    }

    pub fn content_type(self) -> &'static str {
        match self {
            Self::V11 => "text/xml; charset=utf-8",
            Self::V12 => "application/soap+xml; charset=utf-8",
        }
    }
}

/// The `style` attribute of `soap:binding` / `soap:operation`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclaredStyle {
    Rpc,
    Document,
}

/// Identifies one operation of one port of one service.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OperationKey {
    pub service: String,
    pub port: String,
    pub operation: String,
}

impl OperationKey {
    pub fn new(
        service: impl Into<String>,
        port: impl Into<String>,
        operation: impl Into<String>,
    ) -> Self {
        Self {
            service: service.into(),
            port: port.into(),
            operation: operation.into(),
        }
    }
}

impl Display for OperationKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}/{}", self.service, self.port, self.operation)
    }
}

/// How a message part is declared: `element=` or `type=`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PartReference {
    Element(QualifiedName),
    Type(QualifiedName),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartDescriptor {
    pub name: String,
    pub reference: PartReference,
    /// Content type of the part, resolved against the schema.
    pub type_ref: TypeRef,
}

impl PartDescriptor {
    pub fn element_name(&self) -> Option<&QualifiedName> {
        match &self.reference {
            PartReference::Element(name) => Some(name),
            PartReference::Type(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageDescriptor {
    pub name: String,
    pub parts: Vec<PartDescriptor>,
}

impl MessageDescriptor {
    pub fn part(&self, name: &str) -> Option<&PartDescriptor> {
        self.parts.iter().find(|part| part.name == name)
    }
}

/// A `soap:header` bound to one part of a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderDescriptor {
    pub message: String,
    pub part: PartDescriptor,
}

#[derive(Debug, Clone)]
pub struct OperationDescriptor {
    pub name: String,
    pub soap_action: Option<String>,
    pub soap_version: SoapVersion,
    pub input: MessageDescriptor,
    /// `None` for one-way operations.
    pub output: Option<MessageDescriptor>,
    pub input_headers: Vec<HeaderDescriptor>,
    pub output_headers: Vec<HeaderDescriptor>,
    pub faults: Vec<String>,
    pub documentation: Option<String>,
    pub rule: EncodingRule,
    pub schema: Arc<Schema>,
}

impl OperationDescriptor {
    pub fn is_one_way(&self) -> bool {
        self.output.is_none()
    }
}

#[derive(Debug, Clone)]
pub struct BindingDescriptor {
    pub name: String,
    pub port_type: String,
    pub style: DeclaredStyle,
    pub transport: String,
    pub soap_version: SoapVersion,
    pub operations: Vec<Arc<OperationDescriptor>>,
}

#[derive(Debug, Clone)]
pub struct PortDescriptor {
    pub name: String,
    pub address: Option<String>,
    pub binding: Arc<BindingDescriptor>,
}

impl PortDescriptor {
    pub fn operations(&self) -> &[Arc<OperationDescriptor>] {
        &self.binding.operations
    }

    pub fn operation(&self, name: &str) -> Option<&Arc<OperationDescriptor>> {
        self.operations().iter().find(|op| op.name == name)
    }
}

#[derive(Debug, Clone)]
pub struct ServiceDescriptor {
    pub name: String,
    /// Base address: the first port's `soap:address`, if any.
    pub address: Option<String>,
    pub ports: BTreeMap<String, PortDescriptor>,
}

/// The parsed, resolved and immutable form of a WSDL contract.
#[derive(Debug, Clone)]
pub struct ContractDescriptor {
    pub(crate) source: Arc<str>,
    pub(crate) name: Option<String>,
    pub(crate) target_namespace: Option<String>,
    pub(crate) services: BTreeMap<String, ServiceDescriptor>,
    pub(crate) schema: Arc<Schema>,
}

impl ContractDescriptor {
    /// The WSDL text this contract was parsed from, unchanged.
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn target_namespace(&self) -> Option<&str> {
        self.target_namespace.as_deref()
    }

    pub fn services(&self) -> impl Iterator<Item = &ServiceDescriptor> {
        self.services.values()
    }

    pub fn service(&self, name: &str) -> Option<&ServiceDescriptor> {
        self.services.get(name)
    }

    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    /// Every operation reachable through every port, in service/port order.
    pub fn operations(
        &self,
    ) -> impl Iterator<Item = (OperationKey, &PortDescriptor, &Arc<OperationDescriptor>)> {
        self.services.values().flat_map(|service| {
            service.ports.values().flat_map(move |port| {
                port.operations().iter().map(move |op| {
                    (
                        OperationKey::new(&service.name, &port.name, &op.name),
                        port,
                        op,
                    )
                })
            })
        })
    }

    pub fn operation(&self, key: &OperationKey) -> Option<(&PortDescriptor, &Arc<OperationDescriptor>)> {
        let port = self.services.get(&key.service)?.ports.get(&key.port)?;
        port.operation(&key.operation).map(|op| (port, op))
    }

    /// Keys of every operation called `name`, across all services and ports.
    pub fn find_operations(&self, name: &str) -> Vec<OperationKey> {
        self.operations()
            .filter(|(key, _, _)| key.operation == name)
            .map(|(key, _, _)| key)
            .collect()
    }
}
