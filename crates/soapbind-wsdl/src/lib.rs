//! WSDL 1.1 contract parsing.
//!
//! [`parse`] turns contract text into an immutable [`ContractDescriptor`]: every
//! reference is resolved and every operation carries its [`EncodingRule`], so the
//! runtime never has to look at the WSDL again.

pub mod descriptor;
pub mod names;
mod parser;
pub mod schema;
pub mod style;

use std::sync::Arc;

pub use descriptor::*;
pub use names::QualifiedName;
pub use style::{BindingStyle, BodyLayout, Direction, EncodingRule, Slot};

#[derive(Debug, thiserror::Error)]
pub enum ContractError {
    #[error("XML parsing error: {0}")]
    Xml(#[from] soapbind_xml::parser::Error),

    #[error("Not a WSDL 1.1 document: root element is '{0}'")]
    NotAWsdlDocument(String),

    #[error("Missing attribute '{attribute}' on <{element}>")]
    MissingAttribute {
        element: &'static str,
        attribute: &'static str,
    },

    #[error("Invalid value '{value}' for attribute '{attribute}' on <{element}>")]
    InvalidAttribute {
        element: &'static str,
        attribute: &'static str,
        value: String,
    },

    #[error("Undeclared namespace prefix '{prefix}' in reference '{reference}'")]
    UnresolvedPrefix { prefix: String, reference: String },

    #[error("Undefined message '{message}' referenced by {context}")]
    UndefinedMessage { message: String, context: String },

    #[error("Message '{message}' has no part '{part}'")]
    UndefinedPart { message: String, part: String },

    #[error("Undefined port type '{port_type}' referenced by binding '{binding}'")]
    UndefinedPortType { port_type: String, binding: String },

    #[error("Undefined binding '{binding}' referenced by port '{port}'")]
    UndefinedBinding { binding: String, port: String },

    #[error("Binding operation '{operation}' is not declared by port type '{port_type}'")]
    UndefinedOperation {
        operation: String,
        port_type: String,
    },

    #[error("Undefined schema element '{element}' referenced by {context}")]
    UndefinedElement { element: String, context: String },

    #[error("Unresolved type '{type_name}' referenced by {context}")]
    UnresolvedType { type_name: String, context: String },

    #[error("Part '{part}' of message '{message}' declares neither element nor type")]
    PartWithoutType { message: String, part: String },

    #[error("Binding '{binding}' uses unsupported transport '{transport}'")]
    UnsupportedTransport { binding: String, transport: String },

    #[error("Operation '{operation}' uses unsupported use=\"{usage}\"")]
    UnsupportedUse { operation: String, usage: String },

    #[error("Operation '{operation}' is not supported: {reason}")]
    UnsupportedOperation {
        operation: String,
        reason: &'static str,
    },

    #[error("Duplicate {kind} '{name}'")]
    Duplicate { kind: &'static str, name: String },
}

/// Parses a WSDL 1.1 contract.
pub fn parse(source: impl Into<Arc<str>>) -> Result<ContractDescriptor, ContractError> {
    parser::parse_contract(source.into())
}
