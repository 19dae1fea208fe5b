//! Binding-style classification and the encoding rules derived from it.
//!
//! This is the only place that decides whether an operation is rpc, unwrapped
//! document/literal or document/literal-wrapped; the codec and the dispatcher only
//! ever read the resulting [`EncodingRule`].

use std::fmt::Display;

use crate::{
    descriptor::{DeclaredStyle, MessageDescriptor, PartDescriptor, PartReference},
    names::QualifiedName,
    schema::{MaxOccurs, Schema, TypeRef},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BindingStyle {
    RpcLiteral,
    DocumentLiteral,
    DocumentLiteralWrapped,
}

impl Display for BindingStyle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::RpcLiteral => "rpc-literal",
            Self::DocumentLiteral => "document-literal",
            Self::DocumentLiteralWrapped => "document-literal-wrapped",
        })
    }
}

/// One element that appears as a body child (or as a child of the wrapper).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Slot {
    /// Name of the entry in the native record.
    pub key: String,
    /// Message part this slot carries, when it maps to a whole part.
    pub part: Option<String>,
    pub element: QualifiedName,
    pub type_ref: TypeRef,
    pub min_occurs: u32,
    pub max_occurs: MaxOccurs,
    pub nillable: bool,
}

impl Slot {
    /// Native records may address a slot by its key or by its part name.
    pub fn accepts(&self, key: &str) -> bool {
        self.key == key || self.part.as_deref() == Some(key)
    }

    /// A conforming message always carries this slot's element.
    pub const fn is_required(&self) -> bool {
        self.min_occurs > 0 && !self.nillable
    }
}

/// The body shape of one direction of an operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BodyLayout {
    pub wrapper: Option<QualifiedName>,
    pub slots: Vec<Slot>,
    /// The wrapper's content model is only partially known.
    pub open: bool,
}

impl BodyLayout {
    /// The name of the first element this layout puts into `soap:Body`.
    pub fn first_element(&self) -> Option<&QualifiedName> {
        self.wrapper
            .as_ref()
            .or_else(|| self.slots.first().map(|slot| &slot.element))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodingRule {
    pub style: BindingStyle,
    pub input: BodyLayout,
    pub output: Option<BodyLayout>,
}

impl EncodingRule {
    pub fn layout(&self, direction: Direction) -> Option<&BodyLayout> {
        match direction {
            Direction::Input => Some(&self.input),
            Direction::Output => self.output.as_ref(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Client to server.
    Input,
    /// Server to client.
    Output,
}

/// What `soap:body` says about one direction of a binding operation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BodyBinding {
    pub namespace: Option<String>,
    /// Restricts the body to these parts (the rest travel as headers).
    pub parts: Option<Vec<String>>,
}

impl BodyBinding {
    fn select<'m>(&self, message: &'m MessageDescriptor) -> Vec<&'m PartDescriptor> {
        match &self.parts {
            Some(names) => message
                .parts
                .iter()
                .filter(|part| names.iter().any(|name| *name == part.name))
                .collect(),
            None => message.parts.iter().collect(),
        }
    }
}

pub(crate) struct ResolveInput<'a> {
    pub operation: &'a str,
    pub declared: DeclaredStyle,
    pub input: &'a MessageDescriptor,
    pub output: Option<&'a MessageDescriptor>,
    pub input_body: &'a BodyBinding,
    pub output_body: &'a BodyBinding,
    pub target_namespace: Option<&'a str>,
}

/// Classifies an operation.
///
/// Document-literal-wrapped requires a document binding, exactly one body part, and
/// that part to be an element named like the operation with complex content.
/// Anything else under a document binding is plain document-literal; rpc bindings
/// are never wrapped.
pub fn classify(
    declared: DeclaredStyle,
    operation: &str,
    body_parts: &[&PartDescriptor],
    schema: &Schema,
) -> BindingStyle {
    match declared {
        DeclaredStyle::Rpc => BindingStyle::RpcLiteral,
        DeclaredStyle::Document => match body_parts {
            [part] if wrapper_element(part, schema).is_some_and(|name| name.local == operation) => {
                BindingStyle::DocumentLiteralWrapped
            }
            _ => BindingStyle::DocumentLiteral,
        },
    }
}

/// The element name of `part` when it is a complex-typed element.
fn wrapper_element<'p>(part: &'p PartDescriptor, schema: &Schema) -> Option<&'p QualifiedName> {
    let PartReference::Element(name) = &part.reference else {
        return None;
    };
    match schema.element(name)?.type_ref {
        TypeRef::Complex(_) => Some(name),
        TypeRef::Scalar(_) | TypeRef::Any => None,
    }
}

pub(crate) fn resolve(input: &ResolveInput<'_>, schema: &Schema) -> EncodingRule {
    let input_parts = input.input_body.select(input.input);
    let style = classify(input.declared, input.operation, &input_parts, schema);
    let response_name = format!("{}Response", input.operation);

    let (input_layout, output_layout) = match style {
        BindingStyle::RpcLiteral => {
            let input_layout = rpc_layout(
                input.operation,
                input.input_body.namespace.as_deref().or(input.target_namespace),
                &input_parts,
            );
            let output_layout = input.output.map(|output| {
                rpc_layout(
                    &response_name,
                    input.output_body.namespace.as_deref().or(input.target_namespace),
                    &input.output_body.select(output),
                )
            });
            (input_layout, output_layout)
        }
        BindingStyle::DocumentLiteral => (
            document_layout(&input_parts, schema),
            input
                .output
                .map(|output| document_layout(&input.output_body.select(output), schema)),
        ),
        BindingStyle::DocumentLiteralWrapped => {
            let input_layout = input_parts
                .first()
                .and_then(|part| wrapped_layout(part, schema))
                .unwrap_or_else(|| document_layout(&input_parts, schema));
            let output_layout = input.output.map(|output| {
                let parts = input.output_body.select(output);
                match parts.as_slice() {
                    [part] => wrapped_layout(part, schema),
                    _ => None,
                }
                .unwrap_or_else(|| {
                    let namespace = input_layout
                        .wrapper
                        .as_ref()
                        .and_then(QualifiedName::namespace);
                    rpc_layout(&response_name, namespace, &parts)
                })
            });
            (input_layout, output_layout)
        }
    };

    EncodingRule {
        style,
        input: input_layout,
        output: output_layout,
    }
}

fn rpc_layout(wrapper: &str, namespace: Option<&str>, parts: &[&PartDescriptor]) -> BodyLayout {
    BodyLayout {
        wrapper: Some(QualifiedName::new(namespace, wrapper)),
        slots: parts
            .iter()
            .map(|part| Slot {
                key: part.name.clone(),
                part: Some(part.name.clone()),
                element: QualifiedName::unqualified(&part.name),
                type_ref: part.type_ref,
                min_occurs: 1,
                max_occurs: MaxOccurs::Bounded(1),
                nillable: true,
            })
            .collect(),
        open: false,
    }
}

fn document_layout(parts: &[&PartDescriptor], schema: &Schema) -> BodyLayout {
    BodyLayout {
        wrapper: None,
        slots: parts
            .iter()
            .map(|part| {
                let (element, nillable) = match &part.reference {
                    PartReference::Element(name) => (
                        name.clone(),
                        schema.element(name).is_some_and(|decl| decl.nillable),
                    ),
                    PartReference::Type(_) => (QualifiedName::unqualified(&part.name), false),
                };
                Slot {
                    key: element.local.clone(),
                    part: Some(part.name.clone()),
                    element,
                    type_ref: part.type_ref,
                    min_occurs: 1,
                    max_occurs: MaxOccurs::Bounded(1),
                    nillable,
                }
            })
            .collect(),
        open: false,
    }
}

fn wrapped_layout(part: &PartDescriptor, schema: &Schema) -> Option<BodyLayout> {
    let name = wrapper_element(part, schema)?;
    let TypeRef::Complex(id) = part.type_ref else {
        return None;
    };

    Some(BodyLayout {
        wrapper: Some(name.clone()),
        slots: schema
            .fields(id)
            .into_iter()
            .map(|field| Slot {
                key: field.name.local.clone(),
                part: None,
                element: field.name.clone(),
                type_ref: field.type_ref,
                min_occurs: field.min_occurs,
                max_occurs: field.max_occurs,
                nillable: field.nillable,
            })
            .collect(),
        open: schema.is_open(id),
    })
}
