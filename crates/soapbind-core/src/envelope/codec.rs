//! Typed encoding and decoding of one operation's envelopes.
//!
//! Both directions are driven by the operation's [`EncodingRule`](soapbind_wsdl::EncodingRule):
//! the codec never looks at the binding style except to pick the shape of a decoded
//! result.

use std::borrow::Cow;

use soapbind_wsdl::{
    BindingStyle, BodyLayout, Direction, HeaderDescriptor, OperationDescriptor, QualifiedName,
    Slot, SoapVersion,
    schema::{FieldDecl, MaxOccurs, Schema, TypeRef},
};
use soapbind_xml::{
    XmlError,
    builder::Element,
    parser::{Node, XmlDeserialize, element_children, parse, text_content},
};
use tracing::{debug, instrument, warn};

use super::{
    ParsedEnvelope, decode_generic, encode_generic, envelope, is_nil, nil_attribute,
    push_repeated, to_xml,
};
use crate::{
    coerce::{self, CoercionError},
    fault::{Fault, read_fault},
    value::{ABSENT, Record, Value},
};

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("XML error: {0}")]
    Xml(#[from] XmlError),

    #[error("operation '{operation}' is one-way and has no output message")]
    NoOutput { operation: String },

    #[error("element '{element}' is required but no value was given")]
    MissingValue { element: String },

    #[error("element '{element}' is not nillable")]
    NotNillable { element: String },

    #[error("'{field}' is not a field of '{element}'")]
    UnknownField { field: String, element: String },

    #[error("element '{element}' expects {expected}, found {found}")]
    TypeMismatch {
        element: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("element '{element}' may occur at most {max} times, found {found}")]
    TooManyOccurrences {
        element: String,
        max: u32,
        found: usize,
    },

    #[error("expected element '{expected}', found '{found}'")]
    UnexpectedElement { expected: String, found: String },

    #[error("element '{element}': {source}")]
    Coercion {
        element: String,
        #[source]
        source: CoercionError,
    },
}

/// A decoded non-fault envelope.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub body: Value,
    /// Header entries keyed by element local name, when the envelope had a header.
    pub header: Option<Value>,
    pub version: SoapVersion,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Decoded {
    Message(Message),
    Fault(Fault),
}

/// One element declaration as seen by the codec: a body slot, a complex type field
/// or a header part.
#[derive(Debug, Clone)]
struct Particle<'s> {
    key: &'s str,
    part: Option<&'s str>,
    name: Cow<'s, QualifiedName>,
    type_ref: TypeRef,
    min_occurs: u32,
    max_occurs: MaxOccurs,
    nillable: bool,
}

impl<'s> From<&'s Slot> for Particle<'s> {
    fn from(slot: &'s Slot) -> Self {
        Self {
            key: &slot.key,
            part: slot.part.as_deref(),
            name: Cow::Borrowed(&slot.element),
            type_ref: slot.type_ref,
            min_occurs: slot.min_occurs,
            max_occurs: slot.max_occurs,
            nillable: slot.nillable,
        }
    }
}

impl<'s> From<&'s FieldDecl> for Particle<'s> {
    fn from(field: &'s FieldDecl) -> Self {
        Self {
            key: &field.name.local,
            part: None,
            name: Cow::Borrowed(&field.name),
            type_ref: field.type_ref,
            min_occurs: field.min_occurs,
            max_occurs: field.max_occurs,
            nillable: field.nillable,
        }
    }
}

impl<'s> Particle<'s> {
    fn header(header: &'s HeaderDescriptor, schema: &Schema) -> Self {
        let part = &header.part;
        let (key, name, nillable) = match part.element_name() {
            Some(name) => (
                name.local.as_str(),
                Cow::Borrowed(name),
                schema.element(name).is_some_and(|decl| decl.nillable),
            ),
            None => (
                part.name.as_str(),
                Cow::Owned(QualifiedName::unqualified(&part.name)),
                false,
            ),
        };
        Self {
            key,
            part: Some(&part.name),
            name,
            type_ref: part.type_ref,
            min_occurs: 0,
            max_occurs: MaxOccurs::Bounded(1),
            nillable,
        }
    }

    fn accepts(&self, key: &str) -> bool {
        self.key == key || self.part == Some(key)
    }

    fn lookup<'v>(&self, record: &'v Record) -> &'v Value {
        record
            .iter()
            .find_map(|(key, value)| self.accepts(key).then_some(value))
            .unwrap_or(&ABSENT)
    }

    fn label(&self) -> String {
        self.name.local.clone()
    }

    fn element<'v>(&self) -> Element<'v> {
        Element::new(self.name.local.clone()).set_namespace_optional(self.name.namespace.clone())
    }

    fn nil<'v>(&self) -> Element<'v> {
        self.element().add_attribute(nil_attribute())
    }

    fn type_mismatch(&self, expected: &'static str, found: &Value) -> CodecError {
        CodecError::TypeMismatch {
            element: self.label(),
            expected,
            found: found.kind(),
        }
    }
}

fn particles(schema: &Schema, type_ref: TypeRef) -> Option<(Vec<Particle<'_>>, bool)> {
    match type_ref {
        TypeRef::Complex(id) => Some((
            schema.fields(id).into_iter().map(Particle::from).collect(),
            schema.is_open(id),
        )),
        TypeRef::Scalar(_) | TypeRef::Any => None,
    }
}

struct Writer<'s> {
    schema: &'s Schema,
}

impl Writer<'_> {
    /// All occurrences of one particle for `value`, honouring occurrence bounds and
    /// nillability. `Absent` is omitted when the particle is optional.
    fn occurrences<'v>(
        &self,
        particle: &Particle<'_>,
        value: &'v Value,
    ) -> Result<Vec<Element<'v>>, CodecError> {
        match value {
            Value::Absent if particle.min_occurs == 0 => Ok(Vec::new()),
            Value::Absent | Value::Nil if particle.nillable => Ok(vec![particle.nil()]),
            Value::Absent => Err(CodecError::MissingValue {
                element: particle.label(),
            }),
            Value::Nil if particle.min_occurs == 0 => Ok(Vec::new()),
            Value::Nil => Err(CodecError::NotNillable {
                element: particle.label(),
            }),
            Value::List(items) => {
                if !particle.max_occurs.is_repeated() {
                    return Err(particle.type_mismatch("a single value", value));
                }
                match particle.max_occurs {
                    MaxOccurs::Bounded(max) if items.len() > max as usize => {
                        return Err(CodecError::TooManyOccurrences {
                            element: particle.label(),
                            max,
                            found: items.len(),
                        });
                    }
                    _ => {}
                }

                let mut elements = Vec::with_capacity(items.len());
                for item in items {
                    match item {
                        Value::Absent => {}
                        Value::Nil if particle.nillable => elements.push(particle.nil()),
                        Value::Nil => {
                            return Err(CodecError::NotNillable {
                                element: particle.label(),
                            });
                        }
                        item => elements.push(self.typed(particle, item)?),
                    }
                }
                Ok(elements)
            }
            single => Ok(vec![self.typed(particle, single)?]),
        }
    }

    fn typed<'v>(&self, particle: &Particle<'_>, value: &'v Value) -> Result<Element<'v>, CodecError> {
        let element = particle.element();
        match (particle.type_ref, value) {
            (TypeRef::Scalar(scalar), Value::Primitive(primitive)) => {
                let text = coerce::encode(scalar, primitive).map_err(|source| {
                    CodecError::Coercion {
                        element: particle.label(),
                        source,
                    }
                })?;
                Ok(element.set_text(text))
            }
            (TypeRef::Complex(_), Value::Record(record)) => {
                let (fields, open) = particles(self.schema, particle.type_ref).unwrap_or_default();
                Ok(element.add_children(self.children(&fields, record, open, &particle.name.local)?))
            }
            (TypeRef::Any, Value::Primitive(primitive)) => Ok(element.set_text(primitive.to_string())),
            (TypeRef::Any, Value::Record(record)) => Ok(element.add_children(
                record
                    .iter()
                    .flat_map(|(key, value)| encode_generic(key, value)),
            )),
            (TypeRef::Scalar(_), other) => Err(particle.type_mismatch("a scalar", other)),
            (TypeRef::Complex(_) | TypeRef::Any, other) => {
                Err(particle.type_mismatch("a record", other))
            }
        }
    }

    /// Child elements of a complex value in declaration order. Keys matching no
    /// particle are written generically when the content model is open.
    fn children<'v>(
        &self,
        particles: &[Particle<'_>],
        record: &'v Record,
        open: bool,
        owner: &str,
    ) -> Result<Vec<Element<'v>>, CodecError> {
        let mut children = Vec::new();
        for particle in particles {
            children.extend(self.occurrences(particle, particle.lookup(record))?);
        }

        for (key, value) in record.iter() {
            if particles.iter().any(|particle| particle.accepts(key)) {
                continue;
            }
            if !open {
                return Err(CodecError::UnknownField {
                    field: key.to_owned(),
                    element: owner.to_owned(),
                });
            }
            children.extend(encode_generic(key, value));
        }
        Ok(children)
    }

    fn header<'v>(
        &self,
        headers: &[HeaderDescriptor],
        value: &'v Value,
    ) -> Result<Option<Vec<Element<'v>>>, CodecError> {
        let record = match value {
            Value::Absent => return Ok(None),
            Value::Record(record) => record,
            other => {
                return Err(CodecError::TypeMismatch {
                    element: "Header".to_owned(),
                    expected: "a record",
                    found: other.kind(),
                });
            }
        };

        let declared: Vec<Particle<'_>> = headers
            .iter()
            .map(|header| Particle::header(header, self.schema))
            .collect();
        let mut elements = Vec::new();
        for (key, value) in record.iter() {
            match declared.iter().find(|particle| particle.accepts(key)) {
                Some(particle) => elements.extend(self.occurrences(particle, value)?),
                None => elements.extend(encode_generic(key, value)),
            }
        }
        Ok((!elements.is_empty()).then_some(elements))
    }
}

fn headers(operation: &OperationDescriptor, direction: Direction) -> &[HeaderDescriptor] {
    match direction {
        Direction::Input => &operation.input_headers,
        Direction::Output => &operation.output_headers,
    }
}

fn layout(operation: &OperationDescriptor, direction: Direction) -> Result<&BodyLayout, CodecError> {
    operation
        .rule
        .layout(direction)
        .ok_or_else(|| CodecError::NoOutput {
            operation: operation.name.clone(),
        })
}

/// Builds the envelope for one direction of `operation`.
///
/// `args` is a record keyed by slot (part or field) names. Unwrapped
/// document-literal operations with a single part also take the bare part value.
/// `header` entries are written as direct `Header` children, typed when the binding
/// declares a header part of that name.
#[instrument(skip_all, fields(operation = %operation.name, ?direction))]
pub fn encode<'a>(
    operation: &'a OperationDescriptor,
    direction: Direction,
    args: &'a Value,
    header: Option<&'a Value>,
) -> Result<Element<'a>, CodecError> {
    let layout = layout(operation, direction)?;
    let writer = Writer {
        schema: &operation.schema,
    };
    let owner = layout
        .wrapper
        .as_ref()
        .map_or(operation.name.as_str(), |wrapper| wrapper.local.as_str());

    let slots: Vec<Particle<'_>> = layout.slots.iter().map(Particle::from).collect();
    let children = match (args, slots.as_slice()) {
        (Value::Record(record), _) => writer.children(&slots, record, layout.open, owner)?,
        (Value::Absent, []) => Vec::new(),
        (value, [slot]) if layout.wrapper.is_none() => writer.occurrences(slot, value)?,
        (value, _) => {
            return Err(CodecError::TypeMismatch {
                element: owner.to_owned(),
                expected: "a record",
                found: value.kind(),
            });
        }
    };

    let body = match &layout.wrapper {
        Some(wrapper) => vec![
            Element::new(wrapper.local.as_str())
                .set_namespace_optional(wrapper.namespace())
                .add_children(children),
        ],
        None => children,
    };
    let header = match header {
        Some(value) => writer.header(headers(operation, direction), value)?,
        None => None,
    };

    debug!(style = %operation.rule.style, "encoded envelope");
    Ok(envelope(
        operation.soap_version,
        Some(operation.schema.prefixes()),
        header,
        body,
    ))
}

/// [`encode`] followed by serialization.
pub fn encode_to_string(
    operation: &OperationDescriptor,
    direction: Direction,
    args: &Value,
    header: Option<&Value>,
    declaration: bool,
) -> Result<String, CodecError> {
    let element = encode(operation, direction, args, header)?;
    Ok(to_xml(element, declaration)?)
}

/// Parses `xml` and decodes it as one direction of `operation`.
pub fn decode(
    operation: &OperationDescriptor,
    direction: Direction,
    xml: &str,
) -> Result<Decoded, CodecError> {
    let document = parse(xml).map_err(XmlError::from)?;
    let parsed = ParsedEnvelope::from_node(document.root_element())?;
    decode_parsed(operation, direction, &parsed)
}

/// Decodes an already parsed envelope.
///
/// Wrapped and rpc bodies decode to a record of the wrapper's children. An unwrapped
/// document-literal output with a single part decodes to the bare part value.
/// Elements the layout does not declare are skipped unless the content model is open.
#[instrument(skip_all, fields(operation = %operation.name, ?direction))]
pub fn decode_parsed(
    operation: &OperationDescriptor,
    direction: Direction,
    parsed: &ParsedEnvelope<'_>,
) -> Result<Decoded, CodecError> {
    let first = parsed.first_body_element();
    if let Some(fault) = first.filter(|node| parsed.is_fault(*node)) {
        return Ok(Decoded::Fault(read_fault(fault, parsed.version)?));
    }
    if parsed.version != operation.soap_version {
        debug!(
            envelope = ?parsed.version,
            binding = ?operation.soap_version,
            "envelope version differs from the binding"
        );
    }

    let layout = layout(operation, direction)?;
    let reader = Reader {
        schema: &operation.schema,
    };

    let content = match &layout.wrapper {
        Some(wrapper) => match first {
            Some(node) if node.tag_name().name() == wrapper.local => node,
            other => {
                return Err(CodecError::UnexpectedElement {
                    expected: wrapper.local.clone(),
                    found: other.map_or_else(
                        || "an empty body".to_owned(),
                        |node| node.tag_name().name().to_owned(),
                    ),
                });
            }
        },
        None => parsed.body,
    };

    let slots: Vec<Particle<'_>> = layout.slots.iter().map(Particle::from).collect();
    let mut record = reader.children(content, &slots, layout.open)?;

    let body = match (direction, operation.rule.style, slots.as_slice()) {
        (Direction::Output, BindingStyle::DocumentLiteral, [slot]) => {
            record.remove(slot.key).unwrap_or_default()
        }
        _ => Value::Record(record),
    };

    let header = parsed
        .header
        .map(|node| reader.header(headers(operation, direction), node))
        .transpose()?;

    Ok(Decoded::Message(Message {
        body,
        header,
        version: parsed.version,
    }))
}

struct Reader<'s> {
    schema: &'s Schema,
}

impl Reader<'_> {
    fn typed(&self, particle: &Particle<'_>, node: Node<'_, '_>) -> Result<Value, CodecError> {
        if is_nil(node) {
            return Ok(Value::Nil);
        }
        match particle.type_ref {
            TypeRef::Scalar(scalar) => coerce::decode(scalar, &text_content(node))
                .map(Value::Primitive)
                .map_err(|source| CodecError::Coercion {
                    element: particle.label(),
                    source,
                }),
            TypeRef::Complex(_) => {
                let (fields, open) = particles(self.schema, particle.type_ref).unwrap_or_default();
                Ok(Value::Record(self.children(node, &fields, open)?))
            }
            TypeRef::Any => Ok(decode_generic(node)),
        }
    }

    /// Matches the element children of `parent` to `particles` by local name.
    /// Missing particles decode to `Absent`, repeated ones to a `List`.
    fn children(
        &self,
        parent: Node<'_, '_>,
        particles: &[Particle<'_>],
        open: bool,
    ) -> Result<Record, CodecError> {
        let mut found: Vec<Vec<Value>> = particles.iter().map(|_| Vec::new()).collect();
        let mut extra = Record::new();

        for child in element_children(parent) {
            let local = child.tag_name().name();
            match particles.iter().position(|particle| particle.name.local == local) {
                Some(index) => found[index].push(self.typed(&particles[index], child)?),
                None if open => push_repeated(&mut extra, local, decode_generic(child)),
                None => warn!(
                    element = local,
                    parent = parent.tag_name().name(),
                    "skipping undeclared element"
                ),
            }
        }

        let mut record = Record::new();
        for (particle, mut values) in particles.iter().zip(found) {
            let value = match (particle.max_occurs, values.len()) {
                (_, 0) => Value::Absent,
                (MaxOccurs::Bounded(max), count) if count > max as usize => {
                    return Err(CodecError::TooManyOccurrences {
                        element: particle.label(),
                        max,
                        found: count,
                    });
                }
                (max, _) if max.is_repeated() => Value::List(values),
                _ => values.pop().unwrap_or_default(),
            };
            record.insert(particle.key, value);
        }
        for (key, value) in extra {
            record.insert(key, value);
        }
        Ok(record)
    }

    fn header(&self, headers: &[HeaderDescriptor], node: Node<'_, '_>) -> Result<Value, CodecError> {
        let declared: Vec<Particle<'_>> = headers
            .iter()
            .map(|header| Particle::header(header, self.schema))
            .collect();

        let mut record = Record::new();
        for child in element_children(node) {
            let local = child.tag_name().name();
            let value = match declared.iter().find(|particle| particle.name.local == local) {
                Some(particle) => self.typed(particle, child)?,
                None => decode_generic(child),
            };
            push_repeated(&mut record, local, value);
        }
        Ok(Value::Record(record))
    }
}
