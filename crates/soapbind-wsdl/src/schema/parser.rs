use std::collections::HashMap;

use soapbind_xml::parser::{Node, element_children};
use tracing::{debug, instrument};

use super::{ComplexType, ComplexTypeId, ElementDecl, FieldDecl, MaxOccurs, Schema, ScalarType, TypeRef};
use crate::{
    ContractError,
    names::{PrefixTable, QualifiedName, SOAP_ENCODING_NS, XSD_NS},
};

const MAX_SIMPLE_DEPTH: usize = 16;

/// Per-`<xsd:schema>` settings that govern how names declared inside it are qualified.
#[derive(Debug, Clone)]
struct SchemaContext {
    target_namespace: Option<String>,
    qualified_elements: bool,
}

impl SchemaContext {
    fn from_node(node: Node<'_, '_>, fallback_namespace: Option<&str>) -> Self {
        Self {
            target_namespace: node
                .attribute("targetNamespace")
                .or(fallback_namespace)
                .map(str::to_owned),
            qualified_elements: node.attribute("elementFormDefault") == Some("qualified"),
        }
    }

    fn global_name(&self, local: &str) -> QualifiedName {
        QualifiedName::new(self.target_namespace.as_deref(), local)
    }
}

struct PendingElement<'a> {
    node: Node<'a, 'a>,
    context: SchemaContext,
    inline_type: Option<ComplexTypeId>,
}

struct PendingComplex<'a> {
    node: Node<'a, 'a>,
    context: SchemaContext,
    id: ComplexTypeId,
}

/// Builds a [`Schema`] from the `<xsd:schema>` children of `<wsdl:types>`.
///
/// Declarations are collected first and bodies parsed afterwards, so references may
/// point forward and complex types may be recursive.
pub(crate) struct SchemaParser {
    schema: Schema,
}

fn is_xsd(node: Node<'_, '_>, local: &str) -> bool {
    node.tag_name().namespace() == Some(XSD_NS) && node.tag_name().name() == local
}

fn required_attribute<'a>(
    node: Node<'a, '_>,
    element: &'static str,
    attribute: &'static str,
) -> Result<&'a str, ContractError> {
    node.attribute(attribute)
        .ok_or(ContractError::MissingAttribute { element, attribute })
}

impl SchemaParser {
    pub(crate) fn new(prefixes: PrefixTable) -> Self {
        Self {
            schema: Schema {
                prefixes,
                ..Schema::default()
            },
        }
    }

    #[instrument(skip_all, fields(schemas = schema_nodes.len()))]
    pub(crate) fn parse<'a>(
        mut self,
        schema_nodes: &[Node<'a, 'a>],
        fallback_namespace: Option<&str>,
    ) -> Result<Schema, ContractError> {
        let mut pending_elements = Vec::new();
        let mut pending_complex = Vec::new();
        let mut pending_simple = HashMap::new();

        for schema_node in schema_nodes {
            let context = SchemaContext::from_node(*schema_node, fallback_namespace);

            for child in element_children(*schema_node) {
                let tag = child.tag_name();
                if tag.namespace() != Some(XSD_NS) {
                    continue;
                }

                match tag.name() {
                    "complexType" => {
                        let name = required_attribute(child, "complexType", "name")?;
                        let qname = context.global_name(name);
                        let id = self.allocate(Some(qname.clone()));
                        if self.schema.named_complex.insert(qname, id).is_some() {
                            return Err(ContractError::Duplicate {
                                kind: "complex type",
                                name: name.to_owned(),
                            });
                        }
                        pending_complex.push(PendingComplex {
                            node: child,
                            context: context.clone(),
                            id,
                        });
                    }
                    "simpleType" => {
                        let name = required_attribute(child, "simpleType", "name")?;
                        pending_simple.insert(context.global_name(name), child);
                    }
                    "element" => {
                        let inline_type =
                            match element_children(child).find(|c| is_xsd(*c, "complexType")) {
                                Some(complex) => {
                                    let id = self.allocate(None);
                                    pending_complex.push(PendingComplex {
                                        node: complex,
                                        context: context.clone(),
                                        id,
                                    });
                                    Some(id)
                                }
                                None => None,
                            };
                        pending_elements.push(PendingElement {
                            node: child,
                            context: context.clone(),
                            inline_type,
                        });
                    }
                    "import" | "include" | "redefine" => {
                        debug!(
                            kind = tag.name(),
                            location = child.attribute("schemaLocation"),
                            "skipping external schema reference"
                        );
                    }
                    _ => {}
                }
            }
        }

        let names: Vec<_> = pending_simple.keys().cloned().collect();
        for name in names {
            self.resolve_named_simple(&name, &pending_simple, 0)?;
        }

        for pending in &pending_elements {
            let decl = self.element_decl(pending)?;
            let local = decl.name.local.clone();
            if self.schema.elements.insert(decl.name.clone(), decl).is_some() {
                return Err(ContractError::Duplicate {
                    kind: "element",
                    name: local,
                });
            }
        }

        for pending in pending_complex {
            let mut body = self.complex_body(pending.node, &pending.context)?;
            let slot = &mut self.schema.complex_types[pending.id.0];
            body.name = slot.name.take();
            *slot = body;
        }

        debug!(
            elements = self.schema.elements.len(),
            complex_types = self.schema.complex_types.len(),
            simple_types = self.schema.simple_types.len(),
            "schema parsed"
        );

        Ok(self.schema)
    }

    fn allocate(&mut self, name: Option<QualifiedName>) -> ComplexTypeId {
        let id = ComplexTypeId(self.schema.complex_types.len());
        self.schema.complex_types.push(ComplexType {
            name,
            ..ComplexType::default()
        });
        id
    }

    fn resolve_named_simple(
        &mut self,
        name: &QualifiedName,
        pending: &HashMap<QualifiedName, Node<'_, '_>>,
        depth: usize,
    ) -> Result<ScalarType, ContractError> {
        if let Some(scalar) = self.schema.simple_types.get(name) {
            return Ok(*scalar);
        }
        let Some(node) = pending.get(name) else {
            return Err(ContractError::UnresolvedType {
                type_name: name.to_string(),
                context: "simple type restriction".to_owned(),
            });
        };
        if depth > MAX_SIMPLE_DEPTH {
            return Err(ContractError::UnresolvedType {
                type_name: name.to_string(),
                context: "cyclic simple type restriction".to_owned(),
            });
        }

        let scalar = match element_children(*node).find(|c| is_xsd(*c, "restriction")) {
            Some(restriction) => {
                let base = required_attribute(restriction, "restriction", "base")?;
                let base_name = QualifiedName::resolve(restriction, base, None)?;
                match builtin(&base_name) {
                    Some(TypeRef::Scalar(scalar)) => scalar,
                    Some(_) => ScalarType::String,
                    None => self.resolve_named_simple(&base_name, pending, depth + 1)?,
                }
            }
            // list and union values travel as their lexical string
            None => ScalarType::String,
        };

        self.schema.simple_types.insert(name.clone(), scalar);
        Ok(scalar)
    }

    fn inline_simple(&self, node: Node<'_, '_>, context: &str) -> Result<ScalarType, ContractError> {
        let Some(restriction) = element_children(node).find(|c| is_xsd(*c, "restriction")) else {
            return Ok(ScalarType::String);
        };
        let base = required_attribute(restriction, "restriction", "base")?;
        match self.type_reference(restriction, base, context)? {
            TypeRef::Scalar(scalar) => Ok(scalar),
            _ => Ok(ScalarType::String),
        }
    }

    fn type_reference(
        &self,
        node: Node<'_, '_>,
        reference: &str,
        context: &str,
    ) -> Result<TypeRef, ContractError> {
        let name = QualifiedName::resolve(node, reference, None)?;

        if let Some(type_ref) = builtin(&name) {
            return Ok(type_ref);
        }
        if let Some(id) = self.schema.complex_type_named(&name) {
            return Ok(TypeRef::Complex(id));
        }
        if let Some(scalar) = self.schema.simple_type_named(&name) {
            return Ok(TypeRef::Scalar(scalar));
        }

        Err(ContractError::UnresolvedType {
            type_name: reference.to_owned(),
            context: context.to_owned(),
        })
    }

    fn element_decl(&self, pending: &PendingElement<'_>) -> Result<ElementDecl, ContractError> {
        let node = pending.node;
        let name = required_attribute(node, "element", "name")?;
        let context = format!("element '{name}'");

        let type_ref = if let Some(id) = pending.inline_type {
            TypeRef::Complex(id)
        } else if let Some(reference) = node.attribute("type") {
            self.type_reference(node, reference, &context)?
        } else if let Some(simple) = element_children(node).find(|c| is_xsd(*c, "simpleType")) {
            TypeRef::Scalar(self.inline_simple(simple, &context)?)
        } else {
            TypeRef::Any
        };

        Ok(ElementDecl {
            name: pending.context.global_name(name),
            type_ref,
            nillable: node.attribute("nillable") == Some("true"),
        })
    }

    fn complex_body(
        &mut self,
        node: Node<'_, '_>,
        context: &SchemaContext,
    ) -> Result<ComplexType, ContractError> {
        let mut body = ComplexType::default();

        for child in element_children(node) {
            if child.tag_name().namespace() != Some(XSD_NS) {
                continue;
            }
            match child.tag_name().name() {
                "sequence" | "all" | "choice" => {
                    self.particles(child, context, &mut body)?;
                }
                "complexContent" => {
                    let Some(derivation) = element_children(child)
                        .find(|c| is_xsd(*c, "extension") || is_xsd(*c, "restriction"))
                    else {
                        continue;
                    };
                    let base = required_attribute(derivation, "extension", "base")?;
                    match self.type_reference(derivation, base, "complexContent base")? {
                        TypeRef::Complex(id) => body.base = Some(id),
                        TypeRef::Any => {}
                        TypeRef::Scalar(_) => body.open = true,
                    }
                    for particle in element_children(derivation) {
                        if is_xsd(particle, "sequence")
                            || is_xsd(particle, "all")
                            || is_xsd(particle, "choice")
                        {
                            self.particles(particle, context, &mut body)?;
                        } else if is_xsd(particle, "group") {
                            body.open = true;
                        }
                    }
                }
                "simpleContent" | "group" => body.open = true,
                _ => {}
            }
        }

        Ok(body)
    }

    fn particles(
        &mut self,
        node: Node<'_, '_>,
        context: &SchemaContext,
        body: &mut ComplexType,
    ) -> Result<(), ContractError> {
        for child in element_children(node) {
            if child.tag_name().namespace() != Some(XSD_NS) {
                continue;
            }
            match child.tag_name().name() {
                "element" => {
                    let field = self.field(child, context)?;
                    body.fields.push(field);
                }
                "sequence" | "all" | "choice" => self.particles(child, context, body)?,
                "any" | "group" => {
                    debug!(kind = child.tag_name().name(), "open content model");
                    body.open = true;
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn field(&mut self, node: Node<'_, '_>, context: &SchemaContext) -> Result<FieldDecl, ContractError> {
        let min_occurs = occurs(node, "minOccurs")?.unwrap_or(1);
        let max_occurs = match node.attribute("maxOccurs") {
            Some("unbounded") => MaxOccurs::Unbounded,
            Some(_) => MaxOccurs::Bounded(occurs(node, "maxOccurs")?.unwrap_or(1)),
            None => MaxOccurs::Bounded(1),
        };
        let nillable = node.attribute("nillable") == Some("true");

        if let Some(reference) = node.attribute("ref") {
            let name = QualifiedName::resolve(node, reference, None)?;
            let decl = self.schema.element(&name).ok_or_else(|| ContractError::UndefinedElement {
                element: reference.to_owned(),
                context: "element ref".to_owned(),
            })?;
            return Ok(FieldDecl {
                name: decl.name.clone(),
                type_ref: decl.type_ref,
                min_occurs,
                max_occurs,
                nillable: nillable || decl.nillable,
            });
        }

        let name = required_attribute(node, "element", "name")?;
        let qualified = match node.attribute("form") {
            Some("qualified") => true,
            Some(_) => false,
            None => context.qualified_elements,
        };
        let namespace = if qualified {
            context.target_namespace.as_deref()
        } else {
            None
        };
        let description = format!("element '{name}'");

        let type_ref = if let Some(reference) = node.attribute("type") {
            self.type_reference(node, reference, &description)?
        } else if let Some(complex) = element_children(node).find(|c| is_xsd(*c, "complexType")) {
            let id = self.allocate(None);
            let body = self.complex_body(complex, context)?;
            self.schema.complex_types[id.0] = body;
            TypeRef::Complex(id)
        } else if let Some(simple) = element_children(node).find(|c| is_xsd(*c, "simpleType")) {
            TypeRef::Scalar(self.inline_simple(simple, &description)?)
        } else {
            TypeRef::Any
        };

        Ok(FieldDecl {
            name: QualifiedName::new(namespace, name),
            type_ref,
            min_occurs,
            max_occurs,
            nillable,
        })
    }
}

/// Built-in types of XML Schema and SOAP encoding.
pub(super) fn builtin(name: &QualifiedName) -> Option<TypeRef> {
    match name.namespace() {
        Some(XSD_NS | SOAP_ENCODING_NS) => match name.local.as_str() {
            "anyType" | "anySimpleType" => Some(TypeRef::Any),
            local => ScalarType::from_xsd(local).map(TypeRef::Scalar),
        },
        _ => None,
    }
}

fn occurs(node: Node<'_, '_>, attribute: &'static str) -> Result<Option<u32>, ContractError> {
    node.attribute(attribute)
        .map(|value| {
            value
                .trim()
                .parse::<u32>()
                .map_err(|_| ContractError::InvalidAttribute {
                    element: "element",
                    attribute,
                    value: value.to_owned(),
                })
        })
        .transpose()
}
