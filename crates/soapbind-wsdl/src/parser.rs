use std::{
    collections::{BTreeMap, BTreeSet, HashMap, HashSet},
    sync::Arc,
};

use soapbind_xml::parser::{Document, Node, element_children, text_content};
use tracing::{debug, info, instrument, warn};

use crate::{
    ContractError,
    descriptor::{
        BindingDescriptor, ContractDescriptor, DeclaredStyle, HeaderDescriptor, MessageDescriptor,
        OperationDescriptor, PartDescriptor, PartReference, PortDescriptor, ServiceDescriptor,
        SoapVersion,
    },
    names::{
        PrefixTable, QualifiedName, SOAP11_BINDING_NS, SOAP12_BINDING_NS, SOAP12_HTTP_TRANSPORT,
        SOAP_HTTP_TRANSPORT, WSDL_NS, XSD_NS,
    },
    schema::{Schema, SchemaParser},
    style::{self, BodyBinding, ResolveInput},
};

fn is_wsdl(node: Node<'_, '_>, local: &str) -> bool {
    node.tag_name().namespace() == Some(WSDL_NS) && node.tag_name().name() == local
}

/// Finds a `soap:` or `soap12:` extension child called `local`.
fn soap_extension<'a>(node: Node<'a, 'a>, local: &str) -> Option<(Node<'a, 'a>, SoapVersion)> {
    element_children(node).find_map(|child| {
        if child.tag_name().name() != local {
            return None;
        }
        match child.tag_name().namespace() {
            Some(SOAP11_BINDING_NS) => Some((child, SoapVersion::V11)),
            Some(SOAP12_BINDING_NS) => Some((child, SoapVersion::V12)),
            _ => None,
        }
    })
}

fn name_attribute<'a>(node: Node<'a, '_>, element: &'static str) -> Result<&'a str, ContractError> {
    node.attribute("name").ok_or(ContractError::MissingAttribute {
        element,
        attribute: "name",
    })
}

/// The local part of a `prefix:local` reference. Top-level WSDL components are
/// looked up by local name; the prefix is still checked to be declared.
fn reference_local<'r>(node: Node<'_, '_>, reference: &'r str) -> Result<&'r str, ContractError> {
    match reference.split_once(':') {
        Some((prefix, local)) => {
            let Some(namespace) = node.lookup_namespace_uri(Some(prefix)) else {
                return Err(ContractError::UnresolvedPrefix {
                    prefix: prefix.to_owned(),
                    reference: reference.to_owned(),
                });
            };
            let target = node.document().root_element().attribute("targetNamespace");
            if target.is_some_and(|target| target != namespace) {
                warn!(
                    reference,
                    namespace,
                    target_namespace = ?target,
                    "reference outside the target namespace, resolving by local name"
                );
            }
            Ok(local)
        }
        None => Ok(reference),
    }
}

fn collect_prefixes(document: &Document<'_>) -> PrefixTable {
    let mut prefixes = PrefixTable::default();
    for node in document.descendants().filter(Node::is_element) {
        for namespace in node.namespaces() {
            if let Some(prefix) = namespace.name() {
                prefixes.declare(prefix, namespace.uri());
            }
        }
    }
    prefixes
}

fn index_by_name<'a>(
    nodes: impl Iterator<Item = Node<'a, 'a>>,
    kind: &'static str,
) -> Result<HashMap<&'a str, Node<'a, 'a>>, ContractError> {
    let mut index = HashMap::new();
    for node in nodes {
        let name = name_attribute(node, kind)?;
        if index.insert(name, node).is_some() {
            return Err(ContractError::Duplicate {
                kind,
                name: name.to_owned(),
            });
        }
    }
    Ok(index)
}

struct PendingOperation {
    name: String,
    soap_action: Option<String>,
    style: DeclaredStyle,
    input: MessageDescriptor,
    output: Option<MessageDescriptor>,
    input_body: BodyBinding,
    output_body: BodyBinding,
    input_headers: Vec<HeaderDescriptor>,
    output_headers: Vec<HeaderDescriptor>,
    faults: Vec<String>,
    documentation: Option<String>,
}

struct PendingBinding {
    name: String,
    port_type: String,
    style: DeclaredStyle,
    transport: String,
    soap_version: SoapVersion,
    operations: Vec<PendingOperation>,
}

impl PendingBinding {
    fn body_namespaces(&self) -> impl Iterator<Item = &str> {
        self.operations.iter().flat_map(|op| {
            op.input_body
                .namespace
                .as_deref()
                .into_iter()
                .chain(op.output_body.namespace.as_deref())
        })
    }

    fn finish(self, schema: &Arc<Schema>, target_namespace: Option<&str>) -> BindingDescriptor {
        let operations = self
            .operations
            .into_iter()
            .map(|op| {
                let rule = style::resolve(
                    &ResolveInput {
                        operation: &op.name,
                        declared: op.style,
                        input: &op.input,
                        output: op.output.as_ref(),
                        input_body: &op.input_body,
                        output_body: &op.output_body,
                        target_namespace,
                    },
                    schema,
                );
                debug!(binding = %self.name, operation = %op.name, style = %rule.style, "operation resolved");

                Arc::new(OperationDescriptor {
                    name: op.name,
                    soap_action: op.soap_action,
                    soap_version: self.soap_version,
                    input: op.input,
                    output: op.output,
                    input_headers: op.input_headers,
                    output_headers: op.output_headers,
                    faults: op.faults,
                    documentation: op.documentation,
                    rule,
                    schema: Arc::clone(schema),
                })
            })
            .collect();

        BindingDescriptor {
            name: self.name,
            port_type: self.port_type,
            style: self.style,
            transport: self.transport,
            soap_version: self.soap_version,
            operations,
        }
    }
}

/// Top-level components of one `wsdl:definitions`, indexed by name.
struct Definitions<'a> {
    root: Node<'a, 'a>,
    target_namespace: Option<&'a str>,
    messages: HashMap<&'a str, Node<'a, 'a>>,
    port_types: HashMap<&'a str, Node<'a, 'a>>,
    bindings: Vec<Node<'a, 'a>>,
    services: Vec<Node<'a, 'a>>,
    schemas: Vec<Node<'a, 'a>>,
}

impl<'a> Definitions<'a> {
    fn index(root: Node<'a, 'a>) -> Result<Self, ContractError> {
        let target_namespace = root.attribute("targetNamespace");

        let mut schemas = Vec::new();
        let mut bindings = Vec::new();
        let mut services = Vec::new();
        for child in element_children(root) {
            if child.tag_name().namespace() != Some(WSDL_NS) {
                continue;
            }
            match child.tag_name().name() {
                "types" => schemas.extend(element_children(child).filter(|schema| {
                    schema.tag_name().namespace() == Some(XSD_NS)
                        && schema.tag_name().name() == "schema"
                })),
                "binding" => bindings.push(child),
                "service" => services.push(child),
                "import" => warn!(
                    namespace = child.attribute("namespace"),
                    location = child.attribute("location"),
                    "wsdl:import is not followed"
                ),
                _ => {}
            }
        }

        Ok(Self {
            root,
            target_namespace,
            messages: index_by_name(
                element_children(root).filter(|c| is_wsdl(*c, "message")),
                "message",
            )?,
            port_types: index_by_name(
                element_children(root).filter(|c| is_wsdl(*c, "portType")),
                "portType",
            )?,
            bindings,
            services,
            schemas,
        })
    }

    fn messages(&self, schema: &Schema) -> Result<HashMap<String, MessageDescriptor>, ContractError> {
        self.messages
            .iter()
            .map(|(name, node)| {
                let message = self.message(name, *node, schema)?;
                Ok(((*name).to_owned(), message))
            })
            .collect()
    }

    fn message(
        &self,
        name: &str,
        node: Node<'a, 'a>,
        schema: &Schema,
    ) -> Result<MessageDescriptor, ContractError> {
        let mut parts = Vec::new();
        for part in element_children(node).filter(|c| is_wsdl(*c, "part")) {
            let part_name = name_attribute(part, "part")?;
            let context = format!("part '{part_name}' of message '{name}'");

            let (reference, type_ref) = if let Some(element) = part.attribute("element") {
                let qname = QualifiedName::resolve(part, element, self.target_namespace)?;
                let decl = schema
                    .element(&qname)
                    .ok_or_else(|| ContractError::UndefinedElement {
                        element: element.to_owned(),
                        context: context.clone(),
                    })?;
                (PartReference::Element(decl.name.clone()), decl.type_ref)
            } else if let Some(type_name) = part.attribute("type") {
                let qname = QualifiedName::resolve(part, type_name, self.target_namespace)?;
                let type_ref =
                    schema
                        .resolve_type(&qname)
                        .ok_or_else(|| ContractError::UnresolvedType {
                            type_name: type_name.to_owned(),
                            context: context.clone(),
                        })?;
                (PartReference::Type(qname), type_ref)
            } else {
                return Err(ContractError::PartWithoutType {
                    message: name.to_owned(),
                    part: part_name.to_owned(),
                });
            };

            parts.push(PartDescriptor {
                name: part_name.to_owned(),
                reference,
                type_ref,
            });
        }

        Ok(MessageDescriptor {
            name: name.to_owned(),
            parts,
        })
    }

    fn bindings(
        &self,
        messages: &HashMap<String, MessageDescriptor>,
    ) -> Result<(Vec<PendingBinding>, HashSet<&'a str>), ContractError> {
        let mut pending = Vec::new();
        let mut skipped = HashSet::new();
        let mut seen = HashSet::new();

        for node in &self.bindings {
            let name = name_attribute(*node, "binding")?;
            if !seen.insert(name) {
                return Err(ContractError::Duplicate {
                    kind: "binding",
                    name: name.to_owned(),
                });
            }
            let Some((soap_binding, soap_version)) = soap_extension(*node, "binding") else {
                warn!(binding = name, "skipping binding without a SOAP binding extension");
                skipped.insert(name);
                continue;
            };
            pending.push(self.binding(name, *node, soap_binding, soap_version, messages)?);
        }

        Ok((pending, skipped))
    }

    fn binding(
        &self,
        name: &str,
        node: Node<'a, 'a>,
        soap_binding: Node<'a, 'a>,
        soap_version: SoapVersion,
        messages: &HashMap<String, MessageDescriptor>,
    ) -> Result<PendingBinding, ContractError> {
        let transport = soap_binding
            .attribute("transport")
            .ok_or(ContractError::MissingAttribute {
                element: "soap:binding",
                attribute: "transport",
            })?;
        let normalized = transport.trim_end_matches('/');
        if normalized != SOAP_HTTP_TRANSPORT
            && normalized != SOAP12_HTTP_TRANSPORT.trim_end_matches('/')
        {
            return Err(ContractError::UnsupportedTransport {
                binding: name.to_owned(),
                transport: transport.to_owned(),
            });
        }
        let style = declared_style(soap_binding)?.unwrap_or(DeclaredStyle::Document);

        let type_reference = node.attribute("type").ok_or(ContractError::MissingAttribute {
            element: "binding",
            attribute: "type",
        })?;
        let port_type_name = reference_local(node, type_reference)?;
        let port_type =
            self.port_types
                .get(port_type_name)
                .ok_or_else(|| ContractError::UndefinedPortType {
                    port_type: type_reference.to_owned(),
                    binding: name.to_owned(),
                })?;

        let mut operations = Vec::new();
        for op_node in element_children(node).filter(|c| is_wsdl(*c, "operation")) {
            let op_name = name_attribute(op_node, "operation")?;
            let abstract_op = element_children(*port_type)
                .filter(|c| is_wsdl(*c, "operation"))
                .find(|c| c.attribute("name") == Some(op_name))
                .ok_or_else(|| ContractError::UndefinedOperation {
                    operation: op_name.to_owned(),
                    port_type: port_type_name.to_owned(),
                })?;
            operations.push(self.operation(op_name, op_node, abstract_op, style, messages)?);
        }

        debug!(
            binding = name,
            ?soap_version,
            operations = operations.len(),
            "binding parsed"
        );

        Ok(PendingBinding {
            name: name.to_owned(),
            port_type: port_type_name.to_owned(),
            style,
            transport: transport.to_owned(),
            soap_version,
            operations,
        })
    }

    fn operation(
        &self,
        name: &str,
        binding_op: Node<'a, 'a>,
        abstract_op: Node<'a, 'a>,
        binding_style: DeclaredStyle,
        messages: &HashMap<String, MessageDescriptor>,
    ) -> Result<PendingOperation, ContractError> {
        let soap_operation = soap_extension(binding_op, "operation").map(|(node, _)| node);
        let style = match soap_operation {
            Some(node) => declared_style(node)?.unwrap_or(binding_style),
            None => binding_style,
        };
        let soap_action = soap_operation
            .and_then(|node| node.attribute("soapAction"))
            .filter(|action| !action.is_empty())
            .map(str::to_owned);

        let message_of = |direction: &str| -> Result<Option<MessageDescriptor>, ContractError> {
            let Some(node) = element_children(abstract_op).find(|c| is_wsdl(*c, direction)) else {
                return Ok(None);
            };
            let reference = node.attribute("message").ok_or(ContractError::MissingAttribute {
                element: "operation",
                attribute: "message",
            })?;
            lookup_message(node, reference, messages, name).map(Some)
        };

        let input = message_of("input")?.ok_or_else(|| ContractError::UnsupportedOperation {
            operation: name.to_owned(),
            reason: "no input message",
        })?;
        let output = message_of("output")?;

        let faults = element_children(abstract_op)
            .filter(|c| is_wsdl(*c, "fault"))
            .filter_map(|fault| fault.attribute("name").map(str::to_owned))
            .collect();
        let documentation = element_children(abstract_op)
            .find(|c| is_wsdl(*c, "documentation"))
            .map(text_content)
            .map(|text| text.trim().to_owned())
            .filter(|text| !text.is_empty());

        let (input_body, input_headers) = match element_children(binding_op).find(|c| is_wsdl(*c, "input")) {
            Some(node) => body_binding(node, name, messages)?,
            None => (BodyBinding::default(), Vec::new()),
        };
        let (output_body, output_headers) = match element_children(binding_op).find(|c| is_wsdl(*c, "output")) {
            Some(node) => body_binding(node, name, messages)?,
            None => (BodyBinding::default(), Vec::new()),
        };

        Ok(PendingOperation {
            name: name.to_owned(),
            soap_action,
            style,
            input,
            output,
            input_body,
            output_body,
            input_headers,
            output_headers,
            faults,
            documentation,
        })
    }

    fn services(
        &self,
        bindings: &HashMap<String, Arc<BindingDescriptor>>,
        skipped: &HashSet<&str>,
    ) -> Result<BTreeMap<String, ServiceDescriptor>, ContractError> {
        let mut services = BTreeMap::new();

        for node in &self.services {
            let service_name = name_attribute(*node, "service")?;
            let mut ports = BTreeMap::new();
            let mut address = None;

            for port in element_children(*node).filter(|c| is_wsdl(*c, "port")) {
                let port_name = name_attribute(port, "port")?;
                let reference = port.attribute("binding").ok_or(ContractError::MissingAttribute {
                    element: "port",
                    attribute: "binding",
                })?;
                let binding_name = reference_local(port, reference)?;

                let Some(binding) = bindings.get(binding_name) else {
                    if skipped.contains(binding_name) {
                        debug!(port = port_name, binding = binding_name, "skipping non-SOAP port");
                        continue;
                    }
                    return Err(ContractError::UndefinedBinding {
                        binding: reference.to_owned(),
                        port: port_name.to_owned(),
                    });
                };

                let port_address = soap_extension(port, "address")
                    .and_then(|(node, _)| node.attribute("location"))
                    .map(str::to_owned);
                if address.is_none() {
                    address.clone_from(&port_address);
                }

                let descriptor = PortDescriptor {
                    name: port_name.to_owned(),
                    address: port_address,
                    binding: Arc::clone(binding),
                };
                if ports.insert(port_name.to_owned(), descriptor).is_some() {
                    return Err(ContractError::Duplicate {
                        kind: "port",
                        name: port_name.to_owned(),
                    });
                }
            }

            if ports.is_empty() {
                debug!(service = service_name, "service has no SOAP ports, skipping");
                continue;
            }

            let service = ServiceDescriptor {
                name: service_name.to_owned(),
                address,
                ports,
            };
            if services.insert(service_name.to_owned(), service).is_some() {
                return Err(ContractError::Duplicate {
                    kind: "service",
                    name: service_name.to_owned(),
                });
            }
        }

        Ok(services)
    }
}

fn declared_style(node: Node<'_, '_>) -> Result<Option<DeclaredStyle>, ContractError> {
    match node.attribute("style") {
        None => Ok(None),
        Some("rpc") => Ok(Some(DeclaredStyle::Rpc)),
        Some("document") => Ok(Some(DeclaredStyle::Document)),
        Some(other) => Err(ContractError::InvalidAttribute {
            element: "soap:binding",
            attribute: "style",
            value: other.to_owned(),
        }),
    }
}

fn lookup_message(
    node: Node<'_, '_>,
    reference: &str,
    messages: &HashMap<String, MessageDescriptor>,
    operation: &str,
) -> Result<MessageDescriptor, ContractError> {
    let local = reference_local(node, reference)?;
    messages
        .get(local)
        .cloned()
        .ok_or_else(|| ContractError::UndefinedMessage {
            message: reference.to_owned(),
            context: format!("operation '{operation}'"),
        })
}

fn check_use(node: Node<'_, '_>, operation: &str) -> Result<(), ContractError> {
    match node.attribute("use") {
        Some("encoded") => Err(ContractError::UnsupportedUse {
            operation: operation.to_owned(),
            usage: "encoded".to_owned(),
        }),
        _ => Ok(()),
    }
}

/// Reads `soap:body` and `soap:header` from a binding operation's input or output.
fn body_binding(
    node: Node<'_, '_>,
    operation: &str,
    messages: &HashMap<String, MessageDescriptor>,
) -> Result<(BodyBinding, Vec<HeaderDescriptor>), ContractError> {
    let mut body = BodyBinding::default();
    let mut headers = Vec::new();

    for child in element_children(node) {
        match child.tag_name().namespace() {
            Some(SOAP11_BINDING_NS | SOAP12_BINDING_NS) => {}
            _ => continue,
        }
        match child.tag_name().name() {
            "body" => {
                check_use(child, operation)?;
                body.namespace = child
                    .attribute("namespace")
                    .filter(|ns| !ns.is_empty())
                    .map(str::to_owned);
                body.parts = child
                    .attribute("parts")
                    .map(|parts| parts.split_whitespace().map(str::to_owned).collect());
            }
            "header" => {
                check_use(child, operation)?;
                let reference = child.attribute("message").ok_or(ContractError::MissingAttribute {
                    element: "soap:header",
                    attribute: "message",
                })?;
                let part_name = child.attribute("part").ok_or(ContractError::MissingAttribute {
                    element: "soap:header",
                    attribute: "part",
                })?;
                let message = lookup_message(child, reference, messages, operation)?;
                let part = message
                    .part(part_name)
                    .cloned()
                    .ok_or_else(|| ContractError::UndefinedPart {
                        message: message.name.clone(),
                        part: part_name.to_owned(),
                    })?;
                headers.push(HeaderDescriptor {
                    message: message.name,
                    part,
                });
            }
            _ => {}
        }
    }

    Ok((body, headers))
}

/// Parses and resolves a whole contract.
#[instrument(skip_all, fields(bytes = source.len()))]
pub(crate) fn parse_contract(source: Arc<str>) -> Result<ContractDescriptor, ContractError> {
    let document = soapbind_xml::parser::parse(&source)?;
    let root = document.root_element();
    if !is_wsdl(root, "definitions") {
        return Err(ContractError::NotAWsdlDocument(
            root.tag_name().name().to_owned(),
        ));
    }

    let definitions = Definitions::index(root)?;
    let target_namespace = definitions.target_namespace;

    let mut schema =
        SchemaParser::new(collect_prefixes(&document)).parse(&definitions.schemas, None)?;
    let messages = definitions.messages(&schema)?;
    let (pending, skipped) = definitions.bindings(&messages)?;

    // every namespace the codec may write gets a prefix now, while the schema is
    // still owned; the table is read-only afterwards
    let namespaces: BTreeSet<String> = schema
        .namespaces()
        .chain(target_namespace)
        .chain(pending.iter().flat_map(PendingBinding::body_namespaces))
        .map(str::to_owned)
        .collect();
    for namespace in &namespaces {
        schema.prefixes.ensure(namespace);
    }
    let schema = Arc::new(schema);

    let bindings: HashMap<String, Arc<BindingDescriptor>> = pending
        .into_iter()
        .map(|binding| {
            let binding = binding.finish(&schema, target_namespace);
            (binding.name.clone(), Arc::new(binding))
        })
        .collect();
    let services = definitions.services(&bindings, &skipped)?;

    let contract = ContractDescriptor {
        name: definitions.root.attribute("name").map(str::to_owned),
        target_namespace: target_namespace.map(str::to_owned),
        services,
        schema,
        source: Arc::clone(&source),
    };
    info!(
        name = contract.name(),
        services = contract.services.len(),
        operations = contract.operations().count(),
        "contract parsed"
    );

    Ok(contract)
}
