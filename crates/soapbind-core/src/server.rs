//! Sans-IO request dispatcher: matches inbound envelopes to contract operations,
//! decodes their arguments and encodes handler results or faults.

use std::{collections::HashMap, sync::Arc};

use soapbind_wsdl::{
    BodyLayout, ContractDescriptor, Direction, OperationDescriptor, OperationKey, SoapVersion,
    names::{SOAP11_ENVELOPE_NS, SOAP12_ENVELOPE_NS},
};
use soapbind_xml::{
    XmlError,
    parser::{XmlDeserialize, element_children, parse},
};
use tracing::{debug, info, instrument, warn};

use crate::{
    envelope::{
        ParsedEnvelope,
        codec::{self, Decoded},
        envelope, to_xml,
    },
    fault::{Fault, FaultCode},
    http::{CONTENT_TYPE_HEADER, HttpRequest, HttpResponse, media_type},
    value::Value,
};

#[derive(Debug, Clone)]
pub struct Route {
    pub key: OperationKey,
    pub operation: Arc<OperationDescriptor>,
}

/// A decoded request, ready for its handler.
#[derive(Debug, Clone)]
pub struct Invocation {
    pub key: OperationKey,
    pub operation: Arc<OperationDescriptor>,
    pub version: SoapVersion,
    pub args: Value,
    pub header: Option<Value>,
}

/// A request the dispatcher could not turn into an [`Invocation`].
#[derive(Debug, Clone, PartialEq)]
pub struct Rejection {
    pub version: SoapVersion,
    pub fault: Fault,
}

impl Rejection {
    fn client(version: SoapVersion, message: impl Into<String>) -> Self {
        Self {
            version,
            fault: Fault::client(message),
        }
    }

    pub fn into_response(self) -> HttpResponse {
        fault_response(self.version, &self.fault)
    }
}

/// Routes keyed by the local name of the first body element each operation's input
/// produces. Operations with an empty input body are keyed by the empty string.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    contract: Arc<ContractDescriptor>,
    routes: HashMap<String, Vec<Route>>,
}

impl Dispatcher {
    pub fn new(contract: Arc<ContractDescriptor>) -> Self {
        let mut routes: HashMap<String, Vec<Route>> = HashMap::new();
        for (key, _, operation) in contract.operations() {
            let element = operation
                .rule
                .input
                .first_element()
                .map(|name| name.local.clone())
                .unwrap_or_default();
            routes.entry(element).or_default().push(Route {
                key,
                operation: Arc::clone(operation),
            });
        }

        info!(routes = routes.len(), "dispatcher ready");
        Self { contract, routes }
    }

    pub fn contract(&self) -> &Arc<ContractDescriptor> {
        &self.contract
    }

    /// Candidates for a body whose first element is `local` (empty for an empty body).
    pub fn routes(&self, local: &str) -> &[Route] {
        self.routes.get(local).map_or(&[], Vec::as_slice)
    }

    /// Picks the operation a request is meant for.
    ///
    /// Candidates sharing a body element are narrowed by element namespace, then by
    /// SOAP version, then by SOAP action, then by the shape of the whole body. Two
    /// different operations surviving all of that is an error; the same operation
    /// bound on several ports resolves to the first in key order.
    fn select<'r>(
        &'r self,
        parsed: &ParsedEnvelope<'_>,
        action: Option<&str>,
    ) -> Result<&'r Route, String> {
        let first = parsed.first_body_element();
        let local = first.map_or("", |node| node.tag_name().name());
        let mut candidates: Vec<&Route> = self.routes(local).iter().collect();

        let namespace = first.and_then(|node| node.tag_name().namespace());
        narrow(&mut candidates, |route| {
            route.operation.rule.input.first_element().map(|name| name.namespace()) == Some(namespace)
        });
        narrow(&mut candidates, |route| route.operation.soap_version == parsed.version);
        if let Some(action) = action {
            narrow(&mut candidates, |route| {
                route.operation.soap_action.as_deref() == Some(action)
            });
        }
        narrow(&mut candidates, |route| body_matches(&route.operation.rule.input, parsed));

        let Some(&chosen) = candidates.first() else {
            debug!(element = local, "no operation matches the request body");
            return Err(format!("no operation matches body element '{local}'"));
        };
        if candidates
            .iter()
            .any(|route| route.key.operation != chosen.key.operation)
        {
            let keys: Vec<String> = candidates.iter().map(|route| route.key.to_string()).collect();
            warn!(element = local, candidates = ?keys, "ambiguous request");
            return Err(format!(
                "body element '{local}' matches several operations: {}",
                keys.join(", ")
            ));
        }
        Ok(chosen)
    }

    /// Parses, matches and decodes a SOAP request.
    #[instrument(skip_all, fields(url = %request.url))]
    pub fn prepare(&self, request: &HttpRequest) -> Result<Invocation, Rejection> {
        let version = request_version(request);
        let document = parse(request.body_str())
            .map_err(|error| Rejection::client(version, format!("malformed request: {error}")))?;
        let parsed = ParsedEnvelope::from_node(document.root_element()).map_err(|error| {
            match error {
                XmlError::XmlInvalidNamespace { .. } => Rejection {
                    version,
                    fault: Fault::builder()
                        .code(FaultCode::VersionMismatch)
                        .string(format!("unsupported envelope: {error}"))
                        .build(),
                },
                other => Rejection::client(version, format!("malformed envelope: {other}")),
            }
        })?;
        let version = parsed.version;

        let action = request.soap_action();
        let route = self
            .select(&parsed, action.as_deref())
            .map_err(|message| Rejection::client(version, message))?;

        match codec::decode_parsed(&route.operation, Direction::Input, &parsed) {
            Ok(Decoded::Message(message)) => {
                debug!(operation = %route.key, "request decoded");
                Ok(Invocation {
                    key: route.key.clone(),
                    operation: Arc::clone(&route.operation),
                    version,
                    args: message.body,
                    header: message.header,
                })
            }
            Ok(Decoded::Fault(_)) => Err(Rejection::client(version, "request body is a Fault")),
            Err(error) => Err(Rejection::client(
                version,
                format!("cannot decode {}: {error}", route.key.operation),
            )),
        }
    }

    /// Encodes a handler result. One-way operations answer `202` with no body.
    #[instrument(skip_all, fields(operation = %invocation.key))]
    pub fn respond(
        &self,
        invocation: &Invocation,
        result: &Value,
        header: Option<&Value>,
    ) -> HttpResponse {
        if invocation.operation.is_one_way() {
            return HttpResponse::empty(202);
        }

        match codec::encode_to_string(&invocation.operation, Direction::Output, result, header, true)
        {
            Ok(xml) => HttpResponse::xml(200, invocation.version.content_type(), xml),
            Err(error) => {
                warn!(%error, "handler result does not match the contract");
                fault_response(
                    invocation.version,
                    &Fault::server(format!("cannot encode response: {error}")),
                )
            }
        }
    }
}

fn narrow(candidates: &mut Vec<&Route>, keep: impl Fn(&Route) -> bool) {
    if candidates.iter().any(|route| keep(route)) {
        candidates.retain(|route| keep(route));
    }
}

/// Whether the body (or its wrapper) holds only elements `layout` declares, unless
/// its content model is open, and every required slot.
fn body_matches(layout: &BodyLayout, parsed: &ParsedEnvelope<'_>) -> bool {
    let content = match (&layout.wrapper, parsed.first_body_element()) {
        (None, _) => parsed.body,
        (Some(_), Some(wrapper)) => wrapper,
        (Some(_), None) => return false,
    };
    let children: Vec<&str> = element_children(content)
        .map(|node| node.tag_name().name())
        .collect();

    let declared = |local: &str| layout.slots.iter().any(|slot| slot.element.local == local);
    (layout.open || children.iter().copied().all(declared))
        && layout
            .slots
            .iter()
            .filter(|slot| slot.is_required())
            .all(|slot| children.contains(&slot.element.local.as_str()))
}

/// Best guess of the SOAP version before the envelope is parsed.
fn request_version(request: &HttpRequest) -> SoapVersion {
    match request.header(CONTENT_TYPE_HEADER).map(media_type) {
        Some(media) if media.eq_ignore_ascii_case("application/soap+xml") => SoapVersion::V12,
        _ if request.body_str().contains(SOAP12_ENVELOPE_NS)
            && !request.body_str().contains(SOAP11_ENVELOPE_NS) =>
        {
            SoapVersion::V12
        }
        _ => SoapVersion::V11,
    }
}

/// A `500` response carrying `fault` in the shape of `version`.
pub fn fault_response(version: SoapVersion, fault: &Fault) -> HttpResponse {
    let element = envelope(version, None, None, vec![fault.to_element(version)]);
    match to_xml(element, true) {
        Ok(xml) => HttpResponse::xml(Fault::HTTP_STATUS, version.content_type(), xml),
        Err(error) => {
            warn!(%error, "failed to serialize fault");
            HttpResponse::text(Fault::HTTP_STATUS, fault.to_string())
        }
    }
}
