//! Sans-IO client proxy: builds SOAP requests for contract operations and interprets
//! the responses. Sending the request is left to the caller.

use std::{collections::BTreeMap, fmt, sync::Arc};

use soapbind_wsdl::{ContractDescriptor, Direction, OperationDescriptor, OperationKey, SoapVersion};
use soapbind_xml::{
    XmlError,
    parser::{XmlDeserialize, parse},
};
use tracing::{debug, info, instrument, warn};

use crate::{
    envelope::{
        ParsedEnvelope,
        codec::{self, CodecError, Decoded},
    },
    fault::Fault,
    http::{HttpBody, HttpBuilder, HttpRequest, HttpResponse, SOAP_ACTION_HEADER},
    value::Value,
};

#[derive(Clone, PartialEq, Eq)]
pub struct BasicAuth {
    pub username: String,
    pub password: String,
}

impl BasicAuth {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for BasicAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BasicAuth")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone, typed_builder::TypedBuilder)]
pub struct ClientConfig {
    /// Overrides the port address of every operation.
    #[builder(default, setter(into, strip_option))]
    pub endpoint: Option<String>,
    /// Extra HTTP headers sent with every request.
    #[builder(default)]
    pub headers: Vec<(String, String)>,
    #[builder(default, setter(strip_option))]
    pub basic_auth: Option<BasicAuth>,
    #[builder(default = true)]
    pub xml_declaration: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("unknown operation '{0}'")]
    UnknownOperation(String),

    #[error("operation '{operation}' is ambiguous, qualify it as one of: {}", join_keys(.candidates))]
    AmbiguousOperation {
        operation: String,
        candidates: Vec<OperationKey>,
    },

    #[error("no endpoint address for {0}; the port declares none and no override was configured")]
    NoEndpoint(OperationKey),

    #[error("failed to encode request: {0}")]
    Encode(#[source] CodecError),

    #[error("transport error: {0}")]
    Transport(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("HTTP status {status} with a non-SOAP body: {body}")]
    HttpStatus { status: u16, body: String },

    #[error("malformed response (HTTP {status}): {source}")]
    MalformedResponse {
        status: u16,
        #[source]
        source: CodecError,
    },

    #[error("SOAP fault: {0}")]
    Fault(#[from] Fault),
}

fn join_keys(keys: &[OperationKey]) -> String {
    keys.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// A decoded response.
#[derive(Debug, Clone, PartialEq)]
pub struct CallResult {
    pub result: Value,
    pub header: Option<Value>,
    pub status: u16,
    /// The response body exactly as received.
    pub raw_body: String,
}

#[derive(Debug, Clone)]
struct ClientEntry {
    operation: Arc<OperationDescriptor>,
    address: Option<String>,
}

/// One entry per service × port × operation, built once from the contract.
#[derive(Debug, Clone)]
pub struct ClientProxy {
    contract: Arc<ContractDescriptor>,
    config: ClientConfig,
    entries: BTreeMap<OperationKey, ClientEntry>,
}

impl ClientProxy {
    pub fn new(contract: Arc<ContractDescriptor>, config: ClientConfig) -> Self {
        let entries = contract
            .operations()
            .map(|(key, port, operation)| {
                let entry = ClientEntry {
                    operation: Arc::clone(operation),
                    address: port.address.clone(),
                };
                (key, entry)
            })
            .collect::<BTreeMap<_, _>>();

        info!(operations = entries.len(), "client proxy ready");
        Self {
            contract,
            config,
            entries,
        }
    }

    pub fn contract(&self) -> &Arc<ContractDescriptor> {
        &self.contract
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn operations(&self) -> impl Iterator<Item = &OperationKey> {
        self.entries.keys()
    }

    pub fn operation(&self, key: &OperationKey) -> Option<&Arc<OperationDescriptor>> {
        self.entries.get(key).map(|entry| &entry.operation)
    }

    /// Resolves `service/port/operation` or a bare operation name. A bare name must
    /// identify exactly one operation of the contract.
    pub fn resolve(&self, name: &str) -> Result<OperationKey, ClientError> {
        if let [service, port, operation] = name.split('/').collect::<Vec<_>>().as_slice() {
            let key = OperationKey::new(*service, *port, *operation);
            return if self.entries.contains_key(&key) {
                Ok(key)
            } else {
                Err(ClientError::UnknownOperation(name.to_owned()))
            };
        }

        let mut candidates: Vec<OperationKey> = self
            .entries
            .keys()
            .filter(|key| key.operation == name)
            .cloned()
            .collect();
        match candidates.len() {
            0 => Err(ClientError::UnknownOperation(name.to_owned())),
            1 => Ok(candidates.remove(0)),
            _ => Err(ClientError::AmbiguousOperation {
                operation: name.to_owned(),
                candidates,
            }),
        }
    }

    /// Encodes a call to `key` and builds its HTTP request. Encoding failures are
    /// reported here, before any I/O happens.
    #[instrument(skip(self, args, header), fields(operation = %key))]
    pub fn prepare(
        &self,
        key: &OperationKey,
        args: &Value,
        header: Option<&Value>,
    ) -> Result<PreparedCall, ClientError> {
        let entry = self
            .entries
            .get(key)
            .ok_or_else(|| ClientError::UnknownOperation(key.to_string()))?;
        let endpoint = self
            .config
            .endpoint
            .as_deref()
            .or(entry.address.as_deref())
            .ok_or_else(|| ClientError::NoEndpoint(key.clone()))?;

        let operation = &entry.operation;
        let xml = codec::encode_to_string(
            operation,
            Direction::Input,
            args,
            header,
            self.config.xml_declaration,
        )
        .map_err(ClientError::Encode)?;

        let mut builder = HttpBuilder::new(endpoint);
        let action = operation.soap_action.as_deref().unwrap_or_default();
        let content_type = match operation.soap_version {
            SoapVersion::V11 => {
                builder.with_header(SOAP_ACTION_HEADER, format!("\"{action}\""));
                SoapVersion::V11.content_type().to_owned()
            }
            SoapVersion::V12 if action.is_empty() => SoapVersion::V12.content_type().to_owned(),
            SoapVersion::V12 => format!("{}; action=\"{action}\"", SoapVersion::V12.content_type()),
        };
        for (name, value) in &self.config.headers {
            builder.with_header(name.as_str(), value.as_str());
        }
        if let Some(auth) = &self.config.basic_auth {
            builder.with_basic(&auth.username, &auth.password);
        }

        debug!(endpoint, bytes = xml.len(), "request prepared");
        Ok(PreparedCall {
            key: key.clone(),
            operation: Arc::clone(operation),
            request: builder.post(&content_type, HttpBody::Xml(xml)),
        })
    }
}

/// An encoded call waiting for its response.
#[derive(Debug, Clone)]
pub struct PreparedCall {
    pub key: OperationKey,
    pub operation: Arc<OperationDescriptor>,
    pub request: HttpRequest,
}

impl PreparedCall {
    /// Decodes the response to this call.
    ///
    /// A SOAP fault becomes [`ClientError::Fault`] whatever the HTTP status. A non-2xx
    /// response that is not a SOAP envelope becomes [`ClientError::HttpStatus`].
    #[instrument(skip_all, fields(operation = %self.key, status = response.status_code))]
    pub fn interpret(&self, response: HttpResponse) -> Result<CallResult, ClientError> {
        let status = response.status_code;
        let raw_body = response.body.as_str().to_owned();

        if raw_body.trim().is_empty() {
            return if response.is_success() && self.operation.is_one_way() {
                Ok(CallResult {
                    result: Value::Absent,
                    header: None,
                    status,
                    raw_body,
                })
            } else if response.is_success() {
                Err(ClientError::MalformedResponse {
                    status,
                    source: CodecError::Xml(XmlError::InvalidXml(
                        "empty response body".to_owned(),
                    )),
                })
            } else {
                Err(ClientError::HttpStatus {
                    status,
                    body: raw_body,
                })
            };
        }

        let not_soap = |source: XmlError| {
            if response.is_success() {
                ClientError::MalformedResponse {
                    status,
                    source: CodecError::Xml(source),
                }
            } else {
                ClientError::HttpStatus {
                    status,
                    body: raw_body.clone(),
                }
            }
        };
        let document = parse(&raw_body).map_err(|error| not_soap(XmlError::from(error)))?;
        let parsed = ParsedEnvelope::from_node(document.root_element()).map_err(not_soap)?;

        if self.operation.is_one_way() {
            if let Some(node) = parsed.first_body_element().filter(|node| parsed.is_fault(*node)) {
                let fault = crate::fault::read_fault(node, parsed.version)
                    .map_err(|source| ClientError::MalformedResponse {
                        status,
                        source: CodecError::Xml(source),
                    })?;
                return Err(ClientError::Fault(fault));
            }
            warn!("one-way operation received a response envelope, ignoring it");
            return Ok(CallResult {
                result: Value::Absent,
                header: None,
                status,
                raw_body: raw_body.clone(),
            });
        }

        let decoded = codec::decode_parsed(&self.operation, Direction::Output, &parsed)
            .map_err(|source| ClientError::MalformedResponse { status, source })?;
        match decoded {
            Decoded::Fault(fault) => Err(ClientError::Fault(fault)),
            Decoded::Message(_) if !response.is_success() => Err(ClientError::HttpStatus {
                status,
                body: raw_body.clone(),
            }),
            Decoded::Message(message) => Ok(CallResult {
                result: message.body,
                header: message.header,
                status,
                raw_body: raw_body.clone(),
            }),
        }
    }
}
