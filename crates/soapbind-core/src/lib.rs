pub mod client;
pub mod coerce;
pub mod envelope;
pub mod fault;
pub mod http;
pub mod server;
pub mod value;

pub use client::{BasicAuth, CallResult, ClientConfig, ClientError, ClientProxy, PreparedCall};
pub use envelope::codec::{CodecError, Decoded, Message};
pub use fault::{Fault, FaultCode};
pub use server::{Dispatcher, Invocation, Rejection, fault_response};
pub use value::{PrimitiveValue, Record, Value};

pub use soapbind_wsdl as wsdl;

#[derive(Debug, thiserror::Error)]
pub enum SoapCoreError {
    #[error("Invalid URL '{url}': {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
}
