use soapbind_core::http::{HttpRequest, HttpResponse};
use std::future::Future;

pub mod client;
pub mod registry;
pub mod server;

pub use client::{SoapClient, load_contract};
pub use registry::{HandlerError, HandlerRegistry, RegistrationError, Reply};
pub use server::{ServerConfig, SoapServer};

/// HTTP client abstraction for async operations
pub trait HttpClient: Send + Sync + 'static {
    /// Send a request and wait for the complete response.
    ///
    /// Only transport failures are errors here; a `500` carrying a SOAP fault is a
    /// regular response.
    fn send_request(
        &self,
        request: HttpRequest,
    ) -> impl Future<Output = anyhow::Result<HttpResponse>> + Send;
}
