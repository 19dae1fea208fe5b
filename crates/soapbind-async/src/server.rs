use std::{panic::AssertUnwindSafe, sync::Arc, time::Duration};

use futures::{
    FutureExt,
    future::{Either, select},
};
use soapbind_core::{
    Dispatcher, Fault, fault_response,
    http::{HttpRequest, HttpResponse, Method},
};
use soapbind_wsdl::{ContractDescriptor, SoapVersion};
use tracing::{debug, error, info, instrument, warn};

use crate::registry::{HandlerError, HandlerRegistry, RegistrationError};

#[derive(Debug, Clone, typed_builder::TypedBuilder)]
pub struct ServerConfig {
    /// Path the service answers on; other paths get `404`.
    #[builder(default = "/".to_owned(), setter(into))]
    pub path: String,
    /// Refuse to start unless every operation of the contract has a handler.
    #[builder(default = false)]
    pub strict: bool,
    #[builder(default, setter(strip_option))]
    pub handler_timeout: Option<Duration>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Serves the operations of a contract over any HTTP front end: the front end turns
/// its requests into [`HttpRequest`]s and writes back the returned [`HttpResponse`].
#[derive(Debug)]
pub struct SoapServer {
    dispatcher: Dispatcher,
    handlers: HandlerRegistry,
    config: ServerConfig,
}

impl SoapServer {
    pub fn new(handlers: HandlerRegistry, config: ServerConfig) -> Result<Self, RegistrationError> {
        if config.strict {
            handlers.ensure_complete()?;
        } else {
            for key in handlers.missing() {
                warn!(operation = %key, "no handler registered, calls will fault");
            }
        }

        let dispatcher = Dispatcher::new(Arc::clone(handlers.contract()));
        info!(path = %config.path, "SOAP server ready");
        Ok(Self {
            dispatcher,
            handlers,
            config,
        })
    }

    pub fn contract(&self) -> &Arc<ContractDescriptor> {
        self.dispatcher.contract()
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Answers one HTTP request.
    #[instrument(skip_all, fields(method = %request.method, url = %request.url))]
    pub async fn handle(&self, request: HttpRequest) -> HttpResponse {
        let path = match request.path() {
            Ok(path) => path,
            Err(e) => {
                debug!(error = %e, "unparseable request target");
                let mut response = fault_response(SoapVersion::V11, &Fault::client(e.to_string()));
                response.status_code = 400;
                return response;
            }
        };
        if path.trim_end_matches('/') != self.config.path.trim_end_matches('/') {
            return HttpResponse::text(404, format!("no SOAP service at {path}"));
        }

        match request.method {
            Method::Get if request.has_query_flag("wsdl") => HttpResponse::xml(
                200,
                "text/xml; charset=utf-8",
                self.contract().source().to_owned(),
            ),
            Method::Post => self.dispatch(&request).await,
            other => {
                debug!(method = %other, "method not allowed");
                let fault = Fault::client(format!("method {other} is not allowed, use POST"));
                let mut response = fault_response(SoapVersion::V11, &fault);
                response.status_code = 405;
                response
                    .headers
                    .push(("Allow".to_owned(), "GET, POST".to_owned()));
                response
            }
        }
    }

    async fn dispatch(&self, request: &HttpRequest) -> HttpResponse {
        let mut invocation = match self.dispatcher.prepare(request) {
            Ok(invocation) => invocation,
            Err(rejection) => {
                debug!(fault = %rejection.fault, "request rejected");
                return rejection.into_response();
            }
        };

        let Some(handler) = self.handlers.get(&invocation.key) else {
            warn!(operation = %invocation.key, "no handler registered");
            return fault_response(
                invocation.version,
                &Fault::server(format!("operation {} is not implemented", invocation.key)),
            );
        };

        let args = std::mem::take(&mut invocation.args);
        let header = invocation.header.take();
        let call = AssertUnwindSafe(async move { handler(args, header).await }).catch_unwind();
        futures::pin_mut!(call);

        let outcome = match self.config.handler_timeout {
            None => call.await,
            Some(timeout) => match select(call, futures_timer::Delay::new(timeout)).await {
                Either::Left((outcome, _)) => outcome,
                Either::Right(((), _)) => {
                    warn!(operation = %invocation.key, ?timeout, "handler timed out");
                    return fault_response(
                        invocation.version,
                        &Fault::server(format!("operation {} timed out", invocation.key)),
                    );
                }
            },
        };

        let outcome = outcome.unwrap_or_else(|_| {
            Err(HandlerError::Other(anyhow::anyhow!(
                "handler for {} panicked",
                invocation.key
            )))
        });

        match outcome {
            Ok(reply) => self.dispatcher.respond(&invocation, &reply.body, reply.header.as_ref()),
            Err(HandlerError::Fault(fault)) => {
                debug!(%fault, "handler raised a fault");
                fault_response(invocation.version, &fault)
            }
            Err(HandlerError::Other(e)) => {
                error!(operation = %invocation.key, error = %e, "handler failed");
                fault_response(invocation.version, &Fault::server(e.to_string()))
            }
        }
    }
}
