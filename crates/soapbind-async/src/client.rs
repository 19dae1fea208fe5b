use std::sync::Arc;

use anyhow::Context;
use soapbind_core::{
    CallResult, ClientConfig, ClientError, ClientProxy, Value,
    http::{HttpBuilder, HttpResponse},
};
use soapbind_wsdl::{ContractDescriptor, OperationKey};
use tracing::{debug, info, instrument};

use crate::HttpClient;

/// Async SOAP client: a [`ClientProxy`] bound to an HTTP transport.
pub struct SoapClient<C> {
    proxy: ClientProxy,
    http: C,
}

impl<C> SoapClient<C>
where
    C: HttpClient,
{
    pub fn new(contract: Arc<ContractDescriptor>, config: ClientConfig, http: C) -> Self {
        Self {
            proxy: ClientProxy::new(contract, config),
            http,
        }
    }

    pub fn proxy(&self) -> &ClientProxy {
        &self.proxy
    }

    pub fn resolve(&self, name: &str) -> Result<OperationKey, ClientError> {
        self.proxy.resolve(name)
    }

    /// Calls the operation identified by `key`.
    #[instrument(skip(self, args, header), fields(operation = %key))]
    pub async fn call(
        &self,
        key: &OperationKey,
        args: &Value,
        header: Option<&Value>,
    ) -> Result<CallResult, ClientError> {
        let prepared = self.proxy.prepare(key, args, header)?;
        debug!(url = %prepared.request.url, "sending request");

        let response = self
            .http
            .send_request(prepared.request.clone())
            .await
            .map_err(|error| ClientError::Transport(error.into()))?;

        prepared.interpret(response)
    }

    /// Calls an operation by name, either `service/port/operation` or a bare
    /// operation name that identifies exactly one operation.
    pub async fn invoke(
        &self,
        name: &str,
        args: &Value,
        header: Option<&Value>,
    ) -> Result<CallResult, ClientError> {
        let key = self.resolve(name)?;
        self.call(&key, args, header).await
    }
}

/// Fetches a WSDL document over HTTP and parses it.
#[instrument(skip(http))]
pub async fn load_contract<C>(http: &C, url: &str) -> anyhow::Result<ContractDescriptor>
where
    C: HttpClient,
{
    let request = HttpBuilder::new(url).get();
    let HttpResponse {
        status_code, body, ..
    } = http
        .send_request(request)
        .await
        .context("Failed to fetch WSDL")?;

    if !(200..300).contains(&status_code) {
        anyhow::bail!("Fetching WSDL from {url} returned HTTP {status_code}");
    }

    let contract =
        soapbind_wsdl::parse(body.as_str()).context("Failed to parse WSDL document")?;
    info!(services = contract.services().count(), "contract loaded");
    Ok(contract)
}
