//! Operation handlers of a [`crate::SoapServer`], keyed by operation.

use std::{collections::BTreeMap, fmt, future::Future, pin::Pin, sync::Arc};

use futures::FutureExt;
use soapbind_core::{Fault, Value};
use soapbind_wsdl::{ContractDescriptor, OperationKey};
use tracing::debug;

pub type HandlerFuture = Pin<Box<dyn Future<Output = Result<Reply, HandlerError>> + Send>>;

/// A handler receives the decoded arguments and the decoded SOAP header, if any.
pub type Handler = Arc<dyn Fn(Value, Option<Value>) -> HandlerFuture + Send + Sync>;

/// What a handler answers with: the result and, optionally, entries for the
/// response `Header`. Entries matching a header part of the operation's output are
/// typed like any other part.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Reply {
    pub body: Value,
    pub header: Option<Value>,
}

impl Reply {
    pub fn new(body: impl Into<Value>) -> Self {
        Self {
            body: body.into(),
            header: None,
        }
    }

    #[must_use]
    pub fn with_header(mut self, header: impl Into<Value>) -> Self {
        self.header = Some(header.into());
        self
    }
}

impl From<Value> for Reply {
    fn from(body: Value) -> Self {
        Self::new(body)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum HandlerError {
    /// Sent to the caller as is.
    #[error(transparent)]
    Fault(#[from] Fault),

    /// Reported to the caller as a Server fault.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum RegistrationError {
    #[error("the contract declares no operation named '{0}'")]
    UnknownOperation(String),

    #[error("the contract declares no operation {0}")]
    UnknownKey(OperationKey),

    #[error("a handler is already registered for {0}")]
    Duplicate(OperationKey),

    #[error("no handler registered for: {}", .0.iter().map(ToString::to_string).collect::<Vec<_>>().join(", "))]
    MissingHandlers(Vec<OperationKey>),
}

pub struct HandlerRegistry {
    contract: Arc<ContractDescriptor>,
    handlers: BTreeMap<OperationKey, Handler>,
}

impl fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("handlers", &self.handlers.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl HandlerRegistry {
    pub fn new(contract: Arc<ContractDescriptor>) -> Self {
        Self {
            contract,
            handlers: BTreeMap::new(),
        }
    }

    pub fn contract(&self) -> &Arc<ContractDescriptor> {
        &self.contract
    }

    /// Registers `handler` for `name`.
    ///
    /// `name` is either `service/port/operation` or a bare operation name; a bare
    /// name binds the handler to that operation on every port that exposes it.
    pub fn register<F, Fut>(&mut self, name: &str, handler: F) -> Result<&mut Self, RegistrationError>
    where
        F: Fn(Value, Option<Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, HandlerError>> + Send + 'static,
    {
        self.register_reply(name, move |args, header| {
            handler(args, header).map(|result| result.map(Reply::from))
        })
    }

    /// Like [`Self::register`], for handlers that also fill the response header.
    pub fn register_reply<F, Fut>(
        &mut self,
        name: &str,
        handler: F,
    ) -> Result<&mut Self, RegistrationError>
    where
        F: Fn(Value, Option<Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Reply, HandlerError>> + Send + 'static,
    {
        let handler: Handler = Arc::new(move |args: Value, header: Option<Value>| {
            Box::pin(handler(args, header)) as HandlerFuture
        });

        if let [service, port, operation] = name.split('/').collect::<Vec<_>>().as_slice() {
            let key = OperationKey::new(*service, *port, *operation);
            return self.insert(key, handler);
        }

        let keys = self.contract.find_operations(name);
        if keys.is_empty() {
            return Err(RegistrationError::UnknownOperation(name.to_owned()));
        }
        for key in keys {
            self.insert(key, Arc::clone(&handler))?;
        }
        Ok(self)
    }

    /// Registers a handler for exactly one operation.
    pub fn register_key<F, Fut>(
        &mut self,
        key: OperationKey,
        handler: F,
    ) -> Result<&mut Self, RegistrationError>
    where
        F: Fn(Value, Option<Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, HandlerError>> + Send + 'static,
    {
        self.insert(
            key,
            Arc::new(move |args: Value, header: Option<Value>| {
                Box::pin(handler(args, header).map(|result| result.map(Reply::from)))
                    as HandlerFuture
            }),
        )
    }

    /// Registers a handler that completes without awaiting anything.
    pub fn register_sync<F>(&mut self, name: &str, handler: F) -> Result<&mut Self, RegistrationError>
    where
        F: Fn(Value, Option<Value>) -> Result<Value, HandlerError> + Send + Sync + 'static,
    {
        self.register(name, move |args, header| {
            futures::future::ready(handler(args, header))
        })
    }

    fn insert(&mut self, key: OperationKey, handler: Handler) -> Result<&mut Self, RegistrationError> {
        if self.contract.operation(&key).is_none() {
            return Err(RegistrationError::UnknownKey(key));
        }
        if self.handlers.contains_key(&key) {
            return Err(RegistrationError::Duplicate(key));
        }
        debug!(operation = %key, "handler registered");
        self.handlers.insert(key, handler);
        Ok(self)
    }

    pub fn get(&self, key: &OperationKey) -> Option<&Handler> {
        self.handlers.get(key)
    }

    /// Operations of the contract that have no handler, in key order.
    pub fn missing(&self) -> Vec<OperationKey> {
        self.contract
            .operations()
            .map(|(key, _, _)| key)
            .filter(|key| !self.handlers.contains_key(key))
            .collect()
    }

    pub fn ensure_complete(&self) -> Result<(), RegistrationError> {
        let missing = self.missing();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(RegistrationError::MissingHandlers(missing))
        }
    }
}
