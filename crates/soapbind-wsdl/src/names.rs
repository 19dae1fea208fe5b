use std::{collections::BTreeMap, fmt::Display};

use soapbind_xml::parser::Node;

use crate::ContractError;

pub const WSDL_NS: &str = "http://schemas.xmlsoap.org/wsdl/";
pub const SOAP11_BINDING_NS: &str = "http://schemas.xmlsoap.org/wsdl/soap/";
pub const SOAP12_BINDING_NS: &str = "http://schemas.xmlsoap.org/wsdl/soap12/";
pub const XSD_NS: &str = "http://www.w3.org/2001/XMLSchema";
pub const XSI_NS: &str = "http://www.w3.org/2001/XMLSchema-instance";
pub const SOAP_ENCODING_NS: &str = "http://schemas.xmlsoap.org/soap/encoding/";
pub const SOAP11_ENVELOPE_NS: &str = "http://schemas.xmlsoap.org/soap/envelope/";
pub const SOAP12_ENVELOPE_NS: &str = "http://www.w3.org/2003/05/soap-envelope";
pub const SOAP_HTTP_TRANSPORT: &str = "http://schemas.xmlsoap.org/soap/http";
pub const SOAP12_HTTP_TRANSPORT: &str = "http://www.w3.org/2003/05/soap/bindings/HTTP/";

/// Prefixes the envelope codec always binds itself.
pub const RESERVED_PREFIXES: [&str; 3] = ["soap", "xsi", "xml"];

/// An expanded XML name. Unqualified names have no namespace.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QualifiedName {
    pub namespace: Option<String>,
    pub local: String,
}

impl QualifiedName {
    pub fn new(namespace: Option<&str>, local: impl Into<String>) -> Self {
        Self {
            namespace: namespace.map(str::to_owned),
            local: local.into(),
        }
    }

    pub fn unqualified(local: impl Into<String>) -> Self {
        Self {
            namespace: None,
            local: local.into(),
        }
    }

    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    /// Resolves a `prefix:local` reference written in an attribute of `node`.
    ///
    /// An unprefixed reference takes the in-scope default namespace, or
    /// `fallback` when there is none.
    pub fn resolve(
        node: Node<'_, '_>,
        reference: &str,
        fallback: Option<&str>,
    ) -> Result<Self, ContractError> {
        match reference.split_once(':') {
            Some((prefix, local)) => {
                let namespace = node.lookup_namespace_uri(Some(prefix)).ok_or_else(|| {
                    ContractError::UnresolvedPrefix {
                        prefix: prefix.to_owned(),
                        reference: reference.to_owned(),
                    }
                })?;
                Ok(Self::new(Some(namespace), local))
            }
            None => Ok(Self::new(
                node.lookup_namespace_uri(None).or(fallback),
                reference,
            )),
        }
    }
}

impl Display for QualifiedName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{{{ns}}}{}", self.local),
            None => write!(f, "{}", self.local),
        }
    }
}

/// Namespace → prefix assignments, seeded from the `xmlns:` declarations found in
/// the contract so encoded envelopes reuse the contract's own prefixes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrefixTable {
    by_namespace: BTreeMap<String, String>,
}

impl PrefixTable {
    /// Records `prefix` for `namespace` unless either is already taken.
    pub fn declare(&mut self, prefix: &str, namespace: &str) {
        if prefix.is_empty()
            || RESERVED_PREFIXES.contains(&prefix)
            || self.by_namespace.contains_key(namespace)
            || self.by_namespace.values().any(|p| p == prefix)
        {
            return;
        }
        self.by_namespace
            .insert(namespace.to_owned(), prefix.to_owned());
    }

    /// Makes sure `namespace` has a prefix, generating `ns1`, `ns2`, ... when the
    /// contract declared none.
    pub fn ensure(&mut self, namespace: &str) {
        if self.by_namespace.contains_key(namespace) {
            return;
        }
        let prefix = (1..)
            .map(|n| format!("ns{n}"))
            .find(|candidate| !self.by_namespace.values().any(|p| p == candidate))
            .unwrap_or_default();
        self.by_namespace.insert(namespace.to_owned(), prefix);
    }

    pub fn prefix(&self, namespace: &str) -> Option<&str> {
        self.by_namespace.get(namespace).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.by_namespace
            .iter()
            .map(|(ns, prefix)| (ns.as_str(), prefix.as_str()))
    }
}
