//! The XML Schema subset embedded in a contract's `<types>` section.
mod parser;
mod types;

use std::collections::HashMap;

use tracing::debug;

pub(crate) use parser::SchemaParser;
pub use types::*;

use crate::names::{PrefixTable, QualifiedName};

/// Inheritance chains longer than this are treated as cyclic and cut.
const MAX_BASE_DEPTH: usize = 32;

/// Every element and type declared by the contract's schemas, plus the namespace
/// prefixes the contract declared. Shared read-only by all operation descriptors.
#[derive(Debug, Clone, Default)]
pub struct Schema {
    pub(crate) elements: HashMap<QualifiedName, ElementDecl>,
    pub(crate) complex_types: Vec<ComplexType>,
    pub(crate) named_complex: HashMap<QualifiedName, ComplexTypeId>,
    pub(crate) simple_types: HashMap<QualifiedName, ScalarType>,
    pub(crate) prefixes: PrefixTable,
}

impl Schema {
    /// Looks a global element up by expanded name. Falls back to a unique match on the
    /// local name, which tolerates contracts that reference elements through the
    /// wrong namespace.
    pub fn element(&self, name: &QualifiedName) -> Option<&ElementDecl> {
        self.elements
            .get(name)
            .or_else(|| unique_by_local(self.elements.iter(), name))
    }

    pub fn complex_type(&self, id: ComplexTypeId) -> Option<&ComplexType> {
        self.complex_types.get(id.0)
    }

    pub fn complex_type_named(&self, name: &QualifiedName) -> Option<ComplexTypeId> {
        self.named_complex
            .get(name)
            .or_else(|| unique_by_local(self.named_complex.iter(), name))
            .copied()
    }

    pub fn simple_type_named(&self, name: &QualifiedName) -> Option<ScalarType> {
        self.simple_types
            .get(name)
            .or_else(|| unique_by_local(self.simple_types.iter(), name))
            .copied()
    }

    /// Resolves a `type=` reference: built-ins first, then named complex and simple
    /// types declared by the contract.
    pub fn resolve_type(&self, name: &QualifiedName) -> Option<TypeRef> {
        parser::builtin(name)
            .or_else(|| self.complex_type_named(name).map(TypeRef::Complex))
            .or_else(|| self.simple_type_named(name).map(TypeRef::Scalar))
    }

    /// Every namespace an element or field of this schema is qualified with.
    pub(crate) fn namespaces(&self) -> impl Iterator<Item = &str> {
        self.elements
            .keys()
            .filter_map(QualifiedName::namespace)
            .chain(
                self.complex_types
                    .iter()
                    .flat_map(|ty| ty.fields.iter())
                    .filter_map(|field| field.name.namespace()),
            )
    }

    /// All fields of `id` in document order, inherited fields first.
    pub fn fields(&self, id: ComplexTypeId) -> Vec<&FieldDecl> {
        let mut chain = Vec::new();
        let mut current = Some(id);
        while let Some(id) = current {
            let Some(ty) = self.complex_type(id) else {
                break;
            };
            if chain.len() == MAX_BASE_DEPTH {
                tracing::warn!(?id, "complex type inheritance chain too deep, truncating");
                break;
            }
            chain.push(ty);
            current = ty.base;
        }

        chain
            .into_iter()
            .rev()
            .flat_map(|ty| ty.fields.iter())
            .collect()
    }

    /// Whether `id` (or one of its bases) has content the schema subset does not model.
    pub fn is_open(&self, id: ComplexTypeId) -> bool {
        let mut current = Some(id);
        let mut depth = 0;
        while let Some(id) = current {
            let Some(ty) = self.complex_type(id) else {
                return true;
            };
            if ty.open {
                return true;
            }
            depth += 1;
            if depth > MAX_BASE_DEPTH {
                return true;
            }
            current = ty.base;
        }
        false
    }

    pub fn prefixes(&self) -> &PrefixTable {
        &self.prefixes
    }
}

fn unique_by_local<'s, V>(
    entries: impl Iterator<Item = (&'s QualifiedName, &'s V)>,
    name: &QualifiedName,
) -> Option<&'s V> {
    let mut matches = entries.filter(|(candidate, _)| candidate.local == name.local);
    let (found, value) = matches.next()?;
    if matches.next().is_some() {
        return None;
    }
    debug!(requested = %name, resolved = %found, "resolved schema reference by local name");
    Some(value)
}
