//! Typedef registry - the read-only name table behind indirection nodes.
//!
//! The registry is built once at startup, from a JSON document or with
//! [`RegistryBuilder`], and never mutated afterwards. Share it with
//! [`TypedefRegistry::into_shared`].
//!
//! ## Document format
//!
//! ```json
//! {
//!   "types": {
//!     "SortModeOrder": ["ASC", "DESC"],
//!     "CalendarItem": { "description": "DOMString", "_optional": { "description": true } }
//!   },
//!   "interfaces": {
//!     "Calendar": { "add": { "0": "CalendarItem" } }
//!   },
//!   "constructors": {
//!     "CalendarItem": [ {}, { "0": "CalendarItem" } ]
//!   }
//! }
//! ```

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::Value as Json;

use crate::error::{CoerceError, CoerceResult};
use crate::pattern::Pattern;

/// Longest alias chain followed before giving up.
pub const MAX_ALIAS_HOPS: usize = 32;

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RegistryDocument {
    #[serde(default)]
    types: IndexMap<String, Pattern>,
    #[serde(default)]
    interfaces: IndexMap<String, IndexMap<String, Json>>,
    #[serde(default)]
    constructors: IndexMap<String, Vec<Json>>,
}

/// Immutable table of named types, interface method signatures and
/// constructor overloads.
#[derive(Debug, Clone, Default)]
pub struct TypedefRegistry {
    types: HashMap<String, Pattern>,
    interfaces: HashMap<String, HashMap<String, Pattern>>,
    constructors: HashMap<String, Vec<Pattern>>,
}

impl TypedefRegistry {
    /// A registry with no entries.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Start assembling a registry in code.
    #[must_use]
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    /// Parse a registry document.
    ///
    /// # Errors
    ///
    /// Returns [`CoerceError::Serialization`] for malformed JSON or descriptors,
    /// and [`CoerceError::InvalidPattern`] for a bad method or constructor
    /// argument list.
    pub fn from_json_str(json: &str) -> CoerceResult<Self> {
        let document: RegistryDocument = serde_json::from_str(json)?;
        Self::from_document(document)
    }

    /// Build a registry from an already parsed document.
    ///
    /// # Errors
    ///
    /// See [`TypedefRegistry::from_json_str`].
    pub fn from_json(json: Json) -> CoerceResult<Self> {
        let document: RegistryDocument = serde_json::from_value(json)?;
        Self::from_document(document)
    }

    /// Load a registry document from disk.
    ///
    /// # Errors
    ///
    /// Returns [`CoerceError::Io`] if the file cannot be read, otherwise see
    /// [`TypedefRegistry::from_json_str`].
    pub fn from_path(path: impl AsRef<Path>) -> CoerceResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let registry = Self::from_json_str(&text)?;
        tracing::debug!(
            "Loaded registry from {}: {} types, {} interfaces, {} constructors",
            path.display(),
            registry.types.len(),
            registry.interfaces.len(),
            registry.constructors.len()
        );
        Ok(registry)
    }

    fn from_document(document: RegistryDocument) -> CoerceResult<Self> {
        let mut builder = RegistryBuilder::default();
        for (name, pattern) in document.types {
            builder = builder.typedef(name, pattern);
        }
        for (interface, methods) in document.interfaces {
            for (method, descriptor) in methods {
                let pattern = Pattern::compile_arguments(&descriptor).map_err(|e| {
                    CoerceError::InvalidPattern(format!("{interface}.{method}: {e}"))
                })?;
                builder = builder.method(interface.clone(), method, pattern);
            }
        }
        for (name, overloads) in document.constructors {
            let patterns = overloads
                .iter()
                .map(Pattern::compile_arguments)
                .collect::<CoerceResult<Vec<_>>>()
                .map_err(|e| CoerceError::InvalidPattern(format!("constructor {name}: {e}")))?;
            builder = builder.constructor(name, patterns);
        }
        Ok(builder.build())
    }

    /// Wrap for sharing across threads.
    #[must_use]
    pub fn into_shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    /// Direct entry for `name`, without following aliases.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Pattern> {
        self.types.get(name)
    }

    /// Resolve `name`, following alias chains (`"A": "B"`) to a concrete pattern.
    ///
    /// Returns `None` for unknown names and for chains longer than
    /// [`MAX_ALIAS_HOPS`], which only a cycle produces in practice.
    #[must_use]
    pub fn resolve(&self, name: &str) -> Option<&Pattern> {
        let mut current = name;
        for _ in 0..MAX_ALIAS_HOPS {
            match self.types.get(current)? {
                Pattern::Typedef(next) => current = next.as_str(),
                pattern => return Some(pattern),
            }
        }
        tracing::warn!("Alias chain for type {name} does not terminate");
        None
    }

    /// Whether `name` is declared.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.types.contains_key(name)
    }

    /// Argument list declared for `interface.method`.
    #[must_use]
    pub fn method(&self, interface: &str, method: &str) -> Option<&Pattern> {
        self.interfaces.get(interface)?.get(method)
    }

    /// Overloads declared for constructor `name`.
    #[must_use]
    pub fn constructor(&self, name: &str) -> Option<&[Pattern]> {
        self.constructors.get(name).map(Vec::as_slice)
    }

    /// Declared type names, unordered.
    pub fn type_names(&self) -> impl Iterator<Item = &str> {
        self.types.keys().map(String::as_str)
    }

    /// Number of declared types.
    #[must_use]
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// Whether no types are declared.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

/// Builder for [`TypedefRegistry`].
#[derive(Debug, Default)]
pub struct RegistryBuilder {
    registry: TypedefRegistry,
}

impl RegistryBuilder {
    /// Declare a named type. A later declaration replaces an earlier one.
    #[must_use]
    pub fn typedef(mut self, name: impl Into<String>, pattern: Pattern) -> Self {
        self.registry.types.insert(name.into(), pattern);
        self
    }

    /// Declare a named type from a JSON descriptor.
    ///
    /// # Errors
    ///
    /// Returns [`CoerceError::InvalidPattern`] if the descriptor does not compile.
    pub fn typedef_json(self, name: impl Into<String>, descriptor: &Json) -> CoerceResult<Self> {
        Ok(self.typedef(name, Pattern::compile(descriptor)?))
    }

    /// Declare the argument list of an interface method.
    #[must_use]
    pub fn method(
        mut self,
        interface: impl Into<String>,
        method: impl Into<String>,
        arguments: Pattern,
    ) -> Self {
        self.registry
            .interfaces
            .entry(interface.into())
            .or_default()
            .insert(method.into(), arguments);
        self
    }

    /// Declare constructor overloads, tried in order.
    #[must_use]
    pub fn constructor(mut self, name: impl Into<String>, overloads: Vec<Pattern>) -> Self {
        self.registry.constructors.insert(name.into(), overloads);
        self
    }

    /// Finish.
    #[must_use]
    pub fn build(self) -> TypedefRegistry {
        self.registry
    }
}
