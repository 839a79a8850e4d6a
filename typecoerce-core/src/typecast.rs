//! Typed casting facade used at the device-API call boundary.
//!
//! Shims hand their raw argument list and values to [`TypeCast`], which runs
//! the matcher and turns a failed cast into [`CoerceError::TypeMismatch`],
//! the error the emulated application sees.

use std::sync::Arc;

use crate::error::{CoerceError, CoerceResult};
use crate::matcher::Matcher;
use crate::pattern::Pattern;
use crate::registry::TypedefRegistry;
use crate::value::Value;

/// Outcome of a constructor call that matched one of its overloads.
#[derive(Debug, Clone, PartialEq)]
pub struct ConstructorMatch {
    /// Index of the overload that accepted the arguments.
    pub overload: usize,
    /// Arguments cast against that overload.
    pub arguments: Value,
}

/// Casts values and argument lists against registry declarations.
#[derive(Debug, Clone)]
pub struct TypeCast {
    registry: Arc<TypedefRegistry>,
}

impl TypeCast {
    /// Create a caster over a shared registry.
    #[must_use]
    pub fn new(registry: Arc<TypedefRegistry>) -> Self {
        Self { registry }
    }

    /// The registry declarations are read from.
    #[must_use]
    pub fn registry(&self) -> &TypedefRegistry {
        &self.registry
    }

    fn type_pattern(&self, name: &str) -> CoerceResult<&Pattern> {
        self.registry
            .get(name)
            .ok_or_else(|| CoerceError::UnknownType(name.to_string()))
    }

    /// Whether `value` already is a `name`.
    ///
    /// # Errors
    ///
    /// Returns [`CoerceError::UnknownType`] if `name` is not declared.
    pub fn matches_type(&self, name: &str, value: &Value) -> CoerceResult<bool> {
        let pattern = self.type_pattern(name)?;
        Ok(Matcher::new(pattern, &self.registry).matches(value))
    }

    /// Cast `value` to the named type.
    ///
    /// # Errors
    ///
    /// Returns [`CoerceError::UnknownType`] if `name` is not declared and
    /// [`CoerceError::TypeMismatch`] if the value is `null`, `undefined` or
    /// does not cast.
    pub fn cast_type(&self, name: &str, value: Value) -> CoerceResult<Value> {
        let pattern = self.type_pattern(name)?;
        if value.is_nullish() {
            return Err(CoerceError::TypeMismatch(name.to_string()));
        }
        Matcher::new(pattern, &self.registry)
            .cast(value)
            .ok_or_else(|| mismatch(name))
    }

    /// Snapshot `value` as the named type without aliasing the caller's data.
    ///
    /// # Errors
    ///
    /// Same as [`TypeCast::cast_type`].
    pub fn copy_type(&self, name: &str, value: &Value) -> CoerceResult<Value> {
        let pattern = self.type_pattern(name)?;
        if value.is_nullish() {
            return Err(CoerceError::TypeMismatch(name.to_string()));
        }
        Matcher::new(pattern, &self.registry)
            .copy(value)
            .ok_or_else(|| mismatch(name))
    }

    /// Validate and cast the arguments of `interface.method`.
    ///
    /// # Errors
    ///
    /// Returns [`CoerceError::UnknownMethod`] if the method is not declared
    /// and [`CoerceError::TypeMismatch`] if the arguments do not cast.
    pub fn cast_arguments(&self, interface: &str, method: &str, args: Value) -> CoerceResult<Value> {
        let pattern = self
            .registry
            .method(interface, method)
            .ok_or_else(|| CoerceError::UnknownMethod {
                interface: interface.to_string(),
                method: method.to_string(),
            })?;
        Matcher::new(pattern, &self.registry)
            .cast(args)
            .ok_or_else(|| mismatch(&format!("arguments of {interface}.{method}")))
    }

    /// Validate constructor arguments, trying each overload in declaration order.
    ///
    /// # Errors
    ///
    /// Returns [`CoerceError::UnknownType`] if no constructor is declared and
    /// [`CoerceError::TypeMismatch`] if no overload accepts the arguments.
    pub fn cast_constructor(&self, name: &str, args: &Value) -> CoerceResult<ConstructorMatch> {
        let overloads = self
            .registry
            .constructor(name)
            .ok_or_else(|| CoerceError::UnknownType(name.to_string()))?;
        overloads
            .iter()
            .enumerate()
            .find_map(|(overload, pattern)| {
                Matcher::new(pattern, &self.registry)
                    .cast(args.clone())
                    .map(|arguments| ConstructorMatch { overload, arguments })
            })
            .ok_or_else(|| mismatch(&format!("arguments of new {name}")))
    }
}

fn mismatch(expected: &str) -> CoerceError {
    tracing::debug!("Type mismatch: expected {expected}");
    CoerceError::TypeMismatch(expected.to_string())
}
