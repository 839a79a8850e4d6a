//! The matcher: `matches`, `cast` and `copy` over a compiled pattern.
//!
//! A [`Matcher`] borrows one pattern node and the registry. Nested nodes get
//! their own matcher, so constructing one is free.
//!
//! - [`Matcher::matches`] checks without coercing.
//! - [`Matcher::cast`] consumes a value and hands back the coerced value
//!   (containers are reused), or `None`.
//! - [`Matcher::copy`] leaves the caller's value untouched and builds a new
//!   coerced one, or `None`.
//!
//! Any failing leaf fails the whole operation.

use crate::pattern::{ArgumentList, Pattern, PatternKind, Primitive, Shape};
use crate::registry::TypedefRegistry;
use crate::value::{Attributes, Object, Value};

/// Matches and coerces values against one pattern node.
#[derive(Debug, Clone, Copy)]
pub struct Matcher<'a> {
    pattern: &'a Pattern,
    registry: &'a TypedefRegistry,
}

impl<'a> Matcher<'a> {
    /// Create a matcher for `pattern`, resolving names through `registry`.
    #[must_use]
    pub const fn new(pattern: &'a Pattern, registry: &'a TypedefRegistry) -> Self {
        Self { pattern, registry }
    }

    /// Kind of the pattern this matcher dispatches on.
    #[must_use]
    pub const fn kind(&self) -> PatternKind {
        self.pattern.kind()
    }

    const fn nested(&self, pattern: &'a Pattern) -> Self {
        Self::new(pattern, self.registry)
    }

    fn resolve(&self, name: &str) -> Option<Self> {
        match self.registry.resolve(name) {
            Some(pattern) => Some(self.nested(pattern)),
            None => {
                tracing::warn!("Unresolved type name: {name}");
                None
            }
        }
    }

    /// Whether `value` already has the pattern's shape.
    #[must_use]
    pub fn matches(&self, value: &Value) -> bool {
        tracing::trace!(kind = %self.kind(), value = %value.kind(), "match");
        match self.pattern {
            Pattern::Primitive(p) => match_primitive(*p, value),
            Pattern::Enum(literals) => {
                matches!(value, Value::String(s) if literals.iter().any(|l| l == s))
            }
            Pattern::Union(members) => members.iter().any(|m| self.nested(m).matches(value)),
            Pattern::ArrayOf(element) => match value {
                Value::Array(items) => {
                    let element = self.nested(element);
                    items.iter().all(|item| element.matches(item))
                }
                _ => false,
            },
            Pattern::Object(shape) | Pattern::Callback(shape) => self.match_shape(shape, value),
            Pattern::Dictionary { shape, entries } => {
                self.match_shape(shape, value)
                    && entries
                        .as_deref()
                        .map_or(true, |entries| self.nested(entries).matches(value))
            }
            // Argument lists are only checked positionally by `cast`.
            Pattern::Arguments(_) => true,
            Pattern::Typedef(name) => self.resolve(name).is_some_and(|m| m.matches(value)),
        }
    }

    fn match_shape(&self, shape: &'a Shape, value: &Value) -> bool {
        if !is_container(value) {
            return false;
        }

        if !shape.derived.is_empty() {
            if shape.derived.iter().any(|d| self.nested(d).matches(value)) {
                return true;
            }
            if shape.constructor.is_none() {
                return false;
            }
        }
        if let Some(constructor) = &shape.constructor {
            if !is_instance_of(value, constructor) {
                return false;
            }
        }

        shape.attributes.iter().all(|(name, pattern)| {
            match slot(value, name) {
                None | Some(Value::Undefined) => shape.is_optional(name),
                Some(Value::Null) if shape.is_optional(name) => true,
                Some(attribute) => self.nested(pattern).matches(attribute),
            }
        })
    }

    /// Coerce `value` toward the pattern, reusing its storage.
    ///
    /// Attributes and elements the pattern does not mention are left as they are.
    #[must_use]
    pub fn cast(&self, value: Value) -> Option<Value> {
        tracing::trace!(kind = %self.kind(), value = %value.kind(), "cast");
        match self.pattern {
            Pattern::Primitive(p) => cast_primitive(*p, value),
            Pattern::Enum(literals) => cast_enum(literals, &value),
            Pattern::Union(members) => {
                let (last, rest) = members.split_last()?;
                for member in rest {
                    if let Some(cast) = self.nested(member).cast(value.clone()) {
                        return Some(cast);
                    }
                }
                self.nested(last).cast(value)
            }
            Pattern::ArrayOf(element) => {
                let Value::Array(items) = value else {
                    return None;
                };
                let element = self.nested(element);
                items
                    .into_iter()
                    .map(|item| element.cast(item))
                    .collect::<Option<Vec<_>>>()
                    .map(Value::Array)
            }
            Pattern::Object(shape) | Pattern::Callback(shape) => self.cast_shape(shape, value),
            Pattern::Dictionary { shape, entries } => {
                let cast = self.cast_shape(shape, value)?;
                match entries {
                    Some(entries) => self.nested(entries).cast(cast),
                    None => Some(cast),
                }
            }
            Pattern::Arguments(arguments) => self.cast_arguments(arguments, value),
            Pattern::Typedef(name) => self.resolve(name)?.cast(value),
        }
    }

    fn cast_shape(&self, shape: &'a Shape, mut value: Value) -> Option<Value> {
        if !is_container(&value) {
            return None;
        }

        if !shape.derived.is_empty() {
            for derived in &shape.derived {
                if let Some(cast) = self.nested(derived).cast(value.clone()) {
                    return Some(cast);
                }
            }
            if shape.constructor.is_none() {
                tracing::debug!("No derived type accepts the value");
                return None;
            }
        }
        if let Some(constructor) = &shape.constructor {
            if !is_instance_of(&value, constructor) {
                tracing::debug!("Value is not an instance of {constructor}");
                return None;
            }
        }

        for (name, pattern) in &shape.attributes {
            let optional = shape.is_optional(name);
            let Some(slot) = slot_mut(&mut value, name) else {
                if optional {
                    continue;
                }
                tracing::debug!("Missing required attribute {name}");
                return None;
            };
            if let Some(keep) = skip_slot(slot, optional) {
                if keep {
                    continue;
                }
                tracing::debug!("Missing required attribute {name}");
                return None;
            }
            let taken = std::mem::replace(slot, Value::Undefined);
            match self.nested(pattern).cast(taken) {
                Some(cast) => *slot = cast,
                None => {
                    tracing::debug!("Attribute {name} does not cast to {}", pattern.kind());
                    return None;
                }
            }
        }

        Some(value)
    }

    fn cast_arguments(&self, arguments: &'a ArgumentList, mut value: Value) -> Option<Value> {
        if !is_container(&value) {
            return None;
        }

        for (index, pattern) in &arguments.params {
            let optional = arguments.is_optional(*index);
            let Some(slot) = slot_mut(&mut value, &index.to_string()) else {
                if optional {
                    continue;
                }
                tracing::debug!("Missing required argument {index}");
                return None;
            };
            if let Some(keep) = skip_slot(slot, optional) {
                if keep {
                    continue;
                }
                tracing::debug!("Missing required argument {index}");
                return None;
            }
            let taken = std::mem::replace(slot, Value::Undefined);
            match self.nested(pattern).cast(taken) {
                Some(cast) => *slot = cast,
                None => {
                    tracing::debug!("Argument {index} does not cast to {}", pattern.kind());
                    return None;
                }
            }
        }

        Some(value)
    }

    /// Build a fresh value coerced toward the pattern, leaving `value` untouched.
    ///
    /// Object copies carry only declared attributes; dictionary and argument
    /// list copies carry every entry of the source.
    #[must_use]
    pub fn copy(&self, value: &Value) -> Option<Value> {
        tracing::trace!(kind = %self.kind(), value = %value.kind(), "copy");
        match self.pattern {
            Pattern::Primitive(_) | Pattern::Enum(_) => self.cast(value.clone()),
            Pattern::Union(members) => members.iter().find_map(|m| self.nested(m).copy(value)),
            Pattern::ArrayOf(element) => {
                let Value::Array(items) = value else {
                    return None;
                };
                let element = self.nested(element);
                items
                    .iter()
                    .map(|item| element.copy(item))
                    .collect::<Option<Vec<_>>>()
                    .map(Value::Array)
            }
            Pattern::Object(shape) | Pattern::Callback(shape) => {
                self.copy_shape(shape, value, false)
            }
            Pattern::Dictionary { shape, entries } => {
                let copy = self.copy_shape(shape, value, true)?;
                match entries {
                    // Already a fresh value, so casting it cannot alias the source.
                    Some(entries) => self.nested(entries).cast(copy),
                    None => Some(copy),
                }
            }
            Pattern::Arguments(arguments) => self.copy_arguments(arguments, value),
            Pattern::Typedef(name) => self.resolve(name)?.copy(value),
        }
    }

    fn copy_shape(&self, shape: &'a Shape, value: &Value, keep_unknown: bool) -> Option<Value> {
        if !is_container(value) {
            return None;
        }

        if !shape.derived.is_empty() {
            if let Some(copy) = shape.derived.iter().find_map(|d| self.nested(d).copy(value)) {
                return Some(copy);
            }
            if shape.constructor.is_none() {
                tracing::debug!("No derived type accepts the value");
                return None;
            }
        }
        if let Some(constructor) = &shape.constructor {
            if !is_instance_of(value, constructor) {
                tracing::debug!("Value is not an instance of {constructor}");
                return None;
            }
        }

        // Positions cannot be dropped without shifting, so lists copy whole.
        let mut copy = match value {
            Value::Object(source) if !keep_unknown => Value::Object(Object {
                class: source.class.clone(),
                attributes: Attributes::with_capacity(shape.attributes.len()),
            }),
            _ => value.clone(),
        };

        for (name, pattern) in &shape.attributes {
            let optional = shape.is_optional(name);
            let Some(attribute) = slot(value, name) else {
                if optional {
                    continue;
                }
                tracing::debug!("Missing required attribute {name}");
                return None;
            };
            let coerced = match skip_slot(attribute, optional) {
                Some(true) => attribute.clone(),
                Some(false) => {
                    tracing::debug!("Missing required attribute {name}");
                    return None;
                }
                None => {
                    let Some(coerced) = self.nested(pattern).copy(attribute) else {
                        tracing::debug!("Attribute {name} does not copy to {}", pattern.kind());
                        return None;
                    };
                    coerced
                }
            };
            match &mut copy {
                Value::Object(object) => {
                    object.attributes.insert(name.clone(), coerced);
                }
                list => {
                    if let Some(slot) = slot_mut(list, name) {
                        *slot = coerced;
                    }
                }
            }
        }

        Some(copy)
    }

    fn copy_arguments(&self, arguments: &'a ArgumentList, value: &Value) -> Option<Value> {
        if !is_container(value) {
            return None;
        }

        let mut copy = value.clone();
        for (index, pattern) in &arguments.params {
            let optional = arguments.is_optional(*index);
            let key = index.to_string();
            let Some(argument) = slot(value, &key) else {
                if optional {
                    continue;
                }
                tracing::debug!("Missing required argument {index}");
                return None;
            };
            match skip_slot(argument, optional) {
                Some(true) => {}
                Some(false) => {
                    tracing::debug!("Missing required argument {index}");
                    return None;
                }
                None => {
                    let coerced = self.nested(pattern).copy(argument)?;
                    if let Some(slot) = slot_mut(&mut copy, &key) {
                        *slot = coerced;
                    }
                }
            }
        }

        Some(copy)
    }
}

const fn is_container(value: &Value) -> bool {
    matches!(value, Value::Object(_) | Value::Array(_) | Value::Arguments(_))
}

/// Objects address slots by attribute name; arrays and argument lists by
/// position, so `"1"` is the second item.
fn slot<'v>(value: &'v Value, key: &str) -> Option<&'v Value> {
    match value {
        Value::Object(object) => object.get(key),
        Value::Array(items) | Value::Arguments(items) => items.get(key.parse::<usize>().ok()?),
        _ => None,
    }
}

fn slot_mut<'v>(value: &'v mut Value, key: &str) -> Option<&'v mut Value> {
    match value {
        Value::Object(object) => object.attributes.get_mut(key),
        Value::Array(items) | Value::Arguments(items) => {
            items.get_mut(key.parse::<usize>().ok()?)
        }
        _ => None,
    }
}

fn is_instance_of(value: &Value, constructor: &str) -> bool {
    matches!(value, Value::Object(object) if object.is_instance_of(constructor))
}

/// Decide whether a present slot bypasses coercion.
///
/// `Some(true)`: optional and nullish, keep it. `Some(false)`: required but
/// `undefined`, fail. `None`: coerce it.
fn skip_slot(slot: &Value, optional: bool) -> Option<bool> {
    match slot {
        Value::Undefined | Value::Null if optional => Some(true),
        Value::Undefined => Some(false),
        _ => None,
    }
}

fn match_primitive(primitive: Primitive, value: &Value) -> bool {
    match (primitive, value) {
        (Primitive::Any, _)
        | (Primitive::Boolean, Value::Bool(_))
        | (Primitive::Float, Value::Number(_))
        | (Primitive::DomString, Value::String(_))
        | (Primitive::Date, Value::Date(_))
        | (Primitive::Function, Value::Function(_)) => true,
        (_, Value::Number(n)) => primitive
            .integer_domain()
            .is_some_and(|domain| domain.holds(*n)),
        _ => false,
    }
}

fn cast_primitive(primitive: Primitive, value: Value) -> Option<Value> {
    match primitive {
        Primitive::Any => Some(value),
        Primitive::Boolean => Some(Value::Bool(value.is_truthy())),
        Primitive::Float => {
            let n = value.parse_float();
            (!n.is_nan()).then_some(Value::Number(n))
        }
        Primitive::DomString => match value {
            Value::String(_) => Some(value),
            Value::Undefined | Value::Null | Value::Bool(_) | Value::Number(_) | Value::Date(_) => {
                Some(Value::String(value.to_js_string()))
            }
            _ => None,
        },
        Primitive::Date => matches!(value, Value::Date(_)).then_some(value),
        Primitive::Function => matches!(value, Value::Function(_)).then_some(value),
        integer => {
            let domain = integer.integer_domain()?;
            domain.coerce(value.to_number()).map(Value::Number)
        }
    }
}

fn cast_enum(literals: &[String], value: &Value) -> Option<Value> {
    let text = value.to_js_string();
    let trimmed = text.trim();
    literals
        .iter()
        .find(|literal| literal.as_str() == trimmed)
        .map(|literal| Value::String(literal.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn pattern(descriptor: serde_json::Value) -> Pattern {
        Pattern::compile(&descriptor).unwrap()
    }

    fn cast(descriptor: serde_json::Value, value: Value) -> Option<Value> {
        let registry = TypedefRegistry::empty();
        let pattern = pattern(descriptor);
        Matcher::new(&pattern, &registry).cast(value)
    }

    fn matches(descriptor: serde_json::Value, value: &Value) -> bool {
        let registry = TypedefRegistry::empty();
        let pattern = pattern(descriptor);
        Matcher::new(&pattern, &registry).matches(value)
    }

    #[test]
    fn test_match_primitives() {
        assert!(matches(json!("boolean"), &Value::Bool(true)));
        assert!(!matches(json!("boolean"), &Value::from(1)));
        assert!(matches(json!("float"), &Value::from(f64::NAN)));
        assert!(matches(json!("DOMString"), &Value::from("x")));
        assert!(!matches(json!("DOMString"), &Value::from(1)));
        assert!(matches(json!("Callback"), &Value::function("cb")));
        assert!(matches(json!("any"), &Value::Undefined));
        assert!(matches(json!("Date"), &Value::date_from_millis(5).unwrap()));
    }

    #[test]
    fn test_match_integer_requires_exact_domain() {
        assert!(matches(json!("octet"), &Value::from(255)));
        assert!(!matches(json!("octet"), &Value::from(256)));
        assert!(!matches(json!("long"), &Value::from(1.5)));
        assert!(!matches(json!("long"), &Value::from("5")));
        assert!(matches(json!("byte"), &Value::from(-128)));
    }

    #[test]
    fn test_cast_primitives() {
        assert_eq!(cast(json!("boolean"), Value::from("x")), Some(Value::Bool(true)));
        assert_eq!(cast(json!("boolean"), Value::from(0)), Some(Value::Bool(false)));
        assert_eq!(cast(json!("float"), Value::from("2.5kg")), Some(Value::from(2.5)));
        assert_eq!(cast(json!("double"), Value::Bool(true)), None);
        assert_eq!(cast(json!("DOMString"), Value::from(123)), Some(Value::from("123")));
        assert_eq!(cast(json!("DOMString"), Value::Null), Some(Value::from("null")));
        assert_eq!(
            cast(json!("DOMString"), Value::Undefined),
            Some(Value::from("undefined"))
        );
        assert_eq!(cast(json!("DOMString"), Value::Array(vec![])), None);
        assert_eq!(cast(json!("Function"), Value::from("f")), None);
        assert_eq!(cast(json!("long"), Value::from("x")), None);
        assert_eq!(cast(json!("long"), Value::from(" 42 ")), Some(Value::from(42)));
    }

    #[test]
    fn test_cast_enum_trims_but_keeps_case() {
        let colors = json!(["RED", "GREEN", "BLUE"]);
        assert_eq!(cast(colors.clone(), Value::from(" RED ")), Some(Value::from("RED")));
        assert_eq!(cast(colors.clone(), Value::from("red")), None);
        assert!(!matches(colors.clone(), &Value::from(" RED ")));
        assert!(matches(colors, &Value::from("BLUE")));
    }

    #[test]
    fn test_empty_union_matches_nothing() {
        assert!(!matches(json!([]), &Value::from(1)));
        assert_eq!(cast(json!([]), Value::from(1)), None);
    }

    #[test]
    fn test_required_undefined_attribute_fails() {
        let shape = json!({"a": "DOMString"});
        let object = Object::new().with("a", Value::Undefined);
        assert_eq!(cast(shape.clone(), Value::Object(object.clone())), None);
        assert!(!matches(shape, &Value::Object(object)));
    }

    #[test]
    fn test_required_null_attribute_is_coerced() {
        let shape = json!({"a": "DOMString"});
        let object = Object::new().with("a", Value::Null);
        assert_eq!(
            cast(shape, Value::Object(object)),
            Some(Value::Object(Object::new().with("a", "null")))
        );
    }

    #[test]
    fn test_optional_null_kept() {
        let shape = json!({"a": "long", "_optional": {"a": true}});
        let object = Value::Object(Object::new().with("a", Value::Null));
        assert_eq!(cast(shape.clone(), object.clone()), Some(object.clone()));
        assert!(matches(shape, &object));
    }

    #[test]
    fn test_copy_leaves_source_untouched() {
        let registry = TypedefRegistry::empty();
        let pattern = pattern(json!({"n": "long"}));
        let source = Value::Object(Object::new().with("n", "7").with("extra", true));
        let copy = Matcher::new(&pattern, &registry).copy(&source).unwrap();

        assert_eq!(copy, Value::Object(Object::new().with("n", 7)));
        assert_eq!(source.get("n"), Some(&Value::from("7")));
    }

    #[test]
    fn test_cast_keeps_undeclared_attributes() {
        let value = Value::Object(Object::new().with("n", "7").with("extra", true));
        assert_eq!(
            cast(json!({"n": "long"}), value),
            Some(Value::Object(Object::new().with("n", 7).with("extra", true)))
        );
    }

    #[test]
    fn test_cast_preserves_class() {
        let value = Value::Object(Object::instance_of("Point").with("x", "1"));
        let cast = cast(json!({"x": "long", "_constructor": "Point"}), value).unwrap();
        assert_eq!(cast, Value::Object(Object::instance_of("Point").with("x", 1)));
    }

    #[test]
    fn test_arguments_cast_positional() {
        let descriptor = json!({"0": "DOMString", "1": "long", "_optional": {"1": true}});
        assert_eq!(
            cast(descriptor.clone(), Value::Arguments(vec![Value::from(5)])),
            Some(Value::Arguments(vec![Value::from("5")]))
        );
        assert_eq!(
            cast(
                descriptor.clone(),
                Value::Arguments(vec![Value::from("a"), Value::from("9"), Value::Bool(true)])
            ),
            Some(Value::Arguments(vec![
                Value::from("a"),
                Value::from(9),
                Value::Bool(true)
            ]))
        );
        assert_eq!(cast(descriptor.clone(), Value::Arguments(vec![])), None);
        assert_eq!(
            cast(descriptor.clone(), Value::Arguments(vec![Value::Undefined])),
            None
        );
        assert_eq!(cast(descriptor, Value::from("a")), None);
    }

    #[test]
    fn test_callback_signature_addresses_arguments_by_position() {
        let descriptor = json!({"0": "DOMString", "1": "Callback", "_optional": {"1": true}});
        assert_eq!(pattern(descriptor.clone()).kind(), PatternKind::Callback);

        assert_eq!(
            cast(descriptor.clone(), Value::Arguments(vec![Value::from(5)])),
            Some(Value::Arguments(vec![Value::from("5")]))
        );
        assert!(matches(descriptor.clone(), &Value::Arguments(vec![Value::from("x")])));

        let done = Value::function("done");
        assert_eq!(
            cast(descriptor.clone(), Value::Array(vec![Value::from("x"), done.clone()])),
            Some(Value::Array(vec![Value::from("x"), done]))
        );
        assert_eq!(
            cast(descriptor.clone(), Value::Arguments(vec![Value::from("x"), Value::from(1)])),
            None
        );
        assert!(!matches(descriptor, &Value::Arguments(vec![])));
    }

    #[test]
    fn test_callback_signature_copy_keeps_list_variant() {
        let registry = TypedefRegistry::empty();
        let pattern = pattern(json!({"0": "long", "1": "Callback"}));
        let done = Value::function("done");
        let source = Value::Arguments(vec![Value::from("7"), done.clone(), Value::Null]);

        let copy = Matcher::new(&pattern, &registry).copy(&source).unwrap();
        assert_eq!(copy, Value::Arguments(vec![Value::from(7), done, Value::Null]));
        let Value::Arguments(items) = &source else {
            panic!("source changed variant");
        };
        assert_eq!(items[0], Value::from("7"));
    }

    #[test]
    fn test_arguments_pattern_accepts_index_keyed_object() {
        let descriptor = json!({"0": "DOMString", "1": "long", "_optional": {"1": true}});
        let object = Value::Object(Object::new().with("0", 5).with("1", "9").with("rest", true));
        assert_eq!(
            cast(descriptor.clone(), object.clone()),
            Some(Value::Object(Object::new().with("0", "5").with("1", 9).with("rest", true)))
        );

        let registry = TypedefRegistry::empty();
        let pattern = pattern(descriptor);
        let copy = Matcher::new(&pattern, &registry).copy(&object).unwrap();
        assert_eq!(copy.get("0"), Some(&Value::from("5")));
        assert_eq!(copy.get("rest"), Some(&Value::Bool(true)));
        assert_eq!(object.get("0"), Some(&Value::from(5)));

        assert_eq!(
            Matcher::new(&pattern, &registry).cast(Value::Object(Object::new().with("1", 2))),
            None
        );
    }

    #[test]
    fn test_skip_slot() {
        assert_eq!(skip_slot(&Value::Null, true), Some(true));
        assert_eq!(skip_slot(&Value::Undefined, true), Some(true));
        assert_eq!(skip_slot(&Value::Undefined, false), Some(false));
        assert_eq!(skip_slot(&Value::Null, false), None);
        assert_eq!(skip_slot(&Value::from(1), true), None);
    }
}
