//! Type descriptors and their classifier.
//!
//! Descriptors arrive as plain JSON data. [`classify`] decides the kind of a
//! descriptor node from its structure alone, and [`Pattern::compile`] applies
//! it once per node to build an immutable tree the matcher dispatches on.
//!
//! ## Descriptor forms
//!
//! | Descriptor                          | Kind         |
//! |-------------------------------------|--------------|
//! | `"long"`, `"DOMString"`, ...        | Primitive    |
//! | `"Callback"`                        | Function     |
//! | `["ASC", "DESC"]`                   | Enum         |
//! | `["long"]`                          | ArrayOf      |
//! | `[{...}, {...}]`                    | Union        |
//! | `{"a": "long", "_optional": {...}}` | Object       |
//! | `{"onsuccess": "Callback"}`         | Callback     |
//! | `{"_dictionary": null, ...}`        | Dictionary   |
//! | `{"0": "DOMString", "1": ...}`      | Arguments    |
//! | `"CalendarEvent"`                   | Typedef      |

use std::collections::HashSet;
use std::fmt;

use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::Value as Json;

use crate::error::{CoerceError, CoerceResult};
use crate::numeric::IntegerDomain;

/// Marker for attributes that are nullable or may be absent.
pub const OPTIONAL_KEY: &str = "_optional";
/// Ordered list of subtype shapes.
pub const DERIVED_KEY: &str = "_derived";
/// Constructor a value must have been built by.
pub const CONSTRUCTOR_KEY: &str = "_constructor";
/// Marks an open dictionary; its value is an optional whole-object pattern.
pub const DICTIONARY_KEY: &str = "_dictionary";
/// Marker string for a callback attribute or function type.
pub const CALLBACK_MARKER: &str = "Callback";

const CONTROL_KEYS: [&str; 4] = [OPTIONAL_KEY, DERIVED_KEY, CONSTRUCTOR_KEY, DICTIONARY_KEY];

/// The fixed primitive tag vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Primitive {
    /// `any`: every value.
    Any,
    /// `boolean`.
    Boolean,
    /// `byte`.
    Byte,
    /// `octet`.
    Octet,
    /// `short`.
    Short,
    /// `unsigned short`.
    UnsignedShort,
    /// `long`.
    Long,
    /// `unsigned long`.
    UnsignedLong,
    /// `long long`.
    LongLong,
    /// `unsigned long long`.
    UnsignedLongLong,
    /// `float`, also spelled `double`.
    Float,
    /// `DOMString`.
    DomString,
    /// `Date`.
    Date,
    /// `Function`, also the `Callback` marker.
    Function,
}

impl Primitive {
    /// Look up a primitive tag. `double` normalises to `float`.
    #[must_use]
    pub fn from_tag(tag: &str) -> Option<Self> {
        Some(match tag {
            "any" => Self::Any,
            "boolean" => Self::Boolean,
            "byte" => Self::Byte,
            "octet" => Self::Octet,
            "short" => Self::Short,
            "unsigned short" => Self::UnsignedShort,
            "long" => Self::Long,
            "unsigned long" => Self::UnsignedLong,
            "long long" => Self::LongLong,
            "unsigned long long" => Self::UnsignedLongLong,
            "float" | "double" => Self::Float,
            "DOMString" => Self::DomString,
            "Date" => Self::Date,
            "Function" => Self::Function,
            _ => return None,
        })
    }

    /// Canonical tag.
    #[must_use]
    pub const fn tag(self) -> &'static str {
        match self {
            Self::Any => "any",
            Self::Boolean => "boolean",
            Self::Byte => "byte",
            Self::Octet => "octet",
            Self::Short => "short",
            Self::UnsignedShort => "unsigned short",
            Self::Long => "long",
            Self::UnsignedLong => "unsigned long",
            Self::LongLong => "long long",
            Self::UnsignedLongLong => "unsigned long long",
            Self::Float => "float",
            Self::DomString => "DOMString",
            Self::Date => "Date",
            Self::Function => "Function",
        }
    }

    /// Integer domain for the integer tags.
    #[must_use]
    pub const fn integer_domain(self) -> Option<IntegerDomain> {
        match self {
            Self::Byte => Some(IntegerDomain::BYTE),
            Self::Octet => Some(IntegerDomain::OCTET),
            Self::Short => Some(IntegerDomain::SHORT),
            Self::UnsignedShort => Some(IntegerDomain::UNSIGNED_SHORT),
            Self::Long => Some(IntegerDomain::LONG),
            Self::UnsignedLong => Some(IntegerDomain::UNSIGNED_LONG),
            Self::LongLong => Some(IntegerDomain::LONG_LONG),
            Self::UnsignedLongLong => Some(IntegerDomain::UNSIGNED_LONG_LONG),
            _ => None,
        }
    }
}

impl fmt::Display for Primitive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Classified kind of a descriptor node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PatternKind {
    /// A primitive tag.
    Primitive(Primitive),
    /// A list of string literals.
    Enum,
    /// A single-element array: homogeneous sequence.
    ArrayOf,
    /// Alternatives tried in order.
    Union,
    /// An open dictionary.
    Dictionary,
    /// An object with at least one callback attribute.
    Callback,
    /// A positional argument list.
    Arguments,
    /// A plain object shape.
    Object,
    /// A name resolved through the typedef registry.
    Typedef,
}

impl PatternKind {
    /// Kind name; the typedef kind is the empty string.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Primitive(p) => p.tag(),
            Self::Enum => "Enum",
            Self::ArrayOf => "ArrayOf",
            Self::Union => "Union",
            Self::Dictionary => "Dictionary",
            Self::Callback => "Callback",
            Self::Arguments => "Arguments",
            Self::Object => "Object",
            Self::Typedef => "",
        }
    }
}

impl fmt::Display for PatternKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Classify a descriptor node.
///
/// Looks only at the descriptor. Returns `None` for JSON scalars that are not
/// descriptors (numbers, booleans, null).
#[must_use]
pub fn classify(descriptor: &Json) -> Option<PatternKind> {
    match descriptor {
        Json::Array(items) => Some(match items.as_slice() {
            [_] => PatternKind::ArrayOf,
            [Json::String(first), _, ..] if !first.is_empty() => PatternKind::Enum,
            _ => PatternKind::Union,
        }),
        Json::Object(map) => Some(if map.contains_key(DICTIONARY_KEY) {
            PatternKind::Dictionary
        } else if map.values().any(|v| v.as_str() == Some(CALLBACK_MARKER)) {
            PatternKind::Callback
        } else if map.contains_key("0") {
            PatternKind::Arguments
        } else {
            PatternKind::Object
        }),
        Json::String(tag) if tag == CALLBACK_MARKER => {
            Some(PatternKind::Primitive(Primitive::Function))
        }
        Json::String(tag) => Some(
            Primitive::from_tag(tag).map_or(PatternKind::Typedef, PatternKind::Primitive),
        ),
        Json::Null | Json::Bool(_) | Json::Number(_) => None,
    }
}

/// Attribute shape shared by object, callback and dictionary patterns.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Shape {
    /// Declared attributes in declaration order.
    pub attributes: IndexMap<String, Pattern>,
    /// Attributes that may be null or absent.
    pub optional: HashSet<String>,
    /// Subtype alternatives, tried in order.
    pub derived: Vec<Pattern>,
    /// Constructor the value must be an instance of.
    pub constructor: Option<String>,
}

impl Shape {
    /// Whether `name` is marked optional.
    #[must_use]
    pub fn is_optional(&self, name: &str) -> bool {
        self.optional.contains(name)
    }

    fn compile(map: &serde_json::Map<String, Json>) -> CoerceResult<Self> {
        let mut shape = Self {
            optional: compile_optional(map)?,
            ..Self::default()
        };

        if let Some(derived) = map.get(DERIVED_KEY) {
            let items = derived.as_array().ok_or_else(|| {
                CoerceError::InvalidPattern(format!("{DERIVED_KEY} must be an array"))
            })?;
            shape.derived = items.iter().map(Pattern::compile).collect::<CoerceResult<_>>()?;
        }

        if let Some(constructor) = map.get(CONSTRUCTOR_KEY) {
            let name = constructor.as_str().ok_or_else(|| {
                CoerceError::InvalidPattern(format!("{CONSTRUCTOR_KEY} must be a string"))
            })?;
            shape.constructor = Some(name.to_string());
        }

        for (key, descriptor) in map {
            if CONTROL_KEYS.contains(&key.as_str()) {
                continue;
            }
            let pattern = Pattern::compile(descriptor)
                .map_err(|e| CoerceError::InvalidPattern(format!("attribute {key:?}: {e}")))?;
            shape.attributes.insert(key.clone(), pattern);
        }

        Ok(shape)
    }
}

/// Positional parameters of an argument list.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ArgumentList {
    /// Parameter patterns by position, ascending.
    pub params: Vec<(usize, Pattern)>,
    /// Positions that may be missing or null.
    pub optional: HashSet<usize>,
}

impl ArgumentList {
    /// Whether position `index` is optional.
    #[must_use]
    pub fn is_optional(&self, index: usize) -> bool {
        self.optional.contains(&index)
    }

    fn compile(map: &serde_json::Map<String, Json>) -> CoerceResult<Self> {
        let optional = compile_optional(map)?
            .iter()
            .map(|key| parse_position(key))
            .collect::<CoerceResult<_>>()?;

        let mut params = Vec::new();
        for (key, descriptor) in map {
            if CONTROL_KEYS.contains(&key.as_str()) {
                continue;
            }
            let index = parse_position(key)?;
            let pattern = Pattern::compile(descriptor)
                .map_err(|e| CoerceError::InvalidPattern(format!("argument {index}: {e}")))?;
            params.push((index, pattern));
        }
        params.sort_by_key(|(index, _)| *index);

        Ok(Self { params, optional })
    }
}

fn parse_position(key: &str) -> CoerceResult<usize> {
    key.parse()
        .map_err(|_| CoerceError::InvalidPattern(format!("argument position {key:?} is not an index")))
}

fn compile_optional(map: &serde_json::Map<String, Json>) -> CoerceResult<HashSet<String>> {
    let Some(optional) = map.get(OPTIONAL_KEY) else {
        return Ok(HashSet::new());
    };
    let entries = optional.as_object().ok_or_else(|| {
        CoerceError::InvalidPattern(format!("{OPTIONAL_KEY} must be an object"))
    })?;
    Ok(entries
        .iter()
        .filter(|(_, flag)| flag.as_bool() == Some(true))
        .map(|(name, _)| name.clone())
        .collect())
}

/// A compiled descriptor node.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "serde_json::Value")]
pub enum Pattern {
    /// A primitive tag.
    Primitive(Primitive),
    /// String literals.
    Enum(Vec<String>),
    /// Homogeneous sequence.
    ArrayOf(Box<Pattern>),
    /// Alternatives, first success wins.
    Union(Vec<Pattern>),
    /// Plain object shape.
    Object(Shape),
    /// Object carrying callback attributes.
    Callback(Shape),
    /// Open dictionary with an optional whole-object pattern.
    Dictionary {
        /// Declared keys.
        shape: Shape,
        /// Pattern the whole object must also satisfy.
        entries: Option<Box<Pattern>>,
    },
    /// Positional argument list.
    Arguments(ArgumentList),
    /// Name looked up in the typedef registry.
    Typedef(String),
}

impl Pattern {
    /// Compile a descriptor.
    ///
    /// # Errors
    ///
    /// Returns [`CoerceError::InvalidPattern`] if a node is not a descriptor or
    /// a control key has the wrong shape.
    pub fn compile(descriptor: &Json) -> CoerceResult<Self> {
        let kind = classify(descriptor).ok_or_else(|| {
            CoerceError::InvalidPattern(format!("not a type descriptor: {descriptor}"))
        })?;

        Ok(match (kind, descriptor) {
            (PatternKind::Primitive(p), _) => Self::Primitive(p),
            (PatternKind::Typedef, Json::String(name)) => Self::Typedef(name.clone()),
            (PatternKind::Enum, Json::Array(items)) => Self::Enum(
                items
                    .iter()
                    .map(|item| {
                        item.as_str().map(str::to_string).ok_or_else(|| {
                            CoerceError::InvalidPattern(format!("enum literal must be a string: {item}"))
                        })
                    })
                    .collect::<CoerceResult<_>>()?,
            ),
            (PatternKind::ArrayOf, Json::Array(items)) => {
                let element = items.first().map(Self::compile).transpose()?;
                Self::ArrayOf(Box::new(element.unwrap_or(Self::Primitive(Primitive::Any))))
            }
            (PatternKind::Union, Json::Array(items)) => {
                Self::Union(items.iter().map(Self::compile).collect::<CoerceResult<_>>()?)
            }
            (PatternKind::Dictionary, Json::Object(map)) => {
                let entries = match map.get(DICTIONARY_KEY) {
                    None | Some(Json::Null) => None,
                    Some(descriptor) => Some(Box::new(Self::compile(descriptor)?)),
                };
                Self::Dictionary {
                    shape: Shape::compile(map)?,
                    entries,
                }
            }
            (PatternKind::Callback, Json::Object(map)) => Self::Callback(Shape::compile(map)?),
            (PatternKind::Arguments, Json::Object(map)) => {
                Self::Arguments(ArgumentList::compile(map)?)
            }
            (PatternKind::Object, Json::Object(map)) => Self::Object(Shape::compile(map)?),
            (kind, _) => {
                return Err(CoerceError::InvalidPattern(format!(
                    "kind {kind:?} does not fit descriptor {descriptor}"
                )))
            }
        })
    }

    /// Compile a descriptor as a positional argument list.
    ///
    /// Method declarations are argument lists even when they declare no
    /// parameters (`{}`), which [`classify`] would call an object.
    ///
    /// # Errors
    ///
    /// Returns [`CoerceError::InvalidPattern`] if the descriptor is not an
    /// object with index keys.
    pub fn compile_arguments(descriptor: &Json) -> CoerceResult<Self> {
        let map = descriptor.as_object().ok_or_else(|| {
            CoerceError::InvalidPattern(format!("argument list must be an object: {descriptor}"))
        })?;
        Ok(Self::Arguments(ArgumentList::compile(map)?))
    }

    /// A reference to a named type.
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self::Typedef(name.into())
    }

    /// Kind of this node.
    #[must_use]
    pub const fn kind(&self) -> PatternKind {
        match self {
            Self::Primitive(p) => PatternKind::Primitive(*p),
            Self::Enum(_) => PatternKind::Enum,
            Self::ArrayOf(_) => PatternKind::ArrayOf,
            Self::Union(_) => PatternKind::Union,
            Self::Object(_) => PatternKind::Object,
            Self::Callback(_) => PatternKind::Callback,
            Self::Dictionary { .. } => PatternKind::Dictionary,
            Self::Arguments(_) => PatternKind::Arguments,
            Self::Typedef(_) => PatternKind::Typedef,
        }
    }
}

impl From<Primitive> for Pattern {
    fn from(p: Primitive) -> Self {
        Self::Primitive(p)
    }
}

impl TryFrom<Json> for Pattern {
    type Error = CoerceError;

    fn try_from(descriptor: Json) -> Result<Self, Self::Error> {
        Self::compile(&descriptor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_classify_arrays() {
        assert_eq!(classify(&json!(["RED", "GREEN"])), Some(PatternKind::Enum));
        assert_eq!(classify(&json!(["long"])), Some(PatternKind::ArrayOf));
        assert_eq!(classify(&json!(["DOMString"])), Some(PatternKind::ArrayOf));
        assert_eq!(classify(&json!([{"a": "long"}, {"b": "long"}])), Some(PatternKind::Union));
        assert_eq!(classify(&json!(["", "x"])), Some(PatternKind::Union));
        assert_eq!(classify(&json!([])), Some(PatternKind::Union));
    }

    #[test]
    fn test_classify_objects_by_priority() {
        assert_eq!(
            classify(&json!({"_dictionary": null, "cb": "Callback", "0": "long"})),
            Some(PatternKind::Dictionary)
        );
        assert_eq!(
            classify(&json!({"onsuccess": "Callback", "0": "long"})),
            Some(PatternKind::Callback)
        );
        assert_eq!(classify(&json!({"0": "long"})), Some(PatternKind::Arguments));
        assert_eq!(classify(&json!({"a": "long"})), Some(PatternKind::Object));
        assert_eq!(classify(&json!({})), Some(PatternKind::Object));
    }

    #[test]
    fn test_classify_strings() {
        assert_eq!(
            classify(&json!("double")),
            Some(PatternKind::Primitive(Primitive::Float))
        );
        assert_eq!(
            classify(&json!("unsigned long long")),
            Some(PatternKind::Primitive(Primitive::UnsignedLongLong))
        );
        assert_eq!(
            classify(&json!("Callback")),
            Some(PatternKind::Primitive(Primitive::Function))
        );
        assert_eq!(classify(&json!("CalendarEvent")), Some(PatternKind::Typedef));
        assert_eq!(PatternKind::Typedef.name(), "");
        assert_eq!(classify(&json!(3)), None);
        assert_eq!(classify(&json!(null)), None);
    }

    #[test]
    fn test_compile_shape_controls() {
        let pattern = Pattern::compile(&json!({
            "title": "DOMString",
            "count": "unsigned long",
            "_optional": {"count": true, "title": false},
            "_constructor": "Item",
            "_derived": ["Special"],
        }))
        .unwrap();

        let Pattern::Object(shape) = pattern else {
            panic!("expected object pattern");
        };
        assert_eq!(
            shape.attributes.keys().collect::<Vec<_>>(),
            vec!["title", "count"]
        );
        assert!(shape.is_optional("count"));
        assert!(!shape.is_optional("title"));
        assert_eq!(shape.constructor.as_deref(), Some("Item"));
        assert_eq!(shape.derived, vec![Pattern::named("Special")]);
    }

    #[test]
    fn test_compile_arguments_sorted() {
        let pattern = Pattern::compile(&json!({
            "1": "Callback",
            "0": "DOMString",
            "_optional": {"1": true},
        }))
        .unwrap();
        assert_eq!(pattern.kind(), PatternKind::Callback);

        let Pattern::Arguments(args) = Pattern::compile(&json!({
            "1": "long",
            "0": "DOMString",
            "_optional": {"1": true},
        }))
        .unwrap() else {
            panic!("expected arguments pattern");
        };
        assert_eq!(args.params[0].0, 0);
        assert_eq!(args.params[1].0, 1);
        assert!(args.is_optional(1));
    }

    #[test]
    fn test_compile_arguments_forces_positional() {
        let pattern = Pattern::compile_arguments(&json!({})).unwrap();
        assert_eq!(pattern, Pattern::Arguments(ArgumentList::default()));

        let pattern =
            Pattern::compile_arguments(&json!({"0": "Callback", "1": "Callback"})).unwrap();
        assert_eq!(pattern.kind(), PatternKind::Arguments);

        assert!(Pattern::compile_arguments(&json!({"first": "long"})).is_err());
    }

    #[test]
    fn test_compile_dictionary() {
        let pattern = Pattern::compile(&json!({"known": "long", "_dictionary": null})).unwrap();
        let Pattern::Dictionary { shape, entries } = pattern else {
            panic!("expected dictionary");
        };
        assert!(entries.is_none());
        assert!(shape.attributes.contains_key("known"));
        assert!(!shape.attributes.contains_key(DICTIONARY_KEY));

        let pattern = Pattern::compile(&json!({"_dictionary": {"id": "DOMString"}})).unwrap();
        assert!(matches!(pattern, Pattern::Dictionary { entries: Some(_), .. }));
    }

    #[test]
    fn test_compile_rejects_non_descriptors() {
        assert!(Pattern::compile(&json!({"a": 5})).is_err());
        assert!(Pattern::compile(&json!({"a": "long", "_optional": true})).is_err());
        assert!(Pattern::compile(&json!(["A", 3])).is_err());
    }

    #[test]
    fn test_deserialize_via_compile() {
        let pattern: Pattern = serde_json::from_value(json!(["long"])).unwrap();
        assert_eq!(
            pattern,
            Pattern::ArrayOf(Box::new(Pattern::Primitive(Primitive::Long)))
        );
        assert!(serde_json::from_value::<Pattern>(json!(1)).is_err());
    }
}
