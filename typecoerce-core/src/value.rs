//! Runtime values - the JS-like data that patterns are checked against.
//!
//! [`Value`] is a closed set of kinds. [`Value::kind`] is the value-side
//! classifier: it never looks at a pattern, and the matcher compares its
//! result against primitive tags.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, TimeZone, Utc};
use indexmap::IndexMap;
use uuid::Uuid;

use crate::error::{CoerceError, CoerceResult};

/// Ordered attribute map of an object value.
pub type Attributes = IndexMap<String, Value>;

/// Tag for `undefined` in JSON interchange.
pub const UNDEFINED_TAG: &str = "$undefined";
/// Tag for dates in JSON interchange.
pub const DATE_TAG: &str = "$date";
/// Tag for function references in JSON interchange.
pub const FUNCTION_TAG: &str = "$function";
/// Tag for argument lists in JSON interchange.
pub const ARGUMENTS_TAG: &str = "$arguments";
/// Attribute naming an object's constructor in JSON interchange.
pub const CLASS_TAG: &str = "$class";

/// Runtime kind of a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
    /// `undefined`, also used for absent attributes.
    Undefined,
    /// `null`.
    Null,
    /// `true` / `false`.
    Boolean,
    /// Any IEEE-754 double, including NaN.
    Number,
    /// A string.
    String,
    /// An array.
    Array,
    /// A plain or constructed object.
    Object,
    /// A callable.
    Function,
    /// A date.
    Date,
    /// A positional call-argument list.
    Arguments,
}

impl ValueKind {
    /// Runtime type name as reported by the host.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Undefined => "Undefined",
            Self::Null => "Null",
            Self::Boolean => "Boolean",
            Self::Number => "Number",
            Self::String => "String",
            Self::Array => "Array",
            Self::Object => "Object",
            Self::Function => "Function",
            Self::Date => "Date",
            Self::Arguments => "Arguments",
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Opaque reference to a callable.
///
/// Clones share identity; two references are equal only if one was cloned
/// from the other.
#[derive(Debug, Clone)]
pub struct FunctionRef {
    id: Uuid,
    name: Arc<str>,
}

impl FunctionRef {
    /// Create a new function reference with a fresh identity.
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: Arc::from(name),
        }
    }

    /// Function name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl PartialEq for FunctionRef {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for FunctionRef {}

/// An object value: attributes plus an optional constructor name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Object {
    /// Constructor the object was created by, if any.
    pub class: Option<String>,
    /// Own enumerable attributes, in insertion order.
    pub attributes: Attributes,
}

impl Object {
    /// Create an empty plain object.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty object built by the named constructor.
    #[must_use]
    pub fn instance_of(class: impl Into<String>) -> Self {
        Self {
            class: Some(class.into()),
            attributes: Attributes::new(),
        }
    }

    /// Set an attribute.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    /// Look up an attribute.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }

    /// Whether the object was built by `class`.
    #[must_use]
    pub fn is_instance_of(&self, class: &str) -> bool {
        self.class.as_deref() == Some(class)
    }
}

/// A JS-like runtime value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// `undefined`.
    Undefined,
    /// `null`.
    Null,
    /// A boolean.
    Bool(bool),
    /// A number.
    Number(f64),
    /// A string.
    String(String),
    /// A UTC date.
    Date(DateTime<Utc>),
    /// A callable.
    Function(FunctionRef),
    /// An array.
    Array(Vec<Value>),
    /// An object.
    Object(Object),
    /// A call-argument list.
    Arguments(Vec<Value>),
}

impl Value {
    /// Classify this value.
    #[must_use]
    pub const fn kind(&self) -> ValueKind {
        match self {
            Self::Undefined => ValueKind::Undefined,
            Self::Null => ValueKind::Null,
            Self::Bool(_) => ValueKind::Boolean,
            Self::Number(_) => ValueKind::Number,
            Self::String(_) => ValueKind::String,
            Self::Date(_) => ValueKind::Date,
            Self::Function(_) => ValueKind::Function,
            Self::Array(_) => ValueKind::Array,
            Self::Object(_) => ValueKind::Object,
            Self::Arguments(_) => ValueKind::Arguments,
        }
    }

    /// Build a function value with a fresh identity.
    #[must_use]
    pub fn function(name: &str) -> Self {
        Self::Function(FunctionRef::new(name))
    }

    /// Build a date from milliseconds since the epoch.
    #[must_use]
    pub fn date_from_millis(ms: i64) -> Option<Self> {
        Utc.timestamp_millis_opt(ms).single().map(Self::Date)
    }

    /// `null` or `undefined`.
    #[must_use]
    pub const fn is_nullish(&self) -> bool {
        matches!(self, Self::Undefined | Self::Null)
    }

    /// Look up an object attribute; `None` for non-objects.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        match self {
            Self::Object(object) => object.get(key),
            _ => None,
        }
    }

    /// ToBoolean.
    #[must_use]
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Undefined | Self::Null => false,
            Self::Bool(b) => *b,
            Self::Number(n) => *n != 0.0 && !n.is_nan(),
            Self::String(s) => !s.is_empty(),
            Self::Date(_)
            | Self::Function(_)
            | Self::Array(_)
            | Self::Object(_)
            | Self::Arguments(_) => true,
        }
    }

    /// ToNumber.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn to_number(&self) -> f64 {
        match self {
            Self::Undefined | Self::Function(_) | Self::Object(_) | Self::Arguments(_) => f64::NAN,
            Self::Null => 0.0,
            Self::Bool(b) => f64::from(u8::from(*b)),
            Self::Number(n) => *n,
            Self::String(s) => string_to_number(s),
            Self::Date(d) => d.timestamp_millis() as f64,
            Self::Array(_) => string_to_number(&self.to_js_string()),
        }
    }

    /// ToString.
    #[must_use]
    pub fn to_js_string(&self) -> String {
        match self {
            Self::Undefined => "undefined".to_string(),
            Self::Null => "null".to_string(),
            Self::Bool(b) => b.to_string(),
            Self::Number(n) => number_to_string(*n),
            Self::String(s) => s.clone(),
            Self::Date(d) => d
                .format("%a %b %d %Y %H:%M:%S GMT+0000 (Coordinated Universal Time)")
                .to_string(),
            Self::Function(f) => format!("function {}() {{ [native code] }}", f.name()),
            Self::Array(items) => items
                .iter()
                .map(|item| {
                    if item.is_nullish() {
                        String::new()
                    } else {
                        item.to_js_string()
                    }
                })
                .collect::<Vec<_>>()
                .join(","),
            Self::Object(_) => "[object Object]".to_string(),
            Self::Arguments(_) => "[object Arguments]".to_string(),
        }
    }

    /// `parseFloat` applied to the string form of this value.
    #[must_use]
    pub fn parse_float(&self) -> f64 {
        parse_float_prefix(&self.to_js_string())
    }

    /// Read a value from JSON, honouring the `$`-tagged forms for the
    /// kinds JSON cannot express.
    ///
    /// # Errors
    ///
    /// Returns [`CoerceError::InvalidValue`] if a tagged form is malformed.
    pub fn from_json(json: &serde_json::Value) -> CoerceResult<Self> {
        use serde_json::Value as Json;

        Ok(match json {
            Json::Null => Self::Null,
            Json::Bool(b) => Self::Bool(*b),
            Json::Number(n) => Self::Number(n.as_f64().unwrap_or(f64::NAN)),
            Json::String(s) => Self::String(s.clone()),
            Json::Array(items) => Self::Array(
                items
                    .iter()
                    .map(Self::from_json)
                    .collect::<CoerceResult<_>>()?,
            ),
            Json::Object(map) => {
                if map.len() == 1 {
                    if let Some((tag, inner)) = map.iter().next() {
                        if let Some(value) = Self::from_tagged(tag, inner)? {
                            return Ok(value);
                        }
                    }
                }
                let mut object = Object::new();
                for (key, inner) in map {
                    if key == CLASS_TAG {
                        let class = inner.as_str().ok_or_else(|| {
                            CoerceError::InvalidValue(format!("{CLASS_TAG} must be a string"))
                        })?;
                        object.class = Some(class.to_string());
                    } else {
                        object.attributes.insert(key.clone(), Self::from_json(inner)?);
                    }
                }
                Self::Object(object)
            }
        })
    }

    fn from_tagged(tag: &str, inner: &serde_json::Value) -> CoerceResult<Option<Self>> {
        let value = match tag {
            UNDEFINED_TAG => Self::Undefined,
            FUNCTION_TAG => Self::function(inner.as_str().ok_or_else(|| {
                CoerceError::InvalidValue(format!("{FUNCTION_TAG} must be a string"))
            })?),
            ARGUMENTS_TAG => {
                let items = inner.as_array().ok_or_else(|| {
                    CoerceError::InvalidValue(format!("{ARGUMENTS_TAG} must be an array"))
                })?;
                Self::Arguments(
                    items
                        .iter()
                        .map(Self::from_json)
                        .collect::<CoerceResult<_>>()?,
                )
            }
            DATE_TAG => Self::Date(parse_date(inner)?),
            _ => return Ok(None),
        };
        Ok(Some(value))
    }

    /// Write this value as JSON using the same tagged forms as [`Value::from_json`].
    ///
    /// Non-finite numbers have no JSON form and are written as `null`.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::{json, Value as Json};

        match self {
            Self::Undefined => json!({ UNDEFINED_TAG: true }),
            Self::Null => Json::Null,
            Self::Bool(b) => Json::Bool(*b),
            Self::Number(n) => number_to_json(*n),
            Self::String(s) => Json::String(s.clone()),
            Self::Date(d) => json!({ DATE_TAG: d.to_rfc3339_opts(SecondsFormat::Millis, true) }),
            Self::Function(f) => json!({ FUNCTION_TAG: f.name() }),
            Self::Array(items) => Json::Array(items.iter().map(Self::to_json).collect()),
            Self::Arguments(items) => {
                json!({ ARGUMENTS_TAG: items.iter().map(Self::to_json).collect::<Vec<_>>() })
            }
            Self::Object(object) => {
                let mut map = serde_json::Map::new();
                if let Some(class) = &object.class {
                    map.insert(CLASS_TAG.to_string(), Json::String(class.clone()));
                }
                for (key, value) in &object.attributes {
                    map.insert(key.clone(), value.to_json());
                }
                Json::Object(map)
            }
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Self::Number(f64::from(n))
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Self::Array(items)
    }
}

impl From<Object> for Value {
    fn from(object: Object) -> Self {
        Self::Object(object)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(date: DateTime<Utc>) -> Self {
        Self::Date(date)
    }
}

fn parse_date(inner: &serde_json::Value) -> CoerceResult<DateTime<Utc>> {
    if let Some(ms) = inner.as_i64() {
        return Utc
            .timestamp_millis_opt(ms)
            .single()
            .ok_or_else(|| CoerceError::InvalidValue(format!("date out of range: {ms}")));
    }
    let text = inner
        .as_str()
        .ok_or_else(|| CoerceError::InvalidValue(format!("{DATE_TAG} must be ms or RFC 3339")))?;
    DateTime::parse_from_rfc3339(text)
        .map(|d| d.with_timezone(&Utc))
        .map_err(|e| CoerceError::InvalidValue(format!("bad date {text:?}: {e}")))
}

#[allow(clippy::cast_possible_truncation)]
fn number_to_json(n: f64) -> serde_json::Value {
    if n.fract() == 0.0 && n.abs() <= crate::numeric::MAX_SAFE_INTEGER {
        // Integral and within i64 by the bound above.
        serde_json::Value::from(n as i64)
    } else {
        serde_json::Number::from_f64(n).map_or(serde_json::Value::Null, serde_json::Value::Number)
    }
}

/// Number-to-string conversion following the host's formatting.
#[must_use]
pub fn number_to_string(n: f64) -> String {
    if n.is_nan() {
        return "NaN".to_string();
    }
    if n.is_infinite() {
        return if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }
    if n == 0.0 {
        return "0".to_string();
    }
    // Display and LowerExp both print the shortest round-trip digits.
    let magnitude = n.abs();
    if magnitude >= 1e21 || magnitude < 1e-6 {
        let text = format!("{n:e}");
        return match text.split_once('e') {
            Some((mantissa, exp)) if !exp.starts_with('-') => format!("{mantissa}e+{exp}"),
            _ => text,
        };
    }
    format!("{n}")
}

/// String-to-number conversion: whole string, whitespace trimmed.
fn string_to_number(s: &str) -> f64 {
    let text = s.trim();
    if text.is_empty() {
        return 0.0;
    }
    match text {
        "Infinity" | "+Infinity" => return f64::INFINITY,
        "-Infinity" => return f64::NEG_INFINITY,
        _ => {}
    }
    for (prefix, radix) in [("0x", 16), ("0X", 16), ("0o", 8), ("0O", 8), ("0b", 2), ("0B", 2)] {
        if let Some(digits) = text.strip_prefix(prefix) {
            return parse_radix(digits, radix);
        }
    }
    // Rust also accepts "inf" and "nan"; restrict to decimal literal characters.
    if !text
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, '.' | 'e' | 'E' | '+' | '-'))
    {
        return f64::NAN;
    }
    text.parse::<f64>().unwrap_or(f64::NAN)
}

fn parse_radix(digits: &str, radix: u32) -> f64 {
    if digits.is_empty() {
        return f64::NAN;
    }
    digits.chars().try_fold(0.0_f64, |acc, c| {
        c.to_digit(radix)
            .map(|d| acc.mul_add(f64::from(radix), f64::from(d)))
    })
    .unwrap_or(f64::NAN)
}

/// Longest numeric prefix of `s`, as `parseFloat` reads it.
fn parse_float_prefix(s: &str) -> f64 {
    let text = s.trim_start();
    let bytes = text.as_bytes();
    let mut end = 0;

    if matches!(bytes.first(), Some(b'+' | b'-')) {
        end = 1;
    }
    if text[end..].starts_with("Infinity") {
        return if text.starts_with('-') {
            f64::NEG_INFINITY
        } else {
            f64::INFINITY
        };
    }

    let int_start = end;
    while bytes.get(end).is_some_and(u8::is_ascii_digit) {
        end += 1;
    }
    let mut digits = end - int_start;
    if bytes.get(end) == Some(&b'.') {
        let frac_start = end + 1;
        let mut frac_end = frac_start;
        while bytes.get(frac_end).is_some_and(u8::is_ascii_digit) {
            frac_end += 1;
        }
        digits += frac_end - frac_start;
        if digits > 0 {
            end = frac_end;
        }
    }
    if digits == 0 {
        return f64::NAN;
    }
    if matches!(bytes.get(end), Some(b'e' | b'E')) {
        let mut exp_end = end + 1;
        if matches!(bytes.get(exp_end), Some(b'+' | b'-')) {
            exp_end += 1;
        }
        let exp_digits_start = exp_end;
        while bytes.get(exp_end).is_some_and(u8::is_ascii_digit) {
            exp_end += 1;
        }
        if exp_end > exp_digits_start {
            end = exp_end;
        }
    }
    text[..end].parse::<f64>().unwrap_or(f64::NAN)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_kind_names() {
        assert_eq!(Value::Null.kind().to_string(), "Null");
        assert_eq!(Value::from(1.5).kind().to_string(), "Number");
        assert_eq!(Value::Array(vec![]).kind().to_string(), "Array");
        assert_eq!(Value::Arguments(vec![]).kind().to_string(), "Arguments");
        assert_eq!(Value::function("f").kind().to_string(), "Function");
        assert_eq!(Value::Object(Object::new()).kind().to_string(), "Object");
    }

    #[test]
    fn test_to_number() {
        assert_eq!(Value::from("  42 ").to_number(), 42.0);
        assert_eq!(Value::from("").to_number(), 0.0);
        assert_eq!(Value::from("0x1f").to_number(), 31.0);
        assert_eq!(Value::from("-Infinity").to_number(), f64::NEG_INFINITY);
        assert!(Value::from("inf").to_number().is_nan());
        assert!(Value::from("12abc").to_number().is_nan());
        assert_eq!(Value::Bool(true).to_number(), 1.0);
        assert_eq!(Value::Null.to_number(), 0.0);
        assert!(Value::Undefined.to_number().is_nan());
        assert_eq!(Value::Array(vec![Value::from(7)]).to_number(), 7.0);
        assert_eq!(Value::Array(vec![]).to_number(), 0.0);
    }

    #[test]
    fn test_number_to_string() {
        assert_eq!(number_to_string(123.0), "123");
        assert_eq!(number_to_string(-0.0), "0");
        assert_eq!(number_to_string(1.5), "1.5");
        assert_eq!(number_to_string(f64::NAN), "NaN");
        assert_eq!(number_to_string(f64::NEG_INFINITY), "-Infinity");
        assert_eq!(number_to_string(1e21), "1e+21");
        assert_eq!(number_to_string(1e-7), "1e-7");
        assert_eq!(number_to_string(-2.5e-9), "-2.5e-9");
        assert_eq!(number_to_string(0.000_001), "0.000001");
        assert_eq!(number_to_string(2f64.powi(60)), "1152921504606847000");
        assert_eq!(number_to_string(1.234_567_890_123_456_8e20), "123456789012345680000");
    }

    #[test]
    fn test_to_js_string() {
        assert_eq!(Value::Null.to_js_string(), "null");
        assert_eq!(Value::Undefined.to_js_string(), "undefined");
        assert_eq!(Value::Bool(false).to_js_string(), "false");
        let arr = Value::Array(vec![Value::from(1), Value::Null, Value::from("x")]);
        assert_eq!(arr.to_js_string(), "1,,x");
        let date = Value::date_from_millis(0).unwrap();
        assert_eq!(
            date.to_js_string(),
            "Thu Jan 01 1970 00:00:00 GMT+0000 (Coordinated Universal Time)"
        );
    }

    #[test]
    fn test_parse_float() {
        assert_eq!(Value::from("3.5abc").parse_float(), 3.5);
        assert_eq!(Value::from("  -2e3x").parse_float(), -2000.0);
        assert_eq!(Value::from(".25").parse_float(), 0.25);
        assert_eq!(Value::from("1e").parse_float(), 1.0);
        assert_eq!(Value::from("Infinityx").parse_float(), f64::INFINITY);
        assert!(Value::from("abc").parse_float().is_nan());
        assert!(Value::Bool(true).parse_float().is_nan());
        assert!(Value::Null.parse_float().is_nan());
        assert_eq!(Value::from(12.0).parse_float(), 12.0);
    }

    #[test]
    fn test_truthiness() {
        assert!(!Value::from(0).is_truthy());
        assert!(!Value::from(f64::NAN).is_truthy());
        assert!(!Value::from("").is_truthy());
        assert!(Value::from("0").is_truthy());
        assert!(Value::Object(Object::new()).is_truthy());
    }

    #[test]
    fn test_function_identity() {
        let f = FunctionRef::new("onsuccess");
        let g = FunctionRef::new("onsuccess");
        assert_eq!(f, f.clone());
        assert_ne!(f, g);
    }

    #[test]
    fn test_from_json_tags() {
        let value = Value::from_json(&json!({
            "$class": "CalendarEvent",
            "summary": "Lunch",
            "start": {"$date": "2012-05-01T12:00:00Z"},
            "cb": {"$function": "done"},
            "missing": {"$undefined": true},
        }))
        .unwrap();

        let Value::Object(object) = &value else {
            panic!("expected object, got {value:?}");
        };
        assert!(object.is_instance_of("CalendarEvent"));
        assert_eq!(object.get("summary"), Some(&Value::from("Lunch")));
        assert!(matches!(object.get("start"), Some(Value::Date(_))));
        assert!(matches!(object.get("cb"), Some(Value::Function(f)) if f.name() == "done"));
        assert_eq!(object.get("missing"), Some(&Value::Undefined));
    }

    #[test]
    fn test_from_json_rejects_bad_date() {
        let err = Value::from_json(&json!({"$date": "yesterday"})).unwrap_err();
        assert!(matches!(err, CoerceError::InvalidValue(_)));
    }

    #[test]
    fn test_from_json_rejects_unnamed_function() {
        let err = Value::from_json(&json!({"$function": 7})).unwrap_err();
        assert!(matches!(err, CoerceError::InvalidValue(_)));
        let err = Value::from_json(&json!({"cb": {"$function": null}})).unwrap_err();
        assert!(matches!(err, CoerceError::InvalidValue(_)));
    }

    #[test]
    fn test_to_json() {
        let value = Value::Object(
            Object::instance_of("Point")
                .with("x", 1)
                .with("y", 2.5)
                .with("tags", Value::Array(vec![Value::from("a")])),
        );
        assert_eq!(
            value.to_json(),
            json!({"$class": "Point", "x": 1, "y": 2.5, "tags": ["a"]})
        );
        assert_eq!(Value::from(f64::NAN).to_json(), serde_json::Value::Null);
        assert_eq!(
            Value::Arguments(vec![Value::Undefined]).to_json(),
            json!({"$arguments": [{"$undefined": true}]})
        );
    }
}
