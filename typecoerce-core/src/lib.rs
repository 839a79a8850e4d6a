//! # typecoerce-core
//!
//! Type descriptor matching and coercion for emulated device web APIs.
//! Device-API shims describe their parameters with IDL-like descriptors and
//! validate caller data against them before touching any emulated state.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │                typecoerce-core               │
//! ├──────────────────────────────────────────────┤
//! │  Descriptors          │  Values              │
//! │  - classify()         │  - Value / ValueKind │
//! │  - Pattern::compile() │  - JS conversions    │
//! ├──────────────────────────────────────────────┤
//! │  Matcher              │  Registry            │
//! │  - matches / cast     │  - typedefs          │
//! │  - copy               │  - method signatures │
//! ├──────────────────────────────────────────────┤
//! │  TypeCast: TypeMismatch at the API boundary  │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```
//! use serde_json::json;
//! use typecoerce_core::{Matcher, Pattern, TypedefRegistry, Value};
//!
//! let registry = TypedefRegistry::empty();
//! let pattern = Pattern::compile(&json!(["long"])).unwrap();
//! let value = Value::Array(vec![Value::from(1.9), Value::from("3"), Value::from(-1.2)]);
//!
//! let cast = Matcher::new(&pattern, &registry).cast(value);
//! assert_eq!(
//!     cast,
//!     Some(Value::Array(vec![Value::from(1), Value::from(3), Value::from(-1)]))
//! );
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::float_cmp)]

pub mod error;
pub mod matcher;
pub mod numeric;
pub mod pattern;
pub mod registry;
pub mod typecast;
pub mod value;

pub use error::{CoerceError, CoerceResult};
pub use matcher::Matcher;
pub use numeric::{IntegerDomain, MAX_SAFE_INTEGER};
pub use pattern::{classify, ArgumentList, Pattern, PatternKind, Primitive, Shape};
pub use registry::{RegistryBuilder, TypedefRegistry};
pub use typecast::{ConstructorMatch, TypeCast};
pub use value::{Attributes, FunctionRef, Object, Value, ValueKind};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
