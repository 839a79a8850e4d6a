//! # typecoerce CLI
//!
//! Command-line harness for the typecoerce engine. Loads a typedef registry,
//! then matches, casts or copies one value against a descriptor, or casts an
//! argument list against a declared interface method.
//!
//! ## Usage
//!
//! ```bash
//! typecoerce --pattern '["long"]' --value '[1.9, "3", -1.2]'
//! ```
//!
//! ## With a registry:
//!
//! ```bash
//! typecoerce --registry device.json --pattern CalendarEvent --value-file event.json --mode copy
//! typecoerce --registry device.json --interface Calendar --method addEvent --value '[{"summary": 1}]'
//! ```
//!
//! ## Architecture
//!
//! - `CliArgs` - Command-line arguments parsed with clap
//! - `Invocation` - Validated request built from the arguments
//! - `run` - Executes an invocation and returns the JSON to print

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![deny(clippy::pedantic)]

use std::fs;
use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use serde_json::{json, Value as Json};
use thiserror::Error;
use typecoerce_core::{CoerceError, Matcher, Pattern, TypeCast, TypedefRegistry, Value};

/// Command-line arguments for typecoerce.
#[derive(Debug, Clone, Parser)]
#[command(name = "typecoerce")]
#[command(about = "Match and coerce values against device API type descriptors")]
#[command(version)]
pub struct CliArgs {
    /// Typedef registry file (JSON with `types`, `interfaces`, `constructors`)
    #[arg(long, env = "TYPECOERCE_REGISTRY")]
    pub registry: Option<PathBuf>,

    /// Inline JSON descriptor, primitive tag or registry type name
    #[arg(long, conflicts_with = "interface")]
    pub pattern: Option<String>,

    /// Value as tagged JSON
    #[arg(long, conflicts_with = "value_file")]
    pub value: Option<String>,

    /// File holding the value as tagged JSON
    #[arg(long)]
    pub value_file: Option<PathBuf>,

    /// What to do with the value
    #[arg(long, value_enum, default_value_t = Mode::Cast)]
    pub mode: Mode,

    /// Interface whose method arguments are checked
    #[arg(long, requires = "method")]
    pub interface: Option<String>,

    /// Method whose arguments are checked
    #[arg(long, requires = "interface")]
    pub method: Option<String>,

    /// Pretty-print the output
    #[arg(long)]
    pub pretty: bool,

    /// Emit logs as JSON lines on stderr
    #[arg(long, env = "TYPECOERCE_LOG_JSON")]
    pub log_json: bool,
}

/// Operation applied to the value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Mode {
    /// Report whether the value already fits.
    Match,
    /// Coerce the value.
    Cast,
    /// Build a coerced copy.
    Copy,
}

/// Errors raised while reading or running an invocation.
#[derive(Debug, Error)]
pub enum InputError {
    /// Neither a pattern nor a method was given.
    #[error("either --pattern or --interface/--method is required")]
    MissingTarget,
    /// No value was given.
    #[error("either --value or --value-file is required")]
    MissingValue,
    /// Argument lists are only cast.
    #[error("--mode {0:?} is not supported for method arguments")]
    UnsupportedMode(Mode),
    /// Argument lists must be JSON arrays.
    #[error("method arguments must be a JSON array")]
    ArgumentsNotArray,
    /// Engine error.
    #[error(transparent)]
    Coerce(#[from] CoerceError),
    /// Malformed JSON input.
    #[error("invalid JSON input: {0}")]
    Json(#[from] serde_json::Error),
    /// File could not be read.
    #[error("failed to read {path}: {source}")]
    Io {
        /// File that failed.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },
}

/// What an invocation checks the value against.
#[derive(Debug, Clone, PartialEq)]
pub enum Target {
    /// A descriptor.
    Pattern(Pattern),
    /// The argument list of `interface.method`.
    Method {
        /// Interface name.
        interface: String,
        /// Method name.
        method: String,
    },
}

/// A validated request.
#[derive(Debug, Clone)]
pub struct Invocation {
    /// Registry the target resolves through.
    pub registry: TypedefRegistry,
    /// Descriptor or method.
    pub target: Target,
    /// Input value.
    pub value: Value,
    /// Operation.
    pub mode: Mode,
}

impl Invocation {
    /// Load the registry and value and compile the pattern.
    ///
    /// # Errors
    ///
    /// Returns an [`InputError`] if an input is missing, unreadable or malformed.
    pub fn from_args(args: &CliArgs) -> Result<Self, InputError> {
        let registry = match &args.registry {
            Some(path) => {
                tracing::debug!("Loading registry from {}", path.display());
                TypedefRegistry::from_path(path)?
            }
            None => TypedefRegistry::empty(),
        };

        let target = match (&args.pattern, &args.interface, &args.method) {
            (Some(pattern), _, _) => Target::Pattern(parse_pattern(pattern)?),
            (None, Some(interface), Some(method)) => Target::Method {
                interface: interface.clone(),
                method: method.clone(),
            },
            _ => return Err(InputError::MissingTarget),
        };

        let text = match (&args.value, &args.value_file) {
            (Some(value), _) => value.clone(),
            (None, Some(path)) => fs::read_to_string(path).map_err(|source| InputError::Io {
                path: path.clone(),
                source,
            })?,
            (None, None) => return Err(InputError::MissingValue),
        };
        let value = Value::from_json(&serde_json::from_str(&text)?)?;

        Ok(Self {
            registry,
            target,
            value,
            mode: args.mode,
        })
    }
}

/// Parse `--pattern`: JSON if it parses, otherwise a bare tag or type name.
///
/// # Errors
///
/// Returns [`InputError::Coerce`] if the descriptor does not compile.
pub fn parse_pattern(text: &str) -> Result<Pattern, InputError> {
    let descriptor =
        serde_json::from_str::<Json>(text).unwrap_or_else(|_| Json::String(text.trim().to_string()));
    Ok(Pattern::compile(&descriptor)?)
}

/// Execute an invocation and return the JSON to print.
///
/// Match mode reports `{"matches": bool}`; cast and copy return the coerced
/// value in tagged JSON.
///
/// # Errors
///
/// Returns [`InputError::Coerce`] with a type mismatch if the value does not
/// cast, or an engine error for unknown methods.
pub fn run(invocation: Invocation) -> Result<Json, InputError> {
    let Invocation {
        registry,
        target,
        value,
        mode,
    } = invocation;

    match target {
        Target::Pattern(pattern) => {
            let matcher = Matcher::new(&pattern, &registry);
            tracing::info!("Running {mode:?} against {} pattern", matcher.kind());
            let result = match mode {
                Mode::Match => return Ok(json!({ "matches": matcher.matches(&value) })),
                Mode::Cast => matcher.cast(value),
                Mode::Copy => matcher.copy(&value),
            };
            result
                .as_ref()
                .map(Value::to_json)
                .ok_or_else(|| CoerceError::TypeMismatch(pattern.kind().to_string()).into())
        }
        Target::Method { interface, method } => {
            if mode != Mode::Cast {
                return Err(InputError::UnsupportedMode(mode));
            }
            let args = match value {
                Value::Array(items) | Value::Arguments(items) => Value::Arguments(items),
                _ => return Err(InputError::ArgumentsNotArray),
            };
            tracing::info!("Casting arguments of {interface}.{method}");
            let caster = TypeCast::new(registry.into_shared());
            let cast = caster.cast_arguments(&interface, &method, args)?;
            Ok(cast.to_json())
        }
    }
}
