//! Error Types for the Value Bridge
//!
//! ## Error Categories
//!
//! - Unsupported logical types (engine to native)
//! - Shape and type mismatches (native to engine)
//! - Arity mismatches when a positional batch runs short
//! - Exceptions raised by native iterators while being consumed
//!
//! Errors raised inside nested values are wrapped in [`PyBridgeError::AtPath`]
//! so the rendered message points at the offending element.

use std::collections::VecDeque;
use std::fmt;

use pyudf_types::{LogicalType, ValueError};
use smol_str::SmolStr;
use thiserror::Error;

/// Result type for bridge operations
pub type PyBridgeResult<T> = Result<T, PyBridgeError>;

/// Bridge error types
#[derive(Error, Debug, Clone)]
pub enum PyBridgeError {
    /// Logical type has no native mapping
    #[error("unsupported logical type: {logical_type}")]
    UnsupportedType {
        /// Rendered logical type
        logical_type: String,
    },

    /// Native object could not be coerced to the target type
    #[error("conversion failed: cannot convert {from_type} to {to_type}: {reason}")]
    ConversionFailed {
        /// Native type name
        from_type: String,
        /// Target logical type
        to_type: String,
        /// Reason for failure
        reason: String,
    },

    /// Object kind does not fit the target type at all
    #[error("type mismatch: expected {expected}, got {actual}")]
    TypeMismatch {
        /// Expected kind
        expected: String,
        /// Actual kind received
        actual: String,
    },

    /// Numeric overflow during conversion
    #[error("numeric overflow: {value} cannot be represented as {target_type}")]
    NumericOverflow {
        /// String representation of the value
        value: String,
        /// Target type name
        target_type: String,
    },

    /// Mapping lacks a declared struct field
    #[error("missing struct field '{field}' for {struct_type}")]
    MissingStructField {
        /// Field name
        field: String,
        /// Rendered struct type
        struct_type: String,
    },

    /// Mapping has a key the struct does not declare
    #[error("unexpected struct field '{field}' for {struct_type}")]
    UnexpectedStructField {
        /// Offending key
        field: String,
        /// Rendered struct type
        struct_type: String,
    },

    /// Iterator ran out before every positional type was filled
    #[error("wrong number of arguments: expected {expected}, got {actual}")]
    ArityMismatch {
        /// Expected count
        expected: usize,
        /// Actual count
        actual: usize,
    },

    /// Native exception was raised
    #[error("Python exception: {exception_type}: {message}")]
    PythonException {
        /// Exception type (e.g., "TypeError", "ValueError")
        exception_type: String,
        /// Exception message
        message: String,
        /// Optional traceback
        traceback: Option<String>,
    },

    /// Object cannot be used as a dict key
    #[error("unhashable type: '{type_name}'")]
    Unhashable {
        /// Native type name
        type_name: String,
    },

    /// Nesting exceeds the configured limit
    #[error("nesting deeper than {limit} levels")]
    NestingTooDeep {
        /// Configured limit
        limit: usize,
    },

    /// NULL where an object was required
    #[error("null value: {context}")]
    NullObject {
        /// Context where null was encountered
        context: String,
    },

    /// String encoding error
    #[error("string encoding error: {message}")]
    EncodingError {
        /// Error message
        message: String,
    },

    /// Engine rejected the converted value
    #[error(transparent)]
    InvalidValue(#[from] ValueError),

    /// Error raised inside a nested value
    #[error("at {path}: {source}")]
    AtPath {
        /// Location of the failing element
        path: ConversionPath,
        /// Underlying error
        #[source]
        source: Box<PyBridgeError>,
    },
}

impl PyBridgeError {
    /// Create an unsupported type error
    pub fn unsupported_type(logical_type: &LogicalType) -> Self {
        PyBridgeError::UnsupportedType {
            logical_type: logical_type.to_string(),
        }
    }

    /// Create a native exception error
    pub fn exception(
        exception_type: impl Into<String>,
        message: impl Into<String>,
        traceback: Option<String>,
    ) -> Self {
        PyBridgeError::PythonException {
            exception_type: exception_type.into(),
            message: message.into(),
            traceback,
        }
    }

    /// Create a conversion failed error
    pub fn conversion_failed(
        from_type: impl Into<String>,
        to_type: impl ToString,
        reason: impl Into<String>,
    ) -> Self {
        PyBridgeError::ConversionFailed {
            from_type: from_type.into(),
            to_type: to_type.to_string(),
            reason: reason.into(),
        }
    }

    /// Create a type mismatch error
    pub fn type_mismatch(expected: impl ToString, actual: impl Into<String>) -> Self {
        PyBridgeError::TypeMismatch {
            expected: expected.to_string(),
            actual: actual.into(),
        }
    }

    /// Create a numeric overflow error
    pub fn numeric_overflow(value: impl ToString, target_type: impl ToString) -> Self {
        PyBridgeError::NumericOverflow {
            value: value.to_string(),
            target_type: target_type.to_string(),
        }
    }

    /// Create a missing struct field error
    pub fn missing_field(field: impl Into<String>, struct_type: &LogicalType) -> Self {
        PyBridgeError::MissingStructField {
            field: field.into(),
            struct_type: struct_type.to_string(),
        }
    }

    /// Create an unexpected struct field error
    pub fn unexpected_field(field: impl Into<String>, struct_type: &LogicalType) -> Self {
        PyBridgeError::UnexpectedStructField {
            field: field.into(),
            struct_type: struct_type.to_string(),
        }
    }

    /// Create an arity mismatch error
    pub fn arity_mismatch(expected: usize, actual: usize) -> Self {
        PyBridgeError::ArityMismatch { expected, actual }
    }

    /// Create an unhashable key error
    pub fn unhashable(type_name: impl Into<String>) -> Self {
        PyBridgeError::Unhashable {
            type_name: type_name.into(),
        }
    }

    /// Create a null object error
    pub fn null_object(context: impl Into<String>) -> Self {
        PyBridgeError::NullObject {
            context: context.into(),
        }
    }

    /// Create an encoding error
    pub fn encoding_error(message: impl Into<String>) -> Self {
        PyBridgeError::EncodingError {
            message: message.into(),
        }
    }

    /// Attach the position this error was raised under.
    ///
    /// Called while unwinding, so `segment` is prepended: the outermost
    /// container ends up first in the path.
    pub fn within(self, segment: PathSegment) -> Self {
        match self {
            PyBridgeError::AtPath { mut path, source } => {
                path.segments.push_front(segment);
                PyBridgeError::AtPath { path, source }
            }
            other => PyBridgeError::AtPath {
                path: ConversionPath::from(segment),
                source: Box::new(other),
            },
        }
    }

    /// The error with any path wrapping removed
    pub fn root_cause(&self) -> &PyBridgeError {
        match self {
            PyBridgeError::AtPath { source, .. } => source.root_cause(),
            other => other,
        }
    }

    /// Where the error was raised, if inside a nested value
    pub fn path(&self) -> Option<&ConversionPath> {
        match self {
            PyBridgeError::AtPath { path, .. } => Some(path),
            _ => None,
        }
    }

    /// Check if this is a type-related error
    pub fn is_type_error(&self) -> bool {
        matches!(
            self.root_cause(),
            PyBridgeError::ConversionFailed { .. }
                | PyBridgeError::TypeMismatch { .. }
                | PyBridgeError::MissingStructField { .. }
                | PyBridgeError::UnexpectedStructField { .. }
                | PyBridgeError::Unhashable { .. }
        )
    }

    /// Check if this is an unsupported-type error
    pub fn is_unsupported(&self) -> bool {
        matches!(self.root_cause(), PyBridgeError::UnsupportedType { .. })
    }

    /// Check if this is an arity error
    pub fn is_arity_error(&self) -> bool {
        matches!(self.root_cause(), PyBridgeError::ArityMismatch { .. })
    }

    /// Check if this is a native exception
    pub fn is_python_exception(&self) -> bool {
        matches!(self.root_cause(), PyBridgeError::PythonException { .. })
    }
}

// ============================================================================
// Conversion paths
// ============================================================================

/// One step into a nested value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    /// Positional argument of a batch conversion
    Argument(usize),
    /// List or tuple element
    Index(usize),
    /// Struct field
    Field(SmolStr),
    /// Key of the n-th map entry
    MapKey(usize),
    /// Value of the n-th map entry
    MapValue(usize),
}

/// Location of an element inside a converted value, outermost first.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ConversionPath {
    segments: VecDeque<PathSegment>,
}

impl ConversionPath {
    /// Segments, outermost first
    pub fn segments(&self) -> impl Iterator<Item = &PathSegment> {
        self.segments.iter()
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
}

impl From<PathSegment> for ConversionPath {
    fn from(segment: PathSegment) -> Self {
        Self {
            segments: VecDeque::from([segment]),
        }
    }
}

impl fmt::Display for ConversionPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.segments.is_empty() {
            return write!(f, "<root>");
        }
        for (i, segment) in self.segments.iter().enumerate() {
            match segment {
                PathSegment::Argument(n) => write!(f, "args[{}]", n)?,
                PathSegment::Index(n) => write!(f, "[{}]", n)?,
                PathSegment::Field(name) if i == 0 => write!(f, "{}", name)?,
                PathSegment::Field(name) => write!(f, ".{}", name)?,
                PathSegment::MapKey(n) => write!(f, "[{}].key", n)?,
                PathSegment::MapValue(n) => write!(f, "[{}].value", n)?,
            }
        }
        Ok(())
    }
}

// ============================================================================
// Diagnostics
// ============================================================================

/// Bridge diagnostic with full context
#[derive(Debug, Clone)]
pub struct PyBridgeDiagnostic {
    /// The error
    pub error: PyBridgeError,
    /// Additional notes
    pub notes: Vec<String>,
    /// Help suggestion
    pub help: Option<String>,
}

impl PyBridgeDiagnostic {
    /// Create a new diagnostic
    pub fn new(error: PyBridgeError) -> Self {
        Self {
            error,
            notes: Vec::new(),
            help: None,
        }
    }

    /// Create a diagnostic with help text chosen from the error kind
    pub fn from_error(error: PyBridgeError) -> Self {
        let help = match error.root_cause() {
            PyBridgeError::MissingStructField { .. } => {
                Some("return a dict with every declared field, using None for NULL")
            }
            PyBridgeError::UnexpectedStructField { .. } => {
                Some("drop the extra key or enable `allow-extra-struct-fields`")
            }
            PyBridgeError::ArityMismatch { .. } => {
                Some("return one value per declared result column")
            }
            PyBridgeError::NumericOverflow { .. } => Some("declare a wider numeric type"),
            PyBridgeError::UnsupportedType { .. } => {
                Some("cast the column to a supported type before calling the function")
            }
            _ => None,
        };
        let diagnostic = Self::new(error);
        match help {
            Some(help) => diagnostic.with_help(help),
            None => diagnostic,
        }
    }

    /// Add a note
    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }

    /// Add help text
    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }
}

impl fmt::Display for PyBridgeDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "error: {}", self.error.root_cause())?;

        if let Some(path) = self.error.path() {
            writeln!(f, "  --> {}", path)?;
        }

        for note in &self.notes {
            writeln!(f, "note: {}", note)?;
        }

        if let Some(ref help) = self.help {
            writeln!(f, "help: {}", help)?;
        }

        Ok(())
    }
}
