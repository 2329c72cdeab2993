//! Error Types for Typed Values
//!
//! Raised when a value or logical type is constructed in a shape the
//! engine's catalog does not allow.

use thiserror::Error;

/// Result type for value construction
pub type ValueResult<T> = Result<T, ValueError>;

/// Value construction errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValueError {
    /// A child value does not carry the declared logical type
    #[error("type mismatch: expected {expected}, got {actual}")]
    TypeMismatch {
        /// Declared type
        expected: String,
        /// Type of the offending value
        actual: String,
    },

    /// Logical type is malformed
    #[error("invalid logical type: {reason}")]
    InvalidType {
        /// Why the type was rejected
        reason: String,
    },

    /// Decimal does not fit the declared width/scale
    #[error("decimal {value} does not fit DECIMAL({width},{scale})")]
    DecimalOverflow {
        /// Rendered value
        value: String,
        /// Declared width
        width: u8,
        /// Declared scale
        scale: u8,
    },

    /// Label not present in an enum dictionary
    #[error("'{label}' is not a member of {enum_type}")]
    InvalidEnumLabel {
        /// Offending label
        label: String,
        /// Rendered enum type
        enum_type: String,
    },

    /// Number does not fit the target integer kind
    #[error("{value} is out of range for {target}")]
    OutOfRange {
        /// Rendered value
        value: String,
        /// Target type
        target: String,
    },

    /// Map key is NULL
    #[error("map keys cannot be NULL")]
    NullMapKey,

    /// Map key appears twice
    #[error("duplicate map key: {key}")]
    DuplicateMapKey {
        /// Rendered key
        key: String,
    },

    /// Struct field name appears twice
    #[error("duplicate struct field: {name}")]
    DuplicateField {
        /// Field name
        name: String,
    },
}

impl ValueError {
    /// Create a type mismatch error
    pub fn type_mismatch(expected: impl ToString, actual: impl ToString) -> Self {
        ValueError::TypeMismatch {
            expected: expected.to_string(),
            actual: actual.to_string(),
        }
    }

    /// Create an invalid type error
    pub fn invalid_type(reason: impl Into<String>) -> Self {
        ValueError::InvalidType {
            reason: reason.into(),
        }
    }

    /// Create an out of range error
    pub fn out_of_range(value: impl ToString, target: impl ToString) -> Self {
        ValueError::OutOfRange {
            value: value.to_string(),
            target: target.to_string(),
        }
    }

    /// Check if this error is about a malformed type rather than a value
    pub fn is_type_error(&self) -> bool {
        matches!(
            self,
            ValueError::InvalidType { .. } | ValueError::DuplicateField { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_mismatch_message() {
        let err = ValueError::type_mismatch("INTEGER", "VARCHAR");
        assert_eq!(err.to_string(), "type mismatch: expected INTEGER, got VARCHAR");
        assert!(!err.is_type_error());
    }

    #[test]
    fn test_invalid_type_is_type_error() {
        assert!(ValueError::invalid_type("empty struct").is_type_error());
        assert!(ValueError::DuplicateField { name: "a".into() }.is_type_error());
        assert!(!ValueError::NullMapKey.is_type_error());
    }
}
