//! # pyudf types
//!
//! The engine side of the pyudf bridge: the logical type catalog and the
//! typed, possibly-null values that user-defined functions consume and
//! produce.
//!
//! ## Module Structure
//!
//! - [`logical_type`]: Schema-level types (`INTEGER`, `DECIMAL(w,s)`, `STRUCT(...)`, ...)
//! - [`value`]: Typed values with a payload that agrees with their type
//! - [`interval`]: Month/day/microsecond intervals
//! - [`error`]: Errors raised by value and type construction

pub mod error;
pub mod interval;
pub mod logical_type;
pub mod value;

// Re-export main types for convenience
pub use error::{ValueError, ValueResult};
pub use interval::Interval;
pub use logical_type::{LogicalType, LogicalTypeId, StructField, MAX_DECIMAL_SCALE, MAX_DECIMAL_WIDTH};
pub use value::{Payload, Value};

// Payload crates, so callers build values against the same versions
pub use chrono;
pub use rust_decimal;
pub use uuid;
