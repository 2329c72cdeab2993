//! # pyudf bridge
//!
//! Value conversion between the columnar engine and the native objects that
//! script-authored user-defined functions consume and return.
//!
//! ## Overview
//!
//! - Engine values reach a function as native objects: [`duckdb_to_py`],
//!   [`duckdbs_to_pys`] and [`struct_to_dict`].
//! - Returned objects are coerced back against declared logical types:
//!   [`convert_py_object_to_duckdb_value`] for one value and
//!   [`convert_py_objects_to_duckdb_values`] for a positional argument pack,
//!   normalized first with [`py_object_to_iterable`].
//!
//! Every native-to-engine conversion is driven by an explicit
//! [`LogicalType`]. `None` maps to a NULL of any type and every NULL maps to
//! `None`. Batch conversions keep order and either convert every element or
//! fail without a partial result.
//!
//! The free functions use the default [`ConversionOptions`]; construct a
//! [`Converter`] to change them.
//!
//! ## Example
//!
//! ```
//! use pyudf_bridge::{convert_py_objects_to_duckdb_values, py_object_to_iterable, PyValue};
//! use pyudf_types::{LogicalType, Value};
//!
//! let returned = PyValue::tuple([PyValue::Int(5), PyValue::str("hi")]);
//! let mut out = Vec::new();
//! convert_py_objects_to_duckdb_values(
//!     &py_object_to_iterable(&returned),
//!     &[LogicalType::Integer, LogicalType::Varchar],
//!     &mut out,
//! )
//! .unwrap();
//! assert_eq!(out, vec![Value::integer(5), Value::varchar("hi")]);
//! ```
//!
//! ## Module Structure
//!
//! - [`py_types`]: Native object representations
//! - [`conversion`]: The [`Converter`], conversion traits, engine to native
//! - [`coerce`]: Native to engine coercion
//! - [`iter`]: Argument normalization and positional conversion
//! - [`options`]: Conversion options
//! - [`error`]: Error types and diagnostics
//! - `python` (feature `python`): Exchange with a CPython interpreter

pub mod coerce;
pub mod conversion;
pub mod error;
pub mod iter;
pub mod options;
pub mod py_types;

#[cfg(feature = "python")]
pub mod python;

// Re-export main types for convenience
pub use conversion::{Converter, ToPython, TryFromPython, TryToPython};
pub use error::{ConversionPath, PathSegment, PyBridgeDiagnostic, PyBridgeError, PyBridgeResult};
pub use iter::py_object_to_iterable;
pub use options::{ConversionOptions, OptionsError};
pub use py_types::{HashKey, PyDict, PyIterator, PyList, PyValue};
pub use pyudf_types::{LogicalType, Value};

/// Convert one engine value to a new native object.
pub fn duckdb_to_py(value: &Value) -> PyBridgeResult<PyValue> {
    Converter::default().duckdb_to_py(value)
}

/// Convert engine values to a native `list`, element by element.
pub fn duckdbs_to_pys(values: &[Value]) -> PyBridgeResult<PyValue> {
    Converter::default().duckdbs_to_pys(values)
}

/// Convert a STRUCT value to a `dict` keyed by field name.
pub fn struct_to_dict(value: &Value) -> PyBridgeResult<PyDict> {
    Converter::default().struct_to_dict(value)
}

/// Convert a native object to a value of `logical_type`.
pub fn convert_py_object_to_duckdb_value(
    object: &PyValue,
    logical_type: &LogicalType,
) -> PyBridgeResult<Value> {
    Converter::default().convert_py_object_to_duckdb_value(object, logical_type)
}

/// Convert positional arguments pulled from `iterator` and append them to `out`.
pub fn convert_py_objects_to_duckdb_values(
    iterator: &PyValue,
    logical_types: &[LogicalType],
    out: &mut Vec<Value>,
) -> PyBridgeResult<()> {
    Converter::default().convert_py_objects_to_duckdb_values(iterator, logical_types, out)
}
