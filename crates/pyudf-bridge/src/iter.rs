//! Positional argument handling
//!
//! A user-defined function returns either one object or an argument pack.
//! [`py_object_to_iterable`] turns both shapes into an iterator, and
//! [`Converter::convert_py_objects_to_duckdb_values`] pulls one object per
//! declared type from it.
//!
//! ## Normalization rules
//!
//! | Object | Iterator over |
//! |---|---|
//! | iterator or generator | the same iterator, continuing where it left off |
//! | `tuple`, `list` | their elements |
//! | anything else, including `None`, `str`, `dict` | the object itself, once |

use pyudf_types::{LogicalType, Value};
use tracing::{debug, trace};

use crate::conversion::Converter;
use crate::error::{PathSegment, PyBridgeError, PyBridgeResult};
use crate::py_types::{PyIterator, PyValue};

/// Normalize any object into an iterator of positional arguments.
///
/// An iterator comes back as a new handle to itself; `list` elements are
/// captured when this is called.
pub fn py_object_to_iterable(object: &PyValue) -> PyValue {
    let iterator = match object {
        PyValue::Iterator(it) => it.clone(),
        PyValue::Tuple(items) => PyIterator::from_values(items.clone(), "tuple_iterator"),
        PyValue::List(list) => PyIterator::from_values(list.to_vec(), "list_iterator"),
        single => PyIterator::from_values(vec![single.clone()], "tuple_iterator"),
    };
    trace!(
        "Normalized {} into {}",
        object.type_name(),
        iterator.type_name()
    );
    PyValue::Iterator(iterator)
}

impl Converter {
    /// See [`py_object_to_iterable`].
    pub fn py_object_to_iterable(&self, object: &PyValue) -> PyValue {
        py_object_to_iterable(object)
    }

    /// Pull one object per entry of `logical_types` from `iterator`, convert
    /// each against its positional type and append the results to `out`.
    ///
    /// Exactly `logical_types.len()` objects are pulled. When the iterator
    /// runs out first the call fails with [`PyBridgeError::ArityMismatch`].
    /// On any failure `out` is left as it was.
    pub fn convert_py_objects_to_duckdb_values(
        &self,
        iterator: &PyValue,
        logical_types: &[LogicalType],
        out: &mut Vec<Value>,
    ) -> PyBridgeResult<()> {
        let PyValue::Iterator(it) = iterator else {
            return Err(PyBridgeError::type_mismatch("iterator", iterator.type_name()));
        };
        debug!(
            "Converting {} positional arguments from {}",
            logical_types.len(),
            it.type_name()
        );

        for (i, logical_type) in logical_types.iter().enumerate() {
            logical_type
                .validate()
                .map_err(|e| PyBridgeError::from(e).within(PathSegment::Argument(i)))?;
        }

        let mut converted = Vec::with_capacity(logical_types.len());
        for (i, logical_type) in logical_types.iter().enumerate() {
            let object = match it.next_item() {
                Some(item) => item.map_err(|e| e.within(PathSegment::Argument(i)))?,
                None => return Err(PyBridgeError::arity_mismatch(logical_types.len(), i)),
            };
            let value = self
                .coerce(&object, logical_type, 0)
                .map_err(|e| e.within(PathSegment::Argument(i)))?;
            converted.push(value);
        }

        out.extend(converted);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::py_types::{PyDict, PyList};
    use pretty_assertions::assert_eq;

    fn drain(object: &PyValue) -> Vec<PyValue> {
        match object {
            PyValue::Iterator(it) => it.clone().map(|item| item.unwrap()).collect(),
            other => panic!("expected an iterator, got {}", other),
        }
    }

    #[test]
    fn test_scalar_becomes_single_item() {
        for object in [
            PyValue::Int(5),
            PyValue::None,
            PyValue::str("abc"),
            PyValue::Bytes(b"ab".to_vec()),
        ] {
            assert_eq!(drain(&py_object_to_iterable(&object)), vec![object]);
        }
    }

    #[test]
    fn test_dict_is_one_argument() {
        let dict = PyDict::new();
        dict.set_str("a", PyValue::Int(1));
        let object = PyValue::Dict(dict);
        assert_eq!(drain(&py_object_to_iterable(&object)), vec![object]);
    }

    #[test]
    fn test_tuple_and_list_are_unpacked() {
        let items = vec![PyValue::Int(5), PyValue::str("hi")];
        assert_eq!(
            drain(&py_object_to_iterable(&PyValue::Tuple(items.clone()))),
            items
        );
        assert_eq!(
            drain(&py_object_to_iterable(&PyValue::List(PyList::from_vec(items.clone())))),
            items
        );
    }

    #[test]
    fn test_iterator_is_same_handle() {
        let it = PyIterator::from_values(vec![PyValue::Int(1), PyValue::Int(2)], "generator");
        assert_eq!(it.next_item().unwrap().unwrap(), PyValue::Int(1));

        let normalized = py_object_to_iterable(&PyValue::Iterator(it.clone()));
        match &normalized {
            PyValue::Iterator(same) => assert!(same.ptr_eq(&it)),
            other => panic!("expected an iterator, got {}", other),
        }
        assert_eq!(it.ref_count(), 2);
        assert_eq!(drain(&normalized), vec![PyValue::Int(2)]);

        drop(normalized);
        assert_eq!(it.ref_count(), 1);
    }

    #[test]
    fn test_positional_conversion() {
        let args = py_object_to_iterable(&PyValue::tuple([PyValue::Int(5), PyValue::str("hi")]));
        let mut out = vec![Value::boolean(true)];
        Converter::default()
            .convert_py_objects_to_duckdb_values(
                &args,
                &[LogicalType::Integer, LogicalType::Varchar],
                &mut out,
            )
            .unwrap();
        assert_eq!(
            out,
            vec![Value::boolean(true), Value::integer(5), Value::varchar("hi")]
        );
    }

    #[test]
    fn test_underflow_is_arity_mismatch() {
        let args = py_object_to_iterable(&PyValue::Int(5));
        let mut out = Vec::new();
        let err = Converter::default()
            .convert_py_objects_to_duckdb_values(
                &args,
                &[LogicalType::Integer, LogicalType::Varchar],
                &mut out,
            )
            .unwrap_err();
        assert!(matches!(
            err,
            PyBridgeError::ArityMismatch {
                expected: 2,
                actual: 1
            }
        ));
        assert!(out.is_empty());
    }

    #[test]
    fn test_surplus_items_are_left_in_iterator() {
        let it = PyIterator::from_values(
            vec![PyValue::Int(1), PyValue::Int(2), PyValue::Int(3)],
            "generator",
        );
        let mut out = Vec::new();
        Converter::default()
            .convert_py_objects_to_duckdb_values(
                &PyValue::Iterator(it.clone()),
                &[LogicalType::Integer],
                &mut out,
            )
            .unwrap();
        assert_eq!(out, vec![Value::integer(1)]);
        assert_eq!(it.next_item().unwrap().unwrap(), PyValue::Int(2));
    }

    #[test]
    fn test_failure_leaves_output_untouched() {
        let args = py_object_to_iterable(&PyValue::tuple([PyValue::Int(5), PyValue::str("x")]));
        let mut out = vec![Value::integer(0)];
        let err = Converter::default()
            .convert_py_objects_to_duckdb_values(
                &args,
                &[LogicalType::Integer, LogicalType::Integer],
                &mut out,
            )
            .unwrap_err();
        assert_eq!(err.path().unwrap().to_string(), "args[1]");
        assert_eq!(out, vec![Value::integer(0)]);
    }

    #[test]
    fn test_non_iterator_rejected() {
        let mut out = Vec::new();
        let err = Converter::default()
            .convert_py_objects_to_duckdb_values(&PyValue::Int(1), &[LogicalType::Integer], &mut out)
            .unwrap_err();
        assert_eq!(err.to_string(), "type mismatch: expected iterator, got int");
    }

    #[test]
    fn test_invalid_type_pulls_nothing() {
        let it = PyIterator::from_values(vec![PyValue::Int(1)], "generator");
        let mut out = Vec::new();
        let err = Converter::default()
            .convert_py_objects_to_duckdb_values(
                &PyValue::Iterator(it.clone()),
                &[LogicalType::Integer, LogicalType::Enum(vec![])],
                &mut out,
            )
            .unwrap_err();
        assert_eq!(err.path().unwrap().to_string(), "args[1]");
        assert_eq!(it.next_item().unwrap().unwrap(), PyValue::Int(1));
    }
}
