//! Type Conversion
//!
//! This module holds the [`Converter`] and the engine-to-native direction of
//! the bridge. The native-to-engine direction lives in [`crate::coerce`] and
//! the positional batch entry points in [`crate::iter`].
//!
//! ## Traits
//!
//! - `ToPython`: Build native objects from plain Rust values
//! - `TryToPython`: Convert engine values to native objects
//! - `TryFromPython`: Convert native objects to engine values of a given type
//!
//! ## Engine to native mapping
//!
//! | Logical type | Native object |
//! |---|---|
//! | NULL of any type | `None` |
//! | BOOLEAN | `bool` |
//! | integer kinds | `int` |
//! | FLOAT, DOUBLE | `float` |
//! | DECIMAL | `decimal.Decimal` |
//! | VARCHAR, ENUM | `str` |
//! | BLOB | `bytes` |
//! | DATE, TIME, TIMESTAMP | `date`, `time`, naive `datetime` |
//! | TIMESTAMPTZ | `datetime` in UTC |
//! | INTERVAL | `timedelta` |
//! | UUID | `uuid.UUID` |
//! | LIST, STRUCT, MAP | `list`, `dict`, `dict` |

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta};
use pyudf_types::{LogicalType, LogicalTypeId, Payload, Value};
use rust_decimal::Decimal;
use smol_str::SmolStr;
use tracing::{debug, trace, warn};
use uuid::Uuid;

use crate::error::{PathSegment, PyBridgeError, PyBridgeResult};
use crate::options::ConversionOptions;
use crate::py_types::{PyDict, PyList, PyValue};

// ============================================================================
// Conversion traits
// ============================================================================

/// Trait for building native objects from plain Rust values.
///
/// ```
/// use pyudf_bridge::{PyValue, ToPython};
///
/// assert_eq!(Some(42i32).to_python(), PyValue::Int(42));
/// assert_eq!(None::<i32>.to_python(), PyValue::None);
/// ```
pub trait ToPython {
    /// Convert this value to a native object.
    fn to_python(&self) -> PyValue;
}

/// Trait for fallible conversion to native objects.
pub trait TryToPython {
    /// The error type for conversion failures
    type Error;

    /// Try to convert this value to a native object.
    fn try_to_python(&self) -> Result<PyValue, Self::Error>;
}

/// Trait for converting native objects into values of a declared type.
pub trait TryFromPython: Sized {
    /// Convert `object` so that the result carries `logical_type`.
    fn try_from_python(object: &PyValue, logical_type: &LogicalType) -> PyBridgeResult<Self>;
}

impl ToPython for () {
    fn to_python(&self) -> PyValue {
        PyValue::None
    }
}

impl ToPython for bool {
    fn to_python(&self) -> PyValue {
        PyValue::Bool(*self)
    }
}

macro_rules! int_to_python {
    ($($ty:ty),*) => {
        $(
            impl ToPython for $ty {
                fn to_python(&self) -> PyValue {
                    PyValue::Int(i128::from(*self))
                }
            }
        )*
    };
}

int_to_python!(i8, i16, i32, i64, i128, u8, u16, u32, u64);

impl ToPython for f32 {
    fn to_python(&self) -> PyValue {
        PyValue::Float(f64::from(*self))
    }
}

impl ToPython for f64 {
    fn to_python(&self) -> PyValue {
        PyValue::Float(*self)
    }
}

impl ToPython for str {
    fn to_python(&self) -> PyValue {
        PyValue::String(SmolStr::new(self))
    }
}

impl ToPython for String {
    fn to_python(&self) -> PyValue {
        PyValue::String(SmolStr::new(self))
    }
}

impl ToPython for SmolStr {
    fn to_python(&self) -> PyValue {
        PyValue::String(self.clone())
    }
}

impl ToPython for [u8] {
    fn to_python(&self) -> PyValue {
        PyValue::Bytes(self.to_vec())
    }
}

impl ToPython for Decimal {
    fn to_python(&self) -> PyValue {
        PyValue::Decimal(*self)
    }
}

impl ToPython for NaiveDate {
    fn to_python(&self) -> PyValue {
        PyValue::Date(*self)
    }
}

impl ToPython for NaiveTime {
    fn to_python(&self) -> PyValue {
        PyValue::Time(*self)
    }
}

impl ToPython for NaiveDateTime {
    fn to_python(&self) -> PyValue {
        PyValue::DateTime(*self)
    }
}

impl ToPython for DateTime<FixedOffset> {
    fn to_python(&self) -> PyValue {
        PyValue::DateTimeTz(*self)
    }
}

impl ToPython for TimeDelta {
    fn to_python(&self) -> PyValue {
        PyValue::TimeDelta(*self)
    }
}

impl ToPython for Uuid {
    fn to_python(&self) -> PyValue {
        PyValue::Uuid(*self)
    }
}

impl ToPython for PyValue {
    fn to_python(&self) -> PyValue {
        self.clone()
    }
}

impl<T: ToPython + ?Sized> ToPython for &T {
    fn to_python(&self) -> PyValue {
        (**self).to_python()
    }
}

impl<T: ToPython> ToPython for Option<T> {
    fn to_python(&self) -> PyValue {
        match self {
            Some(v) => v.to_python(),
            None => PyValue::None,
        }
    }
}

impl<T: ToPython> ToPython for Vec<T> {
    fn to_python(&self) -> PyValue {
        PyValue::List(self.iter().map(ToPython::to_python).collect())
    }
}

impl<A: ToPython, B: ToPython> ToPython for (A, B) {
    fn to_python(&self) -> PyValue {
        PyValue::Tuple(vec![self.0.to_python(), self.1.to_python()])
    }
}

impl<A: ToPython, B: ToPython, C: ToPython> ToPython for (A, B, C) {
    fn to_python(&self) -> PyValue {
        PyValue::Tuple(vec![
            self.0.to_python(),
            self.1.to_python(),
            self.2.to_python(),
        ])
    }
}

impl TryToPython for Value {
    type Error = PyBridgeError;

    fn try_to_python(&self) -> PyBridgeResult<PyValue> {
        Converter::default().duckdb_to_py(self)
    }
}

impl TryFromPython for Value {
    fn try_from_python(object: &PyValue, logical_type: &LogicalType) -> PyBridgeResult<Self> {
        Converter::default().convert_py_object_to_duckdb_value(object, logical_type)
    }
}

// ============================================================================
// Converter
// ============================================================================

/// Performs every conversion of the bridge under one set of options.
///
/// The free functions at the crate root use `Converter::default()`.
#[derive(Debug, Clone, Default)]
pub struct Converter {
    options: ConversionOptions,
}

impl Converter {
    pub fn new(options: ConversionOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &ConversionOptions {
        &self.options
    }

    /// Depth of the children of a container found at `depth`.
    pub(crate) fn descend(&self, depth: usize) -> PyBridgeResult<usize> {
        let next = depth + 1;
        if next > self.options.max_nesting_depth {
            return Err(PyBridgeError::NestingTooDeep {
                limit: self.options.max_nesting_depth,
            });
        }
        Ok(next)
    }

    /// Convert one engine value to a new native object.
    pub fn duckdb_to_py(&self, value: &Value) -> PyBridgeResult<PyValue> {
        debug!("Converting {} value to native", value.logical_type());
        check_convertible(value.logical_type())?;
        self.value_to_py(value, 0)
    }

    /// Convert a batch of engine values to a native `list`, keeping order.
    ///
    /// Fails as a whole when any element fails.
    pub fn duckdbs_to_pys(&self, values: &[Value]) -> PyBridgeResult<PyValue> {
        debug!("Converting {} values to native", values.len());
        let items = values
            .iter()
            .enumerate()
            .map(|(i, value)| {
                check_convertible(value.logical_type())
                    .and_then(|()| self.value_to_py(value, 0))
                    .map_err(|e| e.within(PathSegment::Index(i)))
            })
            .collect::<PyBridgeResult<Vec<_>>>()?;
        Ok(PyValue::List(PyList::from_vec(items)))
    }

    /// Convert a STRUCT value to a `dict` keyed by field name.
    pub fn struct_to_dict(&self, value: &Value) -> PyBridgeResult<PyDict> {
        if value.logical_type().struct_fields().is_none() {
            return Err(PyBridgeError::type_mismatch(
                "STRUCT",
                value.logical_type().to_string(),
            ));
        }
        debug!("Converting {} to dict", value.logical_type());
        check_convertible(value.logical_type())?;
        self.struct_fields_to_dict(value, 0)?
            .ok_or_else(|| PyBridgeError::null_object("cannot convert a NULL STRUCT to a dict"))
    }

    fn struct_fields_to_dict(&self, value: &Value, depth: usize) -> PyBridgeResult<Option<PyDict>> {
        let Some(entries) = value.struct_entries() else {
            return Ok(None);
        };
        let depth = self.descend(depth)?;
        let dict = PyDict::new();
        for (name, child) in entries {
            let item = self
                .value_to_py(child, depth)
                .map_err(|e| e.within(PathSegment::Field(name.clone())))?;
            dict.set_str(name.clone(), item);
        }
        Ok(Some(dict))
    }

    fn value_to_py(&self, value: &Value, depth: usize) -> PyBridgeResult<PyValue> {
        let logical_type = value.logical_type();
        let Some(payload) = value.payload() else {
            return Ok(PyValue::None);
        };
        trace!("Converting {} payload at depth {}", logical_type, depth);

        let object = match payload {
            Payload::Boolean(b) => PyValue::Bool(*b),
            Payload::TinyInt(n) => PyValue::Int(i128::from(*n)),
            Payload::SmallInt(n) => PyValue::Int(i128::from(*n)),
            Payload::Integer(n) => PyValue::Int(i128::from(*n)),
            Payload::BigInt(n) => PyValue::Int(i128::from(*n)),
            Payload::HugeInt(n) => PyValue::Int(*n),
            Payload::UTinyInt(n) => PyValue::Int(i128::from(*n)),
            Payload::USmallInt(n) => PyValue::Int(i128::from(*n)),
            Payload::UInteger(n) => PyValue::Int(i128::from(*n)),
            Payload::UBigInt(n) => PyValue::Int(i128::from(*n)),
            Payload::Float(f) => PyValue::Float(f64::from(*f)),
            Payload::Double(f) => PyValue::Float(*f),
            Payload::Decimal(d) => PyValue::Decimal(*d),
            Payload::Varchar(s) => PyValue::String(s.clone()),
            Payload::Enum(index) => {
                let label = value.as_str().ok_or_else(|| {
                    PyBridgeError::conversion_failed(
                        "ENUM",
                        logical_type,
                        format!("dictionary has no entry {}", index),
                    )
                })?;
                PyValue::str(label)
            }
            Payload::Blob(bytes) => PyValue::Bytes(bytes.clone()),
            Payload::Date(d) => PyValue::Date(*d),
            Payload::Time(t) => PyValue::Time(*t),
            Payload::Timestamp(ts) => PyValue::DateTime(*ts),
            Payload::TimestampTz(ts) => PyValue::datetime_utc(*ts),
            Payload::Interval(interval) => {
                if interval.has_months() {
                    warn!(
                        "Interval {} has a month component, counting {} days per month",
                        interval, self.options.interval_month_days
                    );
                }
                let delta = interval
                    .to_time_delta(self.options.interval_month_days)
                    .ok_or_else(|| {
                        PyBridgeError::numeric_overflow(interval, "datetime.timedelta")
                    })?;
                PyValue::TimeDelta(delta)
            }
            Payload::Uuid(u) => PyValue::Uuid(*u),
            Payload::List(items) => {
                let depth = self.descend(depth)?;
                let list = PyList::new();
                for (i, item) in items.iter().enumerate() {
                    let object = self
                        .value_to_py(item, depth)
                        .map_err(|e| e.within(PathSegment::Index(i)))?;
                    list.append(object);
                }
                PyValue::List(list)
            }
            Payload::Struct(_) => match self.struct_fields_to_dict(value, depth)? {
                Some(dict) => PyValue::Dict(dict),
                None => PyValue::None,
            },
            Payload::Map(entries) => self.map_to_py(entries, depth)?,
            Payload::Bit(_) => return Err(PyBridgeError::unsupported_type(logical_type)),
        };
        Ok(object)
    }

    fn map_to_py(&self, entries: &[(Value, Value)], depth: usize) -> PyBridgeResult<PyValue> {
        let depth = self.descend(depth)?;
        let dict = PyDict::new();

        if self.options.map_as_key_value_lists {
            let keys = PyList::new();
            let values = PyList::new();
            for (i, (key, value)) in entries.iter().enumerate() {
                keys.append(
                    self.value_to_py(key, depth)
                        .map_err(|e| e.within(PathSegment::MapKey(i)))?,
                );
                values.append(
                    self.value_to_py(value, depth)
                        .map_err(|e| e.within(PathSegment::MapValue(i)))?,
                );
            }
            dict.set_str("key", PyValue::List(keys));
            dict.set_str("value", PyValue::List(values));
            return Ok(PyValue::Dict(dict));
        }

        for (i, (key, value)) in entries.iter().enumerate() {
            let key = self
                .value_to_py(key, depth)
                .map_err(|e| e.within(PathSegment::MapKey(i)))?;
            let value = self
                .value_to_py(value, depth)
                .map_err(|e| e.within(PathSegment::MapValue(i)))?;
            dict.set(key, value)
                .map_err(|e| e.within(PathSegment::MapKey(i)))?;
            if dict.len() != i + 1 {
                return Err(PyBridgeError::conversion_failed(
                    "MAP",
                    "dict",
                    format!("entry {} has a key equal to an earlier entry", i),
                )
                .within(PathSegment::MapKey(i)));
            }
        }
        Ok(PyValue::Dict(dict))
    }
}

/// Types holding BIT anywhere have no native form, whether or not a value
/// is present.
fn check_convertible(logical_type: &LogicalType) -> PyBridgeResult<()> {
    if logical_type.contains(LogicalTypeId::Bit) {
        return Err(PyBridgeError::unsupported_type(logical_type));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use pretty_assertions::assert_eq;
    use pyudf_types::Interval;

    #[test]
    fn test_primitive_to_python() {
        assert_eq!(true.to_python(), PyValue::Bool(true));
        assert_eq!(42u64.to_python(), PyValue::Int(42));
        assert_eq!(u64::MAX.to_python(), PyValue::Int(u64::MAX as i128));
        assert_eq!("hi".to_python(), PyValue::str("hi"));
        assert_eq!(().to_python(), PyValue::None);
    }

    #[test]
    fn test_collection_to_python() {
        let list = vec![1i32, 2, 3].to_python();
        assert_eq!(list.to_string(), "[1, 2, 3]");
        let pair = (5i32, "hi").to_python();
        assert_eq!(pair, PyValue::tuple([PyValue::Int(5), PyValue::str("hi")]));
    }

    #[test]
    fn test_scalars() {
        let conv = Converter::default();
        assert_eq!(conv.duckdb_to_py(&Value::boolean(true)).unwrap(), PyValue::Bool(true));
        assert_eq!(
            conv.duckdb_to_py(&Value::ubigint(u64::MAX)).unwrap(),
            PyValue::Int(18_446_744_073_709_551_615)
        );
        assert_eq!(conv.duckdb_to_py(&Value::float(0.5)).unwrap(), PyValue::Float(0.5));
        assert_eq!(conv.duckdb_to_py(&Value::varchar("x")).unwrap(), PyValue::str("x"));
        assert_eq!(
            conv.duckdb_to_py(&Value::blob(vec![0u8, 1])).unwrap(),
            PyValue::Bytes(vec![0, 1])
        );
    }

    #[test]
    fn test_decimal_keeps_scale() {
        let value = Value::decimal(Decimal::new(1050, 2), 10, 2).unwrap();
        let object = Converter::default().duckdb_to_py(&value).unwrap();
        assert_eq!(object.to_string(), "Decimal('10.50')");
    }

    #[test]
    fn test_enum_becomes_label() {
        let mood = LogicalType::enumeration(["sad", "ok", "happy"]);
        let value = Value::enum_value(&mood, "happy").unwrap();
        assert_eq!(
            Converter::default().duckdb_to_py(&value).unwrap(),
            PyValue::str("happy")
        );
    }

    #[test]
    fn test_timestamp_tz_is_aware_utc() {
        let ts = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        let object = Converter::default().duckdb_to_py(&Value::timestamp_tz(ts)).unwrap();
        match object {
            PyValue::DateTimeTz(dt) => {
                assert_eq!(dt.offset().local_minus_utc(), 0);
                assert_eq!(dt.with_timezone(&Utc), ts);
            }
            other => panic!("expected aware datetime, got {}", other),
        }
    }

    #[test]
    fn test_interval_months_use_configured_days() {
        let value = Value::interval(Interval::new(1, 2, 3));
        let default = Converter::default().duckdb_to_py(&value).unwrap();
        assert_eq!(
            default,
            PyValue::TimeDelta(TimeDelta::days(32) + TimeDelta::microseconds(3))
        );

        let conv = Converter::new(ConversionOptions::default().with_interval_month_days(31));
        assert_eq!(
            conv.duckdb_to_py(&value).unwrap(),
            PyValue::TimeDelta(TimeDelta::days(33) + TimeDelta::microseconds(3))
        );
    }

    #[test]
    fn test_null_of_any_type_is_none() {
        let conv = Converter::default();
        for ty in [
            LogicalType::Integer,
            LogicalType::Varchar,
            LogicalType::list(LogicalType::Double),
            LogicalType::structure([("a", LogicalType::Integer)]),
            LogicalType::SqlNull,
        ] {
            assert_eq!(conv.duckdb_to_py(&Value::null(ty)).unwrap(), PyValue::None);
        }
    }

    #[test]
    fn test_bit_is_unsupported() {
        let err = Converter::default()
            .duckdb_to_py(&Value::bit(vec![true, false]))
            .unwrap_err();
        assert!(err.is_unsupported());
        assert_eq!(err.to_string(), "unsupported logical type: BIT");
    }

    #[test]
    fn test_bit_child_is_unsupported_without_values() {
        let conv = Converter::default();
        let empty = Value::list(LogicalType::Bit, Vec::new()).unwrap();
        assert!(conv.duckdb_to_py(&empty).unwrap_err().is_unsupported());

        let null_list = Value::null(LogicalType::list(LogicalType::Bit));
        assert!(conv.duckdb_to_py(&null_list).unwrap_err().is_unsupported());

        let row = LogicalType::structure([("a", LogicalType::Integer), ("b", LogicalType::Bit)]);
        let err = conv.duckdb_to_py(&Value::null(row.clone())).unwrap_err();
        assert_eq!(err.to_string(), "unsupported logical type: STRUCT(a INTEGER, b BIT)");

        let row_value = Value::struct_with_type(
            row,
            vec![Value::integer(1), Value::null(LogicalType::Bit)],
        )
        .unwrap();
        assert!(conv.struct_to_dict(&row_value).unwrap_err().is_unsupported());
    }

    #[test]
    fn test_map_with_nan_key_keeps_every_entry() {
        let map = Value::map(
            LogicalType::Double,
            LogicalType::Integer,
            vec![
                (Value::double(f64::NAN), Value::integer(1)),
                (Value::double(2.0), Value::integer(2)),
            ],
        )
        .unwrap();
        let object = Converter::default().duckdb_to_py(&map).unwrap();
        let PyValue::Dict(dict) = &object else {
            panic!("expected a dict, got {}", object);
        };
        assert_eq!(dict.len(), 2);
        assert_eq!(object.to_string(), "{nan: 1, 2.0: 2}");
    }

    #[test]
    fn test_map_to_dict() {
        let map = Value::map(
            LogicalType::Varchar,
            LogicalType::Integer,
            vec![
                (Value::varchar("a"), Value::integer(1)),
                (Value::varchar("b"), Value::null(LogicalType::Integer)),
            ],
        )
        .unwrap();
        let object = Converter::default().duckdb_to_py(&map).unwrap();
        assert_eq!(object.to_string(), "{'a': 1, 'b': None}");

        let conv = Converter::new(ConversionOptions::default().with_map_as_key_value_lists(true));
        let object = conv.duckdb_to_py(&map).unwrap();
        assert_eq!(object.to_string(), "{'key': ['a', 'b'], 'value': [1, None]}");
    }

    #[test]
    fn test_map_with_list_keys_is_unhashable() {
        let key_type = LogicalType::list(LogicalType::Integer);
        let key = Value::list(LogicalType::Integer, vec![Value::integer(1)]).unwrap();
        let map = Value::map(key_type, LogicalType::Integer, vec![(key, Value::integer(2))]).unwrap();

        let err = Converter::default().duckdb_to_py(&map).unwrap_err();
        assert!(matches!(err.root_cause(), PyBridgeError::Unhashable { .. }));

        let conv = Converter::new(ConversionOptions::default().with_map_as_key_value_lists(true));
        assert_eq!(
            conv.duckdb_to_py(&map).unwrap().to_string(),
            "{'key': [[1]], 'value': [2]}"
        );
    }

    #[test]
    fn test_struct_to_dict_rejects_non_struct() {
        let err = Converter::default()
            .struct_to_dict(&Value::integer(1))
            .unwrap_err();
        assert!(err.is_type_error());

        let null = Value::null(LogicalType::structure([("a", LogicalType::Integer)]));
        let err = Converter::default().struct_to_dict(&null).unwrap_err();
        assert!(matches!(err, PyBridgeError::NullObject { .. }));
    }

    #[test]
    fn test_nesting_limit() {
        let inner = Value::list(LogicalType::Integer, vec![Value::integer(1)]).unwrap();
        let outer = Value::list(inner.logical_type().clone(), vec![inner.clone()]).unwrap();

        let conv = Converter::new(ConversionOptions::default().with_max_nesting_depth(1));
        assert!(conv.duckdb_to_py(&inner).is_ok());
        let err = conv.duckdb_to_py(&outer).unwrap_err();
        assert!(matches!(
            err.root_cause(),
            PyBridgeError::NestingTooDeep { limit: 1 }
        ));
    }

    #[test]
    fn test_try_to_python() {
        assert_eq!(Value::integer(3).try_to_python().unwrap(), PyValue::Int(3));
    }
}
