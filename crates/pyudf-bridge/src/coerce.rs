//! Native to engine coercion
//!
//! Every conversion is driven by the declared [`LogicalType`]; the native
//! object's kind only decides which coercion path is taken. `None` becomes
//! a NULL of the declared type, whatever the type.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use pyudf_types::{Interval, LogicalType, StructField, Value, ValueError};
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::{Decimal, RoundingStrategy};
use tracing::{debug, trace, warn};
use uuid::Uuid;

use crate::conversion::Converter;
use crate::error::{PathSegment, PyBridgeError, PyBridgeResult};
use crate::py_types::{PyDict, PyValue};

fn mismatch(object: &PyValue, logical_type: &LogicalType) -> PyBridgeError {
    PyBridgeError::type_mismatch(logical_type, object.type_name())
}

fn unparsable(text: &str, logical_type: &LogicalType) -> PyBridgeError {
    PyBridgeError::conversion_failed(
        "str",
        logical_type,
        format!("could not parse '{}'", text),
    )
}

impl Converter {
    /// Convert a native object to a value of `logical_type`.
    pub fn convert_py_object_to_duckdb_value(
        &self,
        object: &PyValue,
        logical_type: &LogicalType,
    ) -> PyBridgeResult<Value> {
        debug!("Converting {} to {}", object.type_name(), logical_type);
        logical_type.validate()?;
        self.coerce(object, logical_type, 0)
    }

    pub(crate) fn coerce(
        &self,
        object: &PyValue,
        logical_type: &LogicalType,
        depth: usize,
    ) -> PyBridgeResult<Value> {
        if object.is_none() {
            return Ok(Value::null(logical_type.clone()));
        }
        trace!(
            "Coercing {} to {} at depth {}",
            object.type_name(),
            logical_type,
            depth
        );

        match logical_type {
            LogicalType::SqlNull => Err(mismatch(object, logical_type)),
            LogicalType::Boolean => coerce_boolean(object).map(Value::boolean),
            ty if ty.is_integral() => coerce_integral(object, ty),
            LogicalType::Float => {
                let f = coerce_f64(object, logical_type)?;
                let narrowed = f as f32;
                if f.is_finite() && narrowed.is_infinite() {
                    return Err(PyBridgeError::numeric_overflow(f, logical_type));
                }
                Ok(Value::float(narrowed))
            }
            LogicalType::Double => coerce_f64(object, logical_type).map(Value::double),
            LogicalType::Decimal { width, scale } => {
                let d = coerce_decimal(object, logical_type)?;
                Value::decimal(d, *width, *scale).map_err(|e| match e {
                    ValueError::DecimalOverflow { .. } => {
                        PyBridgeError::numeric_overflow(d, logical_type)
                    }
                    other => other.into(),
                })
            }
            LogicalType::Varchar => coerce_varchar(object, logical_type),
            LogicalType::Blob => match object {
                PyValue::Bytes(bytes) => Ok(Value::blob(bytes.clone())),
                PyValue::String(s) => Ok(Value::blob(s.as_bytes())),
                _ => Err(mismatch(object, logical_type)),
            },
            LogicalType::Date => coerce_date(object, logical_type).map(Value::date),
            LogicalType::Time => coerce_time(object, logical_type).map(Value::time),
            LogicalType::Timestamp => coerce_timestamp(object, logical_type).map(Value::timestamp),
            LogicalType::TimestampTz => {
                coerce_timestamp_tz(object, logical_type).map(Value::timestamp_tz)
            }
            LogicalType::Interval => match object {
                PyValue::TimeDelta(delta) => Interval::from_time_delta(*delta)
                    .map(Value::interval)
                    .ok_or_else(|| PyBridgeError::numeric_overflow(object, logical_type)),
                _ => Err(mismatch(object, logical_type)),
            },
            LogicalType::Uuid => match object {
                PyValue::Uuid(u) => Ok(Value::uuid(*u)),
                PyValue::String(s) => Uuid::parse_str(s.trim())
                    .map(Value::uuid)
                    .map_err(|_| unparsable(s, logical_type)),
                _ => Err(mismatch(object, logical_type)),
            },
            LogicalType::Enum(_) => match object {
                PyValue::String(s) => Value::enum_value(logical_type, s).map_err(|e| match e {
                    e @ ValueError::InvalidEnumLabel { .. } => {
                        PyBridgeError::conversion_failed("str", logical_type, e.to_string())
                    }
                    other => other.into(),
                }),
                _ => Err(mismatch(object, logical_type)),
            },
            LogicalType::List(child) => self.coerce_list(object, child, depth),
            LogicalType::Struct(fields) => self.coerce_struct(object, logical_type, fields, depth),
            LogicalType::Map { key, value } => {
                self.coerce_map(object, logical_type, key, value, depth)
            }
            LogicalType::Bit => Err(PyBridgeError::unsupported_type(logical_type)),
            // `is_integral` covers the remaining integer kinds
            other => Err(PyBridgeError::unsupported_type(other)),
        }
    }

    fn coerce_list(
        &self,
        object: &PyValue,
        child: &LogicalType,
        depth: usize,
    ) -> PyBridgeResult<Value> {
        let depth = self.descend(depth)?;
        let mut values = Vec::new();
        let mut push = |i: usize, item: &PyValue| -> PyBridgeResult<()> {
            let value = self
                .coerce(item, child, depth)
                .map_err(|e| e.within(PathSegment::Index(i)))?;
            values.push(value);
            Ok(())
        };

        match object {
            PyValue::List(list) => {
                for (i, item) in list.iter().enumerate() {
                    push(i, &item)?;
                }
            }
            PyValue::Tuple(items) | PyValue::Set(items) => {
                for (i, item) in items.iter().enumerate() {
                    push(i, item)?;
                }
            }
            PyValue::Iterator(it) => {
                let mut i = 0;
                while let Some(item) = it.next_item() {
                    let item = item.map_err(|e| e.within(PathSegment::Index(i)))?;
                    push(i, &item)?;
                    i += 1;
                }
            }
            _ => return Err(mismatch(object, &LogicalType::list(child.clone()))),
        }

        Ok(Value::list(child.clone(), values)?)
    }

    fn coerce_struct(
        &self,
        object: &PyValue,
        logical_type: &LogicalType,
        fields: &[StructField],
        depth: usize,
    ) -> PyBridgeResult<Value> {
        let children = match object {
            PyValue::Dict(dict) => self.struct_children_from_dict(dict, logical_type, fields, depth)?,
            PyValue::Tuple(items) => {
                self.struct_children_from_sequence(object, items, logical_type, fields, depth)?
            }
            PyValue::List(list) => {
                let items = list.to_vec();
                self.struct_children_from_sequence(object, &items, logical_type, fields, depth)?
            }
            _ => return Err(mismatch(object, logical_type)),
        };
        Ok(Value::struct_with_type(logical_type.clone(), children)?)
    }

    fn struct_children_from_dict(
        &self,
        dict: &PyDict,
        logical_type: &LogicalType,
        fields: &[StructField],
        depth: usize,
    ) -> PyBridgeResult<Vec<Value>> {
        let depth = self.descend(depth)?;
        let mut children = Vec::with_capacity(fields.len());
        for field in fields {
            let item = dict
                .get_str(&field.name)
                .ok_or_else(|| PyBridgeError::missing_field(field.name.as_str(), logical_type))?;
            let child = self
                .coerce(&item, &field.logical_type, depth)
                .map_err(|e| e.within(PathSegment::Field(field.name.clone())))?;
            children.push(child);
        }

        // Every declared field was found, so any further key is undeclared
        if dict.len() > fields.len() {
            let extra = dict.keys().into_iter().find(|key| {
                key.as_str()
                    .map_or(true, |name| !fields.iter().any(|f| f.name.as_str() == name))
            });
            if let Some(key) = extra {
                let name = key.to_str().unwrap_or_else(|| key.to_string());
                if self.options().allow_extra_struct_fields {
                    trace!("Ignoring undeclared key '{}' for {}", name, logical_type);
                } else {
                    return Err(PyBridgeError::unexpected_field(name, logical_type));
                }
            }
        }
        Ok(children)
    }

    fn struct_children_from_sequence(
        &self,
        object: &PyValue,
        items: &[PyValue],
        logical_type: &LogicalType,
        fields: &[StructField],
        depth: usize,
    ) -> PyBridgeResult<Vec<Value>> {
        if items.len() != fields.len() {
            return Err(PyBridgeError::conversion_failed(
                object.type_name(),
                logical_type,
                format!("expected {} fields, got {} items", fields.len(), items.len()),
            ));
        }
        let depth = self.descend(depth)?;
        fields
            .iter()
            .zip(items)
            .map(|(field, item)| {
                self.coerce(item, &field.logical_type, depth)
                    .map_err(|e| e.within(PathSegment::Field(field.name.clone())))
            })
            .collect()
    }

    fn coerce_map(
        &self,
        object: &PyValue,
        logical_type: &LogicalType,
        key_type: &LogicalType,
        value_type: &LogicalType,
        depth: usize,
    ) -> PyBridgeResult<Value> {
        let PyValue::Dict(dict) = object else {
            return Err(mismatch(object, logical_type));
        };
        let depth = self.descend(depth)?;

        let pairs: Vec<(PyValue, PyValue)> = match key_value_lists(dict) {
            Some((keys, values)) => {
                if keys.len() != values.len() {
                    return Err(PyBridgeError::conversion_failed(
                        "dict",
                        logical_type,
                        format!(
                            "'key' has {} items but 'value' has {}",
                            keys.len(),
                            values.len()
                        ),
                    ));
                }
                keys.into_iter().zip(values).collect()
            }
            None => dict.iter().collect(),
        };

        let mut entries = Vec::with_capacity(pairs.len());
        for (i, (key, value)) in pairs.iter().enumerate() {
            if key.is_none() {
                return Err(PyBridgeError::null_object("map keys cannot be None")
                    .within(PathSegment::MapKey(i)));
            }
            let key = self
                .coerce(key, key_type, depth)
                .map_err(|e| e.within(PathSegment::MapKey(i)))?;
            let value = self
                .coerce(value, value_type, depth)
                .map_err(|e| e.within(PathSegment::MapValue(i)))?;
            entries.push((key, value));
        }

        Ok(Value::map(key_type.clone(), value_type.clone(), entries)?)
    }
}

/// Items of a `{'key': [...], 'value': [...]}` dict, if it has that shape.
fn key_value_lists(dict: &PyDict) -> Option<(Vec<PyValue>, Vec<PyValue>)> {
    if dict.len() != 2 {
        return None;
    }
    let sequence = |object: PyValue| match object {
        PyValue::List(list) => Some(list.to_vec()),
        PyValue::Tuple(items) => Some(items),
        _ => None,
    };
    let keys = sequence(dict.get_str("key")?)?;
    let values = sequence(dict.get_str("value")?)?;
    Some((keys, values))
}

fn coerce_boolean(object: &PyValue) -> PyBridgeResult<bool> {
    match object {
        PyValue::Bool(b) => Ok(*b),
        PyValue::Int(0) => Ok(false),
        PyValue::Int(1) => Ok(true),
        PyValue::Int(n) => Err(PyBridgeError::conversion_failed(
            "int",
            LogicalType::Boolean,
            format!("{} is neither 0 nor 1", n),
        )),
        PyValue::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "t" | "1" => Ok(true),
            "false" | "f" | "0" => Ok(false),
            _ => Err(unparsable(s, &LogicalType::Boolean)),
        },
        _ => Err(mismatch(object, &LogicalType::Boolean)),
    }
}

fn coerce_integral(object: &PyValue, logical_type: &LogicalType) -> PyBridgeResult<Value> {
    let n = match object {
        PyValue::Int(n) => *n,
        PyValue::Bool(b) => i128::from(*b),
        PyValue::Float(f) => {
            if !f.is_finite() {
                return Err(PyBridgeError::conversion_failed(
                    "float",
                    logical_type,
                    format!("{} has no integer value", object),
                ));
            }
            // f64::round rounds half away from zero
            let rounded = f.round();
            if rounded < i128::MIN as f64 || rounded >= i128::MAX as f64 {
                return Err(PyBridgeError::numeric_overflow(object, logical_type));
            }
            rounded as i128
        }
        PyValue::Decimal(d) => d
            .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
            .to_i128()
            .ok_or_else(|| PyBridgeError::numeric_overflow(d, logical_type))?,
        PyValue::String(s) => s
            .trim()
            .parse::<i128>()
            .map_err(|_| unparsable(s, logical_type))?,
        _ => return Err(mismatch(object, logical_type)),
    };
    Value::integral(logical_type, n).map_err(|_| PyBridgeError::numeric_overflow(n, logical_type))
}

fn coerce_f64(object: &PyValue, logical_type: &LogicalType) -> PyBridgeResult<f64> {
    match object {
        PyValue::Float(f) => Ok(*f),
        PyValue::Int(n) => Ok(*n as f64),
        PyValue::Bool(b) => Ok(if *b { 1.0 } else { 0.0 }),
        PyValue::Decimal(d) => d
            .to_f64()
            .ok_or_else(|| PyBridgeError::numeric_overflow(d, logical_type)),
        PyValue::String(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| unparsable(s, logical_type)),
        _ => Err(mismatch(object, logical_type)),
    }
}

fn coerce_decimal(object: &PyValue, logical_type: &LogicalType) -> PyBridgeResult<Decimal> {
    match object {
        PyValue::Decimal(d) => Ok(*d),
        PyValue::Int(n) => {
            Decimal::from_i128(*n).ok_or_else(|| PyBridgeError::numeric_overflow(n, logical_type))
        }
        PyValue::Bool(b) => Ok(Decimal::from(u8::from(*b))),
        PyValue::Float(f) if !f.is_finite() => Err(PyBridgeError::conversion_failed(
            "float",
            logical_type,
            format!("{} has no decimal value", object),
        )),
        PyValue::Float(f) => {
            Decimal::from_f64(*f).ok_or_else(|| PyBridgeError::numeric_overflow(f, logical_type))
        }
        PyValue::String(s) => {
            let text = s.trim();
            text.parse::<Decimal>()
                .or_else(|_| Decimal::from_scientific(text))
                .map_err(|_| unparsable(s, logical_type))
        }
        _ => Err(mismatch(object, logical_type)),
    }
}

fn coerce_varchar(object: &PyValue, logical_type: &LogicalType) -> PyBridgeResult<Value> {
    match object {
        PyValue::String(s) => Ok(Value::varchar(s.clone())),
        PyValue::Bytes(bytes) => std::str::from_utf8(bytes)
            .map(Value::varchar)
            .map_err(|e| PyBridgeError::encoding_error(e.to_string())),
        _ if object.is_container() => Err(mismatch(object, logical_type)),
        _ => object
            .to_str()
            .map(Value::varchar)
            .ok_or_else(|| mismatch(object, logical_type)),
    }
}

fn coerce_date(object: &PyValue, logical_type: &LogicalType) -> PyBridgeResult<NaiveDate> {
    match object {
        PyValue::Date(d) => Ok(*d),
        PyValue::DateTime(dt) => Ok(dt.date()),
        PyValue::DateTimeTz(dt) => Ok(dt.date_naive()),
        PyValue::String(s) => s
            .trim()
            .parse::<NaiveDate>()
            .map_err(|_| unparsable(s, logical_type)),
        _ => Err(mismatch(object, logical_type)),
    }
}

fn coerce_time(object: &PyValue, logical_type: &LogicalType) -> PyBridgeResult<NaiveTime> {
    match object {
        PyValue::Time(t) => Ok(*t),
        PyValue::DateTime(dt) => Ok(dt.time()),
        PyValue::DateTimeTz(dt) => Ok(dt.time()),
        PyValue::String(s) => s
            .trim()
            .parse::<NaiveTime>()
            .map_err(|_| unparsable(s, logical_type)),
        _ => Err(mismatch(object, logical_type)),
    }
}

fn parse_naive_datetime(text: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%.f")
        .ok()
        .or_else(|| text.parse::<NaiveDateTime>().ok())
        .or_else(|| {
            text.parse::<NaiveDate>()
                .ok()
                .map(|d| d.and_time(NaiveTime::MIN))
        })
}

fn coerce_timestamp(object: &PyValue, logical_type: &LogicalType) -> PyBridgeResult<NaiveDateTime> {
    match object {
        PyValue::DateTime(dt) => Ok(*dt),
        PyValue::DateTimeTz(dt) => {
            warn!(
                "Dropping offset {} of an aware datetime stored as {}",
                dt.offset(),
                logical_type
            );
            Ok(dt.naive_utc())
        }
        PyValue::Date(d) => Ok(d.and_time(NaiveTime::MIN)),
        PyValue::String(s) => {
            let text = s.trim();
            parse_naive_datetime(text)
                .or_else(|| DateTime::parse_from_rfc3339(text).ok().map(|dt| dt.naive_utc()))
                .ok_or_else(|| unparsable(s, logical_type))
        }
        _ => Err(mismatch(object, logical_type)),
    }
}

fn coerce_timestamp_tz(object: &PyValue, logical_type: &LogicalType) -> PyBridgeResult<DateTime<Utc>> {
    match object {
        PyValue::DateTimeTz(dt) => Ok(dt.with_timezone(&Utc)),
        PyValue::DateTime(dt) => Ok(dt.and_utc()),
        PyValue::String(s) => {
            let text = s.trim();
            DateTime::parse_from_rfc3339(text)
                .or_else(|_| DateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%.f%#z"))
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|_| unparsable(s, logical_type))
        }
        _ => Err(mismatch(object, logical_type)),
    }
}
