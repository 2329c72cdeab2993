//! Exchange with a CPython interpreter
//!
//! [`to_host`] and [`from_host`] move objects between the bridge's native
//! object model and live interpreter objects. Temporal, decimal and UUID
//! objects are built and read through the `datetime`, `decimal` and `uuid`
//! modules, so no interpreter-specific layout is assumed.
//!
//! Host iterators stay lazy: each pull re-attaches to the interpreter and
//! advances the underlying host iterator.

use chrono::{Datelike, FixedOffset, NaiveDate, NaiveTime, TimeDelta, TimeZone, Timelike};
use pyo3::exceptions::{PyNotImplementedError, PyOverflowError, PyTypeError, PyValueError};
use pyo3::prelude::*;
use pyo3::types::{
    PyBool, PyBytes, PyDict as HostDict, PyFloat, PyFrozenSet, PyInt, PyIterator as HostIterator,
    PyList as HostList, PySet, PyString, PyTuple,
};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::conversion::Converter;
use crate::error::PyBridgeError;
use crate::py_types::{PyDict, PyIterator, PyList, PyValue};

impl From<PyBridgeError> for PyErr {
    fn from(err: PyBridgeError) -> PyErr {
        let message = err.to_string();
        match err.root_cause() {
            PyBridgeError::UnsupportedType { .. } => PyNotImplementedError::new_err(message),
            PyBridgeError::NumericOverflow { .. } => PyOverflowError::new_err(message),
            PyBridgeError::TypeMismatch { .. }
            | PyBridgeError::MissingStructField { .. }
            | PyBridgeError::UnexpectedStructField { .. }
            | PyBridgeError::ArityMismatch { .. }
            | PyBridgeError::Unhashable { .. } => PyTypeError::new_err(message),
            _ => PyValueError::new_err(message),
        }
    }
}

/// Capture a host exception as a bridge error.
pub fn host_exception(err: &PyErr) -> PyBridgeError {
    Python::attach(|py| {
        let exception_type = err
            .get_type(py)
            .name()
            .map(|name| name.to_string())
            .unwrap_or_else(|_| "Exception".to_string());
        let traceback = err.traceback(py).and_then(|tb| tb.format().ok());
        PyBridgeError::exception(exception_type, err.value(py).to_string(), traceback)
    })
}

fn invalid(what: &str, obj: &Bound<'_, PyAny>) -> PyErr {
    PyValueError::new_err(format!("invalid {}: {}", what, obj))
}

/// Build a host object from a native object.
///
/// Iterators are drained into a host `list_iterator`.
pub fn to_host<'py>(py: Python<'py>, value: &PyValue) -> PyResult<Bound<'py, PyAny>> {
    let object = match value {
        PyValue::None => py.None().into_bound(py),
        PyValue::Bool(b) => b.into_pyobject(py)?.to_owned().into_any(),
        PyValue::Int(n) => n.into_pyobject(py)?.into_any(),
        PyValue::Float(f) => f.into_pyobject(py)?.into_any(),
        PyValue::String(s) => s.as_str().into_pyobject(py)?.into_any(),
        PyValue::Bytes(bytes) => PyBytes::new(py, bytes).into_any(),
        PyValue::Decimal(d) => PyModule::import(py, "decimal")?
            .getattr("Decimal")?
            .call1((d.to_string(),))?,
        PyValue::Date(d) => PyModule::import(py, "datetime")?
            .getattr("date")?
            .call1((d.year(), d.month(), d.day()))?,
        PyValue::Time(t) => PyModule::import(py, "datetime")?
            .getattr("time")?
            .call1((t.hour(), t.minute(), t.second(), t.nanosecond() / 1_000))?,
        PyValue::DateTime(dt) => PyModule::import(py, "datetime")?
            .getattr("datetime")?
            .call1((
                dt.year(),
                dt.month(),
                dt.day(),
                dt.hour(),
                dt.minute(),
                dt.second(),
                dt.nanosecond() / 1_000,
            ))?,
        PyValue::DateTimeTz(dt) => {
            let module = PyModule::import(py, "datetime")?;
            let offset = module
                .getattr("timedelta")?
                .call1((0, dt.offset().local_minus_utc()))?;
            let tz = module.getattr("timezone")?.call1((offset,))?;
            let local = dt.naive_local();
            module.getattr("datetime")?.call1((
                local.year(),
                local.month(),
                local.day(),
                local.hour(),
                local.minute(),
                local.second(),
                local.nanosecond() / 1_000,
                tz,
            ))?
        }
        PyValue::TimeDelta(delta) => {
            let days = delta.num_days();
            let rest = *delta - TimeDelta::days(days);
            let micros = rest
                .num_microseconds()
                .ok_or_else(|| PyOverflowError::new_err("timedelta out of range"))?;
            PyModule::import(py, "datetime")?
                .getattr("timedelta")?
                .call1((days, 0, micros))?
        }
        PyValue::Uuid(u) => PyModule::import(py, "uuid")?
            .getattr("UUID")?
            .call1((u.hyphenated().to_string(),))?,
        PyValue::List(list) => HostList::new(py, to_host_all(py, list.iter())?)?.into_any(),
        PyValue::Tuple(items) => PyTuple::new(py, to_host_all(py, items.iter().cloned())?)?.into_any(),
        PyValue::Dict(dict) => {
            let host = HostDict::new(py);
            for (k, v) in dict.iter() {
                host.set_item(to_host(py, &k)?, to_host(py, &v)?)?;
            }
            host.into_any()
        }
        PyValue::Set(items) => PySet::new(py, to_host_all(py, items.iter().cloned())?)?.into_any(),
        PyValue::Iterator(it) => {
            let items = it.clone().collect::<Result<Vec<_>, _>>()?;
            HostList::new(py, to_host_all(py, items.into_iter())?)?
                .try_iter()?
                .into_any()
        }
    };
    Ok(object)
}

fn to_host_all<'py>(
    py: Python<'py>,
    items: impl Iterator<Item = PyValue>,
) -> PyResult<Vec<Bound<'py, PyAny>>> {
    items.map(|item| to_host(py, &item)).collect()
}

/// Read a host object into the native object model, with the default
/// nesting limit.
pub fn from_host(obj: &Bound<'_, PyAny>) -> PyResult<PyValue> {
    Converter::default().from_host(obj)
}

impl Converter {
    /// Read a host object into the native object model.
    ///
    /// Containers nested deeper than `max-nesting-depth` are rejected, and
    /// items later pulled from a host iterator are read under the same limit.
    pub fn from_host(&self, obj: &Bound<'_, PyAny>) -> PyResult<PyValue> {
        from_host_at(obj, 0, self.options().max_nesting_depth)
    }
}

fn from_host_at(obj: &Bound<'_, PyAny>, depth: usize, limit: usize) -> PyResult<PyValue> {
    let py = obj.py();

    // bool first: it is a subclass of int
    if obj.is_none() {
        return Ok(PyValue::None);
    } else if let Ok(b) = obj.cast::<PyBool>() {
        return Ok(PyValue::Bool(b.is_true()));
    } else if let Ok(n) = obj.cast::<PyInt>() {
        return Ok(PyValue::Int(n.extract::<i128>()?));
    } else if let Ok(f) = obj.cast::<PyFloat>() {
        return Ok(PyValue::Float(f.value()));
    } else if let Ok(s) = obj.cast::<PyString>() {
        return Ok(PyValue::str(s.extract::<String>()?));
    } else if let Ok(bytes) = obj.cast::<PyBytes>() {
        return Ok(PyValue::Bytes(bytes.as_bytes().to_vec()));
    }

    let datetime = PyModule::import(py, "datetime")?;
    // datetime before date: it is a subclass of date
    if obj.is_instance(&datetime.getattr("datetime")?)? {
        return datetime_from_host(obj);
    } else if obj.is_instance(&datetime.getattr("date")?)? {
        return date_from_host(obj).map(PyValue::Date);
    } else if obj.is_instance(&datetime.getattr("time")?)? {
        return time_from_host(obj).map(PyValue::Time);
    } else if obj.is_instance(&datetime.getattr("timedelta")?)? {
        let days = TimeDelta::try_days(obj.getattr("days")?.extract::<i64>()?)
            .ok_or_else(|| invalid("timedelta", obj))?;
        let seconds = TimeDelta::seconds(obj.getattr("seconds")?.extract::<i64>()?);
        let micros = TimeDelta::microseconds(obj.getattr("microseconds")?.extract::<i64>()?);
        return Ok(PyValue::TimeDelta(days + seconds + micros));
    }

    if obj.is_instance(&PyModule::import(py, "decimal")?.getattr("Decimal")?)? {
        let text = obj.str()?.extract::<String>()?;
        return text
            .parse::<Decimal>()
            .or_else(|_| Decimal::from_scientific(&text))
            .map(PyValue::Decimal)
            .map_err(|_| invalid("decimal", obj));
    }
    if obj.is_instance(&PyModule::import(py, "uuid")?.getattr("UUID")?)? {
        let hex = obj.getattr("hex")?.extract::<String>()?;
        return Uuid::parse_str(&hex)
            .map(PyValue::Uuid)
            .map_err(|_| invalid("UUID", obj));
    }

    let depth = depth + 1;
    if depth > limit {
        return Err(PyBridgeError::NestingTooDeep { limit }.into());
    }
    if let Ok(list) = obj.cast::<HostList>() {
        let items = list
            .iter()
            .map(|item| from_host_at(&item, depth, limit))
            .collect::<PyResult<Vec<_>>>()?;
        Ok(PyValue::List(PyList::from_vec(items)))
    } else if let Ok(tuple) = obj.cast::<PyTuple>() {
        let items = tuple
            .iter()
            .map(|item| from_host_at(&item, depth, limit))
            .collect::<PyResult<Vec<_>>>()?;
        Ok(PyValue::Tuple(items))
    } else if let Ok(dict) = obj.cast::<HostDict>() {
        let native = PyDict::new();
        for (k, v) in dict.iter() {
            native.set(from_host_at(&k, depth, limit)?, from_host_at(&v, depth, limit)?)?;
        }
        Ok(PyValue::Dict(native))
    } else if let Ok(set) = obj.cast::<PySet>() {
        let items = set
            .iter()
            .map(|item| from_host_at(&item, depth, limit))
            .collect::<PyResult<Vec<_>>>()?;
        Ok(PyValue::Set(items))
    } else if let Ok(set) = obj.cast::<PyFrozenSet>() {
        let items = set
            .iter()
            .map(|item| from_host_at(&item, depth, limit))
            .collect::<PyResult<Vec<_>>>()?;
        Ok(PyValue::Set(items))
    } else if let Ok(it) = obj.cast::<HostIterator>() {
        Ok(PyValue::Iterator(lazy_iterator(it, limit)?))
    } else {
        Err(PyTypeError::new_err(format!(
            "cannot convert {} object",
            obj.get_type().name()?
        )))
    }
}

fn date_from_host(obj: &Bound<'_, PyAny>) -> PyResult<NaiveDate> {
    NaiveDate::from_ymd_opt(
        obj.getattr("year")?.extract::<i32>()?,
        obj.getattr("month")?.extract::<u32>()?,
        obj.getattr("day")?.extract::<u32>()?,
    )
    .ok_or_else(|| invalid("date", obj))
}

fn time_from_host(obj: &Bound<'_, PyAny>) -> PyResult<NaiveTime> {
    NaiveTime::from_hms_micro_opt(
        obj.getattr("hour")?.extract::<u32>()?,
        obj.getattr("minute")?.extract::<u32>()?,
        obj.getattr("second")?.extract::<u32>()?,
        obj.getattr("microsecond")?.extract::<u32>()?,
    )
    .ok_or_else(|| invalid("time", obj))
}

fn datetime_from_host(obj: &Bound<'_, PyAny>) -> PyResult<PyValue> {
    let naive = date_from_host(obj)?.and_time(time_from_host(obj)?);
    if obj.getattr("tzinfo")?.is_none() {
        return Ok(PyValue::DateTime(naive));
    }
    let offset_seconds = obj
        .call_method0("utcoffset")?
        .call_method0("total_seconds")?
        .extract::<f64>()?;
    let aware = FixedOffset::east_opt(offset_seconds as i32)
        .and_then(|offset| offset.from_local_datetime(&naive).single())
        .ok_or_else(|| invalid("datetime", obj))?;
    Ok(PyValue::DateTimeTz(aware))
}

fn lazy_iterator(it: &Bound<'_, HostIterator>, limit: usize) -> PyResult<PyIterator> {
    let type_name = if it.get_type().name()?.to_string() == "generator" {
        "generator"
    } else {
        "iterator"
    };
    let host = it.clone().unbind();
    let source = std::iter::from_fn(move || {
        Python::attach(|py| {
            let mut bound = host.bind(py).clone();
            bound.next().map(|item| {
                item.and_then(|obj| from_host_at(&obj, 0, limit))
                    .map_err(|err| host_exception(&err))
            })
        })
    });
    Ok(PyIterator::with_type_name(source, type_name))
}
