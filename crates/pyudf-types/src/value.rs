//! Typed Engine Values
//!
//! A [`Value`] pairs a [`LogicalType`] with an optional [`Payload`]; a missing
//! payload is SQL NULL. Constructors check that payload and type agree, so a
//! `Value` handed to the bridge is always internally consistent.

use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use smol_str::SmolStr;
use uuid::Uuid;

use crate::error::{ValueError, ValueResult};
use crate::interval::Interval;
use crate::logical_type::{LogicalType, StructField, MAX_DECIMAL_SCALE};

/// Non-null content of a [`Value`].
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Boolean(bool),
    TinyInt(i8),
    SmallInt(i16),
    Integer(i32),
    BigInt(i64),
    HugeInt(i128),
    UTinyInt(u8),
    USmallInt(u16),
    UInteger(u32),
    UBigInt(u64),
    Float(f32),
    Double(f64),
    Decimal(Decimal),
    Varchar(SmolStr),
    Blob(Vec<u8>),
    Date(NaiveDate),
    Time(NaiveTime),
    Timestamp(NaiveDateTime),
    TimestampTz(DateTime<Utc>),
    Interval(Interval),
    Uuid(Uuid),
    /// Index into the enum dictionary
    Enum(u32),
    List(Vec<Value>),
    /// Children in declared field order
    Struct(Vec<Value>),
    Map(Vec<(Value, Value)>),
    Bit(Vec<bool>),
}

/// A possibly-null, typed engine value.
#[derive(Debug, Clone, PartialEq)]
pub struct Value {
    logical_type: LogicalType,
    payload: Option<Payload>,
}

impl Value {
    fn new(logical_type: LogicalType, payload: Payload) -> Self {
        Self {
            logical_type,
            payload: Some(payload),
        }
    }

    /// NULL of the given type
    pub fn null(logical_type: LogicalType) -> Self {
        Self {
            logical_type,
            payload: None,
        }
    }

    pub fn boolean(value: bool) -> Self {
        Self::new(LogicalType::Boolean, Payload::Boolean(value))
    }

    pub fn tinyint(value: i8) -> Self {
        Self::new(LogicalType::TinyInt, Payload::TinyInt(value))
    }

    pub fn smallint(value: i16) -> Self {
        Self::new(LogicalType::SmallInt, Payload::SmallInt(value))
    }

    pub fn integer(value: i32) -> Self {
        Self::new(LogicalType::Integer, Payload::Integer(value))
    }

    pub fn bigint(value: i64) -> Self {
        Self::new(LogicalType::BigInt, Payload::BigInt(value))
    }

    pub fn hugeint(value: i128) -> Self {
        Self::new(LogicalType::HugeInt, Payload::HugeInt(value))
    }

    pub fn utinyint(value: u8) -> Self {
        Self::new(LogicalType::UTinyInt, Payload::UTinyInt(value))
    }

    pub fn usmallint(value: u16) -> Self {
        Self::new(LogicalType::USmallInt, Payload::USmallInt(value))
    }

    pub fn uinteger(value: u32) -> Self {
        Self::new(LogicalType::UInteger, Payload::UInteger(value))
    }

    pub fn ubigint(value: u64) -> Self {
        Self::new(LogicalType::UBigInt, Payload::UBigInt(value))
    }

    pub fn float(value: f32) -> Self {
        Self::new(LogicalType::Float, Payload::Float(value))
    }

    pub fn double(value: f64) -> Self {
        Self::new(LogicalType::Double, Payload::Double(value))
    }

    /// Integer of any integral kind, range-checked against that kind.
    pub fn integral(logical_type: &LogicalType, value: i128) -> ValueResult<Self> {
        let (min, max) = logical_type
            .integral_range()
            .ok_or_else(|| ValueError::type_mismatch("an integer type", logical_type))?;
        if value < min || value > max {
            return Err(ValueError::out_of_range(value, logical_type));
        }
        let payload = match logical_type {
            LogicalType::TinyInt => Payload::TinyInt(value as i8),
            LogicalType::SmallInt => Payload::SmallInt(value as i16),
            LogicalType::Integer => Payload::Integer(value as i32),
            LogicalType::BigInt => Payload::BigInt(value as i64),
            LogicalType::UTinyInt => Payload::UTinyInt(value as u8),
            LogicalType::USmallInt => Payload::USmallInt(value as u16),
            LogicalType::UInteger => Payload::UInteger(value as u32),
            LogicalType::UBigInt => Payload::UBigInt(value as u64),
            // HUGEINT
            _ => Payload::HugeInt(value),
        };
        Ok(Self::new(logical_type.clone(), payload))
    }

    /// `DECIMAL(width, scale)`; the value is rounded half away from zero to
    /// `scale` digits and rejected if its integral part needs more than
    /// `width - scale` digits, or if the 96-bit payload cannot carry all
    /// `scale` fractional digits next to that integral part.
    pub fn decimal(value: Decimal, width: u8, scale: u8) -> ValueResult<Self> {
        let logical_type = LogicalType::decimal(width, scale);
        logical_type.validate()?;

        let mut rounded =
            value.round_dp_with_strategy(u32::from(scale), RoundingStrategy::MidpointAwayFromZero);
        rounded.rescale(u32::from(scale));
        let overflow = || ValueError::DecimalOverflow {
            value: value.to_string(),
            width,
            scale,
        };
        if rounded.scale() != u32::from(scale) {
            return Err(overflow());
        }

        let integral_digits = u32::from(width - scale);
        if integral_digits <= u32::from(MAX_DECIMAL_SCALE) {
            let limit = Decimal::from_i128_with_scale(10i128.pow(integral_digits), 0);
            if rounded.abs().trunc() >= limit {
                return Err(overflow());
            }
        }

        Ok(Self::new(logical_type, Payload::Decimal(rounded)))
    }

    pub fn varchar(value: impl Into<SmolStr>) -> Self {
        Self::new(LogicalType::Varchar, Payload::Varchar(value.into()))
    }

    pub fn blob(value: impl Into<Vec<u8>>) -> Self {
        Self::new(LogicalType::Blob, Payload::Blob(value.into()))
    }

    pub fn date(value: NaiveDate) -> Self {
        Self::new(LogicalType::Date, Payload::Date(value))
    }

    pub fn time(value: NaiveTime) -> Self {
        Self::new(LogicalType::Time, Payload::Time(value))
    }

    pub fn timestamp(value: NaiveDateTime) -> Self {
        Self::new(LogicalType::Timestamp, Payload::Timestamp(value))
    }

    pub fn timestamp_tz(value: DateTime<Utc>) -> Self {
        Self::new(LogicalType::TimestampTz, Payload::TimestampTz(value))
    }

    pub fn interval(value: Interval) -> Self {
        Self::new(LogicalType::Interval, Payload::Interval(value))
    }

    pub fn uuid(value: Uuid) -> Self {
        Self::new(LogicalType::Uuid, Payload::Uuid(value))
    }

    /// Member `label` of an `ENUM` type.
    pub fn enum_value(logical_type: &LogicalType, label: &str) -> ValueResult<Self> {
        if logical_type.enum_labels().is_none() {
            return Err(ValueError::type_mismatch("an ENUM type", logical_type));
        }
        logical_type.validate()?;
        let index = logical_type
            .enum_index(label)
            .ok_or_else(|| ValueError::InvalidEnumLabel {
                label: label.to_string(),
                enum_type: logical_type.to_string(),
            })?;
        Ok(Self::new(logical_type.clone(), Payload::Enum(index)))
    }

    /// `child[]` holding `values`, each of which must be typed `child`.
    pub fn list(child: LogicalType, values: Vec<Value>) -> ValueResult<Self> {
        child.validate()?;
        for value in &values {
            expect_type(&child, value)?;
        }
        Ok(Self::new(LogicalType::list(child), Payload::List(values)))
    }

    /// Struct whose type is derived from its named children.
    pub fn struct_value<N: Into<SmolStr>>(
        fields: impl IntoIterator<Item = (N, Value)>,
    ) -> ValueResult<Self> {
        let (types, children): (Vec<StructField>, Vec<Value>) = fields
            .into_iter()
            .map(|(name, value)| (StructField::new(name, value.logical_type.clone()), value))
            .unzip();
        let logical_type = LogicalType::Struct(types);
        logical_type.validate()?;
        Ok(Self::new(logical_type, Payload::Struct(children)))
    }

    /// Struct of a declared type; `children` follow the declared field order.
    pub fn struct_with_type(logical_type: LogicalType, children: Vec<Value>) -> ValueResult<Self> {
        let fields = logical_type
            .struct_fields()
            .ok_or_else(|| ValueError::type_mismatch("a STRUCT type", &logical_type))?;
        logical_type.validate()?;
        if fields.len() != children.len() {
            return Err(ValueError::invalid_type(format!(
                "{} declares {} fields, got {} values",
                logical_type,
                fields.len(),
                children.len()
            )));
        }
        for (field, child) in fields.iter().zip(&children) {
            expect_type(&field.logical_type, child)?;
        }
        Ok(Self::new(logical_type, Payload::Struct(children)))
    }

    /// `MAP(key, value)`; keys must be non-null and distinct.
    pub fn map(
        key: LogicalType,
        value: LogicalType,
        entries: Vec<(Value, Value)>,
    ) -> ValueResult<Self> {
        let logical_type = LogicalType::map(key, value);
        logical_type.validate()?;
        let LogicalType::Map {
            key: key_type,
            value: value_type,
        } = &logical_type
        else {
            unreachable!("LogicalType::map builds a map type");
        };

        for (i, (k, v)) in entries.iter().enumerate() {
            expect_type(key_type, k)?;
            expect_type(value_type, v)?;
            if k.is_null() {
                return Err(ValueError::NullMapKey);
            }
            if entries[..i].iter().any(|(seen, _)| same_key(seen, k)) {
                return Err(ValueError::DuplicateMapKey { key: k.to_string() });
            }
        }
        Ok(Self::new(logical_type, Payload::Map(entries)))
    }

    pub fn bit(bits: Vec<bool>) -> Self {
        Self::new(LogicalType::Bit, Payload::Bit(bits))
    }

    /// Check if this value is NULL
    pub fn is_null(&self) -> bool {
        self.payload.is_none()
    }

    pub fn logical_type(&self) -> &LogicalType {
        &self.logical_type
    }

    /// Content of a non-null value
    pub fn payload(&self) -> Option<&Payload> {
        self.payload.as_ref()
    }

    pub fn into_parts(self) -> (LogicalType, Option<Payload>) {
        (self.logical_type, self.payload)
    }

    /// Try to extract as bool
    pub fn as_bool(&self) -> Option<bool> {
        match self.payload {
            Some(Payload::Boolean(b)) => Some(b),
            _ => None,
        }
    }

    /// Any integral payload widened to `i128`
    pub fn as_i128(&self) -> Option<i128> {
        let n = match self.payload.as_ref()? {
            Payload::TinyInt(n) => i128::from(*n),
            Payload::SmallInt(n) => i128::from(*n),
            Payload::Integer(n) => i128::from(*n),
            Payload::BigInt(n) => i128::from(*n),
            Payload::HugeInt(n) => *n,
            Payload::UTinyInt(n) => i128::from(*n),
            Payload::USmallInt(n) => i128::from(*n),
            Payload::UInteger(n) => i128::from(*n),
            Payload::UBigInt(n) => i128::from(*n),
            _ => return None,
        };
        Some(n)
    }

    /// Try to extract as f64
    pub fn as_f64(&self) -> Option<f64> {
        match self.payload {
            Some(Payload::Float(f)) => Some(f64::from(f)),
            Some(Payload::Double(f)) => Some(f),
            _ => None,
        }
    }

    /// Varchar content, or the label of an enum value
    pub fn as_str(&self) -> Option<&str> {
        match self.payload.as_ref()? {
            Payload::Varchar(s) => Some(s.as_str()),
            Payload::Enum(index) => self.enum_label(*index),
            _ => None,
        }
    }

    /// Elements of a list
    pub fn list_elements(&self) -> Option<&[Value]> {
        match self.payload.as_ref()? {
            Payload::List(values) => Some(values),
            _ => None,
        }
    }

    /// `(name, child)` pairs of a non-null struct, in declared order
    pub fn struct_entries(&self) -> Option<impl Iterator<Item = (&SmolStr, &Value)>> {
        let fields = self.logical_type.struct_fields()?;
        match self.payload.as_ref()? {
            Payload::Struct(children) => {
                Some(fields.iter().map(|field| &field.name).zip(children.iter()))
            }
            _ => None,
        }
    }

    /// Entries of a map
    pub fn map_entries(&self) -> Option<&[(Value, Value)]> {
        match self.payload.as_ref()? {
            Payload::Map(entries) => Some(entries),
            _ => None,
        }
    }

    fn enum_label(&self, index: u32) -> Option<&str> {
        self.logical_type
            .enum_labels()?
            .get(index as usize)
            .map(SmolStr::as_str)
    }
}

fn expect_type(expected: &LogicalType, value: &Value) -> ValueResult<()> {
    if value.logical_type() == expected {
        Ok(())
    } else {
        Err(ValueError::type_mismatch(expected, value.logical_type()))
    }
}

/// Map key equality: NaN keys are equal to each other.
fn same_key(a: &Value, b: &Value) -> bool {
    match (&a.payload, &b.payload) {
        (Some(Payload::Float(x)), Some(Payload::Float(y))) => x == y || (x.is_nan() && y.is_nan()),
        (Some(Payload::Double(x)), Some(Payload::Double(y))) => {
            x == y || (x.is_nan() && y.is_nan())
        }
        (Some(Payload::List(xs)), Some(Payload::List(ys)))
        | (Some(Payload::Struct(xs)), Some(Payload::Struct(ys))) => {
            a.logical_type == b.logical_type
                && xs.len() == ys.len()
                && xs.iter().zip(ys).all(|(x, y)| same_key(x, y))
        }
        _ => a == b,
    }
}

fn write_seq<'a>(
    f: &mut fmt::Formatter<'_>,
    items: impl Iterator<Item = &'a Value>,
) -> fmt::Result {
    for (i, item) in items.enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{}", item)?;
    }
    Ok(())
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Some(payload) = &self.payload else {
            return write!(f, "NULL");
        };
        match payload {
            Payload::Boolean(b) => write!(f, "{}", b),
            Payload::TinyInt(n) => write!(f, "{}", n),
            Payload::SmallInt(n) => write!(f, "{}", n),
            Payload::Integer(n) => write!(f, "{}", n),
            Payload::BigInt(n) => write!(f, "{}", n),
            Payload::HugeInt(n) => write!(f, "{}", n),
            Payload::UTinyInt(n) => write!(f, "{}", n),
            Payload::USmallInt(n) => write!(f, "{}", n),
            Payload::UInteger(n) => write!(f, "{}", n),
            Payload::UBigInt(n) => write!(f, "{}", n),
            Payload::Float(n) => write!(f, "{}", n),
            Payload::Double(n) => write!(f, "{}", n),
            Payload::Decimal(d) => write!(f, "{}", d),
            Payload::Varchar(s) => write!(f, "'{}'", s),
            Payload::Blob(bytes) => {
                write!(f, "'")?;
                for b in bytes {
                    write!(f, "\\x{:02X}", b)?;
                }
                write!(f, "'")
            }
            Payload::Date(d) => write!(f, "{}", d),
            Payload::Time(t) => write!(f, "{}", t),
            Payload::Timestamp(ts) => write!(f, "{}", ts),
            Payload::TimestampTz(ts) => write!(f, "{}", ts.format("%Y-%m-%d %H:%M:%S%.f+00")),
            Payload::Interval(iv) => write!(f, "{}", iv),
            Payload::Uuid(u) => write!(f, "{}", u),
            Payload::Enum(index) => write!(f, "'{}'", self.enum_label(*index).unwrap_or("?")),
            Payload::List(values) => {
                write!(f, "[")?;
                write_seq(f, values.iter())?;
                write!(f, "]")
            }
            Payload::Struct(children) => {
                write!(f, "{{")?;
                let names = self
                    .logical_type
                    .struct_fields()
                    .unwrap_or_default()
                    .iter()
                    .map(|field| field.name.as_str());
                for (i, (name, child)) in names.zip(children).enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "'{}': {}", name, child)?;
                }
                write!(f, "}}")
            }
            Payload::Map(entries) => {
                write!(f, "{{")?;
                for (i, (k, v)) in entries.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}={}", k, v)?;
                }
                write!(f, "}}")
            }
            Payload::Bit(bits) => {
                for bit in bits {
                    write!(f, "{}", if *bit { '1' } else { '0' })?;
                }
                Ok(())
            }
        }
    }
}
