//! Logical Types
//!
//! The schema-level type catalog of the engine. Every [`Value`](crate::Value)
//! carries one of these, and every conversion into the engine is driven by one.

use std::fmt;

use smol_str::SmolStr;

use crate::error::{ValueError, ValueResult};

/// Widest decimal the engine stores.
pub const MAX_DECIMAL_WIDTH: u8 = 38;

/// Largest scale representable by the decimal payload.
pub const MAX_DECIMAL_SCALE: u8 = 28;

/// A named, typed struct member.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StructField {
    /// Field name
    pub name: SmolStr,
    /// Field type
    pub logical_type: LogicalType,
}

impl StructField {
    /// Create a struct field
    pub fn new(name: impl Into<SmolStr>, logical_type: LogicalType) -> Self {
        Self {
            name: name.into(),
            logical_type,
        }
    }
}

/// Schema-level type of an engine value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LogicalType {
    /// Type of an untyped NULL literal
    SqlNull,
    Boolean,

    TinyInt,
    SmallInt,
    Integer,
    BigInt,
    HugeInt,

    UTinyInt,
    USmallInt,
    UInteger,
    UBigInt,

    Float,
    Double,

    /// Fixed-point number with `width` total digits, `scale` of them fractional
    Decimal { width: u8, scale: u8 },

    Varchar,
    Blob,

    Date,
    Time,
    /// Naive timestamp, microsecond precision
    Timestamp,
    /// Instant in time, stored as UTC
    TimestampTz,
    Interval,
    Uuid,

    /// Dictionary-encoded string; values are positions in the label list
    Enum(Vec<SmolStr>),

    List(Box<LogicalType>),
    Struct(Vec<StructField>),
    Map {
        key: Box<LogicalType>,
        value: Box<LogicalType>,
    },

    /// Bit string
    Bit,
}

/// Fieldless discriminant of [`LogicalType`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogicalTypeId {
    SqlNull,
    Boolean,
    TinyInt,
    SmallInt,
    Integer,
    BigInt,
    HugeInt,
    UTinyInt,
    USmallInt,
    UInteger,
    UBigInt,
    Float,
    Double,
    Decimal,
    Varchar,
    Blob,
    Date,
    Time,
    Timestamp,
    TimestampTz,
    Interval,
    Uuid,
    Enum,
    List,
    Struct,
    Map,
    Bit,
}

impl LogicalType {
    /// `DECIMAL(width, scale)`
    pub fn decimal(width: u8, scale: u8) -> Self {
        LogicalType::Decimal { width, scale }
    }

    /// `child[]`
    pub fn list(child: LogicalType) -> Self {
        LogicalType::List(Box::new(child))
    }

    /// `MAP(key, value)`
    pub fn map(key: LogicalType, value: LogicalType) -> Self {
        LogicalType::Map {
            key: Box::new(key),
            value: Box::new(value),
        }
    }

    /// `STRUCT(name type, ...)`
    pub fn structure<N: Into<SmolStr>>(fields: impl IntoIterator<Item = (N, LogicalType)>) -> Self {
        LogicalType::Struct(
            fields
                .into_iter()
                .map(|(name, ty)| StructField::new(name, ty))
                .collect(),
        )
    }

    /// `ENUM('label', ...)`
    pub fn enumeration<L: Into<SmolStr>>(labels: impl IntoIterator<Item = L>) -> Self {
        LogicalType::Enum(labels.into_iter().map(Into::into).collect())
    }

    /// Get the discriminant of this type
    pub fn id(&self) -> LogicalTypeId {
        match self {
            LogicalType::SqlNull => LogicalTypeId::SqlNull,
            LogicalType::Boolean => LogicalTypeId::Boolean,
            LogicalType::TinyInt => LogicalTypeId::TinyInt,
            LogicalType::SmallInt => LogicalTypeId::SmallInt,
            LogicalType::Integer => LogicalTypeId::Integer,
            LogicalType::BigInt => LogicalTypeId::BigInt,
            LogicalType::HugeInt => LogicalTypeId::HugeInt,
            LogicalType::UTinyInt => LogicalTypeId::UTinyInt,
            LogicalType::USmallInt => LogicalTypeId::USmallInt,
            LogicalType::UInteger => LogicalTypeId::UInteger,
            LogicalType::UBigInt => LogicalTypeId::UBigInt,
            LogicalType::Float => LogicalTypeId::Float,
            LogicalType::Double => LogicalTypeId::Double,
            LogicalType::Decimal { .. } => LogicalTypeId::Decimal,
            LogicalType::Varchar => LogicalTypeId::Varchar,
            LogicalType::Blob => LogicalTypeId::Blob,
            LogicalType::Date => LogicalTypeId::Date,
            LogicalType::Time => LogicalTypeId::Time,
            LogicalType::Timestamp => LogicalTypeId::Timestamp,
            LogicalType::TimestampTz => LogicalTypeId::TimestampTz,
            LogicalType::Interval => LogicalTypeId::Interval,
            LogicalType::Uuid => LogicalTypeId::Uuid,
            LogicalType::Enum(_) => LogicalTypeId::Enum,
            LogicalType::List(_) => LogicalTypeId::List,
            LogicalType::Struct(_) => LogicalTypeId::Struct,
            LogicalType::Map { .. } => LogicalTypeId::Map,
            LogicalType::Bit => LogicalTypeId::Bit,
        }
    }

    /// Check if this is one of the integer kinds
    pub fn is_integral(&self) -> bool {
        matches!(
            self,
            LogicalType::TinyInt
                | LogicalType::SmallInt
                | LogicalType::Integer
                | LogicalType::BigInt
                | LogicalType::HugeInt
                | LogicalType::UTinyInt
                | LogicalType::USmallInt
                | LogicalType::UInteger
                | LogicalType::UBigInt
        )
    }

    /// Check whether this type, or any type nested inside it, is of kind `id`.
    pub fn contains(&self, id: LogicalTypeId) -> bool {
        if self.id() == id {
            return true;
        }
        match self {
            LogicalType::List(child) => child.contains(id),
            LogicalType::Struct(fields) => fields.iter().any(|f| f.logical_type.contains(id)),
            LogicalType::Map { key, value } => key.contains(id) || value.contains(id),
            _ => false,
        }
    }

    /// Inclusive range of an integer kind, widened to `i128`.
    pub fn integral_range(&self) -> Option<(i128, i128)> {
        let range = match self {
            LogicalType::TinyInt => (i8::MIN as i128, i8::MAX as i128),
            LogicalType::SmallInt => (i16::MIN as i128, i16::MAX as i128),
            LogicalType::Integer => (i32::MIN as i128, i32::MAX as i128),
            LogicalType::BigInt => (i64::MIN as i128, i64::MAX as i128),
            LogicalType::HugeInt => (i128::MIN, i128::MAX),
            LogicalType::UTinyInt => (0, u8::MAX as i128),
            LogicalType::USmallInt => (0, u16::MAX as i128),
            LogicalType::UInteger => (0, u32::MAX as i128),
            LogicalType::UBigInt => (0, u64::MAX as i128),
            _ => return None,
        };
        Some(range)
    }

    /// Fields of a struct
    pub fn struct_fields(&self) -> Option<&[StructField]> {
        match self {
            LogicalType::Struct(fields) => Some(fields),
            _ => None,
        }
    }

    /// Labels of an enum
    pub fn enum_labels(&self) -> Option<&[SmolStr]> {
        match self {
            LogicalType::Enum(labels) => Some(labels),
            _ => None,
        }
    }

    /// Position of `label` in an enum dictionary
    pub fn enum_index(&self, label: &str) -> Option<u32> {
        self.enum_labels()?
            .iter()
            .position(|l| l == label)
            .map(|i| i as u32)
    }

    /// Check the type is well formed, recursing into children.
    pub fn validate(&self) -> ValueResult<()> {
        match self {
            LogicalType::Decimal { width, scale } => {
                if *width == 0 || *width > MAX_DECIMAL_WIDTH {
                    return Err(ValueError::invalid_type(format!(
                        "decimal width must be between 1 and {}, got {}",
                        MAX_DECIMAL_WIDTH, width
                    )));
                }
                if scale > width {
                    return Err(ValueError::invalid_type(format!(
                        "decimal scale {} exceeds width {}",
                        scale, width
                    )));
                }
                if *scale > MAX_DECIMAL_SCALE {
                    return Err(ValueError::invalid_type(format!(
                        "decimal scale {} exceeds the supported maximum of {}",
                        scale, MAX_DECIMAL_SCALE
                    )));
                }
                Ok(())
            }
            LogicalType::Enum(labels) => {
                if labels.is_empty() {
                    return Err(ValueError::invalid_type("enum needs at least one label"));
                }
                for (i, label) in labels.iter().enumerate() {
                    if labels[..i].contains(label) {
                        return Err(ValueError::invalid_type(format!(
                            "duplicate enum label '{}'",
                            label
                        )));
                    }
                }
                Ok(())
            }
            LogicalType::List(child) => child.validate(),
            LogicalType::Struct(fields) => {
                if fields.is_empty() {
                    return Err(ValueError::invalid_type("struct needs at least one field"));
                }
                for (i, field) in fields.iter().enumerate() {
                    if field.name.is_empty() {
                        return Err(ValueError::invalid_type("struct field names cannot be empty"));
                    }
                    if fields[..i].iter().any(|f| f.name == field.name) {
                        return Err(ValueError::DuplicateField {
                            name: field.name.to_string(),
                        });
                    }
                    field.logical_type.validate()?;
                }
                Ok(())
            }
            LogicalType::Map { key, value } => {
                key.validate()?;
                value.validate()
            }
            _ => Ok(()),
        }
    }
}

impl fmt::Display for LogicalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogicalType::SqlNull => write!(f, "NULL"),
            LogicalType::Boolean => write!(f, "BOOLEAN"),
            LogicalType::TinyInt => write!(f, "TINYINT"),
            LogicalType::SmallInt => write!(f, "SMALLINT"),
            LogicalType::Integer => write!(f, "INTEGER"),
            LogicalType::BigInt => write!(f, "BIGINT"),
            LogicalType::HugeInt => write!(f, "HUGEINT"),
            LogicalType::UTinyInt => write!(f, "UTINYINT"),
            LogicalType::USmallInt => write!(f, "USMALLINT"),
            LogicalType::UInteger => write!(f, "UINTEGER"),
            LogicalType::UBigInt => write!(f, "UBIGINT"),
            LogicalType::Float => write!(f, "FLOAT"),
            LogicalType::Double => write!(f, "DOUBLE"),
            LogicalType::Decimal { width, scale } => write!(f, "DECIMAL({},{})", width, scale),
            LogicalType::Varchar => write!(f, "VARCHAR"),
            LogicalType::Blob => write!(f, "BLOB"),
            LogicalType::Date => write!(f, "DATE"),
            LogicalType::Time => write!(f, "TIME"),
            LogicalType::Timestamp => write!(f, "TIMESTAMP"),
            LogicalType::TimestampTz => write!(f, "TIMESTAMP WITH TIME ZONE"),
            LogicalType::Interval => write!(f, "INTERVAL"),
            LogicalType::Uuid => write!(f, "UUID"),
            LogicalType::Enum(labels) => {
                write!(f, "ENUM(")?;
                for (i, label) in labels.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "'{}'", label)?;
                }
                write!(f, ")")
            }
            LogicalType::List(child) => write!(f, "{}[]", child),
            LogicalType::Struct(fields) => {
                write!(f, "STRUCT(")?;
                for (i, field) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{} {}", field.name, field.logical_type)?;
                }
                write!(f, ")")
            }
            LogicalType::Map { key, value } => write!(f, "MAP({}, {})", key, value),
            LogicalType::Bit => write!(f, "BIT"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_primitives() {
        assert_eq!(LogicalType::Integer.to_string(), "INTEGER");
        assert_eq!(LogicalType::decimal(10, 2).to_string(), "DECIMAL(10,2)");
        assert_eq!(
            LogicalType::TimestampTz.to_string(),
            "TIMESTAMP WITH TIME ZONE"
        );
    }

    #[test]
    fn test_display_nested() {
        let ty = LogicalType::structure([
            ("a", LogicalType::Integer),
            ("b", LogicalType::list(LogicalType::Varchar)),
        ]);
        assert_eq!(ty.to_string(), "STRUCT(a INTEGER, b VARCHAR[])");

        let map = LogicalType::map(LogicalType::Varchar, LogicalType::Double);
        assert_eq!(map.to_string(), "MAP(VARCHAR, DOUBLE)");

        let en = LogicalType::enumeration(["sad", "happy"]);
        assert_eq!(en.to_string(), "ENUM('sad', 'happy')");
    }

    #[test]
    fn test_integral_range() {
        assert_eq!(LogicalType::TinyInt.integral_range(), Some((-128, 127)));
        assert_eq!(
            LogicalType::UBigInt.integral_range(),
            Some((0, u64::MAX as i128))
        );
        assert_eq!(LogicalType::Double.integral_range(), None);
    }

    #[test]
    fn test_classification() {
        assert!(LogicalType::HugeInt.is_integral());
        assert!(!LogicalType::decimal(4, 1).is_integral());
        assert_eq!(LogicalType::Bit.id(), LogicalTypeId::Bit);
    }

    #[test]
    fn test_contains_nested_kind() {
        assert!(LogicalType::Bit.contains(LogicalTypeId::Bit));
        assert!(LogicalType::list(LogicalType::Bit).contains(LogicalTypeId::Bit));
        let row = LogicalType::structure([
            ("a", LogicalType::Integer),
            ("b", LogicalType::map(LogicalType::Varchar, LogicalType::Bit)),
        ]);
        assert!(row.contains(LogicalTypeId::Bit));
        assert!(row.contains(LogicalTypeId::Map));
        assert!(!row.contains(LogicalTypeId::Uuid));
    }

    #[test]
    fn test_validate_decimal() {
        assert!(LogicalType::decimal(18, 3).validate().is_ok());
        assert!(LogicalType::decimal(0, 0).validate().is_err());
        assert!(LogicalType::decimal(39, 0).validate().is_err());
        assert!(LogicalType::decimal(4, 5).validate().is_err());
        assert!(LogicalType::decimal(38, 30).validate().is_err());
    }

    #[test]
    fn test_validate_struct_and_enum() {
        let dup = LogicalType::structure([("a", LogicalType::Integer), ("a", LogicalType::Varchar)]);
        assert!(matches!(dup.validate(), Err(ValueError::DuplicateField { .. })));

        let empty: Vec<(&str, LogicalType)> = Vec::new();
        assert!(LogicalType::structure(empty).validate().is_err());

        assert!(LogicalType::enumeration(["x", "x"]).validate().is_err());
        let labels: Vec<&str> = Vec::new();
        assert!(LogicalType::enumeration(labels).validate().is_err());

        let nested = LogicalType::list(LogicalType::decimal(50, 1));
        assert!(nested.validate().is_err());
    }

    #[test]
    fn test_enum_index() {
        let en = LogicalType::enumeration(["a", "b", "c"]);
        assert_eq!(en.enum_index("c"), Some(2));
        assert_eq!(en.enum_index("z"), None);
        assert_eq!(LogicalType::Varchar.enum_index("a"), None);
    }
}
