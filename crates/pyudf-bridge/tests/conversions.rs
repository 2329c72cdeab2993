//! End-to-end conversion properties of the public API.

use pretty_assertions::assert_eq;
use pyudf_bridge::{
    convert_py_object_to_duckdb_value, convert_py_objects_to_duckdb_values, duckdb_to_py,
    duckdbs_to_pys, py_object_to_iterable, struct_to_dict, ConversionOptions, Converter,
    PyBridgeDiagnostic, PyBridgeError, PyDict, PyIterator, PyValue, ToPython,
};
use pyudf_types::chrono::{NaiveDate, NaiveTime, TimeZone, Utc};
use pyudf_types::rust_decimal::Decimal;
use pyudf_types::uuid::Uuid;
use pyudf_types::{Interval, LogicalType, Value};

fn primitive_samples() -> Vec<Value> {
    let day = NaiveDate::from_ymd_opt(2023, 12, 31).unwrap();
    let time = NaiveTime::from_hms_micro_opt(23, 59, 59, 999_999).unwrap();
    vec![
        Value::boolean(false),
        Value::tinyint(-128),
        Value::smallint(i16::MAX),
        Value::integer(-7),
        Value::bigint(i64::MIN),
        Value::hugeint(i128::MAX),
        Value::utinyint(u8::MAX),
        Value::usmallint(1),
        Value::uinteger(u32::MAX),
        Value::ubigint(u64::MAX),
        Value::float(0.1),
        Value::double(-2.5e-300),
        Value::decimal(Decimal::new(-123_456, 3), 18, 3).unwrap(),
        Value::varchar("ünïcode"),
        Value::blob(vec![0u8, 7, 255]),
        Value::date(day),
        Value::time(time),
        Value::timestamp(day.and_time(time)),
        Value::timestamp_tz(Utc.with_ymd_and_hms(2000, 1, 1, 0, 0, 0).unwrap()),
        Value::interval(Interval::new(0, -3, 1_500)),
        Value::uuid(Uuid::from_u128(0xdead_beef)),
        Value::enum_value(&LogicalType::enumeration(["lo", "hi"]), "hi").unwrap(),
    ]
}

#[test]
fn test_primitive_round_trip() {
    for value in primitive_samples() {
        let object = duckdb_to_py(&value).unwrap();
        let back = convert_py_object_to_duckdb_value(&object, value.logical_type()).unwrap();
        assert_eq!(back, value, "round trip through {}", object);
    }
}

#[test]
fn test_nested_round_trip() {
    let row_type = LogicalType::structure([
        ("id", LogicalType::BigInt),
        ("tags", LogicalType::list(LogicalType::Varchar)),
        (
            "scores",
            LogicalType::map(LogicalType::Varchar, LogicalType::Double),
        ),
    ]);
    let value = Value::struct_with_type(
        row_type.clone(),
        vec![
            Value::bigint(9),
            Value::list(
                LogicalType::Varchar,
                vec![Value::varchar("a"), Value::null(LogicalType::Varchar)],
            )
            .unwrap(),
            Value::map(
                LogicalType::Varchar,
                LogicalType::Double,
                vec![(Value::varchar("math"), Value::double(0.5))],
            )
            .unwrap(),
        ],
    )
    .unwrap();

    let object = duckdb_to_py(&value).unwrap();
    assert_eq!(
        object.to_string(),
        "{'id': 9, 'tags': ['a', None], 'scores': {'math': 0.5}}"
    );
    assert_eq!(convert_py_object_to_duckdb_value(&object, &row_type).unwrap(), value);
}

#[test]
fn test_null_handling() {
    for value in primitive_samples() {
        let ty = value.logical_type().clone();
        assert_eq!(duckdb_to_py(&Value::null(ty.clone())).unwrap(), PyValue::None);
        assert_eq!(
            convert_py_object_to_duckdb_value(&PyValue::None, &ty).unwrap(),
            Value::null(ty)
        );
    }
}

#[test]
fn test_batch_preserves_order() {
    let values = vec![Value::integer(3), Value::varchar("two"), Value::boolean(true)];
    let object = duckdbs_to_pys(&values).unwrap();
    let PyValue::List(list) = &object else {
        panic!("expected a list, got {}", object);
    };
    assert_eq!(list.len(), values.len());
    for (i, value) in values.iter().enumerate() {
        assert_eq!(list.get(i).unwrap(), duckdb_to_py(value).unwrap());
    }
}

#[test]
fn test_batch_fails_as_a_whole() {
    let values = vec![Value::integer(1), Value::bit(vec![true])];
    let err = duckdbs_to_pys(&values).unwrap_err();
    assert!(err.is_unsupported());
    assert_eq!(err.path().unwrap().to_string(), "[1]");
}

#[test]
fn test_struct_field_fidelity() {
    let value = Value::struct_value([("a", Value::integer(1)), ("b", Value::varchar("x"))]).unwrap();
    let dict = struct_to_dict(&value).unwrap();

    assert_eq!(dict.len(), 2);
    assert_eq!(dict.keys(), vec![PyValue::str("a"), PyValue::str("b")]);
    assert_eq!(dict.get_str("a"), Some(PyValue::Int(1)));
    assert_eq!(dict.get_str("b"), Some(PyValue::str("x")));
}

#[test]
fn test_positional_typed_conversion() {
    let returned = (5i32, "hi").to_python();
    let mut out = Vec::new();
    convert_py_objects_to_duckdb_values(
        &py_object_to_iterable(&returned),
        &[LogicalType::Integer, LogicalType::Varchar],
        &mut out,
    )
    .unwrap();
    assert_eq!(out, vec![Value::integer(5), Value::varchar("hi")]);
}

#[test]
fn test_single_return_value_fills_one_slot() {
    let mut out = Vec::new();
    convert_py_objects_to_duckdb_values(
        &py_object_to_iterable(&PyValue::str("only")),
        &[LogicalType::Varchar],
        &mut out,
    )
    .unwrap();
    assert_eq!(out, vec![Value::varchar("only")]);
}

#[test]
fn test_missing_struct_field_is_an_error() {
    let ty = LogicalType::structure([("a", LogicalType::Integer), ("b", LogicalType::Varchar)]);
    let dict = PyDict::new();
    dict.set_str("a", PyValue::Int(1));

    let err = convert_py_object_to_duckdb_value(&PyValue::Dict(dict), &ty).unwrap_err();
    assert!(matches!(err, PyBridgeError::MissingStructField { ref field, .. } if field == "b"));
}

#[test]
fn test_underflow_is_arity_mismatch() {
    let mut out = vec![Value::integer(0)];
    let err = convert_py_objects_to_duckdb_values(
        &py_object_to_iterable(&PyValue::tuple([PyValue::Int(1)])),
        &[LogicalType::Integer, LogicalType::Integer, LogicalType::Integer],
        &mut out,
    )
    .unwrap_err();
    assert!(err.is_arity_error());
    assert_eq!(err.to_string(), "wrong number of arguments: expected 3, got 1");
    assert_eq!(out, vec![Value::integer(0)]);
}

#[test]
fn test_generator_exception_propagates() {
    let items = vec![
        Ok(PyValue::Int(1)),
        Err(PyBridgeError::exception("ZeroDivisionError", "division by zero", None)),
    ];
    let generator = PyIterator::generator(items.into_iter());
    let object = PyValue::Iterator(generator.clone());
    let mut out = Vec::new();

    let err = convert_py_objects_to_duckdb_values(
        &object,
        &[LogicalType::Integer, LogicalType::Integer],
        &mut out,
    )
    .unwrap_err();
    assert!(err.is_python_exception());
    assert_eq!(err.path().unwrap().to_string(), "args[1]");
    assert!(out.is_empty());

    drop(object);
    assert_eq!(generator.ref_count(), 1);
}

#[test]
fn test_iterator_handles_released_after_failure() {
    let it = PyIterator::from_values(vec![PyValue::str("nope")], "generator");
    let normalized = py_object_to_iterable(&PyValue::Iterator(it.clone()));
    assert_eq!(it.ref_count(), 2);

    let mut out = Vec::new();
    let err = convert_py_objects_to_duckdb_values(&normalized, &[LogicalType::Integer], &mut out)
        .unwrap_err();
    assert!(err.is_type_error());
    assert_eq!(it.ref_count(), 2);

    drop(normalized);
    assert_eq!(it.ref_count(), 1);
}

#[test]
fn test_converter_options_apply() {
    let options = ConversionOptions::from_toml_str(
        r#"
        allow-extra-struct-fields = true
        interval-month-days = 28
        "#,
    )
    .unwrap();
    let conv = Converter::new(options);

    let object = conv
        .duckdb_to_py(&Value::interval(Interval::new(1, 0, 0)))
        .unwrap();
    assert_eq!(object.to_string(), "28 days, 0:00:00");

    let ty = LogicalType::structure([("a", LogicalType::Integer)]);
    let dict = PyDict::new();
    dict.set_str("a", PyValue::Int(1));
    dict.set_str("extra", PyValue::Int(2));
    let value = conv
        .convert_py_object_to_duckdb_value(&PyValue::Dict(dict), &ty)
        .unwrap();
    assert_eq!(value.to_string(), "{'a': 1}");
}

#[test]
fn test_diagnostic_for_nested_failure() {
    let ty = LogicalType::list(LogicalType::structure([("n", LogicalType::TinyInt)]));
    let first = PyDict::new();
    first.set_str("n", PyValue::Int(1));
    let second = PyDict::new();
    second.set_str("n", PyValue::Int(1_000));
    let object = PyValue::list([PyValue::Dict(first), PyValue::Dict(second)]);

    let err = convert_py_object_to_duckdb_value(&object, &ty).unwrap_err();
    let diag = PyBridgeDiagnostic::from_error(err);
    insta::assert_snapshot!(diag.to_string().trim_end(), @r###"
    error: numeric overflow: 1000 cannot be represented as TINYINT
      --> [1].n
    help: declare a wider numeric type
    "###);
}
