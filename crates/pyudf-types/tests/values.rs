//! Integration tests for nested typed values.

use pretty_assertions::assert_eq;
use pyudf_types::chrono::{NaiveDate, TimeZone, Utc};
use pyudf_types::{Interval, LogicalType, Payload, Value, ValueError};

fn point_type() -> LogicalType {
    LogicalType::structure([("x", LogicalType::Double), ("y", LogicalType::Double)])
}

#[test]
fn test_list_of_structs() {
    let points = vec![
        Value::struct_with_type(point_type(), vec![Value::double(1.0), Value::double(2.0)]).unwrap(),
        Value::null(point_type()),
    ];
    let list = Value::list(point_type(), points).unwrap();

    assert_eq!(
        list.logical_type().to_string(),
        "STRUCT(x DOUBLE, y DOUBLE)[]"
    );
    assert_eq!(list.to_string(), "[{'x': 1, 'y': 2}, NULL]");
    assert_eq!(list.list_elements().map(<[Value]>::len), Some(2));
}

#[test]
fn test_map_of_lists() {
    let tags = LogicalType::list(LogicalType::Varchar);
    let entries = vec![(
        Value::integer(7),
        Value::list(LogicalType::Varchar, vec![Value::varchar("a")]).unwrap(),
    )];
    let map = Value::map(LogicalType::Integer, tags.clone(), entries).unwrap();

    assert_eq!(map.logical_type(), &LogicalType::map(LogicalType::Integer, tags));
    let (key, value) = &map.map_entries().unwrap()[0];
    assert_eq!(key, &Value::integer(7));
    assert_eq!(value.to_string(), "['a']");
}

#[test]
fn test_nested_type_mismatch_surfaces() {
    let wrong = Value::struct_value([("x", Value::integer(1))]).unwrap();
    let err = Value::list(point_type(), vec![wrong]).unwrap_err();
    assert_eq!(
        err,
        ValueError::type_mismatch("STRUCT(x DOUBLE, y DOUBLE)", "STRUCT(x INTEGER)")
    );
}

#[test]
fn test_temporal_payloads() {
    let ts = Utc.with_ymd_and_hms(2024, 5, 1, 8, 30, 0).unwrap();
    let v = Value::timestamp_tz(ts);
    assert_eq!(v.payload(), Some(&Payload::TimestampTz(ts)));
    assert_eq!(v.to_string(), "2024-05-01 08:30:00+00");

    let day = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
    let naive = day.and_hms_opt(8, 30, 0).unwrap();
    assert_eq!(Value::timestamp(naive).to_string(), "2024-05-01 08:30:00");

    let iv = Value::interval(Interval::new(1, 2, 0));
    assert_eq!(iv.to_string(), "1 months 2 days");
}
