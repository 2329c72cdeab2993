//! Native Object Representations
//!
//! This module models the host runtime's objects as seen by the bridge.
//!
//! ## Type Hierarchy
//!
//! - `PyValue`: Enum covering every object kind the bridge produces or accepts
//! - `PyList`: Mutable, shared `list`
//! - `PyDict`: Mutable, shared, insertion-ordered `dict` with host hashing rules
//! - `PyIterator`: Lazy, finite, non-restartable iterator or generator
//!
//! ## Ownership
//!
//! Containers and iterators are reference-counted handles. Cloning one is an
//! incref, dropping it a decref, and [`PyList::ref_count`] and friends expose
//! the strong count. Handles are `!Send`: the host runtime is single threaded
//! from the bridge's point of view.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta, Timelike, Utc};
use indexmap::IndexMap;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use smol_str::SmolStr;
use uuid::Uuid;

use crate::error::{PyBridgeError, PyBridgeResult};

// ============================================================================
// PyValue Enum - The main native object representation
// ============================================================================

/// A native object.
///
/// `int` is bounded to `i128`, which covers every integer kind of the engine.
#[derive(Debug, Clone)]
pub enum PyValue {
    /// `None`
    None,

    /// `bool`
    Bool(bool),

    /// `int`
    Int(i128),

    /// `float` (IEEE 754 double)
    Float(f64),

    /// `str`
    String(SmolStr),

    /// `bytes`
    Bytes(Vec<u8>),

    /// `decimal.Decimal`
    Decimal(Decimal),

    /// `datetime.date`
    Date(NaiveDate),

    /// `datetime.time`
    Time(NaiveTime),

    /// Naive `datetime.datetime`
    DateTime(NaiveDateTime),

    /// Timezone-aware `datetime.datetime`
    DateTimeTz(DateTime<FixedOffset>),

    /// `datetime.timedelta`
    TimeDelta(TimeDelta),

    /// `uuid.UUID`
    Uuid(Uuid),

    /// `list`
    List(PyList),

    /// `tuple`
    Tuple(Vec<PyValue>),

    /// `dict`
    Dict(PyDict),

    /// `set`
    Set(Vec<PyValue>),

    /// Iterator or generator
    Iterator(PyIterator),
}

impl PyValue {
    /// Shorthand for a `str` object
    pub fn str(s: impl Into<SmolStr>) -> Self {
        PyValue::String(s.into())
    }

    /// `tuple` of the given items
    pub fn tuple(items: impl IntoIterator<Item = PyValue>) -> Self {
        PyValue::Tuple(items.into_iter().collect())
    }

    /// `list` of the given items
    pub fn list(items: impl IntoIterator<Item = PyValue>) -> Self {
        PyValue::List(items.into_iter().collect())
    }

    /// Aware `datetime` in UTC
    pub fn datetime_utc(dt: DateTime<Utc>) -> Self {
        PyValue::DateTimeTz(dt.fixed_offset())
    }

    /// Get the host type name for this value
    pub fn type_name(&self) -> &'static str {
        match self {
            PyValue::None => "NoneType",
            PyValue::Bool(_) => "bool",
            PyValue::Int(_) => "int",
            PyValue::Float(_) => "float",
            PyValue::String(_) => "str",
            PyValue::Bytes(_) => "bytes",
            PyValue::Decimal(_) => "decimal.Decimal",
            PyValue::Date(_) => "datetime.date",
            PyValue::Time(_) => "datetime.time",
            PyValue::DateTime(_) | PyValue::DateTimeTz(_) => "datetime.datetime",
            PyValue::TimeDelta(_) => "datetime.timedelta",
            PyValue::Uuid(_) => "uuid.UUID",
            PyValue::List(_) => "list",
            PyValue::Tuple(_) => "tuple",
            PyValue::Dict(_) => "dict",
            PyValue::Set(_) => "set",
            PyValue::Iterator(it) => it.type_name(),
        }
    }

    /// Check if this value is None
    pub fn is_none(&self) -> bool {
        matches!(self, PyValue::None)
    }

    /// Check if this value is a container or iterator
    pub fn is_container(&self) -> bool {
        matches!(
            self,
            PyValue::List(_)
                | PyValue::Tuple(_)
                | PyValue::Dict(_)
                | PyValue::Set(_)
                | PyValue::Iterator(_)
        )
    }

    /// Try to extract as bool
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            PyValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// `int` and `bool` as an integer
    pub fn as_int(&self) -> Option<i128> {
        match self {
            PyValue::Int(n) => Some(*n),
            PyValue::Bool(b) => Some(i128::from(*b)),
            _ => None,
        }
    }

    /// Try to extract as f64
    pub fn as_float(&self) -> Option<f64> {
        match self {
            PyValue::Float(f) => Some(*f),
            PyValue::Int(n) => Some(*n as f64),
            PyValue::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            _ => None,
        }
    }

    /// Try to extract as string
    pub fn as_str(&self) -> Option<&str> {
        match self {
            PyValue::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// Try to extract as list
    pub fn as_list(&self) -> Option<&PyList> {
        match self {
            PyValue::List(list) => Some(list),
            _ => None,
        }
    }

    /// Try to extract as dict
    pub fn as_dict(&self) -> Option<&PyDict> {
        match self {
            PyValue::Dict(dict) => Some(dict),
            _ => None,
        }
    }

    /// Host `str()` of a scalar. Strings render bare; containers and
    /// iterators have no `str()` form the bridge relies on.
    pub fn to_str(&self) -> Option<String> {
        let s = match self {
            PyValue::None => "None".to_string(),
            PyValue::Bool(b) => if *b { "True" } else { "False" }.to_string(),
            PyValue::Int(n) => n.to_string(),
            PyValue::Float(f) => float_repr(*f),
            PyValue::String(s) => s.to_string(),
            PyValue::Decimal(d) => decimal_str(d),
            PyValue::Date(d) => d.format("%Y-%m-%d").to_string(),
            PyValue::Time(t) => time_repr(t),
            PyValue::DateTime(dt) => format!("{} {}", dt.date().format("%Y-%m-%d"), time_repr(&dt.time())),
            PyValue::DateTimeTz(dt) => format!(
                "{} {}{}",
                dt.date_naive().format("%Y-%m-%d"),
                time_repr(&dt.time()),
                dt.format("%:z")
            ),
            PyValue::TimeDelta(delta) => timedelta_repr(delta),
            PyValue::Uuid(u) => u.hyphenated().to_string(),
            _ => return None,
        };
        Some(s)
    }
}

/// Host `repr()` of a float.
fn float_repr(f: f64) -> String {
    if f.is_nan() {
        return "nan".to_string();
    }
    if f.is_infinite() {
        return if f > 0.0 { "inf" } else { "-inf" }.to_string();
    }
    let s = format!("{:?}", f);
    match s.split_once('e') {
        Some((mantissa, exp)) => {
            let (sign, digits) = match exp.strip_prefix('-') {
                Some(digits) => ('-', digits),
                None => ('+', exp),
            };
            format!("{}e{}{:0>2}", mantissa, sign, digits)
        }
        None => s,
    }
}

/// Host `str()` of a decimal, scientific once the adjusted exponent drops
/// below -6.
fn decimal_str(d: &Decimal) -> String {
    let coefficient = d.mantissa().unsigned_abs().to_string();
    let adjusted = coefficient.len() as i64 - 1 - i64::from(d.scale());
    if adjusted >= -6 {
        return d.to_string();
    }
    let sign = if d.is_sign_negative() { "-" } else { "" };
    match coefficient.split_at(1) {
        (head, "") => format!("{}{}E{}", sign, head, adjusted),
        (head, tail) => format!("{}{}.{}E{}", sign, head, tail, adjusted),
    }
}

fn time_repr(t: &NaiveTime) -> String {
    let micros = t.nanosecond() / 1_000;
    if micros == 0 {
        t.format("%H:%M:%S").to_string()
    } else {
        format!("{}.{:06}", t.format("%H:%M:%S"), micros)
    }
}

/// Host rendering of a timedelta: `[-]D day[s], H:MM:SS[.ffffff]`, days
/// floored so the clock part is never negative.
fn timedelta_repr(delta: &TimeDelta) -> String {
    let total_micros = delta.num_microseconds().unwrap_or(i64::MAX);
    let day_micros = 86_400_000_000i64;
    let days = total_micros.div_euclid(day_micros);
    let rest = total_micros.rem_euclid(day_micros);
    let secs = rest / 1_000_000;
    let micros = rest % 1_000_000;

    let mut out = String::new();
    if days != 0 {
        let unit = if days.abs() == 1 { "day" } else { "days" };
        out.push_str(&format!("{} {}, ", days, unit));
    }
    out.push_str(&format!("{}:{:02}:{:02}", secs / 3600, (secs / 60) % 60, secs % 60));
    if micros != 0 {
        out.push_str(&format!(".{:06}", micros));
    }
    out
}

impl PartialEq for PyValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (PyValue::None, PyValue::None) => true,
            (PyValue::Bool(a), PyValue::Bool(b)) => a == b,
            (PyValue::Int(a), PyValue::Int(b)) => a == b,
            (PyValue::Float(a), PyValue::Float(b)) => a == b,
            (PyValue::String(a), PyValue::String(b)) => a == b,
            (PyValue::Bytes(a), PyValue::Bytes(b)) => a == b,
            (PyValue::Decimal(a), PyValue::Decimal(b)) => a == b,
            (PyValue::Date(a), PyValue::Date(b)) => a == b,
            (PyValue::Time(a), PyValue::Time(b)) => a == b,
            (PyValue::DateTime(a), PyValue::DateTime(b)) => a == b,
            (PyValue::DateTimeTz(a), PyValue::DateTimeTz(b)) => a == b,
            (PyValue::TimeDelta(a), PyValue::TimeDelta(b)) => a == b,
            (PyValue::Uuid(a), PyValue::Uuid(b)) => a == b,
            (PyValue::List(a), PyValue::List(b)) => a == b,
            (PyValue::Tuple(a), PyValue::Tuple(b)) => a == b,
            (PyValue::Dict(a), PyValue::Dict(b)) => a == b,
            (PyValue::Set(a), PyValue::Set(b)) => {
                a.len() == b.len() && a.iter().all(|item| b.contains(item))
            }
            (PyValue::Iterator(a), PyValue::Iterator(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

impl fmt::Display for PyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PyValue::String(s) => write!(f, "'{}'", s),
            PyValue::Bytes(bytes) => {
                write!(f, "b'")?;
                for b in bytes {
                    if b.is_ascii_graphic() || *b == b' ' {
                        write!(f, "{}", *b as char)?;
                    } else {
                        write!(f, "\\x{:02x}", b)?;
                    }
                }
                write!(f, "'")
            }
            PyValue::Decimal(d) => write!(f, "Decimal('{}')", decimal_str(d)),
            PyValue::Uuid(u) => write!(f, "UUID('{}')", u.hyphenated()),
            PyValue::List(list) => write!(f, "{}", list),
            PyValue::Tuple(items) => {
                write!(f, "(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                if items.len() == 1 {
                    write!(f, ",")?;
                }
                write!(f, ")")
            }
            PyValue::Dict(dict) => write!(f, "{}", dict),
            PyValue::Set(items) => {
                if items.is_empty() {
                    return write!(f, "set()");
                }
                write!(f, "{{")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "}}")
            }
            PyValue::Iterator(it) => write!(f, "<{} object>", it.type_name()),
            scalar => match scalar.to_str() {
                Some(s) => write!(f, "{}", s),
                None => write!(f, "<{} object>", scalar.type_name()),
            },
        }
    }
}

impl Default for PyValue {
    fn default() -> Self {
        PyValue::None
    }
}

// ============================================================================
// HashKey - dict key identity under the host's hashing rules
// ============================================================================

/// Hashable identity of a dict key.
///
/// Numbers that compare equal share a key (`True`, `1`, `1.0` and
/// `Decimal('1')`), aware datetimes compare by instant, and containers are
/// unhashable.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum HashKey {
    None,
    Int(i128),
    Float(u64),
    Decimal(Decimal),
    Str(SmolStr),
    Bytes(Vec<u8>),
    Date(NaiveDate),
    Time(NaiveTime),
    DateTime(NaiveDateTime),
    Instant(DateTime<Utc>),
    TimeDelta(TimeDelta),
    Uuid(Uuid),
    Tuple(Vec<HashKey>),
    Identity(usize),
}

impl HashKey {
    /// Compute the key identity of `value`.
    pub fn of(value: &PyValue) -> PyBridgeResult<Self> {
        let key = match value {
            PyValue::None => HashKey::None,
            PyValue::Bool(b) => HashKey::Int(i128::from(*b)),
            PyValue::Int(n) => HashKey::Int(*n),
            PyValue::Float(f) => {
                // i128::MAX as f64 rounds up to 2^127
                if f.fract() == 0.0 && *f >= i128::MIN as f64 && *f < i128::MAX as f64 {
                    HashKey::Int(*f as i128)
                } else {
                    HashKey::Float(f.to_bits())
                }
            }
            PyValue::Decimal(d) => match d.fract().is_zero().then(|| d.to_i128()).flatten() {
                Some(n) => HashKey::Int(n),
                // A decimal equal to a float shares the float's key
                None => match d.to_f64() {
                    Some(f) if Decimal::from_f64_retain(f) == Some(*d) => HashKey::Float(f.to_bits()),
                    _ => HashKey::Decimal(d.normalize()),
                },
            },
            PyValue::String(s) => HashKey::Str(s.clone()),
            PyValue::Bytes(b) => HashKey::Bytes(b.clone()),
            PyValue::Date(d) => HashKey::Date(*d),
            PyValue::Time(t) => HashKey::Time(*t),
            PyValue::DateTime(dt) => HashKey::DateTime(*dt),
            PyValue::DateTimeTz(dt) => HashKey::Instant(dt.with_timezone(&Utc)),
            PyValue::TimeDelta(delta) => HashKey::TimeDelta(*delta),
            PyValue::Uuid(u) => HashKey::Uuid(*u),
            PyValue::Tuple(items) => {
                HashKey::Tuple(items.iter().map(HashKey::of).collect::<PyBridgeResult<_>>()?)
            }
            PyValue::Iterator(it) => HashKey::Identity(it.identity()),
            PyValue::List(_) | PyValue::Dict(_) | PyValue::Set(_) => {
                return Err(PyBridgeError::unhashable(value.type_name()));
            }
        };
        Ok(key)
    }
}

// ============================================================================
// PyList - list type
// ============================================================================

/// `list` handle.
#[derive(Debug, Clone)]
pub struct PyList {
    items: Rc<RefCell<Vec<PyValue>>>,
}

impl PyList {
    /// Create an empty list
    pub fn new() -> Self {
        Self {
            items: Rc::new(RefCell::new(Vec::new())),
        }
    }

    /// Create a list from a vector
    pub fn from_vec(items: Vec<PyValue>) -> Self {
        Self {
            items: Rc::new(RefCell::new(items)),
        }
    }

    /// Get the length of the list
    pub fn len(&self) -> usize {
        self.items.borrow().len()
    }

    /// Check if the list is empty
    pub fn is_empty(&self) -> bool {
        self.items.borrow().is_empty()
    }

    /// Get an item by index
    pub fn get(&self, index: usize) -> Option<PyValue> {
        self.items.borrow().get(index).cloned()
    }

    /// Append an item to the end
    pub fn append(&self, value: PyValue) {
        self.items.borrow_mut().push(value);
    }

    /// Iterate over a snapshot of the items
    pub fn iter(&self) -> impl Iterator<Item = PyValue> {
        self.items.borrow().clone().into_iter()
    }

    /// Convert to a Vec
    pub fn to_vec(&self) -> Vec<PyValue> {
        self.items.borrow().clone()
    }

    /// Number of live handles to this list
    pub fn ref_count(&self) -> usize {
        Rc::strong_count(&self.items)
    }

    /// Check if both handles refer to the same list
    pub fn ptr_eq(&self, other: &PyList) -> bool {
        Rc::ptr_eq(&self.items, &other.items)
    }
}

impl Default for PyList {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for PyList {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other) || *self.items.borrow() == *other.items.borrow()
    }
}

impl fmt::Display for PyList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        let items = self.items.borrow();
        for (i, item) in items.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", item)?;
        }
        write!(f, "]")
    }
}

impl FromIterator<PyValue> for PyList {
    fn from_iter<I: IntoIterator<Item = PyValue>>(iter: I) -> Self {
        PyList::from_vec(iter.into_iter().collect())
    }
}

// ============================================================================
// PyDict - dictionary type
// ============================================================================

/// `dict` handle.
///
/// Entries keep the original key object next to the value; a later insert
/// under an equal key replaces the value but keeps the first key object.
#[derive(Debug, Clone)]
pub struct PyDict {
    items: Rc<RefCell<IndexMap<HashKey, (PyValue, PyValue)>>>,
}

impl PyDict {
    /// Create an empty dictionary
    pub fn new() -> Self {
        Self {
            items: Rc::new(RefCell::new(IndexMap::new())),
        }
    }

    /// Get the number of key-value pairs
    pub fn len(&self) -> usize {
        self.items.borrow().len()
    }

    /// Check if the dictionary is empty
    pub fn is_empty(&self) -> bool {
        self.items.borrow().is_empty()
    }

    /// Set a key-value pair; fails for unhashable keys
    pub fn set(&self, key: PyValue, value: PyValue) -> PyBridgeResult<()> {
        let hash_key = HashKey::of(&key)?;
        let mut items = self.items.borrow_mut();
        match items.get_mut(&hash_key) {
            Some(entry) => entry.1 = value,
            None => {
                items.insert(hash_key, (key, value));
            }
        }
        Ok(())
    }

    /// Set a value under a `str` key
    pub fn set_str(&self, key: impl Into<SmolStr>, value: PyValue) {
        let key = key.into();
        let mut items = self.items.borrow_mut();
        match items.get_mut(&HashKey::Str(key.clone())) {
            Some(entry) => entry.1 = value,
            None => {
                items.insert(HashKey::Str(key.clone()), (PyValue::String(key), value));
            }
        }
    }

    /// Get a value by key; fails for unhashable keys
    pub fn get(&self, key: &PyValue) -> PyBridgeResult<Option<PyValue>> {
        let hash_key = HashKey::of(key)?;
        Ok(self.items.borrow().get(&hash_key).map(|(_, v)| v.clone()))
    }

    /// Get a value by `str` key
    pub fn get_str(&self, key: &str) -> Option<PyValue> {
        self.items
            .borrow()
            .get(&HashKey::Str(SmolStr::new(key)))
            .map(|(_, v)| v.clone())
    }

    /// Check if a `str` key exists
    pub fn contains_str(&self, key: &str) -> bool {
        self.items.borrow().contains_key(&HashKey::Str(SmolStr::new(key)))
    }

    /// Remove a key and return its value
    pub fn remove(&self, key: &PyValue) -> PyBridgeResult<Option<PyValue>> {
        let hash_key = HashKey::of(key)?;
        Ok(self.items.borrow_mut().shift_remove(&hash_key).map(|(_, v)| v))
    }

    /// Get all keys, in insertion order
    pub fn keys(&self) -> Vec<PyValue> {
        self.items.borrow().values().map(|(k, _)| k.clone()).collect()
    }

    /// Get all values, in insertion order
    pub fn values(&self) -> Vec<PyValue> {
        self.items.borrow().values().map(|(_, v)| v.clone()).collect()
    }

    /// Iterate over a snapshot of the key-value pairs
    pub fn iter(&self) -> impl Iterator<Item = (PyValue, PyValue)> {
        self.items
            .borrow()
            .values()
            .cloned()
            .collect::<Vec<_>>()
            .into_iter()
    }

    /// Number of live handles to this dict
    pub fn ref_count(&self) -> usize {
        Rc::strong_count(&self.items)
    }
}

impl Default for PyDict {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for PyDict {
    fn eq(&self, other: &Self) -> bool {
        if Rc::ptr_eq(&self.items, &other.items) {
            return true;
        }
        let ours = self.items.borrow();
        let theirs = other.items.borrow();
        ours.len() == theirs.len()
            && ours
                .iter()
                .all(|(k, (_, v))| theirs.get(k).is_some_and(|(_, w)| v == w))
    }
}

impl fmt::Display for PyDict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        let items = self.items.borrow();
        for (i, (k, v)) in items.values().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}: {}", k, v)?;
        }
        write!(f, "}}")
    }
}

// ============================================================================
// PyIterator - lazy, non-restartable iteration
// ============================================================================

type IterState = Box<dyn Iterator<Item = PyBridgeResult<PyValue>>>;

/// Iterator or generator handle.
///
/// Items are `PyBridgeResult`s so a generator can raise part way through.
/// All clones share one cursor: an item pulled through any handle is gone
/// for every handle.
#[derive(Clone)]
pub struct PyIterator {
    state: Rc<RefCell<IterState>>,
    type_name: &'static str,
}

impl PyIterator {
    /// Wrap a fallible item source as a `generator`
    pub fn generator(source: impl Iterator<Item = PyBridgeResult<PyValue>> + 'static) -> Self {
        Self::with_type_name(source, "generator")
    }

    /// Wrap an item source under a given host type name
    pub fn with_type_name(
        source: impl Iterator<Item = PyBridgeResult<PyValue>> + 'static,
        type_name: &'static str,
    ) -> Self {
        Self {
            state: Rc::new(RefCell::new(Box::new(source))),
            type_name,
        }
    }

    /// Iterator over already materialized items
    pub fn from_values(items: Vec<PyValue>, type_name: &'static str) -> Self {
        Self::with_type_name(items.into_iter().map(Ok), type_name)
    }

    /// Pull the next item; `None` once exhausted
    pub fn next_item(&self) -> Option<PyBridgeResult<PyValue>> {
        self.state.borrow_mut().next()
    }

    /// Get the host type name
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Number of live handles to this iterator
    pub fn ref_count(&self) -> usize {
        Rc::strong_count(&self.state)
    }

    /// Check if both handles refer to the same iterator
    pub fn ptr_eq(&self, other: &PyIterator) -> bool {
        Rc::ptr_eq(&self.state, &other.state)
    }

    fn identity(&self) -> usize {
        Rc::as_ptr(&self.state) as *const () as usize
    }
}

impl Iterator for PyIterator {
    type Item = PyBridgeResult<PyValue>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_item()
    }
}

impl fmt::Debug for PyIterator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PyIterator")
            .field("type_name", &self.type_name)
            .field("ref_count", &self.ref_count())
            .finish()
    }
}
