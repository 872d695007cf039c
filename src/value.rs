//! Untyped input model.
//!
//! A [`Value`] is whatever crossed the type-checked boundary: a parsed JSON
//! payload, a configuration tree, or a graph assembled by a host integration.
//! Containers are shared and interior-mutable, so a graph may reference
//! itself; they compare by identity, never by content.

use std::any::Any;
use std::collections::HashSet;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{SystemTime, UNIX_EPOCH};

use indexmap::IndexMap;

use crate::annotation::Annotation;
use crate::error::Error;

/// Extension point for host-specific values the engine cannot inspect.
///
/// Values reporting `is_opaque_scalar() == true` are annotated as scalars and
/// never walked; everything else is annotated as unknown.
pub trait HostValue: Send + Sync {
    fn type_name(&self) -> &str;

    fn is_opaque_scalar(&self) -> bool {
        false
    }

    fn render(&self) -> String {
        format!("<{}>", self.type_name())
    }
}

#[derive(Clone)]
pub enum Value {
    Null,
    Undefined,
    Bool(bool),
    Number(f64),
    String(String),
    Symbol(String),
    /// Opaque point in time; always a scalar.
    Date(SystemTime),
    Host(Arc<dyn HostValue>),
    Array(ArrayRef),
    Object(ObjectRef),
    Function(FunctionRef),
    /// An annotation produced by an earlier pass. The walker relabels it
    /// instead of annotating it again.
    Annotation(Box<Annotation>),
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Clone, Default)]
pub struct ArrayRef(Arc<RwLock<Vec<Value>>>);

impl ArrayRef {
    pub fn new(items: Vec<Value>) -> Self {
        Self(Arc::new(RwLock::new(items)))
    }

    pub fn push(&self, item: impl Into<Value>) {
        write(&self.0).push(item.into());
    }

    pub fn get(&self, index: usize) -> Option<Value> {
        read(&self.0).get(index).cloned()
    }

    pub fn len(&self) -> usize {
        read(&self.0).len()
    }

    pub fn is_empty(&self) -> bool {
        read(&self.0).is_empty()
    }

    /// Shallow copy of the current items. Nested containers stay shared.
    pub fn snapshot(&self) -> Vec<Value> {
        read(&self.0).clone()
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn id(&self) -> usize {
        Arc::as_ptr(&self.0).addr()
    }
}

#[derive(Clone, Default)]
pub struct ObjectRef(Arc<RwLock<IndexMap<String, Value>>>);

impl ObjectRef {
    pub fn new(fields: IndexMap<String, Value>) -> Self {
        Self(Arc::new(RwLock::new(fields)))
    }

    /// Sets `key`, returning the previous value. A replaced key keeps its
    /// original position.
    pub fn insert(&self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        write(&self.0).insert(key.into(), value.into())
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        read(&self.0).get(key).cloned()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        read(&self.0).contains_key(key)
    }

    pub fn keys(&self) -> Vec<String> {
        read(&self.0).keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        read(&self.0).len()
    }

    pub fn is_empty(&self) -> bool {
        read(&self.0).is_empty()
    }

    /// Shallow copy of the current fields, in insertion order.
    pub fn snapshot(&self) -> IndexMap<String, Value> {
        read(&self.0).clone()
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn id(&self) -> usize {
        Arc::as_ptr(&self.0).addr()
    }
}

type Callable = dyn Fn(&[Value]) -> Value + Send + Sync;

#[derive(Clone)]
pub struct FunctionRef(Arc<Callable>);

impl FunctionRef {
    pub fn new(f: impl Fn(&[Value]) -> Value + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }

    pub fn call(&self, args: &[Value]) -> Value {
        (self.0)(args)
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Value {
    pub fn array(items: impl IntoIterator<Item = Value>) -> Self {
        Self::Array(ArrayRef::new(items.into_iter().collect()))
    }

    pub fn object<K: Into<String>>(fields: impl IntoIterator<Item = (K, Value)>) -> Self {
        Self::Object(ObjectRef::new(
            fields.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        ))
    }

    pub fn function(f: impl Fn(&[Value]) -> Value + Send + Sync + 'static) -> Self {
        Self::Function(FunctionRef::new(f))
    }

    pub fn host(host: impl HostValue + 'static) -> Self {
        Self::Host(Arc::new(host))
    }

    pub fn from_json_str(s: &str) -> Result<Self, Error> {
        let json: serde_json::Value = serde_json::from_str(s)?;
        Ok(json.into())
    }

    /// Short name of the value's kind, suitable for diagnostics.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Undefined => "undefined",
            Self::Bool(_) => "boolean",
            Self::Number(_) => "number",
            Self::String(_) => "string",
            Self::Symbol(_) => "symbol",
            Self::Date(_) => "date",
            Self::Host(_) => "host",
            Self::Array(_) => "array",
            Self::Object(_) => "object",
            Self::Function(_) => "function",
            Self::Annotation(_) => "annotation",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, Self::Undefined)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&ArrayRef> {
        match self {
            Self::Array(arr) => Some(arr),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            Self::Object(obj) => Some(obj),
            _ => None,
        }
    }

    /// Lossy conversion to JSON. Undefined, functions, symbols and cut cycles
    /// become `null`; dates become epoch milliseconds; host values become
    /// their rendering.
    pub fn to_json(&self) -> serde_json::Value {
        let mut seen = HashSet::new();
        to_json_inner(self, &mut seen)
    }
}

fn epoch_millis(t: SystemTime) -> i128 {
    match t.duration_since(UNIX_EPOCH) {
        Ok(d) => d.as_millis() as i128,
        Err(e) => -(e.duration().as_millis() as i128),
    }
}

fn number_to_json(n: f64) -> serde_json::Value {
    const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;
    if n.fract() == 0.0 && n.abs() <= MAX_SAFE_INTEGER {
        return serde_json::Value::from(n as i64);
    }
    serde_json::Number::from_f64(n).map_or(serde_json::Value::Null, serde_json::Value::Number)
}

fn to_json_inner(value: &Value, seen: &mut HashSet<usize>) -> serde_json::Value {
    match value {
        Value::Null | Value::Undefined | Value::Symbol(_) | Value::Function(_) => {
            serde_json::Value::Null
        }
        Value::Bool(b) => serde_json::Value::Bool(*b),
        Value::Number(n) => number_to_json(*n),
        Value::String(s) => serde_json::Value::String(s.clone()),
        Value::Date(t) => serde_json::Value::from(epoch_millis(*t) as i64),
        Value::Host(host) => serde_json::Value::String(host.render()),
        Value::Annotation(ann) => {
            serde_json::to_value(ann.as_ref()).unwrap_or(serde_json::Value::Null)
        }
        Value::Array(arr) => {
            if !seen.insert(arr.id()) {
                return serde_json::Value::Null;
            }
            let items = arr
                .snapshot()
                .iter()
                .map(|item| to_json_inner(item, seen))
                .collect();
            seen.remove(&arr.id());
            serde_json::Value::Array(items)
        }
        Value::Object(obj) => {
            if !seen.insert(obj.id()) {
                return serde_json::Value::Null;
            }
            let fields = obj
                .snapshot()
                .iter()
                .map(|(k, v)| (k.clone(), to_json_inner(v, seen)))
                .collect();
            seen.remove(&obj.id());
            serde_json::Value::Object(fields)
        }
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Bool(b),
            serde_json::Value::Number(n) => Self::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => Self::String(s),
            serde_json::Value::Array(items) => Self::array(items.into_iter().map(Self::from)),
            serde_json::Value::Object(fields) => {
                Self::object(fields.into_iter().map(|(k, v)| (k, Self::from(v))))
            }
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Self::Number(f64::from(n))
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Self::Number(n as f64)
    }
}

impl From<u64> for Value {
    fn from(n: u64) -> Self {
        Self::Number(n as f64)
    }
}

impl From<SystemTime> for Value {
    fn from(t: SystemTime) -> Self {
        Self::Date(t)
    }
}

impl From<ArrayRef> for Value {
    fn from(arr: ArrayRef) -> Self {
        Self::Array(arr)
    }
}

impl From<ObjectRef> for Value {
    fn from(obj: ObjectRef) -> Self {
        Self::Object(obj)
    }
}

impl From<Annotation> for Value {
    fn from(ann: Annotation) -> Self {
        Self::Annotation(Box::new(ann))
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(opt: Option<T>) -> Self {
        opt.map_or(Self::Undefined, Into::into)
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) | (Self::Undefined, Self::Undefined) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Number(a), Self::Number(b)) => a == b,
            (Self::String(a), Self::String(b)) | (Self::Symbol(a), Self::Symbol(b)) => a == b,
            (Self::Date(a), Self::Date(b)) => a == b,
            (Self::Host(a), Self::Host(b)) => Arc::ptr_eq(a, b),
            (Self::Array(a), Self::Array(b)) => a.ptr_eq(b),
            (Self::Object(a), Self::Object(b)) => a.ptr_eq(b),
            (Self::Function(a), Self::Function(b)) => a.ptr_eq(b),
            (Self::Annotation(a), Self::Annotation(b)) => a == b,
            _ => false,
        }
    }
}

fn write_quoted(f: &mut fmt::Formatter<'_>, s: &str) -> fmt::Result {
    write!(f, "{}", serde_json::Value::String(s.to_string()))
}

fn write_number(f: &mut fmt::Formatter<'_>, n: f64) -> fmt::Result {
    if n.is_nan() {
        f.write_str("NaN")
    } else if n.is_infinite() {
        f.write_str(if n > 0.0 { "Infinity" } else { "-Infinity" })
    } else {
        write!(f, "{n}")
    }
}

fn render(value: &Value, f: &mut fmt::Formatter<'_>, seen: &mut HashSet<usize>) -> fmt::Result {
    match value {
        Value::Null => f.write_str("null"),
        Value::Undefined => f.write_str("undefined"),
        Value::Bool(b) => write!(f, "{b}"),
        Value::Number(n) => write_number(f, *n),
        Value::String(s) => write_quoted(f, s),
        Value::Symbol(name) => write!(f, "Symbol({name})"),
        Value::Date(t) => write!(f, "Date({})", epoch_millis(*t)),
        Value::Host(host) => f.write_str(&host.render()),
        Value::Function(_) => f.write_str("<function>"),
        Value::Annotation(ann) => write!(f, "<{} annotation>", ann.kind()),
        Value::Array(arr) => {
            if !seen.insert(arr.id()) {
                return f.write_str("<circular>");
            }
            f.write_str("[")?;
            for (i, item) in arr.snapshot().iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                render(item, f, seen)?;
            }
            seen.remove(&arr.id());
            f.write_str("]")
        }
        Value::Object(obj) => {
            if !seen.insert(obj.id()) {
                return f.write_str("<circular>");
            }
            f.write_str("{")?;
            for (i, (key, field)) in obj.snapshot().iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write_quoted(f, key)?;
                f.write_str(": ")?;
                render(field, f, seen)?;
            }
            seen.remove(&obj.id());
            f.write_str("}")
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut seen = HashSet::new();
        render(self, f, &mut seen)
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Annotation(ann) => f.debug_tuple("Annotation").field(ann).finish(),
            _ => write!(f, "{}({self})", self.kind_name()),
        }
    }
}

/// Stand-in for a decoded value with no counterpart in the untyped model.
struct Decoded {
    type_name: &'static str,
}

impl HostValue for Decoded {
    fn type_name(&self) -> &str {
        self.type_name
    }

    fn is_opaque_scalar(&self) -> bool {
        true
    }
}

macro_rules! downcast_number {
    ($any:expr; lossless: $($lossless:ty),*; lossy: $($lossy:ty),*) => {
        $(
            if let Some(n) = $any.downcast_ref::<$lossless>() {
                return Some(f64::from(*n));
            }
        )*
        $(
            if let Some(n) = $any.downcast_ref::<$lossy>() {
                return Some(*n as f64);
            }
        )*
    };
}

fn number_from_any(any: &dyn Any) -> Option<f64> {
    if let Some(n) = any.downcast_ref::<f64>() {
        return Some(*n);
    }
    downcast_number!(
        any;
        lossless: f32, i8, i16, i32, u8, u16, u32;
        lossy: i64, u64, isize, usize
    );
    None
}

impl Value {
    /// Best-effort view of an already-decoded Rust value, used when a
    /// transformation or predicate rejects it.
    ///
    /// Values, annotations, strings, numbers, booleans, dates and `()` map to
    /// their untyped form. Anything else becomes an opaque scalar named after
    /// its type.
    pub fn from_decoded<T: Any>(decoded: &T) -> Self {
        let any: &dyn Any = decoded;
        if let Some(value) = any.downcast_ref::<Value>() {
            return value.clone();
        }
        if let Some(ann) = any.downcast_ref::<Annotation>() {
            return Self::Annotation(Box::new(ann.clone()));
        }
        if let Some(s) = any.downcast_ref::<String>() {
            return Self::String(s.clone());
        }
        if let Some(s) = any.downcast_ref::<&'static str>() {
            return Self::String((*s).to_string());
        }
        if let Some(b) = any.downcast_ref::<bool>() {
            return Self::Bool(*b);
        }
        if let Some(t) = any.downcast_ref::<SystemTime>() {
            return Self::Date(*t);
        }
        if any.is::<()>() {
            return Self::Undefined;
        }
        if let Some(n) = number_from_any(any) {
            return Self::Number(n);
        }
        Self::host(Decoded {
            type_name: std::any::type_name::<T>(),
        })
    }
}

#[cfg(test)]
#[expect(clippy::unwrap_used, clippy::panic, reason = "test assertions")]
mod tests {
    use super::*;

    struct Money(i64);

    impl HostValue for Money {
        fn type_name(&self) -> &str {
            "Money"
        }

        fn render(&self) -> String {
            format!("${}", self.0)
        }
    }

    #[test]
    fn containers_compare_by_identity() {
        let a = Value::array([Value::from(1)]);
        let b = Value::array([Value::from(1)]);
        assert_eq!(a, a.clone());
        assert_ne!(a, b);
        assert_eq!(Value::from("x"), Value::from("x"));
        assert_ne!(Value::from(1), Value::from("1"));
    }

    #[test]
    fn display_renders_json_like_text() {
        let value = Value::object([
            ("name", Value::from("Ada")),
            ("age", Value::from(36)),
            ("tags", Value::array([Value::Null, Value::Undefined, Value::from(true)])),
        ]);
        assert_eq!(
            value.to_string(),
            r#"{"name": "Ada", "age": 36, "tags": [null, undefined, true]}"#
        );
        assert_eq!(Value::from(1.5).to_string(), "1.5");
        assert_eq!(Value::from(f64::NAN).to_string(), "NaN");
        assert_eq!(Value::from(f64::NEG_INFINITY).to_string(), "-Infinity");
        assert_eq!(Value::host(Money(5)).to_string(), "$5");
    }

    #[test]
    fn display_cuts_cycles() {
        let obj = ObjectRef::default();
        obj.insert("id", 1);
        obj.insert("me", obj.clone());
        assert_eq!(Value::from(obj).to_string(), r#"{"id": 1, "me": <circular>}"#);
    }

    #[test]
    fn display_prints_shared_siblings_in_full() {
        let shared = Value::array([Value::from(1)]);
        let outer = Value::array([shared.clone(), shared]);
        assert_eq!(outer.to_string(), "[[1], [1]]");
    }

    #[test]
    fn json_round_trip_preserves_key_order() {
        let value = Value::from_json_str(r#"{"b": 1, "a": [true, "x", null], "c": 2.5}"#).unwrap();
        let obj = value.as_object().unwrap();
        assert_eq!(obj.keys(), vec!["b", "a", "c"]);
        assert_eq!(
            value.to_json(),
            serde_json::json!({"b": 1, "a": [true, "x", null], "c": 2.5})
        );
    }

    #[test]
    fn invalid_json_is_an_error() {
        let err = Value::from_json_str("{not json").unwrap_err();
        assert!(matches!(err, Error::Json(_)));
    }

    #[test]
    fn to_json_is_lossy_for_non_json_values() {
        let arr = ArrayRef::default();
        arr.push(Value::Undefined);
        arr.push(Value::function(|_| Value::Null));
        arr.push(UNIX_EPOCH + std::time::Duration::from_millis(1500));
        arr.push(arr.clone());
        assert_eq!(
            Value::from(arr).to_json(),
            serde_json::json!([null, null, 1500, null])
        );
    }

    #[test]
    fn function_values_are_callable() {
        let double = Value::function(|args| {
            Value::from(args.first().and_then(Value::as_f64).unwrap_or(0.0) * 2.0)
        });
        let Value::Function(f) = double else {
            panic!("expected function");
        };
        assert_eq!(f.call(&[Value::from(21)]), Value::from(42));
    }

    #[test]
    fn decoded_primitives_keep_their_untyped_form() {
        assert_eq!(Value::from_decoded(&7_u16), Value::from(7));
        assert_eq!(Value::from_decoded(&-2.5_f64), Value::from(-2.5));
        assert_eq!(Value::from_decoded(&"x".to_string()), Value::from("x"));
        assert_eq!(Value::from_decoded(&"y"), Value::from("y"));
        assert_eq!(Value::from_decoded(&true), Value::from(true));
        assert_eq!(Value::from_decoded(&()), Value::Undefined);
        assert_eq!(Value::from_decoded(&UNIX_EPOCH), Value::from(UNIX_EPOCH));

        let shared = Value::array([Value::from(1)]);
        assert_eq!(Value::from_decoded(&shared), shared);
    }

    #[test]
    fn decoded_records_become_opaque_scalars() {
        struct Celsius;

        let value = Value::from_decoded(&Celsius);
        let Value::Host(host) = &value else {
            panic!("expected host value, got {value}");
        };
        assert!(host.is_opaque_scalar());
        assert!(host.type_name().ends_with("Celsius"));
        assert_eq!(value.to_string(), format!("<{}>", host.type_name()));
    }
}
