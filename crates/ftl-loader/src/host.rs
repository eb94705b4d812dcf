/*
 * host.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Host-side values.
//!
//! [`HostValue`] is the value space of the build pipeline: what data modules
//! export and what template functions receive and return. It has the shapes
//! of a dynamically typed scripting language (undefined and null, dates,
//! regular expressions, callables with a declared parameter count, plain
//! objects with insertion-ordered keys). Arrays, objects and functions are
//! reference types: clones share the same allocation.

use std::fmt;
use std::sync::Arc;

use hashlink::LinkedHashMap;

use crate::error::HostError;

/// Shared array payload.
pub type HostArray = Arc<Vec<HostValue>>;

/// Shared object payload, keys in insertion order.
pub type HostObject = Arc<LinkedHashMap<String, HostValue>>;

/// Signature of host callables: receiver, then positional arguments.
pub type HostFn = dyn Fn(&HostValue, &[HostValue]) -> Result<HostValue, HostError> + Send + Sync;

#[derive(Clone)]
pub enum HostValue {
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(Arc<str>),
    Date(HostDate),
    RegExp(HostRegExp),
    Array(HostArray),
    Object(HostObject),
    Function(HostFunction),
    Symbol(Arc<str>),
}

/// Milliseconds since the Unix epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HostDate {
    pub millis: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostRegExp {
    pub source: String,
    /// Flag letters as written after the closing slash (`gimsuy`).
    pub flags: String,
}

#[derive(Clone)]
pub struct HostFunction {
    name: Arc<str>,
    arity: usize,
    call: Arc<HostFn>,
}

impl HostFunction {
    pub fn new(
        name: impl Into<Arc<str>>,
        arity: usize,
        call: impl Fn(&HostValue, &[HostValue]) -> Result<HostValue, HostError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            arity,
            call: Arc::new(call),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared parameter count.
    pub fn arity(&self) -> usize {
        self.arity
    }

    /// Call with `this` bound to `receiver`.
    pub fn call(&self, receiver: &HostValue, args: &[HostValue]) -> Result<HostValue, HostError> {
        (self.call)(receiver, args)
    }

    fn same(&self, other: &HostFunction) -> bool {
        Arc::ptr_eq(&self.call, &other.call)
    }
}

impl fmt::Debug for HostFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "function {}/{}", self.name, self.arity)
    }
}

impl HostValue {
    pub fn string(value: impl Into<Arc<str>>) -> Self {
        HostValue::String(value.into())
    }

    pub fn date(millis: i64) -> Self {
        HostValue::Date(HostDate { millis })
    }

    pub fn regexp(source: impl Into<String>, flags: impl Into<String>) -> Self {
        HostValue::RegExp(HostRegExp {
            source: source.into(),
            flags: flags.into(),
        })
    }

    pub fn array(items: impl IntoIterator<Item = HostValue>) -> Self {
        HostValue::Array(Arc::new(items.into_iter().collect()))
    }

    pub fn object<K: Into<String>>(entries: impl IntoIterator<Item = (K, HostValue)>) -> Self {
        HostValue::Object(Arc::new(
            entries.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        ))
    }

    pub fn function(
        name: impl Into<Arc<str>>,
        arity: usize,
        call: impl Fn(&HostValue, &[HostValue]) -> Result<HostValue, HostError> + Send + Sync + 'static,
    ) -> Self {
        HostValue::Function(HostFunction::new(name, arity, call))
    }

    /// Convert parsed JSON. Objects keep the key order of the document.
    pub fn from_json(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => HostValue::Null,
            serde_json::Value::Bool(b) => HostValue::Bool(*b),
            serde_json::Value::Number(n) => HostValue::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => HostValue::string(s.as_str()),
            serde_json::Value::Array(items) => {
                HostValue::array(items.iter().map(HostValue::from_json))
            }
            serde_json::Value::Object(map) => {
                HostValue::object(map.iter().map(|(k, v)| (k.clone(), HostValue::from_json(v))))
            }
        }
    }

    /// Property lookup on objects; `Undefined` for everything else.
    pub fn get(&self, key: &str) -> HostValue {
        match self {
            HostValue::Object(object) => object.get(key).cloned().unwrap_or(HostValue::Undefined),
            _ => HostValue::Undefined,
        }
    }

    pub fn is_nullish(&self) -> bool {
        matches!(self, HostValue::Undefined | HostValue::Null)
    }

    /// Identity comparison: reference types compare by allocation,
    /// primitives by value (`NaN` equals itself).
    pub fn same_value(&self, other: &HostValue) -> bool {
        match (self, other) {
            (HostValue::Undefined, HostValue::Undefined) | (HostValue::Null, HostValue::Null) => {
                true
            }
            (HostValue::Bool(a), HostValue::Bool(b)) => a == b,
            (HostValue::Number(a), HostValue::Number(b)) => {
                a == b || (a.is_nan() && b.is_nan())
            }
            (HostValue::String(a), HostValue::String(b)) => a == b,
            (HostValue::Date(a), HostValue::Date(b)) => a == b,
            (HostValue::RegExp(a), HostValue::RegExp(b)) => a == b,
            (HostValue::Array(a), HostValue::Array(b)) => Arc::ptr_eq(a, b),
            (HostValue::Object(a), HostValue::Object(b)) => Arc::ptr_eq(a, b),
            (HostValue::Function(a), HostValue::Function(b)) => a.same(b),
            (HostValue::Symbol(a), HostValue::Symbol(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// Short type name, as used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            HostValue::Undefined => "undefined",
            HostValue::Null => "null",
            HostValue::Bool(_) => "boolean",
            HostValue::Number(_) => "number",
            HostValue::String(_) => "string",
            HostValue::Date(_) => "date",
            HostValue::RegExp(_) => "regexp",
            HostValue::Array(_) => "array",
            HostValue::Object(_) => "object",
            HostValue::Function(_) => "function",
            HostValue::Symbol(_) => "symbol",
        }
    }
}

impl fmt::Debug for HostValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostValue::Undefined => write!(f, "undefined"),
            HostValue::Null => write!(f, "null"),
            HostValue::Bool(b) => write!(f, "{}", b),
            HostValue::Number(n) => write!(f, "{}", n),
            HostValue::String(s) => write!(f, "{:?}", s),
            HostValue::Date(d) => write!(f, "Date({})", d.millis),
            HostValue::RegExp(r) => write!(f, "/{}/{}", r.source, r.flags),
            HostValue::Array(items) => f.debug_list().entries(items.iter()).finish(),
            HostValue::Object(object) => f.debug_map().entries(object.iter()).finish(),
            HostValue::Function(func) => write!(f, "{:?}", func),
            HostValue::Symbol(description) => write!(f, "Symbol({})", description),
        }
    }
}
