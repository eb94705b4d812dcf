/*
 * adapter/mod.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Value adapter between host values and engine models.
//!
//! Two directions:
//!
//! - [`wrap`] builds a lazy [`ValueNode`] over a host value. Nested values are
//!   wrapped on access, so the engine only pays for what a template reads.
//! - [`unwrap_simple`] converts a host value eagerly into an engine-native
//!   [`ObjectValue`], for values that are handed to the engine up front
//!   (shared variables).
//!
//! [`to_host`] recovers a host value from a model the engine passes back,
//! for example as a method argument.

mod collection;
mod node;

use std::sync::Arc;
use std::time::SystemTime;

use ftl_engine::{
    EngineDate, ModelError, ModelKind, ModelRef, ModelResult, NativeFunction, ObjectValue,
    Pattern,
};
use hashlink::LinkedHashMap;

use crate::error::{AdapterError, HostError};
use crate::host::{HostArray, HostDate, HostFunction, HostObject, HostRegExp, HostValue};

pub use collection::CollectionNode;
pub use node::{DateNode, HashNode, MethodNode, SequenceNode, ValueNode};

/// Wrap a host value. `scope` is the receiver methods found in the value
/// are called with: the object (or array) the value was read from.
///
/// # Errors
/// [`AdapterError::NoMapping`] for symbols.
pub fn wrap(value: &HostValue, scope: &HostValue) -> Result<ValueNode, AdapterError> {
    Ok(match value {
        HostValue::Undefined | HostValue::Null => ValueNode::Nothing,
        HostValue::Array(items) => ValueNode::Sequence(SequenceNode::new(Arc::clone(items))),
        HostValue::Date(date) => ValueNode::Date(DateNode(*date)),
        HostValue::Bool(b) => ValueNode::Boolean(*b),
        HostValue::Number(n) => ValueNode::Number(*n),
        HostValue::String(s) => ValueNode::Scalar(Arc::clone(s)),
        HostValue::Function(function) => {
            ValueNode::Method(MethodNode::new(function.clone(), scope.clone()))
        }
        HostValue::Object(object) => ValueNode::Hash(HashNode::new(Arc::clone(object))),
        HostValue::RegExp(regexp) => ValueNode::Hash(HashNode::new(regexp_properties(regexp))),
        HostValue::Symbol(_) => return Err(AdapterError::NoMapping(format!("{:?}", value))),
    })
}

/// Wrap a host value into a shareable model.
pub fn wrap_model(value: &HostValue, scope: &HostValue) -> Result<ModelRef, AdapterError> {
    Ok(wrap(value, scope)?.into_model())
}

/// Wrap the root of a data model.
///
/// Nested values are still wrapped on access, but the whole value is checked
/// first so that an unmappable value fails the binding rather than the render.
///
/// # Errors
/// [`AdapterError::NoMapping`] when a symbol appears anywhere in `value`.
pub fn wrap_root(value: &HostValue) -> Result<ModelRef, AdapterError> {
    check_mappable(value)?;
    wrap_model(value, &HostValue::Undefined)
}

/// Host arrays and objects are immutable once shared, so the walk terminates.
fn check_mappable(value: &HostValue) -> Result<(), AdapterError> {
    match value {
        HostValue::Symbol(_) => Err(AdapterError::NoMapping(format!("{:?}", value))),
        HostValue::Array(items) => items.iter().try_for_each(check_mappable),
        HostValue::Object(object) => object.values().try_for_each(check_mappable),
        _ => Ok(()),
    }
}

fn regexp_properties(regexp: &HostRegExp) -> HostObject {
    let mut properties = LinkedHashMap::new();
    properties.insert("source".to_string(), HostValue::string(regexp.source.as_str()));
    properties.insert("flags".to_string(), HostValue::string(regexp.flags.as_str()));
    Arc::new(properties)
}

/// Convert a host value eagerly into an engine-native value.
///
/// # Errors
/// - [`AdapterError::UnsupportedArity`] for functions that do not take 0, 1
///   or 2 parameters, anywhere in the value.
/// - [`AdapterError::InvalidPattern`] for regular expressions the engine
///   cannot compile.
/// - [`AdapterError::NoMapping`] for symbols.
pub fn unwrap_simple(value: &HostValue) -> Result<ObjectValue, AdapterError> {
    Ok(match value {
        HostValue::Undefined | HostValue::Null => ObjectValue::Null,
        HostValue::Bool(b) => ObjectValue::Boolean(*b),
        HostValue::String(s) => ObjectValue::String(s.to_string()),
        HostValue::Number(n) => ObjectValue::Number(*n),
        HostValue::Date(date) => ObjectValue::Date(EngineDate::from_millis(date.millis)),
        HostValue::RegExp(regexp) => {
            let pattern = Pattern::compile(&regexp.source, pattern_flags(&regexp.flags))
                .map_err(|e| AdapterError::InvalidPattern {
                    pattern: regexp.source.clone(),
                    message: e.to_string(),
                })?;
            ObjectValue::Pattern(pattern)
        }
        HostValue::Array(items) => {
            let mut list = Vec::with_capacity(items.len());
            for item in items.iter() {
                list.push(unwrap_simple(item)?);
            }
            ObjectValue::List(list)
        }
        HostValue::Object(object) => {
            let mut map = LinkedHashMap::new();
            for (key, item) in object.iter() {
                map.insert(key.clone(), unwrap_simple(item)?);
            }
            ObjectValue::Map(map)
        }
        HostValue::Function(function) => ObjectValue::Function(native_function(function)?),
        HostValue::Symbol(_) => return Err(AdapterError::NoMapping(format!("{:?}", value))),
    })
}

/// Translate regular-expression flag letters into pattern flag bits. Only
/// `i`, `m` and `u` have a counterpart; other letters are dropped.
pub fn pattern_flags(flags: &str) -> u32 {
    flags.chars().fold(0, |bits, flag| {
        bits | match flag {
            'i' => Pattern::CASE_INSENSITIVE,
            'm' => Pattern::MULTILINE,
            'u' => Pattern::UNICODE_CASE,
            _ => 0,
        }
    })
}

fn flag_letters(bits: u32) -> String {
    [
        (Pattern::CASE_INSENSITIVE, 'i'),
        (Pattern::MULTILINE, 'm'),
        (Pattern::UNICODE_CASE, 'u'),
    ]
    .iter()
    .filter(|(bit, _)| bits & bit != 0)
    .map(|(_, letter)| *letter)
    .collect()
}

/// Adapt a host function to the engine's fixed-arity function types. The
/// function is called with an undefined receiver.
fn native_function(function: &HostFunction) -> Result<NativeFunction, AdapterError> {
    let f = function.clone();
    let call = move |args: Vec<ObjectValue>| -> Result<ObjectValue, ModelError> {
        let args: Vec<HostValue> = args.into_iter().map(from_object).collect();
        let result = f
            .call(&HostValue::Undefined, &args)
            .map_err(|e| ModelError::new(format!("{}: {}", f.name(), e)))?;
        Ok(unwrap_simple(&result)?)
    };
    Ok(match function.arity() {
        0 => NativeFunction::Supplier(Arc::new(move || call(Vec::new()))),
        1 => NativeFunction::Function(Arc::new(move |a| call(vec![a]))),
        2 => NativeFunction::BiFunction(Arc::new(move |a, b| call(vec![a, b]))),
        arity => {
            return Err(AdapterError::UnsupportedArity {
                name: function.name().to_string(),
                arity,
            });
        }
    })
}

/// Convert an engine-native value back into a host value.
pub fn from_object(value: ObjectValue) -> HostValue {
    match value {
        ObjectValue::Null => HostValue::Null,
        ObjectValue::Boolean(b) => HostValue::Bool(b),
        ObjectValue::String(s) => HostValue::string(s),
        ObjectValue::Number(n) => HostValue::Number(n),
        ObjectValue::Long(n) => HostValue::Number(n as f64),
        ObjectValue::Date(date) => HostValue::date(date.millis()),
        ObjectValue::Pattern(pattern) => {
            HostValue::regexp(pattern.source(), flag_letters(pattern.flags()))
        }
        ObjectValue::List(items) => HostValue::array(items.into_iter().map(from_object)),
        ObjectValue::Map(map) => HostValue::object(map.into_iter().map(|(k, v)| (k, from_object(v)))),
        ObjectValue::Function(native) => {
            let arity = native.arity();
            HostValue::function("native", arity, move |_, args| {
                let args = args
                    .iter()
                    .map(|a| unwrap_simple(a).map_err(|e| HostError::new(e.to_string())))
                    .collect::<Result<Vec<_>, _>>()?;
                native
                    .apply(args)
                    .map(from_object)
                    .map_err(|e| HostError::new(e.to_string()))
            })
        }
    }
}

/// Recover the host value behind a model, for arguments the engine passes
/// back into host functions. Models that did not come from the adapter are
/// converted by capability.
pub fn to_host(model: &ModelRef) -> ModelResult<HostValue> {
    if let Some(adapted) = model.adapted_object() {
        if let Some(items) = adapted.downcast_ref::<HostArray>() {
            return Ok(HostValue::Array(Arc::clone(items)));
        }
        if let Some(object) = adapted.downcast_ref::<HostObject>() {
            return Ok(HostValue::Object(Arc::clone(object)));
        }
        if let Some(function) = adapted.downcast_ref::<HostFunction>() {
            return Ok(HostValue::Function(function.clone()));
        }
        if let Some(date) = adapted.downcast_ref::<HostDate>() {
            return Ok(HostValue::Date(*date));
        }
    }

    match model.kind() {
        ModelKind::Nothing => Ok(HostValue::Null),
        ModelKind::Boolean => Ok(HostValue::Bool(model.as_boolean().unwrap_or_default())),
        ModelKind::Number => Ok(HostValue::Number(model.as_number().unwrap_or(f64::NAN))),
        ModelKind::Scalar => Ok(HostValue::string(model.as_scalar().unwrap_or_default())),
        ModelKind::Date => {
            let date = model
                .as_date()
                .ok_or_else(|| ModelError::new("date model without date capability"))?;
            Ok(HostValue::date(date.as_date()?.millis()))
        }
        ModelKind::Sequence => {
            let sequence = model
                .as_sequence()
                .ok_or_else(|| ModelError::new("sequence model without sequence capability"))?;
            let items = (0..sequence.size())
                .map(|i| sequence.get(i).and_then(|item| to_host(&item)))
                .collect::<ModelResult<Vec<_>>>()?;
            Ok(HostValue::array(items))
        }
        ModelKind::Collection => {
            let collection = model
                .as_collection()
                .ok_or_else(|| ModelError::new("collection model without collection capability"))?;
            let mut items = Vec::with_capacity(collection.size());
            let mut iterator = collection.iterator();
            while iterator.has_next() {
                items.push(to_host(&iterator.next()?)?);
            }
            Ok(HostValue::array(items))
        }
        ModelKind::Hash => {
            let hash = model
                .as_hash()
                .ok_or_else(|| ModelError::new("hash model without hash capability"))?;
            let keys = hash.keys();
            let keys = keys
                .as_collection()
                .ok_or_else(|| ModelError::new("hash keys are not a collection"))?;
            let mut entries = Vec::with_capacity(keys.size());
            let mut iterator = keys.iterator();
            while iterator.has_next() {
                let key = iterator.next()?;
                let key = key.as_scalar().unwrap_or_default().to_string();
                let value = match hash.get(&key)? {
                    Some(value) => to_host(&value)?,
                    None => HostValue::Undefined,
                };
                entries.push((key, value));
            }
            Ok(HostValue::object(entries))
        }
        ModelKind::Method => Err(ModelError::new(
            "Methods without a host function cannot be passed to host code",
        )),
    }
}

/// Encode a file modification time as the engine's long type.
pub fn long_from_system_time(time: SystemTime) -> i64 {
    match time.duration_since(SystemTime::UNIX_EPOCH) {
        Ok(after) => i64::try_from(after.as_millis()).unwrap_or(i64::MAX),
        Err(before) => -i64::try_from(before.duration().as_millis()).unwrap_or(i64::MAX),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ftl_engine::model;
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    fn root() -> HostValue {
        HostValue::Undefined
    }

    #[test]
    fn test_dispatch_is_total_over_known_shapes() {
        let cases = [
            (HostValue::Undefined, ModelKind::Nothing),
            (HostValue::Null, ModelKind::Nothing),
            (HostValue::array([]), ModelKind::Sequence),
            (HostValue::date(0), ModelKind::Date),
            (HostValue::Bool(false), ModelKind::Boolean),
            (HostValue::Number(1.5), ModelKind::Number),
            (HostValue::string("s"), ModelKind::Scalar),
            (
                HostValue::function("f", 0, |_, _| Ok(HostValue::Null)),
                ModelKind::Method,
            ),
            (HostValue::object::<&str>([]), ModelKind::Hash),
            (HostValue::regexp("a+", "gi"), ModelKind::Hash),
        ];
        for (value, kind) in cases {
            assert_eq!(wrap_model(&value, &root()).unwrap().kind(), kind, "{:?}", value);
        }
    }

    #[test]
    fn test_symbol_has_no_mapping() {
        let symbol = HostValue::Symbol(Arc::from("tag"));
        assert_eq!(
            wrap(&symbol, &root()).unwrap_err(),
            AdapterError::NoMapping("Symbol(tag)".to_string())
        );
        assert!(unwrap_simple(&symbol).is_err());
    }

    #[test]
    fn test_nested_symbol_fails_root_binding() {
        let data = HostValue::object([
            ("test", HostValue::Number(1.0)),
            (
                "tags",
                HostValue::array([HostValue::string("a"), HostValue::Symbol(Arc::from("s"))]),
            ),
        ]);
        assert_eq!(
            wrap_root(&data).unwrap_err(),
            AdapterError::NoMapping("Symbol(s)".to_string())
        );
        // Lazy wrapping alone would not notice until the value is read.
        assert!(wrap_model(&data, &root()).is_ok());
    }

    #[test]
    fn test_booleans_and_nothing_are_singletons() {
        let t = wrap_model(&HostValue::Bool(true), &root()).unwrap();
        assert!(Arc::ptr_eq(&t, &model::boolean(true)));
        let n = wrap_model(&HostValue::Null, &root()).unwrap();
        assert!(Arc::ptr_eq(&n, &model::nothing()));
    }

    #[test]
    fn test_unwrap_simple_structures() {
        let value = HostValue::object([
            ("name", HostValue::string("x")),
            ("when", HostValue::date(1_500)),
            ("list", HostValue::array([HostValue::Number(1.0), HostValue::Null])),
        ]);
        let ObjectValue::Map(map) = unwrap_simple(&value).unwrap() else {
            panic!("expected map");
        };
        assert_eq!(map.keys().collect::<Vec<_>>(), vec!["name", "when", "list"]);
        assert!(matches!(map.get("when"), Some(ObjectValue::Date(d)) if d.millis() == 1_500));
        assert!(matches!(
            map.get("list"),
            Some(ObjectValue::List(items)) if matches!(items[..], [ObjectValue::Number(_), ObjectValue::Null])
        ));
    }

    #[test]
    fn test_pattern_flags_translate_exactly_three() {
        assert_eq!(
            pattern_flags("gimsuy"),
            Pattern::CASE_INSENSITIVE | Pattern::MULTILINE | Pattern::UNICODE_CASE
        );
        assert_eq!(pattern_flags("gsy"), 0);
        let ObjectValue::Pattern(pattern) = unwrap_simple(&HostValue::regexp("^a", "im")).unwrap()
        else {
            panic!("expected pattern");
        };
        assert_eq!(pattern.flags(), 0x02 | 0x08);
        assert!(pattern.is_match("x\nA"));
    }

    #[test]
    fn test_function_arity_is_checked_up_front() {
        for arity in [0, 1, 2] {
            let f = HostValue::function("f", arity, |_, args| Ok(HostValue::Number(args.len() as f64)));
            let ObjectValue::Function(native) = unwrap_simple(&f).unwrap() else {
                panic!("expected function");
            };
            assert_eq!(native.arity(), arity);
        }
        let f = HostValue::function("three", 3, |_, _| Ok(HostValue::Null));
        assert_eq!(
            unwrap_simple(&f).unwrap_err(),
            AdapterError::UnsupportedArity {
                name: "three".to_string(),
                arity: 3
            }
        );
    }

    #[test]
    fn test_native_function_round_trip() {
        let add = HostValue::function("add", 2, |_, args| match args {
            [HostValue::Number(a), HostValue::Number(b)] => Ok(HostValue::Number(a + b)),
            _ => Err(HostError::new("numbers expected")),
        });
        let ObjectValue::Function(native) = unwrap_simple(&add).unwrap() else {
            panic!("expected function");
        };
        let result = native
            .apply(vec![ObjectValue::Number(2.0), ObjectValue::Number(3.0)])
            .unwrap();
        assert!(matches!(result, ObjectValue::Number(n) if n == 5.0));
        assert!(native
            .apply(vec![ObjectValue::String("a".into()), ObjectValue::Null])
            .is_err());
    }

    #[test]
    fn test_to_host_recovers_reference() {
        let object = HostValue::object([("a", HostValue::Number(1.0))]);
        let model = wrap_root(&object).unwrap();
        assert!(to_host(&model).unwrap().same_value(&object));

        let plain = model::sequence([model::scalar("x")]);
        let host = to_host(&plain).unwrap();
        assert_eq!(format!("{:?}", host), "[\"x\"]");
    }

    #[test]
    fn test_long_encoding() {
        let time = SystemTime::UNIX_EPOCH + Duration::from_millis(42);
        assert_eq!(long_from_system_time(time), 42);
        let before = SystemTime::UNIX_EPOCH - Duration::from_millis(7);
        assert_eq!(long_from_system_time(before), -7);
    }
}
