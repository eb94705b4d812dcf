/*
 * object.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Engine-native values.
//!
//! [`ObjectValue`] is the value space the engine itself understands without
//! any adapter: strings, numbers, longs, dates, compiled patterns, lists,
//! maps and functions of up to two arguments. Applications convert their own
//! values into it eagerly (for example for shared variables) and the engine
//! wraps it into models with [`ObjectValue::to_model`].

use std::fmt;
use std::sync::Arc;

use hashlink::LinkedHashMap;

use crate::error::ModelError;
use crate::model::{
    self, DateType, EngineDate, HashModel, MethodModel, ModelKind, ModelRef, ModelResult,
    SimpleHash, SimpleSequence, TemplateModel,
};
use crate::pattern::Pattern;

/// Result of calling a [`NativeFunction`].
pub type NativeResult = Result<ObjectValue, ModelError>;

/// Function value, distinguished by its fixed arity.
#[derive(Clone)]
pub enum NativeFunction {
    Supplier(Arc<dyn Fn() -> NativeResult + Send + Sync>),
    Function(Arc<dyn Fn(ObjectValue) -> NativeResult + Send + Sync>),
    BiFunction(Arc<dyn Fn(ObjectValue, ObjectValue) -> NativeResult + Send + Sync>),
}

impl NativeFunction {
    pub fn arity(&self) -> usize {
        match self {
            NativeFunction::Supplier(_) => 0,
            NativeFunction::Function(_) => 1,
            NativeFunction::BiFunction(_) => 2,
        }
    }

    /// Call the function. The argument count must match the arity exactly.
    pub fn apply(&self, args: Vec<ObjectValue>) -> NativeResult {
        if args.len() != self.arity() {
            return Err(ModelError::new(format!(
                "Function expects {} argument(s) but was called with {}",
                self.arity(),
                args.len()
            )));
        }
        let mut args = args.into_iter();
        let mut next = || args.next().unwrap_or(ObjectValue::Null);
        match self {
            NativeFunction::Supplier(f) => f(),
            NativeFunction::Function(f) => f(next()),
            NativeFunction::BiFunction(f) => {
                let first = next();
                f(first, next())
            }
        }
    }
}

impl fmt::Debug for NativeFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NativeFunction(arity {})", self.arity())
    }
}

/// A value the engine can wrap without an application adapter.
#[derive(Debug, Clone)]
pub enum ObjectValue {
    Null,
    Boolean(bool),
    String(String),
    Number(f64),
    Long(i64),
    Date(EngineDate),
    Pattern(Pattern),
    List(Vec<ObjectValue>),
    Map(LinkedHashMap<String, ObjectValue>),
    Function(NativeFunction),
}

impl ObjectValue {
    /// Wrap this value into a template model.
    pub fn to_model(&self) -> ModelRef {
        match self {
            ObjectValue::Null => model::nothing(),
            ObjectValue::Boolean(b) => model::boolean(*b),
            ObjectValue::String(s) => model::scalar(s.clone()),
            ObjectValue::Number(n) => model::number(*n),
            ObjectValue::Long(n) => model::number(*n as f64),
            ObjectValue::Date(d) => model::date(*d, DateType::Unknown),
            ObjectValue::Pattern(p) => Arc::new(PatternModel(p.clone())),
            ObjectValue::List(items) => model::sequence(items.iter().map(|v| v.to_model())),
            ObjectValue::Map(entries) => {
                let mut hash = SimpleHash::new();
                for (k, v) in entries {
                    hash.insert(k.clone(), v.to_model());
                }
                Arc::new(hash)
            }
            ObjectValue::Function(f) => Arc::new(FunctionModel(f.clone())),
        }
    }

    /// Convert a model back into an engine-native value.
    pub fn from_model(value: &ModelRef) -> ModelResult<ObjectValue> {
        match value.kind() {
            ModelKind::Nothing => Ok(ObjectValue::Null),
            ModelKind::Boolean => Ok(ObjectValue::Boolean(
                value.as_boolean().unwrap_or_default(),
            )),
            ModelKind::Number => Ok(ObjectValue::Number(value.as_number().unwrap_or_default())),
            ModelKind::Scalar => Ok(ObjectValue::String(
                value.as_scalar().unwrap_or_default().to_string(),
            )),
            ModelKind::Date => match value.as_date() {
                Some(d) => Ok(ObjectValue::Date(d.as_date()?)),
                None => Err(ModelError::new("Date model without date capability")),
            },
            ModelKind::Sequence => {
                let seq = value
                    .as_sequence()
                    .ok_or_else(|| ModelError::new("Sequence model without sequence capability"))?;
                let items = (0..seq.size())
                    .map(|i| seq.get(i).and_then(|item| ObjectValue::from_model(&item)))
                    .collect::<ModelResult<Vec<_>>>()?;
                Ok(ObjectValue::List(items))
            }
            ModelKind::Collection => {
                let coll = value.as_collection().ok_or_else(|| {
                    ModelError::new("Collection model without collection capability")
                })?;
                let mut items = Vec::with_capacity(coll.size());
                let mut it = coll.iterator();
                while it.has_next() {
                    items.push(ObjectValue::from_model(&it.next()?)?);
                }
                Ok(ObjectValue::List(items))
            }
            ModelKind::Hash => {
                let hash = value
                    .as_hash()
                    .ok_or_else(|| ModelError::new("Hash model without hash capability"))?;
                let keys = hash.keys();
                let keys = keys
                    .as_collection()
                    .ok_or_else(|| ModelError::new("Hash keys are not a collection"))?;
                let mut entries = LinkedHashMap::new();
                let mut it = keys.iterator();
                while it.has_next() {
                    let key = it.next()?;
                    let key = key
                        .as_scalar()
                        .ok_or_else(|| ModelError::new("Hash key is not a string"))?
                        .to_string();
                    let item = match hash.get(&key)? {
                        Some(item) => ObjectValue::from_model(&item)?,
                        None => ObjectValue::Null,
                    };
                    entries.insert(key, item);
                }
                Ok(ObjectValue::Map(entries))
            }
            ModelKind::Method => Err(ModelError::new(
                "Methods cannot be converted to engine values",
            )),
        }
    }
}

#[derive(Debug)]
struct FunctionModel(NativeFunction);

impl TemplateModel for FunctionModel {
    fn kind(&self) -> ModelKind {
        ModelKind::Method
    }

    fn as_method(&self) -> Option<&dyn MethodModel> {
        Some(self)
    }
}

impl MethodModel for FunctionModel {
    fn exec(&self, arguments: &SimpleSequence) -> ModelResult<ModelRef> {
        let args = arguments
            .iter()
            .map(ObjectValue::from_model)
            .collect::<ModelResult<Vec<_>>>()?;
        Ok(self.0.apply(args)?.to_model())
    }
}

/// Patterns are exposed as a hash with `pattern`, `flags` and `matches(text)`.
#[derive(Debug)]
struct PatternModel(Pattern);

impl TemplateModel for PatternModel {
    fn kind(&self) -> ModelKind {
        ModelKind::Hash
    }

    fn as_hash(&self) -> Option<&dyn HashModel> {
        Some(self)
    }
}

impl HashModel for PatternModel {
    fn get(&self, key: &str) -> ModelResult<Option<ModelRef>> {
        Ok(match key {
            "pattern" => Some(model::scalar(self.0.source())),
            "flags" => Some(model::number(f64::from(self.0.flags()))),
            "matches" => Some(Arc::new(MatchesMethod(self.0.clone()))),
            _ => None,
        })
    }

    fn keys(&self) -> ModelRef {
        model::collection(["pattern", "flags", "matches"].map(model::scalar))
    }

    fn values(&self) -> ModelRef {
        model::collection([
            model::scalar(self.0.source()),
            model::number(f64::from(self.0.flags())),
            Arc::new(MatchesMethod(self.0.clone())) as ModelRef,
        ])
    }

    fn size(&self) -> usize {
        3
    }
}

#[derive(Debug)]
struct MatchesMethod(Pattern);

impl TemplateModel for MatchesMethod {
    fn kind(&self) -> ModelKind {
        ModelKind::Method
    }

    fn as_method(&self) -> Option<&dyn MethodModel> {
        Some(self)
    }
}

impl MethodModel for MatchesMethod {
    fn exec(&self, arguments: &SimpleSequence) -> ModelResult<ModelRef> {
        use crate::model::SequenceModel;

        if arguments.size() != 1 {
            return Err(ModelError::new("matches() expects exactly one argument"));
        }
        let text = arguments.get(0)?;
        let text = text
            .as_scalar()
            .ok_or_else(|| ModelError::new("matches() expects a string argument"))?;
        Ok(model::boolean(self.0.is_match(text)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_function_arity_dispatch() {
        let f = NativeFunction::BiFunction(Arc::new(|a, b| match (a, b) {
            (ObjectValue::Number(a), ObjectValue::Number(b)) => Ok(ObjectValue::Number(a + b)),
            _ => Err(ModelError::new("numbers expected")),
        }));
        assert_eq!(f.arity(), 2);
        let out = f
            .apply(vec![ObjectValue::Number(1.0), ObjectValue::Number(2.0)])
            .unwrap();
        assert!(matches!(out, ObjectValue::Number(n) if n == 3.0));
        assert!(f.apply(vec![ObjectValue::Number(1.0)]).is_err());
    }

    #[test]
    fn test_map_to_model_keeps_order() {
        let mut map = LinkedHashMap::new();
        map.insert("z".to_string(), ObjectValue::Number(1.0));
        map.insert("a".to_string(), ObjectValue::String("x".to_string()));
        let model = ObjectValue::Map(map).to_model();
        let back = ObjectValue::from_model(&model).unwrap();
        let ObjectValue::Map(entries) = back else {
            panic!("expected map");
        };
        assert_eq!(entries.keys().cloned().collect::<Vec<_>>(), vec!["z", "a"]);
    }

    #[test]
    fn test_pattern_model_matches() {
        let p = Pattern::compile("^a+$", 0).unwrap();
        let model = ObjectValue::Pattern(p).to_model();
        let hash = model.as_hash().unwrap();
        let matches = hash.get("matches").unwrap().unwrap();
        let args = SimpleSequence::from_vec(vec![model::scalar("aaa")]);
        let result = matches.as_method().unwrap().exec(&args).unwrap();
        assert_eq!(result.as_boolean(), Some(true));
    }

    #[test]
    fn test_method_cannot_convert() {
        let f = ObjectValue::Function(NativeFunction::Supplier(Arc::new(|| {
            Ok(ObjectValue::Null)
        })));
        assert!(ObjectValue::from_model(&f.to_model()).is_err());
    }
}
