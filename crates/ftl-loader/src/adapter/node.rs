/*
 * adapter/node.rs
 * Copyright (c) 2025 Posit, PBC
 */

use std::any::Any;
use std::sync::Arc;

use ftl_engine::model;
use ftl_engine::{
    CollectionModel, DateModel, DateType, EngineDate, HashModel, MethodModel, ModelError,
    ModelKind, ModelRef, ModelResult, SequenceModel, SimpleSequence, TemplateModel,
};

use super::collection::CollectionNode;
use super::{to_host, wrap_model};
use crate::host::{HostArray, HostDate, HostFunction, HostObject, HostValue};

/// A host value as the engine sees it. One variant per capability.
#[derive(Debug, Clone)]
pub enum ValueNode {
    Nothing,
    Sequence(SequenceNode),
    Date(DateNode),
    Boolean(bool),
    Number(f64),
    Scalar(Arc<str>),
    Method(MethodNode),
    Hash(HashNode),
    Collection(CollectionNode),
}

impl ValueNode {
    /// Turn the node into a model handle. `Nothing` and booleans resolve to
    /// the engine's shared singletons.
    pub fn into_model(self) -> ModelRef {
        match self {
            ValueNode::Nothing => model::nothing(),
            ValueNode::Boolean(b) => model::boolean(b),
            node => Arc::new(node),
        }
    }
}

impl TemplateModel for ValueNode {
    fn kind(&self) -> ModelKind {
        match self {
            ValueNode::Nothing => ModelKind::Nothing,
            ValueNode::Sequence(_) => ModelKind::Sequence,
            ValueNode::Date(_) => ModelKind::Date,
            ValueNode::Boolean(_) => ModelKind::Boolean,
            ValueNode::Number(_) => ModelKind::Number,
            ValueNode::Scalar(_) => ModelKind::Scalar,
            ValueNode::Method(_) => ModelKind::Method,
            ValueNode::Hash(_) => ModelKind::Hash,
            ValueNode::Collection(_) => ModelKind::Collection,
        }
    }

    fn as_boolean(&self) -> Option<bool> {
        match self {
            ValueNode::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    fn as_number(&self) -> Option<f64> {
        match self {
            ValueNode::Number(n) => Some(*n),
            _ => None,
        }
    }

    fn as_scalar(&self) -> Option<&str> {
        match self {
            ValueNode::Scalar(s) => Some(s),
            ValueNode::Nothing => Some(""),
            _ => None,
        }
    }

    fn as_date(&self) -> Option<&dyn DateModel> {
        match self {
            ValueNode::Date(node) => Some(node),
            _ => None,
        }
    }

    fn as_sequence(&self) -> Option<&dyn SequenceModel> {
        match self {
            ValueNode::Sequence(node) => Some(node),
            _ => None,
        }
    }

    fn as_hash(&self) -> Option<&dyn HashModel> {
        match self {
            ValueNode::Hash(node) => Some(node),
            _ => None,
        }
    }

    fn as_collection(&self) -> Option<&dyn CollectionModel> {
        match self {
            ValueNode::Collection(node) => Some(node),
            _ => None,
        }
    }

    fn as_method(&self) -> Option<&dyn MethodModel> {
        match self {
            ValueNode::Method(node) => Some(node),
            _ => None,
        }
    }

    fn adapted_object(&self) -> Option<&dyn Any> {
        match self {
            ValueNode::Sequence(node) => Some(&node.items),
            ValueNode::Date(node) => Some(&node.0),
            ValueNode::Method(node) => Some(&node.function),
            ValueNode::Hash(node) => Some(&node.object),
            _ => None,
        }
    }
}

// ============================================================================
// Sequence
// ============================================================================

#[derive(Debug, Clone)]
pub struct SequenceNode {
    items: HostArray,
}

impl SequenceNode {
    pub fn new(items: HostArray) -> Self {
        Self { items }
    }
}

impl SequenceModel for SequenceNode {
    fn get(&self, index: usize) -> ModelResult<ModelRef> {
        let item = self.items.get(index).ok_or_else(|| {
            ModelError::new(format!(
                "Index {} is out of bounds for a sequence of length {}",
                index,
                self.items.len()
            ))
        })?;
        Ok(wrap_model(item, &HostValue::Array(Arc::clone(&self.items)))?)
    }

    fn size(&self) -> usize {
        self.items.len()
    }
}

// ============================================================================
// Date
// ============================================================================

#[derive(Debug, Clone, Copy)]
pub struct DateNode(pub HostDate);

impl DateModel for DateNode {
    fn as_date(&self) -> ModelResult<EngineDate> {
        Ok(EngineDate::from_millis(self.0.millis))
    }

    // Host dates carry no date/time distinction.
    fn date_type(&self) -> DateType {
        DateType::Unknown
    }
}

// ============================================================================
// Method
// ============================================================================

#[derive(Debug, Clone)]
pub struct MethodNode {
    function: HostFunction,
    scope: HostValue,
}

impl MethodNode {
    pub fn new(function: HostFunction, scope: HostValue) -> Self {
        Self { function, scope }
    }
}

impl MethodModel for MethodNode {
    fn exec(&self, arguments: &SimpleSequence) -> ModelResult<ModelRef> {
        let args = arguments
            .iter()
            .map(to_host)
            .collect::<ModelResult<Vec<_>>>()?;
        let result = self
            .function
            .call(&self.scope, &args)
            .map_err(|e| ModelError::new(format!("{}: {}", self.function.name(), e)))?;
        // The result belongs to no object.
        Ok(wrap_model(&result, &HostValue::Undefined)?)
    }
}

// ============================================================================
// Hash
// ============================================================================

#[derive(Debug, Clone)]
pub struct HashNode {
    object: HostObject,
}

impl HashNode {
    pub fn new(object: HostObject) -> Self {
        Self { object }
    }

    fn key_values(&self) -> HostArray {
        Arc::new(self.object.keys().map(|k| HostValue::string(k.as_str())).collect())
    }
}

impl HashModel for HashNode {
    fn get(&self, key: &str) -> ModelResult<Option<ModelRef>> {
        match self.object.get(key) {
            Some(value) => Ok(Some(wrap_model(
                value,
                &HostValue::Object(Arc::clone(&self.object)),
            )?)),
            None => Ok(None),
        }
    }

    fn keys(&self) -> ModelRef {
        ValueNode::Collection(CollectionNode::new(self.key_values(), None)).into_model()
    }

    fn values(&self) -> ModelRef {
        ValueNode::Collection(CollectionNode::new(
            self.key_values(),
            Some(Arc::clone(&self.object)),
        ))
        .into_model()
    }

    fn size(&self) -> usize {
        self.object.len()
    }
}
