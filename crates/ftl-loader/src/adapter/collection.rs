/*
 * adapter/collection.rs
 * Copyright (c) 2025 Posit, PBC
 */

use std::sync::Arc;

use ftl_engine::{CollectionModel, ModelError, ModelIterator, ModelRef, ModelResult};

use super::wrap_model;
use crate::host::{HostArray, HostObject, HostValue};

/// Single-pass list of host values.
///
/// With a `parent`, every item is a key and iteration yields the parent's
/// value for that key instead (the `values()` projection of a hash).
#[derive(Debug, Clone)]
pub struct CollectionNode {
    items: HostArray,
    parent: Option<HostObject>,
}

impl CollectionNode {
    pub fn new(items: HostArray, parent: Option<HostObject>) -> Self {
        Self { items, parent }
    }

    fn resolve(&self, item: &HostValue) -> ModelResult<ModelRef> {
        let Some(parent) = &self.parent else {
            return Ok(wrap_model(item, &HostValue::Undefined)?);
        };
        let HostValue::String(key) = item else {
            return Err(ModelError::new(format!(
                "Collection key must be a string, got {}",
                item.type_name()
            )));
        };
        let value = parent.get(&**key).cloned().unwrap_or(HostValue::Undefined);
        Ok(wrap_model(&value, &HostValue::Object(Arc::clone(parent)))?)
    }
}

impl CollectionModel for CollectionNode {
    fn iterator(&self) -> Box<dyn ModelIterator + '_> {
        Box::new(CollectionIterator {
            node: self,
            position: 0,
        })
    }

    fn size(&self) -> usize {
        self.items.len()
    }
}

struct CollectionIterator<'a> {
    node: &'a CollectionNode,
    position: usize,
}

impl ModelIterator for CollectionIterator<'_> {
    fn has_next(&self) -> bool {
        self.position < self.node.items.len()
    }

    fn next(&mut self) -> ModelResult<ModelRef> {
        let item = self
            .node
            .items
            .get(self.position)
            .ok_or_else(|| ModelError::new("Iterator exhausted"))?;
        self.position += 1;
        self.node.resolve(item)
    }
}
