/*
 * model.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Data-model capability traits.
//!
//! Templates never see the application's values directly. Every value a
//! template reads is a [`TemplateModel`], and what the evaluator may do with it
//! is decided by the capabilities the model exposes (`as_hash`,
//! `as_sequence`, ...). Applications plug their own value systems in by
//! implementing these traits; the `Simple*` types are the engine's own
//! implementations, used for literals and for [`crate::ObjectValue`]s.

use std::any::Any;
use std::fmt;
use std::sync::{Arc, LazyLock};

use hashlink::LinkedHashMap;

use crate::error::ModelError;

/// Result type for model operations.
pub type ModelResult<T> = Result<T, ModelError>;

/// Shared handle to a model.
pub type ModelRef = Arc<dyn TemplateModel>;

/// The capability a model primarily exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelKind {
    Nothing,
    Boolean,
    Number,
    Scalar,
    Date,
    Sequence,
    Hash,
    Collection,
    Method,
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ModelKind::Nothing => "nothing",
            ModelKind::Boolean => "boolean",
            ModelKind::Number => "number",
            ModelKind::Scalar => "string",
            ModelKind::Date => "date",
            ModelKind::Sequence => "sequence",
            ModelKind::Hash => "hash",
            ModelKind::Collection => "collection",
            ModelKind::Method => "method",
        };
        write!(f, "{}", name)
    }
}

/// A value as seen by the template engine.
///
/// Implementations override the accessor matching their [`ModelKind`]; the
/// remaining accessors keep their `None` defaults.
pub trait TemplateModel: fmt::Debug + Send + Sync {
    fn kind(&self) -> ModelKind;

    fn as_boolean(&self) -> Option<bool> {
        None
    }

    fn as_number(&self) -> Option<f64> {
        None
    }

    fn as_scalar(&self) -> Option<&str> {
        None
    }

    fn as_date(&self) -> Option<&dyn DateModel> {
        None
    }

    fn as_sequence(&self) -> Option<&dyn SequenceModel> {
        None
    }

    fn as_hash(&self) -> Option<&dyn HashModel> {
        None
    }

    fn as_collection(&self) -> Option<&dyn CollectionModel> {
        None
    }

    fn as_method(&self) -> Option<&dyn MethodModel> {
        None
    }

    /// The application object this model adapts, for callers that need to
    /// recover the original value (for example when a model is passed back
    /// into an application function).
    fn adapted_object(&self) -> Option<&dyn Any> {
        None
    }
}

/// Indexable, sized list.
pub trait SequenceModel {
    /// Element at `index`. Out-of-range indices are an error, never a default.
    fn get(&self, index: usize) -> ModelResult<ModelRef>;

    fn size(&self) -> usize;
}

/// Keyed lookup with enumerable keys and values.
pub trait HashModel {
    /// Value stored under `key`, `Ok(None)` when the key is missing.
    fn get(&self, key: &str) -> ModelResult<Option<ModelRef>>;

    /// Keys as a collection model.
    fn keys(&self) -> ModelRef;

    /// Values as a collection model, in key order.
    fn values(&self) -> ModelRef;

    fn size(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.size() == 0
    }
}

/// Sized value that can be iterated once per [`CollectionModel::iterator`] call.
pub trait CollectionModel {
    fn iterator(&self) -> Box<dyn ModelIterator + '_>;

    fn size(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.size() == 0
    }
}

/// Single-pass iterator over models.
pub trait ModelIterator {
    fn has_next(&self) -> bool;

    /// Next element. Calling this when `has_next` is false is an error.
    fn next(&mut self) -> ModelResult<ModelRef>;
}

/// Callable value. Arguments arrive as an indexable list in call order.
pub trait MethodModel {
    fn exec(&self, arguments: &SimpleSequence) -> ModelResult<ModelRef>;
}

/// What part of a timestamp is meaningful.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateType {
    Unknown,
    Date,
    Time,
    DateTime,
}

/// A point in time as milliseconds since the Unix epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EngineDate {
    millis: i64,
}

impl EngineDate {
    pub fn from_millis(millis: i64) -> Self {
        Self { millis }
    }

    pub fn millis(&self) -> i64 {
        self.millis
    }
}

/// Date-valued model.
pub trait DateModel {
    fn as_date(&self) -> ModelResult<EngineDate>;

    fn date_type(&self) -> DateType;
}

// ============================================================================
// Shared singletons
// ============================================================================

#[derive(Debug)]
struct NothingModel;

impl TemplateModel for NothingModel {
    fn kind(&self) -> ModelKind {
        ModelKind::Nothing
    }

    // Renders as the empty string when interpolated.
    fn as_scalar(&self) -> Option<&str> {
        Some("")
    }
}

#[derive(Debug)]
struct BooleanModel(bool);

impl TemplateModel for BooleanModel {
    fn kind(&self) -> ModelKind {
        ModelKind::Boolean
    }

    fn as_boolean(&self) -> Option<bool> {
        Some(self.0)
    }
}

static NOTHING: LazyLock<ModelRef> = LazyLock::new(|| Arc::new(NothingModel) as ModelRef);
static TRUE: LazyLock<ModelRef> = LazyLock::new(|| Arc::new(BooleanModel(true)) as ModelRef);
static FALSE: LazyLock<ModelRef> = LazyLock::new(|| Arc::new(BooleanModel(false)) as ModelRef);

/// The shared "no value" model.
pub fn nothing() -> ModelRef {
    Arc::clone(&NOTHING)
}

/// One of the two shared boolean models.
pub fn boolean(value: bool) -> ModelRef {
    if value {
        Arc::clone(&TRUE)
    } else {
        Arc::clone(&FALSE)
    }
}

pub fn scalar(value: impl Into<String>) -> ModelRef {
    Arc::new(SimpleScalar(value.into()))
}

pub fn number(value: f64) -> ModelRef {
    Arc::new(SimpleNumber(value))
}

pub fn date(value: EngineDate, date_type: DateType) -> ModelRef {
    Arc::new(SimpleDate { value, date_type })
}

pub fn sequence(items: impl IntoIterator<Item = ModelRef>) -> ModelRef {
    Arc::new(SimpleSequence::from_vec(items.into_iter().collect()))
}

pub fn hash<K: Into<String>>(entries: impl IntoIterator<Item = (K, ModelRef)>) -> ModelRef {
    Arc::new(SimpleHash::from_entries(entries))
}

pub fn collection(items: impl IntoIterator<Item = ModelRef>) -> ModelRef {
    Arc::new(SimpleCollection(items.into_iter().collect()))
}

// ============================================================================
// Simple models
// ============================================================================

#[derive(Debug, Clone)]
pub struct SimpleScalar(pub String);

impl TemplateModel for SimpleScalar {
    fn kind(&self) -> ModelKind {
        ModelKind::Scalar
    }

    fn as_scalar(&self) -> Option<&str> {
        Some(&self.0)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SimpleNumber(pub f64);

impl TemplateModel for SimpleNumber {
    fn kind(&self) -> ModelKind {
        ModelKind::Number
    }

    fn as_number(&self) -> Option<f64> {
        Some(self.0)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SimpleDate {
    pub value: EngineDate,
    pub date_type: DateType,
}

impl TemplateModel for SimpleDate {
    fn kind(&self) -> ModelKind {
        ModelKind::Date
    }

    fn as_date(&self) -> Option<&dyn DateModel> {
        Some(self)
    }
}

impl DateModel for SimpleDate {
    fn as_date(&self) -> ModelResult<EngineDate> {
        Ok(self.value)
    }

    fn date_type(&self) -> DateType {
        self.date_type
    }
}

/// Ordered list of models. Also used as the argument list of method calls.
#[derive(Debug, Clone, Default)]
pub struct SimpleSequence {
    items: Vec<ModelRef>,
}

impl SimpleSequence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_vec(items: Vec<ModelRef>) -> Self {
        Self { items }
    }

    pub fn push(&mut self, item: ModelRef) {
        self.items.push(item);
    }

    pub fn iter(&self) -> impl Iterator<Item = &ModelRef> {
        self.items.iter()
    }
}

impl TemplateModel for SimpleSequence {
    fn kind(&self) -> ModelKind {
        ModelKind::Sequence
    }

    fn as_sequence(&self) -> Option<&dyn SequenceModel> {
        Some(self)
    }
}

impl SequenceModel for SimpleSequence {
    fn get(&self, index: usize) -> ModelResult<ModelRef> {
        self.items.get(index).cloned().ok_or_else(|| {
            ModelError::new(format!(
                "Sequence index {} out of bounds (size {})",
                index,
                self.items.len()
            ))
        })
    }

    fn size(&self) -> usize {
        self.items.len()
    }
}

/// Insertion-ordered map of models.
#[derive(Debug, Clone, Default)]
pub struct SimpleHash {
    entries: LinkedHashMap<String, ModelRef>,
}

impl SimpleHash {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entries<K: Into<String>>(entries: impl IntoIterator<Item = (K, ModelRef)>) -> Self {
        Self {
            entries: entries.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }

    pub fn insert(&mut self, key: impl Into<String>, value: ModelRef) {
        self.entries.insert(key.into(), value);
    }
}

impl TemplateModel for SimpleHash {
    fn kind(&self) -> ModelKind {
        ModelKind::Hash
    }

    fn as_hash(&self) -> Option<&dyn HashModel> {
        Some(self)
    }
}

impl HashModel for SimpleHash {
    fn get(&self, key: &str) -> ModelResult<Option<ModelRef>> {
        Ok(self.entries.get(key).cloned())
    }

    fn keys(&self) -> ModelRef {
        collection(self.entries.keys().map(|k| scalar(k.clone())))
    }

    fn values(&self) -> ModelRef {
        collection(self.entries.values().cloned())
    }

    fn size(&self) -> usize {
        self.entries.len()
    }
}

#[derive(Debug, Clone, Default)]
pub struct SimpleCollection(pub Vec<ModelRef>);

impl TemplateModel for SimpleCollection {
    fn kind(&self) -> ModelKind {
        ModelKind::Collection
    }

    fn as_collection(&self) -> Option<&dyn CollectionModel> {
        Some(self)
    }
}

impl CollectionModel for SimpleCollection {
    fn iterator(&self) -> Box<dyn ModelIterator + '_> {
        Box::new(SliceIterator {
            items: &self.0,
            position: 0,
        })
    }

    fn size(&self) -> usize {
        self.0.len()
    }
}

struct SliceIterator<'a> {
    items: &'a [ModelRef],
    position: usize,
}

impl ModelIterator for SliceIterator<'_> {
    fn has_next(&self) -> bool {
        self.position < self.items.len()
    }

    fn next(&mut self) -> ModelResult<ModelRef> {
        let item = self
            .items
            .get(self.position)
            .cloned()
            .ok_or_else(|| ModelError::new("Iterator exhausted"))?;
        self.position += 1;
        Ok(item)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_boolean_singletons_are_shared() {
        assert!(Arc::ptr_eq(&boolean(true), &boolean(true)));
        assert!(Arc::ptr_eq(&boolean(false), &boolean(false)));
        assert!(!Arc::ptr_eq(&boolean(true), &boolean(false)));
        assert_eq!(boolean(true).as_boolean(), Some(true));
    }

    #[test]
    fn test_nothing_renders_empty() {
        let n = nothing();
        assert_eq!(n.kind(), ModelKind::Nothing);
        assert_eq!(n.as_scalar(), Some(""));
        assert!(Arc::ptr_eq(&n, &nothing()));
    }

    #[test]
    fn test_sequence_out_of_range() {
        let seq = SimpleSequence::from_vec(vec![scalar("a")]);
        assert_eq!(seq.get(0).unwrap().as_scalar(), Some("a"));
        assert!(seq.get(1).is_err());
    }

    #[test]
    fn test_hash_keys_and_values_keep_order() {
        let h = SimpleHash::from_entries([("b", number(2.0)), ("a", number(1.0))]);
        let keys = h.keys();
        let mut it = keys.as_collection().unwrap().iterator();
        assert_eq!(it.next().unwrap().as_scalar(), Some("b"));
        assert_eq!(it.next().unwrap().as_scalar(), Some("a"));
        assert!(!it.has_next());
        assert!(it.next().is_err());

        let values = h.values();
        let mut it = values.as_collection().unwrap().iterator();
        assert_eq!(it.next().unwrap().as_number(), Some(2.0));
        assert_eq!(it.next().unwrap().as_number(), Some(1.0));
    }

    #[test]
    fn test_missing_hash_key() {
        let h = SimpleHash::new();
        assert!(h.get("x").unwrap().is_none());
        assert!(HashModel::is_empty(&h));
    }
}
