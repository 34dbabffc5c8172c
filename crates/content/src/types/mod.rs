//! Property type converters.
//!
//! A converter translates between the caller-facing dynamic value
//! (`serde_json::Value`) and the repository-native representation.
//! Dispatch is by [`PropertyKind`] through an explicit registry so
//! additional types can be plugged in without touching the mapper.

pub mod text;

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value as Json;

use crate::structure::{PropertyDef, PropertyKind};
use crate::Error;
use repo::Value;

pub use text::{TextArea, TextLine};

pub trait ContentType: Send + Sync {
    /// Convert a caller value to its persisted representation,
    /// validating shape and occurrence bounds against `def`. The value
    /// is never `Null` here; null handling (removal) is the mapper's.
    fn encode(&self, def: &PropertyDef, value: &Json) -> Result<Value, Error>;

    /// Convert a persisted value back to a caller value. Unknown or
    /// mismatched stored shapes decode to `Null` rather than erroring:
    /// stored data may predate the currently assigned template.
    fn decode(&self, def: &PropertyDef, stored: &Value) -> Json;
}

impl std::fmt::Debug for dyn ContentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ContentType")
    }
}

pub struct TypeRegistry {
    converters: HashMap<PropertyKind, Arc<dyn ContentType>>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self {
            converters: HashMap::new(),
        }
    }

    pub fn register(&mut self, kind: PropertyKind, converter: Arc<dyn ContentType>) {
        self.converters.insert(kind, converter);
    }

    pub fn converter(&self, kind: PropertyKind) -> Result<&Arc<dyn ContentType>, Error> {
        self.converters
            .get(&kind)
            .ok_or_else(|| Error::UnknownPropertyType(kind.to_string()))
    }
}

impl Default for TypeRegistry {
    fn default() -> Self {
        let mut registry = Self::new();
        registry.register(PropertyKind::TextLine, Arc::new(TextLine));
        registry.register(PropertyKind::TextArea, Arc::new(TextArea));
        registry
    }
}
