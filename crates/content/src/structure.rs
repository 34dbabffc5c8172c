//! Structure (template) definitions and their registry.
//!
//! A structure is a named, ordered list of typed property
//! declarations. Content nodes never own a structure; they record the
//! key they were last saved with and are always viewed through the
//! currently assigned one.

use std::collections::HashMap;
use std::fmt;

/// Known property types. Closed set; the converter registry keys off
/// this tag (see [`crate::types::TypeRegistry`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PropertyKind {
    TextLine,
    TextArea,
    /// Pseudo-type: handled by the resource locator strategy, never
    /// stored through the generic converter path.
    ResourceLocator,
}

impl PropertyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PropertyKind::TextLine => "text_line",
            PropertyKind::TextArea => "text_area",
            PropertyKind::ResourceLocator => "resource_locator",
        }
    }
}

impl fmt::Display for PropertyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyDef {
    pub name: String,
    pub kind: PropertyKind,
    pub required: bool,
    pub min_occurs: Option<u32>,
    pub max_occurs: Option<u32>,
}

impl PropertyDef {
    pub fn new(name: impl Into<String>, kind: PropertyKind) -> Self {
        Self {
            name: name.into(),
            kind,
            required: false,
            min_occurs: None,
            max_occurs: None,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Declare the property as multi-valued with occurrence bounds.
    pub fn occurs(mut self, min: u32, max: u32) -> Self {
        self.min_occurs = Some(min);
        self.max_occurs = Some(max);
        self
    }

    /// Multi-valued properties hold an ordered string collection that
    /// is always replaced wholesale on write.
    pub fn is_multiple(&self) -> bool {
        self.min_occurs.is_some() || self.max_occurs.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Structure {
    key: String,
    properties: Vec<PropertyDef>,
    naming: String,
}

impl Structure {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            properties: Vec::new(),
            naming: "title".to_owned(),
        }
    }

    pub fn with(mut self, def: PropertyDef) -> Self {
        self.properties.push(def);
        self
    }

    /// Override which property names new repository nodes (defaults
    /// to `title`).
    pub fn named_by(mut self, name: impl Into<String>) -> Self {
        self.naming = name.into();
        self
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn properties(&self) -> &[PropertyDef] {
        &self.properties
    }

    pub fn property(&self, name: &str) -> Option<&PropertyDef> {
        self.properties.iter().find(|p| p.name == name)
    }

    pub fn naming_property(&self) -> &str {
        &self.naming
    }

    /// The structure's resource locator declaration, if it has one.
    pub fn resource_locator(&self) -> Option<&PropertyDef> {
        self.properties
            .iter()
            .find(|p| p.kind == PropertyKind::ResourceLocator)
    }
}

/// Source of structures, supplied externally (template files, a
/// database, a test registry). Injected into the mapper at
/// construction.
#[cfg_attr(test, mockall::automock)]
pub trait StructureProvider: Send + Sync {
    fn structure(&self, key: &str) -> Option<Structure>;
}

/// In-memory provider.
#[derive(Debug, Default)]
pub struct StructureRegistry {
    structures: HashMap<String, Structure>,
}

impl StructureRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, structure: Structure) {
        self.structures
            .insert(structure.key().to_owned(), structure);
    }
}

impl StructureProvider for StructureRegistry {
    fn structure(&self, key: &str) -> Option<Structure> {
        self.structures.get(key).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn overview() -> Structure {
        Structure::new("overview")
            .with(PropertyDef::new("title", PropertyKind::TextLine))
            .with(PropertyDef::new("url", PropertyKind::ResourceLocator))
            .with(PropertyDef::new("tags", PropertyKind::TextLine).occurs(2, 10))
            .with(PropertyDef::new("article", PropertyKind::TextArea))
    }

    #[test]
    fn registry_resolves_registered_keys_only() {
        let mut registry = StructureRegistry::new();
        registry.register(overview());

        assert!(registry.structure("overview").is_some());
        assert!(registry.structure("unknown").is_none());
    }

    #[test]
    fn property_order_follows_declaration_order() {
        let structure = overview();
        let names: Vec<&str> = structure
            .properties()
            .iter()
            .map(|p| p.name.as_str())
            .collect();
        assert_eq!(names, vec!["title", "url", "tags", "article"]);
    }

    #[test]
    fn resource_locator_lookup_and_occurrences() {
        let s = overview();
        assert_eq!(s.resource_locator().unwrap().name, "url");
        assert!(s.property("tags").unwrap().is_multiple());
        assert!(!s.property("title").unwrap().is_multiple());
        assert_eq!(s.naming_property(), "title");
    }
}
