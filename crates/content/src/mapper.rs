//! The content mapper: save/load/query API over the content tree.
//!
//! Maps structured, typed, language-scoped content onto repository
//! nodes, validated against a named structure, and keeps the parallel
//! route tree in sync through the resource locator strategy. All
//! mutations of one `save` go through a single session and commit
//! atomically.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value as Json;
use tracing::debug;

use crate::config::MapperConfig;
use crate::name;
use crate::props;
use crate::rlp::{RouteMapper, TreeStrategy};
use crate::structure::{PropertyKind, Structure, StructureProvider};
use crate::types::TypeRegistry;
use crate::Error;
use repo::{NodeId, Repository, Session, Value};

// ─────────────────────────────────────────────────────────────────────────────
// Requests and views
// ─────────────────────────────────────────────────────────────────────────────

pub struct SaveRequest {
    /// Property values keyed by property name. A key that is absent is
    /// treated per the partial-update flag; an explicit `null` always
    /// clears the stored value.
    pub data: Json,
    pub template: String,
    pub workspace: String,
    pub language: String,
    pub user_id: i64,
    pub partial_update: bool,
    /// Update this node instead of creating a new one.
    pub id: Option<NodeId>,
    /// Parent for a newly created node; root container when absent.
    pub parent_id: Option<NodeId>,
}

impl SaveRequest {
    pub fn new(
        data: Json,
        template: impl Into<String>,
        workspace: impl Into<String>,
        language: impl Into<String>,
        user_id: i64,
    ) -> Self {
        Self {
            data,
            template: template.into(),
            workspace: workspace.into(),
            language: language.into(),
            user_id,
            partial_update: true,
            id: None,
            parent_id: None,
        }
    }

    pub fn with_id(mut self, id: NodeId) -> Self {
        self.id = Some(id);
        self
    }

    pub fn with_parent(mut self, parent: NodeId) -> Self {
        self.parent_id = Some(parent);
        self
    }

    /// Absent properties are cleared instead of retained.
    pub fn full_update(mut self) -> Self {
        self.partial_update = false;
        self
    }
}

/// Decoded view of a content node under its currently assigned
/// structure. Properties appear in declaration order; values the
/// store has nothing for decode to `Null`.
#[derive(Debug, Clone, Serialize)]
pub struct ContentView {
    pub id: NodeId,
    pub template: String,
    pub language: String,
    pub creator: i64,
    pub changer: i64,
    pub created: DateTime<Utc>,
    pub changed: DateTime<Utc>,
    pub has_children: bool,
    properties: Vec<(String, Json)>,
}

impl ContentView {
    pub fn properties(&self) -> &[(String, Json)] {
        &self.properties
    }

    /// Whether the active structure declares a property of this name.
    pub fn has_property(&self, name: &str) -> bool {
        self.properties.iter().any(|(n, _)| n == name)
    }

    pub fn value(&self, name: &str) -> Option<&Json> {
        self.properties
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    pub fn string(&self, name: &str) -> Option<&str> {
        self.value(name).and_then(Json::as_str)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Mapper
// ─────────────────────────────────────────────────────────────────────────────

pub struct ContentMapper<R: Repository> {
    repo: Arc<R>,
    structures: Arc<dyn StructureProvider>,
    types: TypeRegistry,
    strategy: TreeStrategy,
    config: MapperConfig,
}

impl<R: Repository> ContentMapper<R> {
    pub fn new(repo: Arc<R>, structures: Arc<dyn StructureProvider>, config: MapperConfig) -> Self {
        let strategy = TreeStrategy::new(RouteMapper::new(config.routes_path.clone()));
        Self {
            repo,
            structures,
            types: TypeRegistry::default(),
            strategy,
            config,
        }
    }

    /// Swap in a converter registry with additional property types.
    pub fn with_types(mut self, types: TypeRegistry) -> Self {
        self.types = types;
        self
    }

    fn structure(&self, key: &str) -> Result<Structure, Error> {
        self.structures
            .structure(key)
            .ok_or_else(|| Error::TemplateNotFound(key.to_owned()))
    }

    /// Create or update a content node from `data` and return the
    /// decoded view of the result.
    #[tracing::instrument(skip_all, fields(template = %req.template, language = %req.language))]
    pub async fn save(&self, req: SaveRequest) -> Result<ContentView, Error> {
        let structure = self.structure(&req.template)?;
        let data = req
            .data
            .as_object()
            .ok_or_else(|| Error::validation("content data must be an object"))?;

        let mut session = self.repo.session(&req.workspace).await?;

        let (node, is_new) = match req.id {
            Some(id) => {
                if !session.node_exists(id).await? {
                    return Err(Error::NotFound(id.to_string()));
                }
                (id, false)
            }
            None => {
                let parent = match req.parent_id {
                    Some(parent) => {
                        if !session.node_exists(parent).await? {
                            return Err(Error::NotFound(parent.to_string()));
                        }
                        parent
                    }
                    None => session.ensure_path(&self.config.contents_path).await?,
                };
                let naming = structure.naming_property();
                let title = data.get(naming).and_then(Json::as_str).ok_or_else(|| {
                    Error::validation(format!("missing naming property {naming:?}"))
                })?;
                let node_name = name::unique_name(&session, parent, title).await?;
                (session.create_node(parent, &node_name).await?, true)
            }
        };

        self.check_required(&session, &structure, data, node, is_new, &req)
            .await?;

        let now = Utc::now();
        if is_new {
            session
                .set_property(node, props::CREATOR, Value::Long(req.user_id))
                .await?;
            session
                .set_property(node, props::CREATED, Value::DateTime(now))
                .await?;
        }
        session
            .set_property(node, props::CHANGER, Value::Long(req.user_id))
            .await?;
        session
            .set_property(node, props::CHANGED, Value::DateTime(now))
            .await?;
        session
            .set_property(node, props::TEMPLATE, Value::from(structure.key()))
            .await?;

        // Write the declared properties. Properties of a previously
        // assigned template are left in place untouched; they simply
        // stop being visible through this structure.
        let mut locator: Option<String> = None;
        for def in structure.properties() {
            if def.kind == PropertyKind::ResourceLocator {
                if let Some(value) = data.get(&def.name) {
                    match value.as_str() {
                        Some(path) => locator = Some(path.to_owned()),
                        None => {
                            return Err(Error::validation(format!(
                                "property {:?} expects a string path",
                                def.name
                            )))
                        }
                    }
                }
                continue;
            }
            let key = props::lang_key(&req.language, &def.name);
            match data.get(&def.name) {
                Some(Json::Null) => session.remove_property(node, &key).await?,
                Some(value) => {
                    let stored = self.types.converter(def.kind)?.encode(def, value)?;
                    session.set_property(node, &key, stored).await?;
                }
                None if !req.partial_update => session.remove_property(node, &key).await?,
                None => {}
            }
        }

        if let Some(desired) = locator {
            let cache_key = props::route_cache_key(&req.language);
            let current = session.property(node, &cache_key).await?;
            let current = current.as_ref().and_then(Value::as_str);
            self.strategy
                .place_or_move(&mut session, current, &desired, node)
                .await?;
            session
                .set_property(node, &cache_key, Value::from(desired))
                .await?;
        }

        session.save().await?;
        debug!(%node, is_new, "content saved");

        self.view(&session, node, &req.language).await
    }

    /// Validate required properties and null semantics before staging
    /// any write, so a validation failure commits nothing.
    async fn check_required<S: Session>(
        &self,
        session: &S,
        structure: &Structure,
        data: &serde_json::Map<String, Json>,
        node: NodeId,
        is_new: bool,
        req: &SaveRequest,
    ) -> Result<(), Error> {
        for def in structure.properties() {
            match data.get(&def.name) {
                Some(Json::Null) => {
                    if def.kind == PropertyKind::ResourceLocator {
                        // Routes are never deleted.
                        return Err(Error::validation(format!(
                            "resource locator {:?} cannot be removed",
                            def.name
                        )));
                    }
                    if def.required {
                        return Err(Error::validation(format!(
                            "required property {:?} cannot be cleared",
                            def.name
                        )));
                    }
                }
                Some(_) => {}
                None if def.required => {
                    // Absent is fine on a partial update when a value
                    // is already stored (or, for a locator, placed).
                    let retained = !is_new
                        && req.partial_update
                        && if def.kind == PropertyKind::ResourceLocator {
                            session
                                .property(node, &props::route_cache_key(&req.language))
                                .await?
                                .is_some()
                        } else {
                            session
                                .property(node, &props::lang_key(&req.language, &def.name))
                                .await?
                                .is_some()
                        };
                    if !retained {
                        return Err(Error::validation(format!(
                            "required property {:?} is missing",
                            def.name
                        )));
                    }
                }
                None => {}
            }
        }
        Ok(())
    }

    /// Decode a node by identifier under its currently assigned
    /// structure.
    #[tracing::instrument(skip_all, fields(id = %id))]
    pub async fn load(&self, id: NodeId, workspace: &str, language: &str) -> Result<ContentView, Error> {
        let session = self.repo.session(workspace).await?;
        if !session.node_exists(id).await? {
            return Err(Error::NotFound(id.to_string()));
        }
        self.view(&session, id, language).await
    }

    /// Resolve a resource locator (following history transparently)
    /// and decode the content node it stands for.
    #[tracing::instrument(skip_all, fields(path = %path))]
    pub async fn load_by_resource_locator(
        &self,
        path: &str,
        workspace: &str,
        language: &str,
    ) -> Result<ContentView, Error> {
        let session = self.repo.session(workspace).await?;
        let content = self.strategy.resolve(&session, path).await?;
        self.view(&session, content, language).await
    }

    /// Direct children of `parent` (the content root container when
    /// `None`), in insertion order. Depth 1 only.
    #[tracing::instrument(skip_all)]
    pub async fn load_by_parent(
        &self,
        parent: Option<NodeId>,
        workspace: &str,
        language: &str,
    ) -> Result<Vec<ContentView>, Error> {
        let session = self.repo.session(workspace).await?;
        let parent = match parent {
            Some(id) => {
                if !session.node_exists(id).await? {
                    return Err(Error::NotFound(id.to_string()));
                }
                id
            }
            None => match session.node_by_path(&self.config.contents_path).await? {
                Some(id) => id,
                None => return Ok(Vec::new()),
            },
        };
        let mut views = Vec::new();
        for (_, child) in session.children(parent).await? {
            views.push(self.view(&session, child, language).await?);
        }
        Ok(views)
    }

    /// Rename the repository node behind a content id. Never inferred
    /// from a title change on `save`; callers opt in explicitly. Tree
    /// position, identity and routes are unaffected.
    #[tracing::instrument(skip_all, fields(id = %id))]
    pub async fn rename(&self, id: NodeId, workspace: &str, new_title: &str) -> Result<(), Error> {
        let mut session = self.repo.session(workspace).await?;
        if !session.node_exists(id).await? {
            return Err(Error::NotFound(id.to_string()));
        }
        let Some(parent) = session.parent(id).await? else {
            return Err(Error::validation("cannot rename the root node"));
        };
        let current = session.node_name(id).await?;
        if name::slugify(new_title) == current {
            return Ok(());
        }
        let node_name = name::unique_name(&session, parent, new_title).await?;
        session.rename_node(id, &node_name).await?;
        session.save().await?;
        Ok(())
    }

    async fn view<S: Session>(
        &self,
        session: &S,
        node: NodeId,
        language: &str,
    ) -> Result<ContentView, Error> {
        let template = session.property(node, props::TEMPLATE).await?;
        let template = template
            .as_ref()
            .and_then(Value::as_str)
            .ok_or_else(|| Error::Storage(format!("node {node} carries no template key")))?
            .to_owned();
        let structure = self.structure(&template)?;

        let stamp_long = |value: Option<Value>| value.as_ref().and_then(Value::as_long).unwrap_or(0);
        let creator = stamp_long(session.property(node, props::CREATOR).await?);
        let changer = stamp_long(session.property(node, props::CHANGER).await?);
        let created = session
            .property(node, props::CREATED)
            .await?
            .as_ref()
            .and_then(Value::as_datetime)
            .ok_or_else(|| Error::Storage(format!("node {node} carries no created stamp")))?;
        let changed = session
            .property(node, props::CHANGED)
            .await?
            .as_ref()
            .and_then(Value::as_datetime)
            .ok_or_else(|| Error::Storage(format!("node {node} carries no changed stamp")))?;
        let has_children = !session.children(node).await?.is_empty();

        let mut properties = Vec::with_capacity(structure.properties().len());
        for def in structure.properties() {
            let value = if def.kind == PropertyKind::ResourceLocator {
                session
                    .property(node, &props::route_cache_key(language))
                    .await?
                    .as_ref()
                    .and_then(Value::as_str)
                    .map(|s| Json::String(s.to_owned()))
                    .unwrap_or(Json::Null)
            } else {
                match session
                    .property(node, &props::lang_key(language, &def.name))
                    .await?
                {
                    Some(stored) => self.types.converter(def.kind)?.decode(def, &stored),
                    None => Json::Null,
                }
            };
            properties.push((def.name.clone(), value));
        }

        Ok(ContentView {
            id: node,
            template,
            language: language.to_owned(),
            creator,
            changer,
            created,
            changed,
            has_children,
            properties,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::structure::{MockStructureProvider, PropertyDef, StructureRegistry};
    use repo::MemoryRepo;
    use serde_json::json;

    fn mapper_with(provider: impl StructureProvider + 'static) -> ContentMapper<MemoryRepo> {
        ContentMapper::new(
            Arc::new(MemoryRepo::new()),
            Arc::new(provider),
            MapperConfig::default(),
        )
    }

    #[tokio::test]
    async fn unknown_template_fails_before_touching_the_repository() {
        let mut provider = MockStructureProvider::new();
        provider.expect_structure().returning(|_| None);

        let mapper = mapper_with(provider);
        let err = mapper
            .save(SaveRequest::new(json!({}), "missing", "default", "de", 1))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::TemplateNotFound(_)));
    }

    #[tokio::test]
    async fn required_property_must_be_present_on_create() {
        let mut registry = StructureRegistry::new();
        registry.register(
            Structure::new("strict")
                .with(PropertyDef::new("title", PropertyKind::TextLine).required()),
        );
        let mapper = mapper_with(registry);

        let err = mapper
            .save(SaveRequest::new(json!({}), "strict", "default", "de", 1))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[tokio::test]
    async fn required_property_survives_partial_update_but_not_null() {
        let mut registry = StructureRegistry::new();
        registry.register(
            Structure::new("strict")
                .with(PropertyDef::new("title", PropertyKind::TextLine).required())
                .with(PropertyDef::new("article", PropertyKind::TextArea).required()),
        );
        let mapper = mapper_with(registry);

        let saved = mapper
            .save(SaveRequest::new(
                json!({"title": "T", "article": "A"}),
                "strict",
                "default",
                "de",
                1,
            ))
            .await
            .unwrap();

        // Absent required property on a partial update is retained.
        let updated = mapper
            .save(
                SaveRequest::new(json!({"title": "T2"}), "strict", "default", "de", 1)
                    .with_id(saved.id),
            )
            .await
            .unwrap();
        assert_eq!(updated.value("article"), Some(&json!("A")));

        // An explicit null on a required property is rejected.
        let err = mapper
            .save(
                SaveRequest::new(
                    json!({"title": "T2", "article": null}),
                    "strict",
                    "default",
                    "de",
                    1,
                )
                .with_id(saved.id),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));

        // Absent required property on a full update is rejected too.
        let err = mapper
            .save(
                SaveRequest::new(json!({"title": "T2"}), "strict", "default", "de", 1)
                    .with_id(saved.id)
                    .full_update(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[tokio::test]
    async fn data_must_be_an_object() {
        let mut registry = StructureRegistry::new();
        registry.register(Structure::new("simple"));
        let mapper = mapper_with(registry);

        let err = mapper
            .save(SaveRequest::new(json!([1, 2]), "simple", "default", "de", 1))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[tokio::test]
    async fn failed_validation_commits_nothing() {
        let mut registry = StructureRegistry::new();
        registry.register(
            Structure::new("strict")
                .with(PropertyDef::new("title", PropertyKind::TextLine))
                .with(PropertyDef::new("article", PropertyKind::TextArea).required()),
        );
        let mapper = mapper_with(registry);

        assert!(mapper
            .save(SaveRequest::new(
                json!({"title": "T"}),
                "strict",
                "default",
                "de",
                1
            ))
            .await
            .is_err());

        let children = mapper.load_by_parent(None, "default", "de").await.unwrap();
        assert!(children.is_empty());
    }
}
