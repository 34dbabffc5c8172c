//! Route tree persistence.
//!
//! One node per path segment under the configured routes root. A leaf
//! that resolves a locator carries a content reference; a retired leaf
//! additionally carries the history flag and its reference points
//! forward at the replacement route node. No business rules live here
//! beyond tree mechanics — an already existing segment is used, never
//! treated as an error.

use tracing::debug;

use crate::props;
use crate::Error;
use repo::{NodeId, Session, Value};

pub struct RouteMapper {
    base: String,
}

impl RouteMapper {
    pub fn new(base: impl Into<String>) -> Self {
        Self { base: base.into() }
    }

    fn storage_path(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    /// Find the route node for a locator, if any.
    pub async fn route_by_path<S: Session>(
        &self,
        session: &S,
        path: &str,
    ) -> Result<Option<NodeId>, Error> {
        Ok(session.node_by_path(&self.storage_path(path)).await?)
    }

    /// Create (or re-use) the segment chain for a locator and claim
    /// the leaf for `content`. Idempotent for an unchanged claim;
    /// claiming a leaf that actively resolves to different content
    /// fails with [`Error::PathConflict`]. A concurrent claim race is
    /// caught at commit through the checked write.
    pub async fn create_route<S: Session>(
        &self,
        session: &mut S,
        path: &str,
        content: NodeId,
    ) -> Result<NodeId, Error> {
        let leaf = session.ensure_path(&self.storage_path(path)).await?;

        let observed = session.property(leaf, props::CONTENT).await?;
        let history = self.is_history(session, leaf).await?;
        match observed.as_ref().and_then(Value::as_reference) {
            Some(existing) if !history && existing == content => {
                // Re-saving the same locator; nothing to do.
                return Ok(leaf);
            }
            Some(existing) if !history && existing != content => {
                return Err(Error::PathConflict(path.to_owned()));
            }
            _ => {}
        }

        if history {
            debug!(path, "reclaiming history route");
        }
        session
            .checked_set_property(leaf, props::CONTENT, Value::Reference(content), observed)
            .await?;
        session
            .set_property(leaf, props::HISTORY, Value::Bool(false))
            .await?;
        Ok(leaf)
    }

    /// Retire the route at `path`: flag it as history and repoint its
    /// reference at the replacement route node.
    pub async fn mark_history<S: Session>(
        &self,
        session: &mut S,
        path: &str,
        replacement: NodeId,
    ) -> Result<(), Error> {
        let Some(leaf) = self.route_by_path(session, path).await? else {
            return Err(Error::not_found(path));
        };
        session
            .set_property(leaf, props::CONTENT, Value::Reference(replacement))
            .await?;
        session
            .set_property(leaf, props::HISTORY, Value::Bool(true))
            .await?;
        debug!(path, %replacement, "route retired to history");
        Ok(())
    }

    /// The node this route references: a content node when active, the
    /// replacement route node when history, `None` for a bare segment.
    pub async fn referenced<S: Session>(
        &self,
        session: &S,
        route: NodeId,
    ) -> Result<Option<NodeId>, Error> {
        Ok(session
            .property(route, props::CONTENT)
            .await?
            .as_ref()
            .and_then(Value::as_reference))
    }

    pub async fn is_history<S: Session>(&self, session: &S, route: NodeId) -> Result<bool, Error> {
        Ok(session
            .property(route, props::HISTORY)
            .await?
            .as_ref()
            .and_then(Value::as_bool)
            .unwrap_or(false))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use repo::{MemoryRepo, Repository};
    use uuid::Uuid;

    async fn setup() -> (MemoryRepo, repo::MemorySession, RouteMapper) {
        let repo = MemoryRepo::new();
        let mut session = repo.session("default").await.unwrap();
        session.ensure_path("/cmf/routes").await.unwrap();
        session.save().await.unwrap();
        (repo, session, RouteMapper::new("/cmf/routes"))
    }

    #[tokio::test]
    async fn create_route_builds_segment_chain_once() {
        let (_repo, mut session, routes) = setup().await;
        let content = Uuid::new_v4();

        let leaf = routes
            .create_route(&mut session, "/news/test", content)
            .await
            .unwrap();
        // Idempotent: same leaf, no duplicate siblings.
        let again = routes
            .create_route(&mut session, "/news/test", content)
            .await
            .unwrap();
        assert_eq!(leaf, again);
        session.save().await.unwrap();

        let news = session.node_by_path("/cmf/routes/news").await.unwrap();
        let children = session.children(news.unwrap()).await.unwrap();
        assert_eq!(children.len(), 1);
        assert_eq!(routes.referenced(&session, leaf).await.unwrap(), Some(content));
        assert!(!routes.is_history(&session, leaf).await.unwrap());
    }

    #[tokio::test]
    async fn claiming_a_foreign_active_route_conflicts() {
        let (_repo, mut session, routes) = setup().await;
        routes
            .create_route(&mut session, "/news", Uuid::new_v4())
            .await
            .unwrap();

        let err = routes
            .create_route(&mut session, "/news", Uuid::new_v4())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::PathConflict(_)));
    }

    #[tokio::test]
    async fn mark_history_repoints_the_leaf() {
        let (_repo, mut session, routes) = setup().await;
        let content = Uuid::new_v4();
        routes
            .create_route(&mut session, "/old", content)
            .await
            .unwrap();
        let new_leaf = routes
            .create_route(&mut session, "/new", content)
            .await
            .unwrap();
        routes
            .mark_history(&mut session, "/old", new_leaf)
            .await
            .unwrap();
        session.save().await.unwrap();

        let old_leaf = routes
            .route_by_path(&session, "/old")
            .await
            .unwrap()
            .unwrap();
        assert!(routes.is_history(&session, old_leaf).await.unwrap());
        assert_eq!(
            routes.referenced(&session, old_leaf).await.unwrap(),
            Some(new_leaf)
        );
    }

    #[tokio::test]
    async fn history_routes_can_be_reclaimed() {
        let (_repo, mut session, routes) = setup().await;
        let content = Uuid::new_v4();
        routes
            .create_route(&mut session, "/old", content)
            .await
            .unwrap();
        let new_leaf = routes
            .create_route(&mut session, "/new", content)
            .await
            .unwrap();
        routes
            .mark_history(&mut session, "/old", new_leaf)
            .await
            .unwrap();
        session.save().await.unwrap();

        // Moving back: /old becomes active again.
        let leaf = routes
            .create_route(&mut session, "/old", content)
            .await
            .unwrap();
        session.save().await.unwrap();
        assert!(!routes.is_history(&session, leaf).await.unwrap());
        assert_eq!(routes.referenced(&session, leaf).await.unwrap(), Some(content));
    }
}
