//! Placement, move and resolution rules for resource locators.

use tracing::{debug, warn};

use crate::rlp::RouteMapper;
use crate::Error;
use repo::{NodeId, Session};

/// Upper bound on the history walk when resolving a locator. The
/// chain grows by one per rename, so anything near this bound is a
/// corrupt (cyclic) chain rather than a legitimately renamed page.
pub const MAX_HISTORY_HOPS: usize = 50;

pub struct TreeStrategy {
    routes: RouteMapper,
}

impl TreeStrategy {
    pub fn new(routes: RouteMapper) -> Self {
        Self { routes }
    }

    /// Check a caller-supplied locator: absolute, non-empty, no empty
    /// segments, no trailing slash.
    pub fn validate(&self, path: &str) -> Result<(), Error> {
        if !path.starts_with('/') || path.len() < 2 {
            return Err(Error::validation(format!(
                "resource locator must be an absolute path: {path:?}"
            )));
        }
        if path.ends_with('/') || path[1..].split('/').any(|s| s.is_empty()) {
            return Err(Error::validation(format!(
                "resource locator has empty segments: {path:?}"
            )));
        }
        Ok(())
    }

    /// Place `content` at `desired`, moving it there when `current`
    /// names a different locator. A move retires the current route to
    /// history so the old locator keeps resolving. Equal paths are a
    /// no-op beyond ensuring the route exists.
    #[tracing::instrument(skip_all, fields(desired = %desired))]
    pub async fn place_or_move<S: Session>(
        &self,
        session: &mut S,
        current: Option<&str>,
        desired: &str,
        content: NodeId,
    ) -> Result<(), Error> {
        self.validate(desired)?;

        let leaf = self.routes.create_route(session, desired, content).await?;
        match current {
            Some(cur) if cur != desired => {
                debug!(from = cur, to = desired, "moving resource locator");
                match self.routes.mark_history(session, cur, leaf).await {
                    Ok(()) => {}
                    Err(Error::NotFound(_)) => {
                        // The cached locator has no route node; nothing
                        // to retire. Leave the new claim in place.
                        warn!(path = cur, "previous route missing, skipping history");
                    }
                    Err(err) => return Err(err),
                }
            }
            _ => {}
        }
        Ok(())
    }

    /// Resolve a locator to the content node it currently stands for,
    /// transparently following the history chain. Callers never see
    /// history nodes.
    #[tracing::instrument(skip_all, fields(path = %path))]
    pub async fn resolve<S: Session>(&self, session: &S, path: &str) -> Result<NodeId, Error> {
        let Some(mut route) = self.routes.route_by_path(session, path).await? else {
            return Err(Error::not_found(path));
        };

        let mut hops = 0;
        while self.routes.is_history(session, route).await? {
            hops += 1;
            if hops > MAX_HISTORY_HOPS {
                return Err(Error::RouteCycle(path.to_owned()));
            }
            route = self
                .routes
                .referenced(session, route)
                .await?
                .ok_or_else(|| Error::not_found(path))?;
        }

        // A bare segment node carries no content reference.
        self.routes
            .referenced(session, route)
            .await?
            .ok_or_else(|| Error::not_found(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::props;
    use repo::{MemoryRepo, Repository, Value};
    use uuid::Uuid;

    fn strategy() -> TreeStrategy {
        TreeStrategy::new(RouteMapper::new("/cmf/routes"))
    }

    async fn session(repo: &MemoryRepo) -> repo::MemorySession {
        let mut session = repo.session("default").await.unwrap();
        session.ensure_path("/cmf/routes").await.unwrap();
        session
    }

    #[test]
    fn validate_rejects_malformed_locators() {
        let s = strategy();
        assert!(s.validate("/news/test").is_ok());
        assert!(s.validate("news/test").is_err());
        assert!(s.validate("/").is_err());
        assert!(s.validate("").is_err());
        assert!(s.validate("/news//test").is_err());
        assert!(s.validate("/news/").is_err());
    }

    #[tokio::test]
    async fn place_then_resolve() {
        let repo = MemoryRepo::new();
        let mut session = session(&repo).await;
        let s = strategy();
        let content = Uuid::new_v4();

        s.place_or_move(&mut session, None, "/news/test", content)
            .await
            .unwrap();
        session.save().await.unwrap();

        assert_eq!(s.resolve(&session, "/news/test").await.unwrap(), content);
    }

    #[tokio::test]
    async fn move_keeps_old_locator_resolving() {
        let repo = MemoryRepo::new();
        let mut session = session(&repo).await;
        let s = strategy();
        let content = Uuid::new_v4();

        s.place_or_move(&mut session, None, "/news/test", content)
            .await
            .unwrap();
        s.place_or_move(
            &mut session,
            Some("/news/test"),
            "/news/test/test/test",
            content,
        )
        .await
        .unwrap();
        session.save().await.unwrap();

        assert_eq!(
            s.resolve(&session, "/news/test/test/test").await.unwrap(),
            content
        );
        // Old locator resolves through history.
        assert_eq!(s.resolve(&session, "/news/test").await.unwrap(), content);
    }

    #[tokio::test]
    async fn double_move_chains_history() {
        let repo = MemoryRepo::new();
        let mut session = session(&repo).await;
        let s = strategy();
        let content = Uuid::new_v4();

        s.place_or_move(&mut session, None, "/a", content)
            .await
            .unwrap();
        s.place_or_move(&mut session, Some("/a"), "/b", content)
            .await
            .unwrap();
        s.place_or_move(&mut session, Some("/b"), "/c", content)
            .await
            .unwrap();
        session.save().await.unwrap();

        assert_eq!(s.resolve(&session, "/c").await.unwrap(), content);
        assert_eq!(s.resolve(&session, "/b").await.unwrap(), content);
        assert_eq!(s.resolve(&session, "/a").await.unwrap(), content);
    }

    #[tokio::test]
    async fn unchanged_locator_is_a_no_op() {
        let repo = MemoryRepo::new();
        let mut session = session(&repo).await;
        let s = strategy();
        let content = Uuid::new_v4();

        s.place_or_move(&mut session, None, "/news", content)
            .await
            .unwrap();
        s.place_or_move(&mut session, Some("/news"), "/news", content)
            .await
            .unwrap();
        session.save().await.unwrap();

        let leaf = s
            .routes
            .route_by_path(&session, "/news")
            .await
            .unwrap()
            .unwrap();
        assert!(!s.routes.is_history(&session, leaf).await.unwrap());
        assert_eq!(s.resolve(&session, "/news").await.unwrap(), content);
    }

    #[tokio::test]
    async fn missing_segment_and_bare_segment_are_not_found() {
        let repo = MemoryRepo::new();
        let mut session = session(&repo).await;
        let s = strategy();
        s.place_or_move(&mut session, None, "/news/test", Uuid::new_v4())
            .await
            .unwrap();
        session.save().await.unwrap();

        assert!(matches!(
            s.resolve(&session, "/nowhere").await.unwrap_err(),
            Error::NotFound(_)
        ));
        // `/news` exists as a segment but was never claimed.
        assert!(matches!(
            s.resolve(&session, "/news").await.unwrap_err(),
            Error::NotFound(_)
        ));
    }

    #[tokio::test]
    async fn cyclic_history_chain_is_detected() {
        use repo::Session as _;

        let repo = MemoryRepo::new();
        let mut session = session(&repo).await;
        let s = strategy();

        // Two history nodes pointing at each other: corrupt data.
        let a = session.ensure_path("/cmf/routes/a").await.unwrap();
        let b = session.ensure_path("/cmf/routes/b").await.unwrap();
        session
            .set_property(a, props::HISTORY, Value::Bool(true))
            .await
            .unwrap();
        session
            .set_property(a, props::CONTENT, Value::Reference(b))
            .await
            .unwrap();
        session
            .set_property(b, props::HISTORY, Value::Bool(true))
            .await
            .unwrap();
        session
            .set_property(b, props::CONTENT, Value::Reference(a))
            .await
            .unwrap();
        session.save().await.unwrap();

        assert!(matches!(
            s.resolve(&session, "/a").await.unwrap_err(),
            Error::RouteCycle(_)
        ));
    }
}
