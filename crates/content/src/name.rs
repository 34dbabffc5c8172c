//! Repository node names derived from the naming property.

use crate::Error;
use repo::{NodeId, Session};

/// Turn a title into a repository node name: whitespace collapses to
/// `-`, path separators and control characters are dropped, case is
/// preserved.
pub(crate) fn slugify(title: &str) -> String {
    let mut out = String::with_capacity(title.len());
    let mut pending_dash = false;
    for ch in title.trim().chars() {
        if ch.is_whitespace() {
            pending_dash = !out.is_empty();
        } else if ch == '/' || ch.is_control() {
            continue;
        } else {
            if pending_dash {
                out.push('-');
                pending_dash = false;
            }
            out.push(ch);
        }
    }
    out
}

/// Pick a sibling-unique name under `parent`, appending `-1`, `-2`, …
/// on collision.
pub(crate) async fn unique_name<S: Session>(
    session: &S,
    parent: NodeId,
    title: &str,
) -> Result<String, Error> {
    let base = slugify(title);
    if base.is_empty() {
        return Err(Error::validation(format!(
            "cannot derive a node name from {title:?}"
        )));
    }
    let taken: Vec<String> = session
        .children(parent)
        .await?
        .into_iter()
        .map(|(name, _)| name)
        .collect();
    if !taken.iter().any(|n| n == &base) {
        return Ok(base);
    }
    for i in 1.. {
        let candidate = format!("{base}-{i}");
        if !taken.iter().any(|n| n == &candidate) {
            return Ok(candidate);
        }
    }
    unreachable!()
}

#[cfg(test)]
mod tests {
    use super::*;
    use repo::{MemoryRepo, Repository};

    #[test]
    fn slugify_preserves_case_and_collapses_whitespace() {
        assert_eq!(slugify("Testtitle"), "Testtitle");
        assert_eq!(slugify("Testnews-2-1"), "Testnews-2-1");
        assert_eq!(slugify("  Hello   World "), "Hello-World");
        assert_eq!(slugify("a/b"), "ab");
        assert_eq!(slugify("   "), "");
    }

    #[tokio::test]
    async fn unique_name_appends_counter_on_collision() {
        let repo = MemoryRepo::new();
        let mut session = repo.session("default").await.unwrap();
        let parent = session.ensure_path("/contents").await.unwrap();

        assert_eq!(unique_name(&session, parent, "News").await.unwrap(), "News");
        session.create_node(parent, "News").await.unwrap();
        assert_eq!(
            unique_name(&session, parent, "News").await.unwrap(),
            "News-1"
        );
        session.create_node(parent, "News-1").await.unwrap();
        assert_eq!(
            unique_name(&session, parent, "News").await.unwrap(),
            "News-2"
        );
    }
}
