use thiserror::Error;

/// Error taxonomy surfaced by the content mapper and its collaborators.
///
/// Repository errors never leak through: they are wrapped at the
/// boundary (see [`Error::from_repo`]) so callers only ever match on
/// these kinds.
#[derive(Debug, Error)]
pub enum Error {
    /// A required property is missing, an occurrence bound is
    /// violated, or a value has the wrong shape for its declared type.
    /// Nothing was committed.
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("unknown template: {0}")]
    TemplateNotFound(String),

    /// Unknown identifier or unresolvable resource locator.
    #[error("not found: {0}")]
    NotFound(String),

    /// Lost a race for a resource locator (or a sibling name) to a
    /// concurrent commit. The caller may retry.
    #[error("conflict on: {0}")]
    PathConflict(String),

    /// The history chain behind a resource locator exceeds the hop
    /// bound; treated as a data-integrity fault, never retried.
    #[error("history chain too long or cyclic at: {0}")]
    RouteCycle(String),

    #[error("no converter registered for property type: {0}")]
    UnknownPropertyType(String),

    /// Repository fault that maps to none of the kinds above.
    #[error("storage error: {0}")]
    Storage(String),
}

impl Error {
    #[inline]
    pub fn validation(msg: impl Into<String>) -> Self {
        Error::Validation(msg.into())
    }

    #[inline]
    pub fn not_found(msg: impl Into<String>) -> Self {
        Error::NotFound(msg.into())
    }

    /// Wrap a repository error into the caller-facing taxonomy.
    pub fn from_repo(err: repo::Error) -> Self {
        match err {
            repo::Error::UnknownNode(id) => Error::NotFound(id.to_string()),
            repo::Error::UnknownPath(path) => Error::NotFound(path),
            repo::Error::Conflict { path, .. } => Error::PathConflict(path),
            repo::Error::DuplicateName { name, .. } => Error::PathConflict(name),
            repo::Error::InvalidPath(path) => Error::Validation(format!("invalid path: {path}")),
        }
    }
}

impl From<repo::Error> for Error {
    fn from(err: repo::Error) -> Self {
        Error::from_repo(err)
    }
}
