use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Stable node identity. Assigned when a node is staged and never
/// changes afterwards, even across renames and route moves.
pub type NodeId = Uuid;

/// Repository-native property values.
///
/// Backends translate these to their own storage encoding; nothing
/// backend-specific leaks through the session trait.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    String(String),
    Long(i64),
    Bool(bool),
    /// Ordered string collection. Always replaced wholesale on write.
    Strings(Vec<String>),
    /// Reference to another node, by identity (not ownership).
    Reference(NodeId),
    DateTime(DateTime<Utc>),
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_long(&self) -> Option<i64> {
        match self {
            Value::Long(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_strings(&self) -> Option<&[String]> {
        match self {
            Value::Strings(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_reference(&self) -> Option<NodeId> {
        match self {
            Value::Reference(id) => Some(*id),
            _ => None,
        }
    }

    pub fn as_datetime(&self) -> Option<DateTime<Utc>> {
        match self {
            Value::DateTime(v) => Some(*v),
            _ => None,
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Long(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

/// Split an absolute repository path into its segments.
///
/// `"/"` is the root (zero segments). Relative paths, empty segments
/// and trailing slashes are rejected.
pub fn path_segments(path: &str) -> Result<Vec<&str>, crate::Error> {
    let Some(rest) = path.strip_prefix('/') else {
        return Err(crate::Error::InvalidPath(path.to_owned()));
    };
    if rest.is_empty() {
        return Ok(Vec::new());
    }
    let segments: Vec<&str> = rest.split('/').collect();
    if segments.iter().any(|s| s.is_empty()) {
        return Err(crate::Error::InvalidPath(path.to_owned()));
    }
    Ok(segments)
}
