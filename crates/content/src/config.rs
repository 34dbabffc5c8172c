use serde::{Deserialize, Serialize};

/// Repository placement of the two parallel trees.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MapperConfig {
    /// Root of the content tree.
    pub contents_path: String,
    /// Root of the route tree.
    pub routes_path: String,
}

impl Default for MapperConfig {
    fn default() -> Self {
        Self {
            contents_path: "/cmf/contents".to_owned(),
            routes_path: "/cmf/routes".to_owned(),
        }
    }
}
