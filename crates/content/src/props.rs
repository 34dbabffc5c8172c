//! Property key layout on repository nodes.
//!
//! Mapper-managed keys carry the `cmf:` prefix so they can never
//! collide with template property names; template property values are
//! additionally scoped by language so one node can hold several
//! language variants side by side.

/// Template key the node was last saved with (node-global).
pub const TEMPLATE: &str = "cmf:template";

/// User id that created the node. Written once, immutable.
pub const CREATOR: &str = "cmf:creator";

/// User id of the last save. Updated on every write.
pub const CHANGER: &str = "cmf:changer";

pub const CREATED: &str = "cmf:created";

pub const CHANGED: &str = "cmf:changed";

/// On a route node: reference to the content node it resolves to, or,
/// when [`HISTORY`] is set, to the replacement route node.
pub const CONTENT: &str = "cmf:content";

/// Marks a retired route node whose [`CONTENT`] reference points
/// forward at its replacement route.
pub const HISTORY: &str = "cmf:history";

/// Language-scoped storage key for a template property value.
pub fn lang_key(language: &str, name: &str) -> String {
    format!("i18n:{language}-{name}")
}

/// Reserved per-language key caching the node's active resource
/// locator. The route tree stays authoritative for resolution; this is
/// what makes move detection and locator decoding cheap.
pub fn route_cache_key(language: &str) -> String {
    lang_key(language, "cmf:route")
}
