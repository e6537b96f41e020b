/// Table namespaces for the three logical tables: versions, nodes, orphans.
/// Defaults follow a short single-byte namespace convention (`"n"`/`"o"`).
#[derive(Debug, Clone)]
pub struct TreeConfig {
    pub version_namespace: String,
    pub node_namespace: String,
    pub orphan_namespace: String,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            version_namespace: "v".to_string(),
            node_namespace: "n".to_string(),
            orphan_namespace: "o".to_string(),
        }
    }
}

impl TreeConfig {
    pub fn new(version_namespace: &str, node_namespace: &str, orphan_namespace: &str) -> Self {
        Self {
            version_namespace: version_namespace.to_string(),
            node_namespace: node_namespace.to_string(),
            orphan_namespace: orphan_namespace.to_string(),
        }
    }
}
