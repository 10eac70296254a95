use kube::ResourceExt;
use std::fmt;

/// Identifies a namespaced resource, e.g. the `Secret` referenced by an
/// ingress' TLS declaration.
#[derive(Clone, Debug, Eq, Hash, PartialEq, PartialOrd, Ord)]
pub struct ResourceId {
    pub namespace: String,
    pub name: String,
}

impl ResourceId {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// Builds the identity of a namespaced resource. Resources without a
    /// namespace are attributed to `default`.
    pub fn of<T: ResourceExt>(resource: &T) -> Self {
        Self {
            namespace: resource.namespace().unwrap_or_else(|| "default".to_string()),
            name: resource.name_any(),
        }
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}
