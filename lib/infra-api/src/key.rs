//! Scoped addressing of provider resources

use std::fmt;

/// Location scope of a resource. The provider rejects calls whose scope does
/// not match where the resource actually lives.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Scope {
    Global,
    Regional(String),
    Zonal(String),
}

impl Scope {
    /// URL path segment for this scope, e.g. `regions/us-central1`
    pub fn path(&self) -> String {
        match self {
            Scope::Global => "global".to_string(),
            Scope::Regional(region) => format!("regions/{}", region),
            Scope::Zonal(zone) => format!("zones/{}", zone),
        }
    }
}

/// Name plus scope of a provider resource
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceKey {
    name: String,
    scope: Scope,
}

impl ResourceKey {
    pub fn global(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            scope: Scope::Global,
        }
    }

    pub fn regional(name: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            scope: Scope::Regional(region.into()),
        }
    }

    pub fn zonal(name: impl Into<String>, zone: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            scope: Scope::Zonal(zone.into()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    pub fn region(&self) -> Option<&str> {
        match &self.scope {
            Scope::Regional(region) => Some(region),
            _ => None,
        }
    }

    pub fn zone(&self) -> Option<&str> {
        match &self.scope {
            Scope::Zonal(zone) => Some(zone),
            _ => None,
        }
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.scope.path(), self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(ResourceKey::global("net1").to_string(), "global/net1");
        assert_eq!(
            ResourceKey::regional("sub1", "us-central1").to_string(),
            "regions/us-central1/sub1"
        );
        assert_eq!(
            ResourceKey::zonal("vm-0", "us-central1-a").to_string(),
            "zones/us-central1-a/vm-0"
        );
    }

    #[test]
    fn test_scope_accessors() {
        let key = ResourceKey::zonal("vm-0", "europe-west4-b");
        assert_eq!(key.zone(), Some("europe-west4-b"));
        assert_eq!(key.region(), None);
        assert_eq!(key.name(), "vm-0");

        let key = ResourceKey::regional("router", "europe-west4");
        assert_eq!(key.region(), Some("europe-west4"));
        assert_eq!(key.zone(), None);
    }

    #[test]
    fn test_equality_includes_scope() {
        assert_ne!(
            ResourceKey::global("a"),
            ResourceKey::regional("a", "us-east1")
        );
        assert_ne!(
            ResourceKey::zonal("a", "us-east1-b"),
            ResourceKey::zonal("a", "us-east1-c")
        );
    }
}
