use std::collections::HashMap;

/// Resource types carrying an owning-tenant column.
pub const DEFAULT_SCOPED_RESOURCES: &[&str] = &[
    "stations",
    "audits",
    "incidents",
    "contractors",
    "work_permits",
    "form_definitions",
    "notifications",
    "reports",
    "audit_logs",
    "users",
];

/// Which resources are tenant-scoped, and by which column.
///
/// Anything not registered (e.g. `organizations`) passes through the
/// interception layer untouched.
#[derive(Debug, Clone)]
pub struct ResourceRegistry {
    scoped: HashMap<String, String>,
    default_column: String,
}

impl ResourceRegistry {
    pub fn new(default_column: impl Into<String>) -> Self {
        Self {
            scoped: HashMap::new(),
            default_column: default_column.into(),
        }
    }

    /// Default resources, scoped by the configured tenant column.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new(crate::config::config().tenant.tenant_column.clone());
        for resource in DEFAULT_SCOPED_RESOURCES {
            registry.register(*resource);
        }
        registry
    }

    pub fn register(&mut self, resource: impl Into<String>) -> &mut Self {
        let column = self.default_column.clone();
        self.register_with_column(resource, column)
    }

    pub fn register_with_column(&mut self, resource: impl Into<String>, column: impl Into<String>) -> &mut Self {
        self.scoped.insert(resource.into(), column.into());
        self
    }

    pub fn tenant_column(&self, resource: &str) -> Option<&str> {
        self.scoped.get(resource).map(String::as_str)
    }

    pub fn is_scoped(&self, resource: &str) -> bool {
        self.scoped.contains_key(resource)
    }
}

impl Default for ResourceRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_scope_domain_resources_only() {
        let registry = ResourceRegistry::with_defaults();
        assert_eq!(registry.tenant_column("stations"), Some("organization_id"));
        assert!(registry.is_scoped("work_permits"));
        assert!(!registry.is_scoped("organizations"));
    }

    #[test]
    fn test_custom_column() {
        let mut registry = ResourceRegistry::new("organization_id");
        registry.register_with_column("sites", "tenant_id");
        assert_eq!(registry.tenant_column("sites"), Some("tenant_id"));
    }
}
