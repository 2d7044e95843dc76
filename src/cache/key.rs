//! Cache key construction.
//!
//! Every cache key in the process is built here. Components are written as
//! `<tag><byte length>:<value>`, so a tenant id or resource id containing
//! `|` or `:` cannot be read back as a different tuple, and no value can
//! produce a key inside another tenant's namespace.

use crate::context::TenantId;

const OBJECT_PREFIX: &str = "hse:";
const VALIDATION_PREFIX: &str = "hse-tv:";

pub struct CacheKey;

impl CacheKey {
    /// Key for one entry: (tenant, resource type, resource id).
    pub fn build(tenant_id: &TenantId, resource_type: &str, resource_id: &str) -> String {
        let mut key = Self::resource_namespace(tenant_id, resource_type);
        push_component(&mut key, 'i', resource_id);
        key
    }

    /// Key for a resource type's list entry. Tagged apart from record ids,
    /// so no record key can equal it.
    pub fn collection(tenant_id: &TenantId, resource_type: &str) -> String {
        let mut key = Self::resource_namespace(tenant_id, resource_type);
        push_component(&mut key, 'c', "");
        key
    }

    /// Prefix shared by every object-cache key of one tenant.
    pub fn tenant_namespace(tenant_id: &TenantId) -> String {
        let mut key = String::from(OBJECT_PREFIX);
        push_component(&mut key, 't', tenant_id.as_str());
        key.push('|');
        key
    }

    /// Prefix shared by every key of one resource type within one tenant.
    pub fn resource_namespace(tenant_id: &TenantId, resource_type: &str) -> String {
        let mut key = Self::tenant_namespace(tenant_id);
        push_component(&mut key, 'r', resource_type);
        key.push('|');
        key
    }

    /// Prefix of the whole object cache, used only by an explicit global flush.
    pub fn object_prefix() -> &'static str {
        OBJECT_PREFIX
    }

    /// Key of a memoized tenant validation result.
    pub fn validation(tenant_id: &TenantId) -> String {
        let mut key = String::from(VALIDATION_PREFIX);
        push_component(&mut key, 't', tenant_id.as_str());
        key
    }

    pub fn validation_prefix() -> &'static str {
        VALIDATION_PREFIX
    }
}

fn push_component(key: &mut String, tag: char, value: &str) {
    key.push(tag);
    key.push_str(&value.len().to_string());
    key.push(':');
    key.push_str(value);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tenant(id: &str) -> TenantId {
        TenantId::new(id).unwrap()
    }

    #[test]
    fn test_key_layout() {
        assert_eq!(
            CacheKey::build(&tenant("org-a"), "stations", "s1"),
            "hse:t5:org-a|r8:stations|i2:s1"
        );
        assert_eq!(
            CacheKey::collection(&tenant("org-a"), "stations"),
            "hse:t5:org-a|r8:stations|c0:"
        );
    }

    #[test]
    fn test_collection_key_never_equals_a_record_key() {
        let t = tenant("org-a");
        let list = CacheKey::collection(&t, "stations");
        for id in ["all", "", "c0:", "|c0:"] {
            assert_ne!(CacheKey::build(&t, "stations", id), list);
        }
        assert!(list.starts_with(&CacheKey::resource_namespace(&t, "stations")));
    }

    #[test]
    fn test_delimiters_in_components_cannot_forge_keys() {
        let first = CacheKey::build(&tenant("a|r1:b"), "c", "d");
        let second = CacheKey::build(&tenant("a"), "b|c", "d");
        assert_ne!(first, second);

        let forged = CacheKey::build(&tenant("org-a"), "stations", "x|t5:org-b");
        assert!(!forged.starts_with(&CacheKey::tenant_namespace(&tenant("org-b"))));
    }

    #[test]
    fn test_namespaces_do_not_overlap_between_similar_tenants() {
        let short = CacheKey::tenant_namespace(&tenant("org-a"));
        let long_key = CacheKey::build(&tenant("org-ab"), "stations", "s1");
        assert!(!long_key.starts_with(&short));
    }

    #[test]
    fn test_validation_keys_live_outside_object_namespace() {
        let key = CacheKey::validation(&tenant("org-a"));
        assert!(key.starts_with(CacheKey::validation_prefix()));
        assert!(!key.starts_with(CacheKey::object_prefix()));
    }
}
