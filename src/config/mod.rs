use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub tenant: TenantConfig,
    pub cache: CacheConfig,
    pub filter: FilterConfig,
    pub database: DatabaseConfig,
    pub security: SecurityConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TenantConfig {
    /// Lifetime of a memoized tenant validation result
    pub validation_ttl_secs: u64,
    /// Header carrying an administrative cross-tenant override
    pub override_header: String,
    /// Owning-tenant column on every tenant-scoped table
    pub tenant_column: String,
    /// Emit a warning whenever a scoped read runs without a tenant
    pub log_missing_context: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    pub enabled: bool,
    pub default_ttl_secs: u64,
    pub max_entries: usize,
    pub redis_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterConfig {
    pub max_limit: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: Option<String>,
    pub max_connections: u32,
    pub connection_timeout: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    pub jwt_secret: String,
    pub jwt_expiry_hours: u64,
    pub enable_cors: bool,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let environment = match env::var("APP_ENV").as_deref() {
            Ok("production") | Ok("prod") => Environment::Production,
            Ok("staging") | Ok("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        // Set defaults based on environment, then override with specific env vars
        match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        }
        .with_env_overrides()
    }

    fn with_env_overrides(mut self) -> Self {
        // Tenant overrides
        if let Ok(v) = env::var("TENANT_VALIDATION_TTL_SECS") {
            self.tenant.validation_ttl_secs = v.parse().unwrap_or(self.tenant.validation_ttl_secs);
        }
        if let Ok(v) = env::var("TENANT_OVERRIDE_HEADER") {
            if !v.trim().is_empty() {
                self.tenant.override_header = v.trim().to_ascii_lowercase();
            }
        }
        if let Ok(v) = env::var("TENANT_COLUMN") {
            if !v.trim().is_empty() {
                self.tenant.tenant_column = v.trim().to_string();
            }
        }
        if let Ok(v) = env::var("TENANT_LOG_MISSING_CONTEXT") {
            self.tenant.log_missing_context = v.parse().unwrap_or(self.tenant.log_missing_context);
        }

        // Cache overrides
        if let Ok(v) = env::var("CACHE_ENABLED") {
            self.cache.enabled = v.parse().unwrap_or(self.cache.enabled);
        }
        if let Ok(v) = env::var("CACHE_DEFAULT_TTL_SECS") {
            self.cache.default_ttl_secs = v.parse().unwrap_or(self.cache.default_ttl_secs);
        }
        if let Ok(v) = env::var("CACHE_MAX_ENTRIES") {
            self.cache.max_entries = v.parse().unwrap_or(self.cache.max_entries);
        }
        if let Ok(v) = env::var("REDIS_URL") {
            self.cache.redis_url = Some(v).filter(|s| !s.is_empty());
        }

        // Filter overrides
        if let Ok(v) = env::var("FILTER_MAX_LIMIT") {
            self.filter.max_limit = v.parse().ok();
        }

        // Database overrides
        if let Ok(v) = env::var("DATABASE_URL") {
            self.database.url = Some(v).filter(|s| !s.is_empty());
        }
        if let Ok(v) = env::var("DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = v.parse().unwrap_or(self.database.max_connections);
        }
        if let Ok(v) = env::var("DATABASE_CONNECTION_TIMEOUT") {
            self.database.connection_timeout = v.parse().unwrap_or(self.database.connection_timeout);
        }

        // Security overrides
        if let Ok(v) = env::var("JWT_SECRET") {
            self.security.jwt_secret = v;
        }
        if let Ok(v) = env::var("JWT_EXPIRY_HOURS") {
            self.security.jwt_expiry_hours = v.parse().unwrap_or(self.security.jwt_expiry_hours);
        }
        if let Ok(v) = env::var("SECURITY_ENABLE_CORS") {
            self.security.enable_cors = v.parse().unwrap_or(self.security.enable_cors);
        }

        self
    }

    fn development() -> Self {
        Self {
            environment: Environment::Development,
            tenant: TenantConfig {
                validation_ttl_secs: 600,
                override_header: "x-tenant-id".to_string(),
                tenant_column: "organization_id".to_string(),
                log_missing_context: true,
            },
            cache: CacheConfig {
                enabled: true,
                default_ttl_secs: 300,
                max_entries: 10_000,
                redis_url: None,
            },
            filter: FilterConfig {
                max_limit: Some(1000),
            },
            database: DatabaseConfig {
                url: None,
                max_connections: 10,
                connection_timeout: 30,
            },
            security: SecurityConfig {
                jwt_secret: "development-secret-change-me".to_string(),
                jwt_expiry_hours: 24,
                enable_cors: true,
            },
        }
    }

    fn staging() -> Self {
        Self {
            environment: Environment::Staging,
            tenant: TenantConfig {
                validation_ttl_secs: 600,
                override_header: "x-tenant-id".to_string(),
                tenant_column: "organization_id".to_string(),
                log_missing_context: true,
            },
            cache: CacheConfig {
                enabled: true,
                default_ttl_secs: 300,
                max_entries: 50_000,
                redis_url: None,
            },
            filter: FilterConfig {
                max_limit: Some(500),
            },
            database: DatabaseConfig {
                url: None,
                max_connections: 20,
                connection_timeout: 10,
            },
            security: SecurityConfig {
                jwt_secret: String::new(),
                jwt_expiry_hours: 24,
                enable_cors: true,
            },
        }
    }

    fn production() -> Self {
        Self {
            environment: Environment::Production,
            tenant: TenantConfig {
                validation_ttl_secs: 600,
                override_header: "x-tenant-id".to_string(),
                tenant_column: "organization_id".to_string(),
                log_missing_context: true,
            },
            cache: CacheConfig {
                enabled: true,
                default_ttl_secs: 300,
                max_entries: 100_000,
                redis_url: None,
            },
            filter: FilterConfig {
                max_limit: Some(100),
            },
            database: DatabaseConfig {
                url: None,
                max_connections: 50,
                connection_timeout: 5,
            },
            security: SecurityConfig {
                jwt_secret: String::new(),
                jwt_expiry_hours: 8,
                enable_cors: false,
            },
        }
    }
}

// Global singleton config - initialized once at startup
pub static CONFIG: Lazy<AppConfig> = Lazy::new(AppConfig::from_env);

pub fn config() -> &'static AppConfig {
    &CONFIG
}

#[macro_export]
macro_rules! is_development {
    () => {
        matches!($crate::config::CONFIG.environment, $crate::config::Environment::Development)
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_development_config() {
        let config = AppConfig::development();
        assert_eq!(config.tenant.validation_ttl_secs, 600);
        assert_eq!(config.tenant.override_header, "x-tenant-id");
        assert_eq!(config.filter.max_limit, Some(1000));
        assert!(!config.security.jwt_secret.is_empty());
    }

    #[test]
    fn test_default_production_config() {
        let config = AppConfig::production();
        assert_eq!(config.filter.max_limit, Some(100));
        assert!(config.security.jwt_secret.is_empty());
        assert!(!config.security.enable_cors);
    }
}
