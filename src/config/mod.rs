use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::env;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub api: ApiConfig,
    pub security: SecurityConfig,
    pub content_check: ContentCheckConfig,
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

impl Environment {
    pub fn parse(value: &str) -> Self {
        match value {
            "production" | "prod" => Environment::Production,
            "staging" | "stage" => Environment::Staging,
            _ => Environment::Development,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Postgres connection string. Without one the service keeps its data in memory.
    pub url: Option<String>,
    pub max_connections: u32,
    pub connection_timeout: u64,
    pub run_migrations: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub enable_rate_limiting: bool,
    pub recipe_create_limit: u32,
    pub recipe_create_window_secs: u64,
    pub enable_request_logging: bool,
    pub max_request_size_bytes: usize,
    pub max_images_per_recipe: usize,
    pub max_image_size_bytes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    pub enable_cors: bool,
    pub cors_origins: Vec<String>,
    /// Marks the session cookie `Secure`.
    pub require_https: bool,
    pub session_cookie_name: String,
    pub session_ttl_hours: u64,
    pub bcrypt_cost: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentCheckConfig {
    pub enabled: bool,
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub api_base: String,
    pub model: String,
    pub timeout_secs: u64,
    pub approval_phrase: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StorageBackend {
    S3,
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    pub bucket: Option<String>,
    pub region: String,
    /// Base URL used to build public image links. Defaults to the virtual-hosted S3 endpoint.
    pub public_base_url: Option<String>,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let environment = Environment::parse(env::var("APP_ENV").as_deref().unwrap_or_default());
        Self::for_environment(environment).with_env_overrides()
    }

    pub fn for_environment(environment: Environment) -> Self {
        match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        }
    }

    /// Applies environment variable overrides on top of a preset
    pub fn with_env_overrides(mut self) -> Self {
        // Server overrides
        if let Ok(v) = env::var("HOST") {
            self.server.host = v;
        }
        if let Ok(v) = env::var("PORT") {
            self.server.port = v.parse().unwrap_or(self.server.port);
        }

        // Database overrides
        if let Ok(v) = env::var("DATABASE_URL") {
            self.database.url = Some(v).filter(|url| !url.trim().is_empty());
        }
        if let Ok(v) = env::var("DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = v.parse().unwrap_or(self.database.max_connections);
        }
        if let Ok(v) = env::var("DATABASE_CONNECTION_TIMEOUT") {
            self.database.connection_timeout = v.parse().unwrap_or(self.database.connection_timeout);
        }
        if let Ok(v) = env::var("DATABASE_RUN_MIGRATIONS") {
            self.database.run_migrations = v.parse().unwrap_or(self.database.run_migrations);
        }

        // API overrides
        if let Ok(v) = env::var("API_ENABLE_RATE_LIMITING") {
            self.api.enable_rate_limiting = v.parse().unwrap_or(self.api.enable_rate_limiting);
        }
        if let Ok(v) = env::var("API_RECIPE_CREATE_LIMIT") {
            self.api.recipe_create_limit = v.parse().unwrap_or(self.api.recipe_create_limit);
        }
        if let Ok(v) = env::var("API_RECIPE_CREATE_WINDOW_SECS") {
            self.api.recipe_create_window_secs = v.parse().unwrap_or(self.api.recipe_create_window_secs);
        }
        if let Ok(v) = env::var("API_ENABLE_REQUEST_LOGGING") {
            self.api.enable_request_logging = v.parse().unwrap_or(self.api.enable_request_logging);
        }
        if let Ok(v) = env::var("API_MAX_REQUEST_SIZE_BYTES") {
            self.api.max_request_size_bytes = v.parse().unwrap_or(self.api.max_request_size_bytes);
        }

        // Security overrides
        if let Ok(v) = env::var("SECURITY_ENABLE_CORS") {
            self.security.enable_cors = v.parse().unwrap_or(self.security.enable_cors);
        }
        if let Ok(v) = env::var("SECURITY_CORS_ORIGINS") {
            self.security.cors_origins = v.split(',').map(|s| s.trim().to_string()).collect();
        }
        if let Ok(v) = env::var("SECURITY_REQUIRE_HTTPS") {
            self.security.require_https = v.parse().unwrap_or(self.security.require_https);
        }
        if let Ok(v) = env::var("SECURITY_SESSION_TTL_HOURS") {
            self.security.session_ttl_hours = v.parse().unwrap_or(self.security.session_ttl_hours);
        }
        if let Ok(v) = env::var("SECURITY_BCRYPT_COST") {
            self.security.bcrypt_cost = v.parse().unwrap_or(self.security.bcrypt_cost);
        }

        // Content check overrides
        if let Ok(v) = env::var("CONTENT_CHECK_ENABLED") {
            self.content_check.enabled = v.parse().unwrap_or(self.content_check.enabled);
        }
        if let Ok(v) = env::var("OPENAI_API_KEY") {
            self.content_check.api_key = Some(v).filter(|key| !key.trim().is_empty());
        }
        if let Ok(v) = env::var("OPENAI_API_BASE") {
            self.content_check.api_base = v;
        }
        if let Ok(v) = env::var("OPENAI_MODEL") {
            self.content_check.model = v;
        }
        if let Ok(v) = env::var("CONTENT_CHECK_TIMEOUT_SECS") {
            self.content_check.timeout_secs = v.parse().unwrap_or(self.content_check.timeout_secs);
        }

        // Storage overrides
        if let Ok(v) = env::var("S3_BUCKET_NAME") {
            self.storage.bucket = Some(v).filter(|bucket| !bucket.trim().is_empty());
        }
        if let Ok(v) = env::var("AWS_REGION") {
            self.storage.region = v;
        }
        if let Ok(v) = env::var("STORAGE_PUBLIC_BASE_URL") {
            self.storage.public_base_url = Some(v);
        }
        self.storage.backend = match env::var("STORAGE_BACKEND").as_deref() {
            Ok("memory") => StorageBackend::Memory,
            Ok("s3") => StorageBackend::S3,
            _ if self.storage.bucket.is_some() => StorageBackend::S3,
            _ => self.storage.backend,
        };

        self
    }

    fn development() -> Self {
        Self {
            environment: Environment::Development,
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8080,
            },
            database: DatabaseConfig {
                url: None,
                max_connections: 10,
                connection_timeout: 30,
                run_migrations: true,
            },
            api: ApiConfig {
                enable_rate_limiting: true,
                recipe_create_limit: 2,
                recipe_create_window_secs: 60,
                enable_request_logging: true,
                max_request_size_bytes: 30 * 1024 * 1024, // 5 images x 5MB plus form fields
                max_images_per_recipe: 5,
                max_image_size_bytes: 5 * 1024 * 1024,
            },
            security: SecurityConfig {
                enable_cors: true,
                cors_origins: vec!["http://localhost:5173".to_string(), "http://127.0.0.1:5173".to_string()],
                require_https: false,
                session_cookie_name: "recipe_sid".to_string(),
                session_ttl_hours: 24,
                bcrypt_cost: 10,
            },
            content_check: ContentCheckConfig::default(),
            storage: StorageConfig {
                backend: StorageBackend::Memory,
                bucket: None,
                region: "us-east-1".to_string(),
                public_base_url: None,
            },
        }
    }

    fn staging() -> Self {
        let mut config = Self::production();
        config.environment = Environment::Staging;
        config.database.max_connections = 20;
        config.database.connection_timeout = 10;
        config.api.enable_request_logging = true;
        config.security.cors_origins = vec!["https://staging.example.com".to_string()];
        config
    }

    fn production() -> Self {
        Self {
            environment: Environment::Production,
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8080,
            },
            database: DatabaseConfig {
                url: None,
                max_connections: 50,
                connection_timeout: 5,
                run_migrations: true,
            },
            api: ApiConfig {
                enable_rate_limiting: true,
                recipe_create_limit: 2,
                recipe_create_window_secs: 60,
                enable_request_logging: false,
                max_request_size_bytes: 30 * 1024 * 1024,
                max_images_per_recipe: 5,
                max_image_size_bytes: 5 * 1024 * 1024,
            },
            security: SecurityConfig {
                enable_cors: true,
                cors_origins: vec!["https://app.example.com".to_string()],
                require_https: true,
                session_cookie_name: "recipe_sid".to_string(),
                session_ttl_hours: 24,
                bcrypt_cost: 12,
            },
            content_check: ContentCheckConfig::default(),
            storage: StorageConfig {
                backend: StorageBackend::S3,
                bucket: None,
                region: "us-east-1".to_string(),
                public_base_url: None,
            },
        }
    }
}

impl Default for ContentCheckConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            api_key: None,
            api_base: "https://api.openai.com/v1".to_string(),
            model: "gpt-3.5-turbo".to_string(),
            timeout_secs: 30,
            approval_phrase: "This recipe looks good.".to_string(),
        }
    }
}

// Global singleton config - initialized once at startup
pub static CONFIG: Lazy<AppConfig> = Lazy::new(AppConfig::from_env);

// Convenience function for accessing config
pub fn config() -> &'static AppConfig {
    &CONFIG
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_development_config() {
        let config = AppConfig::for_environment(Environment::Development);
        assert_eq!(config.api.recipe_create_limit, 2);
        assert_eq!(config.api.recipe_create_window_secs, 60);
        assert_eq!(config.security.session_ttl_hours, 24);
        assert!(!config.security.require_https);
        assert_eq!(config.storage.backend, StorageBackend::Memory);
    }

    #[test]
    fn test_default_production_config() {
        let config = AppConfig::for_environment(Environment::Production);
        assert!(config.security.require_https);
        assert!(config.content_check.enabled);
        assert_eq!(config.storage.backend, StorageBackend::S3);
        assert_eq!(config.api.max_image_size_bytes, 5 * 1024 * 1024);
    }

    #[test]
    fn staging_inherits_production_limits() {
        let config = AppConfig::for_environment(Environment::Staging);
        assert_eq!(config.environment, Environment::Staging);
        assert!(config.api.enable_rate_limiting);
        assert_eq!(config.api.max_images_per_recipe, 5);
    }

    #[test]
    fn parses_environment_aliases() {
        assert_eq!(Environment::parse("prod"), Environment::Production);
        assert_eq!(Environment::parse("stage"), Environment::Staging);
        assert_eq!(Environment::parse("anything"), Environment::Development);
    }
}
