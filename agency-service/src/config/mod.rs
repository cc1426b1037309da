use serde::Deserialize;
use service_core::config as core_config;
use service_core::error::AppError;
use std::env;

use crate::routing::RoutingConfig;

/// Public paths served when `PUBLIC_ROUTES` is not set.
const DEFAULT_PUBLIC_ROUTES: &str = "/site,/agency/sign-in,/agency/sign-up,/health,/ready,/metrics";

#[derive(Debug, Clone, Deserialize)]
pub struct AgencyConfig {
    #[serde(flatten)]
    pub common: core_config::Config,
    pub environment: Environment,
    pub service_name: String,
    pub service_version: String,
    pub log_level: String,
    pub otlp_endpoint: Option<String>,
    pub database: DatabaseConfig,
    pub identity: IdentityConfig,
    pub routing: RoutingConfig,
    pub security: SecurityConfig,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Dev,
    Prod,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    /// When false the service runs on the in-memory store. Dev only.
    pub enabled: bool,
}

/// Upstream session service. `enabled = false` swaps in the static provider.
#[derive(Debug, Clone, Deserialize)]
pub struct IdentityConfig {
    pub base_url: String,
    pub api_key: String,
    pub session_cookie: String,
    pub enabled: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SecurityConfig {
    pub allowed_origins: Vec<String>,
}

impl AgencyConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let common_config = core_config::Config::load()?;

        let env_str = env::var("ENVIRONMENT").unwrap_or_else(|_| "dev".to_string());
        let environment: Environment = env_str
            .parse()
            .map_err(|e: String| AppError::ConfigError(anyhow::anyhow!(e)))?;

        let is_prod = environment == Environment::Prod;

        let config = AgencyConfig {
            common: common_config,
            environment: environment.clone(),
            service_name: get_env("SERVICE_NAME", Some("agency-service"), is_prod)?,
            service_version: get_env("SERVICE_VERSION", Some(env!("CARGO_PKG_VERSION")), is_prod)?,
            log_level: get_env("LOG_LEVEL", Some("info"), is_prod)?,
            otlp_endpoint: env::var("OTLP_ENDPOINT").ok().filter(|v| !v.is_empty()),
            database: DatabaseConfig {
                url: get_env("DATABASE_URL", Some(""), is_prod)?,
                max_connections: get_env("DATABASE_MAX_CONNECTIONS", Some("10"), is_prod)?
                    .parse()
                    .unwrap_or(10),
                min_connections: get_env("DATABASE_MIN_CONNECTIONS", Some("1"), is_prod)?
                    .parse()
                    .unwrap_or(1),
                enabled: get_env("DATABASE_ENABLED", Some("false"), is_prod)?
                    .parse()
                    .unwrap_or(false),
            },
            identity: IdentityConfig {
                base_url: get_env("IDENTITY_BASE_URL", Some("http://localhost:8081"), is_prod)?,
                api_key: get_env("IDENTITY_API_KEY", Some(""), is_prod)?,
                session_cookie: get_env("IDENTITY_SESSION_COOKIE", Some("agency_session"), is_prod)?,
                enabled: get_env("IDENTITY_ENABLED", Some("false"), is_prod)?
                    .parse()
                    .unwrap_or(false),
            },
            routing: RoutingConfig {
                base_domain: get_env("BASE_DOMAIN", Some("localhost"), is_prod)?
                    .trim()
                    .to_lowercase(),
                public_routes: get_env("PUBLIC_ROUTES", Some(DEFAULT_PUBLIC_ROUTES), is_prod)?
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect(),
            },
            security: SecurityConfig {
                allowed_origins: get_env(
                    "ALLOWED_ORIGINS",
                    Some("http://localhost:3000"),
                    is_prod,
                )?
                .split(',')
                .map(|s| s.trim().to_string())
                .collect(),
            },
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), AppError> {
        if self.routing.base_domain.is_empty() {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "BASE_DOMAIN must not be empty"
            )));
        }

        if let Some(route) = self
            .routing
            .public_routes
            .iter()
            .find(|r| !r.starts_with('/'))
        {
            return Err(AppError::ConfigError(anyhow::anyhow!(format!(
                "PUBLIC_ROUTES entries must start with '/': {}",
                route
            ))));
        }

        if self.database.max_connections == 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "DATABASE_MAX_CONNECTIONS must be greater than 0"
            )));
        }

        if self.database.min_connections > self.database.max_connections {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "DATABASE_MIN_CONNECTIONS must not exceed DATABASE_MAX_CONNECTIONS"
            )));
        }

        // In production, ensure stricter validation
        if self.environment == Environment::Prod {
            if !self.database.enabled {
                return Err(AppError::ConfigError(anyhow::anyhow!(
                    "DATABASE_ENABLED must be true in production"
                )));
            }

            if self.identity.enabled && self.identity.api_key.is_empty() {
                return Err(AppError::ConfigError(anyhow::anyhow!(
                    "IDENTITY_API_KEY is required when the identity provider is enabled in production"
                )));
            }

            if self.routing.base_domain == "localhost" {
                return Err(AppError::ConfigError(anyhow::anyhow!(
                    "BASE_DOMAIN must be a real domain in production"
                )));
            }

            if self.security.allowed_origins.iter().any(|o| o == "*") {
                return Err(AppError::ConfigError(anyhow::anyhow!(
                    "Wildcard CORS origin not allowed in production"
                )));
            }
        }

        Ok(())
    }
}

fn get_env(key: &str, default: Option<&str>, is_prod: bool) -> Result<String, AppError> {
    match env::var(key) {
        Ok(val) => Ok(val),
        Err(_) => {
            if is_prod {
                Err(AppError::ConfigError(anyhow::anyhow!(format!(
                    "{} is required in production but not set",
                    key
                ))))
            } else if let Some(def) = default {
                Ok(def.to_string())
            } else {
                Err(AppError::ConfigError(anyhow::anyhow!(format!(
                    "{} is required but not set",
                    key
                ))))
            }
        }
    }
}

impl std::str::FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "dev" => Ok(Environment::Dev),
            "prod" => Ok(Environment::Prod),
            _ => Err(format!("Invalid environment: {}", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dev_config() -> AgencyConfig {
        AgencyConfig {
            common: core_config::Config {
                host: std::net::IpAddr::V4(std::net::Ipv4Addr::LOCALHOST),
                port: 8080,
            },
            environment: Environment::Dev,
            service_name: "agency-service".to_string(),
            service_version: "0.0.0".to_string(),
            log_level: "info".to_string(),
            otlp_endpoint: None,
            database: DatabaseConfig {
                url: String::new(),
                max_connections: 10,
                min_connections: 1,
                enabled: false,
            },
            identity: IdentityConfig {
                base_url: "http://localhost:8081".to_string(),
                api_key: String::new(),
                session_cookie: "agency_session".to_string(),
                enabled: false,
            },
            routing: RoutingConfig {
                base_domain: "app.example.com".to_string(),
                public_routes: vec!["/site".to_string(), "/health".to_string()],
            },
            security: SecurityConfig {
                allowed_origins: vec!["http://localhost:3000".to_string()],
            },
        }
    }

    #[test]
    fn dev_config_validates() {
        assert!(dev_config().validate().is_ok());
    }

    #[test]
    fn rejects_relative_public_route() {
        let mut config = dev_config();
        config.routing.public_routes.push("site".to_string());
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_min_connections_above_max() {
        let mut config = dev_config();
        config.database.min_connections = 20;
        assert!(config.validate().is_err());
    }

    #[test]
    fn prod_requires_database_and_real_domain() {
        let mut config = dev_config();
        config.environment = Environment::Prod;
        assert!(config.validate().is_err());

        config.database.enabled = true;
        config.routing.base_domain = "localhost".to_string();
        assert!(config.validate().is_err());

        config.routing.base_domain = "app.example.com".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn prod_rejects_wildcard_origin() {
        let mut config = dev_config();
        config.environment = Environment::Prod;
        config.database.enabled = true;
        config.security.allowed_origins = vec!["*".to_string()];
        assert!(config.validate().is_err());
    }

    #[test]
    fn parses_environment_strings() {
        assert_eq!("dev".parse::<Environment>().unwrap(), Environment::Dev);
        assert_eq!("PROD".parse::<Environment>().unwrap(), Environment::Prod);
        assert!("staging".parse::<Environment>().is_err());
    }
}
