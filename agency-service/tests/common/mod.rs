use agency_service::config::{
    AgencyConfig, DatabaseConfig, Environment, IdentityConfig, SecurityConfig,
};
use agency_service::identity::{Identity, StaticIdentityProvider};
use agency_service::models::{Agency, NewAgency};
use agency_service::routing::RoutingConfig;
use agency_service::startup::Application;
use agency_service::store::{AgencyStore, MemoryStore};
use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;

/// Apex domain the test application is configured with. Requests carrying a
/// `Host` below this domain are treated as tenant traffic.
pub const BASE_DOMAIN: &str = "app.example.com";

pub struct TestApp {
    pub address: String,
    pub port: u16,
    pub store: Arc<MemoryStore>,
    pub identity: Arc<StaticIdentityProvider>,
    pub client: reqwest::Client,
}

impl TestApp {
    pub async fn spawn() -> Self {
        let store = Arc::new(MemoryStore::new());
        let identity = Arc::new(StaticIdentityProvider::new());

        let app = Application::with_components(test_config(), store.clone(), identity.clone())
            .await
            .expect("Failed to build test application");
        let port = app.port();
        let address = format!("http://127.0.0.1:{}", port);

        tokio::spawn(async move {
            app.run_until_stopped().await.ok();
        });

        // Redirects stay visible so tests can assert on Location headers.
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .expect("Failed to build test client");

        // Wait for the server to be ready by polling the health endpoint
        let health_url = format!("{}/health", address);
        for _ in 0..50 {
            if client.get(&health_url).send().await.is_ok() {
                break;
            }
            tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;
        }

        TestApp {
            address,
            port,
            store,
            identity,
            client,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.address, path)
    }

    /// Seed a session for the given user and return its bearer token.
    pub fn sign_in(&self, user_id: &str, email: &str, name: &str) -> String {
        let token = format!("token-{}", user_id);
        self.identity.insert_session(
            token.clone(),
            Identity {
                id: user_id.to_string(),
                email: email.to_string(),
                name: name.to_string(),
                avatar_url: None,
            },
        );
        token
    }

    pub async fn seed_agency(&self, name: &str) -> Agency {
        self.store
            .insert_agency(NewAgency {
                name: name.to_string(),
                company_email: format!("contact@{}.example", name.to_lowercase()),
                ..NewAgency::default()
            })
            .await
            .expect("Failed to seed agency")
    }
}

pub fn test_config() -> AgencyConfig {
    AgencyConfig {
        common: service_core::config::Config {
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: 0,
        },
        environment: Environment::Dev,
        service_name: "agency-service".to_string(),
        service_version: "0.0.0-test".to_string(),
        log_level: "info".to_string(),
        otlp_endpoint: None,
        database: DatabaseConfig {
            url: String::new(),
            max_connections: 5,
            min_connections: 1,
            enabled: false,
        },
        identity: IdentityConfig {
            base_url: "http://127.0.0.1:0".to_string(),
            api_key: String::new(),
            session_cookie: "agency_session".to_string(),
            enabled: false,
        },
        routing: RoutingConfig {
            base_domain: BASE_DOMAIN.to_string(),
            public_routes: vec![
                "/site".to_string(),
                "/agency/sign-in".to_string(),
                "/agency/sign-up".to_string(),
                "/health".to_string(),
                "/ready".to_string(),
                "/metrics".to_string(),
            ],
        },
        security: SecurityConfig {
            allowed_origins: vec!["http://localhost:3000".to_string()],
        },
    }
}
