//! Application startup and lifecycle management.
//!
//! Wires the store and identity provider behind their traits, binds the
//! listener, and serves the router with the tenant router middleware
//! mounted around it so URI rewrites happen before route matching.

use crate::config::AgencyConfig;
use crate::identity::{HttpIdentityProvider, IdentityProvider, StaticIdentityProvider};
use crate::middleware::tenant_router_middleware;
use crate::services::{ActivityLog, MembershipService};
use crate::store::{AgencyStore, MemoryStore, PgStore};
use crate::{build_router, AppState};
use axum::middleware::from_fn_with_state;
use axum::ServiceExt;
use service_core::error::AppError;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tower::Layer;

/// Application container for managing server lifecycle.
pub struct Application {
    port: u16,
    listener: TcpListener,
    state: AppState,
}

impl Application {
    /// Build the application with the given configuration.
    pub async fn build(config: AgencyConfig) -> Result<Self, AppError> {
        let store: Arc<dyn AgencyStore> = if config.database.enabled {
            let store = PgStore::connect(
                &config.database.url,
                config.database.max_connections,
                config.database.min_connections,
            )
            .await
            .map_err(|e| {
                tracing::error!("Failed to connect to Postgres: {}", e);
                AppError::from(e)
            })?;

            store.run_migrations().await.map_err(|e| {
                tracing::error!("Failed to run database migrations: {}", e);
                AppError::from(e)
            })?;

            tracing::info!("Postgres store initialized");
            Arc::new(store)
        } else {
            tracing::info!("Database disabled, using in-memory store");
            Arc::new(MemoryStore::new())
        };

        let identity: Arc<dyn IdentityProvider> = if config.identity.enabled {
            tracing::info!(
                "Identity provider initialized at {}",
                config.identity.base_url
            );
            Arc::new(HttpIdentityProvider::new(config.identity.clone()))
        } else {
            tracing::info!("Identity provider disabled, using static provider");
            Arc::new(StaticIdentityProvider::new())
        };

        Self::with_components(config, store, identity).await
    }

    /// Wire the application from explicit components.
    ///
    /// Tests use this to inject the in-memory store and the static
    /// identity provider directly.
    pub async fn with_components(
        config: AgencyConfig,
        store: Arc<dyn AgencyStore>,
        identity: Arc<dyn IdentityProvider>,
    ) -> Result<Self, AppError> {
        let activity = ActivityLog::new(store.clone());
        let resolver = MembershipService::new(store.clone(), identity.clone(), activity.clone());

        let state = AppState {
            config: config.clone(),
            store,
            identity,
            resolver,
            activity,
        };

        // Port 0 = random port for testing
        let addr = config.common.listen_addr();
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            tracing::error!("Failed to bind TCP listener to {}: {}", addr, e);
            AppError::from(e)
        })?;
        let port = listener.local_addr()?.port();

        tracing::info!("Listening on {}", port);

        Ok(Self {
            port,
            listener,
            state,
        })
    }

    /// Get the port the server is listening on.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Run the application until stopped.
    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        let router = build_router(self.state.clone());

        // The rewrite middleware must run before route matching, so it
        // wraps the router instead of being a layer inside it.
        let app = from_fn_with_state(self.state, tenant_router_middleware).layer(router);

        axum::serve(self.listener, app.into_make_service()).await
    }
}

/// Wait for Ctrl+C or SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
