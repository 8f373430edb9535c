//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Assemble application state from settings
//! - Create the Axum router (API, health, static dashboard)
//! - Wire up middleware (timeout, tracing, request ID)
//! - Apply settings reloads while serving
//! - Drain in-flight requests on shutdown

use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use axum::{
    body::Body, extract::DefaultBodyLimit, http::Request, routing::get, Json, Router,
};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tower_http::{
    cors::CorsLayer,
    limit::RequestBodyLimitLayer,
    services::{ServeDir, ServeFile},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::api;
use crate::config::AppSettings;
use crate::document::{ConfigStore, PathResolver};
use crate::http::request::{RequestIdExt, RequestIdLayer};
use crate::lifecycle::shutdown;
use crate::mutation::{ConfigEngine, EngineOptions};
use crate::service::{ProcessRunner, ServiceControl, ServiceKind, SystemRunner, SystemdControl};
use crate::validator::{BinaryLocator, CheckerValidator, ConfigValidator, LocatorSettings};
use crate::workflow::{RestartTiming, RollbackCoordinator};

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<ArcSwap<AppSettings>>,
    pub engine: Arc<ConfigEngine>,
    pub rollback: RollbackCoordinator,
    pub services: Arc<dyn ServiceControl>,
    pub locator: Arc<BinaryLocator>,
    pub dns_config_path: PathBuf,
}

impl AppState {
    /// Production wiring: `systemctl` supervision and the `sing-box check`
    /// validator.
    pub fn from_settings(settings: AppSettings) -> Self {
        let runner: Arc<dyn ProcessRunner> = Arc::new(SystemRunner::new(settings.engine.command_timeout()));

        let mut locator_settings = LocatorSettings::for_service(&settings.engine.service_name);
        locator_settings.configured_path = settings.engine.binary_path.clone();
        let locator = Arc::new(BinaryLocator::new(locator_settings, runner.clone()));

        let validator = Arc::new(CheckerValidator::new(locator.clone(), runner.clone()));
        let services = Arc::new(SystemdControl::new(runner));

        Self::assemble(settings, validator, services, locator)
    }

    /// Build state around explicit collaborators. The configuration path is
    /// resolved here, once.
    pub fn assemble(
        settings: AppSettings,
        validator: Arc<dyn ConfigValidator>,
        services: Arc<dyn ServiceControl>,
        locator: Arc<BinaryLocator>,
    ) -> Self {
        let config_path = PathResolver::new(
            settings.engine.config_path.clone(),
            settings.engine.fallback_paths.clone(),
        )
        .locate();
        tracing::info!(path = %config_path.display(), "Using sing-box configuration");

        let store = ConfigStore::new(config_path);
        let options = EngineOptions {
            backup_before_write: settings.engine.backup_before_write,
            validate_rule_sets: settings.engine.validate_rule_sets,
        };
        let engine = Arc::new(ConfigEngine::new(store.clone(), validator, options));
        let rollback = RollbackCoordinator::new(store, services.clone(), &settings.engine.service_name);

        Self {
            dns_config_path: settings.dns.config_path.clone(),
            settings: Arc::new(ArcSwap::from_pointee(settings)),
            engine,
            rollback,
            services,
            locator,
        }
    }

    pub fn settings(&self) -> Arc<AppSettings> {
        self.settings.load_full()
    }

    /// Configured unit name for a managed service.
    pub fn unit_name(&self, kind: ServiceKind) -> String {
        let settings = self.settings.load();
        match kind {
            ServiceKind::SingBox => settings.engine.service_name.clone(),
            ServiceKind::Mosdns => settings.dns.service_name.clone(),
        }
    }

    pub fn restart_timing(&self) -> RestartTiming {
        RestartTiming::from(&self.settings.load().rollback)
    }

    fn apply_settings(&self, next: AppSettings) {
        let current = self.settings.load();
        if current.server.bind_address != next.server.bind_address
            || current.server.web_dir != next.server.web_dir
            || current.engine.config_path != next.engine.config_path
            || current.engine.binary_path != next.engine.binary_path
            || current.engine.service_name != next.engine.service_name
            || current.dns.config_path != next.dns.config_path
        {
            tracing::warn!("Listener, path or service name changes take effect after a restart");
        }
        self.settings.store(Arc::new(next));
        tracing::info!("Settings reloaded");
    }
}

/// HTTP server for the management API.
pub struct HttpServer {
    router: Router,
    state: AppState,
}

impl HttpServer {
    pub fn new(settings: AppSettings) -> Self {
        Self::from_state(AppState::from_settings(settings))
    }

    pub fn from_state(state: AppState) -> Self {
        let router = Self::build_router(state.clone());
        Self { router, state }
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(state: AppState) -> Router {
        let settings = state.settings();
        let web_dir = settings.server.web_dir.clone();
        let index = web_dir.join("index.html");

        let mut router = Router::new()
            .route("/health", get(health))
            .nest("/api", api::api_router(state.clone()))
            .fallback_service(ServeDir::new(web_dir).fallback(ServeFile::new(index)))
            .with_state(state)
            .layer(DefaultBodyLimit::disable())
            .layer(RequestBodyLimitLayer::new(settings.server.max_body_bytes));
        if settings.server.cors_enabled {
            router = router.layer(CorsLayer::permissive());
        }

        router
            .layer(TimeoutLayer::new(Duration::from_secs(settings.server.request_timeout_secs)))
            .layer(TraceLayer::new_for_http().make_span_with(|req: &Request<Body>| {
                tracing::info_span!(
                    "request",
                    method = %req.method(),
                    uri = %req.uri(),
                    request_id = req.request_id().unwrap_or("-"),
                )
            }))
            .layer(RequestIdLayer)
    }

    /// Serve on `listener` until `shutdown` fires. Settings arriving on
    /// `config_updates` replace the live settings.
    pub async fn run(
        self,
        listener: TcpListener,
        mut config_updates: mpsc::UnboundedReceiver<AppSettings>,
        shutdown: broadcast::Receiver<()>,
    ) -> Result<(), io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let state = self.state.clone();
        let mut reload_shutdown = shutdown.resubscribe();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    update = config_updates.recv() => match update {
                        Some(next) => state.apply_settings(next),
                        None => break,
                    },
                    _ = reload_shutdown.recv() => break,
                }
            }
        });

        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown::wait(shutdown))
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
