use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use domain::services::{AlertDispatcher, GeofenceEngine, InMemoryLocationArchive, LocationArchive};

use crate::config::Config;
use crate::middleware::{metrics_handler, metrics_middleware, trace_id};
use crate::routes::{devices, geofences, health, locations};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub engine: Arc<GeofenceEngine>,
    pub dispatcher: Arc<AlertDispatcher>,
    /// `None` when archiving is disabled.
    pub archive: Option<Arc<dyn LocationArchive>>,
    shutting_down: Arc<AtomicBool>,
}

impl AppState {
    /// Builds the engine and archive from configuration around `dispatcher`.
    pub fn new(config: Config, dispatcher: AlertDispatcher) -> Self {
        let engine = GeofenceEngine::new(config.engine.clone());
        let archive: Option<Arc<dyn LocationArchive>> = if config.archive.enabled {
            Some(Arc::new(InMemoryLocationArchive::with_capacity(
                config.archive.max_entries,
            )))
        } else {
            None
        };

        Self {
            config: Arc::new(config),
            engine: Arc::new(engine),
            dispatcher: Arc::new(dispatcher),
            archive,
            shutting_down: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Marks the service as draining; readiness fails from here on.
    pub fn begin_shutdown(&self) {
        self.shutting_down.store(true, Ordering::SeqCst);
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutting_down.load(Ordering::SeqCst)
    }
}

pub fn create_app(state: AppState) -> Router {
    let config = state.config.clone();

    // Build CORS layer based on configuration
    let cors = if config.security.cors_origins.is_empty() {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        use tower_http::cors::AllowOrigin;
        let origins: Vec<_> = config
            .security
            .cors_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods(Any)
            .allow_headers(Any)
    };

    let geofence_routes = Router::new()
        .route(
            "/api/v1/geofences",
            post(geofences::create_geofence).get(geofences::list_geofences),
        )
        .route("/api/v1/geofences/check", post(geofences::check_point))
        .route(
            "/api/v1/geofences/:geofence_id",
            get(geofences::get_geofence)
                .put(geofences::update_geofence)
                .delete(geofences::delete_geofence),
        );

    let location_routes = Router::new()
        .route("/api/v1/locations", post(locations::upload_location))
        .route("/api/v1/locations/batch", post(locations::upload_batch))
        .route("/api/v1/locations/dates", get(locations::list_dates));

    let device_routes = Router::new()
        .route("/api/v1/devices/:device_id", get(devices::get_device))
        .route(
            "/api/v1/devices/:device_id/memberships",
            get(devices::get_memberships),
        )
        .route(
            "/api/v1/devices/:device_id/locations",
            get(devices::get_locations),
        );

    let public_routes = Router::new()
        .route("/api/health", get(health::health_check))
        .route("/api/health/ready", get(health::ready))
        .route("/api/health/live", get(health::live))
        .route("/metrics", get(metrics_handler));

    Router::new()
        .merge(public_routes)
        .merge(geofence_routes)
        .merge(location_routes)
        .merge(device_routes)
        // Global middleware (order matters: bottom layers run first)
        .layer(DefaultBodyLimit::max(config.server.max_body_size))
        .layer(CompressionLayer::new())
        .layer(TimeoutLayer::new(Duration::from_secs(
            config.server.request_timeout_secs,
        )))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(trace_id))
        .layer(cors)
        .with_state(state)
}
