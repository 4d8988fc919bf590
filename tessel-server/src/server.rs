use crate::config::Config;
use anyhow::Context;
use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tessel_core::{
    ConfigKey, ConfigRecord, ConfigService, DeleteConfigOperationRequest, EncodedValue,
    ListConfigOperationRequest, ReadConfigOperationOutcome, ReadConfigOperationRequest,
    TesselError, UpdateConfigOperationRequest, ValueFormat, build_notifier, unix_now,
};
use tower_http::trace::TraceLayer;

pub struct ServerState {
    pub service: ConfigService,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateConfigBody {
    /// Base64 payload.
    pub data: String,
    #[serde(default)]
    pub format: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub timestamp: Option<i64>,
}

impl UpdateConfigBody {
    fn into_value(self) -> Result<EncodedValue, TesselError> {
        let data = STANDARD.decode(self.data.as_bytes()).map_err(|error| {
            TesselError::InvalidRequest(format!("data is not valid base64: {}", error))
        })?;

        let format = match self.format.as_deref() {
            Some(format) => format.parse::<ValueFormat>()?,
            None => ValueFormat::Json,
        };

        let source = self
            .source
            .as_deref()
            .map(str::trim)
            .filter(|source| !source.is_empty())
            .unwrap_or("api")
            .to_string();

        let timestamp = self.timestamp.unwrap_or_else(unix_now);

        Ok(EncodedValue::new(data, format, source, timestamp))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WriteResponse {
    pub namespace: String,
    pub path: String,
}

impl From<&ConfigKey> for WriteResponse {
    fn from(key: &ConfigKey) -> Self {
        Self {
            namespace: key.namespace().to_string(),
            path: key.path().to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListResponse {
    pub namespace: String,
    pub paths: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub kind: String,
}

/// Maps core errors onto HTTP status codes.
pub struct ApiError(TesselError);

impl From<TesselError> for ApiError {
    fn from(error: TesselError) -> Self {
        Self(error)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, kind) = match &self.0 {
            TesselError::InvalidRequest(_) => (StatusCode::BAD_REQUEST, "invalid_request"),
            TesselError::Timeout(_) => (StatusCode::GATEWAY_TIMEOUT, "timeout"),
            error if error.is_transient() => (StatusCode::SERVICE_UNAVAILABLE, "unavailable"),
            _ => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
        };

        if status.is_server_error() {
            tracing::warn!("request failed: {}", self.0);
        }

        let body = ErrorBody {
            error: self.0.to_string(),
            kind: kind.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

fn not_found(namespace: &str, path: &str) -> Response {
    let body = ErrorBody {
        error: format!("{}/{} not found", namespace, path),
        kind: "not_found".to_string(),
    };
    (StatusCode::NOT_FOUND, Json(body)).into_response()
}

pub fn build_router(state: Arc<ServerState>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/v1/config/:namespace", get(list_configs))
        .route(
            "/v1/config/:namespace/*path",
            get(get_config).put(put_config).delete(delete_config),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn run_server(config: Config) -> anyhow::Result<()> {
    let options = config.service_options();

    let store = config
        .store_builder()
        .build()
        .await
        .context("failed to connect backing store")?;

    let notifier = build_notifier(
        config.notify.backend.as_str(),
        &config.notify.topic,
        config.notify_redis_url(),
    )
    .await
    .context("failed to connect notifier")?;

    let service = ConfigService::new(store, notifier, &options);

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let listener_handle = service.spawn_change_listener(shutdown_rx);

    let state = Arc::new(ServerState { service });
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;
    tracing::info!(
        "Server {} listening on {} (topic {})",
        options.instance_id,
        config.bind_addr,
        config.notify.topic
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("http server failed")?;

    let _ = shutdown_tx.send(true);
    if let Err(error) = listener_handle.await {
        tracing::warn!("change listener task failed: {}", error);
    }

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {}", error);
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}

async fn health_handler(State(state): State<Arc<ServerState>>) -> impl IntoResponse {
    let service = &state.service;
    let response = serde_json::json!({
        "status": "ok",
        "instance_id": service.instance_id(),
        "store": service.store().backend_name(),
        "cached_entries": service.cache().len(),
    });

    (StatusCode::OK, Json(response))
}

async fn list_configs(
    State(state): State<Arc<ServerState>>,
    Path(namespace): Path<String>,
) -> Result<Json<ListResponse>, ApiError> {
    let paths = state
        .service
        .list(ListConfigOperationRequest {
            namespace: namespace.clone(),
            timeout: None,
        })
        .await?;

    Ok(Json(ListResponse { namespace, paths }))
}

async fn get_config(
    State(state): State<Arc<ServerState>>,
    Path((namespace, path)): Path<(String, String)>,
) -> Result<Response, ApiError> {
    let outcome = state
        .service
        .read(ReadConfigOperationRequest {
            namespace: namespace.clone(),
            path: path.clone(),
            timeout: None,
        })
        .await?;

    match outcome {
        ReadConfigOperationOutcome::Found(value) => {
            let key = ConfigKey::new(namespace, path)?;
            Ok(Json(ConfigRecord::new(&key, &value)).into_response())
        }
        ReadConfigOperationOutcome::NotFound => Ok(not_found(&namespace, &path)),
    }
}

async fn put_config(
    State(state): State<Arc<ServerState>>,
    Path((namespace, path)): Path<(String, String)>,
    Json(body): Json<UpdateConfigBody>,
) -> Result<Json<WriteResponse>, ApiError> {
    let value = body.into_value()?;
    let result = state
        .service
        .update(UpdateConfigOperationRequest {
            namespace,
            path,
            value,
            timeout: None,
        })
        .await?;

    Ok(Json(WriteResponse::from(&result.key)))
}

async fn delete_config(
    State(state): State<Arc<ServerState>>,
    Path((namespace, path)): Path<(String, String)>,
) -> Result<Json<WriteResponse>, ApiError> {
    let result = state
        .service
        .delete(DeleteConfigOperationRequest {
            namespace,
            path,
            timeout: None,
        })
        .await?;

    Ok(Json(WriteResponse::from(&result.key)))
}
