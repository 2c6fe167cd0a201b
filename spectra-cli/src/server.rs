use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use log::{info, warn};
use serde::Deserialize;
use serde_json::json;
use spectra_analysis::{
    AnalyzeRequest, CaptureService, SpectraError, TensorGridRequest,
    service::{
        AnalyzeResponse, ApiIndex, ColorsResponse, FileListing, FlowsResponse, LoadSummary, ModelsResponse, Status,
        TensorGridResponse, UploadResponse,
    },
};

const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 8000;
const DEFAULT_DATA_DIR: &str = "data";
const DEFAULT_MAX_UPLOAD_BYTES: usize = 64 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub data_dir: PathBuf,
    pub max_upload_bytes: usize,
}

impl ServerConfig {
    pub fn builder() -> ServerConfigBuilder {
        ServerConfigBuilder::default()
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Default)]
pub struct ServerConfigBuilder {
    host: Option<String>,
    port: Option<u16>,
    data_dir: Option<String>,
    max_upload_bytes: Option<usize>,
}

impl ServerConfigBuilder {
    pub fn host(mut self, host: Option<&String>) -> Self {
        self.host = host.cloned();
        self
    }
    pub fn port(mut self, port: Option<u16>) -> Self {
        self.port = port;
        self
    }
    pub fn data_dir(mut self, data_dir: Option<&String>) -> Self {
        self.data_dir = data_dir.cloned();
        self
    }
    pub fn max_upload_bytes(mut self, max_upload_bytes: Option<usize>) -> Self {
        self.max_upload_bytes = max_upload_bytes;
        self
    }
    pub fn build(self) -> Result<ServerConfig, String> {
        let host = self.host.unwrap_or_else(|| DEFAULT_HOST.to_string());
        if host.trim().is_empty() {
            return Err("host must not be empty".to_string());
        }

        let max_upload_bytes = self.max_upload_bytes.unwrap_or(DEFAULT_MAX_UPLOAD_BYTES);
        if max_upload_bytes == 0 {
            return Err("max upload size must be positive".to_string());
        }

        Ok(ServerConfig {
            host,
            port: self.port.unwrap_or(DEFAULT_PORT),
            data_dir: PathBuf::from(self.data_dir.unwrap_or_else(|| DEFAULT_DATA_DIR.to_string())),
            max_upload_bytes,
        })
    }
}

/// Error body returned by every endpoint: `{"detail": "<message>"}`.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    detail: String,
}

impl ApiError {
    fn bad_request(detail: impl Into<String>) -> Self {
        Self { status: StatusCode::BAD_REQUEST, detail: detail.into() }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl From<SpectraError> for ApiError {
    fn from(err: SpectraError) -> Self {
        let status = match &err {
            SpectraError::NotFound(_) => StatusCode::NOT_FOUND,
            SpectraError::InvalidFormat(_) | SpectraError::UnknownFamily(_) | SpectraError::InvalidState(_) => {
                StatusCode::BAD_REQUEST
            }
            SpectraError::Io { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self { status, detail: err.to_string() }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "detail": self.detail }))).into_response()
    }
}

type SharedService = Arc<CaptureService>;
type ApiResult<T> = std::result::Result<Json<T>, ApiError>;

#[derive(Debug, Deserialize)]
struct LoadRequest {
    filepath: String,
}

async fn index(State(service): State<SharedService>) -> Json<ApiIndex> {
    Json(service.index())
}

async fn models(State(service): State<SharedService>) -> Json<ModelsResponse> {
    Json(service.models())
}

async fn files(State(service): State<SharedService>) -> ApiResult<FileListing> {
    Ok(Json(service.list_files()?))
}

async fn load(State(service): State<SharedService>, Json(request): Json<LoadRequest>) -> ApiResult<LoadSummary> {
    Ok(Json(service.load(&request.filepath)?))
}

async fn status(State(service): State<SharedService>) -> Json<Status> {
    Json(service.status())
}

async fn analyze(State(service): State<SharedService>, Json(request): Json<AnalyzeRequest>) -> ApiResult<AnalyzeResponse> {
    Ok(Json(service.analyze(&request).inspect_err(|err| warn!("Rejected analyze request: {err}"))?))
}

async fn tensor_grid(
    State(service): State<SharedService>,
    Json(request): Json<TensorGridRequest>,
) -> ApiResult<TensorGridResponse> {
    Ok(Json(service.tensor_grid(&request).inspect_err(|err| warn!("Rejected tensor grid request: {err}"))?))
}

/// Stores the first multipart field that carries a file name.
async fn upload(State(service): State<SharedService>, mut multipart: Multipart) -> ApiResult<UploadResponse> {
    while let Some(field) = multipart.next_field().await.map_err(|err| ApiError::bad_request(err.to_string()))? {
        let Some(filename) = field.file_name().map(str::to_string) else {
            continue;
        };
        let contents = field.bytes().await.map_err(|err| ApiError::bad_request(err.to_string()))?;
        return Ok(Json(service.upload(&filename, &contents)?));
    }
    Err(ApiError::bad_request("No file in upload"))
}

async fn colors(State(service): State<SharedService>) -> Json<ColorsResponse> {
    Json(service.colors())
}

async fn flows(State(service): State<SharedService>) -> Json<FlowsResponse> {
    Json(service.flows())
}

pub fn router(service: SharedService, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/api/models", get(models))
        .route("/api/files", get(files))
        .route("/api/load", post(load))
        .route("/api/status", get(status))
        .route("/api/analyze", post(analyze))
        .route("/api/tensor-grid", post(tensor_grid))
        .route("/api/upload", post(upload))
        .route("/api/colors", get(colors))
        .route("/api/flows", get(flows))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .with_state(service)
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for Ctrl+C, shut down by terminating the process: {err}");
        std::future::pending::<()>().await;
    }
}

/// Serves the query API until Ctrl+C.
pub fn run_server(config: ServerConfig) -> Result<()> {
    let runtime = tokio::runtime::Runtime::new().context("Failed to create runtime")?;
    let service = Arc::new(CaptureService::new(config.data_dir.clone()));

    runtime.block_on(async move {
        let bind_addr = config.bind_addr();
        let listener = tokio::net::TcpListener::bind(&bind_addr)
            .await
            .with_context(|| format!("Failed to bind {bind_addr}"))?;

        info!("🚀 Spectra API listening on http://{bind_addr}");
        info!("📁 Data directory: {}", config.data_dir.display());

        axum::serve(listener, router(service, config.max_upload_bytes))
            .with_graceful_shutdown(shutdown_signal())
            .await
            .context("Server error")?;

        info!("Server stopped");
        Ok(())
    })
}
