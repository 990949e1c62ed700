//! HTTP server for the registry
//!
//! Confluent-compatible REST surface over [`SchemaRegistry`]. Transport
//! only: every handler parses the request, calls the registry and maps
//! [`RegistryError`] onto the wire error codes.

use crate::error::{error_codes, RegistryError};
use crate::registry::SchemaRegistry;
use crate::types::{SchemaId, SchemaReference, SchemaType, SchemaVersion};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8081,
        }
    }
}

/// Shared server state
pub struct ServerState {
    pub registry: SchemaRegistry,
}

/// Schema registry HTTP server
pub struct SchemaServer {
    state: Arc<ServerState>,
    #[allow(dead_code)]
    config: ServerConfig,
}

impl SchemaServer {
    /// Create a new server around a registry
    pub fn new(registry: SchemaRegistry, config: ServerConfig) -> Self {
        Self {
            state: Arc::new(ServerState { registry }),
            config,
        }
    }

    /// Build the Axum router
    pub fn router(&self) -> Router {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);

        Router::new()
            // Root / health
            .route("/", get(root_handler))
            .route("/health", get(health_handler))
            .route("/health/live", get(health_handler))
            .route("/health/ready", get(health_handler))
            // Schemas
            .route("/schemas/ids/:id", get(get_schema_by_id))
            // Subjects
            .route("/subjects", get(list_subjects))
            .route("/subjects/:subject", post(lookup_schema))
            .route("/subjects/:subject", delete(delete_subject))
            .route("/subjects/:subject/versions", get(list_subject_versions))
            .route("/subjects/:subject/versions", post(register_schema))
            .route(
                "/subjects/:subject/versions/:version",
                get(get_subject_version),
            )
            .route(
                "/subjects/:subject/versions/:version",
                delete(delete_version),
            )
            .route(
                "/subjects/:subject/versions/:version/referencedby",
                get(get_referenced_by),
            )
            // Statistics
            .route("/stats", get(get_stats))
            .with_state(self.state.clone())
            .layer(cors)
            .layer(TraceLayer::new_for_http())
    }

    /// Run the server
    pub async fn run(self, addr: SocketAddr) -> anyhow::Result<()> {
        let router = self.router();
        let listener = tokio::net::TcpListener::bind(addr).await?;
        info!("schema registry listening on {}", addr);
        axum::serve(listener, router).await?;
        Ok(())
    }
}

// ============================================================================
// Error mapping
// ============================================================================

type ApiError = (StatusCode, Json<ErrorResponse>);

fn error_response(e: RegistryError) -> ApiError {
    let status = match e.http_status() {
        404 => StatusCode::NOT_FOUND,
        409 => StatusCode::CONFLICT,
        422 => StatusCode::UNPROCESSABLE_ENTITY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (
        status,
        Json(ErrorResponse {
            error_code: e.error_code(),
            message: e.to_string(),
        }),
    )
}

fn invalid_version_response(raw: &str) -> ApiError {
    (
        StatusCode::UNPROCESSABLE_ENTITY,
        Json(ErrorResponse {
            error_code: error_codes::INVALID_VERSION,
            message: format!("Invalid version: {}", raw),
        }),
    )
}

// ============================================================================
// Request/Response types
// ============================================================================

#[derive(Serialize)]
struct RootResponse {
    name: &'static str,
    version: &'static str,
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
}

#[derive(Serialize)]
struct ErrorResponse {
    error_code: u32,
    message: String,
}

#[derive(Deserialize)]
struct RegisterSchemaRequest {
    schema: String,
    #[serde(rename = "schemaType", default)]
    schema_type: Option<String>,
    #[serde(default)]
    references: Vec<SchemaReferencePayload>,
}

#[derive(Deserialize, Serialize, Clone)]
struct SchemaReferencePayload {
    name: String,
    subject: String,
    version: u32,
}

impl From<SchemaReferencePayload> for SchemaReference {
    fn from(p: SchemaReferencePayload) -> Self {
        SchemaReference::new(p.name, p.subject, p.version)
    }
}

impl From<SchemaReference> for SchemaReferencePayload {
    fn from(r: SchemaReference) -> Self {
        Self {
            name: r.name,
            subject: r.subject,
            version: r.version,
        }
    }
}

#[derive(Serialize)]
struct RegisterSchemaResponse {
    id: u32,
}

#[derive(Serialize)]
struct SchemaResponse {
    schema: String,
    #[serde(rename = "schemaType")]
    schema_type: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    references: Vec<SchemaReferencePayload>,
}

#[derive(Serialize)]
struct SubjectVersionResponse {
    subject: String,
    version: u32,
    id: u32,
    schema: String,
    #[serde(rename = "schemaType")]
    schema_type: String,
}

#[derive(Deserialize)]
struct LookupParams {
    #[serde(default)]
    normalize: bool,
}

#[derive(Deserialize)]
struct DeleteParams {
    #[serde(default)]
    permanent: bool,
}

#[derive(Serialize)]
struct StatsResponse {
    subjects: usize,
    versions: usize,
}

fn parse_schema_type(raw: &Option<String>) -> Result<SchemaType, ApiError> {
    match raw {
        None => Ok(SchemaType::default()),
        Some(s) => s.parse::<SchemaType>().map_err(|_| {
            (
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(ErrorResponse {
                    error_code: error_codes::INVALID_SCHEMA,
                    message: format!("Invalid schema type: {}", s),
                }),
            )
        }),
    }
}

// ============================================================================
// Handlers
// ============================================================================

async fn root_handler() -> Json<RootResponse> {
    Json(RootResponse {
        name: env!("CARGO_PKG_NAME"),
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

async fn register_schema(
    State(state): State<Arc<ServerState>>,
    Path(subject): Path<String>,
    Json(req): Json<RegisterSchemaRequest>,
) -> Result<Json<RegisterSchemaResponse>, ApiError> {
    let schema_type = parse_schema_type(&req.schema_type)?;
    let references: Vec<SchemaReference> =
        req.references.into_iter().map(Into::into).collect();

    let id = state
        .registry
        .register_with_references(subject, schema_type, &req.schema, references)
        .await
        .map_err(error_response)?;

    Ok(Json(RegisterSchemaResponse { id: id.as_u32() }))
}

async fn lookup_schema(
    State(state): State<Arc<ServerState>>,
    Path(subject): Path<String>,
    Query(params): Query<LookupParams>,
    Json(req): Json<RegisterSchemaRequest>,
) -> Result<Json<SubjectVersionResponse>, ApiError> {
    let schema_type = parse_schema_type(&req.schema_type)?;
    let references: Vec<SchemaReference> =
        req.references.into_iter().map(Into::into).collect();

    let sv = state
        .registry
        .lookup(
            subject,
            schema_type,
            &req.schema,
            &references,
            params.normalize,
        )
        .await
        .map_err(error_response)?;

    Ok(Json(SubjectVersionResponse {
        subject: sv.subject.to_string(),
        version: sv.version.as_u32(),
        id: sv.id.as_u32(),
        schema: sv.schema,
        schema_type: sv.schema_type.to_string(),
    }))
}

async fn get_schema_by_id(
    State(state): State<Arc<ServerState>>,
    Path(id): Path<u32>,
) -> Result<Json<SchemaResponse>, ApiError> {
    let schema = state
        .registry
        .get_by_id(SchemaId::new(id))
        .await
        .map_err(error_response)?;

    Ok(Json(SchemaResponse {
        schema: schema.schema,
        schema_type: schema.schema_type.to_string(),
        references: schema.references.into_iter().map(Into::into).collect(),
    }))
}

async fn list_subjects(
    State(state): State<Arc<ServerState>>,
) -> Result<Json<Vec<String>>, ApiError> {
    let subjects = state
        .registry
        .list_subjects()
        .await
        .map_err(error_response)?;
    Ok(Json(subjects.into_iter().map(|s| s.0).collect()))
}

async fn list_subject_versions(
    State(state): State<Arc<ServerState>>,
    Path(subject): Path<String>,
) -> Result<Json<Vec<u32>>, ApiError> {
    let versions = state
        .registry
        .list_versions(subject)
        .await
        .map_err(error_response)?;
    Ok(Json(versions))
}

async fn get_subject_version(
    State(state): State<Arc<ServerState>>,
    Path((subject, version)): Path<(String, String)>,
) -> Result<Json<SubjectVersionResponse>, ApiError> {
    let sv = if version == "latest" {
        state.registry.get_latest(subject).await
    } else {
        let v: u32 = version
            .parse()
            .map_err(|_| invalid_version_response(&version))?;
        state
            .registry
            .get_by_version(subject, SchemaVersion::new(v))
            .await
    }
    .map_err(error_response)?;

    Ok(Json(SubjectVersionResponse {
        subject: sv.subject.to_string(),
        version: sv.version.as_u32(),
        id: sv.id.as_u32(),
        schema: sv.schema,
        schema_type: sv.schema_type.to_string(),
    }))
}

async fn get_referenced_by(
    State(state): State<Arc<ServerState>>,
    Path((subject, version)): Path<(String, u32)>,
) -> Result<Json<Vec<u32>>, ApiError> {
    let ids = state
        .registry
        .get_schemas_referencing(subject, SchemaVersion::new(version))
        .await
        .map_err(error_response)?;
    Ok(Json(ids.into_iter().map(|id| id.as_u32()).collect()))
}

async fn delete_subject(
    State(state): State<Arc<ServerState>>,
    Path(subject): Path<String>,
    Query(params): Query<DeleteParams>,
) -> Result<Json<Vec<u32>>, ApiError> {
    let deleted = state
        .registry
        .delete_subject(subject, params.permanent)
        .await
        .map_err(error_response)?;
    Ok(Json(deleted))
}

async fn delete_version(
    State(state): State<Arc<ServerState>>,
    Path((subject, version)): Path<(String, String)>,
    Query(params): Query<DeleteParams>,
) -> Result<Json<u32>, ApiError> {
    let v: u32 = version
        .parse()
        .map_err(|_| invalid_version_response(&version))?;
    state
        .registry
        .delete_version(subject, SchemaVersion::new(v), params.permanent)
        .await
        .map_err(error_response)?;
    Ok(Json(v))
}

async fn get_stats(
    State(state): State<Arc<ServerState>>,
) -> Result<Json<StatsResponse>, ApiError> {
    let stats = state.registry.stats().await.map_err(error_response)?;
    Ok(Json(StatsResponse {
        subjects: stats.subject_count,
        versions: stats.version_count,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RegistryConfig;

    #[tokio::test]
    async fn test_router_builds() {
        let registry = SchemaRegistry::new(RegistryConfig::memory()).await.unwrap();
        let server = SchemaServer::new(registry, ServerConfig::default());
        let _router = server.router();
    }

    #[test]
    fn test_register_request_parses_confluent_shape() {
        let body = r#"{
            "schema": "syntax = \"proto3\";",
            "schemaType": "PROTOBUF",
            "references": [
                {"name": "ref.proto", "subject": "reference", "version": 1}
            ]
        }"#;
        let req: RegisterSchemaRequest = serde_json::from_str(body).unwrap();
        assert_eq!(req.schema_type.as_deref(), Some("PROTOBUF"));
        assert_eq!(req.references.len(), 1);
        assert_eq!(req.references[0].name, "ref.proto");
    }

    #[test]
    fn test_register_request_defaults() {
        let body = r#"{"schema": "{}"}"#;
        let req: RegisterSchemaRequest = serde_json::from_str(body).unwrap();
        assert!(req.schema_type.is_none());
        assert!(req.references.is_empty());
    }
}
