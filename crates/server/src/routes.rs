use std::sync::Arc;

use axum::{
    routing::{get, put},
    Json, Router,
};
use tower_http::{
    cors::CorsLayer,
    trace::{TraceLayer, DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, DefaultOnFailure},
};
use tracing::Level;
use utoipa::OpenApi;

use common::types::{Health, ServiceDescriptor};
use service::accounts::AccountStore;

use crate::openapi::ApiDoc;

pub mod accounts;

/// Shared handler state. Handlers keep nothing between requests; the store
/// handle is the only thing they share.
#[derive(Clone)]
pub struct AppState {
    pub accounts: Arc<AccountStore>,
}

impl AppState {
    pub fn new(accounts: AccountStore) -> Self {
        Self { accounts: Arc::new(accounts) }
    }
}

#[utoipa::path(get, path = "/", tag = "service", responses((status = 200, description = "Service descriptor", body = crate::openapi::ServiceDescriptorDoc)))]
pub async fn index() -> Json<ServiceDescriptor> {
    Json(ServiceDescriptor::current())
}

#[utoipa::path(get, path = "/health", tag = "service", responses((status = 200, description = "OK", body = crate::openapi::HealthResponse)))]
pub async fn health() -> Json<Health> {
    Json(Health { status: "ok" })
}

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

/// Build the full application router.
pub fn build_router(state: AppState, cors: CorsLayer) -> Router {
    let service_routes = Router::new()
        .route("/", get(index))
        .route("/health", get(health))
        .route("/api-docs/openapi.json", get(openapi_json));

    let account_routes = Router::new()
        .route("/accounts", get(accounts::list).post(accounts::create))
        .route(
            "/accounts/:id",
            get(accounts::get).put(accounts::update).delete(accounts::delete),
        )
        .route("/accounts/:id/deactivate", put(accounts::deactivate));

    service_routes
        .merge(account_routes)
        .with_state(state)
        .layer(cors)
        .layer(
            TraceLayer::new_for_http()
                // 每次请求创建 span，包含方法和路径等
                .make_span_with(
                    DefaultMakeSpan::new()
                        .level(Level::INFO)
                        .include_headers(false),
                )
                .on_request(
                    DefaultOnRequest::new()
                        .level(Level::INFO),
                )
                // 响应返回时打点，包含状态码与耗时
                .on_response(
                    DefaultOnResponse::new()
                        .level(Level::INFO)
                        .include_headers(false),
                )
                .on_failure(
                    DefaultOnFailure::new()
                        .level(Level::ERROR),
                )
        )
}
