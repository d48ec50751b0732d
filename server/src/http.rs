use std::{
    net::{IpAddr, SocketAddr},
    sync::Arc,
};

use anyhow::Context;
use axum::{
    Json, Router, ServiceExt,
    extract::{Query, Request, State},
    http::{self, HeaderName, HeaderValue, Method, Uri},
    response::IntoResponse,
    routing::{delete, get, post, put},
};
use platform_api::{ApiError, ApiResult};
use platform_db::DbPool;
use products_hr::{EmployeeService, EmployeeUpdate, EmployeeView, HrError, NewEmployee};
use serde::{Deserialize, Serialize};
use tower::{Layer, ServiceBuilder, util::MapRequestLayer};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::info;

use crate::config::AppConfig;

const CREATED_MESSAGE: &str = "Empleado agregado exitosamente.";
const UPDATED_MESSAGE: &str = "Empleado actualizado exitosamente.";
const DELETED_MESSAGE: &str = "Empleado eliminado exitosamente.";

#[derive(Clone)]
pub struct AppState {
    pub pool: DbPool,
    pub employees: EmployeeService,
    pub config: Arc<AppConfig>,
}

impl AppState {
    pub fn new(pool: DbPool, config: Arc<AppConfig>) -> Self {
        let employees =
            EmployeeService::new(pool.clone()).with_update_policy(config.update_policy);
        Self {
            pool,
            employees,
            config,
        }
    }
}

#[derive(Clone, Debug)]
pub struct ServeConfig {
    addr: SocketAddr,
}

impl ServeConfig {
    pub fn new(host: IpAddr, port: u16) -> Self {
        Self {
            addr: SocketAddr::from((host, port)),
        }
    }
}

/// Router wrapped so paths are normalized before routing.
pub type App = tower::util::MapRequest<Router, fn(Request) -> Request>;

pub async fn serve(config: ServeConfig, state: AppState) -> anyhow::Result<()> {
    let app = build_app(state);
    let listener = tokio::net::TcpListener::bind(config.addr)
        .await
        .with_context(|| format!("failed to bind {}", config.addr))?;

    info!(%config.addr, "employee server listening");
    axum::serve(listener, ServiceExt::<Request>::into_make_service(app))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;
    Ok(())
}

pub fn build_app(state: AppState) -> App {
    let normalize: fn(Request) -> Request = normalize_request_path;
    MapRequestLayer::new(normalize).layer(build_router(state))
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let allowed = origins
        .iter()
        .filter_map(|origin| origin.parse::<HeaderValue>().ok())
        .collect::<Vec<_>>();
    let allow_origin = if allowed.is_empty() {
        AllowOrigin::any()
    } else {
        AllowOrigin::list(allowed)
    };
    CorsLayer::new()
        .allow_headers([http::header::CONTENT_TYPE])
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_origin(allow_origin)
}

pub fn build_router(state: AppState) -> Router {
    let request_id = MakeRequestUuid;
    let header_name = HeaderName::from_static("x-request-id");
    Router::new()
        .route("/health", get(health_handler))
        .route("/api/employee/getall", get(list_handler))
        .route("/api/employee/getbyid", get(get_by_id_handler))
        .route("/api/employee/create", post(create_handler))
        .route("/api/employee/update", put(update_handler))
        .route("/api/employee/delete", delete(delete_handler))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(header_name.clone(), request_id))
                .layer(PropagateRequestIdLayer::new(header_name))
                .layer(TraceLayer::new_for_http())
                .layer(cors_layer(&state.config.cors_allowed_origins)),
        )
        .with_state(state)
}

/// Lower-cases the path and drops trailing slashes; the query is untouched.
fn normalize_request_path(mut request: Request) -> Request {
    let path = request.uri().path();
    let trimmed = path.trim_end_matches('/');
    let normalized = if trimmed.is_empty() {
        "/".to_string()
    } else {
        trimmed.to_ascii_lowercase()
    };
    if normalized == path {
        return request;
    }
    let rebuilt = match request.uri().query() {
        Some(query) => format!("{normalized}?{query}"),
        None => normalized,
    };
    if let Ok(uri) = rebuilt.parse::<Uri>() {
        *request.uri_mut() = uri;
    }
    request
}

#[derive(Deserialize)]
struct IdQuery {
    id: i32,
}

async fn list_handler(State(state): State<AppState>) -> ApiResult<Json<Vec<EmployeeView>>> {
    let employees = state.employees.list().await.map_err(api_error)?;
    Ok(Json(employees))
}

async fn get_by_id_handler(
    State(state): State<AppState>,
    Query(query): Query<IdQuery>,
) -> ApiResult<Json<EmployeeView>> {
    state
        .employees
        .get_by_id(query.id)
        .await
        .map_err(api_error)?
        .map(Json)
        .ok_or_else(|| api_error(HrError::NotFound))
}

async fn create_handler(
    State(state): State<AppState>,
    Json(input): Json<NewEmployee>,
) -> ApiResult<&'static str> {
    state.employees.create(input).await.map_err(api_error)?;
    Ok(CREATED_MESSAGE)
}

async fn update_handler(
    State(state): State<AppState>,
    Json(input): Json<EmployeeUpdate>,
) -> ApiResult<&'static str> {
    state.employees.update(input).await.map_err(api_error)?;
    Ok(UPDATED_MESSAGE)
}

async fn delete_handler(
    State(state): State<AppState>,
    Query(query): Query<IdQuery>,
) -> ApiResult<&'static str> {
    state.employees.delete(query.id).await.map_err(api_error)?;
    Ok(DELETED_MESSAGE)
}

async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let db_ok = state.pool.ping().await.is_ok();
    Json(HealthResponse {
        ok: db_ok,
        db_ok,
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HealthResponse {
    ok: bool,
    db_ok: bool,
    version: &'static str,
}

fn api_error(err: HrError) -> ApiError {
    let message = err.to_string();
    match err {
        HrError::Rejected(_) => ApiError::InvalidInput(message),
        HrError::NotFound => ApiError::NotFound(message),
        HrError::IdTaken(_) => ApiError::Conflict(message),
        HrError::Database(db) => ApiError::internal(anyhow::Error::new(db)),
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %err, "failed to listen for CTRL+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                tracing::warn!(error = %err, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    ctrl_c.await;

    #[cfg(unix)]
    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{StatusCode, header},
        response::Response,
    };
    use http_body_util::BodyExt;
    use migration::{Migrator, MigratorTrait};
    use platform_db::DatabaseSettings;
    use products_hr::UpdatePolicy;
    use serde_json::{Value, json};
    use tower::ServiceExt as _;

    const CREATE: &str = "/api/employee/create";
    const UPDATE: &str = "/api/employee/update";

    async fn delete_at(app: &App, uri: &str) -> Response {
        send(app, bare_request(Method::DELETE, uri)).await
    }

    async fn test_app() -> App {
        let database = DatabaseSettings::new("sqlite::memory:").with_max_connections(1);
        let pool = platform_db::connect(&database).await.unwrap();
        Migrator::up(&pool, None).await.unwrap();
        let config = Arc::new(AppConfig {
            database,
            cors_allowed_origins: vec!["http://localhost:4200".into()],
            update_policy: UpdatePolicy::Strict,
        });
        build_app(AppState::new(pool, config))
    }

    async fn send(app: &App, request: Request) -> Response {
        app.clone().oneshot(request).await.unwrap()
    }

    fn json_request(method: Method, uri: &str, body: Value) -> Request {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn bare_request(method: Method, uri: &str) -> Request {
        Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap()
    }

    async fn post_json(app: &App, uri: &str, body: Value) -> Response {
        send(app, json_request(Method::POST, uri, body)).await
    }

    async fn put_json(app: &App, uri: &str, body: Value) -> Response {
        send(app, json_request(Method::PUT, uri, body)).await
    }

    async fn get(app: &App, uri: &str) -> Response {
        send(app, bare_request(Method::GET, uri)).await
    }

    async fn body_json(response: Response) -> Value {
        serde_json::from_str(&body_text(response).await).unwrap()
    }

    async fn body_text(response: Response) -> String {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[test]
    fn paths_are_lowercased_and_trimmed() {
        let request =
            normalize_request_path(bare_request(Method::DELETE, "/api/employee/Delete/?id=3"));
        assert_eq!(request.uri().path(), "/api/employee/delete");
        assert_eq!(request.uri().query(), Some("id=3"));

        let root = normalize_request_path(bare_request(Method::GET, "/"));
        assert_eq!(root.uri().path(), "/");
    }

    #[tokio::test]
    async fn create_and_fetch_flow() {
        let app = test_app().await;

        let response = post_json(&app, CREATE, json!({"id": 0, "name": "Juan"})).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, CREATED_MESSAGE);

        let response = post_json(&app, CREATE, json!({"name": "Juan"})).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_text(response).await, "El nombre del empleado ya está registrado.");

        let response = get(&app, "/api/employee/getall").await;
        assert_eq!(response.status(), StatusCode::OK);
        let list: Value = body_json(response).await;
        let list = list.as_array().unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0]["name"], "Juan");
        assert!(list[0]["createdDate"].is_string());

        let id = list[0]["id"].as_i64().unwrap();
        let response = get(&app, &format!("/api/employee/GetById/?id={id}")).await;
        assert_eq!(response.status(), StatusCode::OK);
        let one: Value = body_json(response).await;
        assert_eq!(one["name"], "Juan");
    }

    #[tokio::test]
    async fn rejections_surface_as_bad_request() {
        let app = test_app().await;
        let cases = [
            ("NombreLargo", "El nombre no puede superar los 10 caracteres."),
            ("A", "El nombre debe tener al menos 2 caracteres."),
            ("Juan123", "El nombre no puede contener números."),
            ("Juuuannnn", "El nombre contiene caracteres repetidos de forma excesiva."),
            ("", "El nombre es obligatorio."),
        ];
        for (name, message) in cases {
            let response = post_json(&app, CREATE, json!({"name": name})).await;
            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{name}");
            assert_eq!(body_text(response).await, message);
        }
    }

    #[tokio::test]
    async fn missing_records_are_not_found() {
        let app = test_app().await;

        let response = get(&app, "/api/employee/getbyid?id=99").await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = put_json(&app, UPDATE, json!({"id": 99, "name": "Nadie"})).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_text(response).await, "Empleado no encontrado.");

        let response = delete_at(&app, "/api/employee/delete?id=99").await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn update_then_delete() {
        let app = test_app().await;
        post_json(&app, CREATE, json!({"id": 5, "name": "Old Name"})).await;

        let response = put_json(&app, UPDATE, json!({"id": 5, "name": "New Name"})).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, UPDATED_MESSAGE);

        let response = get(&app, "/api/employee/getbyid?id=5").await;
        let one: Value = body_json(response).await;
        assert_eq!(one["name"], "New Name");

        let response = delete_at(&app, "/api/employee/Delete/?id=5").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, DELETED_MESSAGE);

        let response = get(&app, "/api/employee/getbyid?id=5").await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn reused_id_is_a_conflict() {
        let app = test_app().await;
        post_json(&app, CREATE, json!({"id": 3, "name": "Ignacio"})).await;
        let response = post_json(&app, CREATE, json!({"id": 3, "name": "Lucia"})).await;
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn health_reports_database() {
        let app = test_app().await;
        let response = get(&app, "/health").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key("x-request-id"));
        let health: Value = body_json(response).await;
        assert_eq!(health["dbOk"], true);
    }
}
