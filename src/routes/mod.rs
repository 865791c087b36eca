use axum::{
    http::StatusCode,
    middleware,
    response::Json,
    routing::{get, post},
    Router,
};
use serde::Serialize;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tower_sessions::{MemoryStore, SessionManagerLayer};

use crate::handlers;
use crate::middleware::auth_layer;
use crate::state::AppState;

pub mod health;

/// API response wrapper
#[derive(Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub code: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            code: true,
            message: "success".to_string(),
            data: Some(data),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            code: false,
            message: message.into(),
            data: None,
        }
    }
}

impl ApiResponse<()> {
    pub fn success_msg(message: impl Into<String>) -> Self {
        Self {
            code: true,
            message: message.into(),
            data: None,
        }
    }
}

/// Create the main router
pub fn create_router(state: AppState) -> Router {
    // Session store (in-memory for now)
    let session_store = MemoryStore::default();
    let session_layer = SessionManagerLayer::new(session_store)
        .with_secure(false) // Set to true in production with HTTPS
        .with_http_only(true);

    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // API routes
    let api_routes = Router::new()
        // Health check
        .route("/health", get(health::health_check))
        // Auth routes
        .route("/login", post(handlers::auth::login))
        .route("/logout", post(handlers::auth::logout))
        .route("/user/current", get(handlers::auth::current_user))
        // Department routes
        .route("/department/add", post(handlers::department::add_department))
        .route("/department/update", post(handlers::department::update_department))
        .route("/department/delete", post(handlers::department::delete_department))
        .route("/department/query", get(handlers::department::get_departments))
        // Room routes
        .route("/room/add", post(handlers::room::add_room))
        .route("/room/update", post(handlers::room::update_room))
        .route("/room/delete", post(handlers::room::delete_room))
        .route("/room/query", get(handlers::room::get_rooms))
        .route("/room/groups/add", post(handlers::room::add_groups_to_room))
        .route("/room/groups/delete", post(handlers::room::delete_groups_from_room))
        // Group routes
        .route("/group/add", post(handlers::group::add_group))
        .route("/group/delete", post(handlers::group::delete_group))
        .route("/group/query", get(handlers::group::get_groups))
        .route("/group/addUsers", post(handlers::group::add_users_to_group))
        .route("/group/deleteUsers", post(handlers::group::delete_users_from_group))
        .route("/group/query/users", get(handlers::group::get_group_users))
        // User routes
        .route("/user/add", post(handlers::user::add_user))
        .route("/user/update", post(handlers::user::update_user))
        .route("/user/delete", post(handlers::user::delete_user))
        .route("/user/query", get(handlers::user::get_users_by_room))
        .route("/user/info", get(handlers::user::get_user_by_username))
        .route("/user/enable", post(handlers::user::enable_user))
        .route("/user/disable", post(handlers::user::disable_user))
        .route("/user/change-password", post(handlers::user::change_password))
        // Permission routes
        .route("/permission/catalog", get(handlers::permission::get_catalog))
        .route("/permission/content-types", get(handlers::permission::get_content_types))
        .route("/permission/grant", post(handlers::permission::grant_permission))
        .route("/permission/revoke", post(handlers::permission::revoke_permission))
        .route("/permission/check", post(handlers::permission::check_permission))
        .route("/permission/all", get(handlers::permission::get_effective_permissions))
        .route("/permission/matrix", get(handlers::permission::get_permission_matrix))
        // Menu routes
        .route("/menu/query", get(handlers::menu::get_menu));

    Router::new()
        .nest("/api", api_routes)
        .fallback(fallback)
        .layer(middleware::from_fn_with_state(state.clone(), auth_layer))
        .layer(session_layer)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Fallback handler for 404
pub async fn fallback() -> (StatusCode, Json<ApiResponse<()>>) {
    (
        StatusCode::NOT_FOUND,
        Json(ApiResponse::error("Not Found")),
    )
}
