//! Authentication handlers
//!
//! Implements login, logout, and current user endpoints

use axum::{
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set};
use serde::Deserialize;
use tower_sessions::Session;

use crate::entity::user;
use crate::middleware::auth::{CurrentUser, SESSION_TIMESTAMP_KEY, SESSION_USER_KEY};
use crate::middleware::DbConn;
use crate::routes::ApiResponse;

/// Login request body
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// POST /api/login
pub async fn login(
    Extension(db): Extension<DbConn>,
    session: Session,
    Json(req): Json<LoginRequest>,
) -> (StatusCode, Json<serde_json::Value>) {
    // Validate input
    if req.username.is_empty() || req.password.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({"error": "bad request"})),
        );
    }

    // Find user in database
    let db = &*db;
    let user_result = user::Entity::find()
        .filter(user::Column::Username.eq(&req.username))
        .one(db)
        .await;

    let db_user = match user_result {
        Ok(Some(user)) => user,
        Ok(None) => {
            tracing::warn!("Login failed: user not found - {}", req.username);
            return (
                StatusCode::BAD_REQUEST,
                Json(serde_json::json!({"error": "username or password error"})),
            );
        }
        Err(e) => {
            tracing::error!("Database error during login: {}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({"error": "internal error"})),
            );
        }
    };

    // Verify password using bcrypt
    let password_valid = bcrypt::verify(&req.password, &db_user.password).unwrap_or(false);
    if !password_valid {
        tracing::warn!("Login failed: wrong password - {}", req.username);
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({"error": "username or password error"})),
        );
    }

    // Inactive users cannot log in
    if !db_user.is_active {
        tracing::warn!("Login failed: user disabled - {}", req.username);
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({"error": "user is disabled"})),
        );
    }

    // Update last login time
    let now = chrono::Utc::now().timestamp();
    let mut active_model: user::ActiveModel = db_user.into();
    active_model.last_login = Set(now);
    if let Err(e) = active_model.update(db).await {
        tracing::error!("Failed to update last login: {}", e);
    }

    // Save session
    if let Err(e) = session.insert(SESSION_USER_KEY, &req.username).await {
        tracing::error!("Failed to save session: {}", e);
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({"error": "internal error"})),
        );
    }
    if let Err(e) = session.insert(SESSION_TIMESTAMP_KEY, now).await {
        tracing::error!("Failed to save session timestamp: {}", e);
    }

    tracing::info!("User logged in: {}", req.username);

    (
        StatusCode::OK,
        Json(serde_json::json!({"message": "login success"})),
    )
}

/// POST /api/logout
pub async fn logout(
    session: Session,
    Extension(current_user): Extension<CurrentUser>,
) -> impl IntoResponse {
    let username = current_user.username.clone();

    if let Err(e) = session.flush().await {
        tracing::error!("Failed to flush session: {}", e);
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ApiResponse::<()>::error("internal error")),
        );
    }

    tracing::info!("User logged out: {}", username);

    (
        StatusCode::OK,
        Json(ApiResponse::success_msg("logout success")),
    )
}

/// GET /api/user/current
pub async fn current_user(
    Extension(user): Extension<CurrentUser>,
) -> Json<ApiResponse<user::UserResponse>> {
    Json(ApiResponse::success(user.0.into()))
}
