//! Authentication middleware
//!
//! Provides session-based authentication for API routes

use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};
use serde_json::json;
use std::ops::Deref;
use tower_sessions::Session;

use crate::entity::user;
use crate::permission::PermissionResolver;
use crate::state::AppState;

/// Session key for storing username
pub const SESSION_USER_KEY: &str = "user";
pub const SESSION_TIMESTAMP_KEY: &str = "timestamp";

/// Database connection wrapper for use in handlers via Extension
#[derive(Clone)]
pub struct DbConn(pub DatabaseConnection);

impl Deref for DbConn {
    type Target = DatabaseConnection;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// Extension holding the authenticated user's loaded record. Handlers and
/// the resolver see this instance as a snapshot for the whole request.
#[derive(Clone, Debug)]
pub struct CurrentUser(pub user::Model);

impl Deref for CurrentUser {
    type Target = user::Model;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// Paths that don't require authentication
fn is_public_path(path: &str) -> bool {
    path == "/api/login" || path == "/api/health"
}

/// Authentication middleware
///
/// 校验会话, 加载用户, 并注入 DbConn / CurrentUser / 本次请求专用的
/// PermissionResolver (权限缓存随请求结束丢弃)
pub async fn auth_layer(
    State(state): State<AppState>,
    session: Session,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let path = request.uri().path().to_string();

    // All handlers access the database via Extension<DbConn>
    request.extensions_mut().insert(DbConn(state.db.clone()));

    // Skip auth for public paths
    if is_public_path(&path) {
        return next.run(request).await;
    }

    // Get username from session
    let username: Option<String> = session.get(SESSION_USER_KEY).await.unwrap_or(None);

    let Some(username) = username else {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({"error": "unauthorized"})),
        ).into_response();
    };

    // Look up user in database
    let user_result = user::Entity::find()
        .filter(user::Column::Username.eq(&username))
        .one(&state.db)
        .await;

    match user_result {
        Ok(Some(user_model)) => {
            request.extensions_mut().insert(CurrentUser(user_model));
            request
                .extensions_mut()
                .insert(PermissionResolver::new(state.db.clone()));

            next.run(request).await
        }
        Ok(None) => {
            tracing::warn!("User not found in database: {}", username);
            (
                StatusCode::UNAUTHORIZED,
                Json(json!({"error": "invalid_session"})),
            ).into_response()
        }
        Err(e) => {
            tracing::error!("Database error during auth: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": "internal error"})),
            ).into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_paths() {
        assert!(is_public_path("/api/login"));
        assert!(is_public_path("/api/health"));
        assert!(!is_public_path("/api/logout"));
        assert!(!is_public_path("/api/user/current"));
        assert!(!is_public_path("/api/permission/check"));
    }
}
