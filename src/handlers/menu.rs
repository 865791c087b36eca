//! Menu handlers
//!
//! 返回当前用户的导航能力列表

use axum::{response::Json, Extension};

use crate::error::AppResult;
use crate::middleware::auth::CurrentUser;
use crate::middleware::DbConn;
use crate::permission::{menu, PermissionResolver};
use crate::routes::ApiResponse;

/// GET /api/menu/query
pub async fn get_menu(
    Extension(db): Extension<DbConn>,
    Extension(current_user): Extension<CurrentUser>,
    Extension(resolver): Extension<PermissionResolver>,
) -> AppResult<Json<ApiResponse<Vec<String>>>> {
    let tokens = menu::build_menu(&db, &resolver, &current_user).await?;
    Ok(Json(ApiResponse::success(tokens)))
}
