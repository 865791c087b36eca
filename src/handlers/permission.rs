//! Permission handlers
//!
//! Catalog listing, grant/revoke at any scope, and the permission check,
//! effective-set, and matrix endpoints for the current user.

use std::collections::{BTreeMap, HashMap};

use axum::{
    response::Json,
    Extension,
};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};

use crate::entity::{
    content_type, department, department_permission, group, group_permission, permission, room,
    room_permission, user, user_permission,
};
use crate::error::{AppError, AppResult, OptionExt};
use crate::middleware::auth::CurrentUser;
use crate::middleware::DbConn;
use crate::permission::{Action, ActionFlags, PermissionKey, PermissionResolver, Scope, APP_LABEL};
use crate::routes::ApiResponse;

/// 给某作用域授权/回收权限, 要求对该作用域模型的 change 权限
async fn can_manage_scope(
    resolver: &PermissionResolver,
    user: &CurrentUser,
    scope: Scope,
) -> bool {
    if user.is_superuser {
        return true;
    }
    resolver
        .has(user, &PermissionKey::new(APP_LABEL, Action::Change, scope.as_str()))
        .await
        .unwrap_or(false)
}

/// Catalog entry
#[derive(Debug, Serialize)]
pub struct PermissionItem {
    pub id: i64,
    pub name: String,
    pub app: String,
    pub action: String,
    pub model: String,
    /// 规范字符串形式, 如 "org.change_room"
    pub key: String,
}

/// Grant/revoke request
#[derive(Debug, Deserialize)]
pub struct GrantRequest {
    pub scope: String,
    #[serde(rename = "scopeId")]
    pub scope_id: i64,
    pub app: String,
    pub action: String,
    pub model: String,
}

/// Permission check request. `model` also accepts the legacy field name
/// `service` used by existing clients.
#[derive(Debug, Deserialize)]
pub struct CheckRequest {
    pub app: String,
    pub action: String,
    #[serde(alias = "service")]
    pub model: String,
}

/// Permission check response
#[derive(Debug, Serialize)]
pub struct CheckResponse {
    pub allowed: bool,
}

/// GET /api/permission/catalog
pub async fn get_catalog(
    Extension(db): Extension<DbConn>,
    Extension(_current_user): Extension<CurrentUser>,
) -> AppResult<Json<ApiResponse<Vec<PermissionItem>>>> {
    let types: HashMap<i64, content_type::Model> = content_type::Entity::find()
        .all(&*db)
        .await?
        .into_iter()
        .map(|t| (t.id, t))
        .collect();

    let perms = permission::Entity::find()
        .order_by_asc(permission::Column::Id)
        .all(&*db)
        .await?;

    let mut items = Vec::new();
    for p in perms {
        let Some(ct) = types.get(&p.content_type_id) else {
            continue;
        };
        items.push(PermissionItem {
            id: p.id,
            name: p.name,
            app: ct.app_label.clone(),
            action: p.action.clone(),
            model: ct.model.clone(),
            key: format!("{}.{}_{}", ct.app_label, p.action, ct.model),
        });
    }

    Ok(Json(ApiResponse::success(items)))
}

/// GET /api/permission/content-types
pub async fn get_content_types(
    Extension(_current_user): Extension<CurrentUser>,
    Extension(resolver): Extension<PermissionResolver>,
) -> AppResult<Json<ApiResponse<Vec<content_type::Model>>>> {
    let types = resolver.registry().content_types().await?;
    Ok(Json(ApiResponse::success(types)))
}

/// Resolve and validate a grant/revoke request into the stored permission
/// row and target scope. Unknown scope, action, or permission triple is a
/// validation error; a missing target is not found.
async fn resolve_grant_request(
    db: &DbConn,
    resolver: &PermissionResolver,
    req: &GrantRequest,
) -> AppResult<(Scope, permission::Model)> {
    let scope: Scope = req.scope.parse()?;
    let action = req.action.parse()?;
    let key = PermissionKey::new(&req.app, action, &req.model);

    let perm = resolver
        .registry()
        .find(&key)
        .await?
        .ok_or_else(|| AppError::Validation(format!("未知权限: {}", key)))?;

    // Target must exist before any grant table is touched
    match scope {
        Scope::User => {
            user::Entity::find_by_id(req.scope_id)
                .one(&**db)
                .await?
                .ok_or_not_found("用户不存在")?;
        }
        Scope::Group => {
            group::Entity::find_by_id(req.scope_id)
                .one(&**db)
                .await?
                .ok_or_not_found("群组不存在")?;
        }
        Scope::Room => {
            room::Entity::find_by_id(req.scope_id)
                .one(&**db)
                .await?
                .ok_or_not_found("科室不存在")?;
        }
        Scope::Department => {
            department::Entity::find_by_id(req.scope_id)
                .one(&**db)
                .await?
                .ok_or_not_found("部门不存在")?;
        }
    }

    Ok((scope, perm))
}

/// POST /api/permission/grant
pub async fn grant_permission(
    Extension(db): Extension<DbConn>,
    Extension(current_user): Extension<CurrentUser>,
    Extension(resolver): Extension<PermissionResolver>,
    Json(req): Json<GrantRequest>,
) -> AppResult<Json<ApiResponse<()>>> {
    let (scope, perm) = resolve_grant_request(&db, &resolver, &req).await?;

    if !can_manage_scope(&resolver, &current_user, scope).await {
        return Err(AppError::Forbidden);
    }

    // Granting twice is a no-op
    match scope {
        Scope::User => {
            let existing = user_permission::Entity::find()
                .filter(user_permission::Column::UserId.eq(req.scope_id))
                .filter(user_permission::Column::PermissionId.eq(perm.id))
                .one(&*db)
                .await?;
            if existing.is_none() {
                let grant = user_permission::ActiveModel {
                    user_id: Set(req.scope_id),
                    permission_id: Set(perm.id),
                    ..Default::default()
                };
                grant.insert(&*db).await?;
            }
        }
        Scope::Group => {
            let existing = group_permission::Entity::find()
                .filter(group_permission::Column::GroupId.eq(req.scope_id))
                .filter(group_permission::Column::PermissionId.eq(perm.id))
                .one(&*db)
                .await?;
            if existing.is_none() {
                let grant = group_permission::ActiveModel {
                    group_id: Set(req.scope_id),
                    permission_id: Set(perm.id),
                    ..Default::default()
                };
                grant.insert(&*db).await?;
            }
        }
        Scope::Room => {
            let existing = room_permission::Entity::find()
                .filter(room_permission::Column::RoomId.eq(req.scope_id))
                .filter(room_permission::Column::PermissionId.eq(perm.id))
                .one(&*db)
                .await?;
            if existing.is_none() {
                let grant = room_permission::ActiveModel {
                    room_id: Set(req.scope_id),
                    permission_id: Set(perm.id),
                    ..Default::default()
                };
                grant.insert(&*db).await?;
            }
        }
        Scope::Department => {
            let existing = department_permission::Entity::find()
                .filter(department_permission::Column::DepartmentId.eq(req.scope_id))
                .filter(department_permission::Column::PermissionId.eq(perm.id))
                .one(&*db)
                .await?;
            if existing.is_none() {
                let grant = department_permission::ActiveModel {
                    department_id: Set(req.scope_id),
                    permission_id: Set(perm.id),
                    ..Default::default()
                };
                grant.insert(&*db).await?;
            }
        }
    }

    tracing::info!(
        "Permission granted: {} -> {} {}",
        perm.name,
        req.scope,
        req.scope_id
    );
    Ok(Json(ApiResponse::success_msg("success")))
}

/// POST /api/permission/revoke
pub async fn revoke_permission(
    Extension(db): Extension<DbConn>,
    Extension(current_user): Extension<CurrentUser>,
    Extension(resolver): Extension<PermissionResolver>,
    Json(req): Json<GrantRequest>,
) -> AppResult<Json<ApiResponse<()>>> {
    let (scope, perm) = resolve_grant_request(&db, &resolver, &req).await?;

    if !can_manage_scope(&resolver, &current_user, scope).await {
        return Err(AppError::Forbidden);
    }

    match scope {
        Scope::User => {
            user_permission::Entity::delete_many()
                .filter(user_permission::Column::UserId.eq(req.scope_id))
                .filter(user_permission::Column::PermissionId.eq(perm.id))
                .exec(&*db)
                .await?;
        }
        Scope::Group => {
            group_permission::Entity::delete_many()
                .filter(group_permission::Column::GroupId.eq(req.scope_id))
                .filter(group_permission::Column::PermissionId.eq(perm.id))
                .exec(&*db)
                .await?;
        }
        Scope::Room => {
            room_permission::Entity::delete_many()
                .filter(room_permission::Column::RoomId.eq(req.scope_id))
                .filter(room_permission::Column::PermissionId.eq(perm.id))
                .exec(&*db)
                .await?;
        }
        Scope::Department => {
            department_permission::Entity::delete_many()
                .filter(department_permission::Column::DepartmentId.eq(req.scope_id))
                .filter(department_permission::Column::PermissionId.eq(perm.id))
                .exec(&*db)
                .await?;
        }
    }

    tracing::info!(
        "Permission revoked: {} -> {} {}",
        perm.name,
        req.scope,
        req.scope_id
    );
    Ok(Json(ApiResponse::success_msg("success")))
}

/// POST /api/permission/check
///
/// 未知的 (app, action, model) 组合在解析之前就被拒绝
pub async fn check_permission(
    Extension(current_user): Extension<CurrentUser>,
    Extension(resolver): Extension<PermissionResolver>,
    Json(req): Json<CheckRequest>,
) -> AppResult<Json<ApiResponse<CheckResponse>>> {
    let action = req.action.parse()?;
    let key = PermissionKey::new(&req.app, action, &req.model);

    resolver
        .registry()
        .find(&key)
        .await?
        .ok_or_else(|| AppError::Validation(format!("未知权限: {}", key)))?;

    let allowed = resolver.has(&current_user, &key).await?;
    Ok(Json(ApiResponse::success(CheckResponse { allowed })))
}

/// GET /api/permission/all - Current user's effective permission set
pub async fn get_effective_permissions(
    Extension(current_user): Extension<CurrentUser>,
    Extension(resolver): Extension<PermissionResolver>,
) -> AppResult<Json<ApiResponse<Vec<String>>>> {
    let effective = resolver.effective(&current_user).await?;

    let mut keys: Vec<String> = effective.iter().map(|k| k.to_string()).collect();
    keys.sort();
    Ok(Json(ApiResponse::success(keys)))
}

/// GET /api/permission/matrix - Current user's action matrix
pub async fn get_permission_matrix(
    Extension(current_user): Extension<CurrentUser>,
    Extension(resolver): Extension<PermissionResolver>,
) -> AppResult<Json<ApiResponse<BTreeMap<String, ActionFlags>>>> {
    let matrix = resolver.matrix(&current_user).await?;
    Ok(Json(ApiResponse::success(matrix)))
}
