//! User handlers
//!
//! Implements user CRUD operations

use axum::{
    extract::Query,
    response::Json,
    Extension,
};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::Deserialize;

use crate::entity::{group_user, room, user, user_permission};
use crate::error::{AppError, AppResult, OptionExt};
use crate::middleware::auth::CurrentUser;
use crate::middleware::DbConn;
use crate::permission::{Action, PermissionKey, PermissionResolver, APP_LABEL};
use crate::routes::ApiResponse;

/// 管理用户要求超级用户或 org.change_user 权限
async fn can_manage_users(resolver: &PermissionResolver, user: &CurrentUser) -> bool {
    if user.is_superuser {
        return true;
    }
    resolver
        .has(user, &PermissionKey::new(APP_LABEL, Action::Change, "user"))
        .await
        .unwrap_or(false)
}

/// Add user request
#[derive(Debug, Deserialize)]
pub struct AddUserRequest {
    pub username: String,
    pub password: String,
    pub realname: Option<String>,
    pub email: Option<String>,
    pub mobile: Option<String>,
    pub gender: Option<String>,
    pub position: Option<String>,
    pub bio: Option<String>,
    #[serde(rename = "roomId")]
    pub room_id: Option<i64>,
    #[serde(rename = "isManager", default)]
    pub is_manager: bool,
    #[serde(rename = "isLeader", default)]
    pub is_leader: bool,
}

/// Update user request
#[derive(Debug, Deserialize)]
pub struct UpdateUserRequest {
    pub id: i64,
    pub password: Option<String>,
    pub realname: Option<String>,
    pub email: Option<String>,
    pub mobile: Option<String>,
    pub gender: Option<String>,
    pub position: Option<String>,
    pub bio: Option<String>,
    /// 为空表示移出科室
    #[serde(rename = "roomId")]
    pub room_id: Option<i64>,
    #[serde(rename = "isManager")]
    pub is_manager: Option<bool>,
    #[serde(rename = "isLeader")]
    pub is_leader: Option<bool>,
}

/// Query parameters
#[derive(Debug, Deserialize)]
pub struct RoomIdQuery {
    #[serde(rename = "roomId")]
    pub room_id: i64,
}

#[derive(Debug, Deserialize)]
pub struct UsernameQuery {
    pub username: String,
}

/// Change password request (user changes their own password)
#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    #[serde(rename = "oldPassword")]
    pub old_password: String,
    #[serde(rename = "newPassword")]
    pub new_password: String,
}

fn validate_gender(gender: &str) -> AppResult<()> {
    if gender != "M" && gender != "F" {
        return Err(AppError::Validation("性别只能是 M 或 F".to_string()));
    }
    Ok(())
}

/// POST /api/user/add
pub async fn add_user(
    Extension(db): Extension<DbConn>,
    Extension(current_user): Extension<CurrentUser>,
    Extension(resolver): Extension<PermissionResolver>,
    Json(req): Json<AddUserRequest>,
) -> AppResult<Json<ApiResponse<user::UserResponse>>> {
    if !can_manage_users(&resolver, &current_user).await {
        return Err(AppError::Forbidden);
    }

    if req.username.is_empty() || req.username.chars().count() > 32 {
        return Err(AppError::Validation("用户名长度须在1-32个字符之间".to_string()));
    }
    if req.password.chars().count() < 6 {
        return Err(AppError::Validation("密码长度不能少于6个字符".to_string()));
    }
    let gender = req.gender.unwrap_or_else(|| "M".to_string());
    validate_gender(&gender)?;

    let existing = user::Entity::find()
        .filter(user::Column::Username.eq(&req.username))
        .one(&*db)
        .await?;
    if existing.is_some() {
        return Err(AppError::Conflict("用户名已存在".to_string()));
    }

    if let Some(room_id) = req.room_id {
        room::Entity::find_by_id(room_id)
            .one(&*db)
            .await?
            .ok_or_not_found("所属科室不存在")?;
    }

    let hashed_password = bcrypt::hash(&req.password, 12)
        .map_err(|e| AppError::Internal(format!("password hash failed: {}", e)))?;

    let now = chrono::Utc::now().timestamp();
    let new_user = user::ActiveModel {
        username: Set(req.username.clone()),
        password: Set(hashed_password),
        realname: Set(req.realname),
        email: Set(req.email),
        mobile: Set(req.mobile),
        avatar: Set(None),
        gender: Set(gender),
        position: Set(req.position),
        bio: Set(req.bio),
        room_id: Set(req.room_id),
        is_superuser: Set(false),
        is_active: Set(true),
        is_manager: Set(req.is_manager),
        is_leader: Set(req.is_leader),
        last_login: Set(0),
        date_joined: Set(now),
        ..Default::default()
    };
    let created = new_user.insert(&*db).await?;

    tracing::info!("User created: {}", created.username);
    Ok(Json(ApiResponse::success(created.into())))
}

/// POST /api/user/update
pub async fn update_user(
    Extension(db): Extension<DbConn>,
    Extension(current_user): Extension<CurrentUser>,
    Extension(resolver): Extension<PermissionResolver>,
    Json(req): Json<UpdateUserRequest>,
) -> AppResult<Json<ApiResponse<user::UserResponse>>> {
    // 普通用户只能修改自己的资料
    if req.id != current_user.id && !can_manage_users(&resolver, &current_user).await {
        return Err(AppError::Forbidden);
    }

    let old_user = user::Entity::find_by_id(req.id)
        .one(&*db)
        .await?
        .ok_or_not_found("用户不存在")?;

    let password = match req.password {
        Some(ref new_pwd) if !new_pwd.is_empty() => {
            if new_pwd.chars().count() < 6 {
                return Err(AppError::Validation("密码长度不能少于6个字符".to_string()));
            }
            bcrypt::hash(new_pwd, 12)
                .map_err(|e| AppError::Internal(format!("password hash failed: {}", e)))?
        }
        _ => old_user.password.clone(),
    };

    let gender = req.gender.unwrap_or_else(|| old_user.gender.clone());
    validate_gender(&gender)?;

    if let Some(room_id) = req.room_id {
        room::Entity::find_by_id(room_id)
            .one(&*db)
            .await?
            .ok_or_not_found("所属科室不存在")?;
    }

    // Role markers are management-only fields
    let (is_manager, is_leader) = if can_manage_users(&resolver, &current_user).await {
        (
            req.is_manager.unwrap_or(old_user.is_manager),
            req.is_leader.unwrap_or(old_user.is_leader),
        )
    } else {
        (old_user.is_manager, old_user.is_leader)
    };

    let update_model = user::ActiveModel {
        id: Set(req.id),
        username: Set(old_user.username.clone()),
        password: Set(password),
        realname: Set(req.realname.or(old_user.realname)),
        email: Set(req.email.or(old_user.email)),
        mobile: Set(req.mobile.or(old_user.mobile)),
        avatar: Set(old_user.avatar),
        gender: Set(gender),
        position: Set(req.position.or(old_user.position)),
        bio: Set(req.bio.or(old_user.bio)),
        room_id: Set(req.room_id),
        is_superuser: Set(old_user.is_superuser),
        is_active: Set(old_user.is_active),
        is_manager: Set(is_manager),
        is_leader: Set(is_leader),
        last_login: Set(old_user.last_login),
        date_joined: Set(old_user.date_joined),
    };
    let updated = update_model.update(&*db).await?;

    tracing::info!("User updated: {}", updated.username);
    Ok(Json(ApiResponse::success(updated.into())))
}

/// POST /api/user/delete
///
/// 成员关系与直接授权随用户一并删除
pub async fn delete_user(
    Extension(db): Extension<DbConn>,
    Extension(current_user): Extension<CurrentUser>,
    Extension(resolver): Extension<PermissionResolver>,
    Json(user_ids): Json<Vec<i64>>,
) -> AppResult<Json<ApiResponse<()>>> {
    if !can_manage_users(&resolver, &current_user).await {
        return Err(AppError::Forbidden);
    }

    let mut success_count = 0;
    let mut error_count = 0;

    for user_id in user_ids {
        let result = (&*db)
            .transaction::<_, (), sea_orm::DbErr>(|txn| {
                Box::pin(async move {
                    group_user::Entity::delete_many()
                        .filter(group_user::Column::UserId.eq(user_id))
                        .exec(txn)
                        .await?;

                    user_permission::Entity::delete_many()
                        .filter(user_permission::Column::UserId.eq(user_id))
                        .exec(txn)
                        .await?;

                    user::Entity::delete_by_id(user_id).exec(txn).await?;

                    Ok(())
                })
            })
            .await;

        match result {
            Ok(_) => success_count += 1,
            Err(e) => {
                tracing::error!("Failed to delete user {}: {}", user_id, e);
                error_count += 1;
            }
        }
    }

    let message = format!("成功删除{}个用户, 失败{}个", success_count, error_count);
    Ok(Json(ApiResponse::success_msg(message)))
}

/// GET /api/user/query - Get users by room ID
pub async fn get_users_by_room(
    Extension(db): Extension<DbConn>,
    Extension(_current_user): Extension<CurrentUser>,
    Query(query): Query<RoomIdQuery>,
) -> AppResult<Json<ApiResponse<Vec<user::UserResponse>>>> {
    let users = user::Entity::find()
        .filter(user::Column::RoomId.eq(query.room_id))
        .order_by_asc(user::Column::Id)
        .all(&*db)
        .await?;

    let response = users.into_iter().map(user::UserResponse::from).collect();
    Ok(Json(ApiResponse::success(response)))
}

/// GET /api/user/info - Get user by username
pub async fn get_user_by_username(
    Extension(db): Extension<DbConn>,
    Extension(_current_user): Extension<CurrentUser>,
    Query(query): Query<UsernameQuery>,
) -> AppResult<Json<ApiResponse<user::UserResponse>>> {
    let found = user::Entity::find()
        .filter(user::Column::Username.eq(&query.username))
        .one(&*db)
        .await?
        .ok_or_not_found("用户不存在")?;

    Ok(Json(ApiResponse::success(found.into())))
}

/// POST /api/user/enable
pub async fn enable_user(
    Extension(db): Extension<DbConn>,
    Extension(current_user): Extension<CurrentUser>,
    Extension(resolver): Extension<PermissionResolver>,
    Json(user_ids): Json<Vec<i64>>,
) -> AppResult<Json<ApiResponse<()>>> {
    set_active_flag(&db, &current_user, &resolver, user_ids, true).await
}

/// POST /api/user/disable
pub async fn disable_user(
    Extension(db): Extension<DbConn>,
    Extension(current_user): Extension<CurrentUser>,
    Extension(resolver): Extension<PermissionResolver>,
    Json(user_ids): Json<Vec<i64>>,
) -> AppResult<Json<ApiResponse<()>>> {
    set_active_flag(&db, &current_user, &resolver, user_ids, false).await
}

async fn set_active_flag(
    db: &DbConn,
    current_user: &CurrentUser,
    resolver: &PermissionResolver,
    user_ids: Vec<i64>,
    active: bool,
) -> AppResult<Json<ApiResponse<()>>> {
    if !can_manage_users(resolver, current_user).await {
        return Err(AppError::Forbidden);
    }

    for user_id in user_ids {
        let update = user::ActiveModel {
            id: Set(user_id),
            is_active: Set(active),
            ..Default::default()
        };
        if let Err(e) = update.update(&**db).await {
            tracing::error!("Failed to update user {} active flag: {}", user_id, e);
        }
    }

    Ok(Json(ApiResponse::success_msg("success")))
}

/// POST /api/user/change-password
pub async fn change_password(
    Extension(db): Extension<DbConn>,
    Extension(current_user): Extension<CurrentUser>,
    Json(req): Json<ChangePasswordRequest>,
) -> AppResult<Json<ApiResponse<()>>> {
    if req.new_password.chars().count() < 6 {
        return Err(AppError::Validation("密码长度不能少于6个字符".to_string()));
    }

    let old_valid = bcrypt::verify(&req.old_password, &current_user.password).unwrap_or(false);
    if !old_valid {
        return Err(AppError::BadRequest("旧密码错误".to_string()));
    }

    let hashed = bcrypt::hash(&req.new_password, 12)
        .map_err(|e| AppError::Internal(format!("password hash failed: {}", e)))?;

    let update = user::ActiveModel {
        id: Set(current_user.id),
        password: Set(hashed),
        ..Default::default()
    };
    update.update(&*db).await?;

    tracing::info!("Password changed: {}", current_user.username);
    Ok(Json(ApiResponse::success_msg("success")))
}
