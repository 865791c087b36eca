//! Group handlers
//!
//! Implements group CRUD and member management operations. Creating a
//! group always creates its extension record in the same transaction.

use axum::{
    extract::Query,
    response::Json,
    Extension,
};
use rand::Rng;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};

use crate::entity::{group, group_info, group_permission, group_user, room_group, user};
use crate::error::{AppError, AppResult, OptionExt};
use crate::middleware::auth::CurrentUser;
use crate::middleware::DbConn;
use crate::permission::{Action, PermissionKey, PermissionResolver, APP_LABEL};
use crate::routes::ApiResponse;

/// 编码冲突时的重新生成次数上限
const MAX_CODE_ATTEMPTS: u32 = 8;

/// 管理群组要求超级用户或 org.change_group 权限
async fn can_manage_groups(resolver: &PermissionResolver, user: &CurrentUser) -> bool {
    if user.is_superuser {
        return true;
    }
    resolver
        .has(user, &PermissionKey::new(APP_LABEL, Action::Change, "group"))
        .await
        .unwrap_or(false)
}

/// 6位数字编码, 取值范围 [100000, 999999]
fn generate_group_code() -> String {
    let mut rng = rand::thread_rng();
    rng.gen_range(100_000..=999_999).to_string()
}

/// Add group request
#[derive(Debug, Deserialize)]
pub struct AddGroupRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

/// Group response with extension record fields
#[derive(Debug, Serialize)]
pub struct GroupResponse {
    pub id: i64,
    pub name: String,
    pub code: String,
    pub description: String,
}

/// Group member response
#[derive(Debug, Serialize)]
pub struct GroupUserResponse {
    pub id: i64,
    pub username: String,
    pub realname: Option<String>,
    pub email: Option<String>,
    pub mobile: Option<String>,
}

/// Query parameters
#[derive(Debug, Deserialize)]
pub struct IdQuery {
    pub id: i64,
}

#[derive(Debug, Deserialize)]
pub struct GroupIdQuery {
    #[serde(rename = "groupId")]
    pub group_id: i64,
}

/// POST /api/group/add
pub async fn add_group(
    Extension(db): Extension<DbConn>,
    Extension(current_user): Extension<CurrentUser>,
    Extension(resolver): Extension<PermissionResolver>,
    Json(req): Json<AddGroupRequest>,
) -> AppResult<Json<ApiResponse<GroupResponse>>> {
    if !can_manage_groups(&resolver, &current_user).await {
        return Err(AppError::Forbidden);
    }

    if req.name.is_empty() || req.name.chars().count() > 32 {
        return Err(AppError::Validation("群组名称长度须在1-32个字符之间".to_string()));
    }

    let existing = group::Entity::find()
        .filter(group::Column::Name.eq(&req.name))
        .one(&*db)
        .await?;
    if existing.is_some() {
        return Err(AppError::Conflict("群组名称已存在".to_string()));
    }

    // Create group and its extension record in one transaction
    let (group, info) = (&*db)
        .transaction::<_, (group::Model, group_info::Model), AppError>(|txn| {
            Box::pin(async move {
                let new_group = group::ActiveModel {
                    name: Set(req.name.clone()),
                    ..Default::default()
                };
                let group = new_group.insert(txn).await?;

                // 编码随机生成, 撞号就换一个
                let mut code = None;
                for _ in 0..MAX_CODE_ATTEMPTS {
                    let candidate = generate_group_code();
                    let taken = group_info::Entity::find()
                        .filter(group_info::Column::Code.eq(&candidate))
                        .one(txn)
                        .await?;
                    if taken.is_none() {
                        code = Some(candidate);
                        break;
                    }
                }
                let code = code
                    .ok_or_else(|| AppError::Conflict("群组编码生成冲突, 请重试".to_string()))?;

                let new_info = group_info::ActiveModel {
                    group_id: Set(group.id),
                    code: Set(code),
                    description: Set(req.description.clone()),
                    ..Default::default()
                };
                let info = new_info.insert(txn).await?;

                Ok((group, info))
            })
        })
        .await?;

    tracing::info!("Group created: {} ({})", group.name, info.code);
    Ok(Json(ApiResponse::success(GroupResponse {
        id: group.id,
        name: group.name,
        code: info.code,
        description: info.description,
    })))
}

/// POST /api/group/delete
///
/// 成员关系, 科室关联, 授权与扩展记录随群组一并删除
pub async fn delete_group(
    Extension(db): Extension<DbConn>,
    Extension(current_user): Extension<CurrentUser>,
    Extension(resolver): Extension<PermissionResolver>,
    Query(query): Query<IdQuery>,
) -> AppResult<Json<ApiResponse<()>>> {
    if !can_manage_groups(&resolver, &current_user).await {
        return Err(AppError::Forbidden);
    }

    let group_info_model = group::Entity::find_by_id(query.id)
        .one(&*db)
        .await?
        .ok_or_not_found("群组不存在")?;

    (&*db)
        .transaction::<_, (), sea_orm::DbErr>(|txn| {
            Box::pin(async move {
                group_user::Entity::delete_many()
                    .filter(group_user::Column::GroupId.eq(query.id))
                    .exec(txn)
                    .await?;

                room_group::Entity::delete_many()
                    .filter(room_group::Column::GroupId.eq(query.id))
                    .exec(txn)
                    .await?;

                group_permission::Entity::delete_many()
                    .filter(group_permission::Column::GroupId.eq(query.id))
                    .exec(txn)
                    .await?;

                group_info::Entity::delete_many()
                    .filter(group_info::Column::GroupId.eq(query.id))
                    .exec(txn)
                    .await?;

                group::Entity::delete_by_id(query.id).exec(txn).await?;

                Ok(())
            })
        })
        .await?;

    tracing::info!("Group deleted: {}", group_info_model.name);
    Ok(Json(ApiResponse::success_msg("success")))
}

/// GET /api/group/query
pub async fn get_groups(
    Extension(db): Extension<DbConn>,
    Extension(_current_user): Extension<CurrentUser>,
) -> AppResult<Json<ApiResponse<Vec<GroupResponse>>>> {
    let groups = group::Entity::find()
        .order_by_asc(group::Column::Id)
        .all(&*db)
        .await?;

    let mut response = Vec::new();
    for g in groups {
        let info = group_info::Entity::find()
            .filter(group_info::Column::GroupId.eq(g.id))
            .one(&*db)
            .await?;

        let (code, description) = match info {
            Some(i) => (i.code, i.description),
            None => (String::new(), String::new()),
        };

        response.push(GroupResponse {
            id: g.id,
            name: g.name,
            code,
            description,
        });
    }

    Ok(Json(ApiResponse::success(response)))
}

/// POST /api/group/addUsers
pub async fn add_users_to_group(
    Extension(db): Extension<DbConn>,
    Extension(current_user): Extension<CurrentUser>,
    Extension(resolver): Extension<PermissionResolver>,
    Query(query): Query<GroupIdQuery>,
    Json(user_ids): Json<Vec<i64>>,
) -> AppResult<Json<ApiResponse<()>>> {
    if !can_manage_groups(&resolver, &current_user).await {
        return Err(AppError::Forbidden);
    }

    group::Entity::find_by_id(query.group_id)
        .one(&*db)
        .await?
        .ok_or_not_found("群组不存在")?;

    (&*db)
        .transaction::<_, (), sea_orm::DbErr>(|txn| {
            Box::pin(async move {
                for user_id in user_ids {
                    let user_exists = user::Entity::find_by_id(user_id).one(txn).await?;
                    if user_exists.is_none() {
                        continue;
                    }

                    let existing = group_user::Entity::find()
                        .filter(group_user::Column::GroupId.eq(query.group_id))
                        .filter(group_user::Column::UserId.eq(user_id))
                        .one(txn)
                        .await?;
                    if existing.is_some() {
                        continue;
                    }

                    let new_member = group_user::ActiveModel {
                        group_id: Set(query.group_id),
                        user_id: Set(user_id),
                        ..Default::default()
                    };
                    new_member.insert(txn).await?;
                }
                Ok(())
            })
        })
        .await?;

    Ok(Json(ApiResponse::success_msg("success")))
}

/// POST /api/group/deleteUsers
pub async fn delete_users_from_group(
    Extension(db): Extension<DbConn>,
    Extension(current_user): Extension<CurrentUser>,
    Extension(resolver): Extension<PermissionResolver>,
    Query(query): Query<GroupIdQuery>,
    Json(user_ids): Json<Vec<i64>>,
) -> AppResult<Json<ApiResponse<()>>> {
    if !can_manage_groups(&resolver, &current_user).await {
        return Err(AppError::Forbidden);
    }

    group::Entity::find_by_id(query.group_id)
        .one(&*db)
        .await?
        .ok_or_not_found("群组不存在")?;

    (&*db)
        .transaction::<_, (), sea_orm::DbErr>(|txn| {
            Box::pin(async move {
                for user_id in user_ids {
                    group_user::Entity::delete_many()
                        .filter(group_user::Column::GroupId.eq(query.group_id))
                        .filter(group_user::Column::UserId.eq(user_id))
                        .exec(txn)
                        .await?;
                }
                Ok(())
            })
        })
        .await?;

    Ok(Json(ApiResponse::success_msg("success")))
}

/// GET /api/group/query/users - Get group members
pub async fn get_group_users(
    Extension(db): Extension<DbConn>,
    Extension(_current_user): Extension<CurrentUser>,
    Query(query): Query<GroupIdQuery>,
) -> AppResult<Json<ApiResponse<Vec<GroupUserResponse>>>> {
    group::Entity::find_by_id(query.group_id)
        .one(&*db)
        .await?
        .ok_or_not_found("群组不存在")?;

    let memberships = group_user::Entity::find()
        .filter(group_user::Column::GroupId.eq(query.group_id))
        .all(&*db)
        .await?;

    let mut users = Vec::new();
    for m in memberships {
        if let Some(u) = user::Entity::find_by_id(m.user_id).one(&*db).await? {
            users.push(GroupUserResponse {
                id: u.id,
                username: u.username,
                realname: u.realname,
                email: u.email,
                mobile: u.mobile,
            });
        }
    }

    Ok(Json(ApiResponse::success(users)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_group_code_range() {
        for _ in 0..1000 {
            let code = generate_group_code();
            assert_eq!(code.len(), 6);
            let value: u32 = code.parse().unwrap();
            assert!((100_000..=999_999).contains(&value));
        }
    }
}
