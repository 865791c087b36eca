//! Room handlers
//!
//! Implements room CRUD and room-group association operations

use axum::{
    extract::Query,
    response::Json,
    Extension,
};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};

use crate::entity::{department, group, room, room_group, room_permission, user};
use crate::error::{AppError, AppResult, OptionExt};
use crate::middleware::auth::CurrentUser;
use crate::middleware::DbConn;
use crate::permission::{Action, PermissionKey, PermissionResolver, APP_LABEL};
use crate::routes::ApiResponse;

/// 管理科室要求超级用户或 org.change_room 权限
async fn can_manage_rooms(resolver: &PermissionResolver, user: &CurrentUser) -> bool {
    if user.is_superuser {
        return true;
    }
    resolver
        .has(user, &PermissionKey::new(APP_LABEL, Action::Change, "room"))
        .await
        .unwrap_or(false)
}

/// Add room request
#[derive(Debug, Deserialize)]
pub struct AddRoomRequest {
    pub name: String,
    pub code: String,
    #[serde(rename = "departmentId")]
    pub department_id: i64,
}

/// Update room request
#[derive(Debug, Deserialize)]
pub struct UpdateRoomRequest {
    pub id: i64,
    pub name: String,
    pub code: String,
    #[serde(rename = "departmentId")]
    pub department_id: i64,
}

/// Room response with associated groups
#[derive(Debug, Serialize)]
pub struct RoomResponse {
    pub id: i64,
    pub name: String,
    pub code: String,
    #[serde(rename = "departmentId")]
    pub department_id: i64,
    pub groups: Vec<GroupBrief>,
}

#[derive(Debug, Serialize)]
pub struct GroupBrief {
    pub id: i64,
    pub name: String,
}

/// Query parameters
#[derive(Debug, Deserialize)]
pub struct IdQuery {
    pub id: i64,
}

#[derive(Debug, Deserialize)]
pub struct RoomQuery {
    #[serde(rename = "departmentId")]
    pub department_id: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct RoomIdQuery {
    #[serde(rename = "roomId")]
    pub room_id: i64,
}

fn validate_names(name: &str, code: &str) -> AppResult<String> {
    if name.is_empty() || name.chars().count() > 32 {
        return Err(AppError::Validation("名称长度须在1-32个字符之间".to_string()));
    }
    let code = code.trim().to_lowercase();
    if code.is_empty() || code.chars().count() > 16 {
        return Err(AppError::Validation("编码长度须在1-16个字符之间".to_string()));
    }
    Ok(code)
}

/// POST /api/room/add
pub async fn add_room(
    Extension(db): Extension<DbConn>,
    Extension(current_user): Extension<CurrentUser>,
    Extension(resolver): Extension<PermissionResolver>,
    Json(req): Json<AddRoomRequest>,
) -> AppResult<Json<ApiResponse<RoomResponse>>> {
    if !can_manage_rooms(&resolver, &current_user).await {
        return Err(AppError::Forbidden);
    }

    let code = validate_names(&req.name, &req.code)?;

    department::Entity::find_by_id(req.department_id)
        .one(&*db)
        .await?
        .ok_or_not_found("所属部门不存在")?;

    let name_taken = room::Entity::find()
        .filter(room::Column::Name.eq(&req.name))
        .one(&*db)
        .await?;
    if name_taken.is_some() {
        return Err(AppError::Conflict("科室名称已存在".to_string()));
    }

    let code_taken = room::Entity::find()
        .filter(room::Column::Code.eq(&code))
        .one(&*db)
        .await?;
    if code_taken.is_some() {
        return Err(AppError::Conflict("科室编码已存在".to_string()));
    }

    let new_room = room::ActiveModel {
        name: Set(req.name.clone()),
        code: Set(code),
        department_id: Set(req.department_id),
        ..Default::default()
    };
    let room = new_room.insert(&*db).await?;

    tracing::info!("Room created: {} ({})", room.name, room.code);
    Ok(Json(ApiResponse::success(RoomResponse {
        id: room.id,
        name: room.name,
        code: room.code,
        department_id: room.department_id,
        groups: Vec::new(),
    })))
}

/// POST /api/room/update
pub async fn update_room(
    Extension(db): Extension<DbConn>,
    Extension(current_user): Extension<CurrentUser>,
    Extension(resolver): Extension<PermissionResolver>,
    Json(req): Json<UpdateRoomRequest>,
) -> AppResult<Json<ApiResponse<RoomResponse>>> {
    if !can_manage_rooms(&resolver, &current_user).await {
        return Err(AppError::Forbidden);
    }

    let code = validate_names(&req.name, &req.code)?;

    room::Entity::find_by_id(req.id)
        .one(&*db)
        .await?
        .ok_or_not_found("科室不存在")?;

    department::Entity::find_by_id(req.department_id)
        .one(&*db)
        .await?
        .ok_or_not_found("所属部门不存在")?;

    let name_taken = room::Entity::find()
        .filter(room::Column::Name.eq(&req.name))
        .filter(room::Column::Id.ne(req.id))
        .one(&*db)
        .await?;
    if name_taken.is_some() {
        return Err(AppError::Conflict("科室名称已存在".to_string()));
    }

    let code_taken = room::Entity::find()
        .filter(room::Column::Code.eq(&code))
        .filter(room::Column::Id.ne(req.id))
        .one(&*db)
        .await?;
    if code_taken.is_some() {
        return Err(AppError::Conflict("科室编码已存在".to_string()));
    }

    let update_model = room::ActiveModel {
        id: Set(req.id),
        name: Set(req.name.clone()),
        code: Set(code),
        department_id: Set(req.department_id),
    };
    let room = update_model.update(&*db).await?;

    tracing::info!("Room updated: {} ({})", room.name, room.code);
    Ok(Json(ApiResponse::success(RoomResponse {
        id: room.id,
        name: room.name,
        code: room.code,
        department_id: room.department_id,
        groups: Vec::new(),
    })))
}

/// POST /api/room/delete
///
/// 科室尚有成员或仍关联群组时拒绝删除
pub async fn delete_room(
    Extension(db): Extension<DbConn>,
    Extension(current_user): Extension<CurrentUser>,
    Extension(resolver): Extension<PermissionResolver>,
    Query(query): Query<IdQuery>,
) -> AppResult<Json<ApiResponse<()>>> {
    if !can_manage_rooms(&resolver, &current_user).await {
        return Err(AppError::Forbidden);
    }

    let room_info = room::Entity::find_by_id(query.id)
        .one(&*db)
        .await?
        .ok_or_not_found("科室不存在")?;

    let has_users = user::Entity::find()
        .filter(user::Column::RoomId.eq(query.id))
        .one(&*db)
        .await?;
    if has_users.is_some() {
        return Err(AppError::Conflict("科室尚有成员, 不能删除".to_string()));
    }

    let has_groups = room_group::Entity::find()
        .filter(room_group::Column::RoomId.eq(query.id))
        .one(&*db)
        .await?;
    if has_groups.is_some() {
        return Err(AppError::Conflict("科室仍关联群组, 不能删除".to_string()));
    }

    // Delete room grants together with the room
    (&*db)
        .transaction::<_, (), sea_orm::DbErr>(|txn| {
            Box::pin(async move {
                room_permission::Entity::delete_many()
                    .filter(room_permission::Column::RoomId.eq(query.id))
                    .exec(txn)
                    .await?;

                room::Entity::delete_by_id(query.id).exec(txn).await?;

                Ok(())
            })
        })
        .await?;

    tracing::info!("Room deleted: {} ({})", room_info.name, room_info.code);
    Ok(Json(ApiResponse::success_msg("success")))
}

/// GET /api/room/query
pub async fn get_rooms(
    Extension(db): Extension<DbConn>,
    Extension(_current_user): Extension<CurrentUser>,
    Query(query): Query<RoomQuery>,
) -> AppResult<Json<ApiResponse<Vec<RoomResponse>>>> {
    let mut finder = room::Entity::find().order_by_asc(room::Column::Id);
    if let Some(department_id) = query.department_id {
        finder = finder.filter(room::Column::DepartmentId.eq(department_id));
    }
    let rooms = finder.all(&*db).await?;

    let mut response = Vec::new();
    for r in rooms {
        let links = room_group::Entity::find()
            .filter(room_group::Column::RoomId.eq(r.id))
            .all(&*db)
            .await?;

        let mut groups = Vec::new();
        for link in links {
            if let Some(g) = group::Entity::find_by_id(link.group_id).one(&*db).await? {
                groups.push(GroupBrief {
                    id: g.id,
                    name: g.name,
                });
            }
        }

        response.push(RoomResponse {
            id: r.id,
            name: r.name,
            code: r.code,
            department_id: r.department_id,
            groups,
        });
    }

    Ok(Json(ApiResponse::success(response)))
}

/// POST /api/room/groups/add
pub async fn add_groups_to_room(
    Extension(db): Extension<DbConn>,
    Extension(current_user): Extension<CurrentUser>,
    Extension(resolver): Extension<PermissionResolver>,
    Query(query): Query<RoomIdQuery>,
    Json(group_ids): Json<Vec<i64>>,
) -> AppResult<Json<ApiResponse<()>>> {
    if !can_manage_rooms(&resolver, &current_user).await {
        return Err(AppError::Forbidden);
    }

    room::Entity::find_by_id(query.room_id)
        .one(&*db)
        .await?
        .ok_or_not_found("科室不存在")?;

    (&*db)
        .transaction::<_, (), sea_orm::DbErr>(|txn| {
            Box::pin(async move {
                for group_id in group_ids {
                    let group_exists = group::Entity::find_by_id(group_id).one(txn).await?;
                    if group_exists.is_none() {
                        continue;
                    }

                    let existing = room_group::Entity::find()
                        .filter(room_group::Column::RoomId.eq(query.room_id))
                        .filter(room_group::Column::GroupId.eq(group_id))
                        .one(txn)
                        .await?;
                    if existing.is_some() {
                        continue;
                    }

                    let link = room_group::ActiveModel {
                        room_id: Set(query.room_id),
                        group_id: Set(group_id),
                        ..Default::default()
                    };
                    link.insert(txn).await?;
                }
                Ok(())
            })
        })
        .await?;

    Ok(Json(ApiResponse::success_msg("success")))
}

/// POST /api/room/groups/delete
pub async fn delete_groups_from_room(
    Extension(db): Extension<DbConn>,
    Extension(current_user): Extension<CurrentUser>,
    Extension(resolver): Extension<PermissionResolver>,
    Query(query): Query<RoomIdQuery>,
    Json(group_ids): Json<Vec<i64>>,
) -> AppResult<Json<ApiResponse<()>>> {
    if !can_manage_rooms(&resolver, &current_user).await {
        return Err(AppError::Forbidden);
    }

    room::Entity::find_by_id(query.room_id)
        .one(&*db)
        .await?
        .ok_or_not_found("科室不存在")?;

    (&*db)
        .transaction::<_, (), sea_orm::DbErr>(|txn| {
            Box::pin(async move {
                for group_id in group_ids {
                    room_group::Entity::delete_many()
                        .filter(room_group::Column::RoomId.eq(query.room_id))
                        .filter(room_group::Column::GroupId.eq(group_id))
                        .exec(txn)
                        .await?;
                }
                Ok(())
            })
        })
        .await?;

    Ok(Json(ApiResponse::success_msg("success")))
}
