//! Department handlers
//!
//! Implements department CRUD operations

use axum::{
    extract::Query,
    response::Json,
    Extension,
};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};

use crate::entity::{department, department_permission, room};
use crate::error::{AppError, AppResult, OptionExt};
use crate::middleware::auth::CurrentUser;
use crate::middleware::DbConn;
use crate::permission::{Action, PermissionKey, PermissionResolver, APP_LABEL};
use crate::routes::ApiResponse;

/// 管理部门要求超级用户或 org.change_department 权限
async fn can_manage_departments(resolver: &PermissionResolver, user: &CurrentUser) -> bool {
    if user.is_superuser {
        return true;
    }
    resolver
        .has(user, &PermissionKey::new(APP_LABEL, Action::Change, "department"))
        .await
        .unwrap_or(false)
}

/// Add department request
#[derive(Debug, Deserialize)]
pub struct AddDepartmentRequest {
    pub name: String,
    pub code: String,
}

/// Update department request
#[derive(Debug, Deserialize)]
pub struct UpdateDepartmentRequest {
    pub id: i64,
    pub name: String,
    pub code: String,
}

/// Department response
#[derive(Debug, Serialize)]
pub struct DepartmentResponse {
    pub id: i64,
    pub name: String,
    pub code: String,
}

impl From<department::Model> for DepartmentResponse {
    fn from(m: department::Model) -> Self {
        Self {
            id: m.id,
            name: m.name,
            code: m.code,
        }
    }
}

/// 部门及下属科室 (用于查询接口)
#[derive(Debug, Serialize)]
pub struct DepartmentWithRooms {
    pub id: i64,
    pub name: String,
    pub code: String,
    pub rooms: Vec<RoomBrief>,
}

#[derive(Debug, Serialize)]
pub struct RoomBrief {
    pub id: i64,
    pub name: String,
    pub code: String,
}

/// Query parameters for delete
#[derive(Debug, Deserialize)]
pub struct IdQuery {
    pub id: i64,
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

/// POST /api/department/add
pub async fn add_department(
    Extension(db): Extension<DbConn>,
    Extension(current_user): Extension<CurrentUser>,
    Extension(resolver): Extension<PermissionResolver>,
    Json(req): Json<AddDepartmentRequest>,
) -> AppResult<Json<ApiResponse<DepartmentResponse>>> {
    if !can_manage_departments(&resolver, &current_user).await {
        return Err(AppError::Forbidden);
    }

    let code = validate_names(&req.name, &req.code)?;

    let name_taken = department::Entity::find()
        .filter(department::Column::Name.eq(&req.name))
        .one(&*db)
        .await?;
    if name_taken.is_some() {
        return Err(AppError::Conflict("部门名称已存在".to_string()));
    }

    let code_taken = department::Entity::find()
        .filter(department::Column::Code.eq(&code))
        .one(&*db)
        .await?;
    if code_taken.is_some() {
        return Err(AppError::Conflict("部门编码已存在".to_string()));
    }

    let new_dept = department::ActiveModel {
        name: Set(req.name.clone()),
        code: Set(code),
        ..Default::default()
    };
    let dept = new_dept.insert(&*db).await?;

    tracing::info!("Department created: {} ({})", dept.name, dept.code);
    Ok(Json(ApiResponse::success(dept.into())))
}

/// POST /api/department/update
pub async fn update_department(
    Extension(db): Extension<DbConn>,
    Extension(current_user): Extension<CurrentUser>,
    Extension(resolver): Extension<PermissionResolver>,
    Json(req): Json<UpdateDepartmentRequest>,
) -> AppResult<Json<ApiResponse<DepartmentResponse>>> {
    if !can_manage_departments(&resolver, &current_user).await {
        return Err(AppError::Forbidden);
    }

    let code = validate_names(&req.name, &req.code)?;

    department::Entity::find_by_id(req.id)
        .one(&*db)
        .await?
        .ok_or_not_found("部门不存在")?;

    let name_taken = department::Entity::find()
        .filter(department::Column::Name.eq(&req.name))
        .filter(department::Column::Id.ne(req.id))
        .one(&*db)
        .await?;
    if name_taken.is_some() {
        return Err(AppError::Conflict("部门名称已存在".to_string()));
    }

    let code_taken = department::Entity::find()
        .filter(department::Column::Code.eq(&code))
        .filter(department::Column::Id.ne(req.id))
        .one(&*db)
        .await?;
    if code_taken.is_some() {
        return Err(AppError::Conflict("部门编码已存在".to_string()));
    }

    let update_model = department::ActiveModel {
        id: Set(req.id),
        name: Set(req.name.clone()),
        code: Set(code),
    };
    let dept = update_model.update(&*db).await?;

    tracing::info!("Department updated: {} ({})", dept.name, dept.code);
    Ok(Json(ApiResponse::success(dept.into())))
}

/// POST /api/department/delete
///
/// 部门下仍有科室时拒绝删除
pub async fn delete_department(
    Extension(db): Extension<DbConn>,
    Extension(current_user): Extension<CurrentUser>,
    Extension(resolver): Extension<PermissionResolver>,
    Query(query): Query<IdQuery>,
) -> AppResult<Json<ApiResponse<()>>> {
    if !can_manage_departments(&resolver, &current_user).await {
        return Err(AppError::Forbidden);
    }

    let dept = department::Entity::find_by_id(query.id)
        .one(&*db)
        .await?
        .ok_or_not_found("部门不存在")?;

    let has_rooms = room::Entity::find()
        .filter(room::Column::DepartmentId.eq(query.id))
        .one(&*db)
        .await?;
    if has_rooms.is_some() {
        return Err(AppError::Conflict("部门下仍有科室, 不能删除".to_string()));
    }

    // Delete department grants together with the department
    (&*db)
        .transaction::<_, (), sea_orm::DbErr>(|txn| {
            Box::pin(async move {
                department_permission::Entity::delete_many()
                    .filter(department_permission::Column::DepartmentId.eq(query.id))
                    .exec(txn)
                    .await?;

                department::Entity::delete_by_id(query.id).exec(txn).await?;

                Ok(())
            })
        })
        .await?;

    tracing::info!("Department deleted: {} ({})", dept.name, dept.code);
    Ok(Json(ApiResponse::success_msg("success")))
}

/// GET /api/department/query
pub async fn get_departments(
    Extension(db): Extension<DbConn>,
    Extension(_current_user): Extension<CurrentUser>,
) -> AppResult<Json<ApiResponse<Vec<DepartmentWithRooms>>>> {
    let departments = department::Entity::find()
        .order_by_asc(department::Column::Id)
        .all(&*db)
        .await?;

    let mut response = Vec::new();
    for dept in departments {
        let rooms = room::Entity::find()
            .filter(room::Column::DepartmentId.eq(dept.id))
            .order_by_asc(room::Column::Id)
            .all(&*db)
            .await?
            .into_iter()
            .map(|r| RoomBrief {
                id: r.id,
                name: r.name,
                code: r.code,
            })
            .collect();

        response.push(DepartmentWithRooms {
            id: dept.id,
            name: dept.name,
            code: dept.code,
            rooms,
        });
    }

    Ok(Json(ApiResponse::success(response)))
}
