//! Permission entity - 权限表
//!
//! 由 (资源类型, 操作) 唯一确定, 可独立挂到用户/群组/科室/部门
//! 表名: org_permission

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "org_permission")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    /// 显示名称, 如 "Can change room"
    #[sea_orm(column_type = "String(Some(64))")]
    pub name: String,

    /// 资源类型ID
    pub content_type_id: i64,

    /// 操作: view / add / change / delete
    #[sea_orm(column_type = "String(Some(16))")]
    pub action: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

// 资源类型与四类授权关系通过手动查询处理

impl ActiveModelBehavior for ActiveModel {}
