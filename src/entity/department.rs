//! Department entity - 部门表
//!
//! 表名: org_department

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "org_department")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    /// 部门名称
    #[sea_orm(column_type = "String(Some(32))", unique)]
    pub name: String,

    /// 部门编码 (唯一, 写入时转为小写)
    #[sea_orm(column_type = "String(Some(16))", unique)]
    pub code: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

// 下属科室通过手动查询 org_room 表处理

impl ActiveModelBehavior for ActiveModel {}
