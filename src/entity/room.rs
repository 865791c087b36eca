//! Room entity - 科室表
//!
//! 每个科室属于一个部门
//! 表名: org_room

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "org_room")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    /// 科室名称
    #[sea_orm(column_type = "String(Some(32))", unique)]
    pub name: String,

    /// 科室编码 (唯一, 写入时转为小写)
    #[sea_orm(column_type = "String(Some(16))", unique)]
    pub code: String,

    /// 所属部门ID
    pub department_id: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

// 所属部门/科室成员通过手动查询处理

impl ActiveModelBehavior for ActiveModel {}
