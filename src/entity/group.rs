//! Group entity - 群组表
//!
//! 表名: org_group

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "org_group")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    /// 群组名称 (最大32字符)
    #[sea_orm(column_type = "String(Some(32))", unique)]
    pub name: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

// 群组成员/扩展信息通过手动查询处理

impl ActiveModelBehavior for ActiveModel {}
