//! GroupInfo entity - 群组扩展信息表
//!
//! 每个群组在创建时生成且仅生成一条扩展记录, 与群组同事务写入
//! 表名: org_group_info

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "org_group_info")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    /// 群组ID (一对一)
    #[sea_orm(unique)]
    pub group_id: i64,

    /// 群组编码, 6位数字 [100000, 999999]
    #[sea_orm(column_type = "String(Some(6))", unique)]
    pub code: String,

    /// 群组描述
    #[sea_orm(column_type = "Text")]
    pub description: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
