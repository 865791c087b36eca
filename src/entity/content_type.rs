//! ContentType entity - 资源类型表
//!
//! (app_label, model) 唯一标识一种受权限控制的资源
//! 表名: org_content_type

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "org_content_type")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    /// 应用标签
    #[sea_orm(column_type = "String(Some(32))")]
    pub app_label: String,

    /// 资源模型名
    #[sea_orm(column_type = "String(Some(32))")]
    pub model: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// "app_label.model" 形式的完整标识
    pub fn identifier(&self) -> String {
        format!("{}.{}", self.app_label, self.model)
    }
}
