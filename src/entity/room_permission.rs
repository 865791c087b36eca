//! RoomPermission entity - 科室授权表
//!
//! 表名: org_room_permission

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "org_room_permission")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    /// 科室ID
    pub room_id: i64,

    /// 权限ID
    pub permission_id: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
