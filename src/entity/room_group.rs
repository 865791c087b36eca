//! RoomGroup entity - 科室群组关联表
//!
//! 记录群组服务于哪些科室, 用于从科室发现群组的权限配置
//! 表名: org_room_group

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "org_room_group")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    /// 科室ID
    pub room_id: i64,

    /// 群组ID
    pub group_id: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
