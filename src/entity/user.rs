//! User entity - 用户表
//!
//! 用户只能加入一个科室, 科室/部门继承权限都经过这个唯一引用
//! 表名: org_user

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "org_user")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,

    /// 用户名 (唯一)
    #[sea_orm(column_type = "String(Some(32))", unique)]
    pub username: String,

    /// 密码 (bcrypt 哈希)
    #[sea_orm(column_type = "String(Some(128))")]
    #[serde(skip_serializing)]
    pub password: String,

    /// 真名
    #[sea_orm(column_type = "String(Some(32))", nullable)]
    pub realname: Option<String>,

    /// 邮箱
    #[sea_orm(column_type = "String(Some(64))", nullable)]
    pub email: Option<String>,

    /// 手机
    #[sea_orm(column_type = "String(Some(20))", nullable)]
    pub mobile: Option<String>,

    /// 头像路径
    #[sea_orm(column_type = "String(Some(128))", nullable)]
    pub avatar: Option<String>,

    /// 性别: "M" 男 / "F" 女
    #[sea_orm(column_type = "String(Some(1))")]
    pub gender: String,

    /// 职位
    #[sea_orm(column_type = "String(Some(32))", nullable)]
    pub position: Option<String>,

    /// 简介
    #[sea_orm(column_type = "Text", nullable)]
    pub bio: Option<String>,

    /// 所属科室ID (可为空; 科室在有成员时禁止删除)
    pub room_id: Option<i64>,

    /// 超级用户
    pub is_superuser: bool,

    /// 是否激活
    pub is_active: bool,

    /// 主管标记 (菜单角色)
    pub is_manager: bool,

    /// 组长标记 (菜单角色)
    pub is_leader: bool,

    /// 最后登录时间 (Unix 时间戳)
    pub last_login: i64,

    /// 注册时间 (Unix 时间戳)
    pub date_joined: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

// 科室/群组/权限关系通过手动查询处理, 避免循环依赖

impl ActiveModelBehavior for ActiveModel {}

/// 用户响应 (不含密码)
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UserResponse {
    pub id: i64,
    pub username: String,
    pub realname: Option<String>,
    pub email: Option<String>,
    pub mobile: Option<String>,
    pub avatar: Option<String>,
    pub gender: String,
    pub position: Option<String>,
    pub bio: Option<String>,
    pub room_id: Option<i64>,
    pub is_superuser: bool,
    pub is_active: bool,
    pub is_manager: bool,
    pub is_leader: bool,
    pub last_login: i64,
}

impl From<Model> for UserResponse {
    fn from(m: Model) -> Self {
        Self {
            id: m.id,
            username: m.username,
            realname: m.realname,
            email: m.email,
            mobile: m.mobile,
            avatar: m.avatar,
            gender: m.gender,
            position: m.position,
            bio: m.bio,
            room_id: m.room_id,
            is_superuser: m.is_superuser,
            is_active: m.is_active,
            is_manager: m.is_manager,
            is_leader: m.is_leader,
            last_login: m.last_login,
        }
    }
}
