//! Entity module - SeaORM 实体定义
//!
//! 包含所有数据库表对应的实体模型

pub mod content_type;
pub mod department;
pub mod department_permission;
pub mod group;
pub mod group_info;
pub mod group_permission;
pub mod group_user;
pub mod permission;
pub mod room;
pub mod room_group;
pub mod room_permission;
pub mod user;
pub mod user_permission;
