//! Permission registry
//!
//! Catalog queries over the permission tables: what permissions exist,
//! and which are attached to a given scope. The registry never combines
//! sources; union is the resolver's job.

use std::collections::{HashMap, HashSet};

use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder};

use crate::entity::{
    content_type, department_permission, group_permission, group_user, permission,
    room_permission, user_permission,
};
use crate::error::{AppError, AppResult};

use super::key::PermissionKey;

/// 内置资源目录的应用标签
pub const APP_LABEL: &str = "org";

/// 授权作用域: 权限可以直接挂接的层级
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Scope {
    User,
    Group,
    Room,
    Department,
}

impl Scope {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scope::User => "user",
            Scope::Group => "group",
            Scope::Room => "room",
            Scope::Department => "department",
        }
    }
}

impl std::str::FromStr for Scope {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Scope::User),
            "group" => Ok(Scope::Group),
            "room" => Ok(Scope::Room),
            "department" => Ok(Scope::Department),
            other => Err(AppError::Validation(format!("unknown scope: {}", other))),
        }
    }
}

/// Read-only view over the permission catalog and grant tables.
#[derive(Clone)]
pub struct PermissionRegistry {
    db: DatabaseConnection,
}

impl PermissionRegistry {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// 全部权限目录 (超级用户的有效集)
    pub async fn all(&self) -> AppResult<HashSet<PermissionKey>> {
        let perms = permission::Entity::find().all(&self.db).await?;
        self.keys_for(perms).await
    }

    /// Permissions attached directly at one scope.
    pub async fn for_scope(&self, scope: Scope, id: i64) -> AppResult<HashSet<PermissionKey>> {
        let perm_ids: Vec<i64> = match scope {
            Scope::User => user_permission::Entity::find()
                .filter(user_permission::Column::UserId.eq(id))
                .all(&self.db)
                .await?
                .into_iter()
                .map(|g| g.permission_id)
                .collect(),
            Scope::Group => group_permission::Entity::find()
                .filter(group_permission::Column::GroupId.eq(id))
                .all(&self.db)
                .await?
                .into_iter()
                .map(|g| g.permission_id)
                .collect(),
            Scope::Room => room_permission::Entity::find()
                .filter(room_permission::Column::RoomId.eq(id))
                .all(&self.db)
                .await?
                .into_iter()
                .map(|g| g.permission_id)
                .collect(),
            Scope::Department => department_permission::Entity::find()
                .filter(department_permission::Column::DepartmentId.eq(id))
                .all(&self.db)
                .await?
                .into_iter()
                .map(|g| g.permission_id)
                .collect(),
        };

        self.keys_by_ids(perm_ids).await
    }

    /// Permissions attached to any group the user belongs to.
    pub async fn for_user_groups(&self, user_id: i64) -> AppResult<HashSet<PermissionKey>> {
        let group_ids: Vec<i64> = group_user::Entity::find()
            .filter(group_user::Column::UserId.eq(user_id))
            .all(&self.db)
            .await?
            .into_iter()
            .map(|m| m.group_id)
            .collect();

        if group_ids.is_empty() {
            return Ok(HashSet::new());
        }

        let perm_ids: Vec<i64> = group_permission::Entity::find()
            .filter(group_permission::Column::GroupId.is_in(group_ids))
            .all(&self.db)
            .await?
            .into_iter()
            .map(|g| g.permission_id)
            .collect();

        self.keys_by_ids(perm_ids).await
    }

    /// 列出全部资源类型 (按标识排序)
    pub async fn content_types(&self) -> AppResult<Vec<content_type::Model>> {
        Ok(content_type::Entity::find()
            .order_by_asc(content_type::Column::AppLabel)
            .order_by_asc(content_type::Column::Model)
            .all(&self.db)
            .await?)
    }

    /// Look up the stored permission row for a key, if the catalog has it.
    pub async fn find(&self, key: &PermissionKey) -> AppResult<Option<permission::Model>> {
        let ct = content_type::Entity::find()
            .filter(content_type::Column::AppLabel.eq(&key.app))
            .filter(content_type::Column::Model.eq(&key.model))
            .one(&self.db)
            .await?;

        let Some(ct) = ct else {
            return Ok(None);
        };

        Ok(permission::Entity::find()
            .filter(permission::Column::ContentTypeId.eq(ct.id))
            .filter(permission::Column::Action.eq(key.action.as_str()))
            .one(&self.db)
            .await?)
    }

    async fn keys_by_ids(&self, perm_ids: Vec<i64>) -> AppResult<HashSet<PermissionKey>> {
        if perm_ids.is_empty() {
            return Ok(HashSet::new());
        }
        let perms = permission::Entity::find()
            .filter(permission::Column::Id.is_in(perm_ids))
            .all(&self.db)
            .await?;
        self.keys_for(perms).await
    }

    /// Resolve permission rows to structured keys via the content-type
    /// catalog. Rows with a dangling content type or unknown action are
    /// skipped rather than surfaced.
    async fn keys_for(&self, perms: Vec<permission::Model>) -> AppResult<HashSet<PermissionKey>> {
        let types: HashMap<i64, content_type::Model> = content_type::Entity::find()
            .all(&self.db)
            .await?
            .into_iter()
            .map(|t| (t.id, t))
            .collect();

        Ok(perms
            .into_iter()
            .filter_map(|p| {
                let ct = types.get(&p.content_type_id)?;
                let action = p.action.parse().ok()?;
                Some(PermissionKey::new(&ct.app_label, action, &ct.model))
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_round_trip() {
        for scope in [Scope::User, Scope::Group, Scope::Room, Scope::Department] {
            assert_eq!(scope.as_str().parse::<Scope>().unwrap(), scope);
        }
    }

    #[test]
    fn test_unknown_scope_rejected() {
        assert!(matches!(
            "tenant".parse::<Scope>(),
            Err(AppError::Validation(_))
        ));
    }
}
