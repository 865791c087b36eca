//! Permission resolver
//!
//! Computes a user's effective permission set as the union of four
//! sources: direct grants, group grants, the user's room, and that room's
//! department. A resolver is constructed fresh for each request and
//! memoizes every source set it computes, so within one request a user is
//! a permission snapshot; a grant changed in storage becomes visible to
//! the next request, never the current one.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use sea_orm::{DatabaseConnection, EntityTrait};
use serde::Serialize;
use tokio::sync::RwLock;

use crate::entity::{content_type, room, user};
use crate::error::AppResult;

use super::key::{Action, PermissionKey};
use super::registry::{PermissionRegistry, Scope};

/// 权限来源
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PermSource {
    User,
    Group,
    Room,
    Department,
}

impl PermSource {
    pub const ALL: [PermSource; 4] = [
        PermSource::User,
        PermSource::Group,
        PermSource::Room,
        PermSource::Department,
    ];
}

/// Per-resource action flags for the admin permission matrix.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ActionFlags {
    pub view: bool,
    pub add: bool,
    pub change: bool,
    pub delete: bool,
}

/// Per-request permission resolver with memoized source sets.
#[derive(Clone)]
pub struct PermissionResolver {
    db: DatabaseConnection,
    registry: PermissionRegistry,
    source_cache: Arc<RwLock<HashMap<(i64, PermSource), Arc<HashSet<PermissionKey>>>>>,
    effective_cache: Arc<RwLock<HashMap<i64, Arc<HashSet<PermissionKey>>>>>,
}

impl PermissionResolver {
    pub fn new(db: DatabaseConnection) -> Self {
        Self {
            registry: PermissionRegistry::new(db.clone()),
            db,
            source_cache: Arc::new(RwLock::new(HashMap::new())),
            effective_cache: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn registry(&self) -> &PermissionRegistry {
        &self.registry
    }

    /// Permissions contributed by a single source. Inactive users get the
    /// empty set before anything else is consulted; superusers get the
    /// entire catalog from every source.
    pub async fn source_permissions(
        &self,
        user: &user::Model,
        source: PermSource,
    ) -> AppResult<Arc<HashSet<PermissionKey>>> {
        if !user.is_active {
            return Ok(Arc::new(HashSet::new()));
        }

        if let Some(hit) = self.source_cache.read().await.get(&(user.id, source)) {
            return Ok(hit.clone());
        }

        let set = if user.is_superuser {
            self.registry.all().await?
        } else {
            match source {
                PermSource::User => self.registry.for_scope(Scope::User, user.id).await?,
                PermSource::Group => self.registry.for_user_groups(user.id).await?,
                PermSource::Room => match user.room_id {
                    Some(room_id) => self.registry.for_scope(Scope::Room, room_id).await?,
                    None => HashSet::new(),
                },
                PermSource::Department => self.department_permissions(user).await?,
            }
        };

        let set = Arc::new(set);
        self.source_cache
            .write()
            .await
            .insert((user.id, source), set.clone());
        Ok(set)
    }

    /// 部门来源: 经用户科室找到部门; 科室缺失或部门查不到都静默降级为空
    async fn department_permissions(
        &self,
        user: &user::Model,
    ) -> AppResult<HashSet<PermissionKey>> {
        let Some(room_id) = user.room_id else {
            return Ok(HashSet::new());
        };
        let Some(room) = room::Entity::find_by_id(room_id).one(&self.db).await? else {
            return Ok(HashSet::new());
        };
        self.registry
            .for_scope(Scope::Department, room.department_id)
            .await
    }

    /// Effective permission set: the union of all four sources, cached per
    /// user for this resolver's lifetime. Object-level permissions are
    /// unsupported; any `Some` object argument yields the empty set.
    pub async fn effective_with_object(
        &self,
        user: &user::Model,
        obj: Option<i64>,
    ) -> AppResult<Arc<HashSet<PermissionKey>>> {
        if !user.is_active || obj.is_some() {
            return Ok(Arc::new(HashSet::new()));
        }

        if let Some(hit) = self.effective_cache.read().await.get(&user.id) {
            return Ok(hit.clone());
        }

        let mut union = HashSet::new();
        for source in PermSource::ALL {
            let set = self.source_permissions(user, source).await?;
            union.extend(set.iter().cloned());
        }

        let union = Arc::new(union);
        self.effective_cache
            .write()
            .await
            .insert(user.id, union.clone());
        Ok(union)
    }

    pub async fn effective(&self, user: &user::Model) -> AppResult<Arc<HashSet<PermissionKey>>> {
        self.effective_with_object(user, None).await
    }

    /// Membership check against the effective set. No partial matches, no
    /// wildcards.
    pub async fn has(&self, user: &user::Model, key: &PermissionKey) -> AppResult<bool> {
        Ok(self.effective(user).await?.contains(key))
    }

    /// Admin display matrix: every known resource type, all-false unless
    /// resolved permissions light a flag.
    pub async fn matrix(&self, user: &user::Model) -> AppResult<BTreeMap<String, ActionFlags>> {
        let types = self.registry.content_types().await?;
        let perms = self.effective(user).await?;
        Ok(build_matrix(&types, &perms))
    }
}

/// Initialize every resource to all-false, then set flags from the
/// resolved set. `change` also lights `view` for display; the underlying
/// check in [`PermissionResolver::has`] is unaffected. Keys for resource
/// types outside the catalog are ignored.
pub(crate) fn build_matrix(
    types: &[content_type::Model],
    perms: &HashSet<PermissionKey>,
) -> BTreeMap<String, ActionFlags> {
    let mut matrix: BTreeMap<String, ActionFlags> = types
        .iter()
        .map(|t| (t.identifier(), ActionFlags::default()))
        .collect();

    for key in perms {
        let Some(flags) = matrix.get_mut(&format!("{}.{}", key.app, key.model)) else {
            continue;
        };
        match key.action {
            Action::View => flags.view = true,
            Action::Add => flags.add = true,
            Action::Change => {
                flags.change = true;
                flags.view = true;
            }
            Action::Delete => flags.delete = true,
        }
    }

    matrix
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_user(id: i64, active: bool, superuser: bool) -> user::Model {
        user::Model {
            id,
            username: format!("user{}", id),
            password: String::new(),
            realname: None,
            email: None,
            mobile: None,
            avatar: None,
            gender: "M".to_string(),
            position: None,
            bio: None,
            room_id: None,
            is_superuser: superuser,
            is_active: active,
            is_manager: false,
            is_leader: false,
            last_login: 0,
            date_joined: 0,
        }
    }

    fn ct(id: i64, model: &str) -> content_type::Model {
        content_type::Model {
            id,
            app_label: "org".to_string(),
            model: model.to_string(),
        }
    }

    #[tokio::test]
    async fn test_inactive_user_resolves_empty_without_storage() {
        // Disconnected connection: any query would error, so an empty
        // result proves the inactive short-circuit runs first.
        let resolver = PermissionResolver::new(DatabaseConnection::Disconnected);
        let user = test_user(1, false, true);

        let effective = resolver.effective(&user).await.unwrap();
        assert!(effective.is_empty());
        for source in PermSource::ALL {
            let set = resolver.source_permissions(&user, source).await.unwrap();
            assert!(set.is_empty());
        }
    }

    #[tokio::test]
    async fn test_object_argument_forces_empty_result() {
        let resolver = PermissionResolver::new(DatabaseConnection::Disconnected);
        let user = test_user(2, true, true);

        let effective = resolver.effective_with_object(&user, Some(42)).await.unwrap();
        assert!(effective.is_empty());
    }

    #[tokio::test]
    async fn test_effective_set_is_cached_per_resolver() {
        let resolver = PermissionResolver::new(DatabaseConnection::Disconnected);
        let user = test_user(3, true, false);

        let snapshot: HashSet<PermissionKey> =
            [PermissionKey::new("org", Action::Change, "room")].into();
        resolver
            .effective_cache
            .write()
            .await
            .insert(user.id, Arc::new(snapshot.clone()));

        // A cache hit never touches storage; with a disconnected
        // connection a miss would fail instead of answering.
        let first = resolver.effective(&user).await.unwrap();
        let second = resolver.effective(&user).await.unwrap();
        assert_eq!(*first, snapshot);
        assert_eq!(*second, snapshot);
        assert!(resolver
            .has(&user, &PermissionKey::new("org", Action::Change, "room"))
            .await
            .unwrap());
        assert!(!resolver
            .has(&user, &PermissionKey::new("org", Action::Delete, "room"))
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_source_cache_returns_snapshot() {
        let resolver = PermissionResolver::new(DatabaseConnection::Disconnected);
        let user = test_user(4, true, false);

        let direct: HashSet<PermissionKey> =
            [PermissionKey::new("org", Action::View, "user")].into();
        resolver
            .source_cache
            .write()
            .await
            .insert((user.id, PermSource::User), Arc::new(direct.clone()));

        let got = resolver
            .source_permissions(&user, PermSource::User)
            .await
            .unwrap();
        assert_eq!(*got, direct);
    }

    #[tokio::test]
    async fn test_effective_is_exact_union_of_sources() {
        let resolver = PermissionResolver::new(DatabaseConnection::Disconnected);
        let user = test_user(5, true, false);

        let direct: HashSet<PermissionKey> = [
            PermissionKey::new("org", Action::Change, "room"),
            PermissionKey::new("org", Action::View, "room"),
        ]
        .into();
        let group: HashSet<PermissionKey> = [
            PermissionKey::new("org", Action::View, "room"),
            PermissionKey::new("org", Action::View, "user"),
        ]
        .into();
        let room_set: HashSet<PermissionKey> =
            [PermissionKey::new("org", Action::View, "department")].into();
        let dept: HashSet<PermissionKey> = HashSet::new();

        {
            let mut cache = resolver.source_cache.write().await;
            cache.insert((user.id, PermSource::User), Arc::new(direct.clone()));
            cache.insert((user.id, PermSource::Group), Arc::new(group.clone()));
            cache.insert((user.id, PermSource::Room), Arc::new(room_set.clone()));
            cache.insert((user.id, PermSource::Department), Arc::new(dept.clone()));
        }

        let effective = resolver.effective(&user).await.unwrap();

        let mut expected = HashSet::new();
        for set in [&direct, &group, &room_set, &dept] {
            expected.extend(set.iter().cloned());
        }
        assert_eq!(*effective, expected);
        // Overlapping members collapse; nothing outside the sources appears
        assert_eq!(effective.len(), 4);
        assert!(effective.len() <= direct.len() + group.len() + room_set.len() + dept.len());
    }

    #[test]
    fn test_matrix_initializes_all_false() {
        let types = vec![ct(1, "department"), ct(2, "room")];
        let matrix = build_matrix(&types, &HashSet::new());

        assert_eq!(matrix.len(), 2);
        assert_eq!(matrix["org.department"], ActionFlags::default());
        assert_eq!(matrix["org.room"], ActionFlags::default());
    }

    #[test]
    fn test_matrix_change_implies_view_for_display() {
        let types = vec![ct(1, "room")];
        let perms: HashSet<PermissionKey> =
            [PermissionKey::new("org", Action::Change, "room")].into();

        let matrix = build_matrix(&types, &perms);
        let flags = matrix["org.room"];
        assert!(flags.change);
        assert!(flags.view);
        assert!(!flags.add);
        assert!(!flags.delete);
    }

    #[test]
    fn test_matrix_ignores_unknown_resource_types() {
        let types = vec![ct(1, "room")];
        let perms: HashSet<PermissionKey> =
            [PermissionKey::new("other", Action::View, "widget")].into();

        let matrix = build_matrix(&types, &perms);
        assert_eq!(matrix.len(), 1);
        assert_eq!(matrix["org.room"], ActionFlags::default());
    }
}
