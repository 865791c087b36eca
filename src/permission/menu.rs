//! Menu/capability projector
//!
//! Derives the ordered capability token list that drives client-side
//! navigation: a role marker, the user's department and room codes, then
//! one token per viewable resource type.

use sea_orm::{DatabaseConnection, EntityTrait};

use crate::entity::{department, room, user};
use crate::error::AppResult;

use super::key::{Action, PermissionKey};
use super::resolver::PermissionResolver;

/// 角色标记, 互斥: manager > leader > member
fn role_marker(user: &user::Model) -> &'static str {
    if user.is_manager {
        "manager"
    } else if user.is_leader {
        "leader"
    } else {
        "member"
    }
}

/// Assemble the token list from already-resolved inputs. View tokens are
/// sorted so the projection is deterministic across storage backends.
fn assemble(
    role: &'static str,
    codes: Option<(String, String)>,
    mut view_models: Vec<String>,
) -> Vec<String> {
    let mut menu = vec![role.to_string()];
    if let Some((department_code, room_code)) = codes {
        menu.push(department_code);
        menu.push(room_code);
    }
    view_models.sort();
    menu.append(&mut view_models);
    menu
}

/// Build the capability list for a user.
pub async fn build_menu(
    db: &DatabaseConnection,
    resolver: &PermissionResolver,
    user: &user::Model,
) -> AppResult<Vec<String>> {
    let codes = position_codes(db, user).await?;

    let perms = resolver.effective(user).await?;
    let view_models = resolver
        .registry()
        .content_types()
        .await?
        .into_iter()
        .filter(|t| perms.contains(&PermissionKey::new(&t.app_label, Action::View, &t.model)))
        .map(|t| t.model)
        .collect();

    Ok(assemble(role_marker(user), codes, view_models))
}

/// 部门编码 + 科室编码; 无科室或查询落空时整步跳过
async fn position_codes(
    db: &DatabaseConnection,
    user: &user::Model,
) -> AppResult<Option<(String, String)>> {
    let Some(room_id) = user.room_id else {
        return Ok(None);
    };
    let Some(room) = room::Entity::find_by_id(room_id).one(db).await? else {
        return Ok(None);
    };
    let Some(dept) = department::Entity::find_by_id(room.department_id).one(db).await? else {
        return Ok(None);
    };
    Ok(Some((dept.code, room.code)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flagged_user(is_manager: bool, is_leader: bool) -> user::Model {
        user::Model {
            id: 1,
            username: "durant".to_string(),
            password: String::new(),
            realname: None,
            email: None,
            mobile: None,
            avatar: None,
            gender: "M".to_string(),
            position: None,
            bio: None,
            room_id: None,
            is_superuser: false,
            is_active: true,
            is_manager,
            is_leader,
            last_login: 0,
            date_joined: 0,
        }
    }

    #[test]
    fn test_role_marker_priority() {
        assert_eq!(role_marker(&flagged_user(true, true)), "manager");
        assert_eq!(role_marker(&flagged_user(true, false)), "manager");
        assert_eq!(role_marker(&flagged_user(false, true)), "leader");
        assert_eq!(role_marker(&flagged_user(false, false)), "member");
    }

    #[test]
    fn test_assemble_with_codes_and_sorted_views() {
        let menu = assemble(
            "leader",
            Some(("eng".to_string(), "cim".to_string())),
            vec!["user".to_string(), "department".to_string(), "room".to_string()],
        );
        assert_eq!(menu, ["leader", "eng", "cim", "department", "room", "user"]);
    }

    #[test]
    fn test_assemble_without_room_skips_codes() {
        let menu = assemble("member", None, vec!["room".to_string()]);
        assert_eq!(menu, ["member", "room"]);
    }
}
