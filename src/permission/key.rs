//! Permission keys
//!
//! A permission is an action on a resource type. The structured form is
//! used everywhere inside the crate; the canonical string form
//! `"<app>.<action>_<model>"` only appears at the API boundary.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// 操作类型
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    View,
    Add,
    Change,
    Delete,
}

impl Action {
    /// All actions, in matrix column order.
    pub const ALL: [Action; 4] = [Action::View, Action::Add, Action::Change, Action::Delete];

    pub fn as_str(&self) -> &'static str {
        match self {
            Action::View => "view",
            Action::Add => "add",
            Action::Change => "change",
            Action::Delete => "delete",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "view" => Ok(Action::View),
            "add" => Ok(Action::Add),
            "change" => Ok(Action::Change),
            "delete" => Ok(Action::Delete),
            other => Err(AppError::Validation(format!("unknown action: {}", other))),
        }
    }
}

/// 一条可授予的权限: 对某资源类型执行某操作
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PermissionKey {
    pub app: String,
    pub action: Action,
    pub model: String,
}

impl PermissionKey {
    pub fn new(app: impl Into<String>, action: Action, model: impl Into<String>) -> Self {
        Self {
            app: app.into(),
            action,
            model: model.into(),
        }
    }

    /// 代号部分, 如 "change_room"
    pub fn codename(&self) -> String {
        format!("{}_{}", self.action, self.model)
    }

    /// Parse the canonical `"app.action_model"` form.
    pub fn parse(s: &str) -> Result<Self, AppError> {
        let (app, codename) = s
            .split_once('.')
            .ok_or_else(|| AppError::Validation(format!("malformed permission key: {}", s)))?;
        let (action, model) = codename
            .split_once('_')
            .ok_or_else(|| AppError::Validation(format!("malformed permission key: {}", s)))?;
        if app.is_empty() || model.is_empty() {
            return Err(AppError::Validation(format!("malformed permission key: {}", s)));
        }
        Ok(Self {
            app: app.to_string(),
            action: action.parse()?,
            model: model.to_string(),
        })
    }
}

impl fmt::Display for PermissionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}_{}", self.app, self.action, self.model)
    }
}

impl FromStr for PermissionKey {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_round_trip() {
        for action in Action::ALL {
            assert_eq!(action.as_str().parse::<Action>().unwrap(), action);
        }
    }

    #[test]
    fn test_unknown_action_rejected() {
        let result = "execute".parse::<Action>();
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[test]
    fn test_key_canonical_form() {
        let key = PermissionKey::new("org", Action::Change, "room");
        assert_eq!(key.to_string(), "org.change_room");
        assert_eq!(key.codename(), "change_room");
    }

    #[test]
    fn test_key_parse_round_trip() {
        let key = PermissionKey::parse("org.delete_department").unwrap();
        assert_eq!(key.app, "org");
        assert_eq!(key.action, Action::Delete);
        assert_eq!(key.model, "department");
        assert_eq!(PermissionKey::parse(&key.to_string()).unwrap(), key);
    }

    #[test]
    fn test_key_model_keeps_inner_underscores() {
        let key = PermissionKey::parse("org.view_content_type").unwrap();
        assert_eq!(key.model, "content_type");
    }

    #[test]
    fn test_malformed_keys_rejected() {
        for input in ["changeroom", "org.changeroom", ".change_room", "org.change_", "org.fly_room"] {
            assert!(
                PermissionKey::parse(input).is_err(),
                "expected {} to be rejected",
                input
            );
        }
    }
}
