//! Permission core
//!
//! 权限目录 (registry), 四来源合并解析 (resolver) 与菜单投影 (menu)

pub mod key;
pub mod menu;
pub mod registry;
pub mod resolver;

pub use key::{Action, PermissionKey};
pub use registry::{PermissionRegistry, Scope, APP_LABEL};
pub use resolver::{ActionFlags, PermSource, PermissionResolver};
