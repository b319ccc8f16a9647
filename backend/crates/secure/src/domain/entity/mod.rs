pub mod account;
pub mod permission;
pub mod rbac;
pub mod session;

pub use account::{Account, IdAndHash};
pub use permission::{PermissionInfo, Scope};
pub use rbac::{
    Group, GroupToAccount, Instance, InstancePermissionToAccount, Permission, PermissionToGroup,
    PermissionToRole, Role, RoleToAccount, RoleToGroup, Service,
};
pub use session::Session;
