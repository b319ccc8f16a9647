//! Repository Traits
//!
//! Capabilities the joint repository composes. Implementations live in the
//! infrastructure layer; each reports errors in its own layer's vocabulary
//! (`persistent`, `in-memory`, `broker`).

use kernel::error::app_error::AppResult;

use crate::domain::entity::{
    Account, Group, GroupToAccount, IdAndHash, Instance, InstancePermissionToAccount, Permission,
    PermissionInfo, PermissionToGroup, PermissionToRole, Role, RoleToAccount, RoleToGroup, Scope,
    Service,
};
use crate::domain::value_object::{AccountState, Login, PermissionNumber, SessionToken, Ttl, UserId};

/// Authoritative relational store
#[trait_variant::make(PersistentRepository: Send)]
pub trait LocalPersistentRepository {
    /// Create the schema and the twelve tables if absent
    async fn bootstrap_schema(&self) -> AppResult<()>;

    async fn get_account_login_data(&self, login: &Login) -> AppResult<Account>;

    /// Insert an account; login and user-id are both unique
    async fn set_account_login_data(&self, account: &Account) -> AppResult<()>;

    async fn set_account_state(&self, login: &Login, state: AccountState) -> AppResult<()>;

    async fn create_service(&self, service: &Service) -> AppResult<()>;

    async fn create_instance(&self, instance: &Instance) -> AppResult<()>;

    /// Insert with the next dense number of the owning service
    async fn create_permission(&self, permission: &Permission) -> AppResult<PermissionNumber>;

    async fn create_role(&self, role: &Role) -> AppResult<()>;

    async fn create_group(&self, group: &Group) -> AppResult<()>;

    async fn assign_role_to_group(&self, edge: &RoleToGroup) -> AppResult<()>;

    async fn assign_permission_to_role(&self, edge: &PermissionToRole) -> AppResult<()>;

    async fn assign_permission_to_group(&self, edge: &PermissionToGroup) -> AppResult<()>;

    async fn assign_role_to_account(&self, edge: &RoleToAccount) -> AppResult<()>;

    async fn assign_group_to_account(&self, edge: &GroupToAccount) -> AppResult<()>;

    async fn assign_instance_permission_to_account(
        &self,
        edge: &InstancePermissionToAccount,
    ) -> AppResult<()>;

    /// Union of roles via groups, direct roles and direct group grants,
    /// sorted by number
    async fn get_service_permissions_for_account(
        &self,
        user_id: &UserId,
        service: &str,
    ) -> AppResult<Vec<PermissionInfo>>;

    async fn get_service_permissions_numbers_for_account(
        &self,
        user_id: &UserId,
        service: &str,
    ) -> AppResult<Vec<i32>>;

    async fn get_instance_permissions_for_account(
        &self,
        user_id: &UserId,
        instance: &str,
    ) -> AppResult<Vec<PermissionInfo>>;

    async fn get_instance_permissions_numbers_for_account(
        &self,
        user_id: &UserId,
        instance: &str,
    ) -> AppResult<Vec<i32>>;

    /// Number of `name` in the service that owns `instance`
    async fn get_permission_number(&self, name: &str, instance: &str) -> AppResult<PermissionNumber>;

    async fn get_accounts_logins_by_state(&self, state: AccountState) -> AppResult<Vec<Login>>;

    /// Release the pool
    async fn close(&self);
}

/// Key/value cache with per-entry TTL
///
/// Missing keys are reported as `empty result`.
#[trait_variant::make(MemoryRepository: Send)]
pub trait LocalMemoryRepository {
    /// Store `s:<token>` and index the token under its owner
    async fn save_session(&self, token: &SessionToken, user_id: &UserId, ttl: Ttl) -> AppResult<()>;

    async fn get_session_user_id(&self, token: &SessionToken) -> AppResult<UserId>;

    async fn delete_session(&self, token: &SessionToken) -> AppResult<()>;

    /// Delete every live session of `user_id`, returning how many there were
    async fn delete_user_sessions(&self, user_id: &UserId) -> AppResult<u64>;

    /// Forget every session (service restart)
    async fn drop_all_sessions(&self) -> AppResult<()>;

    async fn save_permission_numbers(
        &self,
        scope: Scope,
        name: &str,
        user_id: &UserId,
        numbers: &[i32],
        ttl: Ttl,
    ) -> AppResult<()>;

    async fn get_permission_numbers(
        &self,
        scope: Scope,
        name: &str,
        user_id: &UserId,
    ) -> AppResult<Vec<i32>>;

    /// Drop every `spn:*:<user-id>` and `ipn:*:<user-id>` entry
    async fn drop_user_permission_numbers(&self, user_id: &UserId) -> AppResult<()>;

    /// Drop every cached list for one service or instance
    async fn drop_scope_permission_numbers(&self, scope: Scope, name: &str) -> AppResult<()>;

    async fn save_login_to_id_and_hash(
        &self,
        login: &Login,
        value: &IdAndHash,
        ttl: Ttl,
    ) -> AppResult<()>;

    async fn get_id_and_hash(&self, login: &Login) -> AppResult<IdAndHash>;

    async fn save_account_state(&self, login: &Login, state: AccountState, ttl: Ttl)
    -> AppResult<()>;

    async fn get_account_state(&self, login: &Login) -> AppResult<AccountState>;

    async fn drop_account_state(&self, login: &Login) -> AppResult<()>;
}

/// Publisher for peer-instance notifications
#[trait_variant::make(BrokerProducer: Send)]
pub trait LocalBrokerProducer {
    /// Publish one payload on the configured topic
    async fn send(&self, payload: &[u8]) -> AppResult<()>;

    /// Close the writer
    async fn close(&self) -> AppResult<()>;
}
