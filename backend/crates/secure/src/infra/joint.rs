//! Joint Repository
//!
//! The one storage facade the use cases talk to. Reads try the memory
//! store first and fall back to the persistent store, writing the result
//! through. Writes that touch a login run under the [`StateLocker`] so that
//! concurrent readers of that login observe the post-write value.
//!
//! Permission-number read-throughs are ordered against RBAC edge writes by
//! a generation counter: a writer bumps it after committing and before
//! dropping the cached lists, and a reader that saw it move while loading
//! discards what it cached.
//!
//! Every error leaving this module is of the `joint` kind.

use std::sync::atomic::{AtomicU64, Ordering};

use kernel::error::adapter::AdaptExt;
use kernel::error::app_error::AppResult;

use crate::domain::entity::{
    Account, Group, GroupToAccount, IdAndHash, Instance, InstancePermissionToAccount, Permission,
    PermissionInfo, PermissionToGroup, PermissionToRole, Role, RoleToAccount, RoleToGroup, Scope,
    Service,
};
use crate::domain::repository::{MemoryRepository, PersistentRepository};
use crate::domain::value_object::{
    AccountState, Login, PermissionNumber, PermissionNumbers, SessionToken, Ttl, UserId,
};
use crate::infra::state_locker::StateLocker;

/// Lifetimes of the cached entries
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheTtl {
    /// `s:` and `us:`
    pub session: Ttl,
    /// `spn:` and `ipn:`
    pub permissions: Ttl,
    /// `uh:` and `as:`
    pub account: Ttl,
}

/// Turn a memory miss into `None`, keep every other failure
fn cached<T>(result: AppResult<T>) -> AppResult<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(e) if e.is_empty_result() => Ok(None),
        Err(e) => Err(e),
    }
}

pub struct JointRepository<P, M> {
    persistent: P,
    memory: M,
    locker: StateLocker,
    rbac_generation: AtomicU64,
    ttl: CacheTtl,
}

impl<P, M> JointRepository<P, M>
where
    P: PersistentRepository + Sync,
    M: MemoryRepository + Sync,
{
    pub fn new(persistent: P, memory: M, ttl: CacheTtl) -> Self {
        Self {
            persistent,
            memory,
            locker: StateLocker::new(),
            rbac_generation: AtomicU64::new(0),
            ttl,
        }
    }

    pub fn ttl(&self) -> &CacheTtl {
        &self.ttl
    }

    pub fn persistent(&self) -> &P {
        &self.persistent
    }

    pub fn memory(&self) -> &M {
        &self.memory
    }

    pub fn locker(&self) -> &StateLocker {
        &self.locker
    }

    pub async fn bootstrap_schema(&self) -> AppResult<()> {
        self.persistent.bootstrap_schema().await.joint_err()
    }

    pub async fn close(&self) {
        self.persistent.close().await;
    }

    // ========================================================================
    // Accounts
    // ========================================================================

    /// Write both account cache entries; a failed cache write only costs a
    /// later persistent read
    async fn warm_account(&self, account: &Account) {
        let ttl = self.ttl.account;
        if let Err(e) = self
            .memory
            .save_account_state(&account.login, account.state, ttl)
            .await
        {
            tracing::warn!(login = %account.login, error = %e, "Failed to cache account state");
        }
        if let Err(e) = self
            .memory
            .save_login_to_id_and_hash(&account.login, &account.id_and_hash(), ttl)
            .await
        {
            tracing::warn!(login = %account.login, error = %e, "Failed to cache account credentials");
        }
    }

    /// Read-through of the account row, serialized with writers of `login`
    async fn load_account(&self, login: &Login) -> AppResult<Account> {
        let account = self
            .persistent
            .get_account_login_data(login)
            .await
            .joint_err()?;
        self.warm_account(&account).await;
        Ok(account)
    }

    pub async fn get_account_state(&self, login: &Login) -> AppResult<AccountState> {
        self.locker.ready_to_read(login.as_str()).await;
        if let Some(state) = cached(self.memory.get_account_state(login).await).joint_err()? {
            return Ok(state);
        }

        let _guard = self.locker.lock(login.as_str()).await;
        if let Some(state) = cached(self.memory.get_account_state(login).await).joint_err()? {
            return Ok(state);
        }
        Ok(self.load_account(login).await?.state)
    }

    pub async fn get_id_and_hash(&self, login: &Login) -> AppResult<IdAndHash> {
        self.locker.ready_to_read(login.as_str()).await;
        if let Some(found) = cached(self.memory.get_id_and_hash(login).await).joint_err()? {
            return Ok(found);
        }

        let _guard = self.locker.lock(login.as_str()).await;
        if let Some(found) = cached(self.memory.get_id_and_hash(login).await).joint_err()? {
            return Ok(found);
        }
        Ok(self.load_account(login).await?.id_and_hash())
    }

    /// User-id of `login` for callers already holding its lock
    async fn user_id_locked(&self, login: &Login) -> AppResult<UserId> {
        if let Some(found) = cached(self.memory.get_id_and_hash(login).await).joint_err()? {
            return Ok(found.user_id);
        }
        Ok(self.load_account(login).await?.user_id)
    }

    pub async fn create_account(&self, account: &Account) -> AppResult<()> {
        let _guard = self.locker.lock(account.login.as_str()).await;
        self.drop_account_entries(&account.login).await;
        self.persistent
            .set_account_login_data(account)
            .await
            .joint_err()?;
        self.warm_account(account).await;
        tracing::info!(login = %account.login, user_id = %account.user_id, "Account created");
        Ok(())
    }

    pub async fn set_account_state(&self, login: &Login, state: AccountState) -> AppResult<()> {
        let _guard = self.locker.lock(login.as_str()).await;
        if let Err(e) = self.memory.drop_account_state(login).await {
            tracing::warn!(%login, error = %e, "Failed to drop cached account state");
        }
        self.persistent
            .set_account_state(login, state)
            .await
            .joint_err()?;
        if let Err(e) = self
            .memory
            .save_account_state(login, state, self.ttl.account)
            .await
        {
            tracing::warn!(%login, error = %e, "Failed to cache account state");
        }
        tracing::info!(%login, %state, "Account state changed");
        Ok(())
    }

    async fn drop_account_entries(&self, login: &Login) {
        if let Err(e) = self.memory.drop_account_state(login).await {
            tracing::warn!(%login, error = %e, "Failed to drop cached account state");
        }
    }

    pub async fn get_accounts_logins_by_state(&self, state: AccountState) -> AppResult<Vec<Login>> {
        self.persistent
            .get_accounts_logins_by_state(state)
            .await
            .joint_err()
    }

    /// Prime `as:` for every account, returning how many entries were written
    pub async fn warm_account_states(&self) -> AppResult<usize> {
        let mut warmed = 0;
        for state in AccountState::ALL {
            let logins = self.get_accounts_logins_by_state(state).await?;
            for login in &logins {
                self.memory
                    .save_account_state(login, state, self.ttl.account)
                    .await
                    .joint_err()?;
            }
            warmed += logins.len();
        }
        Ok(warmed)
    }

    // ========================================================================
    // Sessions
    // ========================================================================

    pub async fn save_session(&self, token: &SessionToken, user_id: &UserId) -> AppResult<()> {
        self.memory
            .save_session(token, user_id, self.ttl.session)
            .await
            .joint_err()
    }

    pub async fn get_session_user_id(&self, token: &SessionToken) -> AppResult<UserId> {
        self.memory.get_session_user_id(token).await.joint_err()
    }

    pub async fn session_exists(&self, token: &SessionToken) -> AppResult<bool> {
        let found = cached(self.memory.get_session_user_id(token).await).joint_err()?;
        Ok(found.is_some())
    }

    pub async fn delete_session(&self, token: &SessionToken) -> AppResult<()> {
        self.memory.delete_session(token).await.joint_err()
    }

    pub async fn delete_user_sessions(&self, user_id: &UserId) -> AppResult<u64> {
        self.memory.delete_user_sessions(user_id).await.joint_err()
    }

    pub async fn drop_all_sessions(&self) -> AppResult<()> {
        self.memory.drop_all_sessions().await.joint_err()
    }

    // ========================================================================
    // RBAC records
    // ========================================================================

    pub async fn create_service(&self, service: &Service) -> AppResult<()> {
        self.persistent.create_service(service).await.joint_err()
    }

    pub async fn create_instance(&self, instance: &Instance) -> AppResult<()> {
        self.persistent.create_instance(instance).await.joint_err()
    }

    pub async fn create_permission(&self, permission: &Permission) -> AppResult<PermissionNumber> {
        self.persistent.create_permission(permission).await.joint_err()
    }

    pub async fn create_role(&self, role: &Role) -> AppResult<()> {
        self.persistent.create_role(role).await.joint_err()
    }

    pub async fn create_group(&self, group: &Group) -> AppResult<()> {
        self.persistent.create_group(group).await.joint_err()
    }

    // ========================================================================
    // RBAC edges
    // ========================================================================

    fn rbac_generation(&self) -> u64 {
        self.rbac_generation.load(Ordering::SeqCst)
    }

    /// Called after the edge is committed and before any cached list is dropped
    fn bump_rbac_generation(&self) {
        self.rbac_generation.fetch_add(1, Ordering::SeqCst);
    }

    async fn forget_service(&self, service: &str) {
        self.bump_rbac_generation();
        if let Err(e) = self
            .memory
            .drop_scope_permission_numbers(Scope::Service, service)
            .await
        {
            tracing::warn!(service, error = %e, "Failed to drop cached permission numbers");
        }
    }

    async fn forget_user(&self, user_id: &UserId) {
        self.bump_rbac_generation();
        if let Err(e) = self.memory.drop_user_permission_numbers(user_id).await {
            tracing::warn!(%user_id, error = %e, "Failed to drop cached permission numbers");
        }
    }

    // Group and role edges reach every member of the service

    pub async fn assign_role_to_group(&self, edge: &RoleToGroup) -> AppResult<()> {
        self.persistent.assign_role_to_group(edge).await.joint_err()?;
        self.forget_service(&edge.service).await;
        Ok(())
    }

    pub async fn assign_permission_to_role(&self, edge: &PermissionToRole) -> AppResult<()> {
        self.persistent
            .assign_permission_to_role(edge)
            .await
            .joint_err()?;
        self.forget_service(&edge.service).await;
        Ok(())
    }

    pub async fn assign_permission_to_group(&self, edge: &PermissionToGroup) -> AppResult<()> {
        self.persistent
            .assign_permission_to_group(edge)
            .await
            .joint_err()?;
        self.forget_service(&edge.service).await;
        Ok(())
    }

    pub async fn assign_role_to_account(&self, edge: &RoleToAccount) -> AppResult<()> {
        let _guard = self.locker.lock(edge.login.as_str()).await;
        self.persistent.assign_role_to_account(edge).await.joint_err()?;
        let user_id = self.user_id_locked(&edge.login).await?;
        self.forget_user(&user_id).await;
        Ok(())
    }

    pub async fn assign_group_to_account(&self, edge: &GroupToAccount) -> AppResult<()> {
        let _guard = self.locker.lock(edge.login.as_str()).await;
        self.persistent
            .assign_group_to_account(edge)
            .await
            .joint_err()?;
        let user_id = self.user_id_locked(&edge.login).await?;
        self.forget_user(&user_id).await;
        Ok(())
    }

    pub async fn assign_instance_permission_to_account(
        &self,
        edge: &InstancePermissionToAccount,
    ) -> AppResult<()> {
        let _guard = self.locker.lock(edge.login.as_str()).await;
        self.persistent
            .assign_instance_permission_to_account(edge)
            .await
            .joint_err()?;
        let user_id = self.user_id_locked(&edge.login).await?;
        self.forget_user(&user_id).await;
        Ok(())
    }

    // ========================================================================
    // Permission queries
    // ========================================================================

    async fn permission_numbers(
        &self,
        scope: Scope,
        name: &str,
        user_id: &UserId,
    ) -> AppResult<Vec<i32>> {
        if let Some(numbers) =
            cached(self.memory.get_permission_numbers(scope, name, user_id).await).joint_err()?
        {
            return Ok(numbers);
        }

        let generation = self.rbac_generation();
        let loaded = match scope {
            Scope::Service => {
                self.persistent
                    .get_service_permissions_numbers_for_account(user_id, name)
                    .await
            }
            Scope::Instance => {
                self.persistent
                    .get_instance_permissions_numbers_for_account(user_id, name)
                    .await
            }
        }
        .joint_err()?;

        let numbers = PermissionNumbers::from_unsorted(loaded).into_vec();
        if self.rbac_generation() != generation {
            tracing::debug!(scope = scope.prefix(), name, "Edges changed during load, not caching");
            return Ok(numbers);
        }
        if let Err(e) = self
            .memory
            .save_permission_numbers(scope, name, user_id, &numbers, self.ttl.permissions)
            .await
        {
            tracing::warn!(scope = scope.prefix(), name, error = %e, "Failed to cache permission numbers");
            return Ok(numbers);
        }
        // A writer that bumped between the check and the save may have
        // dropped the lists before this one landed
        if self.rbac_generation() != generation {
            if let Err(e) = self.memory.drop_user_permission_numbers(user_id).await {
                tracing::warn!(%user_id, error = %e, "Failed to drop cached permission numbers");
            }
        }
        Ok(numbers)
    }

    pub async fn service_permissions_numbers(
        &self,
        user_id: &UserId,
        service: &str,
    ) -> AppResult<Vec<i32>> {
        self.permission_numbers(Scope::Service, service, user_id).await
    }

    pub async fn instance_permissions_numbers(
        &self,
        user_id: &UserId,
        instance: &str,
    ) -> AppResult<Vec<i32>> {
        self.permission_numbers(Scope::Instance, instance, user_id)
            .await
    }

    pub async fn service_permissions(
        &self,
        user_id: &UserId,
        service: &str,
    ) -> AppResult<Vec<PermissionInfo>> {
        self.persistent
            .get_service_permissions_for_account(user_id, service)
            .await
            .joint_err()
    }

    pub async fn instance_permissions(
        &self,
        user_id: &UserId,
        instance: &str,
    ) -> AppResult<Vec<PermissionInfo>> {
        self.persistent
            .get_instance_permissions_for_account(user_id, instance)
            .await
            .joint_err()
    }

    pub async fn get_permission_number(
        &self,
        name: &str,
        instance: &str,
    ) -> AppResult<PermissionNumber> {
        self.persistent
            .get_permission_number(name, instance)
            .await
            .joint_err()
    }
}
