//! Test doubles for the storage capabilities

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use kernel::error::app_error::{AppError, AppResult};
use kernel::error::messages::{broker, persistent};

use crate::domain::entity::{
    Account, Group, GroupToAccount, Instance, InstancePermissionToAccount, Permission,
    PermissionInfo, PermissionToGroup, PermissionToRole, Role, RoleToAccount, RoleToGroup, Service,
};
use crate::domain::repository::{BrokerProducer, PersistentRepository};
use crate::domain::value_object::{
    AccountState, Login, Password, PermissionNumber, UserId,
};

/// Service-scoped name, e.g. a role or a group
type Scoped = (String, String);

#[derive(Default)]
struct Tables {
    accounts: Vec<Account>,
    services: BTreeMap<String, String>,
    instances: HashMap<String, String>,
    /// (service, name) -> (number, description)
    permissions: BTreeMap<Scoped, (i32, String)>,
    roles: BTreeSet<Scoped>,
    groups: BTreeSet<Scoped>,
    group_roles: BTreeSet<(String, String, String)>,
    role_permissions: BTreeSet<(String, String, String)>,
    group_permissions: BTreeSet<(String, String, String)>,
    account_roles: BTreeSet<(String, String, String)>,
    account_groups: BTreeSet<(String, String, String)>,
    instance_grants: BTreeSet<(String, String, String)>,
}

/// In-memory stand-in for the relational store
///
/// Reports errors with the same messages the Postgres adapter produces.
#[derive(Default)]
pub struct FakePersistentRepository {
    tables: Mutex<Tables>,
    account_reads: AtomicUsize,
    permission_reads: AtomicUsize,
    read_delay: Mutex<Option<Duration>>,
    permission_read_delay: Mutex<Option<Duration>>,
}

fn no_rows() -> AppError {
    AppError::persistent(persistent::NO_ROWS)
}

fn duplicate() -> AppError {
    AppError::persistent(format!("{} \"fake\"", persistent::DUPLICATE_KEY))
}

fn zero_rows() -> AppError {
    AppError::persistent(persistent::ZERO_ROWS_AFFECTED)
}

impl FakePersistentRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn tables(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Insert an enabled account hashed at the lowest bcrypt cost
    pub fn with_account(self, login: &str, password: &str, user_id: UserId) -> Self {
        let password = Password::new(password).unwrap();
        let account = Account {
            login: Login::new(login).unwrap(),
            user_id,
            password_hash: password.hash(4, None).unwrap(),
            state: AccountState::Enabled,
        };
        self.tables().accounts.push(account);
        self
    }

    /// Slow down account reads to widen race windows
    pub fn set_read_delay(&self, delay: Duration) {
        *self.read_delay.lock().unwrap_or_else(|e| e.into_inner()) = Some(delay);
    }

    /// Hold permission-number results for `delay` after reading the rows,
    /// so the caller returns a snapshot that may be outdated
    pub fn set_permission_read_delay(&self, delay: Duration) {
        *self
            .permission_read_delay
            .lock()
            .unwrap_or_else(|e| e.into_inner()) = Some(delay);
    }

    async fn permission_read_pause(&self) {
        let delay = *self
            .permission_read_delay
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }

    pub fn account_reads(&self) -> usize {
        self.account_reads.load(Ordering::SeqCst)
    }

    pub fn permission_reads(&self) -> usize {
        self.permission_reads.load(Ordering::SeqCst)
    }

    pub fn state_of(&self, login: &str) -> Option<AccountState> {
        self.tables()
            .accounts
            .iter()
            .find(|a| a.login.as_str() == login)
            .map(|a| a.state)
    }

    fn login_of(&self, user_id: &UserId) -> Option<String> {
        self.tables()
            .accounts
            .iter()
            .find(|a| &a.user_id == user_id)
            .map(|a| a.login.as_str().to_owned())
    }

    fn require_account(tables: &Tables, login: &str) -> AppResult<()> {
        if tables.accounts.iter().any(|a| a.login.as_str() == login) {
            Ok(())
        } else {
            Err(zero_rows())
        }
    }

    fn info(tables: &Tables, service: &str, name: &str) -> Option<PermissionInfo> {
        tables
            .permissions
            .get(&(service.to_owned(), name.to_owned()))
            .map(|(number, description)| PermissionInfo {
                name: name.to_owned(),
                number: *number,
                description: description.clone(),
            })
    }

    fn service_permissions(&self, user_id: &UserId, service: &str) -> Vec<PermissionInfo> {
        self.permission_reads.fetch_add(1, Ordering::SeqCst);
        let Some(login) = self.login_of(user_id) else {
            return Vec::new();
        };
        let tables = self.tables();
        let mut names = BTreeSet::new();

        let holds_group = |group: &str| {
            tables
                .account_groups
                .contains(&(service.to_owned(), group.to_owned(), login.clone()))
        };
        let holds_role = |role: &str| {
            tables
                .account_roles
                .contains(&(service.to_owned(), role.to_owned(), login.clone()))
        };

        for (svc, role, permission) in &tables.role_permissions {
            if svc != service {
                continue;
            }
            let via_group = tables
                .group_roles
                .iter()
                .any(|(s, group, r)| s == service && r == role && holds_group(group));
            if via_group || holds_role(role) {
                names.insert(permission.clone());
            }
        }
        for (svc, group, permission) in &tables.group_permissions {
            if svc == service && holds_group(group) {
                names.insert(permission.clone());
            }
        }

        let mut found: Vec<PermissionInfo> = names
            .iter()
            .filter_map(|name| Self::info(&tables, service, name))
            .collect();
        found.sort_by_key(|p| p.number);
        found
    }

    fn instance_permissions(&self, user_id: &UserId, instance: &str) -> Vec<PermissionInfo> {
        self.permission_reads.fetch_add(1, Ordering::SeqCst);
        let Some(login) = self.login_of(user_id) else {
            return Vec::new();
        };
        let tables = self.tables();
        let Some(service) = tables.instances.get(instance) else {
            return Vec::new();
        };
        let mut found: Vec<PermissionInfo> = tables
            .instance_grants
            .iter()
            .filter(|(i, _, l)| i == instance && *l == login)
            .filter_map(|(_, permission, _)| Self::info(&tables, service, permission))
            .collect();
        found.sort_by_key(|p| p.number);
        found
    }
}

impl PersistentRepository for FakePersistentRepository {
    async fn bootstrap_schema(&self) -> AppResult<()> {
        Ok(())
    }

    async fn get_account_login_data(&self, login: &Login) -> AppResult<Account> {
        self.account_reads.fetch_add(1, Ordering::SeqCst);
        let delay = *self.read_delay.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.tables()
            .accounts
            .iter()
            .find(|a| &a.login == login)
            .cloned()
            .ok_or_else(no_rows)
    }

    async fn set_account_login_data(&self, account: &Account) -> AppResult<()> {
        let mut tables = self.tables();
        if tables
            .accounts
            .iter()
            .any(|a| a.login == account.login || a.user_id == account.user_id)
        {
            return Err(duplicate());
        }
        tables.accounts.push(account.clone());
        Ok(())
    }

    async fn set_account_state(&self, login: &Login, state: AccountState) -> AppResult<()> {
        let mut tables = self.tables();
        let account = tables
            .accounts
            .iter_mut()
            .find(|a| &a.login == login)
            .ok_or_else(zero_rows)?;
        account.state = state;
        Ok(())
    }

    async fn create_service(&self, service: &Service) -> AppResult<()> {
        let mut tables = self.tables();
        if tables.services.contains_key(&service.name) {
            return Err(duplicate());
        }
        tables
            .services
            .insert(service.name.clone(), service.description.clone());
        Ok(())
    }

    async fn create_instance(&self, instance: &Instance) -> AppResult<()> {
        let mut tables = self.tables();
        if !tables.services.contains_key(&instance.service) {
            return Err(zero_rows());
        }
        if tables.instances.contains_key(&instance.name) {
            return Err(duplicate());
        }
        tables
            .instances
            .insert(instance.name.clone(), instance.service.clone());
        Ok(())
    }

    async fn create_permission(&self, permission: &Permission) -> AppResult<PermissionNumber> {
        let mut tables = self.tables();
        if !tables.services.contains_key(&permission.service) {
            return Err(no_rows());
        }
        let key = (permission.service.clone(), permission.name.clone());
        if tables.permissions.contains_key(&key) {
            return Err(duplicate());
        }
        let next = tables
            .permissions
            .iter()
            .filter(|((svc, _), _)| svc == &permission.service)
            .map(|(_, (number, _))| *number)
            .max()
            .unwrap_or(0)
            + 1;
        tables
            .permissions
            .insert(key, (next, permission.description.clone()));
        Ok(PermissionNumber::new(next).unwrap())
    }

    async fn create_role(&self, role: &Role) -> AppResult<()> {
        let mut tables = self.tables();
        if !tables.services.contains_key(&role.service) {
            return Err(zero_rows());
        }
        if !tables.roles.insert((role.service.clone(), role.name.clone())) {
            return Err(duplicate());
        }
        Ok(())
    }

    async fn create_group(&self, group: &Group) -> AppResult<()> {
        let mut tables = self.tables();
        if !tables.services.contains_key(&group.service) {
            return Err(zero_rows());
        }
        if !tables.groups.insert((group.service.clone(), group.name.clone())) {
            return Err(duplicate());
        }
        Ok(())
    }

    async fn assign_role_to_group(&self, edge: &RoleToGroup) -> AppResult<()> {
        let mut tables = self.tables();
        let role = (edge.service.clone(), edge.role.clone());
        let group = (edge.service.clone(), edge.group.clone());
        if !tables.roles.contains(&role) || !tables.groups.contains(&group) {
            return Err(zero_rows());
        }
        let row = (edge.service.clone(), edge.group.clone(), edge.role.clone());
        if !tables.group_roles.insert(row) {
            return Err(duplicate());
        }
        Ok(())
    }

    async fn assign_permission_to_role(&self, edge: &PermissionToRole) -> AppResult<()> {
        let mut tables = self.tables();
        let role = (edge.service.clone(), edge.role.clone());
        let permission = (edge.service.clone(), edge.permission.clone());
        if !tables.roles.contains(&role) || !tables.permissions.contains_key(&permission) {
            return Err(zero_rows());
        }
        let row = (edge.service.clone(), edge.role.clone(), edge.permission.clone());
        if !tables.role_permissions.insert(row) {
            return Err(duplicate());
        }
        Ok(())
    }

    async fn assign_permission_to_group(&self, edge: &PermissionToGroup) -> AppResult<()> {
        let mut tables = self.tables();
        let group = (edge.service.clone(), edge.group.clone());
        let permission = (edge.service.clone(), edge.permission.clone());
        if !tables.groups.contains(&group) || !tables.permissions.contains_key(&permission) {
            return Err(zero_rows());
        }
        let row = (edge.service.clone(), edge.group.clone(), edge.permission.clone());
        if !tables.group_permissions.insert(row) {
            return Err(duplicate());
        }
        Ok(())
    }

    async fn assign_role_to_account(&self, edge: &RoleToAccount) -> AppResult<()> {
        let mut tables = self.tables();
        Self::require_account(&tables, edge.login.as_str())?;
        if !tables
            .roles
            .contains(&(edge.service.clone(), edge.role.clone()))
        {
            return Err(zero_rows());
        }
        let row = (
            edge.service.clone(),
            edge.role.clone(),
            edge.login.as_str().to_owned(),
        );
        if !tables.account_roles.insert(row) {
            return Err(duplicate());
        }
        Ok(())
    }

    async fn assign_group_to_account(&self, edge: &GroupToAccount) -> AppResult<()> {
        let mut tables = self.tables();
        Self::require_account(&tables, edge.login.as_str())?;
        if !tables
            .groups
            .contains(&(edge.service.clone(), edge.group.clone()))
        {
            return Err(zero_rows());
        }
        let row = (
            edge.service.clone(),
            edge.group.clone(),
            edge.login.as_str().to_owned(),
        );
        if !tables.account_groups.insert(row) {
            return Err(duplicate());
        }
        Ok(())
    }

    async fn assign_instance_permission_to_account(
        &self,
        edge: &InstancePermissionToAccount,
    ) -> AppResult<()> {
        let mut tables = self.tables();
        Self::require_account(&tables, edge.login.as_str())?;
        let Some(service) = tables.instances.get(&edge.instance).cloned() else {
            return Err(zero_rows());
        };
        if !tables
            .permissions
            .contains_key(&(service, edge.permission.clone()))
        {
            return Err(zero_rows());
        }
        let row = (
            edge.instance.clone(),
            edge.permission.clone(),
            edge.login.as_str().to_owned(),
        );
        if !tables.instance_grants.insert(row) {
            return Err(duplicate());
        }
        Ok(())
    }

    async fn get_service_permissions_for_account(
        &self,
        user_id: &UserId,
        service: &str,
    ) -> AppResult<Vec<PermissionInfo>> {
        Ok(self.service_permissions(user_id, service))
    }

    async fn get_service_permissions_numbers_for_account(
        &self,
        user_id: &UserId,
        service: &str,
    ) -> AppResult<Vec<i32>> {
        let numbers = self
            .service_permissions(user_id, service)
            .into_iter()
            .map(|p| p.number)
            .collect();
        self.permission_read_pause().await;
        Ok(numbers)
    }

    async fn get_instance_permissions_for_account(
        &self,
        user_id: &UserId,
        instance: &str,
    ) -> AppResult<Vec<PermissionInfo>> {
        Ok(self.instance_permissions(user_id, instance))
    }

    async fn get_instance_permissions_numbers_for_account(
        &self,
        user_id: &UserId,
        instance: &str,
    ) -> AppResult<Vec<i32>> {
        let numbers = self
            .instance_permissions(user_id, instance)
            .into_iter()
            .map(|p| p.number)
            .collect();
        self.permission_read_pause().await;
        Ok(numbers)
    }

    async fn get_permission_number(&self, name: &str, instance: &str) -> AppResult<PermissionNumber> {
        let tables = self.tables();
        let service = tables.instances.get(instance).ok_or_else(no_rows)?;
        let (number, _) = tables
            .permissions
            .get(&(service.clone(), name.to_owned()))
            .ok_or_else(no_rows)?;
        Ok(PermissionNumber::new(*number).unwrap())
    }

    async fn get_accounts_logins_by_state(&self, state: AccountState) -> AppResult<Vec<Login>> {
        let mut logins: Vec<Login> = self
            .tables()
            .accounts
            .iter()
            .filter(|a| a.state == state)
            .map(|a| a.login.clone())
            .collect();
        logins.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        Ok(logins)
    }

    async fn close(&self) {}
}

/// Broker double that records every payload
#[derive(Default)]
pub struct RecordingProducer {
    sent: Mutex<Vec<Vec<u8>>>,
    fail: bool,
}

impl RecordingProducer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            sent: Mutex::default(),
            fail: true,
        }
    }

    pub fn sent(&self) -> Vec<Vec<u8>> {
        self.sent.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl BrokerProducer for RecordingProducer {
    async fn send(&self, payload: &[u8]) -> AppResult<()> {
        if self.fail {
            return Err(AppError::broker(broker::SEND_FAILED));
        }
        self.sent
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(payload.to_vec());
        Ok(())
    }

    async fn close(&self) -> AppResult<()> {
        Ok(())
    }
}
