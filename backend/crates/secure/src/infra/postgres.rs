//! PostgreSQL Repository Implementation
//!
//! Every statement is parameterized and runs under the configured query
//! timeout. Foreign keys are resolved by name inside the statement itself.

use std::panic::Location;
use std::time::Duration;

use kernel::error::app_error::{AppError, AppResult};
use kernel::error::conversions::{PersistentResultExt, from_sqlx};
use kernel::error::kind::ErrorKind;
use kernel::error::messages::persistent;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions, PgQueryResult};
use sqlx::PgPool;
use tokio::time::error::Elapsed;
use uuid::Uuid;

use crate::domain::entity::{
    Account, Group, GroupToAccount, Instance, InstancePermissionToAccount, Permission,
    PermissionInfo, PermissionToGroup, PermissionToRole, Role, RoleToAccount, RoleToGroup, Service,
};
use crate::domain::repository::PersistentRepository;
use crate::domain::value_object::{
    AccountState, Login, PasswordHash, PermissionNumber, UserId,
};

pub const DEFAULT_SCHEMA: &str = "public";

/// Connection settings for the relational store
#[derive(Clone, PartialEq, Eq)]
pub struct PostgresOptions {
    pub login: String,
    pub password: String,
    pub address: String,
    pub port: u16,
    pub name: String,
    pub max_open_connections: u32,
    pub schema: Option<String>,
    pub query_timeout: Duration,
}

impl std::fmt::Debug for PostgresOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostgresOptions")
            .field("login", &self.login)
            .field("password", &"[REDACTED]")
            .field("address", &self.address)
            .field("port", &self.port)
            .field("name", &self.name)
            .field("max_open_connections", &self.max_open_connections)
            .field("schema", &self.schema)
            .field("query_timeout", &self.query_timeout)
            .finish()
    }
}

impl PostgresOptions {
    pub fn schema(&self) -> &str {
        self.schema
            .as_deref()
            .filter(|s| !s.is_empty())
            .unwrap_or(DEFAULT_SCHEMA)
    }
}

/// Schema names end up in DDL, which cannot be parameterized
pub fn validate_schema_name(schema: &str) -> AppResult<()> {
    let mut chars = schema.chars();
    let valid_start = chars
        .next()
        .is_some_and(|c| c.is_ascii_lowercase() || c == '_');
    let valid_rest = chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');
    if valid_start && valid_rest && schema.len() <= 63 {
        Ok(())
    } else {
        Err(AppError::persistent(persistent::INVALID_SCHEMA_NAME))
    }
}

// ============================================================================
// Result helpers
// ============================================================================

/// Flatten a timed query into the persistent vocabulary
trait TimedQueryExt<T> {
    fn query_err(self) -> AppResult<T>;
}

impl<T> TimedQueryExt<T> for Result<Result<T, sqlx::Error>, Elapsed> {
    #[track_caller]
    fn query_err(self) -> AppResult<T> {
        let origin = Location::caller();
        match self {
            Ok(result) => result.map_err(|e| from_sqlx(e, origin)),
            Err(elapsed) => Err(
                AppError::at(ErrorKind::Persistent, persistent::QUERY_TIMEOUT, origin)
                    .with_source(elapsed),
            ),
        }
    }
}

/// Duplicates are already `duplicate key value ...`; a statement that
/// touched nothing is `zero rows affected`
#[track_caller]
fn process_exec_result(result: AppResult<PgQueryResult>) -> AppResult<()> {
    let done = result?;
    if done.rows_affected() == 0 {
        return Err(AppError::persistent(persistent::ZERO_ROWS_AFFECTED));
    }
    Ok(())
}

#[track_caller]
fn corrupted<E>(err: E) -> AppError
where
    E: std::error::Error + Send + Sync + 'static,
{
    AppError::persistent(persistent::CORRUPTED_ROW).with_source(err)
}

// ============================================================================
// Schema
// ============================================================================

const TABLES: [&str; 12] = [
    r#"
    CREATE TABLE IF NOT EXISTS accounts (
        id BIGSERIAL PRIMARY KEY,
        user_id UUID NOT NULL UNIQUE,
        login VARCHAR(100) NOT NULL UNIQUE,
        password_hash CHAR(60) NOT NULL,
        state SMALLINT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS services (
        id BIGSERIAL PRIMARY KEY,
        name VARCHAR(100) NOT NULL UNIQUE,
        description TEXT NOT NULL DEFAULT ''
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS instances (
        id BIGSERIAL PRIMARY KEY,
        name VARCHAR(100) NOT NULL UNIQUE,
        service_id BIGINT NOT NULL REFERENCES services (id) ON DELETE CASCADE
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS permissions (
        id BIGSERIAL PRIMARY KEY,
        service_id BIGINT NOT NULL REFERENCES services (id) ON DELETE CASCADE,
        name VARCHAR(100) NOT NULL,
        number INTEGER NOT NULL,
        description TEXT NOT NULL DEFAULT '',
        UNIQUE (service_id, name),
        UNIQUE (service_id, number)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS roles (
        id BIGSERIAL PRIMARY KEY,
        service_id BIGINT NOT NULL REFERENCES services (id) ON DELETE CASCADE,
        name VARCHAR(100) NOT NULL,
        description TEXT NOT NULL DEFAULT '',
        UNIQUE (service_id, name)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS groups (
        id BIGSERIAL PRIMARY KEY,
        service_id BIGINT NOT NULL REFERENCES services (id) ON DELETE CASCADE,
        name VARCHAR(100) NOT NULL,
        description TEXT NOT NULL DEFAULT '',
        UNIQUE (service_id, name)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS accounts_instances_permissions (
        account_id BIGINT NOT NULL REFERENCES accounts (id) ON DELETE CASCADE,
        instance_id BIGINT NOT NULL REFERENCES instances (id) ON DELETE CASCADE,
        permission_id BIGINT NOT NULL REFERENCES permissions (id) ON DELETE CASCADE,
        PRIMARY KEY (account_id, instance_id, permission_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS role_permissions (
        role_id BIGINT NOT NULL REFERENCES roles (id) ON DELETE CASCADE,
        permission_id BIGINT NOT NULL REFERENCES permissions (id) ON DELETE CASCADE,
        PRIMARY KEY (role_id, permission_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS account_roles (
        account_id BIGINT NOT NULL REFERENCES accounts (id) ON DELETE CASCADE,
        role_id BIGINT NOT NULL REFERENCES roles (id) ON DELETE CASCADE,
        PRIMARY KEY (account_id, role_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS group_roles (
        group_id BIGINT NOT NULL REFERENCES groups (id) ON DELETE CASCADE,
        role_id BIGINT NOT NULL REFERENCES roles (id) ON DELETE CASCADE,
        PRIMARY KEY (group_id, role_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS group_permissions (
        group_id BIGINT NOT NULL REFERENCES groups (id) ON DELETE CASCADE,
        permission_id BIGINT NOT NULL REFERENCES permissions (id) ON DELETE CASCADE,
        PRIMARY KEY (group_id, permission_id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS account_groups (
        account_id BIGINT NOT NULL REFERENCES accounts (id) ON DELETE CASCADE,
        group_id BIGINT NOT NULL REFERENCES groups (id) ON DELETE CASCADE,
        PRIMARY KEY (account_id, group_id)
    )
    "#,
];

// ============================================================================
// Permission resolution
// ============================================================================

/// Permissions of account `$1` (user-id) on service `$2`, through roles
/// held by its groups, roles held directly, and grants on its groups
macro_rules! service_permissions_union {
    () => {
        r#"
        SELECT p.name, p.number, p.description
        FROM permissions p
        JOIN services s ON s.id = p.service_id AND s.name = $2
        JOIN role_permissions rp ON rp.permission_id = p.id
        JOIN group_roles gr ON gr.role_id = rp.role_id
        JOIN account_groups ag ON ag.group_id = gr.group_id
        JOIN accounts a ON a.id = ag.account_id AND a.user_id = $1
        UNION
        SELECT p.name, p.number, p.description
        FROM permissions p
        JOIN services s ON s.id = p.service_id AND s.name = $2
        JOIN role_permissions rp ON rp.permission_id = p.id
        JOIN account_roles ar ON ar.role_id = rp.role_id
        JOIN accounts a ON a.id = ar.account_id AND a.user_id = $1
        UNION
        SELECT p.name, p.number, p.description
        FROM permissions p
        JOIN services s ON s.id = p.service_id AND s.name = $2
        JOIN group_permissions gp ON gp.permission_id = p.id
        JOIN account_groups ag ON ag.group_id = gp.group_id
        JOIN accounts a ON a.id = ag.account_id AND a.user_id = $1
        "#
    };
}

const SERVICE_PERMISSIONS: &str = concat!(
    "SELECT name, number, description FROM (",
    service_permissions_union!(),
    ") AS reachable ORDER BY number"
);

const SERVICE_PERMISSIONS_NUMBERS: &str = concat!(
    "SELECT DISTINCT number FROM (",
    service_permissions_union!(),
    ") AS reachable ORDER BY number"
);

macro_rules! instance_permissions {
    ($columns:literal) => {
        concat!(
            "SELECT ",
            $columns,
            r#"
            FROM accounts_instances_permissions aip
            JOIN accounts a ON a.id = aip.account_id
            JOIN instances i ON i.id = aip.instance_id
            JOIN permissions p ON p.id = aip.permission_id
            WHERE a.user_id = $1 AND i.name = $2
            ORDER BY p.number
            "#
        )
    };
}

const INSTANCE_PERMISSIONS: &str = instance_permissions!("p.name, p.number, p.description");

const INSTANCE_PERMISSIONS_NUMBERS: &str = instance_permissions!("DISTINCT p.number");

#[derive(sqlx::FromRow)]
struct AccountRow {
    user_id: Uuid,
    password_hash: String,
    state: i16,
}

impl AccountRow {
    fn into_account(self, login: &Login) -> AppResult<Account> {
        let state = AccountState::try_from(i64::from(self.state)).map_err(corrupted)?;
        let password_hash = PasswordHash::from_hash_string(self.password_hash).map_err(corrupted)?;
        Ok(Account {
            login: login.clone(),
            user_id: UserId::from_uuid(self.user_id),
            password_hash,
            state,
        })
    }
}

#[derive(sqlx::FromRow)]
struct PermissionRow {
    name: String,
    number: i32,
    description: String,
}

impl From<PermissionRow> for PermissionInfo {
    fn from(row: PermissionRow) -> Self {
        Self {
            name: row.name,
            number: row.number,
            description: row.description,
        }
    }
}

// ============================================================================
// Repository
// ============================================================================

/// PostgreSQL-backed persistent repository
#[derive(Clone)]
pub struct PostgresRepository {
    pool: PgPool,
    schema: String,
    query_timeout: Duration,
}

impl PostgresRepository {
    pub fn new(pool: PgPool, schema: impl Into<String>, query_timeout: Duration) -> Self {
        Self {
            pool,
            schema: schema.into(),
            query_timeout,
        }
    }

    /// Open a pool whose connections resolve tables in the configured schema
    pub async fn connect(options: &PostgresOptions) -> AppResult<Self> {
        let schema = options.schema();
        validate_schema_name(schema)?;

        let connect_options = PgConnectOptions::new()
            .host(&options.address)
            .port(options.port)
            .username(&options.login)
            .password(&options.password)
            .database(&options.name)
            .options([("search_path", schema)]);

        let pool = PgPoolOptions::new()
            .max_connections(options.max_open_connections.max(1))
            .acquire_timeout(options.query_timeout)
            .connect_with(connect_options)
            .await
            .persistent_err()?;

        tracing::info!(
            address = %options.address,
            database = %options.name,
            schema,
            "Connected to database"
        );

        Ok(Self::new(pool, schema, options.query_timeout))
    }

    fn deadline<F: std::future::Future>(&self, fut: F) -> tokio::time::Timeout<F> {
        tokio::time::timeout(self.query_timeout, fut)
    }
}

impl PersistentRepository for PostgresRepository {
    async fn bootstrap_schema(&self) -> AppResult<()> {
        validate_schema_name(&self.schema)?;

        let mut conn = self.deadline(self.pool.acquire()).await.query_err()?;
        let create_schema = format!("CREATE SCHEMA IF NOT EXISTS {}", self.schema);
        self.deadline(sqlx::query(&create_schema).execute(&mut *conn))
            .await
            .query_err()?;
        for ddl in TABLES {
            self.deadline(sqlx::query(ddl).execute(&mut *conn))
                .await
                .query_err()?;
        }

        tracing::info!(schema = %self.schema, tables = TABLES.len(), "Schema ready");
        Ok(())
    }

    async fn get_account_login_data(&self, login: &Login) -> AppResult<Account> {
        let row = self
            .deadline(
                sqlx::query_as::<_, AccountRow>(
                    "SELECT user_id, password_hash, state FROM accounts WHERE login = $1",
                )
                .bind(login.as_str())
                .fetch_one(&self.pool),
            )
            .await
            .query_err()?;

        row.into_account(login)
    }

    async fn set_account_login_data(&self, account: &Account) -> AppResult<()> {
        process_exec_result(
            self.deadline(
                sqlx::query(
                    r#"
                    INSERT INTO accounts (user_id, login, password_hash, state)
                    VALUES ($1, $2, $3, $4)
                    "#,
                )
                .bind(account.user_id.as_uuid())
                .bind(account.login.as_str())
                .bind(account.password_hash.as_str())
                .bind(account.state.id())
                .execute(&self.pool),
            )
            .await
            .query_err(),
        )
    }

    async fn set_account_state(&self, login: &Login, state: AccountState) -> AppResult<()> {
        process_exec_result(
            self.deadline(
                sqlx::query("UPDATE accounts SET state = $2 WHERE login = $1")
                    .bind(login.as_str())
                    .bind(state.id())
                    .execute(&self.pool),
            )
            .await
            .query_err(),
        )
    }

    async fn create_service(&self, service: &Service) -> AppResult<()> {
        process_exec_result(
            self.deadline(
                sqlx::query("INSERT INTO services (name, description) VALUES ($1, $2)")
                    .bind(&service.name)
                    .bind(&service.description)
                    .execute(&self.pool),
            )
            .await
            .query_err(),
        )
    }

    async fn create_instance(&self, instance: &Instance) -> AppResult<()> {
        process_exec_result(
            self.deadline(
                sqlx::query(
                    r#"
                    INSERT INTO instances (name, service_id)
                    SELECT $1, s.id FROM services s WHERE s.name = $2
                    "#,
                )
                .bind(&instance.name)
                .bind(&instance.service)
                .execute(&self.pool),
            )
            .await
            .query_err(),
        )
    }

    async fn create_permission(&self, permission: &Permission) -> AppResult<PermissionNumber> {
        let mut tx = self.deadline(self.pool.begin()).await.query_err()?;

        // The service row lock serializes numbering within one service
        let service_id: i64 = self
            .deadline(
                sqlx::query_scalar("SELECT id FROM services WHERE name = $1 FOR UPDATE")
                    .bind(&permission.service)
                    .fetch_one(&mut *tx),
            )
            .await
            .query_err()?;

        let number: i32 = self
            .deadline(
                sqlx::query_scalar(
                    r#"
                    INSERT INTO permissions (service_id, name, number, description)
                    SELECT $1, $2, COALESCE(MAX(number), 0) + 1, $3
                    FROM permissions WHERE service_id = $1
                    RETURNING number
                    "#,
                )
                .bind(service_id)
                .bind(&permission.name)
                .bind(&permission.description)
                .fetch_one(&mut *tx),
            )
            .await
            .query_err()?;

        self.deadline(tx.commit()).await.query_err()?;

        PermissionNumber::new(number).map_err(corrupted)
    }

    async fn create_role(&self, role: &Role) -> AppResult<()> {
        process_exec_result(
            self.deadline(
                sqlx::query(
                    r#"
                    INSERT INTO roles (service_id, name, description)
                    SELECT s.id, $2, $3 FROM services s WHERE s.name = $1
                    "#,
                )
                .bind(&role.service)
                .bind(&role.name)
                .bind(&role.description)
                .execute(&self.pool),
            )
            .await
            .query_err(),
        )
    }

    async fn create_group(&self, group: &Group) -> AppResult<()> {
        process_exec_result(
            self.deadline(
                sqlx::query(
                    r#"
                    INSERT INTO groups (service_id, name, description)
                    SELECT s.id, $2, $3 FROM services s WHERE s.name = $1
                    "#,
                )
                .bind(&group.service)
                .bind(&group.name)
                .bind(&group.description)
                .execute(&self.pool),
            )
            .await
            .query_err(),
        )
    }

    async fn assign_role_to_group(&self, edge: &RoleToGroup) -> AppResult<()> {
        process_exec_result(
            self.deadline(
                sqlx::query(
                    r#"
                    WITH svc AS (SELECT id FROM services WHERE name = $1)
                    INSERT INTO group_roles (group_id, role_id)
                    SELECT g.id, r.id
                    FROM svc
                    JOIN groups g ON g.service_id = svc.id AND g.name = $2
                    JOIN roles r ON r.service_id = svc.id AND r.name = $3
                    "#,
                )
                .bind(&edge.service)
                .bind(&edge.group)
                .bind(&edge.role)
                .execute(&self.pool),
            )
            .await
            .query_err(),
        )
    }

    async fn assign_permission_to_role(&self, edge: &PermissionToRole) -> AppResult<()> {
        process_exec_result(
            self.deadline(
                sqlx::query(
                    r#"
                    WITH svc AS (SELECT id FROM services WHERE name = $1)
                    INSERT INTO role_permissions (role_id, permission_id)
                    SELECT r.id, p.id
                    FROM svc
                    JOIN roles r ON r.service_id = svc.id AND r.name = $2
                    JOIN permissions p ON p.service_id = svc.id AND p.name = $3
                    "#,
                )
                .bind(&edge.service)
                .bind(&edge.role)
                .bind(&edge.permission)
                .execute(&self.pool),
            )
            .await
            .query_err(),
        )
    }

    async fn assign_permission_to_group(&self, edge: &PermissionToGroup) -> AppResult<()> {
        process_exec_result(
            self.deadline(
                sqlx::query(
                    r#"
                    WITH svc AS (SELECT id FROM services WHERE name = $1)
                    INSERT INTO group_permissions (group_id, permission_id)
                    SELECT g.id, p.id
                    FROM svc
                    JOIN groups g ON g.service_id = svc.id AND g.name = $2
                    JOIN permissions p ON p.service_id = svc.id AND p.name = $3
                    "#,
                )
                .bind(&edge.service)
                .bind(&edge.group)
                .bind(&edge.permission)
                .execute(&self.pool),
            )
            .await
            .query_err(),
        )
    }

    async fn assign_role_to_account(&self, edge: &RoleToAccount) -> AppResult<()> {
        process_exec_result(
            self.deadline(
                sqlx::query(
                    r#"
                    WITH svc AS (SELECT id FROM services WHERE name = $1),
                         acc AS (SELECT id FROM accounts WHERE login = $3)
                    INSERT INTO account_roles (account_id, role_id)
                    SELECT acc.id, r.id
                    FROM acc, svc
                    JOIN roles r ON r.service_id = svc.id AND r.name = $2
                    "#,
                )
                .bind(&edge.service)
                .bind(&edge.role)
                .bind(edge.login.as_str())
                .execute(&self.pool),
            )
            .await
            .query_err(),
        )
    }

    async fn assign_group_to_account(&self, edge: &GroupToAccount) -> AppResult<()> {
        process_exec_result(
            self.deadline(
                sqlx::query(
                    r#"
                    WITH svc AS (SELECT id FROM services WHERE name = $1),
                         acc AS (SELECT id FROM accounts WHERE login = $3)
                    INSERT INTO account_groups (account_id, group_id)
                    SELECT acc.id, g.id
                    FROM acc, svc
                    JOIN groups g ON g.service_id = svc.id AND g.name = $2
                    "#,
                )
                .bind(&edge.service)
                .bind(&edge.group)
                .bind(edge.login.as_str())
                .execute(&self.pool),
            )
            .await
            .query_err(),
        )
    }

    async fn assign_instance_permission_to_account(
        &self,
        edge: &InstancePermissionToAccount,
    ) -> AppResult<()> {
        process_exec_result(
            self.deadline(
                sqlx::query(
                    r#"
                    WITH inst AS (SELECT id, service_id FROM instances WHERE name = $1),
                         acc AS (SELECT id FROM accounts WHERE login = $3)
                    INSERT INTO accounts_instances_permissions (account_id, instance_id, permission_id)
                    SELECT acc.id, inst.id, p.id
                    FROM acc, inst
                    JOIN permissions p ON p.service_id = inst.service_id AND p.name = $2
                    "#,
                )
                .bind(&edge.instance)
                .bind(&edge.permission)
                .bind(edge.login.as_str())
                .execute(&self.pool),
            )
            .await
            .query_err(),
        )
    }

    async fn get_service_permissions_for_account(
        &self,
        user_id: &UserId,
        service: &str,
    ) -> AppResult<Vec<PermissionInfo>> {
        let rows = self
            .deadline(
                sqlx::query_as::<_, PermissionRow>(SERVICE_PERMISSIONS)
                    .bind(user_id.as_uuid())
                    .bind(service)
                    .fetch_all(&self.pool),
            )
            .await
            .query_err()?;
        Ok(rows.into_iter().map(PermissionInfo::from).collect())
    }

    async fn get_service_permissions_numbers_for_account(
        &self,
        user_id: &UserId,
        service: &str,
    ) -> AppResult<Vec<i32>> {
        self.deadline(
            sqlx::query_scalar::<_, i32>(SERVICE_PERMISSIONS_NUMBERS)
                .bind(user_id.as_uuid())
                .bind(service)
                .fetch_all(&self.pool),
        )
        .await
        .query_err()
    }

    async fn get_instance_permissions_for_account(
        &self,
        user_id: &UserId,
        instance: &str,
    ) -> AppResult<Vec<PermissionInfo>> {
        let rows = self
            .deadline(
                sqlx::query_as::<_, PermissionRow>(INSTANCE_PERMISSIONS)
                    .bind(user_id.as_uuid())
                    .bind(instance)
                    .fetch_all(&self.pool),
            )
            .await
            .query_err()?;
        Ok(rows.into_iter().map(PermissionInfo::from).collect())
    }

    async fn get_instance_permissions_numbers_for_account(
        &self,
        user_id: &UserId,
        instance: &str,
    ) -> AppResult<Vec<i32>> {
        self.deadline(
            sqlx::query_scalar::<_, i32>(INSTANCE_PERMISSIONS_NUMBERS)
                .bind(user_id.as_uuid())
                .bind(instance)
                .fetch_all(&self.pool),
        )
        .await
        .query_err()
    }

    async fn get_permission_number(&self, name: &str, instance: &str) -> AppResult<PermissionNumber> {
        let number: i32 = self
            .deadline(
                sqlx::query_scalar(
                    r#"
                    SELECT p.number
                    FROM permissions p
                    JOIN instances i ON i.service_id = p.service_id
                    WHERE p.name = $1 AND i.name = $2
                    "#,
                )
                .bind(name)
                .bind(instance)
                .fetch_one(&self.pool),
            )
            .await
            .query_err()?;

        PermissionNumber::new(number).map_err(corrupted)
    }

    async fn get_accounts_logins_by_state(&self, state: AccountState) -> AppResult<Vec<Login>> {
        let logins: Vec<String> = self
            .deadline(
                sqlx::query_scalar("SELECT login FROM accounts WHERE state = $1 ORDER BY login")
                    .bind(state.id())
                    .fetch_all(&self.pool),
            )
            .await
            .query_err()?;

        logins
            .into_iter()
            .map(|login| Login::new(login).map_err(corrupted))
            .collect()
    }

    async fn close(&self) {
        self.pool.close().await;
        tracing::info!("Database pool closed");
    }
}
