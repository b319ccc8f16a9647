//! HTTP Handlers

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::Extension;
use platform::credentials::{CredentialsError, basic_challenge, extract_basic_credentials};
use platform::metrics::AuthMetrics;

use crate::application::config::SecureConfig;
use crate::application::{
    CreateAccountInput, CreateAccountUseCase, CreateTokenUseCase, LoginUseCase, LogoutUseCase,
    PermissionsUseCase, RbacUseCase, SetAccountStateUseCase,
};
use crate::domain::entity::{
    Group, GroupToAccount, Instance, InstancePermissionToAccount, Permission, PermissionInfo,
    PermissionToGroup, PermissionToRole, Role, RoleToAccount, RoleToGroup, Service,
};
use crate::domain::repository::{MemoryRepository, PersistentRepository};
use crate::domain::value_object::UserId;
use crate::error::{SecureResult, incorrect_credentials};
use crate::infra::joint::JointRepository;
use crate::presentation::dto::{
    CreateAccountRequest, CreateAccountResponse, GetTokenQuery, LogoutResponse,
    PermissionNumberQuery, PermissionNumberResponse, PermissionNumbersResponse,
    SetAccountStateRequest, TokenResponse, UserResponse,
};

/// Realm announced in `WWW-Authenticate`
pub const REALM: &str = "secure";

/// Shared state for secure handlers
pub struct SecureAppState<P, M> {
    pub joint: Arc<JointRepository<P, M>>,
    pub config: Arc<SecureConfig>,
    pub metrics: Arc<dyn AuthMetrics>,
    /// Only this account may call the administrative routes
    pub root_user_id: UserId,
}

// Manual impl: a derive would require `P: Clone, M: Clone`
impl<P, M> Clone for SecureAppState<P, M> {
    fn clone(&self) -> Self {
        Self {
            joint: Arc::clone(&self.joint),
            config: Arc::clone(&self.config),
            metrics: Arc::clone(&self.metrics),
            root_user_id: self.root_user_id,
        }
    }
}

/// Owner of the bearer session, set by the session middleware
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CurrentUser {
    pub user_id: UserId,
}

// ============================================================================
// Sessions
// ============================================================================

/// POST /login
pub async fn login<P, M>(State(state): State<SecureAppState<P, M>>, headers: HeaderMap) -> Response
where
    P: PersistentRepository + Send + Sync + 'static,
    M: MemoryRepository + Send + Sync + 'static,
{
    let credentials = match extract_basic_credentials(&headers) {
        Ok(credentials) => credentials,
        Err(CredentialsError::Missing) => {
            return (
                StatusCode::UNAUTHORIZED,
                [(header::WWW_AUTHENTICATE, basic_challenge(REALM))],
            )
                .into_response();
        }
        Err(e) => {
            tracing::debug!(error = %e, "Unusable login credentials");
            state.metrics.inc_authentication_error();
            return incorrect_credentials().into_response();
        }
    };

    let use_case = LoginUseCase::new(state.joint.clone(), state.config.clone(), state.metrics.clone());

    match use_case
        .execute(credentials.login(), credentials.password())
        .await
    {
        Ok(session) => Json(TokenResponse {
            token: session.token.expose().to_string(),
        })
        .into_response(),
        Err(e) => e.into_response(),
    }
}

/// POST /logout
pub async fn logout<P, M>(
    State(state): State<SecureAppState<P, M>>,
    Extension(user): Extension<CurrentUser>,
) -> SecureResult<Json<LogoutResponse>>
where
    P: PersistentRepository + Send + Sync + 'static,
    M: MemoryRepository + Send + Sync + 'static,
{
    let use_case = LogoutUseCase::new(state.joint.clone(), state.metrics.clone());
    let closed_sessions = use_case.execute(&user.user_id).await?;
    Ok(Json(LogoutResponse { closed_sessions }))
}

/// GET /get-token?instance=
pub async fn get_token<P, M>(
    State(state): State<SecureAppState<P, M>>,
    Extension(user): Extension<CurrentUser>,
    Query(query): Query<GetTokenQuery>,
) -> SecureResult<Json<TokenResponse>>
where
    P: PersistentRepository + Send + Sync + 'static,
    M: MemoryRepository + Send + Sync + 'static,
{
    let use_case = CreateTokenUseCase::new(state.joint.clone(), state.config.clone());
    let session = use_case.execute(&user.user_id, &query.instance).await?;
    Ok(Json(TokenResponse {
        token: session.token.expose().to_string(),
    }))
}

/// GET /user
pub async fn current_user(Extension(user): Extension<CurrentUser>) -> Json<UserResponse> {
    Json(UserResponse {
        user_id: user.user_id,
    })
}

// ============================================================================
// Permissions
// ============================================================================

/// GET /permissions/service/{name}
pub async fn service_permissions_numbers<P, M>(
    State(state): State<SecureAppState<P, M>>,
    Extension(user): Extension<CurrentUser>,
    Path(service): Path<String>,
) -> SecureResult<Json<PermissionNumbersResponse>>
where
    P: PersistentRepository + Send + Sync + 'static,
    M: MemoryRepository + Send + Sync + 'static,
{
    let numbers = PermissionsUseCase::new(state.joint.clone())
        .service_permissions_numbers(&user.user_id, &service)
        .await?;
    Ok(Json(PermissionNumbersResponse { numbers }))
}

/// GET /permissions/instance/{name}
pub async fn instance_permissions_numbers<P, M>(
    State(state): State<SecureAppState<P, M>>,
    Extension(user): Extension<CurrentUser>,
    Path(instance): Path<String>,
) -> SecureResult<Json<PermissionNumbersResponse>>
where
    P: PersistentRepository + Send + Sync + 'static,
    M: MemoryRepository + Send + Sync + 'static,
{
    let numbers = PermissionsUseCase::new(state.joint.clone())
        .instance_permissions_numbers(&user.user_id, &instance)
        .await?;
    Ok(Json(PermissionNumbersResponse { numbers }))
}

/// GET /permissions/service/{name}/details
pub async fn service_permissions<P, M>(
    State(state): State<SecureAppState<P, M>>,
    Extension(user): Extension<CurrentUser>,
    Path(service): Path<String>,
) -> SecureResult<Json<Vec<PermissionInfo>>>
where
    P: PersistentRepository + Send + Sync + 'static,
    M: MemoryRepository + Send + Sync + 'static,
{
    let permissions = PermissionsUseCase::new(state.joint.clone())
        .service_permissions(&user.user_id, &service)
        .await?;
    Ok(Json(permissions))
}

/// GET /permissions/instance/{name}/details
pub async fn instance_permissions<P, M>(
    State(state): State<SecureAppState<P, M>>,
    Extension(user): Extension<CurrentUser>,
    Path(instance): Path<String>,
) -> SecureResult<Json<Vec<PermissionInfo>>>
where
    P: PersistentRepository + Send + Sync + 'static,
    M: MemoryRepository + Send + Sync + 'static,
{
    let permissions = PermissionsUseCase::new(state.joint.clone())
        .instance_permissions(&user.user_id, &instance)
        .await?;
    Ok(Json(permissions))
}

/// GET /permissions/number?name=&instance=
pub async fn permission_number<P, M>(
    State(state): State<SecureAppState<P, M>>,
    Query(query): Query<PermissionNumberQuery>,
) -> SecureResult<Json<PermissionNumberResponse>>
where
    P: PersistentRepository + Send + Sync + 'static,
    M: MemoryRepository + Send + Sync + 'static,
{
    let number = PermissionsUseCase::new(state.joint.clone())
        .permission_number(&query.name, &query.instance)
        .await?;
    Ok(Json(PermissionNumberResponse {
        number: number.get(),
    }))
}

// ============================================================================
// Administration
// ============================================================================

/// POST /admin/accounts
pub async fn create_account<P, M>(
    State(state): State<SecureAppState<P, M>>,
    Json(req): Json<CreateAccountRequest>,
) -> SecureResult<(StatusCode, Json<CreateAccountResponse>)>
where
    P: PersistentRepository + Send + Sync + 'static,
    M: MemoryRepository + Send + Sync + 'static,
{
    let use_case = CreateAccountUseCase::new(state.joint.clone(), state.config.clone());
    let user_id = use_case
        .execute(CreateAccountInput {
            login: req.login,
            password: req.password,
            user_id: req.user_id,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(CreateAccountResponse { user_id })))
}

/// POST /admin/accounts/state
pub async fn set_account_state<P, M>(
    State(state): State<SecureAppState<P, M>>,
    Json(req): Json<SetAccountStateRequest>,
) -> SecureResult<StatusCode>
where
    P: PersistentRepository + Send + Sync + 'static,
    M: MemoryRepository + Send + Sync + 'static,
{
    SetAccountStateUseCase::new(state.joint.clone())
        .execute(&req.login, req.state)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /admin/permissions
pub async fn create_permission<P, M>(
    State(state): State<SecureAppState<P, M>>,
    Json(req): Json<Permission>,
) -> SecureResult<(StatusCode, Json<PermissionNumberResponse>)>
where
    P: PersistentRepository + Send + Sync + 'static,
    M: MemoryRepository + Send + Sync + 'static,
{
    let number = RbacUseCase::new(state.joint.clone())
        .create_permission(&req)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(PermissionNumberResponse {
            number: number.get(),
        }),
    ))
}

/// RBAC mutations that answer with a bare status
macro_rules! rbac_handler {
    ($(#[$doc:meta])* $name:ident, $body:ty, $status:expr) => {
        $(#[$doc])*
        pub async fn $name<P, M>(
            State(state): State<SecureAppState<P, M>>,
            Json(req): Json<$body>,
        ) -> SecureResult<StatusCode>
        where
            P: PersistentRepository + Send + Sync + 'static,
            M: MemoryRepository + Send + Sync + 'static,
        {
            RbacUseCase::new(state.joint.clone()).$name(&req).await?;
            Ok($status)
        }
    };
}

rbac_handler!(
    /// POST /admin/services
    create_service, Service, StatusCode::CREATED
);
rbac_handler!(
    /// POST /admin/instances
    create_instance, Instance, StatusCode::CREATED
);
rbac_handler!(
    /// POST /admin/roles
    create_role, Role, StatusCode::CREATED
);
rbac_handler!(
    /// POST /admin/groups
    create_group, Group, StatusCode::CREATED
);
rbac_handler!(
    /// POST /admin/assign/role-to-group
    assign_role_to_group, RoleToGroup, StatusCode::NO_CONTENT
);
rbac_handler!(
    /// POST /admin/assign/permission-to-role
    assign_permission_to_role, PermissionToRole, StatusCode::NO_CONTENT
);
rbac_handler!(
    /// POST /admin/assign/permission-to-group
    assign_permission_to_group, PermissionToGroup, StatusCode::NO_CONTENT
);
rbac_handler!(
    /// POST /admin/assign/role-to-account
    assign_role_to_account, RoleToAccount, StatusCode::NO_CONTENT
);
rbac_handler!(
    /// POST /admin/assign/group-to-account
    assign_group_to_account, GroupToAccount, StatusCode::NO_CONTENT
);
rbac_handler!(
    /// POST /admin/assign/instance-permission-to-account
    assign_instance_permission_to_account, InstancePermissionToAccount, StatusCode::NO_CONTENT
);
