//! Secure Router

use axum::Router;
use axum::http::Method;
use axum::middleware::from_fn_with_state;
use axum::routing::{MethodRouter, get, post};
use tower_http::catch_panic::CatchPanicLayer;

use crate::domain::repository::{MemoryRepository, PersistentRepository};
use crate::presentation::handlers::{self, SecureAppState};
use crate::presentation::middleware::{recover, require_root, require_session};
use crate::presentation::registry::{RouteError, RouteRegistry};

/// Router plus the registry that guards it
struct Routes<'a, S> {
    router: Router<S>,
    registry: &'a mut RouteRegistry,
}

impl<'a, S> Routes<'a, S>
where
    S: Clone + Send + Sync + 'static,
{
    fn new(registry: &'a mut RouteRegistry) -> Self {
        Self {
            router: Router::new(),
            registry,
        }
    }

    fn add(mut self, method: Method, path: &str, handler: MethodRouter<S>) -> Result<Self, RouteError> {
        self.registry.register(method, path)?;
        self.router = self.router.route(path, handler);
        Ok(self)
    }

    fn finish(self) -> Router<S> {
        self.router
    }
}

/// Build the secure router
///
/// Every mounted route is recorded in `registry`; mounting one that is
/// already there fails.
pub fn secure_router<P, M>(
    state: SecureAppState<P, M>,
    registry: &mut RouteRegistry,
) -> Result<Router, RouteError>
where
    P: PersistentRepository + Send + Sync + 'static,
    M: MemoryRepository + Send + Sync + 'static,
{
    let public = Routes::new(registry)
        .add(Method::POST, "/login", post(handlers::login::<P, M>))?
        .finish();

    let authenticated = Routes::new(registry)
        .add(Method::POST, "/logout", post(handlers::logout::<P, M>))?
        .add(Method::GET, "/get-token", get(handlers::get_token::<P, M>))?
        .add(Method::GET, "/user", get(handlers::current_user))?
        .add(
            Method::GET,
            "/permissions/service/{name}",
            get(handlers::service_permissions_numbers::<P, M>),
        )?
        .add(
            Method::GET,
            "/permissions/instance/{name}",
            get(handlers::instance_permissions_numbers::<P, M>),
        )?
        .add(
            Method::GET,
            "/permissions/service/{name}/details",
            get(handlers::service_permissions::<P, M>),
        )?
        .add(
            Method::GET,
            "/permissions/instance/{name}/details",
            get(handlers::instance_permissions::<P, M>),
        )?
        .add(
            Method::GET,
            "/permissions/number",
            get(handlers::permission_number::<P, M>),
        )?
        .finish();

    let admin = Routes::new(registry)
        .add(Method::POST, "/admin/accounts", post(handlers::create_account::<P, M>))?
        .add(
            Method::POST,
            "/admin/accounts/state",
            post(handlers::set_account_state::<P, M>),
        )?
        .add(Method::POST, "/admin/services", post(handlers::create_service::<P, M>))?
        .add(Method::POST, "/admin/instances", post(handlers::create_instance::<P, M>))?
        .add(
            Method::POST,
            "/admin/permissions",
            post(handlers::create_permission::<P, M>),
        )?
        .add(Method::POST, "/admin/roles", post(handlers::create_role::<P, M>))?
        .add(Method::POST, "/admin/groups", post(handlers::create_group::<P, M>))?
        .add(
            Method::POST,
            "/admin/assign/role-to-group",
            post(handlers::assign_role_to_group::<P, M>),
        )?
        .add(
            Method::POST,
            "/admin/assign/permission-to-role",
            post(handlers::assign_permission_to_role::<P, M>),
        )?
        .add(
            Method::POST,
            "/admin/assign/permission-to-group",
            post(handlers::assign_permission_to_group::<P, M>),
        )?
        .add(
            Method::POST,
            "/admin/assign/role-to-account",
            post(handlers::assign_role_to_account::<P, M>),
        )?
        .add(
            Method::POST,
            "/admin/assign/group-to-account",
            post(handlers::assign_group_to_account::<P, M>),
        )?
        .add(
            Method::POST,
            "/admin/assign/instance-permission-to-account",
            post(handlers::assign_instance_permission_to_account::<P, M>),
        )?
        .finish()
        .route_layer(from_fn_with_state(state.clone(), require_root::<P, M>));

    let protected = authenticated
        .merge(admin)
        .route_layer(from_fn_with_state(state.clone(), require_session::<P, M>));

    Ok(public
        .merge(protected)
        .layer(CatchPanicLayer::custom(recover))
        .with_state(state))
}
