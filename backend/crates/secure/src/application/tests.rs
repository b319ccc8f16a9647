//! Use-case scenarios against the in-process stores

use std::sync::Arc;
use std::time::Duration;

use kernel::error::kind::ErrorKind;
use kernel::error::messages::service;
use platform::metrics::{AuthMetrics, PrometheusMetrics};

use super::*;
use crate::domain::entity::{
    Group, GroupToAccount, Instance, InstancePermissionToAccount, Permission, PermissionToGroup,
    PermissionToRole, Role, RoleToAccount, RoleToGroup, Scope, Service,
};
use crate::domain::repository::MemoryRepository;
use crate::domain::value_object::{AccountState, Login, UserId};
use crate::infra::joint::JointRepository;
use crate::infra::local::ProcessMemoryRepository;
use crate::testing::{FakePersistentRepository, RecordingProducer};

type Persistent = FakePersistentRepository;
type Memory = ProcessMemoryRepository;

struct Harness {
    joint: Arc<JointRepository<Persistent, Memory>>,
    config: Arc<SecureConfig>,
    metrics: Arc<PrometheusMetrics>,
}

impl Harness {
    fn new() -> Self {
        Self::with_config(SecureConfig {
            root_login: "root_01".into(),
            root_password: "Root_pass1".into(),
            password_creation_cost: 4,
            ..Default::default()
        })
    }

    fn with_config(config: SecureConfig) -> Self {
        let joint = JointRepository::new(
            FakePersistentRepository::new(),
            ProcessMemoryRepository::new(),
            config.cache_ttl(),
        );
        Self {
            joint: Arc::new(joint),
            config: Arc::new(config),
            metrics: Arc::new(PrometheusMetrics::new("secure").unwrap()),
        }
    }

    fn metrics(&self) -> Arc<dyn AuthMetrics> {
        self.metrics.clone()
    }

    fn login(&self) -> LoginUseCase<Persistent, Memory> {
        LoginUseCase::new(self.joint.clone(), self.config.clone(), self.metrics())
    }

    fn check(&self) -> CheckSessionUseCase<Persistent, Memory> {
        CheckSessionUseCase::new(self.joint.clone())
    }

    fn rbac(&self) -> RbacUseCase<Persistent, Memory> {
        RbacUseCase::new(self.joint.clone())
    }

    fn permissions(&self) -> PermissionsUseCase<Persistent, Memory> {
        PermissionsUseCase::new(self.joint.clone())
    }

    async fn create_alice(&self) -> UserId {
        CreateAccountUseCase::new(self.joint.clone(), self.config.clone())
            .execute(CreateAccountInput {
                login: "alice_01".into(),
                password: "Correct_1".into(),
                user_id: Some(alice_id()),
            })
            .await
            .unwrap()
    }

    async fn create_store(&self) {
        let rbac = self.rbac();
        rbac.create_service(&Service {
            name: "store".into(),
            description: "point of sale".into(),
        })
        .await
        .unwrap();
        rbac.create_instance(&Instance {
            name: "store-1".into(),
            service: "store".into(),
        })
        .await
        .unwrap();
        for name in ["sell", "refund"] {
            rbac.create_permission(&Permission {
                service: "store".into(),
                name: name.into(),
                description: String::new(),
            })
            .await
            .unwrap();
        }
    }
}

fn alice_id() -> UserId {
    "00000000-0000-0000-0000-000000000001".parse().unwrap()
}

fn alice() -> Login {
    Login::new("alice_01").unwrap()
}

#[tokio::test]
async fn test_login_issues_session() {
    let h = Harness::new();
    assert_eq!(h.create_alice().await, alice_id());

    let session = h.login().execute("alice_01", "Correct_1").await.unwrap();

    assert_eq!(session.token.len(), 24);
    assert_eq!(session.user_id, alice_id());
    assert_eq!(h.check().execute(session.token.expose()).await.unwrap(), alice_id());
    assert_eq!(h.metrics.login_total(), 1);
    assert_eq!(h.metrics.authentication_error_total(), 0);
}

#[tokio::test]
async fn test_wrong_password_is_rejected() {
    let h = Harness::new();
    h.create_alice().await;

    let err = h.login().execute("alice_01", "Wrong_111").await.unwrap_err();

    assert!(err.is(ErrorKind::Service, service::INCORRECT_CREDENTIALS));
    assert_eq!(h.metrics.authentication_error_total(), 1);
    assert_eq!(h.metrics.login_total(), 0);
}

#[tokio::test]
async fn test_unknown_login_and_bad_shape_look_alike() {
    let h = Harness::new();
    h.create_alice().await;

    for (login, password) in [("nobody", "Correct_1"), ("al", "Correct_1"), ("alice_01", "short")] {
        let err = h.login().execute(login, password).await.unwrap_err();
        assert!(err.is(ErrorKind::Service, service::INCORRECT_CREDENTIALS));
        assert_eq!(err.status_code(), 401);
    }
}

#[tokio::test]
async fn test_disabled_account_cannot_login() {
    let h = Harness::new();
    h.create_alice().await;
    let session = h.login().execute("alice_01", "Correct_1").await.unwrap();

    SetAccountStateUseCase::new(h.joint.clone())
        .execute(&alice(), AccountState::Disabled)
        .await
        .unwrap();

    let err = h.login().execute("alice_01", "Correct_1").await.unwrap_err();
    assert!(err.is(ErrorKind::Service, service::ACCOUNT_NOT_ACTIVE));

    // Disabling closed the live session
    let err = h.check().execute(session.token.expose()).await.unwrap_err();
    assert!(err.is(ErrorKind::Service, service::EMPTY_RESULT));
}

#[tokio::test]
async fn test_two_logins_two_sessions() {
    let h = Harness::new();
    h.create_alice().await;

    let first = h.login().execute("alice_01", "Correct_1").await.unwrap();
    let second = h.login().execute("alice_01", "Correct_1").await.unwrap();
    assert_ne!(first.token, second.token);

    let closed = LogoutUseCase::new(h.joint.clone(), h.metrics())
        .execute(&alice_id())
        .await
        .unwrap();
    assert_eq!(closed, 2);
    assert_eq!(h.metrics.logout_total(), 1);
    assert!(h.check().execute(first.token.expose()).await.is_err());
    assert!(h.check().execute(second.token.expose()).await.is_err());
}

#[tokio::test]
async fn test_logout_without_sessions() {
    let h = Harness::new();
    let err = LogoutUseCase::new(h.joint.clone(), h.metrics())
        .execute(&UserId::new())
        .await
        .unwrap_err();
    assert!(err.is(ErrorKind::Service, service::ERROR_LOGOUT));
    assert_eq!(h.metrics.logout_total(), 0);
}

#[tokio::test]
async fn test_duplicate_account_already_exists() {
    let h = Harness::new();
    h.create_alice().await;

    let err = CreateAccountUseCase::new(h.joint.clone(), h.config.clone())
        .execute(CreateAccountInput {
            login: "alice_01".into(),
            password: "Other_pass1".into(),
            user_id: None,
        })
        .await
        .unwrap_err();
    assert!(err.is(ErrorKind::Service, service::ALREADY_EXISTS));
    assert_eq!(err.status_code(), 409);
}

#[tokio::test]
async fn test_create_account_rejects_weak_password() {
    let h = Harness::new();
    let err = CreateAccountUseCase::new(h.joint.clone(), h.config.clone())
        .execute(CreateAccountInput {
            login: "bob_01".into(),
            password: "lowercase1".into(),
            user_id: None,
        })
        .await
        .unwrap_err();
    assert!(err.is(ErrorKind::Service, service::INVALID_ARGUMENT));
}

#[tokio::test]
async fn test_permission_numbers_are_dense() {
    let h = Harness::new();
    h.create_store().await;

    let permissions = h.permissions();
    assert_eq!(permissions.permission_number("sell", "store-1").await.unwrap().get(), 1);
    assert_eq!(permissions.permission_number("refund", "store-1").await.unwrap().get(), 2);

    let err = permissions.permission_number("void", "store-1").await.unwrap_err();
    assert!(err.is(ErrorKind::Service, service::EMPTY_RESULT));
}

#[tokio::test]
async fn test_role_through_group_grants_permission() {
    let h = Harness::new();
    h.create_alice().await;
    h.create_store().await;
    let rbac = h.rbac();

    rbac.create_role(&Role {
        service: "store".into(),
        name: "cashier".into(),
        description: String::new(),
    })
    .await
    .unwrap();
    rbac.create_group(&Group {
        service: "store".into(),
        name: "front".into(),
        description: String::new(),
    })
    .await
    .unwrap();
    rbac.assign_permission_to_role(&PermissionToRole {
        service: "store".into(),
        role: "cashier".into(),
        permission: "refund".into(),
    })
    .await
    .unwrap();
    rbac.assign_role_to_group(&RoleToGroup {
        service: "store".into(),
        group: "front".into(),
        role: "cashier".into(),
    })
    .await
    .unwrap();
    rbac.assign_group_to_account(&GroupToAccount {
        service: "store".into(),
        group: "front".into(),
        login: alice(),
    })
    .await
    .unwrap();

    let permissions = h.permissions();
    let numbers = permissions
        .service_permissions_numbers(&alice_id(), "store")
        .await
        .unwrap();
    assert_eq!(numbers, [2]);

    let details = permissions.service_permissions(&alice_id(), "store").await.unwrap();
    assert_eq!(details.len(), 1);
    assert_eq!(details[0].name, "refund");

    // Same edge twice
    let err = rbac
        .assign_group_to_account(&GroupToAccount {
            service: "store".into(),
            group: "front".into(),
            login: alice(),
        })
        .await
        .unwrap_err();
    assert!(err.is(ErrorKind::Service, service::ALREADY_EXISTS));
}

#[tokio::test]
async fn test_role_on_account_grants_permission() {
    let h = Harness::new();
    h.create_alice().await;
    h.create_store().await;
    let rbac = h.rbac();

    rbac.create_role(&Role {
        service: "store".into(),
        name: "cashier".into(),
        description: String::new(),
    })
    .await
    .unwrap();
    rbac.assign_permission_to_role(&PermissionToRole {
        service: "store".into(),
        role: "cashier".into(),
        permission: "sell".into(),
    })
    .await
    .unwrap();
    rbac.assign_role_to_account(&RoleToAccount {
        service: "store".into(),
        role: "cashier".into(),
        login: alice(),
    })
    .await
    .unwrap();

    let permissions = h.permissions();
    assert_eq!(
        permissions
            .service_permissions_numbers(&alice_id(), "store")
            .await
            .unwrap(),
        [1]
    );
    let cached = h
        .joint
        .memory()
        .get_permission_numbers(Scope::Service, "store", &alice_id())
        .await
        .unwrap();
    assert_eq!(cached, [1]);

    // Widening the role reaches the account through the direct edge
    rbac.assign_permission_to_role(&PermissionToRole {
        service: "store".into(),
        role: "cashier".into(),
        permission: "refund".into(),
    })
    .await
    .unwrap();
    let err = h
        .joint
        .memory()
        .get_permission_numbers(Scope::Service, "store", &alice_id())
        .await
        .unwrap_err();
    assert!(err.is_empty_result());
    assert_eq!(
        permissions
            .service_permissions_numbers(&alice_id(), "store")
            .await
            .unwrap(),
        [1, 2]
    );

    let details = permissions.service_permissions(&alice_id(), "store").await.unwrap();
    let names: Vec<_> = details.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, ["sell", "refund"]);
}

#[tokio::test]
async fn test_edge_assigned_during_read_is_not_masked_by_cache() {
    let h = Harness::new();
    h.create_alice().await;
    h.create_store().await;
    let rbac = h.rbac();

    rbac.create_group(&Group {
        service: "store".into(),
        name: "front".into(),
        description: String::new(),
    })
    .await
    .unwrap();
    rbac.assign_group_to_account(&GroupToAccount {
        service: "store".into(),
        group: "front".into(),
        login: alice(),
    })
    .await
    .unwrap();

    h.joint
        .persistent()
        .set_permission_read_delay(Duration::from_millis(50));
    let permissions = h.permissions();
    let reader = tokio::spawn(async move {
        permissions
            .service_permissions_numbers(&alice_id(), "store")
            .await
    });

    // The reader already holds the rows from before the grant
    tokio::time::sleep(Duration::from_millis(10)).await;
    rbac.assign_permission_to_group(&PermissionToGroup {
        service: "store".into(),
        group: "front".into(),
        permission: "refund".into(),
    })
    .await
    .unwrap();

    assert!(reader.await.unwrap().unwrap().is_empty());
    let err = h
        .joint
        .memory()
        .get_permission_numbers(Scope::Service, "store", &alice_id())
        .await
        .unwrap_err();
    assert!(err.is_empty_result());

    assert_eq!(
        h.permissions()
            .service_permissions_numbers(&alice_id(), "store")
            .await
            .unwrap(),
        [2]
    );
}

#[tokio::test]
async fn test_create_token_requires_instance_permission() {
    let h = Harness::new();
    h.create_alice().await;
    h.create_store().await;
    let create_token = CreateTokenUseCase::new(h.joint.clone(), h.config.clone());

    let err = create_token.execute(&alice_id(), "store-1").await.unwrap_err();
    assert!(err.is(ErrorKind::Service, service::ACCESS_DENIED));
    assert_eq!(err.status_code(), 403);

    h.rbac()
        .assign_instance_permission_to_account(&InstancePermissionToAccount {
            instance: "store-1".into(),
            permission: "sell".into(),
            login: alice(),
        })
        .await
        .unwrap();

    let session = create_token.execute(&alice_id(), "store-1").await.unwrap();
    assert_eq!(h.check().execute(session.token.expose()).await.unwrap(), alice_id());
    assert_eq!(
        h.permissions()
            .instance_permissions_numbers(&alice_id(), "store-1")
            .await
            .unwrap(),
        [1]
    );
}

#[tokio::test]
async fn test_session_expires() {
    let h = Harness::with_config(SecureConfig {
        password_creation_cost: 4,
        session_ttl: Duration::from_secs(1),
        ..Default::default()
    });
    h.create_alice().await;
    let session = h.login().execute("alice_01", "Correct_1").await.unwrap();

    tokio::time::sleep(Duration::from_secs(2)).await;

    let err = h.check().execute(session.token.expose()).await.unwrap_err();
    assert!(err.is(ErrorKind::Service, service::EMPTY_RESULT));
}

#[tokio::test]
async fn test_malformed_token_is_empty_result() {
    let h = Harness::new();
    let err = h.check().execute("not a token").await.unwrap_err();
    assert!(err.is(ErrorKind::Service, service::EMPTY_RESULT));
}

#[tokio::test]
async fn test_boot_creates_root_once() {
    let h = Harness::new();
    let producer = Arc::new(RecordingProducer::new());
    let boot = BootUseCase::new(h.joint.clone(), h.config.clone(), producer.clone());

    let first = boot.execute().await.unwrap();
    assert!(first.root_created);
    assert!(first.announced);
    assert_eq!(first.warmed_states, 1);
    assert_eq!(producer.sent(), [b"service upload".to_vec()]);

    let session = h.login().execute("root_01", "Root_pass1").await.unwrap();
    assert_eq!(session.user_id, first.root_user_id);

    let second = boot.execute().await.unwrap();
    assert!(!second.root_created);
    assert_eq!(second.root_user_id, first.root_user_id);

    // Sessions do not survive a restart
    assert!(h.check().execute(session.token.expose()).await.is_err());
    assert!(h.joint.memory().get_session_user_id(&session.token).await.is_err());
}

#[tokio::test]
async fn test_boot_survives_broker_failure() {
    let h = Harness::new();
    let boot = BootUseCase::new(
        h.joint.clone(),
        h.config.clone(),
        Arc::new(RecordingProducer::failing()),
    );
    let report = boot.execute().await.unwrap();
    assert!(!report.announced);
}
