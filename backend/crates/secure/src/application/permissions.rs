//! Permission Queries

use std::sync::Arc;

use kernel::error::adapter::AdaptExt;

use crate::domain::entity::PermissionInfo;
use crate::domain::repository::{MemoryRepository, PersistentRepository};
use crate::domain::value_object::{PermissionNumber, UserId};
use crate::error::SecureResult;
use crate::infra::joint::JointRepository;

pub struct PermissionsUseCase<P, M> {
    joint: Arc<JointRepository<P, M>>,
}

impl<P, M> PermissionsUseCase<P, M>
where
    P: PersistentRepository + Sync,
    M: MemoryRepository + Sync,
{
    pub fn new(joint: Arc<JointRepository<P, M>>) -> Self {
        Self { joint }
    }

    /// Sorted numbers reachable on `service`, cached
    pub async fn service_permissions_numbers(
        &self,
        user_id: &UserId,
        service: &str,
    ) -> SecureResult<Vec<i32>> {
        self.joint
            .service_permissions_numbers(user_id, service)
            .await
            .service_err()
    }

    /// Sorted numbers granted on `instance`, cached
    pub async fn instance_permissions_numbers(
        &self,
        user_id: &UserId,
        instance: &str,
    ) -> SecureResult<Vec<i32>> {
        self.joint
            .instance_permissions_numbers(user_id, instance)
            .await
            .service_err()
    }

    pub async fn service_permissions(
        &self,
        user_id: &UserId,
        service: &str,
    ) -> SecureResult<Vec<PermissionInfo>> {
        self.joint
            .service_permissions(user_id, service)
            .await
            .service_err()
    }

    pub async fn instance_permissions(
        &self,
        user_id: &UserId,
        instance: &str,
    ) -> SecureResult<Vec<PermissionInfo>> {
        self.joint
            .instance_permissions(user_id, instance)
            .await
            .service_err()
    }

    pub async fn permission_number(&self, name: &str, instance: &str) -> SecureResult<PermissionNumber> {
        self.joint
            .get_permission_number(name, instance)
            .await
            .service_err()
    }
}
