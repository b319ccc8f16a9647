//! RBAC Use Case
//!
//! Administrative mutations of the service/role/group/permission graph.

use std::sync::Arc;

use kernel::error::adapter::AdaptExt;

use crate::domain::entity::{
    Group, GroupToAccount, Instance, InstancePermissionToAccount, Permission, PermissionToGroup,
    PermissionToRole, Role, RoleToAccount, RoleToGroup, Service,
};
use crate::domain::repository::{MemoryRepository, PersistentRepository};
use crate::domain::value_object::PermissionNumber;
use crate::error::SecureResult;
use crate::infra::joint::JointRepository;

pub struct RbacUseCase<P, M> {
    joint: Arc<JointRepository<P, M>>,
}

impl<P, M> RbacUseCase<P, M>
where
    P: PersistentRepository + Sync,
    M: MemoryRepository + Sync,
{
    pub fn new(joint: Arc<JointRepository<P, M>>) -> Self {
        Self { joint }
    }

    pub async fn create_service(&self, service: &Service) -> SecureResult<()> {
        self.joint.create_service(service).await.service_err()
    }

    pub async fn create_instance(&self, instance: &Instance) -> SecureResult<()> {
        self.joint.create_instance(instance).await.service_err()
    }

    /// Returns the number given to the new permission
    pub async fn create_permission(&self, permission: &Permission) -> SecureResult<PermissionNumber> {
        let number = self.joint.create_permission(permission).await.service_err()?;
        tracing::info!(
            service = %permission.service,
            permission = %permission.name,
            number = number.get(),
            "Permission created"
        );
        Ok(number)
    }

    pub async fn create_role(&self, role: &Role) -> SecureResult<()> {
        self.joint.create_role(role).await.service_err()
    }

    pub async fn create_group(&self, group: &Group) -> SecureResult<()> {
        self.joint.create_group(group).await.service_err()
    }

    pub async fn assign_role_to_group(&self, edge: &RoleToGroup) -> SecureResult<()> {
        self.joint.assign_role_to_group(edge).await.service_err()
    }

    pub async fn assign_permission_to_role(&self, edge: &PermissionToRole) -> SecureResult<()> {
        self.joint.assign_permission_to_role(edge).await.service_err()
    }

    pub async fn assign_permission_to_group(&self, edge: &PermissionToGroup) -> SecureResult<()> {
        self.joint.assign_permission_to_group(edge).await.service_err()
    }

    pub async fn assign_role_to_account(&self, edge: &RoleToAccount) -> SecureResult<()> {
        self.joint.assign_role_to_account(edge).await.service_err()
    }

    pub async fn assign_group_to_account(&self, edge: &GroupToAccount) -> SecureResult<()> {
        self.joint.assign_group_to_account(edge).await.service_err()
    }

    pub async fn assign_instance_permission_to_account(
        &self,
        edge: &InstancePermissionToAccount,
    ) -> SecureResult<()> {
        self.joint
            .assign_instance_permission_to_account(edge)
            .await
            .service_err()
    }
}
