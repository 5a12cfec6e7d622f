use crate::application_impl::PolicyHandlerRegistry;
use crate::application_port::*;
use crate::domain_model::*;
use futures_util::future::join_all;
use std::sync::Arc;
use tracing::debug;

pub struct RoleCheck;

#[async_trait::async_trait]
impl AuthorizationCheck for RoleCheck {
    fn name(&self) -> &'static str {
        "roles"
    }

    async fn check(
        &self,
        requirements: &EndpointRequirements,
        user: Option<&ActiveUser>,
    ) -> Result<(), AuthError> {
        let Some(roles) = requirements.declared_roles() else {
            return Ok(());
        };
        match user {
            Some(user) if roles.contains(&user.role) => Ok(()),
            _ => Err(AuthError::forbidden()),
        }
    }
}

/// Passes when the caller holds at least one declared permission. A declared
/// but empty set can never be satisfied.
pub struct PermissionCheck;

#[async_trait::async_trait]
impl AuthorizationCheck for PermissionCheck {
    fn name(&self) -> &'static str {
        "permissions"
    }

    async fn check(
        &self,
        requirements: &EndpointRequirements,
        user: Option<&ActiveUser>,
    ) -> Result<(), AuthError> {
        let Some(required) = requirements.declared_permissions() else {
            return Ok(());
        };
        match user {
            Some(user) if user.has_any_permission(required) => Ok(()),
            _ => Err(AuthError::forbidden()),
        }
    }
}

pub struct PolicyCheck {
    registry: Arc<PolicyHandlerRegistry>,
}

impl PolicyCheck {
    pub fn new(registry: Arc<PolicyHandlerRegistry>) -> Self {
        PolicyCheck { registry }
    }

    async fn evaluate(&self, policy: &dyn Policy, user: &ActiveUser) -> Result<(), PolicyError> {
        let handler = self.registry.get(&PolicyKind::of_policy(policy))?;
        handler.handle(policy, user).await
    }
}

#[async_trait::async_trait]
impl AuthorizationCheck for PolicyCheck {
    fn name(&self) -> &'static str {
        "policies"
    }

    async fn check(
        &self,
        requirements: &EndpointRequirements,
        user: Option<&ActiveUser>,
    ) -> Result<(), AuthError> {
        let policies = requirements.declared_policies();
        if policies.is_empty() {
            return Ok(());
        }
        let Some(user) = user else {
            return Err(AuthError::Forbidden("no active user".to_string()));
        };

        // Every policy runs to completion so no rejection goes unrecorded.
        let results = join_all(
            policies
                .iter()
                .map(|policy| self.evaluate(policy.as_ref(), user)),
        )
        .await;

        let mut first_failure = None;
        for (policy, result) in policies.iter().zip(results) {
            if let Err(e) = result {
                debug!(policy = policy.name(), user_id = %user.sub, error = %e, "policy rejected");
                first_failure.get_or_insert(e);
            }
        }

        match first_failure {
            None => Ok(()),
            Some(e) => Err(AuthError::Forbidden(e.to_string())),
        }
    }
}
