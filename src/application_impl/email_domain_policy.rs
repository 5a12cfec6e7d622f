use crate::application_port::{PolicyError, PolicyHandler};
use crate::domain_model::*;

pub struct EmailDomainPolicyHandler;

#[async_trait::async_trait]
impl PolicyHandler for EmailDomainPolicyHandler {
    fn kind(&self) -> PolicyKind {
        PolicyKind::of::<EmailDomainPolicy>()
    }

    async fn handle(&self, policy: &dyn Policy, user: &ActiveUser) -> Result<(), PolicyError> {
        let policy = policy
            .as_any()
            .downcast_ref::<EmailDomainPolicy>()
            .ok_or(PolicyError::KindMismatch {
                handler: "EmailDomainPolicy",
                policy: policy.name(),
            })?;

        if user.email.ends_with(&policy.suffix) {
            Ok(())
        } else {
            Err(PolicyError::Rejected(format!(
                "email must end with {}",
                policy.suffix
            )))
        }
    }
}
