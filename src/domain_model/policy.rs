use std::any::{Any, TypeId};
use std::fmt;

/// Data-only authorization rule attached to an endpoint. The handler that
/// evaluates it is looked up by the concrete type of the value.
pub trait Policy: fmt::Debug + Send + Sync + 'static {
    fn name(&self) -> &'static str;
    fn as_any(&self) -> &dyn Any;
}

#[derive(Debug, Clone, Copy)]
pub struct PolicyKind {
    type_id: TypeId,
    name: &'static str,
}

impl PolicyKind {
    pub fn of<P: Policy>() -> Self {
        let full = std::any::type_name::<P>();
        PolicyKind {
            type_id: TypeId::of::<P>(),
            name: full.rsplit("::").next().unwrap_or(full),
        }
    }

    pub fn of_policy(policy: &dyn Policy) -> Self {
        PolicyKind {
            type_id: policy.as_any().type_id(),
            name: policy.name(),
        }
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl PartialEq for PolicyKind {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id
    }
}

impl Eq for PolicyKind {}

impl fmt::Display for PolicyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Caller must have an email ending in `suffix` (case-sensitive).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailDomainPolicy {
    pub suffix: String,
}

impl EmailDomainPolicy {
    pub fn new(suffix: impl Into<String>) -> Self {
        EmailDomainPolicy {
            suffix: suffix.into(),
        }
    }
}

impl Policy for EmailDomainPolicy {
    fn name(&self) -> &'static str {
        "emailDomain"
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
