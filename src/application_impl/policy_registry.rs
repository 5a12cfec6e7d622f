use crate::application_port::{PolicyError, PolicyHandler};
use crate::domain_model::PolicyKind;
use std::any::TypeId;
use std::collections::HashMap;
use std::sync::Arc;

/// Policy kind to handler, fixed at construction.
pub struct PolicyHandlerRegistry {
    handlers: HashMap<TypeId, Arc<dyn PolicyHandler>>,
}

impl PolicyHandlerRegistry {
    /// A later handler for an already-seen kind replaces the earlier one.
    pub fn new(handlers: impl IntoIterator<Item = Arc<dyn PolicyHandler>>) -> Self {
        let handlers = handlers
            .into_iter()
            .map(|handler| (handler.kind().type_id(), handler))
            .collect();
        PolicyHandlerRegistry { handlers }
    }

    pub fn get(&self, kind: &PolicyKind) -> Result<Arc<dyn PolicyHandler>, PolicyError> {
        self.handlers
            .get(&kind.type_id())
            .cloned()
            .ok_or(PolicyError::HandlerNotFound(kind.name()))
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application_impl::EmailDomainPolicyHandler;
    use crate::domain_model::*;
    use std::any::Any;

    #[derive(Debug)]
    struct Unhandled;

    impl Policy for Unhandled {
        fn name(&self) -> &'static str {
            "unhandled"
        }
        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    #[test]
    fn returns_registered_handler() {
        let handler: Arc<dyn PolicyHandler> = Arc::new(EmailDomainPolicyHandler);
        let registry = PolicyHandlerRegistry::new([handler.clone()]);

        let found = registry.get(&PolicyKind::of::<EmailDomainPolicy>()).unwrap();
        assert!(Arc::ptr_eq(&found, &handler));
    }

    #[test]
    fn later_registration_overwrites() {
        let first: Arc<dyn PolicyHandler> = Arc::new(EmailDomainPolicyHandler);
        let second: Arc<dyn PolicyHandler> = Arc::new(EmailDomainPolicyHandler);
        let registry = PolicyHandlerRegistry::new([first.clone(), second.clone()]);

        assert_eq!(registry.len(), 1);
        let found = registry.get(&PolicyKind::of::<EmailDomainPolicy>()).unwrap();
        assert!(Arc::ptr_eq(&found, &second));
    }

    #[test]
    fn unknown_kind_is_an_error_naming_the_policy() {
        let registry = PolicyHandlerRegistry::new([]);
        assert!(registry.is_empty());

        let err = registry.get(&PolicyKind::of_policy(&Unhandled)).err().unwrap();
        assert_eq!(err, PolicyError::HandlerNotFound("unhandled"));
        assert_eq!(err.to_string(), "Policy handler for unhandled not found");
    }
}
