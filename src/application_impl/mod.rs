mod argon2_hasher;
mod auth_service_impl;
mod authentication_guard;
mod authorization_chain;
mod authorization_checks;
mod email_domain_policy;
mod id_token_verifier;
mod jwt_codec;
mod policy_registry;
mod refresh_token_ids_store;

pub use argon2_hasher::*;
pub use auth_service_impl::*;
pub use authentication_guard::*;
pub use authorization_chain::*;
pub use authorization_checks::*;
pub use email_domain_policy::*;
pub use id_token_verifier::*;
pub use jwt_codec::*;
pub use policy_registry::*;
pub use refresh_token_ids_store::*;
