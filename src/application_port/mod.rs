mod auth_service;
mod authorization;

pub use auth_service::*;
pub use authorization::*;
