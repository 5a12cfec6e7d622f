mod error;
mod handler;
mod router;

pub use error::*;
pub use handler::{IdTokenRequest, RefreshTokenRequest, SignInRequest, SignUpRequest, SignUpResponse};
pub use router::{routes, with_authorization};
