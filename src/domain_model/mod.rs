mod policy;
mod user;

pub use policy::*;
pub use user::*;
