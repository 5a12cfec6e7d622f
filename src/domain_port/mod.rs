// store

mod key_value_store;

pub use key_value_store::*;

// repo

mod user_repo;

pub use user_repo::*;
