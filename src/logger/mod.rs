//! Process-wide tracing setup. Installing a global subscriber is not
//! repeatable inside one test binary, so this is exercised by `main`.

mod logger;
pub use logger::*;

pub use tracing::{debug, error, info, trace, warn};
