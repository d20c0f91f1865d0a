//! Authentication support.

mod middleware;

pub use middleware::AuthUser;
