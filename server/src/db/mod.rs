//! PostgreSQL-backed action store.

mod actions;
mod pool;

pub use actions::PgActionStore;
pub use pool::*;
