pub mod mapping;
pub mod pool;
pub mod queries;

pub use pool::{create_lazy_pool, create_pool, run_migrations};
pub use queries::*;
