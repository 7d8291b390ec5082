mod pool;

pub use pool::{mask_database_url, PostgresPool};
