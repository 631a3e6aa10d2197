pub mod models;
pub mod result_cache;
pub mod session;
