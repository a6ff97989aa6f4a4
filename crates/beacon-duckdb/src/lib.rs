pub mod aggregate;
pub mod analytics_impl;
pub mod backend;
pub mod queries;
pub mod retention;
pub mod schema;
pub mod session;
pub mod tracking;
pub mod website;

pub use backend::DuckDbBackend;

/// Re-export the `duckdb` crate so consumers (especially tests) can use
/// `beacon_duckdb::duckdb::params!` without an extra dependency.
pub use duckdb;
