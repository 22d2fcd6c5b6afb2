//! # Database
//!
//! Connection pooling for the target PostgreSQL database. Statement construction
//! and execution live in [`crate::load`]; this module only owns the pool.

pub mod connection;

pub use connection::DatabaseConnection;
