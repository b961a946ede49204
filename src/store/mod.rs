//! Persistence layer: libSQL backend, migrations, repositories, seeding.

pub mod backend;
pub mod migrations;
pub mod repo;
pub mod seed;

pub use backend::{LibSqlStore, StoreTransaction};
