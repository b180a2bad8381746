//! Persistence layer — repository trait with in-memory and libSQL backends.

pub mod libsql_backend;
pub mod memory;
pub mod migrations;
pub mod traits;

pub use libsql_backend::LibSqlBackend;
pub use memory::InMemoryRepository;
pub use traits::Repository;
