pub mod connection;
pub mod duckdb_loader;

pub use connection::ScopedConnection;
pub use duckdb_loader::{FactSample, LoadReport, StarSchemaLoader};
