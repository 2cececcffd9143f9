//! MongoDB query building, SQL translation, database connection strings,
//! environment-variable checks and local tool storage behind the `devtools`
//! binary.

pub mod compile;
pub mod config;
pub mod connection;
pub mod env;
pub mod model;
pub mod pipeline;
pub mod render;
pub mod schema;
pub mod store;
pub mod validate;

pub type Result<T> = anyhow::Result<T>;
