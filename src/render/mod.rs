//! Output layer: MongoDB query documents, shell syntax, driver snippets
//! and SQL.

pub mod code;
pub mod filter;
pub mod shell;
pub mod sql;

pub use code::{Language, render_code};
pub use filter::{filter_to_string, filter_to_value};
pub use shell::render_query;
pub use sql::{SqlDialect, SqlError, select_statement, where_clause};
