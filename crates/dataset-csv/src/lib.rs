//! Append-only CSV dataset of host records with a fixed column schema.

mod append;
mod error;
mod models;
mod open;
mod schema;
mod snapshot;

pub use append::AppendReport;
pub use error::PersistenceError;
pub use models::{format_timestamp, parse_timestamp, Row, RowDefect};
pub use open::Dataset;
pub use schema::{COLUMNS, LEGACY_NO_SERVICES};
