//! SQLite persistence for game records and the move log.

mod error;
mod models;
mod repository;
mod schema;

pub use error::StoreError;
pub use models::{GameRow, MoveRow};
pub use repository::SqliteStore;
