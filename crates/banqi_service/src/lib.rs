//! Banqi game service - persistence, authentication and game operations.
//!
//! Wraps the pure rules engine in [`banqi_rules`] with everything a deployed
//! game needs around it.
//!
//! # Architecture
//!
//! - **Store**: [`GameStore`] with [`SqliteStore`] (diesel) and [`MemoryStore`]
//! - **Auth**: [`Authenticator`] with static bearer tokens
//! - **Service**: [`GameService`] seats players and commits moves with
//!   conflict retry
//! - **Config**: [`ServiceConfig`] from TOML plus environment overrides
//!
//! # Example
//!
//! ```
//! use banqi_service::{GameService, MemoryStore, TokenAuthenticator};
//! use std::collections::HashMap;
//!
//! let tokens = HashMap::from([("alice-token".to_string(), "alice".to_string())]);
//! let service = GameService::new(MemoryStore::new(), TokenAuthenticator::new(tokens), 3);
//! let view = service.create_game("Bearer alice-token").unwrap();
//! assert_eq!(view.game().players().len(), 1);
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod auth;
mod config;
mod db;
mod service;
mod store;

pub use auth::{Authenticator, TokenAuthenticator};
pub use config::{ConfigError, DATABASE_PATH_ENV, ServiceConfig};
pub use db::{GameRow, MoveRow, SqliteStore, StoreError};
pub use service::{GameService, GameView, ServiceError};
pub use store::{CommitOutcome, GameStore, MemoryStore, Revision};
