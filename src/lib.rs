//! crud-kit: primitives for CRUD web pages backed by PostgreSQL.

pub mod alert;
pub mod config;
pub mod database;
pub mod error;
pub mod files;
pub mod helper;
pub mod messages;
pub mod model;
pub mod routes;
pub mod security;
pub mod sql;
pub mod state;

pub use alert::{Alert, AlertKind};
pub use config::{ConfigBundle, ConfigStore, DatabaseConfig, UploadConfig};
pub use database::{Connection, Database};
pub use error::{AppError, ConfigError};
pub use files::{FileManager, TransferError, UploadDescriptor};
pub use messages::Messages;
pub use model::{Fetched, Model, QueryOutcome, Record};
pub use routes::common_routes;
pub use security::escape;
pub use state::AppState;
