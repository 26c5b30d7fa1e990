//! One lazily opened PostgreSQL handle, built from the "database" bundle.

use crate::config::{ConfigStore, DatabaseConfig};
use crate::error::AppError;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::PgPool;
use std::ops::Deref;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

/// The handle is a pool capped at a single connection.
const MAX_CONNECTIONS: u32 = 1;

/// Longest wait for the single connection while another query holds it.
const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(30);

/// Shared database handle. Clones refer to the same underlying connection.
#[derive(Clone, Debug)]
pub struct Connection(Arc<PgPool>);

impl Connection {
    pub fn from_pool(pool: PgPool) -> Self {
        Connection(Arc::new(pool))
    }

    pub fn pool(&self) -> &PgPool {
        &self.0
    }

    /// True when both values refer to the same opened handle.
    pub fn same_as(&self, other: &Connection) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Deref for Connection {
    type Target = PgPool;

    fn deref(&self) -> &PgPool {
        &self.0
    }
}

pub fn connect_options(cfg: &DatabaseConfig) -> PgConnectOptions {
    PgConnectOptions::new()
        .host(&cfg.hostname)
        .port(cfg.port)
        .database(&cfg.dbname)
        .username(&cfg.username)
        .password(&cfg.password)
        .options([("client_encoding", cfg.charset.as_str())])
}

/// One connection, never recycled: the session lives until `disconnect`.
fn pool_options() -> PgPoolOptions {
    PgPoolOptions::new()
        .max_connections(MAX_CONNECTIONS)
        .acquire_timeout(ACQUIRE_TIMEOUT)
        .idle_timeout(None)
        .max_lifetime(None)
}

/// Connection manager: at most one open handle, opened on first use.
#[derive(Debug)]
pub struct Database {
    config: Arc<ConfigStore>,
    handle: Mutex<Option<Connection>>,
}

impl Database {
    pub fn new(config: Arc<ConfigStore>) -> Self {
        Database {
            config,
            handle: Mutex::new(None),
        }
    }

    /// Returns the open handle, or opens one from the "database" bundle.
    /// The lock is held across the open so concurrent callers share one handle.
    pub async fn connect_to(&self) -> Result<Connection, AppError> {
        let mut guard = self.handle.lock().await;
        if let Some(conn) = guard.as_ref() {
            return Ok(conn.clone());
        }
        let cfg = self.config.database()?;
        let pool = pool_options()
            .connect_with(connect_options(&cfg))
            .await
            .map_err(AppError::Connection)?;
        tracing::info!(host = %cfg.hostname, port = cfg.port, dbname = %cfg.dbname, "database connected");
        let conn = Connection::from_pool(pool);
        *guard = Some(conn.clone());
        Ok(conn)
    }

    /// Drop the cached handle. The pool is closed once no model still holds it.
    pub async fn disconnect(&self) {
        let taken = self.handle.lock().await.take();
        if let Some(Connection(pool)) = taken {
            if let Some(pool) = Arc::into_inner(pool) {
                pool.close().await;
            }
            tracing::info!("database disconnected");
        }
    }

    pub async fn is_connected(&self) -> bool {
        self.handle.lock().await.is_some()
    }
}
