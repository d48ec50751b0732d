//! Database primitives shared by the server binary and the store service.

use std::time::Duration;

use sea_orm::{
    ConnectOptions, ConnectionTrait, Database, DatabaseBackend, DatabaseConnection, DbErr,
    SqlErr, Statement,
};
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

/// Shared connection pool handle.
pub type DbPool = DatabaseConnection;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("database url missing (set {0})")]
    MissingUrl(String),
    #[error("invalid {key}: {value}")]
    InvalidSetting { key: &'static str, value: String },
    #[error("failed to connect to database: {0}")]
    Connect(#[source] DbErr),
}

pub type DbResult<T> = Result<T, DbError>;

/// Connection target and pool sizing, resolved once at startup.
#[derive(Clone, Debug, Deserialize)]
pub struct DatabaseSettings {
    pub url: String,
    #[serde(default)]
    pub max_connections: Option<u32>,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

fn default_connect_timeout_secs() -> u64 {
    10
}

impl DatabaseSettings {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            max_connections: None,
            connect_timeout_secs: default_connect_timeout_secs(),
        }
    }

    pub fn with_max_connections(mut self, max: u32) -> Self {
        self.max_connections = Some(max);
        self
    }

    /// Reads `DATABASE_URL` and the optional `DATABASE_MAX_CONNECTIONS`.
    pub fn from_env() -> DbResult<Self> {
        Self::from_env_key("DATABASE_URL")
    }

    pub fn from_env_key(url_key: &str) -> DbResult<Self> {
        let url = std::env::var(url_key).map_err(|_| DbError::MissingUrl(url_key.to_string()))?;
        let mut settings = Self::new(url);
        if let Ok(raw) = std::env::var("DATABASE_MAX_CONNECTIONS") {
            let max = raw
                .trim()
                .parse::<u32>()
                .map_err(|_| DbError::InvalidSetting {
                    key: "DATABASE_MAX_CONNECTIONS",
                    value: raw.clone(),
                })?;
            settings = settings.with_max_connections(max);
        }
        Ok(settings)
    }

    fn connect_options(&self) -> ConnectOptions {
        let mut options = ConnectOptions::new(self.url.clone());
        options
            .connect_timeout(Duration::from_secs(self.connect_timeout_secs))
            .sqlx_logging(false);
        if let Some(max) = self.max_connections {
            options.max_connections(max);
        }
        options
    }
}

/// Open a pooled connection for the configured backend.
pub async fn connect(settings: &DatabaseSettings) -> DbResult<DbPool> {
    let pool = Database::connect(settings.connect_options())
        .await
        .map_err(DbError::Connect)?;
    debug!(backend = ?pool.get_database_backend(), "database pool ready");
    Ok(pool)
}

/// True when the backend rejected a write because of a unique or primary key.
pub fn is_unique_violation(err: &DbErr) -> bool {
    matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_)))
}

/// Move a Postgres serial sequence past the largest stored id.
///
/// Rows inserted with an explicit id do not advance the sequence, so the next
/// generated id would collide. Other backends derive the next id from the
/// table itself and are left alone.
pub async fn advance_id_sequence<C>(conn: &C, table: &str, column: &str) -> Result<(), DbErr>
where
    C: ConnectionTrait,
{
    if conn.get_database_backend() != DatabaseBackend::Postgres {
        return Ok(());
    }
    let sql = format!(
        "SELECT setval(pg_get_serial_sequence('{table}', '{column}'), \
         COALESCE((SELECT MAX({column}) FROM {table}), 1))"
    );
    conn.execute(Statement::from_string(DatabaseBackend::Postgres, sql))
        .await
        .map(|_| ())
}
