use std::str::FromStr;

use sqlx::{
    Sqlite, Transaction,
    pool::PoolConnection,
    sqlite::{
        SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous,
    },
};

use crate::error::StoreError;

/// Owns the single database connection shared by every store operation.
pub(super) struct DbState {
    url: String,
    pool: SqlitePool,
}

impl std::fmt::Debug for DbState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DbState")
            .field("url", &self.url)
            .field("closed", &self.pool.is_closed())
            .finish()
    }
}

impl DbState {
    pub(super) async fn connect(url: &str) -> Result<Self, StoreError> {
        let connection_error = |source| StoreError::Connection {
            url: url.to_string(),
            source,
        };

        let connect_opts = SqliteConnectOptions::from_str(url)
            .map_err(connection_error)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .foreign_keys(true);

        // One connection, kept open for the lifetime of the store.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(connect_opts)
            .await
            .map_err(connection_error)?;

        tracing::debug!(url, "database connection opened");
        Ok(Self {
            url: url.to_string(),
            pool,
        })
    }

    pub(super) async fn conn(&self) -> Result<PoolConnection<Sqlite>, StoreError> {
        Ok(self.pool.acquire().await?)
    }

    pub(super) async fn begin(&self) -> Result<Transaction<'static, Sqlite>, StoreError> {
        Ok(self.pool.begin().await?)
    }

    pub(super) async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    pub(super) fn url(&self) -> &str {
        &self.url
    }

    pub(super) async fn close(&self) {
        self.pool.close().await;
        tracing::debug!(url = %self.url, "database connection closed");
    }
}
