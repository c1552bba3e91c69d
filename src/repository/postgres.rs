//! PostgreSQL repository.
//!
//! Runtime-checked queries over a `sqlx` pool. The `watchlist` table is
//! created on connect if it does not exist.

use std::str::FromStr;

use async_trait::async_trait;
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions, PgRow, PgSslMode};
use sqlx::Row;

use crate::config::DatabaseConfig;
use crate::logger::{Attr, Logger};
use crate::repository::{
    entry_attrs, Context, NewEntry, RepositoryError, WatchlistEntry, WatchlistRepository,
};

/// SQLSTATE for unique_violation.
const UNIQUE_VIOLATION: &str = "23505";

pub struct PostgresRepository {
    pool: PgPool,
    logger: Logger,
}

impl PostgresRepository {
    /// Open a pool for `config` and ensure the schema exists.
    pub async fn connect(config: &DatabaseConfig, logger: Logger) -> Result<Self, RepositoryError> {
        let ssl_mode = PgSslMode::from_str(&config.sslmode)
            .map_err(|e| RepositoryError::Database(format!("invalid sslmode: {}", e)))?;

        let options = PgConnectOptions::new()
            .host(&config.host)
            .port(config.port)
            .username(&config.user)
            .password(&config.password)
            .database(&config.name)
            .ssl_mode(ssl_mode);

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .connect_with(options)
            .await
            .map_err(|e| RepositoryError::Database(format!("failed to connect: {}", e)))?;

        let repo = Self { pool, logger };
        repo.migrate().await?;

        tracing::info!(host = %config.host, database = %config.name, "Connected to PostgreSQL");
        Ok(repo)
    }

    pub async fn migrate(&self) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS watchlist (
                id BIGSERIAL PRIMARY KEY,
                media_id BIGINT NOT NULL,
                user_id BIGINT NOT NULL,
                created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
                UNIQUE (media_id, user_id)
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| RepositoryError::Database(format!("failed to create watchlist table: {}", e)))?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_watchlist_user_id ON watchlist(user_id)")
            .execute(&self.pool)
            .await
            .map_err(|e| RepositoryError::Database(format!("failed to create index: {}", e)))?;

        Ok(())
    }

    async fn exists(&self, media_id: i64, user_id: i64) -> Result<bool, RepositoryError> {
        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM watchlist WHERE media_id = $1 AND user_id = $2)",
        )
        .bind(media_id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(database_error)
    }

    /// Report a failed call and hand the error back.
    fn failed(&self, message: &str, attrs: &[Attr], err: RepositoryError) -> RepositoryError {
        let mut attrs = attrs.to_vec();
        attrs.push(Attr::error(&err));
        self.logger.error(message, &attrs);
        err
    }
}

#[async_trait]
impl WatchlistRepository for PostgresRepository {
    async fn add(&self, ctx: &Context, entry: NewEntry) -> Result<WatchlistEntry, RepositoryError> {
        self.logger.check_canceled(ctx, "AddToWatchlist")?;
        let attrs = entry_attrs(entry.media_id, entry.user_id);

        let exists = self
            .exists(entry.media_id, entry.user_id)
            .await
            .map_err(|e| self.failed("failed to check watchlist existence", &attrs, e))?;
        if exists {
            self.logger.warn("media already in watchlist", &attrs);
            return Err(RepositoryError::Duplicate);
        }

        let row = sqlx::query(
            r#"
            INSERT INTO watchlist (media_id, user_id, created_at)
            VALUES ($1, $2, $3)
            RETURNING id, media_id, user_id, created_at
            "#,
        )
        .bind(entry.media_id)
        .bind(entry.user_id)
        .bind(entry.created_at)
        .fetch_one(&self.pool)
        .await;

        match row {
            Ok(row) => {
                self.logger.info("media added to watchlist", &attrs);
                Ok(entry_from_row(&row))
            }
            Err(e) if is_unique_violation(&e) => {
                self.logger.warn("media already in watchlist", &attrs);
                Err(RepositoryError::Duplicate)
            }
            Err(e) => Err(self.failed("failed to add media to watchlist", &attrs, database_error(e))),
        }
    }

    async fn remove(&self, ctx: &Context, media_id: i64, user_id: i64) -> Result<(), RepositoryError> {
        self.logger.check_canceled(ctx, "RemoveFromWatchlist")?;
        let attrs = entry_attrs(media_id, user_id);

        let exists = self
            .exists(media_id, user_id)
            .await
            .map_err(|e| self.failed("failed to check watchlist existence", &attrs, e))?;
        if !exists {
            self.logger.warn("media not found in watchlist", &attrs);
            return Err(RepositoryError::NotFound);
        }

        sqlx::query("DELETE FROM watchlist WHERE media_id = $1 AND user_id = $2")
            .bind(media_id)
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(|e| self.failed("failed to remove media from watchlist", &attrs, database_error(e)))?;

        self.logger.info("media removed from watchlist", &attrs);
        Ok(())
    }

    async fn list(&self, ctx: &Context, user_id: i64) -> Result<Vec<WatchlistEntry>, RepositoryError> {
        self.logger.check_canceled(ctx, "GetWatchlist")?;
        let attrs = [Attr::int("user_id", user_id)];

        let rows = sqlx::query(
            r#"
            SELECT id, media_id, user_id, created_at
            FROM watchlist WHERE user_id = $1 ORDER BY id
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| self.failed("failed to get watchlist", &attrs, database_error(e)))?;

        self.logger.info("watchlist fetched", &attrs);
        Ok(rows.iter().map(entry_from_row).collect())
    }

    async fn contains(&self, ctx: &Context, media_id: i64, user_id: i64) -> Result<bool, RepositoryError> {
        self.logger.check_canceled(ctx, "CheckInWatchlist")?;
        self.exists(media_id, user_id).await.map_err(|e| {
            self.failed("failed to check watchlist", &entry_attrs(media_id, user_id), e)
        })
    }
}

fn entry_from_row(row: &PgRow) -> WatchlistEntry {
    WatchlistEntry {
        id: row.get("id"),
        media_id: row.get("media_id"),
        user_id: row.get("user_id"),
        created_at: row.get("created_at"),
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .and_then(|db| db.code())
        .is_some_and(|code| code == UNIQUE_VIOLATION)
}

fn database_error(err: sqlx::Error) -> RepositoryError {
    if is_unique_violation(&err) {
        RepositoryError::Duplicate
    } else {
        RepositoryError::Database(err.to_string())
    }
}
