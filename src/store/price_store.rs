use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgConnection, PgPool};
use tracing::{error, info};

use crate::config::DatabaseConfig;
use crate::db::price_queries;
use crate::errors::PersistenceError;
use crate::models::{PricePoint, TableStats, UpsertSummary};

/// Uniqueness-constrained storage for daily price points.
#[async_trait]
pub trait PriceStore: Send + Sync {
    /// Connectivity probe.
    async fn ping(&self) -> Result<(), PersistenceError>;

    /// Create the table and its indexes if absent.
    async fn ensure_schema(&self) -> Result<(), PersistenceError>;

    /// Write one symbol's batch inside a single transaction.
    ///
    /// Keys already present are skipped and left untouched. On error nothing
    /// from this batch is kept.
    async fn upsert_batch(&self, points: &[PricePoint]) -> Result<UpsertSummary, PersistenceError>;

    /// At most two points, newest date first.
    async fn latest_two(&self, symbol: &str) -> Result<Vec<PricePoint>, PersistenceError>;

    async fn stats(&self) -> Result<TableStats, PersistenceError>;
}

pub struct PgPriceStore {
    pool: PgPool,
}

impl PgPriceStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Builds the pool without connecting; the first real connection is made
    /// by the setup probe.
    pub fn connect_lazy(config: &DatabaseConfig) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .connect_lazy(&config.url)?;
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

async fn write_batch(
    conn: &mut PgConnection,
    points: &[PricePoint],
) -> Result<UpsertSummary, sqlx::Error> {
    let mut summary = UpsertSummary::default();

    for p in points {
        if price_queries::exists(conn, &p.symbol, p.date).await? {
            summary.skipped += 1;
            continue;
        }

        if price_queries::insert_if_absent(conn, p).await? {
            summary.stored += 1;
        } else {
            summary.skipped += 1;
        }
    }

    Ok(summary)
}

#[async_trait]
impl PriceStore for PgPriceStore {
    async fn ping(&self) -> Result<(), PersistenceError> {
        price_queries::ping(&self.pool).await.map_err(|e| {
            error!("Database connection test failed: {}", e);
            PersistenceError::from(e)
        })?;
        info!("Database connection test successful");
        Ok(())
    }

    async fn ensure_schema(&self) -> Result<(), PersistenceError> {
        price_queries::ensure_schema(&self.pool).await.map_err(|e| {
            error!("Error creating tables: {}", e);
            PersistenceError::from(e)
        })?;
        info!("Database tables ready");
        Ok(())
    }

    async fn upsert_batch(&self, points: &[PricePoint]) -> Result<UpsertSummary, PersistenceError> {
        let Some(first) = points.first() else {
            return Ok(UpsertSummary::default());
        };
        let (symbol, _) = first.key();
        let symbol = symbol.to_string();

        let mut tx = self.pool.begin().await.map_err(|e| {
            error!("Failed to begin transaction for {}: {}", symbol, e);
            PersistenceError::from(e)
        })?;

        let written = write_batch(&mut *tx, points).await;
        match written {
            Ok(summary) => {
                tx.commit().await.map_err(|e| {
                    error!("Failed to commit transaction for {}: {}", symbol, e);
                    PersistenceError::RolledBack {
                        symbol: symbol.clone(),
                        reason: e.to_string(),
                    }
                })?;
                Ok(summary)
            }
            Err(e) => {
                error!("Rolling back batch for {}: {}", symbol, e);
                if let Err(rollback_err) = tx.rollback().await {
                    error!("Rollback for {} failed: {}", symbol, rollback_err);
                }
                Err(PersistenceError::RolledBack {
                    symbol,
                    reason: e.to_string(),
                })
            }
        }
    }

    async fn latest_two(&self, symbol: &str) -> Result<Vec<PricePoint>, PersistenceError> {
        Ok(price_queries::fetch_latest_two(&self.pool, symbol).await?)
    }

    async fn stats(&self) -> Result<TableStats, PersistenceError> {
        Ok(price_queries::fetch_stats(&self.pool).await?)
    }
}
