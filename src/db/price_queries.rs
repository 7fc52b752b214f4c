use chrono::NaiveDate;
use sqlx::{PgConnection, PgPool};

use crate::models::{PricePoint, TableStats};

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS stock_prices (
        id BIGSERIAL PRIMARY KEY,
        symbol VARCHAR(10) NOT NULL,
        date DATE NOT NULL,
        open_price DOUBLE PRECISION NOT NULL,
        high_price DOUBLE PRECISION NOT NULL,
        low_price DOUBLE PRECISION NOT NULL,
        close_price DOUBLE PRECISION NOT NULL,
        volume BIGINT NOT NULL,
        created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    "#,
    "CREATE INDEX IF NOT EXISTS ix_stock_prices_symbol ON stock_prices (symbol)",
    "CREATE INDEX IF NOT EXISTS ix_stock_prices_date ON stock_prices (date)",
    "CREATE UNIQUE INDEX IF NOT EXISTS idx_symbol_date ON stock_prices (symbol, date)",
];

pub async fn ping(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::query_scalar::<_, i32>("SELECT 1")
        .fetch_one(pool)
        .await?;
    Ok(())
}

/// Idempotent: every statement is create-if-absent.
pub async fn ensure_schema(pool: &PgPool) -> Result<(), sqlx::Error> {
    let mut tx = pool.begin().await?;
    for statement in SCHEMA {
        sqlx::query(*statement).execute(&mut *tx).await?;
    }
    tx.commit().await
}

pub async fn exists(
    conn: &mut PgConnection,
    symbol: &str,
    date: NaiveDate,
) -> Result<bool, sqlx::Error> {
    sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS (SELECT 1 FROM stock_prices WHERE symbol = $1 AND date = $2)",
    )
    .bind(symbol)
    .bind(date)
    .fetch_one(conn)
    .await
}

/// Returns `false` when the key was already present; the stored row is never
/// touched.
pub async fn insert_if_absent(
    conn: &mut PgConnection,
    p: &PricePoint,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"
        INSERT INTO stock_prices
            (symbol, date, open_price, high_price, low_price, close_price, volume, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        ON CONFLICT (symbol, date) DO NOTHING
        "#,
    )
    .bind(&p.symbol)
    .bind(p.date)
    .bind(p.open)
    .bind(p.high)
    .bind(p.low)
    .bind(p.close)
    .bind(p.volume)
    .bind(p.ingested_at)
    .execute(conn)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// At most two points, newest date first.
pub async fn fetch_latest_two(
    pool: &PgPool,
    symbol: &str,
) -> Result<Vec<PricePoint>, sqlx::Error> {
    sqlx::query_as::<_, PricePoint>(
        r#"
        SELECT symbol, date, open_price, high_price, low_price, close_price, volume, created_at
        FROM stock_prices
        WHERE symbol = $1
        ORDER BY date DESC
        LIMIT 2
        "#,
    )
    .bind(symbol)
    .fetch_all(pool)
    .await
}

pub async fn fetch_stats(pool: &PgPool) -> Result<TableStats, sqlx::Error> {
    let (total_records, unique_symbols, earliest_date, latest_date) =
        sqlx::query_as::<_, (i64, i64, Option<NaiveDate>, Option<NaiveDate>)>(
            r#"
            SELECT COUNT(*), COUNT(DISTINCT symbol), MIN(date), MAX(date)
            FROM stock_prices
            "#,
        )
        .fetch_one(pool)
        .await?;

    Ok(TableStats {
        total_records,
        unique_symbols,
        earliest_date,
        latest_date,
    })
}
