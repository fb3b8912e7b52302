use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Row, SqlitePool};
use tracing::{debug, info};

use common::{Candle, Error, InstrumentSignal, PriceQuote, QuoteOrigin, Result};

/// A stored payload and when it was written.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot<T> {
    pub value: T,
    pub updated_at: DateTime<Utc>,
}

/// One row of the `prices` history table.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PricePoint {
    pub price: f64,
    pub change_pct: f64,
    pub origin: String,
    pub recorded_at: DateTime<Utc>,
}

/// SQLite-backed snapshot cache plus append-only price and signal history.
#[derive(Clone)]
pub struct QuoteCache {
    db: SqlitePool,
}

impl QuoteCache {
    /// Open (creating if allowed by the URL) and migrate the database.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let db = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;
        let cache = Self::from_pool(db).await?;
        info!(url = %database_url, "Quote cache ready");
        Ok(cache)
    }

    pub async fn from_pool(db: SqlitePool) -> Result<Self> {
        sqlx::migrate!("../../migrations")
            .run(&db)
            .await
            .map_err(|e| Error::Database(sqlx::Error::Migrate(Box::new(e))))?;
        Ok(Self { db })
    }

    pub async fn put<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        let payload = serde_json::to_string(value)?;
        sqlx::query(
            "INSERT INTO snapshots (key, payload, updated_at) VALUES (?, ?, ?)
             ON CONFLICT(key) DO UPDATE SET payload = excluded.payload, updated_at = excluded.updated_at",
        )
        .bind(key)
        .bind(payload)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.db)
        .await?;
        Ok(())
    }

    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<Snapshot<T>>> {
        let row = sqlx::query("SELECT payload, updated_at FROM snapshots WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.db)
            .await?;
        let Some(row) = row else {
            return Ok(None);
        };
        let payload: String = row.try_get("payload")?;
        let updated_at: String = row.try_get("updated_at")?;
        Ok(Some(Snapshot {
            value: serde_json::from_str(&payload)?,
            updated_at: parse_time(&updated_at)?,
        }))
    }

    /// Snapshot each priced quote under `quote:<id>` and append it to the
    /// price history. Zero-filled placeholders are skipped.
    pub async fn store_quotes(&self, quotes: &[PriceQuote]) -> Result<usize> {
        let now = Utc::now().to_rfc3339();
        let mut tx = self.db.begin().await?;
        let mut stored = 0;
        for quote in quotes.iter().filter(|q| q.has_price()) {
            sqlx::query(
                "INSERT INTO snapshots (key, payload, updated_at) VALUES (?, ?, ?)
                 ON CONFLICT(key) DO UPDATE SET payload = excluded.payload, updated_at = excluded.updated_at",
            )
            .bind(quote_key(&quote.id))
            .bind(serde_json::to_string(quote)?)
            .bind(&now)
            .execute(&mut *tx)
            .await?;

            sqlx::query(
                "INSERT INTO prices (instrument_id, price, change_pct, origin, recorded_at)
                 VALUES (?, ?, ?, ?, ?)",
            )
            .bind(&quote.id)
            .bind(quote.price)
            .bind(quote.change_pct)
            .bind(quote.origin.to_string())
            .bind(&now)
            .execute(&mut *tx)
            .await?;
            stored += 1;
        }
        tx.commit().await?;
        debug!(stored, "Quotes cached");
        Ok(stored)
    }

    /// Last cached quote for `id`, re-tagged as coming from the cache.
    pub async fn cached_quote(&self, id: &str) -> Result<Option<Snapshot<PriceQuote>>> {
        let snapshot: Option<Snapshot<PriceQuote>> = self.get(&quote_key(id)).await?;
        Ok(snapshot.map(|mut s| {
            s.value.origin = QuoteOrigin::Cache;
            s
        }))
    }

    pub async fn store_candles(&self, id: &str, candles: &[Candle]) -> Result<()> {
        self.put(&candle_key(id), &candles).await
    }

    pub async fn cached_candles(&self, id: &str) -> Result<Option<Snapshot<Vec<Candle>>>> {
        self.get(&candle_key(id)).await
    }

    pub async fn record_signals(&self, signals: &[InstrumentSignal]) -> Result<()> {
        let mut tx = self.db.begin().await?;
        for s in signals {
            sqlx::query(
                "INSERT INTO indicators
                     (instrument_id, policy, signal, reasons, indicator_values, recorded_at)
                 VALUES (?, ?, ?, ?, ?, ?)",
            )
            .bind(&s.instrument_id)
            .bind(s.policy.to_string())
            .bind(s.signal.to_string())
            .bind(serde_json::to_string(&s.reasons)?)
            .bind(serde_json::to_string(&s.indicator_values)?)
            .bind(s.timestamp.to_rfc3339())
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    /// Most recent `limit` history rows for `id`, newest first.
    pub async fn price_history(&self, id: &str, limit: u32) -> Result<Vec<PricePoint>> {
        let rows = sqlx::query(
            "SELECT price, change_pct, origin, recorded_at FROM prices
             WHERE instrument_id = ? ORDER BY id DESC LIMIT ?",
        )
        .bind(id)
        .bind(limit)
        .fetch_all(&self.db)
        .await?;

        rows.iter()
            .map(|row| -> Result<PricePoint> {
                let recorded_at: String = row.try_get("recorded_at")?;
                Ok(PricePoint {
                    price: row.try_get("price")?,
                    change_pct: row.try_get("change_pct")?,
                    origin: row.try_get("origin")?,
                    recorded_at: parse_time(&recorded_at)?,
                })
            })
            .collect()
    }
}

fn quote_key(id: &str) -> String {
    format!("quote:{id}")
}

fn candle_key(id: &str) -> String {
    format!("candles:{id}")
}

fn parse_time(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| Error::Database(sqlx::Error::Decode(Box::new(e))))
}
