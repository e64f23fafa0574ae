//! SQLite adapter: parameter document, OHLCV bars and archived series.
//!
//! One pool backs every port; clones share it, so a single database can be
//! the parameter storage, the data source and the archive at once.

use crate::domain::chart_indicator::NamedSeries;
use crate::domain::config::ChartConfig;
use crate::domain::document::{InstanceNode, ParamNode, ParameterDocument};
use crate::domain::error::ChartError;
use crate::domain::key::IndicatorKey;
use crate::domain::ohlcv::{BaseSeries, OhlcvBar};
use crate::ports::archive_port::SeriesArchivePort;
use crate::ports::data_port::DataPort;
use crate::ports::storage_port::ParameterStoragePort;
use chrono::{NaiveDate, NaiveDateTime};
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::params;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

fn persistence(e: impl ToString) -> ChartError {
    ChartError::persistence(e)
}

fn data(e: impl ToString) -> ChartError {
    ChartError::Data {
        reason: e.to_string(),
    }
}

#[derive(Clone)]
pub struct SqliteAdapter {
    pool: Pool<SqliteConnectionManager>,
}

impl SqliteAdapter {
    pub fn from_config(config: &ChartConfig) -> Result<Self, ChartError> {
        let db_path = config
            .store_path
            .as_ref()
            .ok_or_else(|| ChartError::ConfigMissing {
                section: "store".into(),
                key: "path".into(),
            })?;

        let manager = SqliteConnectionManager::file(db_path);
        let pool = Pool::builder()
            .max_size(config.pool_size)
            .build(manager)
            .map_err(|e: r2d2::Error| persistence(e))?;

        tracing::debug!(path = %db_path.display(), pool_size = config.pool_size, "sqlite pool ready");
        Ok(Self { pool })
    }

    pub fn in_memory() -> Result<Self, ChartError> {
        let manager = SqliteConnectionManager::memory();
        let pool = Pool::builder()
            .max_size(1)
            .build(manager)
            .map_err(|e: r2d2::Error| persistence(e))?;

        Ok(Self { pool })
    }

    fn conn(&self) -> Result<PooledConnection<SqliteConnectionManager>, ChartError> {
        self.pool.get().map_err(|e: r2d2::Error| persistence(e))
    }

    pub fn initialize_schema(&self) -> Result<(), ChartError> {
        let conn = self.conn()?;
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS indicator (
                type TEXT PRIMARY KEY,
                description TEXT NOT NULL DEFAULT ''
            );
            CREATE TABLE IF NOT EXISTS instance (
                type TEXT NOT NULL,
                id INTEGER NOT NULL,
                category TEXT,
                PRIMARY KEY (type, id)
            );
            CREATE TABLE IF NOT EXISTS param (
                type TEXT NOT NULL,
                id INTEGER NOT NULL,
                position INTEGER NOT NULL,
                name TEXT NOT NULL,
                type_tag TEXT NOT NULL,
                value TEXT NOT NULL,
                PRIMARY KEY (type, id, name)
            );
            CREATE TABLE IF NOT EXISTS ohlcv (
                symbol TEXT NOT NULL,
                timestamp TEXT NOT NULL,
                open REAL NOT NULL,
                high REAL NOT NULL,
                low REAL NOT NULL,
                close REAL NOT NULL,
                volume REAL NOT NULL,
                PRIMARY KEY (symbol, timestamp)
            );
            CREATE TABLE IF NOT EXISTS indicator_values (
                symbol TEXT NOT NULL,
                identifier TEXT NOT NULL,
                series TEXT NOT NULL,
                timestamp TEXT NOT NULL,
                value REAL,
                PRIMARY KEY (symbol, identifier, series, timestamp)
            );",
        )
        .map_err(|e: rusqlite::Error| persistence(e))?;
        Ok(())
    }

    pub fn insert_bars(&self, symbol: &str, bars: &[OhlcvBar]) -> Result<(), ChartError> {
        let mut conn = self.conn()?;
        let tx = conn
            .transaction()
            .map_err(|e: rusqlite::Error| persistence(e))?;

        for bar in bars {
            tx.execute(
                "INSERT OR REPLACE INTO ohlcv (symbol, timestamp, open, high, low, close, volume)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    symbol,
                    bar.timestamp.format(TIMESTAMP_FORMAT).to_string(),
                    bar.open,
                    bar.high,
                    bar.low,
                    bar.close,
                    bar.volume
                ],
            )
            .map_err(|e: rusqlite::Error| persistence(e))?;
        }

        tx.commit().map_err(|e: rusqlite::Error| persistence(e))?;
        Ok(())
    }

    /// Archived series for one indicator, `NaN` where nothing was stored.
    pub fn load_archived(&self, symbol: &str, identifier: &str) -> Result<Vec<NamedSeries>, ChartError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT series, value FROM indicator_values
                 WHERE symbol = ?1 AND identifier = ?2
                 ORDER BY series, timestamp",
            )
            .map_err(|e: rusqlite::Error| persistence(e))?;
        let rows = stmt
            .query_map(params![symbol, identifier], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, Option<f64>>(1)?))
            })
            .map_err(|e: rusqlite::Error| persistence(e))?;

        let mut out: Vec<NamedSeries> = Vec::new();
        for row in rows {
            let (name, value) = row.map_err(|e: rusqlite::Error| persistence(e))?;
            let value = value.unwrap_or(f64::NAN);
            match out.last_mut() {
                Some(series) if series.name == name => series.values.push(value),
                _ => out.push(NamedSeries::new(name, vec![value])),
            }
        }
        Ok(out)
    }
}

impl ParameterStoragePort for SqliteAdapter {
    fn load_document(&self) -> Result<ParameterDocument, ChartError> {
        let conn = self.conn()?;
        let mut doc = ParameterDocument::new();

        let mut stmt = conn
            .prepare("SELECT type, description FROM indicator ORDER BY type")
            .map_err(|e: rusqlite::Error| persistence(e))?;
        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))
            .map_err(|e: rusqlite::Error| persistence(e))?;
        for row in rows {
            let (indicator_type, description) = row.map_err(|e: rusqlite::Error| persistence(e))?;
            doc.define(&indicator_type, &description);
        }

        // rowid order is creation order, which is sibling order.
        let mut stmt = conn
            .prepare("SELECT type, id, category FROM instance ORDER BY type, rowid")
            .map_err(|e: rusqlite::Error| persistence(e))?;
        let instances: Vec<(String, u32, Option<String>)> = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))
            .map_err(|e: rusqlite::Error| persistence(e))?
            .collect::<Result<_, _>>()
            .map_err(|e: rusqlite::Error| persistence(e))?;

        let mut params_stmt = conn
            .prepare(
                "SELECT name, type_tag, value FROM param
                 WHERE type = ?1 AND id = ?2 ORDER BY position",
            )
            .map_err(|e: rusqlite::Error| persistence(e))?;

        for (indicator_type, id, category) in instances {
            let params: Vec<ParamNode> = params_stmt
                .query_map(params![indicator_type, id], |row| {
                    Ok(ParamNode {
                        name: row.get(0)?,
                        type_tag: row.get(1)?,
                        value: row.get(2)?,
                    })
                })
                .map_err(|e: rusqlite::Error| persistence(e))?
                .collect::<Result<_, _>>()
                .map_err(|e: rusqlite::Error| persistence(e))?;
            doc.push_instance(
                &indicator_type,
                InstanceNode {
                    id,
                    category,
                    params,
                },
            );
        }

        Ok(doc)
    }

    fn write_definition(&self, indicator_type: &str, description: &str) -> Result<(), ChartError> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO indicator (type, description) VALUES (?1, ?2)
             ON CONFLICT(type) DO UPDATE SET description =
                CASE WHEN excluded.description <> '' THEN excluded.description ELSE description END",
            params![indicator_type, description],
        )
        .map_err(|e: rusqlite::Error| persistence(e))?;
        Ok(())
    }

    fn write_instance(&self, indicator_type: &str, instance: &InstanceNode) -> Result<(), ChartError> {
        let mut conn = self.conn()?;
        let tx = conn
            .transaction()
            .map_err(|e: rusqlite::Error| persistence(e))?;

        // Upsert keeps the rowid, and with it the sibling position.
        tx.execute(
            "INSERT INTO instance (type, id, category) VALUES (?1, ?2, ?3)
             ON CONFLICT(type, id) DO UPDATE SET category = excluded.category",
            params![indicator_type, instance.id, instance.category],
        )
        .map_err(|e: rusqlite::Error| persistence(e))?;
        tx.execute(
            "DELETE FROM param WHERE type = ?1 AND id = ?2",
            params![indicator_type, instance.id],
        )
        .map_err(|e: rusqlite::Error| persistence(e))?;
        for (position, param) in instance.params.iter().enumerate() {
            tx.execute(
                "INSERT INTO param (type, id, position, name, type_tag, value)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    indicator_type,
                    instance.id,
                    position as i64,
                    param.name,
                    param.type_tag,
                    param.value
                ],
            )
            .map_err(|e: rusqlite::Error| persistence(e))?;
        }

        tx.commit().map_err(|e: rusqlite::Error| persistence(e))?;
        Ok(())
    }

    fn write_parameter(&self, key: &IndicatorKey, name: &str, value: &str) -> Result<(), ChartError> {
        let conn = self.conn()?;
        let updated = conn
            .execute(
                "UPDATE param SET value = ?4 WHERE type = ?1 AND id = ?2 AND name = ?3",
                params![key.indicator_type(), key.id(), name, value],
            )
            .map_err(|e: rusqlite::Error| persistence(e))?;
        if updated == 0 {
            return Err(persistence(format!("no stored parameter {name} for {key}")));
        }
        Ok(())
    }

    fn write_category(&self, key: &IndicatorKey, category: &str) -> Result<(), ChartError> {
        let conn = self.conn()?;
        let updated = conn
            .execute(
                "UPDATE instance SET category = ?3 WHERE type = ?1 AND id = ?2",
                params![key.indicator_type(), key.id(), category],
            )
            .map_err(|e: rusqlite::Error| persistence(e))?;
        if updated == 0 {
            return Err(persistence(format!("no stored instance {key}")));
        }
        Ok(())
    }
}

impl DataPort for SqliteAdapter {
    fn fetch_bars(
        &self,
        symbol: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<BaseSeries, ChartError> {
        let conn = self.conn()?;

        let start_str = format!("{} 00:00:00", start_date.format("%Y-%m-%d"));
        let end_str = format!("{} 23:59:59", end_date.format("%Y-%m-%d"));

        let mut stmt = conn
            .prepare(
                "SELECT timestamp, open, high, low, close, volume
                 FROM ohlcv
                 WHERE symbol = ?1 AND timestamp >= ?2 AND timestamp <= ?3
                 ORDER BY timestamp ASC",
            )
            .map_err(|e: rusqlite::Error| data(e))?;

        let rows = stmt
            .query_map(params![symbol, start_str, end_str], |row| {
                let ts: String = row.get(0)?;
                let timestamp = NaiveDateTime::parse_from_str(&ts, TIMESTAMP_FORMAT).map_err(|e| {
                    rusqlite::Error::FromSqlConversionFailure(
                        ts.len(),
                        rusqlite::types::Type::Text,
                        Box::new(e),
                    )
                })?;
                Ok(OhlcvBar {
                    timestamp,
                    open: row.get(1)?,
                    high: row.get(2)?,
                    low: row.get(3)?,
                    close: row.get(4)?,
                    volume: row.get(5)?,
                })
            })
            .map_err(|e: rusqlite::Error| data(e))?;

        let mut bars = Vec::new();
        for row in rows {
            bars.push(row.map_err(|e: rusqlite::Error| data(e))?);
        }

        BaseSeries::new(symbol, bars)
    }

    fn list_symbols(&self) -> Result<Vec<String>, ChartError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare("SELECT DISTINCT symbol FROM ohlcv ORDER BY symbol")
            .map_err(|e: rusqlite::Error| data(e))?;
        let rows = stmt
            .query_map([], |row| row.get(0))
            .map_err(|e: rusqlite::Error| data(e))?;

        let mut symbols = Vec::new();
        for row in rows {
            symbols.push(row.map_err(|e: rusqlite::Error| data(e))?);
        }
        Ok(symbols)
    }
}

impl SeriesArchivePort for SqliteAdapter {
    fn archive_series(
        &self,
        symbol: &str,
        identifier: &str,
        timestamps: &[NaiveDateTime],
        series: &[NamedSeries],
    ) -> Result<(), ChartError> {
        let mut conn = self.conn()?;
        let tx = conn
            .transaction()
            .map_err(|e: rusqlite::Error| persistence(e))?;

        tx.execute(
            "DELETE FROM indicator_values WHERE symbol = ?1 AND identifier = ?2",
            params![symbol, identifier],
        )
        .map_err(|e: rusqlite::Error| persistence(e))?;

        for named in series {
            for (ts, value) in timestamps.iter().zip(&named.values) {
                let value = if value.is_nan() { None } else { Some(*value) };
                tx.execute(
                    "INSERT INTO indicator_values (symbol, identifier, series, timestamp, value)
                     VALUES (?1, ?2, ?3, ?4, ?5)",
                    params![
                        symbol,
                        identifier,
                        named.name,
                        ts.format(TIMESTAMP_FORMAT).to_string(),
                        value
                    ],
                )
                .map_err(|e: rusqlite::Error| persistence(e))?;
            }
        }

        tx.commit().map_err(|e: rusqlite::Error| persistence(e))?;
        Ok(())
    }
}
