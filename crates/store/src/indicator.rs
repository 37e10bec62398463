use async_trait::async_trait;
use chrono::NaiveDate;
use dashmap::DashMap;
use folio_core::common::normalize_symbol;
use folio_core::indicator::entity::IndicatorFrame;
use folio_core::indicator::port::IndicatorStore;
use folio_core::store::error::StoreError;
use sqlx::{
    FromRow, SqlitePool,
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
};
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(FromRow)]
struct FrameRow {
    date: NaiveDate,
    price: f64,
    sma20: f64,
    sma50: f64,
    sma200: f64,
    rsi14: f64,
    macd_line: f64,
    macd_signal: f64,
    macd_histogram: f64,
    bollinger_upper: f64,
    bollinger_middle: f64,
    bollinger_lower: f64,
}

/// # Summary
/// 技术指标的 SQLite 实现，与行情一样一库一股。
///
/// # Invariants
/// * 每个交易日至多一帧 (`date` 为主键)。
/// * 区间写入为同一事务内的"先删后插"，重复计算不会累积重复帧。
pub struct SqliteIndicatorStore {
    base_path: PathBuf,
    pools: DashMap<String, SqlitePool>,
}

impl SqliteIndicatorStore {
    /// 在配置的数据根目录下的 `indicators` 子目录创建存储。
    pub fn new() -> Result<Self, StoreError> {
        Self::with_base_path(crate::config::get_root_dir().join("indicators"))
    }

    pub fn with_base_path(base_path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let base_path = base_path.as_ref().to_path_buf();
        crate::config::ensure_dir(&base_path).map_err(|e| StoreError::InitError(e.to_string()))?;
        Ok(Self {
            base_path,
            pools: DashMap::new(),
        })
    }

    async fn get_or_init_pool(&self, symbol: &str) -> Result<SqlitePool, StoreError> {
        let key = normalize_symbol(symbol);
        if let Some(pool) = self.pools.get(&key) {
            return Ok(pool.clone());
        }

        let options = SqliteConnectOptions::new()
            .filename(self.base_path.join(format!("{}.db", key)))
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .connect_with(options)
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS frames (
                date DATE PRIMARY KEY,
                price REAL NOT NULL,
                sma20 REAL NOT NULL,
                sma50 REAL NOT NULL,
                sma200 REAL NOT NULL,
                rsi14 REAL NOT NULL,
                macd_line REAL NOT NULL,
                macd_signal REAL NOT NULL,
                macd_histogram REAL NOT NULL,
                bollinger_upper REAL NOT NULL,
                bollinger_middle REAL NOT NULL,
                bollinger_lower REAL NOT NULL
            );
            "#,
        )
        .execute(&pool)
        .await
        .map_err(|e| StoreError::Database(e.to_string()))?;

        self.pools.insert(key, pool.clone());
        Ok(pool)
    }
}

#[async_trait]
impl IndicatorStore for SqliteIndicatorStore {
    /// # Summary
    /// 整体替换区间内的指标。
    ///
    /// # Logic
    /// 1. 开启事务。
    /// 2. 删除 `[from, to]` 内的全部旧帧。
    /// 3. 逐帧插入新数据，区间外的帧被忽略。
    /// 4. 提交事务，任一步失败则整体回滚。
    async fn replace_range(
        &self,
        symbol: &str,
        from: NaiveDate,
        to: NaiveDate,
        frames: &[IndicatorFrame],
    ) -> Result<(), StoreError> {
        let pool = self.get_or_init_pool(symbol).await?;
        let mut tx = pool
            .begin()
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;

        let deleted = sqlx::query("DELETE FROM frames WHERE date >= ? AND date <= ?")
            .bind(from)
            .bind(to)
            .execute(&mut *tx)
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?
            .rows_affected();

        let mut written = 0usize;
        for frame in frames.iter().filter(|f| f.date >= from && f.date <= to) {
            sqlx::query(
                r#"
                INSERT INTO frames (date, price, sma20, sma50, sma200, rsi14, macd_line,
                    macd_signal, macd_histogram, bollinger_upper, bollinger_middle, bollinger_lower)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(frame.date)
            .bind(frame.price)
            .bind(frame.sma20)
            .bind(frame.sma50)
            .bind(frame.sma200)
            .bind(frame.rsi14)
            .bind(frame.macd_line)
            .bind(frame.macd_signal)
            .bind(frame.macd_histogram)
            .bind(frame.bollinger_upper)
            .bind(frame.bollinger_middle)
            .bind(frame.bollinger_lower)
            .execute(&mut *tx)
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;
            written += 1;
        }

        tx.commit()
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;
        debug!(
            "Replaced indicators for {} in [{}, {}]: {} removed, {} written",
            symbol, from, to, deleted, written
        );
        Ok(())
    }

    async fn load_range(
        &self,
        symbol: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<IndicatorFrame>, StoreError> {
        let pool = self.get_or_init_pool(symbol).await?;
        let symbol = normalize_symbol(symbol);

        let rows = sqlx::query_as::<_, FrameRow>(
            r#"
            SELECT date, price, sma20, sma50, sma200, rsi14, macd_line, macd_signal,
                macd_histogram, bollinger_upper, bollinger_middle, bollinger_lower
            FROM frames
            WHERE date >= ? AND date <= ?
            ORDER BY date ASC
            "#,
        )
        .bind(from)
        .bind(to)
        .fetch_all(&pool)
        .await
        .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(rows
            .into_iter()
            .map(|r| IndicatorFrame {
                symbol: symbol.clone(),
                date: r.date,
                price: r.price,
                sma20: r.sma20,
                sma50: r.sma50,
                sma200: r.sma200,
                rsi14: r.rsi14,
                macd_line: r.macd_line,
                macd_signal: r.macd_signal,
                macd_histogram: r.macd_histogram,
                bollinger_upper: r.bollinger_upper,
                bollinger_middle: r.bollinger_middle,
                bollinger_lower: r.bollinger_lower,
            })
            .collect())
    }
}
