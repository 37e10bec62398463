use async_trait::async_trait;
use chrono::NaiveDate;
use dashmap::DashMap;
use folio_core::common::normalize_symbol;
use folio_core::market::entity::PriceBar;
use folio_core::market::error::MarketError;
use folio_core::market::port::PriceHistoryProvider;
use folio_core::store::error::StoreError;
use sqlx::{
    SqlitePool,
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
};
use std::path::{Path, PathBuf};
use tracing::debug;

type BarRow = (NaiveDate, f64, f64, f64, f64, f64, f64);

/// 日线行情的 SQLite 实现，采用"一库一股"策略。
///
/// # Summary
/// 为每个证券维护一个独立的 SQLite 数据库文件，以实现物理数据隔离。
///
/// # Invariants
/// * 数据库文件存储在 `base_path` 目录下，文件名为规范化后的代码。
/// * 连接池被缓存以避免频繁的文件打开操作。
/// * 同一交易日只保留一条记录，重复写入覆盖旧值。
pub struct SqlitePriceStore {
    base_path: PathBuf,
    pools: DashMap<String, SqlitePool>,
}

impl SqlitePriceStore {
    /// 在配置的数据根目录下的 `market` 子目录创建存储。
    pub fn new() -> Result<Self, StoreError> {
        Self::with_base_path(crate::config::get_root_dir().join("market"))
    }

    /// 在指定目录创建存储，目录不存在时自动创建。
    pub fn with_base_path(base_path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let base_path = base_path.as_ref().to_path_buf();
        crate::config::ensure_dir(&base_path).map_err(|e| StoreError::InitError(e.to_string()))?;
        Ok(Self {
            base_path,
            pools: DashMap::new(),
        })
    }

    /// 获取或初始化特定证券的连接池。
    ///
    /// # Logic
    /// 1. 以规范化代码作为缓存键与文件名。
    /// 2. 配置 SQLite 连接选项，开启 `create_if_missing`。
    /// 3. 如果缓存中没有，则创建新连接池并运行初始化建表 SQL。
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
            CREATE TABLE IF NOT EXISTS bars (
                date DATE PRIMARY KEY,
                open REAL NOT NULL,
                high REAL NOT NULL,
                low REAL NOT NULL,
                close REAL NOT NULL,
                volume REAL NOT NULL,
                adj_close REAL NOT NULL
            );
            "#,
        )
        .execute(&pool)
        .await
        .map_err(|e| StoreError::Database(e.to_string()))?;

        self.pools.insert(key, pool.clone());
        Ok(pool)
    }

    /// # Summary
    /// 批量保存日线数据。
    ///
    /// # Logic
    /// 1. 获取个股连接池。
    /// 2. 在单个事务内执行批量 `INSERT OR REPLACE`。
    ///
    /// # Arguments
    /// * `symbol` - 证券代码。
    /// * `bars` - 数据列表。
    ///
    /// # Returns
    /// * `Result<(), StoreError>`
    pub async fn save_bars(&self, symbol: &str, bars: &[PriceBar]) -> Result<(), StoreError> {
        let pool = self.get_or_init_pool(symbol).await?;
        let mut tx = pool
            .begin()
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;

        for bar in bars {
            sqlx::query(
                r#"
                INSERT OR REPLACE INTO bars (date, open, high, low, close, volume, adj_close)
                VALUES (?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(bar.date)
            .bind(bar.open)
            .bind(bar.high)
            .bind(bar.low)
            .bind(bar.close)
            .bind(bar.volume)
            .bind(bar.adj_close)
            .execute(&mut *tx)
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;
        }

        tx.commit()
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;
        debug!("Saved {} bars for {}", bars.len(), symbol);
        Ok(())
    }

    /// # Summary
    /// 按日期区间加载日线数据，按日期升序。
    pub async fn load_bars(
        &self,
        symbol: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<PriceBar>, StoreError> {
        let pool = self.get_or_init_pool(symbol).await?;
        let symbol = normalize_symbol(symbol);

        let records = sqlx::query_as::<_, BarRow>(
            r#"
            SELECT date, open, high, low, close, volume, adj_close
            FROM bars
            WHERE date >= ? AND date <= ?
            ORDER BY date ASC
            "#,
        )
        .bind(from)
        .bind(to)
        .fetch_all(&pool)
        .await
        .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(records
            .into_iter()
            .map(|r| PriceBar {
                symbol: symbol.clone(),
                date: r.0,
                open: r.1,
                high: r.2,
                low: r.3,
                close: r.4,
                volume: r.5,
                adj_close: r.6,
            })
            .collect())
    }
}

#[async_trait]
impl PriceHistoryProvider for SqlitePriceStore {
    async fn get_price_history(
        &self,
        symbol: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<PriceBar>, MarketError> {
        self.load_bars(symbol, from, to)
            .await
            .map_err(|e| MarketError::Storage(e.to_string()))
    }
}
