use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use folio_core::portfolio::entity::{Holding, OptimizationStatus, Portfolio};
use folio_core::portfolio::port::PortfolioStore;
use folio_core::store::error::StoreError;
use sqlx::{
    SqlitePool,
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
};
use std::path::Path;
use std::str::FromStr;

/// 默认组合数据库文件名
const DEFAULT_PORTFOLIO_DB: &str = "portfolio.db";

type PortfolioRow = (String, String, f64, String, Option<DateTime<Utc>>);
type HoldingRow = (String, f64, f64, NaiveDate, f64);

/// PortfolioStore 的 SQLite 实现。
///
/// # Summary
/// 在中心化的 SQLite 数据库中管理组合与持仓。
///
/// # Invariants
/// * 仅持久化原始字段 (股数、价格、状态)；市值、权重与盈亏在读取时重新推导。
/// * 保存为整体覆盖：组合行与其全部持仓在同一事务内替换。
pub struct SqlitePortfolioStore {
    pool: SqlitePool,
}

impl SqlitePortfolioStore {
    /// 在配置的数据根目录下创建存储。
    pub async fn new() -> Result<Self, StoreError> {
        Self::with_root(crate::config::get_root_dir()).await
    }

    /// # Summary
    /// 在指定目录创建存储并初始化表结构。
    ///
    /// # Logic
    /// 1. 确保目录存在。
    /// 2. 配置 SQLite 连接选项，开启 `create_if_missing`。
    /// 3. 执行 DDL 初始化组合与持仓表。
    pub async fn with_root(root: impl AsRef<Path>) -> Result<Self, StoreError> {
        let root = root.as_ref();
        crate::config::ensure_dir(root).map_err(|e| StoreError::InitError(e.to_string()))?;

        let options = SqliteConnectOptions::new()
            .filename(root.join(DEFAULT_PORTFOLIO_DB))
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .connect_with(options)
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS portfolios (
                id TEXT PRIMARY KEY,
                owner TEXT NOT NULL,
                risk_score REAL NOT NULL,
                optimization_status TEXT NOT NULL,
                last_optimized_at DATETIME
            );

            CREATE TABLE IF NOT EXISTS holdings (
                portfolio_id TEXT NOT NULL,
                symbol TEXT NOT NULL,
                shares REAL NOT NULL,
                entry_price REAL NOT NULL,
                entry_date DATE NOT NULL,
                current_price REAL NOT NULL,
                PRIMARY KEY (portfolio_id, symbol)
            );
            "#,
        )
        .execute(&pool)
        .await
        .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(Self { pool })
    }

    async fn load_holdings(&self, portfolio_id: &str) -> Result<Vec<Holding>, StoreError> {
        let rows = sqlx::query_as::<_, HoldingRow>(
            r#"
            SELECT symbol, shares, entry_price, entry_date, current_price
            FROM holdings
            WHERE portfolio_id = ?
            ORDER BY symbol ASC
            "#,
        )
        .bind(portfolio_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(rows
            .into_iter()
            .map(|r| Holding::new(&r.0, r.1, r.2, r.3, r.4))
            .collect())
    }

    async fn hydrate(&self, row: PortfolioRow) -> Result<Portfolio, StoreError> {
        let (id, owner, risk_score, status, last_optimized_at) = row;
        let status = OptimizationStatus::from_str(&status).map_err(StoreError::Corrupted)?;
        let mut portfolio = Portfolio::with_holdings(&id, &owner, self.load_holdings(&id).await?);
        portfolio.risk_score = risk_score;
        portfolio.optimization_status = status;
        portfolio.last_optimized_at = last_optimized_at;
        Ok(portfolio)
    }
}

#[async_trait]
impl PortfolioStore for SqlitePortfolioStore {
    /// # Summary
    /// 整体保存组合。
    ///
    /// # Logic
    /// 1. 开启事务。
    /// 2. `INSERT OR REPLACE` 组合行。
    /// 3. 删除旧持仓后写入当前持仓。
    /// 4. 提交事务。
    async fn save_portfolio(&self, portfolio: &Portfolio) -> Result<(), StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;

        sqlx::query(
            r#"
            INSERT OR REPLACE INTO portfolios (id, owner, risk_score, optimization_status, last_optimized_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&portfolio.id)
        .bind(&portfolio.owner)
        .bind(portfolio.risk_score)
        .bind(portfolio.optimization_status.to_string())
        .bind(portfolio.last_optimized_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| StoreError::Database(e.to_string()))?;

        sqlx::query("DELETE FROM holdings WHERE portfolio_id = ?")
            .bind(&portfolio.id)
            .execute(&mut *tx)
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;

        for holding in &portfolio.holdings {
            sqlx::query(
                r#"
                INSERT INTO holdings (portfolio_id, symbol, shares, entry_price, entry_date, current_price)
                VALUES (?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&portfolio.id)
            .bind(&holding.symbol)
            .bind(holding.shares)
            .bind(holding.entry_price)
            .bind(holding.entry_date)
            .bind(holding.current_price)
            .execute(&mut *tx)
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;
        }

        tx.commit()
            .await
            .map_err(|e| StoreError::Database(e.to_string()))
    }

    async fn load_portfolio(&self, id: &str) -> Result<Portfolio, StoreError> {
        let row = sqlx::query_as::<_, PortfolioRow>(
            "SELECT id, owner, risk_score, optimization_status, last_optimized_at FROM portfolios WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::Database(e.to_string()))?
        .ok_or_else(|| StoreError::NotFound(format!("portfolio {}", id)))?;

        self.hydrate(row).await
    }

    async fn list_portfolios(&self, owner: &str) -> Result<Vec<Portfolio>, StoreError> {
        let rows = sqlx::query_as::<_, PortfolioRow>(
            r#"
            SELECT id, owner, risk_score, optimization_status, last_optimized_at
            FROM portfolios
            WHERE owner = ?
            ORDER BY id ASC
            "#,
        )
        .bind(owner)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::Database(e.to_string()))?;

        let mut portfolios = Vec::with_capacity(rows.len());
        for row in rows {
            portfolios.push(self.hydrate(row).await?);
        }
        Ok(portfolios)
    }

    /// # Summary
    /// 删除组合及其持仓，仅当 `owner` 匹配时生效。
    async fn delete_portfolio(&self, owner: &str, id: &str) -> Result<(), StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;

        let removed = sqlx::query("DELETE FROM portfolios WHERE id = ? AND owner = ?")
            .bind(id)
            .bind(owner)
            .execute(&mut *tx)
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?
            .rows_affected();
        if removed == 0 {
            return Err(StoreError::NotFound(format!(
                "portfolio {} owned by {}",
                id, owner
            )));
        }

        sqlx::query("DELETE FROM holdings WHERE portfolio_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;

        tx.commit()
            .await
            .map_err(|e| StoreError::Database(e.to_string()))
    }
}
