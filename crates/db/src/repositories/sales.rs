use jarvis_core::config::is_plain_identifier;

use super::{
    missing_promo_group, CategoryTotal, PromoEffect, RegionTotal, RepositoryError,
    SalesRepository,
};
use crate::DbPool;

pub const DEFAULT_SALES_TABLE: &str = "sales";

pub struct SqlSalesRepository {
    pool: DbPool,
    table: String,
}

impl SqlSalesRepository {
    /// The table name is interpolated into every query, so it must pass
    /// [`is_plain_identifier`].
    pub fn new(pool: DbPool, table: impl Into<String>) -> Result<Self, RepositoryError> {
        let table = table.into();
        if !is_plain_identifier(&table) {
            return Err(RepositoryError::InvalidTableName(table));
        }
        Ok(Self { pool, table })
    }

    pub fn with_default_table(pool: DbPool) -> Self {
        Self { pool, table: DEFAULT_SALES_TABLE.to_string() }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub async fn row_count(&self) -> Result<i64, RepositoryError> {
        let sql = format!("SELECT COUNT(*) FROM {}", self.table);
        Ok(sqlx::query_scalar(&sql).fetch_one(&self.pool).await?)
    }

    async fn top_group(&self, column: &str) -> Result<Option<(String, f64)>, RepositoryError> {
        let sql = format!(
            "SELECT {column}, CAST(SUM(units_sold) AS REAL) AS total_units
             FROM {table}
             WHERE {column} IS NOT NULL AND units_sold IS NOT NULL
             GROUP BY {column}
             ORDER BY total_units DESC, {column} ASC
             LIMIT 1",
            table = self.table,
        );
        Ok(sqlx::query_as::<_, (String, f64)>(&sql).fetch_optional(&self.pool).await?)
    }
}

#[async_trait::async_trait]
impl SalesRepository for SqlSalesRepository {
    async fn total_units(&self, year: Option<i32>) -> Result<f64, RepositoryError> {
        let sql = format!(
            "SELECT CAST(SUM(units_sold) AS REAL)
             FROM {}
             WHERE ?1 IS NULL OR strftime('%Y', date) = ?1",
            self.table
        );
        let total: Option<f64> = sqlx::query_scalar(&sql)
            .bind(year.map(|year| format!("{year:04}")))
            .fetch_one(&self.pool)
            .await?;

        total.ok_or_else(|| match year {
            Some(year) => RepositoryError::NoData(format!("no sales recorded in {year}")),
            None => RepositoryError::NoData("no sales recorded".to_string()),
        })
    }

    async fn top_category(&self) -> Result<CategoryTotal, RepositoryError> {
        self.top_group("category")
            .await?
            .map(|(category, total_units)| CategoryTotal { category, total_units })
            .ok_or_else(|| RepositoryError::NoData("no categorised sales recorded".to_string()))
    }

    async fn top_region(&self) -> Result<RegionTotal, RepositoryError> {
        self.top_group("region")
            .await?
            .map(|(region, total_units)| RegionTotal { region, total_units })
            .ok_or_else(|| RepositoryError::NoData("no regional sales recorded".to_string()))
    }

    async fn promo_effect(&self) -> Result<PromoEffect, RepositoryError> {
        let sql = format!(
            "SELECT promotion_flag, AVG(units_sold)
             FROM {}
             WHERE promotion_flag IN (0, 1) AND units_sold IS NOT NULL
             GROUP BY promotion_flag",
            self.table
        );
        let groups: Vec<(i64, f64)> = sqlx::query_as(&sql).fetch_all(&self.pool).await?;

        let average = |flag: i64| {
            groups
                .iter()
                .find(|(group, _)| *group == flag)
                .map(|(_, average)| *average)
                .ok_or_else(|| missing_promo_group(flag))
        };

        Ok(PromoEffect { no_promo: average(0)?, promo: average(1)? })
    }
}
