use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use jarvis_core::simulation::percent_change;

pub mod memory;
pub mod sales;

pub use memory::{InMemorySalesRepository, SaleRecord};
pub use sales::SqlSalesRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("no data: {0}")]
    NoData(String),
    #[error("`{0}` is not a valid table name")]
    InvalidTableName(String),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CategoryTotal {
    pub category: String,
    pub total_units: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RegionTotal {
    pub region: String,
    pub total_units: f64,
}

/// Average units sold per row, split by promotion flag.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PromoEffect {
    pub no_promo: f64,
    pub promo: f64,
}

impl PromoEffect {
    /// `None` when the non-promotional average is zero.
    pub fn uplift_pct(&self) -> Option<f64> {
        percent_change(self.no_promo, self.promo)
    }
}

/// Descriptive aggregates over the sales fact table.
///
/// Every method is a read; an aggregate over zero matching rows is
/// [`RepositoryError::NoData`], never a zero or a default row.
#[async_trait]
pub trait SalesRepository: Send + Sync {
    /// Sum of `units_sold`, restricted to one calendar year when given.
    async fn total_units(&self, year: Option<i32>) -> Result<f64, RepositoryError>;

    /// Category with the most units sold; ties go to the alphabetically first name.
    async fn top_category(&self) -> Result<CategoryTotal, RepositoryError>;

    /// Region with the most units sold; ties go to the alphabetically first name.
    async fn top_region(&self) -> Result<RegionTotal, RepositoryError>;

    async fn promo_effect(&self) -> Result<PromoEffect, RepositoryError>;
}

pub(crate) fn missing_promo_group(flag: i64) -> RepositoryError {
    let group = if flag == 0 { "non-promotional" } else { "promotional" };
    RepositoryError::NoData(format!("no {group} sales rows recorded"))
}

#[cfg(test)]
mod tests {
    use super::PromoEffect;

    #[test]
    fn promo_uplift_is_relative_to_non_promotional_average() {
        let effect = PromoEffect { no_promo: 40.0, promo: 50.0 };
        assert_eq!(effect.uplift_pct(), Some(25.0));
    }

    #[test]
    fn promo_uplift_is_undefined_without_baseline_sales() {
        let effect = PromoEffect { no_promo: 0.0, promo: 12.0 };
        assert_eq!(effect.uplift_pct(), None);
    }
}
