use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use super::{
    missing_promo_group, CategoryTotal, PromoEffect, RegionTotal, RepositoryError,
    SalesRepository,
};

/// One row of the sales fact table.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SaleRecord {
    pub units_sold: f64,
    pub promotion_flag: i64,
    pub category: String,
    pub region: String,
    /// ISO-8601 date, `YYYY-MM-DD`.
    pub date: String,
}

impl SaleRecord {
    pub fn year(&self) -> Option<i32> {
        self.date.get(..4).and_then(|year| year.parse().ok())
    }
}

#[derive(Default)]
pub struct InMemorySalesRepository {
    records: RwLock<Vec<SaleRecord>>,
}

impl InMemorySalesRepository {
    pub fn new(records: Vec<SaleRecord>) -> Self {
        Self { records: RwLock::new(records) }
    }

    pub async fn insert(&self, record: SaleRecord) {
        self.records.write().await.push(record);
    }

    async fn top_by<F>(&self, key: F) -> Option<(String, f64)>
    where
        F: Fn(&SaleRecord) -> &str,
    {
        let records = self.records.read().await;
        let mut totals: BTreeMap<&str, f64> = BTreeMap::new();
        for record in records.iter() {
            *totals.entry(key(record)).or_insert(0.0) += record.units_sold;
        }

        // BTreeMap iterates names ascending, so keeping only strictly larger
        // totals leaves the alphabetically first name on a tie.
        let mut best: Option<(&str, f64)> = None;
        for (name, total) in totals {
            if best.map_or(true, |(_, best_total)| total > best_total) {
                best = Some((name, total));
            }
        }
        best.map(|(name, total)| (name.to_string(), total))
    }
}

#[async_trait::async_trait]
impl SalesRepository for InMemorySalesRepository {
    async fn total_units(&self, year: Option<i32>) -> Result<f64, RepositoryError> {
        let records = self.records.read().await;
        let mut matching = records
            .iter()
            .filter(|record| year.is_none() || record.year() == year)
            .peekable();

        if matching.peek().is_none() {
            return Err(match year {
                Some(year) => RepositoryError::NoData(format!("no sales recorded in {year}")),
                None => RepositoryError::NoData("no sales recorded".to_string()),
            });
        }
        Ok(matching.map(|record| record.units_sold).sum())
    }

    async fn top_category(&self) -> Result<CategoryTotal, RepositoryError> {
        self.top_by(|record| record.category.as_str())
            .await
            .map(|(category, total_units)| CategoryTotal { category, total_units })
            .ok_or_else(|| RepositoryError::NoData("no categorised sales recorded".to_string()))
    }

    async fn top_region(&self) -> Result<RegionTotal, RepositoryError> {
        self.top_by(|record| record.region.as_str())
            .await
            .map(|(region, total_units)| RegionTotal { region, total_units })
            .ok_or_else(|| RepositoryError::NoData("no regional sales recorded".to_string()))
    }

    async fn promo_effect(&self) -> Result<PromoEffect, RepositoryError> {
        let records = self.records.read().await;
        let average = |flag: i64| {
            let (sum, count) = records
                .iter()
                .filter(|record| record.promotion_flag == flag)
                .fold((0.0, 0usize), |(sum, count), record| (sum + record.units_sold, count + 1));
            if count == 0 {
                Err(missing_promo_group(flag))
            } else {
                Ok(sum / count as f64)
            }
        };

        Ok(PromoEffect { no_promo: average(0)?, promo: average(1)? })
    }
}
