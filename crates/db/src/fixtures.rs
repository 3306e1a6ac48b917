use jarvis_core::config::is_plain_identifier;

use crate::connection::DbPool;
use crate::repositories::{RepositoryError, SaleRecord};

const CATEGORIES: &[(&str, f64)] =
    &[("Beverages", 150.0), ("Dairy", 50.0), ("Personal Care", -50.0), ("Snacks", -150.0)];
const REGIONS: &[(&str, f64)] = &[("North", 60.0), ("East", 20.0), ("South", -20.0), ("West", -60.0)];
const PROMO_LIFT: f64 = 100.0;

/// Year, per-row base units. Offsets above sum to zero, so each year totals
/// `base * 12 months * categories * regions`.
const DEMO_YEARS: &[(i32, f64)] = &[(2023, 500.0), (2024, 625.0)];

/// Deterministic demo sales history.
///
/// One row per month, category and region. Even months run a promotion.
/// 2024 sums to exactly 120,000 units; Beverages and North lead their groups.
pub struct DemoSalesDataset;

impl DemoSalesDataset {
    pub const TOTAL_UNITS_2024: f64 = 120_000.0;
    pub const TOP_CATEGORY: &str = "Beverages";
    pub const TOP_REGION: &str = "North";

    pub fn records() -> Vec<SaleRecord> {
        let mut records = Vec::with_capacity(DEMO_YEARS.len() * 12 * CATEGORIES.len() * REGIONS.len());
        for (year, base) in DEMO_YEARS {
            for month in 1..=12u32 {
                let promotion_flag = i64::from(month % 2 == 0);
                let lift = if promotion_flag == 1 { PROMO_LIFT } else { -PROMO_LIFT };
                for (category, category_offset) in CATEGORIES {
                    for (region, region_offset) in REGIONS {
                        records.push(SaleRecord {
                            units_sold: base + category_offset + region_offset + lift,
                            promotion_flag,
                            category: (*category).to_string(),
                            region: (*region).to_string(),
                            date: format!("{year:04}-{month:02}-15"),
                        });
                    }
                }
            }
        }
        records
    }

    /// Inserts the demo rows unless `table` already holds data.
    pub async fn load(pool: &DbPool, table: &str) -> Result<SeedResult, RepositoryError> {
        let existing = count_rows(pool, table).await?;
        if existing > 0 {
            return Ok(SeedResult { rows_inserted: 0, rows_present: existing, skipped: true });
        }

        let records = Self::records();
        insert_records(pool, table, &records).await?;
        Ok(SeedResult {
            rows_inserted: records.len(),
            rows_present: records.len() as i64,
            skipped: false,
        })
    }

    pub async fn verify(pool: &DbPool, table: &str) -> Result<VerificationResult, RepositoryError> {
        let total_sql = format!(
            "SELECT CAST(SUM(units_sold) AS REAL) FROM {} WHERE strftime('%Y', date) = '2024'",
            checked_table(table)?
        );
        let total_2024: Option<f64> = sqlx::query_scalar(&total_sql).fetch_one(pool).await?;

        let checks = vec![
            ("row-count", count_rows(pool, table).await? == Self::records().len() as i64),
            ("total-units-2024", total_2024 == Some(Self::TOTAL_UNITS_2024)),
        ];
        let all_present = checks.iter().all(|(_, ok)| *ok);
        Ok(VerificationResult { all_present, checks })
    }
}

pub async fn insert_records(
    pool: &DbPool,
    table: &str,
    records: &[SaleRecord],
) -> Result<(), RepositoryError> {
    let sql = format!(
        "INSERT INTO {} (units_sold, promotion_flag, category, region, date)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        checked_table(table)?
    );

    let mut tx = pool.begin().await?;
    for record in records {
        sqlx::query(&sql)
            .bind(record.units_sold)
            .bind(record.promotion_flag)
            .bind(&record.category)
            .bind(&record.region)
            .bind(&record.date)
            .execute(&mut *tx)
            .await?;
    }
    tx.commit().await?;
    Ok(())
}

async fn count_rows(pool: &DbPool, table: &str) -> Result<i64, RepositoryError> {
    let sql = format!("SELECT COUNT(*) FROM {}", checked_table(table)?);
    Ok(sqlx::query_scalar(&sql).fetch_one(pool).await?)
}

fn checked_table(table: &str) -> Result<&str, RepositoryError> {
    if is_plain_identifier(table) {
        Ok(table)
    } else {
        Err(RepositoryError::InvalidTableName(table.to_string()))
    }
}

#[derive(Debug)]
pub struct SeedResult {
    pub rows_inserted: usize,
    pub rows_present: i64,
    pub skipped: bool,
}

#[derive(Debug)]
pub struct VerificationResult {
    pub all_present: bool,
    pub checks: Vec<(&'static str, bool)>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repositories::{SalesRepository, SqlSalesRepository};
    use crate::{connect_with_settings, migrations};

    async fn migrated_pool() -> DbPool {
        let pool = connect_with_settings("sqlite::memory:", 1, 30, false).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        pool
    }

    #[test]
    fn demo_records_total_120k_in_2024() {
        let total: f64 = DemoSalesDataset::records()
            .iter()
            .filter(|record| record.year() == Some(2024))
            .map(|record| record.units_sold)
            .sum();
        assert_eq!(total, DemoSalesDataset::TOTAL_UNITS_2024);
    }

    #[tokio::test]
    async fn load_is_idempotent() {
        let pool = migrated_pool().await;

        let first = DemoSalesDataset::load(&pool, "sales").await.expect("first load");
        assert!(!first.skipped);
        assert_eq!(first.rows_inserted, DemoSalesDataset::records().len());

        let second = DemoSalesDataset::load(&pool, "sales").await.expect("second load");
        assert!(second.skipped);
        assert_eq!(second.rows_inserted, 0);
        assert_eq!(second.rows_present, first.rows_present);

        let verification = DemoSalesDataset::verify(&pool, "sales").await.expect("verify");
        assert!(verification.all_present, "{:?}", verification.checks);
    }

    #[tokio::test]
    async fn seeded_store_answers_expected_aggregates() {
        let pool = migrated_pool().await;
        DemoSalesDataset::load(&pool, "sales").await.expect("load");
        let repo = SqlSalesRepository::with_default_table(pool);

        assert_eq!(repo.total_units(Some(2024)).await.expect("total"), 120_000.0);
        assert_eq!(repo.top_category().await.expect("category").category, DemoSalesDataset::TOP_CATEGORY);
        assert_eq!(repo.top_region().await.expect("region").region, DemoSalesDataset::TOP_REGION);

        let effect = repo.promo_effect().await.expect("promo");
        assert!(effect.promo > effect.no_promo);
    }

    #[tokio::test]
    async fn insert_rejects_unsafe_table_names() {
        let pool = migrated_pool().await;
        assert!(matches!(
            insert_records(&pool, "sales--", &[]).await,
            Err(RepositoryError::InvalidTableName(_))
        ));
    }
}
