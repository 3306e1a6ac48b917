pub mod connection;
pub mod fixtures;
pub mod migrations;
pub mod repositories;

pub use connection::{connect_with_settings, DbPool};
pub use fixtures::{DemoSalesDataset, SeedResult, VerificationResult};
pub use repositories::{
    CategoryTotal, InMemorySalesRepository, PromoEffect, RegionTotal, RepositoryError,
    SaleRecord, SalesRepository, SqlSalesRepository,
};
