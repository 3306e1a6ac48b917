pub mod config;
pub mod errors;
pub mod features;
pub mod ml;
pub mod simulation;

pub use config::{AppConfig, ConfigError, ConfigOverrides, LoadOptions, LogFormat};
pub use errors::{ApplicationError, DomainError, InterfaceError};
pub use features::{FeatureColumn, FeatureTable, FeatureTableError};
pub use ml::{
    inverse_log_transform, LinearSalesModel, ModelArtifact, ModelError, SalesModel,
    TreeEnsembleModel,
};
pub use simulation::{
    percent_change, ExpectedSales, KeyDriver, PromoStockInteraction, SimulationEngine,
    SimulationError, SimulationResult,
};
