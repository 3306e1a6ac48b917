//! What-if Simulation Engine
//!
//! Every scenario compares mean model predictions on the shared feature table
//! against predictions on a perturbed fork of it. The shared table is only
//! ever read; perturbation happens on [`FeatureTable::fork`]s.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::features::{FeatureTable, FeatureTableError, PROMOTION_FLAG, STOCK_AVAILABLE, STOCK_RATIO};
use crate::ml::{inverse_log_transform, ModelError, SalesModel};

const STOCK_COLUMNS: [&str; 2] = [STOCK_AVAILABLE, STOCK_RATIO];

#[derive(Debug, Error)]
pub enum SimulationError {
    #[error("required column `{column}` is missing from the feature table")]
    MissingColumn { column: String },
    #[error("the feature table has no rows")]
    EmptyFeatureTable,
    #[error("parameter `{name}` must be a fraction in 0.0..=1.0, got {value}")]
    InvalidParameter { name: &'static str, value: f64 },
    #[error("model produced a non-finite prediction")]
    NonFinitePrediction,
    #[error("model reports {importances} importances for {features} features")]
    ImportanceMismatch { importances: usize, features: usize },
    #[error(transparent)]
    Model(#[from] ModelError),
}

impl From<FeatureTableError> for SimulationError {
    fn from(value: FeatureTableError) -> Self {
        match value {
            FeatureTableError::MissingColumn { column } => Self::MissingColumn { column },
            other => Self::Model(ModelError::InvalidArtifact(other.to_string())),
        }
    }
}

/// `(sim / base - 1) * 100`, or `None` when the baseline makes it undefined.
pub fn percent_change(base: f64, sim: f64) -> Option<f64> {
    if base == 0.0 || !base.is_finite() || !sim.is_finite() {
        return None;
    }
    Some((sim / base - 1.0) * 100.0)
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExpectedSales {
    pub expected_daily_sales: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SimulationResult {
    pub base: f64,
    pub sim: f64,
    pub pct_change: Option<f64>,
}

impl SimulationResult {
    fn new(base: f64, sim: f64) -> Self {
        Self { base, sim, pct_change: percent_change(base, sim) }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PromoStockInteraction {
    pub no_promo_normal: f64,
    pub promo_normal: f64,
    pub no_promo_low_stock: f64,
    pub promo_low_stock: f64,
}

impl PromoStockInteraction {
    /// Promotion uplift (%) with stock left as observed.
    pub fn normal_stock_uplift_pct(&self) -> Option<f64> {
        percent_change(self.no_promo_normal, self.promo_normal)
    }

    /// Promotion uplift (%) with stock constrained.
    pub fn low_stock_uplift_pct(&self) -> Option<f64> {
        percent_change(self.no_promo_low_stock, self.promo_low_stock)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct KeyDriver {
    pub feature: String,
    pub importance: f64,
}

/// Read-only view over a model and the feature table it scores.
pub struct SimulationEngine<'a, M: SalesModel + ?Sized> {
    model: &'a M,
    features: &'a FeatureTable,
}

impl<'a, M: SalesModel + ?Sized> SimulationEngine<'a, M> {
    pub fn new(model: &'a M, features: &'a FeatureTable) -> Self {
        Self { model, features }
    }

    pub fn expected_sales(&self) -> Result<ExpectedSales, SimulationError> {
        Ok(ExpectedSales { expected_daily_sales: self.mean_prediction(self.features)? })
    }

    pub fn simulate_stock_drop(&self, drop_pct: f64) -> Result<SimulationResult, SimulationError> {
        validate_fraction("drop_pct", drop_pct)?;
        self.features.require_columns(&STOCK_COLUMNS)?;

        let mut reduced = self.features.fork();
        scale_stock(&mut reduced, 1.0 - drop_pct)?;

        let base = self.mean_prediction(self.features)?;
        let sim = self.mean_prediction(&reduced)?;
        Ok(SimulationResult::new(base, sim))
    }

    pub fn simulate_promo_stock_interaction(
        &self,
        stock_drop_pct: f64,
    ) -> Result<PromoStockInteraction, SimulationError> {
        validate_fraction("stock_drop_pct", stock_drop_pct)?;
        self.features.require_columns(&[PROMOTION_FLAG, STOCK_AVAILABLE, STOCK_RATIO])?;

        let run = |promo: f64, low_stock: bool| -> Result<f64, SimulationError> {
            let mut scenario = self.features.fork();
            scenario.fill_column(PROMOTION_FLAG, promo)?;
            if low_stock {
                scale_stock(&mut scenario, 1.0 - stock_drop_pct)?;
            }
            self.mean_prediction(&scenario)
        };

        Ok(PromoStockInteraction {
            no_promo_normal: run(0.0, false)?,
            promo_normal: run(1.0, false)?,
            no_promo_low_stock: run(0.0, true)?,
            promo_low_stock: run(1.0, true)?,
        })
    }

    pub fn simulate_promo_off(&self) -> Result<SimulationResult, SimulationError> {
        self.features.require_columns(&[PROMOTION_FLAG])?;

        let mut no_promo = self.features.fork();
        no_promo.fill_column(PROMOTION_FLAG, 0.0)?;

        let base = self.mean_prediction(self.features)?;
        let sim = self.mean_prediction(&no_promo)?;
        Ok(SimulationResult::new(base, sim))
    }

    /// Top `top_n` model features by importance, highest first.
    ///
    /// Importances are paired with the model's own feature names, so table
    /// columns the model ignores never appear. Equal scores keep training order.
    pub fn key_drivers(&self, top_n: usize) -> Result<Vec<KeyDriver>, SimulationError> {
        let names = self.model.feature_names();
        let importances = self.model.feature_importances();
        if importances.len() != names.len() {
            return Err(SimulationError::ImportanceMismatch {
                importances: importances.len(),
                features: names.len(),
            });
        }

        let mut drivers: Vec<KeyDriver> = names
            .iter()
            .zip(importances)
            .map(|(feature, importance)| KeyDriver {
                feature: feature.clone(),
                importance: *importance,
            })
            .collect();
        drivers.sort_by(|left, right| right.importance.total_cmp(&left.importance));
        drivers.truncate(top_n);
        Ok(drivers)
    }

    fn mean_prediction(&self, features: &FeatureTable) -> Result<f64, SimulationError> {
        if features.is_empty() {
            return Err(SimulationError::EmptyFeatureTable);
        }

        let predictions = self.model.predict(features)?;
        if predictions.is_empty() {
            return Err(SimulationError::EmptyFeatureTable);
        }

        let total: f64 = predictions.iter().map(|value| inverse_log_transform(*value)).sum();
        let mean = total / predictions.len() as f64;
        if !mean.is_finite() {
            return Err(SimulationError::NonFinitePrediction);
        }
        Ok(mean)
    }
}

fn validate_fraction(name: &'static str, value: f64) -> Result<(), SimulationError> {
    if value.is_finite() && (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(SimulationError::InvalidParameter { name, value })
    }
}

fn scale_stock(features: &mut FeatureTable, factor: f64) -> Result<(), FeatureTableError> {
    for column in STOCK_COLUMNS {
        features.scale_column(column, factor)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::ml::LinearSalesModel;

    fn feature_table() -> FeatureTable {
        FeatureTable::from_pairs([
            ("price", vec![2.5, 3.0, 1.75, 4.0]),
            (STOCK_AVAILABLE, vec![120.0, 80.0, 15.0, 300.0]),
            (STOCK_RATIO, vec![1.2, 0.8, 0.15, 3.0]),
            (PROMOTION_FLAG, vec![1.0, 0.0, 0.0, 1.0]),
        ])
        .expect("feature table")
    }

    fn stock_sensitive_model() -> LinearSalesModel {
        LinearSalesModel::new(
            "test",
            1.0,
            vec![
                ("price".to_string(), -0.1),
                (STOCK_AVAILABLE.to_string(), 0.004),
                (STOCK_RATIO.to_string(), 0.2),
                (PROMOTION_FLAG.to_string(), 0.35),
            ],
        )
        .expect("model")
    }

    fn promo_blind_model() -> LinearSalesModel {
        LinearSalesModel::new(
            "promo-blind",
            2.0,
            vec![("price".to_string(), -0.2), (STOCK_RATIO.to_string(), 0.0)],
        )
        .expect("model")
    }

    /// Fixed log-space output regardless of inputs.
    struct ConstantModel {
        log_prediction: f64,
        names: Vec<String>,
        importances: Vec<f64>,
        calls: AtomicUsize,
    }

    impl ConstantModel {
        fn new(log_prediction: f64, importances: Vec<f64>) -> Self {
            Self {
                log_prediction,
                names: Vec::new(),
                importances,
                calls: AtomicUsize::new(0),
            }
        }

        fn with_names(mut self, names: &[&str]) -> Self {
            self.names = names.iter().map(|name| name.to_string()).collect();
            self
        }
    }

    impl SalesModel for ConstantModel {
        fn feature_names(&self) -> &[String] {
            &self.names
        }

        fn predict(&self, features: &FeatureTable) -> Result<Vec<f64>, ModelError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec![self.log_prediction; features.row_count()])
        }

        fn feature_importances(&self) -> &[f64] {
            &self.importances
        }
    }

    #[test]
    fn expected_sales_is_mean_of_inverse_transformed_predictions() {
        let model = ConstantModel::new(3.0_f64.ln_1p(), vec![]);
        let table = feature_table();
        let result = SimulationEngine::new(&model, &table).expected_sales().expect("expected");
        assert!((result.expected_daily_sales - 3.0).abs() < 1e-9);
    }

    #[test]
    fn zero_stock_drop_is_identity() {
        let model = stock_sensitive_model();
        let table = feature_table();
        let result = SimulationEngine::new(&model, &table).simulate_stock_drop(0.0).expect("sim");

        assert_eq!(result.sim, result.base);
        assert_eq!(result.pct_change, Some(0.0));
    }

    #[test]
    fn stock_drop_reduces_sales_for_stock_sensitive_model() {
        let model = stock_sensitive_model();
        let table = feature_table();
        let result = SimulationEngine::new(&model, &table).simulate_stock_drop(0.2).expect("sim");

        assert!(result.sim < result.base);
        let pct = result.pct_change.expect("defined percentage");
        assert!(pct < 0.0);
        assert!((pct - (result.sim / result.base - 1.0) * 100.0).abs() < 1e-9);
    }

    #[test]
    fn stock_drop_leaves_shared_table_untouched() {
        let model = stock_sensitive_model();
        let table = feature_table();
        let before = table.clone();

        let engine = SimulationEngine::new(&model, &table);
        engine.simulate_stock_drop(0.5).expect("stock drop");
        engine.simulate_promo_stock_interaction(0.5).expect("interaction");
        engine.simulate_promo_off().expect("promo off");

        assert_eq!(table, before);
        assert_eq!(table.column(STOCK_AVAILABLE), Some(&[120.0, 80.0, 15.0, 300.0][..]));
    }

    #[test]
    fn promo_blind_model_yields_flat_interaction() {
        let model = promo_blind_model();
        let table = feature_table();
        let result = SimulationEngine::new(&model, &table)
            .simulate_promo_stock_interaction(0.2)
            .expect("interaction");

        assert_eq!(result.no_promo_normal, result.promo_normal);
        assert_eq!(result.promo_normal, result.no_promo_low_stock);
        assert_eq!(result.no_promo_low_stock, result.promo_low_stock);
        assert_eq!(result.normal_stock_uplift_pct(), Some(0.0));
    }

    #[test]
    fn interaction_isolates_promotion_effect() {
        let model = stock_sensitive_model();
        let table = feature_table();
        let result = SimulationEngine::new(&model, &table)
            .simulate_promo_stock_interaction(0.2)
            .expect("interaction");

        assert!(result.promo_normal > result.no_promo_normal);
        assert!(result.promo_low_stock < result.promo_normal);
        assert!(result.no_promo_low_stock < result.no_promo_normal);
        assert!(result.normal_stock_uplift_pct().expect("defined") > 0.0);
    }

    #[test]
    fn promo_off_compares_against_unmodified_predictions() {
        let model = stock_sensitive_model();
        let table = feature_table();
        let engine = SimulationEngine::new(&model, &table);

        let result = engine.simulate_promo_off().expect("promo off");
        let expected = engine.expected_sales().expect("expected");
        assert_eq!(result.base, expected.expected_daily_sales);
        assert!(result.sim < result.base);
    }

    #[test]
    fn missing_stock_column_is_a_precondition_failure() {
        let model = ConstantModel::new(1.0, vec![]);
        let table = FeatureTable::from_pairs([
            (STOCK_AVAILABLE, vec![10.0]),
            (PROMOTION_FLAG, vec![1.0]),
        ])
        .expect("table");
        let engine = SimulationEngine::new(&model, &table);

        let error = engine.simulate_stock_drop(0.2).expect_err("stock_ratio missing");
        assert!(matches!(
            error,
            SimulationError::MissingColumn { ref column } if column == STOCK_RATIO
        ));
        assert_eq!(model.calls.load(Ordering::SeqCst), 0, "model must not run on bad input");

        let error = engine.simulate_promo_stock_interaction(0.2).expect_err("stock_ratio missing");
        assert!(matches!(error, SimulationError::MissingColumn { .. }));
    }

    #[test]
    fn missing_promotion_flag_fails_promo_off() {
        let model = ConstantModel::new(1.0, vec![]);
        let table = FeatureTable::from_pairs([(STOCK_AVAILABLE, vec![10.0])]).expect("table");
        let error = SimulationEngine::new(&model, &table).simulate_promo_off().expect_err("missing");
        assert!(matches!(
            error,
            SimulationError::MissingColumn { ref column } if column == PROMOTION_FLAG
        ));
    }

    #[test]
    fn zero_baseline_leaves_percentage_undefined() {
        let model = ConstantModel::new(0.0, vec![]);
        let table = feature_table();
        let result = SimulationEngine::new(&model, &table).simulate_stock_drop(0.2).expect("sim");

        assert_eq!(result.base, 0.0);
        assert_eq!(result.pct_change, None);
    }

    #[test]
    fn empty_table_reports_no_data() {
        let model = ConstantModel::new(1.0, vec![]);
        let table = FeatureTable::from_pairs([
            (STOCK_AVAILABLE, Vec::new()),
            (STOCK_RATIO, Vec::new()),
            (PROMOTION_FLAG, Vec::new()),
        ])
        .expect("table");

        let error = SimulationEngine::new(&model, &table).expected_sales().expect_err("empty");
        assert!(matches!(error, SimulationError::EmptyFeatureTable));
    }

    #[test]
    fn out_of_range_drop_is_rejected() {
        let model = stock_sensitive_model();
        let table = feature_table();
        let engine = SimulationEngine::new(&model, &table);

        for value in [-0.1, 1.5, f64::NAN] {
            assert!(matches!(
                engine.simulate_stock_drop(value),
                Err(SimulationError::InvalidParameter { name: "drop_pct", .. })
            ));
        }
    }

    #[test]
    fn key_drivers_sorted_descending_and_stable() {
        let model = ConstantModel::new(1.0, vec![0.1, 0.4, 0.1, 0.4]).with_names(&[
            "price",
            STOCK_AVAILABLE,
            STOCK_RATIO,
            PROMOTION_FLAG,
        ]);
        let table = feature_table();
        let engine = SimulationEngine::new(&model, &table);

        let drivers = engine.key_drivers(3).expect("drivers");
        let names: Vec<&str> = drivers.iter().map(|driver| driver.feature.as_str()).collect();
        assert_eq!(names, vec![STOCK_AVAILABLE, PROMOTION_FLAG, "price"]);
        assert_eq!(drivers.len(), 3);
        assert_eq!(engine.key_drivers(3).expect("drivers"), drivers);
    }

    #[test]
    fn key_drivers_require_aligned_importances() {
        let model = ConstantModel::new(1.0, vec![0.5, 0.5]).with_names(&[
            "price",
            STOCK_AVAILABLE,
            STOCK_RATIO,
        ]);
        let table = feature_table();
        assert!(matches!(
            SimulationEngine::new(&model, &table).key_drivers(3),
            Err(SimulationError::ImportanceMismatch { importances: 2, features: 3 })
        ));
    }

    #[test]
    fn key_drivers_follow_model_feature_order() {
        let table = FeatureTable::from_pairs([
            ("price", vec![2.0, 3.0]),
            (STOCK_AVAILABLE, vec![40.0, 90.0]),
        ])
        .expect("feature table");
        let model = LinearSalesModel::new(
            "reordered",
            1.0,
            vec![(STOCK_AVAILABLE.to_string(), 0.9), ("price".to_string(), -0.1)],
        )
        .expect("model");

        let drivers = SimulationEngine::new(&model, &table).key_drivers(2).expect("drivers");
        assert_eq!(drivers.len(), 2);
        assert_eq!(drivers[0].feature, STOCK_AVAILABLE);
        assert!((drivers[0].importance - 0.9).abs() < 1e-12);
        assert_eq!(drivers[1].feature, "price");
        assert!((drivers[1].importance - 0.1).abs() < 1e-12);
    }

    #[test]
    fn key_drivers_ignore_columns_the_model_does_not_use() {
        let table = FeatureTable::from_pairs([
            ("sku_id", vec![101.0, 102.0]),
            ("price", vec![2.0, 3.0]),
            (STOCK_RATIO, vec![0.4, 1.1]),
            (PROMOTION_FLAG, vec![0.0, 1.0]),
        ])
        .expect("feature table");
        let model = LinearSalesModel::new(
            "subset",
            1.0,
            vec![
                (PROMOTION_FLAG.to_string(), 0.25),
                (STOCK_RATIO.to_string(), 0.5),
                ("price".to_string(), -0.25),
            ],
        )
        .expect("model");
        let engine = SimulationEngine::new(&model, &table);
        assert!(engine.expected_sales().is_ok());

        let drivers = engine.key_drivers(3).expect("drivers");
        let ranked: Vec<(&str, f64)> =
            drivers.iter().map(|driver| (driver.feature.as_str(), driver.importance)).collect();
        assert_eq!(ranked, vec![(STOCK_RATIO, 0.5), (PROMOTION_FLAG, 0.25), ("price", 0.25)]);
    }

    #[test]
    fn percent_change_handles_degenerate_baselines() {
        assert_eq!(percent_change(0.0, 5.0), None);
        assert_eq!(percent_change(f64::NAN, 5.0), None);
        assert_eq!(percent_change(4.0, f64::INFINITY), None);
        assert_eq!(percent_change(4.0, 5.0), Some(25.0));
    }
}
