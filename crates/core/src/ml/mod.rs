//! Sales Regression Model
//!
//! The model is trained elsewhere and shipped as a JSON artifact. Predictions
//! are in log space (the training target was `ln(1 + units)`); callers undo
//! that with [`inverse_log_transform`]. Features are resolved by column name
//! against the [`FeatureTable`], so column order in the table does not have to
//! match the model's training order.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::features::FeatureTable;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("model feature `{feature}` is not a column of the feature table")]
    MissingFeature { feature: String },
    #[error("invalid model artifact: {0}")]
    InvalidArtifact(String),
    #[error("could not read model artifact `{path}`: {source}")]
    Read { path: PathBuf, source: std::io::Error },
    #[error("could not parse model artifact `{path}`: {source}")]
    Parse { path: PathBuf, source: serde_json::Error },
}

/// A trained regression model over a [`FeatureTable`].
pub trait SalesModel: Send + Sync {
    /// Feature names in training order.
    fn feature_names(&self) -> &[String];

    /// One log-space prediction per table row.
    fn predict(&self, features: &FeatureTable) -> Result<Vec<f64>, ModelError>;

    /// Per-feature importance, aligned with [`SalesModel::feature_names`].
    fn feature_importances(&self) -> &[f64];
}

/// Inverts the `ln(1 + x)` transform applied to the training target.
pub fn inverse_log_transform(prediction: f64) -> f64 {
    prediction.exp_m1()
}

fn resolve_columns<'t>(
    feature_names: &[String],
    features: &'t FeatureTable,
) -> Result<Vec<&'t [f64]>, ModelError> {
    feature_names
        .iter()
        .map(|name| {
            features
                .column(name)
                .ok_or_else(|| ModelError::MissingFeature { feature: name.clone() })
        })
        .collect()
}

fn normalized(raw: Vec<f64>) -> Vec<f64> {
    let total: f64 = raw.iter().sum();
    if total > 0.0 {
        raw.into_iter().map(|value| value / total).collect()
    } else {
        raw
    }
}

/// Linear regression: `intercept + sum(weight_i * x_i)`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LinearSalesModel {
    pub version: String,
    #[serde(default)]
    pub trained_at: Option<DateTime<Utc>>,
    pub intercept: f64,
    pub feature_names: Vec<String>,
    pub weights: Vec<f64>,
    /// Normalized absolute weights when the artifact omits explicit scores.
    #[serde(default)]
    pub feature_importances: Vec<f64>,
}

impl LinearSalesModel {
    pub fn new(
        version: impl Into<String>,
        intercept: f64,
        features: Vec<(String, f64)>,
    ) -> Result<Self, ModelError> {
        let (feature_names, weights) = features.into_iter().unzip();
        let mut model = Self {
            version: version.into(),
            trained_at: None,
            intercept,
            feature_names,
            weights,
            feature_importances: Vec::new(),
        };
        model.finalize()?;
        Ok(model)
    }

    fn finalize(&mut self) -> Result<(), ModelError> {
        if self.weights.len() != self.feature_names.len() {
            return Err(ModelError::InvalidArtifact(format!(
                "linear model has {} weights for {} features",
                self.weights.len(),
                self.feature_names.len()
            )));
        }

        if self.feature_importances.is_empty() {
            self.feature_importances =
                normalized(self.weights.iter().map(|weight| weight.abs()).collect());
        } else if self.feature_importances.len() != self.feature_names.len() {
            return Err(ModelError::InvalidArtifact(format!(
                "linear model has {} importances for {} features",
                self.feature_importances.len(),
                self.feature_names.len()
            )));
        }

        Ok(())
    }
}

impl SalesModel for LinearSalesModel {
    fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    fn predict(&self, features: &FeatureTable) -> Result<Vec<f64>, ModelError> {
        let columns = resolve_columns(&self.feature_names, features)?;
        let predictions = (0..features.row_count())
            .map(|row| {
                self.intercept
                    + columns
                        .iter()
                        .zip(&self.weights)
                        .map(|(column, weight)| column[row] * weight)
                        .sum::<f64>()
            })
            .collect();
        Ok(predictions)
    }

    fn feature_importances(&self) -> &[f64] {
        &self.feature_importances
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TreeNode {
    Split { feature: usize, threshold: f64, left: usize, right: usize },
    Leaf { value: f64 },
}

/// Flat regression tree; node 0 is the root. Rows with `x < threshold` go left.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RegressionTree {
    pub nodes: Vec<TreeNode>,
}

impl RegressionTree {
    fn validate(&self, feature_count: usize) -> Result<(), ModelError> {
        if self.nodes.is_empty() {
            return Err(ModelError::InvalidArtifact("regression tree has no nodes".to_string()));
        }

        for (index, node) in self.nodes.iter().enumerate() {
            if let TreeNode::Split { feature, left, right, .. } = *node {
                if feature >= feature_count {
                    return Err(ModelError::InvalidArtifact(format!(
                        "node {index} splits on feature {feature} but the model has {feature_count}"
                    )));
                }
                // children must point forward so evaluation always terminates
                let in_bounds = left < self.nodes.len() && right < self.nodes.len();
                if left <= index || right <= index || !in_bounds {
                    return Err(ModelError::InvalidArtifact(format!(
                        "node {index} has out-of-order children ({left}, {right})"
                    )));
                }
            }
        }

        Ok(())
    }

    fn evaluate(&self, row: &[f64]) -> f64 {
        let mut index = 0;
        loop {
            match self.nodes[index] {
                TreeNode::Leaf { value } => return value,
                TreeNode::Split { feature, threshold, left, right } => {
                    index = if row[feature] < threshold { left } else { right };
                }
            }
        }
    }
}

/// Additive ensemble of regression trees: `base_score + sum(tree(x))`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TreeEnsembleModel {
    pub version: String,
    #[serde(default)]
    pub trained_at: Option<DateTime<Utc>>,
    pub base_score: f64,
    pub feature_names: Vec<String>,
    pub trees: Vec<RegressionTree>,
    /// Split-count ("weight") importance when the artifact omits explicit scores.
    #[serde(default)]
    pub feature_importances: Vec<f64>,
}

impl TreeEnsembleModel {
    fn finalize(&mut self) -> Result<(), ModelError> {
        for tree in &self.trees {
            tree.validate(self.feature_names.len())?;
        }

        if self.feature_importances.is_empty() {
            let mut split_counts = vec![0.0; self.feature_names.len()];
            for tree in &self.trees {
                for node in &tree.nodes {
                    if let TreeNode::Split { feature, .. } = node {
                        split_counts[*feature] += 1.0;
                    }
                }
            }
            self.feature_importances = normalized(split_counts);
        } else if self.feature_importances.len() != self.feature_names.len() {
            return Err(ModelError::InvalidArtifact(format!(
                "tree ensemble has {} importances for {} features",
                self.feature_importances.len(),
                self.feature_names.len()
            )));
        }

        Ok(())
    }
}

impl SalesModel for TreeEnsembleModel {
    fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    fn predict(&self, features: &FeatureTable) -> Result<Vec<f64>, ModelError> {
        let columns = resolve_columns(&self.feature_names, features)?;
        let mut row = vec![0.0; columns.len()];
        let mut predictions = Vec::with_capacity(features.row_count());

        for index in 0..features.row_count() {
            for (slot, column) in row.iter_mut().zip(&columns) {
                *slot = column[index];
            }
            let score: f64 = self.trees.iter().map(|tree| tree.evaluate(&row)).sum();
            predictions.push(self.base_score + score);
        }

        Ok(predictions)
    }

    fn feature_importances(&self) -> &[f64] {
        &self.feature_importances
    }
}

/// Serialized model, tagged by `kind`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ModelArtifact {
    Linear(LinearSalesModel),
    TreeEnsemble(TreeEnsembleModel),
}

impl ModelArtifact {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let mut artifact: Self = serde_json::from_str(json)?;
        artifact.finalize().map_err(<serde_json::Error as serde::de::Error>::custom)?;
        Ok(artifact)
    }

    pub fn load(path: &Path) -> Result<Self, ModelError> {
        let raw = fs::read_to_string(path)
            .map_err(|source| ModelError::Read { path: path.to_path_buf(), source })?;
        Self::from_json(&raw).map_err(|source| ModelError::Parse { path: path.to_path_buf(), source })
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn version(&self) -> &str {
        match self {
            Self::Linear(model) => &model.version,
            Self::TreeEnsemble(model) => &model.version,
        }
    }

    fn finalize(&mut self) -> Result<(), ModelError> {
        match self {
            Self::Linear(model) => model.finalize(),
            Self::TreeEnsemble(model) => model.finalize(),
        }
    }

    fn inner(&self) -> &dyn SalesModel {
        match self {
            Self::Linear(model) => model,
            Self::TreeEnsemble(model) => model,
        }
    }
}

impl SalesModel for ModelArtifact {
    fn feature_names(&self) -> &[String] {
        self.inner().feature_names()
    }

    fn predict(&self, features: &FeatureTable) -> Result<Vec<f64>, ModelError> {
        self.inner().predict(features)
    }

    fn feature_importances(&self) -> &[f64] {
        self.inner().feature_importances()
    }
}
