//! Feature Table
//!
//! Column-major table of named `f64` columns fed to the sales model, one row
//! per SKU/day observation. The table loaded at startup is shared read-only
//! across requests; scenarios that need to perturb inputs take a [`FeatureTable::fork`].

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const STOCK_AVAILABLE: &str = "stock_available";
pub const STOCK_RATIO: &str = "stock_ratio";
pub const PROMOTION_FLAG: &str = "promotion_flag";

#[derive(Debug, Error)]
pub enum FeatureTableError {
    #[error("column `{column}` is missing from the feature table")]
    MissingColumn { column: String },
    #[error("column `{column}` has {actual} values, expected {expected}")]
    LengthMismatch { column: String, expected: usize, actual: usize },
    #[error("column `{0}` appears more than once")]
    DuplicateColumn(String),
    #[error("could not read feature artifact `{path}`: {source}")]
    Read { path: PathBuf, source: std::io::Error },
    #[error("could not parse feature artifact `{path}`: {source}")]
    Parse { path: PathBuf, source: serde_json::Error },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FeatureColumn {
    pub name: String,
    pub values: Vec<f64>,
}

/// Ordered collection of equally sized named columns.
///
/// `Clone` (and therefore [`FeatureTable::fork`]) is a deep copy: every
/// column buffer is duplicated, so writes to a fork are never visible through
/// the source table.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FeatureTable {
    columns: Vec<FeatureColumn>,
    #[serde(skip)]
    row_count: usize,
}

#[derive(Deserialize)]
struct FeatureTableArtifact {
    columns: Vec<FeatureColumn>,
}

impl FeatureTable {
    pub fn from_columns(columns: Vec<FeatureColumn>) -> Result<Self, FeatureTableError> {
        let mut seen = HashSet::new();
        for column in &columns {
            if !seen.insert(column.name.as_str()) {
                return Err(FeatureTableError::DuplicateColumn(column.name.clone()));
            }
        }

        let row_count = columns.first().map(|column| column.values.len()).unwrap_or(0);
        if let Some(column) = columns.iter().find(|column| column.values.len() != row_count) {
            return Err(FeatureTableError::LengthMismatch {
                column: column.name.clone(),
                expected: row_count,
                actual: column.values.len(),
            });
        }

        Ok(Self { columns, row_count })
    }

    /// Builds a table from `(name, values)` pairs, keeping their order.
    pub fn from_pairs<I, S>(pairs: I) -> Result<Self, FeatureTableError>
    where
        I: IntoIterator<Item = (S, Vec<f64>)>,
        S: Into<String>,
    {
        Self::from_columns(
            pairs
                .into_iter()
                .map(|(name, values)| FeatureColumn { name: name.into(), values })
                .collect(),
        )
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let artifact: FeatureTableArtifact = serde_json::from_str(json)?;
        Self::from_columns(artifact.columns).map_err(<serde_json::Error as serde::de::Error>::custom)
    }

    pub fn load(path: &Path) -> Result<Self, FeatureTableError> {
        let raw = fs::read_to_string(path)
            .map_err(|source| FeatureTableError::Read { path: path.to_path_buf(), source })?;
        Self::from_json(&raw)
            .map_err(|source| FeatureTableError::Parse { path: path.to_path_buf(), source })
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn row_count(&self) -> usize {
        self.row_count
    }

    pub fn is_empty(&self) -> bool {
        self.row_count == 0
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|column| column.name.as_str())
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|column| column.name == name)
    }

    pub fn column(&self, name: &str) -> Option<&[f64]> {
        self.columns.iter().find(|column| column.name == name).map(|column| column.values.as_slice())
    }

    /// Fails on the first name in `names` that is not a column.
    pub fn require_columns(&self, names: &[&str]) -> Result<(), FeatureTableError> {
        match names.iter().find(|name| !self.has_column(name)) {
            Some(missing) => {
                Err(FeatureTableError::MissingColumn { column: (*missing).to_string() })
            }
            None => Ok(()),
        }
    }

    /// Independent deep copy for what-if perturbation.
    pub fn fork(&self) -> Self {
        self.clone()
    }

    pub fn scale_column(&mut self, name: &str, factor: f64) -> Result<(), FeatureTableError> {
        for value in self.column_mut(name)? {
            *value *= factor;
        }
        Ok(())
    }

    pub fn fill_column(&mut self, name: &str, value: f64) -> Result<(), FeatureTableError> {
        self.column_mut(name)?.fill(value);
        Ok(())
    }

    fn column_mut(&mut self, name: &str) -> Result<&mut [f64], FeatureTableError> {
        self.columns
            .iter_mut()
            .find(|column| column.name == name)
            .map(|column| column.values.as_mut_slice())
            .ok_or_else(|| FeatureTableError::MissingColumn { column: name.to_string() })
    }
}
