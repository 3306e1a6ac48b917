use std::fs;
use std::path::{Path, PathBuf};

use jarvis_core::config::{AppConfig, LoadOptions};
use jarvis_core::features::{FeatureTable, PROMOTION_FLAG, STOCK_AVAILABLE, STOCK_RATIO};
use jarvis_core::ml::{LinearSalesModel, ModelArtifact};
use jarvis_db::{connect_with_settings, migrations, DemoSalesDataset};

use crate::commands::{current_thread_runtime, CommandResult};

const DEMO_ROWS: usize = 28;

pub fn run(force_artifacts: bool) -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "seed",
                "config_validation",
                format!("configuration issue: {error}"),
                2,
            );
        }
    };

    let runtime = match current_thread_runtime("seed") {
        Ok(runtime) => runtime,
        Err(failure) => return failure,
    };

    if let Some(path) = sqlite_file_path(&config.database.url) {
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            if let Err(error) = fs::create_dir_all(parent) {
                return CommandResult::failure(
                    "seed",
                    "db_connectivity",
                    format!("could not create `{}`: {error}", parent.display()),
                    4,
                );
            }
        }
    }

    let result = runtime.block_on(async {
        // Seeding writes, so the configured read-only flag does not apply here.
        let pool = connect_with_settings(
            &config.database.url,
            config.database.max_connections,
            config.database.timeout_secs,
            false,
        )
        .await
        .map_err(|error| ("db_connectivity", error.to_string(), 4u8))?;

        migrations::run_pending(&pool)
            .await
            .map_err(|error| ("migration", error.to_string(), 5u8))?;

        let seed_result = DemoSalesDataset::load(&pool, &config.database.sales_table)
            .await
            .map_err(|error| ("seed_execution", error.to_string(), 5u8))?;

        // A table that already held rows is left untouched and is not verified.
        if !seed_result.skipped {
            let verification = DemoSalesDataset::verify(&pool, &config.database.sales_table)
                .await
                .map_err(|error| ("seed_verification", error.to_string(), 6u8))?;
            if !verification.all_present {
                let message = verification_failure_message(&verification.checks);
                return Err(("seed_verification", message, 6u8));
            }
        }

        pool.close().await;
        Ok::<_, (&'static str, String, u8)>(seed_result)
    });

    let seed_result = match result {
        Ok(seed_result) => seed_result,
        Err((error_class, message, exit_code)) => {
            return CommandResult::failure("seed", error_class, message, exit_code);
        }
    };

    let artifacts = match write_demo_artifacts(&config, force_artifacts) {
        Ok(artifacts) => artifacts,
        Err(message) => return CommandResult::failure("seed", "artifact_write", message, 7),
    };

    let sales_message = if seed_result.skipped {
        format!(
            "sales table `{}` already holds {} rows; left unchanged",
            config.database.sales_table, seed_result.rows_present
        )
    } else {
        format!(
            "inserted {} demo sales rows into `{}`",
            seed_result.rows_inserted, config.database.sales_table
        )
    };
    CommandResult::success("seed", format!("{sales_message}; {}", artifacts.join("; ")))
}

fn verification_failure_message(checks: &[(&'static str, bool)]) -> String {
    let failed_checks = checks
        .iter()
        .filter_map(|(check, passed)| (!passed).then_some(*check))
        .collect::<Vec<_>>();
    if failed_checks.is_empty() {
        "Some seed data failed to load".to_string()
    } else {
        format!("Seed verification failed for checks: {}", failed_checks.join(", "))
    }
}

/// Writes the demo model and feature table unless files already exist there.
fn write_demo_artifacts(config: &AppConfig, force: bool) -> Result<Vec<String>, String> {
    let model_json = ModelArtifact::Linear(demo_model().map_err(|error| error.to_string())?)
        .to_json()
        .map_err(|error| error.to_string())?;
    let features_json =
        demo_features().and_then(|features| features.to_json().map_err(|error| error.to_string()))?;

    Ok(vec![
        write_artifact(&config.artifacts.model_path, &model_json, force)?,
        write_artifact(&config.artifacts.features_path, &features_json, force)?,
    ])
}

fn write_artifact(path: &Path, contents: &str, force: bool) -> Result<String, String> {
    if path.exists() && !force {
        return Ok(format!("kept existing `{}`", path.display()));
    }
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .map_err(|error| format!("could not create `{}`: {error}", parent.display()))?;
    }
    fs::write(path, contents).map_err(|error| format!("could not write `{}`: {error}", path.display()))?;
    Ok(format!("wrote `{}`", path.display()))
}

/// Log-space linear model over the demo feature columns.
pub fn demo_model() -> Result<LinearSalesModel, jarvis_core::ml::ModelError> {
    LinearSalesModel::new(
        "demo-1",
        1.2,
        vec![
            ("price".to_string(), -0.08),
            (STOCK_AVAILABLE.to_string(), 0.004),
            (STOCK_RATIO.to_string(), 0.35),
            (PROMOTION_FLAG.to_string(), 0.3),
            ("day_of_week".to_string(), 0.01),
        ],
    )
}

/// Four weeks of SKU/day observations with mixed promotion and stock levels.
pub fn demo_features() -> Result<FeatureTable, String> {
    let rows = 0..DEMO_ROWS;
    let stock: Vec<f64> = rows.clone().map(|row| 40.0 + ((row * 37) % 160) as f64).collect();

    FeatureTable::from_pairs([
        ("price", rows.clone().map(|row| 1.5 + (row % 5) as f64 * 0.5).collect()),
        (STOCK_AVAILABLE, stock.clone()),
        (STOCK_RATIO, stock.iter().map(|units| units / 100.0).collect()),
        (PROMOTION_FLAG, rows.clone().map(|row| if row % 3 == 0 { 1.0 } else { 0.0 }).collect()),
        ("day_of_week", rows.map(|row| (row % 7) as f64).collect()),
    ])
    .map_err(|error| error.to_string())
}

fn sqlite_file_path(url: &str) -> Option<PathBuf> {
    let rest = url.strip_prefix("sqlite://").or_else(|| url.strip_prefix("sqlite:"))?;
    let path = rest.split('?').next().unwrap_or_default();
    if path.is_empty() || path.starts_with(":memory:") {
        None
    } else {
        Some(PathBuf::from(path))
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use jarvis_core::ml::SalesModel;
    use jarvis_core::simulation::SimulationEngine;

    use super::{demo_features, demo_model, sqlite_file_path, verification_failure_message};

    #[test]
    fn verification_error_message_targets_failed_checks() {
        let checks = [("row-count", true), ("total-units-2024", false)];
        assert_eq!(
            verification_failure_message(&checks),
            "Seed verification failed for checks: total-units-2024"
        );
    }

    #[test]
    fn verification_error_message_falls_back_to_generic_when_no_labels() {
        let checks = [("row-count", true), ("total-units-2024", true)];
        assert_eq!(verification_failure_message(&checks), "Some seed data failed to load");
    }

    #[test]
    fn demo_artifacts_support_every_scenario() {
        let model = demo_model().expect("model");
        let features = demo_features().expect("features");
        assert!(model.feature_names().iter().all(|name| features.has_column(name)));

        let engine = SimulationEngine::new(&model, &features);
        let drop = engine.simulate_stock_drop(0.2).expect("stock drop");
        assert!(drop.sim < drop.base);
        let drivers = engine.key_drivers(3).expect("drivers");
        assert_eq!(drivers[0].feature, "stock_ratio");
    }

    #[test]
    fn sqlite_urls_resolve_to_file_paths() {
        assert_eq!(
            sqlite_file_path("sqlite://data/fmcg_data.db"),
            Some(PathBuf::from("data/fmcg_data.db"))
        );
        assert_eq!(sqlite_file_path("sqlite:jarvis.db?mode=rwc"), Some(PathBuf::from("jarvis.db")));
        assert_eq!(sqlite_file_path("sqlite::memory:"), None);
    }
}
