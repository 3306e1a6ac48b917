use std::time::Instant;

use jarvis_core::config::{AppConfig, LoadOptions};
use jarvis_core::ml::SalesModel;
use jarvis_db::SqlSalesRepository;
use serde::Serialize;

use crate::bootstrap::{connect_store, load_features, load_model};
use crate::commands::{escape_json, CommandResult};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum SmokeStatus {
    Pass,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct SmokeCheck {
    name: &'static str,
    status: SmokeStatus,
    elapsed_ms: u64,
    message: String,
}

#[derive(Debug, Serialize)]
struct SmokeReport {
    command: &'static str,
    status: SmokeStatus,
    summary: String,
    total_elapsed_ms: u64,
    checks: Vec<SmokeCheck>,
}

impl SmokeCheck {
    fn from_outcome<T>(
        name: &'static str,
        outcome: Result<(u64, T), (u64, String)>,
        on_pass: impl FnOnce(&T) -> String,
    ) -> (Self, Option<T>) {
        match outcome {
            Ok((elapsed_ms, value)) => {
                let message = on_pass(&value);
                (Self { name, status: SmokeStatus::Pass, elapsed_ms, message }, Some(value))
            }
            Err((elapsed_ms, message)) => {
                (Self { name, status: SmokeStatus::Fail, elapsed_ms, message }, None)
            }
        }
    }
}

pub fn run() -> CommandResult {
    let started = Instant::now();
    let mut checks = Vec::new();

    let (check, config) = SmokeCheck::from_outcome(
        "config_validation",
        timed_check(|| AppConfig::load(LoadOptions::default()).map_err(|error| error.to_string())),
        |_| "configuration loaded and validated".to_string(),
    );
    checks.push(check);
    let Some(config) = config else {
        checks.extend(
            ["model_artifact", "feature_artifact", "feature_alignment", "db_connectivity", "sales_table"]
                .into_iter()
                .map(skipped),
        );
        return finalize_report(checks, started.elapsed().as_millis() as u64);
    };

    let (check, model) = SmokeCheck::from_outcome(
        "model_artifact",
        timed_check(|| load_model(&config).map_err(|error| error.to_string())),
        |model| format!("loaded model version `{}`", model.version()),
    );
    checks.push(check);

    let (check, features) = SmokeCheck::from_outcome(
        "feature_artifact",
        timed_check(|| load_features(&config).map_err(|error| error.to_string())),
        |features| format!("loaded {} feature rows", features.row_count()),
    );
    checks.push(check);

    match (&model, &features) {
        (Some(model), Some(features)) => {
            let alignment_started = Instant::now();
            let missing: Vec<&str> = model
                .feature_names()
                .iter()
                .map(String::as_str)
                .filter(|name| !features.has_column(name))
                .collect();
            checks.push(SmokeCheck {
                name: "feature_alignment",
                status: if missing.is_empty() { SmokeStatus::Pass } else { SmokeStatus::Fail },
                elapsed_ms: alignment_started.elapsed().as_millis() as u64,
                message: if missing.is_empty() {
                    "every model feature is present in the feature table".to_string()
                } else {
                    format!("feature table is missing model features: {}", missing.join(", "))
                },
            });
        }
        _ => checks.push(skipped("feature_alignment")),
    }

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            checks.push(SmokeCheck {
                name: "db_connectivity",
                status: SmokeStatus::Fail,
                elapsed_ms: 0,
                message: format!("failed to initialize async runtime: {error}"),
            });
            checks.push(skipped("sales_table"));
            return finalize_report(checks, started.elapsed().as_millis() as u64);
        }
    };

    let db_started = Instant::now();
    let pool = match runtime.block_on(connect_store(&config)) {
        Ok(pool) => {
            checks.push(SmokeCheck {
                name: "db_connectivity",
                status: SmokeStatus::Pass,
                elapsed_ms: db_started.elapsed().as_millis() as u64,
                message: format!("connected using `{}`", config.database.url),
            });
            pool
        }
        Err(error) => {
            checks.push(SmokeCheck {
                name: "db_connectivity",
                status: SmokeStatus::Fail,
                elapsed_ms: db_started.elapsed().as_millis() as u64,
                message: format!("failed to connect: {error}"),
            });
            checks.push(skipped("sales_table"));
            return finalize_report(checks, started.elapsed().as_millis() as u64);
        }
    };

    let table_started = Instant::now();
    let table_result = runtime.block_on(async {
        let repository =
            SqlSalesRepository::new(pool.clone(), config.database.sales_table.clone())?;
        repository.row_count().await
    });
    runtime.block_on(async {
        pool.close().await;
    });

    checks.push(match table_result {
        Ok(rows) => SmokeCheck {
            name: "sales_table",
            status: SmokeStatus::Pass,
            elapsed_ms: table_started.elapsed().as_millis() as u64,
            message: format!("`{}` is readable with {rows} rows", config.database.sales_table),
        },
        Err(error) => SmokeCheck {
            name: "sales_table",
            status: SmokeStatus::Fail,
            elapsed_ms: table_started.elapsed().as_millis() as u64,
            message: format!("sales table check failed: {error}"),
        },
    });

    finalize_report(checks, started.elapsed().as_millis() as u64)
}

fn timed_check<T, E>(check: impl FnOnce() -> Result<T, E>) -> Result<(u64, T), (u64, E)> {
    let started = Instant::now();
    match check() {
        Ok(value) => Ok((started.elapsed().as_millis() as u64, value)),
        Err(error) => Err((started.elapsed().as_millis() as u64, error)),
    }
}

fn skipped(name: &'static str) -> SmokeCheck {
    SmokeCheck {
        name,
        status: SmokeStatus::Skipped,
        elapsed_ms: 0,
        message: "skipped due previous failure".to_string(),
    }
}

fn finalize_report(checks: Vec<SmokeCheck>, total_elapsed_ms: u64) -> CommandResult {
    let passed = checks.iter().filter(|check| check.status == SmokeStatus::Pass).count();
    let total = checks.len();
    let failed = checks.iter().any(|check| check.status == SmokeStatus::Fail);

    let report = SmokeReport {
        command: "smoke",
        status: if failed { SmokeStatus::Fail } else { SmokeStatus::Pass },
        summary: format!("smoke: {passed}/{total} checks passed in {total_elapsed_ms}ms"),
        total_elapsed_ms,
        checks,
    };

    let human = report.summary.clone();
    let machine = serde_json::to_string(&report).unwrap_or_else(|error| {
        format!(
            "{{\"command\":\"smoke\",\"status\":\"fail\",\"summary\":\"serialization failed\",\"error\":\"{}\"}}",
            escape_json(&error.to_string())
        )
    });

    CommandResult { exit_code: if failed { 6 } else { 0 }, output: format!("{human}\n{machine}") }
}
