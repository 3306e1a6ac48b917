use std::env;
use std::path::Path;
use std::sync::{Mutex, OnceLock};

use jarvis_cli::commands::{ask, migrate, seed, smoke};
use serde_json::Value;
use tempfile::TempDir;

#[test]
fn migrate_returns_success_when_writes_are_allowed() {
    let dir = TempDir::new().expect("tempdir");
    let vars = workspace_env(dir.path());
    let mut vars = borrowed(&vars);
    vars.push(("JARVIS_DATABASE_READ_ONLY", "false"));

    with_env(&vars, || {
        let result = migrate::run();
        assert_eq!(result.exit_code, 0, "expected successful migrate run: {}", result.output);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "migrate");
        assert_eq!(payload["status"], "ok");
    });
}

#[test]
fn migrate_refuses_read_only_database() {
    let dir = TempDir::new().expect("tempdir");
    let vars = workspace_env(dir.path());

    with_env(&borrowed(&vars), || {
        let result = migrate::run();
        assert_eq!(result.exit_code, 2);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["status"], "error");
        assert_eq!(payload["error_class"], "read_only_database");
    });
}

#[test]
fn seed_is_idempotent_and_keeps_existing_artifacts() {
    let dir = TempDir::new().expect("tempdir");
    let vars = workspace_env(dir.path());

    with_env(&borrowed(&vars), || {
        let first = seed::run(false);
        assert_eq!(first.exit_code, 0, "expected first seed to succeed: {}", first.output);
        let payload = parse_payload(&first.output);
        assert_eq!(payload["command"], "seed");
        assert_eq!(payload["status"], "ok");
        let message = payload["message"].as_str().expect("message");
        assert!(message.contains("inserted"), "unexpected message: {message}");
        assert!(dir.path().join("model.json").exists());
        assert!(dir.path().join("features.json").exists());

        let second = seed::run(false);
        assert_eq!(second.exit_code, 0);
        let message = parse_payload(&second.output)["message"].as_str().expect("message").to_string();
        assert!(message.contains("left unchanged"), "unexpected message: {message}");
        assert!(message.contains("kept existing"), "unexpected message: {message}");

        let forced = seed::run(true);
        assert_eq!(forced.exit_code, 0);
        let message = parse_payload(&forced.output)["message"].as_str().expect("message").to_string();
        assert!(message.contains("wrote"), "unexpected message: {message}");
    });
}

#[test]
fn ask_answers_sales_summary_after_seed() {
    let dir = TempDir::new().expect("tempdir");
    let vars = workspace_env(dir.path());

    with_env(&borrowed(&vars), || {
        assert_eq!(seed::run(false).exit_code, 0);

        let result = ask::run("Total units sold in 2024", false);
        assert_eq!(result.exit_code, 0, "unexpected failure: {}", result.output);
        assert_eq!(result.output, "Total units sold in 2024: 120,000 units.");

        let result = ask::run("Which category sells the most?", false);
        assert_eq!(result.exit_code, 0);
        assert!(result.output.contains("Beverages"), "unexpected answer: {}", result.output);
    });
}

#[test]
fn ask_json_mode_reports_intent_and_correlation_id() {
    let dir = TempDir::new().expect("tempdir");
    let vars = workspace_env(dir.path());

    with_env(&borrowed(&vars), || {
        assert_eq!(seed::run(false).exit_code, 0);

        let result = ask::run("How many units were sold in total?", true);
        assert_eq!(result.exit_code, 0, "unexpected failure: {}", result.output);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["intent"], "sales_summary");
        assert!(payload["text"].as_str().expect("text").contains("120,000"));
        assert!(!payload["correlation_id"].as_str().expect("correlation id").is_empty());

        let result = ask::run("What if stock drops by 30%?", true);
        assert_eq!(result.exit_code, 0);
        let payload = parse_payload(&result.output);
        assert_eq!(payload["intent"], "stock_drop");
        assert!(payload["text"].as_str().expect("text").contains("30%"));
    });
}

#[test]
fn ask_falls_back_for_unknown_questions() {
    let dir = TempDir::new().expect("tempdir");
    let vars = workspace_env(dir.path());

    with_env(&borrowed(&vars), || {
        assert_eq!(seed::run(false).exit_code, 0);

        let result = ask::run("hello there", true);
        assert_eq!(result.exit_code, 0);
        assert_eq!(parse_payload(&result.output)["intent"], "unknown");
    });
}

#[test]
fn ask_rejects_empty_question() {
    with_env(&[], || {
        let result = ask::run("   ", false);
        assert_eq!(result.exit_code, 2);
        assert_eq!(parse_payload(&result.output)["error_class"], "invalid_input");
    });
}

#[test]
fn ask_reports_config_failure() {
    with_env(&[("JARVIS_ANALYSIS_TOP_DRIVERS", "three")], || {
        let result = ask::run("Total units sold in 2024", false);
        assert_eq!(result.exit_code, 2);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "ask");
        assert_eq!(payload["error_class"], "config_validation");
    });
}

#[test]
fn ask_reports_missing_artifacts() {
    let dir = TempDir::new().expect("tempdir");
    let vars = workspace_env(dir.path());

    with_env(&borrowed(&vars), || {
        let result = ask::run("Total units sold in 2024", false);
        assert_eq!(result.exit_code, 5);
        assert_eq!(parse_payload(&result.output)["error_class"], "artifact_load");
    });
}

#[test]
fn smoke_passes_after_seed() {
    let dir = TempDir::new().expect("tempdir");
    let vars = workspace_env(dir.path());

    with_env(&borrowed(&vars), || {
        assert_eq!(seed::run(false).exit_code, 0);

        let result = smoke::run();
        assert_eq!(result.exit_code, 0, "expected smoke to pass: {}", result.output);
        assert!(result.output.starts_with("smoke: 6/6 checks passed"));

        let payload = parse_payload(last_line(&result.output));
        assert_eq!(payload["command"], "smoke");
        assert_eq!(payload["status"], "pass");
        let names: Vec<&str> = payload["checks"]
            .as_array()
            .expect("checks")
            .iter()
            .filter_map(|check| check["name"].as_str())
            .collect();
        assert_eq!(
            names,
            [
                "config_validation",
                "model_artifact",
                "feature_artifact",
                "feature_alignment",
                "db_connectivity",
                "sales_table",
            ]
        );
    });
}

#[test]
fn smoke_fails_without_artifacts() {
    let dir = TempDir::new().expect("tempdir");
    let vars = workspace_env(dir.path());

    with_env(&borrowed(&vars), || {
        let result = smoke::run();
        assert_eq!(result.exit_code, 6);

        let payload = parse_payload(last_line(&result.output));
        assert_eq!(payload["status"], "fail");
        let checks = payload["checks"].as_array().expect("checks");
        assert_eq!(checks[0]["status"], "pass");
        assert_eq!(checks[1]["name"], "model_artifact");
        assert_eq!(checks[1]["status"], "fail");
        assert_eq!(checks[3]["status"], "skipped");
    });
}

#[test]
fn smoke_skips_remaining_checks_on_config_failure() {
    with_env(&[("JARVIS_DATABASE_URL", "postgres://localhost/sales")], || {
        let result = smoke::run();
        assert_eq!(result.exit_code, 6);

        let payload = parse_payload(last_line(&result.output));
        let checks = payload["checks"].as_array().expect("checks");
        assert_eq!(checks[0]["status"], "fail");
        assert!(checks[1..].iter().all(|check| check["status"] == "skipped"));
    });
}

fn workspace_env(dir: &Path) -> Vec<(&'static str, String)> {
    vec![
        ("JARVIS_DATABASE_URL", format!("sqlite://{}", dir.join("fmcg_data.db").display())),
        ("JARVIS_MODEL_PATH", dir.join("model.json").display().to_string()),
        ("JARVIS_FEATURES_PATH", dir.join("features.json").display().to_string()),
    ]
}

fn borrowed<'a>(vars: &'a [(&'static str, String)]) -> Vec<(&'static str, &'a str)> {
    vars.iter().map(|(key, value)| (*key, value.as_str())).collect()
}

fn parse_payload(output: &str) -> Value {
    serde_json::from_str(output).expect("command output should be valid json")
}

fn last_line(output: &str) -> &str {
    output.lines().last().unwrap_or_default()
}

fn with_env(vars: &[(&str, &str)], test_fn: impl FnOnce()) {
    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    let _guard =
        ENV_LOCK.get_or_init(|| Mutex::new(())).lock().unwrap_or_else(|poisoned| poisoned.into_inner());

    let keys = [
        "JARVIS_DATABASE_URL",
        "JARVIS_DATABASE_MAX_CONNECTIONS",
        "JARVIS_DATABASE_TIMEOUT_SECS",
        "JARVIS_DATABASE_READ_ONLY",
        "JARVIS_DATABASE_SALES_TABLE",
        "JARVIS_MODEL_PATH",
        "JARVIS_FEATURES_PATH",
        "JARVIS_ANALYSIS_SUMMARY_YEAR",
        "JARVIS_ANALYSIS_STOCK_DROP_PCT",
        "JARVIS_ANALYSIS_TOP_DRIVERS",
        "JARVIS_ANALYSIS_ANSWER_FORECASTS",
        "JARVIS_ANALYSIS_ANSWER_KEY_DRIVERS",
        "JARVIS_LOGGING_LEVEL",
        "JARVIS_LOGGING_FORMAT",
        "JARVIS_LOG_LEVEL",
        "JARVIS_LOG_FORMAT",
    ];

    let previous_values: Vec<(&str, Option<String>)> =
        keys.iter().map(|key| (*key, env::var(key).ok())).collect();

    for key in &keys {
        env::remove_var(key);
    }
    for (key, value) in vars {
        env::set_var(key, value);
    }

    test_fn();

    for (key, value) in previous_values {
        if let Some(value) = value {
            env::set_var(key, value);
        } else {
            env::remove_var(key);
        }
    }
}
