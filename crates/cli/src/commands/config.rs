use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use jarvis_core::config::{AppConfig, LoadOptions};
use toml::Value;

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let entries: [(&str, String, &[&str]); 15] = [
        ("database.url", config.database.url.clone(), &["JARVIS_DATABASE_URL"]),
        (
            "database.max_connections",
            config.database.max_connections.to_string(),
            &["JARVIS_DATABASE_MAX_CONNECTIONS"],
        ),
        (
            "database.timeout_secs",
            config.database.timeout_secs.to_string(),
            &["JARVIS_DATABASE_TIMEOUT_SECS"],
        ),
        ("database.read_only", config.database.read_only.to_string(), &["JARVIS_DATABASE_READ_ONLY"]),
        (
            "database.sales_table",
            config.database.sales_table.clone(),
            &["JARVIS_DATABASE_SALES_TABLE"],
        ),
        (
            "artifacts.model_path",
            config.artifacts.model_path.display().to_string(),
            &["JARVIS_MODEL_PATH"],
        ),
        (
            "artifacts.features_path",
            config.artifacts.features_path.display().to_string(),
            &["JARVIS_FEATURES_PATH"],
        ),
        (
            "analysis.summary_year",
            config.analysis.summary_year.to_string(),
            &["JARVIS_ANALYSIS_SUMMARY_YEAR"],
        ),
        (
            "analysis.stock_drop_pct",
            config.analysis.stock_drop_pct.to_string(),
            &["JARVIS_ANALYSIS_STOCK_DROP_PCT"],
        ),
        (
            "analysis.top_drivers",
            config.analysis.top_drivers.to_string(),
            &["JARVIS_ANALYSIS_TOP_DRIVERS"],
        ),
        (
            "analysis.answer_forecasts",
            config.analysis.answer_forecasts.to_string(),
            &["JARVIS_ANALYSIS_ANSWER_FORECASTS"],
        ),
        (
            "analysis.answer_key_drivers",
            config.analysis.answer_key_drivers.to_string(),
            &["JARVIS_ANALYSIS_ANSWER_KEY_DRIVERS"],
        ),
        (
            "logging.level",
            config.logging.level.clone(),
            &["JARVIS_LOGGING_LEVEL", "JARVIS_LOG_LEVEL"],
        ),
        (
            "logging.format",
            format!("{:?}", config.logging.format).to_lowercase(),
            &["JARVIS_LOGGING_FORMAT", "JARVIS_LOG_FORMAT"],
        ),
        ("config.file", display_config_file(config_file_path.as_deref()), &[]),
    ];

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    for (key, value, env_keys) in entries {
        let source = if key.starts_with("config.") {
            "derived".to_string()
        } else {
            field_source(key, env_keys, config_file_doc.as_ref(), config_file_path.as_deref())
        };
        lines.push(render_line(key, &value, source));
    }

    lines.join("\n")
}

fn detect_config_path() -> Option<PathBuf> {
    ["jarvis.toml", "config/jarvis.toml"].into_iter().map(PathBuf::from).find(|path| path.exists())
}

fn display_config_file(path: Option<&Path>) -> String {
    path.map(|path| path.display().to_string()).unwrap_or_else(|| "<none>".to_string())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_keys: &[&str],
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_keys.iter().find(|env_key| env::var_os(env_key).is_some()) {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            return format!("file ({})", display_config_file(config_file_path));
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}
