use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub artifacts: ArtifactConfig,
    pub analysis: AnalysisConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
    pub read_only: bool,
    pub sales_table: String,
}

#[derive(Clone, Debug)]
pub struct ArtifactConfig {
    pub model_path: PathBuf,
    pub features_path: PathBuf,
}

#[derive(Clone, Debug)]
pub struct AnalysisConfig {
    /// Year used by sales summaries when the question does not name one.
    pub summary_year: i32,
    /// Stock reduction applied by what-if scenarios when the question has no percentage.
    pub stock_drop_pct: f64,
    pub top_drivers: usize,
    pub answer_forecasts: bool,
    pub answer_key_drivers: bool,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub database_url: Option<String>,
    pub database_read_only: Option<bool>,
    pub sales_table: Option<String>,
    pub model_path: Option<PathBuf>,
    pub features_path: Option<PathBuf>,
    pub summary_year: Option<i32>,
    pub stock_drop_pct: Option<f64>,
    pub log_level: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite://data/fmcg_data.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
                read_only: true,
                sales_table: "sales".to_string(),
            },
            artifacts: ArtifactConfig {
                model_path: PathBuf::from("artifacts/model.json"),
                features_path: PathBuf::from("artifacts/features.json"),
            },
            analysis: AnalysisConfig {
                summary_year: 2024,
                stock_drop_pct: 0.2,
                top_drivers: 3,
                answer_forecasts: true,
                answer_key_drivers: true,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("jarvis.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(database) = patch.database {
            if let Some(url) = database.url {
                self.database.url = url;
            }
            if let Some(max_connections) = database.max_connections {
                self.database.max_connections = max_connections;
            }
            if let Some(timeout_secs) = database.timeout_secs {
                self.database.timeout_secs = timeout_secs;
            }
            if let Some(read_only) = database.read_only {
                self.database.read_only = read_only;
            }
            if let Some(sales_table) = database.sales_table {
                self.database.sales_table = sales_table;
            }
        }

        if let Some(artifacts) = patch.artifacts {
            if let Some(model_path) = artifacts.model_path {
                self.artifacts.model_path = model_path;
            }
            if let Some(features_path) = artifacts.features_path {
                self.artifacts.features_path = features_path;
            }
        }

        if let Some(analysis) = patch.analysis {
            if let Some(summary_year) = analysis.summary_year {
                self.analysis.summary_year = summary_year;
            }
            if let Some(stock_drop_pct) = analysis.stock_drop_pct {
                self.analysis.stock_drop_pct = stock_drop_pct;
            }
            if let Some(top_drivers) = analysis.top_drivers {
                self.analysis.top_drivers = top_drivers;
            }
            if let Some(answer_forecasts) = analysis.answer_forecasts {
                self.analysis.answer_forecasts = answer_forecasts;
            }
            if let Some(answer_key_drivers) = analysis.answer_key_drivers {
                self.analysis.answer_key_drivers = answer_key_drivers;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("JARVIS_DATABASE_URL") {
            self.database.url = value;
        }
        if let Some(value) = read_env("JARVIS_DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = parse_u32("JARVIS_DATABASE_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("JARVIS_DATABASE_TIMEOUT_SECS") {
            self.database.timeout_secs = parse_u64("JARVIS_DATABASE_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("JARVIS_DATABASE_READ_ONLY") {
            self.database.read_only = parse_bool("JARVIS_DATABASE_READ_ONLY", &value)?;
        }
        if let Some(value) = read_env("JARVIS_DATABASE_SALES_TABLE") {
            self.database.sales_table = value;
        }

        if let Some(value) = read_env("JARVIS_MODEL_PATH") {
            self.artifacts.model_path = PathBuf::from(value);
        }
        if let Some(value) = read_env("JARVIS_FEATURES_PATH") {
            self.artifacts.features_path = PathBuf::from(value);
        }

        if let Some(value) = read_env("JARVIS_ANALYSIS_SUMMARY_YEAR") {
            self.analysis.summary_year = parse_i32("JARVIS_ANALYSIS_SUMMARY_YEAR", &value)?;
        }
        if let Some(value) = read_env("JARVIS_ANALYSIS_STOCK_DROP_PCT") {
            self.analysis.stock_drop_pct = parse_f64("JARVIS_ANALYSIS_STOCK_DROP_PCT", &value)?;
        }
        if let Some(value) = read_env("JARVIS_ANALYSIS_TOP_DRIVERS") {
            self.analysis.top_drivers = parse_usize("JARVIS_ANALYSIS_TOP_DRIVERS", &value)?;
        }
        if let Some(value) = read_env("JARVIS_ANALYSIS_ANSWER_FORECASTS") {
            self.analysis.answer_forecasts =
                parse_bool("JARVIS_ANALYSIS_ANSWER_FORECASTS", &value)?;
        }
        if let Some(value) = read_env("JARVIS_ANALYSIS_ANSWER_KEY_DRIVERS") {
            self.analysis.answer_key_drivers =
                parse_bool("JARVIS_ANALYSIS_ANSWER_KEY_DRIVERS", &value)?;
        }

        let log_level = read_env("JARVIS_LOGGING_LEVEL").or_else(|| read_env("JARVIS_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("JARVIS_LOGGING_FORMAT").or_else(|| read_env("JARVIS_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(database_url) = overrides.database_url {
            self.database.url = database_url;
        }
        if let Some(read_only) = overrides.database_read_only {
            self.database.read_only = read_only;
        }
        if let Some(sales_table) = overrides.sales_table {
            self.database.sales_table = sales_table;
        }
        if let Some(model_path) = overrides.model_path {
            self.artifacts.model_path = model_path;
        }
        if let Some(features_path) = overrides.features_path {
            self.artifacts.features_path = features_path;
        }
        if let Some(summary_year) = overrides.summary_year {
            self.analysis.summary_year = summary_year;
        }
        if let Some(stock_drop_pct) = overrides.stock_drop_pct {
            self.analysis.stock_drop_pct = stock_drop_pct;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_database(&self.database)?;
        validate_artifacts(&self.artifacts)?;
        validate_analysis(&self.analysis)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("jarvis.toml"), PathBuf::from("config/jarvis.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

/// True when `name` can be spliced into SQL as a bare identifier.
pub fn is_plain_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {}
        _ => return false,
    }
    chars.all(|ch| ch.is_ascii_alphanumeric() || ch == '_')
}

fn validate_database(database: &DatabaseConfig) -> Result<(), ConfigError> {
    let url = database.url.trim();
    let sqlite_url =
        url.starts_with("sqlite://") || url.starts_with("sqlite::") || url == ":memory:";
    if !sqlite_url {
        return Err(ConfigError::Validation(
            "database.url must be a sqlite URL (`sqlite://...`, `sqlite::...`, or `:memory:`)"
                .to_string(),
        ));
    }

    if database.max_connections == 0 {
        return Err(ConfigError::Validation(
            "database.max_connections must be greater than zero".to_string(),
        ));
    }

    if database.timeout_secs == 0 || database.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "database.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    if !is_plain_identifier(&database.sales_table) {
        return Err(ConfigError::Validation(format!(
            "database.sales_table `{}` must be a plain identifier ([A-Za-z_][A-Za-z0-9_]*)",
            database.sales_table
        )));
    }

    Ok(())
}

fn validate_artifacts(artifacts: &ArtifactConfig) -> Result<(), ConfigError> {
    if artifacts.model_path.as_os_str().is_empty() {
        return Err(ConfigError::Validation("artifacts.model_path is required".to_string()));
    }
    if artifacts.features_path.as_os_str().is_empty() {
        return Err(ConfigError::Validation("artifacts.features_path is required".to_string()));
    }
    Ok(())
}

fn validate_analysis(analysis: &AnalysisConfig) -> Result<(), ConfigError> {
    if !(1900..=2999).contains(&analysis.summary_year) {
        return Err(ConfigError::Validation(
            "analysis.summary_year must be in range 1900..=2999".to_string(),
        ));
    }

    if !analysis.stock_drop_pct.is_finite() || !(0.0..=1.0).contains(&analysis.stock_drop_pct) {
        return Err(ConfigError::Validation(
            "analysis.stock_drop_pct must be a fraction in range 0.0..=1.0".to_string(),
        ));
    }

    if analysis.top_drivers == 0 {
        return Err(ConfigError::Validation(
            "analysis.top_drivers must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn invalid_override(key: &str, value: &str) -> ConfigError {
    ConfigError::InvalidEnvOverride { key: key.to_string(), value: value.to_string() }
}

fn parse_i32(key: &str, value: &str) -> Result<i32, ConfigError> {
    value.trim().parse::<i32>().map_err(|_| invalid_override(key, value))
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.trim().parse::<u32>().map_err(|_| invalid_override(key, value))
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.trim().parse::<u64>().map_err(|_| invalid_override(key, value))
}

fn parse_usize(key: &str, value: &str) -> Result<usize, ConfigError> {
    value.trim().parse::<usize>().map_err(|_| invalid_override(key, value))
}

fn parse_f64(key: &str, value: &str) -> Result<f64, ConfigError> {
    value.trim().parse::<f64>().map_err(|_| invalid_override(key, value))
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    value.trim().parse::<bool>().map_err(|_| invalid_override(key, value))
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    database: Option<DatabasePatch>,
    artifacts: Option<ArtifactPatch>,
    analysis: Option<AnalysisPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabasePatch {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
    read_only: Option<bool>,
    sales_table: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ArtifactPatch {
    model_path: Option<PathBuf>,
    features_path: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
struct AnalysisPatch {
    summary_year: Option<i32>,
    stock_drop_pct: Option<f64>,
    top_drivers: Option<usize>,
    answer_forecasts: Option<bool>,
    answer_key_drivers: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
