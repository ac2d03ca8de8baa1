use std::fs;
use std::path::{Path, PathBuf};

use hypersight_core::DEFAULT_TICKET_TABLE;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const HYPERSIGHT_DIR_NAME: &str = ".hypersight";
pub const CONFIG_FILE_NAME: &str = "config.toml";
pub const DEFAULT_STORE_API_KEY_ENV: &str = "SUPABASE_ANON_KEY";
pub const DEFAULT_SQLITE_FILE_NAME: &str = "tickets.sqlite";
pub const DEFAULT_JSON_FILE_NAME: &str = "tickets.json";
pub const DEFAULT_ROW_LIMIT: usize = 10_000;
pub const DEFAULT_OPENAI_API_KEY_ENV: &str = "OPENAI_API_KEY";
pub const DEFAULT_OPENAI_ENDPOINT: &str = "https://api.openai.com/v1/chat/completions";
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_TEMPERATURE: f32 = 0.7;
pub const DEFAULT_MAX_TOKENS: u32 = 500;
pub const DEFAULT_TOP_CATEGORIES_LIMIT: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackendKind {
    #[default]
    Postgrest,
    Sqlite,
    Json,
}

impl StoreBackendKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Postgrest => "postgrest",
            Self::Sqlite => "sqlite",
            Self::Json => "json",
        }
    }
}

impl std::str::FromStr for StoreBackendKind {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "postgrest" => Ok(Self::Postgrest),
            "sqlite" => Ok(Self::Sqlite),
            "json" => Ok(Self::Json),
            other => Err(format!(
                "invalid store backend '{other}', expected one of: postgrest, sqlite, json"
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AssistantProviderKind {
    #[default]
    Auto,
    Mock,
    Openai,
}

impl AssistantProviderKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Mock => "mock",
            Self::Openai => "openai",
        }
    }
}

impl std::str::FromStr for AssistantProviderKind {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "auto" => Ok(Self::Auto),
            "mock" => Ok(Self::Mock),
            "openai" => Ok(Self::Openai),
            other => Err(format!(
                "invalid provider '{other}', expected one of: auto, mock, openai"
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct HypersightConfig {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub assistant: AssistantConfig,
    #[serde(default)]
    pub dashboard: DashboardConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: StoreBackendKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default = "default_table")]
    pub table: String,
    #[serde(default = "default_store_api_key_env")]
    pub api_key_env: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sqlite_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub json_path: Option<String>,
    #[serde(default = "default_row_limit")]
    pub row_limit: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackendKind::Postgrest,
            url: None,
            table: default_table(),
            api_key_env: default_store_api_key_env(),
            sqlite_path: None,
            json_path: None,
            row_limit: DEFAULT_ROW_LIMIT,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssistantConfig {
    #[serde(default)]
    pub provider: AssistantProviderKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    #[serde(default = "default_assistant_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            provider: AssistantProviderKind::Auto,
            model: None,
            endpoint: None,
            api_key_env: default_assistant_api_key_env(),
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardConfig {
    #[serde(default = "default_top_categories_limit")]
    pub top_categories_limit: usize,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            top_categories_limit: DEFAULT_TOP_CATEGORIES_LIMIT,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigWarning {
    pub code: &'static str,
    pub message: String,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config TOML: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("failed to serialize config TOML: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

pub fn hypersight_dir(workspace_root: impl AsRef<Path>) -> PathBuf {
    workspace_root.as_ref().join(HYPERSIGHT_DIR_NAME)
}

pub fn config_path(workspace_root: impl AsRef<Path>) -> PathBuf {
    hypersight_dir(workspace_root).join(CONFIG_FILE_NAME)
}

/// Resolve a configured path against the workspace; relative paths are
/// taken from the workspace root, absent ones fall back to `.hypersight/<default_name>`.
pub fn resolve_workspace_path(
    workspace_root: impl AsRef<Path>,
    configured: Option<&str>,
    default_name: &str,
) -> PathBuf {
    let workspace_root = workspace_root.as_ref();
    let configured = configured
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(HYPERSIGHT_DIR_NAME).join(default_name));
    if configured.is_absolute() {
        configured
    } else {
        workspace_root.join(configured)
    }
}

pub fn load_workspace_config(
    workspace_root: impl AsRef<Path>,
) -> Result<HypersightConfig, ConfigError> {
    let path = config_path(workspace_root);
    if !path.exists() {
        return Ok(HypersightConfig::default());
    }

    let raw = fs::read_to_string(path)?;
    let parsed: HypersightConfig = toml::from_str(&raw)?;
    Ok(normalize_config(parsed))
}

pub fn ensure_workspace_config(
    workspace_root: impl AsRef<Path>,
) -> Result<HypersightConfig, ConfigError> {
    let workspace_root = workspace_root.as_ref();
    fs::create_dir_all(hypersight_dir(workspace_root))?;

    let path = config_path(workspace_root);
    if path.exists() {
        return load_workspace_config(workspace_root);
    }

    let config = HypersightConfig::default();
    save_workspace_config(workspace_root, &config)?;

    Ok(config)
}

pub fn save_workspace_config(
    workspace_root: impl AsRef<Path>,
    config: &HypersightConfig,
) -> Result<(), ConfigError> {
    let workspace_root = workspace_root.as_ref();
    fs::create_dir_all(hypersight_dir(workspace_root))?;
    let content = toml::to_string_pretty(config)?;
    fs::write(config_path(workspace_root), content)?;
    Ok(())
}

pub fn validate_config(config: &HypersightConfig) -> Vec<ConfigWarning> {
    let mut warnings = Vec::new();

    if config.store.backend == StoreBackendKind::Postgrest && config.store.url.is_none() {
        warnings.push(ConfigWarning {
            code: "store_url_missing",
            message: "store.backend is postgrest but store.url is not set".to_owned(),
        });
    }
    if !is_plain_identifier(&config.store.table) {
        warnings.push(ConfigWarning {
            code: "store_table_invalid",
            message: format!(
                "store.table '{}' is not a plain identifier",
                config.store.table
            ),
        });
    }
    if config.store.row_limit == 0 {
        warnings.push(ConfigWarning {
            code: "store_row_limit_zero",
            message: "store.row_limit is 0, no tickets will be loaded".to_owned(),
        });
    }
    if !(0.0..=2.0).contains(&config.assistant.temperature) {
        warnings.push(ConfigWarning {
            code: "assistant_temperature_range",
            message: format!(
                "assistant.temperature {} is outside 0.0..=2.0",
                config.assistant.temperature
            ),
        });
    }
    if config.assistant.max_tokens == 0 {
        warnings.push(ConfigWarning {
            code: "assistant_max_tokens_zero",
            message: "assistant.max_tokens is 0".to_owned(),
        });
    }
    if config.dashboard.top_categories_limit == 0 {
        warnings.push(ConfigWarning {
            code: "dashboard_top_categories_zero",
            message: "dashboard.top_categories_limit is 0, the category chart will be empty"
                .to_owned(),
        });
    }

    warnings
}

/// ASCII letters, digits and underscores, not starting with a digit.
pub fn is_plain_identifier(value: &str) -> bool {
    let mut chars = value.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {}
        _ => return false,
    }
    chars.all(|ch| ch.is_ascii_alphanumeric() || ch == '_')
}

fn default_table() -> String {
    DEFAULT_TICKET_TABLE.to_owned()
}

fn default_store_api_key_env() -> String {
    DEFAULT_STORE_API_KEY_ENV.to_owned()
}

fn default_row_limit() -> usize {
    DEFAULT_ROW_LIMIT
}

fn default_assistant_api_key_env() -> String {
    DEFAULT_OPENAI_API_KEY_ENV.to_owned()
}

fn default_temperature() -> f32 {
    DEFAULT_TEMPERATURE
}

fn default_max_tokens() -> u32 {
    DEFAULT_MAX_TOKENS
}

fn default_top_categories_limit() -> usize {
    DEFAULT_TOP_CATEGORIES_LIMIT
}

fn normalize_optional(input: Option<String>) -> Option<String> {
    input
        .map(|value| value.trim().to_owned())
        .filter(|value| !value.is_empty())
}

fn normalize_required(value: &str, fallback: impl FnOnce() -> String) -> String {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        fallback()
    } else {
        trimmed.to_owned()
    }
}

fn normalize_config(mut config: HypersightConfig) -> HypersightConfig {
    config.store.url = normalize_optional(config.store.url.take())
        .map(|url| url.trim_end_matches('/').to_owned());
    config.store.sqlite_path = normalize_optional(config.store.sqlite_path.take());
    config.store.json_path = normalize_optional(config.store.json_path.take());
    config.store.table = normalize_required(&config.store.table, default_table);
    config.store.api_key_env =
        normalize_required(&config.store.api_key_env, default_store_api_key_env);

    config.assistant.model = normalize_optional(config.assistant.model.take());
    config.assistant.endpoint = normalize_optional(config.assistant.endpoint.take());
    config.assistant.api_key_env =
        normalize_required(&config.assistant.api_key_env, default_assistant_api_key_env);

    config
}
