use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde_json::{json, Map, Value as JsonValue};
use toml::Value;

use crate::commands::CommandResult;
use leadflow_core::config::{AppConfig, LoadOptions};

/// Config keys with the environment variables that can set them.
const FIELDS: &[(&str, &[&str])] = &[
    ("database.url", &["LEADFLOW_DATABASE_URL"]),
    ("database.max_connections", &["LEADFLOW_DATABASE_MAX_CONNECTIONS"]),
    ("database.timeout_secs", &["LEADFLOW_DATABASE_TIMEOUT_SECS"]),
    ("server.bind_address", &["LEADFLOW_SERVER_BIND_ADDRESS"]),
    ("server.port", &["LEADFLOW_SERVER_PORT"]),
    ("server.graceful_shutdown_secs", &["LEADFLOW_SERVER_GRACEFUL_SHUTDOWN_SECS"]),
    ("logging.level", &["LEADFLOW_LOGGING_LEVEL", "LEADFLOW_LOG_LEVEL"]),
    ("logging.format", &["LEADFLOW_LOGGING_FORMAT", "LEADFLOW_LOG_FORMAT"]),
    ("routing.rng_seed", &["LEADFLOW_ROUTING_RNG_SEED"]),
    ("routing.max_assignment_attempts", &["LEADFLOW_ROUTING_MAX_ASSIGNMENT_ATTEMPTS"]),
    ("routing.default_max_active_leads", &["LEADFLOW_ROUTING_DEFAULT_MAX_ACTIVE_LEADS"]),
];

pub fn run() -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "config",
                "config_validation",
                format!("configuration issue: {error}"),
                2,
            );
        }
    };

    let effective = match serde_json::to_value(&config) {
        Ok(value) => value,
        Err(error) => {
            return CommandResult::failure("config", "serialization", error.to_string(), 3);
        }
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());
    let sources: Map<String, JsonValue> = FIELDS
        .iter()
        .map(|(key, env_keys)| {
            let source =
                field_source(key, env_keys, config_file_doc.as_ref(), config_file_path.as_deref());
            (key.to_string(), JsonValue::String(source))
        })
        .collect();

    CommandResult::success_with_data(
        "config",
        "effective config (source precedence: env > file > default)",
        Some(json!({ "effective": effective, "sources": sources })),
    )
}

fn detect_config_path() -> Option<PathBuf> {
    [PathBuf::from("leadflow.toml"), PathBuf::from("config/leadflow.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let raw = fs::read_to_string(path?).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_keys: &[&str],
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_keys.iter().find(|key| env::var_os(key).is_some()) {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
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
