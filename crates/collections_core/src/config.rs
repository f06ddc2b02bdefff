use std::{collections::HashMap, fs, time::Duration};

use tracing::warn;

use crate::{creation::CreationNames, page_params::DEFAULT_PAGE_SIZE};

pub const SETTINGS_FILE: &str = "console.toml";

#[derive(Debug, Clone)]
pub struct Settings {
    pub server_url: String,
    pub api_token: Option<String>,
    pub default_page_size: u32,
    pub request_timeout: Duration,
    pub new_collection_name: String,
    pub first_flow_name: String,
}

impl Default for Settings {
    fn default() -> Self {
        let names = CreationNames::default();
        Self {
            server_url: "http://127.0.0.1:3000".into(),
            api_token: None,
            default_page_size: DEFAULT_PAGE_SIZE,
            request_timeout: Duration::from_secs(15),
            new_collection_name: names.collection,
            first_flow_name: names.first_flow,
        }
    }
}

impl Settings {
    pub fn creation_names(&self) -> CreationNames {
        CreationNames {
            collection: self.new_collection_name.clone(),
            first_flow: self.first_flow_name.clone(),
        }
    }
}

/// Defaults, then `console.toml` in the working directory, then environment.
pub fn load_settings() -> Settings {
    let file = fs::read_to_string(SETTINGS_FILE).ok();
    load_settings_from(file.as_deref(), |key| std::env::var(key).ok())
}

pub fn load_settings_from(
    file: Option<&str>,
    env: impl Fn(&str) -> Option<String>,
) -> Settings {
    let mut settings = Settings::default();

    if let Some(raw) = file {
        match toml::from_str::<toml::Table>(raw) {
            Ok(table) => {
                let file_cfg = flatten_values(table);
                apply(&mut settings, |key| file_cfg.get(key).cloned());
            }
            Err(err) => warn!(%err, file = SETTINGS_FILE, "ignoring unreadable settings file"),
        }
    }

    if let Some(v) = env("CONSOLE_SERVER_URL") {
        settings.server_url = v;
    }
    apply(&mut settings, |key| {
        env(&format!("APP__{}", key.to_ascii_uppercase()))
    });

    settings
}

/// Keeps string and integer values; anything else is skipped with a warning.
fn flatten_values(table: toml::Table) -> HashMap<String, String> {
    table
        .into_iter()
        .filter_map(|(key, value)| match value {
            toml::Value::String(v) => Some((key, v)),
            toml::Value::Integer(v) => Some((key, v.to_string())),
            other => {
                warn!(key = %key, kind = other.type_str(), "ignoring unsupported setting value");
                None
            }
        })
        .collect()
}

fn apply(settings: &mut Settings, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(v) = lookup("server_url") {
        settings.server_url = v;
    }
    if let Some(v) = lookup("api_token") {
        settings.api_token = Some(v).filter(|token| !token.is_empty());
    }
    if let Some(v) = lookup("default_page_size") {
        match v.parse::<u32>() {
            Ok(parsed) if parsed > 0 => settings.default_page_size = parsed,
            _ => warn!(value = %v, "ignoring invalid default_page_size"),
        }
    }
    if let Some(v) = lookup("request_timeout_ms") {
        match v.parse::<u64>() {
            Ok(parsed) if parsed > 0 => settings.request_timeout = Duration::from_millis(parsed),
            _ => warn!(value = %v, "ignoring invalid request_timeout_ms"),
        }
    }
    if let Some(v) = lookup("new_collection_name") {
        settings.new_collection_name = v;
    }
    if let Some(v) = lookup("first_flow_name") {
        settings.first_flow_name = v;
    }
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
