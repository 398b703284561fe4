use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use super::storage::{read_json, write_json, KeyValueStore};
use crate::config;
use crate::providers::catalog::{
    is_image_model, is_text_model, DEFAULT_IMAGE_MODEL_ID, DEFAULT_TEXT_MODEL_ID,
};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SettingsError {
    #[error("{0} is required")]
    MissingField(&'static str),

    #[error("No entry with id {0}")]
    EntryNotFound(String),

    #[error("Unknown setting {0}")]
    UnknownKey(String),
}

/// User preferences, persisted as one JSON document. Deserialisation never
/// fails: each key that is missing or of the wrong shape falls back to its
/// default on its own.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "Value")]
pub struct AppSettings {
    pub theme: ThemeSetting,
    pub font_size: FontSize,
    pub animation_speed: AnimationSpeed,
    pub reduce_motion: bool,
    pub show_timestamps: bool,
    pub chat_width: ChatWidth,
    pub bubble_shape: BubbleShape,
    pub message_density: MessageDensity,
    pub accent_color: AccentColor,
    pub default_text_model: String,
    pub default_image_model: String,
    /// In megabytes.
    pub max_file_size: u32,
    #[serde(rename = "textAPIEndpoint")]
    pub text_api_endpoint: String,
    #[serde(rename = "imageAPIEndpoint")]
    pub image_api_endpoint: String,
    #[serde(rename = "customAPIs")]
    pub custom_apis: Vec<CustomApi>,
    pub mcps: Vec<McpServer>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThemeSetting {
    Light,
    Dark,
    #[default]
    System,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FontSize {
    Small,
    #[default]
    Medium,
    Large,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnimationSpeed {
    Slow,
    #[default]
    Normal,
    Fast,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatWidth {
    Compact,
    #[default]
    Medium,
    Wide,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BubbleShape {
    #[default]
    Rounded,
    Square,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageDensity {
    Compact,
    #[default]
    Normal,
    Spacious,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccentColor {
    #[default]
    Blue,
    Purple,
    Green,
    Orange,
    Red,
}

/// A user-registered endpoint for the custom pass-through.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomApi {
    pub id: String,
    pub name: String,
    pub endpoint: String,
    #[serde(default)]
    pub key: String,
    #[serde(rename = "type", default = "custom_api_type")]
    pub kind: String,
}

impl fmt::Debug for CustomApi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CustomApi")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("endpoint", &self.endpoint)
            .field("key", &if self.key.is_empty() { "" } else { "<redacted>" })
            .field("type", &self.kind)
            .finish()
    }
}

fn custom_api_type() -> String {
    "custom".to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct McpServer {
    pub id: String,
    pub name: String,
    pub command: String,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
}

fn enabled_by_default() -> bool {
    true
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            theme: ThemeSetting::default(),
            font_size: FontSize::default(),
            animation_speed: AnimationSpeed::default(),
            reduce_motion: false,
            show_timestamps: false,
            chat_width: ChatWidth::default(),
            bubble_shape: BubbleShape::default(),
            message_density: MessageDensity::default(),
            accent_color: AccentColor::default(),
            default_text_model: DEFAULT_TEXT_MODEL_ID.to_string(),
            default_image_model: DEFAULT_IMAGE_MODEL_ID.to_string(),
            max_file_size: 10,
            text_api_endpoint: config::DEFAULT_TEXT_ENDPOINT.to_string(),
            image_api_endpoint: config::DEFAULT_IMAGE_ENDPOINT.to_string(),
            custom_apis: Vec::new(),
            mcps: Vec::new(),
        }
    }
}

fn field<T: DeserializeOwned>(obj: &Map<String, Value>, key: &str, default: T) -> T {
    match obj.get(key) {
        Some(value) => serde_json::from_value(value.clone()).unwrap_or_else(|e| {
            tracing::warn!("Resetting setting {}: {}", key, e);
            default
        }),
        None => default,
    }
}

impl From<Value> for AppSettings {
    fn from(value: Value) -> Self {
        let defaults = AppSettings::default();
        let Value::Object(obj) = value else {
            return defaults;
        };

        let settings = AppSettings {
            theme: field(&obj, "theme", defaults.theme),
            font_size: field(&obj, "fontSize", defaults.font_size),
            animation_speed: field(&obj, "animationSpeed", defaults.animation_speed),
            reduce_motion: field(&obj, "reduceMotion", defaults.reduce_motion),
            show_timestamps: field(&obj, "showTimestamps", defaults.show_timestamps),
            chat_width: field(&obj, "chatWidth", defaults.chat_width),
            bubble_shape: field(&obj, "bubbleShape", defaults.bubble_shape),
            message_density: field(&obj, "messageDensity", defaults.message_density),
            accent_color: field(&obj, "accentColor", defaults.accent_color),
            default_text_model: field(&obj, "defaultTextModel", defaults.default_text_model),
            default_image_model: field(&obj, "defaultImageModel", defaults.default_image_model),
            max_file_size: field(&obj, "maxFileSize", defaults.max_file_size),
            text_api_endpoint: field(&obj, "textAPIEndpoint", defaults.text_api_endpoint),
            image_api_endpoint: field(&obj, "imageAPIEndpoint", defaults.image_api_endpoint),
            custom_apis: field(&obj, "customAPIs", defaults.custom_apis),
            mcps: field(&obj, "mcps", defaults.mcps),
        };
        settings.migrated()
    }
}

impl AppSettings {
    /// Correct stale values: unknown model ids and the bare legacy hosts.
    pub fn migrated(mut self) -> Self {
        if !is_text_model(&self.default_text_model) {
            self.default_text_model = DEFAULT_TEXT_MODEL_ID.to_string();
        }
        if !is_image_model(&self.default_image_model) {
            self.default_image_model = DEFAULT_IMAGE_MODEL_ID.to_string();
        }
        if self.text_api_endpoint == config::LEGACY_TEXT_ENDPOINT {
            self.text_api_endpoint = config::DEFAULT_TEXT_ENDPOINT.to_string();
        }
        if self.image_api_endpoint == config::LEGACY_IMAGE_ENDPOINT {
            self.image_api_endpoint = config::DEFAULT_IMAGE_ENDPOINT.to_string();
        }
        self
    }

    pub fn add_custom_api(
        &mut self,
        name: &str,
        endpoint: &str,
        key: Option<&str>,
    ) -> Result<&CustomApi, SettingsError> {
        let name = required(name, "API name")?;
        let endpoint = required(endpoint, "API endpoint")?;
        self.custom_apis.push(CustomApi {
            id: short_id(),
            name,
            endpoint,
            key: key.unwrap_or_default().trim().to_string(),
            kind: custom_api_type(),
        });
        Ok(&self.custom_apis[self.custom_apis.len() - 1])
    }

    pub fn remove_custom_api(&mut self, id: &str) -> Result<(), SettingsError> {
        let before = self.custom_apis.len();
        self.custom_apis.retain(|api| api.id != id);
        if self.custom_apis.len() == before {
            return Err(SettingsError::EntryNotFound(id.to_string()));
        }
        Ok(())
    }

    pub fn custom_api(&self, id: &str) -> Option<&CustomApi> {
        self.custom_apis.iter().find(|api| api.id == id)
    }

    pub fn add_mcp(&mut self, name: &str, command: &str) -> Result<&McpServer, SettingsError> {
        let name = required(name, "MCP name")?;
        let command = required(command, "MCP command")?;
        self.mcps.push(McpServer {
            id: short_id(),
            name,
            command,
            enabled: true,
        });
        Ok(&self.mcps[self.mcps.len() - 1])
    }

    pub fn remove_mcp(&mut self, id: &str) -> Result<(), SettingsError> {
        let before = self.mcps.len();
        self.mcps.retain(|mcp| mcp.id != id);
        if self.mcps.len() == before {
            return Err(SettingsError::EntryNotFound(id.to_string()));
        }
        Ok(())
    }

    /// Flip `enabled` and return the new value.
    pub fn toggle_mcp(&mut self, id: &str) -> Result<bool, SettingsError> {
        let mcp = self
            .mcps
            .iter_mut()
            .find(|mcp| mcp.id == id)
            .ok_or_else(|| SettingsError::EntryNotFound(id.to_string()))?;
        mcp.enabled = !mcp.enabled;
        Ok(mcp.enabled)
    }
}

fn required(value: &str, field: &'static str) -> Result<String, SettingsError> {
    let value = value.trim();
    if value.is_empty() {
        Err(SettingsError::MissingField(field))
    } else {
        Ok(value.to_string())
    }
}

fn short_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()[..12].to_string()
}

pub struct SettingsService;

impl SettingsService {
    pub fn load(store: &dyn KeyValueStore) -> AppSettings {
        read_json(store, config::SETTINGS_KEY).unwrap_or_default()
    }

    pub fn save(store: &dyn KeyValueStore, settings: &AppSettings) {
        write_json(store, config::SETTINGS_KEY, settings);
    }

    /// One setting by its persisted key, e.g. `"defaultTextModel"`.
    pub fn get_value(store: &dyn KeyValueStore, key: &str) -> Option<Value> {
        match serde_json::to_value(Self::load(store)) {
            Ok(Value::Object(mut obj)) => obj.remove(key),
            _ => None,
        }
    }

    /// Set one key, persist, and return the resulting settings. A value that
    /// does not fit the key resets it to its default; an unknown key is
    /// rejected and nothing is written.
    pub fn update(
        store: &dyn KeyValueStore,
        key: &str,
        value: Value,
    ) -> Result<AppSettings, SettingsError> {
        let mut obj = match serde_json::to_value(Self::load(store)) {
            Ok(Value::Object(obj)) => obj,
            _ => Map::new(),
        };
        if !obj.contains_key(key) {
            return Err(SettingsError::UnknownKey(key.to_string()));
        }
        obj.insert(key.to_string(), value);

        let settings = AppSettings::from(Value::Object(obj));
        Self::save(store, &settings);
        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::Database;
    use serde_json::json;

    #[test]
    fn test_missing_blob_is_defaults() {
        let db = Database::new_in_memory().unwrap();
        assert_eq!(SettingsService::load(&db), AppSettings::default());
    }

    #[test]
    fn test_unknown_model_resets_to_default() {
        let db = Database::new_in_memory().unwrap();
        db.set(
            config::SETTINGS_KEY,
            r#"{"defaultTextModel":"nonexistent-model","defaultImageModel":"turbo"}"#,
        )
        .unwrap();

        let settings = SettingsService::load(&db);
        assert_eq!(settings.default_text_model, "openai");
        assert_eq!(settings.default_image_model, "turbo");
    }

    #[test]
    fn test_corrupt_blob_yields_defaults() {
        let db = Database::new_in_memory().unwrap();
        db.set(config::SETTINGS_KEY, "{{{").unwrap();
        assert_eq!(SettingsService::load(&db), AppSettings::default());
    }

    #[test]
    fn test_each_key_defaults_independently() {
        let settings = AppSettings::from(json!({
            "theme": "dark",
            "fontSize": "enormous",
            "maxFileSize": "lots",
            "showTimestamps": true,
        }));
        assert_eq!(settings.theme, ThemeSetting::Dark);
        assert_eq!(settings.font_size, FontSize::Medium);
        assert_eq!(settings.max_file_size, 10);
        assert!(settings.show_timestamps);
    }

    #[test]
    fn test_legacy_endpoints_are_migrated() {
        let settings = AppSettings::from(json!({
            "textAPIEndpoint": "https://text.pollinations.ai",
            "imageAPIEndpoint": "https://image.pollinations.ai",
        }));
        assert_eq!(settings.text_api_endpoint, config::DEFAULT_TEXT_ENDPOINT);
        assert_eq!(settings.image_api_endpoint, config::DEFAULT_IMAGE_ENDPOINT);

        let settings = AppSettings::from(json!({ "textAPIEndpoint": "https://llm.local/v1" }));
        assert_eq!(settings.text_api_endpoint, "https://llm.local/v1");
    }

    #[test]
    fn test_serialises_with_camel_case_keys() {
        let value = serde_json::to_value(AppSettings::default()).unwrap();
        assert_eq!(value["textAPIEndpoint"], config::DEFAULT_TEXT_ENDPOINT);
        assert_eq!(value["customAPIs"], json!([]));
        assert_eq!(value["accentColor"], "blue");
    }

    #[test]
    fn test_update_and_get_value() {
        let db = Database::new_in_memory().unwrap();
        let settings = SettingsService::update(&db, "accentColor", json!("green")).unwrap();
        assert_eq!(settings.accent_color, AccentColor::Green);
        assert_eq!(
            SettingsService::get_value(&db, "accentColor"),
            Some(json!("green"))
        );
        assert_eq!(SettingsService::get_value(&db, "noSuchKey"), None);
    }

    #[test]
    fn test_update_rejects_unknown_key() {
        let db = Database::new_in_memory().unwrap();
        assert_eq!(
            SettingsService::update(&db, "fooBar", json!(1)).unwrap_err(),
            SettingsError::UnknownKey("fooBar".to_string())
        );
        assert_eq!(db.get(config::SETTINGS_KEY).unwrap(), None);
    }

    #[test]
    fn test_custom_api_lifecycle() {
        let mut settings = AppSettings::default();
        assert_eq!(
            settings.add_custom_api("", "https://x", None).unwrap_err(),
            SettingsError::MissingField("API name")
        );

        let id = settings
            .add_custom_api("Mine", "https://api.example.com", Some("sk-secret"))
            .unwrap()
            .id
            .clone();
        let api = settings.custom_api(&id).unwrap();
        assert_eq!(api.kind, "custom");
        assert!(!format!("{:?}", api).contains("sk-secret"));

        settings.remove_custom_api(&id).unwrap();
        assert!(settings.custom_apis.is_empty());
        assert!(settings.remove_custom_api(&id).is_err());
    }

    #[test]
    fn test_mcp_toggle() {
        let mut settings = AppSettings::default();
        let id = settings.add_mcp("files", "mcp-files --root .").unwrap().id.clone();
        assert!(settings.mcps[0].enabled);
        assert!(!settings.toggle_mcp(&id).unwrap());
        assert!(settings.toggle_mcp(&id).unwrap());
        settings.remove_mcp(&id).unwrap();
        assert!(settings.toggle_mcp(&id).is_err());
    }
}
