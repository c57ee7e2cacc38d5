use crate::db::models::{ModelId, Settings};
use crate::db::LocalStore;
use crate::error::{ClientError, Result};
use serde::Serialize;
use std::str::FromStr;

/// Storage key holding the serialized settings object.
pub const SETTINGS_KEY: &str = "deeptalk-settings";

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct ModelInfo {
    pub id: ModelId,
    pub name: String,
}

pub fn available_models() -> Vec<ModelInfo> {
    ModelId::ALL
        .into_iter()
        .map(|id| ModelInfo {
            id,
            name: id.display_name().to_string(),
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingsField {
    ModelId,
    Temperature,
    TopP,
    MaxTokens,
}

impl FromStr for SettingsField {
    type Err = ClientError;

    fn from_str(name: &str) -> Result<Self> {
        match name {
            "modelId" | "model_id" => Ok(SettingsField::ModelId),
            "temperature" => Ok(SettingsField::Temperature),
            "topP" | "top_p" => Ok(SettingsField::TopP),
            "maxTokens" | "max_tokens" => Ok(SettingsField::MaxTokens),
            _ => Err(ClientError::UnknownSetting(name.to_string())),
        }
    }
}

fn parse_real(name: &str, raw: &str) -> Result<f64> {
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| ClientError::Validation(format!("{} is not a number: {:?}", name, raw)))
}

/// Settings form backed by client-local storage.
pub struct SettingsStore {
    store: LocalStore,
    settings: Settings,
    saved: bool,
}

impl SettingsStore {
    /// Start from the built-in defaults, ignoring anything persisted.
    pub fn new(store: LocalStore) -> Self {
        Self {
            store,
            settings: Settings::default(),
            saved: false,
        }
    }

    /// Start from the persisted settings, or the defaults if there are none.
    pub fn restore(store: LocalStore) -> Self {
        let settings = match store.get_json::<Settings>(SETTINGS_KEY) {
            Ok(Some(settings)) => settings,
            Ok(None) => Settings::default(),
            Err(e) => {
                tracing::warn!(error = %e, "discarding unreadable persisted settings");
                Settings::default()
            }
        };
        Self {
            store,
            settings,
            saved: false,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// True between a `save` and the next edit.
    pub fn is_saved(&self) -> bool {
        self.saved
    }

    /// Apply one form input. Numeric fields are parsed from their text; range
    /// limits are left to the input control.
    pub fn update_field(&mut self, name: &str, raw: &str) -> Result<()> {
        match name.parse::<SettingsField>()? {
            SettingsField::ModelId => {
                self.settings.model_id = raw.parse().map_err(ClientError::Validation)?;
            }
            SettingsField::Temperature => self.settings.temperature = parse_real(name, raw)?,
            SettingsField::TopP => self.settings.top_p = parse_real(name, raw)?,
            SettingsField::MaxTokens => {
                self.settings.max_tokens = raw.trim().parse().map_err(|_| {
                    ClientError::Validation(format!("{} is not a whole number: {:?}", name, raw))
                })?;
            }
        }
        self.saved = false;
        Ok(())
    }

    /// Overwrite the persisted settings with the current form.
    pub fn save(&mut self) -> Result<()> {
        self.store.set_json(SETTINGS_KEY, &self.settings)?;
        tracing::info!(model = %self.settings.model_id, "saved settings");
        self.saved = true;
        Ok(())
    }

    pub fn persisted(&self) -> Result<Option<Settings>> {
        self.store.get_json(SETTINGS_KEY)
    }

    pub fn into_store(self) -> LocalStore {
        self.store
    }
}
