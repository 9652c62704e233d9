//! Typed `done` payloads, one per operation
//!
//! The worker's payload shapes are best-effort. Each operation decodes its
//! payload into the struct below; anything that does not fit becomes
//! [`Error::MalformedResponse`](crate::Error::MalformedResponse).

use crate::preset::{Preset, PresetInfo, PresetValue, TemplateInfo};
use crate::{Error, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::Operation;

/// `template_db_list` → `{templates: [...]}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateDbListResult {
    #[serde(default)]
    pub templates: Vec<TemplateInfo>,
}

/// `template_db_get` → `{name?, payload: Preset}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateDbGetResult {
    #[serde(default)]
    pub name: Option<String>,
    pub payload: Preset,
}

/// `template_db_save` → `{name?}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemplateDbSaveResult {
    #[serde(default)]
    pub name: Option<String>,
}

/// `preset_db_list` → `{presets: [...]}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PresetDbListResult {
    #[serde(default)]
    pub presets: Vec<PresetInfo>,
}

/// Stored body of a database preset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PresetRecord {
    pub values: Vec<PresetValue>,
}

/// `preset_db_get` → the stored row, whose `payload` holds the values
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PresetDbGetResult {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub name: Option<String>,
    pub payload: PresetRecord,
}

/// `preset_load` → `{preset, path?}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PresetLoadResult {
    pub preset: Preset,
    #[serde(default)]
    pub path: Option<String>,
}

/// `preset_save` → `{path?}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PresetSaveResult {
    #[serde(default)]
    pub path: Option<String>,
}

/// `preset_import` → `{values: [...]}`; entries are coerced leniently later
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PresetImportResult {
    pub values: Value,
}

/// `build_nais` → `{variable_name?, values: [...], common_tags: [...]}`
///
/// `values` are coerced leniently like an import.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildNaisResult {
    #[serde(default)]
    pub variable_name: Option<String>,
    #[serde(default)]
    pub values: Value,
    #[serde(default)]
    pub common_tags: Vec<String>,
}

/// Decode the `done` payload of `op` into its typed result.
pub fn decode_result<T: DeserializeOwned>(op: Operation, payload: Option<&Value>) -> Result<T> {
    let malformed = |reason: String| Error::MalformedResponse {
        op: op.as_str().to_string(),
        reason,
    };

    match payload {
        None | Some(Value::Null) => Err(malformed("missing payload".to_string())),
        Some(value @ Value::Object(_)) => {
            T::deserialize(value).map_err(|e| malformed(e.to_string()))
        }
        Some(other) => Err(malformed(format!(
            "expected an object, got {}",
            type_name(other)
        ))),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
