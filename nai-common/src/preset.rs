//! Preset and template data model
//!
//! A template (also called a preset file) is a named list of variables, each
//! variable holding an ordered list of named, tagged values. The sidecar stores
//! templates and single-variable presets in its database; the types here are
//! the client's view of both.

use crate::tags::{ensure_unique_value_name, normalize_tags};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::HashSet;

/// One named value of a variable and the tags it expands to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresetValue {
    pub name: String,
    /// Normalized on the way in, whatever the worker sent
    #[serde(default, deserialize_with = "deserialize_tags")]
    pub tags: Vec<String>,
}

fn deserialize_tags<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let tags = Option::<Vec<String>>::deserialize(deserializer)?.unwrap_or_default();
    Ok(normalize_tags(&tags))
}

impl PresetValue {
    /// Build a value, normalizing its tag list.
    pub fn new<I, S>(name: impl Into<String>, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let tags: Vec<String> = tags.into_iter().map(Into::into).collect();
        Self {
            name: name.into(),
            tags: normalize_tags(&tags),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresetVariable {
    pub name: String,
    #[serde(default)]
    pub values: Vec<PresetValue>,
}

/// A template: the full set of variables edited in the UI.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preset {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub variables: Vec<PresetVariable>,
}

/// How incoming values are combined with a variable's existing values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApplyMode {
    /// Drop the existing values
    Replace,
    /// Keep the existing values and add the incoming ones, renaming on collision
    Append,
}

impl Preset {
    pub fn variable(&self, name: &str) -> Option<&PresetVariable> {
        self.variables.iter().find(|variable| variable.name == name)
    }

    /// Merge `incoming` into the variable called `variable_name`.
    ///
    /// A missing variable is created at the end of the list. Incoming tags are
    /// normalized and every stored value gets a name unique within the
    /// variable: in replace mode (or for a new variable) among the incoming
    /// values, in append mode also against the values already there.
    pub fn apply_values(
        &mut self,
        variable_name: &str,
        incoming: Vec<PresetValue>,
        mode: ApplyMode,
    ) {
        let index = match self
            .variables
            .iter()
            .position(|variable| variable.name == variable_name)
        {
            Some(index) => index,
            None => {
                self.variables.push(PresetVariable {
                    name: variable_name.to_string(),
                    values: Vec::new(),
                });
                self.variables.len() - 1
            }
        };
        let variable = &mut self.variables[index];

        if mode == ApplyMode::Replace {
            variable.values.clear();
        }
        let mut existing: HashSet<String> =
            variable.values.iter().map(|value| value.name.clone()).collect();
        for value in incoming {
            let name = ensure_unique_value_name(&value.name, &mut existing);
            variable.values.push(PresetValue {
                name,
                tags: normalize_tags(&value.tags),
            });
        }
    }
}

/// Template row as listed by `template_db_list`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateInfo {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub updated_at: Option<String>,
}

/// Preset row as listed by `preset_db_list`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresetInfo {
    pub id: i64,
    pub name: String,
    pub source_kind: String,
    pub variable_name: String,
    #[serde(default)]
    pub updated_at: Option<String>,
}

/// Leniently turn untyped worker output into preset values.
///
/// Entries that are not objects or have a blank name are skipped; tags are
/// stringified and normalized. Anything other than an array yields nothing.
pub fn coerce_values(raw: &Value) -> Vec<PresetValue> {
    let Some(entries) = raw.as_array() else {
        return Vec::new();
    };

    entries
        .iter()
        .filter_map(|entry| {
            let object = entry.as_object()?;
            let name = match object.get("name") {
                Some(Value::String(name)) => name.trim().to_string(),
                Some(Value::Null) | None => String::new(),
                Some(other) => other.to_string().trim().to_string(),
            };
            if name.is_empty() {
                return None;
            }
            let tags: Vec<String> = object
                .get("tags")
                .and_then(Value::as_array)
                .map(|tags| tags.iter().map(stringify).collect())
                .unwrap_or_default();
            Some(PresetValue {
                name,
                tags: normalize_tags(&tags),
            })
        })
        .collect()
}

fn stringify(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn template() -> Preset {
        Preset {
            name: "base".to_string(),
            variables: vec![PresetVariable {
                name: "hair".to_string(),
                values: vec![
                    PresetValue::new("a", ["red hair"]),
                    PresetValue::new("b", ["blue hair"]),
                ],
            }],
        }
    }

    #[test]
    fn test_new_normalizes_tags() {
        let value = PresetValue::new("x", [" red ", "red", "", "blue"]);
        assert_eq!(value.tags, vec!["red", "blue"]);
    }

    #[test]
    fn test_apply_values_creates_missing_variable() {
        let mut preset = template();
        let incoming = vec![PresetValue::new("g", ["green eyes"])];
        preset.apply_values("eyes", incoming, ApplyMode::Append);

        assert_eq!(preset.variables.len(), 2);
        let eyes = preset.variable("eyes").expect("variable should be created");
        assert_eq!(eyes.values[0].name, "g");
    }

    #[test]
    fn test_apply_values_replace() {
        let mut preset = template();
        let incoming = vec![PresetValue::new("c", ["black hair"])];
        preset.apply_values("hair", incoming, ApplyMode::Replace);

        let hair = preset.variable("hair").unwrap();
        assert_eq!(hair.values, vec![PresetValue::new("c", ["black hair"])]);
    }

    #[test]
    fn test_apply_values_append_renames_collisions() {
        let mut preset = template();
        preset.apply_values(
            "hair",
            vec![
                PresetValue::new("a", ["pink hair"]),
                PresetValue::new("a", ["white hair"]),
                PresetValue::new("c", ["black hair"]),
            ],
            ApplyMode::Append,
        );

        assert_eq!(names(&preset, "hair"), vec!["a", "b", "a_2", "a_3", "c"]);
    }

    fn names<'a>(preset: &'a Preset, variable: &str) -> Vec<&'a str> {
        preset
            .variable(variable)
            .expect("variable should exist")
            .values
            .iter()
            .map(|value| value.name.as_str())
            .collect()
    }

    #[test]
    fn test_apply_values_replace_keeps_names_unique() {
        let mut preset = template();
        let incoming = vec![PresetValue::new("a", ["x"]), PresetValue::new("a", ["y"])];
        preset.apply_values("hair", incoming, ApplyMode::Replace);

        assert_eq!(names(&preset, "hair"), vec!["a", "a_2"]);
    }

    #[test]
    fn test_apply_values_new_variable_keeps_names_unique() {
        let mut preset = template();
        let incoming = vec![PresetValue::new("b", ["x"]), PresetValue::new("b", ["y"])];
        preset.apply_values("eyes", incoming, ApplyMode::Append);

        assert_eq!(names(&preset, "eyes"), vec!["b", "b_2"]);
    }

    #[test]
    fn test_apply_values_normalizes_incoming_tags() {
        let mut preset = template();
        let raw = PresetValue {
            name: "c".into(),
            tags: vec!["x".into(), " x".into(), "x".into(), "".into()],
        };
        preset.apply_values("hair", vec![raw], ApplyMode::Append);

        let hair = preset.variable("hair").unwrap();
        assert_eq!(hair.values[2].tags, vec!["x"]);
    }

    #[test]
    fn test_deserialize_normalizes_tags() {
        let value: PresetValue =
            serde_json::from_value(json!({"name": "a", "tags": ["x", " x", "x", ""]})).unwrap();
        assert_eq!(value.tags, vec!["x"]);

        let value: PresetValue =
            serde_json::from_value(json!({"name": "a", "tags": null})).unwrap();
        assert!(value.tags.is_empty());
    }

    #[test]
    fn test_coerce_values_skips_bad_entries() {
        let raw = json!([
            {"name": " smile ", "tags": ["smile", " smile", 3]},
            {"name": "   ", "tags": ["x"]},
            "not an object",
            {"tags": ["y"]},
            {"name": "plain"}
        ]);

        let values = coerce_values(&raw);
        assert_eq!(
            values,
            vec![
                PresetValue::new("smile", ["smile", "3"]),
                PresetValue::new("plain", Vec::<String>::new()),
            ]
        );
    }

    #[test]
    fn test_coerce_values_non_array() {
        assert!(coerce_values(&json!({"name": "a"})).is_empty());
        assert!(coerce_values(&Value::Null).is_empty());
    }

    #[test]
    fn test_preset_deserializes_with_missing_fields() {
        let preset: Preset =
            serde_json::from_value(json!({"variables": [{"name": "v"}]})).unwrap();
        assert_eq!(preset.name, "");
        assert!(preset.variables[0].values.is_empty());
    }
}
