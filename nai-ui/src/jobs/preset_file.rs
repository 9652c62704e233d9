//! Preset file import: read values from a file into a template variable

use super::{Completion, Done, JobDomain, PendingApply, Prepared};
use nai_common::ipc::{decode_result, Operation, PresetImportResult};
use nai_common::preset::coerce_values;
use nai_common::{ApplyMode, PresetValue};
use serde_json::{Map, Value};
use tracing::warn;

#[derive(Debug, Clone, PartialEq)]
pub enum PresetFileCommand {
    Import {
        path: String,
        variable_name: String,
        mode: ApplyMode,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresetFileMode {
    Import,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PresetFileUpdate {
    ApplyValues {
        variable_name: String,
        values: Vec<PresetValue>,
        mode: ApplyMode,
    },
}

#[derive(Debug, Default)]
pub struct PresetFile;

impl JobDomain for PresetFile {
    type Command = PresetFileCommand;
    type Mode = PresetFileMode;
    type Context = PendingApply;
    type Update = PresetFileUpdate;

    const LABEL: &'static str = "preset file";

    fn prepare(
        &self,
        command: PresetFileCommand,
    ) -> Result<Prepared<PresetFileMode, PendingApply>, String> {
        let PresetFileCommand::Import {
            path,
            variable_name,
            mode,
        } = command;

        let path = path.trim();
        if path.is_empty() {
            return Err("Choose a file path.".to_string());
        }
        let variable_name = variable_name.trim();
        if variable_name.is_empty() {
            return Err("Select a variable.".to_string());
        }

        let mut payload = Map::new();
        payload.insert("path".to_string(), Value::String(path.to_string()));

        Ok(Prepared {
            mode: PresetFileMode::Import,
            op: Operation::PresetImport,
            payload,
            context: PendingApply {
                variable_name: variable_name.to_string(),
                mode,
            },
            status: "Importing preset...".to_string(),
        })
    }

    fn complete(
        &mut self,
        _mode: PresetFileMode,
        pending: PendingApply,
        done: Done<'_>,
    ) -> Completion<PresetFileUpdate, PresetFileCommand> {
        let decoded = decode_result::<PresetImportResult>(Operation::PresetImport, done.payload);
        let result = match decoded {
            Ok(result) => result,
            Err(e) => {
                warn!("{}", e);
                return Completion::new("Preset data not found.");
            }
        };

        let values = coerce_values(&result.values);
        if values.is_empty() {
            return Completion::new("No values imported.");
        }
        let status = format!("Imported {} values into {}.", values.len(), pending.variable_name);
        Completion::new(status).with_update(PresetFileUpdate::ApplyValues {
            variable_name: pending.variable_name,
            values,
            mode: pending.mode,
        })
    }
}
