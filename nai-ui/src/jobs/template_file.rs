//! Template file jobs: load a template from disk, save the current one

use super::{Completion, Done, JobDomain, Prepared};
use nai_common::ipc::{decode_result, Operation, PresetLoadResult, PresetSaveResult};
use nai_common::Preset;
use serde_json::{json, Map, Value};
use tracing::warn;

#[derive(Debug, Clone, PartialEq)]
pub enum TemplateFileCommand {
    Load { path: String },
    Save { path: String, template: Preset },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateFileMode {
    Load,
    Save,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TemplateFileUpdate {
    Template(Preset),
    /// File the current template is bound to
    Path(String),
}

#[derive(Debug, Default)]
pub struct TemplateFile;

impl JobDomain for TemplateFile {
    type Command = TemplateFileCommand;
    type Mode = TemplateFileMode;
    /// Path the user asked for, used when the worker does not echo one
    type Context = String;
    type Update = TemplateFileUpdate;

    const LABEL: &'static str = "template file";

    fn prepare(
        &self,
        command: TemplateFileCommand,
    ) -> Result<Prepared<TemplateFileMode, String>, String> {
        let (mode, op, path, template, status) = match command {
            TemplateFileCommand::Load { path } => (
                TemplateFileMode::Load,
                Operation::PresetLoad,
                path,
                None,
                "Loading template file...",
            ),
            TemplateFileCommand::Save { path, template } => (
                TemplateFileMode::Save,
                Operation::PresetSave,
                path,
                Some(template),
                "Saving template file...",
            ),
        };

        let path = path.trim().to_string();
        if path.is_empty() {
            return Err("Choose a file path.".to_string());
        }

        let mut payload = Map::new();
        payload.insert("path".to_string(), Value::String(path.clone()));
        if let Some(template) = template {
            payload.insert("preset".to_string(), json!(template));
        }

        Ok(Prepared {
            mode,
            op,
            payload,
            context: path,
            status: status.to_string(),
        })
    }

    fn complete(
        &mut self,
        mode: TemplateFileMode,
        requested: String,
        done: Done<'_>,
    ) -> Completion<TemplateFileUpdate, TemplateFileCommand> {
        match mode {
            TemplateFileMode::Load => {
                match decode_result::<PresetLoadResult>(Operation::PresetLoad, done.payload) {
                    Ok(result) => Completion::new("Template file loaded.")
                        .with_update(TemplateFileUpdate::Template(result.preset))
                        .with_update(TemplateFileUpdate::Path(result.path.unwrap_or(requested))),
                    Err(e) => {
                        warn!("{}", e);
                        Completion::new("Template data not found.")
                    }
                }
            }
            TemplateFileMode::Save => {
                let path = decode_result::<PresetSaveResult>(Operation::PresetSave, done.payload)
                    .ok()
                    .and_then(|result| result.path)
                    .unwrap_or(requested);
                Completion::new("Template file saved.").with_update(TemplateFileUpdate::Path(path))
            }
        }
    }
}
