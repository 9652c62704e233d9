//! Template database jobs: list, get, save, delete

use super::{Completion, Done, JobDomain, Prepared};
use nai_common::ipc::{
    decode_result, Operation, TemplateDbGetResult, TemplateDbListResult, TemplateDbSaveResult,
};
use nai_common::preset::TemplateInfo;
use nai_common::Preset;
use serde_json::{json, Map, Value};
use tracing::warn;

const NOT_FOUND: &str = "Template data not found.";

#[derive(Debug, Clone, PartialEq)]
pub enum TemplateDbCommand {
    List,
    Get { name: String },
    /// `name` overrides the template's own name when given
    Save { template: Preset, name: Option<String> },
    Delete { name: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateDbMode {
    List,
    Get,
    Save,
    Delete,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TemplateDbUpdate {
    Templates(Vec<TemplateInfo>),
    Template(Preset),
    SelectedName(String),
}

#[derive(Debug, Default)]
pub struct TemplateDb;

impl TemplateDb {
    fn op(mode: TemplateDbMode) -> Operation {
        match mode {
            TemplateDbMode::List => Operation::TemplateDbList,
            TemplateDbMode::Get => Operation::TemplateDbGet,
            TemplateDbMode::Save => Operation::TemplateDbSave,
            TemplateDbMode::Delete => Operation::TemplateDbDelete,
        }
    }
}

fn named(name: &str) -> Map<String, Value> {
    let mut payload = Map::new();
    payload.insert("name".to_string(), Value::String(name.to_string()));
    payload
}

impl JobDomain for TemplateDb {
    type Command = TemplateDbCommand;
    type Mode = TemplateDbMode;
    type Context = ();
    type Update = TemplateDbUpdate;

    const LABEL: &'static str = "template DB";

    fn prepare(&self, command: TemplateDbCommand) -> Result<Prepared<TemplateDbMode, ()>, String> {
        let (mode, payload, status) = match command {
            TemplateDbCommand::List => {
                (TemplateDbMode::List, Map::new(), "Loading template list...")
            }
            TemplateDbCommand::Get { name } => {
                let name = name.trim();
                if name.is_empty() {
                    return Err("Select a template name.".to_string());
                }
                (TemplateDbMode::Get, named(name), "Loading template...")
            }
            TemplateDbCommand::Save { template, name } => {
                let name = name
                    .as_deref()
                    .map(str::trim)
                    .filter(|name| !name.is_empty())
                    .unwrap_or_else(|| template.name.trim())
                    .to_string();
                if name.is_empty() {
                    return Err("Enter a template name.".to_string());
                }
                let mut payload = named(&name);
                payload.insert("template".to_string(), json!(template));
                (TemplateDbMode::Save, payload, "Saving template...")
            }
            TemplateDbCommand::Delete { name } => {
                let name = name.trim();
                if name.is_empty() {
                    return Err("Select a template to delete.".to_string());
                }
                (TemplateDbMode::Delete, named(name), "Deleting template...")
            }
        };

        Ok(Prepared {
            mode,
            op: Self::op(mode),
            payload,
            context: (),
            status: status.to_string(),
        })
    }

    fn complete(
        &mut self,
        mode: TemplateDbMode,
        _context: (),
        done: Done<'_>,
    ) -> Completion<TemplateDbUpdate, TemplateDbCommand> {
        let op = Self::op(mode);
        match mode {
            TemplateDbMode::List => match decode_result::<TemplateDbListResult>(op, done.payload) {
                Ok(result) => Completion::new("Template list loaded.")
                    .with_update(TemplateDbUpdate::Templates(result.templates)),
                Err(e) => {
                    warn!("{}", e);
                    Completion::new(NOT_FOUND)
                }
            },
            TemplateDbMode::Get => match decode_result::<TemplateDbGetResult>(op, done.payload) {
                Ok(result) => {
                    let selected = result
                        .name
                        .filter(|name| !name.trim().is_empty())
                        .unwrap_or_else(|| result.payload.name.clone());
                    Completion::new("Template loaded.")
                        .with_update(TemplateDbUpdate::Template(result.payload))
                        .with_update(TemplateDbUpdate::SelectedName(selected))
                }
                Err(e) => {
                    warn!("{}", e);
                    Completion::new(NOT_FOUND)
                }
            },
            TemplateDbMode::Save => {
                let mut completion = Completion::new("Template saved.");
                // The saved name is informational; a missing one is not a failure
                if let Ok(TemplateDbSaveResult { name: Some(name) }) =
                    decode_result(op, done.payload)
                {
                    completion = completion.with_update(TemplateDbUpdate::SelectedName(name));
                }
                completion.with_follow_up(Some(TemplateDbCommand::List))
            }
            TemplateDbMode::Delete => {
                Completion::new("Template deleted.").with_follow_up(Some(TemplateDbCommand::List))
            }
        }
    }
}
