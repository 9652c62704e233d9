//! Preset database jobs: list, get (and apply), save, delete
//!
//! The last list filter is remembered so that a save or delete can refresh the
//! list the user is looking at.

use super::{insert_opt, Completion, Done, JobDomain, PendingApply, Prepared};
use nai_common::ipc::{decode_result, Operation, PresetDbGetResult, PresetDbListResult};
use nai_common::preset::PresetInfo;
use nai_common::{ApplyMode, PresetValue};
use serde_json::{json, Map};
use tracing::{debug, warn};

const NOT_FOUND: &str = "Preset data not found.";

/// Narrowing of `preset_db_list`; `None` fields are not sent
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PresetFilter {
    pub variable_name: Option<String>,
    pub source_kind: Option<String>,
}

/// A preset to store
#[derive(Debug, Clone, PartialEq)]
pub struct PresetDraft {
    /// Existing row to overwrite
    pub id: Option<i64>,
    pub name: String,
    pub source_kind: String,
    pub variable_name: String,
    pub values: Vec<PresetValue>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PresetDbCommand {
    List(PresetFilter),
    /// Fetch a preset and merge its values into `variable_name`
    Get {
        id: i64,
        variable_name: String,
        mode: ApplyMode,
    },
    Save(PresetDraft),
    Delete { id: i64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresetDbMode {
    List,
    Get,
    Save,
    Delete,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PresetDbContext {
    None,
    Filter(PresetFilter),
    Apply(PendingApply),
}

#[derive(Debug, Clone, PartialEq)]
pub enum PresetDbUpdate {
    Presets(Vec<PresetInfo>),
    ApplyValues {
        variable_name: String,
        values: Vec<PresetValue>,
        mode: ApplyMode,
    },
}

#[derive(Debug, Default)]
pub struct PresetDb {
    last_filter: Option<PresetFilter>,
    /// Filter to restore if the job that replaced it fails
    rollback: Option<Option<PresetFilter>>,
}

impl PresetDb {
    /// Filter of the most recent list (or save) request
    pub fn last_filter(&self) -> Option<&PresetFilter> {
        self.last_filter.as_ref()
    }

    fn op(mode: PresetDbMode) -> Operation {
        match mode {
            PresetDbMode::List => Operation::PresetDbList,
            PresetDbMode::Get => Operation::PresetDbGet,
            PresetDbMode::Save => Operation::PresetDbSave,
            PresetDbMode::Delete => Operation::PresetDbDelete,
        }
    }

    fn relist(&self) -> Option<PresetDbCommand> {
        self.last_filter.clone().map(PresetDbCommand::List)
    }
}

fn non_blank(text: Option<String>) -> Option<String> {
    text.map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty())
}

impl JobDomain for PresetDb {
    type Command = PresetDbCommand;
    type Mode = PresetDbMode;
    type Context = PresetDbContext;
    type Update = PresetDbUpdate;

    const LABEL: &'static str = "preset DB";

    fn prepare(
        &self,
        command: PresetDbCommand,
    ) -> Result<Prepared<PresetDbMode, PresetDbContext>, String> {
        let mut payload = Map::new();
        let (mode, context, status) = match command {
            PresetDbCommand::List(filter) => {
                let filter = PresetFilter {
                    variable_name: non_blank(filter.variable_name),
                    source_kind: non_blank(filter.source_kind),
                };
                insert_opt(&mut payload, "variable_name", filter.variable_name.clone());
                insert_opt(&mut payload, "source_kind", filter.source_kind.clone());
                (PresetDbMode::List, PresetDbContext::Filter(filter), "Loading preset list...")
            }
            PresetDbCommand::Get {
                id,
                variable_name,
                mode,
            } => {
                let variable_name = variable_name.trim().to_string();
                if variable_name.is_empty() {
                    return Err("Select a variable.".to_string());
                }
                payload.insert("id".to_string(), json!(id));
                let pending = PendingApply { variable_name, mode };
                (PresetDbMode::Get, PresetDbContext::Apply(pending), "Loading preset...")
            }
            PresetDbCommand::Save(draft) => {
                let name = draft.name.trim().to_string();
                if name.is_empty() {
                    return Err("Enter a preset name.".to_string());
                }
                insert_opt(&mut payload, "id", draft.id);
                payload.insert("name".to_string(), json!(name));
                payload.insert("source_kind".to_string(), json!(draft.source_kind));
                payload.insert("variable_name".to_string(), json!(draft.variable_name));
                payload.insert(
                    "preset".to_string(),
                    json!({
                        "name": name,
                        "source_kind": draft.source_kind,
                        "variable_name": draft.variable_name,
                        "values": draft.values,
                    }),
                );
                let filter = PresetFilter {
                    variable_name: Some(draft.variable_name),
                    source_kind: Some(draft.source_kind),
                };
                (PresetDbMode::Save, PresetDbContext::Filter(filter), "Saving preset...")
            }
            PresetDbCommand::Delete { id } => {
                payload.insert("id".to_string(), json!(id));
                (PresetDbMode::Delete, PresetDbContext::None, "Deleting preset...")
            }
        };

        Ok(Prepared {
            mode,
            op: Self::op(mode),
            payload,
            context,
            status: status.to_string(),
        })
    }

    fn accepted(&mut self, mode: PresetDbMode, context: &PresetDbContext) -> Vec<PresetDbUpdate> {
        if let (PresetDbMode::List | PresetDbMode::Save, PresetDbContext::Filter(filter)) =
            (mode, context)
        {
            debug!("Remembering preset list filter {:?}", filter);
            let previous = self.last_filter.replace(filter.clone());
            self.rollback = Some(previous);
        }
        Vec::new()
    }

    fn failed(&mut self, _mode: PresetDbMode, _context: PresetDbContext) -> Vec<PresetDbUpdate> {
        if let Some(previous) = self.rollback.take() {
            debug!("Restoring preset list filter {:?}", previous);
            self.last_filter = previous;
        }
        Vec::new()
    }

    fn complete(
        &mut self,
        mode: PresetDbMode,
        context: PresetDbContext,
        done: Done<'_>,
    ) -> Completion<PresetDbUpdate, PresetDbCommand> {
        let op = Self::op(mode);
        self.rollback = None;
        match mode {
            PresetDbMode::List => match decode_result::<PresetDbListResult>(op, done.payload) {
                Ok(result) => Completion::new("Preset list loaded.")
                    .with_update(PresetDbUpdate::Presets(result.presets)),
                Err(e) => {
                    warn!("{}", e);
                    Completion::new(NOT_FOUND)
                }
            },
            PresetDbMode::Get => {
                let PresetDbContext::Apply(pending) = context else {
                    warn!("{} finished without a target variable", op);
                    return Completion::new(NOT_FOUND);
                };
                match decode_result::<PresetDbGetResult>(op, done.payload) {
                    Ok(result) => {
                        Completion::new("Preset applied.").with_update(PresetDbUpdate::ApplyValues {
                            variable_name: pending.variable_name,
                            values: result.payload.values,
                            mode: pending.mode,
                        })
                    }
                    Err(e) => {
                        warn!("{}", e);
                        Completion::new(NOT_FOUND)
                    }
                }
            }
            PresetDbMode::Save => Completion::new("Preset saved.").with_follow_up(self.relist()),
            PresetDbMode::Delete => {
                Completion::new("Preset deleted.").with_follow_up(self.relist())
            }
        }
    }
}
