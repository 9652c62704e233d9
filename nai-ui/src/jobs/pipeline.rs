//! Long-running pipeline jobs (scan, search, rename, ...)
//!
//! Unlike the database and file domains these jobs stream `progress` and
//! `result` messages before finishing; the domain turns them into job panel
//! updates. A finished `build_nais` job also carries values, which are merged
//! into a template variable along with the tags they all share.

use super::{Completion, Done, JobDomain, PendingApply, Prepared};
use chrono::{DateTime, Utc};
use nai_common::ipc::{decode_result, BuildNaisResult, JobMessage, Operation};
use nai_common::preset::coerce_values;
use nai_common::progress::ResultStatus;
use nai_common::tags::normalize_tags;
use nai_common::{ApplyMode, PresetValue};
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, warn};

/// Operations this domain runs
pub const PIPELINE_OPS: [Operation; 7] = [
    Operation::Scan,
    Operation::Search,
    Operation::DbStats,
    Operation::Rename,
    Operation::Move,
    Operation::StripSuffix,
    Operation::BuildNais,
];

pub fn is_pipeline_op(op: Operation) -> bool {
    PIPELINE_OPS.contains(&op)
}

#[derive(Debug, Clone, PartialEq)]
pub struct PipelineCommand {
    pub op: Operation,
    /// Passed through to the worker as-is
    pub payload: Map<String, Value>,
    /// Where built values go; defaults to the variable the worker names
    pub apply: Option<PendingApply>,
}

impl PipelineCommand {
    pub fn new(op: Operation, payload: Map<String, Value>) -> Self {
        Self {
            op,
            payload,
            apply: None,
        }
    }
}

/// Outcome of one file as reported by a `result` message
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultRecord {
    pub status: ResultStatus,
    pub source: Option<String>,
    pub target: Option<String>,
    pub message: Option<String>,
    pub preview: Option<String>,
}

impl ResultRecord {
    /// One-line summary for the result list
    pub fn text(&self) -> String {
        let mut text = self.source.clone().unwrap_or_default();
        if let Some(target) = &self.target {
            text.push_str(" -> ");
            text.push_str(target);
        }
        if let Some(message) = self.message.as_deref().filter(|m| !m.is_empty()) {
            if !text.is_empty() {
                text.push_str(": ");
            }
            text.push_str(message);
        }
        text
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PipelineUpdate {
    Started {
        op: Operation,
        started_at: DateTime<Utc>,
    },
    Progress {
        processed: u64,
        total: u64,
        errors: u64,
        skipped: u64,
    },
    Result(ResultRecord),
    /// Values built by `build_nais`
    ApplyValues {
        variable_name: String,
        values: Vec<PresetValue>,
        mode: ApplyMode,
    },
    /// Tags shared by every built value
    CommonTags {
        variable_name: Option<String>,
        tags: Vec<String>,
    },
    Finished {
        processed: u64,
        errors: u64,
        skipped: u64,
        cancelled: bool,
    },
    Failed,
}

#[derive(Debug, Default)]
pub struct Pipeline;

impl JobDomain for Pipeline {
    type Command = PipelineCommand;
    type Mode = Operation;
    type Context = Option<PendingApply>;
    type Update = PipelineUpdate;

    const LABEL: &'static str = "pipeline";

    fn prepare(
        &self,
        command: PipelineCommand,
    ) -> Result<Prepared<Operation, Option<PendingApply>>, String> {
        if !is_pipeline_op(command.op) {
            return Err(format!("{} is not a pipeline operation.", command.op));
        }
        let apply = command.apply.and_then(|apply| {
            let variable_name = apply.variable_name.trim().to_string();
            (!variable_name.is_empty()).then_some(PendingApply {
                variable_name,
                mode: apply.mode,
            })
        });
        Ok(Prepared {
            mode: command.op,
            op: command.op,
            payload: command.payload,
            context: apply,
            status: format!("Running {}...", command.op),
        })
    }

    fn accepted(&mut self, op: Operation, _context: &Option<PendingApply>) -> Vec<PipelineUpdate> {
        vec![PipelineUpdate::Started {
            op,
            started_at: Utc::now(),
        }]
    }

    fn observe(
        &mut self,
        _op: Operation,
        _context: &Option<PendingApply>,
        message: &JobMessage,
    ) -> Vec<PipelineUpdate> {
        match message {
            JobMessage::Progress {
                processed,
                total,
                errors,
                skipped,
                ..
            } => vec![PipelineUpdate::Progress {
                processed: *processed,
                total: *total,
                errors: *errors,
                skipped: *skipped,
            }],
            JobMessage::Result {
                status,
                source,
                target,
                message,
                preview,
                ..
            } => vec![PipelineUpdate::Result(ResultRecord {
                status: ResultStatus::parse(status.as_deref().unwrap_or_default()),
                source: source.clone(),
                target: target.clone(),
                message: message.clone(),
                preview: preview.clone(),
            })],
            _ => Vec::new(),
        }
    }

    fn complete(
        &mut self,
        op: Operation,
        apply: Option<PendingApply>,
        done: Done<'_>,
    ) -> Completion<PipelineUpdate, PipelineCommand> {
        let mut status = if done.cancelled {
            format!("{op} cancelled.")
        } else {
            format!(
                "{op} finished: {} processed, {} errors, {} skipped.",
                done.processed, done.errors, done.skipped
            )
        };

        let mut updates = Vec::new();
        if op == Operation::BuildNais && !done.cancelled {
            let note = built_values(apply, done.payload, &mut updates);
            status.push(' ');
            status.push_str(&note);
        }

        let mut completion = Completion::new(status);
        completion.updates = updates;
        completion.with_update(PipelineUpdate::Finished {
            processed: done.processed,
            errors: done.errors,
            skipped: done.skipped,
            cancelled: done.cancelled,
        })
    }

    fn failed(&mut self, _op: Operation, _context: Option<PendingApply>) -> Vec<PipelineUpdate> {
        vec![PipelineUpdate::Failed]
    }
}

/// Turn a `build_nais` payload into updates; returns a note for the status line.
fn built_values(
    apply: Option<PendingApply>,
    payload: Option<&Value>,
    updates: &mut Vec<PipelineUpdate>,
) -> String {
    let result = match decode_result::<BuildNaisResult>(Operation::BuildNais, payload) {
        Ok(result) => result,
        Err(e) => {
            warn!("{}", e);
            return "No values built.".to_string();
        }
    };

    let target = apply.or_else(|| {
        result
            .variable_name
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .map(|name| PendingApply {
                variable_name: name.to_string(),
                mode: ApplyMode::Replace,
            })
    });
    let variable_name = target.as_ref().map(|target| target.variable_name.clone());
    let common_tags = normalize_tags(&result.common_tags);
    if !common_tags.is_empty() {
        updates.push(PipelineUpdate::CommonTags {
            variable_name,
            tags: common_tags,
        });
    }

    let values = coerce_values(&result.values);
    if values.is_empty() {
        return "No values built.".to_string();
    }
    let Some(target) = target else {
        debug!("build_nais produced {} values without a target variable", values.len());
        return format!("{} values built; no variable to apply them to.", values.len());
    };

    let note = format!("Applied {} values to {}.", values.len(), target.variable_name);
    updates.push(PipelineUpdate::ApplyValues {
        variable_name: target.variable_name,
        values,
        mode: target.mode,
    });
    note
}
