//! Application store
//!
//! Everything the managers report lands here: status text, the log, the
//! template being edited, database listings and the pipeline job panel.

use crate::jobs::pipeline::{PipelineUpdate, ResultRecord};
use crate::jobs::preset_db::PresetDbUpdate;
use crate::jobs::preset_file::PresetFileUpdate;
use crate::jobs::template_db::TemplateDbUpdate;
use crate::jobs::template_file::TemplateFileUpdate;
use crate::jobs::{JobSink, StatusSink};
use nai_common::ipc::Operation;
use nai_common::preset::{PresetInfo, TemplateInfo};
use nai_common::progress::{format_eta, JobProgress, JobStats};
use nai_common::tags::{
    detect_conflicts, find_common_tags, find_tag_conflicts, strip_tags, ConflictSummary,
    TagConflict,
};
use nai_common::{ApplyMode, Preset, PresetValue};
use serde::Serialize;
use std::collections::VecDeque;
use tracing::debug;

/// Oldest lines are dropped past this many
pub const MAX_LOG_LINES: usize = 1000;

/// Pipeline job shown in the job panel
#[derive(Debug, Clone, Default, Serialize)]
pub struct JobPanel {
    /// Operation currently running
    pub active: Option<Operation>,
    pub progress: Option<JobProgress>,
    pub stats: JobStats,
    pub results: Vec<ResultRecord>,
    pub progress_text: String,
    /// Tags shared by every value of the last `build_nais` run
    pub common_tags: Vec<String>,
    /// Variable the built values went into
    pub built_variable: Option<String>,
}

impl JobPanel {
    fn refresh_text(&mut self) {
        let Some(progress) = &self.progress else {
            self.progress_text.clear();
            return;
        };
        self.progress_text = format!(
            "{}/{} ({:.0}%) errors {} skipped {} ETA {}",
            progress.processed,
            progress.total,
            progress.percent(),
            progress.errors,
            progress.skipped,
            format_eta(progress)
        );
    }
}

/// Tag problems within one variable
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct VariableReport {
    pub variable: String,
    pub conflicts: ConflictSummary,
    pub tag_conflicts: Vec<TagConflict>,
    pub common_tags: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AppState {
    pub status: String,
    pub log: VecDeque<String>,
    pub template: Preset,
    pub templates: Vec<TemplateInfo>,
    pub presets: Vec<PresetInfo>,
    pub selected_template: Option<String>,
    pub preset_path: Option<String>,
    pub job: JobPanel,
}

impl Default for AppState {
    fn default() -> Self {
        Self {
            status: "Idle".to_string(),
            log: VecDeque::new(),
            template: Preset::default(),
            templates: Vec::new(),
            presets: Vec::new(),
            selected_template: None,
            preset_path: None,
            job: JobPanel::default(),
        }
    }
}

impl AppState {
    fn apply_values(&mut self, variable_name: &str, values: Vec<PresetValue>, mode: ApplyMode) {
        debug!("Applying {} values to {} ({:?})", values.len(), variable_name, mode);
        self.template.apply_values(variable_name, values, mode);
    }

    /// Tag analysis of every variable in the current template
    pub fn analyze_template(&self) -> Vec<VariableReport> {
        self.template
            .variables
            .iter()
            .map(|variable| VariableReport {
                variable: variable.name.clone(),
                conflicts: detect_conflicts(&variable.values),
                tag_conflicts: find_tag_conflicts(&variable.values),
                common_tags: find_common_tags(&variable.values),
            })
            .collect()
    }

    /// Remove `tags` from every value of a variable.
    ///
    /// Returns `false` when the template has no such variable.
    pub fn strip_variable_tags(&mut self, variable_name: &str, tags: &[String]) -> bool {
        let Some(variable) = self
            .template
            .variables
            .iter_mut()
            .find(|variable| variable.name == variable_name)
        else {
            return false;
        };
        variable.values = strip_tags(&variable.values, tags);
        true
    }
}

impl StatusSink for AppState {
    fn set_status(&mut self, text: &str) {
        self.status = text.to_string();
    }

    fn append_log(&mut self, text: &str) {
        if self.log.len() == MAX_LOG_LINES {
            self.log.pop_front();
        }
        self.log.push_back(text.to_string());
    }
}

impl JobSink<TemplateDbUpdate> for AppState {
    fn apply(&mut self, update: TemplateDbUpdate) {
        match update {
            TemplateDbUpdate::Templates(templates) => self.templates = templates,
            TemplateDbUpdate::Template(template) => self.template = template,
            TemplateDbUpdate::SelectedName(name) => self.selected_template = Some(name),
        }
    }
}

impl JobSink<PresetDbUpdate> for AppState {
    fn apply(&mut self, update: PresetDbUpdate) {
        match update {
            PresetDbUpdate::Presets(presets) => self.presets = presets,
            PresetDbUpdate::ApplyValues {
                variable_name,
                values,
                mode,
            } => self.apply_values(&variable_name, values, mode),
        }
    }
}

impl JobSink<TemplateFileUpdate> for AppState {
    fn apply(&mut self, update: TemplateFileUpdate) {
        match update {
            TemplateFileUpdate::Template(template) => self.template = template,
            TemplateFileUpdate::Path(path) => self.preset_path = Some(path),
        }
    }
}

impl JobSink<PresetFileUpdate> for AppState {
    fn apply(&mut self, update: PresetFileUpdate) {
        match update {
            PresetFileUpdate::ApplyValues {
                variable_name,
                values,
                mode,
            } => self.apply_values(&variable_name, values, mode),
        }
    }
}

impl JobSink<PipelineUpdate> for AppState {
    fn apply(&mut self, update: PipelineUpdate) {
        let job = &mut self.job;
        match update {
            PipelineUpdate::Started { op, started_at } => {
                *job = JobPanel {
                    active: Some(op),
                    progress: Some(JobProgress::started(started_at)),
                    ..JobPanel::default()
                };
            }
            PipelineUpdate::Progress {
                processed,
                total,
                errors,
                skipped,
            } => {
                if let Some(progress) = &mut job.progress {
                    progress.processed = processed;
                    progress.total = total;
                    progress.errors = errors;
                    progress.skipped = skipped;
                }
            }
            PipelineUpdate::Result(record) => {
                job.stats.record(record.status);
                job.results.push(record);
            }
            PipelineUpdate::ApplyValues {
                variable_name,
                values,
                mode,
            } => {
                self.apply_values(&variable_name, values, mode);
                return;
            }
            PipelineUpdate::CommonTags {
                variable_name,
                tags,
            } => {
                job.common_tags = tags;
                job.built_variable = variable_name;
            }
            PipelineUpdate::Finished {
                processed,
                errors,
                skipped,
                ..
            } => {
                job.active = None;
                if let Some(progress) = &mut job.progress {
                    progress.processed = processed;
                    progress.total = progress.total.max(processed);
                    progress.errors = errors;
                    progress.skipped = skipped;
                }
            }
            PipelineUpdate::Failed => job.active = None,
        }
        self.job.refresh_text();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use nai_common::progress::ResultStatus;
    use nai_common::PresetVariable;

    fn state_with_hair(values: Vec<PresetValue>) -> AppState {
        let mut state = AppState::default();
        state.template.variables.push(PresetVariable {
            name: "hair".into(),
            values,
        });
        state
    }

    #[test]
    fn test_log_is_bounded() {
        let mut state = AppState::default();
        for i in 0..(MAX_LOG_LINES + 5) {
            state.append_log(&format!("line {i}"));
        }
        assert_eq!(state.log.len(), MAX_LOG_LINES);
        assert_eq!(state.log.front().map(String::as_str), Some("line 5"));
    }

    #[test]
    fn test_apply_values_append_renames() {
        let mut state = state_with_hair(vec![PresetValue::new("red", ["red hair"])]);
        state.apply(PresetDbUpdate::ApplyValues {
            variable_name: "hair".into(),
            values: vec![PresetValue::new("red", ["crimson hair"])],
            mode: ApplyMode::Append,
        });

        let names: Vec<&str> = state.template.variables[0]
            .values
            .iter()
            .map(|value| value.name.as_str())
            .collect();
        assert_eq!(names, vec!["red", "red_2"]);
    }

    #[test]
    fn test_apply_values_creates_variable() {
        let mut state = AppState::default();
        state.apply(PresetFileUpdate::ApplyValues {
            variable_name: "eyes".into(),
            values: vec![PresetValue::new("blue", ["blue eyes"])],
            mode: ApplyMode::Replace,
        });
        assert_eq!(state.template.variables[0].name, "eyes");
    }

    #[test]
    fn test_pipeline_panel() {
        let mut state = AppState::default();
        state.apply(PipelineUpdate::Started {
            op: Operation::Rename,
            started_at: Utc::now(),
        });
        state.apply(PipelineUpdate::Progress {
            processed: 5,
            total: 10,
            errors: 1,
            skipped: 0,
        });
        state.apply(PipelineUpdate::Result(ResultRecord {
            status: ResultStatus::Ok,
            source: Some("a.png".into()),
            target: None,
            message: None,
            preview: None,
        }));

        assert_eq!(state.job.active, Some(Operation::Rename));
        assert_eq!(state.job.stats.ok, 1);
        assert!(state.job.progress_text.starts_with("5/10 (50%)"));

        state.apply(PipelineUpdate::Finished {
            processed: 10,
            errors: 1,
            skipped: 0,
            cancelled: false,
        });
        assert_eq!(state.job.active, None);
        assert!(state.job.progress_text.starts_with("10/10 (100%)"));
        assert!(state.job.progress_text.ends_with("ETA 00:00:00"));
    }

    #[test]
    fn test_build_updates_template_and_panel() {
        let mut state = state_with_hair(vec![PresetValue::new("old", ["black hair"])]);
        state.apply(PipelineUpdate::Started {
            op: Operation::BuildNais,
            started_at: Utc::now(),
        });
        state.apply(PipelineUpdate::CommonTags {
            variable_name: Some("hair".into()),
            tags: vec!["1girl".into()],
        });
        state.apply(PipelineUpdate::ApplyValues {
            variable_name: "hair".into(),
            values: vec![
                PresetValue::new("a", ["1girl", "red hair"]),
                PresetValue::new("a", ["1girl", "blue hair"]),
            ],
            mode: ApplyMode::Replace,
        });

        assert_eq!(state.job.common_tags, vec!["1girl"]);
        assert_eq!(state.job.built_variable.as_deref(), Some("hair"));
        let hair = &state.template.variables[0];
        assert_eq!(hair.values.len(), 2);
        assert_eq!(hair.values[1].name, "a_2");

        let common = state.job.common_tags.clone();
        assert!(state.strip_variable_tags("hair", &common));
        assert_eq!(state.template.variables[0].values[0].tags, vec!["red hair"]);
    }

    #[test]
    fn test_analyze_and_strip() {
        let mut state = state_with_hair(vec![
            PresetValue::new("a", ["girl", "red hair"]),
            PresetValue::new("b", ["girl", "-red hair"]),
        ]);

        let reports = state.analyze_template();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].common_tags, vec!["girl"]);
        assert_eq!(reports[0].tag_conflicts[0].tag, "red hair");

        assert!(state.strip_variable_tags("hair", &reports[0].common_tags));
        assert_eq!(state.template.variables[0].values[0].tags, vec!["red hair"]);
        assert!(!state.strip_variable_tags("eyes", &[]));
    }
}
