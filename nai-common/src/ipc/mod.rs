//! IPC envelopes exchanged with the sidecar worker
//!
//! Requests go out as one JSON object per line; the worker answers with a
//! stream of [`JobMessage`]s tagged with the request's id.

// Sub-modules (supporting types)
mod message;
mod results;

pub use message::{decode_frame, JobMessage};
pub use results::{
    decode_result, BuildNaisResult, PresetDbGetResult, PresetDbListResult, PresetImportResult,
    PresetLoadResult, PresetRecord, PresetSaveResult, TemplateDbGetResult, TemplateDbListResult,
    TemplateDbSaveResult,
};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Protocol version stamped on every request.
pub const IPC_VERSION: u32 = 1;

/// Operations the worker understands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    TemplateDbList,
    TemplateDbGet,
    TemplateDbSave,
    TemplateDbDelete,
    PresetDbList,
    PresetDbGet,
    PresetDbSave,
    PresetDbDelete,
    PresetLoad,
    PresetSave,
    PresetImport,
    // Pipeline jobs
    Scan,
    Search,
    DbStats,
    Rename,
    Move,
    StripSuffix,
    BuildNais,
}

impl Operation {
    /// Wire name of the operation (`op` field)
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::TemplateDbList => "template_db_list",
            Operation::TemplateDbGet => "template_db_get",
            Operation::TemplateDbSave => "template_db_save",
            Operation::TemplateDbDelete => "template_db_delete",
            Operation::PresetDbList => "preset_db_list",
            Operation::PresetDbGet => "preset_db_get",
            Operation::PresetDbSave => "preset_db_save",
            Operation::PresetDbDelete => "preset_db_delete",
            Operation::PresetLoad => "preset_load",
            Operation::PresetSave => "preset_save",
            Operation::PresetImport => "preset_import",
            Operation::Scan => "scan",
            Operation::Search => "search",
            Operation::DbStats => "db_stats",
            Operation::Rename => "rename",
            Operation::Move => "move",
            Operation::StripSuffix => "strip_suffix",
            Operation::BuildNais => "build_nais",
        }
    }

    /// Kebab-case form used as a job id prefix (`template-db-list`)
    pub fn id_prefix(&self) -> String {
        self.as_str().replace('_', "-")
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Operation {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        serde_json::from_value(Value::String(s.to_string()))
            .map_err(|_| crate::Error::InvalidInput(format!("unknown operation: {s}")))
    }
}

/// Request kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestType {
    Run,
    Cancel,
}

/// Client → worker envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRequest {
    pub version: u32,
    pub id: String,
    #[serde(rename = "type")]
    pub kind: RequestType,
    pub op: Operation,
    #[serde(default)]
    pub payload: Map<String, Value>,
}

impl JobRequest {
    pub fn run(id: impl Into<String>, op: Operation, payload: Map<String, Value>) -> Self {
        Self {
            version: IPC_VERSION,
            id: id.into(),
            kind: RequestType::Run,
            op,
            payload,
        }
    }

    /// Cancel request for a job already in flight; reuses the job's id.
    pub fn cancel(id: impl Into<String>, op: Operation) -> Self {
        Self {
            version: IPC_VERSION,
            id: id.into(),
            kind: RequestType::Cancel,
            op,
            payload: Map::new(),
        }
    }

    /// Serialize as a single JSON line (without the trailing newline)
    pub fn to_line(&self) -> crate::Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_operation_wire_names() {
        assert_eq!(Operation::TemplateDbList.as_str(), "template_db_list");
        assert_eq!(Operation::PresetImport.to_string(), "preset_import");
        assert_eq!(Operation::StripSuffix.id_prefix(), "strip-suffix");
        assert_eq!(
            serde_json::to_value(Operation::PresetDbDelete).unwrap(),
            json!("preset_db_delete")
        );
    }

    #[test]
    fn test_operation_from_str() {
        assert_eq!("build_nais".parse::<Operation>().unwrap(), Operation::BuildNais);
        assert!(matches!(
            "format_disk".parse::<Operation>(),
            Err(crate::Error::InvalidInput(_))
        ));
    }

    #[test]
    fn test_run_request_envelope() {
        let mut payload = Map::new();
        payload.insert("name".to_string(), json!("base"));
        let request = JobRequest::run("template-db-get-1-0", Operation::TemplateDbGet, payload);

        let value: Value = serde_json::from_str(&request.to_line().unwrap()).unwrap();
        assert_eq!(
            value,
            json!({
                "version": 1,
                "id": "template-db-get-1-0",
                "type": "run",
                "op": "template_db_get",
                "payload": {"name": "base"}
            })
        );
    }

    #[test]
    fn test_cancel_request_envelope() {
        let request = JobRequest::cancel("scan-1-0", Operation::Scan);
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["type"], json!("cancel"));
        assert_eq!(value["id"], json!("scan-1-0"));
        assert_eq!(value["payload"], json!({}));
    }
}
