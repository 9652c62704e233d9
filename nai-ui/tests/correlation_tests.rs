//! End-to-end correlation tests against an in-process fake worker
//!
//! The fake worker drains the request channel and answers on the frame
//! channel the same way the sidecar does: an `ack`, optional progress, then
//! exactly one terminal message per request.

use nai_common::ipc::{JobRequest, Operation, RequestType};
use nai_common::{ApplyMode, PresetValue};
use nai_ui::jobs::pipeline::PipelineCommand;
use nai_ui::jobs::preset_db::{PresetDbCommand, PresetFilter};
use nai_ui::jobs::preset_file::PresetFileCommand;
use nai_ui::jobs::template_db::TemplateDbCommand;
use nai_ui::{ChannelTransport, Client, Disconnected, InboundFrame};
use serde_json::{json, Map, Value};
use std::time::Duration;
use tokio::sync::mpsc;

const LIMIT: Duration = Duration::from_secs(5);

fn frame(value: Value) -> InboundFrame {
    InboundFrame::Message(value.to_string())
}

/// Answer every request according to `respond`
fn spawn_worker<F>(
    mut requests: mpsc::UnboundedReceiver<JobRequest>,
    frames: mpsc::UnboundedSender<InboundFrame>,
    respond: F,
) where
    F: Fn(&JobRequest) -> Vec<Value> + Send + 'static,
{
    tokio::spawn(async move {
        while let Some(request) = requests.recv().await {
            let _ = frames.send(frame(json!({"id": request.id, "type": "ack", "op": request.op})));
            for message in respond(&request) {
                if frames.send(frame(message)).is_err() {
                    return;
                }
            }
        }
    });
}

fn database(request: &JobRequest) -> Vec<Value> {
    let payload = match request.op {
        Operation::TemplateDbList => json!({"templates": [{"id": 1, "name": "base"}]}),
        Operation::TemplateDbSave => json!({"name": request.payload["name"]}),
        Operation::PresetDbList => json!({"presets": [
            {"id": 7, "name": "reds", "source_kind": "nais", "variable_name": "hair"}
        ]}),
        Operation::PresetDbGet => json!({"id": 7, "payload": {"values": [
            {"name": "red", "tags": ["red hair"]},
            {"name": "crimson", "tags": ["red hair", "dark"]}
        ]}}),
        Operation::PresetImport => {
            json!({"values": [{"name": "red", "tags": ["scarlet hair"]}]})
        }
        Operation::BuildNais => {
            return vec![
                json!({"id": request.id, "type": "log", "message": "reading 2 images"}),
                json!({"id": request.id, "type": "done", "processed": 2, "payload": {
                    "variable_name": "outfit",
                    "values": [
                        {"name": "a", "tags": ["1girl", "coat", " coat"]},
                        {"name": "a", "tags": ["1girl", "dress"]}
                    ],
                    "common_tags": ["1girl"]
                }}),
            ]
        }
        _ => return vec![json!({"id": request.id, "type": "error", "message": "unsupported"})],
    };
    vec![json!({"id": request.id, "type": "done", "payload": payload})]
}

#[tokio::test]
async fn test_save_then_relist_round_trip() {
    let (transport, requests) = ChannelTransport::new();
    let (frames_tx, mut frames) = mpsc::unbounded_channel();
    spawn_worker(requests, frames_tx, database);

    let mut client = Client::new(transport);
    client.state.template.name = "night".to_string();
    client.save_template_db(None);

    assert!(client.pump_until_idle(&mut frames, LIMIT).await);
    assert_eq!(client.state.selected_template.as_deref(), Some("night"));
    assert_eq!(client.state.templates.len(), 1);
    assert_eq!(client.state.status, "Template list loaded.");
}

#[tokio::test]
async fn test_presets_apply_into_template() {
    let (transport, requests) = ChannelTransport::new();
    let (frames_tx, mut frames) = mpsc::unbounded_channel();
    spawn_worker(requests, frames_tx, database);

    let mut client = Client::new(transport);
    client.preset_db(PresetDbCommand::List(PresetFilter {
        variable_name: Some("hair".into()),
        source_kind: None,
    }));
    client.preset_db(PresetDbCommand::Get {
        id: 7,
        variable_name: "hair".into(),
        mode: ApplyMode::Replace,
    });
    // Second call overlaps the first and is rejected
    assert_eq!(client.state.status, "preset DB job already running");
    assert!(client.pump_until_idle(&mut frames, LIMIT).await);
    assert_eq!(client.state.presets[0].id, 7);
    assert!(client.state.template.variable("hair").is_none());

    client.preset_db(PresetDbCommand::Get {
        id: 7,
        variable_name: "hair".into(),
        mode: ApplyMode::Replace,
    });
    assert!(client.pump_until_idle(&mut frames, LIMIT).await);
    assert_eq!(client.state.status, "Preset applied.");

    client.preset_file(PresetFileCommand::Import {
        path: "hair.txt".into(),
        variable_name: "hair".into(),
        mode: ApplyMode::Append,
    });
    assert!(client.pump_until_idle(&mut frames, LIMIT).await);

    let hair = client.state.template.variable("hair").expect("hair variable");
    assert_eq!(
        hair.values,
        vec![
            PresetValue::new("red", ["red hair"]),
            PresetValue::new("crimson", ["red hair", "dark"]),
            PresetValue::new("red_2", ["scarlet hair"]),
        ]
    );
}

#[tokio::test]
async fn test_pipeline_progress_and_cancel() {
    let (transport, mut requests) = ChannelTransport::new();
    let (frames_tx, mut frames) = mpsc::unbounded_channel();

    let mut client = Client::new(transport);
    let mut payload = Map::new();
    payload.insert("root".into(), json!("/images"));
    client.pipeline(PipelineCommand::new(Operation::Rename, payload));

    let run = requests.recv().await.expect("run request");
    assert_eq!(run.kind, RequestType::Run);
    frames_tx
        .send(frame(json!({"id": run.id, "type": "progress", "processed": 1, "total": 4})))
        .unwrap();
    frames_tx
        .send(frame(json!({
            "id": run.id,
            "type": "result",
            "status": "OK",
            "source": "a.png",
            "target": "b.png"
        })))
        .unwrap();
    frames_tx.send(frame(json!({"type": "ping"}))).unwrap();

    // Nothing terminal yet: the pump gives up at the deadline
    assert!(!client.pump_until_idle(&mut frames, Duration::from_millis(50)).await);
    assert_eq!(client.state.job.active, Some(Operation::Rename));
    assert_eq!(client.state.job.stats.ok, 1);
    assert!(client.state.job.progress_text.starts_with("1/4 (25%)"));

    client.cancel_pipeline();
    let cancel = requests.recv().await.expect("cancel request");
    assert_eq!(cancel.kind, RequestType::Cancel);
    assert_eq!(cancel.id, run.id);

    frames_tx
        .send(frame(json!({"id": run.id, "type": "done", "processed": 1, "cancelled": true})))
        .unwrap();
    assert!(client.pump_until_idle(&mut frames, LIMIT).await);
    assert_eq!(client.state.status, "rename cancelled.");
    assert_eq!(client.state.job.active, None);
}

#[tokio::test]
async fn test_stale_and_foreign_messages_are_ignored() {
    let (transport, mut requests) = ChannelTransport::new();
    let (frames_tx, mut frames) = mpsc::unbounded_channel();

    let mut client = Client::new(transport);
    client.template_db(TemplateDbCommand::List);
    let list = requests.recv().await.expect("list request");

    frames_tx
        .send(frame(json!({"id": "someone-else", "type": "done", "payload": {"templates": []}})))
        .unwrap();
    frames_tx.send(InboundFrame::Message("garbage".into())).unwrap();
    frames_tx
        .send(frame(json!({"id": "stale-1", "type": "error", "message": "worker crashed"})))
        .unwrap();
    frames_tx
        .send(frame(json!({
            "id": list.id,
            "type": "done",
            "payload": {"templates": [{"id": 2, "name": "x"}]}
        })))
        .unwrap();
    // Duplicate terminal message after the session closed
    frames_tx
        .send(frame(json!({"id": list.id, "type": "done", "payload": {"templates": []}})))
        .unwrap();

    assert!(client.pump_until_idle(&mut frames, LIMIT).await);
    // Drain the duplicate too
    while let Ok(frame) = frames.try_recv() {
        client.handle_frame(frame);
    }

    assert_eq!(client.state.templates.len(), 1);
    assert_eq!(client.state.log.len(), 2);
    assert!(client.state.log[0].starts_with("JSON error"));
    assert_eq!(client.state.log[1], "error: worker crashed (job stale-1)");
}

#[tokio::test]
async fn test_build_values_land_in_template() {
    let (transport, requests) = ChannelTransport::new();
    let (frames_tx, mut frames) = mpsc::unbounded_channel();
    spawn_worker(requests, frames_tx, database);

    let mut client = Client::new(transport);
    let mut payload = Map::new();
    payload.insert("folder".into(), json!("/images/outfits"));
    client.pipeline(PipelineCommand::new(Operation::BuildNais, payload));
    assert!(client.pump_until_idle(&mut frames, LIMIT).await);

    assert_eq!(client.state.log, ["reading 2 images"]);
    assert_eq!(client.state.job.common_tags, vec!["1girl"]);
    assert_eq!(client.state.job.built_variable.as_deref(), Some("outfit"));
    let outfit = client.state.template.variable("outfit").expect("outfit variable");
    assert_eq!(
        outfit.values,
        vec![
            PresetValue::new("a", ["1girl", "coat"]),
            PresetValue::new("a_2", ["1girl", "dress"]),
        ]
    );
    assert!(client.state.status.ends_with("Applied 2 values to outfit."));
}

#[test]
fn test_browser_mode_sends_nothing() {
    let mut client = Client::new(Disconnected);
    client.template_db(TemplateDbCommand::List);
    client.preset_file(PresetFileCommand::Import {
        path: "hair.txt".into(),
        variable_name: "hair".into(),
        mode: ApplyMode::Append,
    });

    assert!(client.is_idle());
    assert_eq!(client.state.status, "not available in browser mode");
    assert_eq!(client.state.log.len(), 2);
    assert_eq!(client.state.template.variables.len(), 0);
}
