//! Client facade: owns the store, the transport and one manager per domain

use crate::jobs::pipeline::{Pipeline, PipelineCommand};
use crate::jobs::preset_db::{PresetDb, PresetDbCommand};
use crate::jobs::preset_file::{PresetFile, PresetFileCommand};
use crate::jobs::template_db::{TemplateDb, TemplateDbCommand};
use crate::jobs::template_file::{TemplateFile, TemplateFileCommand};
use crate::jobs::{JobManager, StatusSink};
use crate::router::{route, MessageHandler, Routed};
use crate::state::AppState;
use crate::transport::{InboundFrame, Transport};
use nai_common::ipc::{decode_frame, JobMessage};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, warn};

pub struct Client<T: Transport> {
    pub state: AppState,
    transport: T,
    template_db: JobManager<TemplateDb>,
    preset_db: JobManager<PresetDb>,
    template_file: JobManager<TemplateFile>,
    preset_file: JobManager<PresetFile>,
    pipeline: JobManager<Pipeline>,
}

impl<T: Transport> Client<T> {
    pub fn new(transport: T) -> Self {
        Self {
            state: AppState::default(),
            transport,
            template_db: JobManager::new(TemplateDb),
            preset_db: JobManager::new(PresetDb::default()),
            template_file: JobManager::new(TemplateFile),
            preset_file: JobManager::new(PresetFile),
            pipeline: JobManager::new(Pipeline),
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn template_db(&mut self, command: TemplateDbCommand) {
        self.template_db.run(command, &self.transport, &mut self.state);
    }

    pub fn preset_db(&mut self, command: PresetDbCommand) {
        self.preset_db.run(command, &self.transport, &mut self.state);
    }

    pub fn template_file(&mut self, command: TemplateFileCommand) {
        self.template_file.run(command, &self.transport, &mut self.state);
    }

    /// Save the template currently held in the store to `path`.
    pub fn save_template_file(&mut self, path: impl Into<String>) {
        let template = self.state.template.clone();
        self.template_file(TemplateFileCommand::Save {
            path: path.into(),
            template,
        });
    }

    /// Save the template currently held in the store to the database.
    pub fn save_template_db(&mut self, name: Option<String>) {
        let template = self.state.template.clone();
        self.template_db(TemplateDbCommand::Save { template, name });
    }

    pub fn preset_file(&mut self, command: PresetFileCommand) {
        self.preset_file.run(command, &self.transport, &mut self.state);
    }

    pub fn pipeline(&mut self, command: PipelineCommand) {
        self.pipeline.run(command, &self.transport, &mut self.state);
    }

    pub fn cancel_pipeline(&mut self) {
        self.pipeline.cancel(&self.transport, &mut self.state);
    }

    /// Whether no manager is waiting on a job
    pub fn is_idle(&self) -> bool {
        self.template_db.is_idle()
            && self.preset_db.is_idle()
            && self.template_file.is_idle()
            && self.preset_file.is_idle()
            && self.pipeline.is_idle()
    }

    /// Route one decoded message to its manager.
    pub fn handle_message(&mut self, message: &JobMessage) -> Routed {
        let mut handlers: [&mut dyn MessageHandler<AppState>; 5] = [
            &mut self.template_db,
            &mut self.preset_db,
            &mut self.template_file,
            &mut self.preset_file,
            &mut self.pipeline,
        ];
        route(&mut handlers, message, &self.transport, &mut self.state)
    }

    /// Decode and route one raw frame.
    ///
    /// Undecodable frames are logged, never fatal.
    pub fn handle_frame(&mut self, frame: InboundFrame) {
        let message = match frame {
            InboundFrame::Log(text) => JobMessage::log(text),
            InboundFrame::Message(text) => match decode_frame(&text) {
                Ok(Some(message)) => message,
                Ok(None) => return,
                Err(e) => {
                    warn!("Undecodable frame: {}", e);
                    JobMessage::log(e.to_string())
                }
            },
        };
        self.handle_message(&message);
    }

    /// Feed frames until every manager is idle.
    ///
    /// Returns `false` if `limit` passed or the frame stream ended first.
    pub async fn pump_until_idle(
        &mut self,
        frames: &mut mpsc::UnboundedReceiver<InboundFrame>,
        limit: Duration,
    ) -> bool {
        let deadline = tokio::time::Instant::now() + limit;
        while !self.is_idle() {
            match tokio::time::timeout_at(deadline, frames.recv()).await {
                Ok(Some(frame)) => self.handle_frame(frame),
                Ok(None) => {
                    warn!("Worker output closed with jobs outstanding");
                    self.state.append_log("worker exited");
                    return false;
                }
                Err(_) => {
                    debug!("Timed out waiting for outstanding jobs");
                    return false;
                }
            }
        }
        true
    }
}
