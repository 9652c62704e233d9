//! Job correlation managers
//!
//! Each backend domain (template DB, preset DB, template files, preset
//! imports, pipeline jobs) gets one [`JobManager`]. A manager holds at most one
//! outstanding job, tags its request with a fresh id and claims only the
//! messages carrying that id.
//!
//! The correlation logic itself is [`JobManager::transition`]: it takes one
//! [`JobEvent`], updates the session and returns [`Effect`]s. The driver
//! methods (`run`, `handle_message`, `cancel`) execute those effects against
//! a [`Transport`] and a sink.

pub mod pipeline;
pub mod preset_db;
pub mod preset_file;
pub mod session;
pub mod template_db;
pub mod template_file;

pub use session::{ActiveJob, JobIds, JobSession};

use crate::router::MessageHandler;
use crate::transport::Transport;
use nai_common::ipc::{JobMessage, JobRequest, Operation};
use nai_common::ApplyMode;
use serde_json::{Map, Value};
use std::collections::VecDeque;
use std::fmt::Debug;
use tracing::{debug, info, warn};

/// Receives status text and log lines.
pub trait StatusSink {
    fn set_status(&mut self, text: &str);
    fn append_log(&mut self, text: &str);
}

/// Receives the state updates of one domain.
pub trait JobSink<U>: StatusSink {
    fn apply(&mut self, update: U);
}

/// Values waiting to be merged into a template variable once they arrive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingApply {
    pub variable_name: String,
    pub mode: ApplyMode,
}

/// A validated command, ready to be sent
#[derive(Debug)]
pub struct Prepared<M, C> {
    pub mode: M,
    pub op: Operation,
    pub payload: Map<String, Value>,
    pub context: C,
    /// Status shown while the job runs
    pub status: String,
}

/// How a domain interprets a `done` message
#[derive(Debug)]
pub struct Completion<U, Cmd> {
    pub status: String,
    pub updates: Vec<U>,
    /// Command to run once the session is cleared
    pub follow_up: Option<Cmd>,
}

impl<U, Cmd> Completion<U, Cmd> {
    pub fn new(status: impl Into<String>) -> Self {
        Self {
            status: status.into(),
            updates: Vec::new(),
            follow_up: None,
        }
    }

    pub fn with_update(mut self, update: U) -> Self {
        self.updates.push(update);
        self
    }

    pub fn with_follow_up(mut self, command: Option<Cmd>) -> Self {
        self.follow_up = command;
        self
    }
}

/// Counters and payload of a `done` message
#[derive(Debug, Clone, Copy)]
pub struct Done<'a> {
    pub processed: u64,
    pub errors: u64,
    pub skipped: u64,
    pub cancelled: bool,
    pub payload: Option<&'a Value>,
}

/// Domain-specific half of a job manager
pub trait JobDomain {
    type Command: Debug;
    type Mode: Copy + Debug + PartialEq;
    type Context: Debug;
    type Update: Debug;

    /// Human-readable domain name used in status and log text
    const LABEL: &'static str;

    /// Validate a command and build its request.
    ///
    /// `Err` carries the status text shown to the user; nothing is sent.
    fn prepare(
        &self,
        command: Self::Command,
    ) -> Result<Prepared<Self::Mode, Self::Context>, String>;

    /// Called once the job's session is installed.
    fn accepted(&mut self, _mode: Self::Mode, _context: &Self::Context) -> Vec<Self::Update> {
        Vec::new()
    }

    /// Interpret the `done` message of a job.
    fn complete(
        &mut self,
        mode: Self::Mode,
        context: Self::Context,
        done: Done<'_>,
    ) -> Completion<Self::Update, Self::Command>;

    /// Look at a non-terminal message of the active job.
    fn observe(
        &mut self,
        _mode: Self::Mode,
        _context: &Self::Context,
        _message: &JobMessage,
    ) -> Vec<Self::Update> {
        Vec::new()
    }

    /// The job ended with an error or could not be sent.
    fn failed(&mut self, _mode: Self::Mode, _context: Self::Context) -> Vec<Self::Update> {
        Vec::new()
    }
}

/// Input of [`JobManager::transition`]
#[derive(Debug)]
pub enum JobEvent<'a, Cmd> {
    Start { command: Cmd, connected: bool },
    DispatchFailed { error: String },
    Message(&'a JobMessage),
}

/// Output of [`JobManager::transition`], executed in order by the driver
#[derive(Debug, Clone, PartialEq)]
pub enum Effect<U, Cmd> {
    Status(String),
    Log(String),
    Dispatch(JobRequest),
    Apply(U),
    FollowUp(Cmd),
}

/// Result of one transition
#[derive(Debug)]
pub struct Transition<U, Cmd> {
    /// Whether the event was a message owned by this manager
    pub claimed: bool,
    pub effects: Vec<Effect<U, Cmd>>,
}

impl<U, Cmd> Transition<U, Cmd> {
    fn local(effects: Vec<Effect<U, Cmd>>) -> Self {
        Self {
            claimed: false,
            effects,
        }
    }

    fn claimed(effects: Vec<Effect<U, Cmd>>) -> Self {
        Self {
            claimed: true,
            effects,
        }
    }
}

type EffectsOf<D> = Vec<Effect<<D as JobDomain>::Update, <D as JobDomain>::Command>>;

/// Single-flight job correlation for one domain
#[derive(Debug)]
pub struct JobManager<D: JobDomain> {
    domain: D,
    session: JobSession<D::Mode, D::Context>,
    ids: JobIds,
}

impl<D: JobDomain> JobManager<D> {
    pub fn new(domain: D) -> Self {
        Self {
            domain,
            session: JobSession::Idle,
            ids: JobIds::default(),
        }
    }

    pub fn domain(&self) -> &D {
        &self.domain
    }

    pub fn session(&self) -> &JobSession<D::Mode, D::Context> {
        &self.session
    }

    pub fn is_idle(&self) -> bool {
        self.session.is_idle()
    }

    pub fn active_job_id(&self) -> Option<&str> {
        self.session.job_id()
    }

    /// Apply one event to the session and return what should happen.
    pub fn transition(
        &mut self,
        event: JobEvent<'_, D::Command>,
    ) -> Transition<D::Update, D::Command> {
        match event {
            JobEvent::Start { command, connected } => {
                Transition::local(self.start(command, connected))
            }
            JobEvent::DispatchFailed { error } => Transition::local(self.dispatch_failed(error)),
            JobEvent::Message(message) => self.receive(message),
        }
    }

    fn start(&mut self, command: D::Command, connected: bool) -> EffectsOf<D> {
        if !connected {
            return vec![
                Effect::Status("not available in browser mode".to_string()),
                Effect::Log(format!("{} request skipped: IPC unavailable", D::LABEL)),
            ];
        }

        let prepared = match self.domain.prepare(command) {
            Ok(prepared) => prepared,
            Err(status) => {
                debug!("{} command rejected: {}", D::LABEL, status);
                return vec![Effect::Status(status)];
            }
        };

        if let Some(active) = self.session.active() {
            warn!(
                "{} job {} still running, rejecting {}",
                D::LABEL,
                active.job_id,
                prepared.op
            );
            return vec![
                Effect::Status(format!("{} job already running", D::LABEL)),
                Effect::Log(format!(
                    "{} request {} rejected: job {} still running",
                    D::LABEL,
                    prepared.op,
                    active.job_id
                )),
            ];
        }

        let job_id = self.ids.next(prepared.op);
        let request = JobRequest::run(job_id.clone(), prepared.op, prepared.payload);
        info!("Dispatching {} job {}", prepared.op, job_id);

        let updates = self.domain.accepted(prepared.mode, &prepared.context);
        self.session = JobSession::AwaitingResponse(ActiveJob {
            job_id,
            op: prepared.op,
            mode: prepared.mode,
            context: prepared.context,
        });

        let mut effects: EffectsOf<D> = updates.into_iter().map(Effect::Apply).collect();
        effects.push(Effect::Status(prepared.status));
        effects.push(Effect::Dispatch(request));
        effects
    }

    fn dispatch_failed(&mut self, error: String) -> EffectsOf<D> {
        let text = format!("error: {error}");
        let Some(job) = self.session.take() else {
            return vec![Effect::Status(text.clone()), Effect::Log(text)];
        };
        warn!("Dispatch of {} job {} failed: {}", job.op, job.job_id, error);

        let mut effects: EffectsOf<D> = self
            .domain
            .failed(job.mode, job.context)
            .into_iter()
            .map(Effect::Apply)
            .collect();
        effects.push(Effect::Status(text.clone()));
        effects.push(Effect::Log(text));
        effects
    }

    fn receive(&mut self, message: &JobMessage) -> Transition<D::Update, D::Command> {
        if !self.session.owns(message.id()) {
            return Transition::local(Vec::new());
        }

        match message {
            JobMessage::Done {
                processed,
                errors,
                skipped,
                cancelled,
                payload,
                ..
            } => {
                let Some(job) = self.session.take() else {
                    return Transition::local(Vec::new());
                };
                info!("{} job {} done", job.op, job.job_id);

                let done = Done {
                    processed: *processed,
                    errors: *errors,
                    skipped: *skipped,
                    cancelled: *cancelled,
                    payload: payload.as_ref(),
                };
                let completion = self.domain.complete(job.mode, job.context, done);

                let mut effects: EffectsOf<D> =
                    completion.updates.into_iter().map(Effect::Apply).collect();
                effects.push(Effect::Status(completion.status));
                if let Some(command) = completion.follow_up {
                    effects.push(Effect::FollowUp(command));
                }
                Transition::claimed(effects)
            }
            JobMessage::Error { message: text, .. } => {
                let Some(job) = self.session.take() else {
                    return Transition::local(Vec::new());
                };
                let text = format!("error: {}", text.as_deref().unwrap_or("unknown"));
                warn!("{} job {} failed: {}", job.op, job.job_id, text);

                let mut effects: EffectsOf<D> = self
                    .domain
                    .failed(job.mode, job.context)
                    .into_iter()
                    .map(Effect::Apply)
                    .collect();
                effects.push(Effect::Status(text.clone()));
                effects.push(Effect::Log(text));
                Transition::claimed(effects)
            }
            other => {
                let Some(job) = self.session.active() else {
                    return Transition::local(Vec::new());
                };
                let mut effects: EffectsOf<D> = Vec::new();
                if let JobMessage::Log {
                    message: Some(text), ..
                } = other
                {
                    effects.push(Effect::Log(text.clone()));
                }
                let updates = self.domain.observe(job.mode, &job.context, other);
                effects.extend(updates.into_iter().map(Effect::Apply));
                Transition::claimed(effects)
            }
        }
    }

    /// Run a command; follow-up commands run after it, each as a fresh job.
    pub fn run<S>(&mut self, command: D::Command, transport: &dyn Transport, sink: &mut S)
    where
        S: JobSink<D::Update> + ?Sized,
    {
        let mut pending = VecDeque::from([command]);
        while let Some(command) = pending.pop_front() {
            let connected = transport.is_connected();
            let transition = self.transition(JobEvent::Start { command, connected });
            self.execute(transition.effects, transport, sink, &mut pending);
        }
    }

    /// Offer a message to this manager; `false` if it belongs to someone else.
    pub fn handle_message<S>(
        &mut self,
        message: &JobMessage,
        transport: &dyn Transport,
        sink: &mut S,
    ) -> bool
    where
        S: JobSink<D::Update> + ?Sized,
    {
        let transition = self.transition(JobEvent::Message(message));
        if !transition.claimed {
            return false;
        }

        let mut pending = VecDeque::new();
        self.execute(transition.effects, transport, sink, &mut pending);
        while let Some(command) = pending.pop_front() {
            debug!("Running {} follow-up {:?}", D::LABEL, command);
            self.run(command, transport, sink);
        }
        true
    }

    /// Ask the worker to stop the active job.
    ///
    /// The session stays open; the job still ends with `done` or `error`.
    pub fn cancel<S>(&mut self, transport: &dyn Transport, sink: &mut S)
    where
        S: StatusSink + ?Sized,
    {
        let Some(job) = self.session.active() else {
            sink.set_status(&format!("no {} job to cancel", D::LABEL));
            return;
        };
        if !transport.is_connected() {
            sink.set_status("not available in browser mode");
            return;
        }

        let request = JobRequest::cancel(job.job_id.clone(), job.op);
        info!("Cancelling {} job {}", job.op, job.job_id);
        match transport.dispatch(&request) {
            Ok(()) => sink.set_status(&format!("cancelling {}...", job.op)),
            Err(e) => {
                let text = format!("error: {e}");
                sink.set_status(&text);
                sink.append_log(&text);
            }
        }
    }

    fn execute<S>(
        &mut self,
        effects: EffectsOf<D>,
        transport: &dyn Transport,
        sink: &mut S,
        pending: &mut VecDeque<D::Command>,
    ) where
        S: JobSink<D::Update> + ?Sized,
    {
        for effect in effects {
            match effect {
                Effect::Status(text) => sink.set_status(&text),
                Effect::Log(text) => sink.append_log(&text),
                Effect::Apply(update) => sink.apply(update),
                Effect::FollowUp(command) => pending.push_back(command),
                Effect::Dispatch(request) => {
                    if let Err(e) = transport.dispatch(&request) {
                        let failure = self.transition(JobEvent::DispatchFailed {
                            error: e.to_string(),
                        });
                        self.execute(failure.effects, transport, sink, pending);
                    }
                }
            }
        }
    }
}

impl<D, S> MessageHandler<S> for JobManager<D>
where
    D: JobDomain,
    S: JobSink<D::Update>,
{
    fn name(&self) -> &'static str {
        D::LABEL
    }

    fn owns_id(&self, id: &str) -> bool {
        self.session.owns(Some(id))
    }

    fn handle(&mut self, message: &JobMessage, transport: &dyn Transport, sink: &mut S) -> bool {
        self.handle_message(message, transport, sink)
    }
}

/// Insert `value` under `key` unless it is `None`
pub(crate) fn insert_opt(
    payload: &mut Map<String, Value>,
    key: &str,
    value: Option<impl Into<Value>>,
) {
    if let Some(value) = value {
        payload.insert(key.to_string(), value.into());
    }
}
