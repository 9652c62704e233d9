//! nai-ui - command-line driver for the NAI sidecar worker
//!
//! Spawns the worker, runs one manager operation, pumps the worker's messages
//! until every job has finished and prints the resulting state as JSON.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use nai_common::config::{SidecarResolver, TomlConfig};
use nai_common::ipc::Operation;
use nai_common::{ApplyMode, Preset, PresetValue};
use nai_ui::jobs::pipeline::PipelineCommand;
use nai_ui::jobs::PendingApply;
use nai_ui::jobs::preset_db::{PresetDbCommand, PresetDraft, PresetFilter};
use nai_ui::jobs::preset_file::PresetFileCommand;
use nai_ui::jobs::template_db::TemplateDbCommand;
use nai_ui::jobs::template_file::TemplateFileCommand;
use nai_ui::sidecar::Sidecar;
use nai_ui::state::VariableReport;
use nai_ui::{AppState, Client};
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Grace period for a cancelled pipeline job to report back
const CANCEL_GRACE: Duration = Duration::from_secs(5);

/// Command-line arguments for nai-ui
#[derive(Parser, Debug)]
#[command(name = "nai-ui")]
#[command(about = "Preset/template client for the NAI sidecar worker")]
#[command(version)]
struct Args {
    /// Project root containing sidecar/main.py
    #[arg(long)]
    root: Option<PathBuf>,

    /// Python interpreter running the sidecar
    #[arg(long)]
    python: Option<PathBuf>,

    /// Config file (defaults to <config dir>/nai/config.toml)
    #[arg(long, env = "NAI_CONFIG")]
    config: Option<PathBuf>,

    /// Local template JSON to start from
    #[arg(long)]
    template: Option<PathBuf>,

    /// Seconds to wait for outstanding jobs
    #[arg(long, default_value = "60")]
    timeout: u64,

    /// Include a tag analysis of the resulting template
    #[arg(long)]
    analyze: bool,

    #[command(subcommand)]
    command: Cmd,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Templates stored in the database
    TemplateDb {
        #[command(subcommand)]
        action: TemplateDbAction,
    },
    /// Single-variable presets stored in the database
    PresetDb {
        #[command(subcommand)]
        action: PresetDbAction,
    },
    /// Template files on disk
    Template {
        #[command(subcommand)]
        action: TemplateFileAction,
    },
    /// Preset files on disk
    Preset {
        #[command(subcommand)]
        action: PresetFileAction,
    },
    /// Run a pipeline job (scan, search, db_stats, rename, move, strip_suffix, build_nais)
    Pipeline {
        op: Operation,
        /// JSON object passed to the worker
        #[arg(long, default_value = "{}")]
        payload: String,
        /// Template variable receiving build_nais values
        #[arg(long)]
        variable: Option<String>,
        /// Keep existing values instead of replacing them
        #[arg(long)]
        append: bool,
        /// Remove the tags shared by every built value afterwards
        #[arg(long)]
        strip_common: bool,
    },
}

#[derive(Subcommand, Debug)]
enum TemplateDbAction {
    List,
    Get { name: String },
    /// Save the --template file under its own name or --name
    Save {
        #[arg(long)]
        name: Option<String>,
    },
    Delete { name: String },
}

#[derive(Subcommand, Debug)]
enum PresetDbAction {
    List {
        #[arg(long)]
        variable: Option<String>,
        #[arg(long)]
        source_kind: Option<String>,
    },
    /// Merge a stored preset into a template variable
    Get {
        id: i64,
        #[arg(long)]
        variable: String,
        /// Keep existing values instead of replacing them
        #[arg(long)]
        append: bool,
    },
    /// Store a template variable's values as a preset
    Save {
        #[arg(long)]
        name: String,
        #[arg(long)]
        variable: String,
        #[arg(long, default_value = "template")]
        source_kind: String,
        /// Overwrite an existing preset
        #[arg(long)]
        id: Option<i64>,
    },
    Delete { id: i64 },
}

#[derive(Subcommand, Debug)]
enum TemplateFileAction {
    Load { path: String },
    /// Write the --template file through the worker
    Save { path: String },
}

#[derive(Subcommand, Debug)]
enum PresetFileAction {
    /// Import values from a file into a template variable
    Import {
        path: String,
        #[arg(long)]
        variable: String,
        #[arg(long)]
        append: bool,
    },
}

/// What gets printed once the command finishes
#[derive(Serialize)]
struct Report<'a> {
    finished: bool,
    #[serde(flatten)]
    state: &'a AppState,
    #[serde(skip_serializing_if = "Option::is_none")]
    analysis: Option<Vec<VariableReport>>,
}

fn apply_mode(append: bool) -> ApplyMode {
    if append {
        ApplyMode::Append
    } else {
        ApplyMode::Replace
    }
}

fn read_template(path: &Path) -> Result<Preset> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read template {}", path.display()))?;
    serde_json::from_str(&text)
        .with_context(|| format!("Invalid template JSON in {}", path.display()))
}

fn variable_values(template: &Preset, variable: &str) -> Result<Vec<PresetValue>> {
    match template.variable(variable) {
        Some(variable) => Ok(variable.values.clone()),
        None => bail!("Template has no variable named {variable}"),
    }
}

/// Drop the tags every built value shares from the variable they went into
fn strip_common_tags(state: &mut AppState) {
    let Some(variable) = state.job.built_variable.clone() else {
        warn!("No built variable to strip common tags from");
        return;
    };
    let tags = state.job.common_tags.clone();
    if tags.is_empty() {
        return;
    }
    if state.strip_variable_tags(&variable, &tags) {
        info!("Removed {} common tags from {}", tags.len(), variable);
    }
}

fn run_command<T: nai_ui::Transport>(client: &mut Client<T>, command: Cmd) -> Result<()> {
    match command {
        Cmd::TemplateDb { action } => match action {
            TemplateDbAction::List => client.template_db(TemplateDbCommand::List),
            TemplateDbAction::Get { name } => client.template_db(TemplateDbCommand::Get { name }),
            TemplateDbAction::Save { name } => client.save_template_db(name),
            TemplateDbAction::Delete { name } => {
                client.template_db(TemplateDbCommand::Delete { name })
            }
        },
        Cmd::PresetDb { action } => match action {
            PresetDbAction::List {
                variable,
                source_kind,
            } => client.preset_db(PresetDbCommand::List(PresetFilter {
                variable_name: variable,
                source_kind,
            })),
            PresetDbAction::Get {
                id,
                variable,
                append,
            } => client.preset_db(PresetDbCommand::Get {
                id,
                variable_name: variable,
                mode: apply_mode(append),
            }),
            PresetDbAction::Save {
                name,
                variable,
                source_kind,
                id,
            } => {
                let values = variable_values(&client.state.template, &variable)?;
                client.preset_db(PresetDbCommand::Save(PresetDraft {
                    id,
                    name,
                    source_kind,
                    variable_name: variable,
                    values,
                }));
            }
            PresetDbAction::Delete { id } => client.preset_db(PresetDbCommand::Delete { id }),
        },
        Cmd::Template { action } => match action {
            TemplateFileAction::Load { path } => {
                client.template_file(TemplateFileCommand::Load { path })
            }
            TemplateFileAction::Save { path } => client.save_template_file(path),
        },
        Cmd::Preset { action } => match action {
            PresetFileAction::Import {
                path,
                variable,
                append,
            } => client.preset_file(PresetFileCommand::Import {
                path,
                variable_name: variable,
                mode: apply_mode(append),
            }),
        },
        Cmd::Pipeline {
            op,
            payload,
            variable,
            append,
            ..
        } => {
            let payload: Map<String, Value> =
                serde_json::from_str(&payload).context("--payload must be a JSON object")?;
            client.pipeline(PipelineCommand {
                op,
                payload,
                apply: variable.map(|variable_name| PendingApply {
                    variable_name,
                    mode: apply_mode(append),
                }),
            });
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => TomlConfig::from_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => TomlConfig::load_or_default(),
    };

    // Initialize tracing (stderr, so stdout stays machine-readable)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.logging.level)),
        )
        .with_writer(std::io::stderr)
        .init();

    info!("Starting nai-ui v{}", env!("CARGO_PKG_VERSION"));

    let resolver = SidecarResolver::new(config);
    let root = resolver
        .resolve_root(args.root.as_deref())
        .context("Failed to resolve project root")?;
    let python = resolver.resolve_python(&root, args.python.as_deref());
    info!("Project root: {}", root.display());

    let (sidecar, transport, mut frames) =
        Sidecar::spawn(&python, &root).context("Failed to start sidecar")?;
    info!("Sidecar running (pid {:?})", sidecar.id());

    let mut client = Client::new(transport);
    if let Some(path) = &args.template {
        client.state.template = read_template(path)?;
    }

    let is_pipeline = matches!(args.command, Cmd::Pipeline { .. });
    let strip_common = matches!(
        args.command,
        Cmd::Pipeline {
            strip_common: true,
            ..
        }
    );
    run_command(&mut client, args.command)?;

    let limit = Duration::from_secs(args.timeout);
    let mut finished = client.pump_until_idle(&mut frames, limit).await;
    if !finished && is_pipeline {
        warn!("Pipeline job still running after {}s, cancelling", args.timeout);
        client.cancel_pipeline();
        finished = client.pump_until_idle(&mut frames, CANCEL_GRACE).await;
    }
    if strip_common {
        strip_common_tags(&mut client.state);
    }

    let report = Report {
        finished,
        state: &client.state,
        analysis: args.analyze.then(|| client.state.analyze_template()),
    };
    println!("{}", serde_json::to_string_pretty(&report)?);

    if let Err(e) = sidecar.shutdown().await {
        warn!("Failed to stop sidecar: {}", e);
    }

    if !finished {
        bail!("Timed out waiting for the sidecar");
    }
    Ok(())
}
