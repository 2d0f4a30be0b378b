//! `JobPlatform` sobre la CLI del experiment tracker (`det`).
//!
//! | operación        | comando                                                   |
//! |------------------|-----------------------------------------------------------|
//! | `submit`         | `det -m <master> experiment create <config> <context>`    |
//! | `state`          | `det -m <master> experiment describe <id> --json`         |
//! | `top_checkpoint` | `det -m <master> experiment list-checkpoints --best 1 --json <id>` |
//!
//! El id del experimento se lee de la línea `Created experiment <n>`.
use std::ffi::OsString;
use std::path::PathBuf;

use async_trait::async_trait;
use log::{debug, info};
use promo_domain::{Checkpoint, JobId, JobPlatform, JobSpec, JobState, PipelineError};
use regex::Regex;
use serde_json::Value;
use tokio::process::Command;

const CREATED_PATTERN: &str = r"Created experiment (\d+)";

static NULL: Value = Value::Null;

/// Id del experimento en la salida de `experiment create`.
pub fn parse_created_experiment(stdout: &str) -> Result<JobId, PipelineError> {
    let re = Regex::new(CREATED_PATTERN).map_err(|e| PipelineError::Submission(e.to_string()))?;
    re.captures(stdout)
      .and_then(|c| c.get(1))
      .map(|m| JobId::new(m.as_str()))
      .ok_or_else(|| PipelineError::Submission(format!("no experiment id in tracker output: {}", stdout.trim())))
}

/// `describe --json` devuelve una lista; se toma el primer experimento.
fn first_entry(doc: &Value) -> &Value {
    match doc {
        Value::Array(items) => items.first().unwrap_or(&NULL),
        other => other,
    }
}

fn experiment_of(doc: &Value) -> &Value {
    let entry = first_entry(doc);
    match entry.get("experiment") {
        Some(inner) if inner.is_object() => inner,
        _ => entry,
    }
}

/// Estado del experimento. Acepta `COMPLETED` y `STATE_COMPLETED`.
pub fn parse_state(doc: &Value) -> Result<JobState, PipelineError> {
    let raw = experiment_of(doc).get("state")
                                .and_then(Value::as_str)
                                .ok_or_else(|| PipelineError::JobStatusUnavailable("tracker reply has no state".into()))?;
    let state = raw.strip_prefix("STATE_").unwrap_or(raw);
    match state {
        "COMPLETED" => Ok(JobState::Completed),
        "ERROR" | "CANCELED" | "CANCELLED" | "DELETED" => Ok(JobState::Failed),
        "QUEUED" | "PULLING" | "STARTING" => Ok(JobState::Created),
        "ACTIVE" | "RUNNING" | "PAUSED" => Ok(JobState::Running),
        s if s.starts_with("STOPPING") => Ok(JobState::Running),
        other => Err(PipelineError::JobStatusUnavailable(format!("unknown experiment state '{other}'"))),
    }
}

/// Mejor checkpoint de `list-checkpoints` junto con la configuración del
/// experimento de `describe`.
pub fn parse_top_checkpoint(job: &JobId, checkpoints: &Value, experiment: &Value) -> Result<Checkpoint, PipelineError> {
    let best = first_entry(checkpoints);
    let uuid = best.get("uuid")
                   .and_then(Value::as_str)
                   .ok_or_else(|| PipelineError::JobStatusUnavailable(format!("experiment {job} has no checkpoint")))?;
    let metrics = best.get("validation")
                      .and_then(|v| v.get("metrics"))
                      .or_else(|| best.get("metrics"))
                      .cloned()
                      .unwrap_or(Value::Null);
    let config = experiment_of(experiment).get("config").cloned().unwrap_or(Value::Null);
    Ok(Checkpoint { uuid: uuid.to_string(),
                    job_id: job.clone(),
                    metrics,
                    experiment_config: config })
}

#[derive(Debug, Clone)]
pub struct DeterminedCliPlatform {
    program: PathBuf,
    leading_args: Vec<OsString>,
    master: String,
}

impl DeterminedCliPlatform {
    /// `det` del `PATH` contra `master`.
    pub fn new(master: impl Into<String>) -> Self {
        Self { program: PathBuf::from("det"),
               leading_args: Vec::new(),
               master: master.into() }
    }

    pub fn with_binary(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = program.into();
        self
    }

    /// Antepone argumentos fijos (p.ej. un intérprete y su script).
    pub fn with_leading_args<I, S>(mut self, args: I) -> Self
        where I: IntoIterator<Item = S>,
              S: Into<OsString>
    {
        self.leading_args = args.into_iter().map(Into::into).collect();
        self
    }

    async fn det(&self, master: &str, args: &[&OsString]) -> Result<std::process::Output, std::io::Error> {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.leading_args).arg("-m").arg(master).arg("experiment");
        for a in args {
            cmd.arg(a);
        }
        cmd.output().await
    }

    /// Ejecuta una consulta y parsea su stdout como JSON.
    async fn query(&self, args: &[&str]) -> Result<Value, PipelineError> {
        let args: Vec<OsString> = args.iter().map(|a| OsString::from(*a)).collect();
        let refs: Vec<&OsString> = args.iter().collect();
        let output = self.det(&self.master, &refs)
                         .await
                         .map_err(|e| PipelineError::JobStatusUnavailable(format!("cannot run {}: {e}", self.program.display())))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(PipelineError::JobStatusUnavailable(format!("tracker exited with {}: {}",
                                                                   output.status,
                                                                   stderr.trim())));
        }
        serde_json::from_slice(&output.stdout).map_err(|e| PipelineError::JobStatusUnavailable(format!("tracker reply: {e}")))
    }
}

#[async_trait]
impl JobPlatform for DeterminedCliPlatform {
    async fn submit(&self, spec: &JobSpec) -> Result<JobId, PipelineError> {
        let create = OsString::from("create");
        let config = OsString::from(&spec.config_path);
        let context = OsString::from(&spec.context_path);
        let output = self.det(&spec.endpoint, &[&create, &config, &context])
                         .await
                         .map_err(|e| PipelineError::Submission(format!("cannot run {}: {e}", self.program.display())))?;
        let stdout = String::from_utf8_lossy(&output.stdout);
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(PipelineError::Submission(format!("experiment create exited with {}: {}",
                                                         output.status,
                                                         stderr.trim())));
        }
        let job = parse_created_experiment(&stdout)?;
        info!("Created Experiment {job}");
        Ok(job)
    }

    async fn state(&self, job: &JobId) -> Result<JobState, PipelineError> {
        let doc = self.query(&["describe", job.as_str(), "--json"]).await?;
        let state = parse_state(&doc)?;
        debug!("experiment {job}: {state:?}");
        Ok(state)
    }

    async fn top_checkpoint(&self, job: &JobId) -> Result<Checkpoint, PipelineError> {
        let checkpoints = self.query(&["list-checkpoints", "--best", "1", "--json", job.as_str()]).await?;
        let experiment = self.query(&["describe", job.as_str(), "--json"]).await?;
        parse_top_checkpoint(job, &checkpoints, &experiment)
    }
}
