//! Tracker backends.
//!
//! A [`Tracker`] opens runs inside a project; a [`RunLogger`] receives one
//! [`MetricEntry`] per measurement and is consumed by `finish`. Backends:
//!
//! - [`LocalTracker`]: Trackio-compatible SQLite store, one database per project
//! - [`SpaceTracker`]: hosted Trackio Space, mirrored to a local store
//! - [`DryRunTracker`]: counts what would be logged
//!
//! [`SpaceDirectory`] answers whether a Space already exists on the Hub.

pub mod dry_run;
pub mod error;
pub mod hub;
pub mod local;
pub mod schema;
pub mod space;

pub use dry_run::DryRunTracker;
pub use error::{TrackingError, TrackingResult};
pub use hub::HubClient;
pub use local::{LocalStore, LocalTracker};
pub use space::{SpaceClient, SpaceTracker};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// What to do when a run with the same name already exists in the project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResumeMode {
    /// Append to the existing run, or create it.
    #[default]
    Allow,
    /// The run must already exist.
    Must,
    /// The run must not exist yet.
    Never,
}

/// Parameters for opening a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSpec {
    pub project: String,
    pub space_id: Option<String>,
    pub name: String,
    pub resume: ResumeMode,
}

impl RunSpec {
    #[must_use]
    pub fn new(project: impl Into<String>, name: impl Into<String>) -> Self {
        Self { project: project.into(), space_id: None, name: name.into(), resume: ResumeMode::Allow }
    }

    #[must_use]
    pub fn in_space(mut self, space_id: impl Into<String>) -> Self {
        self.space_id = Some(space_id.into());
        self
    }

    #[must_use]
    pub fn with_resume(mut self, resume: ResumeMode) -> Self {
        self.resume = resume;
        self
    }
}

/// X-axis value attached to a logged loss.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum XAxis {
    Tokens(f64),
    Step(u64),
}

/// One logged measurement.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MetricEntry {
    pub loss: f64,
    pub x: XAxis,
}

impl MetricEntry {
    #[must_use]
    pub fn with_tokens(loss: f64, tokens: f64) -> Self {
        Self { loss, x: XAxis::Tokens(tokens) }
    }

    #[must_use]
    pub fn with_step(loss: f64, step: u64) -> Self {
        Self { loss, x: XAxis::Step(step) }
    }

    /// Metrics dictionary as stored by Trackio.
    ///
    /// Non-finite floats have no JSON form and are written as `null`.
    #[must_use]
    pub fn to_metrics(&self) -> Map<String, Value> {
        let mut metrics = Map::new();
        metrics.insert("loss".to_string(), float_value(self.loss));
        match self.x {
            XAxis::Tokens(tokens) => metrics.insert("tokens".to_string(), float_value(tokens)),
            XAxis::Step(step) => metrics.insert("step".to_string(), Value::from(step)),
        };
        metrics
    }
}

fn float_value(v: f64) -> Value {
    serde_json::Number::from_f64(v).map_or(Value::Null, Value::Number)
}

/// Totals reported when a run finishes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunStats {
    pub run: String,
    pub points: u64,
}

#[async_trait]
pub trait Tracker: Send + Sync {
    fn id(&self) -> &'static str;

    async fn start_run(&self, spec: &RunSpec) -> TrackingResult<Box<dyn RunLogger>>;
}

#[async_trait]
pub trait RunLogger: Send {
    fn name(&self) -> &str;

    async fn log(&mut self, entry: &MetricEntry) -> TrackingResult<()>;

    async fn finish(self: Box<Self>) -> TrackingResult<RunStats>;
}

#[async_trait]
pub trait SpaceDirectory: Send + Sync {
    async fn space_exists(&self, space_id: &str) -> TrackingResult<bool>;
}
