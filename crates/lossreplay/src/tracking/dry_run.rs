use super::error::TrackingResult;
use super::{MetricEntry, RunLogger, RunSpec, RunStats, Tracker};
use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Tracker that writes nothing and only counts.
#[derive(Debug, Default, Clone)]
pub struct DryRunTracker {
    runs: Arc<AtomicU64>,
    points: Arc<AtomicU64>,
}

impl DryRunTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn runs_started(&self) -> u64 {
        self.runs.load(Ordering::Relaxed)
    }

    pub fn points_logged(&self) -> u64 {
        self.points.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl Tracker for DryRunTracker {
    fn id(&self) -> &'static str {
        "dry-run"
    }

    async fn start_run(&self, spec: &RunSpec) -> TrackingResult<Box<dyn RunLogger>> {
        self.runs.fetch_add(1, Ordering::Relaxed);
        Ok(Box::new(DryRunLogger { run: spec.name.clone(), points: 0, total: Arc::clone(&self.points) }))
    }
}

struct DryRunLogger {
    run: String,
    points: u64,
    total: Arc<AtomicU64>,
}

#[async_trait]
impl RunLogger for DryRunLogger {
    fn name(&self) -> &str {
        &self.run
    }

    async fn log(&mut self, _entry: &MetricEntry) -> TrackingResult<()> {
        self.points += 1;
        self.total.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    async fn finish(self: Box<Self>) -> TrackingResult<RunStats> {
        Ok(RunStats { run: self.run, points: self.points })
    }
}
