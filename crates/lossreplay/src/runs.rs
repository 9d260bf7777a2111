use crate::record::LossRecord;
use crate::tracking::MetricEntry;
use std::collections::HashMap;

/// Rows of one file that share a `run_name`, in file order.
#[derive(Debug, Clone, PartialEq)]
pub struct RunGroup {
    pub name: String,
    pub records: Vec<LossRecord>,
}

impl RunGroup {
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Entries to log for this run.
    ///
    /// Tokens are the x-axis when the row carries them; otherwise the row's
    /// index within the run is logged as `step`.
    pub fn metric_entries(&self) -> impl Iterator<Item = MetricEntry> + '_ {
        self.records.iter().enumerate().map(|(j, r)| match r.tokens {
            Some(tokens) => MetricEntry::with_tokens(r.loss, tokens),
            None => MetricEntry::with_step(r.loss, j as u64),
        })
    }
}

/// Group records by run name, keeping runs in order of first appearance.
#[must_use]
pub fn group_runs(records: Vec<LossRecord>) -> Vec<RunGroup> {
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut groups: Vec<RunGroup> = Vec::new();

    for record in records {
        if let Some(&i) = index.get(&record.run_name) {
            groups[i].records.push(record);
        } else {
            index.insert(record.run_name.clone(), groups.len());
            groups.push(RunGroup { name: record.run_name.clone(), records: vec![record] });
        }
    }

    groups
}
