use std::collections::BTreeMap;
use std::fmt::Write;
use std::time::{Duration, Instant};

use metrics::counter;
use serde_json::Value;

use crate::engine::MatchObserver;
use crate::error::ReconcileResult;
use crate::metrics::RECONCILE_MATCHES_TOTAL;
use crate::types::MatchRecord;

/// Maximum number of sample records kept for the run summary.
pub const MAX_SAMPLES: usize = 10;

/// Collects the match count, a few sample records and the run duration.
#[derive(Debug, Clone)]
pub struct MetricsCollector {
    started_at: Instant,
    finished_at: Option<Instant>,
    matches: u64,
    samples: Vec<MatchRecord>,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self {
            started_at: Instant::now(),
            finished_at: None,
            matches: 0,
            samples: Vec::with_capacity(MAX_SAMPLES),
        }
    }

    /// Marks the end of the run. Later calls move the end time forward.
    pub fn mark_end(&mut self) {
        self.finished_at = Some(Instant::now());
    }

    /// Time between creation and [`MetricsCollector::mark_end`], or until now if not ended.
    pub fn elapsed(&self) -> Duration {
        self.finished_at
            .unwrap_or_else(Instant::now)
            .duration_since(self.started_at)
    }

    pub fn matches(&self) -> u64 {
        self.matches
    }

    /// The first [`MAX_SAMPLES`] match records of the run.
    pub fn samples(&self) -> &[MatchRecord] {
        &self.samples
    }

    /// Renders the samples as pretty-printed JSON with sorted keys.
    pub fn samples_json(&self) -> ReconcileResult<String> {
        let samples = self
            .samples
            .iter()
            .map(|sample| match serde_json::to_value(sample)? {
                Value::Object(fields) => Ok(Value::Object(
                    fields.into_iter().collect::<BTreeMap<_, _>>().into_iter().collect(),
                )),
                other => Ok(other),
            })
            .collect::<ReconcileResult<Vec<_>>>()?;

        Ok(serde_json::to_string_pretty(&samples)?)
    }

    /// Renders the end-of-run summary: elapsed time, total matches and samples.
    pub fn render_summary(&self) -> ReconcileResult<String> {
        let (minutes, seconds) = minutes_and_seconds(self.elapsed());

        let mut summary = String::new();
        // Writing into a String cannot fail.
        let _ = writeln!(summary, "Elapsed Time: {minutes} minutes, {seconds} seconds");
        let _ = writeln!(summary, "Total Matches: {}", self.matches);
        let _ = write!(summary, "Sample Output: {}", self.samples_json()?);

        Ok(summary)
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl MatchObserver for MetricsCollector {
    fn record_match(&mut self) {
        self.matches += 1;
        counter!(RECONCILE_MATCHES_TOTAL).increment(1);
    }

    fn sample_record(&mut self, record: &MatchRecord) {
        if self.samples.len() < MAX_SAMPLES {
            self.samples.push(record.clone());
        }
    }
}

/// Splits a duration into whole minutes and remaining whole seconds.
pub fn minutes_and_seconds(duration: Duration) -> (u64, u64) {
    let total_seconds = duration.as_secs();
    (total_seconds / 60, total_seconds % 60)
}
