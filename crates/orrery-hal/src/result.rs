//! Decoded job results.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::job::JobId;

/// Measurement outcome histogram, keyed by bitstring.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Counts(BTreeMap<String, u64>);

impl Counts {
    /// Create an empty histogram.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `count` observations of `bitstring`.
    pub fn insert(&mut self, bitstring: impl Into<String>, count: u64) {
        *self.0.entry(bitstring.into()).or_insert(0) += count;
    }

    /// Observations of one bitstring.
    pub fn get(&self, bitstring: &str) -> u64 {
        self.0.get(bitstring).copied().unwrap_or(0)
    }

    /// Number of distinct outcomes.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True when nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Sum of all counts.
    pub fn total_shots(&self) -> u64 {
        self.0.values().sum()
    }

    /// Iterate outcomes in bitstring order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &u64)> {
        self.0.iter()
    }

    /// The most frequent outcome; ties go to the smallest bitstring.
    pub fn most_frequent(&self) -> Option<(&String, u64)> {
        let mut best: Option<(&String, u64)> = None;
        for (bits, &count) in &self.0 {
            if best.is_none_or(|(_, c)| count > c) {
                best = Some((bits, count));
            }
        }
        best
    }

    /// Outcomes sorted by descending count.
    pub fn sorted(&self) -> Vec<(&String, &u64)> {
        let mut entries: Vec<_> = self.0.iter().collect();
        entries.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
        entries
    }

    /// Relative frequency of each outcome.
    pub fn probabilities(&self) -> BTreeMap<String, f64> {
        let total = self.total_shots();
        if total == 0 {
            return BTreeMap::new();
        }
        self.0
            .iter()
            .map(|(k, &v)| (k.clone(), v as f64 / total as f64))
            .collect()
    }
}

impl<S: Into<String>> FromIterator<(S, u64)> for Counts {
    fn from_iter<I: IntoIterator<Item = (S, u64)>>(iter: I) -> Self {
        let mut counts = Counts::new();
        for (bits, count) in iter {
            counts.insert(bits, count);
        }
        counts
    }
}

/// Result of one circuit in a job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExperimentResult {
    /// Circuit name, if the service echoed one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Shots executed.
    pub shots: u32,
    /// Outcome histogram.
    pub counts: Counts,
}

impl ExperimentResult {
    /// Build a result from a histogram, taking the shot count from it.
    pub fn from_counts(counts: Counts) -> Self {
        let shots = u32::try_from(counts.total_shots()).unwrap_or(u32::MAX);
        Self {
            name: None,
            shots,
            counts,
        }
    }
}

/// Decoded payload of a completed job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobResult {
    /// Job the result belongs to.
    pub job_id: JobId,
    /// Backend that ran the job.
    pub backend_name: String,
    /// One entry per submitted circuit.
    pub experiments: Vec<ExperimentResult>,
}

impl JobResult {
    /// Histogram of the first experiment.
    pub fn counts(&self) -> Option<&Counts> {
        self.experiments.first().map(|e| &e.counts)
    }
}
