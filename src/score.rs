//! Quintile scoring of recency, frequency and monetary values

use std::fmt;

use serde::Serialize;
use tracing::debug;

use crate::aggregate::{FrequencySummary, MonetarySummary, RecencySummary};
use crate::error::RfmError;

/// Number of percentile bins every metric is cut into
pub const QUINTILES: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Metric {
    Recency,
    Frequency,
    Monetary,
}

impl Metric {
    /// Whether a larger raw value earns a higher score
    pub fn higher_is_better(self) -> bool {
        !matches!(self, Metric::Recency)
    }

    /// Score for a 1-based bin, bin 1 holding the smallest values
    fn score_for_bin(self, bin: u8) -> Score {
        if self.higher_is_better() {
            Score(bin)
        } else {
            Score(QUINTILES as u8 + 1 - bin)
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Metric::Recency => "recency",
            Metric::Frequency => "frequency",
            Metric::Monetary => "monetary",
        };
        f.write_str(name)
    }
}

/// A single R, F or M digit, always within 1..=5
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct Score(u8);

impl Score {
    pub fn new(value: u8) -> Result<Self, RfmError> {
        if (1..=QUINTILES as u8).contains(&value) {
            Ok(Self(value))
        } else {
            Err(RfmError::InvalidScore(value))
        }
    }

    pub fn get(self) -> u8 {
        self.0
    }
}

impl fmt::Display for Score {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

fn check_population(metric: Metric, customers: usize) -> Result<(), RfmError> {
    if customers < QUINTILES {
        return Err(RfmError::InsufficientPopulation { metric, customers });
    }
    Ok(())
}

/// Equal-frequency bins over raw values
///
/// Edges sit at the 0, 20, 40, 60, 80 and 100th percentiles (linear
/// interpolation between order statistics); bins are right-closed with the
/// lowest edge included. Equal values always land in the same bin.
///
/// # Returns
/// * 1-based bin per input value, in input order
pub fn quintile_bins_by_value(values: &[f64], metric: Metric) -> Result<Vec<u8>, RfmError> {
    let n = values.len();
    check_population(metric, n)?;

    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);

    let edges: Vec<f64> = (0..=QUINTILES)
        .map(|k| {
            let position = (n - 1) as f64 * k as f64 / QUINTILES as f64;
            let lower = position.floor() as usize;
            let upper = (lower + 1).min(n - 1);
            let fraction = position - lower as f64;
            sorted[lower] + (sorted[upper] - sorted[lower]) * fraction
        })
        .collect();

    debug!(%metric, ?edges, "quintile edges");

    let insufficient = || RfmError::InsufficientDistinctValues { metric, customers: n };

    if edges.windows(2).any(|pair| pair[0] >= pair[1]) {
        return Err(insufficient());
    }

    let bins: Vec<u8> = values
        .iter()
        .map(|&value| {
            let bin = edges[1..]
                .iter()
                .position(|&edge| value <= edge)
                .unwrap_or(QUINTILES - 1);
            bin as u8 + 1
        })
        .collect();

    let mut counts = [0usize; QUINTILES];
    for &bin in &bins {
        counts[bin as usize - 1] += 1;
    }
    if counts.contains(&0) {
        return Err(insufficient());
    }

    Ok(bins)
}

/// Equal-frequency bins over the ranks 1..=n
///
/// Same edges as [`quintile_bins_by_value`] applied to distinct ranks,
/// computed in integer arithmetic so bin sizes are always floor(n/5) or
/// ceil(n/5).
///
/// # Returns
/// * 1-based bin for each 0-based rank
pub fn quintile_bins_by_rank(n: usize, metric: Metric) -> Result<Vec<u8>, RfmError> {
    check_population(metric, n)?;

    // Rank i (0-based) falls in the first bin k with 5 * i <= (n - 1) * k
    let span = n - 1;
    let bins = (0..n)
        .map(|i| {
            let k = (QUINTILES * i).div_ceil(span).max(1);
            k as u8
        })
        .collect();

    Ok(bins)
}

/// Recency scores: the most recent fifth of customers scores 5
pub fn score_recency(summaries: &[RecencySummary]) -> Result<Vec<Score>, RfmError> {
    let values: Vec<f64> = summaries.iter().map(|s| s.recency as f64).collect();
    let bins = quintile_bins_by_value(&values, Metric::Recency)?;
    Ok(bins.into_iter().map(|bin| Metric::Recency.score_for_bin(bin)).collect())
}

/// Frequency scores, binned by rank
///
/// Order counts repeat heavily, so customers are ranked first: by frequency,
/// then by customer key for equal counts.
pub fn score_frequency(summaries: &[FrequencySummary]) -> Result<Vec<Score>, RfmError> {
    let bins_by_rank = quintile_bins_by_rank(summaries.len(), Metric::Frequency)?;

    let mut ranked: Vec<usize> = (0..summaries.len()).collect();
    ranked.sort_by(|&a, &b| {
        summaries[a]
            .frequency
            .cmp(&summaries[b].frequency)
            .then_with(|| summaries[a].key.cmp(&summaries[b].key))
    });

    let mut scores = vec![Score(1); summaries.len()];
    for (rank, &index) in ranked.iter().enumerate() {
        scores[index] = Metric::Frequency.score_for_bin(bins_by_rank[rank]);
    }
    Ok(scores)
}

/// Monetary scores: the biggest spending fifth scores 5
pub fn score_monetary(summaries: &[MonetarySummary]) -> Result<Vec<Score>, RfmError> {
    let values: Vec<f64> = summaries.iter().map(|s| s.monetary).collect();
    let bins = quintile_bins_by_value(&values, Metric::Monetary)?;
    Ok(bins.into_iter().map(|bin| Metric::Monetary.score_for_bin(bin)).collect())
}
