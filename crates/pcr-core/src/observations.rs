//! Observation data prepared for evaluation.
//!
//! The resolved [`DataRegime`] is reshaped once at engine construction into the
//! form the evaluator reads: per-interval totals for count data, and the
//! oldest/youngest occupied interval of each range for presence/absence data.

use pcr_config::{ConfigResult, DataRegime, RateSpec};

/// Oldest and youngest interval (internal index) in which a range was observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PresenceSpan {
    pub oldest: usize,
    pub youngest: usize,
}

/// Presence/absence indicators plus the span each range occupies.
#[derive(Debug, Clone, PartialEq)]
pub struct PresenceData {
    present: Vec<Vec<bool>>,
    spans: Vec<PresenceSpan>,
}

impl PresenceData {
    /// Derive spans from the indicator matrix. A range with no presence at all
    /// is assigned the boundary interval.
    pub fn new(present: Vec<Vec<bool>>, interval_count: usize) -> Self {
        let boundary = interval_count - 1;
        let spans = present
            .iter()
            .map(|row| PresenceSpan {
                oldest: row.iter().position(|&p| p).unwrap_or(boundary),
                youngest: row.iter().rposition(|&p| p).unwrap_or(boundary),
            })
            .collect();
        Self { present, spans }
    }

    pub fn is_present(&self, range: usize, interval: usize) -> bool {
        self.present[range][interval]
    }

    pub fn span(&self, range: usize) -> PresenceSpan {
        self.spans[range]
    }
}

/// How observation counts enter the likelihood.
#[derive(Debug, Clone, PartialEq)]
pub enum ObservationModel {
    /// Counts integrated out against accumulated exposure time.
    Marginalized,
    /// A single total count under a homogeneous sampling rate.
    Total(u64),
    /// Known count per interval (summed over ranges when given per range).
    IntervalTotals(Vec<u64>),
    /// Per-range presence/absence.
    PresenceAbsence(PresenceData),
}

impl ObservationModel {
    pub fn from_regime(regime: DataRegime, interval_count: usize) -> Self {
        match regime {
            DataRegime::Marginalized => ObservationModel::Marginalized,
            DataRegime::Total(k) => ObservationModel::Total(k),
            DataRegime::PerInterval(counts) => ObservationModel::IntervalTotals(counts),
            DataRegime::PerRange(rows) => {
                let mut totals = vec![0u64; interval_count];
                for row in &rows {
                    for (total, count) in totals.iter_mut().zip(row) {
                        *total += count;
                    }
                }
                ObservationModel::IntervalTotals(totals)
            }
            DataRegime::PresenceAbsence(present) => {
                ObservationModel::PresenceAbsence(PresenceData::new(present, interval_count))
            }
        }
    }

    pub fn is_marginalized(&self) -> bool {
        matches!(self, ObservationModel::Marginalized)
    }

    pub fn presence(&self) -> Option<&PresenceData> {
        match self {
            ObservationModel::PresenceAbsence(data) => Some(data),
            _ => None,
        }
    }

    /// Reject a sampling-rate specification this model cannot score.
    pub fn check_sampling(&self, sampling: &RateSpec) -> ConfigResult<()> {
        match self {
            ObservationModel::Total(count) => DataRegime::Total(*count).check_sampling(sampling),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn per_range_counts_are_summed_per_interval() {
        let model = ObservationModel::from_regime(
            DataRegime::PerRange(vec![vec![1, 0, 2], vec![0, 3, 1]]),
            3,
        );
        assert_eq!(model, ObservationModel::IntervalTotals(vec![1, 3, 3]));
        assert!(!model.is_marginalized());
        assert!(model.presence().is_none());
    }

    #[test]
    fn presence_spans_pick_extreme_intervals() {
        let data = PresenceData::new(
            vec![
                vec![false, true, false, true],
                vec![false, false, true, false],
                vec![false, false, false, false],
            ],
            4,
        );
        assert_eq!(data.span(0), PresenceSpan { oldest: 1, youngest: 3 });
        assert_eq!(data.span(1), PresenceSpan { oldest: 2, youngest: 2 });
        assert_eq!(data.span(2), PresenceSpan { oldest: 3, youngest: 3 });
        assert!(data.is_present(0, 3));
        assert!(!data.is_present(0, 2));
    }

    #[test]
    fn total_count_pins_sampling_homogeneity() {
        let per_interval = RateSpec::PerInterval(vec![0.1, 0.2]);
        assert!(ObservationModel::Total(3).check_sampling(&per_interval).is_err());
        assert!(ObservationModel::Total(3).check_sampling(&RateSpec::Homogeneous(0.1)).is_ok());
        assert!(ObservationModel::Marginalized.check_sampling(&per_interval).is_ok());
        assert!(ObservationModel::Marginalized.is_marginalized());
    }
}
