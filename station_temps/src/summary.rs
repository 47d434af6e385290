use chrono::NaiveDateTime;
use serde::Serialize;

use crate::chart::THRESHOLDS;
use crate::reader::TemperatureRecord;

#[derive(Clone, Debug, Default, Serialize, PartialEq)]
pub struct RecordSummary {
    pub rows: usize,
    pub missing_timestamps: usize,
    pub missing_temperatures: usize,
    pub first: Option<NaiveDateTime>,
    pub last: Option<NaiveDateTime>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub mean: Option<f64>,
    /// Readings strictly above each threshold line, in `THRESHOLDS` order.
    pub above_thresholds: [usize; 2],
}

pub fn summarize(records: &[TemperatureRecord]) -> RecordSummary {
    let mut summary = RecordSummary {
        rows: records.len(),
        ..RecordSummary::default()
    };
    let mut sum = 0.0;
    let mut finite = 0usize;

    for record in records {
        match record.timestamp {
            Some(ts) => {
                summary.first = Some(summary.first.map_or(ts, |f| f.min(ts)));
                summary.last = Some(summary.last.map_or(ts, |l| l.max(ts)));
            }
            None => summary.missing_timestamps += 1,
        }

        let t = record.temperature;
        if !t.is_finite() {
            if t.is_nan() {
                summary.missing_temperatures += 1;
            }
            continue;
        }
        finite += 1;
        sum += t;
        summary.min = Some(summary.min.map_or(t, |m| m.min(t)));
        summary.max = Some(summary.max.map_or(t, |m| m.max(t)));
        for (count, line) in summary.above_thresholds.iter_mut().zip(THRESHOLDS.iter()) {
            if t > line.value {
                *count += 1;
            }
        }
    }

    if finite > 0 {
        summary.mean = Some(sum / finite as f64);
    }
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(hour: u32) -> Option<NaiveDateTime> {
        NaiveDate::from_ymd_opt(2025, 1, 3)
            .and_then(|d| d.and_hms_opt(hour, 0, 0))
    }

    fn rec(timestamp: Option<NaiveDateTime>, temperature: f64) -> TemperatureRecord {
        TemperatureRecord {
            timestamp,
            temperature,
        }
    }

    #[test]
    fn empty_input() {
        let summary = summarize(&[]);
        assert_eq!(summary, RecordSummary::default());
    }

    #[test]
    fn counts_and_extremes() {
        let records = vec![
            rec(at(5), 58.0),
            rec(None, 61.0),
            rec(at(1), f64::NAN),
            rec(at(9), 75.0),
            rec(at(3), 70.0),
        ];
        let summary = summarize(&records);
        assert_eq!(summary.rows, 5);
        assert_eq!(summary.missing_timestamps, 1);
        assert_eq!(summary.missing_temperatures, 1);
        assert_eq!(summary.first, at(1));
        assert_eq!(summary.last, at(9));
        assert_eq!(summary.min, Some(58.0));
        assert_eq!(summary.max, Some(75.0));
        assert_eq!(summary.mean, Some(66.0));
        // 70.0 sits on the A2 line and is not above it.
        assert_eq!(summary.above_thresholds, [3, 1]);
    }
}
