//! History chart projection
//!
//! Turns stored records into chart-ready points. Rendering is left to the host.

use serde::{Deserialize, Serialize};

use crate::types::StepRecord;

/// Maximum number of x-axis labels shown regardless of record count
pub const MAX_AXIS_LABELS: usize = 5;

/// Default series title
pub const SERIES_TITLE: &str = "Step history";

/// One plotted record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChartPoint {
    /// Position in the history, used as the x value
    pub index: usize,
    pub steps: u32,
    /// `DD/MM`, or empty when the stored date is malformed
    pub label: String,
}

/// Chart-ready step history
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChartSeries {
    pub title: String,
    pub points: Vec<ChartPoint>,
    /// Number of x-axis labels to show
    pub label_count: usize,
}

impl ChartSeries {
    pub fn from_records(records: &[StepRecord]) -> Self {
        let points = records
            .iter()
            .enumerate()
            .map(|(index, record)| ChartPoint {
                index,
                steps: record.step_count,
                label: day_month_label(&record.date),
            })
            .collect();

        Self {
            title: SERIES_TITLE.to_string(),
            points,
            label_count: records.len().min(MAX_AXIS_LABELS),
        }
    }

    /// True when there is no history to plot
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Label for an x-axis value; fractional values truncate to an index
    pub fn axis_label(&self, value: f32) -> String {
        let index = value.trunc();
        if index.is_nan() || index < 0.0 {
            return String::new();
        }
        self.points
            .get(index as usize)
            .map(|p| p.label.clone())
            .unwrap_or_default()
    }

    /// Largest step count in the series
    pub fn max_steps(&self) -> u32 {
        self.points.iter().map(|p| p.steps).max().unwrap_or(0)
    }
}

/// `YYYY-MM-DD` -> `DD/MM`; anything without three dash-separated parts maps to ""
pub fn day_month_label(date: &str) -> String {
    let parts: Vec<&str> = date.split('-').collect();
    match parts.as_slice() {
        [_, month, day] => format!("{}/{}", day, month),
        _ => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn records(dates: &[&str]) -> Vec<StepRecord> {
        dates
            .iter()
            .enumerate()
            .map(|(i, date)| StepRecord {
                id: i as i64 + 1,
                step_count: (i as u32 + 1) * 1_000,
                date: date.to_string(),
            })
            .collect()
    }

    #[test]
    fn test_day_month_label() {
        assert_eq!(day_month_label("2024-01-15"), "15/01");
        assert_eq!(day_month_label("2024/01/15"), "");
        assert_eq!(day_month_label(""), "");
        assert_eq!(day_month_label("2024-01-15-x"), "");
    }

    #[test]
    fn test_points_follow_record_order() {
        let series = ChartSeries::from_records(&records(&["2024-02-01", "2024-01-31"]));
        assert_eq!(
            series.points,
            vec![
                ChartPoint {
                    index: 0,
                    steps: 1_000,
                    label: "01/02".to_string(),
                },
                ChartPoint {
                    index: 1,
                    steps: 2_000,
                    label: "31/01".to_string(),
                },
            ]
        );
        assert_eq!(series.label_count, 2);
        assert_eq!(series.max_steps(), 2_000);
    }

    #[test]
    fn test_label_count_capped() {
        let dates: Vec<String> = (1..=9).map(|d| format!("2024-06-0{}", d)).collect();
        let refs: Vec<&str> = dates.iter().map(String::as_str).collect();
        let series = ChartSeries::from_records(&records(&refs));
        assert_eq!(series.points.len(), 9);
        assert_eq!(series.label_count, MAX_AXIS_LABELS);
    }

    #[test]
    fn test_axis_label_out_of_range() {
        let series = ChartSeries::from_records(&records(&["2024-01-01", "2024-01-02"]));
        assert_eq!(series.axis_label(1.7), "02/01");
        assert_eq!(series.axis_label(2.0), "");
        assert_eq!(series.axis_label(-1.0), "");
        assert_eq!(series.axis_label(f32::NAN), "");
    }

    #[test]
    fn test_empty_history() {
        let series = ChartSeries::from_records(&[]);
        assert!(series.is_empty());
        assert_eq!(series.label_count, 0);
        assert_eq!(series.max_steps(), 0);
    }
}
