//! Comparison series computation

use crate::error::AppError;
use crate::quotes::HistoricalPoint;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::str::FromStr;

/// How points of different symbols are matched up
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Alignment {
    /// Index `i` of every series lines up with index `i` of the first
    /// series. Dates come from the first series.
    #[default]
    Positional,
    /// Points line up on equal dates; the date axis is the union of all dates.
    ByDate,
}

impl FromStr for Alignment {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "positional" => Ok(Alignment::Positional),
            "date" | "byDate" | "bydate" => Ok(Alignment::ByDate),
            _ => Err(AppError::Validation(format!("Unknown alignment: {}", s))),
        }
    }
}

/// One x-axis point of the comparison chart
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComparisonPoint {
    pub date: NaiveDate,
    /// symbol -> close or % change since the first close
    pub values: BTreeMap<String, f64>,
}

/// `(close - base) / base * 100`
fn rebase(close: f64, base: f64) -> f64 {
    (close - base) / base * 100.0
}

/// Value for `point` given the symbol's baseline, or `None` when a
/// normalized value would divide by zero
fn value(point: &HistoricalPoint, base: f64, normalize: bool) -> Option<f64> {
    if !normalize {
        return Some(point.close);
    }
    (base != 0.0).then(|| rebase(point.close, base))
}

/// Build the comparison chart series.
///
/// `symbols` gives the compared order; symbols without a series contribute
/// nothing. With [`Alignment::Positional`] the axis is the first available
/// series, and shorter series simply stop contributing past their end.
pub fn compute_series(
    symbols: &[String],
    history: &HashMap<String, Vec<HistoricalPoint>>,
    normalize: bool,
    alignment: Alignment,
) -> Vec<ComparisonPoint> {
    let series: Vec<(&str, &[HistoricalPoint])> = symbols
        .iter()
        .filter_map(|s| {
            history
                .get(s)
                .filter(|h| !h.is_empty())
                .map(|h| (s.as_str(), h.as_slice()))
        })
        .collect();

    let Some((_, axis)) = series.first() else {
        return Vec::new();
    };

    match alignment {
        Alignment::Positional => axis
            .iter()
            .enumerate()
            .map(|(i, anchor)| ComparisonPoint {
                date: anchor.date,
                values: series
                    .iter()
                    .filter_map(|(symbol, points)| {
                        let v = value(points.get(i)?, points[0].close, normalize)?;
                        Some((symbol.to_string(), v))
                    })
                    .collect(),
            })
            .collect(),
        Alignment::ByDate => {
            let by_date: Vec<(&str, f64, HashMap<NaiveDate, &HistoricalPoint>)> = series
                .iter()
                .map(|(symbol, points)| {
                    (
                        *symbol,
                        points[0].close,
                        points.iter().map(|p| (p.date, p)).collect(),
                    )
                })
                .collect();

            let dates: BTreeSet<NaiveDate> = series
                .iter()
                .flat_map(|(_, points)| points.iter().map(|p| p.date))
                .collect();

            dates
                .into_iter()
                .map(|date| ComparisonPoint {
                    date,
                    values: by_date
                        .iter()
                        .filter_map(|(symbol, base, points)| {
                            let v = value(points.get(&date)?, *base, normalize)?;
                            Some((symbol.to_string(), v))
                        })
                        .collect(),
                })
                .collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quotes::mock::{series, series_from};

    fn history(
        entries: Vec<(&str, Vec<HistoricalPoint>)>,
    ) -> HashMap<String, Vec<HistoricalPoint>> {
        entries.into_iter().map(|(s, h)| (s.to_string(), h)).collect()
    }

    fn symbols(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_normalized_percent_change() {
        let h = history(vec![("A", series(&[10.0, 12.0, 9.0]))]);
        let points = compute_series(&symbols(&["A"]), &h, true, Alignment::Positional);

        let values: Vec<f64> = points.iter().map(|p| p.values["A"]).collect();
        assert_eq!(values, vec![0.0, 20.0, -10.0]);
    }

    #[test]
    fn test_raw_closes_when_not_normalized() {
        let h = history(vec![("A", series(&[10.0, 12.0, 9.0]))]);
        let points = compute_series(&symbols(&["A"]), &h, false, Alignment::Positional);

        let values: Vec<f64> = points.iter().map(|p| p.values["A"]).collect();
        assert_eq!(values, vec![10.0, 12.0, 9.0]);
    }

    #[test]
    fn test_positional_uses_first_series_axis() {
        let h = history(vec![
            ("A", series(&[10.0, 11.0, 12.0])),
            ("B", series(&[20.0, 40.0])),
        ]);
        let points = compute_series(&symbols(&["A", "B"]), &h, true, Alignment::Positional);

        assert_eq!(points.len(), 3);
        assert_eq!(points[1].values["B"], 100.0);
        assert!(!points[2].values.contains_key("B"));
        assert_eq!(points[2].values["A"], 20.0);
    }

    #[test]
    fn test_zero_baseline_is_omitted() {
        let h = history(vec![
            ("A", series(&[10.0, 11.0])),
            ("Z", series(&[0.0, 5.0])),
        ]);
        let points = compute_series(&symbols(&["A", "Z"]), &h, true, Alignment::Positional);
        assert!(points.iter().all(|p| !p.values.contains_key("Z")));

        let raw = compute_series(&symbols(&["A", "Z"]), &h, false, Alignment::Positional);
        assert_eq!(raw[1].values["Z"], 5.0);
    }

    #[test]
    fn test_symbol_without_series_is_skipped() {
        let h = history(vec![("B", series(&[20.0, 30.0]))]);
        let points = compute_series(&symbols(&["A", "B"]), &h, true, Alignment::Positional);

        assert_eq!(points.len(), 2);
        assert_eq!(points[1].values["B"], 50.0);
    }

    #[test]
    fn test_by_date_aligns_on_calendar() {
        let jan1 = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let jan2 = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        let h = history(vec![
            ("A", series_from(jan1, &[10.0, 20.0])),
            ("B", series_from(jan2, &[50.0, 100.0])),
        ]);
        let points = compute_series(&symbols(&["A", "B"]), &h, true, Alignment::ByDate);

        assert_eq!(points.len(), 3);
        assert_eq!(points[0].date, jan1);
        assert!(!points[0].values.contains_key("B"));
        assert_eq!(points[1].values["A"], 100.0);
        assert_eq!(points[1].values["B"], 0.0);
        assert_eq!(points[2].values["B"], 100.0);
        assert!(!points[2].values.contains_key("A"));
    }

    #[test]
    fn test_empty_input() {
        assert!(compute_series(&[], &HashMap::new(), true, Alignment::ByDate).is_empty());
    }
}
