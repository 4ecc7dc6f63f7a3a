use std::io::Read;
use std::path::Path;

use csv::Reader;
use ndarray::{Array1, Array2};

use crate::model::{ModelError, FEATURE_COUNT};

/// Labelled academic-risk samples: ten feature columns plus an at-risk flag.
#[derive(Debug, Clone)]
pub struct RiskDataset {
    pub features: Array2<f64>,
    pub targets: Array1<bool>,
}

impl RiskDataset {
    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    pub fn class_counts(&self) -> (usize, usize) {
        let at_risk = self.targets.iter().filter(|&&x| x).count();
        (at_risk, self.targets.len() - at_risk)
    }
}

pub fn load_dataset(path: &Path) -> Result<RiskDataset, ModelError> {
    let rdr = Reader::from_path(path)?;
    read_records(rdr)
}

/// Parse CSV with a header row; columns are the model features in order, then `at_risk` (0/1).
pub fn parse_dataset<R: Read>(input: R) -> Result<RiskDataset, ModelError> {
    read_records(Reader::from_reader(input))
}

fn read_records<R: Read>(mut rdr: Reader<R>) -> Result<RiskDataset, ModelError> {
    let mut rows: Vec<[f64; FEATURE_COUNT + 1]> = Vec::new();

    for (index, result) in rdr.records().enumerate() {
        let record = result?;
        let line = index + 2;
        if record.len() < FEATURE_COUNT + 1 {
            return Err(ModelError::Parse {
                line,
                message: format!("expected {} columns, found {}", FEATURE_COUNT + 1, record.len()),
            });
        }
        let mut row = [0.0; FEATURE_COUNT + 1];
        for (col, slot) in row.iter_mut().enumerate() {
            let raw = record[col].trim();
            *slot = raw
                .parse()
                .map_err(|_| ModelError::Parse { line, message: format!("column {col}: '{raw}' is not a number") })?;
        }
        rows.push(row);
    }

    to_dataset(rows)
}

fn to_dataset(rows: Vec<[f64; FEATURE_COUNT + 1]>) -> Result<RiskDataset, ModelError> {
    let num_rows = rows.len();
    let targets = Array1::from_iter(rows.iter().map(|row| row[FEATURE_COUNT] > 0.5));
    let flat: Vec<f64> = rows.iter().flat_map(|row| row[..FEATURE_COUNT].iter().copied()).collect();
    let features = Array2::from_shape_vec((num_rows, FEATURE_COUNT), flat)?;
    Ok(RiskDataset { features, targets })
}

pub fn calculate_accuracy(predictions: &Array1<bool>, targets: &Array1<bool>) -> f64 {
    if targets.is_empty() {
        return 0.0;
    }
    predictions.iter().zip(targets.iter()).filter(|(&pred, &actual)| pred == actual).count() as f64
        / targets.len() as f64
}

/// Pads a dataset that lacks examples of either class with clear-cut anchor
/// profiles so the classifier always sees both outcomes.
pub fn enhance_data_if_needed(data: RiskDataset) -> Result<RiskDataset, ModelError> {
    let (at_risk, safe) = data.class_counts();
    tracing::info!(at_risk, safe, "risk dataset class distribution");

    if at_risk >= 2 && safe >= 2 {
        return Ok(data);
    }

    tracing::warn!("adding synthetic anchor rows for better training");
    let mut rows: Vec<[f64; FEATURE_COUNT + 1]> = vec![
        [25.0, 35.0, 60.0, 2.0, 0.3, 120.0, 2.0, 1.0, 1.0, 1.0, 1.0],
        [38.0, 45.0, 50.0, 3.0, 0.4, 90.0, 1.0, 1.0, 1.0, 1.0, 1.0],
        [85.0, 90.0, 15.0, 10.0, 0.95, 60.0, 0.0, 0.0, 0.0, 0.0, 0.0],
        [78.0, 88.0, 20.0, 9.0, 0.9, 60.0, 0.0, 0.0, 0.0, 0.0, 0.0],
    ];
    for (features, &target) in data.features.rows().into_iter().zip(data.targets.iter()) {
        let mut row = [0.0; FEATURE_COUNT + 1];
        for (slot, value) in row.iter_mut().zip(features.iter()) {
            *slot = *value;
        }
        row[FEATURE_COUNT] = if target { 1.0 } else { 0.0 };
        rows.push(row);
    }
    to_dataset(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    const CSV: &str = "\
avg_grade,grade_consistency,grade_range,num_assessments,assessment_completion_rate,studied_credits,num_of_prev_attempts,low_performance,low_engagement,has_previous_attempts,at_risk
82,90,15,10,0.95,60,0,0,0,0,0
35,40,55,3,0.4,120,2,1,1,1,1
";

    #[test]
    fn test_parse_dataset() {
        let data = parse_dataset(CSV.as_bytes()).unwrap();
        assert_eq!(data.len(), 2);
        assert_eq!(data.features.shape(), &[2, FEATURE_COUNT]);
        assert_eq!(data.targets.to_vec(), vec![false, true]);
        assert_eq!(data.features[[1, 0]], 35.0);
    }

    #[test]
    fn test_parse_reports_bad_line() {
        let bad = CSV.replace("35,40", "35,abc");
        match parse_dataset(bad.as_bytes()) {
            Err(ModelError::Parse { line, .. }) => assert_eq!(line, 3),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_enhance_adds_both_classes() {
        let data = parse_dataset(CSV.as_bytes()).unwrap();
        let enhanced = enhance_data_if_needed(data).unwrap();
        assert_eq!(enhanced.len(), 6);
        let (at_risk, safe) = enhanced.class_counts();
        assert_eq!((at_risk, safe), (3, 3));
    }

    #[test]
    fn test_accuracy_calculation() {
        let predictions = Array1::from(vec![true, true, false, true]);
        let targets = Array1::from(vec![true, false, false, true]);
        assert_eq!(calculate_accuracy(&predictions, &targets), 0.75);
    }
}
