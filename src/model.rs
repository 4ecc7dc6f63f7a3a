use std::fmt;
use std::path::Path;

use linfa::prelude::*;
use linfa_logistic::{FittedLogisticRegression, LogisticRegression};
use ndarray::{Array1, Array2};
use serde::Serialize;

use crate::data::{self, RiskDataset};
use crate::risk::StudentRiskRequest;

pub const FEATURE_COUNT: usize = 10;

pub const FEATURE_NAMES: [&str; FEATURE_COUNT] = [
    "avg_grade",
    "grade_consistency",
    "grade_range",
    "num_assessments",
    "assessment_completion_rate",
    "studied_credits",
    "num_of_prev_attempts",
    "low_performance",
    "low_engagement",
    "has_previous_attempts",
];

// Schema maxima, used to bring every feature into [0, 1] before fitting.
const FEATURE_SCALE: [f64; FEATURE_COUNT] = [100.0, 100.0, 100.0, 50.0, 1.0, 300.0, 10.0, 1.0, 1.0, 1.0];

#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("failed to read dataset: {0}")]
    Csv(#[from] csv::Error),
    #[error("line {line}: {message}")]
    Parse { line: usize, message: String },
    #[error("dataset shape error: {0}")]
    Shape(#[from] ndarray::ShapeError),
    #[error("training failed: {0}")]
    Training(String),
}

#[derive(Debug, Clone, Serialize)]
pub struct ModelInfo {
    pub model_type: &'static str,
    pub trained: bool,
    pub feature_names: Vec<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accuracy: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub training_samples: Option<usize>,
}

/// Source of the at-risk probability behind every academic-risk prediction.
pub enum RiskModel {
    /// Rule-of-thumb scoring used when no dataset is configured.
    Demo,
    Trained {
        model: FittedLogisticRegression<f64, bool>,
        accuracy: f64,
        samples: usize,
    },
}

impl fmt::Debug for RiskModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RiskModel::Demo => f.write_str("RiskModel::Demo"),
            RiskModel::Trained { accuracy, samples, .. } => f
                .debug_struct("RiskModel::Trained")
                .field("accuracy", accuracy)
                .field("samples", samples)
                .finish(),
        }
    }
}

fn scale(features: &[f64; FEATURE_COUNT]) -> Array2<f64> {
    Array2::from_shape_fn((1, FEATURE_COUNT), |(_, j)| features[j] / FEATURE_SCALE[j])
}

impl RiskModel {
    /// Load and fit from `dataset`, or fall back to demo mode when it is absent or unusable.
    pub fn from_dataset_path(dataset: Option<&Path>) -> Self {
        let Some(path) = dataset else {
            tracing::info!("no risk dataset configured, academic risk runs in demo mode");
            return RiskModel::Demo;
        };

        match data::load_dataset(path).and_then(data::enhance_data_if_needed).and_then(|d| Self::train(&d)) {
            Ok(model) => model,
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "risk model unavailable, falling back to demo mode");
                RiskModel::Demo
            }
        }
    }

    pub fn train(dataset: &RiskDataset) -> Result<Self, ModelError> {
        tracing::info!(samples = dataset.len(), "📊 training logistic regression risk model");

        let scale = Array1::from(FEATURE_SCALE.to_vec());
        let features = &dataset.features / &scale;
        let training = Dataset::new(features.clone(), dataset.targets.clone());

        let model = LogisticRegression::default()
            .max_iterations(100)
            .fit(&training)
            .map_err(|e| ModelError::Training(e.to_string()))?;

        let predictions = model.predict(&features);
        let accuracy = data::calculate_accuracy(&predictions, &dataset.targets);
        tracing::info!("🎯 risk model trained, accuracy {:.2}%", accuracy * 100.0);

        Ok(RiskModel::Trained { model, accuracy, samples: dataset.len() })
    }

    pub fn is_trained(&self) -> bool {
        matches!(self, RiskModel::Trained { .. })
    }

    /// Probability in `[0, 1]` that the student is at risk.
    pub fn at_risk_probability(&self, request: &StudentRiskRequest) -> f64 {
        match self {
            RiskModel::Demo => demo_risk_score(request),
            RiskModel::Trained { model, .. } => {
                let x = scale(&request.features());
                let p = model.predict_probabilities(&x)[0];
                let predicted_at_risk = model.predict(&x)[0];
                // the returned probability belongs to the model's positive class, which may be `false`
                let p_at_risk = if predicted_at_risk == (p >= 0.5) { p } else { 1.0 - p };
                p_at_risk.clamp(0.0, 1.0)
            }
        }
    }

    pub fn info(&self) -> ModelInfo {
        let feature_names = FEATURE_NAMES.to_vec();
        match self {
            RiskModel::Demo => ModelInfo {
                model_type: "Demo Mode",
                trained: false,
                feature_names,
                accuracy: None,
                training_samples: None,
            },
            RiskModel::Trained { accuracy, samples, .. } => ModelInfo {
                model_type: "Logistic Regression",
                trained: true,
                feature_names,
                accuracy: Some(*accuracy),
                training_samples: Some(*samples),
            },
        }
    }
}

/// Heuristic at-risk score used in demo mode.
pub fn demo_risk_score(request: &StudentRiskRequest) -> f64 {
    let mut score = 0.3;

    if request.avg_grade < 40.0 {
        score += 0.3;
    } else if request.avg_grade < 60.0 {
        score += 0.15;
    }
    if request.num_assessments < 5 {
        score += 0.1;
    }
    if request.has_previous_attempts == 1 {
        score += 0.15;
    }
    if request.low_engagement == 1 {
        score += 0.1;
    }
    if request.low_performance == 1 {
        score += 0.1;
    }

    f64::clamp(score, 0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::risk::tests::request;
    use crate::risk::{assess, RiskLevel};

    fn struggling(id: &str) -> StudentRiskRequest {
        StudentRiskRequest {
            avg_grade: 30.0,
            grade_consistency: 40.0,
            grade_range: 60.0,
            num_assessments: 2,
            assessment_completion_rate: 0.3,
            studied_credits: 120.0,
            num_of_prev_attempts: 2,
            low_performance: 1,
            low_engagement: 1,
            has_previous_attempts: 1,
            ..request(id)
        }
    }

    #[test]
    fn test_demo_score_baseline_is_safe() {
        let model = RiskModel::Demo;
        let p = model.at_risk_probability(&request("STU1"));
        assert!((p - 0.3).abs() < 1e-12);
        assert_eq!(assess(&request("STU1"), p).risk_level, RiskLevel::Safe);
    }

    #[test]
    fn test_demo_score_accumulates_and_clamps() {
        let p = demo_risk_score(&struggling("STU2"));
        assert_eq!(p, 1.0);
        assert_eq!(assess(&struggling("STU2"), p).risk_level, RiskLevel::AtRisk);

        let middling = StudentRiskRequest { avg_grade: 55.0, num_assessments: 4, ..request("STU3") };
        let p = demo_risk_score(&middling);
        assert!((p - 0.55).abs() < 1e-12);
        assert_eq!(assess(&middling, p).risk_level, RiskLevel::AtRisk);

        let failing = StudentRiskRequest { avg_grade: 35.0, ..request("STU4") };
        let p = demo_risk_score(&failing);
        assert!((p - 0.6).abs() < 1e-12);
        assert_eq!(assess(&failing, p).risk_level, RiskLevel::AtRisk);
    }

    #[test]
    fn test_missing_dataset_falls_back_to_demo() {
        let model = RiskModel::from_dataset_path(Some(Path::new("/definitely/not/here.csv")));
        assert!(!model.is_trained());
        assert_eq!(model.info().model_type, "Demo Mode");
        assert!(!RiskModel::from_dataset_path(None).is_trained());
    }

    #[test]
    fn test_trained_model_ranks_struggling_students_higher() {
        let mut rows = Vec::new();
        for i in 0..12 {
            let bump = f64::from(i);
            rows.push(format!("{},{},{},{},0.9{},60,0,0,0,0,0", 75.0 + bump, 85.0 + bump / 2.0, 15, 9, i % 10));
            rows.push(format!("{},{},{},{},0.3{},120,2,1,1,1,1", 25.0 + bump, 40.0 + bump, 55, 3, i % 10));
        }
        let csv = format!("{}\n{}\n", FEATURE_NAMES.join(",") + ",at_risk", rows.join("\n"));
        let dataset = data::parse_dataset(csv.as_bytes()).unwrap();

        let model = RiskModel::train(&dataset).unwrap();
        assert!(model.is_trained());
        let info = model.info();
        assert!(info.accuracy.unwrap() > 0.5);
        assert_eq!(info.training_samples, Some(24));

        let good = model.at_risk_probability(&request("GOOD"));
        let bad = model.at_risk_probability(&struggling("BAD"));
        assert!((0.0..=1.0).contains(&good));
        assert!((0.0..=1.0).contains(&bad));
        assert!(bad > good, "bad={bad} good={good}");
    }
}
