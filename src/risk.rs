//! Academic-risk request/response contract and the level-keyed explanations
//! (recommendations, top risk factors) that accompany every prediction.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{check_range, check_student_id, ValidationError};

pub const MAX_STUDENT_ID_LEN: usize = 50;
const MAX_RISK_FACTORS: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RiskLevel {
    #[serde(rename = "Safe")]
    Safe,
    #[serde(rename = "Medium Risk")]
    MediumRisk,
    #[serde(rename = "At-Risk")]
    AtRisk,
}

impl RiskLevel {
    pub const ALL: [RiskLevel; 3] = [RiskLevel::Safe, RiskLevel::MediumRisk, RiskLevel::AtRisk];

    pub fn as_str(self) -> &'static str {
        match self {
            RiskLevel::Safe => "Safe",
            RiskLevel::MediumRisk => "Medium Risk",
            RiskLevel::AtRisk => "At-Risk",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RiskLevel {
    type Err = ValidationError;

    /// Accepts the display strings as well as URL-friendly slugs (`medium-risk`, `at_risk`).
    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let normalized: String = raw
            .trim()
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .map(|c| c.to_ascii_lowercase())
            .collect();
        match normalized.as_str() {
            "safe" => Ok(RiskLevel::Safe),
            "mediumrisk" | "medium" => Ok(RiskLevel::MediumRisk),
            "atrisk" => Ok(RiskLevel::AtRisk),
            _ => Err(ValidationError::new(
                "risk_level",
                format!("unknown risk level '{raw}' (expected Safe, Medium Risk or At-Risk)"),
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudentRiskRequest {
    pub student_id: String,
    pub avg_grade: f64,
    pub grade_consistency: f64,
    pub grade_range: f64,
    pub num_assessments: u32,
    pub assessment_completion_rate: f64,
    pub studied_credits: f64,
    pub num_of_prev_attempts: u32,
    pub low_performance: u8,
    pub low_engagement: u8,
    pub has_previous_attempts: u8,
}

fn check_flag(field: &str, value: u8) -> Result<(), ValidationError> {
    if value > 1 {
        return Err(ValidationError::new(field, "must be 0 or 1"));
    }
    Ok(())
}

fn check_count(field: &str, value: u32, max: u32) -> Result<(), ValidationError> {
    if value > max {
        return Err(ValidationError::new(field, format!("cannot exceed {max}")));
    }
    Ok(())
}

impl StudentRiskRequest {
    pub fn validate(&self) -> Result<(), ValidationError> {
        check_student_id(&self.student_id)?;
        if self.student_id.chars().count() > MAX_STUDENT_ID_LEN {
            return Err(ValidationError::new(
                "student_id",
                format!("Student ID must be less than {MAX_STUDENT_ID_LEN} characters"),
            ));
        }
        check_range("avg_grade", self.avg_grade, 0.0, 100.0)?;
        check_range("grade_consistency", self.grade_consistency, 0.0, 100.0)?;
        check_range("grade_range", self.grade_range, 0.0, 100.0)?;
        check_count("num_assessments", self.num_assessments, 50)?;
        check_range("assessment_completion_rate", self.assessment_completion_rate, 0.0, 1.0)?;
        check_range("studied_credits", self.studied_credits, 0.0, 300.0)?;
        check_count("num_of_prev_attempts", self.num_of_prev_attempts, 10)?;
        check_flag("low_performance", self.low_performance)?;
        check_flag("low_engagement", self.low_engagement)?;
        check_flag("has_previous_attempts", self.has_previous_attempts)?;
        Ok(())
    }

    /// Feature vector in model column order.
    pub fn features(&self) -> [f64; 10] {
        [
            self.avg_grade,
            self.grade_consistency,
            self.grade_range,
            f64::from(self.num_assessments),
            self.assessment_completion_rate,
            self.studied_credits,
            f64::from(self.num_of_prev_attempts),
            f64::from(self.low_performance),
            f64::from(self.low_engagement),
            f64::from(self.has_previous_attempts),
        ]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiskProbabilities {
    #[serde(rename = "Safe")]
    pub safe: f64,
    #[serde(rename = "Medium Risk")]
    pub medium_risk: f64,
    #[serde(rename = "At-Risk")]
    pub at_risk: f64,
}

impl RiskProbabilities {
    /// A single at-risk probability `s` is a two-class split: Safe=1-s,
    /// At-Risk=s. Medium Risk stays at zero.
    pub fn from_at_risk(s: f64) -> Self {
        let s = s.clamp(0.0, 1.0);
        Self { safe: 1.0 - s, medium_risk: 0.0, at_risk: s }
    }

    pub fn get(&self, level: RiskLevel) -> f64 {
        match level {
            RiskLevel::Safe => self.safe,
            RiskLevel::MediumRisk => self.medium_risk,
            RiskLevel::AtRisk => self.at_risk,
        }
    }

    /// Most likely level; ties favour the lower risk, so `s = 0.5` is Safe.
    pub fn most_likely(&self) -> RiskLevel {
        let mut best = RiskLevel::Safe;
        for level in RiskLevel::ALL {
            if self.get(level) > self.get(best) {
                best = level;
            }
        }
        best
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Impact {
    Critical,
    High,
    Medium,
    Low,
    Strength,
    Neutral,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskFactor {
    pub feature: String,
    pub value: f64,
    pub impact: Impact,
}

impl RiskFactor {
    fn new(feature: &str, value: f64, impact: Impact) -> Self {
        Self { feature: feature.to_string(), value, impact }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskPrediction {
    pub student_id: String,
    pub risk_level: RiskLevel,
    pub risk_score: f64,
    pub confidence: f64,
    pub probabilities: RiskProbabilities,
    pub recommendations: Vec<String>,
    pub top_risk_factors: Vec<RiskFactor>,
    pub prediction_id: String,
    pub timestamp: DateTime<Utc>,
}

/// Turn a model's at-risk probability into a full explained prediction.
pub fn assess(request: &StudentRiskRequest, at_risk_probability: f64) -> RiskPrediction {
    let probabilities = RiskProbabilities::from_at_risk(at_risk_probability);
    let risk_level = probabilities.most_likely();

    RiskPrediction {
        student_id: request.student_id.clone(),
        risk_level,
        risk_score: probabilities.at_risk,
        confidence: probabilities.get(risk_level) * 100.0,
        probabilities,
        recommendations: recommendations(request, risk_level),
        top_risk_factors: top_risk_factors(request, risk_level),
        prediction_id: Uuid::new_v4().to_string(),
        timestamp: Utc::now(),
    }
}

/// Canned response used by the mock service: risk follows the grade alone.
pub fn mock_assessment(request: &StudentRiskRequest) -> RiskPrediction {
    let risk_score = (1.0 - request.avg_grade / 100.0).clamp(0.0, 1.0);
    let (risk_level, probabilities) = if risk_score > 0.7 {
        (RiskLevel::AtRisk, RiskProbabilities { safe: 0.1, medium_risk: 0.2, at_risk: 0.7 })
    } else if risk_score > 0.3 {
        (RiskLevel::MediumRisk, RiskProbabilities { safe: 0.2, medium_risk: 0.6, at_risk: 0.2 })
    } else {
        (RiskLevel::Safe, RiskProbabilities { safe: 0.7, medium_risk: 0.2, at_risk: 0.1 })
    };

    RiskPrediction {
        student_id: request.student_id.clone(),
        risk_level,
        risk_score,
        confidence: 85.0,
        probabilities,
        recommendations: vec![
            "Schedule regular check-ins with academic advisor".to_string(),
            "Attend study skills workshops".to_string(),
            "Join peer study groups".to_string(),
        ],
        top_risk_factors: vec![
            RiskFactor::new("avg_grade", request.avg_grade, Impact::High),
            RiskFactor::new("assessment_completion_rate", request.assessment_completion_rate, Impact::Medium),
            RiskFactor::new("grade_consistency", request.grade_consistency, Impact::Low),
        ],
        prediction_id: format!("mock-{}", Uuid::new_v4()),
        timestamp: Utc::now(),
    }
}

pub fn recommendations(request: &StudentRiskRequest, level: RiskLevel) -> Vec<String> {
    let grade = request.avg_grade;
    let mut recs = Vec::new();
    match level {
        RiskLevel::AtRisk => {
            recs.push(format!("[URGENT] Grade {grade:.1}% requires immediate action"));
            recs.extend(
                [
                    "Schedule emergency meeting with academic advisor TODAY",
                    "Contact student support services immediately",
                    "Attend ALL remaining classes and support sessions",
                    "Dedicate minimum 15-20 hours/week to this course",
                    "Get a study buddy or peer mentor assigned",
                    "Focus on completing ALL remaining assessments",
                    "Consider academic skills workshops (time management, study techniques)",
                ]
                .map(String::from),
            );
        }
        RiskLevel::MediumRisk => {
            recs.push(format!("[WARNING] Current grade {grade:.1}% - aim to improve to 70%+"));
            recs.extend(
                [
                    "Schedule regular check-ins with your tutor (weekly)",
                    "Join study groups for collaborative learning",
                    "Create a structured study schedule and stick to it",
                    "Focus on completing all remaining assessments",
                    "Review and revise topics where you scored lowest",
                    "Attend all available support sessions and office hours",
                ]
                .map(String::from),
            );
        }
        RiskLevel::Safe => {
            recs.push(format!("[SUCCESS] Excellent work! Maintain current performance (grade: {grade:.1}%)"));
            recs.extend(
                [
                    "Continue completing all assessments on time",
                    "Work on maintaining consistency across assessments",
                    "Consider helping peers through peer mentoring",
                    "Explore advanced learning materials and challenges",
                    "Aim for distinction level (80%+) performance",
                ]
                .map(String::from),
            );
        }
    }
    recs
}

pub fn top_risk_factors(request: &StudentRiskRequest, level: RiskLevel) -> Vec<RiskFactor> {
    let r = request;
    let mut factors = Vec::new();
    let previous_attempts = f64::from(r.num_of_prev_attempts);
    let assessments = f64::from(r.num_assessments);

    match level {
        RiskLevel::AtRisk => {
            if r.avg_grade < 50.0 {
                factors.push(RiskFactor::new("avg_grade", r.avg_grade, Impact::Critical));
            } else if r.avg_grade < 60.0 {
                factors.push(RiskFactor::new("avg_grade", r.avg_grade, Impact::High));
            }
            if r.num_assessments < 5 {
                factors.push(RiskFactor::new("num_assessments", assessments, Impact::High));
            }
            if r.has_previous_attempts == 1 {
                factors.push(RiskFactor::new("previous_attempts", previous_attempts, Impact::High));
            }
            if r.low_engagement == 1 {
                factors.push(RiskFactor::new("low_engagement", 1.0, Impact::High));
            }
            if r.low_performance == 1 {
                factors.push(RiskFactor::new("low_performance", 1.0, Impact::High));
            }
            if r.grade_consistency < 70.0 {
                factors.push(RiskFactor::new("grade_consistency", r.grade_consistency, Impact::Medium));
            }
            if r.assessment_completion_rate < 0.7 {
                factors.push(RiskFactor::new(
                    "assessment_completion_rate",
                    r.assessment_completion_rate,
                    Impact::Medium,
                ));
            }
        }
        RiskLevel::MediumRisk => {
            if r.avg_grade < 70.0 {
                factors.push(RiskFactor::new("avg_grade", r.avg_grade, Impact::Medium));
            }
            if r.grade_consistency < 80.0 {
                factors.push(RiskFactor::new("grade_consistency", r.grade_consistency, Impact::Medium));
            }
            if r.num_assessments < 8 {
                factors.push(RiskFactor::new("num_assessments", assessments, Impact::Medium));
            }
            if r.assessment_completion_rate < 0.8 {
                factors.push(RiskFactor::new(
                    "assessment_completion_rate",
                    r.assessment_completion_rate,
                    Impact::Medium,
                ));
            }
            if r.low_engagement == 1 {
                factors.push(RiskFactor::new("low_engagement", 1.0, Impact::Medium));
            }
            if r.has_previous_attempts == 1 {
                factors.push(RiskFactor::new("previous_attempts", previous_attempts, Impact::Low));
            }
        }
        RiskLevel::Safe => {
            if r.avg_grade >= 70.0 {
                factors.push(RiskFactor::new("avg_grade", r.avg_grade, Impact::Strength));
            }
            if r.grade_consistency >= 85.0 {
                factors.push(RiskFactor::new("grade_consistency", r.grade_consistency, Impact::Strength));
            }
            if r.assessment_completion_rate >= 0.85 {
                factors.push(RiskFactor::new(
                    "assessment_completion_rate",
                    r.assessment_completion_rate,
                    Impact::Strength,
                ));
            }
            if r.num_assessments >= 8 {
                factors.push(RiskFactor::new("num_assessments", assessments, Impact::Strength));
            }
            if r.low_engagement == 0 {
                factors.push(RiskFactor::new("low_engagement", 0.0, Impact::Strength));
            }
        }
    }

    if factors.is_empty() {
        factors.push(RiskFactor::new("avg_grade", r.avg_grade, Impact::Neutral));
        factors.push(RiskFactor::new(
            "assessment_completion_rate",
            r.assessment_completion_rate,
            Impact::Neutral,
        ));
    }

    factors.truncate(MAX_RISK_FACTORS);
    factors
}

#[derive(Debug, Clone, Deserialize)]
pub struct BatchRiskRequest {
    pub students: Vec<StudentRiskRequest>,
}

impl BatchRiskRequest {
    /// Rejects the whole batch on the first invalid student, naming its index.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.students.is_empty() {
            return Err(ValidationError::new("students", "at least one student is required"));
        }
        for (index, student) in self.students.iter().enumerate() {
            student.validate().map_err(|err| {
                ValidationError::new(format!("students[{index}].{}", err.field), err.message)
            })?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub safe_count: usize,
    pub medium_risk_count: usize,
    pub at_risk_count: usize,
    pub avg_risk_score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchRiskResponse {
    pub total_students: usize,
    pub predictions: Vec<RiskPrediction>,
    pub summary: BatchSummary,
}

impl BatchRiskResponse {
    pub fn from_predictions(predictions: Vec<RiskPrediction>) -> Self {
        let count = |level: RiskLevel| predictions.iter().filter(|p| p.risk_level == level).count();
        let total_students = predictions.len();
        let avg_risk_score = if total_students > 0 {
            predictions.iter().map(|p| p.risk_score).sum::<f64>() / total_students as f64
        } else {
            0.0
        };
        let summary = BatchSummary {
            safe_count: count(RiskLevel::Safe),
            medium_risk_count: count(RiskLevel::MediumRisk),
            at_risk_count: count(RiskLevel::AtRisk),
            avg_risk_score,
        };
        Self { total_students, predictions, summary }
    }
}

/// Metrics a what-if scenario may override; unset fields keep the baseline value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WhatIfScenario {
    pub avg_grade: Option<f64>,
    pub grade_consistency: Option<f64>,
    pub assessment_completion_rate: Option<f64>,
    pub low_engagement: Option<u8>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangedMetric {
    pub feature: String,
    pub from: f64,
    pub to: f64,
}

impl WhatIfScenario {
    pub fn apply(&self, baseline: &StudentRiskRequest) -> (StudentRiskRequest, Vec<ChangedMetric>) {
        let mut scenario = baseline.clone();
        let mut changed = Vec::new();
        let mut track = |feature: &str, from: f64, to: f64| {
            if (from - to).abs() > f64::EPSILON {
                changed.push(ChangedMetric { feature: feature.to_string(), from, to });
            }
        };

        if let Some(v) = self.avg_grade {
            track("avg_grade", baseline.avg_grade, v);
            scenario.avg_grade = v;
        }
        if let Some(v) = self.grade_consistency {
            track("grade_consistency", baseline.grade_consistency, v);
            scenario.grade_consistency = v;
        }
        if let Some(v) = self.assessment_completion_rate {
            track("assessment_completion_rate", baseline.assessment_completion_rate, v);
            scenario.assessment_completion_rate = v;
        }
        if let Some(v) = self.low_engagement {
            track("low_engagement", f64::from(baseline.low_engagement), f64::from(v));
            scenario.low_engagement = v;
        }

        (scenario, changed)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct WhatIfRequest {
    pub baseline: StudentRiskRequest,
    #[serde(default)]
    pub scenario: WhatIfScenario,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WhatIfResponse {
    pub baseline: RiskPrediction,
    pub scenario: RiskPrediction,
    pub risk_delta: f64,
    pub level_changed: bool,
    pub changed_metrics: Vec<ChangedMetric>,
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn request(student_id: &str) -> StudentRiskRequest {
        StudentRiskRequest {
            student_id: student_id.to_string(),
            avg_grade: 72.0,
            grade_consistency: 88.0,
            grade_range: 20.0,
            num_assessments: 9,
            assessment_completion_rate: 0.9,
            studied_credits: 60.0,
            num_of_prev_attempts: 0,
            low_performance: 0,
            low_engagement: 0,
            has_previous_attempts: 0,
        }
    }

    #[test]
    fn test_validation_limits() {
        assert!(request("STU1").validate().is_ok());

        let bad = StudentRiskRequest { assessment_completion_rate: 1.2, ..request("STU1") };
        assert_eq!(bad.validate().unwrap_err().field, "assessment_completion_rate");

        let bad = StudentRiskRequest { low_engagement: 2, ..request("STU1") };
        assert_eq!(bad.validate().unwrap_err().field, "low_engagement");

        let bad = StudentRiskRequest { num_assessments: 51, ..request("STU1") };
        assert_eq!(bad.validate().unwrap_err().field, "num_assessments");

        let bad = request(&"x".repeat(51));
        assert_eq!(bad.validate().unwrap_err().field, "student_id");
    }

    #[test]
    fn test_probabilities_split_at_one_half() {
        for (s, expected) in [(0.1, RiskLevel::Safe), (0.5, RiskLevel::Safe), (0.51, RiskLevel::AtRisk), (0.9, RiskLevel::AtRisk)] {
            let p = RiskProbabilities::from_at_risk(s);
            assert!((p.safe + p.at_risk - 1.0).abs() < 1e-12);
            assert_eq!(p.medium_risk, 0.0);
            assert_eq!(p.most_likely(), expected);
        }
    }

    #[test]
    fn test_failing_grade_alone_is_at_risk() {
        let prediction = assess(&StudentRiskRequest { avg_grade: 35.0, ..request("STU4") }, 0.6);
        assert_eq!(prediction.risk_level, RiskLevel::AtRisk);
        assert!((prediction.confidence - 60.0).abs() < 1e-9);
        assert!((prediction.risk_score - 0.6).abs() < 1e-12);
    }

    #[test]
    fn test_assess_safe_student() {
        let prediction = assess(&request("STU1"), 0.3);
        assert_eq!(prediction.risk_level, RiskLevel::Safe);
        assert!((prediction.confidence - 70.0).abs() < 1e-9);
        assert_eq!(prediction.recommendations.len(), 6);
        assert!(prediction.recommendations[0].contains("72.0%"));
        assert!(prediction.top_risk_factors.iter().all(|f| f.impact == Impact::Strength));
        assert_eq!(prediction.top_risk_factors.len(), 5);
    }

    #[test]
    fn test_at_risk_factors_are_capped() {
        let struggling = StudentRiskRequest {
            avg_grade: 35.0,
            grade_consistency: 40.0,
            num_assessments: 2,
            assessment_completion_rate: 0.4,
            num_of_prev_attempts: 2,
            low_performance: 1,
            low_engagement: 1,
            has_previous_attempts: 1,
            ..request("STU2")
        };
        let prediction = assess(&struggling, 0.95);
        assert_eq!(prediction.risk_level, RiskLevel::AtRisk);
        assert_eq!(prediction.recommendations.len(), 8);
        assert_eq!(prediction.top_risk_factors.len(), 5);
        assert_eq!(prediction.top_risk_factors[0].impact, Impact::Critical);
    }

    #[test]
    fn test_mock_assessment_follows_grade() {
        let low = StudentRiskRequest { avg_grade: 20.0, ..request("STU3") };
        assert_eq!(mock_assessment(&low).risk_level, RiskLevel::AtRisk);
        let mid = StudentRiskRequest { avg_grade: 50.0, ..request("STU3") };
        assert_eq!(mock_assessment(&mid).risk_level, RiskLevel::MediumRisk);
        assert_eq!(mock_assessment(&request("STU3")).risk_level, RiskLevel::Safe);
        assert!(mock_assessment(&low).prediction_id.starts_with("mock-"));
    }

    #[test]
    fn test_risk_level_parsing() {
        assert_eq!("Medium Risk".parse::<RiskLevel>().unwrap(), RiskLevel::MediumRisk);
        assert_eq!("at-risk".parse::<RiskLevel>().unwrap(), RiskLevel::AtRisk);
        assert_eq!("SAFE".parse::<RiskLevel>().unwrap(), RiskLevel::Safe);
        assert!("critical".parse::<RiskLevel>().is_err());
        assert_eq!(serde_json::to_string(&RiskLevel::AtRisk).unwrap(), "\"At-Risk\"");
    }

    #[test]
    fn test_batch_validation_names_index() {
        let batch = BatchRiskRequest {
            students: vec![request("A"), StudentRiskRequest { avg_grade: 140.0, ..request("B") }],
        };
        assert_eq!(batch.validate().unwrap_err().field, "students[1].avg_grade");
        assert!(BatchRiskRequest { students: vec![] }.validate().is_err());
    }

    #[test]
    fn test_what_if_tracks_changes() {
        let scenario = WhatIfScenario { avg_grade: Some(85.0), low_engagement: Some(0), ..Default::default() };
        let (updated, changed) = scenario.apply(&request("STU4"));
        assert_eq!(updated.avg_grade, 85.0);
        // low_engagement was already 0
        assert_eq!(changed, vec![ChangedMetric { feature: "avg_grade".into(), from: 72.0, to: 85.0 }]);
    }
}
