//! Intervention action plans keyed by academic-risk level.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::risk::{RiskLevel, RiskPrediction};

const MAX_FACTOR_INTERVENTIONS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Critical,
    High,
    Medium,
    Standard,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Category {
    Academic,
    Engagement,
    TimeManagement,
    Support,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionItem {
    pub id: String,
    pub title: String,
    pub description: String,
    pub priority: Priority,
    pub category: Category,
    #[serde(default)]
    pub is_completed: bool,
    #[serde(default)]
    pub is_custom: bool,
}

type Template = (&'static str, &'static str, Priority, Category);

const SAFE_PLAN: [Template; 6] = [
    ("Maintain Excellence", "Continue your current study habits and maintain consistent performance across all modules", Priority::Standard, Category::Academic),
    ("Peer Mentoring", "Share your success strategies with struggling peers through study groups or tutoring", Priority::Medium, Category::Engagement),
    ("Advanced Challenges", "Explore additional learning materials, research papers, and advanced topics in your field", Priority::Standard, Category::Academic),
    ("Leadership Opportunities", "Take on leadership roles in group projects, class presentations, and student organizations", Priority::Medium, Category::Engagement),
    ("Aim for Distinction", "Set goals to achieve distinction-level grades (80%+) in all remaining modules", Priority::High, Category::Academic),
    ("Build Your Portfolio", "Work on side projects, research, or internships to enhance your academic portfolio", Priority::Medium, Category::Engagement),
];

const MEDIUM_RISK_PLAN: [Template; 7] = [
    ("Weekly Academic Check-ins", "Schedule weekly meetings with your tutor to review progress and address concerns immediately", Priority::High, Category::Support),
    ("Structured Study Schedule", "Create and follow a daily study timetable with specific goals for each 2-hour session", Priority::High, Category::TimeManagement),
    ("Join Study Groups", "Participate in peer study groups 2-3 times per week for collaborative learning and support", Priority::Medium, Category::Engagement),
    ("Complete All Assessments", "Prioritize completing all assignments on time, even if perfection isn't possible initially", Priority::Critical, Category::Academic),
    ("Improve Weak Areas", "Identify subjects where you scored below 60% and dedicate 3+ hours weekly to improvement", Priority::High, Category::Academic),
    ("Use Learning Resources", "Access library resources, online tutorials, academic workshops, and supplementary materials", Priority::Medium, Category::Academic),
    ("Active Class Participation", "Attend all classes, ask questions, and engage actively with course materials and discussions", Priority::High, Category::Engagement),
];

const AT_RISK_PLAN: [Template; 9] = [
    ("URGENT: Emergency Academic Advisor Meeting", "Schedule immediate meeting with academic advisor to create a comprehensive intervention plan", Priority::Critical, Category::Support),
    ("Intensive Tutoring Sessions", "Attend mandatory tutoring sessions 3-4 times per week for all struggling subjects", Priority::Critical, Category::Support),
    ("Daily Study Commitment", "Dedicate minimum 3-4 hours daily to focused study with regular 10-minute breaks", Priority::Critical, Category::TimeManagement),
    ("Complete Overdue Work", "Immediately prioritize and complete all missing or late assignments - negotiate extensions if needed", Priority::Critical, Category::Academic),
    ("Attend All Classes", "Ensure 100% attendance in all lectures, labs, tutorials, and mandatory sessions", Priority::Critical, Category::Engagement),
    ("Academic Skills Workshop", "Enroll in academic skills workshops for time management, study techniques, exam preparation", Priority::High, Category::Support),
    ("Weekly Progress Reports", "Submit weekly progress reports to your academic advisor showing all completed work and improvements", Priority::High, Category::Academic),
    ("Seek Counseling Support", "If personal issues are affecting studies, schedule counseling sessions immediately", Priority::Medium, Category::Support),
    ("Create Recovery Plan", "Work with advisor to create detailed recovery plan with specific grades needed to pass", Priority::Critical, Category::Academic),
];

/// The fixed plan for a risk level.
pub fn plan_for(level: RiskLevel) -> Vec<ActionItem> {
    let templates: &[Template] = match level {
        RiskLevel::Safe => &SAFE_PLAN,
        RiskLevel::MediumRisk => &MEDIUM_RISK_PLAN,
        RiskLevel::AtRisk => &AT_RISK_PLAN,
    };

    templates
        .iter()
        .enumerate()
        .map(|(i, (title, description, priority, category))| ActionItem {
            id: (i + 1).to_string(),
            title: (*title).to_string(),
            description: (*description).to_string(),
            priority: *priority,
            category: *category,
            is_completed: false,
            is_custom: false,
        })
        .collect()
}

/// Whole-number percentage of completed items, 0 for an empty plan.
pub fn progress(plan: &[ActionItem]) -> f64 {
    if plan.is_empty() {
        return 0.0;
    }
    let done = plan.iter().filter(|a| a.is_completed).count();
    (done as f64 / plan.len() as f64 * 100.0).round()
}

#[derive(Debug, Clone, Deserialize)]
pub struct CustomActionForm {
    pub title: String,
    pub description: String,
    pub priority: Priority,
    pub category: Category,
}

impl CustomActionForm {
    pub fn validate(&self) -> Result<(), ValidationError> {
        let title = self.title.trim().chars().count();
        if !(3..=100).contains(&title) {
            return Err(ValidationError::new("title", "Title must be between 3 and 100 characters"));
        }
        let description = self.description.trim().chars().count();
        if !(10..=500).contains(&description) {
            return Err(ValidationError::new("description", "Description must be between 10 and 500 characters"));
        }
        Ok(())
    }

    pub fn into_item(self, id: String) -> Result<ActionItem, ValidationError> {
        self.validate()?;
        Ok(ActionItem {
            id,
            title: self.title.trim().to_string(),
            description: self.description.trim().to_string(),
            priority: self.priority,
            category: self.category,
            is_completed: false,
            is_custom: true,
        })
    }
}

fn recommendation_priority(index: usize, level: RiskLevel) -> Priority {
    match (level, index) {
        (RiskLevel::Safe, 0) => Priority::Medium,
        (RiskLevel::Safe, _) => Priority::Standard,
        (RiskLevel::MediumRisk, 0) => Priority::High,
        (RiskLevel::MediumRisk, 1) => Priority::Medium,
        (RiskLevel::MediumRisk, _) => Priority::Standard,
        (RiskLevel::AtRisk, 0) => Priority::Critical,
        (RiskLevel::AtRisk, 1) => Priority::High,
        (RiskLevel::AtRisk, _) => Priority::Medium,
    }
}

fn categorize(recommendation: &str) -> Category {
    let lower = recommendation.to_lowercase();
    let any = |words: &[&str]| words.iter().any(|w| lower.contains(w));

    if any(&["tutor", "advisor", "counseling", "support"]) {
        Category::Support
    } else if any(&["attend", "participate", "engage", "study group"]) {
        Category::Engagement
    } else if any(&["schedule", "time", "deadline", "plan"]) {
        Category::TimeManagement
    } else {
        Category::Academic
    }
}

fn factor_intervention(feature: &str, value: f64) -> Option<(String, String, Priority, Category)> {
    let f = feature.to_lowercase();
    let high_impact = value > 0.5;
    let pick = |hi: Priority, lo: Priority| if high_impact { hi } else { lo };

    let item = if f.contains("consistency") {
        (
            "Build Grade Consistency".to_string(),
            "Create a structured study schedule and review materials regularly to avoid performance fluctuations."
                .to_string(),
            pick(Priority::High, Priority::Medium),
            Category::TimeManagement,
        )
    } else if f.contains("grade") {
        (
            "Improve Grade Performance".to_string(),
            format!(
                "Your {feature} is a significant risk factor. Schedule weekly tutoring sessions and focus on core concepts."
            ),
            pick(Priority::Critical, Priority::High),
            Category::Academic,
        )
    } else if f.contains("assessment") || f.contains("completion") {
        (
            "Complete All Assessments".to_string(),
            "Prioritize completing all assignments on time. Use a task tracker to avoid missing deadlines.".to_string(),
            Priority::Critical,
            Category::Academic,
        )
    } else if f.contains("engagement") {
        (
            "Increase Class Engagement".to_string(),
            "Attend all classes, participate actively in discussions, and join study groups to improve engagement."
                .to_string(),
            pick(Priority::Critical, Priority::High),
            Category::Engagement,
        )
    } else if f.contains("low_performance") {
        (
            "Address Performance Issues".to_string(),
            "Meet with your academic advisor immediately to create a recovery plan and access support resources."
                .to_string(),
            Priority::Critical,
            Category::Support,
        )
    } else if f.contains("attempts") {
        (
            "Learn from Past Attempts".to_string(),
            "Review what went wrong previously and implement new study strategies. Consider changing your approach."
                .to_string(),
            Priority::High,
            Category::Academic,
        )
    } else if f.contains("credit") {
        (
            "Manage Course Load".to_string(),
            "Review your course load with an advisor. Consider reducing credits if overwhelmed or adding support courses."
                .to_string(),
            Priority::Medium,
            Category::Support,
        )
    } else {
        return None;
    };
    Some(item)
}

/// Plan built from a prediction's own recommendations and top risk factors.
///
/// Titles are unique; an item whose title already appears in `existing` keeps
/// that item's completion state.
pub fn dynamic_plan(prediction: &RiskPrediction, existing: &[ActionItem]) -> Vec<ActionItem> {
    let mut plan: Vec<ActionItem> = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();

    let mut push = |title: String, description: String, priority: Priority, category: Category| {
        if !seen.insert(title.clone()) {
            tracing::debug!(%title, "skipping duplicate action");
            return;
        }
        let is_completed = existing.iter().any(|item| item.title == title && item.is_completed);
        plan.push(ActionItem {
            id: format!("action-{}", seen.len()),
            title,
            description,
            priority,
            category,
            is_completed,
            is_custom: false,
        });
    };

    for (index, rec) in prediction.recommendations.iter().enumerate() {
        push(
            rec.clone(),
            "Recommendation based on your risk profile".to_string(),
            recommendation_priority(index, prediction.risk_level),
            categorize(rec),
        );
    }

    for factor in prediction.top_risk_factors.iter().take(MAX_FACTOR_INTERVENTIONS) {
        if let Some((title, description, priority, category)) = factor_intervention(&factor.feature, factor.value) {
            push(title, description, priority, category);
        }
    }

    plan
}
