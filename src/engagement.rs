//! Engagement scoring over LMS activity metrics.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{check_min, check_range, check_student_id, ValidationError};

const MAX_RECOMMENDATIONS: usize = 5;
const MAX_INTERVENTIONS: usize = 5;

const LOW_COMPLETION: &str = "Low assignment completion rate";
const INFREQUENT_LOGINS: &str = "Infrequent logins";
const LIMITED_FORUM: &str = "Limited forum participation";
const LOW_VIDEO: &str = "Low video engagement";
const SHORT_SESSIONS: &str = "Short session durations";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngagementForm {
    pub student_id: String,
    // activity
    pub login_frequency: f64,
    pub session_duration: f64,
    pub page_views: f64,
    // academic, percentages 0-100
    pub assignments_completed: f64,
    pub assignments_on_time: f64,
    pub quiz_attempts: f64,
    pub quiz_scores: f64,
    // social
    pub forum_posts: f64,
    pub forum_replies: f64,
    pub group_participation: f64,
    // content
    pub video_completion_rate: f64,
    pub resource_downloads: f64,
    pub time_on_task: f64,
}

impl Default for EngagementForm {
    fn default() -> Self {
        Self {
            student_id: String::new(),
            login_frequency: 5.0,
            session_duration: 30.0,
            page_views: 10.0,
            assignments_completed: 80.0,
            assignments_on_time: 75.0,
            quiz_attempts: 1.0,
            quiz_scores: 70.0,
            forum_posts: 2.0,
            forum_replies: 3.0,
            group_participation: 3.0,
            video_completion_rate: 70.0,
            resource_downloads: 3.0,
            time_on_task: 120.0,
        }
    }
}

impl EngagementForm {
    pub fn validate(&self) -> Result<(), ValidationError> {
        check_student_id(&self.student_id)?;
        check_min("login_frequency", self.login_frequency, 0.0)?;
        check_min("session_duration", self.session_duration, 0.0)?;
        check_min("page_views", self.page_views, 0.0)?;
        check_range("assignments_completed", self.assignments_completed, 0.0, 100.0)?;
        check_range("assignments_on_time", self.assignments_on_time, 0.0, 100.0)?;
        check_min("quiz_attempts", self.quiz_attempts, 1.0)?;
        check_range("quiz_scores", self.quiz_scores, 0.0, 100.0)?;
        check_min("forum_posts", self.forum_posts, 0.0)?;
        check_min("forum_replies", self.forum_replies, 0.0)?;
        check_range("group_participation", self.group_participation, 1.0, 5.0)?;
        check_range("video_completion_rate", self.video_completion_rate, 0.0, 100.0)?;
        check_min("resource_downloads", self.resource_downloads, 0.0)?;
        check_min("time_on_task", self.time_on_task, 0.0)?;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngagementLevel {
    HighlyEngaged,
    Engaged,
    AtRisk,
    Disengaged,
}

impl EngagementLevel {
    pub fn from_score(score: u8) -> Self {
        match score {
            80.. => EngagementLevel::HighlyEngaged,
            60..=79 => EngagementLevel::Engaged,
            40..=59 => EngagementLevel::AtRisk,
            _ => EngagementLevel::Disengaged,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            EngagementLevel::HighlyEngaged => "highly_engaged",
            EngagementLevel::Engaged => "engaged",
            EngagementLevel::AtRisk => "at_risk",
            EngagementLevel::Disengaged => "disengaged",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Improving,
    Stable,
    Declining,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetailedScores {
    pub academic: u8,
    pub social: u8,
    pub behavioral: u8,
    pub content: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngagementResult {
    pub engagement_level: EngagementLevel,
    pub engagement_score: u8,
    pub risk_factors: Vec<String>,
    pub strengths: Vec<String>,
    pub trend: Trend,
    pub recommendations: Vec<String>,
    pub detailed_scores: DetailedScores,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InterventionPriority {
    Urgent,
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InterventionCategory {
    Academic,
    Social,
    Motivational,
    Technical,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterventionItem {
    pub id: String,
    pub title: String,
    pub description: String,
    pub priority: InterventionPriority,
    pub category: InterventionCategory,
    pub is_completed: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngagementPrediction {
    pub result: EngagementResult,
    pub interventions: Vec<InterventionItem>,
}

fn capped(value: f64) -> f64 {
    value.min(100.0)
}

fn round_score(value: f64) -> u8 {
    value.round().clamp(0.0, 100.0) as u8
}

/// Validate, score and plan interventions for one submission.
pub fn predict(form: &EngagementForm) -> Result<EngagementPrediction, ValidationError> {
    form.validate()?;
    let result = calculate(form);
    let interventions = interventions(&result);
    Ok(EngagementPrediction { result, interventions })
}

/// Weighted engagement score. Expects a validated form.
pub fn calculate(form: &EngagementForm) -> EngagementResult {
    let academic = form.assignments_completed * 0.3 + form.assignments_on_time * 0.3 + form.quiz_scores * 0.4;

    let social = capped(form.forum_posts * 10.0) * 0.3
        + capped(form.forum_replies * 5.0) * 0.3
        + form.group_participation * 20.0 * 0.4;

    let behavioral = capped(form.login_frequency * 10.0) * 0.4
        + capped(form.session_duration * 2.0) * 0.3
        + capped(form.page_views * 5.0) * 0.3;

    let content = form.video_completion_rate * 0.4
        + capped(form.resource_downloads * 10.0) * 0.3
        + capped(form.time_on_task / 60.0 * 10.0) * 0.3;

    let engagement_score = round_score(academic * 0.35 + social * 0.15 + behavioral * 0.25 + content * 0.25);
    let engagement_level = EngagementLevel::from_score(engagement_score);

    let mut risk_factors = Vec::new();
    if form.assignments_completed < 70.0 {
        risk_factors.push(LOW_COMPLETION.to_string());
    }
    if form.login_frequency < 3.0 {
        risk_factors.push(INFREQUENT_LOGINS.to_string());
    }
    if form.forum_posts + form.forum_replies < 2.0 {
        risk_factors.push(LIMITED_FORUM.to_string());
    }
    if form.video_completion_rate < 50.0 {
        risk_factors.push(LOW_VIDEO.to_string());
    }
    if form.session_duration < 15.0 {
        risk_factors.push(SHORT_SESSIONS.to_string());
    }

    let mut strengths = Vec::new();
    if form.assignments_on_time >= 90.0 {
        strengths.push("Excellent time management".to_string());
    }
    if form.quiz_scores >= 80.0 {
        strengths.push("Strong academic performance".to_string());
    }
    if form.group_participation >= 4.0 {
        strengths.push("Active group participation".to_string());
    }
    if form.video_completion_rate >= 80.0 {
        strengths.push("High content engagement".to_string());
    }

    let trend = match engagement_score {
        70.. => Trend::Improving,
        50..=69 => Trend::Stable,
        _ => Trend::Declining,
    };

    let recommendations = recommendations(engagement_level, &risk_factors);

    EngagementResult {
        engagement_level,
        engagement_score,
        risk_factors,
        strengths,
        trend,
        recommendations,
        detailed_scores: DetailedScores {
            academic: round_score(academic),
            social: round_score(social),
            behavioral: round_score(behavioral),
            content: round_score(content),
        },
        timestamp: Utc::now(),
    }
}

pub fn recommendations(level: EngagementLevel, risk_factors: &[String]) -> Vec<String> {
    let has = |factor: &str| risk_factors.iter().any(|f| f == factor);
    let mut recs = Vec::new();

    if has(LOW_COMPLETION) {
        recs.push("Set up assignment reminders and break tasks into smaller chunks");
    }
    if has(INFREQUENT_LOGINS) {
        recs.push("Schedule regular study sessions and use mobile app for quick access");
    }
    if has(LIMITED_FORUM) {
        recs.push("Start with responding to existing threads before creating new posts");
    }
    if has(LOW_VIDEO) {
        recs.push("Try watching videos at 1.25x speed and take notes to stay focused");
    }
    if has(SHORT_SESSIONS) {
        recs.push("Use the Pomodoro technique: 25 minutes focus, 5 minutes break");
    }

    match level {
        EngagementLevel::HighlyEngaged => recs.push("Consider becoming a peer tutor or study group leader"),
        EngagementLevel::Disengaged => recs.push("Schedule a meeting with academic advisor to discuss goals"),
        _ => {}
    }

    recs.into_iter().take(MAX_RECOMMENDATIONS).map(str::to_string).collect()
}

pub fn interventions(result: &EngagementResult) -> Vec<InterventionItem> {
    let mut items = Vec::new();

    if matches!(result.engagement_level, EngagementLevel::AtRisk | EngagementLevel::Disengaged) {
        items.push(InterventionItem {
            id: "1".to_string(),
            title: "Schedule Advisor Meeting".to_string(),
            description: "Meet with academic advisor to discuss engagement concerns".to_string(),
            priority: if result.engagement_level == EngagementLevel::Disengaged {
                InterventionPriority::Urgent
            } else {
                InterventionPriority::High
            },
            category: InterventionCategory::Academic,
            is_completed: false,
        });
    }

    for (index, factor) in result.risk_factors.iter().enumerate() {
        let lower = factor.to_lowercase();
        let category = if lower.contains("forum") {
            InterventionCategory::Social
        } else if lower.contains("assignment") {
            InterventionCategory::Academic
        } else {
            InterventionCategory::Motivational
        };
        items.push(InterventionItem {
            id: (index + 2).to_string(),
            title: format!("Address: {factor}"),
            description: result
                .recommendations
                .get(index)
                .cloned()
                .unwrap_or_else(|| "Work on improving this area".to_string()),
            priority: if index == 0 { InterventionPriority::High } else { InterventionPriority::Medium },
            category,
            is_completed: false,
        });
    }

    items.truncate(MAX_INTERVENTIONS);
    items
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form() -> EngagementForm {
        EngagementForm { student_id: "STU0100".into(), ..EngagementForm::default() }
    }

    #[test]
    fn test_default_form_scores() {
        let result = calculate(&form());
        // academic 24 + 22.5 + 28 = 74.5
        assert_eq!(result.detailed_scores.academic, 75);
        // social 6 + 4.5 + 24 = 34.5
        assert_eq!(result.detailed_scores.social, 35);
        // behavioral 20 + 18 + 15 = 53
        assert_eq!(result.detailed_scores.behavioral, 53);
        // content 28 + 9 + 6 = 43
        assert_eq!(result.detailed_scores.content, 43);
        // 26.075 + 5.175 + 13.25 + 10.75 = 55.25
        assert_eq!(result.engagement_score, 55);
        assert_eq!(result.engagement_level, EngagementLevel::AtRisk);
        assert_eq!(result.trend, Trend::Stable);
        assert!(result.risk_factors.is_empty());
    }

    #[test]
    fn test_highly_engaged_student() {
        let input = EngagementForm {
            login_frequency: 12.0,
            session_duration: 60.0,
            page_views: 25.0,
            assignments_completed: 100.0,
            assignments_on_time: 95.0,
            quiz_scores: 92.0,
            forum_posts: 10.0,
            forum_replies: 20.0,
            group_participation: 5.0,
            video_completion_rate: 95.0,
            resource_downloads: 12.0,
            time_on_task: 900.0,
            ..form()
        };
        let result = calculate(&input);
        assert!(result.engagement_score >= 80, "score {}", result.engagement_score);
        assert_eq!(result.engagement_level, EngagementLevel::HighlyEngaged);
        assert_eq!(result.trend, Trend::Improving);
        assert_eq!(result.strengths.len(), 4);
        assert_eq!(result.recommendations, vec!["Consider becoming a peer tutor or study group leader"]);
        assert!(interventions(&result).is_empty());
    }

    #[test]
    fn test_disengaged_student_gets_urgent_plan() {
        let input = EngagementForm {
            login_frequency: 1.0,
            session_duration: 5.0,
            page_views: 2.0,
            assignments_completed: 20.0,
            assignments_on_time: 10.0,
            quiz_scores: 30.0,
            forum_posts: 0.0,
            forum_replies: 0.0,
            group_participation: 1.0,
            video_completion_rate: 10.0,
            resource_downloads: 0.0,
            time_on_task: 0.0,
            ..form()
        };
        let prediction = predict(&input).unwrap();
        let result = &prediction.result;
        assert_eq!(result.engagement_level, EngagementLevel::Disengaged);
        assert_eq!(result.trend, Trend::Declining);
        assert_eq!(result.risk_factors.len(), 5);
        assert_eq!(result.recommendations.len(), 5);

        let plan = &prediction.interventions;
        assert_eq!(plan.len(), 5);
        assert_eq!(plan[0].priority, InterventionPriority::Urgent);
        assert_eq!(plan[1].title, "Address: Low assignment completion rate");
        assert_eq!(plan[1].priority, InterventionPriority::High);
        assert_eq!(plan[1].category, InterventionCategory::Academic);
        assert_eq!(plan[3].category, InterventionCategory::Social);
        assert_eq!(plan[2].category, InterventionCategory::Motivational);
    }

    #[test]
    fn test_level_thresholds() {
        assert_eq!(EngagementLevel::from_score(80), EngagementLevel::HighlyEngaged);
        assert_eq!(EngagementLevel::from_score(79), EngagementLevel::Engaged);
        assert_eq!(EngagementLevel::from_score(60), EngagementLevel::Engaged);
        assert_eq!(EngagementLevel::from_score(40), EngagementLevel::AtRisk);
        assert_eq!(EngagementLevel::from_score(39), EngagementLevel::Disengaged);
    }

    #[test]
    fn test_validation() {
        let err = predict(&EngagementForm::default()).unwrap_err();
        assert_eq!(err.field, "student_id");

        let bad = EngagementForm { quiz_attempts: 0.0, ..form() };
        assert_eq!(predict(&bad).unwrap_err().field, "quiz_attempts");

        let bad = EngagementForm { video_completion_rate: 120.0, ..form() };
        assert_eq!(predict(&bad).unwrap_err().field, "video_completion_rate");
    }
}
