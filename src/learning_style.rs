//! Learning-style scoring: four VARK style scores from a single questionnaire.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{check_min, check_range, check_student_id, ValidationError};

pub const DEFAULT_RECOMMENDATION_COUNT: usize = 5;
pub const MIN_RECOMMENDATION_COUNT: usize = 1;
pub const MAX_RECOMMENDATION_COUNT: usize = 10;

const PREFERENCE_WEIGHT: f64 = 20.0;
const CATEGORY_BONUS: f64 = 25.0;
const PARTICIPATION_BONUS: f64 = 10.0;
const MAX_CONFIDENCE: i32 = 95;
const BASE_CONFIDENCE: i32 = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LearningStyle {
    Visual,
    Auditory,
    Reading,
    Kinesthetic,
}

/// Tie-break order when two styles score the same.
pub const STYLE_ORDER: [LearningStyle; 4] =
    [LearningStyle::Visual, LearningStyle::Auditory, LearningStyle::Reading, LearningStyle::Kinesthetic];

impl LearningStyle {
    pub fn display_name(self) -> &'static str {
        match self {
            LearningStyle::Visual => "Visual",
            LearningStyle::Auditory => "Auditory",
            LearningStyle::Reading => "Reading/Writing",
            LearningStyle::Kinesthetic => "Kinesthetic",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            LearningStyle::Visual => "Learn best through seeing and visualizing",
            LearningStyle::Auditory => "Learn best through listening and discussing",
            LearningStyle::Reading => "Learn best through reading and writing",
            LearningStyle::Kinesthetic => "Learn best through hands-on experience",
        }
    }

    fn recommendations(self) -> [&'static str; 3] {
        match self {
            LearningStyle::Visual => [
                "Use diagrams, mind maps and colour-coded notes",
                "Watch video tutorials and animated walkthroughs",
                "Turn lecture notes into charts and concept maps",
            ],
            LearningStyle::Auditory => [
                "Record lectures and replay them while revising",
                "Explain concepts out loud or to a study partner",
                "Join discussion groups and podcast-style reviews",
            ],
            LearningStyle::Reading => [
                "Rewrite key ideas in your own words",
                "Use textbooks, articles and written summaries",
                "Keep structured lists and glossaries for each topic",
            ],
            LearningStyle::Kinesthetic => [
                "Practice hands-on exercises and lab work",
                "Build small projects that apply each lesson",
                "Take short active breaks and study in focused bursts",
            ],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoteTakingStyle {
    Visual,
    Written,
    Audio,
    Mixed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StudyEnvironment {
    Quiet,
    Music,
    Group,
    Varies,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RetentionMethod {
    Seeing,
    Hearing,
    Doing,
    Reading,
}

/// Questionnaire submitted by the learning-style form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LearningStyleForm {
    pub student_id: String,

    // 1-5 sliders
    pub prefers_diagrams: f64,
    pub prefers_lectures: f64,
    pub prefers_reading: f64,
    pub prefers_hands_on: f64,

    pub note_taking_style: NoteTakingStyle,
    pub study_environment: StudyEnvironment,
    pub retention_method: RetentionMethod,

    // minutes per session
    pub video_watch_time: f64,
    pub reading_time: f64,
    pub interactive_time: f64,
}

impl Default for LearningStyleForm {
    fn default() -> Self {
        Self {
            student_id: String::new(),
            prefers_diagrams: 3.0,
            prefers_lectures: 3.0,
            prefers_reading: 3.0,
            prefers_hands_on: 3.0,
            note_taking_style: NoteTakingStyle::Mixed,
            study_environment: StudyEnvironment::Varies,
            retention_method: RetentionMethod::Seeing,
            video_watch_time: 30.0,
            reading_time: 30.0,
            interactive_time: 30.0,
        }
    }
}

impl LearningStyleForm {
    /// The student id is checked first so a blank id never reaches the scorer.
    pub fn validate(&self) -> Result<(), ValidationError> {
        check_student_id(&self.student_id)?;
        check_range("prefers_diagrams", self.prefers_diagrams, 1.0, 5.0)?;
        check_range("prefers_lectures", self.prefers_lectures, 1.0, 5.0)?;
        check_range("prefers_reading", self.prefers_reading, 1.0, 5.0)?;
        check_range("prefers_hands_on", self.prefers_hands_on, 1.0, 5.0)?;
        check_min("video_watch_time", self.video_watch_time, 0.0)?;
        check_min("reading_time", self.reading_time, 0.0)?;
        check_min("interactive_time", self.interactive_time, 0.0)?;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StyleScores {
    pub visual: u8,
    pub auditory: u8,
    pub reading: u8,
    pub kinesthetic: u8,
}

impl StyleScores {
    pub fn get(&self, style: LearningStyle) -> u8 {
        match style {
            LearningStyle::Visual => self.visual,
            LearningStyle::Auditory => self.auditory,
            LearningStyle::Reading => self.reading,
            LearningStyle::Kinesthetic => self.kinesthetic,
        }
    }

    /// Styles sorted by descending score; equal scores keep [`STYLE_ORDER`].
    pub fn ranked(&self) -> [LearningStyle; 4] {
        let mut ranked = STYLE_ORDER;
        ranked.sort_by(|a, b| self.get(*b).cmp(&self.get(*a)));
        ranked
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LearningStyleResult {
    pub primary_style: LearningStyle,
    pub secondary_style: LearningStyle,
    pub style_scores: StyleScores,
    pub confidence: u8,
    pub recommendations: Vec<String>,
    pub timestamp: DateTime<Utc>,
}

fn clamp_score(raw: f64) -> u8 {
    raw.round().clamp(0.0, 100.0) as u8
}

fn minutes_contribution(minutes: f64) -> f64 {
    minutes / 60.0 * 10.0
}

fn bonus(matches: bool, amount: f64) -> f64 {
    if matches {
        amount
    } else {
        0.0
    }
}

/// Raw style scores. Callers are expected to have validated the form.
pub fn compute_scores(form: &LearningStyleForm) -> StyleScores {
    let participates = matches!(form.study_environment, StudyEnvironment::Group | StudyEnvironment::Music);

    let visual = form.prefers_diagrams * PREFERENCE_WEIGHT
        + bonus(form.note_taking_style == NoteTakingStyle::Visual, CATEGORY_BONUS)
        + minutes_contribution(form.video_watch_time);
    let auditory = form.prefers_lectures * PREFERENCE_WEIGHT
        + bonus(form.retention_method == RetentionMethod::Hearing, CATEGORY_BONUS)
        + bonus(participates, PARTICIPATION_BONUS);
    let reading = form.prefers_reading * PREFERENCE_WEIGHT
        + bonus(form.note_taking_style == NoteTakingStyle::Written, CATEGORY_BONUS)
        + minutes_contribution(form.reading_time);
    let kinesthetic = form.prefers_hands_on * PREFERENCE_WEIGHT
        + bonus(form.retention_method == RetentionMethod::Doing, CATEGORY_BONUS)
        + minutes_contribution(form.interactive_time);

    StyleScores {
        visual: clamp_score(visual),
        auditory: clamp_score(auditory),
        reading: clamp_score(reading),
        kinesthetic: clamp_score(kinesthetic),
    }
}

pub fn confidence(top: u8, second: u8) -> u8 {
    let gap = i32::from(top) - i32::from(second);
    (BASE_CONFIDENCE + gap).min(MAX_CONFIDENCE) as u8
}

pub fn canned_recommendations(primary: LearningStyle, secondary: LearningStyle) -> Vec<String> {
    primary
        .recommendations()
        .iter()
        .chain(secondary.recommendations().iter().take(2))
        .map(|s| (*s).to_string())
        .collect()
}

/// Validate then score a questionnaire.
pub fn score(form: &LearningStyleForm) -> Result<LearningStyleResult, ValidationError> {
    form.validate()?;

    let style_scores = compute_scores(form);
    let [primary, secondary, ..] = style_scores.ranked();

    Ok(LearningStyleResult {
        primary_style: primary,
        secondary_style: secondary,
        style_scores,
        confidence: confidence(style_scores.get(primary), style_scores.get(secondary)),
        recommendations: canned_recommendations(primary, secondary),
        timestamp: Utc::now(),
    })
}

/// Fixed result returned by the mock service, regardless of the answers.
pub fn mock_result() -> LearningStyleResult {
    LearningStyleResult {
        primary_style: LearningStyle::Visual,
        secondary_style: LearningStyle::Kinesthetic,
        style_scores: StyleScores { visual: 85, auditory: 60, reading: 70, kinesthetic: 75 },
        confidence: 85,
        recommendations: vec![
            "Use diagrams and visual aids".to_string(),
            "Watch video tutorials".to_string(),
            "Practice hands-on exercises".to_string(),
        ],
        timestamp: Utc::now(),
    }
}

pub fn clamp_recommendation_count(requested: Option<usize>) -> usize {
    requested
        .unwrap_or(DEFAULT_RECOMMENDATION_COUNT)
        .clamp(MIN_RECOMMENDATION_COUNT, MAX_RECOMMENDATION_COUNT)
}

/// Personalised study resources for a student, led by their primary style when known.
pub fn generate_recommendations(student_id: &str, style: Option<LearningStyle>, requested: Option<usize>) -> Vec<String> {
    let limit = clamp_recommendation_count(requested);

    let mut items: Vec<String> = Vec::with_capacity(MAX_RECOMMENDATION_COUNT + 3);
    if let Some(style) = style {
        items.extend(style.recommendations().iter().map(|s| (*s).to_string()));
    }
    items.push(format!("Summary cards for {student_id}"));
    items.extend(
        [
            "Topic-focused flashcards and recall drills",
            "Short practice quizzes with immediate feedback",
            "Concept map review session",
            "Guided worked examples followed by self-practice",
            "Mini project applying lesson concepts",
            "Peer explanation exercise",
            "Weekly spaced revision plan",
            "Video + notes recap sequence",
            "Confidence-based adaptive worksheet",
        ]
        .iter()
        .map(|s| (*s).to_string()),
    );

    items.truncate(limit);
    items
}
