use serde::Serialize;
use std::collections::BTreeMap;

use crate::engagement::EngagementLevel;
use crate::events::ActivityStats;
use crate::repository::{EngagementRecord, LearningStyleRecord, RiskRecord, StorageError, StoredPrediction, Stores};
use crate::risk::RiskLevel;
use crate::service::StyleDistribution;

const TREND_THRESHOLD: f64 = 5.0;

#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct PredictionTotals {
    pub students: usize,
    pub learning_style: usize,
    pub academic_risk: usize,
    pub engagement: usize,
}

#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct LevelCount {
    pub level: String,
    pub count: usize,
    pub share: f64,
}

#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct EngagementTrend {
    pub student_id: String,
    pub first_score: u8,
    pub latest_score: u8,
    pub trend: String,
}

#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct AdminOverview {
    pub totals: PredictionTotals,
    pub learning_styles: StyleDistribution,
    pub risk_breakdown: Vec<LevelCount>,
    pub engagement_breakdown: Vec<LevelCount>,
    pub average_risk_score: f64,
    pub average_engagement_score: f64,
    /// Students whose most recent risk prediction is At-Risk.
    pub at_risk_students: Vec<String>,
    pub engagement_trends: Vec<EngagementTrend>,
    pub activity: ActivityStats,
}

fn share(count: usize, total: usize) -> f64 {
    if total > 0 {
        count as f64 / total as f64 * 100.0
    } else {
        0.0
    }
}

fn average(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, n) = values.fold((0.0, 0usize), |(sum, n), v| (sum + v, n + 1));
    if n > 0 {
        sum / n as f64
    } else {
        0.0
    }
}

/// Newest record per student.
fn latest_by_student<R: Clone>(
    records: &[StoredPrediction<R>],
) -> BTreeMap<String, StoredPrediction<R>> {
    let mut latest: BTreeMap<String, StoredPrediction<R>> = BTreeMap::new();
    for record in records {
        let newer = latest
            .get(&record.student_id)
            .map_or(true, |current| record.created_at > current.created_at);
        if newer {
            latest.insert(record.student_id.clone(), record.clone());
        }
    }
    latest
}

pub fn style_distribution(records: &[LearningStyleRecord]) -> StyleDistribution {
    let mut distribution = StyleDistribution::default();
    for record in latest_by_student(records).values() {
        distribution.add(record.result.primary_style);
    }
    distribution
}

pub fn risk_breakdown(records: &[RiskRecord]) -> Vec<LevelCount> {
    RiskLevel::ALL
        .iter()
        .map(|&level| {
            let count = records.iter().filter(|r| r.result.risk_level == level).count();
            LevelCount { level: level.as_str().to_string(), count, share: share(count, records.len()) }
        })
        .collect()
}

pub fn engagement_breakdown(records: &[EngagementRecord]) -> Vec<LevelCount> {
    [
        EngagementLevel::HighlyEngaged,
        EngagementLevel::Engaged,
        EngagementLevel::AtRisk,
        EngagementLevel::Disengaged,
    ]
    .iter()
    .map(|&level| {
        let count = records.iter().filter(|r| r.result.result.engagement_level == level).count();
        LevelCount { level: level.as_str().to_string(), count, share: share(count, records.len()) }
    })
    .collect()
}

/// Compare each student's first and latest engagement score.
pub fn engagement_trends(records: &[EngagementRecord]) -> Vec<EngagementTrend> {
    let mut by_student: BTreeMap<&str, Vec<&EngagementRecord>> = BTreeMap::new();
    for record in records {
        by_student.entry(record.student_id.as_str()).or_default().push(record);
    }

    by_student
        .into_iter()
        .filter_map(|(student_id, mut history)| {
            history.sort_by_key(|r| r.created_at);
            let first = history.first()?.result.result.engagement_score;
            let latest = history.last()?.result.result.engagement_score;
            let delta = f64::from(latest) - f64::from(first);
            let trend = if delta > TREND_THRESHOLD {
                "Improving"
            } else if delta < -TREND_THRESHOLD {
                "Declining"
            } else {
                "Stable"
            };
            Some(EngagementTrend {
                student_id: student_id.to_string(),
                first_score: first,
                latest_score: latest,
                trend: trend.to_string(),
            })
        })
        .collect()
}

pub fn build_overview(stores: &Stores, activity: ActivityStats) -> Result<AdminOverview, StorageError> {
    let learning = stores.learning_style.all()?;
    let risk = stores.risk.all()?;
    let engagement = stores.engagement.all()?;

    let mut students: Vec<&str> = learning
        .iter()
        .map(|r| r.student_id.as_str())
        .chain(risk.iter().map(|r| r.student_id.as_str()))
        .chain(engagement.iter().map(|r| r.student_id.as_str()))
        .collect();
    students.sort_unstable();
    students.dedup();

    let at_risk_students = latest_by_student(&risk)
        .into_iter()
        .filter(|(_, record)| record.result.risk_level == RiskLevel::AtRisk)
        .map(|(student_id, _)| student_id)
        .collect();

    Ok(AdminOverview {
        totals: PredictionTotals {
            students: students.len(),
            learning_style: learning.len(),
            academic_risk: risk.len(),
            engagement: engagement.len(),
        },
        learning_styles: style_distribution(&learning),
        risk_breakdown: risk_breakdown(&risk),
        engagement_breakdown: engagement_breakdown(&engagement),
        average_risk_score: average(risk.iter().map(|r| r.result.risk_score)),
        average_engagement_score: average(engagement.iter().map(|r| f64::from(r.result.result.engagement_score))),
        at_risk_students,
        engagement_trends: engagement_trends(&engagement),
        activity,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engagement::{self, EngagementForm};
    use crate::risk::assess;
    use crate::risk::tests::request;
    use chrono::{Duration, Utc};

    fn engagement_record(student_id: &str, minutes_ago: i64, logins: f64) -> EngagementRecord {
        let form = EngagementForm { student_id: student_id.into(), login_frequency: logins, ..Default::default() };
        StoredPrediction {
            id: format!("{student_id}-{minutes_ago}"),
            student_id: student_id.into(),
            created_at: Utc::now() - Duration::minutes(minutes_ago),
            result: engagement::predict(&form).unwrap(),
        }
    }

    #[test]
    fn test_empty_overview() {
        let overview = build_overview(&Stores::in_memory(), ActivityStats::default()).unwrap();
        assert_eq!(overview.totals.students, 0);
        assert_eq!(overview.average_engagement_score, 0.0);
        assert!(overview.risk_breakdown.iter().all(|c| c.count == 0 && c.share == 0.0));
        assert!(overview.at_risk_students.is_empty());
    }

    #[test]
    fn test_overview_counts_latest_levels() {
        let stores = Stores::in_memory();
        stores.risk.record("STU1", assess(&request("STU1"), 0.9)).unwrap();
        stores.risk.record("STU2", assess(&request("STU2"), 0.1)).unwrap();
        let form = EngagementForm { student_id: "STU3".into(), ..Default::default() };
        stores.engagement.record("STU3", engagement::predict(&form).unwrap()).unwrap();

        let overview = build_overview(&stores, ActivityStats::default()).unwrap();
        assert_eq!(overview.totals.students, 3);
        assert_eq!(overview.totals.academic_risk, 2);
        assert_eq!(overview.at_risk_students, vec!["STU1".to_string()]);

        let at_risk = overview.risk_breakdown.iter().find(|c| c.level == "At-Risk").unwrap();
        assert_eq!((at_risk.count, at_risk.share), (1, 50.0));
        assert!((overview.average_risk_score - 0.5).abs() < 1e-9);
        assert_eq!(overview.average_engagement_score, 55.0);
    }

    #[test]
    fn test_engagement_trend_direction() {
        let records = vec![
            engagement_record("STU1", 30, 0.0),
            engagement_record("STU1", 5, 10.0),
            engagement_record("STU2", 10, 5.0),
        ];
        let trends = engagement_trends(&records);
        assert_eq!(trends.len(), 2);
        assert_eq!(trends[0].trend, "Improving");
        assert!(trends[0].latest_score > trends[0].first_score);
        assert_eq!(trends[1].trend, "Stable");
    }
}
