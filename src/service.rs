//! Prediction service: validates submissions, runs the live scorers (or the
//! mock stand-ins in test mode), persists results and emits lifecycle events.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;

use crate::analytics;
use crate::config::{AppConfig, ServiceEnvironment};
use crate::engagement::{self, EngagementForm};
use crate::error::{check_student_id, AppError, ValidationError};
use crate::events::{EventBus, PredictionEvent, PredictionKind};
use crate::learning_style::{self, LearningStyle, LearningStyleForm, STYLE_ORDER};
use crate::model::{ModelInfo, RiskModel};
use crate::repository::{
    EngagementRecord, LearningStyleRecord, PredictionStore, RiskRecord, StoredPrediction, Stores,
};
use crate::risk::{
    self, BatchRiskRequest, BatchRiskResponse, RiskPrediction, StudentRiskRequest, WhatIfRequest, WhatIfResponse,
};

pub const DEFAULT_STUDENT_LIMIT: usize = 100;
pub const DEFAULT_HISTORY_LIMIT: usize = 10;

// Student id carried by events for a batch rejected before any student is scored.
const BATCH_SUBJECT: &str = "batch";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceMode {
    Live,
    Mock,
}

impl ServiceMode {
    pub fn for_environment(environment: ServiceEnvironment) -> Self {
        match environment {
            ServiceEnvironment::Test => ServiceMode::Mock,
            ServiceEnvironment::Production | ServiceEnvironment::Development => ServiceMode::Live,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthStatus {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
    pub model_loaded: bool,
    pub environment: ServiceEnvironment,
    pub mode: ServiceMode,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StyleDistribution {
    pub visual: usize,
    pub auditory: usize,
    pub reading: usize,
    pub kinesthetic: usize,
}

impl StyleDistribution {
    pub fn add(&mut self, style: LearningStyle) {
        match style {
            LearningStyle::Visual => self.visual += 1,
            LearningStyle::Auditory => self.auditory += 1,
            LearningStyle::Reading => self.reading += 1,
            LearningStyle::Kinesthetic => self.kinesthetic += 1,
        }
    }

    pub fn get(&self, style: LearningStyle) -> usize {
        match style {
            LearningStyle::Visual => self.visual,
            LearningStyle::Auditory => self.auditory,
            LearningStyle::Reading => self.reading,
            LearningStyle::Kinesthetic => self.kinesthetic,
        }
    }

    /// Style held by the most students; `None` when nothing has been recorded.
    pub fn dominant(&self) -> Option<LearningStyle> {
        let mut best: Option<LearningStyle> = None;
        for style in STYLE_ORDER {
            let count = self.get(style);
            if count > 0 && best.map_or(true, |b| count > self.get(b)) {
                best = Some(style);
            }
        }
        best
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LearningStyleStats {
    pub total_students: usize,
    pub total_predictions: usize,
    /// Primary style of each student's most recent prediction.
    pub style_distribution: StyleDistribution,
    pub dominant_style: Option<LearningStyle>,
}

#[derive(Clone)]
pub struct PredictionService {
    mode: ServiceMode,
    environment: ServiceEnvironment,
    mock_delay: Duration,
    model: Arc<RiskModel>,
    stores: Stores,
    events: EventBus,
}

impl PredictionService {
    /// Pick live or mock behaviour from the configured environment.
    pub fn new(config: &AppConfig, model: RiskModel, stores: Stores, events: EventBus) -> Self {
        let mode = ServiceMode::for_environment(config.environment);
        tracing::info!(environment = config.environment.as_str(), ?mode, "prediction service ready");
        Self {
            mode,
            environment: config.environment,
            mock_delay: config.mock_delay,
            model: Arc::new(model),
            stores,
            events,
        }
    }

    pub fn mode(&self) -> ServiceMode {
        self.mode
    }

    pub fn environment(&self) -> ServiceEnvironment {
        self.environment
    }

    pub fn stores(&self) -> &Stores {
        &self.stores
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn model_info(&self) -> ModelInfo {
        self.model.info()
    }

    pub fn health(&self) -> HealthStatus {
        HealthStatus {
            status: "healthy",
            service: env!("CARGO_PKG_NAME"),
            version: env!("CARGO_PKG_VERSION"),
            model_loaded: self.model.is_trained(),
            environment: self.environment,
            mode: self.mode,
        }
    }

    async fn simulate_latency(&self) {
        if self.mode == ServiceMode::Mock && !self.mock_delay.is_zero() {
            tokio::time::sleep(self.mock_delay).await;
        }
    }

    fn reject(&self, kind: PredictionKind, student_id: &str, err: ValidationError) -> AppError {
        let err = AppError::Validation(err);
        self.publish_failed(kind, student_id, &err);
        err
    }

    fn publish_started(&self, kind: PredictionKind, student_id: &str) {
        self.events.publish(PredictionEvent::Started { kind, student_id: student_id.to_string() });
        if self.environment == ServiceEnvironment::Development {
            tracing::debug!(kind = kind.as_str(), student_id, "prediction request");
        }
    }

    fn publish_succeeded(&self, kind: PredictionKind, student_id: &str, started: Instant, result_id: &str) {
        let duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        if self.environment == ServiceEnvironment::Development {
            tracing::debug!(kind = kind.as_str(), student_id, duration_ms, "prediction response");
        }
        self.events.publish(PredictionEvent::Succeeded {
            kind,
            student_id: student_id.to_string(),
            duration_ms,
            result_id: result_id.to_string(),
        });
    }

    fn publish_failed(&self, kind: PredictionKind, student_id: &str, err: &AppError) {
        self.events.publish(PredictionEvent::Failed { kind, student_id: student_id.to_string(), error: err.to_string() });
    }

    /// Compute and persist one result, publishing its lifecycle.
    async fn record<R>(
        &self,
        kind: PredictionKind,
        student_id: &str,
        store: &PredictionStore<R>,
        started: Instant,
        compute: impl FnOnce() -> Result<R, AppError>,
    ) -> Result<StoredPrediction<R>, AppError>
    where
        R: Serialize + serde::de::DeserializeOwned + Clone + Send + Sync + 'static,
    {
        self.publish_started(kind, student_id);

        let outcome = match compute() {
            Ok(result) => store.spawn_record(student_id, result).await.map_err(AppError::from),
            Err(err) => Err(err),
        };

        match outcome {
            Ok(record) => {
                self.publish_succeeded(kind, student_id, started, &record.id);
                Ok(record)
            }
            Err(err) => {
                self.publish_failed(kind, student_id, &err);
                Err(err)
            }
        }
    }

    pub async fn predict_learning_style(&self, form: LearningStyleForm) -> Result<LearningStyleRecord, AppError> {
        let kind = PredictionKind::LearningStyle;
        form.validate().map_err(|err| self.reject(kind, &form.student_id, err))?;

        let started = Instant::now();
        self.simulate_latency().await;
        self.record(kind, &form.student_id, &self.stores.learning_style, started, || match self.mode {
            ServiceMode::Live => Ok(learning_style::score(&form)?),
            ServiceMode::Mock => Ok(learning_style::mock_result()),
        })
        .await
    }

    fn score_risk(&self, request: &StudentRiskRequest) -> RiskPrediction {
        match self.mode {
            ServiceMode::Live => risk::assess(request, self.model.at_risk_probability(request)),
            ServiceMode::Mock => risk::mock_assessment(request),
        }
    }

    pub async fn predict_risk(&self, request: StudentRiskRequest) -> Result<RiskRecord, AppError> {
        let kind = PredictionKind::AcademicRisk;
        request.validate().map_err(|err| self.reject(kind, &request.student_id, err))?;

        let started = Instant::now();
        self.simulate_latency().await;
        self.record(kind, &request.student_id, &self.stores.risk, started, || Ok(self.score_risk(&request))).await
    }

    /// Every student is validated before any is scored; one bad entry rejects
    /// the batch, and the scored batch is stored in a single write or not at all.
    pub async fn batch_predict(&self, batch: BatchRiskRequest) -> Result<BatchRiskResponse, AppError> {
        let kind = PredictionKind::AcademicRisk;
        batch.validate().map_err(|err| self.reject(kind, BATCH_SUBJECT, err))?;
        tracing::info!(students = batch.students.len(), "batch risk prediction");

        let started = Instant::now();
        for request in &batch.students {
            self.publish_started(kind, &request.student_id);
        }
        self.simulate_latency().await;

        let entries: Vec<(String, RiskPrediction)> = batch
            .students
            .iter()
            .map(|request| (request.student_id.clone(), self.score_risk(request)))
            .collect();

        match self.stores.risk.spawn_record_all(entries).await {
            Ok(records) => {
                for record in &records {
                    self.publish_succeeded(kind, &record.student_id, started, &record.id);
                }
                Ok(BatchRiskResponse::from_predictions(records.into_iter().map(|record| record.result).collect()))
            }
            Err(err) => {
                let err = AppError::from(err);
                for request in &batch.students {
                    self.publish_failed(kind, &request.student_id, &err);
                }
                Err(err)
            }
        }
    }

    /// Score a baseline and an adjusted copy side by side. Nothing is persisted.
    pub async fn what_if(&self, request: WhatIfRequest) -> Result<WhatIfResponse, AppError> {
        request.baseline.validate()?;
        let (adjusted, changed_metrics) = request.scenario.apply(&request.baseline);
        adjusted
            .validate()
            .map_err(|err| ValidationError::new(format!("scenario.{}", err.field), err.message))?;

        self.simulate_latency().await;
        let baseline = self.score_risk(&request.baseline);
        let scenario = self.score_risk(&adjusted);

        Ok(WhatIfResponse {
            risk_delta: scenario.risk_score - baseline.risk_score,
            level_changed: scenario.risk_level != baseline.risk_level,
            baseline,
            scenario,
            changed_metrics,
        })
    }

    pub async fn predict_engagement(&self, form: EngagementForm) -> Result<EngagementRecord, AppError> {
        let kind = PredictionKind::Engagement;
        form.validate().map_err(|err| self.reject(kind, &form.student_id, err))?;

        let started = Instant::now();
        self.simulate_latency().await;
        self.record(kind, &form.student_id, &self.stores.engagement, started, || Ok(engagement::predict(&form)?))
            .await
    }

    pub fn list_students(&self, limit: Option<usize>) -> Result<Vec<String>, AppError> {
        Ok(self.stores.learning_style.student_ids(limit.unwrap_or(DEFAULT_STUDENT_LIMIT))?)
    }

    pub fn latest_learning_style(&self, student_id: &str) -> Result<LearningStyleRecord, AppError> {
        self.stores
            .learning_style
            .latest_for_student(student_id)?
            .ok_or_else(|| AppError::NotFound(format!("learning style for student {student_id}")))
    }

    pub fn learning_style_history(
        &self,
        student_id: &str,
        limit: Option<usize>,
    ) -> Result<Vec<LearningStyleRecord>, AppError> {
        Ok(self.stores.learning_style.history(student_id, limit.unwrap_or(DEFAULT_HISTORY_LIMIT))?)
    }

    pub async fn recommendations(&self, student_id: &str, count: Option<usize>) -> Result<Vec<String>, AppError> {
        check_student_id(student_id)?;
        self.simulate_latency().await;
        let style = self
            .stores
            .learning_style
            .latest_for_student(student_id)?
            .map(|record| record.result.primary_style);
        Ok(learning_style::generate_recommendations(student_id, style, count))
    }

    pub fn learning_style_stats(&self) -> Result<LearningStyleStats, AppError> {
        let records = self.stores.learning_style.all()?;
        let students = self.stores.learning_style.student_ids(usize::MAX)?;

        let style_distribution = analytics::style_distribution(&records);

        Ok(LearningStyleStats {
            total_students: students.len(),
            total_predictions: records.len(),
            dominant_style: style_distribution.dominant(),
            style_distribution,
        })
    }

    pub fn risk_history(&self, student_id: &str, limit: Option<usize>) -> Result<Vec<RiskRecord>, AppError> {
        Ok(self.stores.risk.history(student_id, limit.unwrap_or(DEFAULT_HISTORY_LIMIT))?)
    }

    pub fn engagement_history(&self, student_id: &str, limit: Option<usize>) -> Result<Vec<EngagementRecord>, AppError> {
        Ok(self.stores.engagement.history(student_id, limit.unwrap_or(DEFAULT_HISTORY_LIMIT))?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::risk::tests::request;
    use crate::risk::{RiskLevel, WhatIfScenario};

    fn service(environment: ServiceEnvironment) -> PredictionService {
        let config = AppConfig { environment, mock_delay: Duration::from_millis(5), ..AppConfig::default() };
        PredictionService::new(&config, RiskModel::Demo, Stores::in_memory(), EventBus::default())
    }

    fn form(student_id: &str) -> LearningStyleForm {
        LearningStyleForm { student_id: student_id.to_string(), ..LearningStyleForm::default() }
    }

    #[test]
    fn test_mode_follows_environment() {
        assert_eq!(service(ServiceEnvironment::Production).mode(), ServiceMode::Live);
        assert_eq!(service(ServiceEnvironment::Development).mode(), ServiceMode::Live);
        assert_eq!(service(ServiceEnvironment::Test).mode(), ServiceMode::Mock);
    }

    #[tokio::test]
    async fn test_blank_student_rejected_before_scoring() {
        let svc = service(ServiceEnvironment::Production);
        let err = svc.predict_learning_style(form("  ")).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(ref v) if v.field == "student_id"));
        assert_eq!(svc.stores().learning_style.count().unwrap(), 0);

        let stats = svc.events().stats();
        assert_eq!(stats.learning_style.started, 0);
        assert_eq!(stats.learning_style.failed, 1);
    }

    #[tokio::test]
    async fn test_mock_mode_returns_canned_learning_style() {
        let svc = service(ServiceEnvironment::Test);
        let record = svc.predict_learning_style(form("STU1")).await.unwrap();
        assert_eq!(record.result.primary_style, LearningStyle::Visual);
        assert_eq!(record.result.secondary_style, LearningStyle::Kinesthetic);
        assert_eq!(record.result.confidence, 85);
    }

    #[tokio::test]
    async fn test_risk_prediction_is_persisted_and_counted() {
        let svc = service(ServiceEnvironment::Production);
        let record = svc.predict_risk(request("STU1")).await.unwrap();
        assert_eq!(record.result.risk_level, RiskLevel::Safe);

        let history = svc.risk_history("STU1", None).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].id, record.id);

        let stats = svc.events().stats();
        assert_eq!(stats.academic_risk.started, 1);
        assert_eq!(stats.academic_risk.succeeded, 1);
    }

    #[tokio::test]
    async fn test_batch_rejects_whole_batch() {
        let svc = service(ServiceEnvironment::Production);
        let batch = BatchRiskRequest {
            students: vec![request("A"), StudentRiskRequest { low_performance: 3, ..request("B") }],
        };
        let err = svc.batch_predict(batch).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(ref v) if v.field == "students[1].low_performance"));
        assert_eq!(svc.stores().risk.count().unwrap(), 0);

        let stats = svc.events().stats();
        assert_eq!(stats.academic_risk.started, 0);
        assert_eq!(stats.academic_risk.failed, 1);
    }

    #[tokio::test]
    async fn test_batch_summary() {
        let svc = service(ServiceEnvironment::Production);
        let struggling = StudentRiskRequest {
            avg_grade: 30.0,
            num_assessments: 2,
            has_previous_attempts: 1,
            num_of_prev_attempts: 1,
            ..request("B")
        };
        let response = svc
            .batch_predict(BatchRiskRequest { students: vec![request("A"), struggling] })
            .await
            .unwrap();
        assert_eq!(response.total_students, 2);
        assert_eq!(response.summary.safe_count, 1);
        assert_eq!(response.summary.at_risk_count, 1);
        assert_eq!(svc.stores().risk.count().unwrap(), 2);

        let stats = svc.events().stats();
        assert_eq!(stats.academic_risk.started, 2);
        assert_eq!(stats.academic_risk.succeeded, 2);
    }

    #[tokio::test]
    async fn test_batch_storage_failure_stores_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let data_dir = dir.path().join("data");
        let stores = Stores::json_files(&data_dir).unwrap();
        let config = AppConfig { environment: ServiceEnvironment::Production, ..AppConfig::default() };
        let svc = PredictionService::new(&config, RiskModel::Demo, stores, EventBus::default());
        std::fs::remove_dir_all(&data_dir).unwrap();

        let err = svc
            .batch_predict(BatchRiskRequest { students: vec![request("A"), request("B")] })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Storage(_)));
        assert_eq!(svc.stores().risk.count().unwrap(), 0);
        assert_eq!(svc.events().stats().academic_risk.failed, 2);
    }

    #[tokio::test]
    async fn test_what_if_improvement_lowers_risk() {
        let svc = service(ServiceEnvironment::Production);
        let baseline = StudentRiskRequest { avg_grade: 35.0, low_engagement: 1, ..request("STU1") };
        let response = svc
            .what_if(WhatIfRequest {
                baseline,
                scenario: WhatIfScenario { avg_grade: Some(75.0), low_engagement: Some(0), ..Default::default() },
            })
            .await
            .unwrap();
        assert!(response.risk_delta < 0.0);
        assert!(response.level_changed);
        assert_eq!(response.changed_metrics.len(), 2);
        assert_eq!(svc.stores().risk.count().unwrap(), 0);

        let err = svc
            .what_if(WhatIfRequest {
                baseline: request("STU1"),
                scenario: WhatIfScenario { avg_grade: Some(120.0), ..Default::default() },
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(ref v) if v.field == "scenario.avg_grade"));
    }

    #[tokio::test]
    async fn test_dashboard_queries() {
        let svc = service(ServiceEnvironment::Production);
        let kinesthetic = LearningStyleForm { prefers_hands_on: 5.0, interactive_time: 240.0, ..form("STU2") };
        svc.predict_learning_style(form("STU1")).await.unwrap();
        svc.predict_learning_style(kinesthetic).await.unwrap();

        assert_eq!(svc.list_students(None).unwrap(), vec!["STU1".to_string(), "STU2".to_string()]);
        assert_eq!(svc.latest_learning_style("STU2").unwrap().result.primary_style, LearningStyle::Kinesthetic);
        assert!(matches!(svc.latest_learning_style("nobody"), Err(AppError::NotFound(_))));

        let recs = svc.recommendations("STU2", Some(50)).await.unwrap();
        assert_eq!(recs.len(), 10);
        assert_eq!(recs[0], "Practice hands-on exercises and lab work");

        let stats = svc.learning_style_stats().unwrap();
        assert_eq!(stats.total_students, 2);
        assert_eq!(stats.total_predictions, 2);
        assert_eq!(stats.style_distribution.kinesthetic, 1);
    }

    #[tokio::test]
    async fn test_engagement_prediction() {
        let svc = service(ServiceEnvironment::Production);
        let form = EngagementForm { student_id: "STU1".into(), ..EngagementForm::default() };
        let record = svc.predict_engagement(form).await.unwrap();
        assert_eq!(record.result.result.engagement_score, 55);
        assert_eq!(svc.engagement_history("STU1", None).unwrap().len(), 1);
    }

    #[test]
    fn test_dominant_style_ties_follow_order() {
        let mut dist = StyleDistribution::default();
        assert_eq!(dist.dominant(), None);
        dist.add(LearningStyle::Reading);
        dist.add(LearningStyle::Auditory);
        assert_eq!(dist.dominant(), Some(LearningStyle::Auditory));
    }
}
