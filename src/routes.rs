//! HTTP surface: JSON endpoints under `/api/v1`, plus `/` and `/health`.

use std::fmt;

use actix_web::error::InternalError;
use actix_web::{web, HttpResponse};
use serde::{Deserialize, Serialize};

use crate::action_plan::{self, ActionItem, CustomActionForm};
use crate::analytics;
use crate::auth::{self, SignInRequest};
use crate::catalog;
use crate::config::AppConfig;
use crate::engagement::EngagementForm;
use crate::error::{AppError, ValidationError};
use crate::landing;
use crate::learning_style::LearningStyleForm;
use crate::risk::{BatchRiskRequest, RiskLevel, RiskPrediction, StudentRiskRequest, WhatIfRequest};
use crate::service::PredictionService;

pub struct AppState {
    pub config: AppConfig,
    pub service: PredictionService,
}

#[derive(Deserialize)]
struct LimitQuery {
    limit: Option<usize>,
}

#[derive(Deserialize)]
struct CountQuery {
    count: Option<usize>,
}

#[derive(Deserialize)]
struct ProviderQuery {
    provider: Option<String>,
}

#[derive(Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
}

#[derive(Serialize)]
struct PlanResponse {
    risk_level: RiskLevel,
    items: Vec<ActionItem>,
    progress: f64,
}

#[derive(Deserialize)]
struct DynamicPlanRequest {
    prediction: RiskPrediction,
    #[serde(default)]
    existing: Vec<ActionItem>,
    #[serde(default)]
    custom: Vec<CustomActionForm>,
}

#[derive(Serialize)]
struct RecommendationsResponse {
    student_id: String,
    recommendations: Vec<String>,
}

// Extractor failures (body, query string, path) answer with the same JSON error shape.
fn bad_request<E: fmt::Debug + fmt::Display + 'static>(err: E) -> actix_web::Error {
    let body = ErrorBody { error: "bad_request", message: err.to_string() };
    InternalError::from_response(err, HttpResponse::BadRequest().json(body)).into()
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::JsonConfig::default().error_handler(|err, _req| bad_request(err)))
        .app_data(web::QueryConfig::default().error_handler(|err, _req| bad_request(err)))
        .app_data(web::PathConfig::default().error_handler(|err, _req| bad_request(err)))
        .route("/", web::get().to(landing::serve_homepage))
        .route("/health", web::get().to(health_check))
        .service(
            web::scope("/api/v1")
                .service(
                    web::scope("/learning-style")
                        .route("/predict", web::post().to(predict_learning_style))
                        .route("/students", web::get().to(list_students))
                        .route("/students/{student_id}/latest", web::get().to(latest_learning_style))
                        .route("/students/{student_id}/history", web::get().to(learning_style_history))
                        .route("/students/{student_id}/recommendations", web::get().to(recommendations))
                        .route("/stats", web::get().to(learning_style_stats)),
                )
                .service(
                    web::scope("/academic-risk")
                        .route("/predict", web::post().to(predict_risk))
                        .route("/batch-predict", web::post().to(batch_predict))
                        .route("/what-if", web::post().to(what_if))
                        .route("/model-info", web::get().to(model_info))
                        .route("/history/{student_id}", web::get().to(risk_history)),
                )
                .service(
                    web::scope("/engagement")
                        .route("/predict", web::post().to(predict_engagement))
                        .route("/history/{student_id}", web::get().to(engagement_history)),
                )
                .service(
                    web::scope("/action-plans")
                        .route("/dynamic", web::post().to(dynamic_plan))
                        .route("/{risk_level}", web::get().to(fixed_plan)),
                )
                .route("/auth/signin", web::post().to(sign_in))
                .route("/courses", web::get().to(courses))
                .route("/admin/overview", web::get().to(admin_overview)),
        );
}

async fn health_check(state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(state.service.health())
}

async fn predict_learning_style(
    state: web::Data<AppState>,
    form: web::Json<LearningStyleForm>,
) -> Result<HttpResponse, AppError> {
    let record = state.service.predict_learning_style(form.into_inner()).await?;
    Ok(HttpResponse::Ok().json(record))
}

async fn list_students(state: web::Data<AppState>, query: web::Query<LimitQuery>) -> Result<HttpResponse, AppError> {
    Ok(HttpResponse::Ok().json(state.service.list_students(query.limit)?))
}

async fn latest_learning_style(
    state: web::Data<AppState>,
    student_id: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    Ok(HttpResponse::Ok().json(state.service.latest_learning_style(&student_id)?))
}

async fn learning_style_history(
    state: web::Data<AppState>,
    student_id: web::Path<String>,
    query: web::Query<LimitQuery>,
) -> Result<HttpResponse, AppError> {
    Ok(HttpResponse::Ok().json(state.service.learning_style_history(&student_id, query.limit)?))
}

async fn recommendations(
    state: web::Data<AppState>,
    student_id: web::Path<String>,
    query: web::Query<CountQuery>,
) -> Result<HttpResponse, AppError> {
    let student_id = student_id.into_inner();
    let recommendations = state.service.recommendations(&student_id, query.count).await?;
    Ok(HttpResponse::Ok().json(RecommendationsResponse { student_id, recommendations }))
}

async fn learning_style_stats(state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    Ok(HttpResponse::Ok().json(state.service.learning_style_stats()?))
}

async fn predict_risk(
    state: web::Data<AppState>,
    request: web::Json<StudentRiskRequest>,
) -> Result<HttpResponse, AppError> {
    let record = state.service.predict_risk(request.into_inner()).await?;
    Ok(HttpResponse::Ok().json(record.result))
}

async fn batch_predict(
    state: web::Data<AppState>,
    batch: web::Json<BatchRiskRequest>,
) -> Result<HttpResponse, AppError> {
    Ok(HttpResponse::Ok().json(state.service.batch_predict(batch.into_inner()).await?))
}

async fn what_if(state: web::Data<AppState>, request: web::Json<WhatIfRequest>) -> Result<HttpResponse, AppError> {
    Ok(HttpResponse::Ok().json(state.service.what_if(request.into_inner()).await?))
}

async fn model_info(state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(state.service.model_info())
}

async fn risk_history(
    state: web::Data<AppState>,
    student_id: web::Path<String>,
    query: web::Query<LimitQuery>,
) -> Result<HttpResponse, AppError> {
    Ok(HttpResponse::Ok().json(state.service.risk_history(&student_id, query.limit)?))
}

async fn predict_engagement(
    state: web::Data<AppState>,
    form: web::Json<EngagementForm>,
) -> Result<HttpResponse, AppError> {
    let record = state.service.predict_engagement(form.into_inner()).await?;
    Ok(HttpResponse::Ok().json(record))
}

async fn engagement_history(
    state: web::Data<AppState>,
    student_id: web::Path<String>,
    query: web::Query<LimitQuery>,
) -> Result<HttpResponse, AppError> {
    Ok(HttpResponse::Ok().json(state.service.engagement_history(&student_id, query.limit)?))
}

async fn fixed_plan(risk_level: web::Path<String>) -> Result<HttpResponse, AppError> {
    let risk_level: RiskLevel = risk_level.parse()?;
    let items = action_plan::plan_for(risk_level);
    Ok(HttpResponse::Ok().json(PlanResponse { risk_level, progress: action_plan::progress(&items), items }))
}

async fn dynamic_plan(request: web::Json<DynamicPlanRequest>) -> Result<HttpResponse, AppError> {
    let DynamicPlanRequest { prediction, existing, custom } = request.into_inner();

    let mut items = action_plan::dynamic_plan(&prediction, &existing);
    for (index, form) in custom.into_iter().enumerate() {
        let item = form.into_item(format!("custom-{}", index + 1)).map_err(|err| {
            ValidationError::new(format!("custom[{index}].{}", err.field), err.message)
        })?;
        items.push(item);
    }

    Ok(HttpResponse::Ok().json(PlanResponse {
        risk_level: prediction.risk_level,
        progress: action_plan::progress(&items),
        items,
    }))
}

async fn sign_in(state: web::Data<AppState>, request: web::Json<SignInRequest>) -> Result<HttpResponse, AppError> {
    Ok(HttpResponse::Ok().json(auth::sign_in(&state.config, &request)?))
}

async fn courses(query: web::Query<ProviderQuery>) -> HttpResponse {
    HttpResponse::Ok().json(catalog::courses(query.provider.as_deref()))
}

async fn admin_overview(state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    let overview = analytics::build_overview(state.service.stores(), state.service.events().stats())?;
    Ok(HttpResponse::Ok().json(overview))
}
