//! EduMind student insight service: academic-risk, engagement and
//! learning-style predictors behind a small actix-web JSON API.

pub mod action_plan;
pub mod analytics;
pub mod auth;
pub mod catalog;
pub mod config;
pub mod data;
pub mod engagement;
pub mod error;
pub mod events;
pub mod landing;
pub mod learning_style;
pub mod model;
pub mod repository;
pub mod risk;
pub mod routes;
pub mod service;

pub use config::{AppConfig, ServiceEnvironment};
pub use error::AppError;
pub use routes::AppState;
pub use service::PredictionService;
