use std::error::Error;

use actix_web::{web, App, HttpServer};
use tracing_subscriber::EnvFilter;

use edumind::events::EventBus;
use edumind::model::RiskModel;
use edumind::repository::Stores;
use edumind::{routes, AppConfig, AppState, PredictionService};

#[actix_web::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("edumind=info,actix_web=info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = AppConfig::from_env()?;
    tracing::info!(environment = config.environment.as_str(), data_dir = %config.data_dir.display(), "🚀 loading EduMind");

    let model = RiskModel::from_dataset_path(config.risk_dataset.as_deref());
    let stores = Stores::json_files(&config.data_dir)?;
    let events = EventBus::default();
    let _logger = events.spawn_logger();

    let service = PredictionService::new(&config, model, stores, events);
    let bind = (config.host.clone(), config.port);
    let state = web::Data::new(AppState { config, service });

    tracing::info!("🌐 EduMind API listening on http://{}:{}", bind.0, bind.1);

    HttpServer::new(move || App::new().app_data(state.clone()).configure(routes::configure))
        .bind(bind)?
        .run()
        .await?;

    Ok(())
}
