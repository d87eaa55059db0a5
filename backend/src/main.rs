mod analysis;
mod config;
mod emotion;
mod error;
mod inference;
mod routes;

use actix_cors::Cors;
use actix_web::{middleware, web, App, HttpServer};
use config::AppConfig;
use emotion::service::EmotionService;
use emotion::translation::LabelTranslator;
use inference::onnx::OnnxExpressionClassifier;
use routes::configure_routes;
use std::sync::Arc;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv::dotenv().ok();
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let config = AppConfig::load().map_err(|e| {
        log::error!("Failed to load configuration: {}", e);
        std::io::Error::new(std::io::ErrorKind::Other, format!("Configuration error: {}", e))
    })?;

    // Models must be ready before the listener accepts connections.
    let classifier = OnnxExpressionClassifier::load(&config.models).map_err(|e| {
        log::error!("Failed to load models: {}", e);
        std::io::Error::new(std::io::ErrorKind::Other, format!("Model loading failed: {}", e))
    })?;
    log::info!("Models loaded. Server is ready.");

    let service = EmotionService::new(
        Arc::new(classifier),
        LabelTranslator::with_overrides(config.labels.clone()),
    );
    let upload = config.upload.clone();

    let bind_address = config.server.bind_address();
    log::info!("Starting server on {}", bind_address);

    HttpServer::new(move || {
        App::new()
            .wrap(middleware::Logger::default())
            .wrap(
                Cors::default()
                    .allow_any_origin()
                    .allowed_methods(vec!["POST", "OPTIONS"])
                    .allowed_headers(vec![
                        actix_web::http::header::ACCEPT,
                        actix_web::http::header::CONTENT_TYPE,
                    ])
                    .max_age(3600),
            )
            .app_data(web::Data::new(service.clone()))
            .app_data(web::Data::new(upload.clone()))
            .configure(configure_routes)
    })
    .bind(&bind_address)?
    .run()
    .await
}
