use actix_cors::Cors;
use actix_web::{middleware::Logger, web, App, HttpServer};
use anyhow::Context;
use dotenv::dotenv;
use promo_backend::config::Config;
use promo_backend::controllers;
use promo_backend::system::DataService;
use promo_backend::AppState;
use std::sync::Arc;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    env_logger::init();

    let config = Config::from_env().map_err(anyhow::Error::msg)?;
    let port = config.port;

    log::info!("Starting promotion analytics backend on port {}", port);
    log::info!("Using model {} with embeddings {}", config.llm_model, config.embedding_model);

    let data = Arc::new(DataService::from_config(config.clone()).map_err(anyhow::Error::msg)?);

    match data.startup(false).await {
        Ok(outcome) => match outcome.file {
            Some(file) => log::info!(
                "Startup: using {} (new file: {})",
                file.display(),
                outcome.rebuild
            ),
            None => log::warn!("Startup: no CSV available; queries return 503 until /admin/sync-data succeeds"),
        },
        Err(e) => log::error!("Startup: initial data load failed: {}", e),
    }

    log::info!("Server starting on 0.0.0.0:{}", port);

    HttpServer::new(move || {
        let cors = Cors::default()
            .allowed_origin(&config.cors_origin)
            .allow_any_method()
            .allow_any_header()
            .supports_credentials()
            .max_age(3600);

        App::new()
            .app_data(web::Data::new(AppState {
                config: config.clone(),
                data: Arc::clone(&data),
            }))
            .wrap(Logger::default())
            .wrap(cors)
            .configure(controllers::health::config)
            .configure(controllers::query::config)
            .configure(controllers::admin::config)
            .configure(controllers::data::config)
    })
    .bind(("0.0.0.0", port))
    .with_context(|| format!("failed to bind port {}", port))?
    .run()
    .await?;

    Ok(())
}
