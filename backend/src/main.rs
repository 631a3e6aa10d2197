use actix_cors::Cors;
use actix_web::{App, HttpServer, web};
use std::env;
use xray_backend::cache::result_cache::ResultCache;
use xray_backend::config::AppConfig;
use xray_backend::routes::configure_routes;
use xray_backend::storage::temp_storage::TempStorage;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv::dotenv().ok();
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    if let Ok(current_dir) = env::current_dir() {
        log::info!("Current working directory: {}", current_dir.display());
    } else {
        log::error!("Failed to get the current working directory.");
    }

    let config = AppConfig::load().map_err(|e| {
        log::error!("Invalid configuration: {}", e);
        std::io::Error::new(std::io::ErrorKind::InvalidInput, e.to_string())
    })?;

    let storage = TempStorage::new(config.temp_dir.clone(), config.max_upload_bytes);
    if let Err(e) = storage.ensure_root() {
        log::error!("Failed to create temp dir {}: {}", config.temp_dir.display(), e);
        return Err(std::io::Error::other(e.to_string()));
    }

    for (label, dir) in [
        ("Data", config.data_dir.clone()),
        ("Images", config.images_dir()),
        ("Masks", config.masks_dir()),
    ] {
        if dir.is_dir() {
            log::info!("{} directory: {}", label, dir.display());
        } else {
            log::warn!("{} directory {} does not exist", label, dir.display());
        }
    }

    match &config.frontend_dir {
        Some(dir) => log::info!("Serving static frontend from {}", dir.display()),
        None => log::info!("No FRONTEND_DIR configured, static files disabled"),
    }

    let bind_address = config.bind_address();
    let frontend_dir = config.frontend_dir.clone();
    let config = web::Data::new(config);
    let storage = web::Data::new(storage);
    let cache = web::Data::new(ResultCache::with_capacity(config.max_sessions));

    log::info!("Starting server on {}", bind_address);

    HttpServer::new(move || {
        App::new()
            .wrap(
                Cors::default()
                    .allow_any_origin()
                    .allowed_methods(vec!["GET", "POST", "OPTIONS"])
                    .allowed_headers(vec![
                        actix_web::http::header::ACCEPT,
                        actix_web::http::header::CONTENT_TYPE,
                        actix_web::http::header::HeaderName::from_static("x-session-id"),
                    ])
                    .max_age(3600),
            )
            .app_data(config.clone())
            .app_data(storage.clone())
            .app_data(cache.clone())
            .configure(|cfg| configure_routes(cfg, frontend_dir.clone()))
    })
    .bind(&bind_address)?
    .run()
    .await
}
