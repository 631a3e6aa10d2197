use actix_files::{Files, NamedFile};
use actix_web::{HttpResponse, web};
use log::{info, warn};
use serde::Deserialize;
use serde_json::json;
use std::path::PathBuf;

use crate::classify::routes::{batch_classify, classify, segment_and_classify};
use crate::config::AppConfig;
use crate::dataset::csv_table::{
    HEATMAP_ROW_LIMIT, correlation, list_csv_files, read_table, resolve_csv,
};
use crate::error::ApiError;
use crate::files::{find_file_recursively, list_images};
use crate::report::routes::{
    generate_report, generate_report_desktop, generate_report_desktop_from_body,
    generate_report_from_body,
};
use crate::storage::temp_storage::TempStorage;

pub fn configure_routes(cfg: &mut web::ServiceConfig, frontend_dir: Option<PathBuf>) {
    cfg.service(web::resource("/").route(web::get().to(root)))
        .service(web::resource("/api/list_csv").route(web::get().to(list_csv)))
        .service(web::resource("/api/data/csv").route(web::get().to(data_csv)))
        .service(web::resource("/api/heatmap").route(web::get().to(heatmap)))
        .service(web::resource("/api/xrays").route(web::get().to(xrays)))
        .service(web::resource("/api/xray/{name}").route(web::get().to(xray)))
        .service(web::resource("/api/mask/{name}").route(web::get().to(mask)))
        .service(web::resource("/api/temp_file/{filename}").route(web::get().to(temp_file)))
        .service(
            web::resource("/api/segment_and_classify").route(web::post().to(segment_and_classify)),
        )
        .service(web::resource("/api/classify").route(web::get().to(classify)))
        .service(
            web::resource("/api/generate_report")
                .route(web::get().to(generate_report))
                .route(web::post().to(generate_report_from_body)),
        )
        .service(
            web::resource("/api/generate_report_desktop")
                .route(web::get().to(generate_report_desktop))
                .route(web::post().to(generate_report_desktop_from_body)),
        )
        .service(web::resource("/api/batch_classify").route(web::get().to(batch_classify)));

    if let Some(dir) = frontend_dir {
        cfg.service(Files::new("/static", dir).show_files_listing());
    }
}

async fn root() -> HttpResponse {
    HttpResponse::Ok().json(json!({ "status": "ok" }))
}

async fn list_csv(config: web::Data<AppConfig>) -> Result<HttpResponse, ApiError> {
    let data_dir = config.data_dir.clone();
    let files = web::block(move || list_csv_files(&data_dir)).await?;
    Ok(HttpResponse::Ok().json(json!({ "files": files })))
}

#[derive(Debug, Deserialize)]
struct CsvQuery {
    name: Option<String>,
    limit: Option<String>,
}

fn parse_limit(raw: Option<&str>) -> Result<Option<usize>, ApiError> {
    match raw.map(str::trim).filter(|v| !v.is_empty()) {
        None => Ok(None),
        Some(value) => value.parse().map(Some).map_err(|_| {
            ApiError::BadRequest(format!("limit must be a non-negative integer, got '{}'", value))
        }),
    }
}

async fn data_csv(
    config: web::Data<AppConfig>,
    query: web::Query<CsvQuery>,
) -> Result<HttpResponse, ApiError> {
    let path = resolve_csv(&config.data_dir, query.name.as_deref())?;
    let limit = parse_limit(query.limit.as_deref())?;
    let table = web::block(move || read_table(&path, limit)).await??;
    Ok(HttpResponse::Ok().json(table))
}

async fn heatmap(
    config: web::Data<AppConfig>,
    query: web::Query<CsvQuery>,
) -> Result<HttpResponse, ApiError> {
    let path = resolve_csv(&config.data_dir, query.name.as_deref())?;
    let matrix = web::block(move || correlation(&path, HEATMAP_ROW_LIMIT)).await??;
    Ok(HttpResponse::Ok().json(matrix))
}

async fn xrays(config: web::Data<AppConfig>) -> Result<HttpResponse, ApiError> {
    let images_dir = config.images_dir();
    let images = web::block(move || list_images(&images_dir)).await?;
    info!("Listing {} radiographs", images.len());
    Ok(HttpResponse::Ok().json(json!({ "images": images })))
}

async fn serve_found(base: PathBuf, name: String, kind: &str) -> Result<NamedFile, ApiError> {
    let lookup = name.clone();
    let found = web::block(move || find_file_recursively(&base, &lookup)).await?;
    let Some(path) = found else {
        warn!("{} {} not found", kind, name);
        return Err(ApiError::NotFound(format!("{} not found", kind)));
    };
    NamedFile::open(&path).map_err(|e| ApiError::Internal(format!("Failed to open {}: {}", name, e)))
}

async fn xray(
    config: web::Data<AppConfig>,
    path: web::Path<String>,
) -> Result<NamedFile, ApiError> {
    serve_found(config.images_dir(), path.into_inner(), "Image").await
}

async fn mask(
    config: web::Data<AppConfig>,
    path: web::Path<String>,
) -> Result<NamedFile, ApiError> {
    serve_found(config.masks_dir(), path.into_inner(), "Mask").await
}

async fn temp_file(
    storage: web::Data<TempStorage>,
    path: web::Path<String>,
) -> Result<NamedFile, ApiError> {
    let file_name = path.into_inner();
    // traversal attempts on a path segment are reported as missing files
    let resolved = storage
        .resolve(&file_name)
        .map_err(|_| ApiError::NotFound(format!("File {} not found", file_name)))?;
    NamedFile::open(&resolved)
        .map_err(|e| ApiError::Internal(format!("Failed to open {}: {}", file_name, e)))
}
