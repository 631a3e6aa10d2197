use actix_multipart::Multipart;
use actix_web::{HttpResponse, web};
use futures::{StreamExt, TryStreamExt};
use log::{error, info, warn};
use serde::Deserialize;
use shared::ClassifyResponse;

use super::batch::summarize_batch;
use super::simulator::simulate;
use crate::cache::result_cache::ResultCache;
use crate::cache::session::SessionId;
use crate::config::AppConfig;
use crate::error::ApiError;
use crate::files::find_file_recursively;
use crate::storage::temp_storage::{StorageError, TempStorage};

#[derive(Debug, Deserialize)]
pub struct ClassifyQuery {
    pub name: Option<String>,
    pub model: Option<String>,
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value.map(str::trim).filter(|v| !v.is_empty()).map(str::to_owned)
}

pub async fn classify(
    config: web::Data<AppConfig>,
    cache: web::Data<ResultCache>,
    session: SessionId,
    query: web::Query<ClassifyQuery>,
) -> Result<HttpResponse, ApiError> {
    let name = non_empty(query.name.as_deref())
        .ok_or_else(|| ApiError::BadRequest("The 'name' parameter is required.".to_string()))?;
    let model = non_empty(query.model.as_deref()).unwrap_or_else(|| config.default_model.clone());

    let images_dir = config.images_dir();
    let lookup = name.clone();
    let found = web::block(move || find_file_recursively(&images_dir, &lookup)).await?;
    let Some(image_path) = found else {
        warn!("Classification requested for unknown image {}", name);
        return Err(ApiError::NotFound(format!("Image {} not found", name)));
    };

    let result = simulate(&name, &model, &mut rand::rng());
    cache.store(session.as_str(), result.clone(), Some(image_path), None)?;
    info!(
        "Classified {} with {} as {} (session {})",
        name,
        model,
        result.dominant_class.upper(),
        session.as_str()
    );

    Ok(HttpResponse::Ok().json(ClassifyResponse::from(result)))
}

struct UploadForm {
    file: Option<(String, Vec<u8>)>,
    model: Option<String>,
}

async fn read_upload_form(
    payload: &mut Multipart,
    storage: &TempStorage,
) -> Result<UploadForm, ApiError> {
    let mut form = UploadForm {
        file: None,
        model: None,
    };

    while let Some(mut field) = payload
        .try_next()
        .await
        .map_err(|e| ApiError::BadRequest(format!("Invalid multipart payload: {}", e)))?
    {
        let field_name = field.name().unwrap_or_default().to_string();
        let client_name = field
            .content_disposition()
            .and_then(|cd| cd.get_filename())
            .map(str::to_owned);

        let mut data = Vec::new();
        while let Some(chunk) = field.next().await {
            let chunk =
                chunk.map_err(|e| ApiError::BadRequest(format!("Invalid multipart payload: {}", e)))?;
            storage.validate_size(data.len() + chunk.len())?;
            data.extend_from_slice(&chunk);
        }

        match field_name.as_str() {
            "file" => {
                if let Some(client_name) = client_name.filter(|n| !n.is_empty()) {
                    form.file = Some((client_name, data));
                }
            }
            "model" => form.model = non_empty(std::str::from_utf8(&data).ok()),
            _ => {}
        }
    }

    Ok(form)
}

pub async fn segment_and_classify(
    config: web::Data<AppConfig>,
    storage: web::Data<TempStorage>,
    cache: web::Data<ResultCache>,
    session: SessionId,
    mut payload: Multipart,
) -> Result<HttpResponse, ApiError> {
    let form = read_upload_form(&mut payload, &storage).await?;
    let Some((client_name, data)) = form.file else {
        return Err(ApiError::BadRequest(
            "No image file found in the request.".to_string(),
        ));
    };
    let original = TempStorage::sanitize_client_name(&client_name)?;
    let model = form.model.unwrap_or_else(|| config.default_model.clone());

    let worker = storage.get_ref().clone();
    let upload_name = original.clone();
    let (upload, mask) = web::block(move || -> Result<_, StorageError> {
        let upload = worker.save_upload(&upload_name, &data)?;
        let mask = worker.write_placeholder_mask(&upload)?;
        Ok((upload, mask))
    })
    .await?
    .map_err(|e| {
        error!("Upload processing failed for {}: {}", original, e);
        ApiError::from(e)
    })?;

    let result = simulate(&original, &model, &mut rand::rng());
    cache.store(
        session.as_str(),
        result.clone(),
        Some(upload.path.clone()),
        Some(mask.path.clone()),
    )?;
    info!(
        "Segmented and classified upload {} as {}",
        upload.file_name,
        result.dominant_class.upper()
    );

    let mut response = ClassifyResponse::from(result);
    response.temp_xray_url = Some(upload.url());
    response.temp_mask_url = Some(mask.url());
    Ok(HttpResponse::Ok().json(response))
}

pub async fn batch_classify(config: web::Data<AppConfig>) -> Result<HttpResponse, ApiError> {
    let images_dir = config.images_dir();
    let summary = web::block(move || summarize_batch(&images_dir, &mut rand::rng())).await?;
    info!(
        "Batch summary: {} images, {} analyzed",
        summary.total_images, summary.analyzed_count
    );
    Ok(HttpResponse::Ok().json(summary))
}
