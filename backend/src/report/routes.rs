use actix_web::http::header::{ContentDisposition, DispositionParam, DispositionType};
use actix_web::{HttpResponse, web};
use chrono::Utc;
use image::DynamicImage;
use log::{error, info, warn};
use shared::ClassificationResult;
use std::path::{Path, PathBuf};

use super::ReportError;
use super::compose::{ImageSource, ReportAssets, compose_report};
use super::layout::{ReportLayout, ReportVariant};
use super::radar::render_radar_chart;
use crate::cache::result_cache::ResultCache;
use crate::cache::session::SessionId;
use crate::config::AppConfig;
use crate::error::ApiError;
use crate::files::find_file_recursively;
use crate::storage::temp_storage::{TempStorage, blank_mask};

/// A result to render plus any image locations already known for it.
struct ReportRequest {
    result: ClassificationResult,
    image_path: Option<PathBuf>,
    mask_path: Option<PathBuf>,
}

struct SearchDirs {
    images: PathBuf,
    masks: PathBuf,
    temp: PathBuf,
}

impl SearchDirs {
    fn from_config(config: &AppConfig) -> Self {
        Self {
            images: config.images_dir(),
            masks: config.masks_dir(),
            temp: config.temp_dir.clone(),
        }
    }
}

fn locate_original(request: &ReportRequest, dirs: &SearchDirs) -> Result<PathBuf, ReportError> {
    let name = &request.result.file_name;
    request
        .image_path
        .clone()
        .filter(|path| path.is_file())
        .or_else(|| find_file_recursively(&dirs.images, name))
        .or_else(|| find_file_recursively(&dirs.temp, name))
        .ok_or_else(|| ReportError::MissingSource(name.clone()))
}

/// Mask lookup order: known path, masks folder, uploaded mask in the temp
/// folder, then an in-memory white image the size of the original.
fn locate_mask(request: &ReportRequest, original: &Path, dirs: &SearchDirs) -> ImageSource {
    let name = &request.result.file_name;
    let found = request
        .mask_path
        .clone()
        .filter(|path| path.is_file())
        .or_else(|| find_file_recursively(&dirs.masks, name))
        .or_else(|| find_file_recursively(&dirs.temp, &TempStorage::mask_name(name)));
    if let Some(path) = found {
        return ImageSource::File(path);
    }

    warn!("No mask found for {}, using a blank placeholder", name);
    match image::open(original) {
        Ok(image) => ImageSource::Decoded(DynamicImage::ImageRgb8(blank_mask(
            image.width(),
            image.height(),
        ))),
        Err(_) => ImageSource::File(original.to_path_buf()),
    }
}

fn build_report(
    request: &ReportRequest,
    layout: &ReportLayout,
    dirs: &SearchDirs,
) -> Result<Vec<u8>, ReportError> {
    let original = locate_original(request, dirs)?;
    let mask = layout
        .needs_mask()
        .then(|| locate_mask(request, &original, dirs));

    let radar_png = match render_radar_chart(&request.result.features) {
        Ok(png) => Some(png),
        Err(e) => {
            error!("Radar chart rendering failed: {}", e);
            None
        }
    };

    let assets = ReportAssets {
        original: ImageSource::File(original),
        mask,
        radar_png,
    };
    compose_report(&request.result, layout, &assets, Utc::now())
}

async fn render(
    variant: ReportVariant,
    request: ReportRequest,
    config: &AppConfig,
) -> Result<HttpResponse, ApiError> {
    let layout = ReportLayout::for_variant(variant);
    let download_name = layout.download_name(&request.result.file_name);
    let dirs = SearchDirs::from_config(config);
    let file_name = request.result.file_name.clone();

    let pdf = web::block(move || build_report(&request, &layout, &dirs)).await??;
    info!("Generated {:?} report for {} ({} bytes)", variant, file_name, pdf.len());

    Ok(HttpResponse::Ok()
        .content_type("application/pdf")
        .insert_header(ContentDisposition {
            disposition: DispositionType::Attachment,
            parameters: vec![DispositionParam::Filename(download_name)],
        })
        .body(pdf))
}

async fn render_cached(
    variant: ReportVariant,
    config: &AppConfig,
    cache: &ResultCache,
    session: &SessionId,
) -> Result<HttpResponse, ApiError> {
    let entry = cache.latest(session.as_str())?;
    let request = ReportRequest {
        image_path: entry.existing_image_path(),
        mask_path: entry.existing_mask_path(),
        result: entry.result,
    };
    render(variant, request, config).await
}

pub async fn generate_report(
    config: web::Data<AppConfig>,
    cache: web::Data<ResultCache>,
    session: SessionId,
) -> Result<HttpResponse, ApiError> {
    render_cached(ReportVariant::Mobile, &config, &cache, &session).await
}

pub async fn generate_report_desktop(
    config: web::Data<AppConfig>,
    cache: web::Data<ResultCache>,
    session: SessionId,
) -> Result<HttpResponse, ApiError> {
    render_cached(ReportVariant::Desktop, &config, &cache, &session).await
}

fn posted(body: web::Json<ClassificationResult>) -> Result<ReportRequest, ApiError> {
    let result = body.into_inner();
    result.validate().map_err(|e| {
        warn!("Rejected posted result for {}: {}", result.file_name, e);
        ApiError::BadRequest(format!("Invalid classification result: {}", e))
    })?;
    Ok(ReportRequest {
        result,
        image_path: None,
        mask_path: None,
    })
}

/// Renders a result supplied by the caller instead of the cached one.
pub async fn generate_report_from_body(
    config: web::Data<AppConfig>,
    body: web::Json<ClassificationResult>,
) -> Result<HttpResponse, ApiError> {
    render(ReportVariant::Mobile, posted(body)?, &config).await
}

pub async fn generate_report_desktop_from_body(
    config: web::Data<AppConfig>,
    body: web::Json<ClassificationResult>,
) -> Result<HttpResponse, ApiError> {
    render(ReportVariant::Desktop, posted(body)?, &config).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma, RgbImage};
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use crate::classify::simulator::simulate;

    fn dirs(root: &Path) -> SearchDirs {
        SearchDirs {
            images: root.join("radiografias/images"),
            masks: root.join("radiografias/masks"),
            temp: root.join("temp_uploads"),
        }
    }

    fn request(name: &str) -> ReportRequest {
        ReportRequest {
            result: simulate(name, "EfficientNet", &mut StdRng::seed_from_u64(2)),
            image_path: None,
            mask_path: None,
        }
    }

    fn write_png(path: &Path, width: u32, height: u32) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        RgbImage::new(width, height).save(path).unwrap();
    }

    #[test]
    fn original_is_searched_in_images_then_temp() {
        let dir = tempfile::tempdir().unwrap();
        let dirs = dirs(dir.path());
        let req = request("COVID-9.png");
        assert!(matches!(
            locate_original(&req, &dirs),
            Err(ReportError::MissingSource(_))
        ));

        write_png(&dirs.temp.join("COVID-9.png"), 4, 4);
        assert_eq!(locate_original(&req, &dirs).unwrap(), dirs.temp.join("COVID-9.png"));

        let in_library = dirs.images.join("COVID/COVID-9.png");
        write_png(&in_library, 4, 4);
        assert_eq!(locate_original(&req, &dirs).unwrap(), in_library);
    }

    #[test]
    fn missing_mask_becomes_blank_placeholder() {
        let dir = tempfile::tempdir().unwrap();
        let dirs = dirs(dir.path());
        let original = dirs.images.join("Normal-1.png");
        write_png(&original, 12, 8);

        match locate_mask(&request("Normal-1.png"), &original, &dirs) {
            ImageSource::Decoded(mask) => {
                let mask = mask.to_rgb8();
                assert_eq!(mask.dimensions(), (12, 8));
                assert_eq!(mask.get_pixel(0, 0).0, [255, 255, 255]);
            }
            other => panic!("expected placeholder, got {:?}", other),
        }
    }

    #[test]
    fn uploaded_mask_is_found_by_prefix() {
        let dir = tempfile::tempdir().unwrap();
        let dirs = dirs(dir.path());
        let original = dirs.temp.join("Normal-2.png");
        write_png(&original, 10, 10);
        let mask_path = dirs.temp.join("mask_Normal-2.png");
        std::fs::create_dir_all(&dirs.temp).unwrap();
        GrayImage::from_pixel(10, 10, Luma([0])).save(&mask_path).unwrap();

        match locate_mask(&request("Normal-2.png"), &original, &dirs) {
            ImageSource::File(path) => assert_eq!(path, mask_path),
            other => panic!("expected mask file, got {:?}", other),
        }
    }

    #[test]
    fn desktop_report_builds_without_mask_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let dirs = dirs(dir.path());
        write_png(&dirs.images.join("Lung_Opacity-3.png"), 32, 32);

        let pdf = build_report(
            &request("Lung_Opacity-3.png"),
            &ReportLayout::desktop(),
            &dirs,
        )
        .unwrap();
        assert!(pdf.starts_with(b"%PDF"));
    }
}
