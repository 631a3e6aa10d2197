use chrono::{DateTime, Utc};
use image::DynamicImage;
use shared::{ClassificationResult, FeatureVector};
use std::path::PathBuf;

use super::ReportError;
use super::layout::{ImageSlot, ReportLayout, SlotKind};
use super::pdf::{Align, BLACK, Color, FontStyle, PageHeader, PdfCanvas, RED, WHITE};
use super::radar::{CHART_TITLE, LabelKind, chart_labels};
use super::recommendations::guidance_for_label;

pub const REPORT_TITLE: &str = "Automated AI Classification Report";
pub const REPORT_SUBTITLE: &str = "Radiology Model Prototype";
const CHART_X: f64 = 60.0;
const CHART_WIDTH: f64 = 85.0;
const CHART_TITLE_HEIGHT: f64 = 6.0;
const LABEL_WIDTH: f64 = 30.0;
const LABEL_HEIGHT: f64 = 4.0;
const GREY: Color = [128, 128, 128];

/// Where an image for the report comes from.
#[derive(Debug, Clone)]
pub enum ImageSource {
    File(PathBuf),
    Decoded(DynamicImage),
}

impl ImageSource {
    fn load(&self) -> Result<DynamicImage, ReportError> {
        match self {
            ImageSource::File(path) => Ok(image::open(path)?),
            ImageSource::Decoded(image) => Ok(image.clone()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ReportAssets {
    pub original: ImageSource,
    pub mask: Option<ImageSource>,
    /// PNG bytes of the radar chart, if it could be rendered.
    pub radar_png: Option<Vec<u8>>,
}

fn section_title(canvas: &mut PdfCanvas, title: &str) {
    canvas.set_font(FontStyle::Bold, 11.0);
    canvas.cell(0.0, 6.0, title, false, true, Align::Left, false);
    canvas.ln(1.0);
}

fn draw_slot(canvas: &mut PdfCanvas, slot: &ImageSlot, source: Option<&ImageSource>, top: f64, size: f64) {
    let loaded = match source {
        Some(source) => source.load().map_err(|e| e.to_string()),
        None => Err("not available".to_string()),
    };

    match loaded {
        Ok(image) => {
            let handle = canvas.register_image(&image);
            canvas.place_image(&handle, slot.x, top, size, Some(size));
            canvas.set_font(FontStyle::Regular, 9.0);
            canvas.set_xy(slot.x, top + size);
            canvas.cell(size, 5.0, slot.caption, false, false, Align::Center, false);
        }
        Err(e) => {
            log::warn!("Report image {:?} could not be embedded: {}", slot.kind, e);
            canvas.set_font(FontStyle::Regular, 9.0);
            canvas.set_text_color(RED);
            canvas.set_xy(slot.x, top + size / 2.0);
            canvas.cell(
                size,
                10.0,
                &format!("Error: {} ({})", slot.error_label, e),
                false,
                false,
                Align::Center,
                false,
            );
            canvas.set_text_color(BLACK);
        }
    }
}

fn probability_table(canvas: &mut PdfCanvas, result: &ClassificationResult) {
    let ranked = result.ranked();
    let top_label = ranked.first().map(|(label, _)| *label);

    canvas.set_fill_color([230, 230, 230]);
    canvas.cell(50.0, 7.0, "Pathology", true, false, Align::Left, true);
    canvas.cell(40.0, 7.0, "Probability", true, true, Align::Right, true);

    for (label, probability) in ranked {
        let is_max = Some(label) == top_label;
        if is_max {
            canvas.set_font(FontStyle::Bold, 10.0);
            canvas.set_fill_color([190, 255, 190]);
        } else {
            canvas.set_font(FontStyle::Regular, 10.0);
            canvas.set_fill_color(WHITE);
        }
        canvas.cell(50.0, 7.0, &label.title(), true, false, Align::Left, is_max);
        canvas.cell(
            40.0,
            7.0,
            &format!("{:.2}%", probability * 100.0),
            true,
            true,
            Align::Right,
            is_max,
        );
    }
}

fn analysis_text(result: &ClassificationResult) -> String {
    let dominant = result.dominant_class;
    let guidance = guidance_for_label(dominant);
    format!(
        "Main Diagnosis: {title}\n\n\
         Statistical Analysis:\n\
         The probability of {title} is {percent:.2}%, indicating high confidence.\n\n\
         Recommendations:\n{recommendations}",
        title = dominant.title(),
        percent = result.probability(dominant) * 100.0,
        recommendations = guidance.recommendations,
    )
}

fn feature_caption(result: &ClassificationResult) -> String {
    let features = &result.features;
    format!(
        "Texture Values (GLCM): {:.2}\n\
         Opacity Level: {:.2}\n\
         Pixel Distribution per Lobe: {:.2}\n\n\
         These values only illustrate model behavior.",
        features.glcm_value, features.opacity_level, features.lobe_pixel_dist
    )
}

fn radar_section(canvas: &mut PdfCanvas, features: &FeatureVector, radar_png: Option<&[u8]>) {
    let chart = radar_png.and_then(|png| match image::load_from_memory(png) {
        Ok(image) => Some(image),
        Err(e) => {
            log::warn!("Radar chart could not be decoded: {}", e);
            None
        }
    });

    match chart {
        Some(chart) => {
            let handle = canvas.register_image(&chart);
            let height = CHART_WIDTH * handle.aspect_ratio();
            canvas.ensure_space(CHART_TITLE_HEIGHT + height);
            canvas.set_font(FontStyle::Bold, 10.0);
            canvas.cell(0.0, CHART_TITLE_HEIGHT, CHART_TITLE, false, true, Align::Center, false);

            let top = canvas.y();
            canvas.place_image(&handle, CHART_X, top, CHART_WIDTH, Some(height));
            label_chart(canvas, features, top, height);
            canvas.set_y(top);
            canvas.ln(height);
        }
        None => {
            canvas.set_font(FontStyle::Regular, 10.0);
            canvas.set_text_color(RED);
            canvas.cell(0.0, 10.0, "Error: radar chart not available.", false, true, Align::Left, false);
            canvas.set_text_color(BLACK);
            canvas.ln(5.0);
        }
    }
}

fn label_chart(canvas: &mut PdfCanvas, features: &FeatureVector, top: f64, height: f64) {
    for label in chart_labels(features) {
        let (size, color) = match label.kind {
            LabelKind::Axis => (8.0, BLACK),
            LabelKind::Tick => (7.0, GREY),
        };
        canvas.set_font(FontStyle::Regular, size);
        canvas.set_text_color(color);
        let x = CHART_X + label.x * CHART_WIDTH;
        let y = top + label.y * height - LABEL_HEIGHT / 2.0;
        match label.kind {
            LabelKind::Axis => {
                canvas.set_xy(x - LABEL_WIDTH / 2.0, y);
                canvas.cell(LABEL_WIDTH, LABEL_HEIGHT, &label.text, false, false, Align::Center, false);
            }
            LabelKind::Tick => {
                canvas.set_xy(x, y);
                canvas.cell(LABEL_WIDTH / 3.0, LABEL_HEIGHT, &label.text, false, false, Align::Left, false);
            }
        }
    }
    canvas.set_text_color(BLACK);
}

/// Renders the report for `result` in the given layout and returns the PDF
/// bytes. Images that fail to load become red captions in place.
pub fn compose_report(
    result: &ClassificationResult,
    layout: &ReportLayout,
    assets: &ReportAssets,
    generated_at: DateTime<Utc>,
) -> Result<Vec<u8>, ReportError> {
    let mut canvas = PdfCanvas::new(PageHeader {
        title: REPORT_TITLE.to_string(),
        subtitle: REPORT_SUBTITLE.to_string(),
    });
    canvas.add_page();

    canvas.set_font(FontStyle::Regular, 12.0);
    canvas.set_fill_color([200, 220, 255]);
    canvas.cell(
        0.0,
        8.0,
        &format!("IMAGE DATA: {}", result.file_name),
        true,
        true,
        Align::Left,
        true,
    );
    canvas.ln(2.0);

    section_title(&mut canvas, "1. Clinical Images");
    let top = canvas.y();
    for slot in &layout.slots {
        let source = match slot.kind {
            SlotKind::Original => Some(&assets.original),
            SlotKind::Mask => assets.mask.as_ref(),
        };
        draw_slot(&mut canvas, slot, source, top, layout.image_size);
    }
    canvas.set_y(top + layout.image_size + 8.0);

    section_title(&mut canvas, "2. Model Prediction");
    probability_table(&mut canvas, result);
    canvas.ln(5.0);

    section_title(&mut canvas, "3. Statistical Analysis and Recommendations");
    canvas.set_font(FontStyle::Regular, 10.0);
    canvas.multi_cell(0.0, 5.0, &analysis_text(result));
    canvas.ln(5.0);

    if layout.include_medications {
        section_title(&mut canvas, "4. Suggested Medications");
        canvas.set_font(FontStyle::Regular, 10.0);
        let medications = guidance_for_label(result.dominant_class)
            .medications
            .iter()
            .map(|med| format!("• {}", med))
            .collect::<Vec<_>>()
            .join("\n");
        canvas.multi_cell(0.0, 5.0, &medications);
        canvas.ln(5.0);
    }

    section_title(
        &mut canvas,
        &format!(
            "{}. Feature Differentiation Analysis (Chart)",
            layout.chart_section_number()
        ),
    );
    radar_section(&mut canvas, &result.features, assets.radar_png.as_deref());

    canvas.set_font(FontStyle::Regular, 10.0);
    canvas.multi_cell(0.0, 5.0, &feature_caption(result));

    let title = format!("{} - {}", REPORT_TITLE, result.file_name);
    let created = generated_at.format("D:%Y%m%d%H%M%SZ").to_string();
    canvas.finish(&title, &created)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::simulator::simulate;
    use crate::report::radar::render_radar_chart;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn result(name: &str) -> ClassificationResult {
        simulate(name, "EfficientNet", &mut StdRng::seed_from_u64(11))
    }

    fn gray_image() -> DynamicImage {
        DynamicImage::ImageRgb8(image::RgbImage::from_pixel(64, 64, image::Rgb([120, 120, 120])))
    }

    fn content(bytes: &[u8]) -> String {
        let doc = lopdf::Document::load_mem(bytes).unwrap();
        doc.get_pages()
            .values()
            .map(|id| String::from_utf8_lossy(&doc.get_page_content(*id).unwrap()).into_owned())
            .collect::<Vec<_>>()
            .join("\n")
    }

    #[test]
    fn mobile_report_lists_medications() {
        let result = result("COVID-3.png");
        let assets = ReportAssets {
            original: ImageSource::Decoded(gray_image()),
            mask: None,
            radar_png: render_radar_chart(&result.features).ok(),
        };
        let bytes = compose_report(&result, &ReportLayout::mobile(), &assets, Utc::now()).unwrap();
        assert!(bytes.starts_with(b"%PDF"));

        let text = content(&bytes);
        assert!(text.contains("IMAGE DATA: COVID-3.png"));
        assert!(text.contains("4. Suggested Medications"));
        assert!(text.contains("Paracetamol"));
        assert!(text.contains("Main Diagnosis: Covid"));
        assert!(text.contains("/Im2 Do"), "radar chart should follow the original");
        assert!(text.contains("Radar"));
        for axis in ["Glcm Value", "Opacity Level", "Lobe Pixel Dist", "(0.0)", "(1.0)"] {
            assert!(text.contains(axis), "missing chart label {}", axis);
        }
        assert!(!text.contains("Segmentation Mask"));
    }

    #[test]
    fn desktop_report_shows_mask_and_no_medications() {
        let result = result("Normal-8.png");
        let assets = ReportAssets {
            original: ImageSource::Decoded(gray_image()),
            mask: Some(ImageSource::Decoded(gray_image())),
            radar_png: None,
        };
        let bytes = compose_report(&result, &ReportLayout::desktop(), &assets, Utc::now()).unwrap();

        let text = content(&bytes);
        assert!(text.contains("Segmentation Mask"));
        assert!(!text.contains("Suggested Medications"));
        assert!(text.contains("Error: radar chart not available."));
        assert!(text.contains("Pixel Distribution per Lobe"));
    }

    #[test]
    fn unreadable_images_become_captions() {
        let dir = tempfile::tempdir().unwrap();
        let broken = dir.path().join("broken.png");
        std::fs::write(&broken, b"not a png").unwrap();

        let result = result("Lung_Opacity-1.png");
        let assets = ReportAssets {
            original: ImageSource::File(broken),
            mask: None,
            radar_png: Some(b"garbage".to_vec()),
        };
        let bytes = compose_report(&result, &ReportLayout::desktop(), &assets, Utc::now()).unwrap();

        let text = content(&bytes);
        assert!(text.contains("Error: Original Image"));
        assert!(text.contains("Error: Mask"));
        assert!(text.contains("Error: radar chart not available."));
    }

    #[test]
    fn analysis_and_caption_text() {
        let result = result("Viral Pneumonia-4.png");
        let text = analysis_text(&result);
        assert!(text.starts_with("Main Diagnosis: Viral Pneumonia"));
        assert!(feature_caption(&result).ends_with("These values only illustrate model behavior."));
    }
}
