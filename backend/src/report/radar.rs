use image::{ImageFormat, Rgb, RgbImage};
use imageproc::drawing::{
    draw_filled_circle_mut, draw_hollow_circle_mut, draw_line_segment_mut, draw_polygon_mut,
};
use imageproc::point::Point;
use shared::FeatureVector;
use std::f32::consts::PI;
use std::io::Cursor;

use super::ReportError;

pub const CHART_SIZE: u32 = 600;
const MARGIN: f32 = 60.0;
const RING_STEP: f32 = 0.2;
// axis labels sit just outside the outer ring
const LABEL_REACH: f64 = 1.12;
const TICK_OFFSET: f64 = 0.03;

pub const CHART_TITLE: &str = "Feature Differentiation Analysis (Radar)";

const BACKGROUND: Rgb<u8> = Rgb([255, 255, 255]);
const GRID: Rgb<u8> = Rgb([200, 200, 200]);
const OUTLINE: Rgb<u8> = Rgb([255, 165, 0]);
// orange at 25% over white
const FILL: Rgb<u8> = Rgb([255, 232, 191]);

/// Position of `value` on axis `index` of `count`. Axis 0 points up and the
/// rest follow clockwise.
pub fn axis_point(center: (f32, f32), radius: f32, index: usize, count: usize, value: f64) -> (f32, f32) {
    let angle = 2.0 * PI * index as f32 / count.max(1) as f32;
    let r = radius * value.clamp(0.0, 1.0) as f32;
    (center.0 + r * angle.sin(), center.1 - r * angle.cos())
}

/// Draws the feature vector as a filled radar polygon on a square canvas.
pub fn draw_radar(features: &FeatureVector) -> RgbImage {
    let mut canvas = RgbImage::from_pixel(CHART_SIZE, CHART_SIZE, BACKGROUND);
    let center = (CHART_SIZE as f32 / 2.0, CHART_SIZE as f32 / 2.0);
    let radius = CHART_SIZE as f32 / 2.0 - MARGIN;
    let values = features.named();
    let count = values.len();

    let mut ring = RING_STEP;
    while ring <= 1.0 + f32::EPSILON {
        draw_hollow_circle_mut(
            &mut canvas,
            (center.0 as i32, center.1 as i32),
            (radius * ring).round() as i32,
            GRID,
        );
        ring += RING_STEP;
    }
    for index in 0..count {
        let tip = axis_point(center, radius, index, count, 1.0);
        draw_line_segment_mut(&mut canvas, center, tip, GRID);
    }

    let vertices: Vec<(f32, f32)> = values
        .iter()
        .enumerate()
        .map(|(index, (_, value))| axis_point(center, radius, index, count, *value))
        .collect();

    let polygon: Vec<Point<i32>> = vertices
        .iter()
        .map(|(x, y)| Point::new(x.round() as i32, y.round() as i32))
        .collect();
    // draw_polygon_mut rejects closed or collapsed outlines
    if polygon.len() >= 3 && polygon.first() != polygon.last() {
        draw_polygon_mut(&mut canvas, &polygon, FILL);
    }

    for (index, start) in vertices.iter().enumerate() {
        let end = vertices[(index + 1) % vertices.len()];
        for offset in [-1.0, 0.0, 1.0] {
            draw_line_segment_mut(
                &mut canvas,
                (start.0 + offset, start.1),
                (end.0 + offset, end.1),
                OUTLINE,
            );
            draw_line_segment_mut(
                &mut canvas,
                (start.0, start.1 + offset),
                (end.0, end.1 + offset),
                OUTLINE,
            );
        }
        draw_filled_circle_mut(
            &mut canvas,
            (start.0.round() as i32, start.1.round() as i32),
            5,
            OUTLINE,
        );
    }

    canvas
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelKind {
    Axis,
    Tick,
}

/// Text to print over the chart. `x` and `y` are fractions of the chart
/// side, measured from the top-left corner.
#[derive(Debug, Clone, PartialEq)]
pub struct ChartLabel {
    pub kind: LabelKind,
    pub text: String,
    pub x: f64,
    pub y: f64,
}

/// `lobe_pixel_dist` -> `Lobe Pixel Dist`.
pub fn axis_title(name: &str) -> String {
    name.split('_')
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

/// Axis titles at the tip of each axis and ring values 0.0 to 1.0 along the
/// first axis, positioned to match `draw_radar`.
pub fn chart_labels(features: &FeatureVector) -> Vec<ChartLabel> {
    let size = CHART_SIZE as f64;
    let radius = (size / 2.0 - MARGIN as f64) / size;
    let values = features.named();
    let count = values.len();

    let mut labels: Vec<ChartLabel> = values
        .iter()
        .enumerate()
        .map(|(index, (name, _))| {
            let angle = 2.0 * std::f64::consts::PI * index as f64 / count as f64;
            let reach = radius * LABEL_REACH;
            ChartLabel {
                kind: LabelKind::Axis,
                text: axis_title(name),
                x: 0.5 + reach * angle.sin(),
                y: 0.5 - reach * angle.cos(),
            }
        })
        .collect();

    labels.extend((0..=5).map(|step| {
        let value = step as f64 * RING_STEP as f64;
        ChartLabel {
            kind: LabelKind::Tick,
            text: format!("{:.1}", value),
            x: 0.5 + TICK_OFFSET,
            y: 0.5 - radius * value,
        }
    }));
    labels
}

/// PNG bytes of the radar chart.
pub fn render_radar_chart(features: &FeatureVector) -> Result<Vec<u8>, ReportError> {
    let chart = draw_radar(features);
    let mut buf = Cursor::new(Vec::new());
    chart.write_to(&mut buf, ImageFormat::Png)?;
    Ok(buf.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn features(glcm: f64, opacity: f64, lobe: f64) -> FeatureVector {
        FeatureVector {
            glcm_value: glcm,
            opacity_level: opacity,
            lobe_pixel_dist: lobe,
        }
    }

    #[test]
    fn first_axis_points_up() {
        let (x, y) = axis_point((100.0, 100.0), 50.0, 0, 3, 1.0);
        assert!((x - 100.0).abs() < 1e-4);
        assert!((y - 50.0).abs() < 1e-4);

        let (x, _) = axis_point((100.0, 100.0), 50.0, 1, 3, 1.0);
        assert!(x > 100.0, "second axis should lie to the right");
    }

    #[test]
    fn values_are_clamped() {
        assert_eq!(
            axis_point((0.0, 0.0), 10.0, 0, 3, 2.0),
            axis_point((0.0, 0.0), 10.0, 0, 3, 1.0)
        );
    }

    #[test]
    fn polygon_interior_is_filled() {
        let chart = draw_radar(&features(0.8, 0.8, 0.8));
        let mid = CHART_SIZE / 2;
        assert_eq!(*chart.get_pixel(mid, mid - 20), FILL);
        assert_eq!(*chart.get_pixel(2, 2), BACKGROUND);
    }

    #[test]
    fn axis_titles_are_title_cased() {
        assert_eq!(axis_title("glcm_value"), "Glcm Value");
        assert_eq!(axis_title("lobe_pixel_dist"), "Lobe Pixel Dist");
    }

    #[test]
    fn labels_name_every_axis_and_ring() {
        let labels = chart_labels(&features(0.3, 0.6, 0.9));
        let axes: Vec<&ChartLabel> = labels.iter().filter(|l| l.kind == LabelKind::Axis).collect();
        let ticks: Vec<&str> = labels
            .iter()
            .filter(|l| l.kind == LabelKind::Tick)
            .map(|l| l.text.as_str())
            .collect();

        assert_eq!(
            axes.iter().map(|l| l.text.as_str()).collect::<Vec<_>>(),
            ["Glcm Value", "Opacity Level", "Lobe Pixel Dist"]
        );
        assert_eq!(ticks, ["0.0", "0.2", "0.4", "0.6", "0.8", "1.0"]);

        // first axis label above the outer ring, the next to the lower right
        assert!((axes[0].x - 0.5).abs() < 1e-9 && axes[0].y < 0.1);
        assert!(axes[1].x > 0.5 && axes[1].y > 0.5);
        assert!(axes[2].x < 0.5 && axes[2].y > 0.5);
        for label in &labels {
            assert!((0.0..=1.0).contains(&label.x) && (0.0..=1.0).contains(&label.y));
        }
    }

    #[test]
    fn collapsed_polygon_still_renders() {
        let png = render_radar_chart(&features(0.0, 0.0, 0.0)).unwrap();
        let decoded = image::load_from_memory(&png).unwrap();
        assert_eq!(decoded.width(), CHART_SIZE);
    }
}
