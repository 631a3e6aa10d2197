//! A small flowing-layout PDF canvas on top of `lopdf`.
//!
//! Positions are millimetres from the top-left corner of an A4 page; the
//! canvas keeps a cursor and breaks pages automatically like a typesetter
//! would. Text uses the standard Helvetica faces with WinAnsi encoding.

use image::DynamicImage;
use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream, dictionary};

use super::ReportError;

pub const PAGE_WIDTH: f64 = 210.0;
pub const PAGE_HEIGHT: f64 = 297.0;
pub const MARGIN: f64 = 10.0;
const BREAK_MARGIN: f64 = 20.0;
const CELL_PADDING: f64 = 1.0;
const LINE_WIDTH: f64 = 0.2;
const PT_PER_MM: f64 = 72.0 / 25.4;
const MAX_IMAGE_PIXELS: u32 = 1200;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FontStyle {
    Regular,
    Bold,
    Italic,
}

impl FontStyle {
    const ALL: [FontStyle; 3] = [FontStyle::Regular, FontStyle::Bold, FontStyle::Italic];

    fn resource_name(self) -> &'static str {
        match self {
            FontStyle::Regular => "F1",
            FontStyle::Bold => "F2",
            FontStyle::Italic => "F3",
        }
    }

    fn base_font(self) -> &'static str {
        match self {
            FontStyle::Regular => "Helvetica",
            FontStyle::Bold => "Helvetica-Bold",
            FontStyle::Italic => "Helvetica-Oblique",
        }
    }

    /// Glyph advance in 1/1000 em for one WinAnsi byte.
    fn glyph_width(self, byte: u8) -> u16 {
        let table = match self {
            FontStyle::Bold => &HELVETICA_BOLD_WIDTHS,
            FontStyle::Regular | FontStyle::Italic => &HELVETICA_WIDTHS,
        };
        match byte {
            0x20..=0x7E => table[(byte - 0x20) as usize],
            0x95 => 350,
            _ => 556,
        }
    }
}

// Advance widths for 0x20..=0x7E from the standard Adobe font metrics.
const HELVETICA_WIDTHS: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278, // 0x20
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 278, 278, 584, 584, 584, 556, // 0x30
    1015, 667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, 722, 778, // 0x40
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 278, 278, 278, 469, 556, // 0x50
    333, 556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, 556, 556, // 0x60
    556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, 334, 260, 334, 584, // 0x70
];

const HELVETICA_BOLD_WIDTHS: [u16; 95] = [
    278, 333, 474, 556, 556, 889, 722, 238, 333, 333, 389, 584, 278, 333, 278, 278, // 0x20
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 333, 333, 584, 584, 584, 611, // 0x30
    975, 722, 722, 722, 722, 667, 611, 778, 722, 278, 556, 722, 611, 833, 722, 778, // 0x40
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 333, 278, 333, 584, 556, // 0x50
    333, 556, 611, 556, 611, 556, 333, 611, 611, 278, 278, 556, 278, 889, 611, 611, // 0x60
    611, 611, 389, 556, 333, 611, 556, 778, 556, 556, 500, 389, 280, 389, 584, // 0x70
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Align {
    Left,
    Center,
    Right,
}

pub type Color = [u8; 3];

pub const BLACK: Color = [0, 0, 0];
pub const WHITE: Color = [255, 255, 255];
pub const RED: Color = [255, 0, 0];

/// Encodes text for the WinAnsi fonts; characters outside it become `?`.
pub fn encode_win_ansi(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| match c {
            '•' => 0x95,
            '–' => 0x96,
            '—' => 0x97,
            '‘' => 0x91,
            '’' => 0x92,
            '“' => 0x93,
            '”' => 0x94,
            '€' => 0x80,
            ' '..='~' => c as u8,
            '\u{A0}'..='\u{FF}' => c as u32 as u8,
            _ => b'?',
        })
        .collect()
}

fn real(value: f64) -> Object {
    Object::from(value as f32)
}

fn color_operands(color: Color) -> Vec<Object> {
    color.iter().map(|c| real(f64::from(*c) / 255.0)).collect()
}

/// An image registered with the document, ready to be placed.
#[derive(Debug, Clone)]
pub struct ImageHandle {
    name: String,
    width_px: u32,
    height_px: u32,
}

impl ImageHandle {
    pub fn aspect_ratio(&self) -> f64 {
        f64::from(self.height_px) / f64::from(self.width_px.max(1))
    }
}

/// Lines printed centered at the top of every page.
#[derive(Debug, Clone)]
pub struct PageHeader {
    pub title: String,
    pub subtitle: String,
}

pub struct PdfCanvas {
    doc: Document,
    header: PageHeader,
    pages: Vec<Vec<Operation>>,
    current: usize,
    images: Vec<(String, ObjectId)>,
    x: f64,
    y: f64,
    font: FontStyle,
    font_size: f64,
    fill_color: Color,
    text_color: Color,
}

impl PdfCanvas {
    pub fn new(header: PageHeader) -> Self {
        Self {
            doc: Document::with_version("1.5"),
            header,
            pages: Vec::new(),
            current: 0,
            images: Vec::new(),
            x: MARGIN,
            y: MARGIN,
            font: FontStyle::Regular,
            font_size: 12.0,
            fill_color: WHITE,
            text_color: BLACK,
        }
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn x(&self) -> f64 {
        self.x
    }

    pub fn y(&self) -> f64 {
        self.y
    }

    pub fn set_xy(&mut self, x: f64, y: f64) {
        self.x = x;
        self.y = y;
    }

    pub fn set_x(&mut self, x: f64) {
        self.x = x;
    }

    /// Moves to `y` and back to the left margin.
    pub fn set_y(&mut self, y: f64) {
        self.x = MARGIN;
        self.y = y;
    }

    pub fn set_font(&mut self, style: FontStyle, size: f64) {
        self.font = style;
        self.font_size = size;
    }

    pub fn set_fill_color(&mut self, color: Color) {
        self.fill_color = color;
    }

    pub fn set_text_color(&mut self, color: Color) {
        self.text_color = color;
    }

    pub fn add_page(&mut self) {
        self.pages.push(Vec::new());
        self.current = self.pages.len() - 1;
        self.x = MARGIN;
        self.y = MARGIN;

        let saved = (self.font, self.font_size, self.fill_color, self.text_color);
        self.text_color = BLACK;
        let header = self.header.clone();
        self.set_font(FontStyle::Bold, 15.0);
        self.cell(0.0, 10.0, &header.title, false, true, Align::Center, false);
        self.set_font(FontStyle::Regular, 10.0);
        self.cell(0.0, 5.0, &header.subtitle, false, true, Align::Center, false);
        self.ln(5.0);
        (self.font, self.font_size, self.fill_color, self.text_color) = saved;
    }

    /// Starts a new page when `height` would run into the bottom margin.
    pub fn ensure_space(&mut self, height: f64) {
        if self.pages.is_empty() || self.y + height > PAGE_HEIGHT - BREAK_MARGIN {
            let x = self.x;
            self.add_page();
            self.x = x;
        }
    }

    pub fn ln(&mut self, height: f64) {
        self.x = MARGIN;
        self.y += height;
    }

    /// Width of `text` in millimetres at the current font.
    pub fn text_width(&self, text: &str) -> f64 {
        let units: u32 = encode_win_ansi(text)
            .iter()
            .map(|b| u32::from(self.font.glyph_width(*b)))
            .sum();
        f64::from(units) * self.font_size / 1000.0 / PT_PER_MM
    }

    fn ops(&mut self) -> &mut Vec<Operation> {
        if self.pages.is_empty() {
            self.pages.push(Vec::new());
        }
        &mut self.pages[self.current]
    }

    fn rect(&mut self, x: f64, y: f64, w: f64, h: f64, fill: bool, stroke: bool) {
        let paint = match (fill, stroke) {
            (true, true) => "B",
            (true, false) => "f",
            (false, true) => "S",
            (false, false) => return,
        };
        let fill_color = self.fill_color;
        let ops = self.ops();
        ops.push(Operation::new("q", vec![]));
        ops.push(Operation::new("rg", color_operands(fill_color)));
        ops.push(Operation::new("RG", color_operands(BLACK)));
        ops.push(Operation::new("w", vec![real(LINE_WIDTH * PT_PER_MM)]));
        ops.push(Operation::new(
            "re",
            vec![
                real(x * PT_PER_MM),
                real((PAGE_HEIGHT - y - h) * PT_PER_MM),
                real(w * PT_PER_MM),
                real(h * PT_PER_MM),
            ],
        ));
        ops.push(Operation::new(paint, vec![]));
        ops.push(Operation::new("Q", vec![]));
    }

    fn text_at(&mut self, x: f64, baseline: f64, text: &str) {
        let font = Object::Name(self.font.resource_name().as_bytes().to_vec());
        let size = real(self.font_size);
        let color = color_operands(self.text_color);
        let ops = self.ops();
        ops.push(Operation::new("BT", vec![]));
        ops.push(Operation::new("rg", color));
        ops.push(Operation::new("Tf", vec![font, size]));
        ops.push(Operation::new(
            "Td",
            vec![real(x * PT_PER_MM), real((PAGE_HEIGHT - baseline) * PT_PER_MM)],
        ));
        ops.push(Operation::new(
            "Tj",
            vec![Object::string_literal(encode_win_ansi(text))],
        ));
        ops.push(Operation::new("ET", vec![]));
    }

    /// One line box at the cursor. A zero width extends to the right margin.
    /// With `line_break` the cursor moves to the next line, otherwise it
    /// moves right past the box.
    #[allow(clippy::too_many_arguments)]
    pub fn cell(
        &mut self,
        width: f64,
        height: f64,
        text: &str,
        border: bool,
        line_break: bool,
        align: Align,
        fill: bool,
    ) {
        self.ensure_space(height);
        let width = if width <= 0.0 {
            PAGE_WIDTH - MARGIN - self.x
        } else {
            width
        };
        let (x, y) = (self.x, self.y);

        self.rect(x, y, width, height, fill, border);
        if !text.is_empty() {
            let text_x = match align {
                Align::Left => x + CELL_PADDING,
                Align::Center => x + (width - self.text_width(text)) / 2.0,
                Align::Right => x + width - CELL_PADDING - self.text_width(text),
            };
            let baseline = y + 0.5 * height + 0.3 * self.font_size / PT_PER_MM;
            self.text_at(text_x, baseline, text);
        }

        if line_break {
            self.x = MARGIN;
            self.y += height;
        } else {
            self.x += width;
        }
    }

    /// Left-aligned text wrapped at word boundaries; explicit newlines and
    /// blank lines are kept.
    pub fn multi_cell(&mut self, width: f64, line_height: f64, text: &str) {
        let width = if width <= 0.0 {
            PAGE_WIDTH - MARGIN - self.x
        } else {
            width
        };
        let start_x = self.x;
        for line in self.wrap(text, width - 2.0 * CELL_PADDING) {
            self.x = start_x;
            self.cell(width, line_height, &line, false, true, Align::Left, false);
        }
    }

    fn wrap(&self, text: &str, max_width: f64) -> Vec<String> {
        let mut lines = Vec::new();
        for paragraph in text.split('\n') {
            let mut current = String::new();
            for word in paragraph.split_whitespace() {
                let candidate = if current.is_empty() {
                    word.to_string()
                } else {
                    format!("{} {}", current, word)
                };
                if current.is_empty() || self.text_width(&candidate) <= max_width {
                    current = candidate;
                } else {
                    lines.push(std::mem::replace(&mut current, word.to_string()));
                }
            }
            lines.push(current);
        }
        lines
    }

    /// Embeds an image as an RGB XObject. Large images are downscaled.
    pub fn register_image(&mut self, image: &DynamicImage) -> ImageHandle {
        let image = if image.width() > MAX_IMAGE_PIXELS || image.height() > MAX_IMAGE_PIXELS {
            image.thumbnail(MAX_IMAGE_PIXELS, MAX_IMAGE_PIXELS)
        } else {
            image.clone()
        };
        let rgb = image.to_rgb8();
        let (width_px, height_px) = rgb.dimensions();

        let stream = Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => i64::from(width_px),
                "Height" => i64::from(height_px),
                "ColorSpace" => "DeviceRGB",
                "BitsPerComponent" => 8,
            },
            rgb.into_raw(),
        );
        let id = self.doc.add_object(stream);
        let name = format!("Im{}", self.images.len() + 1);
        self.images.push((name.clone(), id));

        ImageHandle {
            name,
            width_px,
            height_px,
        }
    }

    /// Places a registered image with its top-left corner at (x, y). A
    /// missing height keeps the aspect ratio. The cursor does not move.
    pub fn place_image(&mut self, handle: &ImageHandle, x: f64, y: f64, width: f64, height: Option<f64>) {
        let height = height.unwrap_or(width * handle.aspect_ratio());
        let name = Object::Name(handle.name.as_bytes().to_vec());
        let ops = self.ops();
        ops.push(Operation::new("q", vec![]));
        ops.push(Operation::new(
            "cm",
            vec![
                real(width * PT_PER_MM),
                real(0.0),
                real(0.0),
                real(height * PT_PER_MM),
                real(x * PT_PER_MM),
                real((PAGE_HEIGHT - y - height) * PT_PER_MM),
            ],
        ));
        ops.push(Operation::new("Do", vec![name]));
        ops.push(Operation::new("Q", vec![]));
    }

    fn draw_footers(&mut self) {
        let total = self.pages.len();
        for index in 0..total {
            self.current = index;
            self.set_font(FontStyle::Italic, 8.0);
            self.text_color = BLACK;
            let label = format!("Page {}/{}", index + 1, total);
            let text_x = (PAGE_WIDTH - self.text_width(&label)) / 2.0;
            let baseline = PAGE_HEIGHT - 15.0 + 5.0 + 0.3 * self.font_size / PT_PER_MM;
            self.text_at(text_x, baseline, &label);
        }
    }

    /// Writes footers and serializes the document.
    pub fn finish(mut self, title: &str, created: &str) -> Result<Vec<u8>, ReportError> {
        if self.pages.is_empty() {
            self.add_page();
        }
        self.draw_footers();

        let mut fonts = Dictionary::new();
        for style in FontStyle::ALL {
            let font_id = self.doc.add_object(dictionary! {
                "Type" => "Font",
                "Subtype" => "Type1",
                "BaseFont" => style.base_font(),
                "Encoding" => "WinAnsiEncoding",
            });
            fonts.set(style.resource_name(), font_id);
        }
        let mut xobjects = Dictionary::new();
        for (name, id) in &self.images {
            xobjects.set(name.as_bytes().to_vec(), *id);
        }
        let resources_id = self.doc.add_object(dictionary! {
            "Font" => fonts,
            "XObject" => xobjects,
        });

        let pages_id = self.doc.new_object_id();
        let mut kids = Vec::with_capacity(self.pages.len());
        for operations in std::mem::take(&mut self.pages) {
            let content = Content { operations };
            let content_id = self
                .doc
                .add_object(Stream::new(dictionary! {}, content.encode()?));
            let page_id = self.doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
            });
            kids.push(Object::from(page_id));
        }

        let page_count = kids.len() as i64;
        self.doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => page_count,
                "Resources" => resources_id,
                "MediaBox" => vec![
                    real(0.0),
                    real(0.0),
                    real(PAGE_WIDTH * PT_PER_MM),
                    real(PAGE_HEIGHT * PT_PER_MM),
                ],
            }),
        );
        let catalog_id = self.doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        let info_id = self.doc.add_object(dictionary! {
            "Title" => Object::string_literal(encode_win_ansi(title)),
            "CreationDate" => Object::string_literal(created),
        });
        self.doc.trailer.set("Root", catalog_id);
        self.doc.trailer.set("Info", info_id);

        self.doc.compress();
        let mut buf = Vec::new();
        self.doc.save_to(&mut buf)?;
        Ok(buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header() -> PageHeader {
        PageHeader {
            title: "Title".into(),
            subtitle: "Subtitle".into(),
        }
    }

    fn page_texts(bytes: &[u8]) -> Vec<String> {
        let doc = Document::load_mem(bytes).unwrap();
        doc.get_pages()
            .values()
            .map(|id| String::from_utf8_lossy(&doc.get_page_content(*id).unwrap()).into_owned())
            .collect()
    }

    #[test]
    fn win_ansi_mapping() {
        assert_eq!(encode_win_ansi("a•é"), vec![b'a', 0x95, 0xE9]);
        assert_eq!(encode_win_ansi("肺"), vec![b'?']);
    }

    #[test]
    fn text_width_follows_metrics() {
        let mut canvas = PdfCanvas::new(header());
        canvas.set_font(FontStyle::Regular, 10.0);
        let narrow = canvas.text_width("iiii");
        let wide = canvas.text_width("WWWW");
        assert!(wide > narrow * 3.0);
        canvas.set_font(FontStyle::Bold, 10.0);
        assert!(canvas.text_width("iiii") > narrow);
    }

    #[test]
    fn cells_break_pages_and_footers_count_them() {
        let mut canvas = PdfCanvas::new(header());
        canvas.add_page();
        canvas.set_font(FontStyle::Regular, 10.0);
        for i in 0..60 {
            canvas.cell(0.0, 7.0, &format!("row {}", i), true, true, Align::Left, false);
        }
        assert_eq!(canvas.page_count(), 2);

        let bytes = canvas.finish("t", "D:20240101000000Z").unwrap();
        assert!(bytes.starts_with(b"%PDF-1.5"));
        let texts = page_texts(&bytes);
        assert_eq!(texts.len(), 2);
        assert!(texts[0].contains("(Page 1/2)"));
        assert!(texts[1].contains("(Page 2/2)"));
        assert!(texts[1].contains("(Title)"));
    }

    #[test]
    fn multi_cell_wraps_long_text() {
        let mut canvas = PdfCanvas::new(header());
        canvas.add_page();
        canvas.set_font(FontStyle::Regular, 10.0);
        let start = canvas.y();
        canvas.multi_cell(0.0, 5.0, &"word ".repeat(100));
        let lines = ((canvas.y() - start) / 5.0).round() as usize;
        assert!(lines > 1 && lines < 10, "wrapped into {} lines", lines);

        let before = canvas.y();
        canvas.multi_cell(0.0, 5.0, "a\n\nb");
        assert!((canvas.y() - before - 15.0).abs() < 1e-9);
    }

    #[test]
    fn images_are_embedded() {
        let mut canvas = PdfCanvas::new(header());
        canvas.add_page();
        let image = DynamicImage::ImageRgb8(image::RgbImage::new(20, 10));
        let handle = canvas.register_image(&image);
        assert!((handle.aspect_ratio() - 0.5).abs() < 1e-9);
        canvas.place_image(&handle, 20.0, 40.0, 50.0, None);

        let bytes = canvas.finish("t", "D:20240101000000Z").unwrap();
        assert!(page_texts(&bytes)[0].contains("/Im1 Do"));
    }
}
