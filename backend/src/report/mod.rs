//! PDF report generation for the cached (or posted) classification.

pub mod compose;
pub mod layout;
pub mod pdf;
pub mod radar;
pub mod recommendations;
pub mod routes;

#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("PDF error: {0}")]
    Pdf(#[from] lopdf::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
    #[error("I/O error: the radiograph '{0}' was not found on the server.")]
    MissingSource(String),
}
