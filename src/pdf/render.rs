//! First-page preview rendering with PDFium

use crate::error::{Error, Result};
use crate::pdf::background::recolor_first_page;
use crate::pdf::color::BackgroundOptions;
use base64::Engine;
use pdfium_render::prelude::*;

/// Resolution the preview is rendered at unless the caller asks otherwise
pub const DEFAULT_PREVIEW_DPI: u16 = 100;

/// PDF user space unit: 1/72 inch
const POINTS_PER_INCH: f32 = 72.0;

/// Rendered first page of a recolored document
#[derive(Debug, Clone)]
pub struct PreviewImage {
    /// Total pages in the source document
    pub page_count: u32,
    /// Image width in pixels
    pub width: u32,
    /// Image height in pixels
    pub height: u32,
    /// PNG-encoded image
    pub png: Vec<u8>,
}

impl PreviewImage {
    pub fn mime_type(&self) -> &'static str {
        "image/png"
    }

    pub fn data_base64(&self) -> String {
        base64::engine::general_purpose::STANDARD.encode(&self.png)
    }
}

/// Get PDFium instance (creates new instance each time - PDFium is not thread-safe)
fn create_pdfium() -> Result<Pdfium> {
    let bindings = Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
        .or_else(|_| {
            Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(
                "/opt/pdfium/lib",
            ))
        })
        .or_else(|_| Pdfium::bind_to_system_library())
        .map_err(|e| Error::Pdfium {
            reason: format!("Failed to initialize PDFium: {}", e),
        })?;

    Ok(Pdfium::new(bindings))
}

/// Whether the PDFium library can be loaded; previews are unavailable otherwise
pub fn pdfium_available() -> bool {
    create_pdfium().is_ok()
}

/// Apply the background transform to page one and render it
pub fn render_preview(
    data: &[u8],
    options: &BackgroundOptions,
    dpi: u16,
    max_pixels: u64,
) -> Result<PreviewImage> {
    let recolored = recolor_first_page(data, options)?;
    render_first_page(&recolored, dpi, max_pixels)
}

/// Render page one as PNG at the given resolution
pub fn render_first_page(data: &[u8], dpi: u16, max_pixels: u64) -> Result<PreviewImage> {
    if dpi == 0 {
        return Err(Error::ImageDimensionExceeded {
            detail: "dpi must be greater than 0".to_string(),
        });
    }

    let pdfium = create_pdfium()?;
    let document = pdfium
        .load_pdf_from_byte_slice(data, None)
        .map_err(|e| match e {
            PdfiumError::PdfiumLibraryInternalError(PdfiumInternalError::PasswordError) => {
                Error::Encrypted
            }
            _ => Error::MalformedInput {
                reason: format!("PDFium could not open document: {}", e),
            },
        })?;

    let pages = document.pages();
    let page_count = pages.len() as u32;
    let page = pages.get(0).map_err(|e| Error::Pdfium {
        reason: format!("Failed to get page 1: {}", e),
    })?;

    let scale = f32::from(dpi) / POINTS_PER_INCH;
    let pixel_area =
        (page.width().value * scale).ceil() as u64 * (page.height().value * scale).ceil() as u64;
    if pixel_area > max_pixels {
        return Err(Error::ImageDimensionExceeded {
            detail: format!(
                "page 1 at {} dpi is {} pixels, exceeds maximum {} pixels",
                dpi, pixel_area, max_pixels
            ),
        });
    }

    let config = PdfRenderConfig::new()
        .scale_page_by_factor(scale)
        .render_form_data(true)
        .render_annotations(true);

    let bitmap = page.render_with_config(&config).map_err(|e| Error::Pdfium {
        reason: format!("Failed to render page 1: {}", e),
    })?;

    let rendered = bitmap.as_image();
    let width = rendered.width();
    let height = rendered.height();

    let mut png = Vec::new();
    rendered
        .write_to(&mut std::io::Cursor::new(&mut png), image::ImageFormat::Png)
        .map_err(|e| Error::Pdfium {
            reason: format!("Failed to encode page 1 as PNG: {}", e),
        })?;

    tracing::debug!(width, height, dpi, "Preview rendered");

    Ok(PreviewImage {
        page_count,
        width,
        height,
        png,
    })
}
