//! PDF processing layer
//!
//! The background transform is done with lopdf; preview rendering uses PDFium.

mod background;
mod color;
mod render;

pub use background::{page_bounds, page_count, recolor_background, recolor_first_page, PageBounds};
pub use color::{
    BackgroundMode, BackgroundOptions, Rgb, DEFAULT_BACKGROUND, DEFAULT_OVERLAY_OPACITY,
};
pub use render::{
    pdfium_available, render_first_page, render_preview, PreviewImage, DEFAULT_PREVIEW_DPI,
};
