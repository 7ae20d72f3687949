//! PDF Eye-Saver Library
//!
//! This crate recolors PDF page backgrounds to reduce eye strain and
//! exposes that as MCP tools:
//! - `change_background`: Apply a background color to every page
//! - `preview_background`: Render page 1 with the color applied
//! - `get_page_count`: Count pages in a PDF

pub mod error;
pub mod pdf;
pub mod server;
pub mod source;

pub use error::{Error, Result};
pub use pdf::{recolor_background, BackgroundMode, BackgroundOptions, Rgb};
pub use server::{run_server, run_server_with_config, PdfServer, PdfSource, ServerConfig};
