//! MCP Server implementation using rmcp

use crate::error::Error;
use crate::pdf::{page_count, recolor_background, render_preview, BackgroundOptions, DEFAULT_PREVIEW_DPI};
use crate::source::{resolve_base64, resolve_cache, resolve_path, CachedPdf, PdfCache, ResolvedPdf};
use anyhow::Result;
use base64::Engine;
use rmcp::{
    handler::server::tool::ToolRouter, handler::server::wrapper::Parameters, model::*,
    schemars::JsonSchema, tool, tool_handler, tool_router, ServerHandler, ServiceExt,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

/// PDF source specification
#[derive(Debug, Clone, Serialize, JsonSchema)]
#[serde(untagged)]
pub enum PdfSource {
    /// File path (absolute or relative)
    Path {
        /// Path to the PDF file
        path: String,
    },
    /// Base64 encoded PDF data, e.g. an uploaded file
    Base64 {
        /// Base64 encoded PDF content
        base64: String,
        /// Name of the uploaded file, used to name the output
        #[serde(default, skip_serializing_if = "Option::is_none")]
        file_name: Option<String>,
    },
    /// Reference to a PDF produced by an earlier call
    CacheRef {
        /// Cache key from previous operation
        cache_key: String,
    },
}

impl<'de> serde::Deserialize<'de> for PdfSource {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let value = serde_json::Value::deserialize(deserializer)?;

        let string_field = |obj: &serde_json::Map<String, serde_json::Value>, key: &str| {
            obj.get(key)
                .map(|v| {
                    v.as_str()
                        .map(str::to_string)
                        .ok_or_else(|| serde::de::Error::custom(format!("\"{}\" must be a string", key)))
                })
                .transpose()
        };

        let Some(obj) = value.as_object() else {
            return Err(serde::de::Error::custom(format!(
                "Invalid source: expected an object with one of \"path\", \"base64\", or \"cache_key\", but got {}",
                match &value {
                    serde_json::Value::Array(_) => "an array",
                    serde_json::Value::String(_) => "a string",
                    serde_json::Value::Number(_) => "a number",
                    serde_json::Value::Bool(_) => "a boolean",
                    serde_json::Value::Null => "null",
                    _ => "unknown type",
                }
            )));
        };

        if let Some(path) = string_field(obj, "path")? {
            return Ok(PdfSource::Path { path });
        }
        if let Some(base64) = string_field(obj, "base64")? {
            return Ok(PdfSource::Base64 {
                base64,
                file_name: string_field(obj, "file_name")?,
            });
        }
        if let Some(cache_key) = string_field(obj, "cache_key")? {
            return Ok(PdfSource::CacheRef { cache_key });
        }

        let keys: Vec<&String> = obj.keys().collect();
        Err(serde::de::Error::custom(format!(
            "Invalid source: expected an object with one of \"path\", \"base64\", or \"cache_key\", but got keys: {:?}",
            keys
        )))
    }
}

/// Resource limits and sandboxing for the server
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Directories path sources and output paths must stay inside (empty: unrestricted)
    pub resource_dirs: Vec<String>,
    /// Maximum input PDF size in bytes (default: 100MB)
    pub max_input_bytes: u64,
    /// Maximum total bytes in cache (default: 512MB)
    pub cache_max_bytes: usize,
    /// Maximum number of cache entries (default: 100)
    pub cache_max_entries: usize,
    /// Wall-clock limit for one transform or preview (default: 60s)
    pub transform_timeout: Duration,
    /// Maximum preview resolution (default: 300)
    pub max_preview_dpi: u16,
    /// Maximum total pixel area for previews (default: 100_000_000)
    pub max_image_pixels: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            resource_dirs: Vec::new(),
            max_input_bytes: 100 * 1024 * 1024, // 100MB
            cache_max_bytes: 512 * 1024 * 1024, // 512MB
            cache_max_entries: 100,
            transform_timeout: Duration::from_secs(60),
            max_preview_dpi: 300,
            max_image_pixels: 100_000_000,
        }
    }
}

pub const ENV_RESOURCE_DIRS: &str = "PDF_EYE_SAVER_RESOURCE_DIRS";
pub const ENV_MAX_INPUT_BYTES: &str = "PDF_EYE_SAVER_MAX_INPUT_BYTES";
pub const ENV_TIMEOUT_SECS: &str = "PDF_EYE_SAVER_TIMEOUT_SECS";

impl ServerConfig {
    /// Defaults overridden by `PDF_EYE_SAVER_*` environment variables
    pub fn from_env() -> Self {
        Self::from_vars(|name| std::env::var(name).ok())
    }

    fn from_vars(lookup: impl Fn(&str) -> Option<String>) -> Self {
        fn parsed<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Option<T> {
            let raw = lookup(name)?;
            match raw.trim().parse() {
                Ok(value) => Some(value),
                Err(_) => {
                    tracing::warn!(variable = name, value = %raw, "Ignoring unparseable setting");
                    None
                }
            }
        }

        let mut config = Self::default();
        if let Some(dirs) = lookup(ENV_RESOURCE_DIRS) {
            config.resource_dirs = std::env::split_paths(&dirs)
                .filter(|p| !p.as_os_str().is_empty())
                .map(|p| p.to_string_lossy().to_string())
                .collect();
        }
        if let Some(bytes) = parsed(&lookup, ENV_MAX_INPUT_BYTES) {
            config.max_input_bytes = bytes;
        }
        if let Some(secs) = parsed::<u64>(&lookup, ENV_TIMEOUT_SECS).filter(|&s| s > 0) {
            config.transform_timeout = Duration::from_secs(secs);
        }
        config
    }
}

/// PDF Eye-Saver MCP server
#[derive(Clone)]
pub struct PdfServer {
    cache: Arc<PdfCache>,
    tool_router: ToolRouter<Self>,
    config: Arc<ServerConfig>,
}

fn default_color() -> String {
    "#FFFFCC".to_string()
}

fn default_mode() -> String {
    "standard".to_string()
}

// ============================================================================
// Request/Response types for change_background
// ============================================================================

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ChangeBackgroundParams {
    /// Source PDF
    pub source: PdfSource,
    /// Background color as "#RRGGBB" (default: "#FFFFCC")
    #[serde(default = "default_color")]
    pub color: String,
    /// "standard" (color behind content, for digital PDFs) or
    /// "overlay" (translucent tint on top, for scanned PDFs). Default: "standard"
    #[serde(default = "default_mode")]
    pub mode: String,
    /// Overlay opacity in (0, 1] (default: 0.3). Ignored in standard mode.
    #[serde(default)]
    pub overlay_opacity: Option<f32>,
    /// Output file path (optional). If provided, saves the PDF to this path.
    #[serde(default)]
    pub output_path: Option<String>,
    /// Return the output PDF as base64 in the response (default: false)
    #[serde(default)]
    pub include_data: bool,
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct ChangeBackgroundResult {
    /// Source identifier
    pub source: String,
    /// Cache key for the output PDF, for previewing or downloading it later
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_cache_key: Option<String>,
    /// Number of pages in output PDF
    pub output_page_count: u32,
    /// Suggested download name
    pub output_file_name: String,
    /// Path where PDF was saved (if output_path was specified)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_path: Option<String>,
    /// Base64 encoded output PDF (if include_data was set)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_base64: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

// ============================================================================
// Request/Response types for preview_background
// ============================================================================

#[derive(Debug, Deserialize, JsonSchema)]
pub struct PreviewBackgroundParams {
    /// Source PDF
    pub source: PdfSource,
    /// Background color as "#RRGGBB" (default: "#FFFFCC")
    #[serde(default = "default_color")]
    pub color: String,
    /// "standard" or "overlay" (default: "standard")
    #[serde(default = "default_mode")]
    pub mode: String,
    /// Overlay opacity in (0, 1] (default: 0.3). Ignored in standard mode.
    #[serde(default)]
    pub overlay_opacity: Option<f32>,
    /// Preview resolution in dots per inch (default: 100)
    #[serde(default)]
    pub dpi: Option<u16>,
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct PreviewBackgroundResult {
    pub source: String,
    /// Total pages in the document
    pub page_count: u32,
    /// Image width in pixels
    pub width: u32,
    /// Image height in pixels
    pub height: u32,
    /// Base64-encoded PNG of page 1
    pub data_base64: String,
    /// MIME type (always "image/png")
    pub mime_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

// ============================================================================
// Request/Response types for get_page_count
// ============================================================================

#[derive(Debug, Deserialize, JsonSchema)]
pub struct GetPageCountParams {
    /// Source PDF
    pub source: PdfSource,
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct GetPageCountResult {
    pub source: String,
    pub page_count: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

fn results_json<T: Serialize>(result: T) -> String {
    let response = serde_json::json!({ "results": [result] });
    serde_json::to_string_pretty(&response).unwrap_or_default()
}

#[tool_router]
impl PdfServer {
    pub fn new() -> Self {
        Self::with_config(ServerConfig::default())
    }

    /// Create a new PdfServer with full configuration
    pub fn with_config(config: ServerConfig) -> Self {
        let cache = PdfCache::new(config.cache_max_entries, config.cache_max_bytes);
        Self {
            cache: Arc::new(cache),
            tool_router: Self::tool_router(),
            config: Arc::new(config),
        }
    }

    /// Recolor the background of every page
    #[tool(
        description = "Change the background color of every page of a PDF to reduce eye strain. Returns a new PDF; the original is never modified.

Modes:
- standard: opaque color drawn behind all page content. Best for digital PDFs (text stays crisp).
- overlay: translucent color drawn on top of the page. Best for scanned PDFs, whose white background is part of the image.

The output is always cached (output_cache_key) so it can be previewed with preview_background or processed again. Set output_path to save it, or include_data to receive it as base64.

Source format: must be one of {\"path\": \"/absolute/path.pdf\"}, {\"base64\": \"...\", \"file_name\": \"optional.pdf\"}, or {\"cache_key\": \"...\"}"
    )]
    async fn change_background(
        &self,
        Parameters(params): Parameters<ChangeBackgroundParams>,
    ) -> String {
        let result = self
            .process_change_background(&params)
            .await
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "change_background failed");
                ChangeBackgroundResult {
                    source: Self::source_name(&params.source),
                    output_cache_key: None,
                    output_page_count: 0,
                    output_file_name: String::new(),
                    output_path: None,
                    data_base64: None,
                    error: Some(e.client_message()),
                }
            });

        results_json(result)
    }

    /// Render page 1 with the background applied
    #[tool(
        description = "Preview a background change: applies the color to page 1 only and returns it as a PNG image (base64). Also reports the document's page count.

Options:
- dpi: Preview resolution (default: 100).

Source format: must be one of {\"path\": \"/absolute/path.pdf\"}, {\"base64\": \"...\"}, or {\"cache_key\": \"...\"}"
    )]
    async fn preview_background(
        &self,
        Parameters(params): Parameters<PreviewBackgroundParams>,
    ) -> String {
        let result = self
            .process_preview_background(&params)
            .await
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "preview_background failed");
                PreviewBackgroundResult {
                    source: Self::source_name(&params.source),
                    page_count: 0,
                    width: 0,
                    height: 0,
                    data_base64: String::new(),
                    mime_type: "image/png".to_string(),
                    error: Some(e.client_message()),
                }
            });

        results_json(result)
    }

    /// Count pages
    #[tool(
        description = "Get the number of pages in a PDF.

Source format: must be one of {\"path\": \"/absolute/path.pdf\"}, {\"base64\": \"...\"}, or {\"cache_key\": \"...\"}"
    )]
    async fn get_page_count(&self, Parameters(params): Parameters<GetPageCountParams>) -> String {
        let result = self
            .process_get_page_count(&params)
            .await
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "get_page_count failed");
                GetPageCountResult {
                    source: Self::source_name(&params.source),
                    page_count: 0,
                    error: Some(e.client_message()),
                }
            });

        results_json(result)
    }
}

impl PdfServer {
    fn source_name(source: &PdfSource) -> String {
        match source {
            PdfSource::Path { path } => path.clone(),
            PdfSource::Base64 { .. } => "<base64>".to_string(),
            PdfSource::CacheRef { cache_key } => format!("<cache:{}>", cache_key),
        }
    }

    fn resolve_source(&self, source: &PdfSource) -> crate::error::Result<ResolvedPdf> {
        let max_bytes = self.config.max_input_bytes;
        match source {
            PdfSource::Path { path } => {
                let path = self.validate_path_access(path)?;
                resolve_path(path, max_bytes)
            }
            PdfSource::Base64 { base64, file_name } => {
                resolve_base64(base64, file_name.as_deref(), max_bytes)
            }
            PdfSource::CacheRef { cache_key } => resolve_cache(cache_key, &self.cache),
        }
    }

    /// Run PDF work on the blocking pool, bounded by the configured timeout.
    /// On timeout the result is discarded.
    async fn run_blocking<T, F>(&self, task: F) -> crate::error::Result<T>
    where
        F: FnOnce() -> crate::error::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let limit = self.config.transform_timeout;
        match tokio::time::timeout(limit, tokio::task::spawn_blocking(task)).await {
            Ok(joined) => joined.map_err(|e| Error::TaskFailed {
                reason: format!("Task join error: {}", e),
            })?,
            Err(_) => Err(Error::Timeout {
                seconds: limit.as_secs(),
            }),
        }
    }

    /// Validate that a path is within allowed resource directories.
    /// If no resource_dirs are configured, all paths are allowed.
    fn validate_path_access(&self, path: &str) -> crate::error::Result<PathBuf> {
        if self.config.resource_dirs.is_empty() {
            return Ok(PathBuf::from(path));
        }

        let canonical =
            std::fs::canonicalize(path).map_err(|_| Error::PathAccessDenied {
                path: path.to_string(),
            })?;

        if self.within_resource_dirs(&canonical) {
            Ok(canonical)
        } else {
            Err(Error::PathAccessDenied {
                path: path.to_string(),
            })
        }
    }

    /// Validate that an output path is within allowed resource directories.
    /// Canonicalizes the parent directory since the output file may not exist yet.
    fn validate_output_path_access(&self, path: &str) -> crate::error::Result<PathBuf> {
        if self.config.resource_dirs.is_empty() {
            return Ok(PathBuf::from(path));
        }

        let path_obj = Path::new(path);
        let parent = match path_obj.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        let denied = || Error::PathAccessDenied {
            path: path.to_string(),
        };

        let file_name = path_obj.file_name().ok_or_else(denied)?;
        let canonical_target = std::fs::canonicalize(parent)
            .map_err(|_| denied())?
            .join(file_name);

        if self.within_resource_dirs(&canonical_target) {
            Ok(canonical_target)
        } else {
            Err(denied())
        }
    }

    fn within_resource_dirs(&self, canonical: &Path) -> bool {
        self.config.resource_dirs.iter().any(|dir| {
            std::fs::canonicalize(dir)
                .map(|canonical_dir| canonical.starts_with(&canonical_dir))
                .unwrap_or(false)
        })
    }

    /// Write output data to a file path, with sandbox validation.
    fn write_output(
        &self,
        output_path: &Option<String>,
        data: &[u8],
    ) -> crate::error::Result<Option<String>> {
        let Some(path_str) = output_path else {
            return Ok(None);
        };

        let path = self.validate_output_path_access(path_str)?;

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }

        std::fs::write(&path, data)?;
        Ok(Some(path_str.clone()))
    }

    pub async fn process_change_background(
        &self,
        params: &ChangeBackgroundParams,
    ) -> crate::error::Result<ChangeBackgroundResult> {
        let options =
            BackgroundOptions::parse(&params.color, &params.mode, params.overlay_opacity)?;

        let resolved = self.resolve_source(&params.source)?;
        let output_file_name = resolved.output_file_name();
        let source_name = resolved.source_name;
        let data = resolved.data;

        let (output_data, output_page_count) = self
            .run_blocking(move || {
                let output = recolor_background(&data, &options)?;
                let pages = page_count(&output)?;
                Ok((output, pages))
            })
            .await?;

        tracing::info!(
            source = %source_name,
            mode = %options.mode,
            color = %options.color,
            pages = output_page_count,
            bytes = output_data.len(),
            "Background changed"
        );

        let output_cache_key = self.cache.insert(CachedPdf {
            data: output_data.clone(),
            file_name: Some(output_file_name.clone()),
        });
        if output_cache_key.is_none() {
            tracing::warn!(bytes = output_data.len(), "Output too large to cache");
        }

        let output_path = self.write_output(&params.output_path, &output_data)?;
        let data_base64 = params
            .include_data
            .then(|| base64::engine::general_purpose::STANDARD.encode(&output_data));

        Ok(ChangeBackgroundResult {
            source: source_name,
            output_cache_key,
            output_page_count,
            output_file_name,
            output_path,
            data_base64,
            error: None,
        })
    }

    pub async fn process_preview_background(
        &self,
        params: &PreviewBackgroundParams,
    ) -> crate::error::Result<PreviewBackgroundResult> {
        let options =
            BackgroundOptions::parse(&params.color, &params.mode, params.overlay_opacity)?;

        let dpi = params.dpi.unwrap_or(DEFAULT_PREVIEW_DPI);
        if dpi == 0 || dpi > self.config.max_preview_dpi {
            return Err(Error::ImageDimensionExceeded {
                detail: format!(
                    "dpi must be between 1 and {}, got {}",
                    self.config.max_preview_dpi, dpi
                ),
            });
        }

        let resolved = self.resolve_source(&params.source)?;
        let source_name = resolved.source_name;
        let data = resolved.data;
        let max_pixels = self.config.max_image_pixels;

        let preview = self
            .run_blocking(move || render_preview(&data, &options, dpi, max_pixels))
            .await?;

        Ok(PreviewBackgroundResult {
            source: source_name,
            page_count: preview.page_count,
            width: preview.width,
            height: preview.height,
            data_base64: preview.data_base64(),
            mime_type: preview.mime_type().to_string(),
            error: None,
        })
    }

    pub async fn process_get_page_count(
        &self,
        params: &GetPageCountParams,
    ) -> crate::error::Result<GetPageCountResult> {
        let resolved = self.resolve_source(&params.source)?;
        let source_name = resolved.source_name;
        let data = resolved.data;

        let count = self.run_blocking(move || page_count(&data)).await?;

        Ok(GetPageCountResult {
            source: source_name,
            page_count: count,
            error: None,
        })
    }
}

impl Default for PdfServer {
    fn default() -> Self {
        Self::new()
    }
}

#[tool_handler]
impl ServerHandler for PdfServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2024_11_05,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation::from_build_env(),
            instructions: Some(
                "PDF Eye-Saver recolors PDF page backgrounds to reduce eye strain. \
                 Use preview_background to check a color on page 1, then change_background \
                 to produce the full document."
                    .into(),
            ),
        }
    }
}

/// Run the MCP server with default configuration
pub async fn run_server() -> Result<()> {
    run_server_with_config(ServerConfig::default()).await
}

/// Run the MCP server with full configuration
pub async fn run_server_with_config(config: ServerConfig) -> Result<()> {
    if !crate::pdf::pdfium_available() {
        tracing::warn!("PDFium library not found; preview_background will fail");
    }

    let server = PdfServer::with_config(config);

    tracing::info!("PDF Eye-Saver ready, waiting for connections...");

    let service = server.serve(rmcp::transport::io::stdio()).await?;
    service.waiting().await?;

    Ok(())
}
