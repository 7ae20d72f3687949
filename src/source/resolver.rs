//! Source resolution for PDF data

use crate::error::{Error, Result};
use crate::source::PdfCache;
use base64::Engine;
use std::path::Path;

/// Resolved PDF data
#[derive(Debug)]
pub struct ResolvedPdf {
    pub data: Vec<u8>,
    /// Human-readable origin, safe for logs
    pub source_name: String,
    /// Original file name, when the source has one
    pub file_name: Option<String>,
}

impl ResolvedPdf {
    /// Suggested download name for the recolored document
    pub fn output_file_name(&self) -> String {
        match self.file_name.as_deref() {
            Some(name) if name.starts_with("colored_") => name.to_string(),
            Some(name) => format!("colored_{}", name),
            None => "colored.pdf".to_string(),
        }
    }
}

fn check_size(len: usize, max_bytes: u64) -> Result<()> {
    if len as u64 > max_bytes {
        return Err(Error::InputTooLarge {
            size: len as u64,
            max_size: max_bytes,
        });
    }
    Ok(())
}

/// Resolve a file path to PDF data
pub fn resolve_path<P: AsRef<Path>>(path: P, max_bytes: u64) -> Result<ResolvedPdf> {
    let path = path.as_ref();

    if !path.exists() {
        return Err(Error::PdfNotFound {
            path: path.display().to_string(),
        });
    }

    check_size(std::fs::metadata(path)?.len() as usize, max_bytes)?;
    let data = std::fs::read(path)?;

    Ok(ResolvedPdf {
        data,
        source_name: path.display().to_string(),
        file_name: path
            .file_name()
            .map(|name| name.to_string_lossy().to_string()),
    })
}

/// Resolve base64 encoded data to PDF data
pub fn resolve_base64(
    base64_data: &str,
    file_name: Option<&str>,
    max_bytes: u64,
) -> Result<ResolvedPdf> {
    // Decoded size is at most 3/4 of the encoded length
    check_size(base64_data.len() / 4 * 3, max_bytes)?;

    let data = base64::engine::general_purpose::STANDARD.decode(base64_data.trim())?;

    Ok(ResolvedPdf {
        data,
        source_name: "<base64>".to_string(),
        file_name: file_name.map(str::to_string),
    })
}

/// Resolve a cache key to the PDF stored under it
pub fn resolve_cache(cache_key: &str, cache: &PdfCache) -> Result<ResolvedPdf> {
    let entry = cache.get(cache_key).ok_or_else(|| Error::CacheKeyNotFound {
        key: cache_key.to_string(),
    })?;

    Ok(ResolvedPdf {
        data: entry.data,
        source_name: format!("<cache:{}>", cache_key),
        file_name: entry.file_name,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::CachedPdf;

    #[test]
    fn test_resolve_base64() {
        let result = resolve_base64("JVBERi0xLjQ=", Some("notes.pdf"), 1024).unwrap();
        assert_eq!(result.data, b"%PDF-1.4");
        assert_eq!(result.source_name, "<base64>");
        assert_eq!(result.output_file_name(), "colored_notes.pdf");
    }

    #[test]
    fn test_resolve_base64_invalid() {
        let result = resolve_base64("not base64!!!", None, 1024);
        assert!(matches!(result, Err(Error::Base64Decode(_))));
    }

    #[test]
    fn test_resolve_base64_too_large() {
        let result = resolve_base64(&"A".repeat(400), None, 100);
        assert!(matches!(result, Err(Error::InputTooLarge { .. })));
    }

    #[test]
    fn test_resolve_path_not_found() {
        let result = resolve_path("/nonexistent/path/file.pdf", u64::MAX);
        assert!(matches!(result, Err(Error::PdfNotFound { .. })));
    }

    #[test]
    fn test_resolve_path_too_large() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("big.pdf");
        std::fs::write(&path, vec![0u8; 64]).unwrap();

        let result = resolve_path(&path, 32);
        assert!(matches!(
            result,
            Err(Error::InputTooLarge { size: 64, max_size: 32 })
        ));
    }

    #[test]
    fn test_resolve_path_file_name() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scan.pdf");
        std::fs::write(&path, b"%PDF-1.4").unwrap();

        let result = resolve_path(&path, 1024).unwrap();
        assert_eq!(result.file_name.as_deref(), Some("scan.pdf"));
        assert_eq!(result.output_file_name(), "colored_scan.pdf");
    }

    #[test]
    fn test_resolve_cache() {
        let cache = PdfCache::new(4, 1024);
        let key = cache
            .insert(CachedPdf {
                data: b"%PDF-1.4".to_vec(),
                file_name: Some("colored_scan.pdf".to_string()),
            })
            .unwrap();

        let result = resolve_cache(&key, &cache).unwrap();
        assert_eq!(result.source_name, format!("<cache:{}>", key));
        // Re-processing a cached output does not stack prefixes
        assert_eq!(result.output_file_name(), "colored_scan.pdf");

        assert!(matches!(
            resolve_cache("missing", &cache),
            Err(Error::CacheKeyNotFound { .. })
        ));
    }

    #[test]
    fn test_output_file_name_without_name() {
        let resolved = ResolvedPdf {
            data: Vec::new(),
            source_name: "<base64>".to_string(),
            file_name: None,
        };
        assert_eq!(resolved.output_file_name(), "colored.pdf");
    }
}
