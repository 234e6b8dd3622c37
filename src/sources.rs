//! Document source: loads the configured files into [`Document`]s.
//!
//! The corpus is optional: a configured path that does not exist is skipped
//! silently. A path that exists but cannot be extracted is a genuine data
//! problem and fails the load with [`RagError::Ingestion`].
//!
//! | Kind | Output |
//! |------|--------|
//! | `pdf` | one document per page, with `page` metadata (0-based) |
//! | `docx` | one document for the body text |
//! | `text` | one document with the raw file contents (structured text such as JSON is not parsed) |

use std::path::{Path, PathBuf};

use anyhow::Result as AnyResult;
use serde::Deserialize;
use tracing::{debug, info};

use crate::config::Config;
use crate::error::{RagError, Result};
use crate::extract;
use crate::models::{Document, Metadata, META_KIND, META_PAGE, META_SOURCE};

/// The loader used for a configured source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Pdf,
    Docx,
    Text,
}

impl SourceKind {
    /// Infer the kind from a file extension; anything unrecognised is text.
    pub fn from_path(path: &Path) -> Self {
        match path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .as_deref()
        {
            Some("pdf") => SourceKind::Pdf,
            Some("docx") => SourceKind::Docx,
            _ => SourceKind::Text,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Pdf => "pdf",
            SourceKind::Docx => "docx",
            SourceKind::Text => "text",
        }
    }
}

/// A path tagged with the loader to use for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceSpec {
    pub kind: SourceKind,
    pub path: PathBuf,
}

impl SourceSpec {
    pub fn new(kind: SourceKind, path: impl Into<PathBuf>) -> Self {
        Self {
            kind,
            path: path.into(),
        }
    }
}

/// Load every existing source, in configuration order.
pub fn load_documents(specs: &[SourceSpec]) -> Result<Vec<Document>> {
    let mut documents = Vec::new();
    let mut skipped = 0usize;

    for spec in specs {
        if !spec.path.exists() {
            debug!(path = %spec.path.display(), "source not found, skipping");
            skipped += 1;
            continue;
        }
        let loaded = load_one(spec)?;
        debug!(
            path = %spec.path.display(),
            kind = spec.kind.as_str(),
            documents = loaded.len(),
            "loaded source"
        );
        documents.extend(loaded);
    }

    info!(
        sources = specs.len(),
        skipped,
        documents = documents.len(),
        "loaded documents"
    );
    Ok(documents)
}

fn load_one(spec: &SourceSpec) -> Result<Vec<Document>> {
    let path = &spec.path;
    if !path.is_file() {
        return Err(ingestion_error(path, "not a regular file"));
    }
    let bytes = std::fs::read(path).map_err(|e| ingestion_error(path, e))?;

    let base = base_metadata(spec);
    match spec.kind {
        SourceKind::Pdf => {
            let pages = extract::extract_pdf_pages(&bytes).map_err(|e| ingestion_error(path, e))?;
            Ok(pages
                .into_iter()
                .enumerate()
                .map(|(page, text)| {
                    let mut metadata = base.clone();
                    metadata.insert(META_PAGE.to_string(), page.to_string());
                    Document::new(text, metadata)
                })
                .collect())
        }
        SourceKind::Docx => {
            let text = extract::extract_docx(&bytes).map_err(|e| ingestion_error(path, e))?;
            Ok(vec![Document::new(text, base)])
        }
        SourceKind::Text => {
            let text = String::from_utf8(bytes)
                .map_err(|e| ingestion_error(path, format!("not valid UTF-8: {}", e)))?;
            let text = text.strip_prefix('\u{feff}').unwrap_or(&text).to_string();
            Ok(vec![Document::new(text, base)])
        }
    }
}

fn base_metadata(spec: &SourceSpec) -> Metadata {
    let mut metadata = Metadata::new();
    metadata.insert(META_SOURCE.to_string(), spec.path.display().to_string());
    metadata.insert(META_KIND.to_string(), spec.kind.as_str().to_string());
    metadata
}

fn ingestion_error(path: &Path, err: impl ToString) -> RagError {
    RagError::Ingestion {
        path: path.to_path_buf(),
        message: err.to_string(),
    }
}

/// Print each configured source with its kind and whether it exists.
pub fn list_sources(config: &Config) -> AnyResult<()> {
    println!("{:<8} {:<8} PATH", "KIND", "STATUS");
    for spec in config.source_specs() {
        let status = if spec.path.is_file() {
            "OK"
        } else if spec.path.exists() {
            "INVALID"
        } else {
            "MISSING"
        };
        println!(
            "{:<8} {:<8} {}",
            spec.kind.as_str(),
            status,
            spec.path.display()
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::tests::docx_with_paragraphs;
    use tempfile::TempDir;

    #[test]
    fn test_missing_sources_are_skipped() {
        let tmp = TempDir::new().unwrap();
        let specs = vec![
            SourceSpec::new(SourceKind::Pdf, tmp.path().join("absent.pdf")),
            SourceSpec::new(SourceKind::Docx, tmp.path().join("absent.docx")),
            SourceSpec::new(SourceKind::Text, tmp.path().join("absent.json")),
        ];
        let docs = load_documents(&specs).unwrap();
        assert!(docs.is_empty());
    }

    #[test]
    fn test_load_order_and_metadata() {
        let tmp = TempDir::new().unwrap();
        let first = tmp.path().join("a.txt");
        let second = tmp.path().join("b.docx");
        std::fs::write(&first, "The sky is blue.").unwrap();
        std::fs::write(&second, docx_with_paragraphs(&["Grass is green."])).unwrap();

        let specs = vec![
            SourceSpec::new(SourceKind::Text, &first),
            SourceSpec::new(SourceKind::Text, tmp.path().join("missing.txt")),
            SourceSpec::new(SourceKind::Docx, &second),
        ];
        let docs = load_documents(&specs).unwrap();
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].content, "The sky is blue.");
        assert_eq!(docs[0].metadata[META_KIND], "text");
        assert_eq!(docs[0].metadata[META_SOURCE], first.display().to_string());
        assert_eq!(docs[1].content, "Grass is green.");
        assert_eq!(docs[1].metadata[META_KIND], "docx");
    }

    #[test]
    fn test_structured_text_ingested_raw() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("menu.json");
        let raw = "{\"dishes\": [{\"name\": \"Paneer Tikka\", \"price\": 250}]}";
        std::fs::write(&path, raw).unwrap();
        let docs = load_documents(&[SourceSpec::new(SourceKind::Text, &path)]).unwrap();
        assert_eq!(docs[0].content, raw);
    }

    #[test]
    fn test_corrupt_file_is_ingestion_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("broken.docx");
        std::fs::write(&path, b"definitely not a zip archive").unwrap();
        let err = load_documents(&[SourceSpec::new(SourceKind::Docx, &path)]).unwrap_err();
        match err {
            RagError::Ingestion { path: p, .. } => assert_eq!(p, path),
            other => panic!("expected ingestion error, got {:?}", other),
        }
    }

    #[test]
    fn test_invalid_utf8_is_ingestion_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("latin1.txt");
        std::fs::write(&path, [0x66, 0x6f, 0xff, 0xfe, 0x6f]).unwrap();
        let err = load_documents(&[SourceSpec::new(SourceKind::Text, &path)]).unwrap_err();
        assert!(err.to_string().contains("UTF-8"));
    }

    #[test]
    fn test_directory_is_ingestion_error() {
        let tmp = TempDir::new().unwrap();
        let err = load_documents(&[SourceSpec::new(SourceKind::Text, tmp.path())]).unwrap_err();
        assert!(matches!(err, RagError::Ingestion { .. }));
    }

    #[test]
    fn test_kind_from_extension() {
        assert_eq!(SourceKind::from_path(Path::new("x/Report.PDF")), SourceKind::Pdf);
        assert_eq!(SourceKind::from_path(Path::new("x/a.docx")), SourceKind::Docx);
        assert_eq!(SourceKind::from_path(Path::new("x/a.json")), SourceKind::Text);
        assert_eq!(SourceKind::from_path(Path::new("x/README")), SourceKind::Text);
    }
}
