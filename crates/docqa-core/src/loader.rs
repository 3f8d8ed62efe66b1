//! Raw document loading from a directory tree.
//!
//! Markdown and plain text are read as-is; HTML is reduced to readable text.
//! PDF text is extracted page by page and the page boundaries are kept on the
//! [`Document`]. Anything else is skipped.

use once_cell::sync::Lazy;
use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::types::Document;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    Text,
    Html,
    Pdf,
}

fn format_of(path: &Path) -> Option<Format> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "md" | "markdown" | "txt" => Some(Format::Text),
        "html" | "htm" => Some(Format::Html),
        "pdf" => Some(Format::Pdf),
        _ => None,
    }
}

/// Stable id for a source path: first 32 hex chars of its BLAKE3 hash.
pub fn document_id(path: &str) -> String {
    let hash = blake3::hash(path.as_bytes());
    hash.to_hex()[..32].to_string()
}

pub fn load_documents(raw_dir: &Path) -> Result<Vec<Document>> {
    load(raw_dir, None)
}

/// Same as [`load_documents`] but stops after `limit` supported files.
pub fn load_documents_limited(raw_dir: &Path, limit: usize) -> Result<Vec<Document>> {
    load(raw_dir, Some(limit))
}

fn load(raw_dir: &Path, limit: Option<usize>) -> Result<Vec<Document>> {
    if !raw_dir.is_dir() {
        return Err(Error::InvalidInput(format!("{} is not a directory", raw_dir.display())));
    }
    let mut files = list_supported_files(raw_dir);
    if let Some(limit) = limit {
        if files.len() > limit {
            files.truncate(limit);
            tracing::info!(limit, "limiting document load");
        }
    }
    let mut docs = Vec::with_capacity(files.len());
    for (path, format) in files {
        docs.push(read_document(&path, format)?);
    }
    tracing::info!(dir = %raw_dir.display(), documents = docs.len(), "loaded documents");
    Ok(docs)
}

fn list_supported_files(root: &Path) -> Vec<(PathBuf, Format)> {
    let mut files = Vec::new();
    for entry in walkdir::WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
    {
        let path = entry.path();
        match format_of(path) {
            Some(format) => files.push((path.to_path_buf(), format)),
            None => tracing::debug!(path = %path.display(), "skipping unsupported file"),
        }
    }
    files.sort_by(|a, b| a.0.cmp(&b.0));
    files
}

fn read_document(path: &Path, format: Format) -> Result<Document> {
    let bytes = fs::read(path).map_err(|e| Error::Operation(format!("reading {}: {e}", path.display())))?;
    let (text, page_starts) = match format {
        Format::Text => (String::from_utf8_lossy(&bytes).into_owned(), Vec::new()),
        Format::Html => (html_to_text(&String::from_utf8_lossy(&bytes)), Vec::new()),
        Format::Pdf => pdf_to_text(&bytes).map_err(|e| Error::Operation(format!("parsing {}: {e}", path.display())))?,
    };
    let source_path = path.to_string_lossy().to_string();
    let title = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| source_path.clone());
    let mut doc = Document::new(document_id(&source_path), title, text, source_path);
    doc.page_starts = page_starts;
    Ok(doc)
}

/// Extract PDF text page by page, joining pages with a newline.
///
/// Returns the text and the byte offset where each page starts. A page whose
/// text cannot be extracted contributes an empty string.
pub fn pdf_to_text(bytes: &[u8]) -> std::result::Result<(String, Vec<usize>), lopdf::Error> {
    let pdf = lopdf::Document::load_mem(bytes)?;
    let mut text = String::new();
    let mut page_starts = Vec::new();
    for (i, page_number) in pdf.get_pages().into_keys().enumerate() {
        if i > 0 {
            text.push('\n');
        }
        page_starts.push(text.len());
        match pdf.extract_text(&[page_number]) {
            Ok(page_text) => text.push_str(page_text.trim_end()),
            Err(e) => tracing::warn!(page = page_number, error = %e, "no text extracted from pdf page"),
        }
    }
    Ok((text, page_starts))
}

fn re(pattern: &str) -> Regex {
    Regex::new(pattern).expect("static html regex")
}

static DROPPED_ELEMENTS: Lazy<Regex> = Lazy::new(|| re(r"(?is)<(script|style|noscript)[^>]*>.*?</(script|style|noscript)>"));
static COMMENTS: Lazy<Regex> = Lazy::new(|| re(r"(?s)<!--.*?-->"));
static BLOCKS: Lazy<Regex> = Lazy::new(|| {
    re(r"(?i)</?(div|p|br|h[1-6]|li|ul|ol|tr|table|blockquote|pre|section|article|header|footer|main|aside|title)[^>]*>")
});
static TAGS: Lazy<Regex> = Lazy::new(|| re(r"<[^>]+>"));
static NUMERIC_ENTITY: Lazy<Regex> = Lazy::new(|| re(r"&#(\d+);"));
static HEX_ENTITY: Lazy<Regex> = Lazy::new(|| re(r"&#[xX]([0-9a-fA-F]+);"));
static SPACES: Lazy<Regex> = Lazy::new(|| re(r"[ \t\r]+"));
static SPACE_AROUND_NEWLINE: Lazy<Regex> = Lazy::new(|| re(r" ?\n ?"));
static BLANK_LINES: Lazy<Regex> = Lazy::new(|| re(r"\n{3,}"));

/// Reduce an HTML page to plain text: one line per block element, entities
/// decoded, whitespace collapsed.
pub fn html_to_text(html: &str) -> String {
    let text = DROPPED_ELEMENTS.replace_all(html, "");
    let text = COMMENTS.replace_all(&text, "");
    let text = BLOCKS.replace_all(&text, "\n");
    let text = TAGS.replace_all(&text, "");

    let text = text
        .replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'");
    let text = NUMERIC_ENTITY.replace_all(&text, |caps: &regex::Captures| {
        caps[1].parse::<u32>().ok().and_then(char::from_u32).map(String::from).unwrap_or_default()
    });
    let text = HEX_ENTITY.replace_all(&text, |caps: &regex::Captures| {
        u32::from_str_radix(&caps[1], 16).ok().and_then(char::from_u32).map(String::from).unwrap_or_default()
    });
    // last, so "&amp;lt;" stays "&lt;"
    let text = text.replace("&amp;", "&");

    let text = SPACES.replace_all(&text, " ");
    let text = SPACE_AROUND_NEWLINE.replace_all(&text, "\n");
    let text = BLANK_LINES.replace_all(&text, "\n\n");
    text.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn html_blocks_become_lines() {
        let html = "<html><head><title>Ignored?</title><style>p{color:red}</style></head>\
                    <body><h1>REFUND POLICY</h1><p>Refunds within 30 days.</p>\
                    <script>alert(1)</script><p>Fish &amp; chips &#8364;5 &#x41;</p></body></html>";
        let text = html_to_text(html);
        assert!(text.contains("REFUND POLICY\n"));
        assert!(text.contains("Refunds within 30 days."));
        assert!(text.contains("Fish & chips \u{20ac}5 A"));
        assert!(!text.contains("alert"));
        assert!(!text.contains("color"));
        assert!(!text.contains('<'));
    }

    #[test]
    fn document_id_is_stable_hex() {
        let a = document_id("data/raw/Policy.md");
        assert_eq!(a.len(), 32);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(a, document_id("data/raw/Policy.md"));
        assert_ne!(a, document_id("data/raw/Other.md"));
    }

    #[test]
    fn broken_pdf_bytes_are_an_error() {
        assert!(pdf_to_text(b"%PDF-1.5 not really").is_err());
    }

    #[test]
    fn unsupported_extensions_are_skipped() {
        assert_eq!(format_of(Path::new("a/b.MD")), Some(Format::Text));
        assert_eq!(format_of(Path::new("a/b.htm")), Some(Format::Html));
        assert_eq!(format_of(Path::new("a/b.PDF")), Some(Format::Pdf));
        assert_eq!(format_of(Path::new("a/b.docx")), None);
        assert_eq!(format_of(Path::new("a/README")), None);
    }
}
