use std::fmt;
use std::path::Path;
use std::sync::Arc;

use coursedeck_shared::api::{AvatarUploadResponse, UploadResponse};

use crate::access::Actor;
use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::ingest::{detect, DocxConverter, EmbeddedFont, WatermarkStyle, Watermarker};
use crate::users::{replaced_avatar, UserStore};

use super::storage::{pdf_sibling_name, StoredFile, UploadStorage};

pub const DOCX_MIME: &str = "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

const IMAGE_MIME_TYPES: &[&str] = &["image/jpeg", "image/png", "image/gif", "image/webp"];

const ALLOWED_MIME_TYPES: &[&str] = &[
    "image/jpeg",
    "image/png",
    "image/gif",
    "image/webp",
    "video/mp4",
    "video/webm",
    "video/ogg",
    "application/pdf",
    "application/msword",
    DOCX_MIME,
];

pub fn is_allowed_mime(mimetype: &str) -> bool {
    ALLOWED_MIME_TYPES.contains(&mimetype)
}

/// Best guess at a MIME type from a file name, for uploads that arrive
/// without one.
pub fn guess_mime(name: &str) -> &'static str {
    let ext = Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase);
    match ext.as_deref() {
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("mp4") => "video/mp4",
        Some("webm") => "video/webm",
        Some("ogg" | "ogv") => "video/ogg",
        Some("pdf") => "application/pdf",
        Some("doc") => "application/msword",
        Some("docx") => DOCX_MIME,
        _ => "application/octet-stream",
    }
}

/// Result of one optional step of an upload.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum StepOutcome {
    Done,
    #[default]
    Skipped,
    Failed(String),
}

impl StepOutcome {
    fn from_result<T, E: fmt::Display>(result: Result<T, E>) -> Self {
        match result {
            Ok(_) => StepOutcome::Done,
            Err(e) => StepOutcome::Failed(e.to_string()),
        }
    }
}

impl fmt::Display for StepOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepOutcome::Done => f.write_str("done"),
            StepOutcome::Skipped => f.write_str("skipped"),
            StepOutcome::Failed(reason) => write!(f, "failed: {reason}"),
        }
    }
}

/// What happened to each value-add step of an upload.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestReport {
    pub conversion: StepOutcome,
    pub watermark: StepOutcome,
    pub cleanup: StepOutcome,
}

/// A file as received from a client.
#[derive(Debug, Clone)]
pub struct IncomingFile {
    pub field: String,
    pub original_name: String,
    pub mimetype: String,
    pub bytes: Vec<u8>,
}

impl IncomingFile {
    pub fn new(
        field: impl Into<String>,
        original_name: impl Into<String>,
        mimetype: impl Into<String>,
        bytes: Vec<u8>,
    ) -> Self {
        Self {
            field: field.into(),
            original_name: original_name.into(),
            mimetype: mimetype.into(),
            bytes,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Ingested {
    pub response: UploadResponse,
    pub report: IngestReport,
}

/// Stores uploads and runs the document steps on them: Word files are
/// converted to PDF, PDFs are watermarked.
///
/// Conversion and watermarking never fail an upload. When they cannot run
/// the file is kept as uploaded and the reason ends up in the report.
#[derive(Debug, Clone)]
pub struct UploadPipeline {
    storage: UploadStorage,
    converter: Option<DocxConverter>,
    watermarker: Option<Watermarker>,
}

impl UploadPipeline {
    pub fn new(
        storage: UploadStorage,
        font: Option<Arc<EmbeddedFont>>,
        style: WatermarkStyle,
    ) -> Self {
        Self {
            storage,
            converter: font.clone().map(DocxConverter::new),
            watermarker: font.map(|font| Watermarker::new(font, style)),
        }
    }

    /// Build the pipeline from configuration. A font that cannot be loaded
    /// disables conversion and watermarking instead of failing startup.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let storage = UploadStorage::new(&config.uploads_dir, &config.uploads_url_prefix)?;
        storage.ensure_root()?;

        let font = match EmbeddedFont::load(&config.font_path) {
            Ok(font) => {
                tracing::info!(
                    path = %config.font_path.display(),
                    font = font.postscript_name(),
                    "Loaded document font"
                );
                Some(Arc::new(font))
            }
            Err(e) => {
                tracing::error!(
                    error = %e,
                    "Document font unavailable, Word conversion and watermarking are disabled"
                );
                None
            }
        };

        let style = WatermarkStyle {
            text: config.watermark_text.clone(),
            link: config.watermark_link.clone(),
            ..WatermarkStyle::default()
        };

        Ok(Self::new(storage, font, style))
    }

    pub fn storage(&self) -> &UploadStorage {
        &self.storage
    }

    /// Store one upload and run the document steps that apply to it.
    pub fn ingest(&self, file: &IncomingFile) -> AppResult<Ingested> {
        if file.original_name.trim().is_empty() {
            return Err(AppError::Validation("File name is required".to_string()));
        }
        if !is_allowed_mime(&file.mimetype) {
            return Err(AppError::Validation(format!(
                "Unsupported file type: {}",
                file.mimetype
            )));
        }

        let stored = self
            .storage
            .save(&file.field, &file.original_name, &file.bytes)?;
        tracing::info!(
            file = %stored.name,
            original = %file.original_name,
            size = stored.size,
            "Stored upload"
        );

        let class = detect(&file.original_name);
        let mut report = IngestReport::default();
        let mut url = self.storage.url_for(&stored.name);
        let mut pdf_url = None;

        if class.is_word {
            if let Some(pdf_name) = self.convert_word(&stored, &mut report) {
                url = self.storage.url_for(&pdf_name);
                pdf_url = Some(url.clone());
            }
        }

        if class.is_pdf {
            report.watermark = self.watermark(&stored.path);
        }

        tracing::info!(
            file = %stored.name,
            conversion = %report.conversion,
            watermark = %report.watermark,
            cleanup = %report.cleanup,
            "Upload processed"
        );

        Ok(Ingested {
            response: UploadResponse {
                url,
                converted_to_pdf: pdf_url.is_some(),
                pdf_url,
                filename: stored.name,
                original_name: file.original_name.clone(),
                size: stored.size,
                mimetype: file.mimetype.clone(),
            },
            report,
        })
    }

    /// Convert a stored Word file to a sibling PDF, watermark it and drop
    /// the original. Returns the PDF's name when conversion succeeded.
    fn convert_word(&self, stored: &StoredFile, report: &mut IngestReport) -> Option<String> {
        let Some(converter) = &self.converter else {
            report.conversion = StepOutcome::Failed("no document font loaded".to_string());
            tracing::warn!(file = %stored.name, "Skipping PDF conversion, no document font");
            return None;
        };

        let pdf_name = pdf_sibling_name(&stored.name);
        let pdf_path = match self.storage.path_for(&pdf_name) {
            Ok(path) => path,
            Err(e) => {
                report.conversion = StepOutcome::Failed(e.to_string());
                return None;
            }
        };

        if let Err(e) = converter.convert(&stored.path, &pdf_path) {
            tracing::error!(file = %stored.name, error = %e, "PDF conversion failed, keeping Word file");
            report.conversion = StepOutcome::Failed(e.to_string());
            self.storage.discard(&pdf_path);
            return None;
        }
        report.conversion = StepOutcome::Done;

        report.watermark = self.watermark(&pdf_path);

        report.cleanup = StepOutcome::from_result(std::fs::remove_file(&stored.path));
        match &report.cleanup {
            StepOutcome::Failed(reason) => {
                tracing::error!(file = %stored.name, error = %reason, "Failed to delete converted Word file")
            }
            _ => tracing::debug!(file = %stored.name, "Deleted converted Word file"),
        }

        Some(pdf_name)
    }

    fn watermark(&self, path: &Path) -> StepOutcome {
        let Some(watermarker) = &self.watermarker else {
            tracing::warn!(path = %path.display(), "Skipping watermark, no document font");
            return StepOutcome::Failed("no document font loaded".to_string());
        };

        let outcome = StepOutcome::from_result(watermarker.apply(path, None));
        if let StepOutcome::Failed(reason) = &outcome {
            tracing::error!(path = %path.display(), error = %reason, "Watermark failed");
        }
        outcome
    }

    /// Store a new avatar image for `actor` and drop the previous one.
    pub async fn upload_avatar(
        &self,
        users: &UserStore,
        actor: &Actor,
        file: &IncomingFile,
    ) -> AppResult<AvatarUploadResponse> {
        if !IMAGE_MIME_TYPES.contains(&file.mimetype.as_str()) {
            return Err(AppError::Validation(format!(
                "Avatar must be an image, got {}",
                file.mimetype
            )));
        }

        let stored = self.storage.save("avatar", &file.original_name, &file.bytes)?;
        let url = self.storage.url_for(&stored.name);

        match users.set_avatar(actor.id, &url).await {
            Ok(previous) => {
                if let Some(previous) = replaced_avatar(previous.as_deref(), Some(url.as_str())) {
                    self.storage.delete_url(previous);
                }
            }
            Err(e) => {
                self.storage.discard(&stored.path);
                return Err(e);
            }
        }

        Ok(AvatarUploadResponse {
            url,
            filename: stored.name,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pipeline(dir: &Path) -> UploadPipeline {
        let storage = UploadStorage::new(dir, "/uploads").unwrap();
        UploadPipeline::new(storage, None, WatermarkStyle::default())
    }

    #[test]
    fn mime_allow_list() {
        assert!(is_allowed_mime("application/pdf"));
        assert!(is_allowed_mime(DOCX_MIME));
        assert!(is_allowed_mime("video/webm"));
        assert!(!is_allowed_mime("application/zip"));
        assert!(!is_allowed_mime("text/html"));
    }

    #[test]
    fn guessed_mime_is_allowed_for_known_extensions() {
        for name in ["a.JPG", "b.png", "c.mp4", "d.pdf", "e.doc", "f.docx"] {
            assert!(is_allowed_mime(guess_mime(name)), "{name}");
        }
        assert_eq!(guess_mime("archive.zip"), "application/octet-stream");
    }

    #[test]
    fn rejects_disallowed_type_before_writing() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = pipeline(dir.path());

        let err = pipeline
            .ingest(&IncomingFile::new("file", "site.html", "text/html", b"<html>".to_vec()))
            .unwrap_err();

        assert!(matches!(err, AppError::Validation(_)));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn image_passes_through_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = pipeline(dir.path());

        let ingested = pipeline
            .ingest(&IncomingFile::new("thumbnail", "kapak.png", "image/png", b"png".to_vec()))
            .unwrap();

        let response = &ingested.response;
        assert!(response.url.starts_with("/uploads/thumbnail-"));
        assert!(response.url.ends_with(".png"));
        assert_eq!(response.pdf_url, None);
        assert!(!response.converted_to_pdf);
        assert_eq!(response.size, 3);
        assert_eq!(ingested.report, IngestReport::default());
    }

    #[test]
    fn word_file_is_kept_when_conversion_cannot_run() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = pipeline(dir.path());

        let ingested = pipeline
            .ingest(&IncomingFile::new(
                "file",
                "eski.doc",
                "application/msword",
                b"\xD0\xCF\x11\xE0".to_vec(),
            ))
            .unwrap();

        assert!(!ingested.response.converted_to_pdf);
        assert!(ingested.response.url.ends_with(".doc"));
        assert!(matches!(ingested.report.conversion, StepOutcome::Failed(_)));
        assert!(dir.path().join(&ingested.response.filename).exists());
    }
}
