use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use chrono::Utc;
use rand::Rng;
use regex::Regex;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("File not found: {0}")]
    Missing(String),

    #[error("Invalid file name: {0}")]
    InvalidName(String),

    #[error("I/O error on '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl StorageError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        StorageError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// A file written under the uploads root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
    pub name: String,
    pub path: PathBuf,
    pub size: u64,
}

fn word_extension() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\.(doc|docx)$").unwrap())
}

/// Name the converted PDF of a Word upload gets: same stem, `.pdf`.
pub fn pdf_sibling_name(name: &str) -> String {
    word_extension().replace(name, ".pdf").into_owned()
}

/// `<field>-<unix millis>-<random>.<ext>`, keeping the original extension
/// as typed.
pub fn generate_name(field: &str, original_name: &str) -> String {
    let suffix: u32 = rand::thread_rng().gen_range(0..1_000_000_000);
    let ext = Path::new(original_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| format!(".{ext}"))
        .unwrap_or_default();
    format!("{field}-{}-{suffix}{ext}", Utc::now().timestamp_millis())
}

/// A bare file name that cannot escape the uploads root.
fn is_safe_name(name: &str) -> bool {
    !name.is_empty() && !name.contains("..") && !name.contains('/') && !name.contains('\\')
}

/// The uploads directory and the URL prefix it is served under.
#[derive(Debug, Clone)]
pub struct UploadStorage {
    root: PathBuf,
    url_prefix: String,
    url_pattern: Regex,
}

impl UploadStorage {
    pub fn new(root: impl Into<PathBuf>, url_prefix: &str) -> anyhow::Result<Self> {
        let url_prefix = url_prefix.trim_end_matches('/').to_string();
        let url_pattern = Regex::new(&format!(r"{}/([^?#]+)", regex::escape(&url_prefix)))?;
        Ok(Self {
            root: root.into(),
            url_prefix,
            url_pattern,
        })
    }

    pub fn ensure_root(&self) -> Result<(), StorageError> {
        fs::create_dir_all(&self.root).map_err(|e| StorageError::io(&self.root, e))
    }

    pub fn url_for(&self, name: &str) -> String {
        format!("{}/{}", self.url_prefix, name)
    }

    pub fn path_for(&self, name: &str) -> Result<PathBuf, StorageError> {
        if !is_safe_name(name) {
            return Err(StorageError::InvalidName(name.to_string()));
        }
        Ok(self.root.join(name))
    }

    /// Write `bytes` under a freshly generated name.
    pub fn save(
        &self,
        field: &str,
        original_name: &str,
        bytes: &[u8],
    ) -> Result<StoredFile, StorageError> {
        self.ensure_root()?;
        let name = generate_name(field, original_name);
        let path = self.path_for(&name)?;
        fs::write(&path, bytes).map_err(|e| StorageError::io(&path, e))?;

        Ok(StoredFile {
            name,
            path,
            size: bytes.len() as u64,
        })
    }

    /// Extract the stored file name a reference points at.
    ///
    /// Accepts a full URL or a path containing the uploads prefix, or a
    /// bare file name. External links and anything that could escape the
    /// uploads root yield `None`.
    pub fn file_name_from_url(&self, url: &str) -> Option<String> {
        let url = url.trim();
        let name = match self.url_pattern.captures_iter(url).last() {
            Some(caps) => caps.get(1)?.as_str(),
            None if url.contains("://") || url.starts_with('/') => return None,
            None => url,
        };
        is_safe_name(name).then(|| name.to_string())
    }

    /// Delete a stored file by name. Fails if it does not exist.
    pub fn remove(&self, name: &str) -> Result<(), StorageError> {
        let path = self.path_for(name)?;
        match fs::remove_file(&path) {
            Ok(()) => {
                tracing::info!(file = name, "Deleted upload");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Err(StorageError::Missing(name.to_string())),
            Err(e) => Err(StorageError::io(&path, e)),
        }
    }

    /// Path of a stored file for download. Fails if it does not exist.
    pub fn resolve_download(&self, name: &str) -> Result<PathBuf, StorageError> {
        let path = self.path_for(name)?;
        if !path.is_file() {
            return Err(StorageError::Missing(name.to_string()));
        }
        Ok(path)
    }

    /// Best-effort delete of the file a reference points at. Returns whether
    /// a file was removed; failures are logged, never returned.
    pub fn delete_url(&self, url: &str) -> bool {
        if url.trim().is_empty() {
            return false;
        }
        let Some(name) = self.file_name_from_url(url) else {
            tracing::debug!(url, "Not an uploaded file, skipping delete");
            return false;
        };

        match self.remove(&name) {
            Ok(()) => true,
            Err(StorageError::Missing(_)) => {
                tracing::debug!(file = %name, "Upload already gone");
                false
            }
            Err(e) => {
                tracing::warn!(file = %name, error = %e, "Failed to delete upload");
                false
            }
        }
    }

    /// Best-effort delete of a path inside the uploads root.
    pub fn discard(&self, path: &Path) {
        if let Err(e) = fs::remove_file(path) {
            if e.kind() != ErrorKind::NotFound {
                tracing::warn!(path = %path.display(), error = %e, "Failed to delete file");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn storage(dir: &Path) -> UploadStorage {
        UploadStorage::new(dir, "/uploads").unwrap()
    }

    #[test]
    fn generated_names_keep_field_and_extension() {
        let name = generate_name("file", "Ders Notları.DOCX");
        let parts: Vec<&str> = name.splitn(3, '-').collect();

        assert_eq!(parts[0], "file");
        assert!(parts[1].parse::<i64>().is_ok());
        assert!(name.ends_with(".DOCX"));
        assert!(is_safe_name(&name));
    }

    #[test]
    fn generated_names_without_extension() {
        let name = generate_name("avatar", "README");
        assert!(!name.contains('.'));
    }

    #[test]
    fn word_names_map_to_pdf_siblings() {
        assert_eq!(pdf_sibling_name("file-1-2.docx"), "file-1-2.pdf");
        assert_eq!(pdf_sibling_name("file-1-2.DOC"), "file-1-2.pdf");
        assert_eq!(pdf_sibling_name("file-1-2.docx.png"), "file-1-2.docx.png");
    }

    #[test]
    fn url_forms_resolve_to_file_names() {
        let dir = tempfile::tempdir().unwrap();
        let storage = storage(dir.path());

        for url in [
            "https://notes.rob1n.dev/uploads/file-1-2.pdf",
            "/uploads/file-1-2.pdf",
            "/uploads/file-1-2.pdf?download=1",
            "file-1-2.pdf",
        ] {
            assert_eq!(
                storage.file_name_from_url(url).as_deref(),
                Some("file-1-2.pdf"),
                "{url}"
            );
        }
    }

    #[test]
    fn traversal_and_external_links_are_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let storage = storage(dir.path());

        for url in [
            "/uploads/../secrets.env",
            "/uploads/nested/file.pdf",
            "..\\boot.ini",
            "https://images.unsplash.com/photo-1456513080510?w=400",
            "/etc/passwd",
            "",
        ] {
            assert_eq!(storage.file_name_from_url(url), None, "{url}");
        }
    }

    #[test]
    fn save_remove_and_download() {
        let dir = tempfile::tempdir().unwrap();
        let storage = storage(&dir.path().join("uploads"));

        let stored = storage.save("file", "a.pdf", b"%PDF-1.4").unwrap();
        assert_eq!(stored.size, 8);
        assert_eq!(storage.resolve_download(&stored.name).unwrap(), stored.path);

        storage.remove(&stored.name).unwrap();
        assert!(matches!(
            storage.remove(&stored.name),
            Err(StorageError::Missing(_))
        ));
        assert!(matches!(
            storage.resolve_download(&stored.name),
            Err(StorageError::Missing(_))
        ));
    }

    #[test]
    fn remove_rejects_traversal() {
        let dir = tempfile::tempdir().unwrap();
        let storage = storage(dir.path());

        assert!(matches!(
            storage.remove("../outside.txt"),
            Err(StorageError::InvalidName(_))
        ));
    }

    #[test]
    fn delete_url_is_best_effort() {
        let dir = tempfile::tempdir().unwrap();
        let storage = storage(dir.path());
        let stored = storage.save("thumbnail", "kapak.png", b"png").unwrap();

        assert!(storage.delete_url(&storage.url_for(&stored.name)));
        assert!(!stored.path.exists());
        assert!(!storage.delete_url(&storage.url_for(&stored.name)));
        assert!(!storage.delete_url("https://youtube.com/watch?v=x"));
    }
}
