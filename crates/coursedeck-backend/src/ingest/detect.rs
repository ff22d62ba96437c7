use std::path::Path;

use coursedeck_shared::DocumentKind;

/// How an uploaded file should be treated, judged by its name alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FileClass {
    pub is_word: bool,
    pub is_pdf: bool,
}

fn extension(name: &str) -> Option<String> {
    Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
}

/// `.doc` or `.docx`, in any letter case.
pub fn is_word_document(name: &str) -> bool {
    matches!(extension(name).as_deref(), Some("doc" | "docx"))
}

pub fn is_pdf(name: &str) -> bool {
    extension(name).as_deref() == Some("pdf")
}

pub fn detect(name: &str) -> FileClass {
    FileClass {
        is_word: is_word_document(name),
        is_pdf: is_pdf(name),
    }
}

/// The `fileType` a document note should carry for `name`.
pub fn document_kind(name: &str) -> Option<DocumentKind> {
    match extension(name).as_deref()? {
        "pdf" => Some(DocumentKind::Pdf),
        "doc" => Some(DocumentKind::Doc),
        "docx" => Some(DocumentKind::Docx),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn word_extensions_any_case() {
        for name in ["ders.doc", "ders.docx", "DERS.DOCX", "Ders.DoC", "a.b.docx"] {
            assert!(is_word_document(name), "{name}");
            assert!(!is_pdf(name), "{name}");
        }
    }

    #[test]
    fn pdf_extension_any_case() {
        assert!(is_pdf("scan.pdf"));
        assert!(is_pdf("SCAN.PDF"));
        assert!(!is_word_document("scan.pdf"));
    }

    #[test]
    fn other_names_are_neither() {
        for name in ["photo.png", "README", "notes.docx.txt", ".docx", "pdf", "archive.tar.gz"] {
            assert_eq!(detect(name), FileClass::default(), "{name}");
        }
    }

    #[test]
    fn kind_follows_extension() {
        assert_eq!(document_kind("x.PDF"), Some(DocumentKind::Pdf));
        assert_eq!(document_kind("x.doc"), Some(DocumentKind::Doc));
        assert_eq!(document_kind("x.Docx"), Some(DocumentKind::Docx));
        assert_eq!(document_kind("x.mp4"), None);
    }
}
