use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum FontError {
    #[error("Failed to read font file '{}': {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Font file is not a usable TrueType font: {0}")]
    Parse(String),
}

#[derive(Debug, thiserror::Error)]
pub enum DocxError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Not a Word document container: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("Malformed document XML: {0}")]
    Xml(#[from] quick_xml::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum ConversionError {
    #[error("Failed to extract text from '{}': {source}", path.display())]
    Extract {
        path: PathBuf,
        #[source]
        source: DocxError,
    },

    #[error("Failed to build PDF page content: {0}")]
    Encode(#[source] lopdf::Error),

    #[error("Failed to write PDF '{}': {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum WatermarkError {
    #[error("Failed to load PDF '{}': {source}", path.display())]
    Load {
        path: PathBuf,
        #[source]
        source: lopdf::Error,
    },

    #[error("Failed to stamp page {page}: {source}")]
    Stamp {
        page: u32,
        #[source]
        source: lopdf::Error,
    },

    #[error("Failed to save watermarked PDF '{}': {source}", path.display())]
    Save {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
