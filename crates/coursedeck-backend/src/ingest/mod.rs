//! Document ingestion: classifying uploads, rendering Word documents to
//! PDF and stamping PDFs with the footer watermark.

pub mod detect;
pub mod docx;
pub mod error;
pub mod font;
pub mod layout;
pub mod render;
pub mod watermark;

pub use detect::{detect, document_kind, is_pdf, is_word_document, FileClass};
pub use error::{ConversionError, DocxError, FontError, WatermarkError};
pub use font::{EmbeddedFont, TextMeasure};
pub use layout::PageLayout;
pub use render::{convert_docx_to_pdf, DocxConverter};
pub use watermark::{add_watermark_to_pdf, WatermarkStyle, Watermarker};
