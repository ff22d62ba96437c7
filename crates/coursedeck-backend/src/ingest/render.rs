use std::path::{Path, PathBuf};
use std::sync::Arc;

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};

use super::docx::extract_raw_text;
use super::error::ConversionError;
use super::font::EmbeddedFont;
use super::layout::{paginate, wrap_text, PageLayout, PlacedLine};

const FONT_RESOURCE: &str = "F1";
const TEXT_GRAY: f32 = 0.1;

/// Renders Word documents to plain paginated PDFs with one embedded font.
#[derive(Debug, Clone)]
pub struct DocxConverter {
    font: Arc<EmbeddedFont>,
    layout: PageLayout,
}

impl DocxConverter {
    pub fn new(font: Arc<EmbeddedFont>) -> Self {
        Self {
            font,
            layout: PageLayout::default(),
        }
    }

    /// Convert the `.docx` at `input` and write the PDF to `output`.
    pub fn convert(&self, input: &Path, output: &Path) -> Result<PathBuf, ConversionError> {
        let text = extract_raw_text(input).map_err(|source| ConversionError::Extract {
            path: input.to_path_buf(),
            source,
        })?;

        let mut doc = render_text(&text, &self.font, &self.layout)?;
        doc.save(output).map_err(|source| ConversionError::Write {
            path: output.to_path_buf(),
            source,
        })?;

        tracing::debug!(
            input = %input.display(),
            output = %output.display(),
            pages = doc.get_pages().len(),
            "Rendered Word document to PDF"
        );
        Ok(output.to_path_buf())
    }
}

/// Convert a `.docx` file to PDF using `font` and the default page layout.
pub fn convert_docx_to_pdf(
    font: Arc<EmbeddedFont>,
    input: &Path,
    output: &Path,
) -> Result<PathBuf, ConversionError> {
    DocxConverter::new(font).convert(input, output)
}

/// Lay out `text` and build an in-memory PDF from it.
pub fn render_text(
    text: &str,
    font: &EmbeddedFont,
    layout: &PageLayout,
) -> Result<Document, ConversionError> {
    let lines = wrap_text(text, font, layout);
    let pages = paginate(&lines, layout);

    let missing: Vec<char> = {
        let mut chars: Vec<char> = text
            .chars()
            .filter(|ch| !ch.is_control() && !font.has_glyph(*ch))
            .collect();
        chars.sort_unstable();
        chars.dedup();
        chars
    };
    if !missing.is_empty() {
        tracing::warn!(
            font = font.postscript_name(),
            ?missing,
            "Font has no glyph for some characters, they will render as boxes"
        );
    }

    let mut doc = Document::with_version("1.7");
    let pages_id = doc.new_object_id();

    let font_id = font.embed(&mut doc, lines.iter().map(String::as_str));
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { FONT_RESOURCE => font_id },
    });

    let mut kids = Vec::with_capacity(pages.len());
    for page in &pages {
        let content = page_content(page, font, layout);
        let content_id = doc.add_object(Stream::new(
            dictionary! {},
            content.encode().map_err(ConversionError::Encode)?,
        ));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(Object::Reference(page_id));
    }

    let page_count = kids.len() as i64;
    doc.set_object(
        pages_id,
        dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => page_count,
            "Resources" => resources_id,
            "MediaBox" => vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Real(layout.page_width),
                Object::Real(layout.page_height),
            ],
        },
    );

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    doc.compress();

    Ok(doc)
}

fn page_content(lines: &[PlacedLine], font: &EmbeddedFont, layout: &PageLayout) -> Content {
    let mut operations = Vec::with_capacity(lines.len() * 6);
    for line in lines {
        operations.extend([
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec![FONT_RESOURCE.into(), layout.font_size.into()]),
            Operation::new("rg", vec![TEXT_GRAY.into(), TEXT_GRAY.into(), TEXT_GRAY.into()]),
            Operation::new("Td", vec![line.x.into(), line.y.into()]),
            Operation::new("Tj", vec![font.text_operand(&line.text)]),
            Operation::new("ET", vec![]),
        ]);
    }
    Content { operations }
}
