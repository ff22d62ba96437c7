use std::path::{Path, PathBuf};
use std::sync::Arc;

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream};

use super::error::WatermarkError;
use super::font::{EmbeddedFont, TextMeasure};

pub const DEFAULT_WATERMARK_TEXT: &str = "© Robin Notes";
pub const DEFAULT_WATERMARK_LINK: &str = "https://notes.rob1n.dev";

/// Used when neither the page nor any ancestor declares a MediaBox.
const A4: [f32; 4] = [0.0, 0.0, 595.0, 842.0];
const MAX_TREE_DEPTH: usize = 32;

/// What the footer banner looks like and where it links to.
#[derive(Debug, Clone, PartialEq)]
pub struct WatermarkStyle {
    pub text: String,
    pub link: String,
    pub font_size: f32,
    pub band_height: f32,
    pub band_gray: f32,
    pub text_gray: f32,
}

impl Default for WatermarkStyle {
    fn default() -> Self {
        Self {
            text: DEFAULT_WATERMARK_TEXT.to_string(),
            link: DEFAULT_WATERMARK_LINK.to_string(),
            font_size: 10.0,
            band_height: 24.0,
            band_gray: 0.96,
            text_gray: 0.3,
        }
    }
}

/// Stamps a clickable footer banner onto every page of a PDF.
///
/// Stamping is not idempotent: running it twice draws the band twice and
/// leaves two link annotations on each page.
#[derive(Debug, Clone)]
pub struct Watermarker {
    font: Arc<EmbeddedFont>,
    style: WatermarkStyle,
}

impl Watermarker {
    pub fn new(font: Arc<EmbeddedFont>, style: WatermarkStyle) -> Self {
        Self { font, style }
    }

    /// Watermark the PDF at `input` and save it to `output`, or back over
    /// `input` when no output is given.
    pub fn apply(&self, input: &Path, output: Option<&Path>) -> Result<PathBuf, WatermarkError> {
        let mut doc = Document::load(input).map_err(|source| WatermarkError::Load {
            path: input.to_path_buf(),
            source,
        })?;

        let pages = self.stamp(&mut doc)?;

        let target = output.unwrap_or(input);
        doc.save(target).map_err(|source| WatermarkError::Save {
            path: target.to_path_buf(),
            source,
        })?;

        tracing::debug!(path = %target.display(), pages, "Watermarked PDF");
        Ok(target.to_path_buf())
    }

    /// Stamp every page of an in-memory document. Returns the number of
    /// pages stamped.
    pub fn stamp(&self, doc: &mut Document) -> Result<usize, WatermarkError> {
        let pages = doc.get_pages();
        if pages.is_empty() {
            tracing::warn!("PDF has no pages, nothing to watermark");
            return Ok(0);
        }

        let font_id = self.font.embed(doc, [self.style.text.as_str()]);

        for (&number, &page_id) in &pages {
            self.stamp_page(doc, page_id, font_id)
                .map_err(|source| WatermarkError::Stamp {
                    page: number,
                    source,
                })?;
        }

        Ok(pages.len())
    }

    fn stamp_page(
        &self,
        doc: &mut Document,
        page_id: ObjectId,
        font_id: ObjectId,
    ) -> Result<(), lopdf::Error> {
        let [x0, y0, x1, _] = media_box(doc, page_id);
        let width = x1 - x0;

        let mut resources = effective_resources(doc, page_id);
        let mut fonts = resource_category(doc, &resources, b"Font");
        let font_name = unused_name(&fonts, "CdWatermark");
        fonts.set(font_name.clone(), font_id);
        resources.set("Font", fonts);

        let band = [x0, y0, x0 + width, y0 + self.style.band_height];
        let content = self.banner_content(&font_name, band);

        // streams are concatenated by some readers, so keep tokens apart
        let mut banner = b"\n".to_vec();
        banner.extend(content.encode()?);

        let save_id = doc.add_object(Stream::new(dictionary! {}, b"q\n".to_vec()));
        let banner_id = doc.add_object(Stream::new(dictionary! {}, banner));

        let mut contents: Vec<Object> = vec![Object::Reference(save_id)];
        contents.extend(
            doc.get_page_contents(page_id)
                .into_iter()
                .map(Object::Reference),
        );
        contents.push(Object::Reference(banner_id));

        let annotation_id = doc.add_object(self.link_annotation(band));

        let page = doc.get_dictionary_mut(page_id)?;
        page.set("Resources", resources);
        page.set("Contents", contents);

        append_annotation(doc, page_id, annotation_id)
    }

    fn banner_content(&self, font_name: &str, band: [f32; 4]) -> Content {
        let style = &self.style;
        let [x0, y0, x1, _] = band;
        let width = x1 - x0;

        let text_width = self.font.width_of(&style.text, style.font_size);
        let text_x = x0 + (width - text_width) / 2.0;
        let text_y = y0 + (style.band_height - style.font_size) / 2.0 + 2.0;

        Content {
            operations: vec![
                // closes the q pushed in front of the original content
                Operation::new("Q", vec![]),
                Operation::new("q", vec![]),
                Operation::new(
                    "rg",
                    vec![style.band_gray.into(), style.band_gray.into(), style.band_gray.into()],
                ),
                Operation::new(
                    "re",
                    vec![x0.into(), y0.into(), width.into(), style.band_height.into()],
                ),
                Operation::new("f", vec![]),
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec![font_name.into(), style.font_size.into()]),
                Operation::new(
                    "rg",
                    vec![style.text_gray.into(), style.text_gray.into(), style.text_gray.into()],
                ),
                Operation::new("Td", vec![text_x.into(), text_y.into()]),
                Operation::new("Tj", vec![self.font.text_operand(&style.text)]),
                Operation::new("ET", vec![]),
                Operation::new("Q", vec![]),
            ],
        }
    }

    fn link_annotation(&self, band: [f32; 4]) -> Dictionary {
        dictionary! {
            "Type" => "Annot",
            "Subtype" => "Link",
            "Rect" => band.iter().map(|&v| Object::Real(v)).collect::<Vec<Object>>(),
            "Border" => vec![Object::Integer(0), Object::Integer(0), Object::Integer(0)],
            "A" => dictionary! {
                "Type" => "Action",
                "S" => "URI",
                "URI" => Object::string_literal(self.style.link.as_str()),
            },
        }
    }
}

/// Watermark `input` with the default banner. Overwrites `input` when
/// `output` is `None`.
pub fn add_watermark_to_pdf(
    font: Arc<EmbeddedFont>,
    input: &Path,
    output: Option<&Path>,
) -> Result<PathBuf, WatermarkError> {
    Watermarker::new(font, WatermarkStyle::default()).apply(input, output)
}

/// Look up `key` on the page or the nearest ancestor in the page tree that
/// defines it, following references.
fn inherited<'a>(doc: &'a Document, page_id: ObjectId, key: &[u8]) -> Option<&'a Object> {
    let mut node = doc.get_dictionary(page_id).ok()?;
    for _ in 0..MAX_TREE_DEPTH {
        if let Ok(value) = node.get(key) {
            return doc.dereference(value).ok().map(|(_, object)| object);
        }
        let parent = node.get(b"Parent").and_then(Object::as_reference).ok()?;
        node = doc.get_dictionary(parent).ok()?;
    }
    None
}

/// The page's MediaBox as `[llx, lly, urx, ury]`.
pub(crate) fn media_box(doc: &Document, page_id: ObjectId) -> [f32; 4] {
    let Some(Ok(values)) = inherited(doc, page_id, b"MediaBox").map(Object::as_array) else {
        return A4;
    };

    let numbers: Vec<f32> = values
        .iter()
        .filter_map(|v| doc.dereference(v).ok())
        .filter_map(|(_, v)| v.as_float().ok())
        .collect();

    match numbers[..] {
        [a, b, c, d] => [a.min(c), b.min(d), a.max(c), b.max(d)],
        _ => A4,
    }
}

/// A copy of the resources the page actually uses, including ones it
/// inherits from the page tree.
pub(crate) fn effective_resources(doc: &Document, page_id: ObjectId) -> Dictionary {
    inherited(doc, page_id, b"Resources")
        .and_then(|object| object.as_dict().ok())
        .cloned()
        .unwrap_or_default()
}

fn resource_category(doc: &Document, resources: &Dictionary, key: &[u8]) -> Dictionary {
    resources
        .get(key)
        .ok()
        .and_then(|object| doc.dereference(object).ok())
        .and_then(|(_, object)| object.as_dict().ok())
        .cloned()
        .unwrap_or_default()
}

fn unused_name(dict: &Dictionary, base: &str) -> String {
    if !dict.has(base.as_bytes()) {
        return base.to_string();
    }
    (2..)
        .map(|n| format!("{base}{n}"))
        .find(|name| !dict.has(name.as_bytes()))
        .unwrap_or_else(|| base.to_string())
}

/// Add an annotation reference to the page, keeping whatever annotations
/// are already there whether stored inline or as a referenced array.
pub(crate) fn append_annotation(
    doc: &mut Document,
    page_id: ObjectId,
    annotation_id: ObjectId,
) -> Result<(), lopdf::Error> {
    let existing = doc.get_dictionary(page_id)?.get(b"Annots").ok().cloned();

    let annots = match existing {
        Some(Object::Reference(array_id)) => {
            if let Ok(array) = doc.get_object_mut(array_id).and_then(Object::as_array_mut) {
                array.push(Object::Reference(annotation_id));
                return Ok(());
            }
            vec![Object::Reference(annotation_id)]
        }
        Some(Object::Array(mut array)) => {
            array.push(Object::Reference(annotation_id));
            array
        }
        _ => vec![Object::Reference(annotation_id)],
    };

    doc.get_dictionary_mut(page_id)?.set("Annots", annots);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn box_of(width: i64, height: i64) -> Vec<Object> {
        vec![0.into(), 0.into(), width.into(), height.into()]
    }

    /// A two-page document whose pages inherit MediaBox and Resources from
    /// the page tree root.
    fn inherited_doc() -> (Document, ObjectId, ObjectId) {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        });
        let first = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
        });
        let second = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => box_of(612, 792),
        });
        doc.set_object(
            pages_id,
            dictionary! {
                "Type" => "Pages",
                "Kids" => vec![Object::Reference(first), Object::Reference(second)],
                "Count" => 2,
                "Resources" => resources_id,
                "MediaBox" => box_of(595, 842),
            },
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);
        (doc, first, second)
    }

    #[test]
    fn media_box_is_inherited_or_overridden() {
        let (doc, first, second) = inherited_doc();
        assert_eq!(media_box(&doc, first), [0.0, 0.0, 595.0, 842.0]);
        assert_eq!(media_box(&doc, second), [0.0, 0.0, 612.0, 792.0]);
    }

    #[test]
    fn resources_are_resolved_through_the_page_tree() {
        let (doc, first, _) = inherited_doc();
        let resources = effective_resources(&doc, first);
        let fonts = resource_category(&doc, &resources, b"Font");
        assert!(fonts.has(b"F1"));
    }

    #[test]
    fn annotation_is_appended_to_inline_array() {
        let (mut doc, first, _) = inherited_doc();
        let existing = doc.add_object(dictionary! { "Type" => "Annot", "Subtype" => "Text" });
        doc.get_dictionary_mut(first)
            .unwrap()
            .set("Annots", vec![Object::Reference(existing)]);
        let added = doc.add_object(dictionary! { "Type" => "Annot", "Subtype" => "Link" });

        append_annotation(&mut doc, first, added).unwrap();

        let annots = doc.get_page_annotations(first);
        assert_eq!(annots.len(), 2);
    }

    #[test]
    fn annotation_is_appended_to_referenced_array() {
        let (mut doc, first, _) = inherited_doc();
        let existing = doc.add_object(dictionary! { "Type" => "Annot", "Subtype" => "Text" });
        let array_id = doc.add_object(vec![Object::Reference(existing)]);
        doc.get_dictionary_mut(first).unwrap().set("Annots", array_id);
        let added = doc.add_object(dictionary! { "Type" => "Annot", "Subtype" => "Link" });

        append_annotation(&mut doc, first, added).unwrap();

        let array = doc.get_object(array_id).unwrap().as_array().unwrap();
        assert_eq!(array.len(), 2);
        assert_eq!(
            doc.get_dictionary(first).unwrap().get(b"Annots").unwrap(),
            &Object::Reference(array_id)
        );
    }

    #[test]
    fn annotation_creates_missing_array() {
        let (mut doc, _, second) = inherited_doc();
        let added = doc.add_object(dictionary! { "Type" => "Annot", "Subtype" => "Link" });

        append_annotation(&mut doc, second, added).unwrap();

        assert_eq!(doc.get_page_annotations(second).len(), 1);
    }

    #[test]
    fn resource_names_do_not_collide() {
        let mut fonts = Dictionary::new();
        assert_eq!(unused_name(&fonts, "CdWatermark"), "CdWatermark");
        fonts.set("CdWatermark", Object::Null);
        fonts.set("CdWatermark2", Object::Null);
        assert_eq!(unused_name(&fonts, "CdWatermark"), "CdWatermark3");
    }
}
