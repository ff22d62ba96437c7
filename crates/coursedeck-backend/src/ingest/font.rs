use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use lopdf::{dictionary, Document, Object, ObjectId, Stream, StringFormat};
use ttf_parser::{name_id, Face, GlyphId};

use super::error::FontError;

/// Anything that can tell how wide a run of text is at a given size.
pub trait TextMeasure {
    fn width_of(&self, text: &str, size: f32) -> f32;
}

/// A TrueType font parsed once and kept in memory for measuring and
/// embedding.
///
/// The glyph map and advances are copied out of the face at load time so
/// the font does not borrow its own bytes.
#[derive(Debug, Clone)]
pub struct EmbeddedFont {
    data: Vec<u8>,
    postscript_name: String,
    units_per_em: u16,
    ascender: i16,
    descender: i16,
    cap_height: i16,
    italic_angle: f32,
    bbox: [i16; 4],
    glyphs: HashMap<char, u16>,
    advances: Vec<u16>,
}

impl EmbeddedFont {
    pub fn load(path: &Path) -> Result<Self, FontError> {
        let data = std::fs::read(path).map_err(|source| FontError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_bytes(data)
    }

    pub fn from_bytes(data: Vec<u8>) -> Result<Self, FontError> {
        let face = Face::parse(&data, 0).map_err(|e| FontError::Parse(e.to_string()))?;

        let mut glyphs = HashMap::new();
        if let Some(cmap) = face.tables().cmap {
            for subtable in cmap.subtables {
                if !subtable.is_unicode() {
                    continue;
                }
                subtable.codepoints(|code| {
                    let Some(ch) = char::from_u32(code) else {
                        return;
                    };
                    if let Some(gid) = subtable.glyph_index(code) {
                        glyphs.entry(ch).or_insert(gid.0);
                    }
                });
            }
        }
        if glyphs.is_empty() {
            return Err(FontError::Parse("no unicode character map".to_string()));
        }

        let advances = (0..face.number_of_glyphs())
            .map(|gid| face.glyph_hor_advance(GlyphId(gid)).unwrap_or(0))
            .collect();

        let postscript_name = face
            .names()
            .into_iter()
            .filter(|name| name.name_id == name_id::POST_SCRIPT_NAME)
            .find_map(|name| name.to_string())
            .map(|name| name.chars().filter(|c| c.is_ascii_graphic()).collect::<String>())
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| "EmbeddedFont".to_string());

        let bb = face.global_bounding_box();

        Ok(Self {
            postscript_name,
            units_per_em: face.units_per_em(),
            ascender: face.ascender(),
            descender: face.descender(),
            cap_height: face.capital_height().unwrap_or(face.ascender()),
            italic_angle: face.italic_angle(),
            bbox: [bb.x_min, bb.y_min, bb.x_max, bb.y_max],
            glyphs,
            advances,
            data,
        })
    }

    pub fn postscript_name(&self) -> &str {
        &self.postscript_name
    }

    /// Glyph for `ch`, or `.notdef` (0) when the font lacks it. Tabs are
    /// drawn as spaces.
    pub fn glyph_id(&self, ch: char) -> u16 {
        let ch = if ch == '\t' { ' ' } else { ch };
        self.glyphs.get(&ch).copied().unwrap_or(0)
    }

    pub fn has_glyph(&self, ch: char) -> bool {
        self.glyph_id(ch) != 0
    }

    fn advance(&self, gid: u16) -> u16 {
        self.advances.get(gid as usize).copied().unwrap_or(0)
    }

    /// Scale a font-unit value to PDF glyph space (1000 units per em).
    fn to_glyph_space(&self, value: i32) -> i64 {
        (value as f64 * 1000.0 / self.units_per_em as f64).round() as i64
    }

    /// Encode `text` as two-byte glyph ids for an Identity-H font.
    pub fn encode(&self, text: &str) -> Vec<u8> {
        text.chars()
            .flat_map(|ch| self.glyph_id(ch).to_be_bytes())
            .collect()
    }

    /// A hex string operand ready for `Tj`.
    pub fn text_operand(&self, text: &str) -> Object {
        Object::String(self.encode(text), StringFormat::Hexadecimal)
    }

    /// Add this font to `doc` as a Type0 font covering the characters in
    /// `text`, returning the id of the font dictionary.
    pub fn embed<'a>(
        &self,
        doc: &mut Document,
        text: impl IntoIterator<Item = &'a str>,
    ) -> ObjectId {
        let mut used: BTreeMap<u16, char> = BTreeMap::new();
        for ch in text.into_iter().flat_map(str::chars) {
            used.entry(self.glyph_id(ch)).or_insert(ch);
        }

        let font_file = doc.add_object(Stream::new(
            dictionary! { "Length1" => self.data.len() as i64 },
            self.data.clone(),
        ));

        let [x_min, y_min, x_max, y_max] = self.bbox;
        let descriptor = doc.add_object(dictionary! {
            "Type" => "FontDescriptor",
            "FontName" => Object::Name(self.postscript_name.clone().into_bytes()),
            "Flags" => 32,
            "FontBBox" => [x_min, y_min, x_max, y_max]
                .into_iter()
                .map(|v| Object::Integer(self.to_glyph_space(v as i32)))
                .collect::<Vec<Object>>(),
            "ItalicAngle" => self.italic_angle,
            "Ascent" => self.to_glyph_space(self.ascender as i32),
            "Descent" => self.to_glyph_space(self.descender as i32),
            "CapHeight" => self.to_glyph_space(self.cap_height as i32),
            "StemV" => 80,
            "FontFile2" => font_file,
        });

        let mut widths = Vec::with_capacity(used.len() * 2);
        for &gid in used.keys() {
            widths.push(Object::Integer(gid as i64));
            widths.push(Object::Array(vec![Object::Integer(
                self.to_glyph_space(self.advance(gid) as i32),
            )]));
        }

        let descendant = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "CIDFontType2",
            "BaseFont" => Object::Name(self.postscript_name.clone().into_bytes()),
            "CIDSystemInfo" => dictionary! {
                "Registry" => Object::string_literal("Adobe"),
                "Ordering" => Object::string_literal("Identity"),
                "Supplement" => 0,
            },
            "FontDescriptor" => descriptor,
            "DW" => self.to_glyph_space(self.advance(0) as i32),
            "W" => widths,
            "CIDToGIDMap" => "Identity",
        });

        let to_unicode = doc.add_object(Stream::new(dictionary! {}, to_unicode_cmap(&used)));

        doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type0",
            "BaseFont" => Object::Name(self.postscript_name.clone().into_bytes()),
            "Encoding" => "Identity-H",
            "DescendantFonts" => vec![Object::Reference(descendant)],
            "ToUnicode" => to_unicode,
        })
    }
}

impl TextMeasure for EmbeddedFont {
    fn width_of(&self, text: &str, size: f32) -> f32 {
        let units: u32 = text
            .chars()
            .map(|ch| self.advance(self.glyph_id(ch)) as u32)
            .sum();
        units as f32 * size / self.units_per_em as f32
    }
}

/// CMap mapping each used glyph id back to the character it was drawn for.
fn to_unicode_cmap(used: &BTreeMap<u16, char>) -> Vec<u8> {
    let mut cmap = String::from(
        "/CIDInit /ProcSet findresource begin\n\
         12 dict begin\n\
         begincmap\n\
         /CIDSystemInfo << /Registry (Adobe) /Ordering (UCS) /Supplement 0 >> def\n\
         /CMapName /Adobe-Identity-UCS def\n\
         /CMapType 2 def\n\
         1 begincodespacerange\n\
         <0000> <FFFF>\n\
         endcodespacerange\n",
    );

    let entries: Vec<(u16, char)> = used
        .iter()
        .filter(|(&gid, _)| gid != 0)
        .map(|(&gid, &ch)| (gid, ch))
        .collect();

    // bfchar blocks are limited to 100 entries each
    for block in entries.chunks(100) {
        cmap.push_str(&format!("{} beginbfchar\n", block.len()));
        for (gid, ch) in block {
            let mut units = [0u16; 2];
            let utf16: String = ch
                .encode_utf16(&mut units)
                .iter()
                .map(|u| format!("{u:04X}"))
                .collect();
            cmap.push_str(&format!("<{gid:04X}> <{utf16}>\n"));
        }
        cmap.push_str("endbfchar\n");
    }

    cmap.push_str(
        "endcmap\n\
         CMapName currentdict /CMap defineresource pop\n\
         end\n\
         end\n",
    );
    cmap.into_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cmap_maps_glyphs_to_utf16() {
        let used = BTreeMap::from([(0, '?'), (36, 'A'), (412, 'ş')]);
        let cmap = String::from_utf8(to_unicode_cmap(&used)).unwrap();

        assert!(cmap.contains("2 beginbfchar"));
        assert!(cmap.contains("<0024> <0041>"));
        assert!(cmap.contains("<019C> <015F>"));
        assert!(!cmap.contains("<0000> <003F>"));
    }

    #[test]
    fn cmap_splits_large_tables_into_blocks() {
        let used: BTreeMap<u16, char> = (1..=150u16)
            .map(|gid| (gid, char::from_u32(0x4E00 + gid as u32).unwrap()))
            .collect();
        let cmap = String::from_utf8(to_unicode_cmap(&used)).unwrap();

        assert!(cmap.contains("100 beginbfchar"));
        assert!(cmap.contains("50 beginbfchar"));
        assert_eq!(cmap.matches("endbfchar").count(), 2);
    }

    #[test]
    fn garbage_is_not_a_font() {
        assert!(matches!(
            EmbeddedFont::from_bytes(b"definitely not a font".to_vec()),
            Err(FontError::Parse(_))
        ));
    }

    #[test]
    fn missing_file_reports_path() {
        let err = EmbeddedFont::load(Path::new("/nonexistent/font.ttf")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/font.ttf"));
    }
}
