use std::fs::File;
use std::io::Read;
use std::path::Path;

use quick_xml::events::Event;
use quick_xml::Reader;
use zip::ZipArchive;

use super::error::DocxError;

const DOCUMENT_PART: &str = "word/document.xml";

/// Extract the plain text of a `.docx` file.
///
/// Every paragraph is followed by a blank line, tabs and explicit line
/// breaks are kept as `\t` and `\n`, all formatting is dropped.
pub fn extract_raw_text(path: &Path) -> Result<String, DocxError> {
    let file = File::open(path)?;
    let mut archive = ZipArchive::new(file)?;

    let mut xml = String::new();
    archive.by_name(DOCUMENT_PART)?.read_to_string(&mut xml)?;

    parse_document_xml(&xml)
}

/// Walk `word/document.xml` and collect run text paragraph by paragraph.
pub fn parse_document_xml(xml: &str) -> Result<String, DocxError> {
    let mut reader = Reader::from_str(xml);

    let mut text = String::new();
    let mut in_run = false;
    let mut in_text = false;

    loop {
        match reader.read_event()? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"r" => in_run = true,
                b"t" if in_run => in_text = true,
                b"tab" if in_run => text.push('\t'),
                b"br" | b"cr" if in_run => text.push('\n'),
                _ => {}
            },
            // <w:tab/> also appears in paragraph properties as a tab stop;
            // only tabs inside a run are content.
            Event::Empty(e) => match e.local_name().as_ref() {
                b"tab" if in_run => text.push('\t'),
                b"br" | b"cr" if in_run => text.push('\n'),
                b"p" => text.push_str("\n\n"),
                _ => {}
            },
            Event::Text(e) if in_text => {
                text.push_str(&e.unescape()?);
            }
            Event::End(e) => match e.local_name().as_ref() {
                b"r" => in_run = false,
                b"t" => in_text = false,
                b"p" => text.push_str("\n\n"),
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn document(body: &str) -> String {
        format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>{body}</w:body></w:document>"#
        )
    }

    #[test]
    fn paragraphs_are_separated_by_blank_lines() {
        let xml = document(
            "<w:p><w:r><w:t>Birinci</w:t></w:r></w:p><w:p><w:r><w:t>İkinci</w:t></w:r></w:p>",
        );
        assert_eq!(parse_document_xml(&xml).unwrap(), "Birinci\n\nİkinci\n\n");
    }

    #[test]
    fn runs_are_joined_and_formatting_dropped() {
        let xml = document(
            r#"<w:p><w:r><w:rPr><w:b/></w:rPr><w:t xml:space="preserve">Kalın </w:t></w:r><w:r><w:t>metin</w:t></w:r></w:p>"#,
        );
        assert_eq!(parse_document_xml(&xml).unwrap(), "Kalın metin\n\n");
    }

    #[test]
    fn tabs_breaks_and_entities() {
        let xml = document(
            "<w:p><w:r><w:t>a</w:t><w:tab/><w:t>b</w:t><w:br/><w:t>c &amp; d</w:t></w:r></w:p>",
        );
        assert_eq!(parse_document_xml(&xml).unwrap(), "a\tb\nc & d\n\n");
    }

    #[test]
    fn empty_paragraph_yields_blank_line() {
        let xml = document("<w:p/><w:p><w:r><w:t>x</w:t></w:r></w:p>");
        assert_eq!(parse_document_xml(&xml).unwrap(), "\n\nx\n\n");

        let xml = document("<w:p></w:p><w:p><w:r><w:t>x</w:t></w:r></w:p>");
        assert_eq!(parse_document_xml(&xml).unwrap(), "\n\nx\n\n");
    }

    #[test]
    fn tab_stops_in_paragraph_properties_are_not_text() {
        let xml = document(
            r#"<w:p><w:pPr><w:tabs><w:tab w:val="left" w:pos="720"/></w:tabs></w:pPr><w:r><w:t>başlık</w:t></w:r></w:p>"#,
        );
        assert_eq!(parse_document_xml(&xml).unwrap(), "başlık\n\n");
    }

    #[test]
    fn non_zip_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("legacy.doc");
        std::fs::write(&path, b"\xD0\xCF\x11\xE0 not a zip").unwrap();

        assert!(matches!(
            extract_raw_text(&path),
            Err(DocxError::Archive(_))
        ));
    }
}
