use super::font::TextMeasure;

/// Fixed page geometry used for converted Word documents.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageLayout {
    pub font_size: f32,
    pub line_height: f32,
    pub margin: f32,
    pub page_width: f32,
    pub page_height: f32,
    /// Space kept free at the bottom of every page for the watermark band.
    pub footer_reserve: f32,
}

impl Default for PageLayout {
    /// A4 portrait, 11pt text, 1.4 line spacing, 50pt margins.
    fn default() -> Self {
        let font_size = 11.0;
        Self {
            font_size,
            line_height: font_size * 1.4,
            margin: 50.0,
            page_width: 595.0,
            page_height: 842.0,
            footer_reserve: 30.0,
        }
    }
}

impl PageLayout {
    pub fn usable_width(&self) -> f32 {
        self.page_width - 2.0 * self.margin
    }

    pub fn max_lines_per_page(&self) -> usize {
        let usable_height = self.page_height - 2.0 * self.margin - self.footer_reserve;
        ((usable_height / self.line_height).floor() as usize).max(1)
    }

    /// Baseline of the first line on a page.
    pub fn top(&self) -> f32 {
        self.page_height - self.margin
    }
}

/// A line placed on a page, in PDF user space.
#[derive(Debug, Clone, PartialEq)]
pub struct PlacedLine {
    pub text: String,
    pub x: f32,
    pub y: f32,
}

/// Break `text` into lines no wider than the layout's usable width.
///
/// Paragraphs are separated by `\n` and split into words on single spaces.
/// A paragraph that is only whitespace becomes one empty line. A word that
/// is wider than a whole line still gets a line of its own.
pub fn wrap_text(text: &str, measure: &impl TextMeasure, layout: &PageLayout) -> Vec<String> {
    let max_width = layout.usable_width();
    let mut lines = Vec::new();

    for paragraph in text.split('\n') {
        if paragraph.trim().is_empty() {
            lines.push(String::new());
            continue;
        }

        let mut current = String::new();
        for word in paragraph.split(' ') {
            let candidate = if current.is_empty() {
                word.to_string()
            } else {
                format!("{current} {word}")
            };

            if !current.is_empty() && measure.width_of(&candidate, layout.font_size) > max_width {
                lines.push(std::mem::replace(&mut current, word.to_string()));
            } else {
                current = candidate;
            }
        }

        if !current.is_empty() {
            lines.push(current);
        }
    }

    lines
}

/// Split wrapped lines into pages and assign each non-empty line its
/// position. Blank lines take up vertical space but are not drawn.
///
/// Always returns at least one page.
pub fn paginate(lines: &[String], layout: &PageLayout) -> Vec<Vec<PlacedLine>> {
    if lines.is_empty() {
        return vec![Vec::new()];
    }

    lines
        .chunks(layout.max_lines_per_page())
        .map(|page| {
            page.iter()
                .enumerate()
                .filter(|(_, line)| !line.is_empty())
                .map(|(row, line)| PlacedLine {
                    text: line.clone(),
                    x: layout.margin,
                    y: layout.top() - row as f32 * layout.line_height,
                })
                .collect()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Every character is 0.5em wide.
    struct Monospace;

    impl TextMeasure for Monospace {
        fn width_of(&self, text: &str, size: f32) -> f32 {
            text.chars().count() as f32 * size * 0.5
        }
    }

    fn layout() -> PageLayout {
        PageLayout::default()
    }

    #[test]
    fn default_geometry() {
        let layout = layout();
        assert_eq!(layout.usable_width(), 495.0);
        assert_eq!(layout.max_lines_per_page(), 46);
        assert_eq!(layout.top(), 792.0);
    }

    #[test]
    fn wrapped_lines_fit_usable_width() {
        let layout = layout();
        let text = [
            "Kısa.",
            "Bu paragraf birkaç satıra yayılacak kadar uzun, çünkü içinde çok sayıda kelime var ve hiçbiri tek başına satırı doldurmuyor ama hepsi birlikte doldurur.",
            "",
            "Orta uzunlukta bir paragraf, yine de sığmalı.",
        ]
        .join("\n");

        let lines = wrap_text(&text, &Monospace, &layout);

        assert!(lines.len() > 4);
        for line in &lines {
            assert!(
                Monospace.width_of(line, layout.font_size) <= layout.usable_width(),
                "line too wide: {line:?}"
            );
        }
    }

    #[test]
    fn wrapping_keeps_every_word_in_order() {
        let text = "bir iki üç dört beş altı yedi sekiz dokuz on ".repeat(20);
        let lines = wrap_text(text.trim_end(), &Monospace, &layout());

        assert_eq!(lines.join(" "), text.trim_end());
    }

    #[test]
    fn overlong_word_gets_its_own_line() {
        let long = "x".repeat(200);
        let text = format!("önce {long} sonra");

        let lines = wrap_text(&text, &Monospace, &layout());

        assert_eq!(lines, vec!["önce".to_string(), long, "sonra".to_string()]);
    }

    #[test]
    fn whitespace_paragraph_is_blank_line() {
        let lines = wrap_text("a\n   \nb", &Monospace, &layout());
        assert_eq!(lines, vec!["a", "", "b"]);
    }

    #[test]
    fn pages_hold_at_most_max_lines() {
        let layout = layout();
        let lines: Vec<String> = (0..100).map(|i| format!("satır {i}")).collect();

        let pages = paginate(&lines, &layout);

        assert_eq!(pages.len(), 3);
        assert_eq!(pages[0].len(), 46);
        assert_eq!(pages[2].len(), 8);
        assert_eq!(pages[1][0].text, "satır 46");
        assert_eq!(pages[1][0].y, layout.top());
    }

    #[test]
    fn blank_lines_advance_without_drawing() {
        let layout = layout();
        let lines = vec!["a".to_string(), String::new(), "b".to_string()];

        let page = &paginate(&lines, &layout)[0];

        assert_eq!(page.len(), 2);
        assert_eq!(page[0].y, layout.top());
        assert_eq!(page[1].y, layout.top() - 2.0 * layout.line_height);
        assert!(page.iter().all(|line| line.x == layout.margin));
    }

    #[test]
    fn empty_document_has_one_blank_page() {
        let pages = paginate(&[], &layout());
        assert_eq!(pages, vec![Vec::new()]);
    }
}
