//! PDF document export
//!
//! `build_layout` turns topic bundles into positioned text lines and rules
//! on A4 pages. `render_pdf` draws that layout with the PDF base-14
//! Helvetica fonts. Coordinates are in points from the bottom-left corner.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use printpdf::{BuiltinFont, Color, IndirectFontRef, Line, Mm, PdfDocument, Point, Pt, Rgb};

use super::format_local;
use crate::models::{Entry, EntryKind, TopicBundle};
use crate::storage::{StoreError, StoreResult};

/// A4 width in points
pub const PAGE_WIDTH: f32 = 595.28;
/// A4 height in points
pub const PAGE_HEIGHT: f32 = 841.89;
/// 2 cm
pub const MARGIN: f32 = 56.69;

const USABLE_WIDTH: f32 = PAGE_WIDTH - 2.0 * MARGIN;
const TOP: f32 = PAGE_HEIGHT - MARGIN;

const BLACK: (f32, f32, f32) = (0.0, 0.0, 0.0);
const SEPARATOR: (f32, f32, f32) = (0.7, 0.82, 0.74);

/// Shown when a topic has no category
const NO_CATEGORY: &str = "—";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Font {
    Regular,
    Bold,
}

/// A single drawing instruction on a page
#[derive(Debug, Clone, PartialEq)]
pub enum DrawOp {
    /// One line of text with its baseline at `y`
    Text {
        font: Font,
        size: f32,
        y: f32,
        text: String,
    },
    /// A horizontal rule across the usable width
    Rule { y: f32, color: (f32, f32, f32) },
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
    pub ops: Vec<DrawOp>,
}

/// The laid-out document, ready to render
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentLayout {
    pub title: String,
    pub pages: Vec<Page>,
    pub topic_count: usize,
}

impl DocumentLayout {
    /// All text lines in drawing order
    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.pages.iter().flat_map(|p| p.ops.iter()).filter_map(|op| match op {
            DrawOp::Text { text, .. } => Some(text.as_str()),
            DrawOp::Rule { .. } => None,
        })
    }
}

/// Inputs to the layout that do not come from the store rows
#[derive(Debug, Clone)]
pub struct LayoutOptions {
    pub app_title: String,
    pub tz: Tz,
    pub exported_at: DateTime<Utc>,
}

/// Lay out the export for `bundles` in the given order
pub fn build_layout(bundles: &[TopicBundle], options: &LayoutOptions) -> DocumentLayout {
    let tz = options.tz;
    let mut composer = Composer::new();

    composer.write(&format!("{} – Export", options.app_title), Font::Bold, 16.0, 18.0);
    composer.write(
        &format!(
            "Erstellt am: {} | Anzahl Themen: {}",
            options.exported_at.with_timezone(&tz).format("%Y-%m-%d %H:%M:%S %Z"),
            bundles.len()
        ),
        Font::Regular,
        9.0,
        16.0,
    );
    composer.rule(BLACK);
    composer.skip(14.0);

    for bundle in bundles {
        let topic = &bundle.topic;

        composer.write(&format!("#{}  {}", topic.id, topic.title), Font::Bold, 12.0, 14.0);

        let mut meta = format!(
            "Rubrik: {}   |   Autor: {}   |   Eröffnung: {}",
            topic.category.as_deref().unwrap_or(NO_CATEGORY),
            topic.created_by,
            format_local(topic.created_at, tz)
        );
        if let Some(archived_at) = topic.archived_at {
            meta.push_str(&format!("   |   Archiviert: {}", format_local(archived_at, tz)));
        }
        composer.write(&meta, Font::Regular, 9.0, 12.0);

        if let Some(description) = topic.description.as_deref() {
            composer.write("Beschreibung:", Font::Bold, 10.0, 12.0);
            composer.write(description, Font::Regular, 10.0, 12.0);
        }

        if !topic.links.is_empty() {
            composer.write("Links:", Font::Bold, 10.0, 12.0);
            for link in &topic.links {
                composer.write(&format!("• {}: {}", link.label, link.url), Font::Regular, 9.0, 12.0);
            }
        }

        composer.entries(EntryKind::Update, &bundle.updates, tz);
        composer.entries(EntryKind::Comment, &bundle.comments, tz);

        composer.skip(6.0);
        composer.rule(SEPARATOR);
        composer.skip(16.0);
    }

    DocumentLayout {
        title: options.app_title.clone(),
        pages: composer.finish(),
        topic_count: bundles.len(),
    }
}

/// Render a layout to PDF bytes
pub fn render_pdf(layout: &DocumentLayout) -> StoreResult<Vec<u8>> {
    let width = Mm::from(Pt(PAGE_WIDTH));
    let height = Mm::from(Pt(PAGE_HEIGHT));

    let (doc, first_page, first_layer) =
        PdfDocument::new(layout.title.as_str(), width, height, "Layer 1");
    let regular = doc
        .add_builtin_font(BuiltinFont::Helvetica)
        .map_err(|e| StoreError::Pdf(e.to_string()))?;
    let bold = doc
        .add_builtin_font(BuiltinFont::HelveticaBold)
        .map_err(|e| StoreError::Pdf(e.to_string()))?;

    for (index, page) in layout.pages.iter().enumerate() {
        let layer = if index == 0 {
            doc.get_page(first_page).get_layer(first_layer)
        } else {
            let (page_index, layer_index) = doc.add_page(width, height, "Layer 1");
            doc.get_page(page_index).get_layer(layer_index)
        };

        for op in &page.ops {
            match op {
                DrawOp::Text { font, size, y, text } => {
                    let font: &IndirectFontRef = match font {
                        Font::Regular => &regular,
                        Font::Bold => &bold,
                    };
                    layer.use_text(
                        text.as_str(),
                        *size,
                        Mm::from(Pt(MARGIN)),
                        Mm::from(Pt(*y)),
                        font,
                    );
                }
                DrawOp::Rule { y, color } => {
                    let (r, g, b) = *color;
                    layer.set_outline_color(Color::Rgb(Rgb::new(r, g, b, None)));
                    layer.set_outline_thickness(0.5);
                    layer.add_line(Line {
                        points: vec![
                            (Point::new(Mm::from(Pt(MARGIN)), Mm::from(Pt(*y))), false),
                            (
                                Point::new(Mm::from(Pt(PAGE_WIDTH - MARGIN)), Mm::from(Pt(*y))),
                                false,
                            ),
                        ],
                        is_closed: false,
                    });
                }
            }
        }
    }

    doc.save_to_bytes().map_err(|e| StoreError::Pdf(e.to_string()))
}

/// Tracks the current page and baseline while laying out
struct Composer {
    done: Vec<Page>,
    current: Page,
    y: f32,
}

impl Composer {
    fn new() -> Self {
        Self {
            done: Vec::new(),
            current: Page::default(),
            y: TOP,
        }
    }

    fn break_page(&mut self) {
        self.done.push(std::mem::take(&mut self.current));
        self.y = TOP;
    }

    /// Wrap `text` and emit one line per row, breaking pages as needed
    fn write(&mut self, text: &str, font: Font, size: f32, leading: f32) {
        for line in wrap(text, font, size, USABLE_WIDTH) {
            if self.y < MARGIN + leading {
                self.break_page();
            }
            self.current.ops.push(DrawOp::Text {
                font,
                size,
                y: self.y,
                text: line,
            });
            self.y -= leading;
        }
    }

    fn entries(&mut self, kind: EntryKind, entries: &[Entry], tz: Tz) {
        if entries.is_empty() {
            return;
        }
        self.write(&format!("{}:", kind.heading()), Font::Bold, 10.0, 12.0);
        for entry in entries {
            self.write(
                &format!(
                    "• {} – {}: {}",
                    format_local(entry.created_at, tz),
                    entry.user,
                    entry.content
                ),
                Font::Regular,
                9.0,
                12.0,
            );
        }
    }

    fn rule(&mut self, color: (f32, f32, f32)) {
        if self.y < MARGIN {
            self.break_page();
        }
        self.current.ops.push(DrawOp::Rule { y: self.y, color });
    }

    fn skip(&mut self, dy: f32) {
        self.y -= dy;
    }

    fn finish(mut self) -> Vec<Page> {
        self.done.push(self.current);
        self.done
    }
}

// ==================== Text metrics ====================

/// Helvetica advance widths for ASCII 32..=126, in 1/1000 em
const HELVETICA: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278, // ' '../
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 278, 278, 584, 584, 584, 556, // 0..?
    1015, 667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, 722, 778, // @..O
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 278, 278, 278, 469, 556, // P.._
    333, 556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, 556, 556, // `..o
    556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, 334, 260, 334, 584, // p..~
];

const HELVETICA_BOLD: [u16; 95] = [
    278, 333, 474, 556, 556, 889, 722, 238, 333, 333, 389, 584, 278, 333, 278, 278, // ' '../
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 333, 333, 584, 584, 584, 611, // 0..?
    975, 722, 722, 722, 722, 667, 611, 778, 722, 278, 556, 722, 611, 833, 722, 778, // @..O
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 333, 278, 333, 584, 556, // P.._
    333, 556, 611, 556, 611, 556, 333, 611, 611, 278, 278, 556, 278, 889, 611, 611, // `..o
    611, 611, 389, 556, 333, 611, 556, 778, 556, 556, 500, 389, 280, 389, 584, // p..~
];

fn char_width(c: char, font: Font) -> u16 {
    let table = match font {
        Font::Regular => &HELVETICA,
        Font::Bold => &HELVETICA_BOLD,
    };
    match c {
        ' '..='~' => table[c as usize - 32],
        '•' => 350,
        '–' => 556,
        '—' => 1000,
        _ => 556,
    }
}

/// Estimated width of `text` in points
pub fn text_width(text: &str, font: Font, size: f32) -> f32 {
    let units: u32 = text.chars().map(|c| u32::from(char_width(c, font))).sum();
    units as f32 * size / 1000.0
}

/// Greedy word wrap to `width` points
///
/// Newlines start a new line; words wider than a whole line are split.
pub fn wrap(text: &str, font: Font, size: f32, width: f32) -> Vec<String> {
    let mut lines = Vec::new();
    let space = text_width(" ", font, size);

    for paragraph in text.split('\n') {
        let paragraph = paragraph.trim_end_matches('\r');
        if text_width(paragraph, font, size) <= width {
            lines.push(paragraph.to_string());
            continue;
        }

        let mut current = String::new();
        let mut current_width = 0.0;

        for word in paragraph.split_whitespace() {
            let word_width = text_width(word, font, size);

            if current.is_empty() && word_width <= width {
                current.push_str(word);
                current_width = word_width;
                continue;
            }
            if !current.is_empty() && current_width + space + word_width <= width {
                current.push(' ');
                current.push_str(word);
                current_width += space + word_width;
                continue;
            }

            if !current.is_empty() {
                lines.push(std::mem::take(&mut current));
                current_width = 0.0;
            }

            if word_width <= width {
                current.push_str(word);
                current_width = word_width;
            } else {
                for c in word.chars() {
                    let w = f32::from(char_width(c, font)) * size / 1000.0;
                    if !current.is_empty() && current_width + w > width {
                        lines.push(std::mem::take(&mut current));
                        current_width = 0.0;
                    }
                    current.push(c);
                    current_width += w;
                }
            }
        }

        lines.push(current);
    }

    lines
}
