use pdf_writer::{Content, Name, Pdf, Rect, Ref, Str};

use crate::docx::PAGE_BREAK;
use crate::error::Error;
use crate::model::{Block, Document, FontColor, HeaderFooterKind, Paragraph, Run, visit_paragraphs};

const PAGE_WIDTH: f32 = 612.0;
const PAGE_HEIGHT: f32 = 792.0;
const MARGIN: f32 = 72.0;
const DEFAULT_FONT_SIZE: f32 = 11.0;
const LINE_FACTOR: f32 = 1.2;
const PARAGRAPH_GAP: f32 = 6.0;
// Average Helvetica advance as a fraction of the font size.
const AVG_CHAR_WIDTH: f32 = 0.5;

const FONTS: [(&[u8], &[u8]); 4] = [
    (b"F1", b"Helvetica"),
    (b"F2", b"Helvetica-Bold"),
    (b"F3", b"Helvetica-Oblique"),
    (b"F4", b"Helvetica-BoldOblique"),
];

#[derive(Clone, Debug)]
struct Segment {
    text: String,
    font: usize, // index into FONTS
    size: f32,
    color: Option<[u8; 3]>,
}

#[derive(Debug)]
enum Item {
    Line(Vec<Segment>),
    Gap(f32),
    PageBreak,
}

fn line_height(segments: &[Segment]) -> f32 {
    segments
        .iter()
        .map(|s| s.size)
        .fold(DEFAULT_FONT_SIZE, f32::max)
        * LINE_FACTOR
}

fn text_width(text: &str, size: f32) -> f32 {
    text.chars().count() as f32 * size * AVG_CHAR_WIDTH
}

/// Only Latin-1 survives the standard Type 1 fonts; everything else becomes `?`.
fn encode(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| match c as u32 {
            0x20..=0x7e | 0xa0..=0xff => c as u32 as u8,
            _ => b'?',
        })
        .collect()
}

struct LineBuilder {
    items: Vec<Item>,
    current: Vec<Segment>,
    width: f32,
    max_width: f32,
}

impl LineBuilder {
    fn new(max_width: f32) -> Self {
        LineBuilder {
            items: Vec::new(),
            current: Vec::new(),
            width: 0.0,
            max_width,
        }
    }

    fn flush(&mut self) {
        let segments = std::mem::take(&mut self.current);
        self.items.push(Item::Line(segments));
        self.width = 0.0;
    }

    fn push_word(&mut self, word: &str, style: &Segment) {
        if word.is_empty() {
            return;
        }
        let w = text_width(word, style.size);
        if self.width + w > self.max_width && self.width > 0.0 {
            self.flush();
            let trimmed = word.trim_start();
            if trimmed.is_empty() {
                return;
            }
            return self.push_word(trimmed, style);
        }
        self.width += w;
        match self.current.last_mut() {
            Some(last) if last.font == style.font && last.size == style.size && last.color == style.color => {
                last.text.push_str(word)
            }
            _ => self.current.push(Segment {
                text: word.to_string(),
                ..style.clone()
            }),
        }
    }

    fn paragraph(&mut self, para: &Paragraph) {
        for run in &para.runs {
            let fmt = &run.formatting;
            let bold = fmt.bold.unwrap_or(false);
            let italic = fmt.italic.unwrap_or(false);
            let style = Segment {
                text: String::new(),
                font: usize::from(bold) + 2 * usize::from(italic),
                size: fmt.font_size.unwrap_or(DEFAULT_FONT_SIZE),
                color: match fmt.font_color {
                    Some(FontColor::Rgb(rgb)) => Some(rgb),
                    _ => None,
                },
            };
            let mut word = String::new();
            for ch in run.text.chars() {
                match ch {
                    '\n' => {
                        self.push_word(&std::mem::take(&mut word), &style);
                        self.flush();
                    }
                    PAGE_BREAK => {
                        self.push_word(&std::mem::take(&mut word), &style);
                        self.flush();
                        self.items.push(Item::PageBreak);
                    }
                    '\t' => word.push_str("    "),
                    ' ' => {
                        word.push(' ');
                        self.push_word(&std::mem::take(&mut word), &style);
                    }
                    _ => word.push(ch),
                }
            }
            self.push_word(&word, &style);
        }
        self.flush();
        self.items.push(Item::Gap(PARAGRAPH_GAP));
    }

    fn blocks(&mut self, blocks: &[Block]) {
        for block in blocks {
            match block {
                Block::Paragraph(para) => self.paragraph(para),
                Block::PageBreak => self.items.push(Item::PageBreak),
                Block::Table(table) => {
                    for row in &table.rows {
                        let cells: Vec<String> = row.cells.iter().map(|c| c.text()).collect();
                        let para = Paragraph::with_runs(vec![Run::plain(cells.join(" | "))]);
                        self.paragraph(&para);
                    }
                }
            }
        }
    }
}

fn first_text(doc: &Document, kind: HeaderFooterKind) -> Option<String> {
    let hf = doc.header_footers().find(|hf| hf.kind == kind)?;
    let mut lines = Vec::new();
    visit_paragraphs(&hf.blocks, &mut |p| {
        let text = p.text();
        if !text.trim().is_empty() {
            lines.push(text);
        }
    });
    (!lines.is_empty()).then(|| lines.join(" "))
}

fn show(content: &mut Content, seg: &Segment, x: f32, y: f32) {
    let [r, g, b] = seg.color.unwrap_or([0, 0, 0]);
    content
        .set_fill_rgb(r as f32 / 255.0, g as f32 / 255.0, b as f32 / 255.0)
        .begin_text()
        .set_font(Name(FONTS[seg.font].0), seg.size)
        .next_line(x, y)
        .show(Str(&encode(&seg.text)))
        .end_text();
}

/// Lays the document's text out on Letter pages with the standard Helvetica
/// family. A last-resort rendering: no images, no table rules, no styles.
pub fn render(doc: &Document) -> Result<Vec<u8>, Error> {
    let mut builder = LineBuilder::new(PAGE_WIDTH - 2.0 * MARGIN);
    builder.blocks(&doc.body);
    let header = first_text(doc, HeaderFooterKind::Header);
    let footer = first_text(doc, HeaderFooterKind::Footer);

    let mut pages: Vec<Content> = Vec::new();
    let mut content = Content::new();
    let mut cursor_y = PAGE_HEIGHT - MARGIN;
    let mut page_has_text = false;

    for item in &builder.items {
        match item {
            Item::PageBreak => {
                pages.push(std::mem::replace(&mut content, Content::new()));
                cursor_y = PAGE_HEIGHT - MARGIN;
                page_has_text = false;
            }
            Item::Gap(gap) => cursor_y -= gap,
            Item::Line(segments) => {
                let height = line_height(segments);
                if cursor_y - height < MARGIN && page_has_text {
                    pages.push(std::mem::replace(&mut content, Content::new()));
                    cursor_y = PAGE_HEIGHT - MARGIN;
                }
                cursor_y -= height;
                let mut x = MARGIN;
                for seg in segments {
                    show(&mut content, seg, x, cursor_y);
                    x += text_width(&seg.text, seg.size);
                }
                page_has_text = true;
            }
        }
    }
    pages.push(content);

    let mut pdf = Pdf::new();
    let catalog_id = Ref::new(1);
    let pages_id = Ref::new(2);
    let font_ids: Vec<Ref> = (0..FONTS.len() as i32).map(|i| Ref::new(3 + i)).collect();
    let first_page = 3 + FONTS.len() as i32;
    let page_ids: Vec<Ref> = (0..pages.len() as i32)
        .map(|i| Ref::new(first_page + 2 * i))
        .collect();

    pdf.catalog(catalog_id).pages(pages_id);
    pdf.pages(pages_id)
        .kids(page_ids.iter().copied())
        .count(page_ids.len() as i32);

    for (i, mut page_content) in pages.into_iter().enumerate() {
        let margin_seg = |text: &str| Segment {
            text: text.to_string(),
            font: 0,
            size: 9.0,
            color: Some([0x59, 0x59, 0x59]),
        };
        if let Some(text) = &header {
            show(&mut page_content, &margin_seg(text), MARGIN, PAGE_HEIGHT - MARGIN / 2.0);
        }
        if let Some(text) = &footer {
            show(&mut page_content, &margin_seg(text), MARGIN, MARGIN / 2.0);
        }

        let page_id = page_ids[i];
        let content_id = Ref::new(page_id.get() + 1);
        pdf.stream(content_id, &page_content.finish());

        let mut page = pdf.page(page_id);
        page.media_box(Rect::new(0.0, 0.0, PAGE_WIDTH, PAGE_HEIGHT))
            .parent(pages_id)
            .contents(content_id);
        let mut resources = page.resources();
        let mut fonts = resources.fonts();
        for ((name, _), id) in FONTS.iter().zip(&font_ids) {
            fonts.pair(Name(name), *id);
        }
    }

    for ((_, base), id) in FONTS.iter().zip(&font_ids) {
        pdf.type1_font(*id).base_font(Name(base));
    }

    Ok(pdf.finish())
}
