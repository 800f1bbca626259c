use quick_xml::events::Event;
use quick_xml::Reader;

use super::format::DocumentFormat;
use super::ooxml::{xml_error, Package};
use super::types::{ExtractedTable, ExtractionResult, FormatExtractor};
use super::ExtractionError;

const MAIN_PART: &str = "word/document.xml";

/// Word (.docx) extractor.
///
/// Full text is every body paragraph followed by `\n`, empty ones included.
/// Tables are the top-level body tables, named "Table 1", "Table 2", ... in
/// document order; tables with no rows are dropped without consuming a number.
/// A cell's text is its paragraphs run together with no separator, then trimmed.
pub struct DocxExtractor;

impl FormatExtractor for DocxExtractor {
    fn format(&self) -> DocumentFormat {
        DocumentFormat::Docx
    }

    fn extract(&self, bytes: &[u8]) -> Result<ExtractionResult, ExtractionError> {
        let mut package = Package::open(bytes, DocumentFormat::Docx)?;
        let main = package.main_part(MAIN_PART)?;
        let xml = package.read_part(&main)?;

        let (full_text, tables) = parse_document(&xml, &main)?;

        tracing::debug!(
            part = %main,
            characters = full_text.chars().count(),
            tables = tables.len(),
            "Parsed DOCX body"
        );

        Ok(ExtractionResult::new(full_text, tables, 0, 0))
    }
}

/// Walk `w:document` and collect body text and top-level tables.
fn parse_document(
    xml: &str,
    part: &str,
) -> Result<(String, Vec<ExtractedTable>), ExtractionError> {
    let mut reader = Reader::from_str(xml);
    let mut buf = Vec::new();
    let mut walker = BodyWalker::default();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => walker.open(e.local_name().as_ref()),
            Ok(Event::Empty(e)) => walker.empty(e.local_name().as_ref()),
            Ok(Event::End(e)) => walker.close(e.local_name().as_ref()),
            Ok(Event::Text(e)) => {
                if walker.in_text_element() {
                    let text = e
                        .unescape()
                        .map_err(|err| xml_error(DocumentFormat::Docx, part, err))?;
                    walker.push_text(&text);
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(xml_error(DocumentFormat::Docx, part, e)),
            _ => {}
        }
        buf.clear();
    }

    if !walker.saw_document {
        return Err(ExtractionError::malformed(
            DocumentFormat::Docx,
            format!("{part} has no w:document element"),
        ));
    }

    Ok((walker.text, walker.tables))
}

// ═══════════════════════════════════════════
// Body walker
// ═══════════════════════════════════════════

/// The WordprocessingML elements the walker cares about, by local name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tag {
    Document,
    Body,
    Paragraph,
    Run,
    Text,
    Table,
    Row,
    Cell,
    TextBox,
    Other,
}

impl Tag {
    fn of(local_name: &[u8]) -> Self {
        match local_name {
            b"document" => Self::Document,
            b"body" => Self::Body,
            b"p" => Self::Paragraph,
            b"r" => Self::Run,
            b"t" => Self::Text,
            b"tbl" => Self::Table,
            b"tr" => Self::Row,
            b"tc" => Self::Cell,
            b"txbxContent" => Self::TextBox,
            _ => Self::Other,
        }
    }
}

/// Tracks where we are in the element tree. Depths are the length of the
/// open-element stack *before* the element was pushed, so an element closes
/// when the stack returns to that length.
#[derive(Default)]
struct BodyWalker {
    stack: Vec<Tag>,
    saw_document: bool,
    /// Open `w:txbxContent` elements; their text belongs to shapes, not the body.
    text_boxes: usize,
    paragraph: Option<OpenText>,
    table: Option<OpenTable>,
    text: String,
    tables: Vec<ExtractedTable>,
}

struct OpenText {
    depth: usize,
    text: String,
}

struct OpenTable {
    depth: usize,
    /// Tables opened inside this one; their rows are not ours.
    nested: usize,
    rows: Vec<Vec<String>>,
    row: Option<(usize, Vec<String>)>,
    cell: Option<OpenCell>,
}

struct OpenCell {
    depth: usize,
    paragraphs: Vec<String>,
    paragraph: Option<OpenText>,
}

impl BodyWalker {
    fn parent(&self) -> Option<Tag> {
        self.stack.last().copied()
    }

    fn open(&mut self, name: &[u8]) {
        let tag = Tag::of(name);
        let depth = self.stack.len();
        let parent = self.parent();

        match (tag, parent) {
            (Tag::Document, None) => self.saw_document = true,
            (Tag::TextBox, _) => self.text_boxes += 1,
            (Tag::Paragraph, Some(Tag::Body)) => {
                self.paragraph = Some(OpenText {
                    depth,
                    text: String::new(),
                })
            }
            (Tag::Table, Some(Tag::Body)) => {
                self.table = Some(OpenTable {
                    depth,
                    nested: 0,
                    rows: Vec::new(),
                    row: None,
                    cell: None,
                })
            }
            (Tag::Table, _) => {
                if let Some(table) = self.table.as_mut() {
                    table.nested += 1;
                }
            }
            (Tag::Row, Some(Tag::Table)) => {
                if let Some(table) = self.top_table() {
                    table.row = Some((depth, Vec::new()));
                }
            }
            (Tag::Cell, Some(Tag::Row)) => {
                if let Some(table) = self.top_table().filter(|t| t.row.is_some()) {
                    table.cell = Some(OpenCell {
                        depth,
                        paragraphs: Vec::new(),
                        paragraph: None,
                    });
                }
            }
            (Tag::Paragraph, Some(Tag::Cell)) => {
                if let Some(cell) = self.open_cell() {
                    cell.paragraph = Some(OpenText {
                        depth,
                        text: String::new(),
                    });
                }
            }
            _ => {}
        }

        self.stack.push(tag);
    }

    /// Self-closing elements: run tabs and breaks, plus empty paragraphs,
    /// cells and rows, which still count.
    fn empty(&mut self, name: &[u8]) {
        match (name, self.parent()) {
            (b"tab", Some(Tag::Run)) => self.push_text("\t"),
            (b"br" | b"cr", Some(Tag::Run)) => self.push_text("\n"),
            (b"p", Some(Tag::Body)) => self.text.push('\n'),
            (b"p", Some(Tag::Cell)) => {
                if let Some(cell) = self.open_cell() {
                    cell.paragraphs.push(String::new());
                }
            }
            (b"tc", Some(Tag::Row)) => {
                if let Some((_, cells)) = self.top_table().and_then(|t| t.row.as_mut()) {
                    cells.push(String::new());
                }
            }
            (b"tr", Some(Tag::Table)) => {
                if let Some(table) = self.top_table() {
                    table.rows.push(Vec::new());
                }
            }
            _ => {}
        }
    }

    fn close(&mut self, name: &[u8]) {
        self.stack.pop();
        let depth = self.stack.len();

        match Tag::of(name) {
            Tag::TextBox => self.text_boxes = self.text_boxes.saturating_sub(1),
            Tag::Paragraph => {
                if self.paragraph.as_ref().is_some_and(|p| p.depth == depth) {
                    if let Some(paragraph) = self.paragraph.take() {
                        self.text.push_str(&paragraph.text);
                        self.text.push('\n');
                    }
                } else if let Some(cell) = self.open_cell() {
                    if cell.paragraph.as_ref().is_some_and(|p| p.depth == depth) {
                        if let Some(paragraph) = cell.paragraph.take() {
                            cell.paragraphs.push(paragraph.text);
                        }
                    }
                }
            }
            Tag::Cell => {
                if let Some(table) = self.top_table() {
                    if table.cell.as_ref().is_some_and(|c| c.depth == depth) {
                        if let (Some(cell), Some((_, cells))) = (table.cell.take(), table.row.as_mut()) {
                            cells.push(cell.paragraphs.concat().trim().to_string());
                        }
                    }
                }
            }
            Tag::Row => {
                if let Some(table) = self.top_table() {
                    if table.row.as_ref().is_some_and(|(d, _)| *d == depth) {
                        if let Some((_, cells)) = table.row.take() {
                            table.rows.push(cells);
                        }
                    }
                }
            }
            Tag::Table => {
                let finished = self.table.as_ref().is_some_and(|t| t.depth == depth);
                if finished {
                    if let Some(table) = self.table.take() {
                        if !table.rows.is_empty() {
                            let name = format!("Table {}", self.tables.len() + 1);
                            self.tables.push(ExtractedTable::new(name, table.rows));
                        }
                    }
                } else if let Some(table) = self.table.as_mut() {
                    table.nested = table.nested.saturating_sub(1);
                }
            }
            _ => {}
        }
    }

    /// The open top-level table, unless we are inside a nested one.
    fn top_table(&mut self) -> Option<&mut OpenTable> {
        self.table.as_mut().filter(|t| t.nested == 0)
    }

    fn open_cell(&mut self) -> Option<&mut OpenCell> {
        self.top_table().and_then(|t| t.cell.as_mut())
    }

    fn in_text_element(&self) -> bool {
        self.parent() == Some(Tag::Text)
    }

    fn push_text(&mut self, text: &str) {
        if self.text_boxes > 0 {
            return;
        }
        if let Some(paragraph) = self.paragraph.as_mut() {
            paragraph.text.push_str(text);
        } else if let Some(paragraph) = self.open_cell().and_then(|c| c.paragraph.as_mut()) {
            paragraph.text.push_str(text);
        }
    }
}
