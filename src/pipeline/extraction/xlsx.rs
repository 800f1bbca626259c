use std::collections::HashMap;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use super::format::DocumentFormat;
use super::formula::{column_number, row_number, shift_formula};
use super::ooxml::{attr, xml_error, Package};
use super::types::{ExtractedTable, ExtractionResult, FormatExtractor};
use super::ExtractionError;

const MAIN_PART: &str = "xl/workbook.xml";
const SHARED_STRINGS_PART: &str = "xl/sharedStrings.xml";
const SHARED_STRINGS_REL: &str = "/sharedStrings";

const FORMAT: DocumentFormat = DocumentFormat::Xlsx;

/// Excel (.xlsx) extractor.
///
/// Every sheet in workbook order contributes one tab-terminated line per row
/// to the full text. Sheets with at least one row become a table named after
/// the sheet. `sheet_count` counts every sheet, empty ones included.
pub struct XlsxExtractor;

impl FormatExtractor for XlsxExtractor {
    fn format(&self) -> DocumentFormat {
        FORMAT
    }

    fn extract(&self, bytes: &[u8]) -> Result<ExtractionResult, ExtractionError> {
        let mut package = Package::open(bytes, FORMAT)?;
        let workbook_part = package.main_part(MAIN_PART)?;
        let workbook_xml = package.read_part(&workbook_part)?;
        let sheets = parse_workbook(&workbook_xml, &workbook_part)?;
        let rels = package.relationships(&workbook_part)?;

        let shared_strings_part = rels
            .values()
            .find(|rel| rel.rel_type.ends_with(SHARED_STRINGS_REL))
            .map(|rel| rel.target.clone());
        let shared_strings = match shared_strings_part {
            Some(part) => Some((package.read_part(&part)?, part)),
            None => package
                .read_optional_part(SHARED_STRINGS_PART)?
                .map(|xml| (xml, SHARED_STRINGS_PART.to_string())),
        };
        let shared_strings = match shared_strings {
            Some((xml, part)) => parse_shared_strings(&xml, &part)?,
            None => Vec::new(),
        };

        let mut full_text = String::new();
        let mut tables = Vec::new();

        for sheet in &sheets {
            let part = rels
                .get(&sheet.rel_id)
                .map(|rel| rel.target.clone())
                .ok_or_else(|| {
                    ExtractionError::malformed(
                        FORMAT,
                        format!("sheet '{}' has no part for {}", sheet.name, sheet.rel_id),
                    )
                })?;
            let sheet_xml = package.read_part(&part)?;
            let rows = parse_sheet(&sheet_xml, &part, &shared_strings)?;

            for row in &rows {
                for cell in row {
                    full_text.push_str(cell);
                    full_text.push('\t');
                }
                full_text.push('\n');
            }

            tracing::debug!(sheet = %sheet.name, rows = rows.len(), "Parsed worksheet");

            if !rows.is_empty() {
                tables.push(ExtractedTable::new(sheet.name.clone(), rows));
            }
        }

        Ok(ExtractionResult::new(full_text, tables, 0, sheets.len()))
    }
}

// ═══════════════════════════════════════════
// Workbook and shared strings
// ═══════════════════════════════════════════

struct SheetEntry {
    name: String,
    rel_id: String,
}

fn parse_workbook(xml: &str, part: &str) -> Result<Vec<SheetEntry>, ExtractionError> {
    let mut reader = Reader::from_str(xml);
    let mut buf = Vec::new();
    let mut saw_workbook = false;
    let mut sheets = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e)) => match e.local_name().as_ref() {
                b"workbook" => saw_workbook = true,
                b"sheet" => {
                    let name = attr(e, b"name", FORMAT)?.unwrap_or_default();
                    let rel_id = attr(e, b"id", FORMAT)?.ok_or_else(|| {
                        ExtractionError::malformed(FORMAT, format!("sheet '{name}' has no r:id"))
                    })?;
                    sheets.push(SheetEntry { name, rel_id });
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(xml_error(FORMAT, part, e)),
            _ => {}
        }
        buf.clear();
    }

    if !saw_workbook {
        return Err(ExtractionError::malformed(
            FORMAT,
            format!("{part} has no workbook element"),
        ));
    }
    Ok(sheets)
}

/// Shared string table. Rich-text runs are concatenated; phonetic runs skipped.
fn parse_shared_strings(xml: &str, part: &str) -> Result<Vec<String>, ExtractionError> {
    let mut reader = Reader::from_str(xml);
    let mut buf = Vec::new();
    let mut strings = Vec::new();
    let mut item: Option<String> = None;
    let mut phonetic = 0usize;
    let mut in_text = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => match e.local_name().as_ref() {
                b"si" => item = Some(String::new()),
                b"rPh" => phonetic += 1,
                b"t" => in_text = item.is_some() && phonetic == 0,
                _ => {}
            },
            Ok(Event::Empty(ref e)) if e.local_name().as_ref() == b"si" => {
                strings.push(String::new());
            }
            Ok(Event::End(ref e)) => match e.local_name().as_ref() {
                b"si" => strings.extend(item.take()),
                b"rPh" => phonetic = phonetic.saturating_sub(1),
                b"t" => in_text = false,
                _ => {}
            },
            Ok(Event::Text(e)) if in_text => {
                let text = e.unescape().map_err(|err| xml_error(FORMAT, part, err))?;
                if let Some(item) = item.as_mut() {
                    item.push_str(&text);
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(xml_error(FORMAT, part, e)),
            _ => {}
        }
        buf.clear();
    }

    Ok(strings)
}

// ═══════════════════════════════════════════
// Worksheet
// ═══════════════════════════════════════════

/// Which text node we are currently collecting inside a cell.
#[derive(Clone, Copy, PartialEq, Eq)]
enum Capture {
    Value,
    Formula,
    InlineText,
}

#[derive(Default)]
struct OpenCell {
    column: Option<usize>,
    row: u32,
    cell_type: Option<String>,
    value: Option<String>,
    formula: Option<String>,
    /// `si` of a shared formula this cell takes part in.
    shared_index: Option<String>,
    inline: Option<String>,
}

/// The anchor cell of a shared formula.
struct SharedFormula {
    text: String,
    column: usize,
    row: u32,
}

#[derive(Default)]
struct SheetWalker<'s> {
    shared_strings: &'s [String],
    /// Shared-formula anchors, by `si`.
    shared_formulas: HashMap<String, SharedFormula>,
    rows: Vec<Vec<String>>,
    row: Option<Vec<String>>,
    /// 1-based number of the open (or last) row.
    row_number: u32,
    next_column: usize,
    cell: Option<OpenCell>,
    capture: Option<Capture>,
    in_inline: bool,
    phonetic: usize,
    saw_root: bool,
}

fn parse_sheet(
    xml: &str,
    part: &str,
    shared_strings: &[String],
) -> Result<Vec<Vec<String>>, ExtractionError> {
    let mut reader = Reader::from_str(xml);
    let mut buf = Vec::new();
    let mut walker = SheetWalker {
        shared_strings,
        ..SheetWalker::default()
    };

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => walker.open(e, false)?,
            Ok(Event::Empty(ref e)) => walker.open(e, true)?,
            Ok(Event::End(ref e)) => walker.close(e.local_name().as_ref())?,
            Ok(Event::Text(e)) => {
                if walker.capturing() {
                    let text = e.unescape().map_err(|err| xml_error(FORMAT, part, err))?;
                    walker.push_text(&text);
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(xml_error(FORMAT, part, e)),
            _ => {}
        }
        buf.clear();
    }

    if !walker.saw_root {
        return Err(ExtractionError::malformed(
            FORMAT,
            format!("{part} has no worksheet element"),
        ));
    }
    Ok(walker.rows)
}

impl SheetWalker<'_> {
    fn open(&mut self, e: &BytesStart<'_>, empty: bool) -> Result<(), ExtractionError> {
        match e.local_name().as_ref() {
            b"worksheet" | b"chartsheet" | b"dialogsheet" => self.saw_root = true,
            b"row" => {
                self.row_number = attr(e, b"r", FORMAT)?
                    .and_then(|r| r.trim().parse().ok())
                    .unwrap_or(self.row_number.saturating_add(1));
                self.row = Some(Vec::new());
                self.next_column = 1;
                if empty {
                    self.close(b"row")?;
                }
            }
            b"c" if self.row.is_some() => {
                let reference = attr(e, b"r", FORMAT)?;
                self.cell = Some(OpenCell {
                    column: reference.as_deref().and_then(column_number),
                    row: reference
                        .as_deref()
                        .and_then(row_number)
                        .unwrap_or(self.row_number),
                    cell_type: attr(e, b"t", FORMAT)?,
                    ..OpenCell::default()
                });
                if empty {
                    self.close(b"c")?;
                }
            }
            b"v" if self.cell.is_some() && !empty => self.start_capture(Capture::Value),
            b"f" => {
                let shared = attr(e, b"t", FORMAT)?.as_deref() == Some("shared");
                let index = attr(e, b"si", FORMAT)?;
                if let Some(cell) = self.cell.as_mut() {
                    if shared {
                        cell.shared_index = index;
                    }
                    if !empty {
                        cell.formula = Some(String::new());
                        self.capture = Some(Capture::Formula);
                    }
                }
            }
            b"is" if self.cell.is_some() && !empty => {
                self.in_inline = true;
                if let Some(cell) = self.cell.as_mut() {
                    cell.inline = Some(String::new());
                }
            }
            b"rPh" if !empty => self.phonetic += 1,
            b"t" if self.in_inline && self.phonetic == 0 && !empty => {
                self.start_capture(Capture::InlineText)
            }
            _ => {}
        }
        Ok(())
    }

    fn start_capture(&mut self, capture: Capture) {
        if let Some(cell) = self.cell.as_mut() {
            if capture == Capture::Value {
                cell.value = Some(String::new());
            }
            self.capture = Some(capture);
        }
    }

    fn capturing(&self) -> bool {
        self.capture.is_some()
    }

    fn push_text(&mut self, text: &str) {
        let Some(cell) = self.cell.as_mut() else {
            return;
        };
        let target = match self.capture {
            Some(Capture::Value) => cell.value.as_mut(),
            Some(Capture::Formula) => cell.formula.as_mut(),
            Some(Capture::InlineText) => cell.inline.as_mut(),
            _ => None,
        };
        if let Some(target) = target {
            target.push_str(text);
        }
    }

    fn close(&mut self, name: &[u8]) -> Result<(), ExtractionError> {
        match name {
            b"v" | b"f" | b"t" => self.capture = None,
            b"is" => self.in_inline = false,
            b"rPh" => self.phonetic = self.phonetic.saturating_sub(1),
            b"c" => {
                if let Some(cell) = self.cell.take() {
                    let column = cell.column.unwrap_or(self.next_column);
                    let value = self.render(cell, column)?;
                    self.push_cell(column, value);
                }
            }
            b"row" => {
                if let Some(row) = self.row.take() {
                    self.rows.push(row);
                }
            }
            _ => {}
        }
        Ok(())
    }

    /// Append a cell, padding any columns skipped since the previous one.
    fn push_cell(&mut self, column: usize, value: String) {
        let Some(row) = self.row.as_mut() else {
            return;
        };
        while self.next_column < column {
            row.push(String::new());
            self.next_column += 1;
        }
        row.push(value);
        self.next_column = column.max(self.next_column) + 1;
    }

    fn render(&mut self, cell: OpenCell, column: usize) -> Result<String, ExtractionError> {
        // Formula cells render their formula, never the cached result.
        match (cell.formula, cell.shared_index) {
            (Some(formula), index) if !formula.is_empty() => {
                if let Some(index) = index {
                    self.shared_formulas.insert(
                        index,
                        SharedFormula {
                            text: formula.clone(),
                            column,
                            row: cell.row,
                        },
                    );
                }
                return Ok(formula);
            }
            (_, Some(index)) => {
                if let Some(anchor) = self.shared_formulas.get(&index) {
                    return Ok(shift_formula(
                        &anchor.text,
                        i64::from(cell.row) - i64::from(anchor.row),
                        column as i64 - anchor.column as i64,
                    ));
                }
            }
            _ => {}
        }

        let value = cell.value.unwrap_or_default();
        let rendered = match cell.cell_type.as_deref() {
            Some("s") => {
                let index: usize = value.trim().parse().map_err(|_| {
                    ExtractionError::malformed(FORMAT, format!("bad shared string index '{value}'"))
                })?;
                self.shared_strings.get(index).cloned().ok_or_else(|| {
                    ExtractionError::malformed(
                        FORMAT,
                        format!("shared string index {index} out of range"),
                    )
                })?
            }
            Some("inlineStr") => cell.inline.unwrap_or_default(),
            Some("b") => (value.trim() == "1").to_string(),
            Some("e") => String::new(),
            Some("str") | Some("d") => value,
            _ if value.trim().is_empty() => String::new(),
            _ => {
                let number: f64 = value.trim().parse().map_err(|_| {
                    ExtractionError::malformed(FORMAT, format!("bad numeric cell value '{value}'"))
                })?;
                render_number(number)
            }
        };
        Ok(rendered)
    }
}

/// Render a numeric cell the way a double prints in a spreadsheet export:
/// integral values keep one decimal, magnitudes outside `[1e-3, 1e7)` use
/// `E` notation.
pub fn render_number(value: f64) -> String {
    if !value.is_finite() {
        return value.to_string();
    }

    let magnitude = value.abs();
    if value == 0.0 || (1e-3..1e7).contains(&magnitude) {
        if value.fract() == 0.0 {
            return format!("{value:.1}");
        }
        return value.to_string();
    }

    // `{:e}` is shortest round-trip: "1e7", "1.2345678e7", "1.5e-5".
    let scientific = format!("{value:e}");
    match scientific.split_once('e') {
        Some((mantissa, exponent)) if mantissa.contains('.') => format!("{mantissa}E{exponent}"),
        Some((mantissa, exponent)) => format!("{mantissa}.0E{exponent}"),
        None => scientific,
    }
}
