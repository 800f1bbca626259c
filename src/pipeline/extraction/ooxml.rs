//! Shared plumbing for Office Open XML packages (DOCX, XLSX).
//!
//! A package is a zip archive of XML parts linked by `.rels` relationship
//! parts. Only the pieces both extractors need live here: opening the
//! archive, reading parts as UTF-8 with a size guard, resolving relationship
//! targets, and attribute lookup on `quick-xml` start tags.

use std::collections::HashMap;
use std::io::{Cursor, Read};

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use zip::result::ZipError;
use zip::ZipArchive;

use super::format::DocumentFormat;
use super::ExtractionError;

/// Largest uncompressed part we will inflate.
pub const MAX_PART_SIZE: u64 = 128 * 1024 * 1024;

const OFFICE_DOCUMENT_REL: &str = "/officeDocument";

/// An opened OOXML package. Errors carry the package's format.
pub struct Package<'a> {
    archive: ZipArchive<Cursor<&'a [u8]>>,
    format: DocumentFormat,
}

impl<'a> Package<'a> {
    pub fn open(bytes: &'a [u8], format: DocumentFormat) -> Result<Self, ExtractionError> {
        let archive = ZipArchive::new(Cursor::new(bytes))
            .map_err(|e| ExtractionError::malformed(format, format!("not a zip package: {e}")))?;
        Ok(Self { archive, format })
    }

    /// Read a part that must exist.
    pub fn read_part(&mut self, name: &str) -> Result<String, ExtractionError> {
        self.read_optional_part(name)?
            .ok_or_else(|| ExtractionError::malformed(self.format, format!("missing part {name}")))
    }

    /// Read a part, or `None` when the package does not contain it.
    /// Part names are matched case-insensitively, as OPC requires.
    pub fn read_optional_part(&mut self, name: &str) -> Result<Option<String>, ExtractionError> {
        let format = self.format;
        let Some(stored_name) = self.stored_name(name) else {
            return Ok(None);
        };

        let file = match self.archive.by_name(&stored_name) {
            Ok(file) => file,
            Err(ZipError::FileNotFound) => return Ok(None),
            Err(e) => {
                return Err(ExtractionError::malformed(
                    format,
                    format!("cannot open part {name}: {e}"),
                ))
            }
        };

        if file.size() > MAX_PART_SIZE {
            return Err(ExtractionError::malformed(
                format,
                format!("part {name} exceeds {MAX_PART_SIZE} bytes"),
            ));
        }

        let mut content = String::with_capacity(file.size() as usize);
        file.take(MAX_PART_SIZE)
            .read_to_string(&mut content)
            .map_err(|e| ExtractionError::malformed(format, format!("cannot read part {name}: {e}")))?;

        tracing::debug!(part = name, size = content.len(), "Read package part");
        Ok(Some(content))
    }

    fn stored_name(&self, name: &str) -> Option<String> {
        if self.archive.index_for_name(name).is_some() {
            return Some(name.to_string());
        }
        self.archive
            .file_names()
            .find(|candidate| candidate.eq_ignore_ascii_case(name))
            .map(str::to_string)
    }

    /// Locate the main document part through the package relationships,
    /// falling back to the conventional path when `_rels/.rels` is absent.
    pub fn main_part(&mut self, conventional: &str) -> Result<String, ExtractionError> {
        let rels = self.relationships("")?;
        let main = rels
            .into_values()
            .find(|rel| rel.rel_type.ends_with(OFFICE_DOCUMENT_REL))
            .map(|rel| rel.target)
            .unwrap_or_else(|| conventional.to_string());
        Ok(main)
    }

    /// Relationships declared by `part` (use `""` for the package root),
    /// keyed by relationship id with targets resolved to part names.
    /// External targets are skipped.
    pub fn relationships(
        &mut self,
        part: &str,
    ) -> Result<HashMap<String, Relationship>, ExtractionError> {
        let rels_name = rels_part_name(part);
        let Some(xml) = self.read_optional_part(&rels_name)? else {
            return Ok(HashMap::new());
        };

        let format = self.format;
        let mut reader = Reader::from_str(&xml);
        let mut buf = Vec::new();
        let mut rels = HashMap::new();

        loop {
            match reader.read_event_into(&mut buf) {
                Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e))
                    if e.local_name().as_ref() == b"Relationship" =>
                {
                    let id = attr(e, b"Id", format)?;
                    let target = attr(e, b"Target", format)?;
                    let external = attr(e, b"TargetMode", format)?
                        .is_some_and(|mode| mode.eq_ignore_ascii_case("External"));

                    if let (Some(id), Some(target), false) = (id, target, external) {
                        rels.insert(
                            id,
                            Relationship {
                                rel_type: attr(e, b"Type", format)?.unwrap_or_default(),
                                target: resolve_target(part, &target),
                            },
                        );
                    }
                }
                Ok(Event::Eof) => break,
                Err(e) => return Err(xml_error(format, &rels_name, e)),
                _ => {}
            }
            buf.clear();
        }

        Ok(rels)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relationship {
    pub rel_type: String,
    pub target: String,
}

/// `xl/workbook.xml` -> `xl/_rels/workbook.xml.rels`; `""` -> `_rels/.rels`.
pub fn rels_part_name(part: &str) -> String {
    match part.rsplit_once('/') {
        Some((dir, file)) => format!("{dir}/_rels/{file}.rels"),
        None => format!("_rels/{part}.rels"),
    }
}

/// Resolve a relationship target against the part that declared it.
pub fn resolve_target(source_part: &str, target: &str) -> String {
    if let Some(absolute) = target.strip_prefix('/') {
        return normalize(absolute);
    }
    match source_part.rsplit_once('/') {
        Some((dir, _)) => normalize(&format!("{dir}/{target}")),
        None => normalize(target),
    }
}

fn normalize(path: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }
    segments.join("/")
}

/// Unescaped value of the attribute with the given local name.
pub fn attr(
    element: &BytesStart<'_>,
    local_name: &[u8],
    format: DocumentFormat,
) -> Result<Option<String>, ExtractionError> {
    for attribute in element.attributes() {
        let attribute = attribute
            .map_err(|e| ExtractionError::malformed(format, format!("bad attribute: {e}")))?;
        if attribute.key.local_name().as_ref() == local_name {
            let value = attribute
                .unescape_value()
                .map_err(|e| ExtractionError::malformed(format, format!("bad attribute value: {e}")))?;
            return Ok(Some(value.into_owned()));
        }
    }
    Ok(None)
}

pub fn xml_error(format: DocumentFormat, part: &str, e: quick_xml::Error) -> ExtractionError {
    ExtractionError::malformed(format, format!("invalid XML in {part}: {e}"))
}
