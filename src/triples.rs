//! Triple file reading and writing
//!
//! An entity stream serializes into one of two line formats. The flat
//! format repeats the entity id on every line:
//!
//! ```text
//! Q1,P31,wikibase-item,Q5
//! Q1,P21,wikibase-item,Q6581097
//! ```
//!
//! The grouped format writes one `=`-prefixed header per entity followed by
//! one line per claim, which drops the repeated id column:
//!
//! ```text
//! =Q1
//! P31,wikibase-item,Q5
//! P21,wikibase-item,Q6581097
//! ```
//!
//! The reader detects the format from the first non-blank line. Fields are
//! written without quoting or escaping, so a field containing the separator
//! will not read back correctly; pick a separator that cannot occur in the
//! data.

use crate::entity::{Claim, Entity};
use std::fs::File;
use std::io::{self, BufRead, BufReader, Lines, Write};
use std::path::Path;
use thiserror::Error;

/// Default field separator
pub const DEFAULT_SEPARATOR: char = ',';

/// Triple file layout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TripleFormat {
    /// One `id,property,datatype,value` line per claim
    #[default]
    Flat,
    /// `=id` header lines with `property,datatype,value` lines under them
    Grouped,
}

/// Error while reading a triple file
#[derive(Debug, Error)]
pub enum FormatError {
    /// A line split into the wrong number of fields
    #[error("Format error at line {line}: expected {expected} fields, found {found}")]
    FieldCount {
        line: usize,
        expected: usize,
        found: usize,
    },

    /// A grouped-format claim line appeared before any entity header
    #[error("Format error at line {line}: claim line before any entity header")]
    DataBeforeHeader { line: usize },

    /// I/O failure on the underlying stream
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Streaming writer for triple files
///
/// Entities are written as they arrive; nothing is buffered beyond the
/// sink's own buffering. In flat format a zero-claim entity produces no
/// output at all, while grouped format always writes its header line.
pub struct TripleWriter<W: Write> {
    sink: W,
    format: TripleFormat,
    separator: char,
}

impl<W: Write> TripleWriter<W> {
    /// Create a writer with the flat format and default separator
    pub fn new(sink: W) -> Self {
        Self {
            sink,
            format: TripleFormat::Flat,
            separator: DEFAULT_SEPARATOR,
        }
    }

    /// Set the output format
    pub fn with_format(mut self, format: TripleFormat) -> Self {
        self.format = format;
        self
    }

    /// Set the field separator
    pub fn with_separator(mut self, separator: char) -> Self {
        self.separator = separator;
        self
    }

    /// Write one entity's lines
    pub fn write_entity(&mut self, entity: &Entity) -> io::Result<()> {
        let sep = self.separator;
        match self.format {
            TripleFormat::Flat => {
                for claim in &entity.claims {
                    writeln!(
                        self.sink,
                        "{}{sep}{}{sep}{}{sep}{}",
                        entity.id, claim.property, claim.datatype, claim.value
                    )?;
                }
            }
            TripleFormat::Grouped => {
                writeln!(self.sink, "={}", entity.id)?;
                for claim in &entity.claims {
                    writeln!(
                        self.sink,
                        "{}{sep}{}{sep}{}",
                        claim.property, claim.datatype, claim.value
                    )?;
                }
            }
        }
        Ok(())
    }

    /// Flush the underlying sink
    pub fn flush(&mut self) -> io::Result<()> {
        self.sink.flush()
    }

    /// Return the underlying sink
    pub fn into_inner(self) -> W {
        self.sink
    }
}

/// Streaming reader for triple files in either format
///
/// The format is detected from the first non-blank line unless forced with
/// [`TripleReader::with_format`]. Flat-format lines that share an id merge
/// into one entity only while they are adjacent; if an id reappears later
/// it becomes a separate record. The first error ends the stream: after
/// yielding `Err` the iterator is fused.
pub struct TripleReader<R: BufRead> {
    lines: Lines<R>,
    separator: char,
    line_num: usize,
    format: Option<TripleFormat>,
    pending: Option<Entity>,
    done: bool,
}

impl TripleReader<BufReader<File>> {
    /// Create a reader from a file path
    pub fn from_path(path: impl AsRef<Path>) -> io::Result<Self> {
        let file = File::open(path)?;
        Ok(Self::new(BufReader::new(file)))
    }
}

impl TripleReader<BufReader<io::Cursor<String>>> {
    /// Create a reader from a string
    pub fn from_str(text: &str) -> Self {
        let cursor = io::Cursor::new(text.to_string());
        Self::new(BufReader::new(cursor))
    }
}

impl<R: BufRead> TripleReader<R> {
    /// Create a reader with the default separator
    pub fn new(input: R) -> Self {
        Self {
            lines: input.lines(),
            separator: DEFAULT_SEPARATOR,
            line_num: 0,
            format: None,
            pending: None,
            done: false,
        }
    }

    /// Set the field separator
    pub fn with_separator(mut self, separator: char) -> Self {
        self.separator = separator;
        self
    }

    /// Force the format instead of detecting it from the first line
    pub fn with_format(mut self, format: TripleFormat) -> Self {
        self.format = Some(format);
        self
    }

    fn next_record(&mut self) -> Result<Option<Entity>, FormatError> {
        loop {
            let line = match self.lines.next() {
                None => return Ok(self.pending.take()),
                Some(Err(e)) => return Err(FormatError::Io(e)),
                Some(Ok(line)) => {
                    self.line_num += 1;
                    line
                }
            };

            if line.is_empty() {
                continue;
            }

            // The first non-blank line decides the format for the file
            let format = match self.format {
                Some(format) => format,
                None => {
                    let format = if line.starts_with('=') {
                        TripleFormat::Grouped
                    } else {
                        TripleFormat::Flat
                    };
                    self.format = Some(format);
                    format
                }
            };

            match format {
                TripleFormat::Flat => {
                    let (id, claim) = self.parse_flat_line(&line)?;
                    match &mut self.pending {
                        Some(entity) if entity.id == id => entity.push(claim),
                        Some(_) => {
                            let finished =
                                self.pending.replace(Entity::with_claims(&id, vec![claim]));
                            return Ok(finished);
                        }
                        None => self.pending = Some(Entity::with_claims(&id, vec![claim])),
                    }
                }
                TripleFormat::Grouped => {
                    if let Some(id) = line.strip_prefix('=') {
                        if id.contains(self.separator) {
                            return Err(FormatError::FieldCount {
                                line: self.line_num,
                                expected: 1,
                                found: id.split(self.separator).count(),
                            });
                        }
                        let finished = self.pending.replace(Entity::new(id));
                        if finished.is_some() {
                            return Ok(finished);
                        }
                    } else {
                        let claim = self.parse_claim_line(&line)?;
                        match &mut self.pending {
                            Some(entity) => entity.push(claim),
                            None => {
                                return Err(FormatError::DataBeforeHeader {
                                    line: self.line_num,
                                });
                            }
                        }
                    }
                }
            }
        }
    }

    /// Parse a flat line: id, property, datatype, value
    fn parse_flat_line(&self, line: &str) -> Result<(String, Claim), FormatError> {
        let fields: Vec<&str> = line.split(self.separator).collect();
        if fields.len() != 4 {
            return Err(FormatError::FieldCount {
                line: self.line_num,
                expected: 4,
                found: fields.len(),
            });
        }
        Ok((
            fields[0].to_string(),
            Claim::new(fields[1], fields[2], fields[3]),
        ))
    }

    /// Parse a grouped claim line: property, datatype, value
    fn parse_claim_line(&self, line: &str) -> Result<Claim, FormatError> {
        let fields: Vec<&str> = line.split(self.separator).collect();
        if fields.len() != 3 {
            return Err(FormatError::FieldCount {
                line: self.line_num,
                expected: 3,
                found: fields.len(),
            });
        }
        Ok(Claim::new(fields[0], fields[1], fields[2]))
    }
}

impl<R: BufRead> Iterator for TripleReader<R> {
    type Item = Result<Entity, FormatError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.next_record() {
            Ok(Some(entity)) => Some(Ok(entity)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scenario() -> Vec<Entity> {
        vec![
            Entity::with_claims(
                "Q1",
                vec![
                    Claim::new("P31", "wikibase-item", "Q5"),
                    Claim::new("P21", "wikibase-item", "Q6581097"),
                ],
            ),
            Entity::with_claims("Q2", vec![Claim::new("P31", "wikibase-item", "Q5")]),
        ]
    }

    fn write_all(entities: &[Entity], format: TripleFormat) -> String {
        let mut writer = TripleWriter::new(Vec::new()).with_format(format);
        for entity in entities {
            writer.write_entity(entity).unwrap();
        }
        String::from_utf8(writer.into_inner()).unwrap()
    }

    fn read_all(text: &str) -> Vec<Entity> {
        TripleReader::from_str(text)
            .collect::<Result<Vec<_>, _>>()
            .unwrap()
    }

    // ===== Writer Tests =====

    #[test]
    fn test_write_flat() {
        let text = write_all(&scenario(), TripleFormat::Flat);

        assert_eq!(
            text,
            "Q1,P31,wikibase-item,Q5\n\
             Q1,P21,wikibase-item,Q6581097\n\
             Q2,P31,wikibase-item,Q5\n"
        );
    }

    #[test]
    fn test_write_grouped() {
        let text = write_all(&scenario(), TripleFormat::Grouped);

        assert_eq!(
            text,
            "=Q1\n\
             P31,wikibase-item,Q5\n\
             P21,wikibase-item,Q6581097\n\
             =Q2\n\
             P31,wikibase-item,Q5\n"
        );
    }

    #[test]
    fn test_write_flat_zero_claims_writes_nothing() {
        let text = write_all(&[Entity::new("Q1")], TripleFormat::Flat);
        assert_eq!(text, "");
    }

    #[test]
    fn test_write_grouped_zero_claims_writes_header() {
        let text = write_all(&[Entity::new("Q1")], TripleFormat::Grouped);
        assert_eq!(text, "=Q1\n");
    }

    #[test]
    fn test_write_custom_separator() {
        let entities = vec![Entity::with_claims(
            "Q1",
            vec![Claim::new("P1", "string", "a,b")],
        )];
        let mut writer = TripleWriter::new(Vec::new()).with_separator(';');
        for entity in &entities {
            writer.write_entity(entity).unwrap();
        }
        let text = String::from_utf8(writer.into_inner()).unwrap();

        assert_eq!(text, "Q1;P1;string;a,b\n");
    }

    // ===== Reader Tests =====

    #[test]
    fn test_read_flat() {
        let text = "Q1,P31,wikibase-item,Q5\n\
                    Q1,P21,wikibase-item,Q6581097\n\
                    Q2,P31,wikibase-item,Q5\n";

        assert_eq!(read_all(text), scenario());
    }

    #[test]
    fn test_read_grouped() {
        let text = "=Q1\n\
                    P31,wikibase-item,Q5\n\
                    P21,wikibase-item,Q6581097\n\
                    =Q2\n\
                    P31,wikibase-item,Q5\n";

        assert_eq!(read_all(text), scenario());
    }

    #[test]
    fn test_round_trip_flat() {
        let entities = scenario();
        let text = write_all(&entities, TripleFormat::Flat);

        assert_eq!(read_all(&text), entities);
    }

    #[test]
    fn test_round_trip_grouped_keeps_zero_claim_entities() {
        let mut entities = scenario();
        entities.insert(1, Entity::new("Q9"));
        let text = write_all(&entities, TripleFormat::Grouped);

        assert_eq!(read_all(&text), entities);
    }

    #[test]
    fn test_flat_same_id_merges_only_when_adjacent() {
        let text = "Q1,P1,string,a\n\
                    Q2,P1,string,b\n\
                    Q1,P2,string,c\n";

        let entities = read_all(text);

        assert_eq!(entities.len(), 3);
        assert_eq!(entities[0].id, "Q1");
        assert_eq!(entities[1].id, "Q2");
        assert_eq!(entities[2].id, "Q1");
        assert_eq!(entities[2].claims[0].property, "P2");
    }

    #[test]
    fn test_blank_lines_skipped() {
        let text = "\n\nQ1,P1,string,a\n\n\nQ1,P2,string,b\n\n";

        let entities = read_all(text);

        assert_eq!(entities.len(), 1);
        assert_eq!(entities[0].claims.len(), 2);
    }

    #[test]
    fn test_format_detected_after_leading_blanks() {
        let text = "\n\n=Q1\nP1,string,a\n";

        let entities = read_all(text);

        assert_eq!(entities.len(), 1);
        assert_eq!(entities[0].claims.len(), 1);
    }

    #[test]
    fn test_grouped_consecutive_headers() {
        let text = "=Q1\n=Q2\nP1,string,a\n=Q3\n";

        let entities = read_all(text);

        assert_eq!(entities.len(), 3);
        assert!(entities[0].claims.is_empty());
        assert_eq!(entities[1].claims.len(), 1);
        assert!(entities[2].claims.is_empty());
    }

    #[test]
    fn test_empty_header_id() {
        // A bare "=" is a header for the empty id
        let text = "=\nP1,string,a\n";

        let entities = read_all(text);

        assert_eq!(entities.len(), 1);
        assert_eq!(entities[0].id, "");
        assert_eq!(entities[0].claims.len(), 1);
    }

    #[test]
    fn test_custom_separator_round_trip() {
        let entities = vec![Entity::with_claims(
            "Q1",
            vec![Claim::new("P1", "string", "a,b")],
        )];
        let mut writer = TripleWriter::new(Vec::new()).with_separator(';');
        for entity in &entities {
            writer.write_entity(entity).unwrap();
        }
        let text = String::from_utf8(writer.into_inner()).unwrap();

        let read: Vec<_> = TripleReader::from_str(&text)
            .with_separator(';')
            .collect::<Result<Vec<_>, _>>()
            .unwrap();

        assert_eq!(read, entities);
    }

    #[test]
    fn test_empty_input() {
        assert!(read_all("").is_empty());
        assert!(read_all("\n\n\n").is_empty());
    }

    // ===== Error Tests =====

    #[test]
    fn test_flat_field_count_error() {
        let err = TripleReader::from_str("Q1,P1,string\n")
            .find_map(|r| r.err())
            .unwrap();

        match err {
            FormatError::FieldCount {
                line,
                expected,
                found,
            } => assert_eq!((line, expected, found), (1, 4, 3)),
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_flat_too_many_fields() {
        let err = TripleReader::from_str("Q1,P1,string,a,b\n")
            .find_map(|r| r.err())
            .unwrap();

        match err {
            FormatError::FieldCount { found: 5, .. } => {}
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_grouped_claim_field_count_error() {
        let err = TripleReader::from_str("=Q1\nP1,string\n")
            .find_map(|r| r.err())
            .unwrap();

        match err {
            FormatError::FieldCount {
                line,
                expected,
                found,
            } => assert_eq!((line, expected, found), (2, 3, 2)),
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_grouped_header_with_separator() {
        let err = TripleReader::from_str("\n=Q1,oops\n")
            .find_map(|r| r.err())
            .unwrap();

        match err {
            FormatError::FieldCount {
                line,
                expected,
                found,
            } => assert_eq!((line, expected, found), (2, 1, 2)),
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_claim_line_before_any_header() {
        // A grouped file whose header was lost; the format has to be
        // forced, since sniffing would read the line as flat.
        let err = TripleReader::from_str("P31,wikibase-item,Q5\n")
            .with_format(TripleFormat::Grouped)
            .find_map(|r| r.err())
            .unwrap();

        match err {
            FormatError::DataBeforeHeader { line } => assert_eq!(line, 1),
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_forced_flat_format() {
        // Forced flat, "=Q1" is a malformed data line rather than a header
        let err = TripleReader::from_str("=Q1\n")
            .with_format(TripleFormat::Flat)
            .find_map(|r| r.err())
            .unwrap();

        match err {
            FormatError::FieldCount {
                expected: 4,
                found: 1,
                ..
            } => {}
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_records_before_error_are_yielded() {
        let mut reader = TripleReader::from_str("Q1,P1,string,a\nQ2,P1,string,b\nQ2,bad\n");

        assert_eq!(reader.next().unwrap().unwrap().id, "Q1");
        assert!(reader.next().unwrap().is_err());
        assert!(reader.next().is_none());
    }

    #[test]
    fn test_from_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("triples.csv");
        std::fs::write(&path, "Q1,P31,wikibase-item,Q5\n").unwrap();

        let entities: Vec<_> = TripleReader::from_path(&path)
            .unwrap()
            .collect::<Result<Vec<_>, _>>()
            .unwrap();

        assert_eq!(entities.len(), 1);
        assert_eq!(entities[0].id, "Q1");
    }
}
