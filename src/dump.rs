//! Streaming XML dump parsing
//!
//! Parses knowledge-base dump XML into entities without building a document
//! tree. The dump layout is one `<entity id="...">` element per record, each
//! holding `<claim property="..." datatype="..." value="..."/>` children,
//! usually wrapped in a single `<entities>` container:
//!
//! ```xml
//! <entities>
//!   <entity id="Q1">
//!     <claim property="P31" datatype="wikibase-item" value="Q5"/>
//!   </entity>
//! </entities>
//! ```
//!
//! The reader also accepts fragments cut out of a larger document, so shards
//! produced by [`crate::shard::ShardSplitter`] parse without the container
//! tags around them. Validation stays at the record boundary: unknown
//! elements are skipped, but a missing identifier, a claim outside an
//! entity, or an entity that never closes is an error.

use crate::entity::{Claim, Entity};
use crate::source::DumpInput;
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use std::io::{self, BufRead};
use std::path::Path;
use thiserror::Error;

/// Error while reading a dump
#[derive(Debug, Error)]
pub enum DumpError {
    /// Structurally invalid dump content
    #[error("Parse error at byte {offset}: {message}")]
    Parse { offset: u64, message: String },

    /// The stream ended while an entity element was still open
    #[error("Truncated input: stream ended inside entity {entity}")]
    Truncated { entity: String },

    /// The XML reader rejected the input
    #[error("XML error at byte {offset}: {source}")]
    Xml {
        offset: u64,
        #[source]
        source: quick_xml::Error,
    },

    /// I/O failure on the underlying stream
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Streaming reader that iterates over the entities of a dump
///
/// Memory use is bounded by the largest single entity, not the dump size.
/// The first error ends the stream: after yielding `Err` the iterator is
/// fused and returns `None`.
pub struct EntityReader<R: BufRead> {
    reader: Reader<R>,
    buf: Vec<u8>,
    current: Option<Entity>,
    done: bool,
}

impl EntityReader<DumpInput> {
    /// Open a dump file, decompressing gzip by filename suffix
    pub fn from_path(path: impl AsRef<Path>) -> io::Result<Self> {
        Ok(Self::new(DumpInput::open(path)?))
    }
}

impl<R: BufRead> EntityReader<R> {
    /// Create a reader over raw XML
    pub fn new(input: R) -> Self {
        let mut reader = Reader::from_reader(input);
        // Shards carry unbalanced container tags, so tag matching is left
        // to the entity-level state machine below.
        reader.config_mut().check_end_names = false;
        reader.config_mut().allow_unmatched_ends = true;
        Self {
            reader,
            buf: Vec::with_capacity(8192),
            current: None,
            done: false,
        }
    }

    fn next_entity(&mut self) -> Result<Option<Entity>, DumpError> {
        loop {
            self.buf.clear();
            match self.reader.read_event_into(&mut self.buf) {
                Ok(Event::Start(e)) if e.name().as_ref() == b"entity" => {
                    let offset = self.reader.buffer_position();
                    if let Some(open) = &self.current {
                        return Err(nested_entity(open, offset));
                    }
                    let id = required_attr(&e, "id", "entity", offset)?;
                    self.current = Some(Entity::new(&id));
                }
                Ok(Event::Empty(e)) if e.name().as_ref() == b"entity" => {
                    let offset = self.reader.buffer_position();
                    if let Some(open) = &self.current {
                        return Err(nested_entity(open, offset));
                    }
                    // Self-closing entity: a record with no claims
                    let id = required_attr(&e, "id", "entity", offset)?;
                    return Ok(Some(Entity::new(&id)));
                }
                Ok(Event::Start(e)) | Ok(Event::Empty(e)) if e.name().as_ref() == b"claim" => {
                    let offset = self.reader.buffer_position();
                    let claim = parse_claim(&e, offset)?;
                    match &mut self.current {
                        Some(entity) => entity.push(claim),
                        None => {
                            return Err(DumpError::Parse {
                                offset,
                                message: "claim element outside an entity".to_string(),
                            });
                        }
                    }
                }
                Ok(Event::End(e)) if e.name().as_ref() == b"entity" => match self.current.take() {
                    Some(entity) => return Ok(Some(entity)),
                    None => {
                        return Err(DumpError::Parse {
                            offset: self.reader.buffer_position(),
                            message: "entity close tag without a matching open tag".to_string(),
                        });
                    }
                },
                Ok(Event::Eof) => {
                    if let Some(entity) = self.current.take() {
                        return Err(DumpError::Truncated { entity: entity.id });
                    }
                    return Ok(None);
                }
                // Container tags, text, comments, declarations
                Ok(_) => {}
                Err(source) => {
                    return Err(DumpError::Xml {
                        offset: self.reader.buffer_position(),
                        source,
                    });
                }
            }
        }
    }
}

impl<R: BufRead> Iterator for EntityReader<R> {
    type Item = Result<Entity, DumpError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.next_entity() {
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

fn nested_entity(open: &Entity, offset: u64) -> DumpError {
    DumpError::Parse {
        offset,
        message: format!("entity element opened inside entity {}", open.id),
    }
}

/// Extract an attribute value, unescaped, from a start tag
fn attr_value(
    e: &BytesStart,
    name: &str,
    offset: u64,
) -> Result<Option<String>, DumpError> {
    for attr in e.attributes() {
        let attr = attr.map_err(|err| DumpError::Parse {
            offset,
            message: format!("malformed attribute: {}", err),
        })?;
        if attr.key.as_ref() == name.as_bytes() {
            let value = attr.unescape_value().map_err(|err| DumpError::Parse {
                offset,
                message: format!("bad value for attribute {}: {}", name, err),
            })?;
            return Ok(Some(value.into_owned()));
        }
    }
    Ok(None)
}

fn required_attr(
    e: &BytesStart,
    name: &str,
    element: &str,
    offset: u64,
) -> Result<String, DumpError> {
    attr_value(e, name, offset)?.ok_or_else(|| DumpError::Parse {
        offset,
        message: format!("{} element missing {} attribute", element, name),
    })
}

fn parse_claim(e: &BytesStart, offset: u64) -> Result<Claim, DumpError> {
    let property = required_attr(e, "property", "claim", offset)?;
    let datatype = required_attr(e, "datatype", "claim", offset)?;
    let value = required_attr(e, "value", "claim", offset)?;
    Ok(Claim {
        property,
        datatype,
        value,
    })
}
