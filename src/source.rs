//! Dump input selection
//!
//! Opens a dump file as a plain byte stream or with transparent gzip
//! decompression, chosen by filename suffix. Everything downstream sees a
//! `BufRead` and stays decompression-agnostic.

use flate2::bufread::MultiGzDecoder;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Read};
use std::path::Path;

/// Read buffer capacity; dumps are large and strictly sequential.
const BUFFER_CAPACITY: usize = 1024 * 1024; // 1MB buffer

/// Byte source for a dump file
pub enum DumpInput {
    /// Uncompressed XML
    Plain(BufReader<File>),
    /// Gzip-compressed XML (concatenated gzip members are handled)
    Gzip(BufReader<MultiGzDecoder<BufReader<File>>>),
}

impl DumpInput {
    /// Open a dump file, enabling gzip decompression when the name ends
    /// in `.gz`
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)?;
        let is_gz = path.extension().map(|e| e == "gz").unwrap_or(false);

        Ok(if is_gz {
            let decoder = MultiGzDecoder::new(BufReader::with_capacity(BUFFER_CAPACITY, file));
            DumpInput::Gzip(BufReader::with_capacity(BUFFER_CAPACITY, decoder))
        } else {
            DumpInput::Plain(BufReader::with_capacity(BUFFER_CAPACITY, file))
        })
    }
}

impl Read for DumpInput {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            DumpInput::Plain(reader) => reader.read(buf),
            DumpInput::Gzip(reader) => reader.read(buf),
        }
    }
}

impl BufRead for DumpInput {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        match self {
            DumpInput::Plain(reader) => reader.fill_buf(),
            DumpInput::Gzip(reader) => reader.fill_buf(),
        }
    }

    fn consume(&mut self, amt: usize) {
        match self {
            DumpInput::Plain(reader) => reader.consume(amt),
            DumpInput::Gzip(reader) => reader.consume(amt),
        }
    }
}
