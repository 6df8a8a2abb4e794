//! Entity-aligned byte sharding
//!
//! Cuts a raw dump stream into chunks that never split an entity element,
//! so each chunk parses on its own. A split point is an occurrence of
//! `<entity` followed by whitespace, `>` or `/`; checking the following
//! byte keeps a longer tag name sharing the prefix from being mistaken
//! for a record.
//!
//! Shards are cut at the first boundary at or past the target size, so an
//! entity larger than the target simply produces an oversized shard.

use memchr::memmem::Finder;
use std::io::{self, Read};

/// Default shard payload target
pub const DEFAULT_SHARD_BYTES: usize = 4 * 1024 * 1024;

/// Bytes requested from the input per read
const READ_CHUNK: usize = 64 * 1024;

const BOUNDARY: &[u8] = b"<entity";

/// Iterator over entity-aligned byte shards of a dump stream
pub struct ShardSplitter<R: Read> {
    input: R,
    /// Bytes from the last read that belong to the next shard
    carry: Vec<u8>,
    target: usize,
    finder: Finder<'static>,
    eof: bool,
    done: bool,
}

impl<R: Read> ShardSplitter<R> {
    /// Create a splitter with the default shard target
    pub fn new(input: R) -> Self {
        Self::with_target_bytes(input, DEFAULT_SHARD_BYTES)
    }

    /// Create a splitter cutting shards at the first entity boundary at or
    /// past `target` bytes
    pub fn with_target_bytes(input: R, target: usize) -> Self {
        Self {
            input,
            carry: Vec::new(),
            target: target.max(1),
            finder: Finder::new(BOUNDARY),
            eof: false,
            done: false,
        }
    }

    /// Read until `buf` holds `goal` bytes or the input is exhausted
    fn fill_to(&mut self, buf: &mut Vec<u8>, goal: usize) -> io::Result<()> {
        while !self.eof && buf.len() < goal {
            let start = buf.len();
            buf.resize(start + READ_CHUNK, 0);
            match self.input.read(&mut buf[start..]) {
                Ok(0) => {
                    buf.truncate(start);
                    self.eof = true;
                }
                Ok(n) => buf.truncate(start + n),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => buf.truncate(start),
                Err(e) => {
                    buf.truncate(start);
                    return Err(e);
                }
            }
        }
        Ok(())
    }

    /// Find a confirmed entity boundary at or after `from`. A match whose
    /// confirming byte is past the end of `buf` does not count; the caller
    /// reads more and retries.
    fn boundary_after(&self, buf: &[u8], from: usize) -> Option<usize> {
        let mut search = from.min(buf.len());
        while let Some(rel) = self.finder.find(&buf[search..]) {
            let pos = search + rel;
            let after = pos + BOUNDARY.len();
            if after >= buf.len() {
                return None;
            }
            match buf[after] {
                b' ' | b'\t' | b'\r' | b'\n' | b'>' | b'/' => return Some(pos),
                _ => search = pos + 1,
            }
        }
        None
    }

    fn next_shard(&mut self) -> io::Result<Option<Vec<u8>>> {
        if self.done {
            return Ok(None);
        }
        let mut buf = std::mem::take(&mut self.carry);
        let mut goal = self.target;
        let mut search_from = self.target;

        loop {
            self.fill_to(&mut buf, goal)?;
            if let Some(pos) = self.boundary_after(&buf, search_from) {
                self.carry = buf.split_off(pos);
                return Ok(Some(buf));
            }
            if self.eof {
                self.done = true;
                return Ok(if buf.is_empty() { None } else { Some(buf) });
            }
            // Undecided candidates can only start within the last pattern
            // length of the buffer, so resume the search there.
            search_from = buf.len().saturating_sub(BOUNDARY.len()).max(self.target);
            goal = buf.len() + READ_CHUNK;
        }
    }
}

impl<R: Read> Iterator for ShardSplitter<R> {
    type Item = io::Result<Vec<u8>>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.next_shard() {
            Ok(Some(shard)) => Some(Ok(shard)),
            Ok(None) => None,
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}
