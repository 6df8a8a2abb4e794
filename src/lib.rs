//! Claimstream: streaming triple extraction for knowledge-base dumps
//!
//! Converts Wikibase-style XML dumps into line-oriented triple files and
//! aggregates property co-occurrence statistics over them. Dumps are parsed
//! as a stream, optionally sharded across worker threads, so memory use
//! stays flat no matter how large the input.

pub mod dump; // Streaming XML entity parsing
pub mod entity; // Entity and claim data model
pub mod pool; // Parallel dump parsing over worker threads
pub mod shard; // Entity-aligned byte sharding
pub mod source; // Plain or gzipped dump input
pub mod table; // Property correlation table
pub mod triples; // Triple file reading and writing

// Re-exports for convenience
pub use dump::{DumpError, EntityReader};
pub use entity::{Claim, Entity};
pub use pool::{ParallelReader, WorkerFailure};
pub use shard::ShardSplitter;
pub use source::DumpInput;
pub use table::{CorrelationTable, PropertyStats};
pub use triples::{FormatError, TripleFormat, TripleReader, TripleWriter};
