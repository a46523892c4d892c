//! Ingest side of the raw MRI catalog: local-copy materialization, the
//! header reader cascade, table-driven metadata extraction, and the
//! visit directory walker.

pub mod datetime;
pub mod extract;
pub mod import;
pub mod local_copy;
pub mod patterns;
pub mod readers;
pub mod walker;

pub use import::read_raw_image_file;
pub use local_copy::{materialize_into, with_local_copy, LocalCopy};
pub use readers::{HeaderPayload, HeaderReader, ReaderSet};
pub use walker::{walk, Candidate, CandidateClass, WalkOptions, MIN_PFILE_SIZE};
