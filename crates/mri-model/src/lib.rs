//! Value objects shared by the raw MRI visit inventory engine.
//!
//! This crate defines what the scanner found — files, datasets, and the
//! classified error taxonomy — while `mri-ingest` defines how it is
//! found and `mri-visit` assembles whole visits.

pub mod dataset;
pub mod error;
pub mod image_file;
pub mod modality;
pub mod text;

pub use dataset::RawImageDataset;
pub use error::{MriError, Result};
pub use image_file::{
    FileType, HdrReader, RMR_NOT_FOUND, RawImageFile, SOURCE_NOT_FOUND, TagEntry, TagHash,
};
pub use modality::Modality;
pub use text::escape_filename;
