//! The header reader cascade.
//!
//! Given a candidate path, an ordered list of format-specific readers is
//! tried until one yields header data that satisfies the acceptance
//! heuristic. Dispatch between the GE binary branch and the DICOM branch
//! is filename-driven; within a branch the order is fixed and the cascade
//! stops at the first acceptance.
//!
//! Which readers are enabled per branch is explicit configuration on
//! [`ReaderSet`] rather than something inferred from the build host, so
//! a deployment can disable a reader that is broken for newer file
//! revisions without touching the cascade logic.

use std::path::Path;
use std::process::Command;

use dicom::core::dictionary::DataDictionary;
use dicom::core::value::Value;
use dicom::dictionary_std::StandardDataDictionary;
use dicom::object::open_file;
use tracing::debug;

use mri_model::error::{MriError, Result};
use mri_model::{HdrReader, TagEntry, TagHash};

use crate::patterns::is_ge_binary_name;

/// Text header dumps shorter than this are treated as tool failure
/// chatter rather than a real header.
pub const MIN_HDR_LENGTH: usize = 400;

/// Raw header data produced by one reader.
#[derive(Debug, Clone)]
pub enum HeaderPayload {
    /// Flat key/value text dump from an external tool.
    Text(String),
    /// Structured tag map from the in-process DICOM decode, keyed by
    /// `GGGG,EEEE` tag strings.
    Dicom(TagHash),
}

/// One strategy in the cascade.
pub trait HeaderReader: Send + Sync {
    /// Identifier recorded on files this reader decodes.
    fn id(&self) -> HdrReader;

    /// Tries to read the header; any error means "not accepted" and the
    /// cascade moves on to the next reader.
    fn attempt(&self, path: &Path) -> Result<HeaderPayload>;
}

/// Acceptance heuristic for text dumps: non-empty, no embedded error
/// marker, and longer than [`MIN_HDR_LENGTH`]. Header tools tend to exit
/// zero while printing a terse failure message; the length floor guards
/// against mistaking that for a header.
pub fn accept_text(output: &str) -> bool {
    let trimmed = output.trim_end();
    !trimmed.is_empty() && !output.contains("ERROR") && output.len() > MIN_HDR_LENGTH
}

fn run_tool(tool: &str, path: &Path) -> Result<String> {
    let output = Command::new(tool)
        .arg(path)
        .stderr(std::process::Stdio::null())
        .output()
        .map_err(|e| MriError::io(path, e))?;
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

fn rejected(path: &Path) -> MriError {
    MriError::UnreadableHeader {
        filename: path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default(),
    }
}

/// External `rdgehdr` dump of GE binary headers.
#[derive(Debug, Default)]
pub struct GeBinaryReader;

impl HeaderReader for GeBinaryReader {
    fn id(&self) -> HdrReader {
        HdrReader::GeBinary
    }

    fn attempt(&self, path: &Path) -> Result<HeaderPayload> {
        let output = run_tool("rdgehdr", path)?;
        if accept_text(&output) {
            Ok(HeaderPayload::Text(output))
        } else {
            Err(rejected(path))
        }
    }
}

/// External `dicom_hdr` flat-text dump, the fallback for DICOM files the
/// structured decoder cannot parse.
#[derive(Debug, Default)]
pub struct DicomHdrReader;

impl HeaderReader for DicomHdrReader {
    fn id(&self) -> HdrReader {
        HdrReader::DicomHdr
    }

    fn attempt(&self, path: &Path) -> Result<HeaderPayload> {
        let output = run_tool("dicom_hdr", path)?;
        if accept_text(&output) {
            Ok(HeaderPayload::Text(output))
        } else {
            Err(rejected(path))
        }
    }
}

/// In-process structured DICOM decode.
///
/// Parses the file with the `dicom` crate and renders every primitive
/// element into the tag map. Pixel data is skipped to bound memory use.
#[derive(Debug, Default)]
pub struct DicomDictReader;

impl HeaderReader for DicomDictReader {
    fn id(&self) -> HdrReader {
        HdrReader::DicomDict
    }

    fn attempt(&self, path: &Path) -> Result<HeaderPayload> {
        let object = open_file(path).map_err(|error| {
            debug!(path = %path.display(), %error, "structured dicom decode failed");
            rejected(path)
        })?;

        let mut tags = TagHash::new();
        for element in object.iter() {
            let tag = element.header().tag;
            // Pixel data would dominate the map and is never metadata.
            if tag.group() == 0x7FE0 {
                continue;
            }
            let value = match element.value() {
                Value::Primitive(primitive) => primitive.to_string().trim().to_string(),
                _ => continue,
            };
            let name = StandardDataDictionary
                .by_tag(tag)
                .map(|entry| entry.alias.to_string());
            tags.insert(
                format!("{:04X},{:04X}", tag.group(), tag.element()),
                TagEntry { name, value },
            );
        }
        if tags.is_empty() {
            return Err(rejected(path));
        }
        Ok(HeaderPayload::Dicom(tags))
    }
}

/// The configured cascade: one ordered reader list per filename branch.
pub struct ReaderSet {
    /// Readers offered to P-file / I-file names.
    pub ge_binary: Vec<Box<dyn HeaderReader>>,
    /// Readers offered to everything else, in order.
    pub dicom: Vec<Box<dyn HeaderReader>>,
}

impl Default for ReaderSet {
    fn default() -> Self {
        Self {
            ge_binary: vec![Box::new(GeBinaryReader)],
            dicom: vec![Box::new(DicomDictReader), Box::new(DicomHdrReader)],
        }
    }
}

impl std::fmt::Debug for ReaderSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReaderSet")
            .field(
                "ge_binary",
                &self.ge_binary.iter().map(|r| r.id()).collect::<Vec<_>>(),
            )
            .field(
                "dicom",
                &self.dicom.iter().map(|r| r.id()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl ReaderSet {
    /// Reads the header of `path` with the branch's readers in order,
    /// returning the first accepted payload and the reader that produced
    /// it, or [`MriError::UnreadableHeader`] when the branch is
    /// exhausted.
    pub fn read(&self, path: &Path) -> Result<(HeaderPayload, HdrReader)> {
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let branch = if is_ge_binary_name(&filename) {
            &self.ge_binary
        } else {
            &self.dicom
        };
        for reader in branch {
            match reader.attempt(path) {
                Ok(payload) => return Ok((payload, reader.id())),
                Err(error) => {
                    debug!(file = %filename, reader = reader.id().as_str(), %error,
                        "header reader rejected file");
                }
            }
        }
        Err(MriError::UnreadableHeader { filename })
    }
}
