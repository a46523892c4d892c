//! Metadata for one physical raw image file.
//!
//! "One file" means different things per format: a GE P-file holds a
//! complete 4D acquisition, while a DICOM or legacy GE I-file holds a
//! single 2D slice that is assembled with its siblings at reconstruction
//! time. Either way, this type captures the header metadata of exactly one
//! file, already materialized to local uncompressed storage and read by
//! the header cascade in `mri-ingest`.

use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Sentinel stored when the GE binary header carries no participant id.
pub const RMR_NOT_FOUND: &str = "rmr not found";
/// Sentinel stored when the GE binary header carries no institution name.
pub const SOURCE_NOT_FOUND: &str = "source not found";

/// Classification of a raw file, derived from its filename pattern and a
/// successful header read. A file no reader can decode stays `Unknown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    /// Single-file GE binary format holding a complete 3D/4D acquisition.
    Pfile,
    /// Per-slice file with the standard DICOM tag dictionary.
    Dicom,
    /// Legacy single-slice GE raster format (`I.xxx` names).
    Geifile,
    Unknown,
}

impl FileType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pfile => "pfile",
            Self::Dicom => "dicom",
            Self::Geifile => "geifile",
            Self::Unknown => "unknown",
        }
    }
}

/// Identifier of the header reader that decoded a file.
///
/// Which readers are enabled for which file class is explicit
/// configuration on the ingest side; this enum only names them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HdrReader {
    /// External `rdgehdr` tool for GE binary headers (P-files, I-files).
    GeBinary,
    /// External `dicom_hdr` tool producing a flat text dump.
    DicomHdr,
    /// In-process structured DICOM dictionary decode.
    DicomDict,
}

impl HdrReader {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::GeBinary => "rdgehdr",
            Self::DicomHdr => "dicom_hdr",
            Self::DicomDict => "dicom_dict",
        }
    }
}

/// One entry of the full DICOM tag map: dictionary name (when known) and
/// the element's string-rendered value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagEntry {
    pub name: Option<String>,
    pub value: String,
}

/// Full DICOM tag map, keyed by `GGGG,EEEE` tag strings.
pub type TagHash = BTreeMap<String, TagEntry>;

/// Extracted metadata of one raw image file.
///
/// Constructed once from a local, uncompressed file by
/// `mri_ingest::read_raw_image_file` and immutable afterwards; the raw
/// header payload is discarded after extraction to bound memory use.
/// Every field the extractor tables mark optional is `Option`; a failed
/// optional extraction is recorded in [`warnings`](Self::warnings)
/// instead.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawImageFile {
    /// Basename of the file this metadata came from.
    pub filename: String,
    pub file_type: FileType,
    /// Which reader in the cascade decoded the header.
    pub hdr_reader: HdrReader,
    /// Acquisition date and time, combined from the header's separate
    /// date and time-of-day fields.
    pub timestamp: Option<NaiveDateTime>,
    /// Institution / scanner name, e.g. `Andys3T`.
    pub source: Option<String>,
    /// Participant identifier assigned at scan time.
    pub rmr_number: Option<String>,
    /// Scanner-defined study id / exam number.
    pub study_id: Option<String>,
    /// Free-text acquisition label from the scanner console.
    pub series_description: Option<String>,
    pub study_description: Option<String>,
    pub protocol_name: Option<String>,
    /// Scan tech initials.
    pub operator_name: Option<String>,
    /// Patient "name", usually a study id or enrollment number.
    pub patient_name: Option<String>,
    /// M or F.
    pub gender: Option<String>,
    /// Slices in the acquisition this file belongs to.
    pub num_slices: Option<u32>,
    /// Millimeters.
    pub slice_thickness: Option<f64>,
    /// Gap between slices, millimeters.
    pub slice_spacing: Option<f64>,
    /// Field of view, millimeters.
    pub reconstruction_diameter: Option<f64>,
    /// Voxels in x.
    pub acquisition_matrix_x: Option<u32>,
    /// Voxels in y.
    pub acquisition_matrix_y: Option<u32>,
    /// Time per bold repetition. The GE binary header reports
    /// microseconds and is normalized to seconds at extraction; the DICOM
    /// value is kept in the unit the header reports.
    pub rep_time: Option<f64>,
    /// Bold repetitions in a complete functional run.
    pub bold_reps: Option<u32>,
    pub dicom_series_uid: Option<String>,
    pub dicom_study_uid: Option<String>,
    /// Full tag map; only present for structured DICOM reads.
    pub dicom_taghash: Option<TagHash>,
    /// One human-readable line per optional field that could not be read.
    pub warnings: Vec<String>,
}

impl RawImageFile {
    /// Whether one of the header readers actually decoded this file.
    pub fn is_image(&self) -> bool {
        self.file_type != FileType::Unknown
    }

    pub fn is_pfile(&self) -> bool {
        self.file_type == FileType::Pfile
    }

    pub fn is_dicom(&self) -> bool {
        self.file_type == FileType::Dicom
    }

    pub fn is_geifile(&self) -> bool {
        self.file_type == FileType::Geifile
    }

    /// Participant id with the GE sentinel treated as missing.
    pub fn valid_rmr_number(&self) -> Option<&str> {
        match self.rmr_number.as_deref() {
            Some(RMR_NOT_FOUND) | None => None,
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_file() -> RawImageFile {
        RawImageFile {
            filename: "s03_bravo.0156".to_string(),
            file_type: FileType::Dicom,
            hdr_reader: HdrReader::DicomDict,
            timestamp: chrono::NaiveDate::from_ymd_opt(2006, 11, 30)
                .and_then(|d| d.and_hms_opt(10, 27, 10)),
            source: Some("Andys3T".to_string()),
            rmr_number: Some("RMR040414-1".to_string()),
            study_id: Some("5401".to_string()),
            series_description: Some("Ax FSPGR BRAVO T1".to_string()),
            study_description: None,
            protocol_name: None,
            operator_name: None,
            patient_name: None,
            gender: Some("N".to_string()),
            num_slices: Some(156),
            slice_thickness: Some(1.0),
            slice_spacing: Some(1.0),
            reconstruction_diameter: Some(256.0),
            acquisition_matrix_x: Some(256),
            acquisition_matrix_y: Some(256),
            rep_time: Some(8.132),
            bold_reps: None,
            dicom_series_uid: None,
            dicom_study_uid: None,
            dicom_taghash: None,
            warnings: Vec::new(),
        }
    }

    #[test]
    fn predicates_follow_file_type() {
        let file = minimal_file();
        assert!(file.is_image());
        assert!(file.is_dicom());
        assert!(!file.is_pfile());
        assert!(!file.is_geifile());
    }

    #[test]
    fn sentinel_rmr_is_not_valid() {
        let mut file = minimal_file();
        assert_eq!(file.valid_rmr_number(), Some("RMR040414-1"));
        file.rmr_number = Some(RMR_NOT_FOUND.to_string());
        assert_eq!(file.valid_rmr_number(), None);
    }

    #[test]
    fn serde_round_trip() {
        let file = minimal_file();
        let json = serde_json::to_string(&file).expect("serialize image file");
        let back: RawImageFile = serde_json::from_str(&json).expect("deserialize image file");
        assert_eq!(back.filename, file.filename);
        assert_eq!(back.file_type, file.file_type);
        assert_eq!(back.timestamp, file.timestamp);
        assert_eq!(back.rep_time, file.rep_time);
    }
}
