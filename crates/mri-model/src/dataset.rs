//! One logical 3D/4D acquisition assembled from raw image files.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use chrono::NaiveDateTime;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{MriError, Result};
use crate::image_file::{RawImageFile, TagHash};

/// Ordered glob policy: the first pattern matching the scanned file's
/// name decides the wildcard handed to the reconstruction tool.
static GLOB_RULES: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    [
        (r"^E.*dcm$", "E*.dcm"),
        (r"\.dcm$", "*.dcm"),
        (r"^I\.", "I.*"),
        (r"^I", "I*.dcm"),
        (r".*\.\d{3,4}", "*.[0-9]*"),
        (r"\.0", "*.0*"),
    ]
    .into_iter()
    .map(|(pattern, glob)| (Regex::new(pattern).expect("valid glob rule"), glob))
    .collect()
});

/// A single 3D or 4D acquisition: a volume or a time series of volumes.
///
/// Owns the [`RawImageFile`]s it was built from. For DICOM series the
/// default walk policy materializes only one representative slice per
/// directory, so the collection usually holds exactly one file; the API
/// accepts several for completeness.
///
/// Construction derives every dataset-level field eagerly and fails with
/// [`MriError::InvalidComposition`] when the collection is empty or a
/// required field cannot be derived. DICOM-specific descriptive fields
/// that are absent are recorded in [`read_errors`](Self::read_errors)
/// rather than failing the dataset, so acquisitions read through the
/// flat-text fallback reader still catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawImageDataset {
    /// Absolute path of the original (not materialized) directory the
    /// files came from.
    directory: PathBuf,
    raw_image_files: Vec<RawImageFile>,
    series_description: String,
    rmr_number: String,
    /// Earliest timestamp across the member files.
    timestamp: NaiveDateTime,
    study_id: Option<String>,
    /// Stable natural key used for dedup/upsert by catalog consumers.
    dataset_key: String,
    /// Basename of the representative file that was actually read.
    scanned_file: String,
    scanner_source: String,
    study_description: Option<String>,
    protocol_name: Option<String>,
    operator_name: Option<String>,
    patient_name: Option<String>,
    dicom_series_uid: Option<String>,
    dicom_study_uid: Option<String>,
    read_errors: Vec<String>,
}

impl RawImageDataset {
    /// Builds a dataset from the original directory and its member files.
    pub fn new(directory: impl AsRef<Path>, raw_image_files: Vec<RawImageFile>) -> Result<Self> {
        let directory = directory.as_ref();
        if !directory.is_dir() {
            return Err(MriError::NotFound {
                path: directory.to_path_buf(),
            });
        }
        let directory = directory
            .canonicalize()
            .map_err(|e| MriError::io(directory, e))?;

        if raw_image_files.is_empty() {
            return Err(MriError::InvalidComposition(format!(
                "no raw image files supplied for {}",
                directory.display()
            )));
        }

        let mut read_errors = Vec::new();
        let first = &raw_image_files[0];

        let series_description = required_field(
            first.series_description.clone(),
            "no series description found",
            &mut read_errors,
        )?;
        let rmr_number =
            required_field(first.rmr_number.clone(), "no rmr found", &mut read_errors)?;
        let scanner_source = required_field(
            first.source.clone(),
            "no scanner source found",
            &mut read_errors,
        )?;
        let timestamp = raw_image_files
            .iter()
            .filter_map(|f| f.timestamp)
            .min()
            .ok_or_else(|| {
                read_errors.push("no timestamp found".to_string());
                MriError::InvalidComposition("no timestamp found".to_string())
            })?;
        let scanned_file = first.filename.clone();

        let is_dicom = first.is_dicom();
        let study_description =
            dicom_field(first.study_description.clone(), is_dicom, "study description", &mut read_errors);
        let protocol_name =
            dicom_field(first.protocol_name.clone(), is_dicom, "protocol name", &mut read_errors);
        let operator_name =
            dicom_field(first.operator_name.clone(), is_dicom, "operator name", &mut read_errors);
        let patient_name =
            dicom_field(first.patient_name.clone(), is_dicom, "patient name", &mut read_errors);
        let dicom_series_uid =
            dicom_field(first.dicom_series_uid.clone(), is_dicom, "dicom series uid", &mut read_errors);
        let dicom_study_uid =
            dicom_field(first.dicom_study_uid.clone(), is_dicom, "dicom study uid", &mut read_errors);
        if is_dicom && first.dicom_taghash.is_none() {
            read_errors.push("couldn't find dicom taghash".to_string());
        }

        let dataset_key = format!("{rmr_number}::{timestamp}");

        Ok(Self {
            directory,
            series_description,
            rmr_number,
            timestamp,
            study_id: first.study_id.clone(),
            dataset_key,
            scanned_file,
            scanner_source,
            study_description,
            protocol_name,
            operator_name,
            patient_name,
            dicom_series_uid,
            dicom_study_uid,
            read_errors,
            raw_image_files,
        })
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn raw_image_files(&self) -> &[RawImageFile] {
        &self.raw_image_files
    }

    pub fn series_description(&self) -> &str {
        &self.series_description
    }

    pub fn rmr_number(&self) -> &str {
        &self.rmr_number
    }

    pub fn timestamp(&self) -> NaiveDateTime {
        self.timestamp
    }

    /// Scanner-defined study id / exam number, when the header had one.
    pub fn study_id(&self) -> Option<&str> {
        self.study_id.as_deref()
    }

    pub fn dataset_key(&self) -> &str {
        &self.dataset_key
    }

    pub fn scanned_file(&self) -> &str {
        &self.scanned_file
    }

    pub fn scanner_source(&self) -> &str {
        &self.scanner_source
    }

    pub fn study_description(&self) -> Option<&str> {
        self.study_description.as_deref()
    }

    pub fn protocol_name(&self) -> Option<&str> {
        self.protocol_name.as_deref()
    }

    pub fn operator_name(&self) -> Option<&str> {
        self.operator_name.as_deref()
    }

    pub fn patient_name(&self) -> Option<&str> {
        self.patient_name.as_deref()
    }

    pub fn dicom_series_uid(&self) -> Option<&str> {
        self.dicom_series_uid.as_deref()
    }

    pub fn dicom_study_uid(&self) -> Option<&str> {
        self.dicom_study_uid.as_deref()
    }

    pub fn dicom_taghash(&self) -> Option<&TagHash> {
        self.raw_image_files[0].dicom_taghash.as_ref()
    }

    /// Messages for DICOM descriptive fields that could not be derived.
    pub fn read_errors(&self) -> &[String] {
        &self.read_errors
    }

    pub fn is_dicom(&self) -> bool {
        self.raw_image_files[0].is_dicom()
    }

    pub fn is_pfile(&self) -> bool {
        self.raw_image_files[0].is_pfile()
    }

    pub fn is_geifile(&self) -> bool {
        self.raw_image_files[0].is_geifile()
    }

    /// Shell wildcard selecting this dataset's member files for external
    /// reconstruction, or `None` when reconstruction must be driven by an
    /// enumerated file list (always the case for P-files).
    pub fn glob(&self) -> Option<&'static str> {
        GLOB_RULES
            .iter()
            .find(|(pattern, _)| pattern.is_match(&self.scanned_file))
            .map(|(_, glob)| *glob)
    }

    /// Number of files composing this dataset on disk: the non-hidden
    /// directory entries for slice-per-file formats, 1 for P-files.
    pub fn file_count(&self) -> Result<usize> {
        if self.is_pfile() {
            return Ok(1);
        }
        if !(self.is_dicom() || self.is_geifile()) {
            return Err(MriError::InvalidComposition(format!(
                "{} is not recognized as dicom, geifile, or pfile",
                self.scanned_file
            )));
        }
        let entries = std::fs::read_dir(&self.directory)
            .map_err(|e| MriError::io(&self.directory, e))?;
        let mut count = 0;
        for entry in entries {
            let entry = entry.map_err(|e| MriError::io(&self.directory, e))?;
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if name.starts_with('.') || name.ends_with(".yaml") {
                continue;
            }
            count += 1;
        }
        Ok(count)
    }

    /// Path of this dataset relative to its visit: the directory basename
    /// for slice-per-file formats, and for P-files either the bare
    /// filename or the visit-relative file path.
    pub fn relative_dataset_path(&self, visit_dir: Option<&Path>) -> PathBuf {
        if self.is_pfile() {
            let full = self.directory.join(&self.scanned_file);
            if let Some(root) = visit_dir
                && let Ok(relative) = full.strip_prefix(root)
            {
                return relative.to_path_buf();
            }
            return PathBuf::from(&self.scanned_file);
        }
        self.directory
            .file_name()
            .map(PathBuf::from)
            .unwrap_or_else(|| self.directory.clone())
    }
}

fn required_field(
    value: Option<String>,
    message: &str,
    read_errors: &mut Vec<String>,
) -> Result<String> {
    match value {
        Some(v) if !v.is_empty() => Ok(v),
        _ => {
            read_errors.push(message.to_string());
            Err(MriError::InvalidComposition(message.to_string()))
        }
    }
}

/// Presence check for DICOM descriptive fields: absence is recorded but
/// never fatal, and non-DICOM datasets are not checked at all.
fn dicom_field(
    value: Option<String>,
    is_dicom: bool,
    label: &str,
    read_errors: &mut Vec<String>,
) -> Option<String> {
    if is_dicom && value.as_deref().is_none_or(str::is_empty) {
        read_errors.push(format!("couldn't find {label}"));
    }
    value
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image_file::{FileType, HdrReader};

    fn image_file(filename: &str, file_type: FileType) -> RawImageFile {
        RawImageFile {
            filename: filename.to_string(),
            file_type,
            hdr_reader: match file_type {
                FileType::Pfile | FileType::Geifile => HdrReader::GeBinary,
                _ => HdrReader::DicomDict,
            },
            timestamp: chrono::NaiveDate::from_ymd_opt(2006, 11, 30)
                .and_then(|d| d.and_hms_opt(10, 27, 10)),
            source: Some("Andys3T".to_string()),
            rmr_number: Some("RMR040414-1".to_string()),
            study_id: Some("5401".to_string()),
            series_description: Some("Ax FSPGR BRAVO T1".to_string()),
            study_description: Some("MRI BRAIN".to_string()),
            protocol_name: Some("BRAVO".to_string()),
            operator_name: None,
            patient_name: Some("sub001".to_string()),
            gender: Some("F".to_string()),
            num_slices: Some(156),
            slice_thickness: Some(1.0),
            slice_spacing: Some(1.0),
            reconstruction_diameter: Some(256.0),
            acquisition_matrix_x: Some(256),
            acquisition_matrix_y: Some(256),
            rep_time: Some(8.132),
            bold_reps: Some(164),
            dicom_series_uid: Some("1.2.840.1".to_string()),
            dicom_study_uid: Some("1.2.840.2".to_string()),
            dicom_taghash: None,
            warnings: Vec::new(),
        }
    }

    fn scratch_dir() -> tempfile::TempDir {
        tempfile::tempdir().expect("create scratch dir")
    }

    #[test]
    fn derives_fields_from_first_file() {
        let dir = scratch_dir();
        let ds = RawImageDataset::new(dir.path(), vec![image_file("scan01.dcm", FileType::Dicom)])
            .expect("valid dataset");
        assert_eq!(ds.series_description(), "Ax FSPGR BRAVO T1");
        assert_eq!(ds.rmr_number(), "RMR040414-1");
        assert_eq!(ds.scanner_source(), "Andys3T");
        assert_eq!(ds.scanned_file(), "scan01.dcm");
        assert_eq!(ds.dataset_key(), "RMR040414-1::2006-11-30 10:27:10");
    }

    #[test]
    fn construction_is_idempotent() {
        let dir = scratch_dir();
        let a = RawImageDataset::new(dir.path(), vec![image_file("scan01.dcm", FileType::Dicom)])
            .expect("first construction");
        let b = RawImageDataset::new(dir.path(), vec![image_file("scan01.dcm", FileType::Dicom)])
            .expect("second construction");
        assert_eq!(a.dataset_key(), b.dataset_key());
        assert_eq!(a.glob(), b.glob());
        assert_eq!(a.timestamp(), b.timestamp());
        assert_eq!(a.series_description(), b.series_description());
    }

    #[test]
    fn timestamp_is_minimum_across_files() {
        let dir = scratch_dir();
        let mut early = image_file("scan02.dcm", FileType::Dicom);
        early.timestamp = chrono::NaiveDate::from_ymd_opt(2006, 11, 30)
            .and_then(|d| d.and_hms_opt(8, 0, 0));
        let ds = RawImageDataset::new(
            dir.path(),
            vec![image_file("scan01.dcm", FileType::Dicom), early],
        )
        .expect("valid dataset");
        assert_eq!(ds.timestamp().to_string(), "2006-11-30 08:00:00");
    }

    #[test]
    fn empty_collection_is_invalid() {
        let dir = scratch_dir();
        let err = RawImageDataset::new(dir.path(), Vec::new()).unwrap_err();
        assert!(matches!(err, MriError::InvalidComposition(_)));
    }

    #[test]
    fn missing_series_description_is_invalid() {
        let dir = scratch_dir();
        let mut file = image_file("scan01.dcm", FileType::Dicom);
        file.series_description = None;
        let err = RawImageDataset::new(dir.path(), vec![file]).unwrap_err();
        assert!(matches!(err, MriError::InvalidComposition(_)));
    }

    #[test]
    fn missing_directory_is_not_found() {
        let err = RawImageDataset::new(
            "/no/such/visit/001",
            vec![image_file("scan01.dcm", FileType::Dicom)],
        )
        .unwrap_err();
        assert!(matches!(err, MriError::NotFound { .. }));
    }

    #[test]
    fn missing_dicom_descriptors_warn_but_do_not_fail() {
        let dir = scratch_dir();
        let mut file = image_file("scan01.dcm", FileType::Dicom);
        file.protocol_name = None;
        file.dicom_study_uid = None;
        let ds = RawImageDataset::new(dir.path(), vec![file]).expect("still a valid dataset");
        assert!(ds.read_errors().iter().any(|e| e.contains("protocol name")));
        assert!(ds.read_errors().iter().any(|e| e.contains("dicom study uid")));
    }

    #[test]
    fn missing_taghash_is_recorded_for_dicom_datasets() {
        let dir = scratch_dir();
        let ds = RawImageDataset::new(dir.path(), vec![image_file("scan01.dcm", FileType::Dicom)])
            .expect("valid dataset");
        assert!(ds.read_errors().iter().any(|e| e.contains("dicom taghash")));

        let mut file = image_file("scan01.dcm", FileType::Dicom);
        file.dicom_taghash = Some(crate::image_file::TagHash::new());
        let ds = RawImageDataset::new(dir.path(), vec![file]).expect("valid dataset");
        assert!(!ds.read_errors().iter().any(|e| e.contains("dicom taghash")));

        let pfile = RawImageDataset::new(dir.path(), vec![image_file("P12345.7", FileType::Pfile)])
            .expect("pfile dataset");
        assert!(!pfile.read_errors().iter().any(|e| e.contains("dicom taghash")));
    }

    #[test]
    fn glob_policy() {
        let dir = scratch_dir();
        let cases = [
            ("I.001", FileType::Geifile, Some("I.*")),
            ("scan01.dcm", FileType::Dicom, Some("*.dcm")),
            ("E1234S3I99.dcm", FileType::Dicom, Some("E*.dcm")),
            ("I0099.dcm", FileType::Dicom, Some("*.dcm")),
            ("I0099", FileType::Dicom, Some("I*.dcm")),
            ("s03_bravo.0156", FileType::Dicom, Some("*.[0-9]*")),
            ("P12345.7", FileType::Pfile, None),
        ];
        for (filename, file_type, expected) in cases {
            let ds = RawImageDataset::new(dir.path(), vec![image_file(filename, file_type)])
                .expect("valid dataset");
            assert_eq!(ds.glob(), expected, "glob for {filename}");
        }
    }

    #[test]
    fn file_count_ignores_hidden_and_yaml_entries() {
        let dir = scratch_dir();
        std::fs::write(dir.path().join("scan01.dcm"), b"x").expect("write fixture");
        std::fs::write(dir.path().join("scan02.dcm"), b"x").expect("write fixture");
        std::fs::write(dir.path().join(".DS_Store"), b"x").expect("write fixture");
        std::fs::write(dir.path().join("notes.yaml"), b"x").expect("write fixture");
        let ds = RawImageDataset::new(dir.path(), vec![image_file("scan01.dcm", FileType::Dicom)])
            .expect("valid dataset");
        assert_eq!(ds.file_count().expect("count files"), 2);
    }

    #[test]
    fn relative_path_for_pfile_and_dicom() {
        let dir = scratch_dir();
        let sub = dir.path().join("raw");
        std::fs::create_dir(&sub).expect("create subdir");

        let dicom = RawImageDataset::new(&sub, vec![image_file("scan01.dcm", FileType::Dicom)])
            .expect("dicom dataset");
        assert_eq!(dicom.relative_dataset_path(None), PathBuf::from("raw"));

        let pfile = RawImageDataset::new(&sub, vec![image_file("P12345.7", FileType::Pfile)])
            .expect("pfile dataset");
        assert_eq!(
            pfile.relative_dataset_path(None),
            PathBuf::from("P12345.7")
        );
        let canonical_root = dir.path().canonicalize().expect("canonical root");
        assert_eq!(
            pfile.relative_dataset_path(Some(&canonical_root)),
            PathBuf::from("raw/P12345.7")
        );
    }
}
