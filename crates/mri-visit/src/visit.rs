//! One visit's raw data directory and its scanned datasets.

use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use regex::Regex;
use tracing::info;

use mri_ingest::{read_raw_image_file, walk, ReaderSet, WalkOptions};
use mri_model::error::{MriError, Result};
use mri_model::{escape_filename, RawImageDataset, RawImageFile, RMR_NOT_FOUND};

use crate::nifti::{nifti_conversion, NiftiConversion, NiftiOptions};
use crate::scan_procedure;

/// Options for one scan pass.
#[derive(Debug, Default)]
pub struct ScanOptions {
    /// Subdirectories whose full path matches any of these are skipped,
    /// with their whole subtree.
    pub ignore_patterns: Vec<Regex>,
}

/// A raw data directory transferred from the scanners, holding one
/// participant's acquisitions for one visit.
///
/// Construction validates the directory and infers the study codename
/// from the path; [`scan`](Self::scan) walks the tree and assembles one
/// [`RawImageDataset`] per candidate file. The visit-level identifiers
/// are aggregated over the dataset list afterwards: headers are
/// unreliable one by one, so each lookup takes the first dataset with a
/// usable value and fails only when no dataset has one.
#[derive(Debug)]
pub struct VisitRawDataDirectory {
    visit_directory: PathBuf,
    scan_procedure_name: String,
    datasets: Vec<RawImageDataset>,
    timestamp: Option<NaiveDateTime>,
    readers: ReaderSet,
}

impl VisitRawDataDirectory {
    /// Opens a visit directory, inferring the scan procedure codename
    /// from its path.
    pub fn new(directory: impl AsRef<Path>) -> Result<Self> {
        Self::with_scan_procedure_opt(directory, None)
    }

    /// Opens a visit directory with an explicit study codename, for
    /// archives whose layout the inference rules do not know.
    pub fn with_scan_procedure(
        directory: impl AsRef<Path>,
        scan_procedure_name: impl Into<String>,
    ) -> Result<Self> {
        Self::with_scan_procedure_opt(directory, Some(scan_procedure_name.into()))
    }

    fn with_scan_procedure_opt(
        directory: impl AsRef<Path>,
        scan_procedure_name: Option<String>,
    ) -> Result<Self> {
        let directory = directory.as_ref();
        if !directory.is_dir() {
            return Err(MriError::NotFound {
                path: directory.to_path_buf(),
            });
        }
        let visit_directory = directory
            .canonicalize()
            .map_err(|e| MriError::io(directory, e))?;
        let scan_procedure_name = scan_procedure_name
            .unwrap_or_else(|| scan_procedure::infer(&visit_directory).to_string());
        Ok(Self {
            visit_directory,
            scan_procedure_name,
            datasets: Vec::new(),
            timestamp: None,
            readers: ReaderSet::default(),
        })
    }

    /// Replaces the header reader cascade, e.g. to disable an external
    /// tool that is unavailable on this host.
    pub fn with_readers(mut self, readers: ReaderSet) -> Self {
        self.readers = readers;
        self
    }

    pub fn visit_directory(&self) -> &Path {
        &self.visit_directory
    }

    pub fn scan_procedure_name(&self) -> &str {
        &self.scan_procedure_name
    }

    /// Datasets assembled by the last [`scan`](Self::scan).
    pub fn datasets(&self) -> &[RawImageDataset] {
        &self.datasets
    }

    /// Earliest dataset timestamp; set by a successful scan.
    pub fn timestamp(&self) -> Option<NaiveDateTime> {
        self.timestamp
    }

    /// Walks the visit tree and assembles the dataset list.
    ///
    /// Every qualifying P-file and the first DICOM candidate of each
    /// subdirectory becomes one dataset; candidates whose header cannot
    /// be read or whose dataset cannot be composed are logged and
    /// skipped. A scan that ends with zero datasets is
    /// [`MriError::NoValidAggregate`] — an empty visit catalogs nothing.
    pub fn scan(&mut self, options: &ScanOptions) -> Result<()> {
        info!(visit = %self.visit_directory.display(), "scanning visit raw data directory");
        let readers = &self.readers;
        let mut datasets: Vec<RawImageDataset> = Vec::new();
        let walk_options = WalkOptions {
            ignore_patterns: options.ignore_patterns.clone(),
        };
        walk(&self.visit_directory, &walk_options, |candidate| {
            let file: RawImageFile = read_raw_image_file(candidate.local_path, readers)?;
            let dataset = RawImageDataset::new(candidate.directory, vec![file])?;
            info!(
                directory = %candidate.directory.display(),
                scanned_file = dataset.scanned_file(),
                series = dataset.series_description(),
                "imported dataset"
            );
            datasets.push(dataset);
            Ok(())
        })?;

        if datasets.is_empty() {
            return Err(MriError::NoValidAggregate(format!(
                "no datasets found under {}",
                self.visit_directory.display()
            )));
        }
        self.timestamp = datasets.iter().map(RawImageDataset::timestamp).min();
        self.datasets = datasets;
        info!(
            visit = %self.visit_directory.display(),
            datasets = self.datasets.len(),
            "completed scanning"
        );
        Ok(())
    }

    /// Participant id for the visit: the first dataset whose rmr is not
    /// the GE sentinel.
    pub fn rmr_number(&self) -> Result<&str> {
        self.datasets
            .iter()
            .map(RawImageDataset::rmr_number)
            .find(|rmr| *rmr != RMR_NOT_FOUND)
            .ok_or_else(|| {
                MriError::NoValidAggregate(
                    "no valid rmr number was found for this visit".to_string(),
                )
            })
    }

    /// Scanner / institution the visit was acquired on.
    pub fn scanner_source(&self) -> Result<&str> {
        self.datasets
            .iter()
            .map(RawImageDataset::scanner_source)
            .find(|source| !source.is_empty())
            .ok_or_else(|| {
                MriError::NoValidAggregate(
                    "no valid scanner source found for this visit".to_string(),
                )
            })
    }

    /// DICOM study instance UID, from the first dataset that carries one.
    pub fn study_uid(&self) -> Result<&str> {
        self.datasets
            .iter()
            .find_map(RawImageDataset::dicom_study_uid)
            .ok_or_else(|| {
                MriError::NoValidAggregate(
                    "no dicom study uid found for this visit".to_string(),
                )
            })
    }

    /// Scanner exam number, when any dataset header carried one.
    pub fn exam_number(&self) -> Option<&str> {
        self.datasets.iter().find_map(RawImageDataset::study_id)
    }

    /// Identifier prefix of the visit directory name: the first
    /// `_`-separated token of the basename.
    pub fn scan_id(&self) -> Option<&str> {
        self.visit_directory
            .file_name()
            .and_then(|name| name.to_str())
            .and_then(|name| name.split('_').next())
            .filter(|token| !token.is_empty())
    }

    /// Plans one NIfTI conversion per scanned dataset, named after the
    /// escaped series description.
    pub fn nifti_conversions(&self, output_directory: &Path) -> Result<Vec<NiftiConversion>> {
        let options = NiftiOptions {
            append_modality_directory: true,
            ..NiftiOptions::default()
        };
        self.datasets
            .iter()
            .map(|dataset| {
                let filename =
                    format!("{}.nii", escape_filename(dataset.series_description()));
                nifti_conversion(dataset, output_directory, &filename, &options)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_directory_is_not_found() {
        let err = VisitRawDataDirectory::new("/no/such/visit").unwrap_err();
        assert!(matches!(err, MriError::NotFound { .. }));
    }

    #[test]
    fn explicit_scan_procedure_overrides_inference() {
        let dir = tempfile::tempdir().expect("tempdir");
        let visit = VisitRawDataDirectory::with_scan_procedure(dir.path(), "johnson.wrap140.visit1")
            .expect("visit");
        assert_eq!(visit.scan_procedure_name(), "johnson.wrap140.visit1");

        let inferred = VisitRawDataDirectory::new(dir.path()).expect("visit");
        assert_eq!(
            inferred.scan_procedure_name(),
            crate::scan_procedure::UNKNOWN_SCAN_PROCEDURE
        );
    }

    #[test]
    fn scan_id_is_the_first_token_of_the_basename() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let dir = tmp.path().join("alz042_6354_20060915");
        std::fs::create_dir(&dir).expect("mkdir");
        let visit = VisitRawDataDirectory::new(&dir).expect("visit");
        assert_eq!(visit.scan_id(), Some("alz042"));
    }

    #[test]
    fn aggregates_fail_before_any_scan() {
        let dir = tempfile::tempdir().expect("tempdir");
        let visit = VisitRawDataDirectory::new(dir.path()).expect("visit");
        assert!(matches!(
            visit.rmr_number().unwrap_err(),
            MriError::NoValidAggregate(_)
        ));
        assert!(visit.timestamp().is_none());
        assert!(visit.exam_number().is_none());
    }
}
