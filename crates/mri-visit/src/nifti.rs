//! NIfTI conversion command planning.
//!
//! Reconstruction itself is delegated to AFNI's `to3d`; this module only
//! computes the exact command line and output path for a dataset, so a
//! caller can inspect, log, or batch the conversions before anything
//! runs. Which command shape applies is decided by the dataset's
//! [`Modality`], a closed set — there is no probing of installed tools.

use std::fs;
use std::path::{Path, PathBuf};

use mri_model::error::{MriError, Result};
use mri_model::{Modality, RawImageDataset};

/// Slice acquisition order passed to `to3d` for functional runs.
const SLICE_ORDER: &str = "altplus";

/// A planned conversion: the full shell command and the file it will
/// produce.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NiftiConversion {
    pub command: String,
    pub output_file: PathBuf,
}

/// Knobs for one conversion plan.
#[derive(Debug, Default)]
pub struct NiftiOptions {
    /// Nest the output under a per-modality subdirectory.
    pub append_modality_directory: bool,
    /// Leave the functional timing arguments off even when the dataset
    /// carries the full timing triple; the retry path after a `to3d`
    /// failure uses this.
    pub no_timing_options: bool,
    /// Directory holding the input files. Defaults to the dataset's
    /// original directory.
    pub input_directory: Option<PathBuf>,
}

/// Computes the `to3d` invocation for one dataset.
///
/// The output directory is created if needed and must be writable; the
/// command is returned, not executed.
pub fn nifti_conversion(
    dataset: &RawImageDataset,
    output_directory: &Path,
    filename: &str,
    options: &NiftiOptions,
) -> Result<NiftiConversion> {
    let modality = Modality::classify(dataset.series_description());
    let output_directory = if options.append_modality_directory {
        output_directory.join(modality.directory_name())
    } else {
        output_directory.to_path_buf()
    };
    ensure_writable(&output_directory)?;

    let input_directory = options
        .input_directory
        .as_deref()
        .unwrap_or_else(|| dataset.directory());
    // Functional DICOM series can exceed the shell argument limit, so
    // the glob stays quoted and unexpanded for to3d itself to resolve.
    let input_files = match dataset.glob() {
        Some(glob) => format!("{}/'{}'", input_directory.display(), glob),
        None => input_directory
            .join(dataset.scanned_file())
            .display()
            .to_string(),
    };

    let timing_args = match modality {
        Modality::Unknown if !options.no_timing_options => timing_arguments(dataset),
        _ => None,
    };

    let mut parts = vec![filename.to_string()];
    parts.extend(timing_args);
    parts.push(input_files);
    let command = format!(
        "to3d -session {} -prefix {}",
        output_directory.display(),
        parts.join(" ")
    );

    Ok(NiftiConversion {
        output_file: output_directory.join(filename),
        command,
    })
}

/// The `-time:zt` block, present only when the full functional triple is
/// known.
fn timing_arguments(dataset: &RawImageDataset) -> Option<String> {
    let first = dataset.raw_image_files().first()?;
    let slices = first.num_slices?;
    let reps = first.bold_reps?;
    let rep_time = first.rep_time?;
    Some(format!("-time:zt {slices} {reps} {rep_time} {SLICE_ORDER}"))
}

fn ensure_writable(directory: &Path) -> Result<()> {
    if !directory.is_dir() {
        fs::create_dir_all(directory).map_err(|e| MriError::io(directory, e))?;
    }
    let meta = fs::metadata(directory).map_err(|e| MriError::io(directory, e))?;
    if meta.permissions().readonly() {
        return Err(MriError::io(
            directory,
            std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                "output directory is not writable",
            ),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use mri_model::{FileType, HdrReader, RawImageFile};

    fn image_file(filename: &str, file_type: FileType) -> RawImageFile {
        RawImageFile {
            filename: filename.to_string(),
            file_type,
            hdr_reader: HdrReader::DicomDict,
            timestamp: chrono::NaiveDate::from_ymd_opt(2006, 11, 30)
                .and_then(|d| d.and_hms_opt(10, 27, 10)),
            source: Some("Andys3T".to_string()),
            rmr_number: Some("RMR040414-1".to_string()),
            study_id: Some("5401".to_string()),
            series_description: Some("fMRI Task".to_string()),
            study_description: None,
            protocol_name: None,
            operator_name: None,
            patient_name: None,
            gender: None,
            num_slices: Some(40),
            slice_thickness: Some(4.0),
            slice_spacing: Some(1.0),
            reconstruction_diameter: Some(240.0),
            acquisition_matrix_x: Some(64),
            acquisition_matrix_y: Some(64),
            rep_time: Some(2.0),
            bold_reps: Some(164),
            dicom_series_uid: None,
            dicom_study_uid: None,
            dicom_taghash: None,
            warnings: Vec::new(),
        }
    }

    fn dataset(filename: &str, file_type: FileType) -> (tempfile::TempDir, RawImageDataset) {
        let dir = tempfile::tempdir().expect("tempdir");
        let ds = RawImageDataset::new(dir.path(), vec![image_file(filename, file_type)])
            .expect("dataset");
        (dir, ds)
    }

    #[test]
    fn functional_series_gets_timing_arguments() {
        let (_guard, ds) = dataset("s03.0001", FileType::Dicom);
        let out = tempfile::tempdir().expect("tempdir");
        let plan =
            nifti_conversion(&ds, out.path(), "fmri-task.nii", &NiftiOptions::default())
                .expect("plan");
        assert!(plan.command.starts_with("to3d -session "));
        assert!(plan.command.contains("-time:zt 40 164 2 altplus"));
        assert!(plan.command.contains("'*.[0-9]*'"));
        assert_eq!(plan.output_file, out.path().join("fmri-task.nii"));
    }

    #[test]
    fn incomplete_timing_triple_drops_the_block() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut file = image_file("s03.0001", FileType::Dicom);
        file.bold_reps = None;
        let ds = RawImageDataset::new(dir.path(), vec![file]).expect("dataset");
        let out = tempfile::tempdir().expect("tempdir");
        let plan =
            nifti_conversion(&ds, out.path(), "anat.nii", &NiftiOptions::default())
                .expect("plan");
        assert!(!plan.command.contains("-time:zt"));
    }

    #[test]
    fn no_timing_options_suppresses_the_block() {
        let (_guard, ds) = dataset("s03.0001", FileType::Dicom);
        let out = tempfile::tempdir().expect("tempdir");
        let options = NiftiOptions {
            no_timing_options: true,
            ..NiftiOptions::default()
        };
        let plan = nifti_conversion(&ds, out.path(), "fmri-task.nii", &options).expect("plan");
        assert!(!plan.command.contains("-time:zt"));
    }

    #[test]
    fn dti_series_never_gets_timing_arguments() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut file = image_file("s05.0001", FileType::Dicom);
        file.series_description = Some("DTI 25 directions".to_string());
        let ds = RawImageDataset::new(dir.path(), vec![file]).expect("dataset");
        let out = tempfile::tempdir().expect("tempdir");
        let options = NiftiOptions {
            append_modality_directory: true,
            ..NiftiOptions::default()
        };
        let plan = nifti_conversion(&ds, out.path(), "dti.nii", &options).expect("plan");
        assert!(!plan.command.contains("-time:zt"));
        assert_eq!(plan.output_file, out.path().join("dti").join("dti.nii"));
        assert!(out.path().join("dti").is_dir(), "modality directory is created");
    }

    #[test]
    fn pfile_input_is_the_enumerated_file() {
        let (_guard, ds) = dataset("P12345.7", FileType::Pfile);
        let out = tempfile::tempdir().expect("tempdir");
        let plan =
            nifti_conversion(&ds, out.path(), "rest.nii", &NiftiOptions::default())
                .expect("plan");
        assert!(plan.command.ends_with("P12345.7"));
        assert!(!plan.command.contains('\''));
    }
}
