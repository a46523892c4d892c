//! Assembly of a complete [`RawImageFile`] from one candidate path.

use std::path::Path;

use tracing::debug;

use mri_model::error::{MriError, Result};
use mri_model::RawImageFile;

use crate::extract;
use crate::patterns;
use crate::readers::ReaderSet;

/// Reads the header of `path` through the cascade and extracts its
/// metadata into a [`RawImageFile`].
///
/// The path must already be local and uncompressed; archive candidates
/// go through a local-copy scope first. The raw header payload is
/// dropped after extraction, only the structured DICOM tag map survives
/// on the returned value.
pub fn read_raw_image_file(path: &Path, readers: &ReaderSet) -> Result<RawImageFile> {
    if !path.is_file() {
        return Err(MriError::NotFound {
            path: path.to_path_buf(),
        });
    }
    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let (payload, reader) = readers.read(path)?;
    let file_type = patterns::classify(&filename, reader);
    let attrs = extract::extract(&payload, reader)?;
    debug!(file = %filename, file_type = file_type.as_str(), reader = reader.as_str(),
        "read raw image file");

    Ok(RawImageFile {
        filename,
        file_type,
        hdr_reader: reader,
        timestamp: attrs.timestamp,
        source: attrs.source,
        rmr_number: attrs.rmr_number,
        study_id: attrs.study_id,
        series_description: attrs.series_description,
        study_description: attrs.study_description,
        protocol_name: attrs.protocol_name,
        operator_name: attrs.operator_name,
        patient_name: attrs.patient_name,
        gender: attrs.gender,
        num_slices: attrs.num_slices,
        slice_thickness: attrs.slice_thickness,
        slice_spacing: attrs.slice_spacing,
        reconstruction_diameter: attrs.reconstruction_diameter,
        acquisition_matrix_x: attrs.acquisition_matrix_x,
        acquisition_matrix_y: attrs.acquisition_matrix_y,
        rep_time: attrs.rep_time,
        bold_reps: attrs.bold_reps,
        dicom_series_uid: attrs.dicom_series_uid,
        dicom_study_uid: attrs.dicom_study_uid,
        dicom_taghash: attrs.dicom_taghash,
        warnings: attrs.warnings,
    })
}
