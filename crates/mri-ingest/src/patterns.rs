//! Filename conventions of raw scanner output.
//!
//! Naming is the sole source of file-type dispatch: headers are never
//! content-sniffed before a reader is chosen.

use std::sync::LazyLock;

use regex::Regex;

use mri_model::{FileType, HdrReader};

/// GE P-file names: `P?????.7`, optionally compressed.
pub static PFILE_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^P.....\.7(\.bz2)?$").expect("valid pfile pattern"));

/// Legacy GE I-file names: `I.001`, `I.002`, ...
pub static IFILE_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^I\.\d+").expect("valid ifile pattern"));

/// Names that qualify as the representative DICOM/I-file candidate of a
/// directory: I-files, `.dcm` suffixes, and numeric slice suffixes, each
/// optionally compressed.
pub static DICOM_CANDIDATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^I\.|\.dcm(\.bz2)?$|\.0[0-9]+(\.bz2)?$").expect("valid dicom candidate pattern")
});

/// Whether the filename selects the GE binary reader branch of the
/// cascade rather than the DICOM branch.
pub fn is_ge_binary_name(filename: &str) -> bool {
    PFILE_NAME.is_match(filename) || IFILE_NAME.is_match(filename)
}

/// Classifies a successfully read file from its name and the reader that
/// decoded it. Files no reader decodes never reach this point and stay
/// unclassified.
pub fn classify(filename: &str, _reader: HdrReader) -> FileType {
    if PFILE_NAME.is_match(filename) {
        FileType::Pfile
    } else if IFILE_NAME.is_match(filename) {
        FileType::Geifile
    } else {
        FileType::Dicom
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pfile_names() {
        assert!(PFILE_NAME.is_match("P12345.7"));
        assert!(PFILE_NAME.is_match("P12345.7.bz2"));
        assert!(!PFILE_NAME.is_match("P1234.7"));
        assert!(!PFILE_NAME.is_match("P12345.7.old"));
    }

    #[test]
    fn dicom_candidates() {
        assert!(DICOM_CANDIDATE.is_match("I.001"));
        assert!(DICOM_CANDIDATE.is_match("scan01.dcm"));
        assert!(DICOM_CANDIDATE.is_match("scan01.dcm.bz2"));
        assert!(DICOM_CANDIDATE.is_match("s03_bravo.0156"));
        assert!(DICOM_CANDIDATE.is_match("s03_bravo.0156.bz2"));
        assert!(!DICOM_CANDIDATE.is_match("README.txt"));
        assert!(!DICOM_CANDIDATE.is_match("P12345.7"));
    }

    #[test]
    fn classification_by_name() {
        assert_eq!(
            classify("P12345.7", HdrReader::GeBinary),
            FileType::Pfile
        );
        assert_eq!(
            classify("I.001", HdrReader::GeBinary),
            FileType::Geifile
        );
        assert_eq!(
            classify("scan01.dcm", HdrReader::DicomDict),
            FileType::Dicom
        );
        assert_eq!(
            classify("s03_bravo.0156", HdrReader::DicomHdr),
            FileType::Dicom
        );
    }
}
