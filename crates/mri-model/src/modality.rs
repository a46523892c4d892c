//! Acquisition modality classification.
//!
//! The reconstruction command builder dispatches on a small closed set of
//! modalities instead of probing datasets for capabilities at runtime.
//! New modalities get a variant here and an arm in the builder.

use serde::{Deserialize, Serialize};

/// Classified acquisition modality, derived from the series description.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Modality {
    /// Anything not recognized as a special sequence.
    #[default]
    Unknown,
    /// Diffusion tensor imaging runs.
    Dti,
}

impl Modality {
    /// Classifies a series description label.
    pub fn classify(series_description: &str) -> Self {
        if series_description.to_ascii_lowercase().contains("dti") {
            Self::Dti
        } else {
            Self::Unknown
        }
    }

    /// Subdirectory name used when conversions are grouped by modality.
    pub fn directory_name(&self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Dti => "dti",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Modality;

    #[test]
    fn classifies_dti_series() {
        assert_eq!(Modality::classify("DTI 64dir"), Modality::Dti);
        assert_eq!(Modality::classify("ax dti"), Modality::Dti);
        assert_eq!(Modality::classify("Ax FSPGR BRAVO T1"), Modality::Unknown);
    }
}
