//! Visit-level cataloging: dataset assembly over a raw data directory,
//! scan procedure inference, NIfTI conversion planning, and the visit
//! summary table.

pub mod nifti;
pub mod scan_procedure;
pub mod summary;
pub mod visit;

pub use nifti::{nifti_conversion, NiftiConversion, NiftiOptions};
pub use scan_procedure::UNKNOWN_SCAN_PROCEDURE;
pub use summary::{render_summary, summary_table};
pub use visit::{ScanOptions, VisitRawDataDirectory};
