//! Human-readable visit summary.

use comfy_table::modifiers::UTF8_ROUND_CORNERS;
use comfy_table::presets::UTF8_FULL_CONDENSED;
use comfy_table::{Cell, CellAlignment, ContentArrangement, Table};

use mri_model::error::Result;
use mri_model::RawImageDataset;

use crate::visit::VisitRawDataDirectory;

/// Renders the visit header line and the dataset table.
pub fn render_summary(visit: &VisitRawDataDirectory) -> Result<String> {
    let timestamp = visit
        .timestamp()
        .map(|t| t.to_string())
        .unwrap_or_else(|| "unscanned".to_string());
    let header = format!(
        "Visit: {} [{}] {}",
        visit.visit_directory().display(),
        visit.scan_procedure_name(),
        timestamp
    );
    Ok(format!("{header}\n{}", summary_table(visit)?))
}

/// One row per dataset: relative path, series description, timestamp,
/// and on-disk file count, sorted by timestamp then directory basename.
pub fn summary_table(visit: &VisitRawDataDirectory) -> Result<Table> {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["Dataset", "Series Description", "Timestamp", "Files"]);
    if let Some(column) = table.column_mut(3) {
        column.set_cell_alignment(CellAlignment::Right);
    }

    let mut datasets: Vec<&RawImageDataset> = visit.datasets().iter().collect();
    datasets.sort_by(|a, b| {
        a.timestamp()
            .cmp(&b.timestamp())
            .then_with(|| a.directory().cmp(b.directory()))
    });
    let visit_dir = visit.visit_directory();
    for dataset in datasets {
        let files = dataset.file_count()?;
        table.add_row(vec![
            Cell::new(
                dataset
                    .relative_dataset_path(Some(visit_dir))
                    .display()
                    .to_string(),
            ),
            Cell::new(dataset.series_description()),
            Cell::new(dataset.timestamp().to_string()),
            Cell::new(files),
        ]);
    }
    Ok(table)
}
