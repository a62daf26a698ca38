use std::path::{Path, PathBuf};

use tracing::{info, warn};

use super::table::Table;
use crate::contract::{CleanPayload, Contract, LoadPayload};

/// CSV Data Loader: confirm the dataset is readable and report its shape
pub fn load_dataset(path: &Path) -> Contract<LoadPayload> {
    if !path.is_file() {
        let nearby = sibling_csv_files(path);
        warn!(path = %path.display(), candidates = nearby.len(), "Dataset not found");
        let message = if nearby.is_empty() {
            format!("Dataset not found at {}", path.display())
        } else {
            format!(
                "Dataset not found at {}. CSV files in the same directory: {}",
                path.display(),
                nearby.join(", ")
            )
        };
        return Contract::error(message);
    }

    let table = match Table::read(path) {
        Ok(table) => table,
        Err(e) => {
            return Contract::error(format!("Failed to read CSV at {}: {:#}", path.display(), e))
        }
    };

    if table.headers.iter().all(|h| h.is_empty()) {
        return Contract::error(format!("Dataset at {} has no header row", path.display()));
    }

    info!(path = %path.display(), rows = table.rows.len(), "Dataset loaded");
    Contract::Ok(LoadPayload {
        path: path.to_string_lossy().to_string(),
        rows: table.rows.len(),
        columns: table.headers,
    })
}

fn sibling_csv_files(path: &Path) -> Vec<String> {
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut names: Vec<String> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.extension().map(|ext| ext == "csv").unwrap_or(false))
        .filter_map(|p| p.file_name().map(|n| n.to_string_lossy().to_string()))
        .collect();
    names.sort();
    names
}

/// Data Cleaner: fill missing numeric cells with the column median, drop duplicate rows,
/// and write `<stem>_cleaned.csv` next to the input
pub fn clean_data(path: &Path) -> Contract<CleanPayload> {
    let mut table = match Table::read(path) {
        Ok(table) => table,
        Err(e) => {
            return Contract::error(format!("Failed to read CSV at {}: {:#}", path.display(), e))
        }
    };
    let original_rows = table.rows.len();

    for col in table.numeric_columns() {
        let present: Vec<f64> = table.numeric_values(col).into_iter().flatten().collect();
        let Some(fill) = super::stats::median(&present) else {
            continue;
        };
        let fill = fill.to_string();
        for row in table.rows.iter_mut() {
            if let Some(cell) = row.get_mut(col) {
                if super::table::is_missing(cell) {
                    *cell = fill.clone();
                }
            }
        }
    }

    let removed = table.dedup_rows();

    let clean_path = cleaned_path(path);
    if let Err(e) = table.write(&clean_path) {
        return Contract::error(format!(
            "Failed to write cleaned CSV to {}: {:#}",
            clean_path.display(),
            e
        ));
    }

    info!(
        original_rows,
        clean_rows = table.rows.len(),
        duplicates_removed = removed,
        "Dataset cleaned"
    );
    Contract::Ok(CleanPayload {
        original_rows,
        clean_rows: table.rows.len(),
        clean_path: clean_path.to_string_lossy().to_string(),
    })
}

/// Where [`clean_data`] writes its output for `path`
pub fn cleaned_path(path: &Path) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "dataset".to_string());
    path.with_file_name(format!("{}_cleaned.csv", stem))
}
