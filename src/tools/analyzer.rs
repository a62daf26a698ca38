use std::collections::BTreeMap;
use std::path::Path;

use chrono::NaiveDate;
use tracing::{debug, info};

use super::stats::{correlation, linear_trend, mean, std_dev};
use super::table::Table;
use crate::contract::{AnalysisPayload, AnomalyPayload, Contract, Outlier, ProfilePayload, Trend};

pub const CATEGORY_COLUMN: &str = "category";
pub const DATE_COLUMN: &str = "date";
pub const DEFAULT_Z_THRESHOLD: f64 = 3.0;
const MAX_REPORTED_OUTLIERS: usize = 10;

fn read_with_target<T>(path: &Path, target: &str) -> Result<(Table, usize), Contract<T>> {
    let table = Table::read(path).map_err(|e| {
        Contract::error(format!("Failed to read CSV at {}: {:#}", path.display(), e))
    })?;
    match table.column_index(target) {
        Some(idx) => Ok((table, idx)),
        None => Err(Contract::error_with_columns(
            format!("Target column '{}' not found in dataset.", target),
            table.headers,
        )),
    }
}

/// Statistical Analyzer: mean, std, trend over row order, correlations and category means
pub fn analyze_statistics(path: &Path, target: &str) -> Contract<AnalysisPayload> {
    let (table, target_idx) = match read_with_target(path, target) {
        Ok(found) => found,
        Err(contract) => return contract,
    };

    let target_values = table.numeric_values(target_idx);
    let mut xs = Vec::new();
    let mut ys = Vec::new();
    for (row, value) in target_values.iter().enumerate() {
        if let Some(v) = value {
            xs.push(row as f64);
            ys.push(*v);
        }
    }

    if ys.is_empty() && !table.rows.is_empty() {
        return Contract::error(format!(
            "Target column '{}' has no numeric values.",
            target
        ));
    }

    let mean_val = mean(&ys);
    let std_val = std_dev(&ys, mean_val);
    let trend = if ys.len() < 2 {
        Trend::flat()
    } else {
        linear_trend(&xs, &ys)
    };

    let mut correlations = BTreeMap::new();
    for col in table.numeric_columns() {
        if col == target_idx {
            continue;
        }
        let other = table.numeric_values(col);
        let (a, b): (Vec<f64>, Vec<f64>) = target_values
            .iter()
            .zip(other.iter())
            .filter_map(|(t, o)| Some(((*t)?, (*o)?)))
            .unzip();
        if a.len() < 2 {
            continue;
        }
        correlations.insert(table.headers[col].clone(), correlation(&a, &b));
    }

    let mut segments = BTreeMap::new();
    if let Some(cat_idx) = table.column_index(CATEGORY_COLUMN) {
        let mut grouped: BTreeMap<String, Vec<f64>> = BTreeMap::new();
        for (row, value) in target_values.iter().enumerate() {
            if let (Some(v), Some(label)) = (value, table.cell(row, cat_idx)) {
                grouped.entry(label.to_string()).or_default().push(*v);
            }
        }
        for (label, values) in grouped {
            segments.insert(label, mean(&values));
        }
    }

    info!(
        column = target,
        observations = ys.len(),
        direction = %trend.direction,
        "Statistics computed"
    );
    Contract::Ok(AnalysisPayload {
        target: target.to_string(),
        mean: mean_val,
        std: std_val,
        trend,
        correlations,
        segments,
    })
}

fn month_key(raw: &str) -> Option<String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .ok()
        .map(|d| d.format("%Y-%m").to_string())
}

/// Exploratory profile: target totals per month and per category
pub fn profile_dataset(path: &Path, target: &str) -> Contract<ProfilePayload> {
    let (table, target_idx) = match read_with_target(path, target) {
        Ok(found) => found,
        Err(contract) => return contract,
    };

    let values = table.numeric_values(target_idx);
    let date_idx = table.column_index(DATE_COLUMN);
    let cat_idx = table.column_index(CATEGORY_COLUMN);

    let mut by_month: BTreeMap<String, f64> = BTreeMap::new();
    let mut by_category: BTreeMap<String, f64> = BTreeMap::new();
    for (row, value) in values.iter().enumerate() {
        let Some(v) = value else { continue };
        if let Some(month) = date_idx.and_then(|i| table.cell(row, i)).and_then(month_key) {
            *by_month.entry(month).or_insert(0.0) += v;
        }
        if let Some(label) = cat_idx.and_then(|i| table.cell(row, i)) {
            *by_category.entry(label.to_string()).or_insert(0.0) += v;
        }
    }

    debug!(months = by_month.len(), categories = by_category.len(), "Profile computed");
    Contract::Ok(ProfilePayload {
        target: target.to_string(),
        rows: table.rows.len(),
        by_month,
        by_category,
    })
}

/// Flag rows whose target lies more than `z_threshold` standard deviations from the mean
pub fn detect_anomalies(path: &Path, target: &str, z_threshold: f64) -> Contract<AnomalyPayload> {
    let (table, target_idx) = match read_with_target(path, target) {
        Ok(found) => found,
        Err(contract) => return contract,
    };

    let observed: Vec<(usize, f64)> = table
        .numeric_values(target_idx)
        .into_iter()
        .enumerate()
        .filter_map(|(row, v)| v.map(|v| (row, v)))
        .collect();
    let values: Vec<f64> = observed.iter().map(|(_, v)| *v).collect();
    let mean_val = mean(&values);
    let std_val = std_dev(&values, mean_val);

    let mut outliers: Vec<Outlier> = if std_val > 0.0 {
        observed
            .iter()
            .map(|(row, value)| Outlier {
                row: *row,
                value: *value,
                z_score: (value - mean_val) / std_val,
            })
            .filter(|o| o.z_score.abs() > z_threshold)
            .collect()
    } else {
        Vec::new()
    };
    outliers.sort_by(|a, b| {
        b.z_score
            .abs()
            .partial_cmp(&a.z_score.abs())
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    let total_outliers = outliers.len();
    outliers.truncate(MAX_REPORTED_OUTLIERS);

    info!(column = target, total_outliers, "Anomaly scan complete");
    Contract::Ok(AnomalyPayload {
        target: target.to_string(),
        z_threshold,
        mean: mean_val,
        std: std_val,
        total_outliers,
        outliers,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::TrendDirection;
    use tempfile::TempDir;

    fn write(dir: &TempDir, body: &str) -> std::path::PathBuf {
        let path = dir.path().join("sales.csv");
        std::fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn test_analysis_downward_trend_and_segments() {
        let dir = TempDir::new().unwrap();
        let mut body = String::from("date,category,revenue,orders\n");
        for i in 0..30 {
            let category = if i % 2 == 0 { "Electronics" } else { "Clothing" };
            body.push_str(&format!("2024-07-{:02},{},{},{}\n", i % 28 + 1, category, 1000 - i * 10, 100 - i));
        }
        let path = write(&dir, &body);

        let contract = analyze_statistics(&path, "revenue");
        let payload = contract.payload().unwrap();
        assert_eq!(payload.trend.direction, TrendDirection::Decreasing);
        assert!(payload.trend.slope < 0.0);
        assert!((payload.correlations["orders"] - 1.0).abs() < 1e-9);
        assert_eq!(payload.segments.len(), 2);
        assert!(payload.segments["Electronics"] > payload.segments["Clothing"]);
    }

    #[test]
    fn test_analysis_missing_target_lists_columns() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "date,orders\n2024-07-01,3\n");
        match analyze_statistics(&path, "revenue") {
            Contract::Error { message, available_columns } => {
                assert_eq!(message, "Target column 'revenue' not found in dataset.");
                assert_eq!(available_columns, vec!["date".to_string(), "orders".to_string()]);
            }
            Contract::Ok(_) => panic!("expected error contract"),
        }
    }

    #[test]
    fn test_analysis_single_row_is_stable() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "date,revenue\n2024-07-01,500\n");
        let contract = analyze_statistics(&path, "revenue");
        let payload = contract.payload().unwrap();
        assert_eq!(payload.trend.direction, TrendDirection::Stable);
        assert_eq!(payload.std, 0.0);
        assert!(payload.correlations.is_empty());
        // Must still serialize as valid JSON with finite numbers
        let json = contract.to_json();
        assert!(json.contains("\"direction\":\"stable\""));
    }

    #[test]
    fn test_analysis_constant_revenue_is_stable() {
        let dir = TempDir::new().unwrap();
        let mut body = String::from("date,revenue\n");
        for i in 0..10 {
            body.push_str(&format!("2024-07-{:02},123.45\n", i + 1));
        }
        let path = write(&dir, &body);

        let trend = analyze_statistics(&path, "revenue").payload().unwrap().trend.clone();
        assert_eq!(trend.direction, TrendDirection::Stable);
        assert_eq!(trend.slope, 0.0);
        assert_eq!(trend.p_value, 1.0);
    }

    #[test]
    fn test_profile_groups_by_month_and_category() {
        let dir = TempDir::new().unwrap();
        let path = write(
            &dir,
            "date,category,revenue\n\
             2024-07-01,A,10\n\
             2024-07-15,B,5\n\
             2024-08-01,A,7\n\
             not-a-date,B,1\n",
        );
        let contract = profile_dataset(&path, "revenue");
        let payload = contract.payload().unwrap();
        assert_eq!(payload.by_month["2024-07"], 15.0);
        assert_eq!(payload.by_month["2024-08"], 7.0);
        assert_eq!(payload.by_month.len(), 2);
        assert_eq!(payload.by_category["B"], 6.0);
    }

    #[test]
    fn test_detect_anomalies_flags_spike() {
        let dir = TempDir::new().unwrap();
        let mut body = String::from("revenue\n");
        for _ in 0..50 {
            body.push_str("100\n101\n");
        }
        body.push_str("5000\n");
        let path = write(&dir, &body);

        let contract = detect_anomalies(&path, "revenue", DEFAULT_Z_THRESHOLD);
        let payload = contract.payload().unwrap();
        assert_eq!(payload.total_outliers, 1);
        assert_eq!(payload.outliers[0].row, 100);
        assert!(payload.outliers[0].z_score > 3.0);
    }
}
