use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::Result;
use plotters::prelude::*;
use tracing::info;

use super::stats::ols_line;
use super::table::{parse_number, Table};
use crate::contract::{ChartPayload, ChartType, Contract};

/// Chart Creator: render `y` against `x` and save `<output_dir>/<chart_type>_<y>.png`.
///
/// Line and bar charts sum `y` per distinct `x` label (sorted), which turns daily rows into
/// a time series. Scatter charts need numeric axes and add a least-squares trend line.
pub fn create_chart(
    path: &Path,
    chart_type: ChartType,
    x: &str,
    y: &str,
    output_dir: &Path,
) -> Contract<ChartPayload> {
    let table = match Table::read(path) {
        Ok(table) => table,
        Err(e) => {
            return Contract::error(format!("Failed to read CSV at {}: {:#}", path.display(), e))
        }
    };

    let (Some(x_idx), Some(y_idx)) = (table.column_index(x), table.column_index(y)) else {
        return Contract::error_with_columns(
            format!("Columns '{}' or '{}' not found in dataset.", x, y),
            table.headers,
        );
    };

    if let Err(e) = std::fs::create_dir_all(output_dir) {
        return Contract::error(format!(
            "Failed to create chart directory {}: {}",
            output_dir.display(),
            e
        ));
    }
    let out = chart_path(output_dir, chart_type, y);

    let drawn = match chart_type {
        ChartType::Line | ChartType::Bar => {
            let mut totals: BTreeMap<String, f64> = BTreeMap::new();
            for row in &table.rows {
                if let (Some(label), Some(value)) =
                    (row.get(x_idx), row.get(y_idx).and_then(|v| parse_number(v)))
                {
                    *totals.entry(label.clone()).or_insert(0.0) += value;
                }
            }
            if totals.is_empty() {
                return Contract::error(format!("Column '{}' has no numeric values to plot.", y));
            }
            let labels: Vec<String> = totals.keys().cloned().collect();
            let values: Vec<f64> = totals.values().cloned().collect();
            render_guarded(|| write_category_chart(&out, chart_type, x, y, &labels, &values))
        }
        ChartType::Scatter => {
            let points: Vec<(f64, f64)> = table
                .rows
                .iter()
                .filter_map(|row| {
                    let a = row.get(x_idx).and_then(|v| parse_number(v))?;
                    let b = row.get(y_idx).and_then(|v| parse_number(v))?;
                    Some((a, b))
                })
                .collect();
            if points.len() < 2 {
                return Contract::error(format!(
                    "Scatter chart needs numeric values in both '{}' and '{}'.",
                    x, y
                ));
            }
            render_guarded(|| write_scatter(&out, x, y, &points))
        }
    };

    if let Err(e) = drawn {
        return Contract::error(format!(
            "Failed to save chart to {}: {:#}",
            out.display(),
            e
        ));
    }

    info!(chart = %chart_type, x, y, path = %out.display(), "Chart written");
    Contract::Ok(ChartPayload {
        chart_type,
        x: x.to_string(),
        y: y.to_string(),
        path: out.to_string_lossy().to_string(),
    })
}

/// Font lookup inside the plotting backend can panic on hosts without system fonts
fn render_guarded(draw: impl FnOnce() -> Result<()>) -> Result<()> {
    std::panic::catch_unwind(std::panic::AssertUnwindSafe(draw))
        .unwrap_or_else(|_| Err(anyhow::anyhow!("chart backend panicked while drawing")))
}

pub fn chart_path(output_dir: &Path, chart_type: ChartType, y: &str) -> PathBuf {
    output_dir.join(format!("{}_{}.png", chart_type, y))
}

fn value_range(values: impl Iterator<Item = f64>, include_zero: bool) -> (f64, f64) {
    let (mut lo, mut hi) = if include_zero {
        (0.0, 0.0)
    } else {
        (f64::INFINITY, f64::NEG_INFINITY)
    };
    for v in values {
        lo = lo.min(v);
        hi = hi.max(v);
    }
    if !lo.is_finite() || !hi.is_finite() {
        return (0.0, 1.0);
    }
    let pad = ((hi - lo) * 0.05).max(1e-9);
    if hi - lo <= f64::EPSILON {
        return (lo - 1.0, hi + 1.0);
    }
    (lo - if include_zero && lo == 0.0 { 0.0 } else { pad }, hi + pad)
}

fn write_category_chart(
    output_path: &Path,
    chart_type: ChartType,
    x: &str,
    y: &str,
    labels: &[String],
    values: &[f64],
) -> Result<()> {
    let (y_min, y_max) = value_range(values.iter().cloned(), chart_type == ChartType::Bar);
    let count = values.len();
    let caption = match chart_type {
        ChartType::Line => format!("{} over time", y),
        _ => format!("{} by {}", y, x),
    };

    let root = BitMapBackend::new(output_path, (1000, 500)).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .margin(20)
        .caption(caption, ("sans-serif", 24))
        .x_label_area_size(40)
        .y_label_area_size(70)
        .build_cartesian_2d(0f64..count as f64, y_min..y_max)?;

    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_labels(count.min(12))
        .x_label_formatter(&|v| {
            let idx = v.floor() as usize;
            labels.get(idx).cloned().unwrap_or_default()
        })
        .x_desc(x)
        .y_desc(y)
        .draw()?;

    match chart_type {
        ChartType::Line => {
            chart.draw_series(LineSeries::new(
                values.iter().enumerate().map(|(i, v)| (i as f64 + 0.5, *v)),
                &BLUE,
            ))?;
        }
        _ => {
            let base = y_min.max(0.0).min(y_max);
            chart.draw_series(values.iter().enumerate().map(|(i, v)| {
                let i = i as f64;
                Rectangle::new([(i + 0.1, base), (i + 0.9, *v)], BLUE.mix(0.6).filled())
            }))?;
        }
    }

    root.present()?;
    Ok(())
}

fn write_scatter(output_path: &Path, x: &str, y: &str, points: &[(f64, f64)]) -> Result<()> {
    let (x_min, x_max) = value_range(points.iter().map(|p| p.0), false);
    let (y_min, y_max) = value_range(points.iter().map(|p| p.1), false);

    let root = BitMapBackend::new(output_path, (900, 600)).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .margin(20)
        .caption(format!("{} vs {}", y, x), ("sans-serif", 24))
        .x_label_area_size(40)
        .y_label_area_size(70)
        .build_cartesian_2d(x_min..x_max, y_min..y_max)?;

    chart.configure_mesh().x_desc(x).y_desc(y).draw()?;

    chart.draw_series(
        points
            .iter()
            .map(|(a, b)| Circle::new((*a, *b), 3, BLUE.mix(0.5).filled())),
    )?;

    let xs: Vec<f64> = points.iter().map(|p| p.0).collect();
    let ys: Vec<f64> = points.iter().map(|p| p.1).collect();
    if let Some((intercept, slope, _, _)) = ols_line(&xs, &ys) {
        chart.draw_series(LineSeries::new(
            vec![
                (x_min, intercept + slope * x_min),
                (x_max, intercept + slope * x_max),
            ],
            &RED,
        ))?;
    }

    root.present()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_columns_is_error_contract() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sales.csv");
        std::fs::write(&path, "date,orders\n2024-07-01,3\n").unwrap();

        let contract = create_chart(&path, ChartType::Line, "date", "revenue", dir.path());
        assert_eq!(
            contract.error_message(),
            Some("Columns 'date' or 'revenue' not found in dataset.")
        );
    }

    #[test]
    fn test_scatter_rejects_text_axis() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sales.csv");
        std::fs::write(&path, "date,revenue\n2024-07-01,3\n2024-07-02,4\n").unwrap();

        let contract = create_chart(&path, ChartType::Scatter, "date", "revenue", dir.path());
        assert!(contract.error_message().unwrap().starts_with("Scatter chart needs"));
    }

    #[test]
    fn test_chart_path_naming() {
        let path = chart_path(Path::new("outputs/visualizations"), ChartType::Bar, "revenue");
        assert_eq!(path, PathBuf::from("outputs/visualizations/bar_revenue.png"));
    }

    #[test]
    fn test_value_range_handles_constant_series() {
        assert_eq!(value_range([5.0, 5.0].into_iter(), false), (4.0, 6.0));
        let (lo, hi) = value_range([2.0, 10.0].into_iter(), true);
        assert_eq!(lo, 0.0);
        assert!(hi > 10.0);
    }
}
