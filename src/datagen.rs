//! Synthetic Q3 2024 e-commerce dataset
//!
//! Daily rows per category for July through September. Electronics declines steadily and
//! drops further in September, Clothing grows, the other two drift randomly. About five
//! percent of revenue and order cells are blanked and fifteen rows are duplicated, so the
//! cleaning stage has something to do.

use std::path::Path;

use anyhow::{Context, Result};
use chrono::{Datelike, NaiveDate};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use tracing::info;

use crate::tools::Table;

pub const DEFAULT_SEED: u64 = 42;
pub const LARGE_COPIES: u64 = 10;

const CATEGORIES: [(&str, f64); 4] = [
    ("Electronics", 45_000.0),
    ("Clothing", 32_000.0),
    ("Food & Beverage", 28_000.0),
    ("Home & Garden", 35_000.0),
];
const HEADERS: [&str; 8] = [
    "date",
    "category",
    "revenue",
    "orders",
    "conversion_rate",
    "avg_order_value",
    "website_traffic",
    "marketing_spend",
];
const MISSING_RATE: f64 = 0.05;
const DUPLICATE_ROWS: usize = 15;
const REVENUE_FLOOR: f64 = 5_000.0;

pub fn generate(seed: u64) -> Result<Table> {
    let mut rng = StdRng::seed_from_u64(seed);
    let start = NaiveDate::from_ymd_opt(2024, 7, 1).context("invalid start date")?;
    let end = NaiveDate::from_ymd_opt(2024, 9, 30).context("invalid end date")?;

    let mut rows = Vec::new();
    for date in start.iter_days().take_while(|d| *d <= end) {
        let day = (date - start).num_days() as f64;
        for (category, base) in CATEGORIES {
            let trend = match category {
                "Electronics" => -day * 250.0,
                "Clothing" => day * 150.0,
                _ => rng.gen_range(-50.0..50.0) * day,
            };
            let anomaly = if category == "Electronics" && date.month() == 9 {
                rng.gen_range(-12_000.0..-8_000.0)
            } else {
                0.0
            };

            let revenue = (base + trend + anomaly + normal(&mut rng, 3_000.0)).max(REVENUE_FLOOR);
            let orders = (revenue / rng.gen_range(85.0..125.0)).floor();
            let conversion_rate = rng.gen_range(2.5..4.5);
            let traffic = (orders / (conversion_rate / 100.0)).floor();
            let marketing = revenue * rng.gen_range(0.08..0.15);

            rows.push(vec![
                date.format("%Y-%m-%d").to_string(),
                category.to_string(),
                round2(revenue).to_string(),
                (orders as u64).to_string(),
                round2(conversion_rate).to_string(),
                round2(revenue / orders).to_string(),
                (traffic as u64).to_string(),
                round2(marketing).to_string(),
            ]);
        }
    }

    // Blank revenue and orders independently
    for col in [2, 3] {
        for row in rows.iter_mut() {
            if rng.gen::<f64>() < MISSING_RATE {
                row[col] = String::new();
            }
        }
    }

    let duplicates: Vec<Vec<String>> = rows
        .choose_multiple(&mut rng, DUPLICATE_ROWS)
        .cloned()
        .collect();
    rows.extend(duplicates);
    rows.shuffle(&mut rng);

    Ok(Table {
        headers: HEADERS.iter().map(|h| h.to_string()).collect(),
        rows,
    })
}

/// Several independently seeded datasets stacked into one
pub fn generate_large(seed: u64, copies: u64) -> Result<Table> {
    let mut table = generate(seed)?;
    for offset in 1..copies {
        table.rows.extend(generate(seed + offset)?.rows);
    }
    Ok(table)
}

pub fn write_dataset(path: &Path, table: &Table) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    table.write(path)?;
    info!(path = %path.display(), rows = table.rows.len(), "Sample dataset written");
    Ok(())
}

/// Box-Muller draw from N(0, std)
fn normal(rng: &mut StdRng, std: f64) -> f64 {
    let u1: f64 = rng.gen_range(f64::EPSILON..1.0);
    let u2: f64 = rng.gen();
    (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos() * std
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::table::parse_number;

    #[test]
    fn test_shape_and_duplicates() {
        let table = generate(DEFAULT_SEED).unwrap();
        // 92 days x 4 categories + 15 duplicates
        assert_eq!(table.rows.len(), 92 * 4 + 15);
        assert_eq!(table.headers.len(), 8);

        let mut deduped = table.clone();
        assert!(deduped.dedup_rows() >= 1);
    }

    #[test]
    fn test_same_seed_same_data() {
        assert_eq!(generate(7).unwrap(), generate(7).unwrap());
        assert_ne!(generate(7).unwrap(), generate(8).unwrap());
    }

    #[test]
    fn test_revenue_floor_and_missing_cells() {
        let table = generate(DEFAULT_SEED).unwrap();
        let revenue = table.column_index("revenue").unwrap();
        let values: Vec<Option<f64>> =
            table.rows.iter().map(|r| parse_number(&r[revenue])).collect();
        assert!(values.iter().flatten().all(|v| *v >= REVENUE_FLOOR));
        assert!(values.iter().any(|v| v.is_none()));
    }

    #[test]
    fn test_large_variant_stacks_copies() {
        let large = generate_large(1, 3).unwrap();
        assert_eq!(large.rows.len(), 3 * (92 * 4 + 15));
    }
}
