//! Smart Insight Generator
//!
//! Turns a Statistical Analyzer contract into a short findings/actions block that the
//! reporting stage appends to the final report.

use chrono::{DateTime, Local};

use crate::contract::{AnalysisPayload, Contract, TrendDirection};

const STRONG_CORRELATION: f64 = 0.7;

/// Parse a contract from tool output text and synthesize insights from it
pub fn generate_insights(analysis_json: &str) -> String {
    let contract: Contract<AnalysisPayload> = Contract::parse(analysis_json);
    render_insights(&contract, Local::now())
}

pub fn render_insights(contract: &Contract<AnalysisPayload>, at: DateTime<Local>) -> String {
    let stamp = at.format("%Y-%m-%d %H:%M");

    let data = match contract {
        Contract::Error { message, .. } => {
            let actions = [
                "Check dataset path and column names.",
                "Re run the analysis after fixing data issues.",
            ];
            return format!(
                "\nANALYSIS INSIGHTS | {stamp}\n\nFINDINGS:\n  - Analysis tool reported an error: {message}\n\nACTIONS:\n{}\n\nConfidence: 40 percent | Quality: Limited (tool error)\n",
                numbered(&actions[..])
            );
        }
        Contract::Ok(data) => data,
    };

    let mut insights: Vec<String> = Vec::new();
    let mut recommendations: Vec<String> = Vec::new();

    let trend = &data.trend;
    insights.push(format!(
        "{} trend is {} with slope {:.4} over the period.",
        capitalize(&data.target),
        trend.direction,
        trend.slope
    ));
    if trend.direction == TrendDirection::Decreasing {
        recommendations.push(format!(
            "HIGH: Investigate the reasons for the downward {} trend.",
            data.target
        ));
    }

    let strongest = data
        .correlations
        .iter()
        .filter(|(_, v)| v.is_finite())
        .max_by(|a, b| {
            a.1.abs()
                .partial_cmp(&b.1.abs())
                .unwrap_or(std::cmp::Ordering::Equal)
        });
    if let Some((col, val)) = strongest {
        insights.push(format!(
            "Strongest correlation is between {} and {}: {:.2}.",
            data.target, col, val
        ));
        if val.abs() > STRONG_CORRELATION {
            recommendations
                .push("LOW: Use this strong relationship in forecasting and planning.".to_string());
        }
    }

    let by_value = |a: &(&String, &f64), b: &(&String, &f64)| {
        a.1.partial_cmp(b.1).unwrap_or(std::cmp::Ordering::Equal)
    };
    let best = data.segments.iter().max_by(by_value);
    let worst = data.segments.iter().min_by(by_value);
    if let (Some(best), Some(worst)) = (best, worst) {
        if best.0 != worst.0 {
            // A percentage gap only means something against a positive baseline
            if *worst.1 > 0.0 {
                let gap = ((best.1 - worst.1) / worst.1) * 100.0;
                insights.push(format!(
                    "{} segment leads, {} lags, with about {:.0} percent gap.",
                    best.0, worst.0, gap
                ));
            } else {
                insights.push(format!("{} segment leads, {} lags.", best.0, worst.0));
            }
            recommendations.push(format!(
                "MEDIUM: Build a focused improvement plan for the {} segment.",
                worst.0
            ));
        }
    }

    let actions = if recommendations.is_empty() {
        "  1. LOW: No specific actions identified.".to_string()
    } else {
        numbered(&recommendations[..])
    };
    let findings = insights
        .iter()
        .map(|i| format!("  - {}", i))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "\nANALYSIS INSIGHTS | {stamp}\n\nFINDINGS:\n{findings}\n\nACTIONS:\n{actions}\n\nConfidence: 85 percent | Quality: Good\n"
    )
}

fn numbered<S: AsRef<str>>(items: &[S]) -> String {
    items
        .iter()
        .enumerate()
        .map(|(i, item)| format!("  {}. {}", i + 1, item.as_ref()))
        .collect::<Vec<_>>()
        .join("\n")
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}
