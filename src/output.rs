use crate::models::EvalReport;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Output format options
#[derive(Debug, Clone, ValueEnum, Serialize, Deserialize)]
pub enum OutputFormat {
    Plain,
    Json,
}

/// Print evaluation reports in the specified format
pub fn print_reports(reports: &[EvalReport], format: OutputFormat) {
    match format {
        OutputFormat::Plain => print_plain(reports),
        OutputFormat::Json => print_json(reports),
    }
}

/// Print reports in plain text format
fn print_plain(reports: &[EvalReport]) {
    for (i, report) in reports.iter().enumerate() {
        println!("=== Evaluation {} ===", i + 1);
        println!();

        // Print statistics
        println!("📊 STATISTICS");
        println!("-------------");
        print_statistics_plain(&report.statistics);
        println!();

        // Print individual rows
        println!("📝 DETAILED RESULTS");
        println!("-------------------");
        for (j, row_result) in report.rows.iter().enumerate() {
            println!("Row #{}", j + 1);
            println!(
                "Request: {}",
                serde_json::Value::Object(row_result.row.request.clone())
            );
            println!("Response: {}", row_result.row.response);
            println!("Scores:");
            for result in &row_result.scores {
                match &result.rationale {
                    Some(rationale) => {
                        println!("  • {}: {} ({})", result.name, result.score, rationale)
                    }
                    None => println!("  • {}: {}", result.name, result.score),
                }
            }
            println!();
        }

        if i < reports.len() - 1 {
            println!("{}", "=".repeat(50));
            println!();
        }
    }
}

/// Print statistics in plain text format
fn print_statistics_plain(stats: &crate::models::Statistics) {
    let metrics: Vec<_> = stats.mean.keys().collect();

    if metrics.is_empty() {
        println!("No statistics available.");
        return;
    }

    // Print header
    println!(
        "{:<15} {:<8} {:<8} {:<8}",
        "Metric", "Mean", "Median", "Mode"
    );
    println!("{}", "-".repeat(45));

    for metric in metrics {
        let mean = stats.mean.get(metric).unwrap_or(&0.0);
        let median = stats.median.get(metric).unwrap_or(&0.0);
        let mode = stats.mode.get(metric).unwrap_or(&0.0);

        println!(
            "{:<15} {:<8.3} {:<8.3} {:<8.3}",
            metric, mean, median, mode
        );
    }
}

/// Print reports in JSON format
fn print_json(reports: &[EvalReport]) {
    match serde_json::to_string_pretty(reports) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Error serializing reports to JSON: {}", e),
    }
}
