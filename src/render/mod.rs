//! Matrix rendering
//!
//! Turns a validated matrix into an output artifact. Series order from the
//! server is kept in every format.
//!
//! - `csv`: one row per sample (`series,timestamp,value,labels`)
//! - `json`: `{"title": ..., "series": [{"labels": ..., "samples": [[ts, v], ...]}]}`
//! - `ndjson`: one JSON object per sample
//! - `table`: human-readable listing headed by the title

mod output;

pub use output::{write_output, OutputTarget};

use chrono::DateTime;
use std::fmt;
use std::str::FromStr;

use crate::error::{PromalyError, Result};
use crate::query::{Matrix, Sample, Series};

/// Supported output formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Csv,
    Json,
    Ndjson,
    Table,
}

impl OutputFormat {
    /// File extension, also used as the `--file` suffix
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Csv => "csv",
            OutputFormat::Json => "json",
            OutputFormat::Ndjson => "ndjson",
            OutputFormat::Table => "txt",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Csv => write!(f, "csv"),
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Ndjson => write!(f, "ndjson"),
            OutputFormat::Table => write!(f, "table"),
        }
    }
}

impl FromStr for OutputFormat {
    type Err = PromalyError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "csv" => Ok(OutputFormat::Csv),
            "json" => Ok(OutputFormat::Json),
            "ndjson" => Ok(OutputFormat::Ndjson),
            "table" | "txt" | "text" => Ok(OutputFormat::Table),
            other => Err(PromalyError::Config(format!(
                "unknown output format {:?} (expected csv, json, ndjson or table)",
                other
            ))),
        }
    }
}

/// Render `matrix` in the given format
pub fn render(matrix: &Matrix, title: &str, format: OutputFormat) -> Result<Vec<u8>> {
    match format {
        OutputFormat::Csv => format_csv(matrix),
        OutputFormat::Json => format_json(matrix, title),
        OutputFormat::Ndjson => format_ndjson(matrix),
        OutputFormat::Table => Ok(format_table(matrix, title).into_bytes()),
    }
}

fn format_csv(matrix: &Matrix) -> Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(["series", "timestamp", "value", "labels"])?;

    for series in matrix {
        let name = series.to_string();
        let labels = serde_json::to_string(&series.labels)?;

        for sample in &series.samples {
            let timestamp = sample.timestamp.to_string();
            let value = sample.value.to_string();
            writer.write_record([
                name.as_str(),
                timestamp.as_str(),
                value.as_str(),
                labels.as_str(),
            ])?;
        }
    }

    writer
        .into_inner()
        .map_err(|e| PromalyError::Render(e.to_string()))
}

fn format_json(matrix: &Matrix, title: &str) -> Result<Vec<u8>> {
    let series: Vec<serde_json::Value> = matrix
        .iter()
        .map(|series| {
            serde_json::json!({
                "name": series.to_string(),
                "labels": series.labels,
                "samples": series
                    .samples
                    .iter()
                    .map(|s| serde_json::json!([s.timestamp, s.value]))
                    .collect::<Vec<_>>(),
            })
        })
        .collect();

    let document = serde_json::json!({
        "title": title,
        "series": series,
    });

    Ok(serde_json::to_vec_pretty(&document)?)
}

fn format_ndjson(matrix: &Matrix) -> Result<Vec<u8>> {
    let mut out = Vec::new();

    for series in matrix {
        let name = series.to_string();
        for sample in &series.samples {
            let record = serde_json::json!({
                "series": name,
                "labels": series.labels,
                "timestamp": sample.timestamp,
                "value": sample.value,
            });
            serde_json::to_writer(&mut out, &record)?;
            out.push(b'\n');
        }
    }

    Ok(out)
}

fn format_table(matrix: &Matrix, title: &str) -> String {
    let mut out = String::new();
    out.push_str(title);
    out.push('\n');
    out.push_str(&"=".repeat(title.chars().count().max(1)));
    out.push('\n');

    if matrix.is_empty() {
        out.push_str("No data for the selected time range\n");
        return out;
    }

    for series in matrix {
        out.push('\n');
        out.push_str(&series_heading(series));
        out.push('\n');
        out.push_str(&format!("{:<26} {:>16}\n", "Time", "Value"));
        out.push_str(&"-".repeat(43));
        out.push('\n');
        for sample in &series.samples {
            out.push_str(&format!("{:<26} {:>16}\n", format_time(sample), sample.value));
        }
    }

    out
}

fn series_heading(series: &Series) -> String {
    format!("{} ({} samples)", series, series.samples.len())
}

fn format_time(sample: &Sample) -> String {
    DateTime::from_timestamp_millis(sample.timestamp)
        .map(|dt| dt.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string())
        .unwrap_or_else(|| sample.timestamp.to_string())
}
