//! # Report Module
//!
//! Persistence of the ranking and the auxiliary artifacts of a run.
//!
//! The ranking goes through the [`ReportWriter`] trait (CSV and JSON
//! implementations). The similarity matrix, per-strategy performance table and
//! extracted text dump are plain writer functions used by the binary.

use std::fmt;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use indexmap::IndexMap;

use crate::measurement::StrategyAverages;
use crate::ranking::RankedResult;
use crate::similarity::SimilarityMatrix;
use crate::strategy::StrategyId;

/// Errors raised while persisting reports
#[derive(Debug, Clone, PartialEq)]
pub enum ReportError {
    Io { path: PathBuf, message: String },
    Serialization(String),
}

impl ReportError {
    fn io(path: &Path, err: std::io::Error) -> Self {
        ReportError::Io {
            path: path.to_path_buf(),
            message: err.to_string(),
        }
    }
}

impl fmt::Display for ReportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReportError::Io { path, message } => {
                write!(f, "[REPORT_IO] Failed to write {}: {}", path.display(), message)
            }
            ReportError::Serialization(msg) => write!(f, "[REPORT_SERIALIZE] {}", msg),
        }
    }
}

impl std::error::Error for ReportError {}

/// Persists the ranked rows to `destination`
pub trait ReportWriter: Send + Sync {
    fn write(&self, rows: &[RankedResult], destination: &Path) -> Result<(), ReportError>;
}

/// `Rank,Strategy,Final Score` table
#[derive(Debug, Clone, Copy, Default)]
pub struct CsvReportWriter;

impl ReportWriter for CsvReportWriter {
    fn write(&self, rows: &[RankedResult], destination: &Path) -> Result<(), ReportError> {
        let mut lines = vec!["Rank,Strategy,Final Score".to_string()];
        lines.extend(rows.iter().map(|row| {
            format!("{},{},{:.6}", row.rank, csv_field(row.strategy.as_str()), row.score)
        }));
        write_lines(destination, &lines)
    }
}

/// Pretty-printed JSON array of ranked rows
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonReportWriter;

impl ReportWriter for JsonReportWriter {
    fn write(&self, rows: &[RankedResult], destination: &Path) -> Result<(), ReportError> {
        ensure_parent(destination)?;
        let file = File::create(destination).map_err(|e| ReportError::io(destination, e))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, rows)
            .map_err(|e| ReportError::Serialization(e.to_string()))?;
        writer.flush().map_err(|e| ReportError::io(destination, e))
    }
}

/// Square matrix with strategy names as header row and first column
pub fn write_similarity_matrix_csv(
    matrix: &SimilarityMatrix,
    destination: &Path,
) -> Result<(), ReportError> {
    let mut header = vec!["Strategy".to_string()];
    header.extend(matrix.strategies().iter().map(|s| csv_field(s.as_str())));

    let mut lines = vec![header.join(",")];
    for (id, row) in matrix.strategies().iter().zip(matrix.rows()) {
        let mut cells = vec![csv_field(id.as_str())];
        cells.extend(row.iter().map(|v| format!("{v:.6}")));
        lines.push(cells.join(","));
    }
    write_lines(destination, &lines)
}

/// `Strategy,Average Time (s),Average Memory (MB),Samples` table
pub fn write_performance_csv(
    averages: &IndexMap<StrategyId, StrategyAverages>,
    destination: &Path,
) -> Result<(), ReportError> {
    let mut lines = vec!["Strategy,Average Time (s),Average Memory (MB),Samples".to_string()];
    lines.extend(averages.iter().map(|(id, avg)| {
        format!(
            "{},{:.6},{:.6},{}",
            csv_field(id.as_str()),
            avg.time_seconds,
            avg.memory_mb,
            avg.samples
        )
    }));
    write_lines(destination, &lines)
}

/// Dump each strategy's aggregated text under a `Strategy: <name>` header.
///
/// The file is named `extracted_text_<timestamp>.txt` inside `dir`.
pub fn write_extracted_text(
    texts: &IndexMap<StrategyId, String>,
    dir: &Path,
    timestamp: DateTime<Local>,
) -> Result<PathBuf, ReportError> {
    let path = dir.join(format!(
        "extracted_text_{}.txt",
        timestamp.format("%Y%m%d_%H%M%S")
    ));

    let mut content = String::new();
    for (id, text) in texts {
        content.push_str(&format!("Strategy: {id}\n"));
        content.push_str(text);
        content.push_str("\n\n");
    }

    ensure_parent(&path)?;
    fs::write(&path, content).map_err(|e| ReportError::io(&path, e))?;
    Ok(path)
}

/// Quote a CSV field when it contains a separator, quote or line break
fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

fn ensure_parent(path: &Path) -> Result<(), ReportError> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => {
            fs::create_dir_all(parent).map_err(|e| ReportError::io(parent, e))
        }
        _ => Ok(()),
    }
}

fn write_lines(destination: &Path, lines: &[String]) -> Result<(), ReportError> {
    ensure_parent(destination)?;
    let mut content = lines.join("\n");
    content.push('\n');
    fs::write(destination, content).map_err(|e| ReportError::io(destination, e))
}
