//! Result sinks
//!
//! A sweep appends one `RunRecord` per simulated MTTF. The CSV sink writes
//! and flushes each row as it arrives so a run that dies halfway keeps every
//! finished row; the JSON sink buffers and writes a single document at the end.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::Utc;

use checkpoint_core::{Result, ResultSink, RunRecord, SimError};

pub const CSV_HEADER: &str = "mttf_hours,overhead_percent,failures,incomplete_jobs";

/// Comma-separated results with a commented preamble
pub struct CsvSink<W: Write> {
    out: W,
}

impl CsvSink<BufWriter<File>> {
    /// Create (or truncate) `path` and write the preamble
    pub fn create(path: impl AsRef<Path>, description: &str) -> Result<Self> {
        let file = File::create(path.as_ref())?;
        Self::new(BufWriter::new(file), description)
    }
}

impl<W: Write> CsvSink<W> {
    pub fn new(mut out: W, description: &str) -> Result<Self> {
        writeln!(out, "# created {}", Utc::now().to_rfc3339())?;
        writeln!(out, "# {description}")?;
        writeln!(out)?;
        writeln!(out, "{CSV_HEADER}")?;
        out.flush()?;
        Ok(CsvSink { out })
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> ResultSink for CsvSink<W> {
    fn append(&mut self, record: &RunRecord) -> Result<()> {
        let overhead = (record.overhead_percent * 100.0).round() / 100.0;
        writeln!(
            self.out,
            "{},{:.2},{},{}",
            record.mttf_hours, overhead, record.failure_count, record.incomplete_jobs
        )?;
        self.out.flush()?;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.out.flush()?;
        Ok(())
    }
}

/// Pretty-printed JSON array of every record, written on `finish`
pub struct JsonSink {
    path: PathBuf,
    records: Vec<RunRecord>,
}

impl JsonSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        JsonSink {
            path: path.into(),
            records: Vec::new(),
        }
    }

    pub fn records(&self) -> &[RunRecord] {
        &self.records
    }
}

impl ResultSink for JsonSink {
    fn append(&mut self, record: &RunRecord) -> Result<()> {
        self.records.push(record.clone());
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        let json = serde_json::to_string_pretty(&self.records)
            .map_err(|e| SimError::serialization(e.to_string()))?;
        std::fs::write(&self.path, json)?;
        Ok(())
    }
}
