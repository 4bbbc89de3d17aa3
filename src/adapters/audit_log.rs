//! Local CSV audit mirror
//!
//! Disaster-recovery copy of sentinel records, kept alongside the primary
//! Postgres sink. The header row is written exactly once, on the first append
//! to a file that does not already exist.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::domain::SentinelRecord;
use crate::error::{Result, SentinelError};

const HEADER: &str = "timestamp,z_score,sentiment,state,governance,anomaly_counter";

pub struct AuditLog {
    path: PathBuf,
}

impl AuditLog {
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(dir) = path.parent() {
            if !dir.as_os_str().is_empty() {
                std::fs::create_dir_all(dir)?;
            }
        }
        Ok(Self { path })
    }

    /// Append one record, emitting the header first if the file is new
    pub fn append(&self, record: &SentinelRecord) -> Result<()> {
        let needs_header = !self.path.exists();

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| SentinelError::AuditLog(format!("{}: {}", self.path.display(), e)))?;

        if needs_header {
            writeln!(file, "{}", HEADER)?;
        }

        writeln!(
            file,
            "{},{},{},{},{},{}",
            record.timestamp.to_rfc3339(),
            record.z_score,
            record.sentiment,
            record.state,
            // Verdict text may contain commas in future formats; keep it quoted.
            csv_quote(&record.governance),
            record.anomaly_counter,
        )?;

        Ok(())
    }
}

fn csv_quote(field: &str) -> String {
    if field.contains(',') || field.contains('"') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}
