//! Batch report artifacts.
//!
//! A report is persisted as `<dir>/<run_id>/report.json` next to
//! `report.digest`, the SHA-256 of the JSON bytes. Reading verifies the
//! digest before deserializing.

use std::path::{Path, PathBuf};

use draftfix_ledger::ContentDigest;

use crate::domain::{DraftfixError, Result};
use crate::pipeline::BatchReport;

const REPORT_FILE: &str = "report.json";
const DIGEST_FILE: &str = "report.digest";

/// Persist `report` and its digest. Returns the JSON path.
pub fn write_batch_report(report: &BatchReport, dir: &Path) -> Result<PathBuf> {
    let run_dir = dir.join(&report.run_id);
    std::fs::create_dir_all(&run_dir)?;

    let path = run_dir.join(REPORT_FILE);
    let json = serde_json::to_vec_pretty(report)?;
    let digest = ContentDigest::from_bytes(&json);

    std::fs::write(&path, &json)?;
    std::fs::write(run_dir.join(DIGEST_FILE), digest.as_str().as_bytes())?;

    Ok(path)
}

/// Read `<dir>/<run_id>/report.json` and verify it against its digest.
pub fn read_batch_report(run_id: &str, dir: &Path) -> Result<BatchReport> {
    let run_dir = dir.join(run_id);
    let json = std::fs::read(run_dir.join(REPORT_FILE))?;
    let expected = std::fs::read_to_string(run_dir.join(DIGEST_FILE))?;
    let expected = expected.trim();

    let actual = ContentDigest::from_bytes(&json);
    if expected != actual.as_str() {
        return Err(DraftfixError::DigestMismatch {
            expected: expected.to_string(),
            actual: actual.as_str().to_string(),
        });
    }
    Ok(serde_json::from_slice(&json)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::MetricsSnapshot;
    use crate::pipeline::BatchCounts;
    use chrono::Utc;

    fn report() -> BatchReport {
        BatchReport {
            run_id: "run-1".to_string(),
            started_at: Utc::now(),
            finished_at: Utc::now(),
            drafts: Vec::new(),
            not_started: vec!["late".into()],
            faulted: Vec::new(),
            cancelled: true,
            counts: BatchCounts {
                not_started: 1,
                ..BatchCounts::default()
            },
            metrics: MetricsSnapshot::default(),
        }
    }

    #[test]
    fn written_report_reads_back() {
        let dir = tempfile::tempdir().unwrap();
        let original = report();
        let path = write_batch_report(&original, dir.path()).unwrap();
        assert!(path.ends_with("run-1/report.json"));

        let loaded = read_batch_report("run-1", dir.path()).unwrap();
        assert_eq!(loaded, original);
    }

    #[test]
    fn tampered_report_fails_digest_check() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_batch_report(&report(), dir.path()).unwrap();

        let mut json = std::fs::read_to_string(&path).unwrap();
        json = json.replace("\"cancelled\": true", "\"cancelled\": false");
        std::fs::write(&path, json).unwrap();

        let err = read_batch_report("run-1", dir.path()).unwrap_err();
        assert!(matches!(err, DraftfixError::DigestMismatch { .. }));
    }

    #[test]
    fn missing_report_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_batch_report("nope", dir.path()).unwrap_err();
        assert!(matches!(err, DraftfixError::Io(_)));
    }
}
