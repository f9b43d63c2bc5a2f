// =============================================================================
// Signal History — append-only JSONL log of final signals
// =============================================================================
//
// One JSON object per line. A signal whose `run_id` or `content_hash` is
// already in the log is not written again, and existing lines are never
// rewritten. The latest signal is also mirrored to a standalone JSON file
// with the atomic tmp + rename write used for config files.

use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::signal_record::FinalSignal;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendOutcome {
    Appended,
    Duplicate,
}

#[derive(Debug, Clone)]
pub struct SignalHistory {
    path: PathBuf,
}

impl SignalHistory {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Every signal in the log, oldest first. A missing file is an empty
    /// history; unparseable lines are skipped with a warning.
    pub fn load_all(&self) -> Result<Vec<FinalSignal>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let file = fs::File::open(&self.path)
            .with_context(|| format!("failed to open signal history {}", self.path.display()))?;

        let mut signals = Vec::new();
        for (n, line) in BufReader::new(file).lines().enumerate() {
            let line = line.with_context(|| format!("failed to read line {} of {}", n + 1, self.path.display()))?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<FinalSignal>(&line) {
                Ok(signal) => signals.push(signal),
                Err(e) => warn!(path = %self.path.display(), line = n + 1, error = %e, "skipping unreadable history line"),
            }
        }
        Ok(signals)
    }

    pub fn append(&self, signal: &FinalSignal) -> Result<AppendOutcome> {
        let existing = self.load_all()?;
        if existing
            .iter()
            .any(|s| s.run_id == signal.run_id || s.content_hash == signal.content_hash)
        {
            info!(run_id = %signal.run_id, "signal already recorded, skipping append");
            return Ok(AppendOutcome::Duplicate);
        }

        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir).with_context(|| format!("failed to create {}", dir.display()))?;
        }

        let line = serde_json::to_string(signal).context("failed to serialise signal")?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("failed to open signal history {}", self.path.display()))?;
        writeln!(file, "{line}").with_context(|| format!("failed to append to {}", self.path.display()))?;

        info!(
            run_id = %signal.run_id,
            path = %self.path.display(),
            "signal appended to history"
        );
        Ok(AppendOutcome::Appended)
    }
}

/// Write `signal` to `path` as pretty JSON (write `.tmp`, then rename).
pub fn write_latest(signal: &FinalSignal, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let content = serde_json::to_string_pretty(signal).context("failed to serialise latest signal")?;
    write_atomic(path, &content)?;
    info!(path = %path.display(), "latest signal written (atomic)");
    Ok(())
}

/// Write `content` to `path` through a `.tmp` sibling and a rename.
pub fn write_atomic(path: &Path, content: &str) -> Result<()> {
    let tmp_path = path.with_extension("tmp");
    fs::write(&tmp_path, content).with_context(|| format!("failed to write {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("failed to rename tmp file to {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fusion::{fuse, FusionParams};
    use crate::guardrail;
    use crate::signal_record::RunContext;
    use crate::types::Modality;
    use chrono::{TimeZone, Utc};
    use std::collections::BTreeMap;

    fn temp_path(ext: &str) -> PathBuf {
        std::env::temp_dir().join(format!("alpha-fusion-{}.{ext}", uuid::Uuid::new_v4()))
    }

    fn signal(minute: u32) -> FinalSignal {
        let weights = BTreeMap::from([(Modality::Technical, 1.0)]);
        let fused = fuse(&BTreeMap::new(), &weights, 0.15, &FusionParams::default());
        let verdict = guardrail::apply(&fused, 0.5);
        FinalSignal::new(
            RunContext {
                symbol: "BTC/USDT".into(),
                horizon_hours: 4,
                spot: 60_000.0,
                timestamp: Utc.with_ymd_and_hms(2026, 1, 1, 0, minute, 0).unwrap(),
            },
            fused,
            verdict,
            Vec::new(),
            None,
        )
    }

    #[test]
    fn missing_file_is_empty_history() {
        let history = SignalHistory::new(temp_path("jsonl"));
        assert!(history.load_all().unwrap().is_empty());
    }

    #[test]
    fn append_is_idempotent() {
        let path = temp_path("jsonl");
        let history = SignalHistory::new(&path);
        let first = signal(0);

        assert_eq!(history.append(&first).unwrap(), AppendOutcome::Appended);
        assert_eq!(history.append(&first).unwrap(), AppendOutcome::Duplicate);

        // Same content under a fresh run id is still a duplicate.
        let replay = signal(0);
        assert_ne!(replay.run_id, first.run_id);
        assert_eq!(history.append(&replay).unwrap(), AppendOutcome::Duplicate);

        assert_eq!(history.append(&signal(5)).unwrap(), AppendOutcome::Appended);

        let loaded = history.load_all().unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0], first);
        let _ = fs::remove_file(path);
    }

    #[test]
    fn corrupt_lines_are_skipped() {
        let path = temp_path("jsonl");
        let history = SignalHistory::new(&path);
        history.append(&signal(1)).unwrap();
        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        writeln!(file, "{{not json").unwrap();
        history.append(&signal(2)).unwrap();
        assert_eq!(history.load_all().unwrap().len(), 2);
        let _ = fs::remove_file(path);
    }

    #[test]
    fn latest_is_replaced_atomically() {
        let path = temp_path("json");
        write_latest(&signal(1), &path).unwrap();
        let second = signal(2);
        write_latest(&second, &path).unwrap();
        let back: FinalSignal = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(back, second);
        assert!(!path.with_extension("tmp").exists());
        let _ = fs::remove_file(path);
    }
}
