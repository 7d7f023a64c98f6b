/*
 * Copyright (c) Microsoft Corporation.
 * Licensed under the MIT license.
 */

//! Per-phase task timing, dumped to `time.log` on request.

use std::fs::File;
use std::io::{self, Write};
use std::path::Path;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Collects labelled phase durations over a run.
#[derive(Debug)]
pub struct TimeLog {
    enabled: bool,
    entries: Mutex<Vec<(String, Duration)>>,
}

impl TimeLog {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            entries: Mutex::new(Vec::new()),
        }
    }

    /// Run `f`, recording its wall time under `label`.
    pub fn time<R>(&self, label: &str, f: impl FnOnce() -> R) -> R {
        let start = Instant::now();
        let out = f();
        let elapsed = start.elapsed();

        tracing::debug!(task = label, micros = elapsed.as_micros() as u64, "task finished");
        if let Ok(mut entries) = self.entries.lock() {
            entries.push((label.to_string(), elapsed));
        }
        out
    }

    /// Write the recorded timings to `path`, one `label: N us` line per
    /// phase. A no-op unless timing output was requested.
    pub fn dump_to(&self, path: &Path) -> io::Result<()> {
        if !self.enabled {
            return Ok(());
        }

        let mut file = File::create(path)?;
        if let Ok(entries) = self.entries.lock() {
            for (label, elapsed) in entries.iter() {
                writeln!(file, "{label}: {} us", elapsed.as_micros())?;
            }
        }
        file.flush()
    }
}

///////////
// Tests //
///////////

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_and_dumps_phase_timings() {
        let log = TimeLog::new(true);
        let value = log.time("warmup", || 42);
        assert_eq!(value, 42);
        log.time("main phase", || ());

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("time.log");
        log.dump_to(&path).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("warmup: "));
        assert!(lines[0].ends_with(" us"));
        assert!(lines[1].starts_with("main phase: "));
    }

    #[test]
    fn disabled_log_writes_nothing() {
        let log = TimeLog::new(false);
        log.time("phase", || ());

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("time.log");
        log.dump_to(&path).unwrap();
        assert!(!path.exists());
    }
}
