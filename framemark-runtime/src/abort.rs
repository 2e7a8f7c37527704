//! Record log, flush discipline, abort-record assembly, and the session
//! entry watchdog.
//!
//! The log flushes at most once per suite. Abort records only enter through
//! [`RecordLog::abort_and_flush`], so "at most one abort per session" falls
//! out of the same flag instead of needing separate bookkeeping.

use std::io;

use crate::error::HarnessError;
use crate::record::{AbortCode, AbortRecord, PartialTrial, Record, RecordCommon, TrialRecord};

/// Receives one serialized NDJSON payload per suite.
pub trait RecordSink {
    fn persist(&mut self, ndjson: &str) -> io::Result<()>;
}

/// Captures flushes in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    pub flushes: Vec<String>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<&str> {
        self.flushes
            .iter()
            .flat_map(|f| f.lines())
            .filter(|l| !l.trim().is_empty())
            .collect()
    }
}

impl RecordSink for MemorySink {
    fn persist(&mut self, ndjson: &str) -> io::Result<()> {
        self.flushes.push(ndjson.to_string());
        Ok(())
    }
}

/// Accumulated records for one suite, flushed once at a terminal edge.
#[derive(Debug, Default)]
pub struct RecordLog {
    records: Vec<Record>,
    flushed: bool,
    flushed_count: usize,
}

impl RecordLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a completed trial. Returns false (and drops the record) if the
    /// log has already flushed; nothing may land after the terminal edge.
    pub fn append_trial(&mut self, record: TrialRecord) -> bool {
        if self.flushed {
            return false;
        }
        self.records.push(Record::Trial(record));
        true
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn has_records(&self) -> bool {
        !self.records.is_empty()
    }

    pub fn trial_count(&self) -> usize {
        self.records.iter().filter(|r| !r.is_abort()).count()
    }

    pub fn abort_count(&self) -> usize {
        self.records.iter().filter(|r| r.is_abort()).count()
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn is_flushed(&self) -> bool {
        self.flushed
    }

    /// Records written by the successful flush, 0 before (or without) one.
    pub fn flushed_count(&self) -> usize {
        self.flushed_count
    }

    /// Serialize the current contents as one NDJSON document.
    pub fn to_ndjson(&self) -> Result<String, serde_json::Error> {
        let mut out = String::new();
        for record in &self.records {
            out.push_str(&serde_json::to_string(record)?);
            out.push('\n');
        }
        Ok(out)
    }

    /// Flush everything to the sink. Idempotent: the second and later calls
    /// write nothing and return 0.
    pub fn flush(&mut self, sink: &mut dyn RecordSink) -> Result<usize, HarnessError> {
        if self.flushed {
            return Ok(0);
        }
        if self.records.is_empty() {
            self.flushed = true;
            return Ok(0);
        }

        let payload = self.to_ndjson()?;
        sink.persist(&payload).map_err(HarnessError::Sink)?;

        // Marked only after the sink accepted the payload, so a failed
        // flush can be retried.
        self.flushed = true;
        self.flushed_count = self.records.len();
        Ok(self.flushed_count)
    }

    /// Append an abort record and flush, as one terminal step. If the log
    /// already flushed this is a no-op returning false, which is what keeps
    /// a session to at most one abort record.
    pub fn abort_and_flush(
        &mut self,
        abort: AbortRecord,
        sink: &mut dyn RecordSink,
    ) -> Result<bool, HarnessError> {
        if self.flushed {
            return Ok(false);
        }
        self.records.push(Record::Abort(abort));
        self.flush(sink)?;
        Ok(true)
    }
}

/// Snapshot of the active trial at the moment of an abort.
#[derive(Debug, Clone, Copy, Default)]
pub struct PartialProbe {
    pub elapsed_ms: f64,
    pub primary_frames: u64,
    pub secondary_frames: u64,
    pub observed_views: u32,
}

/// Assemble the terminal abort record for a cut-short session.
pub fn build_abort_record(
    common: RecordCommon,
    code: AbortCode,
    reason: impl Into<String>,
    expected_max_views: u32,
    probe: PartialProbe,
) -> AbortRecord {
    AbortRecord {
        common,
        aborted: true,
        abort_code: code,
        abort_reason: reason.into(),
        observed_view_count: probe.observed_views,
        expected_max_views,
        partial_trial: PartialTrial {
            elapsed_ms: probe.elapsed_ms,
            frames_collected_primary: probe.primary_frames,
            frames_collected_secondary: probe.secondary_frames,
        },
    }
}

/// What [`EntryWatchdog::check`] concluded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchdogVerdict {
    /// Not armed; nothing to supervise.
    Inactive,
    /// Armed, deadline not reached.
    Waiting,
    /// Deadline passed with no entry in flight. Fires once, then disarms.
    Expired,
}

/// Supervises session entry after a windowed phase.
///
/// A single optional deadline makes re-arming safe: arming again simply
/// replaces the deadline, and expiry disarms, so the watchdog can never
/// double-fire.
#[derive(Debug, Clone, Copy)]
pub struct EntryWatchdog {
    deadline_ms: Option<f64>,
    timeout_ms: f64,
    grace_ms: f64,
}

impl EntryWatchdog {
    pub fn new(timeout_ms: u64, grace_ms: u64) -> Self {
        Self {
            deadline_ms: None,
            timeout_ms: timeout_ms as f64,
            grace_ms: grace_ms as f64,
        }
    }

    pub fn arm(&mut self, now_ms: f64) {
        self.deadline_ms = Some(now_ms + self.timeout_ms);
    }

    pub fn cancel(&mut self) {
        self.deadline_ms = None;
    }

    pub fn is_armed(&self) -> bool {
        self.deadline_ms.is_some()
    }

    /// Evaluate the deadline. While an entry request is in flight an expired
    /// deadline extends by the grace interval instead of firing; the
    /// environment may be showing a consent prompt we must not race.
    pub fn check(&mut self, now_ms: f64, entry_in_flight: bool) -> WatchdogVerdict {
        let Some(deadline) = self.deadline_ms else {
            return WatchdogVerdict::Inactive;
        };

        if now_ms < deadline {
            return WatchdogVerdict::Waiting;
        }

        if entry_in_flight {
            self.deadline_ms = Some(now_ms + self.grace_ms);
            return WatchdogVerdict::Waiting;
        }

        self.deadline_ms = None;
        WatchdogVerdict::Expired
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SuiteConfig;
    use crate::plan::Condition;
    use crate::record::{SuiteMeta, SurfaceMode};
    use crate::stats::{derive_extras, Summary};

    fn test_common(mode: SurfaceMode) -> RecordCommon {
        SuiteMeta::stamped("gl", "builtin://torus", "fm-log-test").common(
            &SuiteConfig::default(),
            mode,
            Condition {
                instance_count: 100,
                trial: 1,
            },
            1,
            2,
            1,
        )
    }

    fn test_trial() -> TrialRecord {
        let summary = Summary {
            frames: 2,
            duration_ms: 33.4,
            mean_ms: 16.7,
            p50_ms: 16.7,
            p95_ms: 16.7,
            p99_ms: 16.7,
        };
        let extras = derive_extras(&summary, &[16.7, 16.7]);
        TrialRecord {
            common: test_common(SurfaceMode::Windowed),
            summary,
            extras,
            perf: None,
            xr_viewports: None,
            xr_cadence_secondary: None,
            xr_effective_pixels: None,
            raw_samples: None,
            raw_samples_secondary: None,
        }
    }

    fn test_abort() -> AbortRecord {
        build_abort_record(
            test_common(SurfaceMode::Immersive),
            AbortCode::SessionEndedEarly,
            "session ended with 1 of 2 conditions remaining",
            2,
            PartialProbe {
                elapsed_ms: 120.0,
                primary_frames: 7,
                secondary_frames: 7,
                observed_views: 2,
            },
        )
    }

    #[test]
    fn test_flush_writes_once() {
        let mut log = RecordLog::new();
        let mut sink = MemorySink::new();

        assert!(log.append_trial(test_trial()));
        assert!(log.append_trial(test_trial()));

        assert_eq!(log.flush(&mut sink).unwrap(), 2);
        assert_eq!(sink.flushes.len(), 1);
        assert_eq!(sink.lines().len(), 2);

        // Second flush is a no-op.
        assert_eq!(log.flush(&mut sink).unwrap(), 0);
        assert_eq!(sink.flushes.len(), 1);
        assert_eq!(log.flushed_count(), 2);
    }

    #[test]
    fn test_append_after_flush_is_dropped() {
        let mut log = RecordLog::new();
        let mut sink = MemorySink::new();

        log.append_trial(test_trial());
        log.flush(&mut sink).unwrap();

        assert!(!log.append_trial(test_trial()));
        assert_eq!(log.len(), 1);
    }

    #[test]
    fn test_at_most_one_abort_record() {
        let mut log = RecordLog::new();
        let mut sink = MemorySink::new();

        log.append_trial(test_trial());
        assert!(log.abort_and_flush(test_abort(), &mut sink).unwrap());

        // A second abort (e.g. Ended arriving while draining after a
        // view-count abort) must not produce a second record.
        assert!(!log.abort_and_flush(test_abort(), &mut sink).unwrap());

        assert_eq!(log.abort_count(), 1);
        assert_eq!(log.trial_count(), 1);
        assert_eq!(sink.flushes.len(), 1);
        assert_eq!(sink.lines().len(), 2);
    }

    #[test]
    fn test_abort_after_normal_flush_is_noop() {
        let mut log = RecordLog::new();
        let mut sink = MemorySink::new();

        log.append_trial(test_trial());
        log.flush(&mut sink).unwrap();

        assert!(!log.abort_and_flush(test_abort(), &mut sink).unwrap());
        assert_eq!(log.abort_count(), 0);
    }

    #[test]
    fn test_empty_flush_marks_without_writing() {
        let mut log = RecordLog::new();
        let mut sink = MemorySink::new();
        assert_eq!(log.flush(&mut sink).unwrap(), 0);
        assert!(log.is_flushed());
        assert!(sink.flushes.is_empty());
    }

    #[test]
    fn test_failed_flush_can_retry() {
        struct FailingOnce {
            failed: bool,
            inner: MemorySink,
        }
        impl RecordSink for FailingOnce {
            fn persist(&mut self, ndjson: &str) -> io::Result<()> {
                if !self.failed {
                    self.failed = true;
                    return Err(io::Error::new(io::ErrorKind::Other, "disk full"));
                }
                self.inner.persist(ndjson)
            }
        }

        let mut log = RecordLog::new();
        let mut sink = FailingOnce {
            failed: false,
            inner: MemorySink::new(),
        };

        log.append_trial(test_trial());
        assert!(log.flush(&mut sink).is_err());
        assert!(!log.is_flushed());

        assert_eq!(log.flush(&mut sink).unwrap(), 1);
        assert_eq!(sink.inner.flushes.len(), 1);
    }

    #[test]
    fn test_abort_record_fields() {
        let abort = test_abort();
        assert!(abort.aborted);
        assert_eq!(abort.abort_code, AbortCode::SessionEndedEarly);
        assert_eq!(abort.observed_view_count, 2);
        assert_eq!(abort.expected_max_views, 2);
        assert!((abort.partial_trial.elapsed_ms - 120.0).abs() < 1e-9);
        assert_eq!(abort.partial_trial.frames_collected_primary, 7);
    }

    #[test]
    fn test_watchdog_lifecycle() {
        let mut dog = EntryWatchdog::new(1000, 400);
        assert_eq!(dog.check(0.0, false), WatchdogVerdict::Inactive);

        dog.arm(100.0);
        assert_eq!(dog.check(500.0, false), WatchdogVerdict::Waiting);
        assert_eq!(dog.check(1100.0, false), WatchdogVerdict::Expired);

        // Fires once, then reports inactive.
        assert_eq!(dog.check(5000.0, false), WatchdogVerdict::Inactive);
    }

    #[test]
    fn test_watchdog_grace_extension_while_in_flight() {
        let mut dog = EntryWatchdog::new(1000, 400);
        dog.arm(0.0);

        // Deadline reached but request in flight: extend instead of firing.
        assert_eq!(dog.check(1000.0, true), WatchdogVerdict::Waiting);
        assert_eq!(dog.check(1300.0, false), WatchdogVerdict::Waiting);
        assert_eq!(dog.check(1400.0, false), WatchdogVerdict::Expired);
    }

    #[test]
    fn test_watchdog_rearm_replaces_deadline() {
        let mut dog = EntryWatchdog::new(1000, 400);
        dog.arm(0.0);
        dog.arm(5000.0);

        // Old deadline is gone.
        assert_eq!(dog.check(1500.0, false), WatchdogVerdict::Waiting);
        assert_eq!(dog.check(6000.0, false), WatchdogVerdict::Expired);
    }

    #[test]
    fn test_watchdog_cancel() {
        let mut dog = EntryWatchdog::new(1000, 400);
        dog.arm(0.0);
        dog.cancel();
        assert!(!dog.is_armed());
        assert_eq!(dog.check(10_000.0, false), WatchdogVerdict::Inactive);
    }
}
