//! Index-build progress reporting.
//!
//! The builder emits human-readable stage strings through a reporter so
//! users see what is being scanned, embedded, and saved. Progress goes to
//! **stderr** so stdout stays parseable for scripts.

use std::io::Write;

/// Receives one line per pipeline stage. Implementations write to stderr
/// or swallow events.
pub trait ProgressReporter: Send + Sync {
    fn report(&self, stage: &str);
}

/// Human-friendly progress on stderr, one stage per line.
pub struct StderrProgress;

impl ProgressReporter for StderrProgress {
    fn report(&self, stage: &str) {
        let mut stderr = std::io::stderr().lock();
        let _ = writeln!(stderr, "{stage}");
        let _ = stderr.flush();
    }
}

/// No-op reporter when progress is disabled.
pub struct NoProgress;

impl ProgressReporter for NoProgress {
    fn report(&self, _stage: &str) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct RecordingProgress(Mutex<Vec<String>>);

    impl ProgressReporter for RecordingProgress {
        fn report(&self, stage: &str) {
            self.0.lock().unwrap().push(stage.to_string());
        }
    }

    #[test]
    fn reporters_accept_stages() {
        StderrProgress.report("stage one");
        NoProgress.report("stage two");

        let recorder = RecordingProgress(Mutex::new(Vec::new()));
        recorder.report("stage three");
        assert_eq!(recorder.0.lock().unwrap().as_slice(), ["stage three"]);
    }
}
