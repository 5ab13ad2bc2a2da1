//! Best-effort progress record for external monitors.

use std::path::PathBuf;

use tracing::warn;

use crate::models::BatchState;

/// Overwrites a JSON progress snapshot after every item and batch boundary.
/// Write failures are logged and never stop the run; readers must tolerate
/// torn reads.
pub struct ProgressWriter {
    path: PathBuf,
}

impl ProgressWriter {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn write(&self, state: &BatchState) {
        match serde_json::to_vec_pretty(state) {
            Ok(bytes) => {
                if let Err(e) = std::fs::write(&self.path, bytes) {
                    warn!(path = %self.path.display(), error = %e, "failed to write progress record");
                }
            }
            Err(e) => warn!(error = %e, "failed to serialize progress record"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RunPhase;

    #[test]
    fn writes_overwrite_the_previous_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("progress.json");
        let writer = ProgressWriter::new(path.clone());

        writer.write(&BatchState::new(1, 4, RunPhase::Processing, "first"));
        writer.write(&BatchState::new(2, 4, RunPhase::Processing, "second"));

        let state: BatchState =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(state.current, 2);
        assert_eq!(state.percentage, 50.0);
        assert_eq!(state.message, "second");
    }

    #[test]
    fn unwritable_path_does_not_panic() {
        let writer = ProgressWriter::new(PathBuf::from("/nonexistent-dir/progress.json"));
        writer.write(&BatchState::new(0, 1, RunPhase::Starting, "start"));
    }
}
