//! On-disk trial log
//!
//! `trials.jsonl` gets one JSON line per completed trial as it finishes,
//! `best_trial.json` is written once at the end of the run. Nothing here is
//! read back.

use super::trial::TrialRecord;
use crate::error::Result;
use parking_lot::Mutex;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub const TRIALS_FILE: &str = "trials.jsonl";
pub const BEST_TRIAL_FILE: &str = "best_trial.json";

#[derive(Debug)]
pub struct CheckpointWriter {
    dir: PathBuf,
    trials: Mutex<BufWriter<File>>,
}

impl CheckpointWriter {
    /// Create the directory if needed and start a fresh trial log
    pub fn create(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        let file = File::create(dir.join(TRIALS_FILE))?;
        debug!(dir = %dir.display(), "Checkpoint directory ready");
        Ok(Self {
            dir,
            trials: Mutex::new(BufWriter::new(file)),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Append one trial and flush
    pub fn append(&self, record: &TrialRecord) -> Result<()> {
        let line = serde_json::to_string(record)?;
        let mut out = self.trials.lock();
        writeln!(out, "{}", line)?;
        out.flush()?;
        Ok(())
    }

    pub fn write_best(&self, record: &TrialRecord) -> Result<()> {
        let path = self.dir.join(BEST_TRIAL_FILE);
        fs::write(&path, serde_json::to_vec_pretty(record)?)?;
        info!(path = %path.display(), trial_id = record.trial_id, "Best trial written");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::training::BinaryClassificationMetrics;
    use ndarray::array;

    #[test]
    fn test_trials_and_best_are_written() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("run");
        let writer = CheckpointWriter::create(&dir).unwrap();

        let metrics = BinaryClassificationMetrics::compute(&array![1.0, 0.0], &array![0.9, 0.1], 0.5).unwrap();
        let first = TrialRecord::new(1, "featurize > fast_tree", None, Default::default(), 0.8, metrics.clone(), 3);
        let second = TrialRecord::new(2, "featurize > lightgbm", None, Default::default(), 0.9, metrics, 4);
        writer.append(&first).unwrap();
        writer.append(&second).unwrap();
        writer.write_best(&second).unwrap();

        let log = fs::read_to_string(dir.join(TRIALS_FILE)).unwrap();
        let parsed: Vec<TrialRecord> = log.lines().map(|l| serde_json::from_str(l).unwrap()).collect();
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[1].trial_id, 2);

        let best: TrialRecord = serde_json::from_str(&fs::read_to_string(dir.join(BEST_TRIAL_FILE)).unwrap()).unwrap();
        assert_eq!(best.pipeline, "featurize > lightgbm");
    }
}
