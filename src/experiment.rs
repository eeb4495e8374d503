use crate::bank::Bank;
use crate::candidate::Candidate;
use crate::error::Result;
use crate::param::Param;
use log::warn;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Complete record of one selection run
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Experiment {
    /// Experiment ID, i.e. save name, mode and timestamp
    pub id: String,
    /// Timestamp of the experiment
    pub timestamp: String,
    /// copheselect version and git hash used
    pub copheselect_version: String,
    /// Parameters used
    pub parameters: Param,
    /// SHA-256 fingerprint of the design matrix and target
    pub data_hash: String,

    /// Feature names indexed by feature id
    pub features: Vec<String>,
    /// Best candidate found
    pub best: Candidate,
    /// Bank after the last generation
    pub final_bank: Bank,
    /// Best score of the seed bank then after each generation (empty without keep_trace)
    pub best_score_trace: Vec<f64>,
    /// Generations completed
    pub generations: usize,

    /// Execution time in seconds
    pub execution_time: f64,
}

impl Experiment {
    /// Names of the best feature set, sorted
    pub fn best_features(&self) -> Vec<String> {
        self.best.features.iter().map(|&f| self.features[f].clone()).collect()
    }

    /// Saves the experiment in a format chosen from the file extension.
    pub fn save_auto<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_ascii_lowercase();

        match ext.as_str() {
            "json" => self.save_json(path),
            "bin" | "bincode" => self.save_bincode(path),
            _ => {
                warn!("Unknown format. Saving experiment in bincode.");
                self.save_bincode(path.with_extension("bin"))
            }
        }
    }

    /// Saves to JSON (human readable)
    fn save_json<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Saves as Bincode (compact binary, Rust-only)
    fn save_bincode<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let encoded = bincode::serialize(self)?;
        std::fs::write(path, encoded)?;
        Ok(())
    }

    /// Loads an experiment, detecting the format from the extension and
    /// falling back to trying every format.
    pub fn load_auto<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_ascii_lowercase();

        match ext.as_str() {
            "json" => Self::load_json(path),
            "bin" | "bincode" => Self::load_bincode(path),
            _ => Self::load_bincode(path).or_else(|_| Self::load_json(path)),
        }
    }

    fn load_json<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    fn load_bincode<P: AsRef<Path>>(path: P) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        Ok(bincode::deserialize(&bytes)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_experiment() -> Experiment {
        let final_bank = Bank::from_candidates(vec![
            Candidate::new(vec![0, 2], 0.9, 3),
            Candidate::new(vec![1], 0.4, 0),
        ]);
        Experiment {
            id: "test_regression_2026-01-01_00-00-00".to_string(),
            timestamp: "2026-01-01_00-00-00".to_string(),
            copheselect_version: "0.1.0#test".to_string(),
            parameters: Param::default(),
            data_hash: "abc".to_string(),
            features: vec!["f1".to_string(), "f2".to_string(), "f3".to_string()],
            best: final_bank.candidates[0].clone(),
            final_bank,
            best_score_trace: vec![0.4, 0.9],
            generations: 1,
            execution_time: 0.5,
        }
    }

    fn tmp_path(name: &str) -> std::path::PathBuf {
        let dir = std::env::temp_dir().join(format!("copheselect_exp_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        dir.join(name)
    }

    #[test]
    fn test_best_features_are_named() {
        assert_eq!(create_test_experiment().best_features(), vec!["f1", "f3"]);
    }

    #[test]
    fn test_json_save_and_load() {
        let exp = create_test_experiment();
        let path = tmp_path("exp.json");
        exp.save_auto(&path).unwrap();
        let loaded = Experiment::load_auto(&path).unwrap();
        assert_eq!(loaded.id, exp.id);
        assert_eq!(loaded.best_features(), exp.best_features());
        assert_eq!(loaded.final_bank.len(), 2);
        assert!((loaded.best.score - 0.9).abs() < 1e-12, "JSON may round decimals slightly");
    }

    #[test]
    fn test_bincode_save_and_load() {
        let exp = create_test_experiment();
        let path = tmp_path("exp.bin");
        exp.save_auto(&path).unwrap();
        assert_eq!(Experiment::load_auto(&path).unwrap(), exp);
    }

    #[test]
    fn test_unknown_extension_falls_back_to_bincode() {
        let exp = create_test_experiment();
        let path = tmp_path("exp.whatever");
        exp.save_auto(&path).unwrap();
        let saved = path.with_extension("bin");
        assert!(saved.exists(), "experiment should be written as {}", saved.display());
        assert_eq!(Experiment::load_auto(&saved).unwrap(), exp);
    }
}
