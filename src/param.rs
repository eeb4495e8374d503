use crate::error::{Result, SelectionError};
use log::warn;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;

/// Which scoring oracle backs the search
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
#[allow(non_camel_case_types)]
pub enum Mode {
    regression,
    classification,
}

/// What a mutation does when its candidate already spans every cluster
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
#[allow(non_camel_case_types)]
pub enum ExhaustedPolicy {
    fail,
    keep,
}

// Field definitions and associated default values

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Param {
    #[serde(default)]
    pub general: General,
    #[serde(default)]
    pub data: Data,
    #[serde(default)]
    pub search: Search,
    #[serde(default)]
    pub svm: Svm,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct General {
    #[serde(default = "seed_default")]
    pub seed: u64,
    #[serde(default = "mode_default")]
    pub mode: Mode,
    #[serde(default = "uzero_default")]
    pub thread_number: usize,
    #[serde(default = "log_base_default")]
    pub log_base: String,
    #[serde(default = "log_suffix_default")]
    pub log_suffix: String,
    #[serde(default = "log_level_default")]
    pub log_level: String,
    #[serde(default = "true_default")]
    pub display_colorful: bool,
    #[serde(default = "true_default")]
    pub keep_trace: bool,
    #[serde(default = "n_model_to_display_default")]
    pub n_model_to_display: usize,
    #[serde(default = "empty_string")]
    pub save_exp: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[allow(non_snake_case)]
pub struct Data {
    #[serde(default = "empty_string")]
    pub X: String,
    #[serde(default = "empty_string")]
    pub y: String,
    #[serde(default = "empty_string")]
    pub clusters: String,
    #[serde(default = "true_default")]
    pub features_in_rows: bool,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Search {
    #[serde(default = "learning_default")]
    pub learning: usize,
    #[serde(default = "bank_default")]
    pub bank: usize,
    #[serde(default = "component_default")]
    pub component: usize,
    #[serde(default = "interval_default")]
    pub interval: usize,
    #[serde(default = "init_attempts_factor_default")]
    pub init_attempts_factor: usize,
    #[serde(default = "exhausted_policy_default")]
    pub exhausted_policy: ExhaustedPolicy,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Svm {
    #[serde(default = "svm_c_default")]
    pub c: f64,
    #[serde(default = "svm_gamma_default")]
    pub gamma: f64,
    #[serde(default = "svm_tolerance_default")]
    pub tolerance: f64,
    #[serde(default = "svm_max_passes_default")]
    pub max_passes: usize,
    #[serde(default = "svm_max_iterations_default")]
    pub max_iterations: usize,
}

// Default section definitions

impl Default for General {
    fn default() -> Self {
        serde_json::from_value(serde_json::json!({})).unwrap()
    }
}

impl Default for Data {
    fn default() -> Self {
        serde_json::from_value(serde_json::json!({})).unwrap()
    }
}

impl Default for Search {
    fn default() -> Self {
        serde_json::from_value(serde_json::json!({})).unwrap()
    }
}

impl Default for Svm {
    fn default() -> Self {
        serde_json::from_value(serde_json::json!({})).unwrap()
    }
}

impl Default for Param {
    fn default() -> Self {
        serde_json::from_value(serde_json::json!({})).unwrap()
    }
}

pub fn get(param_file: String) -> Result<Param> {
    let param_file_reader = File::open(param_file)?;
    let param_reader = BufReader::new(param_file_reader);

    let mut config: Param = serde_yaml::from_reader(param_reader)?;

    validate(&mut config)?;

    Ok(config)
}

/// Checks that do not need the data. Cluster-dependent bounds are checked once
/// the cluster index exists (see `search::check_search_param`).
pub fn validate(param: &mut Param) -> Result<()> {
    if !param.general.log_base.is_empty() {
        param.general.display_colorful = false;
    }

    let search = &param.search;
    for (name, value) in [
        ("learning", search.learning),
        ("bank", search.bank),
        ("component", search.component),
        ("interval", search.interval),
        ("init_attempts_factor", search.init_attempts_factor),
    ] {
        if value == 0 {
            return Err(SelectionError::Configuration(format!(
                "Invalid {}=0. Must be a positive integer.",
                name
            )));
        }
    }

    if param.general.mode == Mode::classification {
        validate_svm(&param.svm)?;
    }

    if search.exhausted_policy == ExhaustedPolicy::keep {
        warn!("exhausted_policy=keep: candidates spanning every cluster are carried over without mutation.");
    }

    Ok(())
}

fn validate_svm(svm: &Svm) -> Result<()> {
    if !(svm.c > 0.0) {
        return Err(SelectionError::Configuration(format!(
            "Invalid svm.c={:.3}. Must be > 0.",
            svm.c
        )));
    }

    if !(svm.gamma > 0.0) {
        return Err(SelectionError::Configuration(format!(
            "Invalid svm.gamma={:.3}. Must be > 0.",
            svm.gamma
        )));
    }

    if svm.max_passes == 0 || svm.max_iterations == 0 {
        return Err(SelectionError::Configuration(
            "svm.max_passes and svm.max_iterations must be positive.".to_string(),
        ));
    }

    Ok(())
}

// Default value definitions

fn seed_default() -> u64 {
    4815162342
}
fn mode_default() -> Mode {
    Mode::regression
}
fn empty_string() -> String {
    "".to_string()
}
fn log_base_default() -> String {
    "".to_string()
}
fn log_suffix_default() -> String {
    "log".to_string()
}
fn log_level_default() -> String {
    "info".to_string()
}
fn true_default() -> bool {
    true
}
fn n_model_to_display_default() -> usize {
    10
}
fn uzero_default() -> usize {
    0
}
fn learning_default() -> usize {
    500_000
}
fn bank_default() -> usize {
    200
}
fn component_default() -> usize {
    4
}
fn interval_default() -> usize {
    1000
}
fn init_attempts_factor_default() -> usize {
    100
}
fn exhausted_policy_default() -> ExhaustedPolicy {
    ExhaustedPolicy::fail
}
fn svm_c_default() -> f64 {
    1.0
}
fn svm_gamma_default() -> f64 {
    0.1
}
fn svm_tolerance_default() -> f64 {
    1e-3
}
fn svm_max_passes_default() -> usize {
    5
}
fn svm_max_iterations_default() -> usize {
    10_000
}
