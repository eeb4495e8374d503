#![allow(non_snake_case)]

pub mod bank;
pub mod candidate;
pub mod cluster;
pub mod data;
pub mod error;
pub mod experiment;
pub mod oracle;
pub mod param;
pub mod regression;
pub mod search;
pub mod svm;
pub mod utils;

use crate::cluster::ClusterIndex;
use crate::data::Data;
use crate::error::{Result, SelectionError};
use crate::experiment::Experiment;
use crate::oracle::{build_oracle, EvaluationContext};
use crate::param::{Mode, Param};
use crate::search::search;
use crate::utils::{display_mode_banner, version};
use chrono::Local;
use log::debug;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

/// Loads the files named in `param`, runs the search and wraps its result.
pub fn run(param: &Param, running: Arc<AtomicBool>) -> Result<Experiment> {
    let mut data = Data::new();
    data.load_data(&param.data.X, &param.data.y, param.data.features_in_rows)?;
    let clusters = ClusterIndex::load(&param.data.clusters)?;
    run_on_data(&data, &clusters, param, running)
}

/// Same as `run` on data already in memory. `param` is validated here, so a
/// hand-built `Param` gets the same checks as one read from YAML.
pub fn run_on_data(data: &Data, clusters: &ClusterIndex, param: &Param, running: Arc<AtomicBool>) -> Result<Experiment> {
    let start = std::time::Instant::now();
    let mut param = param.clone();
    crate::param::validate(&mut param)?;
    let param = &param;
    let timestamp = Local::now().format("%Y-%m-%d_%H-%M-%S").to_string();

    cinfo!(
        param.general.display_colorful,
        "{} {}",
        display_mode_banner(&format!("{:?}", param.general.mode)),
        Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    cinfo!(param.general.display_colorful, "\x1b[2;97m{:?}\x1b[0m", data);
    debug!("Cluster sizes: {:?}", clusters.summary());

    // Columns follow the cluster index so that column i is feature id i
    let design = data.restrict_to(&clusters.features)?;
    if design.feature_len < data.feature_len {
        debug!(
            "{} features of the matrix have no cluster and are ignored",
            data.feature_len - design.feature_len
        );
    }

    let oracle = build_oracle(param);
    let context = EvaluationContext::new(&design, clusters, oracle.as_ref())?;
    let outcome = search(&context, param, running)?;

    let best = outcome
        .bank
        .best()
        .cloned()
        .ok_or_else(|| SelectionError::Configuration("search ended with an empty bank".to_string()))?;

    let save_name = param.general.save_exp.split('.').next().unwrap_or("");
    let exp = Experiment {
        id: format!("{}_{:?}_{}", save_name, param.general.mode, timestamp),
        timestamp,
        copheselect_version: version(),
        parameters: param.clone(),
        data_hash: design.fingerprint()?,
        features: clusters.features.clone(),
        best,
        final_bank: outcome.bank,
        best_score_trace: outcome.best_score_trace,
        generations: outcome.generations,
        execution_time: start.elapsed().as_secs_f64(),
    };

    cinfo!(
        param.general.display_colorful,
        "\x1b[1;92mSelected features ({}): {}\x1b[0m",
        exp.best.k(),
        exp.best_features().join(", ")
    );
    cinfo!(
        param.general.display_colorful,
        "Finished at {} after {:.2}s",
        Local::now().format("%Y-%m-%d %H:%M:%S"),
        exp.execution_time
    );

    Ok(exp)
}

/// Library entry point: the best feature set found, as sorted feature names.
///
/// # Arguments
///
/// * `data` - Samples and target. Features absent from `assignment` are ignored.
/// * `assignment` - `(feature, cluster)` pairs, cluster ids numbered from 1 without gaps.
/// * `mode` - Chooses the oracle: least squares R² or RBF SVC training accuracy.
/// * `learning` - Number of generations.
/// * `bank` - Number of candidates kept between generations.
/// * `component` - Maximum size of a seed feature set.
/// * `interval` - Progress is logged every `interval` generations.
/// * `seed` - Seed of the single random generator of the run.
///
/// # Errors
///
/// See [`SelectionError`]; nothing is returned on failure.
///
/// Mutation runs with `ExhaustedPolicy::fail`: once a candidate spans every
/// cluster, the run stops with `ClusterConstraintUnsatisfiable`. With
/// `component` equal to the number of clusters this is the expected outcome;
/// use `run_on_data` with `search.exhausted_policy: keep` to carry such
/// candidates over instead.
#[allow(clippy::too_many_arguments)]
pub fn select<S: AsRef<str>>(
    data: &Data,
    assignment: &[(S, usize)],
    mode: Mode,
    learning: usize,
    bank: usize,
    component: usize,
    interval: usize,
    seed: u64,
) -> Result<Vec<String>> {
    let clusters = ClusterIndex::from_assignment(assignment)?;

    let mut param = Param::default();
    param.general.mode = mode;
    param.general.seed = seed;
    param.search.learning = learning;
    param.search.bank = bank;
    param.search.component = component;
    param.search.interval = interval;

    let exp = run_on_data(data, &clusters, &param, Arc::new(AtomicBool::new(true)))?;
    Ok(exp.best_features())
}
