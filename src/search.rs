use crate::bank::Bank;
use crate::candidate::{canonicalize, Candidate};
use crate::cinfo;
use crate::cluster::ClusterIndex;
use crate::error::{Result, SelectionError};
use crate::oracle::EvaluationContext;
use crate::param::{ExhaustedPolicy, Param};
use crate::utils::display_generation;
use log::{debug, info, warn};
use rand::Rng;
use rand::RngCore;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

//-----------------------------------------------------------------------------
// Cluster-constrained evolutionary search
//-----------------------------------------------------------------------------

/// What the driver hands back once the generation budget is spent.
#[derive(Debug, Clone)]
pub struct SearchOutcome {
    /// Final bank, best candidate first
    pub bank: Bank,
    /// Number of generations actually run (less than `learning` if interrupted)
    pub generations: usize,
    /// Best score of the seed bank then after each generation, if `keep_trace`
    pub best_score_trace: Vec<f64>,
}

/// Runs the whole search: seed bank, then `param.search.learning` generations.
///
/// # Arguments
///
/// * `context` - Design matrix, cluster index and oracle, shared read-only by every task.
/// * `param` - Search settings; `general.seed` seeds the only random generator of the run.
/// * `running` - Cleared from outside to stop after the current generation.
///
/// # Errors
///
/// Configuration errors are raised before any scoring. Oracle failures, sampling
/// stalls and unsatisfiable cluster constraints abort the run without result.
pub fn search(context: &EvaluationContext, param: &Param, running: Arc<AtomicBool>) -> Result<SearchOutcome> {
    let time = Instant::now();
    check_search_param(param, context.clusters)?;

    let pool = build_pool(param.general.thread_number)?;
    let mut rng = ChaCha8Rng::seed_from_u64(param.general.seed);

    info!(
        "Searching {} generations with a bank of {} candidates of at most {} features ({} features in {} clusters, {} workers, {})",
        param.search.learning,
        param.search.bank,
        param.search.component,
        context.clusters.feature_len(),
        context.clusters.len(),
        pool.current_num_threads(),
        context.oracle.name()
    );

    let base_bank = generate_bank(context, param, &pool, &mut rng)?;
    cinfo!(
        param.general.display_colorful,
        "{}",
        display_generation(&base_bank, context.clusters, 0)
    );

    let outcome = iterative_search(base_bank, context, param, running, &pool, &mut rng)?;

    info!(
        "Search computed {} generations in {:.2?}",
        outcome.generations,
        time.elapsed()
    );
    info!("{}", outcome.bank.display(context.clusters, param.general.n_model_to_display));
    Ok(outcome)
}

/// Bounds that depend on the cluster index.
pub fn check_search_param(param: &Param, clusters: &ClusterIndex) -> Result<()> {
    let search = &param.search;
    if search.learning == 0 || search.bank == 0 || search.component == 0 || search.interval == 0 {
        return Err(SelectionError::Configuration(format!(
            "learning ({}), bank ({}), component ({}) and interval ({}) must all be positive",
            search.learning, search.bank, search.component, search.interval
        )));
    }
    if search.init_attempts_factor == 0 {
        return Err(SelectionError::Configuration("init_attempts_factor must be positive".to_string()));
    }
    if search.component > clusters.len() {
        return Err(SelectionError::Configuration(format!(
            "component={} exceeds the {} available clusters",
            search.component,
            clusters.len()
        )));
    }
    if search.component == clusters.len() && search.exhausted_policy == ExhaustedPolicy::fail {
        warn!(
            "component={} equals the number of clusters: a seed set spanning all of them cannot be mutated and will stop the search (exhausted_policy=fail)",
            search.component
        );
    }
    if search.component > clusters.feature_len() {
        return Err(SelectionError::Configuration(format!(
            "component={} exceeds the {} available features",
            search.component,
            clusters.feature_len()
        )));
    }
    Ok(())
}

/// Worker pool reused by every generation. `0` means twice the available cores.
pub fn build_pool(thread_number: usize) -> Result<ThreadPool> {
    let threads = if thread_number > 0 {
        thread_number
    } else {
        std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1) * 2
    };
    ThreadPoolBuilder::new()
        .num_threads(threads)
        .build()
        .map_err(|e| SelectionError::Configuration(format!("unable to start {} workers: {}", threads, e)))
}

/// Draws one canonical feature set: a size in `[1, component]`, then for every
/// position a random cluster and a random member of it. Repeated draws collapse,
/// so the set may end up shorter than the drawn size.
pub fn draw_feature_set<R: Rng>(clusters: &ClusterIndex, component: usize, rng: &mut R) -> Vec<usize> {
    let k = rng.gen_range(1..=component);
    let mut features: Vec<usize> = (0..k)
        .map(|_| {
            let members = clusters.members(rng.gen_range(0..clusters.len()));
            members[rng.gen_range(0..members.len())]
        })
        .collect();
    canonicalize(&mut features);
    features
}

/// Builds the seed bank of `param.search.bank` distinct feature sets.
///
/// Sets are drawn sequentially (so the draw only depends on `rng`), then scored
/// on the pool. Gives up after `bank * init_attempts_factor` draws.
pub fn generate_bank(context: &EvaluationContext, param: &Param, pool: &ThreadPool, rng: &mut ChaCha8Rng) -> Result<Bank> {
    let target = param.search.bank;
    let max_attempts = target.saturating_mul(param.search.init_attempts_factor);

    let mut seen: HashSet<Vec<usize>> = HashSet::with_capacity(target);
    let mut feature_sets: Vec<Vec<usize>> = Vec::with_capacity(target);
    let mut attempts = 0;
    while feature_sets.len() < target {
        if attempts >= max_attempts {
            return Err(SelectionError::DuplicateSamplingStall {
                requested: target,
                shortfall: target - feature_sets.len(),
                attempts,
            });
        }
        attempts += 1;

        let features = draw_feature_set(context.clusters, param.search.component, rng);
        if seen.insert(features.clone()) {
            feature_sets.push(features);
        }
    }
    if attempts > target {
        debug!("{} draws rejected as duplicates", attempts - target);
    }

    let candidates = pool.install(|| {
        feature_sets
            .into_par_iter()
            .map(|features| {
                let score = context.score(&features)?;
                Ok(Candidate::new(features, score, 0))
            })
            .collect::<Result<Vec<Candidate>>>()
    })?;

    Ok(Bank::from_candidates(candidates))
}

/// Produces one offspring by swapping a single feature for a member of a cluster
/// the candidate does not use yet, then scores it.
///
/// The target cluster is drawn uniformly among the unused ones, which is the
/// distribution rejection sampling over all clusters would give but cannot loop.
/// When every cluster is already used, `policy` decides between failing and
/// returning the candidate unchanged.
pub fn mutate<R: Rng>(
    candidate: &Candidate,
    context: &EvaluationContext,
    policy: ExhaustedPolicy,
    epoch: usize,
    rng: &mut R,
) -> Result<Candidate> {
    let clusters = context.clusters;
    if candidate.features.is_empty() {
        return Err(SelectionError::Configuration("cannot mutate an empty feature set".to_string()));
    }

    let used = clusters.clusters_of(&candidate.features);
    let free: Vec<usize> = (0..clusters.len())
        .filter(|c| used.binary_search(c).is_err())
        .collect();
    if free.is_empty() {
        return match policy {
            ExhaustedPolicy::fail => Err(SelectionError::ClusterConstraintUnsatisfiable {
                features: candidate.feature_names(clusters),
            }),
            ExhaustedPolicy::keep => Ok(candidate.clone()),
        };
    }

    let position = rng.gen_range(0..candidate.features.len());
    let target = free[rng.gen_range(0..free.len())];
    let members = clusters.members(target);

    let mut features = candidate.features.clone();
    features[position] = members[rng.gen_range(0..members.len())];
    canonicalize(&mut features);

    let score = context.score(&features)?;
    Ok(Candidate::new(features, score, epoch))
}

/// One mutation per bank member, run on the pool; blocks until all are back.
///
/// Each task owns a generator seeded from `rng` before the scatter, and results
/// keep bank order, so the outcome does not depend on scheduling. The first
/// failing task fails the whole call.
pub fn evaluate_offspring(
    bank: &Bank,
    context: &EvaluationContext,
    policy: ExhaustedPolicy,
    epoch: usize,
    pool: &ThreadPool,
    rng: &mut ChaCha8Rng,
) -> Result<Vec<Candidate>> {
    let seeds: Vec<u64> = (0..bank.len()).map(|_| rng.next_u64()).collect();

    pool.install(|| {
        bank.candidates
            .par_iter()
            .zip(seeds.par_iter())
            .map(|(candidate, &seed)| {
                let mut task_rng = ChaCha8Rng::seed_from_u64(seed);
                mutate(candidate, context, policy, epoch, &mut task_rng)
            })
            .collect::<Result<Vec<Candidate>>>()
    })
}

/// Generation loop: evaluate, select, report every `interval` generations.
///
/// # Arguments
///
/// * `base_bank` - The seed bank, sorted.
/// * `context` - Shared evaluation context.
/// * `param` - Search parameters.
/// * `running` - Checked after each generation; cleared means stop.
/// * `pool` - Worker pool used for every generation.
/// * `rng` - Driver generator, source of every task seed.
pub fn iterative_search(
    base_bank: Bank,
    context: &EvaluationContext,
    param: &Param,
    running: Arc<AtomicBool>,
    pool: &ThreadPool,
    rng: &mut ChaCha8Rng,
) -> Result<SearchOutcome> {
    let mut bank = base_bank;
    let mut best_score_trace = Vec::new();
    let mut generations = 0;

    if param.general.keep_trace {
        if let Some(best) = bank.best() {
            best_score_trace.push(best.score);
        }
    }

    for generation in 0..param.search.learning {
        let offspring = evaluate_offspring(
            &bank,
            context,
            param.search.exhausted_policy,
            generation + 1,
            pool,
            rng,
        )?;

        let best_offspring = offspring
            .iter()
            .map(|c| c.score)
            .fold(f64::NEG_INFINITY, f64::max);

        bank = bank.select(offspring, param.search.bank);
        generations = generation + 1;

        let best = bank.best().map(|c| c.score).unwrap_or(f64::NEG_INFINITY);
        debug!(
            "Generation {}: best offspring {:.6}, best candidate {:.6}",
            generation, best_offspring, best
        );
        if param.general.keep_trace {
            best_score_trace.push(best);
        }

        if generation % param.search.interval == 0 && generation != 0 {
            cinfo!(
                param.general.display_colorful,
                "{}",
                display_generation(&bank, context.clusters, generation)
            );
            debug!("{}", bank.display(context.clusters, param.general.n_model_to_display));
        }

        if !running.load(Ordering::Relaxed) {
            warn!("Signal received: stopping after {} generations", generations);
            break;
        }
    }

    Ok(SearchOutcome {
        bank,
        generations,
        best_score_trace,
    })
}
