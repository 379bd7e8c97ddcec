use ndarray::{Array1, ArrayView2};
use rayon::prelude::*;

use crate::coordinator::{score_candidate, Scoring, Tally};
use crate::model::SynthesisModel;
use crate::refine::LocalRefiner;

/// Below this population size candidates are scored sequentially.
pub(crate) const MIN_PARALLEL_POPULATION: usize = 4;

/// Parallel evaluation configuration
#[derive(Debug, Clone)]
pub struct ParallelConfig {
    /// Enable parallel evaluation
    pub enabled: bool,
    /// Number of threads to use (None = use rayon default)
    pub num_threads: Option<usize>,
}

impl Default for ParallelConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            num_threads: None,
        }
    }
}

/// Size rayon's global pool once; later calls are ignored by rayon.
pub(crate) fn configure_thread_pool(config: &ParallelConfig) {
    if let Some(n) = config.num_threads {
        if rayon::ThreadPoolBuilder::new()
            .num_threads(n)
            .build_global()
            .is_err()
        {
            log::debug!("rayon global pool already initialized, keeping its size");
        }
    }
}

/// Score a population in parallel.
///
/// Each candidate works on its own clone of `template` and of `refiner`, so
/// no model state is shared between tasks. Fitness values land in population
/// order.
pub(crate) fn score_population_parallel<M, R>(
    ctx: &Scoring<'_>,
    refiner: &R,
    template: &M,
    population: ArrayView2<'_, f64>,
    fitness: &mut [f64],
) -> Tally
where
    M: SynthesisModel + Clone + Send + Sync,
    R: LocalRefiner<M> + Clone + Send + Sync,
{
    let results: Vec<(f64, Tally)> = (0..population.nrows())
        .into_par_iter()
        .map(|k| {
            let mut model = template.clone();
            let mut local = refiner.clone();
            let mut fvec = Array1::zeros(model.residual_dim());
            score_candidate(ctx, &mut local, &mut model, population.row(k), &mut fvec)
        })
        .collect();

    let mut tally = Tally::default();
    for (slot, (f, t)) in fitness.iter_mut().zip(results) {
        *slot = f;
        tally += t;
    }
    tally
}
